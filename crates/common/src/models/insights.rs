//! Microsoft.Insights Application Insights components

use serde::{Deserialize, Serialize};

use super::Resource;

pub const API_VERSION: &str = "2015-05-01";

pub const APPLICATION_TYPES: &[&str] = &["web", "other", "java", "phone", "store", "ios"];

/// The service uses PascalCase with underscores for these fields
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ComponentProperties {
    #[serde(rename = "Application_Type", skip_serializing_if = "Option::is_none")]
    pub application_type: Option<String>,
    #[serde(rename = "AppId", skip_serializing_if = "Option::is_none")]
    pub app_id: Option<String>,
    #[serde(rename = "InstrumentationKey", skip_serializing_if = "Option::is_none")]
    pub instrumentation_key: Option<String>,
    #[serde(rename = "provisioningState", skip_serializing_if = "Option::is_none")]
    pub provisioning_state: Option<String>,
}

pub type Component = Resource<ComponentProperties>;
