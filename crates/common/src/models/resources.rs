//! Microsoft.Resources

use serde::{Deserialize, Serialize};

pub const API_VERSION: &str = "2017-05-10";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceGroupProperties {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provisioning_state: Option<String>,
}

pub type ResourceGroup = super::Resource<ResourceGroupProperties>;
