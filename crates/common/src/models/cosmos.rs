//! Microsoft.DocumentDB database accounts

use serde::{Deserialize, Serialize};

use super::Resource;

pub const API_VERSION: &str = "2015-04-08";

pub const OFFER_TYPES: &[&str] = &["Standard"];

pub const CONSISTENCY_LEVELS: &[&str] = &["BoundedStaleness", "Eventual", "Session", "Strong"];

/// Body sent on create and update
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseAccountCreateUpdateProperties {
    pub consistency_policy: ConsistencyPolicy,
    pub database_account_offer_type: String,
    pub locations: Vec<Location>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_range_filter: Option<String>,
}

pub type DatabaseAccountCreateUpdate = Resource<DatabaseAccountCreateUpdateProperties>;

/// Properties returned by GET
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseAccountProperties {
    #[serde(default)]
    pub consistency_policy: Option<ConsistencyPolicy>,
    #[serde(default)]
    pub database_account_offer_type: Option<String>,
    #[serde(default)]
    pub ip_range_filter: Option<String>,
    #[serde(default)]
    pub document_endpoint: Option<String>,
    #[serde(default)]
    pub failover_policies: Vec<FailoverPolicy>,
    #[serde(default)]
    pub provisioning_state: Option<String>,
}

pub type DatabaseAccount = Resource<DatabaseAccountProperties>;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsistencyPolicy {
    pub default_consistency_level: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_staleness_prefix: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_interval_in_seconds: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub id: String,
    pub location_name: String,
    pub failover_priority: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailoverPolicy {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub location_name: Option<String>,
    #[serde(default)]
    pub failover_priority: Option<i64>,
}

/// Response of `listKeys`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListKeysResult {
    #[serde(default)]
    pub primary_master_key: Option<String>,
    #[serde(default)]
    pub secondary_master_key: Option<String>,
    #[serde(default)]
    pub primary_readonly_master_key: Option<String>,
    #[serde(default)]
    pub secondary_readonly_master_key: Option<String>,
}

/// Response of `readonlykeys`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListReadOnlyKeysResult {
    #[serde(default)]
    pub primary_readonly_master_key: Option<String>,
    #[serde(default)]
    pub secondary_readonly_master_key: Option<String>,
}
