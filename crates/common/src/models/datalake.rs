//! Microsoft.DataLakeStore accounts

use serde::{Deserialize, Serialize};

use super::Resource;

pub const API_VERSION: &str = "2016-11-01";

pub const TIERS: &[&str] = &[
    "Consumption",
    "Commitment_1TB",
    "Commitment_10TB",
    "Commitment_100TB",
    "Commitment_500TB",
    "Commitment_1PB",
    "Commitment_5PB",
];

pub const ENCRYPTION_STATES: &[&str] = &["Enabled", "Disabled"];
pub const ENCRYPTION_TYPES: &[&str] = &["ServiceManaged"];
pub const FIREWALL_STATES: &[&str] = &["Enabled", "Disabled"];
pub const FIREWALL_ALLOW_AZURE_IPS: &[&str] = &["Enabled", "Disabled"];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAccountProperties {
    pub new_tier: String,
    pub firewall_state: String,
    pub firewall_allow_azure_ips: String,
    pub encryption_state: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encryption_config: Option<EncryptionConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAccountProperties {
    pub new_tier: String,
    pub firewall_state: String,
    pub firewall_allow_azure_ips: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptionConfig {
    #[serde(rename = "type")]
    pub config_type: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountProperties {
    #[serde(default)]
    pub current_tier: Option<String>,
    #[serde(default)]
    pub encryption_state: Option<String>,
    #[serde(default)]
    pub encryption_config: Option<EncryptionConfig>,
    #[serde(default)]
    pub firewall_state: Option<String>,
    #[serde(default)]
    pub firewall_allow_azure_ips: Option<String>,
    #[serde(default)]
    pub endpoint: Option<String>,
}

pub type CreateAccount = Resource<CreateAccountProperties>;
pub type UpdateAccount = Resource<UpdateAccountProperties>;
pub type Account = Resource<AccountProperties>;
