//! Microsoft.Resources subscriptions

use serde::{Deserialize, Serialize};

pub const API_VERSION: &str = "2016-06-01";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub subscription_id: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub subscription_policies: Option<SubscriptionPolicies>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionPolicies {
    #[serde(default)]
    pub location_placement_id: Option<String>,
    #[serde(default)]
    pub quota_id: Option<String>,
    #[serde(default)]
    pub spending_limit: Option<String>,
}
