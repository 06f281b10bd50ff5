//! Microsoft.Web sites and slot swaps

use serde::{Deserialize, Serialize};

use super::Resource;

pub const API_VERSION: &str = "2016-08-01";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteProperties {
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub default_host_name: Option<String>,
    #[serde(default)]
    pub resource_group: Option<String>,
    #[serde(default)]
    pub slot_swap_status: Option<SlotSwapStatus>,
}

pub type Site = Resource<SiteProperties>;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotSwapStatus {
    #[serde(default)]
    pub timestamp_utc: Option<String>,
    #[serde(default)]
    pub source_slot_name: Option<String>,
    #[serde(default)]
    pub destination_slot_name: Option<String>,
}

/// Body of `slotsswap`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CsmSlotEntity {
    pub target_slot: String,
    pub preserve_vnet: bool,
}
