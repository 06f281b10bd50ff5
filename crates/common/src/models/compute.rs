//! Microsoft.Compute managed disks

use serde::{Deserialize, Serialize};

use super::Resource;

pub const API_VERSION: &str = "2017-03-30";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiskProperties {
    #[serde(default)]
    pub os_type: Option<String>,
    #[serde(rename = "diskSizeGB", default)]
    pub disk_size_gb: Option<i64>,
    #[serde(default)]
    pub creation_data: Option<CreationData>,
    #[serde(default)]
    pub provisioning_state: Option<String>,
}

pub type Disk = Resource<DiskProperties>;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreationData {
    #[serde(default)]
    pub create_option: Option<String>,
    #[serde(default)]
    pub source_uri: Option<String>,
    #[serde(default)]
    pub source_resource_id: Option<String>,
}
