//! Microsoft.Network DNS zones and record sets

use serde::{Deserialize, Serialize};

use super::{Resource, Tags};

pub const API_VERSION: &str = "2016-04-01";

/// DNS zones are global resources
pub const ZONE_LOCATION: &str = "global";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZoneProperties {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_number_of_record_sets: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub number_of_record_sets: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name_servers: Option<Vec<String>>,
}

pub type Zone = Resource<ZoneProperties>;

/// Record sets are not tracked resources: no location, tags live in metadata
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordSet {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<RecordSetProperties>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecordSetProperties {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Tags>,
    #[serde(rename = "TTL", skip_serializing_if = "Option::is_none")]
    pub ttl: Option<i64>,
    #[serde(rename = "fqdn", skip_serializing_if = "Option::is_none")]
    pub fqdn: Option<String>,
    #[serde(rename = "AAAARecords", skip_serializing_if = "Option::is_none")]
    pub aaaa_records: Option<Vec<AaaaRecord>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AaaaRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ipv6_address: Option<String>,
}
