//! DNS AAAA Record Resource handler for Terraform
//!
//! Record sets carry no tags of their own; `tags` is stored as record set
//! metadata.

use anyhow::{Context, Result};
use azurerm_common::models::dns::{AaaaRecord, RecordSet, RecordSetProperties, API_VERSION};
use azurerm_common::{ArmClient, ResourceId};
use tracing::info;

use super::common::{self, expand_tags, flatten_tags, parse_id, read_back};
use super::Resource;
use crate::schema::{AttrType, Attribute, Block};
use crate::state::{
    get_int_attr, get_string_attr, get_string_list_attr, int_value, make_state, string_list_value, string_value,
    DynamicValue,
};
use crate::validate;

pub struct DnsAaaaRecordResource;

#[async_trait::async_trait]
impl Resource for DnsAaaaRecordResource {
    fn type_name(&self) -> &'static str {
        "azurerm_dns_aaaa_record"
    }

    fn schema(&self) -> Block {
        Block::new(vec![
            common::id(),
            Attribute::required("name", AttrType::String).force_new(),
            common::resource_group_name(),
            Attribute::required("zone_name", AttrType::String).force_new(),
            Attribute::required("records", AttrType::set_of(AttrType::String))
                .validate_elements(validate::ipv6_address()),
            Attribute::required("ttl", AttrType::Number),
            common::tags(),
        ])
    }

    async fn create(&self, client: &ArmClient, planned: &DynamicValue) -> Result<DynamicValue> {
        let name = get_string_attr(planned, "name");
        let zone = get_string_attr(planned, "zone_name");
        let id = ResourceId::new(client.subscription_id(), get_string_attr(planned, "resource_group_name"))
            .provider("Microsoft.Network")
            .child("dnsZones", &zone)
            .child("AAAA", &name)
            .to_string();
        info!("Creating DNS AAAA Record {:?} in zone {:?}", name, zone);

        client
            .put(&id, API_VERSION, &expand_record_set(planned))
            .await
            .with_context(|| format!("Error creating DNS AAAA Record {:?} (zone {:?})", name, zone))?;
        read_back(self, client, planned, id).await
    }

    async fn read(&self, client: &ArmClient, state: &DynamicValue) -> Result<Option<DynamicValue>> {
        let id = parse_id(state)?;
        let record_set: Option<RecordSet> = client
            .get(&id.to_string(), API_VERSION)
            .await
            .with_context(|| format!("Error reading DNS AAAA Record {}", id))?;
        match record_set {
            Some(rs) => Ok(Some(record_set_to_state(&id, &rs)?)),
            None => Ok(None),
        }
    }

    async fn update(&self, client: &ArmClient, _prior: &DynamicValue, planned: &DynamicValue) -> Result<DynamicValue> {
        let id = parse_id(planned)?.to_string();
        client
            .put(&id, API_VERSION, &expand_record_set(planned))
            .await
            .with_context(|| format!("Error updating DNS AAAA Record {}", id))?;
        read_back(self, client, planned, id).await
    }

    async fn delete(&self, client: &ArmClient, state: &DynamicValue) -> Result<()> {
        let id = parse_id(state)?.to_string();
        info!("Deleting DNS AAAA Record {}", id);
        client
            .delete(&id, API_VERSION)
            .await
            .with_context(|| format!("Error deleting DNS AAAA Record {}", id))?;
        Ok(())
    }
}

fn expand_record_set(planned: &DynamicValue) -> RecordSet {
    let records = get_string_list_attr(planned, "records")
        .into_iter()
        .map(|ip| AaaaRecord { ipv6_address: Some(ip) })
        .collect();

    RecordSet {
        id: None,
        name: None,
        etag: None,
        properties: Some(RecordSetProperties {
            metadata: Some(expand_tags(planned)),
            ttl: Some(get_int_attr(planned, "ttl", 0)),
            fqdn: None,
            aaaa_records: Some(records),
        }),
    }
}

fn record_set_to_state(id: &ResourceId, rs: &RecordSet) -> Result<DynamicValue> {
    let props = rs.properties.clone().unwrap_or_default();
    let zone = id.require("dnsZones")?;
    let records = props
        .aaaa_records
        .unwrap_or_default()
        .into_iter()
        .filter_map(|r| r.ipv6_address);

    Ok(make_state(vec![
        ("id", string_value(id.to_string())),
        ("name", string_value(rs.name.clone().unwrap_or_default())),
        ("resource_group_name", string_value(&id.resource_group)),
        ("zone_name", string_value(zone)),
        ("records", string_list_value(records)),
        ("ttl", int_value(props.ttl.unwrap_or(0))),
        ("tags", flatten_tags(props.metadata.as_ref())),
    ]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_record_set() {
        let planned = make_state(vec![
            ("ttl", int_value(300)),
            (
                "records",
                string_list_value(["2607:f8b0:4009:1803::1005", "2607:f8b0:4009:1803::1006"]),
            ),
        ]);
        let body = serde_json::to_value(expand_record_set(&planned)).unwrap();
        assert_eq!(body["properties"]["TTL"], 300);
        assert_eq!(
            body["properties"]["AAAARecords"][1]["ipv6Address"],
            "2607:f8b0:4009:1803::1006"
        );
        assert_eq!(body["properties"]["metadata"], serde_json::json!({}));
    }

    #[test]
    fn test_record_set_to_state() {
        let id = ResourceId::parse(
            "/subscriptions/s/resourceGroups/rg/providers/Microsoft.Network/dnsZones/acctestzone.com/AAAA/myarecord",
        )
        .unwrap();
        let rs: RecordSet = serde_json::from_value(serde_json::json!({
            "name": "myarecord",
            "properties": {
                "TTL": 300,
                "metadata": {"environment": "Production"},
                "AAAARecords": [{"ipv6Address": "::1"}]
            }
        }))
        .unwrap();

        let state = record_set_to_state(&id, &rs).unwrap();
        assert_eq!(get_string_attr(&state, "zone_name"), "acctestzone.com");
        assert_eq!(get_string_list_attr(&state, "records"), vec!["::1"]);
        assert_eq!(crate::state::get_string_map_attr(&state, "tags").len(), 1);
    }

    #[test]
    fn test_records_must_be_ipv6() {
        let schema = DnsAaaaRecordResource.schema();
        let diags = schema.validate(&make_state(vec![
            ("name", string_value("myarecord")),
            ("records", string_list_value(["10.0.0.1"])),
            ("ttl", int_value(300)),
        ]));
        assert_eq!(diags.len(), 1);
    }
}
