//! DNS Zone Resource handler for Terraform

use anyhow::{Context, Result};
use azurerm_common::models::dns::{Zone, ZoneProperties, API_VERSION, ZONE_LOCATION};
use azurerm_common::{ArmClient, ResourceId};
use tracing::info;

use super::common::{self, expand_tags, flatten_tags, parse_id, read_back};
use super::Resource;
use crate::schema::{AttrType, Attribute, Block};
use crate::state::{get_string_attr, int_value, make_state, string_list_value, string_value, DynamicValue};

pub struct DnsZoneResource;

#[async_trait::async_trait]
impl Resource for DnsZoneResource {
    fn type_name(&self) -> &'static str {
        "azurerm_dns_zone"
    }

    fn schema(&self) -> Block {
        Block::new(vec![
            common::id(),
            Attribute::required("name", AttrType::String).force_new(),
            common::resource_group_name(),
            Attribute::computed("number_of_record_sets", AttrType::Number),
            Attribute::computed("max_number_of_record_sets", AttrType::Number),
            Attribute::computed("name_servers", AttrType::set_of(AttrType::String)),
            common::tags(),
        ])
    }

    async fn create(&self, client: &ArmClient, planned: &DynamicValue) -> Result<DynamicValue> {
        let name = get_string_attr(planned, "name");
        let id = ResourceId::new(client.subscription_id(), get_string_attr(planned, "resource_group_name"))
            .provider("Microsoft.Network")
            .child("dnsZones", &name)
            .to_string();
        info!("Creating DNS Zone {:?}", name);

        client
            .put(&id, API_VERSION, &expand_zone(planned))
            .await
            .with_context(|| format!("Error creating DNS Zone {:?}", name))?;
        read_back(self, client, planned, id).await
    }

    async fn read(&self, client: &ArmClient, state: &DynamicValue) -> Result<Option<DynamicValue>> {
        let id = parse_id(state)?;
        let zone: Option<Zone> = client
            .get(&id.to_string(), API_VERSION)
            .await
            .with_context(|| format!("Error reading DNS Zone {}", id))?;
        Ok(zone.map(|z| zone_to_state(&id, &z)))
    }

    async fn update(&self, client: &ArmClient, _prior: &DynamicValue, planned: &DynamicValue) -> Result<DynamicValue> {
        let id = parse_id(planned)?.to_string();
        client
            .put(&id, API_VERSION, &expand_zone(planned))
            .await
            .with_context(|| format!("Error updating DNS Zone {}", id))?;
        read_back(self, client, planned, id).await
    }

    async fn delete(&self, client: &ArmClient, state: &DynamicValue) -> Result<()> {
        let id = parse_id(state)?.to_string();
        info!("Deleting DNS Zone {}", id);
        client
            .delete(&id, API_VERSION)
            .await
            .with_context(|| format!("Error deleting DNS Zone {}", id))?;
        Ok(())
    }
}

fn expand_zone(planned: &DynamicValue) -> Zone {
    Zone::new(ZONE_LOCATION, expand_tags(planned), ZoneProperties::default())
}

fn zone_to_state(id: &ResourceId, zone: &Zone) -> DynamicValue {
    let props = zone.properties.clone().unwrap_or_default();
    let name = zone
        .name
        .clone()
        .or_else(|| id.get("dnsZones").map(str::to_string))
        .unwrap_or_default();

    make_state(vec![
        ("id", string_value(id.to_string())),
        ("name", string_value(name)),
        ("resource_group_name", string_value(&id.resource_group)),
        ("number_of_record_sets", int_value(props.number_of_record_sets.unwrap_or(0))),
        ("max_number_of_record_sets", int_value(props.max_number_of_record_sets.unwrap_or(0))),
        ("name_servers", string_list_value(props.name_servers.unwrap_or_default())),
        ("tags", flatten_tags(zone.tags.as_ref())),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zone_is_global() {
        let zone = expand_zone(&make_state(vec![("name", string_value("acctestzone.com"))]));
        assert_eq!(zone.location.as_deref(), Some("global"));
        assert_eq!(
            serde_json::to_value(&zone).unwrap(),
            serde_json::json!({"location": "global", "tags": {}, "properties": {}})
        );
    }

    #[test]
    fn test_zone_to_state() {
        let id = ResourceId::parse("/subscriptions/s/resourceGroups/rg/providers/Microsoft.Network/dnsZones/acctestzone.com")
            .unwrap();
        let zone: Zone = serde_json::from_value(serde_json::json!({
            "location": "global",
            "properties": {
                "maxNumberOfRecordSets": 5000,
                "numberOfRecordSets": 2,
                "nameServers": ["ns1-01.azure-dns.com.", "ns2-01.azure-dns.net."]
            }
        }))
        .unwrap();

        let state = zone_to_state(&id, &zone);
        assert_eq!(get_string_attr(&state, "name"), "acctestzone.com");
        assert_eq!(state.get("number_of_record_sets"), Some(&int_value(2)));
        assert_eq!(crate::state::get_list_attr(&state, "name_servers").len(), 2);
    }
}
