//! Route Table Resource handler for Terraform

use anyhow::{Context, Result};
use azurerm_common::models::network::{Route, RouteProperties, RouteTable, RouteTableProperties, API_VERSION, NEXT_HOP_TYPES};
use azurerm_common::{normalize_location, ArmClient, ResourceId};
use tracing::info;

use super::common::{self, expand_tags, flatten_tags, parse_id, read_back};
use super::Resource;
use crate::schema::{AttrType, Attribute, Block, NestedBlock, Suppress};
use crate::state::{
    bool_value, get_bool_attr, get_list_attr, get_optional_string_attr, get_string_attr, list_value, make_state,
    optional_string_value, string_list_value, string_value, DynamicValue,
};
use crate::validate;

pub struct RouteTableResource;

#[async_trait::async_trait]
impl Resource for RouteTableResource {
    fn type_name(&self) -> &'static str {
        "azurerm_route_table"
    }

    fn schema(&self) -> Block {
        Block::new(vec![
            common::id(),
            Attribute::required("name", AttrType::String).force_new(),
            common::resource_group_name(),
            common::location(),
            Attribute::optional("disable_bgp_route_propagation", AttrType::Bool).default(bool_value(false)),
            Attribute::computed("subnets", AttrType::set_of(AttrType::String)),
            common::tags(),
        ])
        .with_blocks(vec![NestedBlock::list(
            "route",
            Block::new(vec![
                Attribute::required("name", AttrType::String),
                Attribute::required("address_prefix", AttrType::String),
                Attribute::required("next_hop_type", AttrType::String)
                    .validate(common::one_of(NEXT_HOP_TYPES))
                    .suppress(Suppress::CaseInsensitive),
                Attribute::optional("next_hop_in_ip_address", AttrType::String).validate(validate::ip_address()),
            ]),
        )])
    }

    async fn create(&self, client: &ArmClient, planned: &DynamicValue) -> Result<DynamicValue> {
        let name = get_string_attr(planned, "name");
        let id = ResourceId::new(client.subscription_id(), get_string_attr(planned, "resource_group_name"))
            .provider("Microsoft.Network")
            .child("routeTables", &name)
            .to_string();
        info!("Creating Route Table {:?}", name);

        client
            .put(&id, API_VERSION, &expand_route_table(planned))
            .await
            .with_context(|| format!("Error creating Route Table {:?}", name))?;
        read_back(self, client, planned, id).await
    }

    async fn read(&self, client: &ArmClient, state: &DynamicValue) -> Result<Option<DynamicValue>> {
        let id = parse_id(state)?;
        let table: Option<RouteTable> = client
            .get(&id.to_string(), API_VERSION)
            .await
            .with_context(|| format!("Error reading Route Table {}", id))?;
        Ok(table.map(|t| route_table_to_state(&id, &t)))
    }

    async fn update(&self, client: &ArmClient, _prior: &DynamicValue, planned: &DynamicValue) -> Result<DynamicValue> {
        let id = parse_id(planned)?.to_string();
        client
            .put(&id, API_VERSION, &expand_route_table(planned))
            .await
            .with_context(|| format!("Error updating Route Table {}", id))?;
        read_back(self, client, planned, id).await
    }

    async fn delete(&self, client: &ArmClient, state: &DynamicValue) -> Result<()> {
        let id = parse_id(state)?.to_string();
        info!("Deleting Route Table {}", id);
        client
            .delete(&id, API_VERSION)
            .await
            .with_context(|| format!("Error deleting Route Table {}", id))?;
        Ok(())
    }
}

fn expand_route_table(planned: &DynamicValue) -> RouteTable {
    let routes = get_list_attr(planned, "route")
        .iter()
        .map(|r| Route {
            id: None,
            name: Some(get_string_attr(r, "name")),
            properties: Some(RouteProperties {
                address_prefix: Some(get_string_attr(r, "address_prefix")),
                next_hop_type: Some(get_string_attr(r, "next_hop_type")),
                next_hop_ip_address: get_optional_string_attr(r, "next_hop_in_ip_address"),
            }),
        })
        .collect();

    RouteTable::new(
        normalize_location(&get_string_attr(planned, "location")),
        expand_tags(planned),
        RouteTableProperties {
            routes: Some(routes),
            subnets: None,
            disable_bgp_route_propagation: Some(get_bool_attr(planned, "disable_bgp_route_propagation", false)),
            provisioning_state: None,
        },
    )
}

fn route_table_to_state(id: &ResourceId, table: &RouteTable) -> DynamicValue {
    let props = table.properties.clone().unwrap_or_default();

    let routes = props
        .routes
        .unwrap_or_default()
        .into_iter()
        .map(|r| {
            let p = r.properties.unwrap_or_default();
            make_state(vec![
                ("name", string_value(r.name.unwrap_or_default())),
                ("address_prefix", string_value(p.address_prefix.unwrap_or_default())),
                ("next_hop_type", string_value(p.next_hop_type.unwrap_or_default())),
                ("next_hop_in_ip_address", optional_string_value(p.next_hop_ip_address)),
            ])
        })
        .collect();

    let subnets = props.subnets.unwrap_or_default().into_iter().filter_map(|s| s.id);

    make_state(vec![
        ("id", string_value(id.to_string())),
        ("name", string_value(table.name.clone().unwrap_or_default())),
        ("resource_group_name", string_value(&id.resource_group)),
        ("location", optional_string_value(table.location.as_deref().map(normalize_location))),
        ("route", list_value(routes)),
        (
            "disable_bgp_route_propagation",
            bool_value(props.disable_bgp_route_propagation.unwrap_or(false)),
        ),
        ("subnets", string_list_value(subnets)),
        ("tags", flatten_tags(table.tags.as_ref())),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_routes() {
        let planned = make_state(vec![
            ("location", string_value("West US")),
            ("disable_bgp_route_propagation", bool_value(true)),
            (
                "route",
                list_value(vec![make_state(vec![
                    ("name", string_value("route1")),
                    ("address_prefix", string_value("10.1.0.0/16")),
                    ("next_hop_type", string_value("vnetlocal")),
                    ("next_hop_in_ip_address", DynamicValue::Null),
                ])]),
            ),
        ]);
        let table = expand_route_table(&planned);
        assert_eq!(table.location.as_deref(), Some("westus"));
        let props = table.properties.unwrap();
        assert_eq!(props.disable_bgp_route_propagation, Some(true));
        let route = props.routes.unwrap().remove(0).properties.unwrap();
        assert_eq!(route.next_hop_type.as_deref(), Some("vnetlocal"));
        assert!(route.next_hop_ip_address.is_none());
    }

    #[test]
    fn test_next_hop_type_is_case_insensitive() {
        let schema = RouteTableResource.schema();
        let route = &schema.blocks[0].block;
        let next_hop = route.attribute("next_hop_type").unwrap();
        assert_eq!(next_hop.suppress, Some(Suppress::CaseInsensitive));
        assert!(next_hop.validate[0](&string_value("vnetlocal"), "next_hop_type").is_empty());
        assert_eq!(next_hop.validate[0](&string_value("Gateway"), "next_hop_type").len(), 1);
    }

    #[test]
    fn test_route_table_to_state_lists_subnets() {
        let id = ResourceId::parse("/subscriptions/s/resourceGroups/rg/providers/Microsoft.Network/routeTables/rt").unwrap();
        let table: RouteTable = serde_json::from_value(serde_json::json!({
            "name": "rt",
            "location": "westus",
            "properties": {
                "routes": [{"name": "route1", "properties": {"addressPrefix": "10.1.0.0/16", "nextHopType": "VnetLocal"}}],
                "subnets": [{"id": "/subnet-a"}]
            }
        }))
        .unwrap();

        let state = route_table_to_state(&id, &table);
        assert_eq!(crate::state::get_string_list_attr(&state, "subnets"), vec!["/subnet-a"]);
        assert_eq!(get_list_attr(&state, "route").len(), 1);
        assert_eq!(state.get("disable_bgp_route_propagation"), Some(&bool_value(false)));
    }
}
