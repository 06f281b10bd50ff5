//! Virtual Network Resource handler for Terraform
//!
//! Subnets declared inline are sent with the network. When none are
//! declared the subnets already present remotely are sent back unchanged,
//! so that subnets managed elsewhere survive an update.

use anyhow::{Context, Result};
use azurerm_common::models::network::{
    AddressSpace, DhcpOptions, Subnet, SubnetProperties, VirtualNetwork, VirtualNetworkProperties, API_VERSION,
};
use azurerm_common::models::SubResource;
use azurerm_common::{normalize_location, ArmClient, ResourceId};
use tracing::{debug, info};

use super::common::{self, expand_tags, flatten_tags, parse_id, read_back};
use super::Resource;
use crate::schema::{AttrType, Attribute, Block, NestedBlock};
use crate::state::{
    get_list_attr, get_optional_string_attr, get_string_attr, get_string_list_attr, list_value, make_state,
    optional_string_value, string_list_value, string_value, DynamicValue,
};
use crate::validate;

const PROVIDER: &str = "Microsoft.Network";

pub struct VirtualNetworkResource;

#[async_trait::async_trait]
impl Resource for VirtualNetworkResource {
    fn type_name(&self) -> &'static str {
        "azurerm_virtual_network"
    }

    fn schema(&self) -> Block {
        Block::new(vec![
            common::id(),
            Attribute::required("name", AttrType::String).force_new(),
            common::resource_group_name(),
            common::location(),
            Attribute::required("address_space", AttrType::list_of(AttrType::String))
                .validate_elements(validate::cidr()),
            Attribute::optional("dns_servers", AttrType::list_of(AttrType::String))
                .validate_elements(validate::ip_address()),
            common::tags(),
        ])
        .with_blocks(vec![NestedBlock::set(
            "subnet",
            Block::new(vec![
                Attribute::required("name", AttrType::String),
                Attribute::required("address_prefix", AttrType::String).validate(validate::cidr()),
                Attribute::optional("security_group", AttrType::String),
                Attribute::computed("id", AttrType::String),
            ]),
        )])
    }

    async fn create(&self, client: &ArmClient, planned: &DynamicValue) -> Result<DynamicValue> {
        let name = get_string_attr(planned, "name");
        let id = ResourceId::new(client.subscription_id(), get_string_attr(planned, "resource_group_name"))
            .provider(PROVIDER)
            .child("virtualNetworks", &name)
            .to_string();
        info!("Creating Virtual Network {:?}", name);

        put_network(client, &id, planned)
            .await
            .with_context(|| format!("Error creating Virtual Network {:?}", name))?;
        read_back(self, client, planned, id).await
    }

    async fn read(&self, client: &ArmClient, state: &DynamicValue) -> Result<Option<DynamicValue>> {
        let id = parse_id(state)?;
        let vnet: Option<VirtualNetwork> = client
            .get(&id.to_string(), API_VERSION)
            .await
            .with_context(|| format!("Error reading Virtual Network {}", id))?;
        let Some(vnet) = vnet else {
            return Ok(None);
        };

        let track_subnets = !get_list_attr(state, "subnet").is_empty();
        Ok(Some(vnet_to_state(&id, &vnet, track_subnets)))
    }

    async fn update(&self, client: &ArmClient, _prior: &DynamicValue, planned: &DynamicValue) -> Result<DynamicValue> {
        let id = parse_id(planned)?.to_string();
        put_network(client, &id, planned)
            .await
            .with_context(|| format!("Error updating Virtual Network {}", id))?;
        read_back(self, client, planned, id).await
    }

    async fn delete(&self, client: &ArmClient, state: &DynamicValue) -> Result<()> {
        let id = parse_id(state)?.to_string();
        info!("Deleting Virtual Network {}", id);
        client
            .delete(&id, API_VERSION)
            .await
            .with_context(|| format!("Error deleting Virtual Network {}", id))?;
        Ok(())
    }
}

async fn put_network(client: &ArmClient, id: &str, planned: &DynamicValue) -> Result<()> {
    let mut properties = expand_properties(planned);
    if properties.subnets.is_none() {
        let existing: Option<VirtualNetwork> = client.get(id, API_VERSION).await?;
        let subnets = existing.and_then(|v| v.properties).and_then(|p| p.subnets);
        debug!(
            "No subnets configured, keeping {} existing",
            subnets.as_ref().map(Vec::len).unwrap_or(0)
        );
        properties.subnets = Some(subnets.unwrap_or_default());
    }

    let body = VirtualNetwork::new(
        normalize_location(&get_string_attr(planned, "location")),
        expand_tags(planned),
        properties,
    );
    client.put(id, API_VERSION, &body).await?;
    Ok(())
}

/// Network properties from configuration; `subnets` is `None` when no
/// subnet block is declared
fn expand_properties(planned: &DynamicValue) -> VirtualNetworkProperties {
    let subnets: Vec<Subnet> = get_list_attr(planned, "subnet")
        .iter()
        .map(|s| Subnet {
            id: None,
            name: Some(get_string_attr(s, "name")),
            properties: Some(SubnetProperties {
                address_prefix: Some(get_string_attr(s, "address_prefix")),
                network_security_group: get_optional_string_attr(s, "security_group").map(SubResource::new),
                route_table: None,
            }),
        })
        .collect();

    VirtualNetworkProperties {
        address_space: Some(AddressSpace {
            address_prefixes: get_string_list_attr(planned, "address_space"),
        }),
        dhcp_options: Some(DhcpOptions {
            dns_servers: get_string_list_attr(planned, "dns_servers"),
        }),
        subnets: if subnets.is_empty() { None } else { Some(subnets) },
        provisioning_state: None,
    }
}

fn vnet_to_state(id: &ResourceId, vnet: &VirtualNetwork, track_subnets: bool) -> DynamicValue {
    let props = vnet.properties.clone().unwrap_or_default();
    let address_space = props.address_space.map(|a| a.address_prefixes).unwrap_or_default();
    let dns_servers = props.dhcp_options.map(|d| d.dns_servers).unwrap_or_default();

    let subnets = if track_subnets {
        props.subnets.unwrap_or_default().iter().map(subnet_to_state).collect()
    } else {
        Vec::new()
    };

    make_state(vec![
        ("id", string_value(id.to_string())),
        ("name", string_value(vnet.name.clone().unwrap_or_default())),
        ("resource_group_name", string_value(&id.resource_group)),
        ("location", optional_string_value(vnet.location.as_deref().map(normalize_location))),
        ("address_space", string_list_value(address_space)),
        (
            "dns_servers",
            if dns_servers.is_empty() {
                DynamicValue::Null
            } else {
                string_list_value(dns_servers)
            },
        ),
        ("subnet", list_value(subnets)),
        ("tags", flatten_tags(vnet.tags.as_ref())),
    ])
}

fn subnet_to_state(subnet: &Subnet) -> DynamicValue {
    let props = subnet.properties.clone().unwrap_or_default();
    make_state(vec![
        ("name", string_value(subnet.name.clone().unwrap_or_default())),
        ("address_prefix", string_value(props.address_prefix.unwrap_or_default())),
        (
            "security_group",
            optional_string_value(props.network_security_group.and_then(|n| n.id)),
        ),
        ("id", optional_string_value(subnet.id.clone())),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn planned(with_subnet: bool) -> DynamicValue {
        let subnets = if with_subnet {
            vec![make_state(vec![
                ("name", string_value("subnet1")),
                ("address_prefix", string_value("10.0.1.0/24")),
                ("security_group", string_value("/subscriptions/s/resourceGroups/rg/providers/Microsoft.Network/networkSecurityGroups/nsg")),
                ("id", DynamicValue::Unknown),
            ])]
        } else {
            Vec::new()
        };
        make_state(vec![
            ("name", string_value("acctestvirtnet")),
            ("resource_group_name", string_value("acctestRG")),
            ("location", string_value("westus")),
            ("address_space", string_list_value(["10.0.0.0/16"])),
            ("dns_servers", string_list_value(["10.0.0.4"])),
            ("subnet", list_value(subnets)),
        ])
    }

    #[test]
    fn test_expand_properties() {
        let props = expand_properties(&planned(true));
        assert_eq!(props.address_space.unwrap().address_prefixes, vec!["10.0.0.0/16"]);
        assert_eq!(props.dhcp_options.unwrap().dns_servers, vec!["10.0.0.4"]);
        let subnets = props.subnets.unwrap();
        assert_eq!(subnets[0].name.as_deref(), Some("subnet1"));
        assert!(subnets[0]
            .properties
            .as_ref()
            .unwrap()
            .network_security_group
            .is_some());
    }

    #[test]
    fn test_no_subnet_blocks_leaves_subnets_unset() {
        assert!(expand_properties(&planned(false)).subnets.is_none());
    }

    #[test]
    fn test_subnets_only_tracked_when_declared() {
        let id = ResourceId::parse(
            "/subscriptions/s/resourceGroups/acctestRG/providers/Microsoft.Network/virtualNetworks/acctestvirtnet",
        )
        .unwrap();
        let vnet: VirtualNetwork = serde_json::from_value(serde_json::json!({
            "name": "acctestvirtnet",
            "location": "westus",
            "properties": {
                "addressSpace": {"addressPrefixes": ["10.0.0.0/16"]},
                "subnets": [{"id": "/subnet-id", "name": "external", "properties": {"addressPrefix": "10.0.2.0/24"}}]
            }
        }))
        .unwrap();

        let untracked = vnet_to_state(&id, &vnet, false);
        assert!(get_list_attr(&untracked, "subnet").is_empty());
        assert_eq!(get_string_attr(&untracked, "resource_group_name"), "acctestRG");

        let tracked = vnet_to_state(&id, &vnet, true);
        let subnet = &get_list_attr(&tracked, "subnet")[0];
        assert_eq!(get_string_attr(subnet, "id"), "/subnet-id");
        assert!(subnet.get("security_group").unwrap().is_null());
    }
}
