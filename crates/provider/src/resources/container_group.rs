//! Container Group Resource handler for Terraform
//!
//! A group holding exactly one container. Every input forces a new group.

use anyhow::{Context, Result};
use azurerm_common::models::containerinstance::{
    Container, ContainerGroup, ContainerGroupProperties, ContainerPort, ContainerProperties, IpAddress,
    ResourceRequests, ResourceRequirements, API_VERSION, IP_ADDRESS_TYPES, OS_TYPES, PROTOCOLS,
};
use azurerm_common::{normalize_location, ArmClient, ResourceId};
use tracing::info;

use super::common::{self, expand_tags, flatten_tags, parse_id, read_back};
use super::Resource;
use crate::schema::{AttrType, Attribute, Block, Suppress};
use crate::state::{
    float_value, get_float_attr, get_optional_int_attr, get_optional_string_attr, get_string_attr, int_value,
    make_state, optional_string_value, string_value, DynamicValue,
};

pub struct ContainerGroupResource;

#[async_trait::async_trait]
impl Resource for ContainerGroupResource {
    fn type_name(&self) -> &'static str {
        "azurerm_container_group"
    }

    fn schema(&self) -> Block {
        Block::new(vec![
            common::id(),
            Attribute::required("name", AttrType::String).force_new(),
            common::location(),
            common::resource_group_name(),
            Attribute::required("image", AttrType::String).force_new(),
            Attribute::optional("cpu", AttrType::Number).default(float_value(1.0)).force_new(),
            Attribute::optional("memory", AttrType::Number).default(float_value(1.5)).force_new(),
            Attribute::optional("ip_address_type", AttrType::String)
                .force_new()
                .validate(common::one_of(IP_ADDRESS_TYPES))
                .suppress(Suppress::CaseInsensitive),
            Attribute::optional("os_type", AttrType::String)
                .force_new()
                .validate(common::one_of(OS_TYPES))
                .suppress(Suppress::CaseInsensitive),
            Attribute::optional("port", AttrType::Number).force_new(),
            Attribute::optional("protocol", AttrType::String)
                .force_new()
                .validate(common::one_of(PROTOCOLS))
                .suppress(Suppress::CaseInsensitive),
            Attribute::computed("ip_address", AttrType::String),
            common::tags(),
        ])
    }

    fn importable(&self) -> bool {
        false
    }

    async fn create(&self, client: &ArmClient, planned: &DynamicValue) -> Result<DynamicValue> {
        let name = get_string_attr(planned, "name");
        let resource_group = get_string_attr(planned, "resource_group_name");
        let id = ResourceId::new(client.subscription_id(), &resource_group)
            .provider("Microsoft.ContainerInstance")
            .child("containerGroups", &name)
            .to_string();
        info!("Creating Container Group {:?} (Resource Group {:?})", name, resource_group);

        client
            .put(&id, API_VERSION, &expand_container_group(planned))
            .await
            .with_context(|| format!("Error creating Container Group {:?} (Resource Group {:?})", name, resource_group))?;
        read_back(self, client, planned, id).await
    }

    async fn read(&self, client: &ArmClient, state: &DynamicValue) -> Result<Option<DynamicValue>> {
        let id = parse_id(state)?;
        let group: Option<ContainerGroup> = client
            .get(&id.to_string(), API_VERSION)
            .await
            .with_context(|| format!("Error reading Container Group {}", id))?;
        match group {
            Some(group) => Ok(Some(group_to_state(&id, &group)?)),
            None => Ok(None),
        }
    }

    async fn update(&self, client: &ArmClient, _prior: &DynamicValue, planned: &DynamicValue) -> Result<DynamicValue> {
        let id = parse_id(planned)?.to_string();
        client
            .put(&id, API_VERSION, &expand_container_group(planned))
            .await
            .with_context(|| format!("Error updating Container Group {}", id))?;
        read_back(self, client, planned, id).await
    }

    async fn delete(&self, client: &ArmClient, state: &DynamicValue) -> Result<()> {
        let id = parse_id(state)?.to_string();
        info!("Deleting Container Group {}", id);
        client
            .delete(&id, API_VERSION)
            .await
            .with_context(|| format!("Error deleting Container Group {}", id))?;
        Ok(())
    }
}

fn expand_container_group(planned: &DynamicValue) -> ContainerGroup {
    let name = get_string_attr(planned, "name");
    let port = get_optional_int_attr(planned, "port");
    let protocol = get_optional_string_attr(planned, "protocol")
        .map(|p| p.to_uppercase())
        .filter(|p| p == "TCP" || p == "UDP");

    let container = Container {
        name,
        properties: ContainerProperties {
            image: get_string_attr(planned, "image"),
            ports: port.map(|port| ContainerPort { port, protocol: None }).into_iter().collect(),
            resources: ResourceRequirements {
                requests: ResourceRequests {
                    memory_in_gb: get_float_attr(planned, "memory", 1.5),
                    cpu: get_float_attr(planned, "cpu", 1.0),
                },
            },
        },
    };

    let ip_address = get_optional_string_attr(planned, "ip_address_type").map(|address_type| IpAddress {
        ports: port.map(|port| ContainerPort { port, protocol }).into_iter().collect(),
        address_type,
        ip: None,
    });

    ContainerGroup::new(
        normalize_location(&get_string_attr(planned, "location")),
        expand_tags(planned),
        ContainerGroupProperties {
            containers: vec![container],
            ip_address,
            os_type: get_optional_string_attr(planned, "os_type"),
            ..Default::default()
        },
    )
}

fn group_to_state(id: &ResourceId, group: &ContainerGroup) -> Result<DynamicValue> {
    let props = group.properties.clone().unwrap_or_default();
    let container = props.containers.first();
    let requests = container.map(|c| &c.properties.resources.requests);
    let ip_address = props.ip_address.as_ref();
    let group_port = ip_address.and_then(|ip| ip.ports.first());
    let port = group_port.or_else(|| container.and_then(|c| c.properties.ports.first()));

    Ok(make_state(vec![
        ("id", string_value(id.to_string())),
        ("name", string_value(id.require("containerGroups")?)),
        ("location", optional_string_value(group.location.as_deref().map(normalize_location))),
        ("resource_group_name", string_value(&id.resource_group)),
        ("image", optional_string_value(container.map(|c| c.properties.image.clone()))),
        ("cpu", requests.map(|r| float_value(r.cpu)).unwrap_or_default()),
        ("memory", requests.map(|r| float_value(r.memory_in_gb)).unwrap_or_default()),
        ("ip_address_type", optional_string_value(ip_address.map(|ip| ip.address_type.clone()))),
        ("ip_address", optional_string_value(ip_address.and_then(|ip| ip.ip.clone()))),
        ("os_type", optional_string_value(props.os_type)),
        ("port", port.map(|p| int_value(p.port)).unwrap_or_default()),
        ("protocol", optional_string_value(group_port.and_then(|p| p.protocol.clone()))),
        ("tags", flatten_tags(group.tags.as_ref())),
    ]))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn planned() -> DynamicValue {
        make_state(vec![
            ("name", string_value("acctestcontainergroup")),
            ("location", string_value("West US")),
            ("image", string_value("microsoft/aci-helloworld:latest")),
            ("cpu", float_value(0.5)),
            ("memory", float_value(1.5)),
            ("ip_address_type", string_value("public")),
            ("os_type", string_value("linux")),
            ("port", int_value(80)),
            ("protocol", string_value("tcp")),
        ])
    }

    #[test]
    fn test_expand_container_group() {
        let body = serde_json::to_value(expand_container_group(&planned())).unwrap();
        assert_eq!(body["location"], "westus");
        assert_eq!(body["properties"]["osType"], "linux");
        assert_eq!(body["properties"]["ipAddress"]["ports"][0]["protocol"], "TCP");
        let container = &body["properties"]["containers"][0];
        assert_eq!(container["name"], "acctestcontainergroup");
        assert_eq!(container["properties"]["ports"], serde_json::json!([{"port": 80}]));
        assert_eq!(container["properties"]["resources"]["requests"]["cpu"], 0.5);
    }

    #[test]
    fn test_private_group_has_no_ip_address() {
        let mut planned = planned();
        planned.set("ip_address_type", DynamicValue::Null);
        let group = expand_container_group(&planned);
        assert!(group.properties.unwrap().ip_address.is_none());
    }

    #[test]
    fn test_group_to_state() {
        let id = ResourceId::parse(
            "/subscriptions/s/resourceGroups/rg/providers/Microsoft.ContainerInstance/containerGroups/acctestcontainergroup",
        )
        .unwrap();
        let group: ContainerGroup = serde_json::from_value(serde_json::json!({
            "location": "westus",
            "properties": {
                "osType": "Linux",
                "containers": [{
                    "name": "acctestcontainergroup",
                    "properties": {
                        "image": "microsoft/aci-helloworld:latest",
                        "ports": [{"port": 80}],
                        "resources": {"requests": {"memoryInGB": 1.5, "cpu": 0.5}}
                    }
                }],
                "ipAddress": {"type": "Public", "ip": "52.160.1.2", "ports": [{"port": 80, "protocol": "TCP"}]}
            }
        }))
        .unwrap();

        let state = group_to_state(&id, &group).unwrap();
        assert_eq!(get_string_attr(&state, "name"), "acctestcontainergroup");
        assert_eq!(get_string_attr(&state, "ip_address"), "52.160.1.2");
        assert_eq!(get_string_attr(&state, "protocol"), "TCP");
        assert_eq!(get_optional_int_attr(&state, "port"), Some(80));
        assert_eq!(get_float_attr(&state, "cpu", 0.0), 0.5);
    }

    #[test]
    fn test_not_importable() {
        assert!(!ContainerGroupResource.importable());
    }
}
