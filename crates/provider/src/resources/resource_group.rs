//! Resource Group Resource handler for Terraform

use anyhow::{Context, Result};
use azurerm_common::models::resources::{ResourceGroup, ResourceGroupProperties, API_VERSION};
use azurerm_common::{normalize_location, ArmClient, ResourceId};
use tracing::info;

use super::common::{self, expand_tags, flatten_tags, parse_id, read_back};
use super::Resource;
use crate::schema::{AttrType, Attribute, Block};
use crate::state::{get_string_attr, make_state, optional_string_value, string_value, DynamicValue};

pub struct ResourceGroupResource;

#[async_trait::async_trait]
impl Resource for ResourceGroupResource {
    fn type_name(&self) -> &'static str {
        "azurerm_resource_group"
    }

    fn schema(&self) -> Block {
        let mut name = common::resource_group_name();
        name.name = "name";
        Block::new(vec![
            common::id(),
            name,
            common::location(),
            common::tags(),
        ])
    }

    async fn create(&self, client: &ArmClient, planned: &DynamicValue) -> Result<DynamicValue> {
        let name = get_string_attr(planned, "name");
        let id = ResourceId::new(client.subscription_id(), &name).to_string();
        info!("Creating Resource Group {:?}", name);

        put_group(client, &id, planned)
            .await
            .with_context(|| format!("Error creating Resource Group {:?}", name))?;
        read_back(self, client, planned, id).await
    }

    async fn read(&self, client: &ArmClient, state: &DynamicValue) -> Result<Option<DynamicValue>> {
        let id = parse_id(state)?;
        let group: Option<ResourceGroup> = client
            .get(&id.to_string(), API_VERSION)
            .await
            .with_context(|| format!("Error reading Resource Group {:?}", id.resource_group))?;
        Ok(group.map(|g| group_to_state(&id, &g)))
    }

    async fn update(&self, client: &ArmClient, _prior: &DynamicValue, planned: &DynamicValue) -> Result<DynamicValue> {
        let id = parse_id(planned)?.to_string();
        put_group(client, &id, planned)
            .await
            .with_context(|| format!("Error updating Resource Group {:?}", get_string_attr(planned, "name")))?;
        read_back(self, client, planned, id).await
    }

    async fn delete(&self, client: &ArmClient, state: &DynamicValue) -> Result<()> {
        let id = parse_id(state)?;
        info!("Deleting Resource Group {:?}", id.resource_group);
        client
            .delete(&id.to_string(), API_VERSION)
            .await
            .with_context(|| format!("Error deleting Resource Group {:?}", id.resource_group))?;
        Ok(())
    }
}

async fn put_group(client: &ArmClient, id: &str, planned: &DynamicValue) -> Result<()> {
    let body = ResourceGroup::new(
        normalize_location(&get_string_attr(planned, "location")),
        expand_tags(planned),
        ResourceGroupProperties::default(),
    );
    client.put(id, API_VERSION, &body).await?;
    Ok(())
}

fn group_to_state(id: &ResourceId, group: &ResourceGroup) -> DynamicValue {
    make_state(vec![
        ("id", string_value(id.to_string())),
        ("name", string_value(group.name.clone().unwrap_or_else(|| id.resource_group.clone()))),
        ("location", optional_string_value(group.location.as_deref().map(normalize_location))),
        ("tags", flatten_tags(group.tags.as_ref())),
    ])
}
