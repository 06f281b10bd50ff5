//! App Service Active Slot Resource handler for Terraform
//!
//! Swaps a deployment slot into production. The swap itself is the only
//! remote effect; deleting the resource leaves the site as it is.

use anyhow::{bail, Context, Result};
use azurerm_common::models::web::{CsmSlotEntity, Site, API_VERSION};
use azurerm_common::{ArmClient, ResourceId};
use tracing::{info, warn};

use super::common::{self, parse_id, read_back};
use super::Resource;
use crate::schema::{AttrType, Attribute, Block};
use crate::state::{bool_value, get_bool_attr, get_string_attr, make_state, optional_string_value, string_value, DynamicValue};

pub struct AppServiceActiveSlotResource;

#[async_trait::async_trait]
impl Resource for AppServiceActiveSlotResource {
    fn type_name(&self) -> &'static str {
        "azurerm_app_service_active_slot"
    }

    fn schema(&self) -> Block {
        Block::new(vec![
            common::id(),
            common::resource_group_name(),
            Attribute::required("app_service_name", AttrType::String).force_new(),
            Attribute::required("app_service_slot_name", AttrType::String),
            Attribute::required("preserve_vnet", AttrType::Bool),
        ])
    }

    async fn create(&self, client: &ArmClient, planned: &DynamicValue) -> Result<DynamicValue> {
        let id = swap_slot(client, planned).await?;
        read_back(self, client, planned, id).await
    }

    async fn read(&self, client: &ArmClient, state: &DynamicValue) -> Result<Option<DynamicValue>> {
        let id = parse_id(state)?;
        let name = id.require("sites")?.to_string();

        let site: Option<Site> = client
            .get(&id.to_string(), API_VERSION)
            .await
            .with_context(|| format!("Error making Read request on AzureRM App Service {:?}", name))?;
        match site {
            Some(site) => Ok(Some(site_to_state(&id, &site, get_bool_attr(state, "preserve_vnet", false)))),
            None => {
                warn!(
                    "App Service {:?} (resource group {:?}) was not found - removing from state",
                    name, id.resource_group
                );
                Ok(None)
            }
        }
    }

    async fn update(&self, client: &ArmClient, _prior: &DynamicValue, planned: &DynamicValue) -> Result<DynamicValue> {
        let id = swap_slot(client, planned).await?;
        read_back(self, client, planned, id).await
    }

    async fn delete(&self, _client: &ArmClient, state: &DynamicValue) -> Result<()> {
        info!("Forgetting App Service Active Slot {}", get_string_attr(state, "id"));
        Ok(())
    }
}

/// Swap the configured slot with production and return the site id
async fn swap_slot(client: &ArmClient, planned: &DynamicValue) -> Result<String> {
    let name = get_string_attr(planned, "app_service_name");
    let resource_group = get_string_attr(planned, "resource_group_name");
    let target_slot = get_string_attr(planned, "app_service_slot_name");
    let site_path = ResourceId::new(client.subscription_id(), &resource_group)
        .provider("Microsoft.Web")
        .child("sites", &name);

    let site: Option<Site> = client
        .get(&site_path.to_string(), API_VERSION)
        .await
        .with_context(|| format!("Error making Read request on AzureRM App Service {:?}", name))?;
    let Some(site) = site else {
        bail!("App Service {:?} (resource group {:?}) was not found.", name, resource_group);
    };

    let slot_path = site_path.clone().child("slots", &target_slot).to_string();
    let slot: Option<Site> = client
        .get(&slot_path, API_VERSION)
        .await
        .with_context(|| format!("Error making Read request on AzureRM App Service Slot {:?}/{:?}", name, target_slot))?;
    if slot.is_none() {
        bail!(
            "App Service Target Active Slot {:?}/{:?} (resource group {:?}) was not found.",
            name,
            target_slot,
            resource_group
        );
    }

    info!("Swapping App Service Slot {:?}/{:?} into production", name, target_slot);
    let entity = CsmSlotEntity {
        target_slot: target_slot.clone(),
        preserve_vnet: get_bool_attr(planned, "preserve_vnet", false),
    };
    client
        .post_action(&format!("{}/slotsswap", site_path), API_VERSION, &entity)
        .await
        .with_context(|| format!("Error swapping App Service Slot {:?}/{:?}", name, target_slot))?;

    Ok(site.id.unwrap_or_else(|| site_path.to_string()))
}

/// The API does not return `preserve_vnet`, so the known value is carried over
fn site_to_state(id: &ResourceId, site: &Site, preserve_vnet: bool) -> DynamicValue {
    let props = site.properties.clone().unwrap_or_default();
    let source_slot = props.slot_swap_status.and_then(|s| s.source_slot_name);
    make_state(vec![
        ("id", string_value(id.to_string())),
        (
            "app_service_name",
            string_value(site.name.clone().unwrap_or_else(|| id.get("sites").unwrap_or_default().to_string())),
        ),
        (
            "resource_group_name",
            string_value(props.resource_group.unwrap_or_else(|| id.resource_group.clone())),
        ),
        ("app_service_slot_name", optional_string_value(source_slot)),
        ("preserve_vnet", bool_value(preserve_vnet)),
    ])
}
