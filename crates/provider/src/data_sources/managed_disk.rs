//! Managed Disk lookup

use anyhow::{Context, Result};
use azurerm_common::models::compute::{Disk, API_VERSION};
use azurerm_common::{ArmClient, ResourceId};

use super::DataSource;
use crate::resources::common;
use crate::schema::{AttrType, Attribute, Block};
use crate::state::{get_string_attr, int_value, make_state, optional_string_value, string_value, DynamicValue};

pub struct ManagedDiskDataSource;

#[async_trait::async_trait]
impl DataSource for ManagedDiskDataSource {
    fn type_name(&self) -> &'static str {
        "azurerm_managed_disk"
    }

    fn schema(&self) -> Block {
        Block::new(vec![
            common::id(),
            Attribute::required("name", AttrType::String),
            common::resource_group_name_for_data_source(),
            Attribute::computed("storage_account_type", AttrType::String),
            Attribute::computed("source_uri", AttrType::String),
            Attribute::computed("source_resource_id", AttrType::String),
            Attribute::computed("os_type", AttrType::String),
            Attribute::computed("disk_size_gb", AttrType::Number),
            common::tags_for_data_source(),
        ])
    }

    async fn read(&self, client: &ArmClient, config: &DynamicValue) -> Result<DynamicValue> {
        let name = get_string_attr(config, "name");
        let resource_group = get_string_attr(config, "resource_group_name");
        let id = ResourceId::new(client.subscription_id(), &resource_group)
            .provider("Microsoft.Compute")
            .child("disks", &name)
            .to_string();

        let disk: Disk = client
            .get(&id, API_VERSION)
            .await
            .with_context(|| {
                format!(
                    "Error making Read request on Azure Managed Disk {} (resource group {})",
                    name, resource_group
                )
            })?
            .with_context(|| format!("Managed Disk {:?} (resource group {:?}) was not found", name, resource_group))?;

        Ok(disk_to_state(&name, &resource_group, id, &disk))
    }
}

fn disk_to_state(name: &str, resource_group: &str, id: String, disk: &Disk) -> DynamicValue {
    let props = disk.properties.clone().unwrap_or_default();
    let creation = props.creation_data.unwrap_or_default();
    make_state(vec![
        ("id", string_value(disk.id.clone().unwrap_or(id))),
        ("name", string_value(name)),
        ("resource_group_name", string_value(resource_group)),
        (
            "storage_account_type",
            optional_string_value(disk.sku.as_ref().and_then(|s| s.name.clone())),
        ),
        ("source_uri", optional_string_value(creation.source_uri)),
        ("source_resource_id", optional_string_value(creation.source_resource_id)),
        ("os_type", optional_string_value(props.os_type.filter(|o| !o.is_empty()))),
        ("disk_size_gb", props.disk_size_gb.map(int_value).unwrap_or_default()),
        ("tags", common::flatten_tags(disk.tags.as_ref())),
    ])
}
