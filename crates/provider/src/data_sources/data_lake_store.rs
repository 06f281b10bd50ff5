//! Data Lake Store account lookup

use anyhow::{Context, Result};
use azurerm_common::models::datalake::{Account, API_VERSION};
use azurerm_common::{normalize_location, ArmClient, ResourceId};

use super::DataSource;
use crate::resources::common;
use crate::schema::{AttrType, Attribute, Block};
use crate::state::{get_string_attr, make_state, optional_string_value, string_value, DynamicValue};

pub struct DataLakeStoreDataSource;

#[async_trait::async_trait]
impl DataSource for DataLakeStoreDataSource {
    fn type_name(&self) -> &'static str {
        "azurerm_data_lake_store"
    }

    fn schema(&self) -> Block {
        Block::new(vec![
            common::id(),
            Attribute::required("name", AttrType::String),
            common::resource_group_name_for_data_source(),
            common::location_for_data_source(),
            Attribute::computed("tier", AttrType::String),
            common::tags_for_data_source(),
        ])
    }

    async fn read(&self, client: &ArmClient, config: &DynamicValue) -> Result<DynamicValue> {
        let name = get_string_attr(config, "name");
        let resource_group = get_string_attr(config, "resource_group_name");
        let id = ResourceId::new(client.subscription_id(), &resource_group)
            .provider("Microsoft.DataLakeStore")
            .child("accounts", &name)
            .to_string();

        let account: Account = client
            .get(&id, API_VERSION)
            .await
            .with_context(|| {
                format!(
                    "Error making Read request on Azure Data Lake {:?} (Resource Group {:?})",
                    name, resource_group
                )
            })?
            .with_context(|| format!("Data Lake Store {:?} (Resource Group {:?}) was not found", name, resource_group))?;

        Ok(account_to_state(&name, &resource_group, id, &account))
    }
}

fn account_to_state(name: &str, resource_group: &str, id: String, account: &Account) -> DynamicValue {
    let tier = account.properties.as_ref().and_then(|p| p.current_tier.clone());
    make_state(vec![
        ("id", string_value(account.id.clone().unwrap_or(id))),
        ("name", string_value(name)),
        ("resource_group_name", string_value(resource_group)),
        ("location", optional_string_value(account.location.as_deref().map(normalize_location))),
        ("tier", optional_string_value(tier)),
        ("tags", common::flatten_tags(account.tags.as_ref())),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_to_state() {
        let account: Account = serde_json::from_value(serde_json::json!({
            "id": "/subscriptions/s/resourceGroups/rg/providers/Microsoft.DataLakeStore/accounts/unittest1",
            "location": "East US 2",
            "tags": {"hello": "world"},
            "properties": {"currentTier": "Commitment_1TB"}
        }))
        .unwrap();

        let state = account_to_state("unittest1", "rg", String::new(), &account);
        assert_eq!(
            get_string_attr(&state, "id"),
            "/subscriptions/s/resourceGroups/rg/providers/Microsoft.DataLakeStore/accounts/unittest1"
        );
        assert_eq!(get_string_attr(&state, "location"), "eastus2");
        assert_eq!(get_string_attr(&state, "tier"), "Commitment_1TB");
        assert_eq!(
            crate::state::get_string_map_attr(&state, "tags").get("hello").map(String::as_str),
            Some("world")
        );
    }

    #[test]
    fn test_tier_is_computed() {
        let schema = DataLakeStoreDataSource.schema();
        let tier = schema.attribute("tier").unwrap();
        assert!(tier.computed && !tier.optional);
    }
}
