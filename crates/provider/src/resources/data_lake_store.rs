//! Data Lake Store Resource handler for Terraform

use anyhow::{Context, Result};
use azurerm_common::models::datalake::{
    Account, CreateAccount, CreateAccountProperties, EncryptionConfig, UpdateAccount, UpdateAccountProperties,
    API_VERSION, ENCRYPTION_STATES, ENCRYPTION_TYPES, FIREWALL_ALLOW_AZURE_IPS, FIREWALL_STATES, TIERS,
};
use azurerm_common::{normalize_location, ArmClient, ResourceId};
use tracing::{info, warn};

use super::common::{self, expand_tags, flatten_tags, parse_id, read_back};
use super::Resource;
use crate::schema::{AttrType, Attribute, Block, Suppress};
use crate::state::{
    get_optional_string_attr, get_string_attr, make_state, optional_string_value, string_value, DynamicValue,
};
use crate::validate;

pub struct DataLakeStoreResource;

fn enum_attribute(name: &'static str, values: &'static [&'static str]) -> Attribute {
    Attribute::optional(name, AttrType::String)
        .validate(common::one_of(values))
        .suppress(Suppress::CaseInsensitive)
}

#[async_trait::async_trait]
impl Resource for DataLakeStoreResource {
    fn type_name(&self) -> &'static str {
        "azurerm_data_lake_store"
    }

    fn schema(&self) -> Block {
        Block::new(vec![
            common::id(),
            Attribute::required("name", AttrType::String)
                .force_new()
                .validate(validate::data_lake_account_name()),
            common::location(),
            common::resource_group_name(),
            enum_attribute("tier", TIERS).default(string_value("Consumption")),
            enum_attribute("encryption_state", ENCRYPTION_STATES)
                .default(string_value("Enabled"))
                .force_new(),
            Attribute {
                computed: true,
                ..enum_attribute("encryption_type", ENCRYPTION_TYPES).force_new()
            },
            enum_attribute("firewall_state", FIREWALL_STATES).default(string_value("Enabled")),
            enum_attribute("firewall_allow_azure_ips", FIREWALL_ALLOW_AZURE_IPS).default(string_value("Enabled")),
            Attribute::computed("endpoint", AttrType::String),
            common::tags(),
        ])
    }

    async fn create(&self, client: &ArmClient, planned: &DynamicValue) -> Result<DynamicValue> {
        let name = get_string_attr(planned, "name");
        let resource_group = get_string_attr(planned, "resource_group_name");
        let id = ResourceId::new(client.subscription_id(), &resource_group)
            .provider("Microsoft.DataLakeStore")
            .child("accounts", &name)
            .to_string();
        info!("Creating Data Lake Store {:?} (Resource Group {:?})", name, resource_group);

        client
            .put(&id, API_VERSION, &expand_create(planned))
            .await
            .with_context(|| format!("Error creating Data Lake Store {:?} (Resource Group {:?})", name, resource_group))?;
        read_back(self, client, planned, id).await
    }

    async fn read(&self, client: &ArmClient, state: &DynamicValue) -> Result<Option<DynamicValue>> {
        let id = parse_id(state)?;
        let name = id.require("accounts")?.to_string();

        let account: Option<Account> = client.get(&id.to_string(), API_VERSION).await.with_context(|| {
            format!(
                "Error making Read request on Azure Data Lake Store {:?} (Resource Group {:?})",
                name, id.resource_group
            )
        })?;
        match account {
            Some(account) => Ok(Some(account_to_state(&id, &name, &account))),
            None => {
                warn!(
                    "Data Lake Store Account {:?} was not found (Resource Group {:?})",
                    name, id.resource_group
                );
                Ok(None)
            }
        }
    }

    async fn update(&self, client: &ArmClient, _prior: &DynamicValue, planned: &DynamicValue) -> Result<DynamicValue> {
        let id = parse_id(planned)?.to_string();
        client
            .patch(&id, API_VERSION, &expand_update(planned))
            .await
            .with_context(|| format!("Error waiting for the update of Data Lake Store {} to complete", id))?;
        read_back(self, client, planned, id).await
    }

    async fn delete(&self, client: &ArmClient, state: &DynamicValue) -> Result<()> {
        let id = parse_id(state)?.to_string();
        info!("Deleting Data Lake Store {}", id);
        client
            .delete(&id, API_VERSION)
            .await
            .with_context(|| format!("Error deleting Data Lake Store {}", id))?;
        Ok(())
    }
}

fn expand_create(planned: &DynamicValue) -> CreateAccount {
    CreateAccount::new(
        normalize_location(&get_string_attr(planned, "location")),
        expand_tags(planned),
        CreateAccountProperties {
            new_tier: get_string_attr(planned, "tier"),
            firewall_state: get_string_attr(planned, "firewall_state"),
            firewall_allow_azure_ips: get_string_attr(planned, "firewall_allow_azure_ips"),
            encryption_state: get_string_attr(planned, "encryption_state"),
            encryption_config: get_optional_string_attr(planned, "encryption_type")
                .map(|config_type| EncryptionConfig { config_type }),
        },
    )
}

fn expand_update(planned: &DynamicValue) -> UpdateAccount {
    UpdateAccount {
        tags: Some(expand_tags(planned)),
        properties: Some(UpdateAccountProperties {
            new_tier: get_string_attr(planned, "tier"),
            firewall_state: get_string_attr(planned, "firewall_state"),
            firewall_allow_azure_ips: get_string_attr(planned, "firewall_allow_azure_ips"),
        }),
        ..Default::default()
    }
}

fn account_to_state(id: &ResourceId, name: &str, account: &Account) -> DynamicValue {
    let props = account.properties.clone().unwrap_or_default();
    make_state(vec![
        ("id", string_value(id.to_string())),
        ("name", string_value(name)),
        ("resource_group_name", string_value(&id.resource_group)),
        ("location", optional_string_value(account.location.as_deref().map(normalize_location))),
        ("tier", optional_string_value(props.current_tier)),
        ("encryption_state", optional_string_value(props.encryption_state)),
        (
            "encryption_type",
            optional_string_value(props.encryption_config.map(|c| c.config_type).filter(|t| !t.is_empty())),
        ),
        ("firewall_state", optional_string_value(props.firewall_state)),
        ("firewall_allow_azure_ips", optional_string_value(props.firewall_allow_azure_ips)),
        ("endpoint", optional_string_value(props.endpoint)),
        ("tags", flatten_tags(account.tags.as_ref())),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn planned() -> DynamicValue {
        make_state(vec![
            ("location", string_value("West Europe")),
            ("tier", string_value("Commitment_1TB")),
            ("encryption_state", string_value("Enabled")),
            ("encryption_type", DynamicValue::Unknown),
            ("firewall_state", string_value("Enabled")),
            ("firewall_allow_azure_ips", string_value("Disabled")),
        ])
    }

    #[test]
    fn test_expand_create() {
        let body = serde_json::to_value(expand_create(&planned())).unwrap();
        assert_eq!(body["location"], "westeurope");
        assert_eq!(body["properties"]["newTier"], "Commitment_1TB");
        assert_eq!(body["properties"]["firewallAllowAzureIps"], "Disabled");
        assert!(body["properties"].get("encryptionConfig").is_none());
    }

    #[test]
    fn test_expand_update_has_no_location() {
        let body = serde_json::to_value(expand_update(&planned())).unwrap();
        assert!(body.get("location").is_none());
        assert_eq!(body["properties"]["newTier"], "Commitment_1TB");
        assert!(body["properties"].get("encryptionState").is_none());
    }

    #[test]
    fn test_account_to_state_uses_current_tier() {
        let id = ResourceId::parse("/subscriptions/s/resourceGroups/rg/providers/Microsoft.DataLakeStore/accounts/unittest1")
            .unwrap();
        let account: Account = serde_json::from_value(serde_json::json!({
            "location": "eastus2",
            "properties": {
                "currentTier": "Consumption",
                "encryptionState": "Enabled",
                "encryptionConfig": {"type": "ServiceManaged"},
                "firewallState": "Disabled",
                "firewallAllowAzureIps": "Enabled",
                "endpoint": "unittest1.azuredatalakestore.net"
            }
        }))
        .unwrap();

        let state = account_to_state(&id, "unittest1", &account);
        assert_eq!(get_string_attr(&state, "tier"), "Consumption");
        assert_eq!(get_string_attr(&state, "encryption_type"), "ServiceManaged");
        assert_eq!(get_string_attr(&state, "endpoint"), "unittest1.azuredatalakestore.net");
    }

    #[test]
    fn test_enum_attributes_are_case_insensitive() {
        let schema = DataLakeStoreResource.schema();
        let diags = schema.validate(&make_state(vec![
            ("name", string_value("unittest1")),
            ("tier", string_value("commitment_1tb")),
            ("firewall_state", string_value("Sometimes")),
        ]));
        assert_eq!(diags.len(), 1);
        assert!(schema.attribute("encryption_type").unwrap().computed);
    }
}
