//! Key Vault Secret Resource handler for Terraform
//!
//! Secrets live on the vault's data plane. The resource id is the versioned
//! secret URL; a new value writes a new version and moves the id along.

use anyhow::{Context, Result};
use azurerm_common::models::keyvault::{SecretBundle, SecretSetParameters, SecretUpdateParameters};
use azurerm_common::{ArmClient, KeyVaultChildId, KeyVaultClient};
use tracing::info;

use super::common::{self, expand_tags, flatten_tags};
use super::Resource;
use crate::schema::{AttrType, Attribute, Block};
use crate::state::{
    get_optional_string_attr, get_string_attr, make_state, optional_string_value, string_value, DynamicValue,
};
use crate::validate;

pub struct KeyVaultSecretResource;

#[async_trait::async_trait]
impl Resource for KeyVaultSecretResource {
    fn type_name(&self) -> &'static str {
        "azurerm_key_vault_secret"
    }

    fn schema(&self) -> Block {
        Block::new(vec![
            common::id(),
            Attribute::required("name", AttrType::String)
                .force_new()
                .validate(validate::key_vault_child_name()),
            Attribute::required("vault_uri", AttrType::String).force_new(),
            Attribute::required("value", AttrType::String).sensitive(),
            Attribute::optional("content_type", AttrType::String),
            Attribute::computed("version", AttrType::String),
            common::tags(),
        ])
    }

    fn validate_import_id(&self, id: &str) -> Result<()> {
        KeyVaultChildId::parse(id)?;
        Ok(())
    }

    fn customize_plan(&self, prior: &DynamicValue, planned: &mut DynamicValue, _replace: &mut Vec<String>) {
        if prior.get("value") != planned.get("value") {
            planned.set("id", DynamicValue::Unknown);
            planned.set("version", DynamicValue::Unknown);
        }
    }

    async fn create(&self, client: &ArmClient, planned: &DynamicValue) -> Result<DynamicValue> {
        let name = get_string_attr(planned, "name");
        let vault = get_string_attr(planned, "vault_uri");
        info!("Creating KeyVault Secret {:?} in {}", name, vault);

        let id = set_new_version(client, &vault, &name, planned)
            .await
            .with_context(|| format!("Error creating KeyVault Secret {:?} (in key vault {:?})", name, vault))?;
        common::read_back(self, client, planned, id).await
    }

    async fn read(&self, client: &ArmClient, state: &DynamicValue) -> Result<Option<DynamicValue>> {
        let id = KeyVaultChildId::parse(&get_string_attr(state, "id"))?;

        let secret = KeyVaultClient::new(client.clone())
            .get_secret(&id.key_vault_base_url, &id.name, "")
            .await
            .with_context(|| format!("Error making Read request on Azure KeyVault Secret {}", id.name))?;
        match secret {
            Some(secret) => Ok(Some(secret_to_state(&secret)?)),
            None => Ok(None),
        }
    }

    async fn update(&self, client: &ArmClient, prior: &DynamicValue, planned: &DynamicValue) -> Result<DynamicValue> {
        let id = KeyVaultChildId::parse(&get_string_attr(prior, "id"))?;

        let new_id = if prior.get("value") != planned.get("value") {
            info!("Writing a new version of KeyVault Secret {:?}", id.name);
            set_new_version(client, &id.key_vault_base_url, &id.name, planned)
                .await
                .with_context(|| format!("Error updating KeyVault Secret {:?}", id.name))?
        } else {
            let parameters = SecretUpdateParameters {
                content_type: Some(get_string_attr(planned, "content_type")),
                tags: Some(expand_tags(planned)),
            };
            KeyVaultClient::new(client.clone())
                .update_secret(&id.key_vault_base_url, &id.name, &id.version, &parameters)
                .await
                .with_context(|| format!("Error updating KeyVault Secret {:?}", id.name))?;
            get_string_attr(prior, "id")
        };

        common::read_back(self, client, planned, new_id).await
    }

    async fn delete(&self, client: &ArmClient, state: &DynamicValue) -> Result<()> {
        let id = KeyVaultChildId::parse(&get_string_attr(state, "id"))?;
        info!("Deleting KeyVault Secret {:?} from {}", id.name, id.key_vault_base_url);
        KeyVaultClient::new(client.clone())
            .delete_secret(&id.key_vault_base_url, &id.name)
            .await
            .with_context(|| format!("Error deleting KeyVault Secret {:?}", id.name))?;
        Ok(())
    }
}

/// Write the value as a new version and return the id of the latest version
async fn set_new_version(client: &ArmClient, vault: &str, name: &str, planned: &DynamicValue) -> Result<String> {
    let vault_client = KeyVaultClient::new(client.clone());
    vault_client.set_secret(vault, name, &expand_set_parameters(planned)).await?;

    // An empty version is the latest one
    let latest = vault_client
        .get_secret(vault, name, "")
        .await?
        .with_context(|| format!("Cannot read KeyVault Secret {:?} (in key vault {:?})", name, vault))?;
    Ok(latest.require_id()?.to_string())
}

fn expand_set_parameters(planned: &DynamicValue) -> SecretSetParameters {
    SecretSetParameters {
        value: get_string_attr(planned, "value"),
        content_type: get_optional_string_attr(planned, "content_type"),
        tags: Some(expand_tags(planned)),
    }
}

fn secret_to_state(secret: &SecretBundle) -> Result<DynamicValue> {
    let raw_id = secret.require_id()?;
    let id = KeyVaultChildId::parse(raw_id)?;
    Ok(make_state(vec![
        ("id", string_value(raw_id)),
        ("name", string_value(id.name)),
        ("vault_uri", string_value(id.key_vault_base_url)),
        ("value", optional_string_value(secret.value.clone())),
        ("content_type", optional_string_value(secret.content_type.clone().filter(|c| !c.is_empty()))),
        ("version", string_value(id.version)),
        ("tags", flatten_tags(secret.tags.as_ref())),
    ]))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET_ID: &str = "https://acctestkv.vault.azure.net/secrets/secret-1/4d5a4c0c6b2e4b5ca1b0f0b8d6b6a5c3";

    #[test]
    fn test_secret_to_state() {
        let secret = SecretBundle {
            id: Some(SECRET_ID.to_string()),
            value: Some("rick-and-morty".to_string()),
            content_type: Some(String::new()),
            tags: None,
        };
        let state = secret_to_state(&secret).unwrap();
        assert_eq!(get_string_attr(&state, "vault_uri"), "https://acctestkv.vault.azure.net/");
        assert_eq!(get_string_attr(&state, "name"), "secret-1");
        assert_eq!(get_string_attr(&state, "version"), "4d5a4c0c6b2e4b5ca1b0f0b8d6b6a5c3");
        assert!(state.get("content_type").unwrap().is_null());
    }

    #[test]
    fn test_secret_without_id_is_an_error() {
        assert!(secret_to_state(&SecretBundle::default()).is_err());
    }

    #[test]
    fn test_new_value_plans_new_version() {
        let prior = make_state(vec![
            ("id", string_value(SECRET_ID)),
            ("value", string_value("old")),
            ("version", string_value("4d5a4c0c6b2e4b5ca1b0f0b8d6b6a5c3")),
        ]);

        let mut planned = prior.clone();
        planned.set("value", string_value("new"));
        KeyVaultSecretResource.customize_plan(&prior, &mut planned, &mut Vec::new());
        assert!(planned.get("id").unwrap().is_unknown());
        assert!(planned.get("version").unwrap().is_unknown());

        let mut unchanged = prior.clone();
        unchanged.set("content_type", string_value("text/plain"));
        KeyVaultSecretResource.customize_plan(&prior, &mut unchanged, &mut Vec::new());
        assert_eq!(get_string_attr(&unchanged, "id"), SECRET_ID);
    }

    #[test]
    fn test_import_takes_secret_urls() {
        assert!(KeyVaultSecretResource.validate_import_id(SECRET_ID).is_ok());
        assert!(KeyVaultSecretResource
            .validate_import_id("/subscriptions/s/resourceGroups/rg")
            .is_err());
    }
}
