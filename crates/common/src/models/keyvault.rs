//! Key Vault secrets (data plane)

use reqwest::Method;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::Tags;
use crate::client::{ArmClient, Audience};
use crate::{Error, Result};

pub const API_VERSION: &str = "2016-10-01";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecretSetParameters {
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Tags>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecretUpdateParameters {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Tags>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecretBundle {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub tags: Option<Tags>,
}

/// Secret operations against a vault's base URL (`https://name.vault.azure.net/`)
#[derive(Debug, Clone)]
pub struct KeyVaultClient {
    arm: ArmClient,
}

impl KeyVaultClient {
    pub fn new(arm: ArmClient) -> Self {
        Self { arm }
    }

    fn secret_url(vault_base_url: &str, name: &str, version: &str) -> String {
        let base = vault_base_url.trim_end_matches('/');
        if version.is_empty() {
            format!("{}/secrets/{}?api-version={}", base, name, API_VERSION)
        } else {
            format!("{}/secrets/{}/{}?api-version={}", base, name, version, API_VERSION)
        }
    }

    /// Write a new version of the secret
    pub async fn set_secret(
        &self,
        vault_base_url: &str,
        name: &str,
        parameters: &SecretSetParameters,
    ) -> Result<SecretBundle> {
        let url = Self::secret_url(vault_base_url, name, "");
        self.arm
            .send_url(Method::PUT, &url, Audience::KeyVault, Some(serde_json::to_value(parameters)?))
            .await
    }

    /// Fetch a secret; an empty version means the latest one
    pub async fn get_secret(
        &self,
        vault_base_url: &str,
        name: &str,
        version: &str,
    ) -> Result<Option<SecretBundle>> {
        let url = Self::secret_url(vault_base_url, name, version);
        self.arm.get_url(&url, Audience::KeyVault).await
    }

    /// Change attributes of an existing version without touching its value
    pub async fn update_secret(
        &self,
        vault_base_url: &str,
        name: &str,
        version: &str,
        parameters: &SecretUpdateParameters,
    ) -> Result<SecretBundle> {
        let url = Self::secret_url(vault_base_url, name, version);
        self.arm
            .send_url(Method::PATCH, &url, Audience::KeyVault, Some(serde_json::to_value(parameters)?))
            .await
    }

    /// Delete every version of the secret. Returns `false` if it was already gone.
    pub async fn delete_secret(&self, vault_base_url: &str, name: &str) -> Result<bool> {
        let url = Self::secret_url(vault_base_url, name, "");
        match self
            .arm
            .send_url::<serde_json::Value>(Method::DELETE, &url, Audience::KeyVault, None)
            .await
        {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => {
                debug!("Secret {} already deleted from {}", name, vault_base_url);
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }
}

impl SecretBundle {
    /// The versioned secret URL, which doubles as the resource id
    pub fn require_id(&self) -> Result<&str> {
        self.id
            .as_deref()
            .ok_or_else(|| Error::Internal("Key Vault returned a secret without an id".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_url() {
        assert_eq!(
            KeyVaultClient::secret_url("https://vault.vault.azure.net/", "db", ""),
            "https://vault.vault.azure.net/secrets/db?api-version=2016-10-01"
        );
        assert_eq!(
            KeyVaultClient::secret_url("https://vault.vault.azure.net", "db", "abc"),
            "https://vault.vault.azure.net/secrets/db/abc?api-version=2016-10-01"
        );
    }

    #[test]
    fn test_update_parameters_skip_unset() {
        let json = serde_json::to_value(SecretUpdateParameters {
            content_type: Some("text/plain".to_string()),
            tags: None,
        })
        .unwrap();
        assert_eq!(json, serde_json::json!({"contentType": "text/plain"}));
    }
}
