//! Azure cloud environments
//!
//! Endpoints and token audiences for each sovereign cloud.

use crate::{Error, Result};

/// Endpoints of one Azure cloud
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Environment {
    pub name: String,
    /// Base URL of Azure Resource Manager, always with a trailing slash
    pub resource_manager_endpoint: String,
    /// Azure Active Directory authority, always with a trailing slash
    pub active_directory_endpoint: String,
    /// Token audience for Resource Manager calls
    pub token_audience: String,
    /// Token audience for the Key Vault data plane
    pub key_vault_audience: String,
    pub key_vault_dns_suffix: String,
    pub storage_endpoint_suffix: String,
}

impl Environment {
    pub fn public() -> Self {
        Self {
            name: "public".to_string(),
            resource_manager_endpoint: "https://management.azure.com/".to_string(),
            active_directory_endpoint: "https://login.microsoftonline.com/".to_string(),
            token_audience: "https://management.core.windows.net/".to_string(),
            key_vault_audience: "https://vault.azure.net".to_string(),
            key_vault_dns_suffix: "vault.azure.net".to_string(),
            storage_endpoint_suffix: "core.windows.net".to_string(),
        }
    }

    pub fn us_government() -> Self {
        Self {
            name: "usgovernment".to_string(),
            resource_manager_endpoint: "https://management.usgovcloudapi.net/".to_string(),
            active_directory_endpoint: "https://login.microsoftonline.us/".to_string(),
            token_audience: "https://management.core.usgovcloudapi.net/".to_string(),
            key_vault_audience: "https://vault.usgovcloudapi.net".to_string(),
            key_vault_dns_suffix: "vault.usgovcloudapi.net".to_string(),
            storage_endpoint_suffix: "core.usgovcloudapi.net".to_string(),
        }
    }

    pub fn china() -> Self {
        Self {
            name: "china".to_string(),
            resource_manager_endpoint: "https://management.chinacloudapi.cn/".to_string(),
            active_directory_endpoint: "https://login.chinacloudapi.cn/".to_string(),
            token_audience: "https://management.core.chinacloudapi.cn/".to_string(),
            key_vault_audience: "https://vault.azure.cn".to_string(),
            key_vault_dns_suffix: "vault.azure.cn".to_string(),
            storage_endpoint_suffix: "core.chinacloudapi.cn".to_string(),
        }
    }

    pub fn german() -> Self {
        Self {
            name: "german".to_string(),
            resource_manager_endpoint: "https://management.microsoftazure.de/".to_string(),
            active_directory_endpoint: "https://login.microsoftonline.de/".to_string(),
            token_audience: "https://management.core.cloudapi.de/".to_string(),
            key_vault_audience: "https://vault.microsoftazure.de".to_string(),
            key_vault_dns_suffix: "vault.microsoftazure.de".to_string(),
            storage_endpoint_suffix: "core.cloudapi.de".to_string(),
        }
    }

    /// Look up an environment by the name used in provider configuration
    pub fn from_name(name: &str) -> Result<Self> {
        match name.trim().to_lowercase().as_str() {
            "" | "public" => Ok(Self::public()),
            "usgovernment" => Ok(Self::us_government()),
            "china" => Ok(Self::china()),
            "german" => Ok(Self::german()),
            other => Err(Error::InvalidConfig(format!(
                "unknown environment {:?}: expected one of public, usgovernment, china, german",
                other
            ))),
        }
    }

    /// An environment whose Resource Manager lives at an arbitrary URL
    pub fn custom(resource_manager_endpoint: &str) -> Self {
        let mut endpoint = resource_manager_endpoint.to_string();
        if !endpoint.ends_with('/') {
            endpoint.push('/');
        }
        Self {
            name: "custom".to_string(),
            resource_manager_endpoint: endpoint.clone(),
            active_directory_endpoint: endpoint,
            ..Self::public()
        }
    }

    /// Names accepted by [`Environment::from_name`]
    pub fn names() -> &'static [&'static str] {
        &["public", "usgovernment", "china", "german"]
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::public()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_name() {
        assert_eq!(Environment::from_name("").unwrap(), Environment::public());
        assert_eq!(Environment::from_name("Public").unwrap(), Environment::public());
        assert_eq!(
            Environment::from_name("USGovernment").unwrap().resource_manager_endpoint,
            "https://management.usgovcloudapi.net/"
        );
        assert!(Environment::from_name("mars").is_err());
    }

    #[test]
    fn test_custom_adds_trailing_slash() {
        let env = Environment::custom("http://127.0.0.1:8080");
        assert_eq!(env.resource_manager_endpoint, "http://127.0.0.1:8080/");
        assert_eq!(env.key_vault_audience, "https://vault.azure.net");
    }
}
