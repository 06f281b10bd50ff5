//! Parsing and building Azure resource identifiers

use std::fmt;

use crate::{Error, Result};

/// A Resource Manager identifier such as
/// `/subscriptions/{sub}/resourceGroups/{rg}/providers/{ns}/{type}/{name}`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceId {
    pub subscription_id: String,
    pub resource_group: String,
    pub provider: String,
    /// Remaining `type/name` pairs in order of appearance
    pub path: Vec<(String, String)>,
}

impl ResourceId {
    /// Start building an id scoped to a resource group
    pub fn new(subscription_id: impl Into<String>, resource_group: impl Into<String>) -> Self {
        Self {
            subscription_id: subscription_id.into(),
            resource_group: resource_group.into(),
            provider: String::new(),
            path: Vec::new(),
        }
    }

    pub fn provider(mut self, namespace: impl Into<String>) -> Self {
        self.provider = namespace.into();
        self
    }

    pub fn child(mut self, kind: impl Into<String>, name: impl Into<String>) -> Self {
        self.path.push((kind.into(), name.into()));
        self
    }

    /// Parse an id, requiring key/value pairs and a subscription
    pub fn parse(id: &str) -> Result<Self> {
        if id.is_empty() {
            return Err(Error::InvalidResourceId("id is empty".to_string()));
        }
        if !id.starts_with('/') {
            return Err(Error::InvalidResourceId(format!(
                "{:?} does not start with a slash",
                id
            )));
        }

        let components: Vec<&str> = id.trim_matches('/').split('/').collect();
        if components.len() % 2 != 0 {
            return Err(Error::InvalidResourceId(format!(
                "{:?} has an odd number of path components",
                id
            )));
        }

        let mut subscription_id = None;
        let mut resource_group = String::new();
        let mut provider = String::new();
        let mut path = Vec::new();

        for pair in components.chunks(2) {
            let (key, value) = (pair[0], pair[1]);
            if key.is_empty() || value.is_empty() {
                return Err(Error::InvalidResourceId(format!(
                    "{:?} contains an empty path component",
                    id
                )));
            }

            if key.eq_ignore_ascii_case("subscriptions") && subscription_id.is_none() {
                subscription_id = Some(value.to_string());
            } else if key.eq_ignore_ascii_case("resourceGroups") && resource_group.is_empty() {
                resource_group = value.to_string();
            } else if key.eq_ignore_ascii_case("providers") && provider.is_empty() {
                provider = value.to_string();
            } else {
                path.push((key.to_string(), value.to_string()));
            }
        }

        let subscription_id = subscription_id.ok_or_else(|| {
            Error::InvalidResourceId(format!("no subscription id found in {:?}", id))
        })?;

        Ok(Self {
            subscription_id,
            resource_group,
            provider,
            path,
        })
    }

    /// Value following `key` in the path
    pub fn get(&self, key: &str) -> Option<&str> {
        self.path
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Like [`ResourceId::get`] but an error naming the key when absent
    pub fn require(&self, key: &str) -> Result<&str> {
        self.get(key).ok_or_else(|| {
            Error::InvalidResourceId(format!("{:?} segment missing from {}", key, self))
        })
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/subscriptions/{}", self.subscription_id)?;
        if !self.resource_group.is_empty() {
            write!(f, "/resourceGroups/{}", self.resource_group)?;
        }
        if !self.provider.is_empty() {
            write!(f, "/providers/{}", self.provider)?;
        }
        for (kind, name) in &self.path {
            write!(f, "/{}/{}", kind, name)?;
        }
        Ok(())
    }
}

/// Identifier of a Key Vault object such as
/// `https://myvault.vault.azure.net/secrets/name/version`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyVaultChildId {
    /// Vault URL with a trailing slash
    pub key_vault_base_url: String,
    pub collection: String,
    pub name: String,
    /// Empty when the id is not versioned
    pub version: String,
}

impl KeyVaultChildId {
    pub fn parse(id: &str) -> Result<Self> {
        let url = url::Url::parse(id)
            .map_err(|e| Error::InvalidResourceId(format!("{:?} is not a URL: {}", id, e)))?;

        let host = url
            .host_str()
            .ok_or_else(|| Error::InvalidResourceId(format!("{:?} has no host", id)))?;
        let key_vault_base_url = match url.port() {
            Some(port) => format!("{}://{}:{}/", url.scheme(), host, port),
            None => format!("{}://{}/", url.scheme(), host),
        };

        let segments: Vec<&str> = url
            .path()
            .trim_matches('/')
            .split('/')
            .filter(|s| !s.is_empty())
            .collect();

        let (collection, name, version) = match segments.as_slice() {
            [collection, name] => (*collection, *name, ""),
            [collection, name, version] => (*collection, *name, *version),
            _ => {
                return Err(Error::InvalidResourceId(format!(
                    "Key Vault id {:?} should have 2 or 3 path segments, got {}",
                    id,
                    segments.len()
                )))
            }
        };

        Ok(Self {
            key_vault_base_url,
            collection: collection.to_string(),
            name: name.to_string(),
            version: version.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_nested_resource() {
        let id = ResourceId::parse(
            "/subscriptions/11111111-1111-1111-1111-111111111111/resourceGroups/acctestRG/providers/Microsoft.Automation/automationAccounts/acct/schedules/nightly",
        )
        .unwrap();
        assert_eq!(id.subscription_id, "11111111-1111-1111-1111-111111111111");
        assert_eq!(id.resource_group, "acctestRG");
        assert_eq!(id.provider, "Microsoft.Automation");
        assert_eq!(id.get("automationAccounts"), Some("acct"));
        assert_eq!(id.get("schedules"), Some("nightly"));
        assert!(id.require("sites").is_err());
    }

    #[test]
    fn test_resource_group_key_is_case_insensitive() {
        let id = ResourceId::parse("/subscriptions/s/resourcegroups/rg/providers/Microsoft.Sql/servers/db1")
            .unwrap();
        assert_eq!(id.resource_group, "rg");
        assert_eq!(id.get("servers"), Some("db1"));
    }

    #[test]
    fn test_parse_rejects_malformed_ids() {
        assert!(ResourceId::parse("").is_err());
        assert!(ResourceId::parse("subscriptions/s").is_err());
        assert!(ResourceId::parse("/subscriptions/s/resourceGroups").is_err());
        assert!(ResourceId::parse("/resourceGroups/rg").is_err());
    }

    #[test]
    fn test_builder_round_trip() {
        let id = ResourceId::new("sub", "rg")
            .provider("Microsoft.Network")
            .child("dnszones", "example.com")
            .child("AAAA", "www");
        let rendered = id.to_string();
        assert_eq!(
            rendered,
            "/subscriptions/sub/resourceGroups/rg/providers/Microsoft.Network/dnszones/example.com/AAAA/www"
        );
        assert_eq!(ResourceId::parse(&rendered).unwrap(), id);
    }

    #[test]
    fn test_key_vault_child_id() {
        let id = KeyVaultChildId::parse("https://myvault.vault.azure.net/secrets/db-password/abc123").unwrap();
        assert_eq!(id.key_vault_base_url, "https://myvault.vault.azure.net/");
        assert_eq!(id.collection, "secrets");
        assert_eq!(id.name, "db-password");
        assert_eq!(id.version, "abc123");

        let unversioned = KeyVaultChildId::parse("https://myvault.vault.azure.net/secrets/db-password").unwrap();
        assert_eq!(unversioned.version, "");

        assert!(KeyVaultChildId::parse("https://myvault.vault.azure.net/secrets").is_err());
        assert!(KeyVaultChildId::parse("not a url").is_err());
    }
}
