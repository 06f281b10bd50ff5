//! Storage account SAS token data source
//!
//! Computed locally from the account key in the connection string; no
//! request reaches Azure.

use anyhow::{Context, Result};
use azurerm_common::sas::{compute_account_sas, parse_connection_string, SIGNED_VERSION};
use azurerm_common::ArmClient;
use sha2::{Digest, Sha256};

use super::DataSource;
use crate::schema::{AttrType, Attribute, Block, NestedBlock};
use crate::state::{get_block, get_bool_attr, get_string_attr, string_value, DynamicValue};
use crate::validate;

const SERVICES: &[(&str, char)] = &[("blob", 'b'), ("queue", 'q'), ("table", 't'), ("file", 'f')];

const PERMISSIONS: &[(&str, char)] = &[
    ("read", 'r'),
    ("write", 'w'),
    ("delete", 'd'),
    ("list", 'l'),
    ("add", 'a'),
    ("create", 'c'),
    ("update", 'u'),
    ("process", 'p'),
];

pub struct StorageAccountSasDataSource;

fn flags_block(name: &'static str, flags: &[(&'static str, char)]) -> NestedBlock {
    let attributes = flags
        .iter()
        .map(|(flag, _)| Attribute::required(*flag, AttrType::Bool))
        .collect();
    NestedBlock::list(name, Block::new(attributes)).min_items(1).max_items(1)
}

#[async_trait::async_trait]
impl DataSource for StorageAccountSasDataSource {
    fn type_name(&self) -> &'static str {
        "azurerm_storage_account_sas"
    }

    fn schema(&self) -> Block {
        Block::new(vec![
            Attribute::computed("id", AttrType::String),
            Attribute::required("connection_string", AttrType::String).sensitive(),
            Attribute::optional("https_only", AttrType::Bool).default(DynamicValue::Bool(true)),
            Attribute::required("resource_types", AttrType::String).validate(validate::storage_sas_resource_types()),
            Attribute::required("start", AttrType::String).validate(validate::rfc3339_date()),
            Attribute::required("expiry", AttrType::String).validate(validate::rfc3339_date()),
            Attribute::computed("sas", AttrType::String).sensitive(),
        ])
        .with_blocks(vec![flags_block("services", SERVICES), flags_block("permissions", PERMISSIONS)])
    }

    async fn read(&self, _client: &ArmClient, config: &DynamicValue) -> Result<DynamicValue> {
        sas_state(config)
    }
}

/// Letters of the enabled flags, in signing order
fn flag_string(block: Option<&DynamicValue>, flags: &[(&str, char)]) -> String {
    let Some(block) = block else {
        return String::new();
    };
    flags
        .iter()
        .filter(|(name, _)| get_bool_attr(block, name, false))
        .map(|(_, letter)| *letter)
        .collect()
}

fn sas_state(config: &DynamicValue) -> Result<DynamicValue> {
    let connection = parse_connection_string(&get_string_attr(config, "connection_string"));
    let account_name = connection
        .get("AccountName")
        .context("connection_string is missing AccountName")?;
    let account_key = connection
        .get("AccountKey")
        .context("connection_string is missing AccountKey")?;

    // Unset means the default, HTTPS only
    let signed_protocol = if get_bool_attr(config, "https_only", true) {
        "https"
    } else {
        "https,http"
    };

    let token = compute_account_sas(
        account_name,
        account_key,
        &flag_string(get_block(config, "permissions"), PERMISSIONS),
        &flag_string(get_block(config, "services"), SERVICES),
        &get_string_attr(config, "resource_types"),
        &get_string_attr(config, "start"),
        &get_string_attr(config, "expiry"),
        signed_protocol,
        "",
        SIGNED_VERSION,
    )
    .context("Error computing storage account SAS")?;

    let mut state = config.clone();
    state.set("https_only", DynamicValue::Bool(signed_protocol == "https"));
    state.set("id", string_value(hex::encode(Sha256::digest(token.as_bytes()))));
    state.set("sas", string_value(token));
    Ok(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{bool_value, list_value, make_state};

    const CONNECTION_STRING: &str = "DefaultEndpointsProtocol=https;AccountName=azurermtestsa0;AccountKey=T0ZQouXBDpWud/PlTRHIJH2+VUK8D+fnedEynb9Mx638IYnsMUe4mv1fFjC7t0NayTfFAQJzPZuV1WHFKOzGdg==;EndpointSuffix=core.windows.net";

    fn flags(all: &[(&str, char)], enabled: &str) -> DynamicValue {
        list_value(vec![make_state(
            all.iter()
                .map(|(name, letter)| (*name, bool_value(enabled.contains(*letter))))
                .collect(),
        )])
    }

    fn config() -> DynamicValue {
        make_state(vec![
            ("id", DynamicValue::Null),
            ("connection_string", string_value(CONNECTION_STRING)),
            ("https_only", DynamicValue::Null),
            ("resource_types", string_value("c")),
            ("start", string_value("2018-03-20T04:00:00Z")),
            ("expiry", string_value("2020-03-20T04:00:00Z")),
            ("sas", DynamicValue::Null),
            ("services", flags(SERVICES, "b")),
            ("permissions", flags(PERMISSIONS, "rwac")),
        ])
    }

    #[test]
    fn test_sas_matches_known_token() {
        let state = sas_state(&config()).unwrap();
        let expected = "?sv=2017-07-29&ss=b&srt=c&sp=rwac&se=2020-03-20T04:00:00Z&st=2018-03-20T04:00:00Z&spr=https&sig=SQigK%2FnFA4pv0F0oMLqr6DxUWV4vtFqWi6q3Mf7o9nY%3D";
        assert_eq!(get_string_attr(&state, "sas"), expected);
        assert_eq!(
            get_string_attr(&state, "id"),
            hex::encode(Sha256::digest(expected.as_bytes()))
        );
        assert!(get_bool_attr(&state, "https_only", false));
    }

    #[test]
    fn test_http_allowed() {
        let mut config = config();
        config.set("https_only", bool_value(false));
        let sas = get_string_attr(&sas_state(&config).unwrap(), "sas");
        assert!(sas.contains("&spr=https,http&"));
    }

    #[test]
    fn test_flag_order() {
        let all = flags(PERMISSIONS, "pucaldwr");
        assert_eq!(flag_string(all.as_list().and_then(|l| l.first()), PERMISSIONS), "rwdlacup");
        assert_eq!(flag_string(None, SERVICES), "");
    }

    #[test]
    fn test_missing_account_key() {
        let mut config = config();
        config.set("connection_string", string_value("AccountName=azurermtestsa0"));
        let err = sas_state(&config).unwrap_err();
        assert!(err.to_string().contains("AccountKey"));
    }
}
