//! Schema fragments and helpers shared by resources and data sources

use anyhow::{anyhow, Result};
use azurerm_common::models::Tags;
use azurerm_common::{ArmClient, ResourceId};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::schema::{AttrType, Attribute, Suppress};
use crate::state::{get_string_attr, get_string_map_attr, string_map_value, string_value, DynamicValue};
use crate::validate;

use super::Resource;

static RESOURCE_GROUP_NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[-\w\._\(\)]+$").unwrap());

pub fn id() -> Attribute {
    Attribute::computed("id", AttrType::String)
}

pub fn location() -> Attribute {
    Attribute::required("location", AttrType::String)
        .force_new()
        .suppress(Suppress::Location)
}

pub fn location_for_data_source() -> Attribute {
    Attribute::computed("location", AttrType::String)
}

pub fn resource_group_name() -> Attribute {
    Attribute::required("resource_group_name", AttrType::String)
        .force_new()
        .suppress(Suppress::CaseInsensitive)
        .validate(validate::string_length(90))
        .validate(validate::string_match(
            &RESOURCE_GROUP_NAME,
            "may only contain alphanumeric characters, dash, underscores, parentheses and periods",
        ))
}

pub fn resource_group_name_for_data_source() -> Attribute {
    Attribute::required("resource_group_name", AttrType::String)
}

pub fn tags() -> Attribute {
    Attribute::optional_computed("tags", AttrType::map_of(AttrType::String)).validate(validate::tags())
}

pub fn tags_for_data_source() -> Attribute {
    Attribute::computed("tags", AttrType::map_of(AttrType::String))
}

pub fn expand_tags(value: &DynamicValue) -> Tags {
    get_string_map_attr(value, "tags")
}

pub fn flatten_tags(tags: Option<&Tags>) -> DynamicValue {
    string_map_value(&tags.cloned().unwrap_or_default())
}

/// Parse the `id` attribute of a state
pub fn parse_id(state: &DynamicValue) -> Result<ResourceId> {
    Ok(ResourceId::parse(&get_string_attr(state, "id"))?)
}

/// Id returned by the service after a write, required to track the resource
pub fn require_id(id: Option<String>, what: &str) -> Result<String> {
    id.filter(|i| !i.is_empty())
        .ok_or_else(|| anyhow!("Cannot read {} ID", what))
}

/// Read a resource back after a write, starting from the planned values
pub async fn read_back<R>(resource: &R, client: &ArmClient, planned: &DynamicValue, id: String) -> Result<DynamicValue>
where
    R: Resource + ?Sized,
{
    let mut state = planned.clone();
    state.set("id", string_value(id.clone()));
    resource
        .read(client, &state)
        .await?
        .ok_or_else(|| anyhow!("{} {:?} was not found after it was written", resource.type_name(), id))
}

/// Validators for one-of string attributes, usually case-insensitive
pub fn one_of(values: &'static [&'static str]) -> crate::schema::ValidateFn {
    validate::string_in_slice(values, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::make_state;
    use std::collections::BTreeMap;

    #[test]
    fn test_tags_round_trip() {
        let tags = BTreeMap::from([("environment".to_string(), "Production".to_string())]);
        let state = make_state(vec![("tags", flatten_tags(Some(&tags)))]);
        assert_eq!(expand_tags(&state), tags);
        assert_eq!(flatten_tags(None), DynamicValue::Map(BTreeMap::new()));
    }

    #[test]
    fn test_require_id() {
        assert!(require_id(None, "Resource Group").is_err());
        assert!(require_id(Some(String::new()), "Resource Group").is_err());
        assert_eq!(require_id(Some("/x".to_string()), "Resource Group").unwrap(), "/x");
    }

    #[test]
    fn test_resource_group_name_validation() {
        let attr = resource_group_name();
        let run = |v: &str| -> usize {
            attr.validate.iter().map(|f| f(&string_value(v), "resource_group_name").len()).sum()
        };
        assert_eq!(run("acctestRG-01_(a).b"), 0);
        assert_eq!(run("bad/name"), 1);
        assert_eq!(run(&"a".repeat(91)), 1);
    }
}
