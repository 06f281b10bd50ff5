//! Cosmos DB Account Resource handler for Terraform
//!
//! Account keys come from separate POST endpoints. A failure to list them is
//! logged and the keys already held in state are kept.

use std::collections::HashSet;

use anyhow::{anyhow, Context, Result};
use azurerm_common::models::cosmos::{
    ConsistencyPolicy, DatabaseAccount, DatabaseAccountCreateUpdate, DatabaseAccountCreateUpdateProperties,
    FailoverPolicy, ListKeysResult, ListReadOnlyKeysResult, Location, API_VERSION, CONSISTENCY_LEVELS, OFFER_TYPES,
};
use azurerm_common::{normalize_location, ArmClient, ResourceId};
use tracing::{info, warn};

use super::common::{self, expand_tags, flatten_tags, parse_id, read_back};
use super::Resource;
use crate::schema::{AttrType, Attribute, Block, NestedBlock, Suppress};
use crate::state::{
    get_block, get_list_attr, get_optional_int_attr, get_string_attr, int_value,
    list_value, make_state, optional_string_value, string_value, DynamicValue,
};
use crate::validate;

/// Failover priority of the write region
const WRITE_PRIORITY: i64 = 0;

const KEY_ATTRIBUTES: &[&str] = &[
    "primary_master_key",
    "secondary_master_key",
    "primary_readonly_master_key",
    "secondary_readonly_master_key",
];

pub struct CosmosDbResource;

#[async_trait::async_trait]
impl Resource for CosmosDbResource {
    fn type_name(&self) -> &'static str {
        "azurerm_cosmos_db"
    }

    fn schema(&self) -> Block {
        Block::new(vec![
            common::id(),
            Attribute::required("name", AttrType::String)
                .force_new()
                .validate(validate::cosmos_db_name()),
            common::resource_group_name(),
            common::location(),
            Attribute::required("offer_type", AttrType::String)
                .validate(common::one_of(OFFER_TYPES))
                .suppress(Suppress::CaseInsensitive),
            Attribute::optional("ip_range_filter", AttrType::String),
            Attribute::computed("primary_master_key", AttrType::String).sensitive(),
            Attribute::computed("secondary_master_key", AttrType::String).sensitive(),
            Attribute::computed("primary_readonly_master_key", AttrType::String).sensitive(),
            Attribute::computed("secondary_readonly_master_key", AttrType::String).sensitive(),
            common::tags(),
        ])
        .with_blocks(vec![
            NestedBlock::set(
                "consistency_policy",
                Block::new(vec![
                    Attribute::required("consistency_level", AttrType::String)
                        .validate(common::one_of(CONSISTENCY_LEVELS))
                        .suppress(Suppress::CaseInsensitive),
                    Attribute::optional_computed("max_interval_in_seconds", AttrType::Number),
                    Attribute::optional_computed("max_staleness_prefix", AttrType::Number),
                ]),
            )
            .min_items(1)
            .max_items(1),
            NestedBlock::set(
                "failover_policy",
                Block::new(vec![
                    Attribute::optional_computed("id", AttrType::String),
                    Attribute::required("location", AttrType::String).suppress(Suppress::Location),
                    Attribute::required("priority", AttrType::Number),
                ]),
            )
            .min_items(1),
        ])
    }

    fn validate_plan(&self, config: &DynamicValue) -> Vec<String> {
        let priorities: Option<Vec<i64>> = get_list_attr(config, "failover_policy")
            .iter()
            .map(|p| get_optional_int_attr(p, "priority"))
            .collect();
        match priorities {
            Some(priorities) => check_failover_priorities(&priorities).err().into_iter().collect(),
            None => Vec::new(),
        }
    }

    async fn create(&self, client: &ArmClient, planned: &DynamicValue) -> Result<DynamicValue> {
        let name = get_string_attr(planned, "name");
        let id = ResourceId::new(client.subscription_id(), get_string_attr(planned, "resource_group_name"))
            .provider("Microsoft.DocumentDB")
            .child("databaseAccounts", &name)
            .to_string();
        info!("Creating CosmosDB Account {:?}", name);

        client
            .put(&id, API_VERSION, &expand_account(&name, planned)?)
            .await
            .with_context(|| format!("Error creating CosmosDB Account {:?}", name))?;
        read_back(self, client, planned, id).await
    }

    async fn read(&self, client: &ArmClient, state: &DynamicValue) -> Result<Option<DynamicValue>> {
        let id = parse_id(state)?;
        let name = id.require("databaseAccounts")?.to_string();
        let path = id.to_string();

        let account: Option<DatabaseAccount> = client
            .get(&path, API_VERSION)
            .await
            .with_context(|| format!("Error making Read request on AzureRM CosmosDB {:?}", name))?;
        let Some(account) = account else {
            return Ok(None);
        };

        let prior = state;
        let mut state = account_to_state(&id, &account);
        for key in KEY_ATTRIBUTES {
            if let Some(value) = prior.get(key).filter(|v| !v.is_unknown()) {
                state.set(key, value.clone());
            }
        }

        match client
            .post::<(), ListKeysResult>(&format!("{}/listKeys", path), API_VERSION, None)
            .await
        {
            Ok(keys) => {
                state.set("primary_master_key", optional_string_value(keys.primary_master_key));
                state.set("secondary_master_key", optional_string_value(keys.secondary_master_key));
            }
            Err(e) => warn!("Unable to List Write keys for CosmosDB {}: {}", name, e),
        }

        match client
            .post::<(), ListReadOnlyKeysResult>(&format!("{}/readonlykeys", path), API_VERSION, None)
            .await
        {
            Ok(keys) => {
                state.set(
                    "primary_readonly_master_key",
                    optional_string_value(keys.primary_readonly_master_key),
                );
                state.set(
                    "secondary_readonly_master_key",
                    optional_string_value(keys.secondary_readonly_master_key),
                );
            }
            Err(e) => warn!("Unable to List read-only keys for CosmosDB {}: {}", name, e),
        }

        Ok(Some(state))
    }

    async fn update(&self, client: &ArmClient, _prior: &DynamicValue, planned: &DynamicValue) -> Result<DynamicValue> {
        let id = parse_id(planned)?;
        let name = id.require("databaseAccounts")?.to_string();
        let id = id.to_string();
        client
            .put(&id, API_VERSION, &expand_account(&name, planned)?)
            .await
            .with_context(|| format!("Error updating CosmosDB Account {:?}", name))?;
        read_back(self, client, planned, id).await
    }

    async fn delete(&self, client: &ArmClient, state: &DynamicValue) -> Result<()> {
        let id = parse_id(state)?.to_string();
        info!("Deleting CosmosDB Account {}", id);
        client
            .delete(&id, API_VERSION)
            .await
            .with_context(|| format!("Error issuing AzureRM delete request for CosmosDB instance {}", id))?;
        Ok(())
    }
}

fn expand_account(name: &str, planned: &DynamicValue) -> Result<DatabaseAccountCreateUpdate> {
    let properties = DatabaseAccountCreateUpdateProperties {
        consistency_policy: expand_consistency_policy(planned)?,
        database_account_offer_type: get_string_attr(planned, "offer_type"),
        locations: expand_failover_policies(name, planned)?,
        ip_range_filter: Some(get_string_attr(planned, "ip_range_filter")),
    };
    Ok(DatabaseAccountCreateUpdate::new(
        normalize_location(&get_string_attr(planned, "location")),
        expand_tags(planned),
        properties,
    ))
}

fn expand_consistency_policy(planned: &DynamicValue) -> Result<ConsistencyPolicy> {
    let policy = get_block(planned, "consistency_policy").ok_or_else(|| anyhow!("consistency_policy is required"))?;
    Ok(ConsistencyPolicy {
        default_consistency_level: get_string_attr(policy, "consistency_level"),
        max_staleness_prefix: get_optional_int_attr(policy, "max_staleness_prefix"),
        max_interval_in_seconds: get_optional_int_attr(policy, "max_interval_in_seconds"),
    })
}

fn expand_failover_policies(name: &str, planned: &DynamicValue) -> Result<Vec<Location>> {
    let locations: Vec<Location> = get_list_attr(planned, "failover_policy")
        .iter()
        .map(|p| {
            let location_name = normalize_location(&get_string_attr(p, "location"));
            Location {
                id: format!("{}-{}", name, location_name),
                location_name,
                failover_priority: get_optional_int_attr(p, "priority").unwrap_or_default(),
            }
        })
        .collect();

    let priorities: Vec<i64> = locations.iter().map(|l| l.failover_priority).collect();
    check_failover_priorities(&priorities).map_err(|e| anyhow!(e))?;
    Ok(locations)
}

fn check_failover_priorities(priorities: &[i64]) -> std::result::Result<(), String> {
    let mut seen = HashSet::new();
    if !priorities.iter().all(|p| seen.insert(*p)) {
        return Err("Each CosmosDB Failover Policy needs to be unique".to_string());
    }
    if !priorities.contains(&WRITE_PRIORITY) {
        return Err("CosmosDB Failover Policy should contain a Write Location (Location '0')".to_string());
    }
    Ok(())
}

fn account_to_state(id: &ResourceId, account: &DatabaseAccount) -> DynamicValue {
    let props = account.properties.clone().unwrap_or_default();

    let consistency = props
        .consistency_policy
        .map(|p| {
            vec![make_state(vec![
                ("consistency_level", string_value(p.default_consistency_level)),
                ("max_interval_in_seconds", int_value(p.max_interval_in_seconds.unwrap_or(0))),
                ("max_staleness_prefix", int_value(p.max_staleness_prefix.unwrap_or(0))),
            ])]
        })
        .unwrap_or_default();

    let failover = props.failover_policies.iter().map(failover_policy_to_state).collect();

    make_state(vec![
        ("id", string_value(id.to_string())),
        ("name", string_value(account.name.clone().unwrap_or_default())),
        ("resource_group_name", string_value(&id.resource_group)),
        ("location", optional_string_value(account.location.as_deref().map(normalize_location))),
        ("offer_type", optional_string_value(props.database_account_offer_type)),
        ("ip_range_filter", optional_string_value(props.ip_range_filter)),
        ("consistency_policy", list_value(consistency)),
        ("failover_policy", list_value(failover)),
        ("primary_master_key", DynamicValue::Null),
        ("secondary_master_key", DynamicValue::Null),
        ("primary_readonly_master_key", DynamicValue::Null),
        ("secondary_readonly_master_key", DynamicValue::Null),
        ("tags", flatten_tags(account.tags.as_ref())),
    ])
}

fn failover_policy_to_state(policy: &FailoverPolicy) -> DynamicValue {
    make_state(vec![
        ("id", optional_string_value(policy.id.clone())),
        (
            "location",
            optional_string_value(policy.location_name.as_deref().map(normalize_location)),
        ),
        ("priority", int_value(policy.failover_priority.unwrap_or(0))),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failover(location: &str, priority: i64) -> DynamicValue {
        make_state(vec![
            ("id", DynamicValue::Unknown),
            ("location", string_value(location)),
            ("priority", int_value(priority)),
        ])
    }

    fn planned(policies: Vec<DynamicValue>) -> DynamicValue {
        make_state(vec![
            ("location", string_value("West US")),
            ("offer_type", string_value("Standard")),
            (
                "consistency_policy",
                list_value(vec![make_state(vec![
                    ("consistency_level", string_value("BoundedStaleness")),
                    ("max_interval_in_seconds", int_value(10)),
                    ("max_staleness_prefix", int_value(200)),
                ])]),
            ),
            ("failover_policy", list_value(policies)),
        ])
    }

    #[test]
    fn test_failover_ids_use_normalized_location() {
        let locations = expand_failover_policies(
            "acctest-1",
            &planned(vec![failover("West US", 0), failover("East US 2", 1)]),
        )
        .unwrap();
        assert_eq!(locations[0].id, "acctest-1-westus");
        assert_eq!(locations[1].id, "acctest-1-eastus2");
        assert_eq!(locations[1].failover_priority, 1);
    }

    #[test]
    fn test_failover_priorities_must_be_unique() {
        let err = expand_failover_policies("acc", &planned(vec![failover("westus", 0), failover("eastus", 0)]))
            .unwrap_err();
        assert_eq!(err.to_string(), "Each CosmosDB Failover Policy needs to be unique");
    }

    #[test]
    fn test_failover_requires_write_location() {
        let err = expand_failover_policies("acc", &planned(vec![failover("westus", 1), failover("eastus", 2)]))
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "CosmosDB Failover Policy should contain a Write Location (Location '0')"
        );
    }

    #[test]
    fn test_validate_plan_skips_unknown_priorities() {
        let mut unknown = failover("westus", 0);
        unknown.set("priority", DynamicValue::Unknown);
        assert!(CosmosDbResource.validate_plan(&planned(vec![unknown, failover("eastus", 1)])).is_empty());
        assert_eq!(
            CosmosDbResource
                .validate_plan(&planned(vec![failover("eastus", 1)]))
                .len(),
            1
        );
    }

    #[test]
    fn test_expand_account_body() {
        let body = serde_json::to_value(expand_account("acc", &planned(vec![failover("westus", 0)])).unwrap()).unwrap();
        assert_eq!(body["location"], "westus");
        assert_eq!(body["properties"]["databaseAccountOfferType"], "Standard");
        assert_eq!(
            body["properties"]["consistencyPolicy"],
            serde_json::json!({
                "defaultConsistencyLevel": "BoundedStaleness",
                "maxStalenessPrefix": 200,
                "maxIntervalInSeconds": 10
            })
        );
        assert_eq!(body["properties"]["locations"][0]["locationName"], "westus");
    }

    #[test]
    fn test_account_to_state() {
        let id = ResourceId::parse("/subscriptions/s/resourceGroups/rg/providers/Microsoft.DocumentDB/databaseAccounts/acc")
            .unwrap();
        let account: DatabaseAccount = serde_json::from_value(serde_json::json!({
            "name": "acc",
            "location": "West US",
            "properties": {
                "databaseAccountOfferType": "Standard",
                "consistencyPolicy": {"defaultConsistencyLevel": "Session", "maxIntervalInSeconds": 5, "maxStalenessPrefix": 100},
                "failoverPolicies": [{"id": "acc-westus", "locationName": "West US", "failoverPriority": 0}]
            }
        }))
        .unwrap();

        let state = account_to_state(&id, &account);
        let policy = &get_list_attr(&state, "failover_policy")[0];
        assert_eq!(get_string_attr(policy, "location"), "westus");
        assert_eq!(get_string_attr(policy, "id"), "acc-westus");
        let consistency = get_block(&state, "consistency_policy").unwrap();
        assert_eq!(get_string_attr(consistency, "consistency_level"), "Session");
    }
}
