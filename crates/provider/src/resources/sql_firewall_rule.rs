//! SQL Firewall Rule Resource handler for Terraform

use anyhow::{Context, Result};
use azurerm_common::models::sql::{FirewallRule, FirewallRuleProperties, API_VERSION};
use azurerm_common::{ArmClient, ResourceId};
use tracing::info;

use super::common::{self, parse_id, read_back};
use super::Resource;
use crate::schema::{AttrType, Attribute, Block};
use crate::state::{get_string_attr, make_state, string_value, DynamicValue};
use crate::validate;

pub struct SqlFirewallRuleResource;

#[async_trait::async_trait]
impl Resource for SqlFirewallRuleResource {
    fn type_name(&self) -> &'static str {
        "azurerm_sql_firewall_rule"
    }

    fn schema(&self) -> Block {
        Block::new(vec![
            common::id(),
            Attribute::required("name", AttrType::String).force_new(),
            common::resource_group_name(),
            Attribute::required("server_name", AttrType::String).force_new(),
            Attribute::required("start_ip_address", AttrType::String).validate(validate::ip_address()),
            Attribute::required("end_ip_address", AttrType::String).validate(validate::ip_address()),
        ])
    }

    async fn create(&self, client: &ArmClient, planned: &DynamicValue) -> Result<DynamicValue> {
        let name = get_string_attr(planned, "name");
        let server = get_string_attr(planned, "server_name");
        let id = ResourceId::new(client.subscription_id(), get_string_attr(planned, "resource_group_name"))
            .provider("Microsoft.Sql")
            .child("servers", &server)
            .child("firewallRules", &name)
            .to_string();
        info!("Creating SQL Firewall Rule {:?} on server {:?}", name, server);

        client
            .put(&id, API_VERSION, &expand_rule(planned))
            .await
            .with_context(|| format!("Error creating SQL Firewall Rule {:?}", name))?;
        read_back(self, client, planned, id).await
    }

    async fn read(&self, client: &ArmClient, state: &DynamicValue) -> Result<Option<DynamicValue>> {
        let id = parse_id(state)?;
        let rule: Option<FirewallRule> = client
            .get(&id.to_string(), API_VERSION)
            .await
            .with_context(|| format!("Error reading SQL Firewall Rule {}", id))?;
        match rule {
            Some(rule) => Ok(Some(rule_to_state(&id, &rule)?)),
            None => Ok(None),
        }
    }

    async fn update(&self, client: &ArmClient, _prior: &DynamicValue, planned: &DynamicValue) -> Result<DynamicValue> {
        let id = parse_id(planned)?.to_string();
        client
            .put(&id, API_VERSION, &expand_rule(planned))
            .await
            .with_context(|| format!("Error updating SQL Firewall Rule {}", id))?;
        read_back(self, client, planned, id).await
    }

    async fn delete(&self, client: &ArmClient, state: &DynamicValue) -> Result<()> {
        let id = parse_id(state)?.to_string();
        info!("Deleting SQL Firewall Rule {}", id);
        client
            .delete(&id, API_VERSION)
            .await
            .with_context(|| format!("Error deleting SQL Firewall Rule {}", id))?;
        Ok(())
    }
}

fn expand_rule(planned: &DynamicValue) -> FirewallRule {
    FirewallRule {
        id: None,
        name: None,
        properties: Some(FirewallRuleProperties {
            start_ip_address: get_string_attr(planned, "start_ip_address"),
            end_ip_address: get_string_attr(planned, "end_ip_address"),
        }),
    }
}

fn rule_to_state(id: &ResourceId, rule: &FirewallRule) -> Result<DynamicValue> {
    let props = rule.properties.clone().unwrap_or_default();
    Ok(make_state(vec![
        ("id", string_value(id.to_string())),
        ("name", string_value(id.require("firewallRules")?)),
        ("resource_group_name", string_value(&id.resource_group)),
        ("server_name", string_value(id.require("servers")?)),
        ("start_ip_address", string_value(props.start_ip_address)),
        ("end_ip_address", string_value(props.end_ip_address)),
    ]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_round_trip() {
        let planned = make_state(vec![
            ("start_ip_address", string_value("10.0.17.62")),
            ("end_ip_address", string_value("10.0.17.62")),
        ]);
        let body = serde_json::to_value(expand_rule(&planned)).unwrap();
        assert_eq!(
            body,
            serde_json::json!({"properties": {"startIpAddress": "10.0.17.62", "endIpAddress": "10.0.17.62"}})
        );

        let id = ResourceId::parse(
            "/subscriptions/s/resourceGroups/rg/providers/Microsoft.Sql/servers/acctestsqlserver/firewallRules/acctestrule",
        )
        .unwrap();
        let rule: FirewallRule = serde_json::from_value(body).unwrap();
        let state = rule_to_state(&id, &rule).unwrap();
        assert_eq!(get_string_attr(&state, "server_name"), "acctestsqlserver");
        assert_eq!(get_string_attr(&state, "name"), "acctestrule");
        assert_eq!(get_string_attr(&state, "end_ip_address"), "10.0.17.62");
    }
}
