//! SQL Server Resource handler for Terraform

use anyhow::{Context, Result};
use azurerm_common::models::sql::{Server, ServerProperties, API_VERSION, SERVER_VERSIONS};
use azurerm_common::{normalize_location, ArmClient, ResourceId};
use tracing::info;

use super::common::{self, expand_tags, flatten_tags, parse_id, read_back};
use super::Resource;
use crate::schema::{AttrType, Attribute, Block, Suppress};
use crate::state::{get_string_attr, make_state, optional_string_value, string_value, DynamicValue};

pub struct SqlServerResource;

#[async_trait::async_trait]
impl Resource for SqlServerResource {
    fn type_name(&self) -> &'static str {
        "azurerm_sql_server"
    }

    fn schema(&self) -> Block {
        Block::new(vec![
            common::id(),
            Attribute::required("name", AttrType::String).force_new(),
            common::resource_group_name(),
            common::location(),
            Attribute::required("version", AttrType::String)
                .validate(common::one_of(SERVER_VERSIONS))
                .suppress(Suppress::CaseInsensitive),
            Attribute::required("administrator_login", AttrType::String).force_new(),
            Attribute::required("administrator_login_password", AttrType::String).sensitive(),
            Attribute::computed("fully_qualified_domain_name", AttrType::String),
            common::tags(),
        ])
    }

    async fn create(&self, client: &ArmClient, planned: &DynamicValue) -> Result<DynamicValue> {
        let name = get_string_attr(planned, "name");
        let id = ResourceId::new(client.subscription_id(), get_string_attr(planned, "resource_group_name"))
            .provider("Microsoft.Sql")
            .child("servers", &name)
            .to_string();
        info!("Creating SQL Server {:?}", name);

        client
            .put(&id, API_VERSION, &expand_server(planned))
            .await
            .with_context(|| format!("Error creating SQL Server {:?}", name))?;
        read_back(self, client, planned, id).await
    }

    async fn read(&self, client: &ArmClient, state: &DynamicValue) -> Result<Option<DynamicValue>> {
        let id = parse_id(state)?;
        let server: Option<Server> = client
            .get(&id.to_string(), API_VERSION)
            .await
            .with_context(|| format!("Error reading SQL Server {}", id))?;

        // The password is never returned; keep whatever the state held
        let password = get_string_attr(state, "administrator_login_password");
        Ok(server.map(|s| server_to_state(&id, &s, password)))
    }

    async fn update(&self, client: &ArmClient, _prior: &DynamicValue, planned: &DynamicValue) -> Result<DynamicValue> {
        let id = parse_id(planned)?.to_string();
        client
            .put(&id, API_VERSION, &expand_server(planned))
            .await
            .with_context(|| format!("Error updating SQL Server {}", id))?;
        read_back(self, client, planned, id).await
    }

    async fn delete(&self, client: &ArmClient, state: &DynamicValue) -> Result<()> {
        let id = parse_id(state)?.to_string();
        info!("Deleting SQL Server {}", id);
        client
            .delete(&id, API_VERSION)
            .await
            .with_context(|| format!("Error deleting SQL Server {}", id))?;
        Ok(())
    }
}

fn expand_server(planned: &DynamicValue) -> Server {
    Server::new(
        normalize_location(&get_string_attr(planned, "location")),
        expand_tags(planned),
        ServerProperties {
            version: Some(get_string_attr(planned, "version")),
            administrator_login: Some(get_string_attr(planned, "administrator_login")),
            administrator_login_password: Some(get_string_attr(planned, "administrator_login_password")),
            fully_qualified_domain_name: None,
            state: None,
        },
    )
}

fn server_to_state(id: &ResourceId, server: &Server, password: String) -> DynamicValue {
    let props = server.properties.clone().unwrap_or_default();
    make_state(vec![
        ("id", string_value(id.to_string())),
        ("name", string_value(server.name.clone().unwrap_or_default())),
        ("resource_group_name", string_value(&id.resource_group)),
        ("location", optional_string_value(server.location.as_deref().map(normalize_location))),
        ("version", optional_string_value(props.version)),
        ("administrator_login", optional_string_value(props.administrator_login)),
        ("administrator_login_password", optional_string_value(Some(password).filter(|p| !p.is_empty()))),
        ("fully_qualified_domain_name", optional_string_value(props.fully_qualified_domain_name)),
        ("tags", flatten_tags(server.tags.as_ref())),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_to_state_keeps_password() {
        let id = ResourceId::parse("/subscriptions/s/resourceGroups/rg/providers/Microsoft.Sql/servers/acctestsqlserver")
            .unwrap();
        let server: Server = serde_json::from_value(serde_json::json!({
            "name": "acctestsqlserver",
            "location": "West US",
            "properties": {
                "version": "12.0",
                "administratorLogin": "mradministrator",
                "fullyQualifiedDomainName": "acctestsqlserver.database.windows.net"
            }
        }))
        .unwrap();

        let state = server_to_state(&id, &server, "thisIsDog11".to_string());
        assert_eq!(get_string_attr(&state, "administrator_login_password"), "thisIsDog11");
        assert_eq!(
            get_string_attr(&state, "fully_qualified_domain_name"),
            "acctestsqlserver.database.windows.net"
        );
        assert_eq!(get_string_attr(&state, "location"), "westus");

        let imported = server_to_state(&id, &server, String::new());
        assert!(imported.get("administrator_login_password").unwrap().is_null());
    }

    #[test]
    fn test_expand_server_sends_credentials() {
        let planned = make_state(vec![
            ("location", string_value("westus")),
            ("version", string_value("12.0")),
            ("administrator_login", string_value("mradministrator")),
            ("administrator_login_password", string_value("thisIsDog11")),
        ]);
        let body = serde_json::to_value(expand_server(&planned)).unwrap();
        assert_eq!(body["properties"]["administratorLoginPassword"], "thisIsDog11");
        assert!(body["properties"].get("fullyQualifiedDomainName").is_none());
    }
}
