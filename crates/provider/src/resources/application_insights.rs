//! Application Insights Resource handler for Terraform

use anyhow::{Context, Result};
use azurerm_common::models::insights::{Component, ComponentProperties, API_VERSION, APPLICATION_TYPES};
use azurerm_common::{normalize_location, ArmClient, ResourceId};
use tracing::info;

use super::common::{self, expand_tags, flatten_tags, parse_id, read_back};
use super::Resource;
use crate::schema::{AttrType, Attribute, Block, Suppress};
use crate::state::{get_string_attr, make_state, optional_string_value, string_value, DynamicValue};

pub struct ApplicationInsightsResource;

#[async_trait::async_trait]
impl Resource for ApplicationInsightsResource {
    fn type_name(&self) -> &'static str {
        "azurerm_application_insights"
    }

    fn schema(&self) -> Block {
        Block::new(vec![
            common::id(),
            Attribute::required("name", AttrType::String).force_new(),
            common::resource_group_name(),
            common::location(),
            Attribute::required("application_type", AttrType::String)
                .force_new()
                .validate(common::one_of(APPLICATION_TYPES))
                .suppress(Suppress::CaseInsensitive),
            Attribute::computed("app_id", AttrType::String),
            Attribute::computed("instrumentation_key", AttrType::String),
            common::tags(),
        ])
    }

    async fn create(&self, client: &ArmClient, planned: &DynamicValue) -> Result<DynamicValue> {
        let name = get_string_attr(planned, "name");
        let id = ResourceId::new(client.subscription_id(), get_string_attr(planned, "resource_group_name"))
            .provider("microsoft.insights")
            .child("components", &name)
            .to_string();
        info!("Creating Application Insights {:?}", name);

        client
            .put(&id, API_VERSION, &expand_component(planned))
            .await
            .with_context(|| format!("Error creating Application Insights {:?}", name))?;
        read_back(self, client, planned, id).await
    }

    async fn read(&self, client: &ArmClient, state: &DynamicValue) -> Result<Option<DynamicValue>> {
        let id = parse_id(state)?;
        let component: Option<Component> = client
            .get(&id.to_string(), API_VERSION)
            .await
            .with_context(|| format!("Error reading Application Insights {}", id))?;
        Ok(component.map(|c| component_to_state(&id, &c)))
    }

    async fn update(&self, client: &ArmClient, _prior: &DynamicValue, planned: &DynamicValue) -> Result<DynamicValue> {
        let id = parse_id(planned)?.to_string();
        client
            .put(&id, API_VERSION, &expand_component(planned))
            .await
            .with_context(|| format!("Error updating Application Insights {}", id))?;
        read_back(self, client, planned, id).await
    }

    async fn delete(&self, client: &ArmClient, state: &DynamicValue) -> Result<()> {
        let id = parse_id(state)?.to_string();
        info!("Deleting Application Insights {}", id);
        client
            .delete(&id, API_VERSION)
            .await
            .with_context(|| format!("Error deleting Application Insights {}", id))?;
        Ok(())
    }
}

fn expand_component(planned: &DynamicValue) -> Component {
    let application_type = get_string_attr(planned, "application_type");
    Component::new(
        normalize_location(&get_string_attr(planned, "location")),
        expand_tags(planned),
        ComponentProperties {
            application_type: Some(application_type.clone()),
            ..Default::default()
        },
    )
    .with_kind(application_type)
}

fn component_to_state(id: &ResourceId, component: &Component) -> DynamicValue {
    let props = component.properties.clone().unwrap_or_default();
    make_state(vec![
        ("id", string_value(id.to_string())),
        ("name", string_value(component.name.clone().unwrap_or_default())),
        ("resource_group_name", string_value(&id.resource_group)),
        ("location", optional_string_value(component.location.as_deref().map(normalize_location))),
        ("application_type", optional_string_value(props.application_type)),
        ("app_id", optional_string_value(props.app_id)),
        ("instrumentation_key", optional_string_value(props.instrumentation_key)),
        ("tags", flatten_tags(component.tags.as_ref())),
    ])
}
