//! Resource Implementations
//!
//! Implements the CRUD operations for each resource type.

pub mod app_service_active_slot;
pub mod application_insights;
pub mod automation_schedule;
pub mod common;
pub mod container_group;
pub mod cosmos_db;
pub mod data_lake_store;
pub mod dns_aaaa_record;
pub mod dns_zone;
pub mod key_vault_secret;
pub mod resource_group;
pub mod route_table;
pub mod sql_firewall_rule;
pub mod sql_server;
pub mod virtual_network;

use std::sync::Arc;

use anyhow::Result;
use azurerm_common::{ArmClient, ResourceId};

use crate::schema::Block;
use crate::state::DynamicValue;

/// Trait for resource operations
#[async_trait::async_trait]
pub trait Resource: Send + Sync {
    /// Resource type name
    fn type_name(&self) -> &'static str;

    fn schema(&self) -> Block;

    /// Whether `terraform import` is supported
    fn importable(&self) -> bool {
        true
    }

    /// Reject ids `terraform import` could not track
    fn validate_import_id(&self, id: &str) -> Result<()> {
        ResourceId::parse(id)?;
        Ok(())
    }

    /// Checks spanning several attributes, run against the configuration
    /// when a change is planned. Returns error messages.
    fn validate_plan(&self, _config: &DynamicValue) -> Vec<String> {
        Vec::new()
    }

    /// Adjust a planned update before it is returned to Terraform
    fn customize_plan(&self, _prior: &DynamicValue, _planned: &mut DynamicValue, _replace: &mut Vec<String>) {}

    /// Create a new resource, returning its state
    async fn create(&self, client: &ArmClient, planned: &DynamicValue) -> Result<DynamicValue>;

    /// Read an existing resource; `None` when it no longer exists
    async fn read(&self, client: &ArmClient, state: &DynamicValue) -> Result<Option<DynamicValue>>;

    /// Update an existing resource
    async fn update(&self, client: &ArmClient, prior: &DynamicValue, planned: &DynamicValue) -> Result<DynamicValue>;

    /// Delete a resource
    async fn delete(&self, client: &ArmClient, state: &DynamicValue) -> Result<()>;
}

/// Every resource the provider serves
pub fn all() -> Vec<Arc<dyn Resource>> {
    vec![
        Arc::new(resource_group::ResourceGroupResource),
        Arc::new(virtual_network::VirtualNetworkResource),
        Arc::new(route_table::RouteTableResource),
        Arc::new(dns_zone::DnsZoneResource),
        Arc::new(dns_aaaa_record::DnsAaaaRecordResource),
        Arc::new(sql_server::SqlServerResource),
        Arc::new(sql_firewall_rule::SqlFirewallRuleResource),
        Arc::new(application_insights::ApplicationInsightsResource),
        Arc::new(cosmos_db::CosmosDbResource),
        Arc::new(key_vault_secret::KeyVaultSecretResource),
        Arc::new(data_lake_store::DataLakeStoreResource),
        Arc::new(automation_schedule::AutomationScheduleResource),
        Arc::new(app_service_active_slot::AppServiceActiveSlotResource),
        Arc::new(container_group::ContainerGroupResource),
    ]
}
