//! Data Source Implementations

pub mod data_lake_store;
pub mod managed_disk;
pub mod storage_account_sas;
pub mod subscription;

use std::sync::Arc;

use anyhow::Result;
use azurerm_common::ArmClient;

use crate::schema::Block;
use crate::state::DynamicValue;

/// Trait for read-only lookups
#[async_trait::async_trait]
pub trait DataSource: Send + Sync {
    fn type_name(&self) -> &'static str;

    fn schema(&self) -> Block;

    /// Resolve the configuration into a full state. Anything missing
    /// remotely is an error.
    async fn read(&self, client: &ArmClient, config: &DynamicValue) -> Result<DynamicValue>;
}

/// Every data source the provider serves
pub fn all() -> Vec<Arc<dyn DataSource>> {
    vec![
        Arc::new(data_lake_store::DataLakeStoreDataSource),
        Arc::new(managed_disk::ManagedDiskDataSource),
        Arc::new(storage_account_sas::StorageAccountSasDataSource),
        Arc::new(subscription::SubscriptionDataSource),
    ]
}
