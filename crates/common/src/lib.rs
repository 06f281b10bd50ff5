//! AzureRM Common Library
//!
//! Management API plumbing shared by the provider: cloud environments,
//! token acquisition, the HTTP client, resource ids and typed models.

pub mod auth;
pub mod client;
pub mod environment;
pub mod error;
pub mod location;
pub mod models;
pub mod resource_id;
pub mod sas;

// Re-export commonly used types
pub use auth::{AccessToken, ClientSecretCredential, StaticTokenCredential, TokenCredential};
pub use client::{ArmClient, Audience, ClientOptions};
pub use environment::Environment;
pub use error::{Error, Result};
pub use location::normalize_location;
pub use models::keyvault::KeyVaultClient;
pub use resource_id::{KeyVaultChildId, ResourceId};

/// Library version, sent in the User-Agent
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
