//! Provider configuration
//!
//! Every argument of the provider block may instead come from an `ARM_*`
//! environment variable.

use std::sync::Arc;

use anyhow::Context;
use azurerm_common::{ArmClient, ClientOptions, ClientSecretCredential, Environment};
use tracing::debug;

use crate::diagnostics;
use crate::schema::{AttrType, Attribute, Block};
use crate::state::{get_optional_string_attr, string_value, DynamicValue};
use crate::tfplugin6::Diagnostic;
use crate::validate;

/// Provider block argument and the variable it falls back to
const SETTINGS: &[(&str, &str)] = &[
    ("subscription_id", "ARM_SUBSCRIPTION_ID"),
    ("client_id", "ARM_CLIENT_ID"),
    ("client_secret", "ARM_CLIENT_SECRET"),
    ("tenant_id", "ARM_TENANT_ID"),
];

const ENVIRONMENT_VARIABLE: &str = "ARM_ENVIRONMENT";

pub fn provider_block() -> Block {
    Block::new(vec![
        Attribute::optional("subscription_id", AttrType::String)
            .description("The Subscription ID which should be used. Also ARM_SUBSCRIPTION_ID.")
            .validate(validate::uuid()),
        Attribute::optional("client_id", AttrType::String)
            .description("The Client ID of the Service Principal. Also ARM_CLIENT_ID.")
            .validate(validate::uuid()),
        Attribute::optional("client_secret", AttrType::String)
            .description("The Client Secret of the Service Principal. Also ARM_CLIENT_SECRET.")
            .sensitive(),
        Attribute::optional("tenant_id", AttrType::String)
            .description("The Tenant ID of the Service Principal. Also ARM_TENANT_ID.")
            .validate(validate::uuid()),
        Attribute::optional("environment", AttrType::String)
            .description("The Cloud Environment which should be used. Also ARM_ENVIRONMENT.")
            .default(string_value("public")),
    ])
}

/// Resolved provider settings
#[derive(Clone)]
pub struct ProviderConfig {
    pub subscription_id: String,
    pub client_id: String,
    pub client_secret: String,
    pub tenant_id: String,
    pub environment: Environment,
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("subscription_id", &self.subscription_id)
            .field("client_id", &self.client_id)
            .field("tenant_id", &self.tenant_id)
            .field("environment", &self.environment.name)
            .finish()
    }
}

impl ProviderConfig {
    /// Resolve the provider block using the process environment
    pub fn from_value(config: &DynamicValue) -> Result<Self, Vec<Diagnostic>> {
        Self::resolve(config, |name| std::env::var(name).ok())
    }

    /// Resolve the provider block, looking variables up through `lookup`
    pub fn resolve<F>(config: &DynamicValue, lookup: F) -> Result<Self, Vec<Diagnostic>>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut diags = Vec::new();
        let mut values = Vec::with_capacity(SETTINGS.len());

        for (attribute, variable) in SETTINGS {
            let value = get_optional_string_attr(config, attribute)
                .or_else(|| lookup(variable).filter(|v| !v.is_empty()));
            match value {
                Some(v) => values.push(v),
                None => {
                    diags.push(diagnostics::at(
                        diagnostics::error(
                            format!("Missing {}", attribute),
                            format!(
                                "{:?} must be set in the provider block or with the {} environment variable",
                                attribute, variable
                            ),
                        ),
                        &[diagnostics::PathStep::Attribute(attribute.to_string())],
                    ));
                    values.push(String::new());
                }
            }
        }

        for ((attribute, _), value) in SETTINGS.iter().zip(&values) {
            if *attribute == "client_secret" || value.is_empty() {
                continue;
            }
            if uuid::Uuid::parse_str(value).is_err() {
                diags.push(diagnostics::error(
                    format!("Invalid {}", attribute),
                    format!("{:?} must be a UUID, got {:?}", attribute, value),
                ));
            }
        }

        let environment_name = get_optional_string_attr(config, "environment")
            .or_else(|| lookup(ENVIRONMENT_VARIABLE))
            .unwrap_or_else(|| "public".to_string());
        let environment = match Environment::from_name(&environment_name) {
            Ok(env) => Some(env),
            Err(e) => {
                diags.push(diagnostics::error("Invalid environment", e.to_string()));
                None
            }
        };

        match environment {
            Some(environment) if diags.is_empty() => {
                let mut values = values.into_iter();
                let mut next = || values.next().unwrap_or_default();
                Ok(Self {
                    subscription_id: next(),
                    client_id: next(),
                    client_secret: next(),
                    tenant_id: next(),
                    environment,
                })
            }
            _ => Err(diags),
        }
    }

    /// Management client authenticating as the configured service principal
    pub fn build_client(&self) -> anyhow::Result<ArmClient> {
        debug!(
            "Building client for subscription {} in the {} environment",
            self.subscription_id, self.environment.name
        );
        let credential = ClientSecretCredential::new(
            self.environment.active_directory_endpoint.clone(),
            self.tenant_id.clone(),
            self.client_id.clone(),
            self.client_secret.clone(),
        )
        .context("Failed to create credential")?;
        let options = ClientOptions::new(self.environment.clone(), self.subscription_id.clone());
        ArmClient::new(options, Arc::new(credential)).context("Failed to create HTTP client")
    }
}
