//! AzureRM Terraform Provider Implementation
//!
//! Implements the Terraform Plugin Protocol v6 Provider service. Handler
//! failures are reported as diagnostics; only a type name the provider does
//! not know is a gRPC error.

use std::collections::HashMap;
use std::sync::Arc;

use azurerm_common::ArmClient;
use tokio::sync::RwLock;
use tonic::{Request, Response, Status};
use tracing::{debug, info, warn};

use crate::config::{self, ProviderConfig};
use crate::data_sources::{self, DataSource};
use crate::diagnostics;
use crate::resources::{self, Resource};
use crate::schema;
use crate::state::{
    decode_dynamic_value, decode_json_state, encode_dynamic_value, make_state, strip_unknown, string_value,
    DynamicValue as LocalDynamicValue,
};
use crate::tfplugin6::provider_server::Provider;
use crate::tfplugin6::*;

/// AzureRM Terraform Provider
pub struct AzureRmProvider {
    resources: HashMap<&'static str, Arc<dyn Resource>>,
    data_sources: HashMap<&'static str, Arc<dyn DataSource>>,
    /// Set by ConfigureProvider
    client: Arc<RwLock<Option<ArmClient>>>,
}

impl Default for AzureRmProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl AzureRmProvider {
    pub fn new() -> Self {
        Self {
            resources: resources::all().into_iter().map(|r| (r.type_name(), r)).collect(),
            data_sources: data_sources::all().into_iter().map(|d| (d.type_name(), d)).collect(),
            client: Arc::new(RwLock::new(None)),
        }
    }

    /// A provider that is already configured with `client`
    pub fn with_client(client: ArmClient) -> Self {
        Self {
            client: Arc::new(RwLock::new(Some(client))),
            ..Self::new()
        }
    }

    fn resource(&self, type_name: &str) -> Result<Arc<dyn Resource>, Status> {
        self.resources
            .get(type_name)
            .cloned()
            .ok_or_else(|| Status::not_found(format!("Unknown resource type: {}", type_name)))
    }

    fn data_source(&self, type_name: &str) -> Result<Arc<dyn DataSource>, Status> {
        self.data_sources
            .get(type_name)
            .cloned()
            .ok_or_else(|| Status::not_found(format!("Unknown data source type: {}", type_name)))
    }

    async fn get_client(&self) -> Result<ArmClient, Diagnostic> {
        self.client.read().await.clone().ok_or_else(|| {
            diagnostics::error(
                "Provider not configured",
                "ConfigureProvider must succeed before resources can be managed",
            )
        })
    }
}

fn decode(value: Option<&DynamicValue>) -> Result<LocalDynamicValue, Status> {
    let Some(value) = value else {
        return Ok(LocalDynamicValue::Null);
    };
    let decoded = if !value.msgpack.is_empty() {
        decode_dynamic_value(&value.msgpack)
    } else {
        decode_json_state(&value.json)
    };
    decoded.map_err(|e| Status::invalid_argument(format!("Failed to decode value: {}", e)))
}

fn encode(value: &LocalDynamicValue) -> Result<DynamicValue, Status> {
    let msgpack = encode_dynamic_value(value).map_err(|e| Status::internal(format!("Failed to encode state: {}", e)))?;
    Ok(DynamicValue {
        msgpack,
        json: vec![],
    })
}

#[tonic::async_trait]
impl Provider for AzureRmProvider {
    async fn get_provider_schema(
        &self,
        _request: Request<get_provider_schema::Request>,
    ) -> Result<Response<get_provider_schema::Response>, Status> {
        info!("GetProviderSchema called");

        Ok(Response::new(get_provider_schema::Response {
            provider: Some(schema::to_proto(&config::provider_block())),
            resource_schemas: self
                .resources
                .iter()
                .map(|(name, r)| (name.to_string(), schema::to_proto(&r.schema())))
                .collect(),
            data_source_schemas: self
                .data_sources
                .iter()
                .map(|(name, d)| (name.to_string(), schema::to_proto(&d.schema())))
                .collect(),
            diagnostics: vec![],
            provider_meta: None,
            server_capabilities: Some(ServerCapabilities {
                plan_destroy: true,
                get_provider_schema_optional: false,
            }),
        }))
    }

    async fn validate_provider_config(
        &self,
        request: Request<validate_provider_config::Request>,
    ) -> Result<Response<validate_provider_config::Response>, Status> {
        debug!("ValidateProviderConfig called");
        let config = decode(request.get_ref().config.as_ref())?;

        Ok(Response::new(validate_provider_config::Response {
            diagnostics: config::provider_block().validate(&config),
        }))
    }

    async fn validate_resource_config(
        &self,
        request: Request<validate_resource_config::Request>,
    ) -> Result<Response<validate_resource_config::Response>, Status> {
        let req = request.into_inner();
        debug!("ValidateResourceConfig called for {}", req.type_name);
        let resource = self.resource(&req.type_name)?;
        let config = decode(req.config.as_ref())?;

        Ok(Response::new(validate_resource_config::Response {
            diagnostics: resource.schema().validate(&config),
        }))
    }

    async fn validate_data_resource_config(
        &self,
        request: Request<validate_data_resource_config::Request>,
    ) -> Result<Response<validate_data_resource_config::Response>, Status> {
        let req = request.into_inner();
        debug!("ValidateDataResourceConfig called for {}", req.type_name);
        let data_source = self.data_source(&req.type_name)?;
        let config = decode(req.config.as_ref())?;

        Ok(Response::new(validate_data_resource_config::Response {
            diagnostics: data_source.schema().validate(&config),
        }))
    }

    async fn upgrade_resource_state(
        &self,
        request: Request<upgrade_resource_state::Request>,
    ) -> Result<Response<upgrade_resource_state::Response>, Status> {
        let req = request.into_inner();
        debug!("UpgradeResourceState called for {} (version {})", req.type_name, req.version);
        let resource = self.resource(&req.type_name)?;

        let raw = req.raw_state.map(|rs| rs.json).unwrap_or_default();
        match decode_json_state(&raw) {
            Ok(state) => Ok(Response::new(upgrade_resource_state::Response {
                upgraded_state: Some(encode(&resource.schema().conform(&state))?),
                diagnostics: vec![],
            })),
            Err(e) => Ok(Response::new(upgrade_resource_state::Response {
                upgraded_state: None,
                diagnostics: vec![diagnostics::from_anyhow("Failed to upgrade resource state", &e)],
            })),
        }
    }

    async fn configure_provider(
        &self,
        request: Request<configure_provider::Request>,
    ) -> Result<Response<configure_provider::Response>, Status> {
        let req = request.into_inner();
        info!("ConfigureProvider called by Terraform {}", req.terraform_version);
        let config = decode(req.config.as_ref())?;

        let settings = match ProviderConfig::from_value(&config) {
            Ok(settings) => settings,
            Err(diagnostics) => return Ok(Response::new(configure_provider::Response { diagnostics })),
        };
        debug!("Resolved provider configuration: {:?}", settings);

        match settings.build_client() {
            Ok(client) => {
                *self.client.write().await = Some(client);
                info!("Configured for subscription {}", settings.subscription_id);
                Ok(Response::new(configure_provider::Response { diagnostics: vec![] }))
            }
            Err(e) => Ok(Response::new(configure_provider::Response {
                diagnostics: vec![diagnostics::from_anyhow("Failed to configure the AzureRM provider", &e)],
            })),
        }
    }

    async fn read_resource(
        &self,
        request: Request<read_resource::Request>,
    ) -> Result<Response<read_resource::Response>, Status> {
        let req = request.into_inner();
        info!("ReadResource called for {}", req.type_name);
        let resource = self.resource(&req.type_name)?;
        let current = decode(req.current_state.as_ref())?;

        let respond = |new_state: Option<DynamicValue>, diagnostics: Vec<Diagnostic>| {
            Ok(Response::new(read_resource::Response {
                new_state,
                diagnostics,
                private: req.private.clone(),
            }))
        };

        if current.is_null() {
            return respond(req.current_state.clone(), vec![]);
        }
        let client = match self.get_client().await {
            Ok(client) => client,
            Err(diag) => return respond(req.current_state.clone(), vec![diag]),
        };

        match resource.read(&client, &current).await {
            Ok(Some(state)) => respond(Some(encode(&resource.schema().conform(&state))?), vec![]),
            Ok(None) => {
                warn!("{} no longer exists, removing it from state", req.type_name);
                respond(Some(encode(&LocalDynamicValue::Null)?), vec![])
            }
            Err(e) => respond(
                req.current_state.clone(),
                vec![diagnostics::from_anyhow("Failed to read resource", &e)],
            ),
        }
    }

    async fn plan_resource_change(
        &self,
        request: Request<plan_resource_change::Request>,
    ) -> Result<Response<plan_resource_change::Response>, Status> {
        let req = request.into_inner();
        debug!("PlanResourceChange called for {}", req.type_name);
        let resource = self.resource(&req.type_name)?;
        let schema = resource.schema();

        let prior = decode(req.prior_state.as_ref())?;
        let proposed = decode(req.proposed_new_state.as_ref())?;
        let config = decode(req.config.as_ref())?;

        // Destroy plans pass through untouched
        if proposed.is_null() {
            return Ok(Response::new(plan_resource_change::Response {
                planned_state: req.proposed_new_state,
                requires_replace: vec![],
                planned_private: req.prior_private,
                diagnostics: vec![],
                legacy_type_system: true,
            }));
        }

        let (planned, replace) = if prior.is_null() {
            (schema.plan_create(&proposed), Vec::new())
        } else {
            let (mut planned, mut replace) = schema.plan_update(&prior, &proposed, &config);
            let forced = replace.len();
            resource.customize_plan(&prior, &mut planned, &mut replace);
            if replace.len() > forced {
                schema.plan_replacement(&config, &mut planned);
            }
            (planned, replace)
        };

        let diagnostics = resource
            .validate_plan(&config)
            .into_iter()
            .map(|message| diagnostics::error("Invalid configuration", message))
            .collect();

        Ok(Response::new(plan_resource_change::Response {
            planned_state: Some(encode(&planned)?),
            requires_replace: replace.iter().map(|name| diagnostics::attribute(name)).collect(),
            planned_private: req.prior_private,
            diagnostics,
            legacy_type_system: true,
        }))
    }

    async fn apply_resource_change(
        &self,
        request: Request<apply_resource_change::Request>,
    ) -> Result<Response<apply_resource_change::Response>, Status> {
        let req = request.into_inner();
        info!("ApplyResourceChange called for {}", req.type_name);
        let resource = self.resource(&req.type_name)?;

        let prior = decode(req.prior_state.as_ref())?;
        let planned = decode(req.planned_state.as_ref())?;

        let respond = |new_state: Option<DynamicValue>, diagnostics: Vec<Diagnostic>| {
            Ok(Response::new(apply_resource_change::Response {
                new_state,
                private: req.planned_private.clone(),
                diagnostics,
                legacy_type_system: true,
            }))
        };

        let client = match self.get_client().await {
            Ok(client) => client,
            Err(diag) => return respond(req.prior_state.clone(), vec![diag]),
        };

        let result = match (prior.is_null(), planned.is_null()) {
            (_, true) => resource
                .delete(&client, &prior)
                .await
                .map(|_| LocalDynamicValue::Null),
            (true, false) => resource.create(&client, &planned).await,
            (false, false) => resource.update(&client, &prior, &planned).await,
        };

        match result {
            Ok(LocalDynamicValue::Null) => respond(Some(encode(&LocalDynamicValue::Null)?), vec![]),
            Ok(state) => respond(
                Some(encode(&resource.schema().conform(&strip_unknown(state)))?),
                vec![],
            ),
            Err(e) => respond(
                req.prior_state.clone(),
                vec![diagnostics::from_anyhow("Failed to apply resource change", &e)],
            ),
        }
    }

    async fn import_resource_state(
        &self,
        request: Request<import_resource_state::Request>,
    ) -> Result<Response<import_resource_state::Response>, Status> {
        let req = request.into_inner();
        info!("ImportResourceState called for {} with ID {}", req.type_name, req.id);
        let resource = self.resource(&req.type_name)?;

        let failed = |diagnostic: Diagnostic| {
            Ok(Response::new(import_resource_state::Response {
                imported_resources: vec![],
                diagnostics: vec![diagnostic],
            }))
        };

        if !resource.importable() {
            return failed(diagnostics::error(
                "Resource Import Not Implemented",
                format!("{} does not support import", req.type_name),
            ));
        }
        if let Err(e) = resource.validate_import_id(&req.id) {
            return failed(diagnostics::from_anyhow("Invalid import ID", &e));
        }

        let state = resource.schema().conform(&make_state(vec![("id", string_value(&req.id))]));
        Ok(Response::new(import_resource_state::Response {
            imported_resources: vec![import_resource_state::ImportedResource {
                type_name: req.type_name,
                state: Some(encode(&state)?),
                private: vec![],
            }],
            diagnostics: vec![],
        }))
    }

    async fn read_data_source(
        &self,
        request: Request<read_data_source::Request>,
    ) -> Result<Response<read_data_source::Response>, Status> {
        let req = request.into_inner();
        info!("ReadDataSource called for {}", req.type_name);
        let data_source = self.data_source(&req.type_name)?;
        let config = decode(req.config.as_ref())?;

        let client = match self.get_client().await {
            Ok(client) => client,
            Err(diag) => {
                return Ok(Response::new(read_data_source::Response {
                    state: None,
                    diagnostics: vec![diag],
                }))
            }
        };

        match data_source.read(&client, &config).await {
            Ok(state) => Ok(Response::new(read_data_source::Response {
                state: Some(encode(&data_source.schema().conform(&state))?),
                diagnostics: vec![],
            })),
            Err(e) => Ok(Response::new(read_data_source::Response {
                state: None,
                diagnostics: vec![diagnostics::from_anyhow("Failed to read data source", &e)],
            })),
        }
    }

    async fn stop_provider(
        &self,
        _request: Request<stop_provider::Request>,
    ) -> Result<Response<stop_provider::Response>, Status> {
        info!("StopProvider called");
        Ok(Response::new(stop_provider::Response { error: String::new() }))
    }
}
