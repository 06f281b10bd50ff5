//! Provider RPCs driven against an in-process Resource Manager stand-in
//!
//! The stand-in stores whatever is PUT under its path and serves it back on
//! GET. POSTed actions answer with the object stored under the action path,
//! or 500 when there is none. Key Vault secrets are versioned: every PUT
//! writes a new version.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use tonic::Request;

use azurerm_common::{ArmClient, ClientOptions, Environment, ResourceId, StaticTokenCredential};
use terraform_provider_azurerm::state::{
    decode_dynamic_value, encode_dynamic_value, get_string_attr, list_value, make_state, string_list_value,
    string_value, DynamicValue,
};
use terraform_provider_azurerm::tfplugin6::provider_server::Provider;
use terraform_provider_azurerm::tfplugin6::{self, apply_resource_change, plan_resource_change, read_resource};
use terraform_provider_azurerm::AzureRmProvider;

const SUBSCRIPTION: &str = "00000000-0000-0000-0000-000000000000";

/// One request as the stand-in saw it
type Recorded = (Method, String, Value);

#[derive(Clone)]
struct MockArm {
    base: String,
    objects: Arc<Mutex<HashMap<String, Value>>>,
    secrets: Arc<Mutex<HashMap<String, Vec<Value>>>>,
    requests: Arc<Mutex<Vec<Recorded>>>,
}

impl MockArm {
    fn new(base: String) -> Self {
        Self {
            base,
            objects: Arc::default(),
            secrets: Arc::default(),
            requests: Arc::default(),
        }
    }

    fn insert(&self, path: &str, object: Value) {
        self.objects.lock().unwrap().insert(path.to_string(), object);
    }

    fn object(&self, path: &str) -> Option<Value> {
        self.objects.lock().unwrap().get(path).cloned()
    }

    fn record(&self, method: Method, path: &str, body: Value) {
        self.requests.lock().unwrap().push((method, path.to_string(), body));
    }

    fn requests_to(&self, method: Method, path: &str) -> Vec<Value> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|(m, p, _)| *m == method && p == path)
            .map(|(_, _, body)| body.clone())
            .collect()
    }

    fn secret_id(&self, name: &str, version: &str) -> String {
        format!("{}secrets/{}/{}", self.base, name, version)
    }

    fn router(&self) -> Router {
        Router::new()
            .route("/secrets/:name", get(latest_secret).put(set_secret))
            .route("/secrets/:name/:version", get(secret_version).patch(update_secret))
            .fallback(resource_manager)
            .with_state(self.clone())
    }
}

fn error(status: StatusCode, code: &str, message: String) -> Response {
    (status, Json(json!({"error": {"code": code, "message": message}}))).into_response()
}

async fn resource_manager(State(arm): State<MockArm>, method: Method, uri: Uri, body: Bytes) -> Response {
    let path = uri.path().to_string();
    let body: Value = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap()
    };
    arm.record(method.clone(), &path, body.clone());

    let mut objects = arm.objects.lock().unwrap();
    if method == Method::GET {
        match objects.get(&path) {
            Some(object) => Json(object.clone()).into_response(),
            None => error(StatusCode::NOT_FOUND, "ResourceNotFound", format!("{} not found", path)),
        }
    } else if method == Method::POST {
        match objects.get(&path) {
            Some(object) => Json(object.clone()).into_response(),
            None => error(StatusCode::INTERNAL_SERVER_ERROR, "InternalServerError", "try again later".into()),
        }
    } else if method == Method::PUT {
        let mut object = body;
        object["id"] = json!(path);
        object["name"] = json!(path.rsplit('/').next().unwrap_or_default());
        objects.insert(path, object.clone());
        Json(object).into_response()
    } else if method == Method::DELETE {
        match objects.remove(&path) {
            Some(_) => StatusCode::OK.into_response(),
            None => StatusCode::NO_CONTENT.into_response(),
        }
    } else {
        StatusCode::METHOD_NOT_ALLOWED.into_response()
    }
}

async fn set_secret(State(arm): State<MockArm>, Path(name): Path<String>, Json(body): Json<Value>) -> Json<Value> {
    arm.record(Method::PUT, &format!("/secrets/{}", name), body.clone());
    let mut secrets = arm.secrets.lock().unwrap();
    let versions = secrets.entry(name.clone()).or_default();
    let bundle = json!({
        "id": arm.secret_id(&name, &format!("v{}", versions.len() + 1)),
        "value": body["value"],
        "contentType": body["contentType"],
        "tags": body["tags"],
    });
    versions.push(bundle.clone());
    Json(bundle)
}

async fn latest_secret(State(arm): State<MockArm>, Path(name): Path<String>) -> Result<Json<Value>, StatusCode> {
    let secrets = arm.secrets.lock().unwrap();
    secrets
        .get(&name)
        .and_then(|versions| versions.last())
        .map(|bundle| Json(bundle.clone()))
        .ok_or(StatusCode::NOT_FOUND)
}

async fn secret_version(
    State(arm): State<MockArm>,
    Path((name, version)): Path<(String, String)>,
) -> Result<Json<Value>, StatusCode> {
    let id = arm.secret_id(&name, &version);
    let secrets = arm.secrets.lock().unwrap();
    secrets
        .get(&name)
        .and_then(|versions| versions.iter().find(|b| b["id"] == id.as_str()))
        .map(|bundle| Json(bundle.clone()))
        .ok_or(StatusCode::NOT_FOUND)
}

async fn update_secret(
    State(arm): State<MockArm>,
    Path((name, version)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, StatusCode> {
    arm.record(Method::PATCH, &format!("/secrets/{}/{}", name, version), body.clone());
    let id = arm.secret_id(&name, &version);
    let mut secrets = arm.secrets.lock().unwrap();
    let bundle = secrets
        .get_mut(&name)
        .and_then(|versions| versions.iter_mut().find(|b| b["id"] == id.as_str()))
        .ok_or(StatusCode::NOT_FOUND)?;
    for field in ["contentType", "tags"] {
        if !body[field].is_null() {
            bundle[field] = body[field].clone();
        }
    }
    Ok(Json(bundle.clone()))
}

async fn listen() -> (tokio::net::TcpListener, String) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}/", listener.local_addr().unwrap());
    (listener, base)
}

fn serve(listener: tokio::net::TcpListener, app: Router) {
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
}

fn provider_for(base: &str) -> AzureRmProvider {
    let mut options = ClientOptions::new(Environment::custom(base), SUBSCRIPTION);
    options.poll_interval = Duration::from_millis(10);
    options.operation_timeout = Duration::from_secs(5);
    let client = ArmClient::new(options, Arc::new(StaticTokenCredential::new("token"))).unwrap();
    AzureRmProvider::with_client(client)
}

async fn spawn() -> (AzureRmProvider, MockArm) {
    let (listener, base) = listen().await;
    let arm = MockArm::new(base.clone());
    serve(listener, arm.router());
    (provider_for(&base), arm)
}

async fn spawn_router(app: Router) -> AzureRmProvider {
    let (listener, base) = listen().await;
    serve(listener, app);
    provider_for(&base)
}

fn dynamic(value: &DynamicValue) -> Option<tfplugin6::DynamicValue> {
    Some(tfplugin6::DynamicValue {
        msgpack: encode_dynamic_value(value).unwrap(),
        json: vec![],
    })
}

fn decode(value: Option<&tfplugin6::DynamicValue>) -> DynamicValue {
    decode_dynamic_value(&value.unwrap().msgpack).unwrap()
}

fn group_id(name: &str) -> String {
    ResourceId::new(SUBSCRIPTION, name).to_string()
}

fn group_config(name: &str) -> DynamicValue {
    make_state(vec![
        ("id", DynamicValue::Null),
        ("name", string_value(name)),
        ("location", string_value("West Europe")),
        ("tags", DynamicValue::Null),
    ])
}

async fn create(provider: &AzureRmProvider, type_name: &str, config: &DynamicValue) -> apply_resource_change::Response {
    let plan = provider
        .plan_resource_change(Request::new(plan_resource_change::Request {
            type_name: type_name.to_string(),
            prior_state: dynamic(&DynamicValue::Null),
            proposed_new_state: dynamic(config),
            config: dynamic(config),
            prior_private: vec![],
            provider_meta: None,
        }))
        .await
        .unwrap()
        .into_inner();
    assert!(plan.diagnostics.is_empty());

    provider
        .apply_resource_change(Request::new(apply_resource_change::Request {
            type_name: type_name.to_string(),
            prior_state: dynamic(&DynamicValue::Null),
            planned_state: plan.planned_state,
            config: dynamic(config),
            planned_private: vec![],
            provider_meta: None,
        }))
        .await
        .unwrap()
        .into_inner()
}

async fn apply(
    provider: &AzureRmProvider,
    type_name: &str,
    prior: &DynamicValue,
    planned: &DynamicValue,
) -> apply_resource_change::Response {
    provider
        .apply_resource_change(Request::new(apply_resource_change::Request {
            type_name: type_name.to_string(),
            prior_state: dynamic(prior),
            planned_state: dynamic(planned),
            config: dynamic(planned),
            planned_private: vec![],
            provider_meta: None,
        }))
        .await
        .unwrap()
        .into_inner()
}

async fn read(provider: &AzureRmProvider, type_name: &str, state: &DynamicValue) -> read_resource::Response {
    provider
        .read_resource(Request::new(read_resource::Request {
            type_name: type_name.to_string(),
            current_state: dynamic(state),
            private: vec![],
            provider_meta: None,
        }))
        .await
        .unwrap()
        .into_inner()
}

#[tokio::test]
async fn test_resource_group_lifecycle() {
    let (provider, arm) = spawn().await;
    let id = group_id("acctestRG");

    let applied = create(&provider, "azurerm_resource_group", &group_config("acctestRG")).await;
    assert!(applied.diagnostics.is_empty(), "{:?}", applied.diagnostics);
    let state = decode(applied.new_state.as_ref());
    assert_eq!(get_string_attr(&state, "id"), id);
    assert_eq!(get_string_attr(&state, "location"), "westeurope");
    assert!(state.is_wholly_known());
    assert_eq!(arm.object(&id).unwrap()["location"], "westeurope");

    let refreshed = read(&provider, "azurerm_resource_group", &state).await;
    assert!(refreshed.diagnostics.is_empty());
    assert_eq!(decode(refreshed.new_state.as_ref()), state);

    let destroyed = apply(&provider, "azurerm_resource_group", &state, &DynamicValue::Null).await;
    assert!(destroyed.diagnostics.is_empty());
    assert!(decode(destroyed.new_state.as_ref()).is_null());
    assert!(arm.object(&id).is_none());
}

#[tokio::test]
async fn test_read_drops_resources_deleted_outside_terraform() {
    let (provider, arm) = spawn().await;

    let state = decode(
        create(&provider, "azurerm_resource_group", &group_config("acctestRG"))
            .await
            .new_state
            .as_ref(),
    );
    arm.objects.lock().unwrap().clear();

    let refreshed = read(&provider, "azurerm_resource_group", &state).await;
    assert!(refreshed.diagnostics.is_empty());
    assert!(decode(refreshed.new_state.as_ref()).is_null());
}

#[tokio::test]
async fn test_failed_create_keeps_prior_state() {
    let app = Router::new().route(
        "/subscriptions/:sub/resourceGroups/:name",
        get(|| async { StatusCode::NOT_FOUND }).put(|| async {
            (
                StatusCode::CONFLICT,
                Json(json!({"error": {"code": "ResourceGroupBeingDeleted", "message": "still deleting"}})),
            )
        }),
    );
    let provider = spawn_router(app).await;

    let applied = create(&provider, "azurerm_resource_group", &group_config("acctestRG")).await;
    assert_eq!(applied.diagnostics.len(), 1);
    assert_eq!(applied.diagnostics[0].summary, "Failed to apply resource change");
    assert!(applied.diagnostics[0].detail.contains("acctestRG"));
    assert!(decode(applied.new_state.as_ref()).is_null());
}

#[tokio::test]
async fn test_vnet_update_without_subnet_blocks_keeps_remote_subnets() {
    let (provider, arm) = spawn().await;
    let id = ResourceId::new(SUBSCRIPTION, "acctestRG")
        .provider("Microsoft.Network")
        .child("virtualNetworks", "acctestvnet")
        .to_string();
    arm.insert(
        &id,
        json!({
            "id": id,
            "name": "acctestvnet",
            "location": "westeurope",
            "properties": {
                "addressSpace": {"addressPrefixes": ["10.0.0.0/16"]},
                "subnets": [{
                    "id": format!("{}/subnets/external", id),
                    "name": "external",
                    "properties": {"addressPrefix": "10.0.1.0/24"}
                }]
            }
        }),
    );

    let prior = make_state(vec![
        ("id", string_value(&id)),
        ("name", string_value("acctestvnet")),
        ("resource_group_name", string_value("acctestRG")),
        ("location", string_value("westeurope")),
        ("address_space", string_list_value(["10.0.0.0/16"])),
        ("dns_servers", DynamicValue::Null),
        ("subnet", list_value(vec![])),
        ("tags", DynamicValue::Map(Default::default())),
    ]);
    let mut planned = prior.clone();
    planned.set("address_space", string_list_value(["10.0.0.0/16", "10.1.0.0/16"]));

    let applied = apply(&provider, "azurerm_virtual_network", &prior, &planned).await;
    assert!(applied.diagnostics.is_empty(), "{:?}", applied.diagnostics);

    let puts = arm.requests_to(Method::PUT, &id);
    assert_eq!(puts.len(), 1);
    let subnets = &puts[0]["properties"]["subnets"];
    assert_eq!(subnets.as_array().unwrap().len(), 1);
    assert_eq!(subnets[0]["name"], "external");
    assert_eq!(subnets[0]["properties"]["addressPrefix"], "10.0.1.0/24");
    assert_eq!(puts[0]["properties"]["addressSpace"]["addressPrefixes"][1], "10.1.0.0/16");
}

fn cosmos_state(id: &str) -> DynamicValue {
    make_state(vec![
        ("id", string_value(id)),
        ("name", string_value("acctest-cosmos")),
        ("resource_group_name", string_value("acctestRG")),
        ("location", string_value("westus")),
        ("offer_type", string_value("Standard")),
        ("primary_master_key", string_value("prior-primary")),
        ("secondary_master_key", string_value("prior-secondary")),
        ("primary_readonly_master_key", string_value("prior-readonly")),
        ("secondary_readonly_master_key", string_value("prior-secondary-readonly")),
    ])
}

#[tokio::test]
async fn test_cosmos_read_keeps_keys_when_listing_fails() {
    let (provider, arm) = spawn().await;
    let id = ResourceId::new(SUBSCRIPTION, "acctestRG")
        .provider("Microsoft.DocumentDB")
        .child("databaseAccounts", "acctest-cosmos")
        .to_string();
    arm.insert(
        &id,
        json!({
            "id": id,
            "name": "acctest-cosmos",
            "location": "West US",
            "properties": {
                "databaseAccountOfferType": "Standard",
                "consistencyPolicy": {"defaultConsistencyLevel": "Session"},
                "failoverPolicies": [{"id": "acctest-cosmos-westus", "locationName": "West US", "failoverPriority": 0}]
            }
        }),
    );
    arm.insert(
        &format!("{}/listKeys", id),
        json!({"primaryMasterKey": "new-primary", "secondaryMasterKey": "new-secondary"}),
    );

    let refreshed = read(&provider, "azurerm_cosmos_db", &cosmos_state(&id)).await;
    assert!(refreshed.diagnostics.is_empty(), "{:?}", refreshed.diagnostics);
    let state = decode(refreshed.new_state.as_ref());

    assert_eq!(arm.requests_to(Method::POST, &format!("{}/readonlykeys", id)).len(), 1);
    assert_eq!(get_string_attr(&state, "primary_master_key"), "new-primary");
    assert_eq!(get_string_attr(&state, "secondary_master_key"), "new-secondary");
    assert_eq!(get_string_attr(&state, "primary_readonly_master_key"), "prior-readonly");
    assert_eq!(get_string_attr(&state, "secondary_readonly_master_key"), "prior-secondary-readonly");
    assert_eq!(get_string_attr(&state, "offer_type"), "Standard");
}

fn secret_state(arm: &MockArm) -> DynamicValue {
    arm.secrets.lock().unwrap().insert(
        "db".to_string(),
        vec![json!({
            "id": arm.secret_id("db", "v1"),
            "value": "old-password",
            "contentType": "text/plain",
            "tags": {}
        })],
    );
    make_state(vec![
        ("id", string_value(arm.secret_id("db", "v1"))),
        ("name", string_value("db")),
        ("vault_uri", string_value(&arm.base)),
        ("value", string_value("old-password")),
        ("content_type", string_value("text/plain")),
        ("version", string_value("v1")),
        ("tags", DynamicValue::Map(Default::default())),
    ])
}

#[tokio::test]
async fn test_secret_value_change_writes_new_version() {
    let (provider, arm) = spawn().await;
    let prior = secret_state(&arm);
    let mut planned = prior.clone();
    planned.set("value", string_value("new-password"));
    planned.set("id", DynamicValue::Unknown);
    planned.set("version", DynamicValue::Unknown);

    let applied = apply(&provider, "azurerm_key_vault_secret", &prior, &planned).await;
    assert!(applied.diagnostics.is_empty(), "{:?}", applied.diagnostics);
    let state = decode(applied.new_state.as_ref());

    let puts = arm.requests_to(Method::PUT, "/secrets/db");
    assert_eq!(puts.len(), 1);
    assert_eq!(puts[0]["value"], "new-password");
    assert!(arm.requests_to(Method::PATCH, "/secrets/db/v1").is_empty());
    assert_eq!(get_string_attr(&state, "id"), arm.secret_id("db", "v2"));
    assert_eq!(get_string_attr(&state, "version"), "v2");
    assert_eq!(get_string_attr(&state, "value"), "new-password");
}

#[tokio::test]
async fn test_secret_content_type_change_patches_current_version() {
    let (provider, arm) = spawn().await;
    let prior = secret_state(&arm);
    let mut planned = prior.clone();
    planned.set("content_type", string_value("application/json"));

    let applied = apply(&provider, "azurerm_key_vault_secret", &prior, &planned).await;
    assert!(applied.diagnostics.is_empty(), "{:?}", applied.diagnostics);
    let state = decode(applied.new_state.as_ref());

    let patches = arm.requests_to(Method::PATCH, "/secrets/db/v1");
    assert_eq!(patches.len(), 1);
    assert_eq!(patches[0]["contentType"], "application/json");
    assert!(arm.requests_to(Method::PUT, "/secrets/db").is_empty());
    assert_eq!(get_string_attr(&state, "id"), arm.secret_id("db", "v1"));
    assert_eq!(get_string_attr(&state, "content_type"), "application/json");
    assert_eq!(get_string_attr(&state, "value"), "old-password");
}
