//! Azure Resource Manager HTTP client
//!
//! Thin JSON plumbing over `reqwest`: bearer authentication, error body
//! decoding and polling of long-running operations.

use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::header::{HeaderMap, AUTHORIZATION, CONTENT_TYPE, LOCATION, RETRY_AFTER, USER_AGENT};
use reqwest::{Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::auth::TokenCredential;
use crate::environment::Environment;
use crate::{Error, Result};

const ASYNC_OPERATION_HEADER: &str = "azure-asyncoperation";

/// Which token audience a request authenticates against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Audience {
    ResourceManager,
    KeyVault,
}

/// Options for building an [`ArmClient`]
#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub environment: Environment,
    pub subscription_id: String,
    pub user_agent: String,
    /// Delay between polls of a long-running operation when the service
    /// does not send `Retry-After`
    pub poll_interval: Duration,
    /// Upper bound for waiting on a long-running operation
    pub operation_timeout: Duration,
}

impl ClientOptions {
    pub fn new(environment: Environment, subscription_id: impl Into<String>) -> Self {
        Self {
            environment,
            subscription_id: subscription_id.into(),
            user_agent: format!("terraform-provider-azurerm/{}", crate::VERSION),
            poll_interval: Duration::from_secs(10),
            operation_timeout: Duration::from_secs(60 * 60),
        }
    }
}

/// Client for the Resource Manager and Key Vault REST APIs
#[derive(Clone)]
pub struct ArmClient {
    http: reqwest::Client,
    options: Arc<ClientOptions>,
    credential: Arc<dyn TokenCredential>,
}

impl std::fmt::Debug for ArmClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArmClient")
            .field("environment", &self.options.environment.name)
            .field("subscription_id", &self.options.subscription_id)
            .finish()
    }
}

impl ArmClient {
    pub fn new(options: ClientOptions, credential: Arc<dyn TokenCredential>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(5 * 60))
            .build()?;
        Ok(Self {
            http,
            options: Arc::new(options),
            credential,
        })
    }

    pub fn subscription_id(&self) -> &str {
        &self.options.subscription_id
    }

    pub fn environment(&self) -> &Environment {
        &self.options.environment
    }

    /// Absolute URL of a Resource Manager path
    pub fn url_for(&self, path: &str, api_version: &str) -> String {
        let base = self.options.environment.resource_manager_endpoint.trim_end_matches('/');
        let path = path.trim_start_matches('/');
        format!("{}/{}?api-version={}", base, path, api_version)
    }

    // Resource Manager operations

    /// GET a resource; `None` when it does not exist
    pub async fn get<T: DeserializeOwned>(&self, path: &str, api_version: &str) -> Result<Option<T>> {
        let url = self.url_for(path, api_version);
        self.get_url(&url, Audience::ResourceManager).await
    }

    /// PUT a resource and wait for the operation to finish
    pub async fn put<B: Serialize>(&self, path: &str, api_version: &str, body: &B) -> Result<()> {
        let url = self.url_for(path, api_version);
        let response = self
            .send(Method::PUT, &url, Audience::ResourceManager, Some(serde_json::to_value(body)?))
            .await?;
        let response = check_status(response).await?;
        self.wait_for_completion(response, Audience::ResourceManager).await
    }

    /// PATCH a resource and wait for the operation to finish
    pub async fn patch<B: Serialize>(&self, path: &str, api_version: &str, body: &B) -> Result<()> {
        let url = self.url_for(path, api_version);
        let response = self
            .send(Method::PATCH, &url, Audience::ResourceManager, Some(serde_json::to_value(body)?))
            .await?;
        let response = check_status(response).await?;
        self.wait_for_completion(response, Audience::ResourceManager).await
    }

    /// POST and decode the response body
    pub async fn post<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        api_version: &str,
        body: Option<&B>,
    ) -> Result<T> {
        let url = self.url_for(path, api_version);
        let body = body.map(serde_json::to_value).transpose()?;
        let response = self.send(Method::POST, &url, Audience::ResourceManager, body).await?;
        let response = check_status(response).await?;
        Ok(response.json().await?)
    }

    /// POST an action and wait for the operation it starts
    pub async fn post_action<B: Serialize>(
        &self,
        path: &str,
        api_version: &str,
        body: &B,
    ) -> Result<()> {
        let url = self.url_for(path, api_version);
        let response = self
            .send(Method::POST, &url, Audience::ResourceManager, Some(serde_json::to_value(body)?))
            .await?;
        let response = check_status(response).await?;
        self.wait_for_completion(response, Audience::ResourceManager).await
    }

    /// DELETE a resource and wait for the operation to finish.
    ///
    /// Returns `false` when the resource was already gone.
    pub async fn delete(&self, path: &str, api_version: &str) -> Result<bool> {
        let url = self.url_for(path, api_version);
        let response = self.send(Method::DELETE, &url, Audience::ResourceManager, None).await?;
        match response.status() {
            StatusCode::NOT_FOUND | StatusCode::NO_CONTENT => return Ok(false),
            _ => {}
        }
        let response = check_status(response).await?;
        match self.wait_for_completion(response, Audience::ResourceManager).await {
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
            Ok(()) => Ok(true),
        }
    }

    // Absolute URL operations (Key Vault data plane)

    pub async fn get_url<T: DeserializeOwned>(&self, url: &str, audience: Audience) -> Result<Option<T>> {
        let response = self.send(Method::GET, url, audience, None).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = check_status(response).await?;
        Ok(Some(response.json().await?))
    }

    pub async fn send_url<T: DeserializeOwned>(
        &self,
        method: Method,
        url: &str,
        audience: Audience,
        body: Option<serde_json::Value>,
    ) -> Result<T> {
        let response = self.send(method, url, audience, body).await?;
        let response = check_status(response).await?;
        Ok(response.json().await?)
    }

    /// Send a request, returning the raw response whatever its status
    async fn send(
        &self,
        method: Method,
        url: &str,
        audience: Audience,
        body: Option<serde_json::Value>,
    ) -> Result<Response> {
        let resource = match audience {
            Audience::ResourceManager => &self.options.environment.token_audience,
            Audience::KeyVault => &self.options.environment.key_vault_audience,
        };
        let token = self.credential.get_token(resource).await?;

        debug!("{} {}", method, url);

        let mut request = self
            .http
            .request(method.clone(), url)
            .header(AUTHORIZATION, format!("Bearer {}", token.token))
            .header(USER_AGENT, &self.options.user_agent);

        if let Some(body) = body {
            request = request
                .header(CONTENT_TYPE, "application/json")
                .body(serde_json::to_vec(&body)?);
        }

        let response = request.send().await?;
        debug!("{} {} -> {}", method, url, response.status().as_u16());
        Ok(response)
    }

    /// Follow `Azure-AsyncOperation` or `Location` until the operation ends
    async fn wait_for_completion(&self, response: Response, audience: Audience) -> Result<()> {
        let status = response.status();
        if status != StatusCode::CREATED && status != StatusCode::ACCEPTED {
            return Ok(());
        }

        let headers = response.headers().clone();
        if let Some(url) = header_str(&headers, ASYNC_OPERATION_HEADER) {
            return self.poll_async_operation(&url, &headers, audience).await;
        }
        if let Some(url) = header_str(&headers, LOCATION.as_str()) {
            return self.poll_location(&url, &headers, audience).await;
        }
        Ok(())
    }

    async fn poll_async_operation(&self, url: &str, initial: &HeaderMap, audience: Audience) -> Result<()> {
        let started = Instant::now();
        let mut delay = self.retry_after(initial);

        loop {
            self.sleep_or_timeout(started, delay).await?;

            let response = self.send(Method::GET, url, audience, None).await?;
            delay = self.retry_after(response.headers());
            let response = check_status(response).await?;
            let operation: AsyncOperation = response.json().await?;

            match operation.status.as_str() {
                "Succeeded" => return Ok(()),
                "Failed" | "Canceled" => {
                    let message = operation
                        .error
                        .map(|e| format!("{}: {}", e.code, e.message))
                        .unwrap_or_default();
                    return Err(Error::OperationFailed {
                        status: operation.status,
                        message,
                    });
                }
                other => debug!("Operation {} still {}", url, other),
            }
        }
    }

    async fn poll_location(&self, url: &str, initial: &HeaderMap, audience: Audience) -> Result<()> {
        let started = Instant::now();
        let mut delay = self.retry_after(initial);

        loop {
            self.sleep_or_timeout(started, delay).await?;

            let response = self.send(Method::GET, url, audience, None).await?;
            if response.status() != StatusCode::ACCEPTED {
                check_status(response).await?;
                return Ok(());
            }
            delay = self.retry_after(response.headers());
        }
    }

    async fn sleep_or_timeout(&self, started: Instant, delay: Duration) -> Result<()> {
        let timeout = self.options.operation_timeout;
        if started.elapsed() + delay > timeout {
            warn!("Long-running operation exceeded {}s", timeout.as_secs());
            return Err(Error::Timeout {
                seconds: timeout.as_secs(),
            });
        }
        tokio::time::sleep(delay).await;
        Ok(())
    }

    fn retry_after(&self, headers: &HeaderMap) -> Duration {
        header_str(headers, RETRY_AFTER.as_str())
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(self.options.poll_interval)
    }
}

fn header_str(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(|v| v.to_string())
}

/// Turn a non-success response into `Error::Api`
async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let (code, message) = parse_error_body(&body);
    Err(Error::Api {
        status: status.as_u16(),
        code,
        message,
    })
}

/// ARM answers either `{"error": {...}}` or a bare `{"code", "message"}`
pub(crate) fn parse_error_body(body: &str) -> (String, String) {
    #[derive(Deserialize)]
    struct Envelope {
        error: Option<ErrorDetail>,
        code: Option<String>,
        message: Option<String>,
    }

    match serde_json::from_str::<Envelope>(body) {
        Ok(Envelope { error: Some(detail), .. }) => (detail.code, detail.message),
        Ok(Envelope { code, message, .. }) if code.is_some() || message.is_some() => {
            (code.unwrap_or_default(), message.unwrap_or_default())
        }
        _ => ("Unknown".to_string(), body.to_string()),
    }
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct AsyncOperation {
    status: String,
    error: Option<ErrorDetail>,
}
