//! Token acquisition for Azure Active Directory
//!
//! Only the service principal client-credentials grant is supported. Tokens
//! are cached per audience and refreshed shortly before they expire.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::debug;

use crate::{Error, Result};

/// Tokens closer than this to expiry are refreshed
const REFRESH_MARGIN: Duration = Duration::from_secs(5 * 60);

/// Bearer token issued for one audience
#[derive(Clone)]
pub struct AccessToken {
    pub token: String,
    pub expires_at: Instant,
}

impl AccessToken {
    fn is_fresh(&self) -> bool {
        self.expires_at
            .checked_duration_since(Instant::now())
            .map(|left| left > REFRESH_MARGIN)
            .unwrap_or(false)
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessToken")
            .field("token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Trait for anything that can hand out bearer tokens
#[async_trait]
pub trait TokenCredential: Send + Sync {
    /// Get a token valid for the given audience
    async fn get_token(&self, audience: &str) -> Result<AccessToken>;
}

/// Service principal authenticating with a client secret
pub struct ClientSecretCredential {
    http: reqwest::Client,
    authority: String,
    tenant_id: String,
    client_id: String,
    client_secret: String,
    cache: Mutex<HashMap<String, AccessToken>>,
}

impl ClientSecretCredential {
    pub fn new(
        authority: impl Into<String>,
        tenant_id: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()?;
        Ok(Self {
            http,
            authority: authority.into(),
            tenant_id: tenant_id.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            cache: Mutex::new(HashMap::new()),
        })
    }

    fn token_url(&self) -> String {
        let authority = self.authority.trim_end_matches('/');
        format!("{}/{}/oauth2/token", authority, self.tenant_id)
    }

    async fn request_token(&self, audience: &str) -> Result<AccessToken> {
        debug!("Requesting token for audience {}", audience);

        let response = self
            .http
            .post(self.token_url())
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("resource", audience),
            ])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            let detail = serde_json::from_str::<TokenErrorResponse>(&body)
                .map(|e| format!("{}: {}", e.error, e.error_description))
                .unwrap_or(body);
            return Err(Error::Auth(format!(
                "token request for {} failed with status {}: {}",
                audience,
                status.as_u16(),
                detail
            )));
        }

        let parsed: TokenResponse = serde_json::from_str(&body)?;
        let lifetime = parsed.expires_in.as_secs().ok_or_else(|| {
            Error::Auth(format!("unparsable expires_in in token response for {}", audience))
        })?;

        let expires_at = Instant::now()
            .checked_add(Duration::from_secs(lifetime))
            .ok_or_else(|| Error::Auth(format!("expires_in of {}s for {} is out of range", lifetime, audience)))?;

        Ok(AccessToken {
            token: parsed.access_token,
            expires_at,
        })
    }
}

#[async_trait]
impl TokenCredential for ClientSecretCredential {
    async fn get_token(&self, audience: &str) -> Result<AccessToken> {
        let mut cache = self.cache.lock().await;
        if let Some(token) = cache.get(audience) {
            if token.is_fresh() {
                return Ok(token.clone());
            }
        }

        let token = self.request_token(audience).await?;
        cache.insert(audience.to_string(), token.clone());
        Ok(token)
    }
}

/// Credential returning a pre-issued token
pub struct StaticTokenCredential {
    token: String,
}

impl StaticTokenCredential {
    pub fn new(token: impl Into<String>) -> Self {
        Self { token: token.into() }
    }
}

#[async_trait]
impl TokenCredential for StaticTokenCredential {
    async fn get_token(&self, _audience: &str) -> Result<AccessToken> {
        Ok(AccessToken {
            token: self.token.clone(),
            expires_at: Instant::now() + Duration::from_secs(3600),
        })
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: Lifetime,
}

/// The v1 endpoint reports `expires_in` as a string
#[derive(Deserialize)]
#[serde(untagged)]
enum Lifetime {
    Seconds(u64),
    Text(String),
}

impl Lifetime {
    fn as_secs(&self) -> Option<u64> {
        match self {
            Lifetime::Seconds(s) => Some(*s),
            Lifetime::Text(s) => s.trim().parse().ok(),
        }
    }
}

#[derive(Deserialize)]
struct TokenErrorResponse {
    error: String,
    #[serde(default)]
    error_description: String,
}
