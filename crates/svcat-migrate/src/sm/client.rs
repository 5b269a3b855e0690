//! Service Manager REST client
//!
//! Authenticates with OAuth2 client credentials taken from the operator's
//! access secret and caches the bearer token until shortly before it
//! expires. All list calls follow the continuation token until the last
//! page.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use k8s_openapi::ByteString;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::debug;

use super::types::{
    Page, Parameters, ServiceBinding, ServiceInstance, ServiceOffering, ServicePlan,
};
use crate::clients::BrokerClient;
use crate::{Error, Result};

/// Request timeout for every Service Manager call
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Refresh the token this long before it actually expires
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(30);

const INSTANCES_PATH: &str = "/v1/service_instances";
const BINDINGS_PATH: &str = "/v1/service_bindings";
const PLANS_PATH: &str = "/v1/service_plans";
const OFFERINGS_PATH: &str = "/v1/service_offerings";

/// Connection settings for Service Manager
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SmClientConfig {
    pub client_id: String,
    pub client_secret: String,
    /// Service Manager API base URL
    pub url: String,
    /// OAuth server base URL; `/oauth/token` is appended
    pub token_url: String,
}

impl SmClientConfig {
    /// Read the settings from the operator access secret
    /// (`clientid`, `clientsecret`, `url`, `tokenurl`).
    pub fn from_secret_data(data: &BTreeMap<String, ByteString>) -> Result<Self> {
        let field = |key: &str| -> Result<String> {
            let value = data
                .get(key)
                .ok_or_else(|| Error::config(format!("access secret is missing '{}'", key)))?;
            String::from_utf8(value.0.clone())
                .map_err(|_| Error::config(format!("access secret key '{}' is not UTF-8", key)))
        };

        Ok(Self {
            client_id: field("clientid")?,
            client_secret: field("clientsecret")?,
            url: field("url")?,
            token_url: field("tokenurl")?,
        })
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

#[derive(Debug)]
struct CachedToken {
    value: String,
    expires_at: Option<Instant>,
}

/// Expiry instant for a token lifetime, `None` if it is out of range
fn token_expiry(expires_in: u64) -> Option<Instant> {
    Instant::now().checked_add(Duration::from_secs(expires_in))
}

impl CachedToken {
    fn is_fresh(&self) -> bool {
        self.expires_at
            .is_none_or(|at| Instant::now() + TOKEN_EXPIRY_MARGIN < at)
    }
}

/// OAuth2-authenticated Service Manager client
pub struct ServiceManagerClient {
    http: reqwest::Client,
    config: SmClientConfig,
    token: Mutex<Option<CachedToken>>,
}

impl ServiceManagerClient {
    /// Create a client with the default request timeout
    pub fn new(config: SmClientConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self::with_client(http, config))
    }

    /// Create a client with a custom HTTP client
    pub fn with_client(http: reqwest::Client, config: SmClientConfig) -> Self {
        Self {
            http,
            config,
            token: Mutex::new(None),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.config.url.trim_end_matches('/'), path)
    }

    async fn access_token(&self) -> Result<String> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref().filter(|t| t.is_fresh()) {
            return Ok(token.value.clone());
        }

        let token_endpoint = format!("{}/oauth/token", self.config.token_url.trim_end_matches('/'));
        debug!(url = %token_endpoint, "Fetching Service Manager access token");

        let response = self
            .http
            .post(&token_endpoint)
            .basic_auth(&self.config.client_id, Some(&self.config.client_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Broker {
                status: status.as_u16(),
                path: token_endpoint,
                message: response.text().await.unwrap_or_default(),
            });
        }

        let body: TokenResponse = response.json().await?;
        let token = CachedToken {
            value: body.access_token,
            expires_at: body.expires_in.and_then(token_expiry),
        };
        let value = token.value.clone();
        *cached = Some(token);
        Ok(value)
    }

    /// GET every page of a list endpoint
    async fn list_all<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &Parameters,
    ) -> Result<Vec<T>> {
        let url = self.endpoint(path);
        let mut items = Vec::new();
        let mut next: Option<String> = None;

        loop {
            let mut query = params.to_query();
            if let Some(token) = &next {
                query.push(("token".to_string(), token.clone()));
            }

            let response = self
                .http
                .get(&url)
                .bearer_auth(self.access_token().await?)
                .query(&query)
                .send()
                .await?;

            let status = response.status();
            if !status.is_success() {
                return Err(Error::Broker {
                    status: status.as_u16(),
                    path: path.to_string(),
                    message: response.text().await.unwrap_or_default(),
                });
            }

            let page: Page<T> = response.json().await?;
            items.extend(page.items);

            if page.token.is_empty() {
                break;
            }
            next = Some(page.token);
        }

        debug!(path = %path, count = items.len(), "Listed Service Manager records");
        Ok(items)
    }
}

#[async_trait]
impl BrokerClient for ServiceManagerClient {
    async fn list_instances(&self, params: &Parameters) -> Result<Vec<ServiceInstance>> {
        self.list_all(INSTANCES_PATH, params).await
    }

    async fn list_bindings(&self, params: &Parameters) -> Result<Vec<ServiceBinding>> {
        self.list_all(BINDINGS_PATH, params).await
    }

    async fn list_plans(&self) -> Result<Vec<ServicePlan>> {
        self.list_all(PLANS_PATH, &Parameters::default()).await
    }

    async fn list_offerings(&self) -> Result<Vec<ServiceOffering>> {
        self.list_all(OFFERINGS_PATH, &Parameters::default()).await
    }

    async fn call(
        &self,
        method: Method,
        path: &str,
        body: Vec<u8>,
        params: &Parameters,
    ) -> Result<StatusCode> {
        let response = self
            .http
            .request(method, self.endpoint(path))
            .bearer_auth(self.access_token().await?)
            .header(CONTENT_TYPE, "application/json")
            .query(&params.to_query())
            .body(body)
            .send()
            .await?;

        debug!(path = %path, status = %response.status(), "Service Manager call");
        Ok(response.status())
    }
}
