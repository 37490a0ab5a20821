use auto_trade_core::{CapitalConfig, GatewayError};
use governor::{clock::DefaultClock, state::InMemoryState, Quota, RateLimiter};
use reqwest::{Client, Method, RequestBuilder, Response};
use serde_json::Value;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info};

const API_KEY_HEADER: &str = "X-CAP-API-KEY";
const CST_HEADER: &str = "CST";
const SECURITY_TOKEN_HEADER: &str = "X-SECURITY-TOKEN";

/// Session tokens issued by a successful login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionTokens {
    pub cst: String,
    pub security_token: String,
}

#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub identifier: String,
    pub password: String,
    pub api_key: String,
}

impl Credentials {
    /// Reads credentials from the gateway config.
    ///
    /// # Errors
    /// Returns `GatewayError::Auth` naming the first missing field.
    pub fn from_config(config: &CapitalConfig) -> Result<Self, GatewayError> {
        let field = |value: &Option<String>, name: &str| {
            value
                .clone()
                .filter(|v| !v.is_empty())
                .ok_or_else(|| GatewayError::Auth(format!("{name} is not configured")))
        };
        Ok(Self {
            identifier: field(&config.identifier, "capital.identifier")?,
            password: field(&config.password, "capital.password")?,
            api_key: field(&config.api_key, "capital.api_key")?,
        })
    }
}

/// Rate-limited JSON client for the brokerage REST API.
pub struct CapitalClient {
    http_client: Client,
    base_url: String,
    credentials: Credentials,
    session: RwLock<Option<SessionTokens>>,
    rate_limiter: Arc<RateLimiter<governor::state::direct::NotKeyed, InMemoryState, DefaultClock>>,
}

impl CapitalClient {
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(
        base_url: impl Into<String>,
        credentials: Credentials,
        timeout: Duration,
        requests_per_second: u32,
    ) -> Result<Self, GatewayError> {
        let per_second = NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN);
        let rate_limiter = Arc::new(RateLimiter::direct(Quota::per_second(per_second)));

        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::Decode(format!("HTTP client setup failed: {e}")))?;

        Ok(Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            credentials,
            session: RwLock::new(None),
            rate_limiter,
        })
    }

    /// # Errors
    /// Returns an error if credentials are missing or the HTTP client cannot be built.
    pub fn from_config(config: &CapitalConfig) -> Result<Self, GatewayError> {
        Self::new(
            config.api_url(),
            Credentials::from_config(config)?,
            Duration::from_secs(config.request_timeout_secs),
            config.requests_per_second,
        )
    }

    pub async fn session(&self) -> Option<SessionTokens> {
        self.session.read().await.clone()
    }

    /// Opens a session and stores the returned tokens.
    ///
    /// # Errors
    /// `GatewayError::Auth` when the gateway refuses the credentials or omits tokens.
    pub async fn login(&self) -> Result<SessionTokens, GatewayError> {
        self.rate_limiter.until_ready().await;
        let url = format!("{}/api/v1/session", self.base_url);
        let body = serde_json::json!({
            "identifier": self.credentials.identifier,
            "password": self.credentials.password,
        });

        let response = self
            .http_client
            .post(&url)
            .header(API_KEY_HEADER, &self.credentials.api_key)
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(GatewayError::Auth(format!("Login failed ({status}): {text}")));
        }

        let header = |name: &str| {
            response
                .headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        let (Some(cst), Some(security_token)) = (header(CST_HEADER), header(SECURITY_TOKEN_HEADER))
        else {
            return Err(GatewayError::Auth(
                "Login succeeded but session tokens are missing".to_string(),
            ));
        };

        let tokens = SessionTokens {
            cst,
            security_token,
        };
        *self.session.write().await = Some(tokens.clone());
        info!(base_url = %self.base_url, "Gateway session opened");
        Ok(tokens)
    }

    pub async fn get(&self, endpoint: &str) -> Result<Value, GatewayError> {
        self.request(Method::GET, endpoint, None, &[]).await
    }

    pub async fn get_with_query(
        &self,
        endpoint: &str,
        query: &[(&str, String)],
    ) -> Result<Value, GatewayError> {
        self.request(Method::GET, endpoint, None, query).await
    }

    pub async fn post(&self, endpoint: &str, body: Value) -> Result<Value, GatewayError> {
        self.request(Method::POST, endpoint, Some(body), &[]).await
    }

    pub async fn delete(&self, endpoint: &str) -> Result<Value, GatewayError> {
        self.request(Method::DELETE, endpoint, None, &[]).await
    }

    async fn request(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<Value>,
        query: &[(&str, String)],
    ) -> Result<Value, GatewayError> {
        let session = self
            .session()
            .await
            .ok_or_else(|| GatewayError::Auth("No gateway session, login first".to_string()))?;

        self.rate_limiter.until_ready().await;
        let url = format!("{}{}", self.base_url, endpoint);
        debug!(method = %method, url = %url, "Gateway request");

        let mut builder = self.authorized(self.http_client.request(method, &url), &session);
        if !query.is_empty() {
            builder = builder.query(query);
        }
        if let Some(body) = body {
            builder = builder.json(&body);
        }

        let response = builder.send().await.map_err(transport_error)?;
        read_json(response).await
    }

    fn authorized(&self, builder: RequestBuilder, session: &SessionTokens) -> RequestBuilder {
        builder
            .header(API_KEY_HEADER, &self.credentials.api_key)
            .header(CST_HEADER, &session.cst)
            .header(SECURITY_TOKEN_HEADER, &session.security_token)
    }
}

fn transport_error(e: reqwest::Error) -> GatewayError {
    if e.is_decode() {
        GatewayError::Decode(e.to_string())
    } else {
        GatewayError::Transient(e.to_string())
    }
}

async fn read_json(response: Response) -> Result<Value, GatewayError> {
    let status = response.status();
    let text = response.text().await.map_err(transport_error)?;

    if !status.is_success() {
        let message = serde_json::from_str::<Value>(&text)
            .ok()
            .and_then(|v| v.get("errorCode").and_then(Value::as_str).map(str::to_string))
            .unwrap_or(text);
        return Err(GatewayError::from_status(status.as_u16(), message));
    }

    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(&text).map_err(|e| GatewayError::Decode(e.to_string()))
}
