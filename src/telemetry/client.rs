use crate::config::UpstreamConfig;
use crate::errors::FleetError;
use crate::models::fleet::{Device, Position, SessionInfo};
use crate::telemetry::FleetApi;
use anyhow::Context;
use reqwest::Method;
use reqwest::header::{ACCEPT, CACHE_CONTROL};
use serde::de::DeserializeOwned;

/// Appends the session token as a query parameter, keeping any query the
/// path already has.
pub fn with_token(path: &str, token: &str) -> String {
    let separator = if path.contains('?') { '&' } else { '?' };
    format!("{path}{separator}token={}", urlencoding::encode(token))
}

pub struct HttpFleetClient {
    http: reqwest::Client,
    base_url: String,
}

impl HttpFleetClient {
    pub fn new(config: &UpstreamConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(config.timeout())
            .build()
            .with_context(|| "Failed to build upstream http client")?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str, token: &str) -> String {
        with_token(&format!("{}{}", self.base_url, path), token)
    }

    pub(crate) async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        token: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<T, FleetError> {
        let mut builder = self
            .http
            .request(method, self.url(path, token))
            .header(ACCEPT, "application/json")
            .header(CACHE_CONTROL, "no-cache");
        if let Some(body) = body {
            // `json` also sets `Content-Type: application/json`
            builder = builder.json(body);
        }
        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            let detail = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            let detail = if detail.is_empty() {
                format!("Request failed with status {}", status.as_u16())
            } else {
                detail
            };
            return Err(FleetError::Upstream {
                status: status.as_u16(),
                detail,
            });
        }
        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|source| FleetError::Decode {
            endpoint: path.to_string(),
            source,
        })
    }
}

impl FleetApi for HttpFleetClient {
    async fn validate_session(&self, token: &str) -> Result<SessionInfo, FleetError> {
        let session: SessionInfo = self.request(Method::GET, "/session", token, None).await?;
        if !session.valid {
            return Err(FleetError::SessionRejected);
        }
        Ok(session)
    }

    async fn fetch_devices(&self, token: &str) -> Result<Vec<Device>, FleetError> {
        self.request(Method::GET, "/devices", token, None).await
    }

    async fn fetch_positions(&self, token: &str) -> Result<Vec<Position>, FleetError> {
        self.request(Method::GET, "/positions", token, None).await
    }
}
