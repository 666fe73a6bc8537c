use serde::Deserialize;
use std::time::Duration;

#[derive(Deserialize, Debug, Clone)]
pub struct UpstreamConfig {
    /// Fleet API base, e.g. `https://gps.example.com/api`.
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Token used for sign-in requests that carry none.
    #[serde(default)]
    pub default_token: Option<String>,
}

impl UpstreamConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_timeout_secs() -> u64 {
    15
}

fn default_user_agent() -> String {
    format!("fleetview/{}", env!("CARGO_PKG_VERSION"))
}
