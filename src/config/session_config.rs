use serde::Deserialize;

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct SessionConfig {
    pub cookie_name: String,
    pub header_name: String,
    pub max_age_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: "fleet_token".to_string(),
            header_name: "x-session-token".to_string(),
            max_age_secs: 60 * 60 * 24 * 7,
        }
    }
}
