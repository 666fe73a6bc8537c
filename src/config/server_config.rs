use serde::Deserialize;

#[derive(Deserialize, Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub public_dir: Option<String>,
    #[serde(default = "default_trust_forwarded_proto")]
    pub trust_forwarded_proto: bool,
}

fn default_trust_forwarded_proto() -> bool {
    true
}
