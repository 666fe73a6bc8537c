use anyhow::{Context, anyhow};
use serde::Deserialize;
use std::path::{Path, PathBuf};

mod logs_config;
mod poll_config;
mod routes_config;
mod server_config;
mod session_config;
mod upstream_config;

pub use logs_config::LogsConfig;
pub use poll_config::PollConfig;
pub use routes_config::RoutesConfig;
pub use server_config::ServerConfig;
pub use session_config::SessionConfig;
pub use upstream_config::UpstreamConfig;

#[derive(Deserialize, Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub poll: PollConfig,
    #[serde(default)]
    pub routes: RoutesConfig,
    #[serde(default)]
    pub logs: LogsConfig,
}

impl Config {
    pub fn public_dir(&self) -> Option<PathBuf> {
        self.server.public_dir.as_deref().map(read_path)
    }
}

pub fn root_dir() -> PathBuf {
    std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}

fn read_path(str: &str) -> PathBuf {
    let path = Path::new(str);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root_dir().join(path)
    }
}

fn parse_config_path(mut args: impl Iterator<Item = String>) -> anyhow::Result<PathBuf> {
    args.next();
    while let Some(arg) = args.next() {
        if arg == "-c" || arg == "--config" {
            return args
                .next()
                .map(PathBuf::from)
                .ok_or_else(|| anyhow!("Error: Please specify path string for -c argument."));
        }
    }
    Err(anyhow!(
        "Error: Please specify configuration file argument. Usage: -c <config_file>"
    ))
}

pub fn parse(content: &str) -> anyhow::Result<Config> {
    toml::from_str(content).with_context(|| {
        "Error: Failed to parse configuration file.\n\
        Please check the file syntax is valid TOML syntax"
    })
}

pub fn load() -> anyhow::Result<Config> {
    let path = parse_config_path(std::env::args())?;
    if !path.is_file() {
        return Err(anyhow!(
            "Error: Configuration file not found or invalid.\n\
        Please make sure that the configuration file exists and is a valid TOML file.\n\
        Expected file path: {:?}",
            path
        ));
    }
    let content = std::fs::read_to_string(&path).with_context(|| {
        "Error: Failed to read configuration file.\n\
        Please check the file path and file permissions, and make sure the file is valid accessible"
    })?;
    parse(&content)
}
