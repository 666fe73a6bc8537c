use std::sync::Arc;
use tokio::net::TcpListener;

mod config;
mod errors;
mod extractors;
mod fleet;
mod logging;
mod middlewares;
mod models;
mod routes;
mod server;
mod session;
mod state;
mod telemetry;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = config::load()?;
    logging::registry_logs(config.logs.level)?;
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr).await.map_err(|err| {
        anyhow::anyhow!("Error: Failed to bind '{addr}'.\nReason: {err}")
    })?;
    tracing::info!(upstream = %config.upstream.base_url, "Listening on http://{}", addr);
    server::run_until_done(Arc::new(config), listener).await
}
