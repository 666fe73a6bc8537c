use crate::config::Config;
use crate::fleet::PollerRegistry;
use crate::middlewares::route_guard::RouteGuard;
use crate::telemetry::{FleetApi, HttpFleetClient};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub struct AppState<A = HttpFleetClient> {
    pub config: Arc<Config>,
    pub registry: Arc<PollerRegistry<A>>,
    pub guard: Arc<RouteGuard>,
    pub shutdown_signal: CancellationToken,
}

impl<A> Clone for AppState<A> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            registry: self.registry.clone(),
            guard: self.guard.clone(),
            shutdown_signal: self.shutdown_signal.clone(),
        }
    }
}

impl AppState<HttpFleetClient> {
    pub fn build(config: Arc<Config>, shutdown_signal: CancellationToken) -> anyhow::Result<Self> {
        let client = Arc::new(HttpFleetClient::new(&config.upstream)?);
        Ok(Self::with_api(config, client, shutdown_signal))
    }
}

impl<A: FleetApi> AppState<A> {
    pub fn with_api(config: Arc<Config>, api: Arc<A>, shutdown_signal: CancellationToken) -> Self {
        let registry = Arc::new(PollerRegistry::new(api, config.poll.clone()));
        let guard = Arc::new(RouteGuard::new(&config.routes, &config.session.cookie_name));
        Self {
            config,
            registry,
            guard,
            shutdown_signal,
        }
    }

    pub fn api(&self) -> &Arc<A> {
        self.registry.api()
    }
}
