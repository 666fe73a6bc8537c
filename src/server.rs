use crate::config::Config;
use crate::routes;
use crate::state::AppState;
use std::sync::Arc;
use tokio::{net::TcpListener, signal, task::JoinSet};
use tokio_util::sync::CancellationToken;

pub async fn run_until_done(config: Arc<Config>, bind: TcpListener) -> anyhow::Result<()> {
    let mut join_set: JoinSet<std::io::Result<()>> = JoinSet::new();
    let shutdown_signal = CancellationToken::new();
    let state = AppState::build(config, shutdown_signal.clone())?;
    let registry = state.registry.clone();
    // axum serve
    {
        let shutdown_signal = shutdown_signal.clone();
        join_set.spawn(async move {
            let routes = routes::build(state);
            axum::serve(bind, routes)
                .with_graceful_shutdown(async move {
                    shutdown_signal.cancelled().await;
                })
                .await
        });
    }
    // register ctrl+c signal
    {
        let shutdown_signal = shutdown_signal.clone();
        join_set.spawn(async move {
            let _ = signal::ctrl_c().await;
            tracing::debug!("Received Ctrl+C, start terminating");
            shutdown_signal.cancel();
            Ok(())
        });
    }
    #[cfg(target_os = "linux")]
    {
        let shutdown_signal = shutdown_signal.clone();
        join_set.spawn(async move {
            let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())?;
            sigterm.recv().await;
            tracing::debug!("Received SIGTERM signal, start terminating");
            shutdown_signal.cancel();
            Ok(())
        });
    }
    while let Some(r) = join_set.join_next().await {
        if shutdown_signal.is_cancelled() {
            tracing::info!(sessions = registry.len(), "Stopping fleet pollers");
            registry.shutdown();
            join_set.shutdown().await;
            break;
        }
        match r {
            Ok(Ok(())) => (),
            Ok(Err(e)) => return Err(e.into()),
            Err(e) => anyhow::bail!("Internal error in spawn: {e}"),
        }
    }
    tracing::info!("Server stopped");
    Ok(())
}
