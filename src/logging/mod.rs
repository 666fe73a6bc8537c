use crate::logging::format::Formatter;
use std::io::IsTerminal;
use tracing::Level;
use tracing_subscriber::Layer;
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

mod format;

const CRATE_TARGET: &str = "fleetview";

fn is_crate_target(target: &str) -> bool {
    target == CRATE_TARGET || target.starts_with("fleetview::")
}

/// Installs the stdout subscriber: crate events at `level` and above,
/// everything else from INFO up.
pub fn registry_logs(level: Level) -> anyhow::Result<()> {
    let use_colors = std::io::stdout().is_terminal();
    let crate_layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .event_format(Formatter::new(use_colors))
        .with_filter(filter::filter_fn(move |metadata| {
            is_crate_target(metadata.target()) && metadata.level() <= &level
        }));
    let general_layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .event_format(Formatter::new(use_colors))
        .with_filter(filter::filter_fn(|metadata| {
            !is_crate_target(metadata.target()) && metadata.level() <= &Level::INFO
        }));
    tracing_subscriber::registry()
        .with(crate_layer)
        .with(general_layer)
        .with(tracing_error::ErrorLayer::default())
        .try_init()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crate_targets() {
        assert!(is_crate_target("fleetview"));
        assert!(is_crate_target("fleetview::fleet::poller"));
        assert!(!is_crate_target("fleetviewer"));
        assert!(!is_crate_target("tower_http::trace"));
    }
}
