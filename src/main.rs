//! HN Delta Relay: binary entrypoint
//! Boots the Axum HTTP server: SSE endpoints, shared seen-set, static UI.

use hn_delta_relay::{api, metrics::Metrics, RelayConfig};
use shuttle_axum::ShuttleAxum;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Compact logs filtered by `RUST_LOG` (default: relay info, everything else warn).
///
/// Uses `try_init` so a subscriber already installed by the runtime wins.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("hn_delta_relay=info,relay=info,warn"));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .try_init();
}

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();

    init_tracing();

    let cfg = RelayConfig::load_default().map_err(shuttle_runtime::Error::Custom)?;
    tracing::info!(
        feed = %cfg.feed_base_url,
        interval_secs = cfg.poll_interval_secs,
        initial_batch = cfg.initial_batch,
        max_new_per_tick = cfg.max_new_per_tick,
        "relay config loaded"
    );

    let state = api::AppState::from_config(&cfg);
    let mut router = api::create_router(state);

    match Metrics::init() {
        Ok(m) => router = router.merge(m.router()),
        Err(e) => tracing::warn!(error = %e, "metrics disabled"),
    }

    Ok(router.into())
}
