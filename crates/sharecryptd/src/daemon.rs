//! Daemon lifecycle: master key, key store, HTTP server, shutdown

use anyhow::{Context, Result};
use prometheus_client::registry::Registry;
use sharecrypt_core::config::ShareCryptConfig;
use sharecrypt_vault::{load_envelope, WrappedKeyStore};
use std::sync::Arc;
use tokio::signal::unix::{signal, SignalKind};
use tracing::{info, warn};

use crate::api::{self, AppState};
use crate::metrics::EnvelopeMetrics;

pub async fn run(config: ShareCryptConfig) -> Result<()> {
    // missing master key is fatal at startup
    let envelope = load_envelope(&config.envelope).context("loading master key")?;

    let store = WrappedKeyStore::from_config(&config.keystore).context("building key store")?;
    let backend = &config.keystore.backend;
    match store.check_health().await {
        Ok(()) => info!(?backend, "key store: connected"),
        Err(e) => warn!(?backend, error = %e, "key store unreachable, readyz will report 503"),
    }

    let mut registry = Registry::default();
    let metrics = EnvelopeMetrics::new(&mut registry);

    let state = AppState {
        envelope: Arc::new(envelope),
        store,
        metrics,
        registry: Arc::new(registry),
    };
    let app = api::router(state, config.daemon.metrics);

    let addr = config.daemon.listen.clone();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;

    info!(addr = %addr, metrics = config.daemon.metrics, "key service: listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("key service")?;

    info!("sharecryptd stopped");
    Ok(())
}

async fn shutdown_signal() {
    let (mut sigterm, mut sigint) = match (
        signal(SignalKind::terminate()),
        signal(SignalKind::interrupt()),
    ) {
        (Ok(t), Ok(i)) => (t, i),
        _ => {
            warn!("could not register signal handlers; falling back to ctrl-c");
            let _ = tokio::signal::ctrl_c().await;
            return;
        }
    };

    tokio::select! {
        _ = sigterm.recv() => info!("SIGTERM received, shutting down"),
        _ = sigint.recv() => info!("SIGINT received, shutting down"),
    }
}
