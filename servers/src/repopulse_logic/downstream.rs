use anyhow::{Context, Result};
use axum_server::tls_rustls::RustlsConfig;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::sync::broadcast;

use crate::repopulse_logic::config::Settings;
use lib_repopulse::{router, AppState, RemoteFetcher};

/// Serves `/`, `/health` and `/ws` until `shutdown` fires.
pub async fn run(settings: Settings, mut shutdown: broadcast::Receiver<()>) -> Result<()> {
    let fetcher = RemoteFetcher::new(settings.credentials, settings.fetcher)?;
    let app_state = AppState::new(settings.registry, fetcher, settings.channel);
    let app = router(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], settings.port));

    if let Some((cert_path, key_path)) = settings.tls {
        let tls_config = RustlsConfig::from_pem_file(&cert_path, &key_path)
            .await
            .with_context(|| format!("Failed to load TLS configuration from {}", cert_path.display()))?;

        let handle = axum_server::Handle::new();
        let signal_handle = handle.clone();
        tokio::spawn(async move {
            shutdown.recv().await.ok();
            log::info!("Downstream server shutting down.");
            signal_handle.graceful_shutdown(Some(Duration::from_secs(10)));
        });

        log::info!("Downstream server listening on https://{}", addr);
        axum_server::bind_rustls(addr, tls_config)
            .handle(handle)
            .serve(app.into_make_service())
            .await?;
    } else {
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .with_context(|| format!("Failed to bind {}", addr))?;
        log::info!("Downstream server listening on http://{}", addr);
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                shutdown.recv().await.ok();
                log::info!("Downstream server shutting down.");
            })
            .await?;
    }

    Ok(())
}
