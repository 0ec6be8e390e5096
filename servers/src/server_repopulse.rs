//! # repopulse server
//!
//! Serves the dashboard page and the `/ws` channel. Every trigger from a
//! viewer becomes one batched GraphQL request to GitHub; the answer is
//! pushed back as one JSON message per tracked project.

use anyhow::Result;
use tokio::signal;

mod repopulse_logic;
use repopulse_logic::{config, downstream, logger};

#[tokio::main]
async fn main() -> Result<()> {
    // Explicitly install the default crypto provider for rustls
    let _ = rustls::crypto::ring::default_provider().install_default();

    // .env is optional; real environment variables win
    let _ = dotenvy::dotenv();

    let (config, notes) = config::load_config();
    let settings = match config.resolve() {
        Ok(settings) => settings,
        Err(e) => {
            for note in &notes {
                eprintln!("{}", note.message);
            }
            return Err(e.into());
        }
    };
    logger::setup_logging(&settings.log_dir, &settings.log_level)?;
    for note in &notes {
        note.emit();
    }
    log::info!(
        "Tracking {} project(s): {}",
        settings.registry.len(),
        settings
            .registry
            .projects()
            .iter()
            .map(|p| p.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    );

    let (shutdown_tx, _) = tokio::sync::broadcast::channel(1);
    let downstream_handle = tokio::spawn(downstream::run(settings, shutdown_tx.subscribe()));

    // Wait for shutdown signal, then tell every component to stop
    tokio::spawn(async move {
        shutdown_signal().await;
        let _ = shutdown_tx.send(());
    });

    // The server returns after a graceful shutdown, or early if it failed to start
    match downstream_handle.await {
        Ok(Ok(())) => log::info!("Shutdown complete."),
        Ok(Err(e)) => {
            log::error!("Server stopped with error: {:#}", e);
            return Err(e);
        }
        Err(e) => log::error!("Server task panicked: {}", e),
    }
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            log::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
        log::info!("Ctrl-C received, initiating shutdown.");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut term_signal) => {
                term_signal.recv().await;
                log::info!("SIGTERM received, initiating shutdown.");
            }
            Err(e) => {
                log::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    // On non-unix platforms, just wait forever.
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
