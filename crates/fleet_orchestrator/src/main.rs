mod config;
mod frames;
mod metrics;
mod runner;

use crate::config::Config;
use crate::frames::FrameSink;
use crate::metrics::Metrics;
use crate::runner::{run_experiment, RunOptions};
use anyhow::Context;
use clap::Parser;
use tokio::sync::watch;
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = Config::parse();
    tracing::info!(config = ?config, "Loaded configuration");

    let base = config.base_sim_config()?;
    let experiments = config
        .policies()
        .into_iter()
        .map(|policy| config.sim_config(base.clone(), policy))
        .collect::<anyhow::Result<Vec<_>>>()?;

    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        tracing::info!("Shutdown signal received.");
        let _ = shutdown_tx.send(true);
    });

    let metrics = Metrics::new().context("Failed to create metrics registry")?;
    let metrics_handle = config.metrics_listen_addr.map(|addr| {
        let router = metrics.router();
        tokio::spawn(async move {
            let listener = tokio::net::TcpListener::bind(addr).await?;
            tracing::info!(addr = %addr, "Metrics server started");
            axum::serve(listener, router.into_make_service()).await?;
            Ok::<(), anyhow::Error>(())
        })
    });

    let mut frames = match &config.frames {
        Some(path) => Some(FrameSink::create(path, config.frame_every).await?),
        None => None,
    };
    let options = RunOptions {
        tick_rate_hz: config.tick_rate_hz,
        log_every: config.log_every,
    };

    let mut summaries = Vec::with_capacity(experiments.len());
    for sim in experiments {
        let run_id = uuid::Uuid::new_v4();
        let summary =
            run_experiment(run_id, sim, options, &metrics, &mut frames, &mut shutdown_rx).await?;
        let interrupted = summary.interrupted;
        summaries.push(summary);
        if interrupted {
            break;
        }
    }

    if let Some(sink) = frames {
        let written = sink.finish().await?;
        tracing::info!(frames = written, "Frame file closed");
    }

    let rendered = serde_json::to_string_pretty(&summaries)?;
    match &config.summary {
        Some(path) => {
            tokio::fs::write(path, rendered)
                .await
                .with_context(|| format!("Failed to write summary to {}", path.display()))?;
            tracing::info!(path = %path.display(), "Summary written");
        }
        None => println!("{rendered}"),
    }

    if let Some(handle) = metrics_handle {
        handle.abort();
        match handle.await {
            Ok(Err(e)) => tracing::error!(error = %e, "Metrics server task failed."),
            Err(e) if e.is_panic() => tracing::error!(error = %e, "Metrics server task panicked."),
            _ => {}
        }
    }

    tracing::info!("Orchestrator shut down gracefully.");
    Ok(())
}

/// Resolves on SIGINT or SIGTERM. If the handlers cannot be installed the
/// run simply cannot be interrupted.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
