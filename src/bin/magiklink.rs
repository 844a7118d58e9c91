//! magiklink - pod provider sidecar
//!
//! Serves the create/delete/status/getLogs API on top of the local Docker
//! daemon.
//!
//! ## Usage
//!
//! ```sh
//! magiklink --config /etc/magiklink.yaml
//! magiklink --bind 127.0.0.1:4000 --data-root /var/lib/magiklink --verbose
//! ```
//!
//! `RUST_LOG` overrides the log level derived from the configuration.

use anyhow::Context;
use clap::Parser;
use magiklink::{
    DockerRuntime, InMemoryTracker, Materializer, Provider, ProviderConfig, api,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

// =============================================================================
// CLI Parsing
// =============================================================================

#[derive(Debug, Parser)]
#[command(name = "magiklink", version, about = "Pod provider sidecar for Docker")]
struct Cli {
    /// YAML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen address.
    #[arg(long)]
    bind: Option<String>,

    /// Directory materialized volumes are written under.
    #[arg(long)]
    data_root: Option<PathBuf>,

    /// Docker endpoint (unix socket path, unix:// or tcp://).
    #[arg(long)]
    docker_host: Option<String>,

    /// Provision every container of a pod instead of only the first.
    #[arg(long)]
    all_containers: bool,

    /// Debug logging.
    #[arg(short, long, conflicts_with = "errors_only")]
    verbose: bool,

    /// Log errors only.
    #[arg(long)]
    errors_only: bool,
}

impl Cli {
    fn into_config(self) -> anyhow::Result<ProviderConfig> {
        let mut config = match &self.config {
            Some(path) => ProviderConfig::load(path)
                .with_context(|| format!("loading config from {}", path.display()))?,
            None => ProviderConfig::default(),
        };
        config
            .apply_env()
            .context("applying environment overrides")?;

        if let Some(bind) = self.bind {
            config.bind_address = bind;
        }
        if let Some(root) = self.data_root {
            config.data_root = root;
        }
        if let Some(host) = self.docker_host {
            config.docker_host = Some(host);
        }
        if self.all_containers {
            config.provision_all_containers = true;
        }
        if self.verbose {
            config.verbose_logging = true;
            config.errors_only_logging = false;
        }
        if self.errors_only {
            config.errors_only_logging = true;
            config.verbose_logging = false;
        }

        config.validate().context("invalid configuration")?;
        Ok(config)
    }
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Cli::parse().into_config()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.log_level())),
        )
        .init();

    std::fs::create_dir_all(&config.data_root)
        .with_context(|| format!("creating data root {}", config.data_root.display()))?;

    let runtime = DockerRuntime::connect(config.docker_host.as_deref(), &config.data_root)
        .await
        .context("connecting to docker")?;

    let provider = Provider::new(
        Arc::new(runtime),
        Arc::new(InMemoryTracker::new()),
        Materializer::new(&config.data_root),
    )
    .with_all_containers(config.provision_all_containers);

    let addr = config.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;

    tracing::info!(
        address = %addr,
        data_root = %config.data_root.display(),
        all_containers = config.provision_all_containers,
        "magiklink listening"
    );

    axum::serve(listener, api::router(Arc::new(provider)))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving HTTP")?;

    tracing::info!("magiklink stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}
