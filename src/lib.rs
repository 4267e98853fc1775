use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use config::Config;
use error::{Error, ResultOkLogExt};

/// Docker labels discovery: keeps a Prometheus file-based service discovery
/// document in sync with the running containers that opt in to scraping
/// through their labels.
///
/// The Docker event stream and a periodic container listing feed a single
/// reconciliation loop which owns the set of managed containers and rewrites
/// the document whenever that set changes.
pub mod api;
pub mod config;
pub mod container;
pub mod discovery;
pub mod error;
pub mod fsutil;
pub mod metrics;
pub mod persistence;
pub mod runtime;

/// Runs the discovery service until SIGINT/SIGTERM, or until a discovery task
/// fails.
///
/// # Errors
///
/// Possible errors include:
/// - The discovery document path is not a writable `.json` file.
/// - The Docker daemon is unreachable or the preferred network does not exist.
/// - The metrics cannot be registered or the HTTP port cannot be bound.
/// - The Docker event stream fails while running.
pub async fn run(config: Config) -> Result<(), Error> {
    log::info!(
        "docker-labels-discovery {} is starting...",
        env!("CARGO_PKG_VERSION")
    );
    let discovery_config = Arc::new(config.discovery());
    log::debug!("Discovery config: {:?}", discovery_config);

    let persister =
        persistence::FileTargetGroupPersister::new(config.prometheus_config_file_path.clone())?;
    log::debug!("Writing targets to {}", persister.path().display());

    let runtime = Arc::new(runtime::DockerRuntime::connect()?);
    runtime
        .ensure_ready(&discovery_config.network_name)
        .await?;

    let metrics = Arc::new(metrics::Metrics::new(
        &config.metrics_namespace,
        &config.metrics_subsystem,
    )?);
    let registry = Arc::new(discovery::Registry::default());
    let cancel = CancellationToken::new();

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port))
        .await
        .map_err(|source| Error::ApiBind {
            port: config.port,
            source,
        })?;
    let api = api::APIServer::new(
        &config.metrics_path,
        Arc::clone(&metrics),
        Arc::clone(&registry),
    );
    let api_handle = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            let result = api.serve(listener, cancel.clone()).await;
            if let Err(ref err) = result {
                log::error!("API server failed: {}", err);
                cancel.cancel();
            }
            result
        })
    };
    log::info!("Serving metrics on port {}", config.port);

    let mut discoverer =
        discovery::Discoverer::new(runtime, discovery_config, registry, metrics);
    discoverer.start(persister, cancel.clone());
    log::debug!("Started docker discovery");

    tokio::select! {
        _ = shutdown_signal() => {
            log::info!("Shutdown signal received, exiting...");
            cancel.cancel();
        }
        _ = cancel.cancelled() => {}
    }

    let result = discoverer.join_all().await;
    let api_result = api_handle.await.ok_log().transpose().map_err(Error::ApiServe);
    result?;
    api_result?;
    log::info!("Shutdown complete");
    Ok(())
}

/// Waits for SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if tokio::signal::ctrl_c().await.ok_log().is_none() {
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()).ok_log() {
            Some(mut sig) => {
                sig.recv().await;
            }
            None => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
