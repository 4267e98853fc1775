use clap::Parser;

/// Entry point for the docker labels discovery service.
///
/// Watches the local Docker daemon for containers labelled
/// `prometheus.io/scrape=true` and keeps a Prometheus file-based service
/// discovery document in sync with them.
///
/// # Examples
///
/// ```bash
/// PROMETHEUS_CONFIG_FILE_PATH=/etc/prometheus/targets/docker.json \
/// DOCKER_NETWORK_NAME=monitoring_default \
/// RUST_LOG=info cargo run
/// ```
#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let config = docker_labels_discovery::config::Config::parse().validate()?;
    docker_labels_discovery::run(config).await?;
    Ok(())
}
