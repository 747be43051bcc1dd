use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, anyhow};
use clap::Parser;
use metrics_exporter_prometheus::PrometheusBuilder;

use prox_relay::config::{ConfigValidator, load_config};
use prox_relay::ports::HttpServer;
use prox_relay::tracing_setup::init_tracing;
use prox_relay::{HyperServer, build_proxy};

#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Path to the YAML configuration file
    #[clap(short, long, default_value = "config.yaml")]
    config: String,

    /// Emit logs as JSON lines
    #[clap(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    init_tracing(args.json_logs).map_err(|e| anyhow!("Failed to initialize tracing: {}", e))?;

    tracing::info!("Loading configuration from {}", args.config);
    let config = load_config(&args.config)
        .await
        .with_context(|| format!("Failed to load config file: {}", args.config))?;
    ConfigValidator::validate(&config).context("Invalid configuration")?;

    if let Some(metrics_addr) = &config.metrics_addr {
        let addr: SocketAddr = metrics_addr
            .parse()
            .with_context(|| format!("Invalid metrics address: {}", metrics_addr))?;
        PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
            .context("Failed to install Prometheus exporter")?;
        tracing::info!("Prometheus metrics available on http://{}/metrics", addr);
    }

    let listen_addr: SocketAddr = config
        .listen_addr
        .parse()
        .with_context(|| format!("Invalid listen address: {}", config.listen_addr))?;
    let proxy = build_proxy(&config.route).context("Failed to set up route")?;

    let server = HyperServer::new(listen_addr, Arc::new(proxy));
    server.run().await
}
