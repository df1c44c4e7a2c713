//! strata-lb - health-checked, least-loaded HTTP load balancer.

use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use strata_balancer::{
    server, BackendPool, BalancerConfig, Forwarder, HealthMonitor, HttpHealthChecker,
    HttpRequestSender, Scheme,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Round-robin-ish HTTP load balancer: requests go to the live backend
/// with the fewest outstanding body bytes.
#[derive(Parser)]
#[command(name = "strata-lb")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Use HTTPS for outbound health probes and forwarded requests.
    #[arg(long)]
    https: bool,

    /// Inbound listen port.
    #[arg(long, default_value_t = 9090)]
    port: u16,

    /// Backend addresses (bare host:port), comma separated or repeated.
    #[arg(long, value_delimiter = ',', required = true)]
    backends: Vec<String>,

    /// Seconds between health probes per backend.
    #[arg(long, default_value_t = 10)]
    health_interval_secs: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = BalancerConfig::new()
        .scheme(Scheme::from_https_flag(cli.https))
        .port(cli.port)
        .backends(cli.backends)
        .health_interval(Duration::from_secs(cli.health_interval_secs));
    config.validate()?;

    let pool = Arc::new(BackendPool::new(config.backends.iter().cloned()));
    let client = reqwest::Client::new();

    let checker = Arc::new(HttpHealthChecker::new(client.clone(), config.scheme));
    let monitor = HealthMonitor::new(Arc::clone(&pool), checker, config.health_interval);
    // One synchronous sweep so the first request sees real liveness.
    monitor.probe_all().await;
    let _probes = monitor.spawn();

    let sender = Arc::new(HttpRequestSender::new(client));
    let forwarder = Arc::new(Forwarder::new(pool, sender, config.scheme));
    let app = server::router(forwarder);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(
        %addr,
        scheme = %config.scheme,
        backends = config.backends.len(),
        "strata-lb listening"
    );

    axum::serve(listener, app).await?;

    Ok(())
}
