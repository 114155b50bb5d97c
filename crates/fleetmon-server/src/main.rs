use anyhow::Result;
use chrono::Utc;
use fleetmon_incident::IncidentEvaluator;
use fleetmon_storage::engine::SqliteMetricStore;
use fleetmon_storage::MetricStore;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tokio::signal;
use tracing_subscriber::EnvFilter;

use fleetmon_server::app;
use fleetmon_server::config::{self, ServerConfig};
use fleetmon_server::machine_seed;
use fleetmon_server::poll::scheduler::PollScheduler;
use fleetmon_server::state::AppState;
use fleetmon_server::worker::{self, EvalWorkerPool};

#[allow(clippy::print_stderr)]
fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  fleetmon-server [config.toml]                          Start the server");
    eprintln!("  fleetmon-server init-machines <config.toml> <seed.json>  Register machines from seed file");
}

#[tokio::main]
async fn main() -> Result<()> {
    fleetmon_common::id::init(1, 1);

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("fleetmon=info".parse()?))
        .init();

    let args: Vec<String> = std::env::args().collect();

    match args.get(1).map(|s| s.as_str()) {
        Some("init-machines") => {
            let config_path = args.get(2).ok_or_else(|| {
                print_usage();
                anyhow::anyhow!("init-machines requires <config.toml> and <seed.json> arguments")
            })?;
            let seed_path = args.get(3).ok_or_else(|| {
                print_usage();
                anyhow::anyhow!("init-machines requires <seed.json> argument")
            })?;
            run_init_machines(config_path, seed_path)
        }
        Some("--help" | "-h") => {
            print_usage();
            Ok(())
        }
        _ => {
            let config_path = args
                .get(1)
                .map(|s| s.as_str())
                .unwrap_or("config/fleetmon.toml");
            run_server(config_path).await
        }
    }
}

fn run_init_machines(config_path: &str, seed_path: &str) -> Result<()> {
    let config = ServerConfig::load(config_path)?;
    let store = SqliteMetricStore::open(Path::new(&config.db_path))?;
    machine_seed::seed_machines(&store, seed_path)
}

async fn run_server(config_path: &str) -> Result<()> {
    let config = config::ServerConfig::load(config_path)?;

    tracing::info!(
        http_port = config.http_port,
        db = %config.db_path,
        poll_interval_secs = config.poll.interval_secs,
        "fleetmon-server starting"
    );

    let store: Arc<dyn MetricStore> =
        Arc::new(SqliteMetricStore::open(Path::new(&config.db_path))?);

    let evaluator = Arc::new(IncidentEvaluator::new(
        store.clone(),
        config.thresholds.to_threshold_config(),
    ));

    // Evaluation queue and worker pool
    let (queue, rx) = worker::eval_queue();
    let pool = EvalWorkerPool::new(store.clone(), evaluator, config.poll.eval_workers);
    let worker_handle = tokio::spawn(async move {
        pool.run(rx).await;
    });

    // Poll scheduler
    let scheduler = PollScheduler::new(store.clone(), queue, &config.poll);
    let scheduler_handle = tokio::spawn(async move {
        scheduler.run().await;
    });

    // HTTP read API
    let state = AppState {
        store: store.clone(),
        start_time: Utc::now(),
    };
    let http_addr: SocketAddr = format!("0.0.0.0:{}", config.http_port).parse()?;
    let listener = tokio::net::TcpListener::bind(http_addr).await?;
    let http_server = axum::serve(listener, app::build_http_app(state));

    tracing::info!(http = %http_addr, "Server started");

    tokio::select! {
        result = http_server.with_graceful_shutdown(async { signal::ctrl_c().await.ok(); }) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "HTTP server error");
            }
        }
        _ = signal::ctrl_c() => {
            tracing::info!("Shutting down gracefully");
        }
    }

    scheduler_handle.abort();
    worker_handle.abort();
    tracing::info!("Server stopped");

    Ok(())
}
