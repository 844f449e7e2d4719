mod adapters;
mod application;
mod config;
mod domain;
mod interface;
mod ports;

use std::sync::Arc;

use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use adapters::{ProcfsConfig, ProcfsSystemSource, SqliteStore};
use application::{detect_identity, MonitoringService, QueryEngine, Sampler, SamplerConfig};
use config::Config;
use domain::NicClassifier;
use interface::http::{create_router, AppState};
use ports::{MetricSource, MetricStore};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("hostpulse={},tower_http=info", config.log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting hostpulse v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration: {:?}", config);

    // Metric source and static host facts
    let procfs_config = ProcfsConfig::new(config.proc_path.clone(), config.sys_path.clone())
        .with_root_mount(config.root_mount.clone());
    let source: Arc<dyn MetricSource> = Arc::new(ProcfsSystemSource::new(procfs_config));
    let identity = detect_identity(source.as_ref()).await;
    info!(hostname = %identity.hostname, cpu = %identity.cpu_model, "Host detected");

    let classifier = NicClassifier::new(config.virtual_nic_prefixes.clone());
    let default_nic = match source.list_network_interfaces().await {
        Ok(interfaces) => classifier.select_default(&interfaces),
        Err(e) => {
            warn!(error = %e, "Failed to list interfaces, defaulting to lo");
            "lo".to_string()
        }
    };
    info!(nic = %default_nic, "Default network interface selected");

    // Storage
    let store: Arc<dyn MetricStore> = Arc::new(SqliteStore::open(&config.db_path).await?);
    info!("Metrics database ready ({} samples)", store.len().await?);

    // Sampler task
    let cancel = CancellationToken::new();
    let sampler = Sampler::new(
        Arc::clone(&source),
        Arc::clone(&store),
        default_nic.clone(),
        SamplerConfig {
            interval: config.collect_interval(),
            retention: config.retention(),
            max_net_rate: config.max_net_rate,
            ..Default::default()
        },
    );
    let sampler_handle = tokio::spawn(sampler.run(cancel.clone()));

    // HTTP server
    let state = AppState {
        monitoring: Arc::new(MonitoringService::new(
            Arc::clone(&source),
            identity,
            classifier,
            default_nic,
        )),
        query: Arc::new(QueryEngine::new(Arc::clone(&store), config.collect_interval())),
        store,
    };
    let app = create_router(state, config.static_dir.clone());
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!("hostpulse listening on {}", addr);
    info!("  → API: http://localhost:{}/api/metrics?range=1h", config.port);

    let shutdown = cancel.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            info!("Shutdown requested");
            shutdown.cancel();
        })
        .await?;

    // Server drained; make sure the sampler stops even if the server exited on its own
    cancel.cancel();
    if let Err(e) = sampler_handle.await {
        error!(error = %e, "Sampler task failed");
    }

    info!("hostpulse stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
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
