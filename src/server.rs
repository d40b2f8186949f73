//! Wires a repository and a remote store into a running HTTP server.

use crate::adapters::http::{router, AppState};
use crate::adapters::identity::HttpTokenValidator;
use crate::adapters::local::TokioCommandRunner;
use crate::application::cleanup::CleanupPool;
use crate::application::pipeline::PipelineService;
use crate::application::reconcile::Reconciler;
use crate::config::AppConfig;
use crate::ports::repository::VideoRepository;
use crate::ports::storage::RemoteStore;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

const IDENTITY_TIMEOUT: Duration = Duration::from_secs(10);

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Installs the global subscriber; `RUST_LOG` overrides the default level.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,tower_http=debug"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Loads `.env`, starts tracing, then reads the configuration so that
/// warnings about bad settings reach the subscriber.
pub fn bootstrap() -> AppConfig {
    dotenv::dotenv().ok();
    init_tracing();
    AppConfig::from_env()
}

/// Serves until ctrl-c, then drains the cleanup queue before returning.
pub async fn run<R, S>(config: &AppConfig, repo: R, store: S) -> Result<(), BoxError>
where
    R: VideoRepository + Clone + 'static,
    S: RemoteStore + 'static,
{
    tokio::fs::create_dir_all(&config.scratch_dir).await?;
    let spool_dir = config.scratch_dir.join(".uploads");
    tokio::fs::create_dir_all(&spool_dir).await?;

    // 1. Background workers
    let (pool, cleanup) = CleanupPool::start(config.cleanup_settings());
    let shutdown = CancellationToken::new();
    let reconciler = Arc::new(Reconciler::new(
        repo.clone(),
        cleanup.clone(),
        config.scratch_dir.clone(),
        config.stale_processing,
    ));
    let reconcile_task = reconciler.start(config.reconcile_interval, shutdown.clone());

    // 2. Application service
    let service = Arc::new(PipelineService::new(
        repo,
        store,
        TokioCommandRunner::new(config.tool_timeout),
        cleanup,
        config.pipeline_settings(),
    ));
    let auth = Arc::new(HttpTokenValidator::new(
        config.identity_url.clone(),
        IDENTITY_TIMEOUT,
    )?);

    // 3. HTTP layer
    let app = router(AppState {
        service,
        auth,
        spool_dir,
        max_upload_bytes: config.max_upload_bytes,
    });

    let listener = tokio::net::TcpListener::bind(config.bind_addr()).await?;
    info!(addr = %config.bind_addr(), "listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("shutting down");
    shutdown.cancel();
    if let Err(e) = reconcile_task.await {
        error!(error = %e, "reconciler task failed");
    }
    let stats = pool.stats();
    pool.shutdown().await;
    info!(
        completed = stats.completed(),
        retried = stats.retried(),
        orphaned = stats.orphaned(),
        "cleanup pool drained"
    );
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}
