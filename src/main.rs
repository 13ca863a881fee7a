use std::sync::Arc;
use std::time::Duration;

use axum::{routing::get, routing::post, Router};
use metrics_exporter_prometheus::PrometheusBuilder;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use dam_packer::app_state::AppState;
use dam_packer::config::AppConfig;
use dam_packer::db;
use dam_packer::routes;
use dam_packer::services::pipeline::TransferPipeline;
use dam_packer::services::processor::JobProcessor;
use dam_packer::services::profiles::ProfileResolver;
use dam_packer::services::store::JobStore;
use dam_packer::services::transfer::RcloneTransferTool;

#[tokio::main]
async fn main() {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    // Load configuration from environment
    let config = AppConfig::from_env().expect("Failed to load configuration from environment");

    tracing::info!("Initializing dam-packer server");

    // Initialize Prometheus metrics recorder
    let prometheus_handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus metrics recorder");
    let prometheus_handle = Arc::new(prometheus_handle);

    // Register application metrics
    metrics::describe_counter!("jobs_submitted_total", "Total packaging jobs submitted");
    metrics::describe_counter!("jobs_completed_total", "Total packaging jobs completed");
    metrics::describe_counter!("jobs_failed_total", "Total packaging jobs that failed");
    metrics::describe_gauge!("queue_depth", "Current number of pending jobs in the queue");
    metrics::describe_histogram!(
        "job_processing_seconds",
        "Time to run one job through the transfer pipeline"
    );

    // Initialize database connection pool
    tracing::info!("Opening SQLite database");
    let db_pool = db::init_pool(&config.database_url)
        .await
        .expect("Failed to open database");

    // Run database migrations
    tracing::info!("Running database migrations");
    db::run_migrations(&db_pool)
        .await
        .expect("Failed to run database migrations");

    let store = Arc::new(JobStore::new(db_pool.clone()));

    // Background worker: drains the job queue one job at a time.
    let tool = Arc::new(RcloneTransferTool::new(&config.rclone_binary));
    let pipeline = TransferPipeline::new(store.clone(), tool, &config.work_root);
    let processor = JobProcessor::new(
        store.clone(),
        ProfileResolver::new(&config.profiles_dir),
        pipeline,
        Duration::from_secs(config.poll_interval_secs),
    );
    tokio::spawn(processor.run());

    // Create shared application state
    let state = AppState::new(db_pool, store, &config.api_key);

    // Build API routes
    let app = Router::new()
        .route("/health", get(routes::health::health_check))
        .route("/api/v1/jobs", post(routes::jobs::submit_job))
        .route("/api/v1/jobs/{job_id}", get(routes::jobs::get_job_status))
        .with_state(state)
        // Prometheus metrics endpoint (separate state)
        .route(
            "/metrics",
            get(routes::metrics::prometheus_metrics).with_state(prometheus_handle),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(RequestBodyLimitLayer::new(1024 * 1024)); // 1 MB limit; manifests are small

    tracing::info!("Starting dam-packer on {}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app).await.expect("Server error");
}
