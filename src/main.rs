mod cleanup;
mod config;
mod docx;
mod error;
mod geometry;
mod handlers;
mod layout;
mod orchestrator;
mod pdf;
mod stats;
mod strategies;
mod table;
mod xlsx;

use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tokio::sync::watch;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use config::Config;
use handlers::{
    collage_handler, convert_excel_handler, convert_file_handler, convert_image_handler,
    convert_word_handler, health_handler, info_handler, stats_handler, AppState,
};
use orchestrator::Orchestrator;
use stats::ConversionStats;

#[tokio::main]
async fn main() {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pdfpress=info,tower_http=info".into()),
        )
        .init();

    let config = Config::from_env();
    std::fs::create_dir_all(&config.temp_dir).unwrap();

    let stats = Arc::new(ConversionStats::default());
    let orchestrator = Orchestrator::new(&config, Arc::clone(&stats));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sweeper = cleanup::spawn_cleanup_task(
        config.temp_dir.clone(),
        config.cleanup_interval,
        config.temp_retention,
        shutdown_rx,
    );

    let addr = config.addr.clone();
    let max_body = config.max_file_size_mb * 1024 * 1024;
    let state = Arc::new(AppState {
        orchestrator,
        config,
        started: Instant::now(),
    });

    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Build the application router
    let app = Router::new()
        .route("/api/convert/file", post(convert_file_handler))
        .route("/api/convert/excel-to-pdf", post(convert_excel_handler))
        .route("/api/convert/word-to-pdf", post(convert_word_handler))
        .route("/api/convert/image-to-pdf", post(convert_image_handler))
        .route("/api/convert/images-collage", post(collage_handler))
        .route("/api/stats", get(stats_handler))
        .route("/health", get(health_handler))
        .route("/info", get(info_handler))
        .route("/", get(info_handler))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(max_body))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state);

    // Start the server
    let listener = tokio::net::TcpListener::bind(&addr).await.unwrap();

    info!("🚀 PDFPress server running on http://{}", addr);
    info!("📖 API documentation: http://{}/info", addr);
    info!("🔄 Convert files: POST http://{}/api/convert/file", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .unwrap();

    // Stop the background sweep before exiting.
    let _ = shutdown_tx.send(true);
    let _ = sweeper.await;
    info!("shutdown complete");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(_) => std::future::pending().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    info!("shutdown signal received");
}
