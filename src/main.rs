use std::net::SocketAddr;

use axum::http::{header, HeaderValue};
use gaze_telemetry::config::Config;
use gaze_telemetry::logging::{init_tracing, LogConfig};
use gaze_telemetry::routes::build_router;
use gaze_telemetry::state::AppState;
use gaze_telemetry::vision::landmarks::build_landmarker;
use tokio::sync::broadcast;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let config = Config::from_env();

    init_tracing(&LogConfig::from(&config));
    tracing::info!("Starting gaze-telemetry");

    if let Err(e) = config.pipeline.validate() {
        panic!("FATAL: invalid pipeline configuration: {e}");
    }
    if let Err(e) = config.landmarker.validate() {
        panic!("FATAL: invalid landmarker configuration: {e}");
    }
    tracing::info!(pipeline = ?config.pipeline, "Pipeline configured");

    let landmarker = match build_landmarker(&config.landmarker) {
        Ok(landmarker) => landmarker,
        Err(e) => panic!("FATAL: failed to load face landmarker: {e}"),
    };
    tracing::info!(landmarker = landmarker.name(), "Face landmarker ready");

    let (shutdown_tx, _) = broadcast::channel::<()>(8);
    let state = AppState::new(&config, landmarker, shutdown_tx.clone());

    let app = build_router(state)
        .layer(build_cors_layer(&config))
        .layer(TraceLayer::new_for_http())
        .layer(CatchPanicLayer::new());

    let addr = SocketAddr::new(config.host, config.port);
    tracing::info!(%addr, "Listening");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind TCP listener");

    let server_future = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal(shutdown_tx));

    if let Err(e) = server_future.await {
        tracing::error!(error = %e, "HTTP server crashed");
    }
    tracing::info!("Shutdown complete");
}

fn build_cors_layer(config: &Config) -> CorsLayer {
    if config.cors_origin.trim() == "*" {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_credentials(false)
            .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
            .allow_methods(Any);
    }

    match config.cors_origin.parse::<HeaderValue>() {
        Ok(origin) => CorsLayer::new()
            .allow_origin(origin)
            .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
            .allow_methods(Any),
        Err(e) => {
            panic!(
                "FATAL: Invalid CORS_ORIGIN '{}': {}. \
                 Fix the CORS_ORIGIN environment variable.",
                config.cors_origin, e
            );
        }
    }
}

async fn shutdown_signal(shutdown_tx: broadcast::Sender<()>) {
    #[cfg(unix)]
    {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = sigterm.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }

    tracing::info!("Shutdown signal received");
    let _ = shutdown_tx.send(());
}
