use std::sync::Arc;

use axum::Router;
use tokio::sync::broadcast;

use gaze_telemetry::config::{
    Config, LandmarkerConfig, LandmarkerKind, PipelineConfig, SessionLimits,
};
use gaze_telemetry::routes::build_router;
use gaze_telemetry::state::AppState;
use gaze_telemetry::vision::landmarks::{build_landmarker, FaceLandmarker};

pub struct TestApp {
    pub app: Router,
    pub state: AppState,
    pub config: Config,
}

pub fn test_config(max_sessions: usize) -> Config {
    // 直接构造 Config，避免使用 set_var 造成多线程测试环境变量竞态
    Config {
        host: std::net::IpAddr::V4(std::net::Ipv4Addr::new(127, 0, 0, 1)),
        port: 8000,
        log_level: "info".to_string(),
        enable_file_logs: false,
        log_dir: "./logs".to_string(),
        cors_origin: "*".to_string(),
        limits: SessionLimits {
            max_sessions,
            queue_depth: 4,
        },
        landmarker: LandmarkerConfig {
            kind: LandmarkerKind::Coarse,
            model_path: String::new(),
            min_face_contrast: 2.0,
        },
        pipeline: PipelineConfig::default(),
    }
}

pub fn test_landmarker() -> Arc<dyn FaceLandmarker> {
    build_landmarker(&test_config(1).landmarker).expect("coarse landmarker")
}

async fn spawn_with_limits(max_sessions: usize) -> TestApp {
    let config = test_config(max_sessions);
    let landmarker = build_landmarker(&config.landmarker).expect("coarse landmarker");
    spawn_with(config, landmarker)
}

fn spawn_with(config: Config, landmarker: Arc<dyn FaceLandmarker>) -> TestApp {
    let (shutdown_tx, _) = broadcast::channel::<()>(8);

    let state = AppState::new(&config, landmarker, shutdown_tx);
    let app = build_router(state.clone());

    TestApp { app, state, config }
}

pub async fn spawn_test_app() -> TestApp {
    spawn_with_limits(8).await
}

pub async fn spawn_test_app_with_limit(max_sessions: usize) -> TestApp {
    spawn_with_limits(max_sessions).await
}

pub async fn spawn_test_app_with_landmarker(
    landmarker: Arc<dyn FaceLandmarker>,
    queue_depth: usize,
) -> TestApp {
    let mut config = test_config(8);
    config.limits.queue_depth = queue_depth;
    spawn_with(config, landmarker)
}
