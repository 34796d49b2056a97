use std::env;
use std::net::{IpAddr, Ipv4Addr};
use std::str::FromStr;

use crate::constants::{
    DEFAULT_CONTACT_EMA_ALPHA, DEFAULT_EAR_BLINK_THRESHOLD, DEFAULT_EAR_EMA_ALPHA,
    DEFAULT_GAZE_MAGNITUDE_THRESHOLD, DEFAULT_MAX_SESSIONS, DEFAULT_MIN_CONFIDENCE,
    DEFAULT_MIN_FACE_CONTRAST, DEFAULT_SESSION_QUEUE_DEPTH,
};

#[derive(Debug, Clone)]
pub struct Config {
    pub host: IpAddr,
    pub port: u16,
    pub log_level: String,
    pub enable_file_logs: bool,
    pub log_dir: String,
    pub cors_origin: String,
    pub limits: SessionLimits,
    pub landmarker: LandmarkerConfig,
    pub pipeline: PipelineConfig,
}

#[derive(Debug, Clone)]
pub struct SessionLimits {
    pub max_sessions: usize,
    pub queue_depth: usize,
}

impl Default for SessionLimits {
    fn default() -> Self {
        Self {
            max_sessions: DEFAULT_MAX_SESSIONS,
            queue_depth: DEFAULT_SESSION_QUEUE_DEPTH,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LandmarkerKind {
    Coarse,
    ShapeModel,
}

impl FromStr for LandmarkerKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "coarse" => Ok(Self::Coarse),
            "shape-model" | "shape_model" | "model" => Ok(Self::ShapeModel),
            other => Err(format!("unknown landmarker '{other}'")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LandmarkerConfig {
    pub kind: LandmarkerKind,
    pub model_path: String,
    pub min_face_contrast: f64,
}

impl Default for LandmarkerConfig {
    fn default() -> Self {
        Self {
            kind: LandmarkerKind::Coarse,
            model_path: "models/face_shape_68.json".to_string(),
            min_face_contrast: DEFAULT_MIN_FACE_CONTRAST,
        }
    }
}

impl LandmarkerConfig {
    pub fn validate(&self) -> Result<(), String> {
        // NaN 或负数会让对比度门限对任何帧都放行
        if !(self.min_face_contrast.is_finite() && self.min_face_contrast >= 0.0) {
            return Err("landmarker.min_face_contrast must be a finite value >= 0".to_string());
        }
        Ok(())
    }
}

/// Smoothing factors and classification thresholds, shared read-only by every session.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PipelineConfig {
    pub ear_alpha: f64,
    pub contact_alpha: f64,
    pub ear_blink_threshold: f64,
    pub min_confidence: f64,
    pub gaze_magnitude_threshold: f64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            ear_alpha: DEFAULT_EAR_EMA_ALPHA,
            contact_alpha: DEFAULT_CONTACT_EMA_ALPHA,
            ear_blink_threshold: DEFAULT_EAR_BLINK_THRESHOLD,
            min_confidence: DEFAULT_MIN_CONFIDENCE,
            gaze_magnitude_threshold: DEFAULT_GAZE_MAGNITUDE_THRESHOLD,
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<(), String> {
        // EMA 系数必须落在 (0,1]
        if !(self.ear_alpha > 0.0 && self.ear_alpha <= 1.0) {
            return Err("pipeline.ear_alpha must be in (0,1]".to_string());
        }
        if !(self.contact_alpha > 0.0 && self.contact_alpha <= 1.0) {
            return Err("pipeline.contact_alpha must be in (0,1]".to_string());
        }
        if !(self.ear_blink_threshold >= 0.0) {
            return Err("pipeline.ear_blink_threshold must be >= 0".to_string());
        }
        if !(0.0..=1.0).contains(&self.min_confidence) {
            return Err("pipeline.min_confidence must be in [0,1]".to_string());
        }
        if !(self.gaze_magnitude_threshold >= 0.0) {
            return Err("pipeline.gaze_magnitude_threshold must be >= 0".to_string());
        }
        Ok(())
    }
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = PipelineConfig::default();
        Self {
            host: env_or_parse("HOST", IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))),
            port: env_or_parse("PORT", 8000_u16),
            log_level: env_or("RUST_LOG", "info"),
            enable_file_logs: env_or_bool("ENABLE_FILE_LOGS", false),
            log_dir: env_or("LOG_DIR", "./logs"),
            cors_origin: env_or("CORS_ORIGIN", "*"),
            limits: SessionLimits {
                max_sessions: env_or_parse("MAX_SESSIONS", DEFAULT_MAX_SESSIONS),
                queue_depth: env_or_parse("SESSION_QUEUE_DEPTH", DEFAULT_SESSION_QUEUE_DEPTH)
                    .max(1),
            },
            landmarker: LandmarkerConfig {
                kind: env_or_parse("LANDMARKER", LandmarkerKind::Coarse),
                model_path: env_or("FACE_MODEL_PATH", "models/face_shape_68.json"),
                min_face_contrast: env_or_parse("MIN_FACE_CONTRAST", DEFAULT_MIN_FACE_CONTRAST),
            },
            pipeline: PipelineConfig {
                ear_alpha: env_or_parse("EAR_EMA_ALPHA", defaults.ear_alpha),
                contact_alpha: env_or_parse("CONTACT_EMA_ALPHA", defaults.contact_alpha),
                ear_blink_threshold: env_or_parse(
                    "EAR_BLINK_THRESHOLD",
                    defaults.ear_blink_threshold,
                ),
                min_confidence: env_or_parse("MIN_CONFIDENCE", defaults.min_confidence),
                gaze_magnitude_threshold: env_or_parse(
                    "GAZE_MAGNITUDE_THRESHOLD",
                    defaults.gaze_magnitude_threshold,
                ),
            },
        }
    }
}

pub fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

pub fn env_or_parse<T>(key: &str, default: T) -> T
where
    T: FromStr + Copy,
{
    match env::var(key) {
        Ok(raw) => match raw.parse::<T>() {
            Ok(v) => v,
            Err(_) => {
                tracing::warn!(
                    key,
                    value = %raw,
                    "Failed to parse env var, using default"
                );
                default
            }
        },
        Err(_) => default,
    }
}

pub fn env_or_bool(key: &str, default: bool) -> bool {
    match env::var(key) {
        Ok(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" => false,
            _ => default,
        },
        Err(_) => default,
    }
}
