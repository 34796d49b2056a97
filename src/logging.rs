use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

#[derive(Debug, Clone)]
pub struct LogConfig {
    pub log_level: String,
    pub enable_file_logs: bool,
    pub log_dir: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            enable_file_logs: false,
            log_dir: "./logs".to_string(),
        }
    }
}

impl From<&crate::config::Config> for LogConfig {
    fn from(config: &crate::config::Config) -> Self {
        Self {
            log_level: config.log_level.clone(),
            enable_file_logs: config.enable_file_logs,
            log_dir: config.log_dir.clone(),
        }
    }
}

/// Installs the global subscriber. Safe to call more than once; later calls are no-ops.
pub fn init_tracing(config: &LogConfig) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let stdout_layer = fmt::layer().with_target(true).with_thread_ids(false);

    // 文件日志按天滚动，JSON 格式便于按会话字段检索
    let file_layer = config.enable_file_logs.then(|| {
        let appender = RollingFileAppender::builder()
            .rotation(Rotation::DAILY)
            .filename_prefix("gaze-telemetry")
            .filename_suffix("log")
            .max_log_files(14)
            .build(&config.log_dir)
            .expect("Failed to create rolling file appender");
        fmt::layer().with_writer(appender).with_ansi(false).json()
    });

    let result = Registry::default()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer)
        .try_init();

    // 测试环境中全局 subscriber 可能已被设置
    if let Err(e) = result {
        if !e.to_string().contains("already been set") {
            panic!("Failed to initialize tracing: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_is_idempotent() {
        let cfg = LogConfig::default();
        init_tracing(&cfg);
        init_tracing(&cfg);
    }

    #[test]
    fn log_config_follows_app_config() {
        let mut app = crate::config::Config::from_env();
        app.log_level = "debug".to_string();
        app.enable_file_logs = true;
        app.log_dir = "/tmp/gaze".to_string();

        let cfg = LogConfig::from(&app);
        assert_eq!(cfg.log_level, "debug");
        assert!(cfg.enable_file_logs);
        assert_eq!(cfg.log_dir, "/tmp/gaze");
    }
}
