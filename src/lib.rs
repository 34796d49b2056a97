pub mod config;
pub mod constants;
pub mod logging;
pub mod response;
pub mod routes;
pub mod state;
pub mod telemetry;
pub mod vision;
