//! Per-session temporal state: smoothing, classification and aggregation of
//! the ocular measurements, plus the wire records exchanged with clients.

pub mod aggregate;
pub mod classify;
pub mod message;
pub mod session;
pub mod smoothing;

pub use aggregate::ContactTally;
pub use classify::{Classification, Classifier};
pub use message::{ClientMessage, FrameTelemetry};
pub use session::{FrameOutcome, SessionState};
pub use smoothing::Ema;
