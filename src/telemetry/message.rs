use serde::{Deserialize, Serialize, Serializer};

/// Inbound client record. Only `"frame"` is acted on; every other `type`
/// (including the client's `"init"` handshake) is ignored.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientMessage {
    Frame {
        /// Encoded image, usually a data URL.
        data: String,
    },
    #[serde(other)]
    Other,
}

impl ClientMessage {
    /// Returns `None` for text that is not a tagged JSON record.
    pub fn parse(text: &str) -> Option<Self> {
        serde_json::from_str(text).ok()
    }
}

/// Outbound record, one per decoded frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameTelemetry {
    /// Epoch milliseconds at frame receipt.
    pub t: i64,
    #[serde(serialize_with = "round4")]
    pub ear_left: f64,
    #[serde(serialize_with = "round4")]
    pub ear_right: f64,
    pub blink: bool,
    pub eye_contact: bool,
    #[serde(serialize_with = "round3")]
    pub eye_contact_pct: f64,
    #[serde(serialize_with = "round3_pair")]
    pub gaze_vector: (f64, f64),
    #[serde(rename = "conf", serialize_with = "round3")]
    pub confidence: f64,
}

impl FrameTelemetry {
    /// Record for a frame without a detected face.
    pub fn neutral(t: i64, eye_contact_pct: f64) -> Self {
        Self {
            t,
            ear_left: 0.0,
            ear_right: 0.0,
            blink: false,
            eye_contact: false,
            eye_contact_pct,
            gaze_vector: (0.0, 0.0),
            confidence: 0.0,
        }
    }
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let scale = 10_f64.powi(decimals);
    (value * scale).round() / scale
}

fn round4<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(round_to(*value, 4))
}

fn round3<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(round_to(*value, 3))
}

fn round3_pair<S: Serializer>(value: &(f64, f64), serializer: S) -> Result<S::Ok, S::Error> {
    [round_to(value.0, 3), round_to(value.1, 3)].serialize(serializer)
}
