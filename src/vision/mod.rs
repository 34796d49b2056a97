//! Per-frame vision primitives: payload decoding, face/landmark providers and
//! the ocular feature calculator.

pub mod decode;
pub mod landmarks;
pub mod ocular;

pub use decode::{decode_frame, DecodeError, DecodedFrame};
pub use landmarks::{FaceLandmarker, FaceRegion, LandmarkSet, Point};
pub use ocular::{EyeMetrics, OcularMeasurement};
