use crate::config::PipelineConfig;
use crate::constants::SMOOTHED_CONTACT_CUTOFF;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub blink: bool,
    /// Raw per-frame decision; this is what the session tally counts.
    pub instantaneous_contact: bool,
}

/// Threshold checks over smoothed EAR and raw gaze measurements.
#[derive(Debug, Clone, Copy)]
pub struct Classifier {
    ear_blink_threshold: f64,
    min_confidence: f64,
    gaze_magnitude_threshold: f64,
}

impl Classifier {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            ear_blink_threshold: config.ear_blink_threshold,
            min_confidence: config.min_confidence,
            gaze_magnitude_threshold: config.gaze_magnitude_threshold,
        }
    }

    pub fn is_blink(&self, smoothed_left_ear: f64, smoothed_right_ear: f64) -> bool {
        smoothed_left_ear < self.ear_blink_threshold
            || smoothed_right_ear < self.ear_blink_threshold
    }

    /// Both bounds are inclusive.
    pub fn is_contact(&self, confidence: f64, gaze_magnitude: f64) -> bool {
        confidence >= self.min_confidence && gaze_magnitude <= self.gaze_magnitude_threshold
    }

    pub fn classify(
        &self,
        smoothed_left_ear: f64,
        smoothed_right_ear: f64,
        confidence: f64,
        gaze_magnitude: f64,
    ) -> Classification {
        Classification {
            blink: self.is_blink(smoothed_left_ear, smoothed_right_ear),
            instantaneous_contact: self.is_contact(confidence, gaze_magnitude),
        }
    }
}

/// Hysteresis-by-smoothing: the reported contact flag.
pub fn is_smoothed_contact(smoothed_indicator: f64) -> bool {
    smoothed_indicator > SMOOTHED_CONTACT_CUTOFF
}
