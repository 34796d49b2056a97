//! Owned per-session pipeline state.
//!
//! A `SessionState` is created when a connection opens and is only ever
//! touched by that connection's processing loop, one frame at a time.

use image::GrayImage;

use crate::config::PipelineConfig;
use crate::telemetry::aggregate::ContactTally;
use crate::telemetry::classify::{is_smoothed_contact, Classifier};
use crate::telemetry::message::FrameTelemetry;
use crate::telemetry::smoothing::Ema;
use crate::vision::decode::{decode_frame, DecodeError};
use crate::vision::landmarks::{select_largest, FaceLandmarker};
use crate::vision::ocular::{self, OcularMeasurement};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FrameOutcome {
    /// No face (or no fittable landmarks); counters and EMA state untouched.
    NoFace(FrameTelemetry),
    Measured {
        telemetry: FrameTelemetry,
        instantaneous_contact: bool,
    },
}

impl FrameOutcome {
    pub fn telemetry(&self) -> FrameTelemetry {
        match self {
            FrameOutcome::NoFace(telemetry) => *telemetry,
            FrameOutcome::Measured { telemetry, .. } => *telemetry,
        }
    }

    pub fn face_detected(&self) -> bool {
        matches!(self, FrameOutcome::Measured { .. })
    }
}

#[derive(Debug, Clone)]
pub struct SessionState {
    ear_left: Ema,
    ear_right: Ema,
    contact: Ema,
    tally: ContactTally,
    classifier: Classifier,
}

impl SessionState {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            ear_left: Ema::new(config.ear_alpha),
            ear_right: Ema::new(config.ear_alpha),
            contact: Ema::new(config.contact_alpha),
            tally: ContactTally::new(),
            classifier: Classifier::new(config),
        }
    }

    pub fn tally(&self) -> &ContactTally {
        &self.tally
    }

    pub fn smoothed_ear(&self) -> (Option<f64>, Option<f64>) {
        (self.ear_left.value(), self.ear_right.value())
    }

    pub fn smoothed_contact(&self) -> Option<f64> {
        self.contact.value()
    }

    /// Decodes one payload and runs it through the pipeline.
    pub fn process_payload(
        &mut self,
        payload: &str,
        landmarker: &dyn FaceLandmarker,
        t: i64,
    ) -> Result<FrameOutcome, DecodeError> {
        let frame = decode_frame(payload)?;
        Ok(self.observe(&frame.luma, landmarker, t))
    }

    pub fn observe(&mut self, luma: &GrayImage, landmarker: &dyn FaceLandmarker, t: i64) -> FrameOutcome {
        let regions = landmarker.detect(luma);
        let Some(region) = select_largest(&regions) else {
            return self.no_face(t);
        };
        let Some(landmarks) = landmarker.landmarks(luma, region) else {
            return self.no_face(t);
        };

        let measurement = ocular::measure(luma, &landmarks);
        self.apply(&measurement, t)
    }

    pub fn no_face(&self, t: i64) -> FrameOutcome {
        FrameOutcome::NoFace(FrameTelemetry::neutral(t, self.tally.eye_contact_pct()))
    }

    /// Smooths, classifies and tallies one face measurement.
    pub fn apply(&mut self, measurement: &OcularMeasurement, t: i64) -> FrameOutcome {
        let ear_left = self.ear_left.update(measurement.left.ear);
        let ear_right = self.ear_right.update(measurement.right.ear);

        let classification = self.classifier.classify(
            ear_left,
            ear_right,
            measurement.confidence,
            measurement.gaze_magnitude(),
        );
        let instantaneous = classification.instantaneous_contact;
        let smoothed = self.contact.update(if instantaneous { 1.0 } else { 0.0 });
        let eye_contact_pct = self.tally.record(instantaneous);

        FrameOutcome::Measured {
            telemetry: FrameTelemetry {
                t,
                ear_left,
                ear_right,
                blink: classification.blink,
                eye_contact: is_smoothed_contact(smoothed),
                eye_contact_pct,
                gaze_vector: measurement.gaze,
                confidence: measurement.confidence,
            },
            instantaneous_contact: instantaneous,
        }
    }
}
