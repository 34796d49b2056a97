use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine as _};
use image::{DynamicImage, GrayImage, ImageFormat, Rgb, RgbImage};
use serde_json::{json, Value};

use gaze_telemetry::vision::landmarks::{FaceLandmarker, FaceRegion, LandmarkSet};

use super::app::test_landmarker;

pub const FRAME_SIZE: u32 = 200;
pub const BACKGROUND: u8 = 220;
pub const PUPIL: u8 = 30;

/// Pupil centres that sit in the middle of the coarse landmarker's eye boxes
/// for a full-frame face region.
pub const LEFT_PUPIL: (i64, i64) = (40, 65);
pub const RIGHT_PUPIL: (i64, i64) = (160, 65);

/// Light frame with two dark disks. A radius around 18 fills enough of each
/// eye box to count as eye contact; a radius of 3 stays below the
/// confidence floor.
pub fn face_frame(pupil_radius: i64) -> RgbImage {
    let r2 = pupil_radius * pupil_radius;
    RgbImage::from_fn(FRAME_SIZE, FRAME_SIZE, |x, y| {
        let (x, y) = (i64::from(x), i64::from(y));
        let inside = [LEFT_PUPIL, RIGHT_PUPIL]
            .iter()
            .any(|&(cx, cy)| (x - cx).pow(2) + (y - cy).pow(2) <= r2);
        if inside {
            Rgb([PUPIL, PUPIL, PUPIL])
        } else {
            Rgb([BACKGROUND, BACKGROUND, BACKGROUND])
        }
    })
}

/// Uniform frame; no region passes the contrast gate.
pub fn blank_frame() -> RgbImage {
    RgbImage::from_pixel(FRAME_SIZE, FRAME_SIZE, Rgb([128, 128, 128]))
}

pub fn data_url(img: &RgbImage) -> String {
    let mut buf = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img.clone())
        .write_to(&mut buf, ImageFormat::Png)
        .expect("encode png");
    format!(
        "data:image/png;base64,{}",
        BASE64_STANDARD.encode(buf.into_inner())
    )
}

pub fn frame_message(img: &RgbImage) -> Value {
    json!({
        "type": "frame",
        "data": data_url(img),
        "timestamp": 1_700_000_000_000_i64,
    })
}

/// Wraps the coarse landmarker and blocks in `detect` for a fixed delay,
/// counting every frame that reached the landmarker.
pub struct SlowLandmarker {
    inner: Arc<dyn FaceLandmarker>,
    delay: Duration,
    started: Arc<AtomicUsize>,
}

impl SlowLandmarker {
    pub fn new(delay: Duration) -> (Arc<dyn FaceLandmarker>, Arc<AtomicUsize>) {
        let started = Arc::new(AtomicUsize::new(0));
        let landmarker = Arc::new(Self {
            inner: test_landmarker(),
            delay,
            started: Arc::clone(&started),
        });
        (landmarker, started)
    }
}

impl FaceLandmarker for SlowLandmarker {
    fn name(&self) -> &'static str {
        "slow"
    }

    fn detect(&self, luma: &GrayImage) -> Vec<FaceRegion> {
        self.started.fetch_add(1, Ordering::SeqCst);
        std::thread::sleep(self.delay);
        self.inner.detect(luma)
    }

    fn landmarks(&self, luma: &GrayImage, region: &FaceRegion) -> Option<LandmarkSet> {
        self.inner.landmarks(luma, region)
    }
}
