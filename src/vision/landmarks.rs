//! Face/landmark providers.
//!
//! Face localization and landmark regression are external capabilities. The
//! pipeline only sees the [`FaceLandmarker`] trait; which implementation runs
//! is decided once at startup from [`LandmarkerConfig`].

use std::ops::Range;
use std::path::Path;
use std::sync::Arc;

use image::GrayImage;
use serde::Deserialize;
use thiserror::Error;

use crate::config::{LandmarkerConfig, LandmarkerKind};
use crate::constants::{FACE_LANDMARK_COUNT, LEFT_EYE_RANGE, RIGHT_EYE_RANGE};

/// Eye band of the coarse fallback, as fractions of the face box.
const COARSE_EYE_TOP: f64 = 0.20;
const COARSE_EYE_BOTTOM: f64 = 0.45;
const COARSE_LEFT_EYE_X: (f64, f64) = (0.0, 0.4);
const COARSE_RIGHT_EYE_X: (f64, f64) = (0.6, 1.0);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Point) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

/// Six eye points: outer corner, two upper lid points, inner corner, two lower lid points.
pub type EyePoints = [Point; 6];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaceRegion {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl FaceRegion {
    pub const fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn area(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }
}

/// Picks the region with the largest area; the first one wins on ties.
pub fn select_largest(regions: &[FaceRegion]) -> Option<&FaceRegion> {
    regions.iter().fold(None, |best, region| match best {
        Some(current) if current.area() >= region.area() => Some(current),
        _ => Some(region),
    })
}

/// Ordered landmark points of one face together with the index ranges of the
/// two eye subsets.
#[derive(Debug, Clone, PartialEq)]
pub struct LandmarkSet {
    points: Vec<Point>,
    left_eye: Range<usize>,
    right_eye: Range<usize>,
}

impl LandmarkSet {
    /// Full 68-point face layout. Returns `None` when the eye ranges are not covered.
    pub fn face68(points: Vec<Point>) -> Option<Self> {
        if points.len() < RIGHT_EYE_RANGE.end {
            return None;
        }
        Some(Self {
            points,
            left_eye: LEFT_EYE_RANGE,
            right_eye: RIGHT_EYE_RANGE,
        })
    }

    /// Eye-only layout produced by region-level providers.
    pub fn eyes_only(left: EyePoints, right: EyePoints) -> Self {
        let mut points = Vec::with_capacity(12);
        points.extend_from_slice(&left);
        points.extend_from_slice(&right);
        Self {
            points,
            left_eye: 0..6,
            right_eye: 6..12,
        }
    }

    pub fn left_eye(&self) -> EyePoints {
        self.eye(&self.left_eye)
    }

    pub fn right_eye(&self) -> EyePoints {
        self.eye(&self.right_eye)
    }

    fn eye(&self, range: &Range<usize>) -> EyePoints {
        let mut eye = [Point::new(0.0, 0.0); 6];
        eye.copy_from_slice(&self.points[range.clone()]);
        eye
    }
}

/// Face localization and landmark extraction over a luminance grid.
pub trait FaceLandmarker: Send + Sync {
    fn name(&self) -> &'static str;

    /// Candidate face regions, in detector order.
    fn detect(&self, luma: &GrayImage) -> Vec<FaceRegion>;

    /// Landmarks for one region. `None` means the region could not be fitted.
    fn landmarks(&self, luma: &GrayImage, region: &FaceRegion) -> Option<LandmarkSet>;
}

/// Region-level face detection, shared by the landmark providers below.
pub trait RegionDetector: Send + Sync {
    fn detect(&self, luma: &GrayImage) -> Vec<FaceRegion>;
}

/// Treats the whole frame as the face region when it carries enough contrast.
///
/// Webcam clients send head-and-shoulders frames; a covered or blank camera
/// has a near-constant luminance and yields no region.
#[derive(Debug, Clone)]
pub struct ContrastRegionDetector {
    min_std_dev: f64,
}

impl ContrastRegionDetector {
    pub fn new(min_std_dev: f64) -> Self {
        Self { min_std_dev }
    }
}

impl RegionDetector for ContrastRegionDetector {
    fn detect(&self, luma: &GrayImage) -> Vec<FaceRegion> {
        let (width, height) = luma.dimensions();
        let n = f64::from(width) * f64::from(height);
        if n == 0.0 {
            return Vec::new();
        }

        let (sum, sum_sq) = luma.pixels().fold((0.0, 0.0), |(s, sq), p| {
            let v = f64::from(p.0[0]);
            (s + v, sq + v * v)
        });
        let mean = sum / n;
        let std_dev = (sum_sq / n - mean * mean).max(0.0).sqrt();

        if std_dev < self.min_std_dev {
            return Vec::new();
        }
        vec![FaceRegion::new(0, 0, width, height)]
    }
}

/// Region-only fallback: eye geometry is synthesized from fixed face proportions.
///
/// The EAR it yields is constant for a given box shape, so blinks are never
/// reported; gaze still follows the pupil inside the synthesized eye boxes.
pub struct CoarseLandmarker<D = ContrastRegionDetector> {
    detector: D,
}

impl<D: RegionDetector> CoarseLandmarker<D> {
    pub fn new(detector: D) -> Self {
        Self { detector }
    }
}

fn synthesized_eye(region: &FaceRegion, span: (f64, f64)) -> EyePoints {
    let w = f64::from(region.width);
    let h = f64::from(region.height);
    let x0 = f64::from(region.x) + span.0 * w;
    let x1 = f64::from(region.x) + span.1 * w;
    let top = f64::from(region.y) + COARSE_EYE_TOP * h;
    let bottom = f64::from(region.y) + COARSE_EYE_BOTTOM * h;
    let mid = (top + bottom) / 2.0;
    let third = (x1 - x0) / 3.0;

    [
        Point::new(x0, mid),
        Point::new(x0 + third, top),
        Point::new(x0 + 2.0 * third, top),
        Point::new(x1, mid),
        Point::new(x0 + 2.0 * third, bottom),
        Point::new(x0 + third, bottom),
    ]
}

impl<D: RegionDetector> FaceLandmarker for CoarseLandmarker<D> {
    fn name(&self) -> &'static str {
        "coarse"
    }

    fn detect(&self, luma: &GrayImage) -> Vec<FaceRegion> {
        self.detector.detect(luma)
    }

    fn landmarks(&self, _luma: &GrayImage, region: &FaceRegion) -> Option<LandmarkSet> {
        if region.area() == 0 {
            return None;
        }
        Some(LandmarkSet::eyes_only(
            synthesized_eye(region, COARSE_LEFT_EYE_X),
            synthesized_eye(region, COARSE_RIGHT_EYE_X),
        ))
    }
}

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("failed to read shape model {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid shape model: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("shape model has {found} points, expected {expected}")]
    PointCount { expected: usize, found: usize },
    #[error("shape model point {index} lies outside the unit face box")]
    OutOfRange { index: usize },
}

#[derive(Debug, Deserialize)]
struct ShapeModelFile {
    points: Vec<[f64; 2]>,
}

/// 68-point shape model in face-box coordinates (`[0,1]²`).
#[derive(Debug, Clone, PartialEq)]
pub struct ShapeModel {
    points: Vec<Point>,
}

impl ShapeModel {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ModelError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ModelError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self, ModelError> {
        let file: ShapeModelFile = serde_json::from_str(raw)?;
        if file.points.len() != FACE_LANDMARK_COUNT {
            return Err(ModelError::PointCount {
                expected: FACE_LANDMARK_COUNT,
                found: file.points.len(),
            });
        }
        if let Some(index) = file
            .points
            .iter()
            .position(|[x, y]| !(0.0..=1.0).contains(x) || !(0.0..=1.0).contains(y))
        {
            return Err(ModelError::OutOfRange { index });
        }

        Ok(Self {
            points: file.points.iter().map(|[x, y]| Point::new(*x, *y)).collect(),
        })
    }

    pub fn project(&self, region: &FaceRegion) -> Vec<Point> {
        let w = f64::from(region.width);
        let h = f64::from(region.height);
        self.points
            .iter()
            .map(|p| Point::new(f64::from(region.x) + p.x * w, f64::from(region.y) + p.y * h))
            .collect()
    }
}

/// 68-point provider backed by a mean-shape artifact loaded at startup.
///
/// The shape is projected into the detected face box without looking at the
/// pixels, so eye geometry follows fixed model proportions per face box; it
/// is a finer layout than [`CoarseLandmarker`], not a per-frame landmark fit.
pub struct ShapeModelLandmarker<D = ContrastRegionDetector> {
    detector: D,
    model: ShapeModel,
}

impl<D: RegionDetector> ShapeModelLandmarker<D> {
    pub fn new(detector: D, model: ShapeModel) -> Self {
        Self { detector, model }
    }
}

impl<D: RegionDetector> FaceLandmarker for ShapeModelLandmarker<D> {
    fn name(&self) -> &'static str {
        "shape-model"
    }

    fn detect(&self, luma: &GrayImage) -> Vec<FaceRegion> {
        self.detector.detect(luma)
    }

    fn landmarks(&self, _luma: &GrayImage, region: &FaceRegion) -> Option<LandmarkSet> {
        if region.area() == 0 {
            return None;
        }
        LandmarkSet::face68(self.model.project(region))
    }
}

/// Builds the provider selected by configuration. Model artifacts are loaded here, once.
pub fn build_landmarker(config: &LandmarkerConfig) -> Result<Arc<dyn FaceLandmarker>, ModelError> {
    let detector = ContrastRegionDetector::new(config.min_face_contrast);
    match config.kind {
        LandmarkerKind::Coarse => Ok(Arc::new(CoarseLandmarker::new(detector))),
        LandmarkerKind::ShapeModel => {
            let model = ShapeModel::load(&config.model_path)?;
            tracing::info!(path = %config.model_path, "Loaded face shape model");
            Ok(Arc::new(ShapeModelLandmarker::new(detector, model)))
        }
    }
}
