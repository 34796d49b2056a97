//! Ocular feature calculator.
//!
//! - EAR (Eye Aspect Ratio): `(|p1-p5| + |p2-p4|) / (2·|p0-p3| + ε)`
//! - Gaze: pupil centroid inside the eye bounding box, normalized to
//!   roughly `[-1, 1]` on each axis, with a blob-size confidence proxy.

use image::{imageops, GrayImage, Luma};
use imageproc::contours::{find_contours, BorderType};
use imageproc::contrast::otsu_level;
use imageproc::filter::gaussian_blur_f32;
use imageproc::point::Point as PixelPoint;

use crate::constants::{AREA_EPSILON, EAR_EPSILON, PUPIL_BLUR_SIGMA};
use crate::vision::landmarks::{EyePoints, LandmarkSet};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GazeEstimate {
    /// Pupil offset from the eye box center; positive x is right, positive y is down.
    pub offset: (f64, f64),
    /// Detected blob area over box area, clamped to 1. Not a calibrated probability.
    pub confidence: f64,
}

impl GazeEstimate {
    pub const NONE: Self = Self {
        offset: (0.0, 0.0),
        confidence: 0.0,
    };
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EyeMetrics {
    pub ear: f64,
    pub gaze: (f64, f64),
    pub confidence: f64,
}

/// Raw (unsmoothed) measurements for one face.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OcularMeasurement {
    pub left: EyeMetrics,
    pub right: EyeMetrics,
    /// Mean of both eyes' offsets.
    pub gaze: (f64, f64),
    /// Mean of both eyes' confidences.
    pub confidence: f64,
}

impl OcularMeasurement {
    pub fn gaze_magnitude(&self) -> f64 {
        self.gaze.0.hypot(self.gaze.1)
    }
}

pub fn eye_aspect_ratio(eye: &EyePoints) -> f64 {
    let a = eye[1].distance(&eye[5]);
    let b = eye[2].distance(&eye[4]);
    let c = eye[0].distance(&eye[3]);
    (a + b) / (2.0 * c + EAR_EPSILON)
}

/// Integer bounding box of the eye points, clipped to the frame.
fn eye_box(luma: &GrayImage, eye: &EyePoints) -> Option<(u32, u32, u32, u32)> {
    let (frame_w, frame_h) = luma.dimensions();
    let min_x = eye.iter().map(|p| p.x).fold(f64::INFINITY, f64::min).floor();
    let max_x = eye.iter().map(|p| p.x).fold(f64::NEG_INFINITY, f64::max).floor();
    let min_y = eye.iter().map(|p| p.y).fold(f64::INFINITY, f64::min).floor();
    let max_y = eye.iter().map(|p| p.y).fold(f64::NEG_INFINITY, f64::max).floor();
    if !(min_x.is_finite() && max_x.is_finite() && min_y.is_finite() && max_y.is_finite()) {
        return None;
    }

    let x0 = min_x.max(0.0);
    let y0 = min_y.max(0.0);
    let x1 = (max_x + 1.0).min(f64::from(frame_w));
    let y1 = (max_y + 1.0).min(f64::from(frame_h));
    if x1 <= x0 || y1 <= y0 {
        return None;
    }

    Some((x0 as u32, y0 as u32, (x1 - x0) as u32, (y1 - y0) as u32))
}

#[derive(Debug, Clone, Copy, Default)]
struct PolygonMoments {
    m00: f64,
    m10: f64,
    m01: f64,
}

/// Spatial moments of a closed polygon (Green's theorem), oriented so `m00 >= 0`.
fn polygon_moments(points: &[PixelPoint<i32>]) -> PolygonMoments {
    if points.len() < 3 {
        return PolygonMoments::default();
    }

    let mut m = PolygonMoments::default();
    for (i, a) in points.iter().enumerate() {
        let b = &points[(i + 1) % points.len()];
        let (xa, ya) = (f64::from(a.x), f64::from(a.y));
        let (xb, yb) = (f64::from(b.x), f64::from(b.y));
        let cross = xa * yb - xb * ya;
        m.m00 += cross;
        m.m10 += (xa + xb) * cross;
        m.m01 += (ya + yb) * cross;
    }
    m.m00 /= 2.0;
    m.m10 /= 6.0;
    m.m01 /= 6.0;

    if m.m00 < 0.0 {
        m.m00 = -m.m00;
        m.m10 = -m.m10;
        m.m01 = -m.m01;
    }
    m
}

pub fn estimate_gaze(luma: &GrayImage, eye: &EyePoints) -> GazeEstimate {
    let Some((x, y, w, h)) = eye_box(luma, eye) else {
        return GazeEstimate::NONE;
    };
    let crop = imageops::crop_imm(luma, x, y, w, h).to_image();

    // 无对比度的区域不可能分离出瞳孔
    let (lo, hi) = crop
        .pixels()
        .fold((u8::MAX, u8::MIN), |(lo, hi), p| (lo.min(p.0[0]), hi.max(p.0[0])));
    if lo == hi {
        return GazeEstimate::NONE;
    }

    let blurred = gaussian_blur_f32(&crop, PUPIL_BLUR_SIGMA);
    let level = otsu_level(&blurred);
    let binary = GrayImage::from_fn(w, h, |px, py| {
        if blurred.get_pixel(px, py).0[0] <= level {
            Luma([255])
        } else {
            Luma([0])
        }
    });

    // Nested outer borders sit inside a hole of a larger blob, so the largest
    // outer border is always an external one.
    let largest = find_contours::<i32>(&binary)
        .into_iter()
        .filter(|c| c.border_type == BorderType::Outer)
        .map(|c| polygon_moments(&c.points))
        .fold(None::<PolygonMoments>, |best, m| match best {
            Some(current) if current.m00 >= m.m00 => Some(current),
            _ => Some(m),
        });

    let Some(moments) = largest else {
        return GazeEstimate::NONE;
    };
    if moments.m00 <= 0.0 {
        return GazeEstimate::NONE;
    }

    let cx = (moments.m10 / moments.m00).trunc();
    let cy = (moments.m01 / moments.m00).trunc();
    let half_w = f64::from(w) / 2.0;
    let half_h = f64::from(h) / 2.0;
    let box_area = f64::from(w) * f64::from(h);

    GazeEstimate {
        offset: ((cx - half_w) / half_w, (cy - half_h) / half_h),
        confidence: (moments.m00 / (box_area + AREA_EPSILON)).min(1.0),
    }
}

pub fn measure_eye(luma: &GrayImage, eye: &EyePoints) -> EyeMetrics {
    let gaze = estimate_gaze(luma, eye);
    EyeMetrics {
        ear: eye_aspect_ratio(eye),
        gaze: gaze.offset,
        confidence: gaze.confidence,
    }
}

pub fn measure(luma: &GrayImage, landmarks: &LandmarkSet) -> OcularMeasurement {
    let left = measure_eye(luma, &landmarks.left_eye());
    let right = measure_eye(luma, &landmarks.right_eye());

    OcularMeasurement {
        left,
        right,
        gaze: (
            (left.gaze.0 + right.gaze.0) / 2.0,
            (left.gaze.1 + right.gaze.1) / 2.0,
        ),
        confidence: ((left.confidence + right.confidence) / 2.0).min(1.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vision::landmarks::Point;

    /// Eye outline spanning `[x0, x0+39] x [y0, y0+19]`.
    fn eye_at(x0: f64, y0: f64) -> EyePoints {
        [
            Point::new(x0, y0 + 10.0),
            Point::new(x0 + 13.0, y0),
            Point::new(x0 + 26.0, y0),
            Point::new(x0 + 39.0, y0 + 10.0),
            Point::new(x0 + 26.0, y0 + 19.0),
            Point::new(x0 + 13.0, y0 + 19.0),
        ]
    }

    fn frame_with_pupils(width: u32, height: u32, pupils: &[(f64, f64)]) -> GrayImage {
        GrayImage::from_fn(width, height, |x, y| {
            let dark = pupils.iter().any(|(cx, cy)| {
                let dx = f64::from(x) - cx;
                let dy = f64::from(y) - cy;
                dx * dx + dy * dy <= 16.0
            });
            if dark {
                Luma([30])
            } else {
                Luma([210])
            }
        })
    }

    #[test]
    fn flat_eye_has_zero_ear() {
        let eye = [
            Point::new(0.0, 5.0),
            Point::new(1.0, 5.0),
            Point::new(2.0, 5.0),
            Point::new(3.0, 5.0),
            Point::new(2.0, 5.0),
            Point::new(1.0, 5.0),
        ];
        assert!(eye_aspect_ratio(&eye).abs() < 1e-9);
    }

    #[test]
    fn degenerate_eye_does_not_divide_by_zero() {
        let eye = [Point::new(3.0, 3.0); 6];
        let ear = eye_aspect_ratio(&eye);
        assert!(ear.is_finite());
        assert_eq!(ear, 0.0);
    }

    #[test]
    fn open_eye_ear() {
        let eye = [
            Point::new(0.0, 0.0),
            Point::new(1.0, -1.0),
            Point::new(2.0, -1.0),
            Point::new(3.0, 0.0),
            Point::new(2.0, 1.0),
            Point::new(1.0, 1.0),
        ];
        assert!((eye_aspect_ratio(&eye) - 4.0 / 6.0).abs() < 1e-6);
    }

    #[test]
    fn pupil_right_of_center_gives_positive_x() {
        let luma = frame_with_pupils(40, 20, &[(28.0, 10.0)]);
        let gaze = estimate_gaze(&luma, &eye_at(0.0, 0.0));

        assert!(gaze.offset.0 > 0.25, "offset {:?}", gaze.offset);
        assert!(gaze.offset.1.abs() < 0.25, "offset {:?}", gaze.offset);
        assert!(gaze.confidence > 0.0 && gaze.confidence < 1.0);
    }

    #[test]
    fn centered_pupil_gives_small_offset() {
        let luma = frame_with_pupils(40, 20, &[(20.0, 10.0)]);
        let gaze = estimate_gaze(&luma, &eye_at(0.0, 0.0));

        assert!(gaze.offset.0.abs() < 0.15, "offset {:?}", gaze.offset);
        assert!(gaze.offset.1.abs() < 0.25, "offset {:?}", gaze.offset);
        assert!(gaze.confidence > 0.0);
    }

    #[test]
    fn flat_crop_has_no_pupil() {
        let luma = GrayImage::from_pixel(40, 20, Luma([128]));
        assert_eq!(estimate_gaze(&luma, &eye_at(0.0, 0.0)), GazeEstimate::NONE);
    }

    #[test]
    fn eye_outside_frame_has_no_pupil() {
        let luma = frame_with_pupils(40, 20, &[(20.0, 10.0)]);
        assert_eq!(
            estimate_gaze(&luma, &eye_at(100.0, 100.0)),
            GazeEstimate::NONE
        );
        assert_eq!(
            estimate_gaze(&luma, &eye_at(-80.0, -50.0)),
            GazeEstimate::NONE
        );
    }

    #[test]
    fn polygon_moments_of_square() {
        let square = [
            PixelPoint::new(0, 0),
            PixelPoint::new(0, 4),
            PixelPoint::new(4, 4),
            PixelPoint::new(4, 0),
        ];
        let m = polygon_moments(&square);
        assert!((m.m00 - 16.0).abs() < 1e-9);
        assert!((m.m10 / m.m00 - 2.0).abs() < 1e-9);
        assert!((m.m01 / m.m00 - 2.0).abs() < 1e-9);

        let line = [PixelPoint::new(0, 0), PixelPoint::new(3, 0)];
        assert_eq!(polygon_moments(&line).m00, 0.0);
    }

    #[test]
    fn measurement_averages_both_eyes() {
        let luma = frame_with_pupils(100, 20, &[(28.0, 10.0), (80.0, 10.0)]);
        let points: Vec<Point> = (0..68)
            .map(|i| match i {
                36..=41 => eye_at(0.0, 0.0)[i - 36],
                42..=47 => eye_at(60.0, 0.0)[i - 42],
                _ => Point::new(50.0, 10.0),
            })
            .collect();
        let landmarks = LandmarkSet::face68(points).expect("landmarks");

        let m = measure(&luma, &landmarks);
        assert!((m.gaze.0 - (m.left.gaze.0 + m.right.gaze.0) / 2.0).abs() < 1e-12);
        assert!((m.confidence - (m.left.confidence + m.right.confidence) / 2.0).abs() < 1e-12);
        assert!(m.left.gaze.0 > 0.25);
        assert!(m.right.gaze.0.abs() < 0.15);
        assert!((m.left.ear - m.right.ear).abs() < 1e-12);
        assert!(m.gaze_magnitude() >= 0.0);
    }
}
