//! Pinhole camera with Brown–Conrady lens distortion.
//!
//! Coefficients follow the OpenCV ordering `(k1, k2, p1, p2, k3)`; any
//! further rational or thin-prism terms are ignored.

use image::{Rgb, RgbImage};
use imageproc::geometric_transformations::{Interpolation, warp_with};
use nalgebra::{Matrix3, Point2};

use crate::error::{LaneError, Result};

const UNDISTORT_ITERATIONS: usize = 20;

/// Radial (k1, k2, k3) and tangential (p1, p2) distortion coefficients
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Distortion {
    pub k1: f64,
    pub k2: f64,
    pub p1: f64,
    pub p2: f64,
    pub k3: f64,
}

impl Distortion {
    /// Build from an OpenCV-style coefficient vector; missing trailing
    /// terms are zero.
    pub fn from_coefficients(coeffs: &[f64]) -> Self {
        let at = |i: usize| coeffs.get(i).copied().unwrap_or(0.0);
        Self {
            k1: at(0),
            k2: at(1),
            p1: at(2),
            p2: at(3),
            k3: at(4),
        }
    }

    pub fn coefficients(&self) -> [f64; 5] {
        [self.k1, self.k2, self.p1, self.p2, self.k3]
    }

    /// Apply distortion to a point in normalized image coordinates
    pub fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        let r2 = x * x + y * y;
        let radial = 1.0 + r2 * (self.k1 + r2 * (self.k2 + r2 * self.k3));
        let xd = x * radial + 2.0 * self.p1 * x * y + self.p2 * (r2 + 2.0 * x * x);
        let yd = y * radial + self.p1 * (r2 + 2.0 * y * y) + 2.0 * self.p2 * x * y;
        (xd, yd)
    }

    /// Invert [`Distortion::apply`] by fixed-point iteration
    pub fn remove(&self, xd: f64, yd: f64) -> (f64, f64) {
        let (mut x, mut y) = (xd, yd);
        for _ in 0..UNDISTORT_ITERATIONS {
            let r2 = x * x + y * y;
            let radial = 1.0 + r2 * (self.k1 + r2 * (self.k2 + r2 * self.k3));
            if radial.abs() < 1e-12 {
                break;
            }
            let dx = 2.0 * self.p1 * x * y + self.p2 * (r2 + 2.0 * x * x);
            let dy = self.p1 * (r2 + 2.0 * y * y) + 2.0 * self.p2 * x * y;
            x = (xd - dx) / radial;
            y = (yd - dy) / radial;
        }
        (x, y)
    }

    pub fn is_zero(&self) -> bool {
        self.coefficients().iter().all(|c| *c == 0.0)
    }
}

/// Intrinsics and distortion needed to undistort frames.
///
/// This is everything the frame pipeline needs from a calibration run.
#[derive(Debug, Clone, PartialEq)]
pub struct CameraModel {
    pub camera_matrix: Matrix3<f64>,
    pub distortion: Distortion,
}

impl CameraModel {
    pub fn new(camera_matrix: Matrix3<f64>, distortion: Distortion) -> Result<Self> {
        let fx = camera_matrix[(0, 0)];
        let fy = camera_matrix[(1, 1)];
        if fx.abs() < 1e-12 || fy.abs() < 1e-12 || !fx.is_finite() || !fy.is_finite() {
            return Err(LaneError::CalibrationFormat(
                "camera matrix has a zero focal length".to_string(),
            ));
        }
        Ok(Self {
            camera_matrix,
            distortion,
        })
    }

    /// Ideal pinhole camera centered on a `width`×`height` frame
    pub fn pinhole(focal: f64, width: u32, height: u32) -> Self {
        Self {
            camera_matrix: Matrix3::new(
                focal,
                0.0,
                width as f64 / 2.0,
                0.0,
                focal,
                height as f64 / 2.0,
                0.0,
                0.0,
                1.0,
            ),
            distortion: Distortion::default(),
        }
    }

    fn normalize(&self, p: Point2<f64>) -> (f64, f64) {
        let k = &self.camera_matrix;
        let y = (p.y - k[(1, 2)]) / k[(1, 1)];
        let x = (p.x - k[(0, 2)] - k[(0, 1)] * y) / k[(0, 0)];
        (x, y)
    }

    fn to_pixel(&self, x: f64, y: f64) -> Point2<f64> {
        let k = &self.camera_matrix;
        Point2::new(
            k[(0, 0)] * x + k[(0, 1)] * y + k[(0, 2)],
            k[(1, 1)] * y + k[(1, 2)],
        )
    }

    /// Where an ideal (undistorted) pixel lands in the raw camera image
    pub fn distort_point(&self, p: Point2<f64>) -> Point2<f64> {
        let (x, y) = self.normalize(p);
        let (xd, yd) = self.distortion.apply(x, y);
        self.to_pixel(xd, yd)
    }

    /// Where a raw camera pixel belongs once lens distortion is removed
    pub fn undistort_point(&self, p: Point2<f64>) -> Point2<f64> {
        let (xd, yd) = self.normalize(p);
        let (x, y) = self.distortion.remove(xd, yd);
        self.to_pixel(x, y)
    }
}

/// Remove lens distortion from a frame.
///
/// The output keeps the input size and camera matrix; pixels that map
/// outside the source are black.
pub fn undistort_image(frame: &RgbImage, camera: &CameraModel) -> RgbImage {
    if camera.distortion.is_zero() {
        return frame.clone();
    }
    warp_with(
        frame,
        |x, y| {
            let src = camera.distort_point(Point2::new(x as f64, y as f64));
            (src.x as f32, src.y as f32)
        },
        Interpolation::Bilinear,
        Rgb([0, 0, 0]),
    )
}
