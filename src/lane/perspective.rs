//! Camera view ⇄ bird's-eye view homography.

use image::{GrayImage, Luma, Rgb, RgbImage};
use imageproc::geometric_transformations::{Interpolation, Projection, warp};
use nalgebra::{Matrix3, Point2, SMatrix, SVector, Vector3};

use crate::error::{LaneError, Result};
use crate::settings::Settings;

/// Forward (camera → top-down) and inverse homographies
#[derive(Debug, Clone, PartialEq)]
pub struct PerspectiveWarp {
    pub forward: Matrix3<f64>,
    pub inverse: Matrix3<f64>,
}

/// Translate to the centroid and scale so the mean distance is √2
fn normalization(pts: &[Point2<f64>; 4]) -> Matrix3<f64> {
    let cx = pts.iter().map(|p| p.x).sum::<f64>() / 4.0;
    let cy = pts.iter().map(|p| p.y).sum::<f64>() / 4.0;
    let mean_dist = pts
        .iter()
        .map(|p| ((p.x - cx).powi(2) + (p.y - cy).powi(2)).sqrt())
        .sum::<f64>()
        / 4.0;
    let s = if mean_dist > 1e-12 {
        std::f64::consts::SQRT_2 / mean_dist
    } else {
        1.0
    };
    Matrix3::new(s, 0.0, -s * cx, 0.0, s, -s * cy, 0.0, 0.0, 1.0)
}

/// Whether any three of the points are (nearly) on one line
fn has_collinear_triple(pts: &[Point2<f64>; 4]) -> bool {
    const TRIPLES: [(usize, usize, usize); 4] = [(0, 1, 2), (0, 1, 3), (0, 2, 3), (1, 2, 3)];
    let scale = pts
        .iter()
        .flat_map(|p| [p.x.abs(), p.y.abs()])
        .fold(1.0_f64, f64::max);
    TRIPLES.iter().any(|&(i, j, k)| {
        let u = pts[j] - pts[i];
        let v = pts[k] - pts[i];
        (u.x * v.y - u.y * v.x).abs() < 1e-9 * scale * scale
    })
}

fn project(h: &Matrix3<f64>, p: Point2<f64>) -> Point2<f64> {
    let v = h * Vector3::new(p.x, p.y, 1.0);
    Point2::new(v[0] / v[2], v[1] / v[2])
}

/// H such that `dst ~ H · src` for four correspondences, or `None` when
/// three of the points are collinear
pub fn homography_from_4pt(src: &[Point2<f64>; 4], dst: &[Point2<f64>; 4]) -> Option<Matrix3<f64>> {
    if has_collinear_triple(src) || has_collinear_triple(dst) {
        return None;
    }
    let t_src = normalization(src);
    let t_dst = normalization(dst);

    let mut a = SMatrix::<f64, 8, 8>::zeros();
    let mut b = SVector::<f64, 8>::zeros();
    for k in 0..4 {
        let s = project(&t_src, src[k]);
        let d = project(&t_dst, dst[k]);
        let (r0, r1) = (2 * k, 2 * k + 1);

        a[(r0, 0)] = s.x;
        a[(r0, 1)] = s.y;
        a[(r0, 2)] = 1.0;
        a[(r0, 6)] = -d.x * s.x;
        a[(r0, 7)] = -d.x * s.y;
        b[r0] = d.x;

        a[(r1, 3)] = s.x;
        a[(r1, 4)] = s.y;
        a[(r1, 5)] = 1.0;
        a[(r1, 6)] = -d.y * s.x;
        a[(r1, 7)] = -d.y * s.y;
        b[r1] = d.y;
    }

    let x = a.lu().solve(&b)?;
    let hn = Matrix3::new(
        x[0], x[1], x[2], //
        x[3], x[4], x[5], //
        x[6], x[7], 1.0,
    );
    let h = t_dst.try_inverse()? * hn * t_src;
    let scale = h[(2, 2)];
    if scale.abs() < 1e-12 || !h.iter().all(|v| v.is_finite()) {
        return None;
    }
    Some(h / scale)
}

impl PerspectiveWarp {
    pub fn new(src: [Point2<f64>; 4], dst: [Point2<f64>; 4]) -> Result<Self> {
        let forward = homography_from_4pt(&src, &dst).ok_or(LaneError::DegenerateTransform)?;
        let inverse = forward.try_inverse().ok_or(LaneError::DegenerateTransform)?;
        Ok(Self { forward, inverse })
    }

    /// Map the lane trapezoid onto an upright rectangle inset by
    /// `warp_offset`:
    /// `[c0 + off, (c0.x, 0) + off, (c3.x, 0) − off, c3 − off]`
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let c = settings
            .warp_corners
            .map(|(x, y)| Point2::new(x as f64, y as f64));
        let (ox, oy) = (settings.warp_offset.0 as f64, settings.warp_offset.1 as f64);
        let dst = [
            Point2::new(c[0].x + ox, c[0].y + oy),
            Point2::new(c[0].x + ox, oy),
            Point2::new(c[3].x - ox, -oy),
            Point2::new(c[3].x - ox, c[3].y - oy),
        ];
        Self::new(c, dst)
    }

    pub fn to_top_down(&self, p: Point2<f64>) -> Point2<f64> {
        project(&self.forward, p)
    }

    pub fn to_camera(&self, p: Point2<f64>) -> Point2<f64> {
        project(&self.inverse, p)
    }

    fn projection(h: &Matrix3<f64>) -> Result<Projection> {
        let m: [f32; 9] = [
            h[(0, 0)] as f32,
            h[(0, 1)] as f32,
            h[(0, 2)] as f32,
            h[(1, 0)] as f32,
            h[(1, 1)] as f32,
            h[(1, 2)] as f32,
            h[(2, 0)] as f32,
            h[(2, 1)] as f32,
            h[(2, 2)] as f32,
        ];
        Projection::from_matrix(m).ok_or(LaneError::DegenerateTransform)
    }

    /// Warp a binary mask into the top-down view, same size. Nearest
    /// sampling keeps it binary.
    pub fn warp_mask(&self, mask: &GrayImage) -> Result<GrayImage> {
        let projection = Self::projection(&self.forward)?;
        Ok(warp(mask, &projection, Interpolation::Nearest, Luma([0])))
    }

    /// Warp a top-down image back into the camera view
    pub fn unwarp_rgb(&self, image: &RgbImage) -> Result<RgbImage> {
        let projection = Self::projection(&self.inverse)?;
        Ok(warp(image, &projection, Interpolation::Bilinear, Rgb([0, 0, 0])))
    }
}
