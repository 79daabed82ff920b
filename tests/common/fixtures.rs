use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use image::{GrayImage, Luma, Rgb, RgbImage};
use imageproc::drawing::draw_polygon_mut;
use imageproc::point::Point;
use lanefinder::calibration::{CameraSolution, CameraSolver, CornerFinder};
use lanefinder::{BoardPattern, CameraModel, ChessboardObservation, LanePolynomial, Settings};
use nalgebra::{Matrix3, Point2};

pub const ASPHALT: Rgb<u8> = Rgb([70, 70, 70]);
pub const YELLOW_PAINT: Rgb<u8> = Rgb([255, 200, 0]);

/// Undistortion is a no-op for this camera
pub fn ideal_camera(width: u32, height: u32) -> CameraModel {
    CameraModel::pinhole(1000.0, width, height)
}

/// Saves a solid-color image to `dir/name` and returns its path
pub fn create_test_image(dir: &Path, name: &str, width: u32, height: u32, color: Rgb<u8>) -> PathBuf {
    let path = dir.join(name);
    RgbImage::from_pixel(width, height, color)
        .save(&path)
        .expect("Failed to save test image");
    path
}

/// Quadrilateral stripe from `bottom` to `top`, `half_width` wide at the
/// bottom and a third of that at the top
fn paint_stripe(frame: &mut RgbImage, bottom: (f32, f32), top: (f32, f32), half_width: f32) {
    let top_half = (half_width / 3.0).max(1.0);
    let poly = [
        Point::new((bottom.0 - half_width) as i32, bottom.1 as i32),
        Point::new((top.0 - top_half) as i32, top.1 as i32),
        Point::new((top.0 + top_half) as i32, top.1 as i32),
        Point::new((bottom.0 + half_width) as i32, bottom.1 as i32),
    ];
    draw_polygon_mut(frame, &poly, YELLOW_PAINT);
}

/// 1280x720 road whose two painted lines follow the edges of the default
/// warp trapezoid, so they come out vertical in the bird's-eye view at
/// x = 340 and x = 995
pub fn synthetic_road() -> RgbImage {
    let settings = Settings::default();
    let [c0, c1, c2, c3] = settings.warp_corners;
    let mut frame = RgbImage::from_pixel(1280, 720, ASPHALT);
    paint_stripe(&mut frame, c0, c1, 9.0);
    paint_stripe(&mut frame, c3, c2, 9.0);
    frame
}

/// Bird's-eye mask with one curve per side, each `thickness` pixels wide
pub fn two_curve_mask(
    width: u32,
    height: u32,
    left: LanePolynomial,
    right: LanePolynomial,
    thickness: u32,
) -> GrayImage {
    let mut mask = GrayImage::new(width, height);
    for y in 0..height {
        for curve in [left, right] {
            let center = curve.x_at(y as f64).round() as i64;
            for dx in 0..thickness as i64 {
                let x = center - thickness as i64 / 2 + dx;
                if x >= 0 && (x as u32) < width {
                    mask.put_pixel(x as u32, y, Luma([255]));
                }
            }
        }
    }
    mask
}

/// Reports a regular grid of corners for bright images and nothing for
/// dark ones
pub struct FakeCornerFinder;

impl CornerFinder for FakeCornerFinder {
    fn find_corners(
        &self,
        gray: &GrayImage,
        pattern: BoardPattern,
    ) -> lanefinder::Result<Option<Vec<Point2<f32>>>> {
        let mean = gray.pixels().map(|p| p[0] as u64).sum::<u64>() / gray.len().max(1) as u64;
        if mean < 128 {
            return Ok(None);
        }
        let corners = (0..pattern.ny)
            .flat_map(|y| (0..pattern.nx).map(move |x| Point2::new(4.0 + 3.0 * x as f32, 4.0 + 3.0 * y as f32)))
            .collect();
        Ok(Some(corners))
    }
}

/// Returns a fixed camera and remembers the observations it was given
#[derive(Clone, Default)]
pub struct FakeSolver {
    pub seen: Rc<RefCell<Vec<ChessboardObservation>>>,
}

impl CameraSolver for FakeSolver {
    fn solve(
        &self,
        observations: &[ChessboardObservation],
        image_shape: (u32, u32),
    ) -> lanefinder::Result<CameraSolution> {
        self.seen.borrow_mut().extend_from_slice(observations);
        let (height, width) = image_shape;
        Ok(CameraSolution {
            camera_matrix: Matrix3::new(
                100.0,
                0.0,
                width as f64 / 2.0,
                0.0,
                100.0,
                height as f64 / 2.0,
                0.0,
                0.0,
                1.0,
            ),
            distortion: vec![-0.1, 0.01, 0.0, 0.0, 0.0],
            rvecs: vec![[0.0, 0.0, 0.0]; observations.len()],
            tvecs: vec![[0.0, 0.0, 10.0]; observations.len()],
            rms_error: 0.5,
        })
    }
}
