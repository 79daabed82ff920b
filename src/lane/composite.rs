//! Drawing the detected lane back onto the camera frame.

use std::path::{Path, PathBuf};

use ab_glyph::{FontVec, PxScale};
use image::{GrayImage, Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_line_segment_mut, draw_polygon_mut, draw_text_mut};
use imageproc::point::Point;
use imageproc::rect::Rect;
use log::{debug, info};

use super::perspective::PerspectiveWarp;
use super::search::SearchOutcome;
use crate::error::Result;
use crate::models::{LaneFit, LaneLine, LaneMeasurement, LaneSide};
use crate::settings::Settings;

const LANE_FILL: Rgb<u8> = Rgb([0, 255, 0]);
const LINE_COLOR: Rgb<u8> = Rgb([255, 255, 0]);
const LEFT_PIXELS: Rgb<u8> = Rgb([255, 0, 0]);
const RIGHT_PIXELS: Rgb<u8> = Rgb([0, 0, 255]);
const TEXT_COLOR: Rgb<u8> = Rgb([255, 255, 255]);

/// Half-width of the polyline drawn when only one side is fitted
const LINE_HALF_WIDTH: i32 = 10;
/// Rows between sampled curve points
const CURVE_STEP: usize = 8;

/// Fonts tried when none is configured
const SYSTEM_FONTS: [&str; 6] = [
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

fn read_font(path: &Path) -> Option<FontVec> {
    let bytes = std::fs::read(path).ok()?;
    match FontVec::try_from_vec(bytes) {
        Ok(font) => Some(font),
        Err(err) => {
            debug!("{} is not a usable font: {}", path.display(), err);
            None
        }
    }
}

/// The configured font, else the first system font that loads
pub fn load_font(configured: Option<&Path>) -> Option<FontVec> {
    let candidates: Vec<PathBuf> = configured
        .map(Path::to_path_buf)
        .into_iter()
        .chain(SYSTEM_FONTS.iter().map(PathBuf::from))
        .collect();
    for path in &candidates {
        if let Some(font) = read_font(path) {
            debug!("using font {}", path.display());
            return Some(font);
        }
    }
    info!("no TrueType font found, lane readout will only be logged");
    None
}

/// Sample a curve every few rows, bottom row included
fn curve_points(line: &LaneLine, height: u32) -> Vec<Point<i32>> {
    let last = height.saturating_sub(1);
    let mut rows: Vec<u32> = (0..height).step_by(CURVE_STEP).collect();
    if rows.last() != Some(&last) {
        rows.push(last);
    }
    rows.into_iter()
        .map(|y| {
            let x = line.polynomial.x_at(y as f64);
            Point::new(x.round().clamp(-1e6, 1e6) as i32, y as i32)
        })
        .collect()
}

fn draw_thick_polyline(canvas: &mut RgbImage, points: &[Point<i32>], color: Rgb<u8>) {
    for pair in points.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        for dx in -LINE_HALF_WIDTH..=LINE_HALF_WIDTH {
            draw_line_segment_mut(
                canvas,
                ((a.x + dx) as f32, a.y as f32),
                ((b.x + dx) as f32, b.y as f32),
                color,
            );
        }
    }
}

/// Lane area between both curves in the bird's-eye view, or the single
/// fitted curve, with the fitted pixels colored by side
pub fn lane_overlay(fit: &LaneFit, width: u32, height: u32) -> RgbImage {
    let mut canvas = RgbImage::new(width, height);
    if width == 0 || height == 0 {
        return canvas;
    }

    match (&fit.left, &fit.right) {
        (Some(left), Some(right)) => {
            let mut polygon = curve_points(left, height);
            polygon.extend(curve_points(right, height).into_iter().rev());
            polygon.dedup();
            if polygon.len() > 2 && polygon.first() == polygon.last() {
                polygon.pop();
            }
            if polygon.len() > 2 {
                draw_polygon_mut(&mut canvas, &polygon, LANE_FILL);
            }
        }
        (Some(line), None) | (None, Some(line)) => {
            draw_thick_polyline(&mut canvas, &curve_points(line, height), LINE_COLOR);
        }
        (None, None) => {}
    }

    for line in fit.lines() {
        let color = match line.side {
            LaneSide::Left => LEFT_PIXELS,
            LaneSide::Right => RIGHT_PIXELS,
        };
        for &(x, y) in &line.pixels {
            if x < width && y < height {
                canvas.put_pixel(x, y, color);
            }
        }
    }
    canvas
}

/// The search mask with its windows outlined and the fits traced
pub fn search_overlay(mask: &GrayImage, outcome: &SearchOutcome) -> RgbImage {
    let (width, height) = mask.dimensions();
    let mut canvas = RgbImage::from_fn(width, height, |x, y| {
        let v = mask.get_pixel(x, y)[0];
        Rgb([v, v, v])
    });
    for window in &outcome.windows {
        if window.x1 <= window.x0 || window.y1 <= window.y0 {
            continue;
        }
        let rect = Rect::at(window.x0 as i32, window.y0 as i32)
            .of_size(window.x1 - window.x0, window.y1 - window.y0);
        draw_hollow_rect_mut(&mut canvas, rect, Rgb([0, 255, 0]));
    }
    for line in outcome.fit.lines() {
        let points = curve_points(line, height);
        for pair in points.windows(2) {
            draw_line_segment_mut(
                &mut canvas,
                (pair[0].x as f32, pair[0].y as f32),
                (pair[1].x as f32, pair[1].y as f32),
                LINE_COLOR,
            );
        }
    }
    canvas
}

/// `base + alpha · overlay`, saturating per channel
pub fn blend(base: &RgbImage, overlay: &RgbImage, alpha: f32) -> RgbImage {
    let (width, height) = base.dimensions();
    RgbImage::from_fn(width, height, |x, y| {
        let b = base.get_pixel(x, y).0;
        let o = overlay
            .get_pixel_checked(x, y)
            .map(|p| p.0)
            .unwrap_or([0, 0, 0]);
        Rgb(std::array::from_fn(|c| {
            (b[c] as f32 + alpha * o[c] as f32).round().clamp(0.0, 255.0) as u8
        }))
    })
}

/// Everything needed to annotate an undistorted frame
pub struct Compositor {
    warp: PerspectiveWarp,
    alpha: f32,
    font: Option<FontVec>,
    font_size: f32,
}

impl Compositor {
    pub fn new(warp: PerspectiveWarp, settings: &Settings) -> Self {
        Self {
            warp,
            alpha: settings.overlay_alpha,
            font: load_font(settings.font_path.as_deref()),
            font_size: settings.font_size,
        }
    }

    /// Overlay the lane area and the readout on `undistorted`
    pub fn compose(
        &self,
        undistorted: &RgbImage,
        fit: &LaneFit,
        measurement: Option<&LaneMeasurement>,
    ) -> Result<RgbImage> {
        let (width, height) = undistorted.dimensions();
        let overlay = self.warp.unwarp_rgb(&lane_overlay(fit, width, height))?;
        let mut out = blend(undistorted, &overlay, self.alpha);

        let lines = measurement.map(LaneMeasurement::readout).unwrap_or_default();
        match &self.font {
            Some(font) => {
                let scale = PxScale::from(self.font_size);
                let line_height = (self.font_size * 1.4).round() as i32;
                for (i, text) in lines.iter().enumerate() {
                    let y = 20 + i as i32 * line_height;
                    draw_text_mut(&mut out, TEXT_COLOR, 30, y, scale, font, text);
                }
            }
            None => {
                for text in &lines {
                    info!("{}", text);
                }
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LanePolynomial;

    fn vertical(side: LaneSide, x: f64) -> LaneLine {
        LaneLine {
            side,
            polynomial: LanePolynomial::new(0.0, 0.0, x),
            pixels: Vec::new(),
        }
    }

    #[test]
    fn blend_adds_weighted_overlay() {
        let base = RgbImage::from_pixel(2, 2, Rgb([100, 250, 0]));
        let overlay = RgbImage::from_pixel(2, 2, Rgb([0, 255, 100]));
        let out = blend(&base, &overlay, 0.3);
        assert_eq!(out.get_pixel(0, 0), &Rgb([100, 255, 30]));
    }

    #[test]
    fn two_fits_fill_between_them() {
        let fit = LaneFit {
            left: Some(vertical(LaneSide::Left, 20.0)),
            right: Some(vertical(LaneSide::Right, 80.0)),
        };
        let overlay = lane_overlay(&fit, 100, 50);
        assert_eq!(overlay.get_pixel(50, 25), &LANE_FILL);
        assert_eq!(overlay.get_pixel(5, 25), &Rgb([0, 0, 0]));
        assert_eq!(overlay.get_pixel(95, 25), &Rgb([0, 0, 0]));
    }

    #[test]
    fn one_fit_draws_a_line() {
        let fit = LaneFit {
            left: None,
            right: Some(vertical(LaneSide::Right, 60.0)),
        };
        let overlay = lane_overlay(&fit, 100, 50);
        assert_eq!(overlay.get_pixel(60, 25), &LINE_COLOR);
        assert_eq!(overlay.get_pixel(20, 25), &Rgb([0, 0, 0]));
    }

    #[test]
    fn no_fit_leaves_canvas_blank() {
        let overlay = lane_overlay(&LaneFit::default(), 40, 30);
        assert!(overlay.pixels().all(|p| p.0 == [0, 0, 0]));
    }

    #[test]
    fn missing_configured_font_falls_back() {
        // must not panic whether or not a system font exists
        let _ = load_font(Some(Path::new("/no/such/font.ttf")));
    }
}
