use image::{GrayImage, Luma, RgbImage};
use imageproc::drawing::draw_polygon_mut;
use imageproc::gradients::horizontal_sobel;
use imageproc::point::Point;

use crate::settings::{Range, Settings};

const ON: Luma<u8> = Luma([255]);
const OFF: Luma<u8> = Luma([0]);

fn in_range(value: u8, (lo, hi): Range) -> bool {
    lo <= value && value <= hi
}

/// Absolute horizontal Sobel response, rescaled so the strongest edge in
/// the frame is 255
pub fn scaled_sobel_x(gray: &GrayImage) -> GrayImage {
    let sobel = horizontal_sobel(gray);
    let max = sobel
        .pixels()
        .map(|p| p[0].unsigned_abs())
        .max()
        .unwrap_or(0);

    let (width, height) = gray.dimensions();
    if max == 0 {
        return GrayImage::new(width, height);
    }
    GrayImage::from_fn(width, height, |x, y| {
        let magnitude = sobel.get_pixel(x, y)[0].unsigned_abs() as u32;
        Luma([(255 * magnitude / max as u32) as u8])
    })
}

/// Lightness and saturation planes of an RGB frame, both on a 0–255 scale
pub fn hls_planes(frame: &RgbImage) -> (GrayImage, GrayImage) {
    let (width, height) = frame.dimensions();
    let mut lightness = GrayImage::new(width, height);
    let mut saturation = GrayImage::new(width, height);

    for (x, y, px) in frame.enumerate_pixels() {
        let [r, g, b] = px.0.map(|c| c as f32 / 255.0);
        let max = r.max(g).max(b);
        let min = r.min(g).min(b);
        let l = (max + min) / 2.0;
        let s = if max - min < f32::EPSILON {
            0.0
        } else if l < 0.5 {
            (max - min) / (max + min)
        } else {
            (max - min) / (2.0 - max - min)
        };
        lightness.put_pixel(x, y, Luma([(l * 255.0).round() as u8]));
        saturation.put_pixel(x, y, Luma([(s * 255.0).round() as u8]));
    }
    (lightness, saturation)
}

/// `(gradient OR saturation) AND lightness`, each test an inclusive range
pub fn combine(
    gradient: &GrayImage,
    saturation: &GrayImage,
    lightness: &GrayImage,
    settings: &Settings,
) -> GrayImage {
    let (width, height) = gradient.dimensions();
    GrayImage::from_fn(width, height, |x, y| {
        let grad = in_range(gradient.get_pixel(x, y)[0], settings.gradient_threshold);
        let sat = in_range(saturation.get_pixel(x, y)[0], settings.saturation_threshold);
        let light = in_range(lightness.get_pixel(x, y)[0], settings.lightness_threshold);
        if (grad || sat) && light { ON } else { OFF }
    })
}

/// Clear everything outside the trapezoid spanned by the bottom edge of
/// the frame and the two apex points
pub fn region_of_interest(mask: &GrayImage, settings: &Settings) -> GrayImage {
    let (width, height) = mask.dimensions();
    if width == 0 || height == 0 {
        return mask.clone();
    }

    let to_point = |(x, y): (f32, f32)| Point::new(x.round() as i32, y.round() as i32);
    let polygon = [
        Point::new(0, height as i32),
        to_point(settings.roi_apex_left),
        to_point(settings.roi_apex_right),
        Point::new(width as i32, height as i32),
    ];

    let mut region = GrayImage::new(width, height);
    draw_polygon_mut(&mut region, &polygon, ON);

    GrayImage::from_fn(width, height, |x, y| {
        if region.get_pixel(x, y)[0] > 0 {
            *mask.get_pixel(x, y)
        } else {
            OFF
        }
    })
}

/// Binary lane-pixel mask of an undistorted frame
pub fn lane_mask(frame: &RgbImage, settings: &Settings) -> GrayImage {
    let gray = image::imageops::grayscale(frame);
    let gradient = scaled_sobel_x(&gray);
    let (lightness, saturation) = hls_planes(frame);
    let combined = combine(&gradient, &saturation, &lightness, settings);
    region_of_interest(&combined, settings)
}
