//! Sliding-window lane search over a bird's-eye mask.

use image::GrayImage;
use log::debug;
use nalgebra::{DMatrix, DVector};

use crate::models::{LaneFit, LaneLine, LanePolynomial, LaneSide};
use crate::settings::Settings;

/// Relative singular-value cutoff below which a fit is rejected
const RANK_TOLERANCE: f64 = 1e-9;

/// Window geometry for the search, taken from [`Settings`]
#[derive(Debug, Clone, Copy)]
pub struct SearchParams {
    pub window_radius: u32,
    pub v_offset: u32,
    pub h_offset: u32,
    pub nb_steps: u32,
    pub min_window_pixels: usize,
    pub min_fit_pixels: usize,
}

impl From<&Settings> for SearchParams {
    fn from(settings: &Settings) -> Self {
        Self {
            window_radius: settings.window_radius,
            v_offset: settings.v_offset,
            h_offset: settings.h_offset,
            nb_steps: settings.nb_steps.max(1),
            min_window_pixels: settings.min_window_pixels,
            min_fit_pixels: settings.min_fit_pixels,
        }
    }
}

/// A window visited during the search, kept for diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchWindow {
    pub side: LaneSide,
    pub x0: u32,
    pub x1: u32,
    pub y0: u32,
    pub y1: u32,
}

/// Fits plus the windows that produced them
#[derive(Debug, Clone, Default)]
pub struct SearchOutcome {
    pub fit: LaneFit,
    pub windows: Vec<SearchWindow>,
}

/// Starting x of each side: the column-histogram peak of the bottom half
/// in the left and right halves, ignoring `h_offset` columns at both edges
pub fn seed_centers(mask: &GrayImage, h_offset: u32) -> (Option<u32>, Option<u32>) {
    let (width, height) = mask.dimensions();
    let mut histogram = vec![0u32; width as usize];
    for y in height / 2..height {
        for x in 0..width {
            if mask.get_pixel(x, y)[0] > 0 {
                histogram[x as usize] += 1;
            }
        }
    }

    let lo = h_offset.min(width);
    let hi = width.saturating_sub(h_offset).max(lo);
    let mid = (width / 2).clamp(lo, hi);

    let peak = |from: u32, to: u32| -> Option<u32> {
        let mut best: Option<(u32, u32)> = None;
        for x in from..to {
            let count = histogram[x as usize];
            if count > 0 && best.is_none_or(|(_, c)| count > c) {
                best = Some((x, count));
            }
        }
        best.map(|(x, _)| x)
    };
    (peak(lo, mid), peak(mid, hi))
}

/// Collects pixels for one side while the windows climb the image
struct Tracker {
    side: LaneSide,
    center: u32,
    pixels: Vec<(u32, u32)>,
}

impl Tracker {
    fn new(side: LaneSide, center: u32) -> Self {
        Self {
            side,
            center,
            pixels: Vec::new(),
        }
    }

    /// Visit one band and recenter on its pixels when there are enough.
    /// `taken` is shared by both sides so a pixel belongs to one line at most.
    fn step(
        &mut self,
        mask: &GrayImage,
        taken: &mut [bool],
        (y0, y1): (u32, u32),
        params: &SearchParams,
    ) -> SearchWindow {
        let width = mask.width();
        let x0 = self.center.saturating_sub(params.window_radius);
        let x1 = self
            .center
            .saturating_add(params.window_radius)
            .saturating_add(1)
            .min(width);

        let mut count = 0usize;
        let mut sum_x = 0u64;
        for y in y0..y1 {
            for x in x0..x1 {
                if mask.get_pixel(x, y)[0] == 0 {
                    continue;
                }
                count += 1;
                sum_x += x as u64;
                let idx = (y * width + x) as usize;
                if !taken[idx] {
                    taken[idx] = true;
                    self.pixels.push((x, y));
                }
            }
        }

        if count > 0 && count >= params.min_window_pixels {
            self.center = (sum_x / count as u64) as u32;
        }

        SearchWindow {
            side: self.side,
            x0,
            x1,
            y0,
            y1,
        }
    }

    fn finish(self, params: &SearchParams, height: u32) -> Option<LaneLine> {
        if self.pixels.len() < params.min_fit_pixels.max(3) {
            debug!(
                "{} side: {} pixels, not enough for a fit",
                self.side,
                self.pixels.len()
            );
            return None;
        }
        let polynomial = fit_polynomial(&self.pixels, height)?;
        Some(LaneLine {
            side: self.side,
            polynomial,
            pixels: self.pixels,
        })
    }
}

/// Row ranges of the bands, bottom band first, widened by `v_offset`
pub fn band_rows(height: u32, params: &SearchParams) -> Vec<(u32, u32)> {
    let steps = params.nb_steps.max(1);
    let band = height.div_ceil(steps).max(1);
    (0..steps)
        .filter_map(|i| {
            let bottom = height.saturating_sub(i * band);
            let top = bottom.saturating_sub(band);
            if bottom == top {
                return None;
            }
            Some((
                top.saturating_sub(params.v_offset),
                bottom.saturating_add(params.v_offset).min(height),
            ))
        })
        .collect()
}

/// Least-squares fit of `x = a·y² + b·y + c`. `None` when the rows do not
/// pin down a parabola.
pub fn fit_polynomial(pixels: &[(u32, u32)], height: u32) -> Option<LanePolynomial> {
    if pixels.len() < 3 {
        return None;
    }
    // rows rescaled to [0, 1] for conditioning
    let scale = height.max(1) as f64;
    let design = DMatrix::from_fn(pixels.len(), 3, |r, c| {
        let t = pixels[r].1 as f64 / scale;
        match c {
            0 => t * t,
            1 => t,
            _ => 1.0,
        }
    });
    let target = DVector::from_iterator(pixels.len(), pixels.iter().map(|&(x, _)| x as f64));

    let svd = design.svd(true, true);
    let max_sv = svd.singular_values.max();
    if max_sv <= 0.0 || svd.singular_values.min() / max_sv < RANK_TOLERANCE {
        return None;
    }
    let coeffs = svd.solve(&target, RANK_TOLERANCE * max_sv).ok()?;
    if !coeffs.iter().all(|c| c.is_finite()) {
        return None;
    }

    Some(LanePolynomial::new(
        coeffs[0] / (scale * scale),
        coeffs[1] / scale,
        coeffs[2],
    ))
}

/// Run the sliding-window search on a top-down lane mask
pub fn find_lanes(mask: &GrayImage, params: &SearchParams) -> SearchOutcome {
    let (width, height) = mask.dimensions();
    if width == 0 || height == 0 {
        return SearchOutcome::default();
    }

    let (left_seed, right_seed) = seed_centers(mask, params.h_offset);
    debug!("seed centers: left={:?} right={:?}", left_seed, right_seed);

    let mut trackers: Vec<Tracker> = [(LaneSide::Left, left_seed), (LaneSide::Right, right_seed)]
        .into_iter()
        .filter_map(|(side, seed)| seed.map(|x| Tracker::new(side, x)))
        .collect();

    let mut taken = vec![false; (width * height) as usize];
    let mut windows = Vec::new();
    for rows in band_rows(height, params) {
        for tracker in trackers.iter_mut() {
            windows.push(tracker.step(mask, &mut taken, rows, params));
        }
    }

    let mut fit = LaneFit::default();
    for tracker in trackers {
        match tracker.side {
            LaneSide::Left => fit.left = tracker.finish(params, height),
            LaneSide::Right => fit.right = tracker.finish(params, height),
        }
    }
    SearchOutcome { fit, windows }
}
