use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{LaneError, Result};

/// Inclusive threshold range on an 8-bit channel
pub type Range = (u8, u8);

/// Thresholds and geometry shared by every frame.
///
/// Built once at startup and handed to the pipeline by reference. Every
/// field may be overridden from a JSON file; missing fields keep their
/// defaults.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Scaled horizontal-gradient magnitude accepted as an edge
    pub gradient_threshold: Range,
    /// HLS saturation accepted as painted line
    pub saturation_threshold: Range,
    /// HLS lightness gate, applied to both tests to drop shadow bands
    pub lightness_threshold: Range,

    /// Top-left and top-right vertices of the region of interest; the
    /// bottom edge of the frame closes the polygon.
    pub roi_apex_left: (f32, f32),
    pub roi_apex_right: (f32, f32),

    /// Lane trapezoid in the camera view: bottom-left, top-left,
    /// top-right, bottom-right.
    pub warp_corners: [(f32, f32); 4],
    /// Inset of the bird's-eye rectangle relative to the trapezoid base
    pub warp_offset: (f32, f32),

    /// Half-width of each sliding window, in pixels
    pub window_radius: u32,
    /// Rows added above and below each band
    pub v_offset: u32,
    /// Columns ignored at each image edge when seeding window centers
    pub h_offset: u32,
    /// Number of horizontal bands in the search
    pub nb_steps: u32,
    /// Pixels needed inside a window before it is recentered
    pub min_window_pixels: usize,
    /// Pixels needed on one side before a polynomial is fitted
    pub min_fit_pixels: usize,

    /// Size of one bird's-eye pixel in meters, (x, y)
    pub meters_per_pixel: (f64, f64),
    /// Weight of the lane overlay when blended onto the frame
    pub overlay_alpha: f32,
    /// TrueType font for the readout; system fonts are tried when unset
    pub font_path: Option<PathBuf>,
    pub font_size: f32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            gradient_threshold: (40, 130),
            saturation_threshold: (120, 255),
            lightness_threshold: (45, 255),
            roi_apex_left: (560.0, 450.0),
            roi_apex_right: (720.0, 450.0),
            warp_corners: [
                (190.0, 720.0),
                (589.0, 457.0),
                (698.0, 457.0),
                (1145.0, 720.0),
            ],
            warp_offset: (150.0, 0.0),
            window_radius: 200,
            v_offset: 50,
            h_offset: 50,
            nb_steps: 6,
            min_window_pixels: 50,
            min_fit_pixels: 50,
            meters_per_pixel: (3.7 / 700.0, 30.0 / 720.0),
            overlay_alpha: 0.3,
            font_path: None,
            font_size: 32.0,
        }
    }
}

impl Settings {
    /// Load overrides from a JSON file on top of the defaults
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(LaneError::InputNotFound {
                path: path.to_path_buf(),
            });
        }
        let text = std::fs::read_to_string(path)?;
        let settings: Settings = serde_json::from_str(&text)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load from `path` when given, otherwise use the defaults
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }

    fn validate(&self) -> Result<()> {
        if self.nb_steps == 0 {
            return Err(LaneError::InvalidSettings(
                "nb_steps must be at least 1".to_string(),
            ));
        }
        for (name, (lo, hi)) in [
            ("gradient_threshold", self.gradient_threshold),
            ("saturation_threshold", self.saturation_threshold),
            ("lightness_threshold", self.lightness_threshold),
        ] {
            if lo > hi {
                return Err(LaneError::InvalidSettings(format!(
                    "{} has min {} above max {}",
                    name, lo, hi
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_override_keeps_defaults() {
        let settings: Settings =
            serde_json::from_str(r#"{ "nb_steps": 9, "gradient_threshold": [20, 100] }"#).unwrap();
        assert_eq!(settings.nb_steps, 9);
        assert_eq!(settings.gradient_threshold, (20, 100));
        assert_eq!(settings.window_radius, Settings::default().window_radius);
        assert_eq!(settings.warp_corners, Settings::default().warp_corners);
    }

    #[test]
    fn rejects_inverted_range() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{ "saturation_threshold": [200, 100] }"#).unwrap();
        assert!(Settings::from_file(&path).is_err());
    }
}
