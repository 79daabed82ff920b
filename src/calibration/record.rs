//! On-disk calibration record.
//!
//! Stored as a tagged, versioned JSON document so that one process can
//! write it and another read it back without sharing any runtime state.

use std::path::Path;

use nalgebra::Matrix3;
use serde::{Deserialize, Serialize};

use super::distortion::{CameraModel, Distortion};
use crate::error::{LaneError, Result};

pub const FORMAT_TAG: &str = "lanefinder-calibration";
pub const FORMAT_VERSION: u32 = 1;

/// Intrinsics, distortion and per-view extrinsics from one calibration run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationResult {
    /// (height, width) of the calibration images
    pub image_shape: (u32, u32),
    pub camera_matrix: [[f64; 3]; 3],
    pub distortion: Vec<f64>,
    /// Rodrigues rotation vector per accepted view
    pub rvecs: Vec<[f64; 3]>,
    pub tvecs: Vec<[f64; 3]>,
    /// RMS reprojection error reported by the solver, in pixels
    pub rms_error: f64,
    /// RFC 3339 timestamp of the run
    pub created_at: String,
}

#[derive(Serialize, Deserialize)]
struct Envelope {
    format: String,
    version: u32,
    #[serde(flatten)]
    result: CalibrationResult,
}

impl CalibrationResult {
    pub fn matrix(&self) -> Matrix3<f64> {
        let m = &self.camera_matrix;
        Matrix3::new(
            m[0][0], m[0][1], m[0][2], //
            m[1][0], m[1][1], m[1][2], //
            m[2][0], m[2][1], m[2][2],
        )
    }

    /// The part of the calibration the frame pipeline consumes
    pub fn camera_model(&self) -> Result<CameraModel> {
        CameraModel::new(
            self.matrix(),
            Distortion::from_coefficients(&self.distortion),
        )
    }

    /// Write the record to `path`, replacing any existing file
    pub fn save(&self, path: &Path) -> Result<()> {
        let envelope = Envelope {
            format: FORMAT_TAG.to_string(),
            version: FORMAT_VERSION,
            result: self.clone(),
        };
        let text = serde_json::to_string_pretty(&envelope)?;
        std::fs::write(path, text)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(LaneError::InputNotFound {
                path: path.to_path_buf(),
            });
        }
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let envelope: Envelope = serde_json::from_str(text)?;
        if envelope.format != FORMAT_TAG {
            return Err(LaneError::CalibrationFormat(format!(
                "unexpected format tag '{}'",
                envelope.format
            )));
        }
        if envelope.version != FORMAT_VERSION {
            return Err(LaneError::CalibrationFormat(format!(
                "unsupported version {} (expected {})",
                envelope.version, FORMAT_VERSION
            )));
        }
        let result = envelope.result;
        if result.rvecs.len() != result.tvecs.len() {
            return Err(LaneError::CalibrationFormat(format!(
                "{} rotation vectors but {} translation vectors",
                result.rvecs.len(),
                result.tvecs.len()
            )));
        }
        Ok(result)
    }
}

/// Current UTC time as RFC 3339, or an empty string if formatting fails
pub(crate) fn timestamp() -> String {
    time::OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_default()
}
