use std::path::PathBuf;

/// Errors produced by the calibration and lane-finding library.
#[derive(thiserror::Error, Debug)]
pub enum LaneError {
    #[error("input not found: {}", path.display())]
    InputNotFound { path: PathBuf },

    #[error("no chessboard corners were detected in any calibration image")]
    NoCalibrationObservations,

    #[error(
        "image {} is {}x{} but calibration images are {}x{}",
        path.display(), found.1, found.0, expected.1, expected.0
    )]
    DimensionMismatch {
        path: PathBuf,
        /// (height, width) of the first accepted image
        expected: (u32, u32),
        /// (height, width) of the offending image
        found: (u32, u32),
    },

    #[error("invalid calibration file: {0}")]
    CalibrationFormat(String),

    #[error("invalid settings: {0}")]
    InvalidSettings(String),

    #[error("perspective transform is degenerate")]
    DegenerateTransform,

    #[error("computer-vision backend failed: {0}")]
    Backend(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Image(#[from] image::ImageError),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, LaneError>;

#[cfg(feature = "opencv")]
impl From<opencv::Error> for LaneError {
    fn from(err: opencv::Error) -> Self {
        LaneError::Backend(err.to_string())
    }
}
