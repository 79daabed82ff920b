mod fixtures;
pub use fixtures::*;

// Re-export commonly used types from lanefinder for tests
pub use lanefinder::calibration::CameraSolution;
pub use lanefinder::{
    BoardPattern, CalibrationResult, CameraModel, CameraSolver, Calibrator, ChessboardObservation,
    CornerFinder, FramePipeline, LaneError, LaneFit, PipelineContext, Settings,
};
