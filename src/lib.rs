pub mod calibration;
pub mod error;
pub mod files;
pub mod lane;
pub mod models;
pub mod pipeline;
pub mod runner;
pub mod settings;

pub use calibration::{
    BoardPattern, CalibrationReport, CalibrationResult, CameraModel, CameraSolver, Calibrator,
    ChessboardObservation, CornerFinder,
};
pub use error::{LaneError, Result};
pub use models::{LaneFit, LaneLine, LaneMeasurement, LanePolynomial, LaneSide};
pub use pipeline::{
    DebugConfig, FrameData, FrameOutput, FramePipeline, PipelineContext, PipelineStep,
};
pub use runner::{ImageRunner, RunSummary};
pub use settings::Settings;
