use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use image::{DynamicImage, GrayImage, RgbImage};
use log::{debug, info, warn};

use crate::calibration::CameraModel;
use crate::error::{LaneError, Result};
use crate::lane::{PerspectiveWarp, SearchOutcome};
use crate::lane::steps::{
    CompositeStep, LaneSearchStep, MeasureStep, PerspectiveStep, ThresholdStep, UndistortStep,
};
use crate::models::{LaneFit, LaneMeasurement};
use crate::settings::Settings;

/// Everything derived from one frame so far.
///
/// Each step fills in its own field and replaces `image` with its visual
/// output; earlier outputs are never modified in place.
#[derive(Clone)]
pub struct FrameData {
    /// Output of the most recent step, saved in debug mode
    pub image: DynamicImage,

    /// The frame as it came from the camera
    pub original: Arc<RgbImage>,

    pub undistorted: Option<Arc<RgbImage>>,
    pub mask: Option<GrayImage>,
    pub top_down: Option<GrayImage>,
    pub search: Option<SearchOutcome>,
    pub measurement: Option<LaneMeasurement>,
}

impl FrameData {
    pub fn from_frame(frame: RgbImage) -> Self {
        let original = Arc::new(frame);
        Self {
            image: DynamicImage::ImageRgb8(original.as_ref().clone()),
            original,
            undistorted: None,
            mask: None,
            top_down: None,
            search: None,
            measurement: None,
        }
    }

    /// Undistorted frame if that step ran, else the original
    pub fn base_frame(&self) -> &RgbImage {
        self.undistorted.as_deref().unwrap_or(self.original.as_ref())
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.original.dimensions()
    }
}

/// Debug configuration for one frame
#[derive(Clone, Debug)]
pub struct DebugConfig {
    /// Directory receiving the intermediate images
    pub output_dir: PathBuf,
    /// File-name stem of the frame being processed
    pub stem: String,
}

impl DebugConfig {
    /// `<output_dir>/<stem>_<NN>_<label>.png`
    pub fn path_for(&self, index: usize, label: &str) -> PathBuf {
        self.output_dir
            .join(format!("{}_{:02}_{}.png", self.stem, index, step_label(label)))
    }
}

/// Lowercase with spaces turned into underscores
pub fn step_label(name: &str) -> String {
    name.to_lowercase().replace(' ', "_")
}

/// Context available to all pipeline steps
#[derive(Clone, Debug, Default)]
pub struct PipelineContext {
    pub verbose: bool,
    pub debug: Option<DebugConfig>,
}

impl PipelineContext {
    pub fn new(verbose: bool) -> Self {
        Self {
            verbose,
            debug: None,
        }
    }

    /// Write intermediate images for the frame named `stem` into
    /// `output_dir`
    pub fn with_debug(mut self, output_dir: &Path, stem: impl Into<String>) -> Self {
        self.debug = Some(DebugConfig {
            output_dir: output_dir.to_path_buf(),
            stem: stem.into(),
        });
        self
    }
}

/// Trait that all pipeline steps must implement
pub trait PipelineStep: Send + Sync {
    /// Derive this step's output from the data so far
    fn process(&self, data: FrameData, context: &PipelineContext) -> Result<FrameData>;

    /// Human-readable name for this step (used in logs and debug file names)
    fn name(&self) -> &str;

    /// Whether the step replaces `FrameData::image`
    fn produces_image(&self) -> bool {
        true
    }
}

/// Final result for one frame
#[derive(Debug, Clone)]
pub struct FrameOutput {
    pub annotated: RgbImage,
    pub lanes: LaneFit,
    /// `None` when no side could be fitted
    pub measurement: Option<LaneMeasurement>,
}

/// Ordered, stateless per-frame processing
pub struct FramePipeline {
    steps: Vec<Arc<dyn PipelineStep>>,
}

impl FramePipeline {
    /// A pipeline with no steps
    pub fn empty() -> Self {
        Self { steps: Vec::new() }
    }

    /// The standard lane-finding pipeline for frames from `camera`
    pub fn new(settings: &Settings, camera: CameraModel) -> Result<Self> {
        let warp = PerspectiveWarp::from_settings(settings)?;
        Ok(Self::empty()
            .add_step(Arc::new(UndistortStep::new(camera)))
            .add_step(Arc::new(ThresholdStep::new(settings.clone())))
            .add_step(Arc::new(PerspectiveStep::new(warp.clone())))
            .add_step(Arc::new(LaneSearchStep::new(settings.into())))
            .add_step(Arc::new(MeasureStep::new(settings.meters_per_pixel)))
            .add_step(Arc::new(CompositeStep::new(warp, settings))))
    }

    /// Add a processing step to the pipeline
    pub fn add_step(mut self, step: Arc<dyn PipelineStep>) -> Self {
        self.steps.push(step);
        self
    }

    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.name()).collect()
    }

    /// Run every step on `frame`
    pub fn process(&self, frame: RgbImage, context: &PipelineContext) -> Result<FrameOutput> {
        let mut data = FrameData::from_frame(frame);
        save_debug(context, 0, "input", &data.image);

        for (idx, step) in self.steps.iter().enumerate() {
            let started = Instant::now();
            data = step.process(data, context)?;
            if context.verbose {
                info!("  {} done in {:.1?}", step.name(), started.elapsed());
            } else {
                debug!("  {} done in {:.1?}", step.name(), started.elapsed());
            }

            if step.produces_image() {
                save_debug(context, idx + 1, step.name(), &data.image);
            }
        }

        let lanes = data.search.map(|s| s.fit).unwrap_or_default();
        Ok(FrameOutput {
            annotated: data.image.to_rgb8(),
            measurement: data.measurement.filter(|_| !lanes.is_empty()),
            lanes,
        })
    }
}

/// Save a debug image if debug mode is enabled. Write failures are logged
/// and never affect the frame result.
fn save_debug(context: &PipelineContext, index: usize, name: &str, image: &DynamicImage) {
    let Some(debug_config) = &context.debug else {
        return;
    };
    let path = debug_config.path_for(index, name);
    let written = std::fs::create_dir_all(&debug_config.output_dir)
        .map_err(LaneError::from)
        .and_then(|()| image.save(&path).map_err(LaneError::from));
    match written {
        Ok(()) => debug!("  saved {}", path.display()),
        Err(err) => warn!("could not save {}: {}", path.display(), err),
    }
}
