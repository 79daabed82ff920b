use std::sync::Arc;

use image::DynamicImage;
use log::debug;

use super::composite::{Compositor, search_overlay};
use super::measure::measure;
use super::perspective::PerspectiveWarp;
use super::search::{SearchParams, find_lanes};
use super::threshold::lane_mask;
use crate::calibration::{CameraModel, undistort_image};
use crate::error::Result;
use crate::pipeline::{FrameData, PipelineContext, PipelineStep};
use crate::settings::Settings;

/// Remove lens distortion
pub struct UndistortStep {
    camera: CameraModel,
}

impl UndistortStep {
    pub fn new(camera: CameraModel) -> Self {
        Self { camera }
    }
}

impl PipelineStep for UndistortStep {
    fn process(&self, mut data: FrameData, _context: &PipelineContext) -> Result<FrameData> {
        let undistorted = undistort_image(&data.original, &self.camera);
        data.image = DynamicImage::ImageRgb8(undistorted.clone());
        data.undistorted = Some(Arc::new(undistorted));
        Ok(data)
    }

    fn name(&self) -> &str {
        "Undistort"
    }
}

/// Gradient and color thresholds limited to the road region
pub struct ThresholdStep {
    settings: Settings,
}

impl ThresholdStep {
    pub fn new(settings: Settings) -> Self {
        Self { settings }
    }
}

impl PipelineStep for ThresholdStep {
    fn process(&self, mut data: FrameData, _context: &PipelineContext) -> Result<FrameData> {
        let mask = lane_mask(data.base_frame(), &self.settings);
        data.image = DynamicImage::ImageLuma8(mask.clone());
        data.mask = Some(mask);
        Ok(data)
    }

    fn name(&self) -> &str {
        "Threshold"
    }
}

/// Bird's-eye view of the lane mask
pub struct PerspectiveStep {
    warp: PerspectiveWarp,
}

impl PerspectiveStep {
    pub fn new(warp: PerspectiveWarp) -> Self {
        Self { warp }
    }
}

impl PipelineStep for PerspectiveStep {
    fn process(&self, mut data: FrameData, _context: &PipelineContext) -> Result<FrameData> {
        let mask = match &data.mask {
            Some(mask) => mask.clone(),
            None => data.image.to_luma8(),
        };
        let top_down = self.warp.warp_mask(&mask)?;
        data.image = DynamicImage::ImageLuma8(top_down.clone());
        data.top_down = Some(top_down);
        Ok(data)
    }

    fn name(&self) -> &str {
        "Perspective Warp"
    }
}

/// Sliding-window search and polynomial fit
pub struct LaneSearchStep {
    params: SearchParams,
}

impl LaneSearchStep {
    pub fn new(params: SearchParams) -> Self {
        Self { params }
    }
}

impl PipelineStep for LaneSearchStep {
    fn process(&self, mut data: FrameData, _context: &PipelineContext) -> Result<FrameData> {
        let top_down = match &data.top_down {
            Some(top_down) => top_down.clone(),
            None => data.image.to_luma8(),
        };
        let outcome = find_lanes(&top_down, &self.params);
        debug!(
            "  lane fit: left={} right={}",
            outcome.fit.left.is_some(),
            outcome.fit.right.is_some()
        );
        data.image = DynamicImage::ImageRgb8(search_overlay(&top_down, &outcome));
        data.search = Some(outcome);
        Ok(data)
    }

    fn name(&self) -> &str {
        "Lane Search"
    }
}

/// Curvature and lateral offset in meters
pub struct MeasureStep {
    meters_per_pixel: (f64, f64),
}

impl MeasureStep {
    pub fn new(meters_per_pixel: (f64, f64)) -> Self {
        Self { meters_per_pixel }
    }
}

impl PipelineStep for MeasureStep {
    fn process(&self, mut data: FrameData, _context: &PipelineContext) -> Result<FrameData> {
        let (width, height) = data.dimensions();
        if let Some(search) = &data.search {
            if !search.fit.is_empty() {
                let m = measure(&search.fit, width, height, self.meters_per_pixel);
                debug!("  {:?}", m);
                data.measurement = Some(m);
            }
        }
        Ok(data)
    }

    fn name(&self) -> &str {
        "Measure"
    }

    fn produces_image(&self) -> bool {
        false
    }
}

/// Lane overlay and readout on the undistorted frame
pub struct CompositeStep {
    compositor: Compositor,
}

impl CompositeStep {
    pub fn new(warp: PerspectiveWarp, settings: &Settings) -> Self {
        Self {
            compositor: Compositor::new(warp, settings),
        }
    }
}

impl PipelineStep for CompositeStep {
    fn process(&self, mut data: FrameData, _context: &PipelineContext) -> Result<FrameData> {
        let fit = data.search.as_ref().map(|s| s.fit.clone()).unwrap_or_default();
        let annotated =
            self.compositor
                .compose(data.base_frame(), &fit, data.measurement.as_ref())?;
        data.image = DynamicImage::ImageRgb8(annotated);
        Ok(data)
    }

    fn name(&self) -> &str {
        "Composite"
    }
}
