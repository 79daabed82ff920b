//! Frame-by-frame video processing through OpenCV's videoio.

use std::path::Path;

use image::RgbImage;
use log::{debug, info, warn};
use opencv::{
    core::{Mat, Size},
    imgproc,
    prelude::*,
    videoio::{
        self, VideoCapture, VideoCaptureTrait, VideoCaptureTraitConst, VideoWriter,
        VideoWriterTrait,
    },
};

use crate::error::{LaneError, Result};
use crate::pipeline::{FramePipeline, PipelineContext};
use crate::runner::RunSummary;

fn path_str(path: &Path) -> Result<&str> {
    path.to_str()
        .ok_or_else(|| LaneError::Backend(format!("non UTF-8 path: {}", path.display())))
}

/// BGR `Mat` from the decoder into an RGB buffer
fn mat_to_rgb(mat: &Mat) -> Result<RgbImage> {
    let mut rgb = Mat::default();
    imgproc::cvt_color_def(mat, &mut rgb, imgproc::COLOR_BGR2RGB)?;
    let (width, height) = (rgb.cols() as u32, rgb.rows() as u32);
    let data = rgb.data_bytes()?.to_vec();
    RgbImage::from_raw(width, height, data)
        .ok_or_else(|| LaneError::Backend("decoded frame has an unexpected size".to_string()))
}

/// RGB buffer into a BGR `Mat` for the encoder
fn rgb_to_mat(frame: &RgbImage) -> Result<Mat> {
    let flat = Mat::from_slice(frame.as_raw())?;
    let rgb = flat.reshape(3, frame.height() as i32)?;
    let mut bgr = Mat::default();
    imgproc::cvt_color_def(&rgb, &mut bgr, imgproc::COLOR_RGB2BGR)?;
    Ok(bgr)
}

/// Re-encodes a video with every frame annotated. Audio is dropped.
pub struct VideoRunner {
    pipeline: FramePipeline,
    verbose: bool,
}

impl VideoRunner {
    pub fn new(pipeline: FramePipeline) -> Self {
        Self {
            pipeline,
            verbose: false,
        }
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Read `input`, write `output` at the same frame rate and size
    pub fn run(&self, input: &Path, output: &Path) -> Result<RunSummary> {
        if !input.is_file() {
            return Err(LaneError::InputNotFound {
                path: input.to_path_buf(),
            });
        }

        let mut capture = VideoCapture::from_file(path_str(input)?, videoio::CAP_ANY)?;
        if !capture.is_opened()? {
            return Err(LaneError::Backend(format!(
                "cannot open video {}",
                input.display()
            )));
        }
        let fps = VideoCaptureTraitConst::get(&capture, videoio::CAP_PROP_FPS)?;
        let width = VideoCaptureTraitConst::get(&capture, videoio::CAP_PROP_FRAME_WIDTH)? as i32;
        let height = VideoCaptureTraitConst::get(&capture, videoio::CAP_PROP_FRAME_HEIGHT)? as i32;
        let total = VideoCaptureTraitConst::get(&capture, videoio::CAP_PROP_FRAME_COUNT)? as i64;
        info!(
            "{}: {}x{} at {:.2} fps, ~{} frames",
            input.display(),
            width,
            height,
            fps,
            total
        );

        if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let fourcc = VideoWriter::fourcc('m', 'p', '4', 'v')?;
        let mut writer = VideoWriter::new(
            path_str(output)?,
            fourcc,
            fps,
            Size::new(width, height),
            true,
        )?;
        if !writer.is_opened()? {
            return Err(LaneError::Backend(format!(
                "cannot open {} for writing",
                output.display()
            )));
        }

        let context = PipelineContext::new(self.verbose);
        let mut summary = RunSummary::default();
        let mut mat = Mat::default();
        while VideoCaptureTrait::read(&mut capture, &mut mat)? && !mat.empty() {
            let index = summary.total();
            let annotated = mat_to_rgb(&mat)
                .and_then(|frame| self.pipeline.process(frame, &context))
                .and_then(|out| rgb_to_mat(&out.annotated));

            match annotated {
                Ok(bgr) => {
                    VideoWriterTrait::write(&mut writer, &bgr)?;
                    summary.processed += 1;
                }
                Err(err) => {
                    warn!("frame {}: {}; writing it unchanged", index, err);
                    VideoWriterTrait::write(&mut writer, &mat)?;
                    summary.failed += 1;
                }
            }
            if index % 100 == 0 {
                debug!("frame {}/{}", index, total);
            }
        }
        writer.release()?;

        info!("wrote {}", output.display());
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn color_order_survives_round_trip() {
        let mut frame = RgbImage::new(4, 2);
        frame.put_pixel(1, 1, Rgb([250, 10, 20]));
        let bgr = rgb_to_mat(&frame).unwrap();
        let back = mat_to_rgb(&bgr).unwrap();
        assert_eq!(back.get_pixel(1, 1), &Rgb([250, 10, 20]));
        assert_eq!(back.dimensions(), (4, 2));
    }
}
