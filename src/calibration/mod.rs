//! Camera calibration from chessboard images.
//!
//! Corner detection and the intrinsics solve are delegated to a
//! [`CornerFinder`] and a [`CameraSolver`]; the OpenCV implementations live
//! in [`opencv`] behind the `opencv` feature. This module owns the batch:
//! file discovery, per-image bookkeeping, the image-size guard,
//! persistence and diagnostic images.

pub mod distortion;
#[cfg(feature = "opencv")]
pub mod opencv;
pub mod record;

use std::path::{Path, PathBuf};

use image::{GrayImage, Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_circle_mut, draw_line_segment_mut};
use log::{debug, info, warn};
use nalgebra::{Matrix3, Point2, Point3};

use crate::error::{LaneError, Result};
use crate::files::{list_images, prefixed_output};

pub use distortion::{CameraModel, Distortion, undistort_image};
pub use record::CalibrationResult;

/// Interior-corner layout of the chessboard
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoardPattern {
    pub nx: u32,
    pub ny: u32,
}

impl BoardPattern {
    pub fn new(nx: u32, ny: u32) -> Self {
        Self { nx, ny }
    }

    pub fn corner_count(&self) -> usize {
        (self.nx * self.ny) as usize
    }

    /// Board-frame coordinates of every corner, in square units on the
    /// z = 0 plane, x varying fastest.
    pub fn object_points(&self) -> Vec<Point3<f32>> {
        (0..self.ny)
            .flat_map(|y| (0..self.nx).map(move |x| Point3::new(x as f32, y as f32, 0.0)))
            .collect()
    }
}

/// Detected corners of one image paired with their board coordinates
#[derive(Debug, Clone, PartialEq)]
pub struct ChessboardObservation {
    pub image_points: Vec<Point2<f32>>,
    pub object_points: Vec<Point3<f32>>,
}

impl ChessboardObservation {
    /// Pair detected corners with the board layout. Fails unless exactly
    /// one corner per board point was found.
    pub fn new(image_points: Vec<Point2<f32>>, pattern: BoardPattern) -> Option<Self> {
        if image_points.len() != pattern.corner_count() {
            return None;
        }
        Some(Self {
            image_points,
            object_points: pattern.object_points(),
        })
    }

    pub fn len(&self) -> usize {
        self.image_points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.image_points.is_empty()
    }
}

/// Output of a [`CameraSolver`]
#[derive(Debug, Clone)]
pub struct CameraSolution {
    pub camera_matrix: Matrix3<f64>,
    pub distortion: Vec<f64>,
    pub rvecs: Vec<[f64; 3]>,
    pub tvecs: Vec<[f64; 3]>,
    pub rms_error: f64,
}

/// Locates chessboard corners in a grayscale image
pub trait CornerFinder {
    /// Returns `None` when the full pattern is not visible
    fn find_corners(
        &self,
        gray: &GrayImage,
        pattern: BoardPattern,
    ) -> Result<Option<Vec<Point2<f32>>>>;
}

/// Solves intrinsics and distortion from a set of observations
pub trait CameraSolver {
    /// `image_shape` is (height, width)
    fn solve(
        &self,
        observations: &[ChessboardObservation],
        image_shape: (u32, u32),
    ) -> Result<CameraSolution>;
}

/// Where diagnostic images are written, if anywhere
#[derive(Debug, Clone)]
pub struct Diagnostics {
    pub output_dir: PathBuf,
}

/// Outcome of a calibration run
#[derive(Debug, Clone)]
pub struct CalibrationReport {
    pub result: CalibrationResult,
    /// Images that contributed an observation
    pub accepted: Vec<PathBuf>,
    /// Images skipped, with the reason
    pub skipped: Vec<(PathBuf, String)>,
}

/// Batch calibrator over a directory of chessboard images
pub struct Calibrator<F, S> {
    pattern: BoardPattern,
    finder: F,
    solver: S,
    diagnostics: Option<Diagnostics>,
}

impl<F: CornerFinder, S: CameraSolver> Calibrator<F, S> {
    pub fn new(pattern: BoardPattern, finder: F, solver: S) -> Self {
        Self {
            pattern,
            finder,
            solver,
            diagnostics: None,
        }
    }

    /// Write `corners_*` and `undist_*` images into `output_dir`,
    /// creating it if needed.
    pub fn with_diagnostics(mut self, output_dir: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&output_dir)?;
        self.diagnostics = Some(Diagnostics { output_dir });
        Ok(self)
    }

    /// Calibrate from every image in `input_dir`
    pub fn run(&self, input_dir: &Path) -> Result<CalibrationReport> {
        let files = list_images(input_dir)?;
        info!("found {} calibration images in {}", files.len(), input_dir.display());
        for file in &files {
            debug!("  {}", file.display());
        }
        self.calibrate_files(&files)
    }

    /// Calibrate from an explicit list of image files
    pub fn calibrate_files(&self, files: &[PathBuf]) -> Result<CalibrationReport> {
        let mut observations = Vec::new();
        let mut accepted = Vec::new();
        let mut skipped = Vec::new();
        let mut image_shape: Option<(u32, u32)> = None;

        for file in files {
            match self.observe(file, image_shape) {
                Ok(Some((observation, shape))) => {
                    image_shape.get_or_insert(shape);
                    observations.push(observation);
                    accepted.push(file.clone());
                }
                Ok(None) => {
                    warn!("corners not found for {}", file.display());
                    skipped.push((file.clone(), "corners not found".to_string()));
                }
                Err(err) => {
                    warn!("skipping {}: {}", file.display(), err);
                    skipped.push((file.clone(), err.to_string()));
                }
            }
        }

        let Some(image_shape) = image_shape else {
            return Err(LaneError::NoCalibrationObservations);
        };
        info!(
            "solving with {} observations, image shape {}x{}",
            observations.len(),
            image_shape.1,
            image_shape.0
        );

        let solution = self.solver.solve(&observations, image_shape)?;
        let result = CalibrationResult {
            image_shape,
            camera_matrix: [
                [
                    solution.camera_matrix[(0, 0)],
                    solution.camera_matrix[(0, 1)],
                    solution.camera_matrix[(0, 2)],
                ],
                [
                    solution.camera_matrix[(1, 0)],
                    solution.camera_matrix[(1, 1)],
                    solution.camera_matrix[(1, 2)],
                ],
                [
                    solution.camera_matrix[(2, 0)],
                    solution.camera_matrix[(2, 1)],
                    solution.camera_matrix[(2, 2)],
                ],
            ],
            distortion: solution.distortion,
            rvecs: solution.rvecs,
            tvecs: solution.tvecs,
            rms_error: solution.rms_error,
            created_at: record::timestamp(),
        };

        if let Some(diagnostics) = &self.diagnostics {
            self.save_undistorted(files, &result, diagnostics);
        }

        Ok(CalibrationReport {
            result,
            accepted,
            skipped,
        })
    }

    /// Detect the board in one image. `Ok(None)` means no board was found.
    fn observe(
        &self,
        file: &Path,
        expected_shape: Option<(u32, u32)>,
    ) -> Result<Option<(ChessboardObservation, (u32, u32))>> {
        let img = image::open(file)?;
        let shape = (img.height(), img.width());
        if let Some(expected) = expected_shape {
            if expected != shape {
                return Err(LaneError::DimensionMismatch {
                    path: file.to_path_buf(),
                    expected,
                    found: shape,
                });
            }
        }

        let gray = img.to_luma8();
        let Some(corners) = self.finder.find_corners(&gray, self.pattern)? else {
            return Ok(None);
        };
        let Some(observation) = ChessboardObservation::new(corners, self.pattern) else {
            return Ok(None);
        };

        if let Some(diagnostics) = &self.diagnostics {
            let mut canvas = img.to_rgb8();
            draw_corners(&mut canvas, self.pattern, &observation.image_points);
            let out = prefixed_output(&diagnostics.output_dir, "corners_", file);
            match canvas.save(&out) {
                Ok(()) => debug!("saved {}", out.display()),
                Err(err) => warn!("could not save {}: {}", out.display(), err),
            }
        }

        Ok(Some((observation, shape)))
    }

    fn save_undistorted(
        &self,
        files: &[PathBuf],
        result: &CalibrationResult,
        diagnostics: &Diagnostics,
    ) {
        let camera = match result.camera_model() {
            Ok(camera) => camera,
            Err(err) => {
                warn!("skipping undistorted images: {}", err);
                return;
            }
        };
        for file in files {
            let img = match image::open(file) {
                Ok(img) => img.to_rgb8(),
                Err(err) => {
                    warn!("cannot reload {}: {}", file.display(), err);
                    continue;
                }
            };
            let out = prefixed_output(&diagnostics.output_dir, "undist_", file);
            match undistort_image(&img, &camera).save(&out) {
                Ok(()) => debug!("saved {}", out.display()),
                Err(err) => warn!("could not save {}: {}", out.display(), err),
            }
        }
    }
}

/// Mark each corner and join them row by row, one color per row
pub fn draw_corners(canvas: &mut RgbImage, pattern: BoardPattern, corners: &[Point2<f32>]) {
    const PALETTE: [[u8; 3]; 6] = [
        [255, 0, 0],
        [255, 128, 0],
        [200, 200, 0],
        [0, 200, 0],
        [0, 128, 255],
        [160, 0, 255],
    ];
    let nx = pattern.nx.max(1) as usize;
    for (i, p) in corners.iter().enumerate() {
        let color = Rgb(PALETTE[(i / nx) % PALETTE.len()]);
        draw_hollow_circle_mut(canvas, (p.x.round() as i32, p.y.round() as i32), 5, color);
        if let Some(next) = corners.get(i + 1) {
            draw_line_segment_mut(canvas, (p.x, p.y), (next.x, next.y), color);
        }
    }
}
