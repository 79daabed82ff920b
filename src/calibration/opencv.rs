//! OpenCV-backed corner detection and intrinsics solve.

use image::GrayImage;
use nalgebra::{Matrix3, Point2};
use opencv::{
    calib3d,
    core::{Mat, Point2f, Point3f, Size, TermCriteria, TermCriteria_Type, Vector},
    imgproc,
    prelude::*,
};

use super::{BoardPattern, CameraSolution, CameraSolver, ChessboardObservation, CornerFinder};
use crate::error::{LaneError, Result};

/// Wrap an 8-bit grayscale buffer as a single-channel `Mat`
pub fn gray_to_mat(gray: &GrayImage) -> Result<Mat> {
    let flat = Mat::from_slice(gray.as_raw())?;
    let mat = flat.reshape(1, gray.height() as i32)?;
    Ok(mat.try_clone()?)
}

fn pattern_size(pattern: BoardPattern) -> Size {
    Size::new(pattern.nx as i32, pattern.ny as i32)
}

/// `findChessboardCorners` followed by sub-pixel refinement
#[derive(Debug, Clone, Copy)]
pub struct OpenCvChessboard {
    pub refine: bool,
}

impl Default for OpenCvChessboard {
    fn default() -> Self {
        Self { refine: true }
    }
}

impl CornerFinder for OpenCvChessboard {
    fn find_corners(
        &self,
        gray: &GrayImage,
        pattern: BoardPattern,
    ) -> Result<Option<Vec<Point2<f32>>>> {
        let mat = gray_to_mat(gray)?;
        let mut corners = Vector::<Point2f>::new();
        let found = calib3d::find_chessboard_corners(
            &mat,
            pattern_size(pattern),
            &mut corners,
            calib3d::CALIB_CB_ADAPTIVE_THRESH | calib3d::CALIB_CB_NORMALIZE_IMAGE,
        )?;
        if !found {
            return Ok(None);
        }

        if self.refine {
            imgproc::corner_sub_pix(
                &mat,
                &mut corners,
                Size::new(11, 11),
                Size::new(-1, -1),
                TermCriteria::new(
                    TermCriteria_Type::COUNT as i32 + TermCriteria_Type::EPS as i32,
                    30,
                    0.001,
                )?,
            )?;
        }

        Ok(Some(
            corners.iter().map(|p| Point2::new(p.x, p.y)).collect(),
        ))
    }
}

/// `calibrateCamera` with default flags and termination criteria
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenCvSolver;

fn vec3_from_mat(mat: &Mat) -> Result<[f64; 3]> {
    let data = mat.data_typed::<f64>()?;
    match data {
        [a, b, c] => Ok([*a, *b, *c]),
        _ => Err(LaneError::Backend(format!(
            "expected a 3-vector, got {} values",
            data.len()
        ))),
    }
}

impl CameraSolver for OpenCvSolver {
    fn solve(
        &self,
        observations: &[ChessboardObservation],
        image_shape: (u32, u32),
    ) -> Result<CameraSolution> {
        if observations.is_empty() {
            return Err(LaneError::NoCalibrationObservations);
        }

        let object_points: Vector<Vector<Point3f>> = observations
            .iter()
            .map(|obs| {
                obs.object_points
                    .iter()
                    .map(|p| Point3f::new(p.x, p.y, p.z))
                    .collect::<Vector<Point3f>>()
            })
            .collect();
        let image_points: Vector<Vector<Point2f>> = observations
            .iter()
            .map(|obs| {
                obs.image_points
                    .iter()
                    .map(|p| Point2f::new(p.x, p.y))
                    .collect::<Vector<Point2f>>()
            })
            .collect();

        let (height, width) = image_shape;
        let mut camera_matrix = Mat::default();
        let mut dist_coeffs = Vector::<f64>::new();
        let mut rvecs = Vector::<Mat>::new();
        let mut tvecs = Vector::<Mat>::new();

        let rms_error = calib3d::calibrate_camera_def(
            &object_points,
            &image_points,
            Size::new(width as i32, height as i32),
            &mut camera_matrix,
            &mut dist_coeffs,
            &mut rvecs,
            &mut tvecs,
        )?;

        let mut k = Matrix3::zeros();
        for r in 0..3 {
            for c in 0..3 {
                k[(r, c)] = *camera_matrix.at_2d::<f64>(r as i32, c as i32)?;
            }
        }

        Ok(CameraSolution {
            camera_matrix: k,
            distortion: dist_coeffs.to_vec(),
            rvecs: rvecs.iter().map(|m| vec3_from_mat(&m)).collect::<Result<_>>()?,
            tvecs: tvecs.iter().map(|m| vec3_from_mat(&m)).collect::<Result<_>>()?,
            rms_error,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::CameraModel;
    use nalgebra::{Rotation3, Vector3};

    /// Project the board through a known pinhole camera
    fn synthetic_observation(pattern: BoardPattern) -> ChessboardObservation {
        let camera = CameraModel::pinhole(800.0, 1280, 720);
        let rotation = Rotation3::from_euler_angles(0.2, -0.15, 0.05);
        let translation = Vector3::new(-4.0, -2.5, 14.0);
        let corners = pattern
            .object_points()
            .iter()
            .map(|p| {
                let pc = rotation * Vector3::new(p.x as f64, p.y as f64, p.z as f64) + translation;
                let k = camera.camera_matrix;
                Point2::new(
                    (k[(0, 0)] * pc.x / pc.z + k[(0, 2)]) as f32,
                    (k[(1, 1)] * pc.y / pc.z + k[(1, 2)]) as f32,
                )
            })
            .collect();
        ChessboardObservation::new(corners, pattern).unwrap()
    }

    #[test]
    fn single_view_gives_usable_intrinsics() {
        let pattern = BoardPattern::new(9, 6);
        let solution = OpenCvSolver
            .solve(&[synthetic_observation(pattern)], (720, 1280))
            .unwrap();
        let k = solution.camera_matrix;
        assert!(k[(0, 0)] > 0.0 && k[(1, 1)] > 0.0);
        assert!((k[(2, 2)] - 1.0).abs() < 1e-9);
        assert!(k.determinant().abs() > 1e-6);
        assert_eq!(solution.rvecs.len(), 1);
    }
}
