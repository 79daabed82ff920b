mod common;

use common::*;
use image::{Rgb, RgbImage};

fn standard_pipeline() -> FramePipeline {
    FramePipeline::new(&Settings::default(), ideal_camera(1280, 720)).unwrap()
}

#[test]
fn solid_frame_yields_no_lanes() {
    let pipeline = standard_pipeline();
    let frame = RgbImage::from_pixel(1280, 720, Rgb([90, 90, 90]));

    let output = pipeline.process(frame, &PipelineContext::default()).unwrap();

    assert_eq!(output.annotated.dimensions(), (1280, 720));
    assert!(output.lanes.is_empty());
    assert!(output.measurement.is_none());
}

#[test]
fn synthetic_road_finds_both_lines() {
    let pipeline = standard_pipeline();

    let output = pipeline
        .process(synthetic_road(), &PipelineContext::default())
        .unwrap();

    let left = output.lanes.left.as_ref().expect("left line");
    let right = output.lanes.right.as_ref().expect("right line");
    let bottom = 719.0;
    assert!(
        (left.polynomial.x_at(bottom) - 340.0).abs() < 15.0,
        "left at {}",
        left.polynomial.x_at(bottom)
    );
    assert!(
        (right.polynomial.x_at(bottom) - 995.0).abs() < 15.0,
        "right at {}",
        right.polynomial.x_at(bottom)
    );

    let measurement = output.measurement.expect("measurement");
    let offset = measurement.offset_m.expect("offset");
    // lane center sits right of the image center
    assert!(offset < 0.0 && offset > -0.5, "offset {}", offset);
    assert!(measurement.radius_m().unwrap() > 100.0);
}

#[test]
fn overlay_only_brightens_the_frame() {
    let pipeline = standard_pipeline();
    let frame = synthetic_road();

    let output = pipeline
        .process(frame.clone(), &PipelineContext::default())
        .unwrap();

    // blending adds to the undistorted frame, never subtracts
    for (before, after) in frame.pixels().zip(output.annotated.pixels()).step_by(97) {
        for c in 0..3 {
            assert!(after[c] >= before[c]);
        }
    }
    // the lane area between the lines is tinted green
    let inside = output.annotated.get_pixel(660, 650);
    assert!(inside[1] > ASPHALT[1], "pixel {:?}", inside);
}

#[test]
fn processing_is_stateless() {
    let pipeline = standard_pipeline();
    let context = PipelineContext::default();

    let first = pipeline.process(synthetic_road(), &context).unwrap();
    let _ = pipeline
        .process(RgbImage::from_pixel(1280, 720, ASPHALT), &context)
        .unwrap();
    let again = pipeline.process(synthetic_road(), &context).unwrap();

    assert_eq!(first.annotated, again.annotated);
}

#[test]
fn debug_mode_writes_one_file_per_image_step() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = FramePipeline::new(&Settings::default(), ideal_camera(320, 180)).unwrap();
    let context = PipelineContext::new(false).with_debug(dir.path(), "road");

    pipeline
        .process(RgbImage::from_pixel(320, 180, ASPHALT), &context)
        .unwrap();

    for name in [
        "road_00_input.png",
        "road_01_undistort.png",
        "road_02_threshold.png",
        "road_03_perspective_warp.png",
        "road_04_lane_search.png",
        "road_06_composite.png",
    ] {
        assert!(dir.path().join(name).is_file(), "missing {}", name);
    }
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 6);
}

#[test]
fn debug_output_does_not_change_result() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = standard_pipeline();

    let plain = pipeline
        .process(synthetic_road(), &PipelineContext::default())
        .unwrap();
    let traced = pipeline
        .process(
            synthetic_road(),
            &PipelineContext::default().with_debug(dir.path(), "road"),
        )
        .unwrap();

    assert_eq!(plain.annotated, traced.annotated);
}

#[test]
fn unwritable_debug_dir_does_not_fail_frame() {
    let dir = tempfile::tempdir().unwrap();
    // a regular file where the debug directory should be
    let blocker = dir.path().join("debug");
    std::fs::write(&blocker, "not a directory").unwrap();
    let pipeline = standard_pipeline();

    let plain = pipeline
        .process(synthetic_road(), &PipelineContext::default())
        .unwrap();
    let traced = pipeline
        .process(
            synthetic_road(),
            &PipelineContext::default().with_debug(&blocker, "road"),
        )
        .unwrap();

    assert_eq!(plain.annotated, traced.annotated);
    assert!(traced.lanes.left.is_some() && traced.lanes.right.is_some());
}
