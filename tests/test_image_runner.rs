mod common;

use common::*;
use image::Rgb;
use lanefinder::ImageRunner;

fn small_pipeline() -> FramePipeline {
    FramePipeline::new(&Settings::default(), ideal_camera(160, 90)).unwrap()
}

#[test]
fn writes_final_image_per_input() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    create_test_image(input.path(), "test1.jpg", 160, 90, ASPHALT);
    create_test_image(input.path(), "test2.png", 160, 90, Rgb([120, 110, 90]));
    std::fs::write(input.path().join("readme.txt"), "skip me").unwrap();

    let runner = ImageRunner::new(small_pipeline(), output.path().to_path_buf()).unwrap();
    let summary = runner.run(input.path()).unwrap();

    assert_eq!(summary.processed, 2);
    assert_eq!(summary.failed, 0);
    assert!(output.path().join("final_test1.jpg").is_file());
    assert!(output.path().join("final_test2.png").is_file());
    let out = image::open(output.path().join("final_test2.png")).unwrap();
    assert_eq!((out.width(), out.height()), (160, 90));
}

#[test]
fn creates_missing_output_directory() {
    let input = tempfile::tempdir().unwrap();
    let root = tempfile::tempdir().unwrap();
    let output = root.path().join("nested").join("output_images");
    create_test_image(input.path(), "frame.png", 160, 90, ASPHALT);

    let runner = ImageRunner::new(small_pipeline(), output.clone()).unwrap();
    runner.run(input.path()).unwrap();

    assert!(output.join("final_frame.png").is_file());
}

#[test]
fn bad_file_is_counted_and_skipped() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    create_test_image(input.path(), "good.png", 160, 90, ASPHALT);
    std::fs::write(input.path().join("bad.png"), b"garbage").unwrap();

    let runner = ImageRunner::new(small_pipeline(), output.path().to_path_buf()).unwrap();
    let summary = runner.run(input.path()).unwrap();

    assert_eq!(summary.processed, 1);
    assert_eq!(summary.failed, 1);
    assert!(!output.path().join("final_bad.png").exists());
}

#[test]
fn intermediates_land_next_to_outputs() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    create_test_image(input.path(), "road.png", 160, 90, ASPHALT);

    let runner = ImageRunner::new(small_pipeline(), output.path().to_path_buf())
        .unwrap()
        .with_intermediates(true);
    runner.run(input.path()).unwrap();

    assert!(output.path().join("road_00_input.png").is_file());
    assert!(output.path().join("road_02_threshold.png").is_file());
    assert!(output.path().join("final_road.png").is_file());
}

#[test]
fn missing_input_directory_fails_the_run() {
    let output = tempfile::tempdir().unwrap();
    let runner = ImageRunner::new(small_pipeline(), output.path().to_path_buf()).unwrap();

    let err = runner.run(&output.path().join("absent")).unwrap_err();

    assert!(matches!(err, LaneError::InputNotFound { .. }));
}

#[test]
fn failed_intermediate_write_still_writes_final() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    create_test_image(input.path(), "road.png", 160, 90, ASPHALT);
    std::fs::create_dir_all(output.path().join("road_00_input.png")).unwrap();

    let runner = ImageRunner::new(small_pipeline(), output.path().to_path_buf())
        .unwrap()
        .with_intermediates(true);
    let summary = runner.run(input.path()).unwrap();

    assert_eq!(summary.processed, 1);
    assert_eq!(summary.failed, 0);
    assert!(output.path().join("final_road.png").is_file());
    assert!(output.path().join("road_02_threshold.png").is_file());
}
