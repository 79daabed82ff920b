mod common;

use common::*;
use image::GrayImage;
use lanefinder::LanePolynomial;
use lanefinder::lane::search::{SearchParams, find_lanes};

fn params() -> SearchParams {
    SearchParams::from(&Settings::default())
}

#[test]
fn recovers_two_vertical_lines() {
    let mask = two_curve_mask(
        1280,
        720,
        LanePolynomial::new(0.0, 0.0, 340.0),
        LanePolynomial::new(0.0, 0.0, 995.0),
        8,
    );

    let outcome = find_lanes(&mask, &params());

    let left = outcome.fit.left.expect("left fit");
    let right = outcome.fit.right.expect("right fit");
    for y in [0.0, 360.0, 719.0] {
        assert!((left.polynomial.x_at(y) - 340.0).abs() < 1.0);
        assert!((right.polynomial.x_at(y) - 995.0).abs() < 1.0);
    }
    assert!(left.polynomial.a.abs() < 1e-6);
}

#[test]
fn follows_curved_lines() {
    let left_truth = LanePolynomial::new(2e-4, -0.25, 380.0);
    let right_truth = LanePolynomial::new(2e-4, -0.25, 1000.0);
    let mask = two_curve_mask(1280, 720, left_truth, right_truth, 10);

    let outcome = find_lanes(&mask, &params());

    let left = outcome.fit.left.expect("left fit");
    let right = outcome.fit.right.expect("right fit");
    for y in [100.0, 400.0, 719.0] {
        assert!((left.polynomial.x_at(y) - left_truth.x_at(y)).abs() < 3.0);
        assert!((right.polynomial.x_at(y) - right_truth.x_at(y)).abs() < 3.0);
    }
    // two windows per band
    assert_eq!(outcome.windows.len(), 2 * params().nb_steps as usize);
}

#[test]
fn one_visible_line_gives_one_side() {
    let mut mask = GrayImage::new(1280, 720);
    for y in 0..720 {
        for x in 898..904 {
            mask.put_pixel(x, y, image::Luma([255]));
        }
    }

    let outcome = find_lanes(&mask, &params());

    assert!(outcome.fit.left.is_none());
    assert!(outcome.fit.right.is_some());
}

#[test]
fn sparse_side_is_not_fitted() {
    let mut mask = GrayImage::new(1280, 720);
    // a handful of left pixels, a full right line
    for y in (600..720).step_by(10) {
        mask.put_pixel(300, y, image::Luma([255]));
    }
    for y in 0..720 {
        mask.put_pixel(1000, y, image::Luma([255]));
    }

    let outcome = find_lanes(&mask, &params());

    assert!(outcome.fit.left.is_none());
    assert!(outcome.fit.right.is_some());
}

#[test]
fn edge_columns_do_not_seed() {
    let mut mask = GrayImage::new(1280, 720);
    for y in 0..720 {
        for x in 0..20 {
            mask.put_pixel(x, y, image::Luma([255]));
        }
    }

    let outcome = find_lanes(&mask, &params());

    assert!(outcome.fit.is_empty());
}

#[test]
fn each_pixel_is_collected_once() {
    let mask = two_curve_mask(
        1280,
        720,
        LanePolynomial::new(0.0, 0.0, 340.0),
        LanePolynomial::new(0.0, 0.0, 995.0),
        4,
    );

    let outcome = find_lanes(&mask, &params());

    // overlapping bands would otherwise count rows twice
    let left = outcome.fit.left.unwrap();
    assert_eq!(left.pixels.len(), 720 * 4);
}
