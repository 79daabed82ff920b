use crate::models::{LaneFit, LaneLine, LaneMeasurement};

/// Radii of curvature at the bottom row and the vehicle's lateral offset,
/// in meters.
///
/// `meters_per_pixel` is the (x, y) size of one bird's-eye pixel. The
/// offset assumes the camera is mounted on the vehicle's center line and
/// is only reported when both sides were fitted.
pub fn measure(fit: &LaneFit, width: u32, height: u32, meters_per_pixel: (f64, f64)) -> LaneMeasurement {
    let (mx, my) = meters_per_pixel;
    let bottom = height.saturating_sub(1) as f64;
    let y_eval = bottom * my;

    let radius = |line: &LaneLine| line.polynomial.scaled(mx, my).radius_at(y_eval);

    let offset_m = match (&fit.left, &fit.right) {
        (Some(left), Some(right)) => {
            let lane_center =
                (left.polynomial.x_at(bottom) + right.polynomial.x_at(bottom)) / 2.0;
            Some((width as f64 / 2.0 - lane_center) * mx)
        }
        _ => None,
    };

    LaneMeasurement {
        left_radius_m: fit.left.as_ref().map(radius),
        right_radius_m: fit.right.as_ref().map(radius),
        offset_m,
    }
}
