use std::fmt;

/// Which lane boundary a fit belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaneSide {
    Left,
    Right,
}

impl fmt::Display for LaneSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LaneSide::Left => f.write_str("left"),
            LaneSide::Right => f.write_str("right"),
        }
    }
}

/// Second-order polynomial giving the horizontal lane position as a
/// function of the row: `x = a·y² + b·y + c`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LanePolynomial {
    pub a: f64,
    pub b: f64,
    pub c: f64,
}

impl LanePolynomial {
    pub fn new(a: f64, b: f64, c: f64) -> Self {
        Self { a, b, c }
    }

    pub fn x_at(&self, y: f64) -> f64 {
        (self.a * y + self.b) * y + self.c
    }

    /// dx/dy at row `y`
    pub fn slope_at(&self, y: f64) -> f64 {
        2.0 * self.a * y + self.b
    }

    /// Re-express the curve in metric units given the size of one pixel
    /// along x and y.
    pub fn scaled(&self, x_per_px: f64, y_per_px: f64) -> Self {
        Self {
            a: x_per_px * self.a / (y_per_px * y_per_px),
            b: x_per_px * self.b / y_per_px,
            c: x_per_px * self.c,
        }
    }

    /// Radius of curvature at row `y`. Infinite for a straight line.
    pub fn radius_at(&self, y: f64) -> f64 {
        if self.a.abs() < f64::EPSILON {
            return f64::INFINITY;
        }
        let slope = self.slope_at(y);
        (1.0 + slope * slope).powf(1.5) / (2.0 * self.a).abs()
    }
}

/// One fitted lane boundary together with the pixels it was fitted to
#[derive(Debug, Clone)]
pub struct LaneLine {
    pub side: LaneSide,
    pub polynomial: LanePolynomial,
    /// (x, y) coordinates in the bird's-eye view
    pub pixels: Vec<(u32, u32)>,
}

/// Result of the sliding-window search for a single frame.
///
/// A side is `None` when too few pixels were collected for a fit.
#[derive(Debug, Clone, Default)]
pub struct LaneFit {
    pub left: Option<LaneLine>,
    pub right: Option<LaneLine>,
}

impl LaneFit {
    pub fn is_empty(&self) -> bool {
        self.left.is_none() && self.right.is_none()
    }

    /// Fitted sides, left first
    pub fn lines(&self) -> impl Iterator<Item = &LaneLine> {
        self.left.iter().chain(self.right.iter())
    }
}

/// Real-world measurements derived from a [`LaneFit`]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LaneMeasurement {
    pub left_radius_m: Option<f64>,
    pub right_radius_m: Option<f64>,
    /// Lateral offset of the camera from the lane center; positive when
    /// the vehicle sits right of center.
    pub offset_m: Option<f64>,
}

impl LaneMeasurement {
    /// Mean of the available radii
    pub fn radius_m(&self) -> Option<f64> {
        match (self.left_radius_m, self.right_radius_m) {
            (Some(l), Some(r)) => Some((l + r) / 2.0),
            (Some(v), None) | (None, Some(v)) => Some(v),
            (None, None) => None,
        }
    }

    /// Lines of the on-frame readout
    pub fn readout(&self) -> Vec<String> {
        let mut lines = Vec::new();
        if let Some(radius) = self.radius_m() {
            if radius.is_finite() {
                lines.push(format!("Radius of curvature: {:.0} m", radius));
            } else {
                lines.push("Radius of curvature: straight".to_string());
            }
        }
        if let Some(offset) = self.offset_m {
            let direction = if offset >= 0.0 { "right" } else { "left" };
            lines.push(format!(
                "Vehicle is {:.2} m {} of center",
                offset.abs(),
                direction
            ));
        }
        lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn radius_of_circle_like_parabola() {
        // x = y²/(2R) has curvature 1/R at its vertex
        let poly = LanePolynomial::new(1.0 / (2.0 * 500.0), 0.0, 0.0);
        assert_relative_eq!(poly.radius_at(0.0), 500.0, epsilon = 1e-9);
    }

    #[test]
    fn straight_line_has_infinite_radius() {
        let poly = LanePolynomial::new(0.0, 0.1, 300.0);
        assert!(poly.radius_at(100.0).is_infinite());
    }

    #[test]
    fn scaling_preserves_positions() {
        let poly = LanePolynomial::new(2e-4, -0.1, 320.0);
        let (mx, my) = (3.7 / 700.0, 30.0 / 720.0);
        let metric = poly.scaled(mx, my);
        for y in [0.0, 200.0, 719.0] {
            assert_relative_eq!(metric.x_at(y * my), poly.x_at(y) * mx, epsilon = 1e-9);
        }
    }

    #[test]
    fn readout_reports_direction() {
        let m = LaneMeasurement {
            left_radius_m: Some(900.0),
            right_radius_m: Some(1100.0),
            offset_m: Some(-0.25),
        };
        let lines = m.readout();
        assert_eq!(lines[0], "Radius of curvature: 1000 m");
        assert_eq!(lines[1], "Vehicle is 0.25 m left of center");
    }
}
