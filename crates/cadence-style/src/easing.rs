//! Timing functions for animation pacing.
//!
//! Implements the CSS timing functions: `linear`, the named bezier presets
//! (`ease`, `ease-in`, `ease-out`, `ease-in-out`), arbitrary cubic bezier
//! curves, and stepped functions.
//!
//! Bezier curves are solved numerically. The solver tolerance scales with
//! the animation duration, `1 / (200 * duration)`, so long animations get a
//! tighter solve and never show visible stepping.

use serde::{Deserialize, Serialize};

/// Where the jump occurs in a stepped timing function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepPosition {
    /// Jump at the start of each interval.
    Start,
    /// Jump at the end of each interval.
    #[default]
    End,
}

/// A timing function mapping linear progress in [0, 1] to eased progress.
///
/// Bezier outputs may overshoot [0, 1]; callers must accept extrapolated
/// progress.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TimingFunction {
    /// Identity pacing.
    Linear,

    /// CSS `ease`: `cubic-bezier(0.25, 0.1, 0.25, 1.0)`.
    Ease,

    /// CSS `ease-in`: `cubic-bezier(0.42, 0, 1, 1)`.
    EaseIn,

    /// CSS `ease-out`: `cubic-bezier(0, 0, 0.58, 1)`.
    EaseOut,

    /// CSS `ease-in-out`: `cubic-bezier(0.42, 0, 0.58, 1)`.
    EaseInOut,

    /// Arbitrary cubic bezier curve through (0,0), (x1,y1), (x2,y2), (1,1).
    CubicBezier { x1: f64, y1: f64, x2: f64, y2: f64 },

    /// Stepped pacing with `count` discrete intervals.
    Steps { count: u32, position: StepPosition },
}

impl Default for TimingFunction {
    fn default() -> Self {
        Self::Ease
    }
}

impl TimingFunction {
    /// Create a custom cubic bezier timing function.
    ///
    /// # Panics
    /// Panics if x1 or x2 are outside [0, 1] (the curve would not be a
    /// function of time).
    pub fn cubic_bezier(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        assert!(
            (0.0..=1.0).contains(&x1) && (0.0..=1.0).contains(&x2),
            "Bezier x values must be in [0, 1]"
        );
        Self::CubicBezier { x1, y1, x2, y2 }
    }

    /// Create a stepped timing function.
    ///
    /// # Panics
    /// Panics if `count` is 0.
    pub fn steps(count: u32, position: StepPosition) -> Self {
        assert!(count >= 1, "Steps must be at least 1");
        Self::Steps { count, position }
    }

    /// Evaluate the timing function at progress `t` for an animation of the
    /// given duration (seconds). Linear is the identity and passes `t`
    /// through unchanged; bezier curves are solved at the duration-scaled
    /// tolerance.
    pub fn evaluate(&self, t: f64, duration: f64) -> f64 {
        match *self {
            Self::Linear => t,
            Self::Steps { count, position } => stepped(count, position, t.clamp(0.0, 1.0)),
            Self::Ease => solve_bezier(0.25, 0.1, 0.25, 1.0, t, duration),
            Self::EaseIn => solve_bezier(0.42, 0.0, 1.0, 1.0, t, duration),
            Self::EaseOut => solve_bezier(0.0, 0.0, 0.58, 1.0, t, duration),
            Self::EaseInOut => solve_bezier(0.42, 0.0, 0.58, 1.0, t, duration),
            Self::CubicBezier { x1, y1, x2, y2 } => solve_bezier(x1, y1, x2, y2, t, duration),
        }
    }
}

/// Convert progress to a parametric position on the curve, then to eased
/// output, at the duration-scaled tolerance.
fn solve_bezier(x1: f64, y1: f64, x2: f64, y2: f64, t: f64, duration: f64) -> f64 {
    let t = t.clamp(0.0, 1.0);
    if t <= 0.0 {
        return 0.0;
    }
    if t >= 1.0 {
        return 1.0;
    }
    UnitBezier::new(x1, y1, x2, y2).solve(t, solve_epsilon(duration))
}

/// Solver tolerance for a bezier running over `duration` seconds. Longer
/// animations need more precision in the timing result to avoid visible
/// discontinuities.
fn solve_epsilon(duration: f64) -> f64 {
    if duration > 0.0 {
        1.0 / (200.0 * duration)
    } else {
        1e-6
    }
}

/// Cubic bezier through (0,0) and (1,1) with polynomial coefficients
/// precomputed for sampling.
struct UnitBezier {
    ax: f64,
    bx: f64,
    cx: f64,
    ay: f64,
    by: f64,
    cy: f64,
}

impl UnitBezier {
    fn new(p1x: f64, p1y: f64, p2x: f64, p2y: f64) -> Self {
        let cx = 3.0 * p1x;
        let bx = 3.0 * (p2x - p1x) - cx;
        let ax = 1.0 - cx - bx;
        let cy = 3.0 * p1y;
        let by = 3.0 * (p2y - p1y) - cy;
        let ay = 1.0 - cy - by;
        Self { ax, bx, cx, ay, by, cy }
    }

    fn sample_x(&self, t: f64) -> f64 {
        ((self.ax * t + self.bx) * t + self.cx) * t
    }

    fn sample_y(&self, t: f64) -> f64 {
        ((self.ay * t + self.by) * t + self.cy) * t
    }

    fn sample_dx(&self, t: f64) -> f64 {
        (3.0 * self.ax * t + 2.0 * self.bx) * t + self.cx
    }

    /// Find the curve parameter whose x equals `x`, to within `epsilon`.
    fn solve_x(&self, x: f64, epsilon: f64) -> f64 {
        // Newton-Raphson is fast when the derivative is well behaved.
        let mut t = x;
        for _ in 0..8 {
            let err = self.sample_x(t) - x;
            if err.abs() < epsilon {
                return t;
            }
            let dx = self.sample_dx(t);
            if dx.abs() < 1e-6 {
                break;
            }
            t -= err / dx;
        }

        // Fall back to bisection.
        let mut lo = 0.0_f64;
        let mut hi = 1.0_f64;
        t = x;
        if t < lo {
            return lo;
        }
        if t > hi {
            return hi;
        }
        while lo < hi {
            let sample = self.sample_x(t);
            if (sample - x).abs() < epsilon {
                return t;
            }
            if x > sample {
                lo = t;
            } else {
                hi = t;
            }
            t = (hi - lo) * 0.5 + lo;
        }
        t
    }

    fn solve(&self, x: f64, epsilon: f64) -> f64 {
        self.sample_y(self.solve_x(x, epsilon))
    }
}

fn stepped(count: u32, position: StepPosition, t: f64) -> f64 {
    if count == 0 {
        return t;
    }
    let steps = count as f64;
    match position {
        StepPosition::Start => ((t * steps).ceil() / steps).min(1.0),
        StepPosition::End => ((t * steps).floor() / steps).min(1.0),
    }
}
