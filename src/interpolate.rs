//! Interpolation Engine
//!
//! Piecewise-linear evaluation of breakpoint curves.
//!
//! Out-of-range diameters:
//! - below the first breakpoint, the value scales linearly from the origin
//!   (zero diameter → zero benefit) up to the first breakpoint
//! - above the last breakpoint, the last segment's slope is continued
//!
//! A curve with a single breakpoint is constant.

use crate::curves::{Curve, RegionCurveSet};
use crate::factors::BenefitVector;
use std::cmp::Ordering;

/// Evaluate a curve at a diameter
pub fn interpolate(curve: Curve<'_>, diameter: f64) -> f64 {
    let breaks = curve.breaks();
    let values = curve.values();
    debug_assert_eq!(breaks.len(), values.len());
    let n = breaks.len();

    match n {
        0 => return 0.0,
        1 => return values[0],
        _ => {}
    }

    // Exact hit returns the tabulated value untouched
    if let Ok(i) = breaks[..n]
        .binary_search_by(|b| b.partial_cmp(&diameter).unwrap_or(Ordering::Less))
    {
        return values[i];
    }

    if diameter < breaks[0] && breaks[0] > 0.0 {
        return values[0] * (diameter / breaks[0]);
    }

    // Segment index: bracketing segment inside the range, first/last segment outside
    let upper = breaks[..n].partition_point(|b| *b <= diameter);
    let i = upper.saturating_sub(1).min(n - 2);

    let (x0, x1) = (breaks[i], breaks[i + 1]);
    let (y0, y1) = (values[i], values[i + 1]);

    y0 + (y1 - y0) * (diameter - x0) / (x1 - x0)
}

/// Add one tree's per-factor benefits into `accumulator`
///
/// Factors without a curve for `itree_code` contribute nothing. Values are
/// added, so the same accumulator can sum a whole batch.
pub fn calc_one_tree(
    curves: &RegionCurveSet,
    itree_code: &str,
    diameter: f64,
    accumulator: &mut BenefitVector,
) {
    for (i, factor) in curves.iter().enumerate() {
        if let Some(curve) = factor.curve(itree_code) {
            accumulator[i] += interpolate(curve, diameter);
        }
    }
}
