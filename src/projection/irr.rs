//! Compound annual rate of return (CAR) of a cash-flow series
//!
//! Finds the rate r at which every flow, compounded from its own year to the
//! final year, sums to zero. Failure to find one is reported with the
//! `NO_SOLUTION` sentinel rather than an error.

use log::debug;

/// Returned when no rate reconciles the flows
pub const NO_SOLUTION: f64 = 1.0;

const INITIAL_GUESS: f64 = 0.05;
const MIN_RATE: f64 = -0.99;
const MAX_RATE: f64 = 0.95;
const TOLERANCE: f64 = 1e-10;
const MAX_ITERATIONS: usize = 100;
const MAX_BISECTIONS: usize = 200;

pub fn is_no_solution(rate: f64) -> bool {
    rate == NO_SOLUTION
}

/// Solve for the CAR of (year, flow) pairs, or `NO_SOLUTION`
///
/// Uses Newton-Raphson from 5%, falling back to bisection over
/// [-99%, 95%] when a step stalls or the iteration cap is reached.
pub fn find_rate(flows: &[(i32, f64)]) -> f64 {
    let Some(final_year) = flows.iter().map(|&(year, _)| year).max() else {
        return NO_SOLUTION;
    };

    let scale = flows.iter().map(|&(_, cf)| cf.abs()).fold(0.0, f64::max);
    if scale == 0.0 || !scale.is_finite() {
        return NO_SOLUTION;
    }

    // Work on flows scaled to unit magnitude so the tolerance is relative
    let terms: Vec<(f64, f64)> = flows
        .iter()
        .map(|&(year, cf)| ((final_year - year) as f64, cf / scale))
        .collect();

    // A root needs both contributions and payouts
    let has_positive = terms.iter().any(|&(_, cf)| cf > TOLERANCE);
    let has_negative = terms.iter().any(|&(_, cf)| cf < -TOLERANCE);
    if !has_positive || !has_negative {
        return NO_SOLUTION;
    }

    let rate = newton(&terms).or_else(|| {
        debug!("Newton-Raphson did not converge, falling back to bisection");
        bisection(&terms)
    });

    match rate {
        Some(r) if r > MIN_RATE && r < MAX_RATE => r,
        _ => NO_SOLUTION,
    }
}

/// `find_rate` with the sentinel mapped to None
pub fn try_find_rate(flows: &[(i32, f64)]) -> Option<f64> {
    let rate = find_rate(flows);
    (!is_no_solution(rate)).then_some(rate)
}

/// Future value at the final year and its derivative with respect to rate
fn fv_and_derivative(terms: &[(f64, f64)], rate: f64) -> (f64, f64) {
    let growth = 1.0 + rate;
    let mut fv = 0.0;
    let mut dfv = 0.0;

    for &(n, cf) in terms {
        let compounded = cf * growth.powf(n);
        fv += compounded;
        if n > 0.0 {
            dfv += n * compounded / growth;
        }
    }

    (fv, dfv)
}

fn fv_at_rate(terms: &[(f64, f64)], rate: f64) -> f64 {
    let growth = 1.0 + rate;
    terms.iter().map(|&(n, cf)| cf * growth.powf(n)).sum()
}

fn newton(terms: &[(f64, f64)]) -> Option<f64> {
    let mut rate = INITIAL_GUESS;

    for _ in 0..MAX_ITERATIONS {
        let (fv, dfv) = fv_and_derivative(terms, rate);

        if !fv.is_finite() || !dfv.is_finite() || dfv.abs() < 1e-20 {
            return None;
        }

        // Bound the step to the search interval
        let next = (rate - fv / dfv).clamp(MIN_RATE, MAX_RATE);

        if (next - rate).abs() < TOLERANCE {
            return (fv_at_rate(terms, next).abs() < 1e-8).then_some(next);
        }

        rate = next;
    }

    None
}

fn bisection(terms: &[(f64, f64)]) -> Option<f64> {
    let mut low = MIN_RATE;
    let mut high = MAX_RATE;
    let mut fv_low = fv_at_rate(terms, low);
    let fv_high = fv_at_rate(terms, high);

    if !fv_low.is_finite() || !fv_high.is_finite() || fv_low * fv_high > 0.0 {
        return None;
    }

    for _ in 0..MAX_BISECTIONS {
        let mid = (low + high) / 2.0;
        let fv_mid = fv_at_rate(terms, mid);

        if fv_mid.abs() < TOLERANCE || (high - low) / 2.0 < TOLERANCE {
            return Some(mid);
        }

        if fv_mid * fv_low < 0.0 {
            high = mid;
        } else {
            low = mid;
            fv_low = fv_mid;
        }
    }

    None
}
