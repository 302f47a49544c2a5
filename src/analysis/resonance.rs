//! Damped-oscillator fit for ring-down captures.
//!
//! Model: `y(t) = A * exp(-λ t) * cos(ω t - φ)`.
//!
//! The solver is Levenberg-Marquardt on the four parameters. Unless an
//! explicit starting point is supplied, one is derived from the data:
//! ω from the spacing of zero crossings, λ from the decay of the half-cycle
//! extrema, then A and φ from a linear least-squares solve with λ and ω held
//! fixed. Non-convergence is returned as a value, never raised.

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

use crate::core::FitConvergenceError;

/// Parameters of the damped-sinusoid model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DampedSine {
    pub amplitude: f64,
    /// λ, 1/s
    pub decay: f64,
    /// ω, rad/s
    pub omega: f64,
    /// φ, rad
    pub phase: f64,
}

impl DampedSine {
    pub fn eval(&self, t: f64) -> f64 {
        self.amplitude * (-self.decay * t).exp() * (self.omega * t - self.phase).cos()
    }

    pub fn curve(&self, t: &[f64]) -> Vec<f64> {
        t.iter().map(|&t| self.eval(t)).collect()
    }

    /// Same curve with A ≥ 0, ω ≥ 0 and φ in (-π, π].
    pub fn normalized(self) -> Self {
        let mut p = self;
        if p.omega < 0.0 {
            p.omega = -p.omega;
            p.phase = -p.phase;
        }
        if p.amplitude < 0.0 {
            p.amplitude = -p.amplitude;
            p.phase += PI;
        }
        p.phase = wrap_phase(p.phase);
        p
    }

    fn to_array(self) -> [f64; 4] {
        [self.amplitude, self.decay, self.omega, self.phase]
    }

    fn from_array(p: [f64; 4]) -> Self {
        Self {
            amplitude: p[0],
            decay: p[1],
            omega: p[2],
            phase: p[3],
        }
    }
}

fn wrap_phase(phase: f64) -> f64 {
    let wrapped = phase.rem_euclid(2.0 * PI);
    if wrapped > PI {
        wrapped - 2.0 * PI
    } else {
        wrapped
    }
}

/// ζ = λ / √(λ² + ω²)
pub fn damping_ratio(decay: f64, omega: f64) -> f64 {
    decay / (decay * decay + omega * omega).sqrt()
}

/// δ = 2πζ / √(1 − ζ²)
pub fn log_decrement(zeta: f64) -> f64 {
    2.0 * PI * zeta / (1.0 - zeta * zeta).sqrt()
}

/// Converged fit with derived damping figures.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResonanceFit {
    pub params: DampedSine,
    pub damping_ratio: f64,
    pub log_decrement: f64,
    pub iterations: usize,
    pub residual_rms: f64,
}

impl ResonanceFit {
    fn new(params: DampedSine, iterations: usize, cost: f64, n: usize) -> Self {
        let params = params.normalized();
        let zeta = damping_ratio(params.decay, params.omega);
        Self {
            params,
            damping_ratio: zeta,
            log_decrement: log_decrement(zeta),
            iterations,
            residual_rms: (cost / n as f64).sqrt(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FitOptions {
    pub max_iterations: usize,
    /// Relative tolerance on cost reduction and parameter step
    pub tolerance: f64,
    /// Skip the data-driven starting point
    pub initial_guess: Option<DampedSine>,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            max_iterations: 200,
            tolerance: 1e-10,
            initial_guess: None,
        }
    }
}

const MIN_SAMPLES: usize = 5;
const MAX_DAMPING: f64 = 1e16;

/// Fit the damped-sinusoid model to `(t, y)`.
pub fn fit(t: &[f64], y: &[f64], options: &FitOptions) -> Result<ResonanceFit, FitConvergenceError> {
    let n = t.len().min(y.len());
    if n < MIN_SAMPLES {
        return Err(FitConvergenceError::InsufficientData {
            required: MIN_SAMPLES,
            actual: n,
        });
    }
    let (t, y) = (&t[..n], &y[..n]);

    let start = options.initial_guess.unwrap_or_else(|| initial_guess(t, y));
    let mut p = start.to_array();
    let mut cost = sum_squares(t, y, &p);
    if !cost.is_finite() {
        return Err(FitConvergenceError::NonFinite { iterations: 0 });
    }
    let mut mu = 1e-3;

    for iteration in 1..=options.max_iterations {
        if cost == 0.0 {
            return Ok(ResonanceFit::new(DampedSine::from_array(p), iteration - 1, cost, n));
        }
        let (jtj, gradient) = normal_equations(t, y, &p);

        let mut accepted = None;
        while mu <= MAX_DAMPING {
            let mut lhs = jtj;
            for i in 0..4 {
                lhs[i][i] += mu * jtj[i][i].max(1e-300);
            }
            if let Some(step) = solve4(lhs, gradient) {
                let candidate = [p[0] + step[0], p[1] + step[1], p[2] + step[2], p[3] + step[3]];
                let candidate_cost = sum_squares(t, y, &candidate);
                if candidate_cost.is_finite() && candidate_cost < cost {
                    accepted = Some((candidate, candidate_cost, step));
                    break;
                }
            }
            mu *= 10.0;
        }

        let Some((candidate, candidate_cost, step)) = accepted else {
            // No step reduces the cost: already at the minimum within precision
            return Ok(ResonanceFit::new(DampedSine::from_array(p), iteration, cost, n));
        };

        let reduction = (cost - candidate_cost) / cost;
        let small_step = step
            .iter()
            .zip(candidate.iter())
            .all(|(s, x)| s.abs() <= options.tolerance * (x.abs() + options.tolerance));
        p = candidate;
        cost = candidate_cost;
        mu = (mu / 10.0).max(1e-12);

        if p.iter().any(|x| !x.is_finite()) {
            return Err(FitConvergenceError::NonFinite { iterations: iteration });
        }
        if reduction <= options.tolerance || small_step {
            return Ok(ResonanceFit::new(DampedSine::from_array(p), iteration, cost, n));
        }
    }

    Err(FitConvergenceError::IterationLimit {
        iterations: options.max_iterations,
        cost,
    })
}

/// Data-driven starting point for [`fit`].
pub fn initial_guess(t: &[f64], y: &[f64]) -> DampedSine {
    let crossings = zero_crossings(t, y);

    let omega = match (crossings.first(), crossings.last()) {
        (Some(first), Some(last)) if crossings.len() >= 2 && last > first => {
            PI * (crossings.len() - 1) as f64 / (last - first)
        }
        _ => 1.0,
    };

    // Largest |y| between consecutive crossings traces the envelope
    let mut extrema = Vec::new();
    let mut window = 0;
    let mut best: Option<(f64, f64)> = None;
    for (&ti, &yi) in t.iter().zip(y) {
        while window + 1 < crossings.len() && ti >= crossings[window + 1] {
            if let Some((bt, ba)) = best.take() {
                if ba > 0.0 {
                    extrema.push((bt, ba.ln()));
                }
            }
            window += 1;
        }
        if window + 1 >= crossings.len() {
            break;
        }
        if ti > crossings[window] && best.map_or(true, |(_, ba)| yi.abs() > ba) {
            best = Some((ti, yi.abs()));
        }
    }
    let decay = linear_slope(&extrema).map(|s| -s).unwrap_or(0.0);

    let (amplitude, phase) = amplitude_phase(t, y, decay, omega);
    DampedSine {
        amplitude,
        decay,
        omega,
        phase,
    }
}

fn zero_crossings(t: &[f64], y: &[f64]) -> Vec<f64> {
    let mut crossings = Vec::new();
    for i in 1..y.len() {
        let (y0, y1) = (y[i - 1], y[i]);
        if y0 == 0.0 {
            continue;
        }
        if y1 == 0.0 {
            crossings.push(t[i]);
        } else if (y0 < 0.0) != (y1 < 0.0) {
            crossings.push(t[i - 1] + (t[i] - t[i - 1]) * y0 / (y0 - y1));
        }
    }
    crossings
}

fn linear_slope(points: &[(f64, f64)]) -> Option<f64> {
    if points.len() < 2 {
        return None;
    }
    let n = points.len() as f64;
    let mean_x = points.iter().map(|p| p.0).sum::<f64>() / n;
    let mean_y = points.iter().map(|p| p.1).sum::<f64>() / n;
    let sxx: f64 = points.iter().map(|p| (p.0 - mean_x).powi(2)).sum();
    let sxy: f64 = points.iter().map(|p| (p.0 - mean_x) * (p.1 - mean_y)).sum();
    if sxx == 0.0 {
        None
    } else {
        Some(sxy / sxx)
    }
}

/// Solve `y ≈ e^{-λt}(a cos ωt + b sin ωt)` for a, b; return (A, φ).
fn amplitude_phase(t: &[f64], y: &[f64], decay: f64, omega: f64) -> (f64, f64) {
    let (mut cc, mut cs, mut ss, mut yc, mut ys) = (0.0, 0.0, 0.0, 0.0, 0.0);
    for (&ti, &yi) in t.iter().zip(y) {
        let envelope = (-decay * ti).exp();
        let c = envelope * (omega * ti).cos();
        let s = envelope * (omega * ti).sin();
        cc += c * c;
        cs += c * s;
        ss += s * s;
        yc += yi * c;
        ys += yi * s;
    }
    let det = cc * ss - cs * cs;
    if det.abs() < 1e-300 || !det.is_finite() {
        return (1.0, 0.0);
    }
    let a = (yc * ss - ys * cs) / det;
    let b = (ys * cc - yc * cs) / det;
    (a.hypot(b), b.atan2(a))
}

fn sum_squares(t: &[f64], y: &[f64], p: &[f64; 4]) -> f64 {
    let model = DampedSine::from_array(*p);
    t.iter()
        .zip(y)
        .map(|(&ti, &yi)| {
            let r = yi - model.eval(ti);
            r * r
        })
        .sum()
}

/// JᵀJ and Jᵀr for the current parameters.
fn normal_equations(t: &[f64], y: &[f64], p: &[f64; 4]) -> ([[f64; 4]; 4], [f64; 4]) {
    let [a, decay, omega, phase] = *p;
    let mut jtj = [[0.0; 4]; 4];
    let mut jtr = [0.0; 4];

    for (&ti, &yi) in t.iter().zip(y) {
        let envelope = (-decay * ti).exp();
        let arg = omega * ti - phase;
        let (s, c) = arg.sin_cos();
        let f = a * envelope * c;
        let row = [
            envelope * c,
            -ti * f,
            -ti * a * envelope * s,
            a * envelope * s,
        ];
        let r = yi - f;
        for i in 0..4 {
            jtr[i] += row[i] * r;
            for j in 0..4 {
                jtj[i][j] += row[i] * row[j];
            }
        }
    }
    (jtj, jtr)
}

/// Gaussian elimination with partial pivoting.
fn solve4(mut a: [[f64; 4]; 4], mut b: [f64; 4]) -> Option<[f64; 4]> {
    for col in 0..4 {
        let pivot_row = (col..4).max_by(|&i, &j| a[i][col].abs().total_cmp(&a[j][col].abs()))?;
        if a[pivot_row][col].abs() < 1e-300 {
            return None;
        }
        a.swap(col, pivot_row);
        b.swap(col, pivot_row);

        for row in (col + 1)..4 {
            let factor = a[row][col] / a[col][col];
            for k in col..4 {
                a[row][k] -= factor * a[col][k];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut x = [0.0; 4];
    for row in (0..4).rev() {
        let tail: f64 = ((row + 1)..4).map(|k| a[row][k] * x[k]).sum();
        x[row] = (b[row] - tail) / a[row][row];
    }
    if x.iter().all(|v| v.is_finite()) {
        Some(x)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_damping_figures() {
        let zeta = damping_ratio(1.0, 0.0);
        assert!((zeta - 1.0).abs() < 1e-12);

        let zeta = damping_ratio(3.0, 4.0);
        assert!((zeta - 0.6).abs() < 1e-12);
        assert!((log_decrement(zeta) - 2.0 * PI * 0.6 / 0.8).abs() < 1e-12);
    }

    #[test]
    fn test_normalization_preserves_curve() {
        let raw = DampedSine {
            amplitude: -2.0,
            decay: 0.5,
            omega: -7.0,
            phase: 4.0,
        };
        let norm = raw.normalized();
        assert!(norm.amplitude > 0.0 && norm.omega > 0.0);
        assert!(norm.phase > -PI && norm.phase <= PI);
        for i in 0..20 {
            let t = i as f64 * 0.05;
            assert!((raw.eval(t) - norm.eval(t)).abs() < 1e-9);
        }
    }

    #[test]
    fn test_solve4() {
        let a = [
            [4.0, 1.0, 0.0, 0.0],
            [1.0, 3.0, 0.0, 0.0],
            [0.0, 0.0, 2.0, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ];
        let x = solve4(a, [1.0, 2.0, 4.0, -1.0]).unwrap();
        assert!((4.0 * x[0] + x[1] - 1.0).abs() < 1e-12);
        assert!((x[0] + 3.0 * x[1] - 2.0).abs() < 1e-12);
        assert!((x[2] - 2.0).abs() < 1e-12);
        assert!((x[3] + 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_singular_system() {
        assert!(solve4([[0.0; 4]; 4], [1.0; 4]).is_none());
    }
}
