//! Spline fitting for resampling and differentiation.
//!
//! Degree 1 is the piecewise-linear interpolant. Degree 3 is a natural cubic
//! smoothing spline: among all cubic splines whose residual sum of squares
//! stays within the smoothing factor, it picks the one with the least
//! integrated squared second derivative. A smoothing factor of zero gives the
//! interpolating natural cubic spline.

use crate::error::{EchemError, Result};

/// Relative tolerance on the residual sum of squares when matching `s`.
const RSS_TOLERANCE: f64 = 1e-3;
const MAX_PENALTY_EXPANSIONS: usize = 80;
const MAX_PENALTY_BISECTIONS: usize = 80;

#[derive(Debug, Clone)]
pub enum Spline {
    Linear {
        x: Vec<f64>,
        y: Vec<f64>,
    },
    /// Knot values `g` and second derivatives `m` (zero at both ends).
    Cubic {
        x: Vec<f64>,
        g: Vec<f64>,
        m: Vec<f64>,
    },
}

impl Spline {
    /// Fit a spline of `degree` (1 or 3) through strictly increasing `x`.
    pub fn fit(x: &[f64], y: &[f64], degree: usize, smoothing: f64) -> Result<Self> {
        if x.len() != y.len() {
            return Err(EchemError::NumericalFit(format!(
                "spline abscissa has {} points but ordinate has {}",
                x.len(),
                y.len()
            )));
        }
        if x.len() < degree + 1 {
            return Err(EchemError::InsufficientSamples {
                what: "spline fit",
                required: degree + 1,
                available: x.len(),
            });
        }
        if x.windows(2).any(|w| !(w[1] > w[0])) {
            return Err(EchemError::NumericalFit(
                "spline abscissa must be strictly increasing".into(),
            ));
        }
        if y.iter().any(|v| !v.is_finite()) {
            return Err(EchemError::NumericalFit("non-finite spline ordinate".into()));
        }

        match degree {
            1 => Ok(Spline::Linear {
                x: x.to_vec(),
                y: y.to_vec(),
            }),
            3 => fit_cubic(x, y, smoothing),
            other => Err(EchemError::InvalidParameter(format!(
                "unsupported spline degree {other}"
            ))),
        }
    }

    fn knots(&self) -> &[f64] {
        match self {
            Spline::Linear { x, .. } | Spline::Cubic { x, .. } => x,
        }
    }

    /// Index `i` of the knot interval `[x[i], x[i + 1]]` used for `t`.
    /// Points outside the knot range use the first or last interval.
    fn interval(&self, t: f64) -> usize {
        let x = self.knots();
        let i = x.partition_point(|&k| k <= t);
        i.saturating_sub(1).min(x.len() - 2)
    }

    pub fn evaluate(&self, at: &[f64]) -> Vec<f64> {
        at.iter().map(|&t| self.value(t)).collect()
    }

    pub fn derivative(&self, at: &[f64]) -> Vec<f64> {
        at.iter().map(|&t| self.slope(t)).collect()
    }

    fn value(&self, t: f64) -> f64 {
        let i = self.interval(t);
        match self {
            Spline::Linear { x, y } => {
                let h = x[i + 1] - x[i];
                y[i] + (y[i + 1] - y[i]) * (t - x[i]) / h
            }
            Spline::Cubic { x, g, m } => {
                let h = x[i + 1] - x[i];
                let a = (x[i + 1] - t) / h;
                let b = (t - x[i]) / h;
                a * g[i]
                    + b * g[i + 1]
                    + ((a * a * a - a) * m[i] + (b * b * b - b) * m[i + 1]) * h * h / 6.0
            }
        }
    }

    fn slope(&self, t: f64) -> f64 {
        let i = self.interval(t);
        match self {
            Spline::Linear { x, y } => (y[i + 1] - y[i]) / (x[i + 1] - x[i]),
            Spline::Cubic { x, g, m } => {
                let h = x[i + 1] - x[i];
                let a = (x[i + 1] - t) / h;
                let b = (t - x[i]) / h;
                (g[i + 1] - g[i]) / h - (3.0 * a * a - 1.0) / 6.0 * h * m[i]
                    + (3.0 * b * b - 1.0) / 6.0 * h * m[i + 1]
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Cubic smoothing spline
// ---------------------------------------------------------------------------

/// Band matrices of the penalised normal equations
/// `(R + alpha * QᵀQ) m = Qᵀy` over the interior knots.
struct CubicSystem {
    /// Reciprocal knot spacings.
    r: Vec<f64>,
    /// `R` diagonal and first super-diagonal.
    r_diag: Vec<f64>,
    r_off1: Vec<f64>,
    /// `QᵀQ` diagonal, first and second super-diagonals.
    q_diag: Vec<f64>,
    q_off1: Vec<f64>,
    q_off2: Vec<f64>,
    qty: Vec<f64>,
}

impl CubicSystem {
    fn new(x: &[f64], y: &[f64]) -> Self {
        let n = x.len();
        let h: Vec<f64> = x.windows(2).map(|w| w[1] - w[0]).collect();
        let r: Vec<f64> = h.iter().map(|v| 1.0 / v).collect();
        let interior = n - 2;

        let mut sys = CubicSystem {
            r_diag: vec![0.0; interior],
            r_off1: vec![0.0; interior],
            q_diag: vec![0.0; interior],
            q_off1: vec![0.0; interior],
            q_off2: vec![0.0; interior],
            qty: vec![0.0; interior],
            r,
        };

        // Row j of the system is interior knot k = j + 1.
        for j in 0..interior {
            let k = j + 1;
            let (rl, rr) = (sys.r[k - 1], sys.r[k]);
            sys.r_diag[j] = (h[k - 1] + h[k]) / 3.0;
            sys.q_diag[j] = rl * rl + (rl + rr) * (rl + rr) + rr * rr;
            sys.qty[j] = (y[k + 1] - y[k]) * rr - (y[k] - y[k - 1]) * rl;
            if j + 1 < interior {
                let rn = sys.r[k + 1];
                sys.r_off1[j] = h[k] / 6.0;
                sys.q_off1[j] = -(rl + rr) * rr - rr * (rr + rn);
            }
            if j + 2 < interior {
                sys.q_off2[j] = rr * sys.r[k + 1];
            }
        }
        sys
    }

    /// Solve for the interior second derivatives at penalty `alpha`.
    fn solve(&self, alpha: f64) -> Result<Vec<f64>> {
        let diag: Vec<f64> = self
            .r_diag
            .iter()
            .zip(&self.q_diag)
            .map(|(r, q)| r + alpha * q)
            .collect();
        let off1: Vec<f64> = self
            .r_off1
            .iter()
            .zip(&self.q_off1)
            .map(|(r, q)| r + alpha * q)
            .collect();
        let off2: Vec<f64> = self.q_off2.iter().map(|q| alpha * q).collect();
        solve_pentadiagonal(&diag, &off1, &off2, &self.qty)
    }

    /// `Q m` for interior second derivatives `gamma`, one entry per knot.
    fn q_times(&self, gamma: &[f64]) -> Vec<f64> {
        let mut out = vec![0.0; gamma.len() + 2];
        for (j, &c) in gamma.iter().enumerate() {
            let k = j + 1;
            out[k - 1] += self.r[k - 1] * c;
            out[k] -= (self.r[k - 1] + self.r[k]) * c;
            out[k + 1] += self.r[k] * c;
        }
        out
    }

    fn residual_ss(&self, alpha: f64, gamma: &[f64]) -> f64 {
        let qg = self.q_times(gamma);
        alpha * alpha * qg.iter().map(|v| v * v).sum::<f64>()
    }
}

fn fit_cubic(x: &[f64], y: &[f64], smoothing: f64) -> Result<Spline> {
    let n = x.len();
    if n < 4 {
        return Err(EchemError::InsufficientSamples {
            what: "cubic spline fit",
            required: 4,
            available: n,
        });
    }
    let sys = CubicSystem::new(x, y);
    let alpha = if smoothing > 0.0 {
        choose_penalty(&sys, x, smoothing)?
    } else {
        0.0
    };

    let gamma = sys.solve(alpha)?;
    let qg = sys.q_times(&gamma);
    let g: Vec<f64> = y.iter().zip(&qg).map(|(yi, q)| yi - alpha * q).collect();

    let mut m = Vec::with_capacity(n);
    m.push(0.0);
    m.extend_from_slice(&gamma);
    m.push(0.0);

    log::debug!(
        "cubic smoothing spline: {n} knots, penalty {alpha:e}, rss {:e}",
        sys.residual_ss(alpha, &gamma)
    );
    Ok(Spline::Cubic { x: x.to_vec(), g, m })
}

/// Largest penalty whose residual sum of squares does not exceed `s`.
fn choose_penalty(sys: &CubicSystem, x: &[f64], s: f64) -> Result<f64> {
    let span = x[x.len() - 1] - x[0];
    let mean_h = span / (x.len() - 1) as f64;

    let rss = |alpha: f64| -> Result<f64> {
        let gamma = sys.solve(alpha)?;
        Ok(sys.residual_ss(alpha, &gamma))
    };

    // R scales with h and QᵀQ with 1/h², so h³ balances the two terms.
    let mut lo = 0.0;
    let mut hi = mean_h.powi(3);
    let mut expansions = 0;
    while rss(hi)? < s {
        lo = hi;
        hi *= 10.0;
        expansions += 1;
        if expansions >= MAX_PENALTY_EXPANSIONS {
            // Even a near-straight line stays within s.
            return Ok(lo);
        }
    }

    for _ in 0..MAX_PENALTY_BISECTIONS {
        let mid = if lo == 0.0 { hi / 10.0 } else { (lo * hi).sqrt() };
        let r = rss(mid)?;
        if (r - s).abs() <= RSS_TOLERANCE * s {
            return Ok(mid);
        }
        if r < s {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    Ok(lo)
}

/// Solve a symmetric positive definite pentadiagonal system by banded
/// Cholesky factorisation. `off1[i]` couples rows `i` and `i + 1`,
/// `off2[i]` rows `i` and `i + 2`.
fn solve_pentadiagonal(diag: &[f64], off1: &[f64], off2: &[f64], rhs: &[f64]) -> Result<Vec<f64>> {
    let n = diag.len();
    // l0 = diagonal of L, l1[i] = L[i][i-1], l2[i] = L[i][i-2]
    let mut l0 = vec![0.0; n];
    let mut l1 = vec![0.0; n];
    let mut l2 = vec![0.0; n];

    for i in 0..n {
        if i >= 2 {
            l2[i] = off2[i - 2] / l0[i - 2];
        }
        if i >= 1 {
            l1[i] = (off1[i - 1] - l2[i] * l1[i - 1]) / l0[i - 1];
        }
        let d = diag[i] - l1[i] * l1[i] - l2[i] * l2[i];
        if !(d > 0.0) || !d.is_finite() {
            return Err(EchemError::NumericalFit(
                "smoothing spline system is not positive definite".into(),
            ));
        }
        l0[i] = d.sqrt();
    }

    let mut z = vec![0.0; n];
    for i in 0..n {
        let mut v = rhs[i];
        if i >= 1 {
            v -= l1[i] * z[i - 1];
        }
        if i >= 2 {
            v -= l2[i] * z[i - 2];
        }
        z[i] = v / l0[i];
    }

    let mut out = vec![0.0; n];
    for i in (0..n).rev() {
        let mut v = z[i];
        if i + 1 < n {
            v -= l1[i + 1] * out[i + 1];
        }
        if i + 2 < n {
            v -= l2[i + 2] * out[i + 2];
        }
        out[i] = v / l0[i];
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(n: usize, lo: f64, hi: f64) -> Vec<f64> {
        (0..n)
            .map(|i| lo + (hi - lo) * i as f64 / (n - 1) as f64)
            .collect()
    }

    #[test]
    fn linear_spline_interpolates_and_differentiates() {
        let spline = Spline::fit(&[0.0, 1.0, 3.0], &[0.0, 2.0, 0.0], 1, 0.0).unwrap();
        assert_eq!(spline.evaluate(&[0.5, 1.0, 2.0]), vec![1.0, 2.0, 1.0]);
        assert_eq!(spline.derivative(&[0.5, 2.0]), vec![2.0, -1.0]);
    }

    #[test]
    fn interpolating_cubic_passes_through_knots() {
        let x = grid(30, 0.0, 3.0);
        let y: Vec<f64> = x.iter().map(|v| v.sin()).collect();
        let spline = Spline::fit(&x, &y, 3, 0.0).unwrap();
        for (a, b) in spline.evaluate(&x).iter().zip(&y) {
            assert!((a - b).abs() < 1e-12);
        }
        // Derivative of sin away from the natural end conditions.
        let probe = [1.0, 1.5, 2.0];
        for (d, t) in spline.derivative(&probe).iter().zip(probe) {
            assert!((d - t.cos()).abs() < 1e-3, "{d} vs {}", t.cos());
        }
    }

    #[test]
    fn smoothing_spline_keeps_residual_within_budget() {
        let x = grid(200, 0.0, 1.0);
        let y: Vec<f64> = x
            .iter()
            .enumerate()
            .map(|(i, v)| v * v + if i % 2 == 0 { 0.01 } else { -0.01 })
            .collect();
        let s = 200.0 * 0.01 * 0.01 * 0.5;
        let spline = Spline::fit(&x, &y, 3, s).unwrap();
        let rss: f64 = spline
            .evaluate(&x)
            .iter()
            .zip(&y)
            .map(|(a, b)| (a - b) * (a - b))
            .sum();
        assert!(rss <= s * (1.0 + 2.0 * RSS_TOLERANCE), "rss {rss} above budget {s}");
        assert!(rss > 0.5 * s, "rss {rss} far below budget {s}");
    }

    #[test]
    fn repeated_abscissa_is_rejected() {
        assert!(matches!(
            Spline::fit(&[0.0, 1.0, 1.0, 2.0], &[0.0; 4], 3, 0.0),
            Err(EchemError::NumericalFit(_))
        ));
    }

    #[test]
    fn too_few_points_for_a_cubic() {
        assert!(matches!(
            Spline::fit(&[0.0, 1.0, 2.0], &[0.0; 3], 3, 0.0),
            Err(EchemError::InsufficientSamples { required: 4, .. })
        ));
    }

    #[test]
    fn pentadiagonal_solver_matches_dense_product() {
        let diag = [6.0, 7.0, 8.0, 7.0, 6.0];
        let off1 = [-2.0, -1.5, -1.0, -0.5, 0.0];
        let off2 = [0.5, 0.25, 0.5, 0.0, 0.0];
        let expected = [1.0, -2.0, 0.5, 3.0, -1.0];
        let n = diag.len();
        let mut rhs = vec![0.0; n];
        for i in 0..n {
            rhs[i] += diag[i] * expected[i];
            if i + 1 < n {
                rhs[i] += off1[i] * expected[i + 1];
                rhs[i + 1] += off1[i] * expected[i];
            }
            if i + 2 < n {
                rhs[i] += off2[i] * expected[i + 2];
                rhs[i + 2] += off2[i] * expected[i];
            }
        }
        let solved = solve_pentadiagonal(&diag, &off1, &off2, &rhs).unwrap();
        for (a, b) in solved.iter().zip(expected) {
            assert!((a - b).abs() < 1e-12);
        }
    }
}
