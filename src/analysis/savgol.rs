//! Savitzky–Golay smoothing.
//!
//! Each output sample is the value at that position of a least-squares
//! polynomial fitted over a window of neighbours. Interior samples use one
//! set of convolution weights; the first and last `window / 2` samples are
//! read off polynomials fitted to the first and last full windows.

use crate::config::check_window;
use crate::error::{EchemError, Result};

#[derive(Debug, Clone)]
pub struct SavitzkyGolay {
    window: usize,
    polyorder: usize,
    /// Inverse Gram matrix of the window's scaled polynomial basis.
    gram_inv: Vec<Vec<f64>>,
    /// Weights producing the centre value of the window.
    centre: Vec<f64>,
}

impl SavitzkyGolay {
    /// Build a filter for an odd `window` and `polyorder < window`.
    pub fn new(window: usize, polyorder: usize) -> Result<Self> {
        check_window("Savitzky-Golay window", window, polyorder)?;

        let terms = polyorder + 1;
        let mut filter = SavitzkyGolay {
            window,
            polyorder,
            gram_inv: Vec::new(),
            centre: Vec::new(),
        };

        let mut gram = vec![vec![0.0; terms]; terms];
        for k in 0..window {
            let phi = filter.basis(filter.position(k));
            for a in 0..terms {
                for b in 0..terms {
                    gram[a][b] += phi[a] * phi[b];
                }
            }
        }
        filter.gram_inv = invert(gram)?;
        filter.centre = filter.weights_at(0.0);
        Ok(filter)
    }

    pub fn window(&self) -> usize {
        self.window
    }

    /// Window offset `k` mapped onto [-1, 1].
    fn position(&self, k: usize) -> f64 {
        let half = (self.window / 2) as f64;
        if half == 0.0 {
            0.0
        } else {
            (k as f64 - half) / half
        }
    }

    fn basis(&self, u: f64) -> Vec<f64> {
        let mut phi = Vec::with_capacity(self.polyorder + 1);
        let mut power = 1.0;
        for _ in 0..=self.polyorder {
            phi.push(power);
            power *= u;
        }
        phi
    }

    /// Weights over the window that evaluate the fitted polynomial at `u`.
    fn weights_at(&self, u: f64) -> Vec<f64> {
        let phi_u = self.basis(u);
        let g_phi: Vec<f64> = self
            .gram_inv
            .iter()
            .map(|row| row.iter().zip(&phi_u).map(|(g, p)| g * p).sum())
            .collect();
        (0..self.window)
            .map(|k| {
                self.basis(self.position(k))
                    .iter()
                    .zip(&g_phi)
                    .map(|(p, g)| p * g)
                    .sum()
            })
            .collect()
    }

    /// Smooth `data`. Fails with `InsufficientSamples` when the window is
    /// longer than the signal.
    pub fn apply(&self, data: &[f64]) -> Result<Vec<f64>> {
        let n = data.len();
        if n < self.window {
            return Err(EchemError::InsufficientSamples {
                what: "Savitzky-Golay window",
                required: self.window,
                available: n,
            });
        }

        let half = self.window / 2;
        let mut out = vec![0.0; n];

        for i in half..n - half {
            out[i] = dot(&self.centre, &data[i - half..=i + half]);
        }

        let head = &data[..self.window];
        let tail = &data[n - self.window..];
        for i in 0..half {
            out[i] = dot(&self.weights_at(self.position(i)), head);
            let k = self.window - 1 - i;
            out[n - 1 - i] = dot(&self.weights_at(self.position(k)), tail);
        }

        Ok(out)
    }
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Gauss–Jordan inversion with partial pivoting.
fn invert(mut a: Vec<Vec<f64>>) -> Result<Vec<Vec<f64>>> {
    let n = a.len();
    let mut inv: Vec<Vec<f64>> = (0..n)
        .map(|i| (0..n).map(|j| if i == j { 1.0 } else { 0.0 }).collect())
        .collect();

    for col in 0..n {
        let pivot = (col..n)
            .max_by(|&r, &s| a[r][col].abs().total_cmp(&a[s][col].abs()))
            .unwrap_or(col);
        if a[pivot][col].abs() < 1e-12 {
            return Err(EchemError::NumericalFit(
                "singular Savitzky-Golay normal equations".into(),
            ));
        }
        a.swap(col, pivot);
        inv.swap(col, pivot);

        let p = a[col][col];
        for j in 0..n {
            a[col][j] /= p;
            inv[col][j] /= p;
        }
        for r in 0..n {
            if r == col {
                continue;
            }
            let factor = a[r][col];
            if factor == 0.0 {
                continue;
            }
            for j in 0..n {
                a[r][j] -= factor * a[col][j];
                inv[r][j] -= factor * inv[col][j];
            }
        }
    }
    Ok(inv)
}
