use super::savgol::SavitzkyGolay;
use super::spline::Spline;
use crate::config::SmoothingParams;
use crate::error::{EchemError, Result};

// ---------------------------------------------------------------------------
// Cleaned half-cycle signal
// ---------------------------------------------------------------------------

/// One half-cycle resampled onto a uniform voltage grid and smoothed.
#[derive(Debug, Clone)]
pub struct CleanedSignal {
    /// Uniform grid spanning the measured voltage range.
    pub voltage: Vec<f64>,
    /// Smoothed specific capacity on the grid.
    pub capacity: Vec<f64>,
    /// Smoothed dQ/dV on the grid.
    pub dqdv: Vec<f64>,
    /// Smoothed derivative of dQ/dV with respect to voltage.
    pub dqdv_derivative: Vec<f64>,
    /// Grid index of the dominant dQ/dV peak.
    pub peak_index: usize,
}

/// Resample and smooth one half-cycle's (voltage, capacity, dQ/dV) triples.
pub fn clean(
    voltage: &[f64],
    capacity: &[f64],
    dqdv: &[f64],
    params: &SmoothingParams,
) -> Result<CleanedSignal> {
    params.validate()?;
    let (unique_v, mean_cap, mean_dqdv) = dedup_by_voltage(voltage, capacity, dqdv)?;
    if unique_v.len() < 2 {
        return Err(EchemError::InsufficientSamples {
            what: "distinct voltage samples",
            required: 2,
            available: unique_v.len(),
        });
    }

    let grid = uniform_grid(unique_v[0], unique_v[unique_v.len() - 1], params.grid_size);
    let first_pass = SavitzkyGolay::new(params.window_size_1, params.polyorder_1)?;

    let cap_on_grid = Spline::fit(&unique_v, &mean_cap, 1, 0.0)?.evaluate(&grid);
    let smooth_cap = first_pass.apply(&cap_on_grid)?;

    let dqdv_on_grid = Spline::fit(&unique_v, &mean_dqdv, 1, 0.0)?.evaluate(&grid);
    let smooth_dqdv = first_pass.apply(&dqdv_on_grid)?;
    let peak_index = dominant_peak_index(&smooth_dqdv);

    let derivative = Spline::fit(&grid, &smooth_dqdv, params.polynomial_spline, params.s_spline)?
        .derivative(&grid);
    let second_pass = SavitzkyGolay::new(params.window_size_2, params.polyorder_2)?;
    let smooth_derivative = second_pass.apply(&derivative)?;

    log::debug!(
        "cleaned {} samples ({} distinct voltages) onto {} grid points, peak at {:.4} V",
        voltage.len(),
        unique_v.len(),
        grid.len(),
        grid[peak_index]
    );

    Ok(CleanedSignal {
        voltage: grid,
        capacity: smooth_cap,
        dqdv: smooth_dqdv,
        dqdv_derivative: smooth_derivative,
        peak_index,
    })
}

/// Group samples by exact voltage and average capacity and dQ/dV within each
/// group. Output is sorted by ascending voltage.
pub fn dedup_by_voltage(
    voltage: &[f64],
    capacity: &[f64],
    dqdv: &[f64],
) -> Result<(Vec<f64>, Vec<f64>, Vec<f64>)> {
    if voltage.len() != capacity.len() || voltage.len() != dqdv.len() {
        return Err(EchemError::NumericalFit(format!(
            "column lengths differ: voltage {}, capacity {}, dQ/dV {}",
            voltage.len(),
            capacity.len(),
            dqdv.len()
        )));
    }
    if voltage
        .iter()
        .chain(capacity)
        .chain(dqdv)
        .any(|v| !v.is_finite())
    {
        return Err(EchemError::NumericalFit("non-finite sample in half-cycle".into()));
    }

    let mut order: Vec<usize> = (0..voltage.len()).collect();
    order.sort_by(|&a, &b| voltage[a].total_cmp(&voltage[b]));

    let mut unique_v: Vec<f64> = Vec::new();
    let mut mean_cap: Vec<f64> = Vec::new();
    let mut mean_dqdv: Vec<f64> = Vec::new();
    let mut count = 0usize;

    for i in order {
        if unique_v.last() == Some(&voltage[i]) {
            let last = unique_v.len() - 1;
            mean_cap[last] += capacity[i];
            mean_dqdv[last] += dqdv[i];
            count += 1;
        } else {
            if count > 1 {
                let last = unique_v.len() - 1;
                mean_cap[last] /= count as f64;
                mean_dqdv[last] /= count as f64;
            }
            unique_v.push(voltage[i]);
            mean_cap.push(capacity[i]);
            mean_dqdv.push(dqdv[i]);
            count = 1;
        }
    }
    if count > 1 {
        let last = unique_v.len() - 1;
        mean_cap[last] /= count as f64;
        mean_dqdv[last] /= count as f64;
    }

    Ok((unique_v, mean_cap, mean_dqdv))
}

/// `n` evenly spaced points from `lo` to `hi` inclusive.
pub fn uniform_grid(lo: f64, hi: f64, n: usize) -> Vec<f64> {
    if n == 1 {
        return vec![lo];
    }
    let step = (hi - lo) / (n - 1) as f64;
    let mut grid: Vec<f64> = (0..n).map(|i| lo + step * i as f64).collect();
    if let Some(last) = grid.last_mut() {
        *last = hi;
    }
    grid
}

/// Index of the larger-magnitude extremum (first occurrence). When the
/// minimum and maximum have equal magnitude the minimum wins.
pub fn dominant_peak_index(values: &[f64]) -> usize {
    let i_min = argmin(values);
    let i_max = argmax(values);
    match (i_min, i_max) {
        (Some(lo), Some(hi)) => {
            if values[hi].abs() > values[lo].abs() {
                hi
            } else {
                lo
            }
        }
        _ => 0,
    }
}

/// First index of the smallest value.
pub fn argmin(values: &[f64]) -> Option<usize> {
    values
        .iter()
        .enumerate()
        .fold(None, |best: Option<(usize, f64)>, (i, &v)| match best {
            Some((_, b)) if v >= b => best,
            _ => Some((i, v)),
        })
        .map(|(i, _)| i)
}

/// First index of the largest value.
pub fn argmax(values: &[f64]) -> Option<usize> {
    values
        .iter()
        .enumerate()
        .fold(None, |best: Option<(usize, f64)>, (i, &v)| match best {
            Some((_, b)) if v <= b => best,
            _ => Some((i, v)),
        })
        .map(|(i, _)| i)
}
