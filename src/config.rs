use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{EchemError, Result};

// ---------------------------------------------------------------------------
// Smoothing parameters
// ---------------------------------------------------------------------------

/// Tuning knobs for the signal cleaner.
///
/// The `_1` pair smooths the resampled capacity and dQ/dV curves; the `_2`
/// pair smooths the derivative of dQ/dV.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmoothingParams {
    /// Degree of the spline fitted through the smoothed dQ/dV (1 or 3).
    pub polynomial_spline: usize,
    /// Upper bound on that spline's residual sum of squares.
    pub s_spline: f64,
    pub polyorder_1: usize,
    pub window_size_1: usize,
    pub polyorder_2: usize,
    pub window_size_2: usize,
    /// Number of points in the uniform voltage grid.
    pub grid_size: usize,
}

impl Default for SmoothingParams {
    fn default() -> Self {
        Self {
            polynomial_spline: 3,
            s_spline: 1e-5,
            polyorder_1: 5,
            window_size_1: 101,
            polyorder_2: 5,
            window_size_2: 1001,
            grid_size: 10_000,
        }
    }
}

impl SmoothingParams {
    /// Reject parameter combinations the filters cannot honour.
    ///
    /// Windows larger than the grid are not checked here; they surface as
    /// `InsufficientSamples` when the filter runs.
    pub fn validate(&self) -> Result<()> {
        check_window("window_size_1", self.window_size_1, self.polyorder_1)?;
        check_window("window_size_2", self.window_size_2, self.polyorder_2)?;
        if !matches!(self.polynomial_spline, 1 | 3) {
            return Err(EchemError::InvalidParameter(format!(
                "polynomial_spline must be 1 or 3, got {}",
                self.polynomial_spline
            )));
        }
        if !self.s_spline.is_finite() || self.s_spline < 0.0 {
            return Err(EchemError::InvalidParameter(format!(
                "s_spline must be a finite non-negative number, got {}",
                self.s_spline
            )));
        }
        if self.grid_size < 2 {
            return Err(EchemError::InvalidParameter(format!(
                "grid_size must be at least 2, got {}",
                self.grid_size
            )));
        }
        Ok(())
    }
}

pub(crate) fn check_window(name: &str, window: usize, polyorder: usize) -> Result<()> {
    if window % 2 == 0 {
        return Err(EchemError::InvalidParameter(format!(
            "{name} must be odd, got {window}"
        )));
    }
    if polyorder >= window {
        return Err(EchemError::InvalidParameter(format!(
            "{name} ({window}) must exceed its polynomial order ({polyorder})"
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Summary options
// ---------------------------------------------------------------------------

/// Everything a caller can choose when asking for a feature summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SummaryOptions {
    /// Full cycle to summarise (1-indexed).
    pub cycle_no: u32,
    /// Swap charge/discharge labels before selecting half-cycles.
    pub invert: bool,
    pub smoothing: SmoothingParams,
}

impl Default for SummaryOptions {
    fn default() -> Self {
        Self {
            cycle_no: 1,
            invert: false,
            smoothing: SmoothingParams::default(),
        }
    }
}

impl SummaryOptions {
    /// Read options from a JSON file; missing keys take their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let options: SummaryOptions = serde_json::from_str(&text)?;
        options.smoothing.validate()?;
        Ok(options)
    }
}
