use serde::Serialize;

use super::clean::{argmax, argmin, clean, CleanedSignal};
use crate::config::SmoothingParams;
use crate::data::model::{CellState, Curve};
use crate::error::{EchemError, Result};

// ---------------------------------------------------------------------------
// Plateau detection
// ---------------------------------------------------------------------------

/// Plateau capacity of one half-cycle and the curve it was read from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlateauResult {
    /// Curve type implied by the sign of the dominant raw dQ/dV peak.
    pub state: CellState,
    pub plateau_capacity: f64,
    pub curve: Curve,
    /// Index into `curve` where the plateau marker sits.
    pub inflection_index: usize,
}

impl PlateauResult {
    /// `(capacity, voltage)` at the inflection point.
    pub fn plateau_point(&self) -> (f64, f64) {
        (
            self.curve.capacity[self.inflection_index],
            self.curve.voltage[self.inflection_index],
        )
    }
}

/// Classify a half-cycle from the sign of its largest-magnitude raw dQ/dV
/// value: positive is charge-like, negative discharge-like, zero rest.
pub fn classify_curve(dqdv: &[f64]) -> Result<CellState> {
    if dqdv.is_empty() {
        return Err(EchemError::InsufficientSamples {
            what: "dQ/dV samples",
            required: 1,
            available: 0,
        });
    }
    if dqdv.iter().any(|v| !v.is_finite()) {
        return Err(EchemError::NumericalFit("non-finite dQ/dV sample".into()));
    }
    let lo = dqdv.iter().copied().fold(f64::INFINITY, f64::min);
    let hi = dqdv.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let extremum = if hi.abs() > lo.abs() { hi } else { lo };

    Ok(if extremum > 0.0 {
        CellState::Charge
    } else if extremum < 0.0 {
        CellState::Discharge
    } else {
        CellState::Rest
    })
}

/// Locate the plateau capacity of one half-cycle.
///
/// Charge-like curves read the plateau straight off the capacity at the
/// minimum of the dQ/dV derivative. Discharge-like curves take the midpoint
/// between the derivative's minimum and maximum and report the capacity span
/// from the full capacity back to that point. Both searches start at the
/// dominant dQ/dV peak.
pub fn detect(
    voltage: &[f64],
    capacity: &[f64],
    dqdv: &[f64],
    params: &SmoothingParams,
) -> Result<PlateauResult> {
    let state = classify_curve(dqdv)?;
    if state == CellState::Rest {
        return Err(EchemError::UndefinedPlateau);
    }

    let cleaned = clean(voltage, capacity, dqdv, params)?;
    let (plateau_capacity, target) = plateau_from(&cleaned, state)?;
    let inflection_index = closest_index(&cleaned.capacity, target);

    log::debug!(
        "{state} plateau {plateau_capacity:.3} at {:.4} V",
        cleaned.voltage[inflection_index]
    );

    Ok(PlateauResult {
        state,
        plateau_capacity,
        curve: Curve {
            voltage: cleaned.voltage,
            capacity: cleaned.capacity,
        },
        inflection_index,
    })
}

/// Plateau capacity and the capacity value the inflection marker should sit
/// on.
fn plateau_from(cleaned: &CleanedSignal, state: CellState) -> Result<(f64, f64)> {
    let start = cleaned.peak_index;
    let tail = &cleaned.dqdv_derivative[start..];
    let empty = || EchemError::NumericalFit("empty derivative after dQ/dV peak".into());

    match state {
        CellState::Charge => {
            let i = start + argmin(tail).ok_or_else(empty)?;
            let plateau = cleaned.capacity[i];
            Ok((plateau, plateau))
        }
        CellState::Discharge => {
            let i_min = start + argmin(tail).ok_or_else(empty)?;
            let i_max = start + argmax(tail).ok_or_else(empty)?;
            let mid = ((i_min + i_max) as f64 / 2.0).round_ties_even() as usize;
            let max_capacity = cleaned
                .capacity
                .iter()
                .copied()
                .fold(f64::NEG_INFINITY, f64::max);
            let plateau = max_capacity - cleaned.capacity[mid];
            Ok((plateau, max_capacity - plateau))
        }
        CellState::Rest => Err(EchemError::UndefinedPlateau),
    }
}

/// Index of the value closest to `target` (first on ties).
fn closest_index(values: &[f64], target: f64) -> usize {
    let distance: Vec<f64> = values.iter().map(|v| (v - target).abs()).collect();
    argmin(&distance).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Capacity linear in voltage, Gaussian dQ/dV peak of height `amplitude`
    /// at 0.5 V, voltage sampled from 1 V down to 0 V.
    fn half_cycle(amplitude: f64, sigma: f64, offset: f64) -> (Vec<f64>, Vec<f64>, Vec<f64>) {
        let n = 2001;
        let voltage: Vec<f64> = (0..n).map(|i| 1.0 - i as f64 / (n - 1) as f64).collect();
        let capacity: Vec<f64> = voltage.iter().map(|v| offset + 100.0 * (1.0 - v)).collect();
        let dqdv: Vec<f64> = voltage
            .iter()
            .map(|v| amplitude * (-(v - 0.5) * (v - 0.5) / (2.0 * sigma * sigma)).exp())
            .collect();
        (voltage, capacity, dqdv)
    }

    fn params() -> SmoothingParams {
        SmoothingParams {
            window_size_2: 101,
            ..Default::default()
        }
    }

    #[test]
    fn classification_follows_dominant_sign() {
        assert_eq!(classify_curve(&[0.1, 2.0, -1.0]).unwrap(), CellState::Charge);
        assert_eq!(classify_curve(&[0.1, -2.0, 1.0]).unwrap(), CellState::Discharge);
        assert_eq!(classify_curve(&[0.0, 0.0]).unwrap(), CellState::Rest);
    }

    #[test]
    fn sharp_peak_puts_plateau_next_to_midpoint_capacity() {
        let sigma = 0.01;
        let (v, c, d) = half_cycle(1.0, sigma, 0.0);
        let result = detect(&v, &c, &d, &params()).unwrap();

        assert_eq!(result.state, CellState::Charge);
        assert_eq!(result.curve.len(), 10_000);
        // The steepest fall of a Gaussian sits one width above its centre,
        // i.e. one width's worth of capacity below the midpoint.
        let midpoint = 50.0;
        let expected = midpoint - 100.0 * sigma;
        assert!(
            (result.plateau_capacity - expected).abs() < 0.5,
            "plateau {} expected near {expected}",
            result.plateau_capacity
        );
        assert!((result.plateau_capacity - midpoint).abs() <= 100.0 * sigma + 0.5);

        let (cap, volt) = result.plateau_point();
        assert!((cap - result.plateau_capacity).abs() < 0.05);
        assert!((volt - (0.5 + sigma)).abs() < 0.005, "inflection at {volt} V");
    }

    #[test]
    fn discharge_plateau_never_exceeds_full_capacity() {
        let (v, c, d) = half_cycle(-1.0, 0.02, 10.0);
        let result = detect(&v, &c, &d, &params()).unwrap();

        assert_eq!(result.state, CellState::Discharge);
        let max_capacity = result.curve.max_capacity();
        assert!(result.plateau_capacity <= max_capacity);
        assert!(result.plateau_capacity >= 0.0);
        let (cap, _) = result.plateau_point();
        assert!((cap - (max_capacity - result.plateau_capacity)).abs() < 0.05);
    }

    #[test]
    fn rest_half_cycle_has_no_plateau() {
        let voltage: Vec<f64> = (0..200).map(|i| 1.0 + i as f64 * 1e-3).collect();
        let capacity = vec![0.0; 200];
        let dqdv = vec![0.0; 200];
        assert!(matches!(
            detect(&voltage, &capacity, &dqdv, &params()),
            Err(EchemError::UndefinedPlateau)
        ));
    }
}
