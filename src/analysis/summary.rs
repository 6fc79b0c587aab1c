use std::path::Path;

use serde::Serialize;

use super::plateau::{detect, PlateauResult};
use crate::config::{SmoothingParams, SummaryOptions};
use crate::data::filter::{select_half_cycle, HalfCycle};
use crate::data::loader::load_file;
use crate::data::model::{CellState, Curve, ProcessedReading, RawReading};
use crate::data::segment::{invert_states, segment};
use crate::error::{EchemError, Result};

// ---------------------------------------------------------------------------
// FeatureSummary
// ---------------------------------------------------------------------------

/// Where a plateau marker sits on its curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PlateauPoint {
    pub capacity: f64,
    pub voltage: f64,
}

/// Electrochemical features of one full cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureSummary {
    pub cycle_no: u32,
    /// Initial coulombic efficiency, charge over discharge capacity (4 d.p.).
    pub ice: f64,
    /// Maximum specific capacity on charge, mAh/g (2 d.p.).
    pub charge_capacity: f64,
    pub discharge_plateau_capacity: f64,
    pub charge_plateau_capacity: f64,
    pub discharge_curve: Curve,
    pub charge_curve: Curve,
    pub discharge_plateau: PlateauPoint,
    pub charge_plateau: PlateauPoint,
}

impl FeatureSummary {
    /// Key/value rows for a summary table.
    pub fn table(&self) -> Vec<(&'static str, f64)> {
        vec![
            ("ICE", self.ice),
            ("Charge SpeCap/mAh/g", self.charge_capacity),
            ("Discharge plateau SpeCap/mAh/g", self.discharge_plateau_capacity),
            ("Charge plateau SpeCap/mAh/g", self.charge_plateau_capacity),
        ]
    }
}

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

/// Load a cycler export and summarise one of its cycles.
pub fn extract_features(path: &Path, options: &SummaryOptions) -> Result<FeatureSummary> {
    let data = load_file(path)?;
    summarize(&data.readings, options)
}

/// Segment raw readings and summarise cycle `options.cycle_no`.
pub fn summarize(readings: &[RawReading], options: &SummaryOptions) -> Result<FeatureSummary> {
    let mut processed = segment(readings)?;
    if options.invert {
        processed = invert_states(&processed);
    }
    summarize_processed(&processed, options.cycle_no, &options.smoothing)
}

/// Summarise an already segmented table.
pub fn summarize_processed(
    processed: &[ProcessedReading],
    cycle_no: u32,
    params: &SmoothingParams,
) -> Result<FeatureSummary> {
    let discharge = select_half_cycle(processed, cycle_no, CellState::Discharge)?;
    let charge = select_half_cycle(processed, cycle_no, CellState::Charge)?;

    let discharge_result = detect_half(&discharge, params)?;
    let charge_result = detect_half(&charge, params)?;

    let discharge_max = discharge.max_specific_capacity();
    let charge_max = charge.max_specific_capacity();
    if !(discharge_max > 0.0) {
        return Err(EchemError::NumericalFit(format!(
            "discharge capacity of cycle {cycle_no} is {discharge_max}, cannot form ICE"
        )));
    }

    let summary = FeatureSummary {
        cycle_no,
        ice: round_to(charge_max / discharge_max, 4),
        charge_capacity: round_to(charge_max, 2),
        discharge_plateau_capacity: round_to(discharge_result.plateau_capacity, 2),
        charge_plateau_capacity: round_to(charge_result.plateau_capacity, 2),
        discharge_plateau: plateau_point(&discharge_result),
        charge_plateau: plateau_point(&charge_result),
        discharge_curve: discharge_result.curve,
        charge_curve: charge_result.curve,
    };

    log::info!(
        "cycle {cycle_no}: ICE {}, charge {} mAh/g, plateaus {} / {} mAh/g",
        summary.ice,
        summary.charge_capacity,
        summary.discharge_plateau_capacity,
        summary.charge_plateau_capacity
    );
    Ok(summary)
}

fn detect_half(half: &HalfCycle, params: &SmoothingParams) -> Result<PlateauResult> {
    detect(&half.voltage, &half.specific_capacity, &half.dqdv, params)
}

fn plateau_point(result: &PlateauResult) -> PlateauPoint {
    let (capacity, voltage) = result.plateau_point();
    PlateauPoint { capacity, voltage }
}

/// Round half away from zero to `decimals` places.
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (value * scale).round() / scale
}
