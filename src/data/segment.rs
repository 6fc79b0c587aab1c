use super::model::{CellState, ProcessedReading, RawReading};
use crate::error::{EchemError, Result};

// ---------------------------------------------------------------------------
// Cycle segmentation
// ---------------------------------------------------------------------------

/// Label every reading with its state, half-cycle and full-cycle.
///
/// A new half-cycle starts whenever a non-rest reading's state differs from
/// the previous non-rest reading's state; the first non-rest reading always
/// starts half-cycle 1. Rest readings stay in the output without cycle labels.
pub fn segment(readings: &[RawReading]) -> Result<Vec<ProcessedReading>> {
    let mut processed = Vec::with_capacity(readings.len());
    let mut previous: Option<CellState> = None;
    let mut half_cycle: u32 = 0;

    for reading in readings {
        let state =
            CellState::from_current(reading.current).ok_or(EchemError::InvalidCurrent {
                record_index: reading.record_index,
                value: reading.current,
            })?;

        let (half, full) = if state == CellState::Rest {
            (None, None)
        } else {
            if previous != Some(state) {
                half_cycle += 1;
                previous = Some(state);
            }
            (Some(half_cycle), Some(full_cycle_of(half_cycle)))
        };

        processed.push(ProcessedReading {
            reading: *reading,
            state,
            half_cycle: half,
            full_cycle: full,
        });
    }

    log::debug!(
        "segmented {} readings into {} half-cycles",
        processed.len(),
        half_cycle
    );
    Ok(processed)
}

/// `ceil(half_cycle / 2)`
pub fn full_cycle_of(half_cycle: u32) -> u32 {
    half_cycle.div_ceil(2)
}

/// Swap Charge/Discharge labels on every reading, keeping cycle numbering.
pub fn invert_states(readings: &[ProcessedReading]) -> Vec<ProcessedReading> {
    readings
        .iter()
        .map(|r| ProcessedReading {
            state: r.state.inverted(),
            ..*r
        })
        .collect()
}
