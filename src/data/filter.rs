use serde::Serialize;

use super::layout::RecordTable;
use super::model::{Cell, CellState, ProcessedReading, RawReading};
use crate::error::{EchemError, Result};

pub const CURRENT: &str = "Current/mA";
pub const CAPACITY: &str = "Capacity/mAh";
pub const SPECIFIC_CAPACITY: &str = "SpeCap/mAh/g";
pub const VOLTAGE: &str = "Voltage/V";
pub const DQDV: &str = "dQ/dV/mAh/V";

static EMPTY_CELL: Cell = Cell::Empty;

// ---------------------------------------------------------------------------
// Row filtering: table → readings
// ---------------------------------------------------------------------------

/// Counts of rows read and dropped while typing a table into readings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    pub rows_read: usize,
    /// Current cell held text (e.g. a placeholder) instead of a number.
    pub dropped_non_numeric_current: usize,
    /// Current cell was empty.
    pub dropped_missing_current: usize,
    /// Current was fine but another measurement was missing or non-numeric.
    pub dropped_incomplete: usize,
}

impl LoadReport {
    pub fn rows_dropped(&self) -> usize {
        self.dropped_non_numeric_current + self.dropped_missing_current + self.dropped_incomplete
    }

    pub fn rows_kept(&self) -> usize {
        self.rows_read - self.rows_dropped()
    }
}

/// Type each table row into a [`RawReading`], dropping and counting rows
/// that cannot be used.
pub fn extract_readings(table: &RecordTable) -> Result<(Vec<RawReading>, LoadReport)> {
    let col = |name: &str| {
        table
            .column(name)
            .ok_or_else(|| EchemError::MalformedFile(format!("missing '{name}' column")))
    };
    let current_idx = col(CURRENT)?;
    let capacity_idx = col(CAPACITY)?;
    let spe_cap_idx = col(SPECIFIC_CAPACITY)?;
    let voltage_idx = col(VOLTAGE)?;
    let dqdv_idx = col(DQDV)?;

    let mut report = LoadReport {
        rows_read: table.len(),
        ..Default::default()
    };
    let mut readings = Vec::with_capacity(table.len());

    for (record_index, row) in table.rows.iter().enumerate() {
        let cell = |j: usize| row.get(j).unwrap_or(&EMPTY_CELL);

        let current = match cell(current_idx) {
            Cell::Text(_) => {
                report.dropped_non_numeric_current += 1;
                continue;
            }
            c => match c.as_f64() {
                Some(v) => v,
                None => {
                    report.dropped_missing_current += 1;
                    continue;
                }
            },
        };

        let measurements = (
            cell(capacity_idx).as_f64(),
            cell(spe_cap_idx).as_f64(),
            cell(voltage_idx).as_f64(),
            cell(dqdv_idx).as_f64(),
        );
        let (Some(capacity), Some(specific_capacity), Some(voltage), Some(dqdv)) = measurements
        else {
            report.dropped_incomplete += 1;
            continue;
        };

        readings.push(RawReading {
            record_index,
            current,
            capacity,
            specific_capacity,
            voltage,
            dqdv,
        });
    }

    if report.rows_dropped() > 0 {
        log::warn!(
            "dropped {} of {} rows ({} non-numeric current, {} missing current, {} incomplete)",
            report.rows_dropped(),
            report.rows_read,
            report.dropped_non_numeric_current,
            report.dropped_missing_current,
            report.dropped_incomplete
        );
    }

    Ok((readings, report))
}

// ---------------------------------------------------------------------------
// Half-cycle selection
// ---------------------------------------------------------------------------

/// Column-wise view of one half-cycle, ready for the signal cleaner.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HalfCycle {
    pub voltage: Vec<f64>,
    pub specific_capacity: Vec<f64>,
    pub dqdv: Vec<f64>,
}

impl HalfCycle {
    pub fn len(&self) -> usize {
        self.voltage.len()
    }

    pub fn is_empty(&self) -> bool {
        self.voltage.is_empty()
    }

    /// Largest raw specific capacity in the half-cycle.
    pub fn max_specific_capacity(&self) -> f64 {
        self.specific_capacity
            .iter()
            .copied()
            .fold(f64::NEG_INFINITY, f64::max)
    }
}

/// Indices of readings in `cycle_no` with the given state.
pub fn half_cycle_indices(
    readings: &[ProcessedReading],
    cycle_no: u32,
    state: CellState,
) -> Vec<usize> {
    readings
        .iter()
        .enumerate()
        .filter(|(_, r)| r.state == state && r.full_cycle == Some(cycle_no))
        .map(|(i, _)| i)
        .collect()
}

/// Collect the `state` half of full cycle `cycle_no`.
///
/// Fails with `EmptyHalfCycle` when no reading matches.
pub fn select_half_cycle(
    readings: &[ProcessedReading],
    cycle_no: u32,
    state: CellState,
) -> Result<HalfCycle> {
    let indices = half_cycle_indices(readings, cycle_no, state);
    if indices.is_empty() {
        return Err(EchemError::EmptyHalfCycle { cycle_no, state });
    }

    let mut half = HalfCycle::default();
    for i in indices {
        let r = &readings[i].reading;
        half.voltage.push(r.voltage);
        half.specific_capacity.push(r.specific_capacity);
        half.dqdv.push(r.dqdv);
    }
    Ok(half)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(rows: Vec<Vec<Cell>>) -> RecordTable {
        RecordTable {
            headers: ["Record", CURRENT, CAPACITY, SPECIFIC_CAPACITY, VOLTAGE, DQDV]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            rows,
        }
    }

    fn row(record: f64, current: Cell) -> Vec<Cell> {
        vec![
            Cell::Number(record),
            current,
            Cell::Number(0.1),
            Cell::Number(10.0),
            Cell::Number(1.5),
            Cell::Number(-2.0),
        ]
    }

    #[test]
    fn drops_are_counted_by_reason() {
        let mut incomplete = row(5.0, Cell::Number(0.2));
        incomplete[4] = Cell::Empty;

        let t = table(vec![
            row(1.0, Cell::Number(-0.5)),
            row(2.0, Cell::Text("-".into())),
            row(3.0, Cell::Empty),
            row(4.0, Cell::Number(f64::NAN)),
            incomplete,
            row(6.0, Cell::Number(0.0)),
        ]);
        let (readings, report) = extract_readings(&t).unwrap();

        assert_eq!(report.rows_read, 6);
        assert_eq!(report.dropped_non_numeric_current, 1);
        assert_eq!(report.dropped_missing_current, 2);
        assert_eq!(report.dropped_incomplete, 1);
        assert_eq!(report.rows_kept(), 2);
        let indices: Vec<usize> = readings.iter().map(|r| r.record_index).collect();
        assert_eq!(indices, vec![0, 5]);
    }

    #[test]
    fn missing_required_column_is_malformed() {
        let mut t = table(vec![row(1.0, Cell::Number(1.0))]);
        t.headers[4] = "Volts".into();
        assert!(matches!(
            extract_readings(&t),
            Err(EchemError::MalformedFile(msg)) if msg.contains(VOLTAGE)
        ));
    }

    #[test]
    fn empty_selection_reports_cycle_and_state() {
        match select_half_cycle(&[], 3, CellState::Charge) {
            Err(EchemError::EmptyHalfCycle { cycle_no, state }) => {
                assert_eq!(cycle_no, 3);
                assert_eq!(state, CellState::Charge);
            }
            other => panic!("expected EmptyHalfCycle, got {other:?}"),
        }
    }
}
