use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Cell – a single value in a cycler export
// ---------------------------------------------------------------------------

/// A loosely-typed table cell as it comes out of a CSV or spreadsheet.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Number(f64),
    Text(String),
    Empty,
}

impl Cell {
    /// Interpret a raw text field: empty → `Empty`, numeric → `Number`.
    pub fn parse(s: &str) -> Self {
        let s = s.trim();
        if s.is_empty() {
            return Cell::Empty;
        }
        match s.parse::<f64>() {
            Ok(v) => Cell::Number(v),
            Err(_) => Cell::Text(s.to_string()),
        }
    }

    /// Numeric value, if any. NaN counts as missing.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Number(v) if !v.is_nan() => Some(*v),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Number(v) => v.is_nan(),
            Cell::Text(_) => false,
        }
    }

    /// Text content (numbers are formatted), used for header matching.
    pub fn as_text(&self) -> Option<String> {
        match self {
            Cell::Text(s) => Some(s.clone()),
            Cell::Number(v) => Some(v.to_string()),
            Cell::Empty => None,
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Number(v) => write!(f, "{v}"),
            Cell::Text(s) => write!(f, "{s}"),
            Cell::Empty => write!(f, "<empty>"),
        }
    }
}

// ---------------------------------------------------------------------------
// RawReading – one row of the tidy table
// ---------------------------------------------------------------------------

/// One measurement row after layout normalisation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawReading {
    /// Zero-based position in the tidy table before row filtering.
    pub record_index: usize,
    /// Signed current in mA (positive = charge).
    pub current: f64,
    /// Capacity in mAh.
    pub capacity: f64,
    /// Specific capacity in mAh/g.
    pub specific_capacity: f64,
    /// Voltage in V.
    pub voltage: f64,
    /// Differential capacity in mAh/V.
    pub dqdv: f64,
}

impl RawReading {
    /// Copy with every capacity-like field multiplied by `factor`.
    pub fn scaled(&self, factor: f64) -> Self {
        RawReading {
            capacity: self.capacity * factor,
            specific_capacity: self.specific_capacity * factor,
            dqdv: self.dqdv * factor,
            ..*self
        }
    }
}

// ---------------------------------------------------------------------------
// CellState / ProcessedReading
// ---------------------------------------------------------------------------

/// Direction of current flow for a reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CellState {
    Charge,
    Discharge,
    Rest,
}

impl CellState {
    /// Classify a current value. Returns `None` for non-finite input.
    pub fn from_current(current: f64) -> Option<Self> {
        if !current.is_finite() {
            return None;
        }
        Some(if current > 0.0 {
            CellState::Charge
        } else if current < 0.0 {
            CellState::Discharge
        } else {
            CellState::Rest
        })
    }

    /// Swap Charge and Discharge; Rest is unchanged.
    pub fn inverted(self) -> Self {
        match self {
            CellState::Charge => CellState::Discharge,
            CellState::Discharge => CellState::Charge,
            CellState::Rest => CellState::Rest,
        }
    }
}

impl fmt::Display for CellState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellState::Charge => write!(f, "charge"),
            CellState::Discharge => write!(f, "discharge"),
            CellState::Rest => write!(f, "rest"),
        }
    }
}

/// A reading with its segmentation labels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProcessedReading {
    pub reading: RawReading,
    pub state: CellState,
    /// 1-indexed half-cycle; `None` for rest rows.
    pub half_cycle: Option<u32>,
    /// `ceil(half_cycle / 2)`; `None` for rest rows.
    pub full_cycle: Option<u32>,
}

// ---------------------------------------------------------------------------
// Curve – resampled voltage/capacity pairs
// ---------------------------------------------------------------------------

/// Capacity sampled on a uniform, strictly increasing voltage grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Curve {
    pub voltage: Vec<f64>,
    pub capacity: Vec<f64>,
}

impl Curve {
    pub fn len(&self) -> usize {
        self.voltage.len()
    }

    pub fn is_empty(&self) -> bool {
        self.voltage.is_empty()
    }

    /// Iterate `(voltage, capacity)` pairs.
    pub fn points(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.voltage.iter().copied().zip(self.capacity.iter().copied())
    }

    /// Largest capacity on the curve (NaN for an empty curve).
    pub fn max_capacity(&self) -> f64 {
        self.capacity.iter().copied().fold(f64::NAN, f64::max)
    }
}
