use crate::data::model::CellState;

/// Errors raised anywhere in the load → segment → clean → detect pipeline.
///
/// Every variant is terminal for the call that produced it; nothing in the
/// crate retries or substitutes a default.
#[derive(Debug, thiserror::Error)]
pub enum EchemError {
    /// File extension is not one of `.csv`, `.xlsx`, `.xls`.
    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    /// Header or column layout does not look like a cycler export.
    #[error("Malformed file: {0}")]
    MalformedFile(String),

    /// Multi-sheet workbook without a sheet named like "record".
    #[error("No record sheet found among {sheets:?}")]
    NoRecordSheet { sheets: Vec<String> },

    /// A non-numeric current value reached the segmenter.
    #[error("Invalid current {value} at record {record_index}")]
    InvalidCurrent { record_index: usize, value: f64 },

    /// A filter window or spline needs more points than are available.
    #[error("Insufficient samples: {what} needs {required}, got {available}")]
    InsufficientSamples {
        what: &'static str,
        required: usize,
        available: usize,
    },

    /// No readings for the requested cycle/state combination.
    #[error("No {state} readings in cycle {cycle_no}")]
    EmptyHalfCycle { cycle_no: u32, state: CellState },

    /// dQ/dV extremum is exactly zero, so the half-cycle is a rest period.
    #[error("Plateau undefined: dQ/dV is zero throughout (rest state)")]
    UndefinedPlateau,

    /// Numeric fit is degenerate (singular system, non-finite samples...).
    #[error("Numerical fit failed: {0}")]
    NumericalFit(String),

    /// Configuration value out of range.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Spreadsheet error
    #[error("Workbook error: {0}")]
    Workbook(#[from] calamine::Error),

    /// JSON configuration error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, EchemError>;
