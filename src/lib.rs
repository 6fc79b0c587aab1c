//! Extract first-cycle features (ICE, charge capacity, plateau capacities)
//! from galvanostatic battery cycler exports.

pub mod analysis;
pub mod config;
pub mod data;
pub mod error;
pub mod synthetic;

pub use analysis::summary::{extract_features, summarize, FeatureSummary, PlateauPoint};
pub use config::{SmoothingParams, SummaryOptions};
pub use data::loader::{load_file, CyclerData};
pub use data::segment::segment;
pub use error::{EchemError, Result};
