//! Data layer: core types, loading, row filtering and cycle segmentation.
//!
//! Architecture:
//! ```text
//!  .csv / .xlsx / .xls
//!        │
//!        ▼
//!   ┌──────────┐
//!   │  loader   │  dispatch by extension, pick sheet
//!   └──────────┘
//!        │
//!        ▼
//!   ┌──────────┐
//!   │  layout   │  flat or cycle-split header → RecordTable
//!   └──────────┘
//!        │
//!        ▼
//!   ┌──────────┐
//!   │  filter   │  RecordTable → Vec<RawReading> + LoadReport
//!   └──────────┘
//!        │
//!        ▼
//!   ┌──────────┐
//!   │  segment  │  state, half-cycle, full-cycle per reading
//!   └──────────┘
//! ```

pub mod filter;
pub mod layout;
pub mod loader;
pub mod model;
pub mod segment;
