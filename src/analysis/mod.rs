//! Numerical side: smoothing primitives, half-cycle cleaning, plateau
//! detection and the per-cycle feature summary.

pub mod clean;
pub mod plateau;
pub mod savgol;
pub mod spline;
pub mod summary;
