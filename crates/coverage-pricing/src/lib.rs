//! Optional-coverage pricing for multi-plan insurance quotations.
//!
//! The engine resolves coverage catalogs per plan type, keeps the per-plan selection state,
//! prices the selected optionals and rebuilds a selection from a previously saved quotation.

pub mod config;
pub mod error;
pub mod telemetry;
pub mod workflows;
