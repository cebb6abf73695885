//! Transformation module.
//!
//! - Grouper: flat rows to formulas (the core, pure)
//! - Flatten: formulas back to flat rows
//! - Pipeline: CSV to formulas

pub mod flatten;
pub mod grouper;
pub mod pipeline;

pub use flatten::{flatten, flatten_all};
pub use grouper::{group_rows, group_rows_owned, group_rows_parallel, total_cost};
pub use pipeline::*;
