pub mod cell;
pub mod row;

pub use row::{normalize_record, render_record, NormalizeContext};
