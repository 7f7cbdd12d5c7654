pub mod mapper;
pub mod table;

pub use mapper::{SectorMapper, SectorStats};
