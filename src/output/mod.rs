pub mod atomic;
pub mod audit;
pub mod backup;
pub mod history;
pub mod latest_price;
pub mod normalized_csv;
pub mod picks;

/// `2024-05-31 17:05:09`, the stamp format the web front-end displays.
pub const DISPLAY_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
