pub mod classifier;
pub mod ranker;
pub mod stock_scorer;

pub use ranker::rank;
pub use stock_scorer::StockScorer;
