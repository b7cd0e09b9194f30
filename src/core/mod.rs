pub mod count;
pub mod summary;

pub use count::Counter;
pub use summary::DailySummary;
