//! Report aggregation.

pub mod aggregator;

pub use aggregator::Aggregator;
