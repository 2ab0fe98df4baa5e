//! Client-side aggregation of API responses.
//!
//! Turns raw historical rows and prediction batches into chart-ready series.

pub mod aggregator;

pub use aggregator::*;
