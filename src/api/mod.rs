//! Access to the forecast backend.

pub mod client;

pub use client::{ApiClient, DashboardApi};
