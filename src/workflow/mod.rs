//! Prediction workflow orchestration.

pub mod orchestrator;

pub use orchestrator::{Command, Orchestrator, Outcome};
