//! Core pipeline: frequency matching, message rendering, per-row
//! processing and run orchestration.

pub mod matcher;
pub mod processor;
pub mod renderer;
pub mod runner;
