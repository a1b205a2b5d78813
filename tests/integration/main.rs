//! Integration test harness
//!
//! Cargo builds this directory as a single test binary; each module below is
//! its own suite.

mod engine_tests;
mod export_tests;
