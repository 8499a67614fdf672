//! LOOTSPLIT — hunt loot settlement engine
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod config;
pub mod types;
pub mod error;
pub mod gold;
pub mod parser;
pub mod market;
pub mod engine;
pub mod report;
pub mod api;
