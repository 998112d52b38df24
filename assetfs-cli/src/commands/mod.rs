//! CLI command implementations.

pub mod common;
pub mod compile;
pub mod query;
pub mod serve;
