//! Motion detection: frame scoring, decision engine and monitor outputs

pub mod analyzer;
pub mod engine;
pub mod monitor;
