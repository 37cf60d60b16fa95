//! Command channel protocol: line parsing and typed validation

pub mod action;
pub mod parser;
