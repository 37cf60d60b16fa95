//! Output naming: filename templates and sequence counters

pub mod counters;
pub mod template;
