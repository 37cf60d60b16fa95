//! Long-running workers

pub mod listener;
pub mod motion;
pub mod preview;
pub mod status;
