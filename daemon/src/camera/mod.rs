//! Camera sessions and their driver seam

pub mod config;
pub mod driver;
pub mod media;
pub mod session;
pub mod state;
