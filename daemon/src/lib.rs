//! camd library
//!
//! Core modules for the multi-camera command and state daemon.

pub mod app;
pub mod camera;
pub mod command;
pub mod errors;
pub mod filesys;
pub mod hardware;
pub mod logs;
pub mod motion;
pub mod naming;
pub mod orchestrator;
pub mod status;
pub mod storage;
pub mod utils;
pub mod workers;
