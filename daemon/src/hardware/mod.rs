//! Hardware access

pub mod camera;
