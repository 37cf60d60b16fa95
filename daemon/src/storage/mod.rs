//! Configuration files, persisted settings and front-end logs

pub mod config_file;
pub mod layout;
pub mod logbook;
pub mod settings;
pub mod user_config;
