// src/lib.rs
//
// Javelin throw analysis: pose landmarks in, kinematics and annotated
// frames out.

pub mod analysis;
pub mod config;
pub mod export;
pub mod frame_io;
pub mod landmarks;
pub mod overlay;
pub mod pipeline;
pub mod types;

pub use config::{ConfigError, ConfigOverrides};
pub use types::Config;
