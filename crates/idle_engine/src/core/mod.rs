//! # Core Engine Module
//!
//! Shared configuration types used by the frame loop and its subsystems.

pub mod config;

pub use config::{
    CameraConfig,
    Config,
    ConfigError,
    ControlsConfig,
    EngineConfig,
    ShaderConfig,
};
