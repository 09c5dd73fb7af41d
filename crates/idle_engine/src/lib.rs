//! # Idle Engine
//!
//! A scene-graph renderer: a node hierarchy with cached world matrices, cyclic
//! keyframe animation with slerped rotations, a yaw/pitch camera, and materials
//! that share five fixed texture units through a device abstraction.
//!
//! ## Features
//!
//! - **Scene Graph**: Named, ordered children in an arena, refreshed depth-first
//! - **Keyframe Animation**: Looping TRS playback baked into local matrices
//! - **Materials**: Define-driven shader variants with fixed texture units 0-4
//! - **Headless Device**: A recording [`render::GraphicsDevice`] for tests and tools
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use idle_engine::prelude::*;
//!
//! struct MyApp;
//!
//! impl Application for MyApp {
//!     fn initialize(&mut self, engine: &mut Engine) -> Result<(), AppError> {
//!         engine.add_light(Light::directional(Vec3::new(0.0, -1.0, -1.0)));
//!         Ok(())
//!     }
//!
//!     fn update(&mut self, _engine: &mut Engine, _delta_ms: f32) -> Result<(), AppError> {
//!         Ok(())
//!     }
//!
//!     fn cleanup(&mut self, _engine: &mut Engine) {}
//! }
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = EngineConfig::default().with_max_frames(60);
//!     idle_engine::foundation::logging::init_with_level(&config.log_level);
//!     let mut engine = Engine::new(config)?;
//!     let mut device = HeadlessDevice::new();
//!     engine.run(&mut MyApp, &mut device)?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

// Core engine modules
pub mod config;
pub mod core;

pub mod animation;
pub mod assets;
pub mod foundation;
pub mod input;
pub mod render;
pub mod scene;

mod application;
mod engine;

#[cfg(test)]
mod tests;

pub use application::{AppError, AppEvent, Application};
pub use engine::{Engine, EngineError, FrameStats};

/// Common imports for engine users
pub mod prelude {
    pub use crate::{
        animation::{KeyFrame, KeyFrameAnimation},
        assets::{provision, SceneAssetDesc},
        core::config::{CameraConfig, ControlsConfig, EngineConfig, ShaderConfig},
        foundation::{
            collections::NodeId,
            math::{Mat4, Quat, Transform, Vec3},
            time::Timer,
        },
        input::{Controls, KeyCode, MotionIntent, MoveFlags},
        render::{Camera, FrameContext, GraphicsDevice, HeadlessDevice, Light, Material, Mesh},
        scene::{SceneGraph, SceneNode},
        AppError, AppEvent, Application, Engine, EngineError, FrameStats,
    };
}
