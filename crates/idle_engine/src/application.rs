//! Application trait and lifecycle management

use crate::assets::AssetError;
use crate::engine::{Engine, EngineError};
use crate::input::KeyCode;
use thiserror::Error;

/// Application lifecycle trait
///
/// Implement this trait to drive a scene through the engine's frame loop.
pub trait Application {
    /// Initialize the application
    ///
    /// Called once before the first frame and before the engine initializes its
    /// GPU resources. Build the scene graph, load assets and place lights here.
    fn initialize(&mut self, engine: &mut Engine) -> Result<(), AppError>;

    /// Update the application
    ///
    /// Called every frame before the engine's own update and render passes.
    ///
    /// # Arguments
    /// * `engine` - Mutable reference to the engine
    /// * `delta_ms` - Time since last frame in milliseconds
    fn update(&mut self, engine: &mut Engine, delta_ms: f32) -> Result<(), AppError>;

    /// Handle application events
    ///
    /// Called for each event the host window delivers.
    fn handle_event(&mut self, engine: &mut Engine, event: AppEvent) -> Result<(), AppError> {
        engine.handle_event(event);
        Ok(())
    }

    /// Cleanup the application
    ///
    /// Called once after the last frame.
    fn cleanup(&mut self, engine: &mut Engine);
}

/// Application-level errors
#[derive(Error, Debug)]
pub enum AppError {
    /// Engine error propagated to application level
    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    /// Asset loading error
    #[error("Asset error: {0}")]
    Asset(#[from] AssetError),

    /// Custom application error
    #[error("Application error: {0}")]
    Custom(String),
}

/// Host events translated into engine terms
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AppEvent {
    /// Window was resized
    WindowResized {
        /// New window width
        width: u32,
        /// New window height
        height: u32,
    },

    /// Window close requested
    WindowCloseRequested,

    /// Key input event
    KeyInput {
        /// The key that was pressed/released
        key: KeyCode,
        /// Whether the key was pressed (true) or released (false)
        pressed: bool,
    },

    /// Look button pressed or released
    MouseButton {
        /// Whether the button was pressed (true) or released (false)
        pressed: bool,
    },

    /// Relative mouse movement since the previous event
    MouseMoved {
        /// Horizontal delta in pixels
        dx: f32,
        /// Vertical delta in pixels
        dy: f32,
    },
}
