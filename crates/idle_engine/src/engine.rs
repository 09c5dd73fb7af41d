//! Core engine implementation
//!
//! The engine owns the scene graph, the camera and its controls, the lights and
//! an optional skybox, and advances them one frame at a time. Within a frame
//! the order is fixed: controls move the camera, late resources are prepared,
//! the update pass refreshes every world matrix, and only then does anything
//! draw.

use std::path::Path;

use crate::{
    application::{AppEvent, Application},
    assets::{self, image_loader, AssetError, ProvisionedAsset, SceneAssetDesc},
    config::ConfigError,
    core::config::EngineConfig,
    foundation::{collections::NodeId, time::Timer},
    input::{Controls, MotionIntent},
    render::{
        Camera, FrameContext, GraphicsDevice, Light, RenderError, ShaderClass, ShaderLibrary, Skybox, Texture,
    },
    scene::{SceneError, SceneGraph},
};
use thiserror::Error;

/// What one frame did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    /// Draw calls issued, skybox included
    pub draw_calls: usize,
    /// Nodes whose world matrix was refreshed
    pub nodes_updated: usize,
    /// Resources that became ready during the frame
    pub resources_ready: usize,
    /// Whether the controls moved or turned the camera
    pub camera_moved: bool,
}

/// Main engine struct
///
/// The engine coordinates the scene and its render inputs and manages the main
/// loop.
pub struct Engine {
    /// Scene graph holding every node
    pub scene: SceneGraph,

    /// Active camera
    pub camera: Camera,

    /// Lights in `uLights` order
    pub lights: Vec<Light>,

    /// Environment drawn after the scene
    pub skybox: Option<Skybox>,

    /// Shader sources for materials and the skybox
    pub shaders: ShaderLibrary,

    /// Motion intent accumulated from host events
    pub input: MotionIntent,

    controls: Controls,

    /// Frame timing
    timer: Timer,

    config: EngineConfig,

    /// Whether the engine should continue running
    running: bool,
}

impl Engine {
    /// Create a new engine instance
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        config.validate()?;
        log::info!("Initializing engine...");

        Ok(Self {
            scene: SceneGraph::new(),
            camera: Camera::from_config(&config.camera),
            lights: Vec::new(),
            skybox: None,
            shaders: ShaderLibrary::new(config.shaders.clone()),
            input: MotionIntent::default(),
            controls: Controls::new(&config.controls),
            timer: Timer::new(),
            config,
            running: true,
        })
    }

    /// Instantiate a scene asset under `parent`, or as a root when `None`
    pub fn load_asset(
        &mut self,
        parent: Option<NodeId>,
        name: &str,
        desc: &SceneAssetDesc,
    ) -> Result<ProvisionedAsset, AssetError> {
        assets::provision(&mut self.scene, parent, name, desc, &mut self.shaders)
    }

    /// Instantiate a scene asset whose materials all use `class`, e.g.
    /// [`ShaderClass::Mirror`] to reflect the skybox
    pub fn load_asset_with_class(
        &mut self,
        parent: Option<NodeId>,
        name: &str,
        desc: &SceneAssetDesc,
        class: ShaderClass,
    ) -> Result<ProvisionedAsset, AssetError> {
        assets::provision_with_class(&mut self.scene, parent, name, desc, &mut self.shaders, class)
    }

    /// Load a descriptor file and decode its textures from the file's directory
    /// on a background thread. The textures become ready on a later frame.
    pub fn load_asset_file(
        &mut self,
        parent: Option<NodeId>,
        name: &str,
        path: impl AsRef<Path>,
    ) -> Result<NodeId, AssetError> {
        let path = path.as_ref();
        let desc = assets::load_descriptor(path)?;
        let provisioned = self.load_asset(parent, name, &desc)?;
        let base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        // Detached: completion is observed through the textures themselves
        let _loads = image_loader::spawn_loads(provisioned.loaders, base_dir);
        Ok(provisioned.node)
    }

    /// Use `texture` as a six-face environment behind the scene
    pub fn set_skybox(&mut self, texture: Texture) -> Result<(), EngineError> {
        let shader = self.shaders.shader(ShaderClass::CubeMap)?;
        self.skybox = Some(Skybox::new(shader, texture)?);
        Ok(())
    }

    /// Add a light; returns its index in `uLights`
    pub fn add_light(&mut self, mut light: Light) -> usize {
        let index = self.lights.len();
        light.initialize(index);
        self.lights.push(light);
        index
    }

    /// Link shaders and upload whatever resources are already available.
    ///
    /// Every resource is attempted; the first failure is returned.
    pub fn initialize(&mut self, device: &mut dyn GraphicsDevice) -> Result<(), EngineError> {
        for (index, light) in self.lights.iter_mut().enumerate() {
            if !light.is_initialized() {
                light.initialize(index);
            }
        }

        let scene_result = self.scene.initialize(device);
        let skybox_result = match &mut self.skybox {
            Some(skybox) => skybox.initialize(device),
            None => Ok(()),
        };

        scene_result?;
        skybox_result?;
        log::info!("Engine initialized with {} nodes and {} lights", self.scene.len(), self.lights.len());
        Ok(())
    }

    /// Advance and draw one frame.
    ///
    /// `delta_ms` drives both the controls and every animation. Rotation deltas
    /// in `intent` are consumed.
    pub fn frame(&mut self, device: &mut dyn GraphicsDevice, delta_ms: f32, intent: &mut MotionIntent) -> FrameStats {
        let camera_moved = self.controls.update(delta_ms, intent, &mut self.camera);
        if camera_moved {
            self.camera.update();
        }

        let mut resources_ready = self.scene.prepare(device);
        if let Some(skybox) = &mut self.skybox {
            match skybox.prepare(device) {
                Ok(true) => resources_ready += 1,
                Ok(false) => {}
                Err(err) => log::warn!("Skybox failed to prepare: {}", err),
            }
        }

        let nodes_updated = self.scene.update(delta_ms);

        let environment = self.skybox.as_ref().map(Skybox::texture);
        let context = FrameContext::new(&self.camera, &self.lights).with_environment(environment);
        let mut draw_calls = self.scene.render(device, &context);
        if let Some(skybox) = &self.skybox {
            if skybox.render(device, &self.camera) {
                draw_calls += 1;
            }
        }

        log::trace!("Frame: {} draws, {} nodes updated", draw_calls, nodes_updated);
        FrameStats {
            draw_calls,
            nodes_updated,
            resources_ready,
            camera_moved,
        }
    }

    /// Run the engine main loop with the given application.
    ///
    /// Frames are timed with the wall clock and the loop ends on [`Engine::quit`],
    /// a close request or after `max_frames` when configured. Returns the number
    /// of frames run.
    pub fn run<T: Application>(&mut self, app: &mut T, device: &mut dyn GraphicsDevice) -> Result<u64, EngineError> {
        self.start(app, device)?;
        log::info!("Starting main loop...");

        let mut frames = 0;
        self.timer.tick();
        while self.running && self.config.max_frames.map_or(true, |max| frames < max) {
            let delta_ms = self.timer.tick();
            self.step(app, device, delta_ms)?;
            frames += 1;
        }

        app.cleanup(self);
        log::info!(
            "Engine shutdown complete after {} frames ({:.1} fps)",
            frames,
            self.timer.average_fps()
        );
        Ok(frames)
    }

    /// Run exactly `frames` frames of `delta_ms` each, ignoring the wall clock.
    ///
    /// Returns the stats of every frame, or stops early on [`Engine::quit`].
    pub fn run_frames<T: Application>(
        &mut self,
        app: &mut T,
        device: &mut dyn GraphicsDevice,
        frames: u64,
        delta_ms: f32,
    ) -> Result<Vec<FrameStats>, EngineError> {
        self.start(app, device)?;

        let mut stats = Vec::new();
        for _ in 0..frames {
            if !self.running {
                break;
            }
            stats.push(self.step(app, device, delta_ms)?);
        }

        app.cleanup(self);
        Ok(stats)
    }

    fn start<T: Application>(&mut self, app: &mut T, device: &mut dyn GraphicsDevice) -> Result<(), EngineError> {
        self.running = true;
        app.initialize(self)
            .map_err(|e| EngineError::ApplicationError(format!("App initialization: {}", e)))?;
        self.initialize(device)
    }

    fn step<T: Application>(
        &mut self,
        app: &mut T,
        device: &mut dyn GraphicsDevice,
        delta_ms: f32,
    ) -> Result<FrameStats, EngineError> {
        app.update(self, delta_ms)
            .map_err(|e| EngineError::ApplicationError(format!("App update: {}", e)))?;

        let mut intent = std::mem::take(&mut self.input);
        let stats = self.frame(device, delta_ms, &mut intent);
        self.input = intent;
        Ok(stats)
    }

    /// Handle an application event
    pub fn handle_event(&mut self, event: AppEvent) {
        match event {
            AppEvent::WindowCloseRequested => self.quit(),
            AppEvent::WindowResized { width, height } => {
                if height > 0 {
                    self.camera.set_aspect(width as f32 / height as f32);
                }
            }
            AppEvent::KeyInput { key, pressed } => self.input.handle_key(key, pressed),
            AppEvent::MouseButton { pressed } => self.input.handle_mouse_button(pressed),
            AppEvent::MouseMoved { dx, dy } => self.input.handle_mouse_move(dx, dy),
        }
    }

    /// Request engine shutdown
    pub fn quit(&mut self) {
        log::info!("Engine shutdown requested");
        self.running = false;
    }

    /// Whether the main loop should keep going
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Engine configuration
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Get the current frame delta time in milliseconds
    pub fn delta_ms(&self) -> f32 {
        self.timer.delta_ms()
    }
}

/// Engine-level errors
#[derive(Error, Debug)]
pub enum EngineError {
    /// Configuration rejected
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Scene resources failed to initialize
    #[error("Scene error: {0}")]
    Scene(#[from] SceneError),

    /// Rendering error
    #[error("Rendering error: {0}")]
    Render(#[from] RenderError),

    /// Asset system error
    #[error("Asset system error: {0}")]
    Asset(#[from] AssetError),

    /// Application error
    #[error("Application error: {0}")]
    ApplicationError(String),
}
