//! # Rendering
//!
//! Everything between a refreshed scene graph and the device command stream:
//! shader programs and their reflection maps, textures, materials bound to fixed
//! texture units, mesh primitives reading shared buffer views, the camera, lights
//! and the skybox.
//!
//! ## Readiness
//!
//! Shaders, textures and primitives each carry their own readiness state. Render
//! calls check it first and quietly skip work that is not ready yet; the next
//! frame tries again. Only shader link failures are errors, and those are
//! permanent for the shader instance involved.

pub mod camera;
pub mod context;
pub mod device;
pub mod headless;
pub mod lighting;
pub mod material;
pub mod mesh;
pub mod shader;
pub mod shader_library;
pub mod skybox;
pub mod texture;

pub use camera::Camera;
pub use context::FrameContext;
pub use device::{
    AttributeSlot, BufferHandle, BufferTarget, ComponentType, DrawMode, FilterMode,
    GraphicsDevice, ProgramHandle, ProgramInfo, Sampler, TextureHandle, TextureKind,
    UniformSlot, UniformValue, VertexLayout, WrapMode,
};
pub use headless::HeadlessDevice;
pub use lighting::{Light, LightKind};
pub use material::{Material, MaterialFactors, MaterialId, TextureSlot};
pub use mesh::{Accessor, BufferView, Mesh, MeshPrimitive, VertexAttribute};
pub use shader::{Shader, ShaderClass, ShaderState};
pub use shader_library::ShaderLibrary;
pub use skybox::Skybox;
pub use texture::{Texture, TextureData, TextureId, TextureLoader, TextureState};

use thiserror::Error;

/// Rendering system error types
///
/// Not-ready resources are never reported here; they are skipped for the frame.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RenderError {
    /// Compile or link failed; the shader instance is permanently unusable
    #[error("Shader link failed: {0}")]
    ShaderLink(String),

    /// A define was requested after the program was linked
    #[error("Cannot define {define}: shader already linked")]
    ShaderAlreadyLinked {
        /// The rejected define
        define: String,
    },

    /// Shader or header source could not be read
    #[error("Shader source {path} unavailable: {reason}")]
    ShaderSource {
        /// File that was requested
        path: String,
        /// Underlying IO error text
        reason: String,
    },

    /// `//include` directives nested too deeply, usually a cycle
    #[error("Shader include depth exceeded while expanding {0}")]
    IncludeDepth(String),

    /// GPU resource creation or upload failed
    #[error("Resource creation failed: {0}")]
    ResourceCreationFailed(String),

    /// Data handed to the renderer was inconsistent
    #[error("Invalid resource: {0}")]
    InvalidResource(String),
}

/// Result type for rendering operations
pub type RenderResult<T> = Result<T, RenderError>;
