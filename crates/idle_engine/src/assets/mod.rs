//! Asset import
//!
//! Scene-asset descriptors, their provisioning into the scene graph, and the
//! image decoding that completes pending textures.

pub mod image_loader;
pub mod provision;
pub mod scene_asset;

pub use provision::{provision, provision_with_class, ProvisionedAsset};
pub use scene_asset::{
    AccessorDesc, AccessorType, BufferViewDesc, MaterialDesc, MeshDesc, NodeDesc, PrimitiveDesc, SceneAssetDesc,
    TextureDesc,
};

use std::path::Path;

use thiserror::Error;

use crate::animation::AnimationError;
use crate::config::{Config, ConfigError};
use crate::render::RenderError;
use crate::scene::SceneError;

/// Load a scene-asset descriptor from a `.ron` or `.toml` file
pub fn load_descriptor(path: impl AsRef<Path>) -> AssetResult<SceneAssetDesc> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(AssetError::NotFound(path.display().to_string()));
    }
    Ok(SceneAssetDesc::load_from_file(path)?)
}

/// Asset loading errors
#[derive(Error, Debug)]
pub enum AssetError {
    /// Asset not found
    #[error("Asset not found: {0}")]
    NotFound(String),

    /// Failed to load asset
    #[error("Failed to load asset: {0}")]
    LoadFailed(String),

    /// Invalid asset data
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// The asset requires an extension this loader lacks
    #[error("Unsupported extension: {0}")]
    UnsupportedExtension(String),

    /// An index in the descriptor points past its table
    #[error("{what} index {index} out of range (len {len})")]
    IndexOutOfRange {
        /// Table being indexed
        what: &'static str,
        /// Offending index
        index: usize,
        /// Table length
        len: usize,
    },

    /// Keyframes attached to a node were rejected
    #[error("Animation error: {0}")]
    Animation(#[from] AnimationError),

    /// Shader or mesh construction failed
    #[error("Render error: {0}")]
    Render(#[from] RenderError),

    /// Graph insertion failed
    #[error("Scene error: {0}")]
    Scene(#[from] SceneError),

    /// Descriptor file could not be parsed
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// IO error during asset loading
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Result type for asset operations
pub type AssetResult<T> = Result<T, AssetError>;
