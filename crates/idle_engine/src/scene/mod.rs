//! Scene management
//!
//! The scene graph holds every node in the world: grouping transforms, models
//! with meshes and animations, and assets that own the GPU resources their
//! models share.

pub mod node;
pub mod scene_graph;

pub use node::{AssetNode, ModelNode, NodeKind, SceneNode};
pub use scene_graph::SceneGraph;

use thiserror::Error;

use crate::foundation::collections::NodeId;
use crate::render::RenderError;

/// Scene graph errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SceneError {
    /// Handle no longer (or never) resolved
    #[error("Scene node {0:?} not found")]
    NodeNotFound(NodeId),

    /// Attaching would make a node its own ancestor
    #[error("Attaching {child:?} under {parent:?} would create a cycle")]
    Cycle {
        /// Requested parent
        parent: NodeId,
        /// Node being attached
        child: NodeId,
    },

    /// A resource failed while preparing the graph
    #[error("Render resource error: {0}")]
    Render(#[from] RenderError),
}

/// Result type for scene operations
pub type SceneResult<T> = Result<T, SceneError>;
