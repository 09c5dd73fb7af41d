//! Scene node variants
//!
//! Nodes live in the [`SceneGraph`](super::SceneGraph) arena and refer to each
//! other by [`NodeId`]. Every node has a local and a cached world matrix; what
//! else it carries depends on its [`NodeKind`].

use std::collections::HashMap;

use crate::animation::KeyFrameAnimation;
use crate::foundation::collections::{NamedEntries, NodeId};
use crate::foundation::math::{Mat4, Transform};
use crate::render::device::GraphicsDevice;
use crate::render::mesh::{BufferView, Mesh};
use crate::render::{Material, RenderError, ShaderState, Texture};

/// A mesh plus optional animation
#[derive(Debug, Clone, Default)]
pub struct ModelNode {
    /// Geometry drawn with this node's world matrix
    pub mesh: Option<Mesh>,
    /// Animation that rewrites the local matrix every update
    pub animation: Option<KeyFrameAnimation>,
}

impl ModelNode {
    /// Model with a mesh and no animation
    pub fn new(mesh: Mesh) -> Self {
        Self {
            mesh: Some(mesh),
            animation: None,
        }
    }

    /// Attach an animation
    pub fn with_animation(mut self, animation: KeyFrameAnimation) -> Self {
        self.animation = Some(animation);
        self
    }
}

/// Shared resources for an imported subtree
///
/// Buffer views, textures and materials are owned here and read by the meshes of
/// the models registered in the render group.
#[derive(Debug, Default)]
pub struct AssetNode {
    buffer_views: Vec<BufferView>,
    textures: Vec<Texture>,
    materials: Vec<Material>,
    render_group: Vec<NodeId>,
    /// Source index to the model registered for it
    registered: HashMap<usize, NodeId>,
}

impl AssetNode {
    /// Bundle the shared resources of an asset
    pub fn new(buffer_views: Vec<BufferView>, textures: Vec<Texture>, materials: Vec<Material>) -> Self {
        Self {
            buffer_views,
            textures,
            materials,
            render_group: Vec::new(),
            registered: HashMap::new(),
        }
    }

    /// Register a model for drawing under its source index.
    ///
    /// A source index is only registered once; returns false for repeats.
    pub fn add_model(&mut self, source_index: usize, model: NodeId) -> bool {
        if self.registered.contains_key(&source_index) {
            return false;
        }
        self.registered.insert(source_index, model);
        self.render_group.push(model);
        true
    }

    /// Models in registration order
    pub fn render_group(&self) -> &[NodeId] {
        &self.render_group
    }

    /// Model registered for a source index
    pub fn model_for(&self, source_index: usize) -> Option<NodeId> {
        self.registered.get(&source_index).copied()
    }

    /// Shared buffer views
    pub fn buffer_views(&self) -> &[BufferView] {
        &self.buffer_views
    }

    /// Textures, indexed by [`TextureId`](crate::render::TextureId)
    pub fn textures(&self) -> &[Texture] {
        &self.textures
    }

    /// Materials, indexed by [`MaterialId`](crate::render::MaterialId)
    pub fn materials(&self) -> &[Material] {
        &self.materials
    }

    /// Mutable materials, e.g. to tweak factors at runtime
    pub fn materials_mut(&mut self) -> &mut [Material] {
        &mut self.materials
    }

    /// Upload buffers, link pending materials and upload arrived textures.
    ///
    /// Work that is already done is skipped, so this runs every frame. Returns
    /// how many resources became ready; failures are pushed to `errors` and do
    /// not stop the rest.
    pub(crate) fn prepare(&mut self, device: &mut dyn GraphicsDevice, errors: &mut Vec<RenderError>) -> usize {
        let mut ready = 0;

        for view in self.buffer_views.iter_mut().filter(|view| view.handle().is_none()) {
            match view.upload(device) {
                Ok(_) => ready += 1,
                Err(err) => errors.push(err),
            }
        }

        for material in self.materials.iter_mut() {
            if !matches!(material.shader().state(), ShaderState::Pending) {
                continue;
            }
            match material.initialize(device) {
                Ok(()) => ready += 1,
                Err(err) => errors.push(err),
            }
        }

        for texture in self.textures.iter_mut() {
            match texture.prepare(device) {
                Ok(true) => ready += 1,
                Ok(false) => {}
                Err(err) => errors.push(err),
            }
        }

        ready
    }
}

/// What a node carries besides its transform
#[derive(Debug)]
pub enum NodeKind {
    /// Pure grouping transform
    Transform,
    /// Drawable model
    Model(ModelNode),
    /// Root of an imported asset
    Asset(Box<AssetNode>),
}

/// A node in the scene graph
#[derive(Debug)]
pub struct SceneNode {
    pub(crate) name: String,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: NamedEntries<NodeId>,
    pub(crate) local: Mat4,
    pub(crate) world: Mat4,
    pub(crate) kind: NodeKind,
    pub(crate) initialized: bool,
}

impl SceneNode {
    fn with_kind(kind: NodeKind) -> Self {
        Self {
            name: String::new(),
            parent: None,
            children: NamedEntries::new(),
            local: Mat4::identity(),
            world: Mat4::identity(),
            kind,
            initialized: false,
        }
    }

    /// Grouping node with an identity transform
    pub fn transform() -> Self {
        Self::with_kind(NodeKind::Transform)
    }

    /// Model node
    pub fn model(model: ModelNode) -> Self {
        Self::with_kind(NodeKind::Model(model))
    }

    /// Asset node
    pub fn asset(asset: AssetNode) -> Self {
        Self::with_kind(NodeKind::Asset(Box::new(asset)))
    }

    /// Set the local matrix from a TRS transform
    pub fn with_transform(mut self, transform: &Transform) -> Self {
        self.local = transform.to_matrix();
        self
    }

    /// Set the local matrix directly
    pub fn with_local_matrix(mut self, local: Mat4) -> Self {
        self.local = local;
        self
    }

    /// Name under which the node is attached
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Parent handle; `None` for roots and detached nodes
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Children in insertion order
    pub fn children(&self) -> impl Iterator<Item = (&str, NodeId)> + '_ {
        self.children.iter()
    }

    /// Local matrix relative to the parent
    pub fn local_matrix(&self) -> &Mat4 {
        &self.local
    }

    /// World matrix as of the last update
    pub fn world_matrix(&self) -> &Mat4 {
        &self.world
    }

    /// Node variant
    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    /// Mutable node variant
    pub fn kind_mut(&mut self) -> &mut NodeKind {
        &mut self.kind
    }

    /// Whether the node has gone through initialization
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Model payload, if this is a model
    pub fn as_model(&self) -> Option<&ModelNode> {
        match &self.kind {
            NodeKind::Model(model) => Some(model),
            _ => None,
        }
    }

    /// Mutable model payload
    pub fn as_model_mut(&mut self) -> Option<&mut ModelNode> {
        match &mut self.kind {
            NodeKind::Model(model) => Some(model),
            _ => None,
        }
    }

    /// Asset payload, if this is an asset
    pub fn as_asset(&self) -> Option<&AssetNode> {
        match &self.kind {
            NodeKind::Asset(asset) => Some(&**asset),
            _ => None,
        }
    }

    /// Mutable asset payload
    pub fn as_asset_mut(&mut self) -> Option<&mut AssetNode> {
        match &mut self.kind {
            NodeKind::Asset(asset) => Some(&mut **asset),
            _ => None,
        }
    }
}
