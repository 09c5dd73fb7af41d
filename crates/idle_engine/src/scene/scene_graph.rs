//! Hierarchical scene graph
//!
//! Nodes are stored in a slot-map arena. Parents own their children through an
//! insertion-ordered name map; children point back with a plain handle, so a
//! parent that disappears simply stops resolving.
//!
//! Every traversal is depth first, parent before child, siblings in insertion
//! order. Traversals use an explicit stack so deep hierarchies cannot exhaust the
//! call stack.

use crate::foundation::collections::{NamedEntries, NodeId, SlotMap};
use crate::foundation::math::{compose, Mat4, Mat4Ext, Quat, Vec3};
use crate::render::context::FrameContext;
use crate::render::device::GraphicsDevice;
use crate::render::RenderError;

use super::node::{AssetNode, NodeKind, SceneNode};
use super::{SceneError, SceneResult};

/// Arena-backed node hierarchy
#[derive(Debug, Default)]
pub struct SceneGraph {
    nodes: SlotMap<NodeId, SceneNode>,
    roots: NamedEntries<NodeId>,
}

impl SceneGraph {
    /// Empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a top-level node.
    ///
    /// A root with the same name is replaced and its subtree destroyed.
    pub fn add_root(&mut self, name: impl Into<String>, mut node: SceneNode) -> NodeId {
        let name = name.into();
        node.name = name.clone();
        node.parent = None;
        let id = self.nodes.insert(node);
        if let Some(previous) = self.roots.insert(name.clone(), id) {
            log::debug!("Root {} replaced; destroying previous tree", name);
            self.destroy_subtree(previous);
        }
        id
    }

    /// Create `node` as a child of `parent` under `name`.
    ///
    /// An existing child with the same name is replaced and its subtree
    /// destroyed.
    pub fn add_child(&mut self, parent: NodeId, name: impl Into<String>, node: SceneNode) -> SceneResult<NodeId> {
        if !self.nodes.contains_key(parent) {
            return Err(SceneError::NodeNotFound(parent));
        }
        let id = self.nodes.insert(node);
        self.link(parent, id, name.into());
        Ok(id)
    }

    /// Move an existing node (and its subtree) under `parent`.
    ///
    /// Fails if either handle is stale or if `parent` lies inside `child`'s
    /// subtree. Name collisions replace the previous child.
    pub fn attach(&mut self, parent: NodeId, child: NodeId, name: impl Into<String>) -> SceneResult<()> {
        if !self.nodes.contains_key(parent) {
            return Err(SceneError::NodeNotFound(parent));
        }
        if !self.nodes.contains_key(child) {
            return Err(SceneError::NodeNotFound(child));
        }
        if self.is_ancestor_or_self(child, parent) {
            return Err(SceneError::Cycle { parent, child });
        }
        self.unlink(child);
        self.link(parent, child, name.into());
        Ok(())
    }

    fn link(&mut self, parent: NodeId, child: NodeId, name: String) {
        let displaced = match self.nodes.get_mut(parent) {
            Some(parent_node) => parent_node.children.insert(name.clone(), child),
            None => return,
        };
        if let Some(node) = self.nodes.get_mut(child) {
            node.name = name;
            node.parent = Some(parent);
        }
        if let Some(previous) = displaced.filter(|previous| *previous != child) {
            log::debug!("Child of {:?} replaced; destroying previous subtree", parent);
            self.destroy_subtree(previous);
        }
    }

    fn unlink(&mut self, child: NodeId) {
        let parent = self.nodes.get(child).and_then(|node| node.parent);
        match parent {
            Some(parent) => {
                if let Some(parent_node) = self.nodes.get_mut(parent) {
                    parent_node.children.remove_key(child);
                }
            }
            None => {
                self.roots.remove_key(child);
            }
        }
        if let Some(node) = self.nodes.get_mut(child) {
            node.parent = None;
        }
    }

    fn is_ancestor_or_self(&self, ancestor: NodeId, mut node: NodeId) -> bool {
        loop {
            if node == ancestor {
                return true;
            }
            match self.nodes.get(node).and_then(|n| n.parent) {
                Some(parent) => node = parent,
                None => return false,
            }
        }
    }

    /// Child of `parent` called `name`; logs a warning and returns `None` if
    /// there is no such child
    pub fn child_by_name(&self, parent: NodeId, name: &str) -> Option<NodeId> {
        let found = self.nodes.get(parent).and_then(|node| node.children.get(name));
        if found.is_none() {
            log::warn!("Child {} could not be found in scene", name);
        }
        found
    }

    /// Root called `name`; logs a warning when absent
    pub fn root_by_name(&self, name: &str) -> Option<NodeId> {
        let found = self.roots.get(name);
        if found.is_none() {
            log::warn!("Root {} could not be found in scene", name);
        }
        found
    }

    /// Detach and destroy the child called `name`; returns nodes destroyed
    pub fn remove_child(&mut self, parent: NodeId, name: &str) -> usize {
        let Some(child) = self.nodes.get_mut(parent).and_then(|node| node.children.remove(name)) else {
            log::warn!("Child {} could not be found in scene", name);
            return 0;
        };
        self.destroy_subtree(child)
    }

    /// Detach and destroy a node with its whole subtree; returns nodes destroyed
    pub fn remove(&mut self, id: NodeId) -> usize {
        if !self.nodes.contains_key(id) {
            return 0;
        }
        self.unlink(id);
        self.destroy_subtree(id)
    }

    fn destroy_subtree(&mut self, id: NodeId) -> usize {
        let mut stack = vec![id];
        let mut destroyed = 0;
        while let Some(current) = stack.pop() {
            if let Some(node) = self.nodes.remove(current) {
                stack.extend(node.children.keys());
                destroyed += 1;
            }
        }
        destroyed
    }

    /// Node lookup
    pub fn node(&self, id: NodeId) -> Option<&SceneNode> {
        self.nodes.get(id)
    }

    /// Mutable node lookup
    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut SceneNode> {
        self.nodes.get_mut(id)
    }

    /// Asset payload of a node
    pub fn asset_mut(&mut self, id: NodeId) -> Option<&mut AssetNode> {
        self.nodes.get_mut(id).and_then(SceneNode::as_asset_mut)
    }

    /// Whether a handle still resolves
    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    /// Number of live nodes
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the graph has no nodes
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Top-level nodes in insertion order
    pub fn roots(&self) -> impl Iterator<Item = (&str, NodeId)> + '_ {
        self.roots.iter()
    }

    // --- transform edits ---------------------------------------------------

    fn local_mut(&mut self, id: NodeId) -> SceneResult<&mut Mat4> {
        self.nodes
            .get_mut(id)
            .map(|node| &mut node.local)
            .ok_or(SceneError::NodeNotFound(id))
    }

    /// Replace the local matrix with `T · R · S`
    pub fn transform(&mut self, id: NodeId, rotation: &Quat, translation: &Vec3, scale: &Vec3) -> SceneResult<()> {
        *self.local_mut(id)? = compose(rotation, translation, scale);
        Ok(())
    }

    /// Replace the local matrix
    pub fn set_local_matrix(&mut self, id: NodeId, matrix: Mat4) -> SceneResult<()> {
        *self.local_mut(id)? = matrix;
        Ok(())
    }

    /// Post-multiply the local matrix by a translation
    pub fn translate(&mut self, id: NodeId, offset: &Vec3) -> SceneResult<()> {
        let local = self.local_mut(id)?;
        *local *= Mat4::new_translation(offset);
        Ok(())
    }

    /// Post-multiply the local matrix by a rotation of `angle` radians about `axis`
    pub fn rotate(&mut self, id: NodeId, angle: f32, axis: &Vec3) -> SceneResult<()> {
        let local = self.local_mut(id)?;
        *local *= Mat4::axis_rotation(angle, axis);
        Ok(())
    }

    /// Post-multiply the local matrix by a per-axis scale
    pub fn scale(&mut self, id: NodeId, factors: &Vec3) -> SceneResult<()> {
        let local = self.local_mut(id)?;
        *local *= Mat4::new_nonuniform_scaling(factors);
        Ok(())
    }

    /// Local matrix of a node
    pub fn local_matrix(&self, id: NodeId) -> Option<&Mat4> {
        self.nodes.get(id).map(|node| &node.local)
    }

    /// World matrix of a node as of the last update
    pub fn world_matrix(&self, id: NodeId) -> Option<&Mat4> {
        self.nodes.get(id).map(|node| &node.world)
    }

    // --- traversals --------------------------------------------------------

    /// Node handles in traversal order
    pub fn depth_first(&self) -> Vec<NodeId> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut stack: Vec<NodeId> = self.roots.keys().rev().collect();
        while let Some(id) = stack.pop() {
            if let Some(node) = self.nodes.get(id) {
                order.push(id);
                stack.extend(node.children.keys().rev());
            }
        }
        order
    }

    /// Advance animations and refresh world matrices; returns nodes visited.
    ///
    /// A model's animation rewrites its local matrix before the world matrix is
    /// recomputed, so children of an animated node follow it the same frame.
    pub fn update(&mut self, delta_ms: f32) -> usize {
        let mut visited = 0;
        let mut stack: Vec<(NodeId, Option<Mat4>)> = self.roots.keys().rev().map(|id| (id, None)).collect();

        while let Some((id, parent_world)) = stack.pop() {
            let Some(node) = self.nodes.get_mut(id) else {
                continue;
            };
            if let NodeKind::Model(model) = &mut node.kind {
                if let Some(animation) = &mut model.animation {
                    animation.update(delta_ms, &mut node.local);
                }
            }
            node.world = match parent_world {
                Some(parent_world) => parent_world * node.local,
                None => node.local,
            };
            visited += 1;

            let world = node.world;
            stack.extend(node.children.keys().rev().map(|child| (child, Some(world))));
        }
        visited
    }

    /// First pass over the graph: upload buffers, link materials, upload any
    /// textures that already arrived and initialize primitives.
    ///
    /// Every node is processed even when some fail; the first failure is
    /// returned.
    pub fn initialize(&mut self, device: &mut dyn GraphicsDevice) -> SceneResult<()> {
        let errors = self.prepare_pass(device).1;
        match errors.into_iter().next() {
            Some(err) => Err(SceneError::Render(err)),
            None => Ok(()),
        }
    }

    /// Per-frame readiness pass; picks up late textures and nodes added since
    /// the last pass. Returns how many resources became ready.
    ///
    /// Failures are logged and not retried.
    pub fn prepare(&mut self, device: &mut dyn GraphicsDevice) -> usize {
        let (ready, errors) = self.prepare_pass(device);
        for err in errors {
            log::warn!("Scene resource failed to prepare: {}", err);
        }
        ready
    }

    fn prepare_pass(&mut self, device: &mut dyn GraphicsDevice) -> (usize, Vec<RenderError>) {
        let mut errors = Vec::new();
        let mut ready = 0;
        let mut assets = Vec::new();

        for id in self.depth_first() {
            let Some(node) = self.nodes.get_mut(id) else {
                continue;
            };
            if let NodeKind::Asset(asset) = &mut node.kind {
                ready += asset.prepare(device, &mut errors);
                assets.push(id);
            }
            node.initialized = true;
        }

        for asset_id in assets {
            let models = match self.nodes.get(asset_id).and_then(SceneNode::as_asset) {
                Some(asset) => asset.render_group().to_vec(),
                None => continue,
            };
            for model_id in models {
                let Some([asset_node, model_node]) = self.nodes.get_disjoint_mut([asset_id, model_id]) else {
                    continue;
                };
                let (Some(asset), Some(mesh)) = (
                    asset_node.as_asset(),
                    model_node.as_model_mut().and_then(|model| model.mesh.as_mut()),
                ) else {
                    continue;
                };
                ready += mesh.initialize(device, asset.materials());
            }
        }

        (ready, errors)
    }

    /// Draw the graph; returns the number of draw calls issued.
    ///
    /// Only assets draw: each draws the models in its render group with its own
    /// buffer views, textures and materials. The walk still descends through
    /// every node, so an asset provisioned below another asset's models is
    /// drawn too. Nodes that have not been initialized are skipped with their
    /// subtrees.
    pub fn render(&self, device: &mut dyn GraphicsDevice, context: &FrameContext<'_>) -> usize {
        let mut draws = 0;
        let mut stack: Vec<NodeId> = self.roots.keys().rev().collect();

        while let Some(id) = stack.pop() {
            let Some(node) = self.nodes.get(id) else {
                continue;
            };
            if !node.initialized {
                continue;
            }
            if let NodeKind::Asset(asset) = &node.kind {
                draws += self.render_asset(device, context, asset);
            }
            stack.extend(node.children.keys().rev());
        }
        draws
    }

    fn render_asset(&self, device: &mut dyn GraphicsDevice, context: &FrameContext<'_>, asset: &AssetNode) -> usize {
        let mut draws = 0;
        for model_id in asset.render_group() {
            let Some(model_node) = self.nodes.get(*model_id) else {
                continue;
            };
            let Some(mesh) = model_node.as_model().and_then(|model| model.mesh.as_ref()) else {
                continue;
            };
            draws += mesh.render(
                device,
                context,
                asset.materials(),
                asset.textures(),
                asset.buffer_views(),
                &model_node.world,
            );
        }
        draws
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::{KeyFrame, KeyFrameAnimation};
    use crate::foundation::math::{constants, Transform};
    use crate::scene::node::ModelNode;
    use approx::assert_relative_eq;

    fn translated(x: f32, y: f32, z: f32) -> SceneNode {
        SceneNode::transform().with_local_matrix(Mat4::new_translation(&Vec3::new(x, y, z)))
    }

    #[test]
    fn test_root_world_equals_local() {
        let mut graph = SceneGraph::new();
        let root = graph.add_root("root", translated(1.0, 2.0, 3.0));
        graph.update(16.0);
        assert_eq!(graph.world_matrix(root), graph.local_matrix(root));
    }

    #[test]
    fn test_world_is_parent_world_times_local() {
        let mut graph = SceneGraph::new();
        let root = graph.add_root("root", translated(1.0, 0.0, 0.0));
        graph.rotate(root, constants::HALF_PI, &Vec3::y()).unwrap();
        let child = graph.add_child(root, "child", translated(0.0, 0.0, -2.0)).unwrap();
        let grandchild = graph
            .add_child(child, "grandchild", SceneNode::transform().with_local_matrix(Mat4::new_scaling(2.0)))
            .unwrap();

        graph.update(0.0);

        for (parent, node) in [(root, child), (child, grandchild)] {
            let expected = graph.world_matrix(parent).unwrap() * graph.local_matrix(node).unwrap();
            assert_relative_eq!(*graph.world_matrix(node).unwrap(), expected, epsilon = 1e-6);
        }
        // Child sits 2 units down -Z of a root turned a quarter to the left
        let origin = graph.world_matrix(child).unwrap().transform_point(&crate::foundation::math::Point3::origin());
        assert_relative_eq!(origin.coords, Vec3::new(-1.0, 0.0, 0.0), epsilon = 1e-5);
    }

    #[test]
    fn test_duplicate_name_is_last_write_wins() {
        let mut graph = SceneGraph::new();
        let root = graph.add_root("root", SceneNode::transform());
        let first = graph.add_child(root, "a", SceneNode::transform()).unwrap();
        let nested = graph.add_child(first, "nested", SceneNode::transform()).unwrap();
        let second = graph.add_child(root, "a", translated(5.0, 0.0, 0.0)).unwrap();

        assert_eq!(graph.child_by_name(root, "a"), Some(second));
        assert!(!graph.contains(first));
        assert!(!graph.contains(nested));
        assert_eq!(graph.node(second).unwrap().parent(), Some(root));
        assert_eq!(graph.node(root).unwrap().children().count(), 1);
    }

    #[test]
    fn test_missing_child_is_none() {
        let mut graph = SceneGraph::new();
        let root = graph.add_root("root", SceneNode::transform());
        assert_eq!(graph.child_by_name(root, "ghost"), None);
        assert_eq!(graph.remove_child(root, "ghost"), 0);
    }

    #[test]
    fn test_depth_first_keeps_insertion_order() {
        let mut graph = SceneGraph::new();
        let root = graph.add_root("root", SceneNode::transform());
        let b = graph.add_child(root, "b", SceneNode::transform()).unwrap();
        let a = graph.add_child(root, "a", SceneNode::transform()).unwrap();
        let b1 = graph.add_child(b, "b1", SceneNode::transform()).unwrap();
        let other = graph.add_root("other", SceneNode::transform());

        assert_eq!(graph.depth_first(), vec![root, b, b1, a, other]);
    }

    #[test]
    fn test_attach_reparents_and_rejects_cycles() {
        let mut graph = SceneGraph::new();
        let root = graph.add_root("root", SceneNode::transform());
        let a = graph.add_child(root, "a", SceneNode::transform()).unwrap();
        let b = graph.add_child(a, "b", SceneNode::transform()).unwrap();

        assert!(matches!(graph.attach(b, a, "loop"), Err(SceneError::Cycle { .. })));
        assert!(matches!(graph.attach(a, a, "self"), Err(SceneError::Cycle { .. })));

        graph.attach(root, b, "b").unwrap();
        assert_eq!(graph.node(b).unwrap().parent(), Some(root));
        assert_eq!(graph.node(a).unwrap().children().count(), 0);
        assert_eq!(graph.child_by_name(root, "b"), Some(b));
    }

    #[test]
    fn test_remove_destroys_subtree() {
        let mut graph = SceneGraph::new();
        let root = graph.add_root("root", SceneNode::transform());
        let a = graph.add_child(root, "a", SceneNode::transform()).unwrap();
        graph.add_child(a, "a1", SceneNode::transform()).unwrap();
        graph.add_child(a, "a2", SceneNode::transform()).unwrap();

        assert_eq!(graph.remove(a), 3);
        assert_eq!(graph.len(), 1);
        assert_eq!(graph.node(root).unwrap().children().count(), 0);
    }

    #[test]
    fn test_incremental_edits_post_multiply() {
        let mut graph = SceneGraph::new();
        let root = graph.add_root("root", SceneNode::transform());
        graph.rotate(root, constants::HALF_PI, &Vec3::y()).unwrap();
        graph.translate(root, &Vec3::new(0.0, 0.0, -1.0)).unwrap();

        // Translation happens in the rotated frame
        let local = graph.local_matrix(root).unwrap();
        assert_relative_eq!(local[(0, 3)], -1.0, epsilon = 1e-6);
        assert_relative_eq!(local[(2, 3)], 0.0, epsilon = 1e-6);

        graph.scale(root, &Vec3::new(2.0, 2.0, 2.0)).unwrap();
        assert_relative_eq!(graph.local_matrix(root).unwrap()[(0, 3)], -1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_transform_replaces_local() {
        let mut graph = SceneGraph::new();
        let root = graph.add_root("root", translated(9.0, 9.0, 9.0));
        let rotation = Quat::from_axis_angle(&Vec3::z_axis(), 0.3);
        graph
            .transform(root, &rotation, &Vec3::new(1.0, 2.0, 3.0), &Vec3::new(1.0, 1.0, 1.0))
            .unwrap();
        let expected = Transform::new(Vec3::new(1.0, 1.0, 1.0), rotation, Vec3::new(1.0, 2.0, 3.0)).to_matrix();
        assert_relative_eq!(*graph.local_matrix(root).unwrap(), expected, epsilon = 1e-6);
    }

    #[test]
    fn test_animation_drives_children() {
        let keyframes = vec![
            KeyFrame::new(0.0, Transform::identity()),
            KeyFrame::new(1000.0, Transform::from_translation(Vec3::new(10.0, 0.0, 0.0))),
        ];
        let model = ModelNode::default().with_animation(KeyFrameAnimation::new(keyframes).unwrap());

        let mut graph = SceneGraph::new();
        let root = graph.add_root("root", SceneNode::model(model));
        let child = graph.add_child(root, "child", translated(0.0, 1.0, 0.0)).unwrap();

        graph.update(500.0);
        let world = graph.world_matrix(child).unwrap();
        assert_relative_eq!(world[(0, 3)], 5.0, epsilon = 1e-4);
        assert_relative_eq!(world[(1, 3)], 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_stale_handles_error() {
        let mut graph = SceneGraph::new();
        let root = graph.add_root("root", SceneNode::transform());
        graph.remove(root);
        assert!(matches!(graph.translate(root, &Vec3::x()), Err(SceneError::NodeNotFound(_))));
        assert!(graph.add_child(root, "x", SceneNode::transform()).is_err());
    }

    #[test]
    fn test_replacing_root_destroys_old_tree() {
        let mut graph = SceneGraph::new();
        let old = graph.add_root("world", SceneNode::transform());
        graph.add_child(old, "a", SceneNode::transform()).unwrap();
        let new = graph.add_root("world", SceneNode::transform());

        assert_eq!(graph.len(), 1);
        assert_eq!(graph.root_by_name("world"), Some(new));
    }
}
