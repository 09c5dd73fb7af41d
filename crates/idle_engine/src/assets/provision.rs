//! Turning a [`SceneAssetDesc`] into a scene-graph subtree
//!
//! The descriptor is checked completely before the graph is touched, so a
//! rejected asset leaves the graph as it was. A provisioned asset becomes one
//! asset node owning the buffer views, textures and materials, with the
//! descriptor's node tree below it. Nodes with a mesh become models and are
//! registered in the asset's render group by node index. A node listed under
//! several parents is instantiated under each of them, but only its first
//! instance joins the render group.

use std::collections::HashSet;

use crate::animation::KeyFrameAnimation;
use crate::foundation::collections::NodeId;
use crate::render::device::TextureKind;
use crate::render::material::{Material, MaterialId, TextureSlot};
use crate::render::mesh::{Accessor, BufferView, Mesh, MeshPrimitive, VertexAttribute};
use crate::render::shader::ShaderClass;
use crate::render::shader_library::ShaderLibrary;
use crate::render::texture::{Texture, TextureId, TextureLoader};
use crate::foundation::math::{Vec3, Vec4};
use crate::scene::{AssetNode, ModelNode, SceneGraph, SceneNode};

use super::scene_asset::{AccessorDesc, MaterialDesc, SceneAssetDesc, SUPPORTED_EXTENSIONS};
use super::{AssetError, AssetResult};

/// Result of provisioning an asset
#[derive(Debug)]
pub struct ProvisionedAsset {
    /// The asset node
    pub node: NodeId,
    /// Completion handles for the asset's textures, in texture order
    pub loaders: Vec<TextureLoader>,
}

/// Build an asset subtree under `parent` (or as a root when `None`).
///
/// Materials use the PBR shader class. A material drawn by any primitive with
/// `COLOR_0` gets `HAS_BASE_COLOR`. Textures start pending; the returned
/// loaders deliver their pixels.
pub fn provision(
    graph: &mut SceneGraph,
    parent: Option<NodeId>,
    name: &str,
    desc: &SceneAssetDesc,
    library: &mut ShaderLibrary,
) -> AssetResult<ProvisionedAsset> {
    provision_with_class(graph, parent, name, desc, library, ShaderClass::Pbr)
}

/// [`provision`] with every material built on `class`
pub fn provision_with_class(
    graph: &mut SceneGraph,
    parent: Option<NodeId>,
    name: &str,
    desc: &SceneAssetDesc,
    library: &mut ShaderLibrary,
    class: ShaderClass,
) -> AssetResult<ProvisionedAsset> {
    if matches!(class, ShaderClass::CubeMap) {
        return Err(AssetError::InvalidData("the CubeMap shader class is reserved for the skybox".to_string()));
    }
    validate(desc)?;

    let buffer_views: Vec<BufferView> = desc
        .buffer_views
        .iter()
        .map(|view| BufferView::new(view.target, view.data.clone()))
        .collect();

    let (textures, loaders): (Vec<Texture>, Vec<TextureLoader>) = desc
        .textures
        .iter()
        .map(|texture| Texture::pending(texture.uri.clone(), TextureKind::Texture2D, texture.sampler))
        .unzip();

    let vertex_colored: HashSet<usize> = desc
        .meshes
        .iter()
        .flat_map(|mesh| mesh.primitives.iter())
        .filter(|primitive| primitive.has_vertex_color())
        .filter_map(|primitive| primitive.material)
        .collect();

    let mut materials = Vec::with_capacity(desc.materials.len());
    for (index, material) in desc.materials.iter().enumerate() {
        let mut built = build_material(material, library, class)?;
        if vertex_colored.contains(&index) {
            built.define("HAS_BASE_COLOR")?;
        }
        materials.push(built);
    }

    // Everything fallible happens before the graph is touched
    let meshes = (0..desc.meshes.len())
        .map(|index| build_mesh(desc, index))
        .collect::<AssetResult<Vec<Mesh>>>()?;
    let mut payloads = Vec::with_capacity(desc.nodes.len());
    for node_desc in &desc.nodes {
        let payload = match (node_desc.mesh, &node_desc.animation) {
            (Some(mesh_index), animation) => {
                let mut model = ModelNode::new(meshes[mesh_index].clone());
                if let Some(keyframes) = animation {
                    model = model.with_animation(KeyFrameAnimation::new(keyframes.clone())?);
                }
                Some(model)
            }
            (None, Some(_)) => {
                log::warn!("Ignoring animation on node {} without a mesh", node_desc.name);
                None
            }
            (None, None) => None,
        };
        payloads.push(payload);
    }

    let asset = SceneNode::asset(AssetNode::new(buffer_views, textures, materials));
    let asset_id = match parent {
        Some(parent) => graph.add_child(parent, name, asset)?,
        None => graph.add_root(name, asset),
    };

    // Explicit stack of (node index, parent handle); children pushed in reverse
    // so siblings are created in declaration order.
    let mut stack: Vec<(usize, NodeId)> = desc.scene.iter().rev().map(|index| (*index, asset_id)).collect();
    let mut models = Vec::new();
    while let Some((index, parent_id)) = stack.pop() {
        let node_desc = &desc.nodes[index];
        let is_model = payloads[index].is_some();
        let scene_node = payloads[index]
            .clone()
            .map_or_else(SceneNode::transform, SceneNode::model)
            .with_local_matrix(node_desc.local_matrix());

        let id = graph.add_child(parent_id, node_desc.name.clone(), scene_node)?;
        if is_model {
            models.push((index, id));
        }
        stack.extend(node_desc.children.iter().rev().map(|child| (*child, id)));
    }

    if let Some(asset) = graph.asset_mut(asset_id) {
        for (index, id) in models {
            if !asset.add_model(index, id) {
                log::debug!("Node {} is instanced more than once; drawing its first instance", index);
            }
        }
    }

    log::debug!(
        "Provisioned asset {} with {} nodes, {} materials, {} textures",
        name,
        desc.nodes.len(),
        desc.materials.len(),
        desc.textures.len()
    );
    Ok(ProvisionedAsset { node: asset_id, loaders })
}

fn validate(desc: &SceneAssetDesc) -> AssetResult<()> {
    if let Some(extension) = desc
        .extensions_required
        .iter()
        .find(|extension| !SUPPORTED_EXTENSIONS.contains(&extension.as_str()))
    {
        return Err(AssetError::UnsupportedExtension(extension.clone()));
    }

    let check = |what: &'static str, index: usize, len: usize| {
        if index < len {
            Ok(())
        } else {
            Err(AssetError::IndexOutOfRange { what, index, len })
        }
    };

    for accessor in &desc.accessors {
        check("buffer view", accessor.buffer_view, desc.buffer_views.len())?;
    }
    for material in &desc.materials {
        for texture in material_textures(material) {
            check("texture", texture, desc.textures.len())?;
        }
    }
    for mesh in &desc.meshes {
        for primitive in &mesh.primitives {
            check("accessor", primitive.indices, desc.accessors.len())?;
            for accessor in primitive.attributes.values() {
                check("accessor", *accessor, desc.accessors.len())?;
            }
            if let Some(material) = primitive.material {
                check("material", material, desc.materials.len())?;
            }
        }
    }
    for node in &desc.nodes {
        if let Some(mesh) = node.mesh {
            check("mesh", mesh, desc.meshes.len())?;
        }
        for child in &node.children {
            check("node", *child, desc.nodes.len())?;
        }
    }

    // Shared nodes are fine; a node on its own ancestor path is not. The stack
    // carries each entry's depth so the path can be cut back when popping.
    let mut path: Vec<usize> = Vec::new();
    let mut stack = Vec::new();
    for root in desc.scene.iter().rev() {
        check("node", *root, desc.nodes.len())?;
        stack.push((*root, 0));
    }
    while let Some((index, depth)) = stack.pop() {
        path.truncate(depth);
        if path.contains(&index) {
            return Err(AssetError::InvalidData(format!("node {index} is its own ancestor")));
        }
        path.push(index);
        stack.extend(desc.nodes[index].children.iter().map(|child| (*child, depth + 1)));
    }
    Ok(())
}

fn material_textures(material: &MaterialDesc) -> Vec<usize> {
    let mut indices = Vec::new();
    indices.extend(material.normal_texture.map(|t| t.index));
    indices.extend(material.occlusion_texture.map(|t| t.index));
    indices.extend(material.emissive_texture.map(|t| t.index));
    if let Some(spec_gloss) = &material.extensions.specular_glossiness {
        indices.extend(spec_gloss.diffuse_texture.map(|t| t.index));
        indices.extend(spec_gloss.specular_glossiness_texture.map(|t| t.index));
    }
    indices
}

fn build_material(desc: &MaterialDesc, library: &mut ShaderLibrary, class: ShaderClass) -> AssetResult<Material> {
    let mut material = Material::new(desc.name.clone(), library.shader(class)?);

    if let Some(normal) = desc.normal_texture {
        material.add_map(TextureSlot::Normal, TextureId(normal.index))?;
        if let Some(scale) = normal.scale {
            material.factors_mut().normal_scale = scale;
        }
    }
    material.factors_mut().emissive = Vec3::from(desc.emissive_factor);
    if let Some(emissive) = desc.emissive_texture {
        material.add_map(TextureSlot::Emissive, TextureId(emissive.index))?;
    }
    if let Some(occlusion) = desc.occlusion_texture {
        material.add_map(TextureSlot::Occlusion, TextureId(occlusion.index))?;
        if let Some(strength) = occlusion.strength {
            material.factors_mut().occlusion_strength = strength;
        }
    }

    if let Some(spec_gloss) = &desc.extensions.specular_glossiness {
        let factors = material.factors_mut();
        if let Some(diffuse) = spec_gloss.diffuse_factor {
            factors.diffuse = Vec4::from(diffuse);
        }
        if let Some(specular) = spec_gloss.specular_factor {
            factors.specular = Vec3::from(specular);
        }
        if let Some(glossiness) = spec_gloss.glossiness_factor {
            factors.glossiness = glossiness;
        }
        if let Some(diffuse) = spec_gloss.diffuse_texture {
            material.add_map(TextureSlot::Diffuse, TextureId(diffuse.index))?;
        }
        if let Some(spec) = spec_gloss.specular_glossiness_texture {
            material.add_map(TextureSlot::SpecularGlossiness, TextureId(spec.index))?;
        }
    }

    Ok(material)
}

fn accessor(desc: &AccessorDesc) -> Accessor {
    Accessor {
        buffer_view: desc.buffer_view,
        component_type: desc.component_type,
        components: desc.kind.components(),
        normalized: desc.normalized,
        stride: desc.byte_stride,
        offset: desc.byte_offset,
        count: desc.count,
    }
}

fn build_mesh(desc: &SceneAssetDesc, index: usize) -> AssetResult<Mesh> {
    let mesh_desc = &desc.meshes[index];
    let mut mesh = Mesh::new(mesh_desc.name.clone());

    for primitive in &mesh_desc.primitives {
        let mut attributes = Vec::with_capacity(primitive.attributes.len());
        for (semantic, accessor_index) in &primitive.attributes {
            match VertexAttribute::from_gltf_name(semantic) {
                Some(attribute) => attributes.push((attribute, accessor(&desc.accessors[*accessor_index]))),
                None => log::debug!("Skipping unsupported attribute {} in mesh {}", semantic, mesh_desc.name),
            }
        }
        let indices = accessor(&desc.accessors[primitive.indices]);
        let built = MeshPrimitive::new(attributes, indices, primitive.mode)?;
        mesh.push(built, primitive.material.map(MaterialId));
    }
    Ok(mesh)
}
