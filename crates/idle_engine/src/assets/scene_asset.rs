//! Scene-asset descriptors
//!
//! A parsed, format-neutral description of an importable asset: node tree,
//! meshes with their accessor tables, raw buffer views, textures and materials.
//! Field names follow glTF 2.0 so a glTF front end maps onto them one to one.
//! Descriptors are plain serde data and can be stored as RON or TOML through
//! [`Config`](crate::config::Config).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::animation::KeyFrame;
use crate::config::Config;
use crate::foundation::math::{Mat4, Quat, Transform, Vec3};
use crate::render::device::{BufferTarget, ComponentType, DrawMode, Sampler};

/// Extensions the provisioner understands
pub const SUPPORTED_EXTENSIONS: &[&str] = &[SPECULAR_GLOSSINESS_EXTENSION];

/// Specular-glossiness material extension
pub const SPECULAR_GLOSSINESS_EXTENSION: &str = "KHR_materials_pbrSpecularGlossiness";

/// Whole importable asset
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneAssetDesc {
    /// Extensions a loader must support to use this asset
    pub extensions_required: Vec<String>,
    /// Raw buffer data
    pub buffer_views: Vec<BufferViewDesc>,
    /// Typed views into buffer data
    pub accessors: Vec<AccessorDesc>,
    /// Texture sources and samplers
    pub textures: Vec<TextureDesc>,
    /// Materials
    pub materials: Vec<MaterialDesc>,
    /// Meshes
    pub meshes: Vec<MeshDesc>,
    /// Every node, referenced by index
    pub nodes: Vec<NodeDesc>,
    /// Top-level node indices of the default scene
    pub scene: Vec<usize>,
}

impl Config for SceneAssetDesc {}

/// Bytes destined for one GPU buffer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BufferViewDesc {
    /// Vertex or index data
    pub target: BufferTarget,
    /// Raw little-endian bytes
    pub data: Vec<u8>,
}

/// Element shape of an accessor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AccessorType {
    /// One component
    Scalar,
    /// Two components
    Vec2,
    /// Three components
    Vec3,
    /// Four components
    Vec4,
}

impl AccessorType {
    /// Components per element
    pub fn components(self) -> u8 {
        match self {
            Self::Scalar => 1,
            Self::Vec2 => 2,
            Self::Vec3 => 3,
            Self::Vec4 => 4,
        }
    }
}

/// Typed window into a buffer view
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AccessorDesc {
    /// Buffer view index
    pub buffer_view: usize,
    /// Numeric type of each component
    pub component_type: ComponentType,
    /// Element shape
    #[serde(rename = "type")]
    pub kind: AccessorType,
    /// Element count
    pub count: u32,
    /// Byte offset into the view
    #[serde(default)]
    pub byte_offset: u32,
    /// Byte stride, 0 when tightly packed
    #[serde(default)]
    pub byte_stride: u32,
    /// Normalize integer data
    #[serde(default)]
    pub normalized: bool,
}

/// Texture source plus sampling state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextureDesc {
    /// Image location, resolved by whoever completes the loader
    pub uri: String,
    /// Filter and wrap parameters
    #[serde(default)]
    pub sampler: Sampler,
}

/// Reference to a texture
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TextureInfo {
    /// Texture index
    pub index: usize,
}

/// Normal map reference
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalTextureInfo {
    /// Texture index
    pub index: usize,
    /// Scale applied to sampled normals
    #[serde(default)]
    pub scale: Option<f32>,
}

/// Occlusion map reference
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OcclusionTextureInfo {
    /// Texture index
    pub index: usize,
    /// Occlusion strength
    #[serde(default)]
    pub strength: Option<f32>,
}

/// `KHR_materials_pbrSpecularGlossiness` block
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpecularGlossinessDesc {
    /// RGBA diffuse multiplier
    pub diffuse_factor: Option<[f32; 4]>,
    /// RGB specular reflectance
    pub specular_factor: Option<[f32; 3]>,
    /// Glossiness multiplier
    pub glossiness_factor: Option<f32>,
    /// Diffuse map
    pub diffuse_texture: Option<TextureInfo>,
    /// Specular RGB + glossiness A map
    pub specular_glossiness_texture: Option<TextureInfo>,
}

/// Material extensions
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaterialExtensions {
    /// Specular-glossiness workflow parameters
    #[serde(rename = "KHR_materials_pbrSpecularGlossiness")]
    pub specular_glossiness: Option<SpecularGlossinessDesc>,
}

/// Material parameters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaterialDesc {
    /// Material name
    pub name: String,
    /// Normal map
    pub normal_texture: Option<NormalTextureInfo>,
    /// Occlusion map
    pub occlusion_texture: Option<OcclusionTextureInfo>,
    /// Emissive map
    pub emissive_texture: Option<TextureInfo>,
    /// RGB emitted light
    pub emissive_factor: [f32; 3],
    /// Extension blocks
    pub extensions: MaterialExtensions,
}

/// One primitive of a mesh
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrimitiveDesc {
    /// glTF attribute semantic (`POSITION`, `TEXCOORD_0`, ...) to accessor index
    pub attributes: BTreeMap<String, usize>,
    /// Index accessor
    pub indices: usize,
    /// Material index
    #[serde(default)]
    pub material: Option<usize>,
    /// Topology
    #[serde(default)]
    pub mode: DrawMode,
}

impl PrimitiveDesc {
    /// Whether the primitive carries per-vertex color
    pub fn has_vertex_color(&self) -> bool {
        self.attributes.contains_key("COLOR_0")
    }
}

/// Mesh made of primitives
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeshDesc {
    /// Mesh name
    pub name: String,
    /// Primitives in draw order
    pub primitives: Vec<PrimitiveDesc>,
}

/// One node of the asset tree
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeDesc {
    /// Name, unique among siblings
    pub name: String,
    /// Mesh index; nodes with a mesh become models
    pub mesh: Option<usize>,
    /// Column-major local matrix; overrides TRS when present
    pub matrix: Option<[f32; 16]>,
    /// Local translation
    pub translation: Option<[f32; 3]>,
    /// Local rotation quaternion as `[x, y, z, w]`
    pub rotation: Option<[f32; 4]>,
    /// Local scale
    pub scale: Option<[f32; 3]>,
    /// Child node indices
    pub children: Vec<usize>,
    /// Keyframes looping on this node
    pub animation: Option<Vec<KeyFrame>>,
}

impl NodeDesc {
    /// Local matrix: the explicit matrix if given, otherwise `T · R · S` with
    /// missing parts defaulting to identity
    pub fn local_matrix(&self) -> Mat4 {
        if let Some(matrix) = self.matrix {
            return Mat4::from_column_slice(&matrix);
        }
        let translation = self.translation.map(Vec3::from).unwrap_or_else(Vec3::zeros);
        let rotation = self
            .rotation
            .map(|[x, y, z, w]| Quat::from_quaternion(nalgebra::Quaternion::new(w, x, y, z)))
            .unwrap_or_else(Quat::identity);
        let scale = self.scale.map(Vec3::from).unwrap_or_else(|| Vec3::new(1.0, 1.0, 1.0));
        Transform::new(scale, rotation, translation).to_matrix()
    }
}
