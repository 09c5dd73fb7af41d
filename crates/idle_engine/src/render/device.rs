//! Graphics device abstraction
//!
//! This module defines the narrow command surface the scene graph, materials
//! and meshes drive. Backends implement [`GraphicsDevice`]; nothing above this
//! trait knows which API executes the commands.

use std::collections::HashMap;

use image::RgbaImage;
use serde::{Deserialize, Serialize};

use super::RenderResult;

/// Handle to a GPU buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferHandle(pub u32);

/// Handle to a GPU texture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureHandle(pub u32);

/// Handle to a linked shader program
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProgramHandle(pub u32);

/// Vertex attribute binding slot reported by program reflection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AttributeSlot(pub u32);

/// Uniform binding slot reported by program reflection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UniformSlot(pub u32);

/// What a buffer holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BufferTarget {
    /// Vertex attribute data
    Vertex,
    /// Index data
    Index,
}

impl BufferTarget {
    /// Map a GL buffer target enum (`ARRAY_BUFFER` / `ELEMENT_ARRAY_BUFFER`)
    pub fn from_gl(value: u32) -> Option<Self> {
        match value {
            0x8892 => Some(Self::Vertex),
            0x8893 => Some(Self::Index),
            _ => None,
        }
    }
}

/// Primitive topology
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DrawMode {
    /// Individual points
    Points,
    /// Line pairs
    Lines,
    /// Closed line loop
    LineLoop,
    /// Connected line strip
    LineStrip,
    /// Independent triangles
    #[default]
    Triangles,
    /// Triangle strip
    TriangleStrip,
    /// Triangle fan
    TriangleFan,
}

impl DrawMode {
    /// Map a glTF/GL primitive mode (0 through 6)
    pub fn from_gl(mode: u32) -> Option<Self> {
        Some(match mode {
            0 => Self::Points,
            1 => Self::Lines,
            2 => Self::LineLoop,
            3 => Self::LineStrip,
            4 => Self::Triangles,
            5 => Self::TriangleStrip,
            6 => Self::TriangleFan,
            _ => return None,
        })
    }
}

/// Numeric type of one vertex or index component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComponentType {
    /// `i8`
    Byte,
    /// `u8`
    UnsignedByte,
    /// `i16`
    Short,
    /// `u16`
    UnsignedShort,
    /// `u32`
    UnsignedInt,
    /// `f32`
    Float,
}

impl ComponentType {
    /// Map a GL component type enum
    pub fn from_gl(value: u32) -> Option<Self> {
        Some(match value {
            0x1400 => Self::Byte,
            0x1401 => Self::UnsignedByte,
            0x1402 => Self::Short,
            0x1403 => Self::UnsignedShort,
            0x1405 => Self::UnsignedInt,
            0x1406 => Self::Float,
            _ => return None,
        })
    }

    /// Size of one component in bytes
    pub fn size_bytes(self) -> u32 {
        match self {
            Self::Byte | Self::UnsignedByte => 1,
            Self::Short | Self::UnsignedShort => 2,
            Self::UnsignedInt | Self::Float => 4,
        }
    }

    /// Whether this type may be used for index data
    pub fn is_index_type(self) -> bool {
        matches!(self, Self::UnsignedByte | Self::UnsignedShort | Self::UnsignedInt)
    }
}

/// How one vertex attribute is laid out in its buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexLayout {
    /// Components per vertex (1 to 4)
    pub components: u8,
    /// Numeric type of each component
    pub component_type: ComponentType,
    /// Map integer data into [0, 1] or [-1, 1]
    pub normalized: bool,
    /// Bytes between consecutive vertices; 0 means tightly packed
    pub stride: u32,
    /// Byte offset of the first component
    pub offset: u32,
}

/// Value uploaded to a uniform slot
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    /// `int` or sampler unit
    Int(i32),
    /// `float`
    Float(f32),
    /// `vec3`
    Vec3([f32; 3]),
    /// `vec4`
    Vec4([f32; 4]),
    /// `mat4`, column-major
    Mat4([f32; 16]),
}

/// Texture dimensionality
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TextureKind {
    /// Single 2D image
    Texture2D,
    /// Six faces in +X, -X, +Y, -Y, +Z, -Z order
    CubeMap,
}

impl TextureKind {
    /// Images expected by an upload
    pub fn face_count(self) -> usize {
        match self {
            Self::Texture2D => 1,
            Self::CubeMap => 6,
        }
    }
}

/// Texture filtering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FilterMode {
    /// Nearest texel
    Nearest,
    /// Bilinear
    Linear,
    /// Nearest texel, nearest mip
    NearestMipmapNearest,
    /// Bilinear, nearest mip
    LinearMipmapNearest,
    /// Nearest texel, blended mips
    NearestMipmapLinear,
    /// Trilinear
    LinearMipmapLinear,
}

impl FilterMode {
    /// Map a GL filter enum
    pub fn from_gl(value: u32) -> Option<Self> {
        Some(match value {
            0x2600 => Self::Nearest,
            0x2601 => Self::Linear,
            0x2700 => Self::NearestMipmapNearest,
            0x2701 => Self::LinearMipmapNearest,
            0x2702 => Self::NearestMipmapLinear,
            0x2703 => Self::LinearMipmapLinear,
            _ => return None,
        })
    }

    /// Whether sampling reads mip levels
    pub fn uses_mipmaps(self) -> bool {
        !matches!(self, Self::Nearest | Self::Linear)
    }

    /// Same filter without mip sampling
    pub fn without_mipmaps(self) -> Self {
        match self {
            Self::Nearest | Self::NearestMipmapNearest | Self::NearestMipmapLinear => Self::Nearest,
            Self::Linear | Self::LinearMipmapNearest | Self::LinearMipmapLinear => Self::Linear,
        }
    }
}

/// Texture coordinate wrapping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WrapMode {
    /// Tile
    Repeat,
    /// Clamp to the border texel
    ClampToEdge,
    /// Tile with every other copy mirrored
    MirroredRepeat,
}

impl WrapMode {
    /// Map a GL wrap enum
    pub fn from_gl(value: u32) -> Option<Self> {
        Some(match value {
            0x2901 => Self::Repeat,
            0x812F => Self::ClampToEdge,
            0x8370 => Self::MirroredRepeat,
            _ => return None,
        })
    }
}

/// Sampler state for one texture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Sampler {
    /// Magnification filter
    pub mag_filter: FilterMode,
    /// Minification filter
    pub min_filter: FilterMode,
    /// Horizontal wrap
    pub wrap_s: WrapMode,
    /// Vertical wrap
    pub wrap_t: WrapMode,
}

impl Default for Sampler {
    fn default() -> Self {
        Self {
            mag_filter: FilterMode::Linear,
            min_filter: FilterMode::LinearMipmapLinear,
            wrap_s: WrapMode::Repeat,
            wrap_t: WrapMode::Repeat,
        }
    }
}

/// Reflection data for a linked program.
///
/// Queried once at link time; per-frame code only reads these maps.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgramInfo {
    /// Program handle
    pub program: ProgramHandle,
    /// Vertex input name to slot
    pub attributes: HashMap<String, AttributeSlot>,
    /// Uniform name to slot
    pub uniforms: HashMap<String, UniformSlot>,
}

impl ProgramInfo {
    /// Slot of a vertex input
    pub fn attribute(&self, name: &str) -> Option<AttributeSlot> {
        self.attributes.get(name).copied()
    }

    /// Slot of a uniform
    pub fn uniform(&self, name: &str) -> Option<UniformSlot> {
        self.uniforms.get(name).copied()
    }

    /// Upload `value` if the program declares `name`; returns whether it did
    pub fn set_uniform(&self, device: &mut dyn GraphicsDevice, name: &str, value: UniformValue) -> bool {
        match self.uniform(name) {
            Some(slot) => {
                device.set_uniform(slot, value);
                true
            }
            None => false,
        }
    }
}

/// Command surface the renderer drives
pub trait GraphicsDevice {
    /// Create a buffer and upload `data` into it
    fn create_buffer(&mut self, target: BufferTarget, data: &[u8]) -> RenderResult<BufferHandle>;

    /// Bind a buffer for subsequent layout or draw commands
    fn bind_buffer(&mut self, target: BufferTarget, buffer: BufferHandle);

    /// Compile and link two sources, returning reflection data or a link error
    fn link_program(&mut self, vertex_source: &str, fragment_source: &str) -> RenderResult<ProgramInfo>;

    /// Make a program current
    fn use_program(&mut self, program: ProgramHandle);

    /// Enable a vertex attribute array
    fn enable_vertex_attribute(&mut self, slot: AttributeSlot);

    /// Describe the bound vertex buffer's layout for a slot
    fn vertex_attribute_pointer(&mut self, slot: AttributeSlot, layout: &VertexLayout);

    /// Upload a uniform on the current program
    fn set_uniform(&mut self, slot: UniformSlot, value: UniformValue);

    /// Allocate a texture object
    fn create_texture(&mut self, kind: TextureKind) -> RenderResult<TextureHandle>;

    /// Upload one image; `face` is 0 for 2D textures and 0..6 for cube maps
    fn upload_texture_image(&mut self, texture: TextureHandle, face: usize, image: &RgbaImage) -> RenderResult<()>;

    /// Release a texture object
    fn delete_texture(&mut self, texture: TextureHandle);

    /// Generate the mip chain
    fn generate_mipmaps(&mut self, texture: TextureHandle);

    /// Apply filter and wrap parameters
    fn set_sampler(&mut self, texture: TextureHandle, sampler: &Sampler);

    /// Bind a texture to a numbered texture unit
    fn bind_texture(&mut self, unit: u32, texture: TextureHandle);

    /// Toggle depth writes
    fn set_depth_mask(&mut self, enabled: bool);

    /// Indexed draw from the bound index buffer
    fn draw_elements(&mut self, mode: DrawMode, count: u32, index_type: ComponentType, offset: u32);

    /// Non-indexed draw
    fn draw_arrays(&mut self, mode: DrawMode, first: u32, count: u32);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gl_enum_mapping() {
        assert_eq!(DrawMode::from_gl(4), Some(DrawMode::Triangles));
        assert_eq!(DrawMode::from_gl(7), None);
        assert_eq!(ComponentType::from_gl(0x1403), Some(ComponentType::UnsignedShort));
        assert_eq!(BufferTarget::from_gl(0x8893), Some(BufferTarget::Index));
        assert_eq!(WrapMode::from_gl(0x812F), Some(WrapMode::ClampToEdge));
        assert_eq!(FilterMode::from_gl(0x2703), Some(FilterMode::LinearMipmapLinear));
    }

    #[test]
    fn test_filter_without_mipmaps() {
        assert!(FilterMode::LinearMipmapNearest.uses_mipmaps());
        assert_eq!(FilterMode::LinearMipmapNearest.without_mipmaps(), FilterMode::Linear);
        assert_eq!(FilterMode::NearestMipmapLinear.without_mipmaps(), FilterMode::Nearest);
        assert!(!FilterMode::Linear.uses_mipmaps());
    }

    #[test]
    fn test_index_types() {
        assert!(ComponentType::UnsignedShort.is_index_type());
        assert!(!ComponentType::Float.is_index_type());
        assert_eq!(ComponentType::UnsignedInt.size_bytes(), 4);
    }
}
