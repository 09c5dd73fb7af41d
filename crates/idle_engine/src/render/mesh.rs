//! Meshes, primitives and the buffer views they read from
//!
//! Buffer views are owned by the enclosing asset and shared read-only by every
//! primitive that references them; a primitive only stores accessor
//! descriptions (view index, layout, count). Drawing needs the asset's view
//! table passed in alongside.

use bytemuck::Pod;

use crate::foundation::math::{Mat4, Mat4Ext};

use super::context::FrameContext;
use super::device::{
    AttributeSlot, BufferHandle, BufferTarget, ComponentType, DrawMode, GraphicsDevice, ProgramInfo,
    UniformValue, VertexLayout,
};
use super::material::{Material, MaterialId};
use super::texture::Texture;
use super::{RenderError, RenderResult};

/// Raw bytes destined for one GPU buffer
#[derive(Debug, Clone)]
pub struct BufferView {
    target: BufferTarget,
    data: Vec<u8>,
    handle: Option<BufferHandle>,
}

impl BufferView {
    /// Wrap raw bytes
    pub fn new(target: BufferTarget, data: Vec<u8>) -> Self {
        Self { target, data, handle: None }
    }

    /// Copy a typed slice (vertices, indices) into a view
    pub fn from_pod<T: Pod>(target: BufferTarget, items: &[T]) -> Self {
        Self::new(target, bytemuck::cast_slice(items).to_vec())
    }

    /// Create the GPU buffer; later calls return the existing handle
    pub fn upload(&mut self, device: &mut dyn GraphicsDevice) -> RenderResult<BufferHandle> {
        if let Some(handle) = self.handle {
            return Ok(handle);
        }
        let handle = device.create_buffer(self.target, &self.data)?;
        log::trace!("Uploaded {} byte {:?} buffer as {:?}", self.data.len(), self.target, handle);
        self.handle = Some(handle);
        Ok(handle)
    }

    /// Bind if uploaded; returns whether anything was bound
    pub fn bind(&self, device: &mut dyn GraphicsDevice) -> bool {
        match self.handle {
            Some(handle) => {
                device.bind_buffer(self.target, handle);
                true
            }
            None => false,
        }
    }

    /// Buffer target
    pub fn target(&self) -> BufferTarget {
        self.target
    }

    /// GPU handle once uploaded
    pub fn handle(&self) -> Option<BufferHandle> {
        self.handle
    }

    /// Size in bytes
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the view holds no bytes
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Typed window into a buffer view
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Accessor {
    /// Index into the owning asset's buffer views
    pub buffer_view: usize,
    /// Component numeric type
    pub component_type: ComponentType,
    /// Components per element (1 to 4)
    pub components: u8,
    /// Normalize integer data
    pub normalized: bool,
    /// Byte stride, 0 when tightly packed
    pub stride: u32,
    /// Byte offset into the view
    pub offset: u32,
    /// Number of elements
    pub count: u32,
}

impl Accessor {
    /// Layout for `vertex_attribute_pointer`
    pub fn layout(&self) -> VertexLayout {
        VertexLayout {
            components: self.components,
            component_type: self.component_type,
            normalized: self.normalized,
            stride: self.stride,
            offset: self.offset,
        }
    }
}

/// Per-vertex inputs a primitive can carry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VertexAttribute {
    /// Object-space position
    Position,
    /// Object-space normal
    Normal,
    /// Tangent with handedness in w
    Tangent,
    /// Per-vertex base color
    Color,
    /// Texture coordinate set
    TexCoord(u8),
}

impl VertexAttribute {
    /// Vertex input name used by the shader sources
    pub fn shader_name(self) -> String {
        match self {
            Self::Position => "aVertexPosition".to_string(),
            Self::Normal => "aVertexNormal".to_string(),
            Self::Tangent => "aTangent".to_string(),
            Self::Color => "aBaseColor".to_string(),
            Self::TexCoord(set) => format!("aTextureCoord{set}"),
        }
    }

    /// Map a glTF attribute semantic such as `TEXCOORD_0`
    pub fn from_gltf_name(name: &str) -> Option<Self> {
        match name {
            "POSITION" => Some(Self::Position),
            "NORMAL" => Some(Self::Normal),
            "TANGENT" => Some(Self::Tangent),
            "COLOR_0" => Some(Self::Color),
            _ => name.strip_prefix("TEXCOORD_")?.parse().ok().map(Self::TexCoord),
        }
    }
}

/// One draw call's worth of geometry
#[derive(Debug, Clone)]
pub struct MeshPrimitive {
    attributes: Vec<(VertexAttribute, Accessor)>,
    indices: Accessor,
    mode: DrawMode,
    /// Attribute slots enabled at initialization, with their accessor index
    bound: Vec<(AttributeSlot, usize)>,
    initialized: bool,
}

impl MeshPrimitive {
    /// Describe an indexed primitive
    pub fn new(attributes: Vec<(VertexAttribute, Accessor)>, indices: Accessor, mode: DrawMode) -> RenderResult<Self> {
        if !indices.component_type.is_index_type() {
            return Err(RenderError::InvalidResource(format!(
                "{:?} cannot be used for indices",
                indices.component_type
            )));
        }
        if !attributes.iter().any(|(attribute, _)| *attribute == VertexAttribute::Position) {
            return Err(RenderError::InvalidResource("primitive has no POSITION attribute".to_string()));
        }
        Ok(Self {
            attributes,
            indices,
            mode,
            bound: Vec::new(),
            initialized: false,
        })
    }

    /// Whether the primitive carries `attribute`
    pub fn has_attribute(&self, attribute: VertexAttribute) -> bool {
        self.attributes.iter().any(|(a, _)| *a == attribute)
    }

    /// Enable the slots for attributes this primitive has and the program reads.
    ///
    /// Attributes the program does not declare are left alone, as are program
    /// inputs this primitive lacks.
    pub fn initialize(&mut self, device: &mut dyn GraphicsDevice, program: &ProgramInfo) {
        self.bound.clear();
        for (index, (attribute, _)) in self.attributes.iter().enumerate() {
            if let Some(slot) = program.attribute(&attribute.shader_name()) {
                device.enable_vertex_attribute(slot);
                self.bound.push((slot, index));
            }
        }
        self.initialized = true;
    }

    /// Whether [`initialize`](Self::initialize) has run
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Bind vertex data, upload the model matrix and issue one indexed draw.
    ///
    /// Returns false without drawing if the primitive is not initialized or a
    /// buffer it reads has not been uploaded.
    pub fn render(
        &self,
        device: &mut dyn GraphicsDevice,
        program: &ProgramInfo,
        buffer_views: &[BufferView],
        world: &Mat4,
    ) -> bool {
        if !self.initialized {
            return false;
        }

        for (slot, index) in &self.bound {
            let accessor = &self.attributes[*index].1;
            let Some(view) = buffer_views.get(accessor.buffer_view) else {
                log::warn!("Accessor references missing buffer view {}", accessor.buffer_view);
                return false;
            };
            if !view.bind(device) {
                return false;
            }
            device.vertex_attribute_pointer(*slot, &accessor.layout());
        }

        program.set_uniform(device, "uModelMatrix", UniformValue::Mat4(world.to_cols_array()));

        let Some(index_view) = buffer_views.get(self.indices.buffer_view) else {
            log::warn!("Index accessor references missing buffer view {}", self.indices.buffer_view);
            return false;
        };
        if !index_view.bind(device) {
            return false;
        }
        device.draw_elements(self.mode, self.indices.count, self.indices.component_type, self.indices.offset);
        true
    }

    /// Draw mode
    pub fn mode(&self) -> DrawMode {
        self.mode
    }

    /// Index accessor
    pub fn indices(&self) -> &Accessor {
        &self.indices
    }
}

/// Ordered (primitive, material) pairs drawn with one world matrix
#[derive(Debug, Clone, Default)]
pub struct Mesh {
    name: String,
    entries: Vec<(MeshPrimitive, Option<MaterialId>)>,
}

impl Mesh {
    /// Empty mesh
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: Vec::new(),
        }
    }

    /// Append a primitive with the material it is drawn with
    pub fn push(&mut self, primitive: MeshPrimitive, material: Option<MaterialId>) {
        self.entries.push((primitive, material));
    }

    /// Mesh name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Pairs in draw order
    pub fn entries(&self) -> &[(MeshPrimitive, Option<MaterialId>)] {
        &self.entries
    }

    /// Whether every primitive with a usable material is initialized
    pub fn is_initialized(&self) -> bool {
        self.entries.iter().all(|(primitive, _)| primitive.is_initialized())
    }

    /// Initialize primitives whose material has linked.
    ///
    /// Safe to call every frame; already initialized primitives are skipped.
    /// Returns how many primitives were initialized by this call.
    pub fn initialize(&mut self, device: &mut dyn GraphicsDevice, materials: &[Material]) -> usize {
        let mut count = 0;
        for (primitive, material) in &mut self.entries {
            if primitive.is_initialized() {
                continue;
            }
            let Some(program) = material
                .and_then(|id| materials.get(id.0))
                .and_then(|material| material.shader().program())
            else {
                continue;
            };
            primitive.initialize(device, program);
            count += 1;
        }
        count
    }

    /// Draw every pair in order; returns the number of draw calls issued.
    ///
    /// Each pair binds its material, then the frame's environment map when the
    /// material reflects it, then the lights and camera, then draws. Pairs without a material, or whose material is not ready, are
    /// skipped.
    pub fn render(
        &self,
        device: &mut dyn GraphicsDevice,
        context: &FrameContext<'_>,
        materials: &[Material],
        textures: &[Texture],
        buffer_views: &[BufferView],
        world: &Mat4,
    ) -> usize {
        let mut draws = 0;
        for (primitive, material) in &self.entries {
            let Some(material) = material.and_then(|id| materials.get(id.0)) else {
                continue;
            };
            let Some(program) = material.render(device, textures) else {
                continue;
            };
            if material.shader().class().samples_environment() && !context.bind_environment(device) {
                log::trace!("No environment map for material {}", material.name());
            }
            context.apply(device, program);
            if primitive.render(device, program, buffer_views, world) {
                draws += 1;
            }
        }
        draws
    }
}
