//! Cube-mapped background drawn after the scene

use super::camera::Camera;
use super::device::{AttributeSlot, BufferTarget, ComponentType, DrawMode, GraphicsDevice, VertexLayout};
use super::mesh::BufferView;
use super::shader::{Shader, ShaderClass, ShaderState};
use super::texture::Texture;
use super::{RenderError, RenderResult};

const VERTEX_COUNT: u32 = 36;

#[rustfmt::skip]
const CUBE_POSITIONS: [f32; 108] = [
    // -Z
    -1.0,  1.0, -1.0,  -1.0, -1.0, -1.0,   1.0, -1.0, -1.0,
     1.0, -1.0, -1.0,   1.0,  1.0, -1.0,  -1.0,  1.0, -1.0,
    // -X
    -1.0, -1.0,  1.0,  -1.0, -1.0, -1.0,  -1.0,  1.0, -1.0,
    -1.0,  1.0, -1.0,  -1.0,  1.0,  1.0,  -1.0, -1.0,  1.0,
    // +X
     1.0, -1.0, -1.0,   1.0, -1.0,  1.0,   1.0,  1.0,  1.0,
     1.0,  1.0,  1.0,   1.0,  1.0, -1.0,   1.0, -1.0, -1.0,
    // +Z
    -1.0, -1.0,  1.0,  -1.0,  1.0,  1.0,   1.0,  1.0,  1.0,
     1.0,  1.0,  1.0,   1.0, -1.0,  1.0,  -1.0, -1.0,  1.0,
    // +Y
    -1.0,  1.0, -1.0,   1.0,  1.0, -1.0,   1.0,  1.0,  1.0,
     1.0,  1.0,  1.0,  -1.0,  1.0,  1.0,  -1.0,  1.0, -1.0,
    // -Y
    -1.0, -1.0, -1.0,  -1.0, -1.0,  1.0,   1.0, -1.0, -1.0,
     1.0, -1.0, -1.0,  -1.0, -1.0,  1.0,   1.0, -1.0,  1.0,
];

/// Environment cube rendered behind everything else
#[derive(Debug)]
pub struct Skybox {
    shader: Shader,
    texture: Texture,
    vertices: BufferView,
    position_slot: Option<AttributeSlot>,
}

impl Skybox {
    /// Build from a cube-map shader instance and a six-face texture
    pub fn new(shader: Shader, texture: Texture) -> RenderResult<Self> {
        if shader.class() != ShaderClass::CubeMap {
            return Err(RenderError::InvalidResource(format!(
                "skybox needs a CubeMap shader, got {:?}",
                shader.class()
            )));
        }
        Ok(Self {
            shader,
            texture,
            vertices: BufferView::from_pod(BufferTarget::Vertex, &CUBE_POSITIONS),
            position_slot: None,
        })
    }

    /// Link the shader and upload the cube vertices
    pub fn initialize(&mut self, device: &mut dyn GraphicsDevice) -> RenderResult<()> {
        self.shader.initialize(device)?;
        self.vertices.upload(device)?;
        self.position_slot = self.shader.program().and_then(|program| program.attribute("aVertexPosition"));
        if let Some(slot) = self.position_slot {
            device.enable_vertex_attribute(slot);
        }
        Ok(())
    }

    /// Per-frame readiness pass: link and upload the cube if that has not
    /// happened yet, then upload the texture once its faces have arrived.
    ///
    /// Returns whether anything became ready. A failed link is not retried.
    pub fn prepare(&mut self, device: &mut dyn GraphicsDevice) -> RenderResult<bool> {
        let mut ready = false;
        if matches!(self.shader.state(), ShaderState::Pending) {
            self.initialize(device)?;
            ready = true;
        }
        Ok(self.texture.prepare(device)? || ready)
    }

    /// Draw with depth writes off; returns whether a draw was issued
    pub fn render(&self, device: &mut dyn GraphicsDevice, camera: &Camera) -> bool {
        if !self.texture.is_ready() {
            return false;
        }
        let Some(slot) = self.position_slot else {
            return false;
        };
        let Some(program) = self.shader.activate(device) else {
            return false;
        };

        device.set_depth_mask(false);
        self.texture.bind(device, 0);
        camera.render(device, program);
        self.vertices.bind(device);
        device.vertex_attribute_pointer(
            slot,
            &VertexLayout {
                components: 3,
                component_type: ComponentType::Float,
                normalized: false,
                stride: 0,
                offset: 0,
            },
        );
        device.draw_arrays(DrawMode::Triangles, 0, VERTEX_COUNT);
        device.set_depth_mask(true);
        true
    }

    /// Six-face environment texture
    pub fn texture(&self) -> &Texture {
        &self.texture
    }

    /// Whether the cube texture is resident
    pub fn is_ready(&self) -> bool {
        self.texture.is_ready() && self.shader.is_linked()
    }
}
