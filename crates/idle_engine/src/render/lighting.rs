//! Lighting system
//!
//! Lights live in the per-frame context and are uploaded into the
//! `uLights[i]` struct array of whichever program a mesh is drawn with.

use serde::{Deserialize, Serialize};

use crate::foundation::math::Vec3;

use super::device::{GraphicsDevice, ProgramInfo, UniformValue};

/// Light types, numbered as the shaders' `type` field expects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LightKind {
    /// Directional light (like sunlight)
    #[default]
    Directional = 0,
    /// Point light (like a lightbulb)
    Point = 1,
    /// Spot light (like a flashlight)
    Spot = 2,
}

/// Uniform names for one `uLights[i]` element
#[derive(Debug, Clone, PartialEq, Eq)]
struct LightUniforms {
    kind: String,
    color: String,
    direction: String,
    position: String,
    linear: String,
    quadratic: String,
}

impl LightUniforms {
    fn for_index(index: usize) -> Self {
        let base = format!("uLights[{index}]");
        Self {
            kind: format!("{base}.type"),
            color: format!("{base}.color"),
            direction: format!("{base}.direction"),
            position: format!("{base}.position"),
            linear: format!("{base}.linear"),
            quadratic: format!("{base}.quadratic"),
        }
    }
}

/// Light source
#[derive(Debug, Clone, PartialEq)]
pub struct Light {
    /// Light type
    pub kind: LightKind,
    /// Light color; values above 1 brighten
    pub color: Vec3,
    /// Light position (for point/spot lights)
    pub position: Vec3,
    /// Light direction (for directional/spot lights)
    pub direction: Vec3,
    /// Linear falloff coefficient
    pub linear: f32,
    /// Quadratic falloff coefficient
    pub quadratic: f32,
    uniforms: Option<LightUniforms>,
}

impl Default for Light {
    fn default() -> Self {
        Self::new(LightKind::Directional)
    }
}

impl Light {
    /// Light of `kind` with default color and falloff
    pub fn new(kind: LightKind) -> Self {
        Self {
            kind,
            color: Vec3::new(2.0, 2.0, 2.0),
            position: Vec3::zeros(),
            direction: Vec3::new(0.0, 0.0, -1.0),
            linear: 0.045,
            quadratic: 0.0075,
            uniforms: None,
        }
    }

    /// Create a directional light
    pub fn directional(direction: Vec3) -> Self {
        Self {
            direction: direction.try_normalize(f32::EPSILON).unwrap_or_else(|| Vec3::new(0.0, 0.0, -1.0)),
            ..Self::new(LightKind::Directional)
        }
    }

    /// Create a point light
    pub fn point(position: Vec3) -> Self {
        Self {
            position,
            ..Self::new(LightKind::Point)
        }
    }

    /// Set the color
    pub fn with_color(mut self, color: Vec3) -> Self {
        self.color = color;
        self
    }

    /// Set falloff coefficients
    pub fn with_falloff(mut self, linear: f32, quadratic: f32) -> Self {
        self.linear = linear;
        self.quadratic = quadratic;
        self
    }

    /// Bind this light to element `index` of the `uLights` array
    pub fn initialize(&mut self, index: usize) {
        self.uniforms = Some(LightUniforms::for_index(index));
    }

    /// Whether [`initialize`](Self::initialize) has run
    pub fn is_initialized(&self) -> bool {
        self.uniforms.is_some()
    }

    /// Upload into the current program; no-op before initialization.
    ///
    /// Type and color always go up. Point and spot lights add position and
    /// falloff, directional and spot lights add direction.
    pub fn render(&self, device: &mut dyn GraphicsDevice, program: &ProgramInfo) {
        let Some(names) = &self.uniforms else {
            return;
        };

        program.set_uniform(device, &names.kind, UniformValue::Int(self.kind as i32));
        program.set_uniform(device, &names.color, UniformValue::Vec3(self.color.into()));

        if matches!(self.kind, LightKind::Point | LightKind::Spot) {
            program.set_uniform(device, &names.position, UniformValue::Vec3(self.position.into()));
            program.set_uniform(device, &names.linear, UniformValue::Float(self.linear));
            program.set_uniform(device, &names.quadratic, UniformValue::Float(self.quadratic));
        }
        if matches!(self.kind, LightKind::Directional | LightKind::Spot) {
            program.set_uniform(device, &names.direction, UniformValue::Vec3(self.direction.into()));
        }
    }
}
