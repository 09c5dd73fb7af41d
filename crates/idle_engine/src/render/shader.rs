//! Shader programs and their link lifecycle
//!
//! A [`Shader`] starts out [`ShaderState::Pending`], collecting preprocessor
//! defines. [`Shader::initialize`] links it exactly once: on success the
//! attribute and uniform maps are cached for the lifetime of the instance, on
//! failure the instance is marked failed and never draws. Defines are rejected
//! once linking has been attempted; materials that need different defines get
//! their own instance.

use serde::{Deserialize, Serialize};

use super::device::{GraphicsDevice, ProgramInfo, UniformValue};
use super::{RenderError, RenderResult};

/// Built-in shader programs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ShaderClass {
    /// Specular-glossiness physically based shading
    #[default]
    Pbr,
    /// Blinn-Phong shading
    Phong,
    /// Unlit vertex colors
    Basic,
    /// Environment reflection
    Mirror,
    /// Skybox sampling a cube map
    CubeMap,
}

impl ShaderClass {
    /// Every class, in a stable order
    pub const ALL: [Self; 5] = [Self::Pbr, Self::Phong, Self::Basic, Self::Mirror, Self::CubeMap];

    /// Base file name of the class's sources
    pub fn file_stem(self) -> &'static str {
        match self {
            Self::Pbr => "pbr",
            Self::Phong => "phong",
            Self::Basic => "basic",
            Self::Mirror => "mirror",
            Self::CubeMap => "cubemap",
        }
    }

    /// Whether draws with this class sample the frame's environment cube map
    /// on unit 0
    pub fn samples_environment(self) -> bool {
        matches!(self, Self::Mirror)
    }

    /// Vertex source file name
    pub fn vertex_file(self) -> String {
        format!("{}.vert", self.file_stem())
    }

    /// Fragment source file name
    pub fn fragment_file(self) -> String {
        format!("{}.frag", self.file_stem())
    }

    /// Sampler uniforms pinned to fixed texture units on activation.
    ///
    /// Units must match [`TextureSlot::unit`](super::material::TextureSlot::unit)
    /// for the material-driven classes.
    pub fn sampler_units(self) -> &'static [(&'static str, i32)] {
        match self {
            Self::Pbr => &[
                ("uDiffuseMap", 0),
                ("uNormalMap", 1),
                ("uSpecularGlossinessMap", 2),
                ("uEmissiveMap", 3),
                ("uOcclusionMap", 4),
            ],
            Self::Phong => &[("uDiffuseMap", 0), ("uNormalMap", 1)],
            Self::CubeMap | Self::Mirror => &[("uCubeMap", 0)],
            Self::Basic => &[],
        }
    }
}

/// Link lifecycle
#[derive(Debug, Clone, PartialEq)]
pub enum ShaderState {
    /// Not linked yet; defines may still be added
    Pending,
    /// Linked with cached reflection maps
    Linked(ProgramInfo),
    /// Link failed; the message is kept for diagnostics
    Failed(String),
}

/// One shader program instance
#[derive(Debug, Clone)]
pub struct Shader {
    class: ShaderClass,
    vertex_source: String,
    fragment_source: String,
    defines: Vec<String>,
    state: ShaderState,
}

impl Shader {
    /// Wrap a pair of (include-expanded) sources
    pub fn new(class: ShaderClass, vertex_source: impl Into<String>, fragment_source: impl Into<String>) -> Self {
        Self {
            class,
            vertex_source: vertex_source.into(),
            fragment_source: fragment_source.into(),
            defines: Vec::new(),
            state: ShaderState::Pending,
        }
    }

    /// Add `#define name` right after the `#version` line of both sources.
    ///
    /// Repeating a define is a no-op. Fails once a link has been attempted.
    pub fn define(&mut self, name: &str) -> RenderResult<()> {
        if !matches!(self.state, ShaderState::Pending) {
            return Err(RenderError::ShaderAlreadyLinked { define: name.to_string() });
        }
        if self.has_define(name) {
            return Ok(());
        }
        self.vertex_source = insert_define(&self.vertex_source, name);
        self.fragment_source = insert_define(&self.fragment_source, name);
        self.defines.push(name.to_string());
        Ok(())
    }

    /// Whether `name` has been defined
    pub fn has_define(&self, name: &str) -> bool {
        self.defines.iter().any(|d| d == name)
    }

    /// Defines in the order they were added
    pub fn defines(&self) -> &[String] {
        &self.defines
    }

    /// Link the program and cache its reflection maps.
    ///
    /// Linking happens at most once. A failure is logged at error level,
    /// remembered, and returned again on every later call.
    pub fn initialize(&mut self, device: &mut dyn GraphicsDevice) -> RenderResult<()> {
        match &self.state {
            ShaderState::Linked(_) => Ok(()),
            ShaderState::Failed(message) => Err(RenderError::ShaderLink(message.clone())),
            ShaderState::Pending => match device.link_program(&self.vertex_source, &self.fragment_source) {
                Ok(info) => {
                    log::debug!(
                        "Linked {:?} shader with {} attributes, {} uniforms, defines {:?}",
                        self.class,
                        info.attributes.len(),
                        info.uniforms.len(),
                        self.defines
                    );
                    self.state = ShaderState::Linked(info);
                    Ok(())
                }
                Err(err) => {
                    let message = match &err {
                        RenderError::ShaderLink(message) => message.clone(),
                        other => other.to_string(),
                    };
                    log::error!("Unable to initialize the {:?} shader program: {}", self.class, message);
                    self.state = ShaderState::Failed(message.clone());
                    Err(RenderError::ShaderLink(message))
                }
            },
        }
    }

    /// Make the program current and pin its sampler uniforms.
    ///
    /// Returns `None` until the shader has linked.
    pub fn activate(&self, device: &mut dyn GraphicsDevice) -> Option<&ProgramInfo> {
        let info = self.program()?;
        device.use_program(info.program);
        for (uniform, unit) in self.class.sampler_units() {
            info.set_uniform(device, uniform, UniformValue::Int(*unit));
        }
        Some(info)
    }

    /// Reflection maps, once linked
    pub fn program(&self) -> Option<&ProgramInfo> {
        match &self.state {
            ShaderState::Linked(info) => Some(info),
            _ => None,
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> &ShaderState {
        &self.state
    }

    /// Whether linking succeeded
    pub fn is_linked(&self) -> bool {
        matches!(self.state, ShaderState::Linked(_))
    }

    /// Whether linking failed
    pub fn is_failed(&self) -> bool {
        matches!(self.state, ShaderState::Failed(_))
    }

    /// Program class
    pub fn class(&self) -> ShaderClass {
        self.class
    }

    /// Vertex source with defines applied
    pub fn vertex_source(&self) -> &str {
        &self.vertex_source
    }

    /// Fragment source with defines applied
    pub fn fragment_source(&self) -> &str {
        &self.fragment_source
    }
}

fn insert_define(source: &str, name: &str) -> String {
    match source.split_once('\n') {
        Some((version, body)) if version.trim_start().starts_with("#version") => {
            format!("{version}\n#define {name}\n{body}")
        }
        _ => format!("#define {name}\n{source}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::device::ProgramHandle;
    use crate::render::headless::{DeviceCommand, HeadlessDevice};

    const VERTEX: &str = "#version 300 es\nin vec3 aVertexPosition;\n#ifdef HAS_NORMAL_MAP\nin vec4 aTangent;\n#endif\nvoid main() {}\n";
    const FRAGMENT: &str = "#version 300 es\nprecision highp float;\nuniform sampler2D uDiffuseMap;\nuniform sampler2D uNormalMap;\nout vec4 color;\nvoid main() {}\n";

    #[test]
    fn test_define_inserted_after_version() {
        let mut shader = Shader::new(ShaderClass::Pbr, VERTEX, FRAGMENT);
        shader.define("HAS_NORMAL_MAP").unwrap();
        shader.define("HAS_NORMAL_MAP").unwrap();

        assert!(shader.vertex_source().starts_with("#version 300 es\n#define HAS_NORMAL_MAP\nin vec3"));
        assert!(shader.fragment_source().starts_with("#version 300 es\n#define HAS_NORMAL_MAP\n"));
        assert_eq!(shader.defines(), ["HAS_NORMAL_MAP".to_string()]);
    }

    #[test]
    fn test_define_changes_reflected_attributes() {
        let mut device = HeadlessDevice::new();

        let mut plain = Shader::new(ShaderClass::Pbr, VERTEX, FRAGMENT);
        plain.initialize(&mut device).unwrap();
        assert!(plain.program().unwrap().attribute("aTangent").is_none());

        let mut normal_mapped = Shader::new(ShaderClass::Pbr, VERTEX, FRAGMENT);
        normal_mapped.define("HAS_NORMAL_MAP").unwrap();
        normal_mapped.initialize(&mut device).unwrap();
        assert!(normal_mapped.program().unwrap().attribute("aTangent").is_some());
    }

    #[test]
    fn test_define_after_link_rejected() {
        let mut device = HeadlessDevice::new();
        let mut shader = Shader::new(ShaderClass::Basic, VERTEX, FRAGMENT);
        shader.initialize(&mut device).unwrap();

        assert_eq!(
            shader.define("HAS_EMISSIVE_MAP"),
            Err(RenderError::ShaderAlreadyLinked { define: "HAS_EMISSIVE_MAP".to_string() })
        );
    }

    #[test]
    fn test_link_failure_is_permanent() {
        let mut device = HeadlessDevice::new();
        let mut shader = Shader::new(ShaderClass::Pbr, "in vec3 a;\nvoid main() {}", FRAGMENT);

        assert!(matches!(shader.initialize(&mut device), Err(RenderError::ShaderLink(_))));
        assert!(shader.is_failed());
        assert!(shader.activate(&mut device).is_none());

        // No second link attempt
        assert!(shader.initialize(&mut device).is_err());
        assert_eq!(device.failed_links(), 1);
        assert!(shader.define("HAS_DIFFUSE_MAP").is_err());
    }

    #[test]
    fn test_activate_pins_sampler_units() {
        let mut device = HeadlessDevice::new();
        let mut shader = Shader::new(ShaderClass::Pbr, VERTEX, FRAGMENT);
        assert!(shader.activate(&mut device).is_none());
        shader.initialize(&mut device).unwrap();

        let program: ProgramHandle = shader.activate(&mut device).unwrap().program;
        assert_eq!(device.uniform_value(program, "uDiffuseMap"), Some(UniformValue::Int(0)));
        assert_eq!(device.uniform_value(program, "uNormalMap"), Some(UniformValue::Int(1)));
        assert!(device.commands().contains(&DeviceCommand::UseProgram(program)));
    }
}
