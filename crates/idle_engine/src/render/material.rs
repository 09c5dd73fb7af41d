//! Materials and the fixed texture-unit contract
//!
//! Each [`TextureSlot`] owns one texture unit and one shader define. The
//! numbering is shared with the shader sources' sampler uniforms, so new slots
//! are appended and existing ones never renumbered.
//!
//! Adding a map defines its flag on the material's own shader instance, which
//! only works before that shader links. Units stay the same whichever maps a
//! material happens to lack.

use crate::foundation::math::{Vec3, Vec4};

use super::device::{GraphicsDevice, ProgramInfo, UniformValue};
use super::shader::Shader;
use super::texture::{Texture, TextureId};
use super::RenderResult;

/// Index of a material within its owning asset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MaterialId(pub usize);

/// Texture roles, in texture-unit order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureSlot {
    /// Base color, unit 0
    Diffuse,
    /// Tangent-space normals, unit 1
    Normal,
    /// Specular RGB plus glossiness alpha, unit 2
    SpecularGlossiness,
    /// Emitted light, unit 3
    Emissive,
    /// Ambient occlusion, unit 4
    Occlusion,
}

impl TextureSlot {
    /// Number of slots
    pub const COUNT: usize = 5;

    /// Every slot in unit order
    pub const ALL: [Self; Self::COUNT] = [
        Self::Diffuse,
        Self::Normal,
        Self::SpecularGlossiness,
        Self::Emissive,
        Self::Occlusion,
    ];

    /// Texture unit the slot is bound to
    pub fn unit(self) -> u32 {
        match self {
            Self::Diffuse => 0,
            Self::Normal => 1,
            Self::SpecularGlossiness => 2,
            Self::Emissive => 3,
            Self::Occlusion => 4,
        }
    }

    /// Shader define announcing the map
    pub fn define(self) -> &'static str {
        match self {
            Self::Diffuse => "HAS_DIFFUSE_MAP",
            Self::Normal => "HAS_NORMAL_MAP",
            Self::SpecularGlossiness => "HAS_SPECULAR_GLOSSINESS_MAP",
            Self::Emissive => "HAS_EMISSIVE_MAP",
            Self::Occlusion => "HAS_OCCLUSION_MAP",
        }
    }

    /// Sampler uniform the shader reads the map from
    pub fn sampler_uniform(self) -> &'static str {
        match self {
            Self::Diffuse => "uDiffuseMap",
            Self::Normal => "uNormalMap",
            Self::SpecularGlossiness => "uSpecularGlossinessMap",
            Self::Emissive => "uEmissiveMap",
            Self::Occlusion => "uOcclusionMap",
        }
    }

    fn index(self) -> usize {
        self.unit() as usize
    }
}

/// Scalar and vector material parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaterialFactors {
    /// RGBA multiplier on the diffuse color
    pub diffuse: Vec4,
    /// RGB specular reflectance
    pub specular: Vec3,
    /// Glossiness multiplier
    pub glossiness: f32,
    /// RGB emitted light
    pub emissive: Vec3,
    /// Blend strength of the occlusion map
    pub occlusion_strength: f32,
    /// Scale applied to sampled normals
    pub normal_scale: f32,
}

impl Default for MaterialFactors {
    fn default() -> Self {
        Self {
            diffuse: Vec4::new(1.0, 1.0, 1.0, 1.0),
            specular: Vec3::new(1.0, 1.0, 1.0),
            glossiness: 1.0,
            emissive: Vec3::zeros(),
            occlusion_strength: 1.0,
            normal_scale: 1.0,
        }
    }
}

/// A shader instance plus the parameters and textures it is drawn with
#[derive(Debug, Clone)]
pub struct Material {
    name: String,
    shader: Shader,
    factors: MaterialFactors,
    maps: [Option<TextureId>; TextureSlot::COUNT],
}

impl Material {
    /// Wrap an unlinked shader instance
    pub fn new(name: impl Into<String>, shader: Shader) -> Self {
        Self {
            name: name.into(),
            shader,
            factors: MaterialFactors::default(),
            maps: [None; TextureSlot::COUNT],
        }
    }

    /// Replace all factors
    pub fn with_factors(mut self, factors: MaterialFactors) -> Self {
        self.factors = factors;
        self
    }

    /// Mutable factors; these may change at any time
    pub fn factors_mut(&mut self) -> &mut MaterialFactors {
        &mut self.factors
    }

    /// Current factors
    pub fn factors(&self) -> &MaterialFactors {
        &self.factors
    }

    /// Attach a texture map and define its flag on the shader.
    ///
    /// Fails without attaching anything if the shader has already linked.
    pub fn add_map(&mut self, slot: TextureSlot, texture: TextureId) -> RenderResult<()> {
        self.shader.define(slot.define())?;
        self.maps[slot.index()] = Some(texture);
        Ok(())
    }

    /// Attach a diffuse map
    pub fn add_diffuse_map(&mut self, texture: TextureId) -> RenderResult<()> {
        self.add_map(TextureSlot::Diffuse, texture)
    }

    /// Attach a normal map
    pub fn add_normal_map(&mut self, texture: TextureId) -> RenderResult<()> {
        self.add_map(TextureSlot::Normal, texture)
    }

    /// Attach a specular-glossiness map
    pub fn add_specular_glossiness_map(&mut self, texture: TextureId) -> RenderResult<()> {
        self.add_map(TextureSlot::SpecularGlossiness, texture)
    }

    /// Attach an emissive map
    pub fn add_emissive_map(&mut self, texture: TextureId) -> RenderResult<()> {
        self.add_map(TextureSlot::Emissive, texture)
    }

    /// Attach an occlusion map
    pub fn add_occlusion_map(&mut self, texture: TextureId) -> RenderResult<()> {
        self.add_map(TextureSlot::Occlusion, texture)
    }

    /// Define an extra flag, e.g. `HAS_BASE_COLOR` for per-vertex color
    pub fn define(&mut self, flag: &str) -> RenderResult<()> {
        self.shader.define(flag)
    }

    /// Texture attached to a slot
    pub fn map(&self, slot: TextureSlot) -> Option<TextureId> {
        self.maps[slot.index()]
    }

    /// Link the shader
    pub fn initialize(&mut self, device: &mut dyn GraphicsDevice) -> RenderResult<()> {
        self.shader.initialize(device)
    }

    /// Whether the shader has linked
    pub fn is_ready(&self) -> bool {
        self.shader.is_linked()
    }

    /// Bind the shader, factors and maps for a draw.
    ///
    /// Returns `None` until the shader has linked; the caller skips its draws.
    /// Texture units 0 through 4 are overwritten for every present map, so no
    /// binding from a previous material should be relied on.
    pub fn render(&self, device: &mut dyn GraphicsDevice, textures: &[Texture]) -> Option<&ProgramInfo> {
        let program = self.shader.activate(device)?;

        program.set_uniform(device, "uDiffuseFactor", UniformValue::Vec4(self.factors.diffuse.into()));
        program.set_uniform(device, "uSpecularFactor", UniformValue::Vec3(self.factors.specular.into()));
        program.set_uniform(device, "uGlossinessFactor", UniformValue::Float(self.factors.glossiness));
        program.set_uniform(device, "uEmissiveFactor", UniformValue::Vec3(self.factors.emissive.into()));

        for slot in TextureSlot::ALL {
            let Some(id) = self.maps[slot.index()] else {
                continue;
            };
            match textures.get(id.0) {
                Some(texture) => {
                    texture.bind(device, slot.unit());
                }
                None => log::warn!("Material {} references missing texture {}", self.name, id.0),
            }
            match slot {
                TextureSlot::Normal => {
                    program.set_uniform(device, "uNormalScale", UniformValue::Float(self.factors.normal_scale));
                }
                TextureSlot::Occlusion => {
                    program.set_uniform(device, "uOcclusionStrength", UniformValue::Float(self.factors.occlusion_strength));
                }
                _ => {}
            }
        }

        Some(program)
    }

    /// Material name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Underlying shader instance
    pub fn shader(&self) -> &Shader {
        &self.shader
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::ShaderConfig;
    use crate::render::device::{Sampler, TextureHandle, TextureKind};
    use crate::render::headless::HeadlessDevice;
    use crate::render::shader::ShaderClass;
    use crate::render::shader_library::ShaderLibrary;
    use crate::render::texture::TextureState;
    use image::RgbaImage;
    use std::path::PathBuf;

    fn library() -> ShaderLibrary {
        ShaderLibrary::new(ShaderConfig::new(PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("shaders")))
    }

    fn handle(texture: &Texture) -> Option<TextureHandle> {
        match texture.state() {
            TextureState::Uploaded(handle) => Some(*handle),
            _ => None,
        }
    }

    fn ready_textures(device: &mut HeadlessDevice, count: usize) -> Vec<Texture> {
        (0..count)
            .map(|i| {
                let mut texture = Texture::from_data(
                    format!("t{i}.png"),
                    TextureKind::Texture2D,
                    Sampler::default(),
                    vec![RgbaImage::new(2, 2)],
                );
                texture.prepare(device).unwrap();
                texture
            })
            .collect()
    }

    #[test]
    fn test_slot_units_are_fixed() {
        let units: Vec<u32> = TextureSlot::ALL.iter().map(|s| s.unit()).collect();
        assert_eq!(units, vec![0, 1, 2, 3, 4]);
        for slot in TextureSlot::ALL {
            let pinned = ShaderClass::Pbr
                .sampler_units()
                .iter()
                .find(|(name, _)| *name == slot.sampler_uniform())
                .map(|(_, unit)| *unit);
            assert_eq!(pinned, Some(slot.unit() as i32));
        }
    }

    #[test]
    fn test_render_before_initialize_returns_none() {
        let mut device = HeadlessDevice::new();
        let material = Material::new("plain", library().shader(ShaderClass::Pbr).unwrap());
        assert!(material.render(&mut device, &[]).is_none());
        assert!(device.commands().is_empty());
    }

    #[test]
    fn test_units_stable_across_materials() {
        let mut device = HeadlessDevice::new();
        let textures = ready_textures(&mut device, 3);
        let mut library = library();

        // Diffuse + normal
        let mut full = Material::new("full", library.shader(ShaderClass::Pbr).unwrap());
        full.add_diffuse_map(TextureId(0)).unwrap();
        full.add_normal_map(TextureId(1)).unwrap();
        full.initialize(&mut device).unwrap();

        // Normal only
        let mut sparse = Material::new("sparse", library.shader(ShaderClass::Pbr).unwrap());
        sparse.add_normal_map(TextureId(2)).unwrap();
        sparse.initialize(&mut device).unwrap();

        full.render(&mut device, &textures).unwrap();
        assert_eq!(device.bound_texture(0), handle(&textures[0]));
        assert_eq!(device.bound_texture(1), handle(&textures[1]));

        let program = sparse.render(&mut device, &textures).unwrap().program;
        assert_eq!(device.bound_texture(1), handle(&textures[2]));
        assert_eq!(device.uniform_value(program, "uNormalMap"), Some(UniformValue::Int(1)));
        assert_eq!(device.uniform_value(program, "uDiffuseMap"), None);
    }

    #[test]
    fn test_dependent_scalars_only_with_their_maps() {
        let mut device = HeadlessDevice::new();
        let textures = ready_textures(&mut device, 1);
        let mut library = library();

        let mut plain = Material::new("plain", library.shader(ShaderClass::Pbr).unwrap());
        plain.factors_mut().glossiness = 0.25;
        plain.initialize(&mut device).unwrap();
        let program = plain.render(&mut device, &textures).unwrap().program;
        assert_eq!(device.uniform_value(program, "uGlossinessFactor"), Some(UniformValue::Float(0.25)));
        assert_eq!(device.uniform_value(program, "uDiffuseFactor"), Some(UniformValue::Vec4([1.0; 4])));
        assert_eq!(device.uniform_value(program, "uNormalScale"), None);
        assert_eq!(device.uniform_value(program, "uOcclusionStrength"), None);

        let mut occluded = Material::new("occluded", library.shader(ShaderClass::Pbr).unwrap());
        occluded.factors_mut().occlusion_strength = 0.5;
        occluded.add_occlusion_map(TextureId(0)).unwrap();
        occluded.initialize(&mut device).unwrap();
        let program = occluded.render(&mut device, &textures).unwrap().program;
        assert_eq!(device.uniform_value(program, "uOcclusionStrength"), Some(UniformValue::Float(0.5)));
        assert_eq!(device.bound_texture(4), handle(&textures[0]));
    }

    #[test]
    fn test_add_map_after_link_rejected() {
        let mut device = HeadlessDevice::new();
        let mut material = Material::new("late", library().shader(ShaderClass::Pbr).unwrap());
        material.initialize(&mut device).unwrap();

        assert!(material.add_emissive_map(TextureId(0)).is_err());
        assert_eq!(material.map(TextureSlot::Emissive), None);
    }

    #[test]
    fn test_each_map_sets_its_define() {
        let mut material = Material::new("all", library().shader(ShaderClass::Pbr).unwrap());
        for (i, slot) in TextureSlot::ALL.into_iter().enumerate() {
            material.add_map(slot, TextureId(i)).unwrap();
            assert!(material.shader().has_define(slot.define()));
        }
    }
}
