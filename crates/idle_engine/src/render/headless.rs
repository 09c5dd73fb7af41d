//! Recording device for headless runs and tests
//!
//! [`HeadlessDevice`] implements [`GraphicsDevice`] without a GPU. Every call is
//! appended to a command log, handles are handed out from a counter, and
//! `link_program` reflects attribute and uniform declarations straight out of
//! the GLSL text after running the `#define`/`#ifdef` preprocessor. Sources
//! without a `#version` line or a `main` function, or that hit an active
//! `#error`, fail to link the way a driver would reject them.

use std::collections::{HashMap, HashSet};

use image::RgbaImage;

use super::device::{
    AttributeSlot, BufferHandle, BufferTarget, ComponentType, DrawMode, GraphicsDevice,
    ProgramHandle, ProgramInfo, Sampler, TextureHandle, TextureKind, UniformSlot,
    UniformValue, VertexLayout,
};
use super::{RenderError, RenderResult};

/// Texture units the device pretends to have
pub const MAX_TEXTURE_UNITS: u32 = 16;

/// One recorded device call
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceCommand {
    /// Buffer created with `bytes` of data
    CreateBuffer {
        /// New handle
        buffer: BufferHandle,
        /// Buffer target
        target: BufferTarget,
        /// Uploaded size
        bytes: usize,
    },
    /// Buffer bound
    BindBuffer {
        /// Target bound to
        target: BufferTarget,
        /// Buffer bound
        buffer: BufferHandle,
    },
    /// Program linked successfully
    LinkProgram(ProgramHandle),
    /// Program made current
    UseProgram(ProgramHandle),
    /// Attribute array enabled
    EnableAttribute(AttributeSlot),
    /// Attribute layout described
    AttributePointer {
        /// Slot described
        slot: AttributeSlot,
        /// Layout
        layout: VertexLayout,
    },
    /// Uniform uploaded
    SetUniform {
        /// Reflected uniform name
        name: String,
        /// Value
        value: UniformValue,
    },
    /// Texture allocated
    CreateTexture {
        /// New handle
        texture: TextureHandle,
        /// Kind
        kind: TextureKind,
    },
    /// Texture released
    DeleteTexture(TextureHandle),
    /// Image uploaded into a texture face
    UploadTexture {
        /// Target texture
        texture: TextureHandle,
        /// Face index
        face: usize,
        /// Width in texels
        width: u32,
        /// Height in texels
        height: u32,
    },
    /// Mip chain generated
    GenerateMipmaps(TextureHandle),
    /// Sampler applied
    SetSampler {
        /// Target texture
        texture: TextureHandle,
        /// Sampler state
        sampler: Sampler,
    },
    /// Texture bound to a unit
    BindTexture {
        /// Unit
        unit: u32,
        /// Texture
        texture: TextureHandle,
    },
    /// Depth writes toggled
    DepthMask(bool),
    /// Indexed draw
    DrawElements {
        /// Topology
        mode: DrawMode,
        /// Index count
        count: u32,
        /// Index type
        index_type: ComponentType,
        /// Byte offset into the index buffer
        offset: u32,
    },
    /// Non-indexed draw
    DrawArrays {
        /// Topology
        mode: DrawMode,
        /// First vertex
        first: u32,
        /// Vertex count
        count: u32,
    },
}

/// GPU-less [`GraphicsDevice`] that records what it is asked to do
#[derive(Debug, Default)]
pub struct HeadlessDevice {
    commands: Vec<DeviceCommand>,
    next_handle: u32,
    next_uniform_slot: u32,
    buffers: HashMap<BufferHandle, BufferTarget>,
    textures: HashMap<TextureHandle, TextureKind>,
    uniform_names: HashMap<UniformSlot, (ProgramHandle, String)>,
    uniform_values: HashMap<(ProgramHandle, String), UniformValue>,
    bound_textures: HashMap<u32, TextureHandle>,
    current_program: Option<ProgramHandle>,
    depth_writes_disabled: bool,
    draw_calls: usize,
    failed_links: usize,
}

impl HeadlessDevice {
    /// Create an empty device
    pub fn new() -> Self {
        Self::default()
    }

    /// Every command recorded so far
    pub fn commands(&self) -> &[DeviceCommand] {
        &self.commands
    }

    /// Drain the command log, keeping device state
    pub fn take_commands(&mut self) -> Vec<DeviceCommand> {
        std::mem::take(&mut self.commands)
    }

    /// Draw calls issued since creation
    pub fn draw_calls(&self) -> usize {
        self.draw_calls
    }

    /// Link attempts that failed
    pub fn failed_links(&self) -> usize {
        self.failed_links
    }

    /// Program currently in use
    pub fn current_program(&self) -> Option<ProgramHandle> {
        self.current_program
    }

    /// Last value uploaded to `name` on `program`
    pub fn uniform_value(&self, program: ProgramHandle, name: &str) -> Option<UniformValue> {
        self.uniform_values.get(&(program, name.to_string())).copied()
    }

    /// Texture currently bound at `unit`
    pub fn bound_texture(&self, unit: u32) -> Option<TextureHandle> {
        self.bound_textures.get(&unit).copied()
    }

    /// Textures created and not yet deleted
    pub fn live_textures(&self) -> usize {
        self.textures.len()
    }

    /// Whether depth writes are enabled
    pub fn depth_writes_enabled(&self) -> bool {
        !self.depth_writes_disabled
    }

    fn next_handle(&mut self) -> u32 {
        self.next_handle += 1;
        self.next_handle
    }
}

impl GraphicsDevice for HeadlessDevice {
    fn create_buffer(&mut self, target: BufferTarget, data: &[u8]) -> RenderResult<BufferHandle> {
        if data.is_empty() {
            return Err(RenderError::ResourceCreationFailed("empty buffer upload".to_string()));
        }
        let buffer = BufferHandle(self.next_handle());
        self.buffers.insert(buffer, target);
        self.commands.push(DeviceCommand::CreateBuffer { buffer, target, bytes: data.len() });
        Ok(buffer)
    }

    fn bind_buffer(&mut self, target: BufferTarget, buffer: BufferHandle) {
        if self.buffers.get(&buffer) != Some(&target) {
            log::warn!("Binding buffer {:?} to {:?} which it was not created for", buffer, target);
        }
        self.commands.push(DeviceCommand::BindBuffer { target, buffer });
    }

    fn link_program(&mut self, vertex_source: &str, fragment_source: &str) -> RenderResult<ProgramInfo> {
        let reflection = match reflect(vertex_source, fragment_source) {
            Ok(reflection) => reflection,
            Err(message) => {
                self.failed_links += 1;
                return Err(RenderError::ShaderLink(message));
            }
        };

        let program = ProgramHandle(self.next_handle());
        let attributes = reflection
            .attributes
            .into_iter()
            .zip(0u32..)
            .map(|(name, slot)| (name, AttributeSlot(slot)))
            .collect();

        let mut uniforms = HashMap::new();
        for name in reflection.uniforms {
            let slot = UniformSlot(self.next_uniform_slot);
            self.next_uniform_slot += 1;
            self.uniform_names.insert(slot, (program, name.clone()));
            uniforms.insert(name, slot);
        }

        self.commands.push(DeviceCommand::LinkProgram(program));
        Ok(ProgramInfo { program, attributes, uniforms })
    }

    fn use_program(&mut self, program: ProgramHandle) {
        self.current_program = Some(program);
        self.commands.push(DeviceCommand::UseProgram(program));
    }

    fn enable_vertex_attribute(&mut self, slot: AttributeSlot) {
        self.commands.push(DeviceCommand::EnableAttribute(slot));
    }

    fn vertex_attribute_pointer(&mut self, slot: AttributeSlot, layout: &VertexLayout) {
        self.commands.push(DeviceCommand::AttributePointer { slot, layout: *layout });
    }

    fn set_uniform(&mut self, slot: UniformSlot, value: UniformValue) {
        let Some((program, name)) = self.uniform_names.get(&slot).cloned() else {
            log::warn!("Uniform slot {:?} does not belong to any program", slot);
            return;
        };
        if self.current_program != Some(program) {
            log::warn!("Uniform {} set while its program is not current", name);
            return;
        }
        self.uniform_values.insert((program, name.clone()), value);
        self.commands.push(DeviceCommand::SetUniform { name, value });
    }

    fn create_texture(&mut self, kind: TextureKind) -> RenderResult<TextureHandle> {
        let texture = TextureHandle(self.next_handle());
        self.textures.insert(texture, kind);
        self.commands.push(DeviceCommand::CreateTexture { texture, kind });
        Ok(texture)
    }

    fn upload_texture_image(&mut self, texture: TextureHandle, face: usize, image: &RgbaImage) -> RenderResult<()> {
        let kind = self.textures.get(&texture).copied().ok_or_else(|| {
            RenderError::InvalidResource(format!("texture {texture:?} was never created"))
        })?;
        if face >= kind.face_count() {
            return Err(RenderError::InvalidResource(format!("face {face} out of range for {kind:?}")));
        }
        if image.width() == 0 || image.height() == 0 {
            return Err(RenderError::InvalidResource(format!("empty image for face {face} of {texture:?}")));
        }
        self.commands.push(DeviceCommand::UploadTexture {
            texture,
            face,
            width: image.width(),
            height: image.height(),
        });
        Ok(())
    }

    fn delete_texture(&mut self, texture: TextureHandle) {
        if self.textures.remove(&texture).is_some() {
            self.bound_textures.retain(|_, bound| *bound != texture);
            self.commands.push(DeviceCommand::DeleteTexture(texture));
        }
    }

    fn generate_mipmaps(&mut self, texture: TextureHandle) {
        self.commands.push(DeviceCommand::GenerateMipmaps(texture));
    }

    fn set_sampler(&mut self, texture: TextureHandle, sampler: &Sampler) {
        self.commands.push(DeviceCommand::SetSampler { texture, sampler: *sampler });
    }

    fn bind_texture(&mut self, unit: u32, texture: TextureHandle) {
        if unit >= MAX_TEXTURE_UNITS {
            log::warn!("Texture unit {} exceeds the {} available", unit, MAX_TEXTURE_UNITS);
            return;
        }
        self.bound_textures.insert(unit, texture);
        self.commands.push(DeviceCommand::BindTexture { unit, texture });
    }

    fn set_depth_mask(&mut self, enabled: bool) {
        self.depth_writes_disabled = !enabled;
        self.commands.push(DeviceCommand::DepthMask(enabled));
    }

    fn draw_elements(&mut self, mode: DrawMode, count: u32, index_type: ComponentType, offset: u32) {
        self.draw_calls += 1;
        self.commands.push(DeviceCommand::DrawElements { mode, count, index_type, offset });
    }

    fn draw_arrays(&mut self, mode: DrawMode, first: u32, count: u32) {
        self.draw_calls += 1;
        self.commands.push(DeviceCommand::DrawArrays { mode, first, count });
    }
}

/// Declarations found in a program's active source
#[derive(Debug, Default)]
struct Reflection {
    attributes: Vec<String>,
    uniforms: Vec<String>,
}

fn reflect(vertex_source: &str, fragment_source: &str) -> Result<Reflection, String> {
    let vertex = preprocess(vertex_source).map_err(|e| format!("vertex: {e}"))?;
    let fragment = preprocess(fragment_source).map_err(|e| format!("fragment: {e}"))?;

    let mut reflection = Reflection::default();
    let mut seen = HashSet::new();

    for declaration in declarations(&vertex) {
        if matches!(declaration.first().map(String::as_str), Some("in" | "attribute")) {
            if let Some(name) = declaration.last() {
                reflection.attributes.push(strip_array(name).0.to_string());
            }
        }
    }

    for lines in [&vertex, &fragment] {
        let structs = struct_fields(lines);
        for declaration in declarations(lines) {
            if declaration.first().map(String::as_str) != Some("uniform") || declaration.len() < 3 {
                continue;
            }
            let type_name = &declaration[declaration.len() - 2];
            let (base, count) = strip_array(&declaration[declaration.len() - 1]);
            for name in expand_uniform(base, count, structs.get(type_name.as_str())) {
                if seen.insert(name.clone()) {
                    reflection.uniforms.push(name);
                }
            }
        }
    }

    Ok(reflection)
}

/// Run `#ifdef`-style conditionals and return the active, comment-stripped lines
fn preprocess(source: &str) -> Result<Vec<String>, String> {
    let mut lines = source.lines().map(strip_comment).filter(|line| !line.trim().is_empty());

    match lines.next() {
        Some(first) if first.trim_start().starts_with("#version") => {}
        _ => return Err("missing #version directive on the first line".to_string()),
    }

    let mut defines = HashSet::new();
    let mut conditions: Vec<bool> = Vec::new();
    let mut active_lines = Vec::new();

    for line in lines {
        let trimmed = line.trim();
        let active = conditions.iter().all(|c| *c);

        let Some(directive) = trimmed.strip_prefix('#') else {
            if active {
                active_lines.push(trimmed.to_string());
            }
            continue;
        };

        let mut parts = directive.trim_start().splitn(2, char::is_whitespace);
        let keyword = parts.next().unwrap_or_default();
        let argument = parts.next().unwrap_or_default().trim();
        let symbol = argument.split_whitespace().next().unwrap_or_default();

        match keyword {
            "ifdef" => conditions.push(defines.contains(symbol)),
            "ifndef" => conditions.push(!defines.contains(symbol)),
            "else" => {
                let top = conditions.last_mut().ok_or("#else without #ifdef")?;
                *top = !*top;
            }
            "endif" => {
                conditions.pop().ok_or("#endif without #ifdef")?;
            }
            "if" | "elif" => return Err(format!("unsupported directive #{keyword}")),
            "define" if active => {
                defines.insert(symbol.to_string());
            }
            "undef" if active => {
                defines.remove(symbol);
            }
            "error" if active => return Err(format!("#error {argument}")),
            _ => {}
        }
    }

    if !conditions.is_empty() {
        return Err("unterminated #ifdef block".to_string());
    }
    if !active_lines.iter().any(|line| line.contains("void main")) {
        return Err("no main function".to_string());
    }
    Ok(active_lines)
}

fn strip_comment(line: &str) -> &str {
    line.find("//").map_or(line, |index| &line[..index])
}

/// Split active lines into `;`-terminated declarations, dropping any `layout(...)` prefix
fn declarations(lines: &[String]) -> Vec<Vec<String>> {
    lines
        .iter()
        .flat_map(|line| line.split(';'))
        .map(|statement| {
            let statement = statement.trim();
            let statement = match statement.strip_prefix("layout") {
                Some(rest) => rest.find(')').map_or(rest, |close| &rest[close + 1..]),
                None => statement,
            };
            statement.split_whitespace().map(str::to_string).collect::<Vec<_>>()
        })
        .filter(|tokens| !tokens.is_empty())
        .collect()
}

/// `struct Name { type field; ... };` definitions, by name
fn struct_fields(lines: &[String]) -> HashMap<String, Vec<String>> {
    let text = lines.join(" ");
    let mut structs = HashMap::new();
    let mut rest = text.as_str();

    while let Some(start) = rest.find("struct ") {
        rest = &rest[start + "struct ".len()..];
        let (Some(open), Some(close)) = (rest.find('{'), rest.find('}')) else {
            break;
        };
        if close < open {
            break;
        }
        let name = rest[..open].trim().to_string();
        let fields = rest[open + 1..close]
            .split(';')
            .filter_map(|field| field.split_whitespace().last())
            .map(|field| strip_array(field).0.to_string())
            .collect();
        structs.insert(name, fields);
        rest = &rest[close + 1..];
    }
    structs
}

fn strip_array(name: &str) -> (&str, Option<usize>) {
    match name.find('[') {
        Some(open) => {
            let count = name[open + 1..].trim_end_matches(']').trim().parse().ok();
            (&name[..open], count)
        }
        None => (name, None),
    }
}

fn expand_uniform(base: &str, count: Option<usize>, fields: Option<&Vec<String>>) -> Vec<String> {
    let elements: Vec<String> = match count {
        Some(count) => (0..count).map(|i| format!("{base}[{i}]")).collect(),
        None => vec![base.to_string()],
    };
    match fields {
        Some(fields) => elements
            .iter()
            .flat_map(|element| fields.iter().map(move |field| format!("{element}.{field}")))
            .collect(),
        None => elements,
    }
}
