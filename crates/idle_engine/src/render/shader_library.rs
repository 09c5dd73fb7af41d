//! Shader source loading
//!
//! Sources are read once per class from [`ShaderConfig::shader_dir`] (or
//! registered in memory) and every `//include <name>` line is replaced by the
//! named header from [`ShaderConfig::include_dir`]. Each call to
//! [`ShaderLibrary::shader`] hands out a fresh, unlinked [`Shader`] so materials
//! can add their own defines.

use std::collections::HashMap;
use std::path::Path;

use crate::core::config::ShaderConfig;

use super::shader::{Shader, ShaderClass};
use super::{RenderError, RenderResult};

const MAX_INCLUDE_DEPTH: usize = 8;
const INCLUDE_PREFIX: &str = "//include";

/// Cache of include-expanded shader sources
#[derive(Debug, Clone)]
pub struct ShaderLibrary {
    config: ShaderConfig,
    sources: HashMap<ShaderClass, (String, String)>,
    headers: HashMap<String, String>,
}

impl ShaderLibrary {
    /// Create a library reading from the configured directories
    pub fn new(config: ShaderConfig) -> Self {
        Self {
            config,
            sources: HashMap::new(),
            headers: HashMap::new(),
        }
    }

    /// Register a header so includes resolve without touching disk
    pub fn register_header(&mut self, name: impl Into<String>, text: impl Into<String>) {
        self.headers.insert(name.into(), text.into());
    }

    /// Register a class's sources directly; includes are expanded immediately
    pub fn register_sources(&mut self, class: ShaderClass, vertex: &str, fragment: &str) -> RenderResult<()> {
        let vertex = self.expand_includes(vertex, 0)?;
        let fragment = self.expand_includes(fragment, 0)?;
        self.sources.insert(class, (vertex, fragment));
        Ok(())
    }

    /// Load a class's sources from disk unless already cached
    pub fn load(&mut self, class: ShaderClass) -> RenderResult<()> {
        if self.sources.contains_key(&class) {
            return Ok(());
        }
        let vertex = read_source(&self.config.shader_dir.join(class.vertex_file()))?;
        let fragment = read_source(&self.config.shader_dir.join(class.fragment_file()))?;
        log::debug!("Loaded {:?} shader sources from {}", class, self.config.shader_dir.display());
        self.register_sources(class, &vertex, &fragment)
    }

    /// Fresh unlinked instance of `class`
    pub fn shader(&mut self, class: ShaderClass) -> RenderResult<Shader> {
        self.load(class)?;
        let (vertex, fragment) = self.sources.get(&class).ok_or_else(|| {
            RenderError::InvalidResource(format!("no sources for {class:?}"))
        })?;
        Ok(Shader::new(class, vertex.clone(), fragment.clone()))
    }

    /// Whether a class's sources are cached
    pub fn is_loaded(&self, class: ShaderClass) -> bool {
        self.sources.contains_key(&class)
    }

    fn header(&mut self, name: &str) -> RenderResult<String> {
        if let Some(text) = self.headers.get(name) {
            return Ok(text.clone());
        }
        let text = read_source(&self.config.include_dir.join(name))?;
        self.headers.insert(name.to_string(), text.clone());
        Ok(text)
    }

    fn expand_includes(&mut self, source: &str, depth: usize) -> RenderResult<String> {
        let mut out = String::with_capacity(source.len());
        for line in source.lines() {
            match include_target(line) {
                Some(name) => {
                    if depth >= MAX_INCLUDE_DEPTH {
                        return Err(RenderError::IncludeDepth(name.to_string()));
                    }
                    let header = self.header(name)?;
                    let expanded = self.expand_includes(&header, depth + 1)?;
                    out.push_str(&expanded);
                    if !expanded.ends_with('\n') {
                        out.push('\n');
                    }
                }
                None => {
                    out.push_str(line);
                    out.push('\n');
                }
            }
        }
        Ok(out)
    }
}

/// Header name in an `//include <name>` line
fn include_target(line: &str) -> Option<&str> {
    let rest = line.trim().strip_prefix(INCLUDE_PREFIX)?;
    let name = rest.trim().strip_prefix('<')?.strip_suffix('>')?;
    let valid = !name.is_empty() && name.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '.');
    valid.then_some(name)
}

fn read_source(path: &Path) -> RenderResult<String> {
    std::fs::read_to_string(path).map_err(|e| RenderError::ShaderSource {
        path: path.display().to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn bundled() -> ShaderConfig {
        ShaderConfig::new(PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("shaders"))
    }

    #[test]
    fn test_include_target_parsing() {
        assert_eq!(include_target("//include <lights.glsl>"), Some("lights.glsl"));
        assert_eq!(include_target("   //include <a_b.glsl>  "), Some("a_b.glsl"));
        assert_eq!(include_target("// include <x>"), None);
        assert_eq!(include_target("//include <../etc/passwd>"), None);
        assert_eq!(include_target("uniform float x;"), None);
    }

    #[test]
    fn test_registered_headers_expand() {
        let mut library = ShaderLibrary::new(ShaderConfig::new("/nonexistent"));
        library.register_header("common.glsl", "uniform mat4 uViewMatrix;\n//include <inner.glsl>");
        library.register_header("inner.glsl", "uniform vec3 uViewPos;");
        library
            .register_sources(ShaderClass::Basic, "#version 300 es\n//include <common.glsl>\nvoid main() {}", "#version 300 es\nvoid main() {}")
            .unwrap();

        let shader = library.shader(ShaderClass::Basic).unwrap();
        assert_eq!(
            shader.vertex_source(),
            "#version 300 es\nuniform mat4 uViewMatrix;\nuniform vec3 uViewPos;\nvoid main() {}\n"
        );
    }

    #[test]
    fn test_recursive_include_is_bounded() {
        let mut library = ShaderLibrary::new(ShaderConfig::new("/nonexistent"));
        library.register_header("loop.glsl", "//include <loop.glsl>");
        let result = library.register_sources(ShaderClass::Basic, "//include <loop.glsl>", "");
        assert!(matches!(result, Err(RenderError::IncludeDepth(_))));
    }

    #[test]
    fn test_missing_sources_reported() {
        let mut library = ShaderLibrary::new(ShaderConfig::new("/nonexistent"));
        assert!(matches!(library.shader(ShaderClass::Pbr), Err(RenderError::ShaderSource { .. })));
    }

    #[test]
    fn test_bundled_sources_load_and_link() {
        use crate::render::headless::HeadlessDevice;

        let mut library = ShaderLibrary::new(bundled());
        let mut device = HeadlessDevice::new();
        for class in ShaderClass::ALL {
            let mut shader = library.shader(class).unwrap();
            assert!(!shader.vertex_source().contains(INCLUDE_PREFIX));
            shader.initialize(&mut device).unwrap_or_else(|e| panic!("{class:?}: {e}"));
        }
    }

    #[test]
    fn test_each_call_returns_fresh_instance() {
        let mut library = ShaderLibrary::new(bundled());
        let mut first = library.shader(ShaderClass::Pbr).unwrap();
        first.define("HAS_DIFFUSE_MAP").unwrap();

        let second = library.shader(ShaderClass::Pbr).unwrap();
        assert!(!second.has_define("HAS_DIFFUSE_MAP"));
    }
}
