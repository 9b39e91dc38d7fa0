use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::compile::{compile_pixel_shader, ENTRY_POINT};
use crate::device::{GpuFactory, ProgramHandle, SamplerHandle, SamplerSpec, TextureHandle};
use crate::draw::CommandSink;
use crate::error::ResourceError;
use crate::ids::{PreviewId, ShaderId};
use crate::preview::Preview;
use crate::types::ShaderTarget;

/// Program and sampler are created together and released together.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct CompiledState {
    program: ProgramHandle,
    sampler: SamplerHandle,
}

/// A pixel-shader program compiled from source text, plus the previews
/// currently pointing at it.
#[derive(Debug)]
pub struct Shader {
    id: ShaderId,
    pub name: String,
    pub source: String,
    pub target: ShaderTarget,
    pub path: Option<PathBuf>,
    compiled: Option<CompiledState>,
    references: Vec<PreviewId>,
}

impl Shader {
    /// An empty, uncompilable shader with a fresh id.
    pub fn new() -> Self {
        Self::with_source("", "", None)
    }

    pub fn with_source(
        source: impl Into<String>,
        name: impl Into<String>,
        path: Option<PathBuf>,
    ) -> Self {
        Self {
            id: ShaderId::generate(),
            name: name.into(),
            source: source.into(),
            target: ShaderTarget::default(),
            path,
            compiled: None,
            references: Vec::new(),
        }
    }

    /// Reads `path` into a new shader named after the file. The target is
    /// picked from the extension (`.wgsl`, otherwise GLSL).
    pub fn from_file(path: &Path) -> Result<Self, ResourceError> {
        let source = read_source(path)?;
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let mut shader = Self::with_source(source, name, Some(path.to_path_buf()));
        shader.target = ShaderTarget::from_path(path, ShaderTarget::default());
        debug!(shader = %shader.name, id = %shader.id, path = %path.display(), "loaded shader source");
        Ok(shader)
    }

    pub fn id(&self) -> &ShaderId {
        &self.id
    }

    pub fn has_source(&self) -> bool {
        !self.source.is_empty()
    }

    pub fn is_compiled(&self) -> bool {
        self.compiled.is_some()
    }

    pub fn program(&self) -> Option<ProgramHandle> {
        self.compiled.map(|state| state.program)
    }

    pub fn sampler(&self) -> Option<SamplerHandle> {
        self.compiled.map(|state| state.sampler)
    }

    /// Ids of the previews whose shader field names this shader.
    pub fn referenced_by(&self) -> &[PreviewId] {
        &self.references
    }

    /// Re-reads the source from `path`. Returns `Ok(false)` when the shader
    /// has no backing file. The compiled program is left untouched.
    pub fn reload_source(&mut self) -> Result<bool, ResourceError> {
        let Some(path) = self.path.as_deref() else {
            return Ok(false);
        };
        let source = read_source(path).inspect_err(|err| {
            warn!(shader = %self.name, id = %self.id, error = %err, "failed to reload shader source");
        })?;
        self.source = source;
        Ok(true)
    }

    /// Compiles the source and creates the program and its sampler.
    ///
    /// Any previous program is released first, so a failure leaves the
    /// shader uncompiled rather than stale.
    pub fn compile(&mut self, device: &mut dyn GpuFactory) -> Result<(), ResourceError> {
        if self.source.is_empty() {
            warn!(shader = %self.name, id = %self.id, "shader source is empty");
            return Err(ResourceError::EmptySource);
        }

        self.release(device);

        let program = compile_pixel_shader(&self.source, ENTRY_POINT, self.target).map_err(|diagnostic| {
            let diagnostic = if diagnostic.trim().is_empty() {
                "compiler reported no diagnostic".to_string()
            } else {
                diagnostic
            };
            warn!(shader = %self.name, id = %self.id, target = %self.target, "failed to compile shader:\n{diagnostic}");
            ResourceError::CompileFailure(diagnostic)
        })?;

        let label = format!("shader {} ({})", self.name, self.id);
        let program = device.create_program(&label, &program).inspect_err(|err| {
            warn!(shader = %self.name, id = %self.id, error = %err, "failed to create pixel shader");
        })?;
        let sampler = match device.create_sampler(&label, &SamplerSpec::linear_wrap()) {
            Ok(sampler) => sampler,
            Err(err) => {
                warn!(shader = %self.name, id = %self.id, error = %err, "failed to create sampler state");
                device.release_program(program);
                return Err(err);
            }
        };

        self.compiled = Some(CompiledState { program, sampler });
        info!(shader = %self.name, id = %self.id, target = %self.target, "shader compiled");
        Ok(())
    }

    /// Binds this shader's program and sampler, reading from `texture`, for
    /// the next draw on `sink`. Returns `texture` unchanged; does nothing
    /// when the shader is uncompiled or there is no texture.
    pub fn apply_to_command_stream(
        &self,
        texture: Option<TextureHandle>,
        sink: &mut dyn CommandSink,
    ) -> Option<TextureHandle> {
        if let (Some(state), Some(texture)) = (self.compiled, texture) {
            sink.bind_shader(state.program, texture, state.sampler);
        }
        texture
    }

    /// Clears the shader field of every referencing preview, then releases
    /// the GPU handles. Previews that no longer exist are skipped.
    pub fn destroy<'a>(
        &mut self,
        previews: impl IntoIterator<Item = &'a mut Preview>,
        device: &mut dyn GpuFactory,
    ) {
        for preview in previews {
            if self.references.contains(preview.id()) && preview.shader_id() == Some(&self.id) {
                preview.detach_shader();
            }
        }
        self.references.clear();
        self.release(device);
        info!(shader = %self.name, id = %self.id, "shader destroyed");
    }

    /// Releases program and sampler together; the source is kept.
    pub fn release(&mut self, device: &mut dyn GpuFactory) {
        if let Some(state) = self.compiled.take() {
            device.release_program(state.program);
            device.release_sampler(state.sampler);
        }
    }

    pub(crate) fn add_reference(&mut self, preview: &PreviewId) {
        if !self.references.contains(preview) {
            self.references.push(preview.clone());
        }
    }

    pub(crate) fn remove_reference(&mut self, preview: &PreviewId) -> bool {
        let before = self.references.len();
        self.references.retain(|id| id != preview);
        self.references.len() != before
    }
}

impl Default for Shader {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for Shader {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Shader {}

fn read_source(path: &Path) -> Result<String, ResourceError> {
    fs::read_to_string(path).map_err(|err| ResourceError::SourceReadFailure {
        path: path.to_path_buf(),
        reason: err.to_string(),
    })
}
