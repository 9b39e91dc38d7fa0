//! Test doubles shared by the unit tests.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::compile::CompiledProgram;
use crate::device::{
    GpuFactory, NativeTextureHandle, ProgramHandle, SamplerHandle, SamplerSpec, TextureHandle,
};
use crate::draw::CommandSink;
use crate::error::ResourceError;
use crate::layout::Rect;

/// Inverts the sampled colour; follows the pixel-shader binding contract.
pub(crate) const WGSL_INVERT: &str = r"
@group(0) @binding(0) var preview_texture: texture_2d<f32>;
@group(0) @binding(1) var preview_sampler: sampler;

@fragment
fn main(@location(0) uv: vec2<f32>, @location(1) color: vec4<f32>) -> @location(0) vec4<f32> {
    let sampled = textureSample(preview_texture, preview_sampler, uv);
    return vec4<f32>(vec3<f32>(1.0) - sampled.rgb, sampled.a) * color;
}
";

/// Writes a solid `width` x `height` PNG into `dir` and returns its path.
pub(crate) fn write_png(dir: &Path, name: &str, width: u32, height: u32) -> PathBuf {
    let path = dir.join(name);
    image::RgbaImage::from_pixel(width, height, image::Rgba([200, 100, 50, 255]))
        .save(&path)
        .expect("write test png");
    path
}

/// In-memory factory tracking which handles are alive, with switches to
/// fail each creation step.
#[derive(Debug, Default)]
pub(crate) struct FakeFactory {
    pub(crate) next: u64,
    pub(crate) programs: BTreeSet<ProgramHandle>,
    pub(crate) samplers: BTreeSet<SamplerHandle>,
    pub(crate) textures: BTreeSet<NativeTextureHandle>,
    pub(crate) views: BTreeSet<TextureHandle>,
    pub(crate) fail_program: bool,
    pub(crate) fail_sampler: bool,
    pub(crate) fail_texture: bool,
    pub(crate) fail_view: bool,
    pub(crate) program_requests: usize,
    pub(crate) texture_requests: usize,
    pub(crate) sampler_specs: Vec<SamplerSpec>,
}

impl FakeFactory {
    fn mint(&mut self) -> u64 {
        self.next += 1;
        self.next
    }

    pub fn live_programs(&self) -> usize {
        self.programs.len()
    }

    pub fn live_samplers(&self) -> usize {
        self.samplers.len()
    }

    pub fn live_textures(&self) -> usize {
        self.textures.len()
    }

    pub fn live_views(&self) -> usize {
        self.views.len()
    }

    pub fn live_total(&self) -> usize {
        self.live_programs() + self.live_samplers() + self.live_textures() + self.live_views()
    }
}

impl GpuFactory for FakeFactory {
    fn create_program(
        &mut self,
        _label: &str,
        _program: &CompiledProgram,
    ) -> Result<ProgramHandle, ResourceError> {
        self.program_requests += 1;
        if self.fail_program {
            return Err(ResourceError::ProgramCreationFailure("injected".into()));
        }
        let handle = ProgramHandle::from_raw(self.mint());
        self.programs.insert(handle);
        Ok(handle)
    }

    fn create_sampler(
        &mut self,
        _label: &str,
        spec: &SamplerSpec,
    ) -> Result<SamplerHandle, ResourceError> {
        if self.fail_sampler {
            return Err(ResourceError::SamplerCreationFailure("injected".into()));
        }
        self.sampler_specs.push(*spec);
        let handle = SamplerHandle::from_raw(self.mint());
        self.samplers.insert(handle);
        Ok(handle)
    }

    fn create_texture(
        &mut self,
        _label: &str,
        width: u32,
        height: u32,
        rgba: &[u8],
    ) -> Result<NativeTextureHandle, ResourceError> {
        self.texture_requests += 1;
        assert_eq!(rgba.len(), (width * height * 4) as usize);
        if self.fail_texture {
            return Err(ResourceError::TextureUploadFailure("injected".into()));
        }
        let handle = NativeTextureHandle::from_raw(self.mint());
        self.textures.insert(handle);
        Ok(handle)
    }

    fn create_texture_view(
        &mut self,
        _label: &str,
        texture: NativeTextureHandle,
    ) -> Result<TextureHandle, ResourceError> {
        assert!(self.textures.contains(&texture), "view of a released texture");
        if self.fail_view {
            return Err(ResourceError::ShaderResourceViewFailure("injected".into()));
        }
        let handle = TextureHandle::from_raw(self.mint());
        self.views.insert(handle);
        Ok(handle)
    }

    fn release_program(&mut self, handle: ProgramHandle) {
        self.programs.remove(&handle);
    }

    fn release_sampler(&mut self, handle: SamplerHandle) {
        self.samplers.remove(&handle);
    }

    fn release_texture(&mut self, handle: NativeTextureHandle) {
        self.textures.remove(&handle);
    }

    fn release_texture_view(&mut self, handle: TextureHandle) {
        self.views.remove(&handle);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum SinkEvent {
    Bind {
        program: ProgramHandle,
        texture: TextureHandle,
        sampler: SamplerHandle,
    },
    Reset,
    Draw {
        texture: TextureHandle,
        rect: Rect,
    },
}

/// Sink that records every call in order.
#[derive(Debug, Default)]
pub(crate) struct RecordingSink {
    pub events: Vec<SinkEvent>,
}

impl CommandSink for RecordingSink {
    fn bind_shader(
        &mut self,
        program: ProgramHandle,
        texture: TextureHandle,
        sampler: SamplerHandle,
    ) {
        self.events.push(SinkEvent::Bind {
            program,
            texture,
            sampler,
        });
    }

    fn reset_state(&mut self) {
        self.events.push(SinkEvent::Reset);
    }

    fn draw_image(&mut self, texture: TextureHandle, rect: Rect) {
        self.events.push(SinkEvent::Draw { texture, rect });
    }
}
