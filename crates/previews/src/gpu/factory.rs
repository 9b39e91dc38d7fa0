use std::collections::HashMap;

use anyhow::{anyhow, Result};
use wgpu::util::DeviceExt;

use crate::compile::{compile_pixel_shader, CompiledProgram, DEFAULT_PIXEL_SHADER, ENTRY_POINT};
use crate::device::{
    GpuFactory, NativeTextureHandle, ProgramHandle, SamplerAddress, SamplerFilter, SamplerHandle,
    SamplerSpec, TextureHandle,
};
use crate::error::ResourceError;
use crate::types::ShaderTarget;

use super::context::GpuContext;
use super::pipeline::{PipelineLayouts, COLOR_FORMAT};

/// Counts of native objects currently owned by a [`WgpuFactory`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LiveResources {
    pub programs: usize,
    pub samplers: usize,
    pub textures: usize,
    pub views: usize,
}

/// [`GpuFactory`] backed by a wgpu device. Native objects live in maps keyed
/// by the handles given out; releasing a handle drops the object.
pub struct WgpuFactory {
    device: wgpu::Device,
    queue: wgpu::Queue,
    layouts: PipelineLayouts,
    default_pipeline: wgpu::RenderPipeline,
    default_sampler: wgpu::Sampler,
    programs: HashMap<ProgramHandle, wgpu::RenderPipeline>,
    samplers: HashMap<SamplerHandle, wgpu::Sampler>,
    textures: HashMap<NativeTextureHandle, wgpu::Texture>,
    views: HashMap<TextureHandle, wgpu::TextureView>,
    next_handle: u64,
}

impl WgpuFactory {
    pub fn new(context: &GpuContext) -> Result<Self> {
        let device = context.device.clone();
        let layouts = PipelineLayouts::new(&device);

        let default_program = compile_pixel_shader(DEFAULT_PIXEL_SHADER, ENTRY_POINT, ShaderTarget::Glsl450)
            .map_err(|diagnostic| anyhow!("default pixel shader failed to compile: {diagnostic}"))?;
        let default_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("default pixel shader"),
            source: default_program.shader_source(),
        });
        let default_pipeline =
            layouts.build_pipeline(&device, "default preview pipeline", &default_module, ENTRY_POINT);
        let default_sampler = device.create_sampler(&sampler_descriptor(
            "default preview sampler",
            &SamplerSpec::linear_clamp(),
        ));

        Ok(Self {
            device,
            queue: context.queue.clone(),
            layouts,
            default_pipeline,
            default_sampler,
            programs: HashMap::new(),
            samplers: HashMap::new(),
            textures: HashMap::new(),
            views: HashMap::new(),
            next_handle: 0,
        })
    }

    pub fn live_resources(&self) -> LiveResources {
        LiveResources {
            programs: self.programs.len(),
            samplers: self.samplers.len(),
            textures: self.textures.len(),
            views: self.views.len(),
        }
    }

    pub(crate) fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub(crate) fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    pub(crate) fn layouts(&self) -> &PipelineLayouts {
        &self.layouts
    }

    pub(crate) fn default_pipeline(&self) -> &wgpu::RenderPipeline {
        &self.default_pipeline
    }

    pub(crate) fn default_sampler(&self) -> &wgpu::Sampler {
        &self.default_sampler
    }

    pub(crate) fn program(&self, handle: ProgramHandle) -> Option<&wgpu::RenderPipeline> {
        self.programs.get(&handle)
    }

    pub(crate) fn sampler(&self, handle: SamplerHandle) -> Option<&wgpu::Sampler> {
        self.samplers.get(&handle)
    }

    pub(crate) fn view(&self, handle: TextureHandle) -> Option<&wgpu::TextureView> {
        self.views.get(&handle)
    }

    fn next(&mut self) -> u64 {
        self.next_handle += 1;
        self.next_handle
    }

    /// Runs `build` inside validation and out-of-memory error scopes.
    fn capture<T>(&self, build: impl FnOnce(&wgpu::Device) -> T) -> Result<T, wgpu::Error> {
        self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let value = build(&self.device);
        let validation = pollster::block_on(self.device.pop_error_scope());
        let memory = pollster::block_on(self.device.pop_error_scope());
        match validation.or(memory) {
            Some(error) => Err(error),
            None => Ok(value),
        }
    }
}

impl GpuFactory for WgpuFactory {
    fn create_program(
        &mut self,
        label: &str,
        program: &CompiledProgram,
    ) -> Result<ProgramHandle, ResourceError> {
        let layouts = &self.layouts;
        let pipeline = self
            .capture(|device| {
                let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
                    label: Some(label),
                    source: program.shader_source(),
                });
                layouts.build_pipeline(device, label, &module, program.entry_point())
            })
            .map_err(|err| ResourceError::ProgramCreationFailure(err.to_string()))?;

        let handle = ProgramHandle::from_raw(self.next());
        self.programs.insert(handle, pipeline);
        Ok(handle)
    }

    fn create_sampler(
        &mut self,
        label: &str,
        spec: &SamplerSpec,
    ) -> Result<SamplerHandle, ResourceError> {
        let sampler = self
            .capture(|device| device.create_sampler(&sampler_descriptor(label, spec)))
            .map_err(|err| ResourceError::SamplerCreationFailure(err.to_string()))?;

        let handle = SamplerHandle::from_raw(self.next());
        self.samplers.insert(handle, sampler);
        Ok(handle)
    }

    fn create_texture(
        &mut self,
        label: &str,
        width: u32,
        height: u32,
        rgba: &[u8],
    ) -> Result<NativeTextureHandle, ResourceError> {
        let max_dimension = self.device.limits().max_texture_dimension_2d;
        if width == 0 || height == 0 || width > max_dimension || height > max_dimension {
            return Err(ResourceError::TextureUploadFailure(format!(
                "{width}x{height} exceeds the device limit of {max_dimension}"
            )));
        }
        let expected = width as usize * height as usize * 4;
        if rgba.len() != expected {
            return Err(ResourceError::TextureUploadFailure(format!(
                "expected {expected} bytes of RGBA8 data, got {}",
                rgba.len()
            )));
        }

        let queue = &self.queue;
        let texture = self
            .capture(|device| {
                device.create_texture_with_data(
                    queue,
                    &wgpu::TextureDescriptor {
                        label: Some(label),
                        size: wgpu::Extent3d {
                            width,
                            height,
                            depth_or_array_layers: 1,
                        },
                        mip_level_count: 1,
                        sample_count: 1,
                        dimension: wgpu::TextureDimension::D2,
                        format: COLOR_FORMAT,
                        usage: wgpu::TextureUsages::TEXTURE_BINDING,
                        view_formats: &[],
                    },
                    wgpu::util::TextureDataOrder::LayerMajor,
                    rgba,
                )
            })
            .map_err(|err| ResourceError::TextureUploadFailure(err.to_string()))?;

        let handle = NativeTextureHandle::from_raw(self.next());
        self.textures.insert(handle, texture);
        Ok(handle)
    }

    fn create_texture_view(
        &mut self,
        label: &str,
        texture: NativeTextureHandle,
    ) -> Result<TextureHandle, ResourceError> {
        let texture = self.textures.get(&texture).ok_or_else(|| {
            ResourceError::ShaderResourceViewFailure(format!(
                "unknown texture handle {}",
                texture.raw()
            ))
        })?;
        let view = self
            .capture(|_| {
                texture.create_view(&wgpu::TextureViewDescriptor {
                    label: Some(label),
                    ..Default::default()
                })
            })
            .map_err(|err| ResourceError::ShaderResourceViewFailure(err.to_string()))?;

        let handle = TextureHandle::from_raw(self.next());
        self.views.insert(handle, view);
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

fn sampler_descriptor<'a>(label: &'a str, spec: &SamplerSpec) -> wgpu::SamplerDescriptor<'a> {
    let address_mode = match spec.address {
        SamplerAddress::Clamp => wgpu::AddressMode::ClampToEdge,
        SamplerAddress::Wrap => wgpu::AddressMode::Repeat,
    };
    let (filter, mipmap_filter) = match spec.filter {
        SamplerFilter::Nearest => (wgpu::FilterMode::Nearest, wgpu::FilterMode::Nearest),
        SamplerFilter::Linear => (wgpu::FilterMode::Linear, wgpu::FilterMode::Linear),
    };
    wgpu::SamplerDescriptor {
        label: Some(label),
        address_mode_u: address_mode,
        address_mode_v: address_mode,
        address_mode_w: address_mode,
        mag_filter: filter,
        min_filter: filter,
        mipmap_filter,
        compare: spec.compare,
        ..Default::default()
    }
}
