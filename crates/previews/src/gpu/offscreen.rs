use anyhow::{anyhow, Context, Result};
use tracing::{debug, warn};
use wgpu::util::DeviceExt;

use crate::compositor::Compositor;
use crate::device::{ProgramHandle, SamplerHandle, TextureHandle};
use crate::draw::{CommandSink, DrawList};
use crate::layout::Rect;
use crate::manager::ResourceManager;

use super::factory::WgpuFactory;
use super::pipeline::{quad_vertices, QuadVertex, COLOR_FORMAT};

/// Pipeline state active when a quad was recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BoundState {
    Default,
    Shader {
        program: ProgramHandle,
        texture: TextureHandle,
        sampler: SamplerHandle,
    },
}

#[derive(Debug, Clone, Copy)]
struct QuadDraw {
    state: BoundState,
    texture: TextureHandle,
    first_vertex: u32,
}

/// Sink that flattens an executed draw stream into one vertex buffer and a
/// list of per-quad state.
struct FrameBatch {
    width: f32,
    height: f32,
    state: BoundState,
    vertices: Vec<QuadVertex>,
    draws: Vec<QuadDraw>,
}

impl FrameBatch {
    fn new(width: u32, height: u32) -> Self {
        Self {
            width: width as f32,
            height: height as f32,
            state: BoundState::Default,
            vertices: Vec::new(),
            draws: Vec::new(),
        }
    }
}

impl CommandSink for FrameBatch {
    fn bind_shader(
        &mut self,
        program: ProgramHandle,
        texture: TextureHandle,
        sampler: SamplerHandle,
    ) {
        self.state = BoundState::Shader {
            program,
            texture,
            sampler,
        };
    }

    fn reset_state(&mut self) {
        self.state = BoundState::Default;
    }

    fn draw_image(&mut self, texture: TextureHandle, rect: Rect) {
        let first_vertex = self.vertices.len() as u32;
        self.vertices
            .extend_from_slice(&quad_vertices(rect, self.width, self.height));
        self.draws.push(QuadDraw {
            state: self.state,
            texture,
            first_vertex,
        });
    }
}

/// Executes a recorded frame into an offscreen RGBA8 texture.
pub struct OffscreenRenderer {
    width: u32,
    height: u32,
    clear: wgpu::Color,
    target: wgpu::Texture,
    target_view: wgpu::TextureView,
}

impl OffscreenRenderer {
    pub fn new(factory: &WgpuFactory, width: u32, height: u32, clear: [f32; 4]) -> Result<Self> {
        let max_dimension = factory.device().limits().max_texture_dimension_2d;
        if width == 0 || height == 0 || width > max_dimension || height > max_dimension {
            anyhow::bail!(
                "render size {width}x{height} is outside the GPU limit of {max_dimension}"
            );
        }

        let target = factory.device().create_texture(&wgpu::TextureDescriptor {
            label: Some("offscreen target"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: COLOR_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let target_view = target.create_view(&wgpu::TextureViewDescriptor::default());
        let [r, g, b, a] = clear.map(f64::from);

        Ok(Self {
            width,
            height,
            clear: wgpu::Color { r, g, b, a },
            target,
            target_view,
        })
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Executes `list` against `manager`'s current state and returns the
    /// rendered frame.
    pub fn render(
        &self,
        factory: &WgpuFactory,
        manager: &ResourceManager,
        list: &DrawList,
    ) -> Result<image::RgbaImage> {
        let mut batch = FrameBatch::new(self.width, self.height);
        Compositor::new().execute(manager, list, &mut batch);
        debug!(quads = batch.draws.len(), "executing frame");

        let device = factory.device();
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("offscreen encoder"),
        });

        let vertex_buffer = (!batch.vertices.is_empty()).then(|| {
            device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("offscreen quads"),
                contents: bytemuck::cast_slice(&batch.vertices),
                usage: wgpu::BufferUsages::VERTEX,
            })
        });

        let mut prepared = Vec::with_capacity(batch.draws.len());
        for draw in &batch.draws {
            let resolved = match draw.state {
                BoundState::Default => factory
                    .view(draw.texture)
                    .map(|view| (factory.default_pipeline(), view, factory.default_sampler())),
                BoundState::Shader {
                    program,
                    texture,
                    sampler,
                } => factory
                    .program(program)
                    .zip(factory.view(texture))
                    .zip(factory.sampler(sampler))
                    .map(|((pipeline, view), sampler)| (pipeline, view, sampler)),
            };
            let Some((pipeline, view, sampler)) = resolved else {
                warn!(state = ?draw.state, "skipping quad with released resources");
                continue;
            };
            let bind_group = factory.layouts().bind_group(device, view, sampler);
            prepared.push((pipeline, bind_group, draw.first_vertex));
        }

        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("offscreen pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &self.target_view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(self.clear),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            if let Some(buffer) = &vertex_buffer {
                pass.set_vertex_buffer(0, buffer.slice(..));
                for (pipeline, bind_group, first_vertex) in &prepared {
                    pass.set_pipeline(pipeline);
                    pass.set_bind_group(0, bind_group, &[]);
                    pass.draw(*first_vertex..*first_vertex + 6, 0..1);
                }
            }
        }

        self.read_back(factory, encoder)
    }

    fn read_back(&self, factory: &WgpuFactory, mut encoder: wgpu::CommandEncoder) -> Result<image::RgbaImage> {
        let device = factory.device();
        let unpadded_row = self.width * 4;
        let padded_row = unpadded_row.div_ceil(wgpu::COPY_BYTES_PER_ROW_ALIGNMENT)
            * wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
        let readback = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("offscreen readback"),
            size: u64::from(padded_row) * u64::from(self.height),
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &self.target,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &readback,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_row),
                    rows_per_image: Some(self.height),
                },
            },
            wgpu::Extent3d {
                width: self.width,
                height: self.height,
                depth_or_array_layers: 1,
            },
        );
        factory.queue().submit(std::iter::once(encoder.finish()));

        let slice = readback.slice(..);
        let (sender, receiver) = crossbeam_channel::bounded(1);
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });
        device
            .poll(wgpu::PollType::Wait)
            .map_err(|err| anyhow!("failed to wait for GPU readback: {err}"))?;
        receiver
            .recv()
            .context("readback callback was dropped")?
            .context("failed to map readback buffer")?;

        let mut pixels = Vec::with_capacity((unpadded_row * self.height) as usize);
        {
            let mapped = slice.get_mapped_range();
            for row in mapped.chunks(padded_row as usize) {
                pixels.extend_from_slice(&row[..unpadded_row as usize]);
            }
        }
        readback.unmap();

        image::RgbaImage::from_raw(self.width, self.height, pixels)
            .ok_or_else(|| anyhow!("readback size does not match {}x{}", self.width, self.height))
    }
}
