use std::collections::HashMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use previews::gpu::{GpuContext, OffscreenRenderer, WgpuFactory};
use previews::{
    Compositor, DrawList, GpuFactory, Preview, PreviewSlot, Rect, ResourceManager, Shader, ShaderId,
    ShaderTarget,
};
use tracing::{info, warn};

use crate::cli::RenderArgs;
use crate::run::Settings;

/// Gap between preview cells and around the frame edge, in pixels.
const CELL_MARGIN: f32 = 16.0;

pub fn run(args: &RenderArgs, settings: &Settings) -> Result<()> {
    let (width, height) = args.size.unwrap_or(settings.display);
    let context = GpuContext::new_headless()?;
    info!(adapter = %context.adapter_info.name, width, height, "rendering offscreen frame");
    let mut factory = WgpuFactory::new(&context)?;
    let mut manager = ResourceManager::new();

    let result = render_frame(args, settings, (width, height), &mut factory, &mut manager);
    manager.release_all(&mut factory);
    tracing::debug!(live = ?factory.live_resources(), "released frame resources");
    result
}

fn render_frame(
    args: &RenderArgs,
    settings: &Settings,
    (width, height): (u32, u32),
    factory: &mut WgpuFactory,
    manager: &mut ResourceManager,
) -> Result<()> {
    let target_override = args.target;
    let mut shaders = ShaderCache::new(target_override, settings.target);

    if let Some(image) = &args.background {
        let mut background = Preview::with_path(image);
        background.display_mode = args.background_mode.unwrap_or(settings.background_mode);
        manager.set_background(background, factory);
        load_image(manager, &PreviewSlot::Background, factory);
        if let Some(path) = &args.background_shader {
            shaders.attach(manager, factory, &PreviewSlot::Background, path)?;
        }
    }

    let mode = args.mode.unwrap_or(settings.preview_mode);
    let regions = grid_regions(args.previews.len(), width as f32, height as f32);
    for (spec, region) in args.previews.iter().zip(regions) {
        let preview = manager.add_preview(Preview::with_path(&spec.image));
        preview.display_mode = mode;
        preview.region = region;
        let slot = PreviewSlot::from(preview.id());
        load_image(manager, &slot, factory);
        if let Some(path) = &spec.shader {
            shaders.attach(manager, factory, &slot, path)?;
        }
    }

    for preview in manager.previews() {
        let shader = preview
            .shader_id()
            .map(|id| manager.lookup_shader(id).name.as_str())
            .unwrap_or("none");
        info!(
            index = manager.preview_index(preview.id()).unwrap_or_default(),
            preview = %preview.name,
            shader,
            "preview ready"
        );
    }

    let mut list = DrawList::new();
    Compositor::new().render_all(manager, Rect::from_size(width as f32, height as f32), &mut list);
    if let Some(path) = &args.dump_commands {
        dump_commands(&list, path)?;
    }

    let renderer = OffscreenRenderer::new(factory, width, height, settings.clear_color)?;
    let frame = renderer.render(factory, manager, &list)?;
    frame
        .save(&args.output)
        .with_context(|| format!("failed to write {}", args.output.display()))?;
    info!(output = %args.output.display(), commands = list.len(), "frame written");
    Ok(())
}

/// Image failures are reported and leave the slot empty; the frame still renders.
fn load_image(manager: &mut ResourceManager, slot: &PreviewSlot, device: &mut dyn GpuFactory) {
    if let Err(err) = manager.load_image(slot, device) {
        warn!(%slot, error = %err, "image not shown");
    }
}

/// Loads each shader file once, however many previews use it.
struct ShaderCache {
    explicit: Option<ShaderTarget>,
    fallback: ShaderTarget,
    loaded: HashMap<PathBuf, ShaderId>,
}

impl ShaderCache {
    fn new(explicit: Option<ShaderTarget>, fallback: ShaderTarget) -> Self {
        Self {
            explicit,
            fallback,
            loaded: HashMap::new(),
        }
    }

    /// Applies the shader at `path` to `slot` when it compiles. A shader
    /// that fails to compile leaves the slot unshaded.
    fn attach(
        &mut self,
        manager: &mut ResourceManager,
        device: &mut dyn GpuFactory,
        slot: &PreviewSlot,
        path: &Path,
    ) -> Result<()> {
        let id = match self.loaded.get(path) {
            Some(id) => id.clone(),
            None => {
                let mut shader = Shader::from_file(path)
                    .with_context(|| format!("failed to read shader {}", path.display()))?;
                shader.target = self
                    .explicit
                    .unwrap_or_else(|| ShaderTarget::from_path(path, self.fallback));
                let id = manager.add_shader(shader).id().clone();
                if let Err(err) = manager.compile_shader(&id, device) {
                    // Stays in the manager but unselectable.
                    warn!(shader = %path.display(), error = %err, "shader failed to compile");
                }
                self.loaded.insert(path.to_path_buf(), id.clone());
                id
            }
        };

        if manager.selectable_shaders().any(|shader| *shader.id() == id) {
            manager.apply_shader(slot, &id)?;
        } else {
            warn!(%slot, shader = %path.display(), "shader did not compile; drawing unshaded");
        }
        Ok(())
    }
}

fn dump_commands(list: &DrawList, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(list).context("failed to serialise draw stream")?;
    if path == Path::new("-") {
        let mut stdout = io::stdout().lock();
        writeln!(stdout, "{json}").context("failed to write draw stream")?;
    } else {
        fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))?;
    }
    Ok(())
}

/// Splits the frame into a near-square grid of `count` cells.
fn grid_regions(count: usize, width: f32, height: f32) -> Vec<Rect> {
    if count == 0 {
        return Vec::new();
    }
    let columns = (count as f32).sqrt().ceil() as usize;
    let rows = count.div_ceil(columns);
    let cell_width = ((width - CELL_MARGIN * (columns as f32 + 1.0)) / columns as f32).max(0.0);
    let cell_height = ((height - CELL_MARGIN * (rows as f32 + 1.0)) / rows as f32).max(0.0);

    (0..count)
        .map(|index| {
            let (column, row) = (index % columns, index / columns);
            Rect::new(
                CELL_MARGIN + column as f32 * (cell_width + CELL_MARGIN),
                CELL_MARGIN + row as f32 * (cell_height + CELL_MARGIN),
                cell_width,
                cell_height,
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use previews::{
        CompiledProgram, NativeTextureHandle, ProgramHandle, ResourceError, SamplerHandle,
        SamplerSpec, TextureHandle, DEFAULT_PIXEL_SHADER,
    };

    #[derive(Default)]
    struct CountingFactory {
        next: u64,
        programs: usize,
    }

    impl CountingFactory {
        fn mint(&mut self) -> u64 {
            self.next += 1;
            self.next
        }
    }

    impl GpuFactory for CountingFactory {
        fn create_program(
            &mut self,
            _label: &str,
            _program: &CompiledProgram,
        ) -> Result<ProgramHandle, ResourceError> {
            self.programs += 1;
            Ok(ProgramHandle::from_raw(self.mint()))
        }

        fn create_sampler(
            &mut self,
            _label: &str,
            _spec: &SamplerSpec,
        ) -> Result<SamplerHandle, ResourceError> {
            Ok(SamplerHandle::from_raw(self.mint()))
        }

        fn create_texture(
            &mut self,
            _label: &str,
            _width: u32,
            _height: u32,
            _rgba: &[u8],
        ) -> Result<NativeTextureHandle, ResourceError> {
            Ok(NativeTextureHandle::from_raw(self.mint()))
        }

        fn create_texture_view(
            &mut self,
            _label: &str,
            _texture: NativeTextureHandle,
        ) -> Result<TextureHandle, ResourceError> {
            Ok(TextureHandle::from_raw(self.mint()))
        }

        fn release_program(&mut self, _handle: ProgramHandle) {}

        fn release_sampler(&mut self, _handle: SamplerHandle) {}

        fn release_texture(&mut self, _handle: NativeTextureHandle) {}

        fn release_texture_view(&mut self, _handle: TextureHandle) {}
    }

    #[test]
    fn broken_shader_leaves_preview_unshaded() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("broken.glsl");
        fs::write(&path, "void main( {").unwrap();

        let mut manager = ResourceManager::new();
        let mut device = CountingFactory::default();
        let preview = manager.create_preview().id().clone();
        let slot = PreviewSlot::from(&preview);
        let mut cache = ShaderCache::new(None, ShaderTarget::Glsl450);

        cache.attach(&mut manager, &mut device, &slot, &path).unwrap();
        assert_eq!(manager.shaders().len(), 1);
        assert!(!manager.shaders()[0].is_compiled());
        assert!(!manager.preview(&preview).unwrap().has_shader());
        assert_eq!(device.programs, 0);
    }

    #[test]
    fn shared_shader_file_is_compiled_once() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("pass.frag");
        fs::write(&path, DEFAULT_PIXEL_SHADER).unwrap();

        let mut manager = ResourceManager::new();
        let mut device = CountingFactory::default();
        let first = manager.create_preview().id().clone();
        let second = manager.create_preview().id().clone();
        let mut cache = ShaderCache::new(None, ShaderTarget::Wgsl);
        for id in [&first, &second] {
            cache
                .attach(&mut manager, &mut device, &PreviewSlot::from(id), &path)
                .unwrap();
        }

        assert_eq!(device.programs, 1);
        let shader = &manager.shaders()[0];
        assert_eq!(shader.target, ShaderTarget::Glsl450);
        assert_eq!(shader.referenced_by(), &[first.clone(), second.clone()]);
        assert_eq!(manager.preview(&second).unwrap().shader_id(), Some(shader.id()));
    }

    #[test]
    fn single_preview_fills_frame_inside_margin() {
        assert_eq!(
            grid_regions(1, 200.0, 100.0),
            vec![Rect::new(16.0, 16.0, 168.0, 68.0)]
        );
    }

    #[test]
    fn grid_is_row_major_and_near_square() {
        let regions = grid_regions(3, 232.0, 232.0);
        assert_eq!(regions.len(), 3);
        assert_eq!(regions[0], Rect::new(16.0, 16.0, 92.0, 92.0));
        assert_eq!(regions[1].x, 124.0);
        assert_eq!(regions[2], Rect::new(16.0, 124.0, 92.0, 92.0));
        assert!(grid_regions(0, 100.0, 100.0).is_empty());
    }
}
