use tracing::trace;

use crate::draw::{CommandSink, DrawCmd, DrawList};
use crate::ids::PreviewSlot;
use crate::layout::{image_rects, Rect};
use crate::manager::ResourceManager;
use crate::preview::Preview;

/// Records the background and previews into the shared draw stream, and
/// later replays that stream against a backend.
///
/// Recording and execution are separate passes: the host may append its own
/// commands in between, and may attach or detach shaders before the stream
/// is consumed. Shader lookups therefore happen during [`Compositor::execute`].
#[derive(Debug, Default, Clone, Copy)]
pub struct Compositor;

impl Compositor {
    pub fn new() -> Self {
        Self
    }

    /// Records one frame: the background laid out over `display` first,
    /// then every open preview in creation order.
    pub fn render_all(&self, manager: &ResourceManager, display: Rect, list: &mut DrawList) {
        let before = list.len();
        let background = manager.background();
        self.record(PreviewSlot::Background, background, display, list);

        for preview in manager.previews().iter().filter(|preview| preview.open) {
            self.record(PreviewSlot::from(preview.id()), preview, preview.region, list);
        }
        trace!(commands = list.len() - before, "recorded frame");
    }

    /// Replays `list` into `sink`, binding shaders by what each slot
    /// references now.
    pub fn execute(&self, manager: &ResourceManager, list: &DrawList, sink: &mut dyn CommandSink) {
        for cmd in list.commands() {
            match cmd {
                DrawCmd::Image { texture, rect } => sink.draw_image(*texture, *rect),
                DrawCmd::SetShaderState { slot, texture } => {
                    let Some(shader_id) = manager.slot(slot).and_then(Preview::shader_id) else {
                        trace!(%slot, "no shader to bind");
                        continue;
                    };
                    manager
                        .lookup_shader(shader_id)
                        .apply_to_command_stream(Some(*texture), sink);
                }
                DrawCmd::ResetState => sink.reset_state(),
            }
        }
    }

    fn record(&self, slot: PreviewSlot, preview: &Preview, region: Rect, list: &mut DrawList) {
        let Some(image) = preview.image() else {
            return;
        };
        let shaded = preview.has_shader();
        if shaded {
            list.push(DrawCmd::SetShaderState {
                slot,
                texture: image.texture,
            });
        }
        for rect in image_rects(preview.display_mode, region, (image.width, image.height)) {
            list.push_image(image.texture, rect);
        }
        if shaded {
            list.push(DrawCmd::ResetState);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::TextureHandle;
    use crate::layout::DisplayMode;
    use crate::testing::{write_png, FakeFactory, RecordingSink, SinkEvent, WGSL_INVERT};
    use crate::types::ShaderTarget;
    use crate::{PreviewId, ShaderId};

    const DISPLAY: Rect = Rect::from_size(800.0, 600.0);

    struct Scene {
        temp: tempfile::TempDir,
        device: FakeFactory,
        manager: ResourceManager,
    }

    impl Scene {
        fn new() -> Self {
            Self {
                temp: tempfile::tempdir().unwrap(),
                device: FakeFactory::default(),
                manager: ResourceManager::new(),
            }
        }

        fn shader(&mut self) -> ShaderId {
            let shader = self.manager.create_shader(WGSL_INVERT, "invert.wgsl", None);
            shader.target = ShaderTarget::Wgsl;
            let id = shader.id().clone();
            self.manager.compile_shader(&id, &mut self.device).unwrap();
            id
        }

        fn preview(&mut self, name: &str) -> PreviewId {
            let path = write_png(self.temp.path(), name, 4, 4);
            let preview = self.manager.add_preview(Preview::with_path(path));
            preview.display_mode = DisplayMode::Stretch;
            let id = preview.id().clone();
            self.manager
                .load_image(&PreviewSlot::from(&id), &mut self.device)
                .unwrap();
            id
        }

        fn texture(&self, id: &PreviewId) -> TextureHandle {
            self.manager.preview(id).unwrap().texture().unwrap()
        }

        fn record(&self) -> DrawList {
            let mut list = DrawList::new();
            Compositor::new().render_all(&self.manager, DISPLAY, &mut list);
            list
        }
    }

    #[test]
    fn shaded_preview_is_bracketed_and_plain_one_is_not() {
        let mut scene = Scene::new();
        let shader = scene.shader();
        let shaded = scene.preview("shaded.png");
        let plain = scene.preview("plain.png");
        scene
            .manager
            .apply_shader(&PreviewSlot::from(&shaded), &shader)
            .unwrap();

        let list = scene.record();
        let shaded_texture = scene.texture(&shaded);
        let region = scene.manager.preview(&shaded).unwrap().region;
        assert_eq!(
            list.commands(),
            &[
                DrawCmd::SetShaderState {
                    slot: PreviewSlot::from(&shaded),
                    texture: shaded_texture,
                },
                DrawCmd::Image {
                    texture: shaded_texture,
                    rect: region,
                },
                DrawCmd::ResetState,
                DrawCmd::Image {
                    texture: scene.texture(&plain),
                    rect: region,
                },
            ]
        );
    }

    #[test]
    fn background_comes_first_and_closed_previews_are_skipped() {
        let mut scene = Scene::new();
        let open = scene.preview("open.png");
        let closed = scene.preview("closed.png");
        scene.manager.preview_mut(&closed).unwrap().open = false;
        scene.manager.background_mut().path = write_png(scene.temp.path(), "bg.png", 8, 6);
        scene.manager.background_mut().display_mode = DisplayMode::Fit;
        scene
            .manager
            .load_image(&PreviewSlot::Background, &mut scene.device)
            .unwrap();

        let list = scene.record();
        let background = scene.manager.background().texture().unwrap();
        let textures: Vec<_> = list
            .commands()
            .iter()
            .map(|cmd| match cmd {
                DrawCmd::Image { texture, .. } => *texture,
                other => panic!("unexpected command {other:?}"),
            })
            .collect();
        assert_eq!(textures, vec![background, scene.texture(&open)]);
    }

    #[test]
    fn execution_binds_the_shader_referenced_at_execution_time() {
        let mut scene = Scene::new();
        let first = scene.shader();
        let second = scene.shader();
        let preview = scene.preview("p.png");
        let slot = PreviewSlot::from(&preview);
        scene.manager.apply_shader(&slot, &first).unwrap();

        let list = scene.record();
        scene.manager.apply_shader(&slot, &second).unwrap();

        let mut sink = RecordingSink::default();
        Compositor::new().execute(&scene.manager, &list, &mut sink);
        let expected = scene.manager.lookup_shader(&second);
        let texture = scene.texture(&preview);
        assert_eq!(
            sink.events,
            vec![
                SinkEvent::Bind {
                    program: expected.program().unwrap(),
                    texture,
                    sampler: expected.sampler().unwrap(),
                },
                SinkEvent::Draw {
                    texture,
                    rect: scene.manager.preview(&preview).unwrap().region,
                },
                SinkEvent::Reset,
            ]
        );
    }

    #[test]
    fn destroyed_shader_or_preview_skips_binding_but_keeps_reset() {
        let mut scene = Scene::new();
        let shader = scene.shader();
        let preview = scene.preview("p.png");
        scene
            .manager
            .apply_shader(&PreviewSlot::from(&preview), &shader)
            .unwrap();
        let list = scene.record();

        scene.manager.destroy_shader(&shader, &mut scene.device).unwrap();
        let mut sink = RecordingSink::default();
        Compositor::new().execute(&scene.manager, &list, &mut sink);
        assert!(matches!(
            sink.events.as_slice(),
            [SinkEvent::Draw { .. }, SinkEvent::Reset]
        ));

        scene.manager.destroy_preview(&preview, &mut scene.device).unwrap();
        let mut sink = RecordingSink::default();
        Compositor::new().execute(&scene.manager, &list, &mut sink);
        assert!(!sink.events.iter().any(|event| matches!(event, SinkEvent::Bind { .. })));
    }

    #[test]
    fn failed_image_load_renders_nothing_for_that_preview() {
        let mut scene = Scene::new();
        let missing = scene.manager.add_preview(Preview::with_path("/nonexistent/missing.png"));
        let id = missing.id().clone();
        assert!(scene
            .manager
            .load_image(&PreviewSlot::from(&id), &mut scene.device)
            .is_err());

        let list = scene.record();
        assert!(list.is_empty());
        let mut sink = RecordingSink::default();
        Compositor::new().execute(&scene.manager, &list, &mut sink);
        assert!(sink.events.is_empty());
    }

    #[test]
    fn tile_mode_emits_one_image_per_cell() {
        let mut scene = Scene::new();
        let preview = scene.preview("tile.png");
        {
            let preview = scene.manager.preview_mut(&preview).unwrap();
            preview.display_mode = DisplayMode::Tile;
            preview.region = Rect::from_size(500.0, 300.0);
        }
        let list = scene.record();
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn draw_stream_serializes_as_tagged_commands() {
        let mut scene = Scene::new();
        let shader = scene.shader();
        let preview = scene.preview("p.png");
        scene
            .manager
            .apply_shader(&PreviewSlot::from(&preview), &shader)
            .unwrap();

        let json = serde_json::to_value(scene.record()).unwrap();
        let kinds: Vec<_> = json
            .as_array()
            .unwrap()
            .iter()
            .map(|cmd| cmd["kind"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(kinds, ["set_shader_state", "image", "reset_state"]);
        assert_eq!(json[0]["slot"]["preview"], preview.as_str());
    }
}
