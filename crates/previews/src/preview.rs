use std::path::PathBuf;

use tracing::{debug, warn};

use crate::device::{GpuFactory, TextureHandle};
use crate::error::ResourceError;
use crate::ids::{PreviewId, ShaderId};
use crate::image_loader;
use crate::layout::{DisplayMode, Rect};
use crate::shader::Shader;

/// Region a new preview occupies until the host positions it.
pub const DEFAULT_REGION: Rect = Rect::new(0.0, 0.0, 320.0, 240.0);

/// An uploaded image; dimensions only exist alongside the texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadedImage {
    pub texture: TextureHandle,
    pub width: u32,
    pub height: u32,
}

/// A named surface showing an image file, optionally filtered by a shader.
#[derive(Debug)]
pub struct Preview {
    id: PreviewId,
    pub name: String,
    pub path: PathBuf,
    pub open: bool,
    pub display_mode: DisplayMode,
    pub region: Rect,
    image: Option<LoadedImage>,
    shader: Option<ShaderId>,
}

impl Preview {
    pub fn new() -> Self {
        Self {
            id: PreviewId::generate(),
            name: String::new(),
            path: PathBuf::new(),
            open: true,
            display_mode: DisplayMode::default(),
            region: DEFAULT_REGION,
            image: None,
            shader: None,
        }
    }

    /// A preview for `path`, named after the file. No image is loaded yet.
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            name,
            path,
            ..Self::new()
        }
    }

    pub fn id(&self) -> &PreviewId {
        &self.id
    }

    pub fn image(&self) -> Option<&LoadedImage> {
        self.image.as_ref()
    }

    pub fn texture(&self) -> Option<TextureHandle> {
        self.image.map(|image| image.texture)
    }

    pub fn dimensions(&self) -> Option<(u32, u32)> {
        self.image.map(|image| (image.width, image.height))
    }

    pub fn shader_id(&self) -> Option<&ShaderId> {
        self.shader.as_ref()
    }

    pub fn has_shader(&self) -> bool {
        self.shader.is_some()
    }

    /// Decodes `path` and uploads it as an immutable RGBA8 texture.
    ///
    /// Any previously loaded image is released first. On failure the
    /// preview is left without a texture.
    pub fn load_image(&mut self, device: &mut dyn GpuFactory) -> Result<(), ResourceError> {
        self.release_image(device);

        let decoded = image_loader::decode(&self.path).inspect_err(|err| {
            warn!(preview = %self.name, id = %self.id, error = %err, "failed to load image");
        })?;

        let label = format!("preview {} ({})", self.name, self.id);
        let native = device
            .create_texture(&label, decoded.width, decoded.height, &decoded.rgba)
            .inspect_err(|err| {
                warn!(preview = %self.name, id = %self.id, error = %err, "failed to create texture");
            })?;
        let view = device.create_texture_view(&label, native);
        // The view keeps the storage alive; the native handle is not needed past this point.
        device.release_texture(native);
        let texture = view.inspect_err(|err| {
            warn!(preview = %self.name, id = %self.id, error = %err, "failed to create shader resource view");
        })?;

        self.image = Some(LoadedImage {
            texture,
            width: decoded.width,
            height: decoded.height,
        });
        debug!(
            preview = %self.name,
            id = %self.id,
            width = decoded.width,
            height = decoded.height,
            "image loaded"
        );
        Ok(())
    }

    pub fn release_image(&mut self, device: &mut dyn GpuFactory) {
        if let Some(image) = self.image.take() {
            device.release_texture_view(image.texture);
        }
    }

    /// Points this preview at `shader_id` and registers the back-reference
    /// on the matching shader in `shaders`.
    ///
    /// The id is stored even when no such shader exists; the return value
    /// reports whether the back-reference could be recorded.
    pub(crate) fn apply_shader(&mut self, shader_id: &ShaderId, shaders: &mut [Shader]) -> bool {
        if let Some(previous) = self.shader.take() {
            if previous != *shader_id {
                if let Some(shader) = shaders.iter_mut().find(|shader| *shader.id() == previous) {
                    shader.remove_reference(&self.id);
                }
            }
        }
        self.shader = Some(shader_id.clone());

        match shaders.iter_mut().find(|shader| shader.id() == shader_id) {
            Some(shader) => {
                shader.add_reference(&self.id);
                true
            }
            None => {
                warn!(preview = %self.name, id = %self.id, shader = %shader_id, "applied shader does not exist");
                false
            }
        }
    }

    /// Detaches the current shader, dropping its back-reference.
    pub(crate) fn clear_shader(&mut self, shaders: &mut [Shader]) {
        if let Some(previous) = self.shader.take() {
            if let Some(shader) = shaders.iter_mut().find(|shader| *shader.id() == previous) {
                shader.remove_reference(&self.id);
            }
        }
    }

    /// Forgets the shader id without touching any shader.
    pub(crate) fn detach_shader(&mut self) {
        self.shader = None;
    }
}

impl Default for Preview {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for Preview {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Preview {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{write_png, FakeFactory, WGSL_INVERT};

    #[test]
    fn load_release_load_keeps_dimensions() {
        let temp = tempfile::tempdir().unwrap();
        let mut device = FakeFactory::default();
        let mut preview = Preview::with_path(write_png(temp.path(), "wide.png", 8, 4));
        assert_eq!(preview.name, "wide.png");

        preview.load_image(&mut device).expect("first load");
        let first = preview.dimensions();
        assert_eq!(first, Some((8, 4)));

        preview.release_image(&mut device);
        assert!(preview.image().is_none());
        preview.release_image(&mut device);

        preview.load_image(&mut device).expect("second load");
        assert_eq!(preview.dimensions(), first);
        assert_eq!(device.live_views(), 1);
        assert_eq!(device.live_textures(), 0);
    }

    #[test]
    fn reload_replaces_previous_texture() {
        let temp = tempfile::tempdir().unwrap();
        let mut device = FakeFactory::default();
        let mut preview = Preview::with_path(write_png(temp.path(), "a.png", 2, 2));

        preview.load_image(&mut device).unwrap();
        let first = preview.texture();
        preview.load_image(&mut device).unwrap();
        assert_ne!(preview.texture(), first);
        assert_eq!(device.live_views(), 1);
    }

    #[test]
    fn missing_file_leaves_texture_unset() {
        let temp = tempfile::tempdir().unwrap();
        let mut device = FakeFactory::default();
        let mut preview = Preview::with_path(temp.path().join("nope.png"));

        let err = preview.load_image(&mut device).unwrap_err();
        assert!(matches!(err, ResourceError::ImageDecodeFailure { .. }));
        assert!(preview.texture().is_none());
        assert!(preview.dimensions().is_none());
        assert_eq!(device.texture_requests, 0);
    }

    #[test]
    fn upload_failures_release_partial_texture() {
        let temp = tempfile::tempdir().unwrap();
        let path = write_png(temp.path(), "a.png", 2, 2);

        let mut device = FakeFactory {
            fail_texture: true,
            ..FakeFactory::default()
        };
        let mut preview = Preview::with_path(&path);
        let err = preview.load_image(&mut device).unwrap_err();
        assert!(matches!(err, ResourceError::TextureUploadFailure(_)));
        assert!(preview.texture().is_none());

        let mut device = FakeFactory {
            fail_view: true,
            ..FakeFactory::default()
        };
        let err = preview.load_image(&mut device).unwrap_err();
        assert!(matches!(err, ResourceError::ShaderResourceViewFailure(_)));
        assert!(err.is_upload_error());
        assert!(preview.texture().is_none());
        assert_eq!(device.texture_requests, 1);
        assert_eq!(device.live_total(), 0);
    }

    #[test]
    fn apply_shader_back_reference_is_recorded_once() {
        let mut shaders = vec![Shader::with_source(WGSL_INVERT, "invert", None)];
        let id = shaders[0].id().clone();
        let mut preview = Preview::new();

        assert!(preview.apply_shader(&id, &mut shaders));
        assert!(preview.apply_shader(&id, &mut shaders));
        assert_eq!(preview.shader_id(), Some(&id));
        assert_eq!(shaders[0].referenced_by(), &[preview.id().clone()]);
    }

    #[test]
    fn switching_shader_moves_back_reference() {
        let mut shaders = vec![Shader::new(), Shader::new()];
        let (first, second) = (shaders[0].id().clone(), shaders[1].id().clone());
        let mut preview = Preview::new();

        preview.apply_shader(&first, &mut shaders);
        preview.apply_shader(&second, &mut shaders);
        assert!(shaders[0].referenced_by().is_empty());
        assert_eq!(shaders[1].referenced_by().len(), 1);

        preview.clear_shader(&mut shaders);
        assert!(!preview.has_shader());
        assert!(shaders[1].referenced_by().is_empty());
    }

    #[test]
    fn unknown_shader_is_stored_without_back_reference() {
        let mut shaders = vec![Shader::new()];
        let ghost = ShaderId::generate();
        let mut preview = Preview::new();

        assert!(!preview.apply_shader(&ghost, &mut shaders));
        assert_eq!(preview.shader_id(), Some(&ghost));
        assert!(shaders[0].referenced_by().is_empty());
    }
}
