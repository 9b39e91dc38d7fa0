//! Ownership of every shader and preview, and the rules that keep the
//! shader <-> preview references consistent.
//!
//! Both collections are insertion ordered; the order is what the host shows
//! as preview numbers. References between the two sides are ids, never
//! borrows, so entries can be removed without invalidating anything. Each
//! mutation that touches a reference updates both directions before it
//! returns.

use std::iter;
use std::path::PathBuf;

use tracing::{debug, info, warn};

use crate::compile::DEFAULT_PIXEL_SHADER;
use crate::device::GpuFactory;
use crate::error::ResourceError;
use crate::ids::{PreviewId, PreviewSlot, ShaderId};
use crate::preview::Preview;
use crate::shader::Shader;

pub struct ResourceManager {
    shaders: Vec<Shader>,
    previews: Vec<Preview>,
    background: Preview,
    /// Returned by [`ResourceManager::lookup_shader`] for unknown ids; never compiled.
    missing: Shader,
}

impl ResourceManager {
    pub fn new() -> Self {
        Self {
            shaders: Vec::new(),
            previews: Vec::new(),
            background: Preview::new(),
            missing: Shader::new(),
        }
    }

    pub fn shaders(&self) -> &[Shader] {
        &self.shaders
    }

    pub fn previews(&self) -> &[Preview] {
        &self.previews
    }

    pub fn background(&self) -> &Preview {
        &self.background
    }

    /// Mutable access for layout and path edits. Shader attachment goes
    /// through [`ResourceManager::apply_shader`] so both sides stay in step.
    pub fn background_mut(&mut self) -> &mut Preview {
        &mut self.background
    }

    pub fn shader(&self, id: &ShaderId) -> Option<&Shader> {
        self.shaders.iter().find(|shader| shader.id() == id)
    }

    pub fn shader_mut(&mut self, id: &ShaderId) -> Option<&mut Shader> {
        self.shaders.iter_mut().find(|shader| shader.id() == id)
    }

    pub fn preview(&self, id: &PreviewId) -> Option<&Preview> {
        self.previews.iter().find(|preview| preview.id() == id)
    }

    pub fn preview_mut(&mut self, id: &PreviewId) -> Option<&mut Preview> {
        self.previews.iter_mut().find(|preview| preview.id() == id)
    }

    pub fn slot(&self, slot: &PreviewSlot) -> Option<&Preview> {
        match slot {
            PreviewSlot::Background => Some(&self.background),
            PreviewSlot::Preview(id) => self.preview(id),
        }
    }

    pub fn slot_mut(&mut self, slot: &PreviewSlot) -> Option<&mut Preview> {
        match slot {
            PreviewSlot::Background => Some(&mut self.background),
            PreviewSlot::Preview(id) => self.preview_mut(id),
        }
    }

    /// The shader with `id`, or an uncompiled placeholder with no program
    /// and no sampler.
    pub fn lookup_shader(&self, id: &ShaderId) -> &Shader {
        self.shader(id).unwrap_or(&self.missing)
    }

    pub fn create_shader(
        &mut self,
        source: impl Into<String>,
        name: impl Into<String>,
        path: Option<PathBuf>,
    ) -> &mut Shader {
        self.add_shader(Shader::with_source(source, name, path))
    }

    /// A new shader holding the pass-through program.
    pub fn create_default_shader(&mut self) -> &mut Shader {
        self.create_shader(DEFAULT_PIXEL_SHADER, "Default.glsl", None)
    }

    pub fn add_shader(&mut self, shader: Shader) -> &mut Shader {
        info!(shader = %shader.name, id = %shader.id(), "shader created");
        let index = self.shaders.len();
        self.shaders.push(shader);
        &mut self.shaders[index]
    }

    pub fn create_preview(&mut self) -> &mut Preview {
        self.add_preview(Preview::new())
    }

    /// Appends `preview`. A shader it already points at gains the
    /// back-reference; an id naming no shader is dropped.
    pub fn add_preview(&mut self, mut preview: Preview) -> &mut Preview {
        self.reconcile_reference(&mut preview);
        info!(preview = %preview.name, id = %preview.id(), "preview created");
        let index = self.previews.len();
        self.previews.push(preview);
        &mut self.previews[index]
    }

    pub fn compile_shader(
        &mut self,
        id: &ShaderId,
        device: &mut dyn GpuFactory,
    ) -> Result<(), ResourceError> {
        self.shader_mut(id)
            .ok_or_else(|| ResourceError::shader_not_found(id))?
            .compile(device)
    }

    /// Re-reads a file-backed shader and compiles the new source.
    pub fn reload_and_compile_shader(
        &mut self,
        id: &ShaderId,
        device: &mut dyn GpuFactory,
    ) -> Result<(), ResourceError> {
        let shader = self
            .shader_mut(id)
            .ok_or_else(|| ResourceError::shader_not_found(id))?;
        shader.reload_source()?;
        shader.compile(device)
    }

    /// Clears every reference to the shader, releases it and removes it.
    pub fn destroy_shader(
        &mut self,
        id: &ShaderId,
        device: &mut dyn GpuFactory,
    ) -> Result<(), ResourceError> {
        let index = self
            .shaders
            .iter()
            .position(|shader| shader.id() == id)
            .ok_or_else(|| ResourceError::shader_not_found(id))?;
        self.destroy_shader_at(index, device);
        Ok(())
    }

    /// Drops the preview's id from every shader, releases its image and
    /// removes it.
    pub fn destroy_preview(
        &mut self,
        id: &PreviewId,
        device: &mut dyn GpuFactory,
    ) -> Result<(), ResourceError> {
        let index = self
            .previews
            .iter()
            .position(|preview| preview.id() == id)
            .ok_or_else(|| ResourceError::preview_not_found(id))?;
        self.destroy_preview_at(index, device);
        Ok(())
    }

    /// Destroys the most recently created shader.
    pub fn pop_shader(&mut self, device: &mut dyn GpuFactory) -> Option<ShaderId> {
        let index = self.shaders.len().checked_sub(1)?;
        Some(self.destroy_shader_at(index, device))
    }

    /// Destroys the most recently created preview.
    pub fn pop_preview(&mut self, device: &mut dyn GpuFactory) -> Option<PreviewId> {
        let index = self.previews.len().checked_sub(1)?;
        Some(self.destroy_preview_at(index, device))
    }

    pub fn load_image(
        &mut self,
        slot: &PreviewSlot,
        device: &mut dyn GpuFactory,
    ) -> Result<(), ResourceError> {
        self.slot_mut(slot)
            .ok_or_else(|| not_found(slot))?
            .load_image(device)
    }

    pub fn release_image(
        &mut self,
        slot: &PreviewSlot,
        device: &mut dyn GpuFactory,
    ) -> Result<(), ResourceError> {
        self.slot_mut(slot)
            .ok_or_else(|| not_found(slot))?
            .release_image(device);
        Ok(())
    }

    /// Attaches the shader to the preview in `slot`, recording the
    /// back-reference. Nothing changes if either side does not exist.
    pub fn apply_shader(
        &mut self,
        slot: &PreviewSlot,
        shader_id: &ShaderId,
    ) -> Result<(), ResourceError> {
        if self.shader(shader_id).is_none() {
            warn!(%slot, shader = %shader_id, "cannot apply unknown shader");
            return Err(ResourceError::shader_not_found(shader_id));
        }
        let preview = match slot {
            PreviewSlot::Background => &mut self.background,
            PreviewSlot::Preview(id) => self
                .previews
                .iter_mut()
                .find(|preview| preview.id() == id)
                .ok_or_else(|| ResourceError::preview_not_found(id))?,
        };
        preview.apply_shader(shader_id, &mut self.shaders);
        debug!(%slot, shader = %shader_id, "shader applied");
        Ok(())
    }

    /// Detaches whatever shader the preview in `slot` uses.
    pub fn clear_shader(&mut self, slot: &PreviewSlot) -> Result<(), ResourceError> {
        let preview = match slot {
            PreviewSlot::Background => &mut self.background,
            PreviewSlot::Preview(id) => self
                .previews
                .iter_mut()
                .find(|preview| preview.id() == id)
                .ok_or_else(|| ResourceError::preview_not_found(id))?,
        };
        preview.clear_shader(&mut self.shaders);
        Ok(())
    }

    /// Replaces the background. The old one's image and back-references are
    /// released; the new one's shader reference is reconciled.
    pub fn set_background(&mut self, mut background: Preview, device: &mut dyn GpuFactory) {
        self.reconcile_reference(&mut background);
        let mut previous = std::mem::replace(&mut self.background, background);
        for shader in &mut self.shaders {
            shader.remove_reference(previous.id());
        }
        previous.release_image(device);
        info!(preview = %self.background.name, id = %self.background.id(), "background set");
    }

    pub fn reset_background(&mut self, device: &mut dyn GpuFactory) {
        self.set_background(Preview::new(), device);
    }

    /// Shaders that can be attached: they have source and a live program.
    pub fn selectable_shaders(&self) -> impl Iterator<Item = &Shader> {
        self.shaders
            .iter()
            .filter(|shader| shader.has_source() && shader.is_compiled())
    }

    /// Previews (background included) currently pointing at `id`.
    pub fn previews_using<'a>(&'a self, id: &'a ShaderId) -> impl Iterator<Item = &'a Preview> {
        iter::once(&self.background)
            .chain(self.previews.iter())
            .filter(move |preview| preview.shader_id() == Some(id))
    }

    /// 1-based position of the preview in creation order.
    pub fn preview_index(&self, id: &PreviewId) -> Option<usize> {
        self.previews
            .iter()
            .position(|preview| preview.id() == id)
            .map(|index| index + 1)
    }

    /// Releases every GPU handle held by shaders and previews. Entries and
    /// references stay in place.
    pub fn release_all(&mut self, device: &mut dyn GpuFactory) {
        for shader in &mut self.shaders {
            shader.release(device);
        }
        for preview in iter::once(&mut self.background).chain(self.previews.iter_mut()) {
            preview.release_image(device);
        }
        debug!(
            shaders = self.shaders.len(),
            previews = self.previews.len(),
            "released all GPU resources"
        );
    }

    fn destroy_shader_at(&mut self, index: usize, device: &mut dyn GpuFactory) -> ShaderId {
        let previews = iter::once(&mut self.background).chain(self.previews.iter_mut());
        self.shaders[index].destroy(previews, device);
        self.shaders.remove(index).id().clone()
    }

    fn destroy_preview_at(&mut self, index: usize, device: &mut dyn GpuFactory) -> PreviewId {
        let mut preview = self.previews.remove(index);
        for shader in &mut self.shaders {
            shader.remove_reference(preview.id());
        }
        preview.release_image(device);
        info!(preview = %preview.name, id = %preview.id(), "preview destroyed");
        preview.id().clone()
    }

    fn reconcile_reference(&mut self, preview: &mut Preview) {
        let Some(id) = preview.shader_id().cloned() else {
            return;
        };
        if !preview.apply_shader(&id, &mut self.shaders) {
            preview.detach_shader();
        }
    }
}

impl Default for ResourceManager {
    fn default() -> Self {
        Self::new()
    }
}

fn not_found(slot: &PreviewSlot) -> ResourceError {
    match slot {
        PreviewSlot::Background => ResourceError::preview_not_found("background"),
        PreviewSlot::Preview(id) => ResourceError::preview_not_found(id),
    }
}
