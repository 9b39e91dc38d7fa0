//! The shared immediate-mode draw stream.
//!
//! Background, previews and any host UI append to one [`DrawList`] per
//! frame. Shader state is injected as tagged commands rather than closures:
//! `SetShaderState` asks the execution pass to bind whatever shader the slot
//! references *when the command is consumed*, and `ResetState` restores the
//! default textured pipeline so later draws are unaffected.

use serde::Serialize;

use crate::device::{ProgramHandle, SamplerHandle, TextureHandle};
use crate::ids::PreviewSlot;
use crate::layout::Rect;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DrawCmd {
    /// Textured quad drawn with whatever pipeline state is current.
    Image { texture: TextureHandle, rect: Rect },
    /// Bind the shader `slot` references at execution time, fed with `texture`.
    SetShaderState {
        slot: PreviewSlot,
        texture: TextureHandle,
    },
    /// Restore the default (unshaded, textured) pipeline.
    ResetState,
}

/// Recorded draw stream for one frame, kept in submission order.
#[derive(Debug, Default, Clone, Serialize)]
#[serde(transparent)]
pub struct DrawList {
    commands: Vec<DrawCmd>,
}

impl DrawList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clears recorded commands, keeping the allocation for the next frame.
    pub fn clear(&mut self) {
        self.commands.clear();
    }

    pub fn push(&mut self, cmd: DrawCmd) {
        self.commands.push(cmd);
    }

    pub fn push_image(&mut self, texture: TextureHandle, rect: Rect) {
        self.push(DrawCmd::Image { texture, rect });
    }

    pub fn commands(&self) -> &[DrawCmd] {
        &self.commands
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

/// Backend consuming an executed draw stream.
///
/// Implementations must ignore handles they no longer know about.
pub trait CommandSink {
    /// Makes `program` current for following draws, sampling `texture` through `sampler`.
    fn bind_shader(
        &mut self,
        program: ProgramHandle,
        texture: TextureHandle,
        sampler: SamplerHandle,
    );

    fn reset_state(&mut self);

    fn draw_image(&mut self, texture: TextureHandle, rect: Rect);
}
