//! Shader and preview resource management for the shaderlab preview tool.
//!
//! The crate owns everything between "the user picked a shader file and an
//! image" and "the frame shows the filtered image":
//!
//! ```text
//!   host / UI actions
//!          │
//!          ▼
//!   ResourceManager ── Shader (source ─▶ compile_pixel_shader ─▶ GpuFactory)
//!          │        └─ Preview (image_loader ─▶ GpuFactory texture + view)
//!          ▼
//!   Compositor::render_all ─▶ DrawList (Image / SetShaderState / ResetState)
//!          │
//!          ▼
//!   Compositor::execute ─▶ CommandSink (OffscreenRenderer, host backend)
//! ```
//!
//! Shaders and previews reference each other by id. The manager keeps both
//! directions in step: applying a shader records a back-reference on the
//! shader, destroying a shader clears every preview pointing at it, and
//! destroying a preview drops its id from every shader.
//!
//! Shader state is not bound while recording. `SetShaderState` names a
//! preview slot, and the execution pass binds whatever shader that slot
//! references when the command is consumed, then `ResetState` restores the
//! default pipeline for the draws that follow.

mod compile;
mod compositor;
mod device;
mod draw;
mod error;
pub mod gpu;
mod ids;
mod image_loader;
pub mod layout;
mod manager;
mod preview;
mod shader;
mod types;

#[cfg(test)]
mod testing;

pub use compile::{compile_pixel_shader, CompiledProgram, DEFAULT_PIXEL_SHADER, ENTRY_POINT};
pub use compositor::Compositor;
pub use device::{
    GpuFactory, NativeTextureHandle, ProgramHandle, SamplerAddress, SamplerFilter, SamplerHandle,
    SamplerSpec, TextureHandle,
};
pub use draw::{CommandSink, DrawCmd, DrawList};
pub use error::ResourceError;
pub use ids::{PreviewId, PreviewSlot, ShaderId};
pub use image_loader::{decode as decode_image, DecodedImage};
pub use layout::{DisplayMode, Rect};
pub use manager::ResourceManager;
pub use preview::{LoadedImage, Preview, DEFAULT_REGION};
pub use shader::Shader;
pub use types::ShaderTarget;
