//! wgpu implementation of the GPU seam.
//!
//! - `context` creates a headless instance/adapter/device.
//! - `pipeline` owns the shared quad vertex stage, the texture + sampler
//!   bind group layout, and builds one render pipeline per pixel shader.
//! - `factory` implements [`GpuFactory`](crate::GpuFactory), keeping native
//!   objects in handle-keyed maps and turning validation errors into
//!   [`ResourceError`](crate::ResourceError)s.
//! - `offscreen` executes a recorded draw stream into an RGBA8 target and
//!   reads it back.

mod context;
mod factory;
mod offscreen;
mod pipeline;

pub use context::GpuContext;
pub use factory::{LiveResources, WgpuFactory};
pub use offscreen::OffscreenRenderer;
