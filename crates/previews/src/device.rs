//! The GPU resource factory seam.
//!
//! Shaders and previews never hold native objects directly; they hold small
//! `Copy` handles minted by a [`GpuFactory`] and hand them back for release.
//! The rendering device owns the objects behind the handles, so the core can
//! be exercised against a fake factory and driven by wgpu in production.

use serde::Serialize;

use crate::compile::CompiledProgram;
use crate::error::ResourceError;

macro_rules! gpu_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
        #[serde(transparent)]
        pub struct $name(u64);

        impl $name {
            pub fn from_raw(raw: u64) -> Self {
                Self(raw)
            }

            pub fn raw(self) -> u64 {
                self.0
            }
        }
    };
}

gpu_handle!(
    /// A compiled pixel-shader program ready to be bound.
    ProgramHandle
);
gpu_handle!(
    /// Sampler state created alongside a program.
    SamplerHandle
);
gpu_handle!(
    /// Native 2D texture storage; only alive between upload and view creation.
    NativeTextureHandle
);
gpu_handle!(
    /// Shader-resource view of an uploaded image; what previews keep and draw.
    TextureHandle
);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplerFilter {
    Nearest,
    Linear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplerAddress {
    Clamp,
    Wrap,
}

/// Sampler configuration requested from the factory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplerSpec {
    pub filter: SamplerFilter,
    /// Applied to the U, V and W axes alike.
    pub address: SamplerAddress,
    /// `None` means a plain (non-comparison) sampler.
    pub compare: Option<wgpu::CompareFunction>,
}

impl SamplerSpec {
    /// Linear min/mag/mip filtering, wrap addressing, no comparison.
    pub const fn linear_wrap() -> Self {
        Self {
            filter: SamplerFilter::Linear,
            address: SamplerAddress::Wrap,
            compare: None,
        }
    }

    /// The sampler used by the default (unshaded) pipeline.
    pub const fn linear_clamp() -> Self {
        Self {
            filter: SamplerFilter::Linear,
            address: SamplerAddress::Clamp,
            compare: None,
        }
    }
}

/// Creates and releases the GPU objects behind shaders and previews.
///
/// Release calls must tolerate handles that are already gone.
pub trait GpuFactory {
    fn create_program(
        &mut self,
        label: &str,
        program: &CompiledProgram,
    ) -> Result<ProgramHandle, ResourceError>;

    fn create_sampler(
        &mut self,
        label: &str,
        spec: &SamplerSpec,
    ) -> Result<SamplerHandle, ResourceError>;

    /// Uploads tightly packed RGBA8 rows into an immutable 2D texture.
    fn create_texture(
        &mut self,
        label: &str,
        width: u32,
        height: u32,
        rgba: &[u8],
    ) -> Result<NativeTextureHandle, ResourceError>;

    fn create_texture_view(
        &mut self,
        label: &str,
        texture: NativeTextureHandle,
    ) -> Result<TextureHandle, ResourceError>;

    fn release_program(&mut self, handle: ProgramHandle);

    fn release_sampler(&mut self, handle: SamplerHandle);

    /// Drops the factory's reference to the storage; views created from it stay valid.
    fn release_texture(&mut self, handle: NativeTextureHandle);

    fn release_texture_view(&mut self, handle: TextureHandle);
}
