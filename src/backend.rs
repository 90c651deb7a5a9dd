// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
The seam between the caches and a concrete graphics API.

A [GraphicsDevice] is a factory for native objects. It does no caching and keeps no registry of
what it created; [crate::context::GraphicsContext] layers both on top.
*/

use crate::descriptor::{DescriptorHandle, HeapFactory};
use crate::error::CreationError;
use crate::render_target::RenderTargetConfig;
use crate::state::{BlendState, DepthStencilState, RasterizerState, SamplerState};

/// Result of probing a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceStatus {
    Operational,
    /// Every native object created from this device is invalid.
    Lost,
}

/**
Creates native pipeline state, descriptor heaps and render targets.

Every creation function receives a debug label. Implementations forward it to the native API
where it has a place for one.

Creation on a lost device should fail with [CreationError::DeviceLost].
*/
pub trait GraphicsDevice: HeapFactory + Send + Sync + 'static {
    type Sampler: Send + Sync;
    type Blend: Send + Sync;
    type Rasterizer: Send + Sync;
    type DepthStencil: Send + Sync;
    type RenderTarget: Send;

    fn create_sampler(
        &self,
        descriptor: &SamplerState,
        label: &str,
    ) -> Result<Self::Sampler, CreationError>;

    fn create_blend_state(
        &self,
        descriptor: &BlendState,
        label: &str,
    ) -> Result<Self::Blend, CreationError>;

    fn create_rasterizer_state(
        &self,
        descriptor: &RasterizerState,
        label: &str,
    ) -> Result<Self::Rasterizer, CreationError>;

    fn create_depth_stencil_state(
        &self,
        descriptor: &DepthStencilState,
        label: &str,
    ) -> Result<Self::DepthStencil, CreationError>;

    /// Creates the texture behind a render target. `view` is the descriptor slot reserved for it.
    fn create_render_target(
        &self,
        config: &RenderTargetConfig,
        view: DescriptorHandle,
    ) -> Result<Self::RenderTarget, CreationError>;

    fn status(&self) -> DeviceStatus;
}
