// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//!Cross-platform device wrappers for the wgpu backend
//!
//! [BoundDevice] is a [GraphicsDevice]: hand it to [crate::context::GraphicsContext]. After the
//! device is lost, [BoundDevice::rebind] produces the replacement to pass to
//! [crate::context::GraphicsContext::device_reset].
use std::fmt::Formatter;

use crate::backend::{DeviceStatus, GraphicsDevice};
use crate::descriptor::{DescriptorHandle, HeapFactory};
use crate::entry_point::EntryPoint;
use crate::error::CreationError;
use crate::imp;
use crate::render_target::RenderTargetConfig;
use crate::state::{BlendState, DepthStencilState, RasterizerState, SamplerState};

pub use crate::imp::{
    DESCRIPTOR_STRIDE, NativeBlend, NativeDepthStencil, NativeHeap, NativeRasterizer,
    NativeRenderTarget,
};

///Cross-platform unbound device
#[derive(Debug)]
pub struct UnboundDevice(pub(crate) crate::imp::UnboundDevice);
impl UnboundDevice {
    ///Pick an adapter
    pub async fn pick(entry_point: &EntryPoint) -> Result<UnboundDevice, PickError> {
        crate::imp::UnboundDevice::pick(entry_point)
            .await
            .map(UnboundDevice)
            .map_err(PickError)
    }
}

#[derive(Debug)]
pub struct PickError(imp::Error);
impl std::fmt::Display for PickError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.0, f)
    }
}
impl std::error::Error for PickError {}

///Cross-platform bound device
///
/// Clones share the same underlying device.
#[derive(Debug, Clone)]
pub struct BoundDevice(pub(crate) imp::BoundDevice);

impl AsRef<imp::BoundDevice> for BoundDevice {
    fn as_ref(&self) -> &imp::BoundDevice {
        &self.0
    }
}

#[derive(Debug)]
pub struct BindError(imp::Error);
impl std::fmt::Display for BindError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.0, f)
    }
}
impl std::error::Error for BindError {}

impl BoundDevice {
    pub async fn bind(unbound_device: UnboundDevice) -> Result<Self, BindError> {
        let bind = crate::imp::BoundDevice::bind(unbound_device.0.adapter)
            .await
            .map_err(BindError)?;
        Ok(Self(bind))
    }

    /// Requests a fresh device from the adapter this one was bound on.
    pub async fn rebind(&self) -> Result<Self, BindError> {
        self.0.rebind().await.map(Self).map_err(BindError)
    }

    /// Destroys the device, which is then reported as lost.
    pub fn destroy(&self) {
        self.0.destroy();
    }

    pub fn device(&self) -> &wgpu::Device {
        self.0.device()
    }

    pub fn queue(&self) -> &wgpu::Queue {
        self.0.queue()
    }
}

// Boilerplate implementations

impl PartialEq for BoundDevice {
    fn eq(&self, other: &Self) -> bool {
        self.0.same_device(&other.0)
    }
}

impl Eq for BoundDevice {}

impl HeapFactory for BoundDevice {
    type Heap = NativeHeap;

    fn create_descriptor_heap(&self, capacity: u32) -> Result<NativeHeap, CreationError> {
        imp::create_heap(&self.0, capacity)
    }

    fn descriptor_stride(&self) -> u64 {
        DESCRIPTOR_STRIDE
    }
}

impl GraphicsDevice for BoundDevice {
    type Sampler = wgpu::Sampler;
    type Blend = NativeBlend;
    type Rasterizer = NativeRasterizer;
    type DepthStencil = NativeDepthStencil;
    type RenderTarget = NativeRenderTarget;

    fn create_sampler(
        &self,
        descriptor: &SamplerState,
        label: &str,
    ) -> Result<wgpu::Sampler, CreationError> {
        imp::create_sampler(&self.0, descriptor, label)
    }

    fn create_blend_state(
        &self,
        descriptor: &BlendState,
        label: &str,
    ) -> Result<NativeBlend, CreationError> {
        imp::create_blend(&self.0, descriptor, label)
    }

    fn create_rasterizer_state(
        &self,
        descriptor: &RasterizerState,
        label: &str,
    ) -> Result<NativeRasterizer, CreationError> {
        imp::create_rasterizer(&self.0, descriptor, label)
    }

    fn create_depth_stencil_state(
        &self,
        descriptor: &DepthStencilState,
        label: &str,
    ) -> Result<NativeDepthStencil, CreationError> {
        imp::create_depth_stencil(&self.0, descriptor, label)
    }

    fn create_render_target(
        &self,
        config: &RenderTargetConfig,
        view: DescriptorHandle,
    ) -> Result<NativeRenderTarget, CreationError> {
        imp::create_render_target(&self.0, config, view)
    }

    fn status(&self) -> DeviceStatus {
        if self.0.is_lost() {
            DeviceStatus::Lost
        } else {
            DeviceStatus::Operational
        }
    }
}
