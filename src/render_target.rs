// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Render targets that survive device loss.
//!
//! A [RenderTarget] owns a native texture and one render-target-view descriptor slot. Its
//! [RenderTargetConfig] is the logical part: it is kept while the device is lost and the native
//! part is rebuilt from it on reset.

use crate::backend::GraphicsDevice;
use crate::context::DeviceResources;
use crate::descriptor::DescriptorHandle;
use crate::error::{AllocationError, CreationError, StaleHandle};
use crate::lifecycle::{ResourceId, Shared, TrackedResource};
use crate::pixel_formats::PixelFormat;
use std::fmt::{Debug, Formatter};
use std::sync::{MutexGuard, PoisonError};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RenderTargetConfig {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
}

impl RenderTargetConfig {
    pub fn new(name: impl Into<String>, width: u32, height: u32, format: PixelFormat) -> Self {
        RenderTargetConfig {
            name: name.into(),
            width,
            height,
            format,
        }
    }
}

struct Native<T> {
    target: T,
    descriptor: DescriptorHandle,
}

pub struct RenderTarget<G: GraphicsDevice> {
    config: RenderTargetConfig,
    native: Option<Native<G::RenderTarget>>,
}

/// Reduces an allocation failure to what a recreate sweep can report.
fn creation_error(error: AllocationError, config: &RenderTargetConfig) -> CreationError {
    match error {
        AllocationError::Heap(e) => e,
        AllocationError::Disposed => CreationError::DeviceLost,
        other => CreationError::Rejected {
            what: format!("view for {}", config.name),
            reason: other.to_string(),
        },
    }
}

impl<G: GraphicsDevice> RenderTarget<G> {
    fn build(
        config: &RenderTargetConfig,
        resources: &DeviceResources<G>,
    ) -> Result<Native<G::RenderTarget>, CreationError> {
        if config.width == 0 || config.height == 0 {
            return Err(CreationError::Rejected {
                what: config.name.clone(),
                reason: format!("{}x{} is empty", config.width, config.height),
            });
        }
        let descriptor = resources
            .allocate_descriptors(1)
            .map_err(|e| creation_error(e, config))?;
        let target = resources.device().create_render_target(config, descriptor)?;
        Ok(Native { target, descriptor })
    }

    pub(crate) fn new(
        config: RenderTargetConfig,
        resources: &DeviceResources<G>,
    ) -> Result<Self, CreationError> {
        let native = Self::build(&config, resources)?;
        logwise::info_sync!(
            "created render target {name} ({width}x{height})",
            name = logwise::privacy::LogIt(&config.name),
            width = config.width,
            height = config.height
        );
        Ok(RenderTarget {
            config,
            native: Some(native),
        })
    }

    pub fn config(&self) -> &RenderTargetConfig {
        &self.config
    }

    /// The native target. Fails while released.
    pub fn native(&self) -> Result<&G::RenderTarget, StaleHandle> {
        self.native
            .as_ref()
            .map(|n| &n.target)
            .ok_or_else(|| StaleHandle::new(&self.config.name))
    }

    /// The view descriptor. Fails while released.
    pub fn descriptor(&self) -> Result<DescriptorHandle, StaleHandle> {
        self.native
            .as_ref()
            .map(|n| n.descriptor)
            .ok_or_else(|| StaleHandle::new(&self.config.name))
    }

    pub fn is_released(&self) -> bool {
        self.native.is_none()
    }

    /// Releases the native target ahead of a device loss, keeping the configuration.
    pub fn force_release(&mut self) {
        if self.native.take().is_some() {
            logwise::trace_sync!(
                "released render target {name}",
                name = logwise::privacy::LogIt(&self.config.name)
            );
        }
    }
}

impl<G: GraphicsDevice> TrackedResource<DeviceResources<G>> for RenderTarget<G> {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn device_lost(&mut self) {
        //descriptor slots go back in bulk with their heaps
        self.force_release();
    }

    fn device_reset(&mut self, ctx: &DeviceResources<G>) -> Result<(), CreationError> {
        self.native = Some(Self::build(&self.config, ctx)?);
        Ok(())
    }
}

impl<G: GraphicsDevice> Debug for RenderTarget<G> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderTarget")
            .field("config", &self.config)
            .field("descriptor", &self.native.as_ref().map(|n| n.descriptor))
            .finish()
    }
}

/// A render target registered with a context's lifecycle tracker.
pub struct RenderTargetHandle<G: GraphicsDevice> {
    id: ResourceId,
    target: Shared<RenderTarget<G>>,
}

impl<G: GraphicsDevice> RenderTargetHandle<G> {
    pub(crate) fn new(id: ResourceId, target: Shared<RenderTarget<G>>) -> Self {
        RenderTargetHandle { id, target }
    }

    pub fn id(&self) -> ResourceId {
        self.id
    }

    pub fn lock(&self) -> MutexGuard<'_, RenderTarget<G>> {
        self.target.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn shared(&self) -> &Shared<RenderTarget<G>> {
        &self.target
    }
}

impl<G: GraphicsDevice> Clone for RenderTargetHandle<G> {
    fn clone(&self) -> Self {
        RenderTargetHandle {
            id: self.id,
            target: self.target.clone(),
        }
    }
}

impl<G: GraphicsDevice> Debug for RenderTargetHandle<G> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderTargetHandle")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}
