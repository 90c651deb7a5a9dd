// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
Ties state caches, descriptor allocation and device-loss recovery to one device.

[GraphicsContext] is the usual entry point. It owns:

* one [StateCache] per state family,
* the [DescriptorAllocator] for render-target views,
* a shared [DeviceLifecycleTracker] for every [RenderTarget] created through it.

# Device loss

State objects are not tracked individually. On loss the caches are simply evicted, and on reset
they refill lazily as states are requested again, except for the predefined samplers, which are
recreated eagerly. Render targets go through the tracker and come back with their configuration.

While the device is lost, every accessor fails with [StaleHandle].
*/

use crate::backend::{DeviceStatus, GraphicsDevice};
use crate::cache::StateCache;
use crate::descriptor::{DEFAULT_HEAP_CAPACITY, DescriptorAllocator, DescriptorHandle};
use crate::error::{
    AllocationError, CreationError, Error, RecoveryError, ResourceFailure, StaleHandle,
};
use crate::lifecycle::{DeviceLifecycleTracker, DeviceState};
use crate::render_target::{RenderTarget, RenderTargetConfig, RenderTargetHandle};
use crate::state::{BlendState, DepthStencilState, RasterizerState, SamplerState, StateDescriptor};
use std::fmt::{Debug, Formatter};
use std::sync::{Arc, Mutex};

/// What tracked resources need to rebuild themselves: the current device and its descriptors.
pub struct DeviceResources<G: GraphicsDevice> {
    device: G,
    descriptors: DescriptorAllocator<G::Heap>,
}

impl<G: GraphicsDevice> DeviceResources<G> {
    pub fn device(&self) -> &G {
        &self.device
    }

    pub fn descriptors(&self) -> &DescriptorAllocator<G::Heap> {
        &self.descriptors
    }

    pub fn allocate_descriptors(&self, count: u32) -> Result<DescriptorHandle, AllocationError> {
        self.descriptors.allocate(&self.device, count)
    }
}

pub struct GraphicsContext<G: GraphicsDevice> {
    resources: DeviceResources<G>,
    tracker: Arc<DeviceLifecycleTracker<DeviceResources<G>>>,
    samplers: StateCache<SamplerState, G::Sampler>,
    blend_states: StateCache<BlendState, G::Blend>,
    rasterizer_states: StateCache<RasterizerState, G::Rasterizer>,
    depth_stencil_states: StateCache<DepthStencilState, G::DepthStencil>,
}

fn label<D: StateDescriptor>(index: usize) -> String {
    format!("{} State #{}", D::KIND, index)
}

/// Shared path of every state accessor: refuse while lost, validate, then hit or fill the cache.
fn cached<'c, D, H>(
    active: bool,
    cache: &'c mut StateCache<D, H>,
    descriptor: &D,
    create: impl FnOnce(&str) -> Result<H, CreationError>,
) -> Result<&'c H, Error>
where
    D: StateDescriptor,
{
    if !active {
        return Err(StaleHandle::new(format!("{} state", D::KIND)).into());
    }
    descriptor.validate()?;
    let handle = cache.get_or_try_insert_with(descriptor, |index| create(&label::<D>(index)))?;
    Ok(handle)
}

impl<G: GraphicsDevice> GraphicsContext<G> {
    /// Wraps `device`, creating the predefined samplers up front.
    pub fn new(device: G) -> Result<Self, Error> {
        Self::with_heap_capacity(device, DEFAULT_HEAP_CAPACITY)
    }

    /// Like [Self::new], with a custom number of slots per descriptor heap.
    pub fn with_heap_capacity(device: G, heap_capacity: u32) -> Result<Self, Error> {
        let mut context = GraphicsContext {
            resources: DeviceResources {
                device,
                descriptors: DescriptorAllocator::with_heap_capacity(heap_capacity),
            },
            tracker: Arc::new(DeviceLifecycleTracker::new()),
            samplers: StateCache::new(),
            blend_states: StateCache::new(),
            rasterizer_states: StateCache::new(),
            depth_stencil_states: StateCache::new(),
        };
        if let Some(failure) = context.create_predefined_samplers().into_iter().next() {
            return Err(failure.error.into());
        }
        Ok(context)
    }

    /// Attempts every predefined sampler, returning the ones that could not be created.
    fn create_predefined_samplers(&mut self) -> Vec<ResourceFailure> {
        let mut failures = Vec::new();
        for descriptor in &SamplerState::PREDEFINED {
            let name = label::<SamplerState>(self.samplers.len());
            if let Err(error) = self.sampler(descriptor) {
                let error = match error {
                    Error::Creation(error) => error,
                    Error::Stale(_) => CreationError::DeviceLost,
                    other => CreationError::Rejected {
                        what: name.clone(),
                        reason: other.to_string(),
                    },
                };
                failures.push(ResourceFailure {
                    id: None,
                    name,
                    error,
                });
            }
        }
        failures
    }

    pub fn device(&self) -> &G {
        &self.resources.device
    }

    pub fn resources(&self) -> &DeviceResources<G> {
        &self.resources
    }

    /// The tracker, for registering resources other than render targets or awaiting recovery.
    pub fn tracker(&self) -> &Arc<DeviceLifecycleTracker<DeviceResources<G>>> {
        &self.tracker
    }

    pub fn state(&self) -> DeviceState {
        self.tracker.state()
    }

    pub fn sampler(&mut self, descriptor: &SamplerState) -> Result<&G::Sampler, Error> {
        let device = &self.resources.device;
        cached(self.tracker.is_active(), &mut self.samplers, descriptor, |label| {
            device.create_sampler(descriptor, label)
        })
    }

    pub fn blend_state(&mut self, descriptor: &BlendState) -> Result<&G::Blend, Error> {
        let device = &self.resources.device;
        cached(self.tracker.is_active(), &mut self.blend_states, descriptor, |label| {
            device.create_blend_state(descriptor, label)
        })
    }

    pub fn rasterizer_state(
        &mut self,
        descriptor: &RasterizerState,
    ) -> Result<&G::Rasterizer, Error> {
        let device = &self.resources.device;
        cached(self.tracker.is_active(), &mut self.rasterizer_states, descriptor, |label| {
            device.create_rasterizer_state(descriptor, label)
        })
    }

    pub fn depth_stencil_state(
        &mut self,
        descriptor: &DepthStencilState,
    ) -> Result<&G::DepthStencil, Error> {
        let device = &self.resources.device;
        cached(
            self.tracker.is_active(),
            &mut self.depth_stencil_states,
            descriptor,
            |label| device.create_depth_stencil_state(descriptor, label),
        )
    }

    pub fn samplers(&self) -> &StateCache<SamplerState, G::Sampler> {
        &self.samplers
    }

    pub fn blend_states(&self) -> &StateCache<BlendState, G::Blend> {
        &self.blend_states
    }

    pub fn rasterizer_states(&self) -> &StateCache<RasterizerState, G::Rasterizer> {
        &self.rasterizer_states
    }

    pub fn depth_stencil_states(&self) -> &StateCache<DepthStencilState, G::DepthStencil> {
        &self.depth_stencil_states
    }

    pub fn purge_sampler(&mut self, descriptor: &SamplerState) {
        self.samplers.purge(descriptor);
    }

    pub fn purge_blend_state(&mut self, descriptor: &BlendState) {
        self.blend_states.purge(descriptor);
    }

    pub fn purge_rasterizer_state(&mut self, descriptor: &RasterizerState) {
        self.rasterizer_states.purge(descriptor);
    }

    pub fn purge_depth_stencil_state(&mut self, descriptor: &DepthStencilState) {
        self.depth_stencil_states.purge(descriptor);
    }

    fn evict_states(&mut self) {
        self.samplers.evict();
        self.blend_states.evict();
        self.rasterizer_states.evict();
        self.depth_stencil_states.evict();
    }

    /**
    Releases every cached state object.

    The predefined samplers are recreated right away when the device is usable; otherwise that
    happens on reset.
    */
    pub fn clear_state_cache(&mut self) -> Result<(), Error> {
        self.evict_states();
        if self.tracker.is_active() {
            if let Some(failure) = self.create_predefined_samplers().into_iter().next() {
                return Err(failure.error.into());
            }
        }
        Ok(())
    }

    /// Creates a render target and registers it for device-loss recovery.
    pub fn create_render_target(
        &self,
        config: RenderTargetConfig,
    ) -> Result<RenderTargetHandle<G>, Error> {
        self.tracker.ensure_active()?;
        let target = Arc::new(Mutex::new(RenderTarget::new(config, &self.resources)?));
        let id = self.tracker.register(&target);
        Ok(RenderTargetHandle::new(id, target))
    }

    /// Rebuilds one render target, e.g. after it failed during [Self::device_reset] or was
    /// force-released.
    pub fn recreate_render_target(&self, target: &RenderTargetHandle<G>) -> Result<(), Error> {
        self.tracker.recreate(target.id(), &self.resources)?;
        Ok(())
    }

    /// Probes the device, running [Self::device_lost] if it was lost since the last probe.
    pub fn poll_device(&mut self) -> DeviceState {
        if self.resources.device.status() == DeviceStatus::Lost && self.tracker.is_active() {
            self.device_lost();
        }
        self.tracker.state()
    }

    /**
    Handles loss of the device.

    Tracked resources release their native handles, state caches are evicted and descriptor
    heaps are released. Calling this again before a reset only re-runs the cache and heap part,
    which is then a no-op.
    */
    pub fn device_lost(&mut self) {
        self.tracker.device_lost();
        self.evict_states();
        self.resources.descriptors.release_heaps();
    }

    /**
    Installs `device` as the replacement for a lost device and recreates everything.

    All tracked resources and predefined samplers are attempted even if some fail; the failures
    are reported together as [Error::Recovery]. The context is usable afterwards in either case.

    Resetting while the device is active does nothing and drops `device`.
    */
    pub fn device_reset(&mut self, device: G) -> Result<(), Error> {
        if self.tracker.is_active() {
            logwise::warn_sync!("device_reset: device is active, ignoring replacement");
            return Ok(());
        }
        //heaps and states from the old device are useless even if device_lost was skipped
        self.evict_states();
        self.resources.descriptors.release_heaps();
        self.resources.device = device;

        let mut failures = match self.tracker.device_reset(&self.resources) {
            Ok(()) => Vec::new(),
            Err(recovery) => recovery.failures,
        };
        if self.tracker.is_active() {
            failures.extend(self.create_predefined_samplers());
        }
        if failures.is_empty() {
            Ok(())
        } else {
            Err(RecoveryError { failures }.into())
        }
    }
}

impl<G: GraphicsDevice> Debug for GraphicsContext<G> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphicsContext")
            .field("state", &self.tracker.state())
            .field("samplers", &self.samplers.len())
            .field("blend_states", &self.blend_states.len())
            .field("rasterizer_states", &self.rasterizer_states.len())
            .field("depth_stencil_states", &self.depth_stencil_states.len())
            .field("descriptors", &self.resources.descriptors)
            .finish()
    }
}

impl<G: GraphicsDevice> Drop for GraphicsContext<G> {
    fn drop(&mut self) {
        //states first; heaps last
        self.evict_states();
        self.resources.descriptors.dispose();
    }
}
