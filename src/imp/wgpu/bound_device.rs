// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
use crate::imp::Error;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use wgpu::{Limits, Trace};

/// Heaps get synthetic addresses starting here, spaced so they never touch.
const FIRST_HEAP_BASE: u64 = 0x1_0000;

/// Internal resource management for BoundDevice
#[derive(Debug)]
struct BoundDeviceResources {
    device: wgpu::Device,
    queue: wgpu::Queue,
    adapter: wgpu::Adapter,
    /// Set from the device-lost callback, which may run on any thread.
    lost: Arc<AtomicBool>,
    next_heap_base: AtomicU64,
}

/// Cross-platform bound device that can be safely cloned
/// Multiple instances share the same underlying GPU resources
#[derive(Debug, Clone)]
pub struct BoundDevice {
    resources: Arc<BoundDeviceResources>,
}

fn device_descriptor() -> wgpu::DeviceDescriptor<'static> {
    let mut limits = Limits::downlevel_webgl2_defaults();
    //webGL is quite serious about enforcing these, which
    //by default are rather small
    //https://web3dsurvey.com/webgl/parameters/MAX_TEXTURE_SIZE
    limits.max_texture_dimension_1d = 4096;
    limits.max_texture_dimension_2d = 4096;
    wgpu::DeviceDescriptor {
        label: wgpu::Label::from("Bound Device"),
        required_features: Default::default(),
        required_limits: limits,
        memory_hints: Default::default(),
        trace: Trace::Off,
    }
}

impl BoundDevice {
    pub(crate) async fn bind(adapter: wgpu::Adapter) -> Result<Self, Error> {
        let (device, queue) = adapter.request_device(&device_descriptor()).await?;
        let lost = Arc::new(AtomicBool::new(false));
        let flag = lost.clone();
        device.set_device_lost_callback(move |reason, message| {
            flag.store(true, Ordering::SeqCst);
            match reason {
                wgpu::DeviceLostReason::Destroyed => {
                    logwise::info_sync!(
                        "wgpu device destroyed: {message}",
                        message = logwise::privacy::LogIt(&message)
                    );
                }
                _ => {
                    logwise::error_sync!(
                        "wgpu device lost ({reason}): {message}",
                        reason = logwise::privacy::LogIt(&reason),
                        message = logwise::privacy::LogIt(&message)
                    );
                }
            }
        });
        logwise::info_sync!("bound wgpu device");
        Ok(BoundDevice {
            resources: Arc::new(BoundDeviceResources {
                device,
                queue,
                adapter,
                lost,
                next_heap_base: AtomicU64::new(FIRST_HEAP_BASE),
            }),
        })
    }

    /// A new device from the same adapter, to replace this one after loss.
    pub(crate) async fn rebind(&self) -> Result<Self, Error> {
        Self::bind(self.resources.adapter.clone()).await
    }

    /// Whether both refer to the same underlying device.
    pub(crate) fn same_device(&self, other: &BoundDevice) -> bool {
        Arc::ptr_eq(&self.resources, &other.resources)
    }

    pub(crate) fn is_lost(&self) -> bool {
        self.resources.lost.load(Ordering::SeqCst)
    }

    /// Destroys the device. Everything created from it becomes invalid.
    pub(crate) fn destroy(&self) {
        //the callback also sets this, but not necessarily before we return
        self.resources.lost.store(true, Ordering::SeqCst);
        self.resources.device.destroy();
    }

    /// Reserves an address range for a descriptor heap of `size` bytes.
    pub(super) fn reserve_heap_range(&self, size: u64) -> u64 {
        let span = size.next_multiple_of(FIRST_HEAP_BASE) + FIRST_HEAP_BASE;
        self.resources.next_heap_base.fetch_add(span, Ordering::Relaxed)
    }

    pub(crate) fn device(&self) -> &wgpu::Device {
        &self.resources.device
    }

    pub(crate) fn queue(&self) -> &wgpu::Queue {
        &self.resources.queue
    }

    pub(super) fn adapter(&self) -> &wgpu::Adapter {
        &self.resources.adapter
    }
}
