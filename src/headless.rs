// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
A graphics device without a GPU.

[HeadlessDevice] hands out synthetic native objects, which is enough to drive caches, descriptor
allocation and the full device-loss cycle in tests or tools. Loss is simulated with
[HeadlessDevice::simulate_loss]; [HeadlessDevice::successor] plays the role of the replacement
device. Creation failures can be scripted per object kind or per label.

Every object records the generation of the device that created it, so a test can tell
pre-loss objects from recreated ones.
*/

use crate::backend::{DeviceStatus, GraphicsDevice};
use crate::descriptor::{DescriptorHandle, DescriptorHeap, HeapFactory};
use crate::error::CreationError;
use crate::render_target::RenderTargetConfig;
use crate::state::{BlendState, DepthStencilState, RasterizerState, SamplerState};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// Slot size reported by [HeadlessDevice].
pub const HEADLESS_DESCRIPTOR_STRIDE: u64 = 32;

const FIRST_HEAP_BASE: u64 = 0x1_0000;

/// Largest render target edge a headless device accepts.
pub const HEADLESS_MAX_DIMENSION: u32 = 16384;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    Sampler,
    Blend,
    Rasterizer,
    DepthStencil,
    DescriptorHeap,
    RenderTarget,
}

const KINDS: usize = 6;

impl ObjectKind {
    const fn index(self) -> usize {
        match self {
            ObjectKind::Sampler => 0,
            ObjectKind::Blend => 1,
            ObjectKind::Rasterizer => 2,
            ObjectKind::DepthStencil => 3,
            ObjectKind::DescriptorHeap => 4,
            ObjectKind::RenderTarget => 5,
        }
    }
}

/// Counters shared by a device and all of its successors.
#[derive(Debug, Default)]
struct Stats {
    created: [AtomicUsize; KINDS],
    live: [AtomicUsize; KINDS],
    next_object: AtomicU64,
    next_heap_base: AtomicU64,
}

#[derive(Debug, Default)]
struct Script {
    fail_next: Vec<ObjectKind>,
    refused_labels: Vec<String>,
}

#[derive(Debug)]
pub struct HeadlessDevice {
    generation: u32,
    lost: AtomicBool,
    script: Mutex<Script>,
    stats: Arc<Stats>,
}

/// A synthetic native object.
#[derive(Debug)]
pub struct HeadlessObject {
    id: u64,
    kind: ObjectKind,
    generation: u32,
    label: String,
    stats: Arc<Stats>,
}

impl HeadlessObject {
    pub fn id(&self) -> u64 {
        self.id
    }
    pub fn kind(&self) -> ObjectKind {
        self.kind
    }
    /// Generation of the device that created this object.
    pub fn generation(&self) -> u32 {
        self.generation
    }
    pub fn label(&self) -> &str {
        &self.label
    }
}

impl Drop for HeadlessObject {
    fn drop(&mut self) {
        self.stats.live[self.kind.index()].fetch_sub(1, Ordering::SeqCst);
    }
}

/// A synthetic descriptor heap occupying a unique address range.
#[derive(Debug)]
pub struct HeadlessHeap {
    object: HeadlessObject,
    base: u64,
    capacity: u32,
}

impl HeadlessHeap {
    pub fn object(&self) -> &HeadlessObject {
        &self.object
    }
}

impl DescriptorHeap for HeadlessHeap {
    fn base_address(&self) -> u64 {
        self.base
    }
    fn capacity(&self) -> u32 {
        self.capacity
    }
}

/// A synthetic render target and the view slot it was created for.
#[derive(Debug)]
pub struct HeadlessRenderTarget {
    pub object: HeadlessObject,
    pub view: DescriptorHandle,
    pub width: u32,
    pub height: u32,
}

impl HeadlessDevice {
    pub fn new() -> Self {
        HeadlessDevice {
            generation: 0,
            lost: AtomicBool::new(false),
            script: Mutex::new(Script::default()),
            stats: Arc::new(Stats {
                next_heap_base: AtomicU64::new(FIRST_HEAP_BASE),
                ..Stats::default()
            }),
        }
    }

    /// A fresh device standing in for this one after loss. Counters carry over.
    pub fn successor(&self) -> Self {
        HeadlessDevice {
            generation: self.generation + 1,
            lost: AtomicBool::new(false),
            script: Mutex::new(Script::default()),
            stats: self.stats.clone(),
        }
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }

    /// Marks the device lost. It stays lost; recovery needs a [Self::successor].
    pub fn simulate_loss(&self) {
        logwise::info_sync!(
            "simulating loss of headless device {generation}",
            generation = self.generation
        );
        self.lost.store(true, Ordering::SeqCst);
    }

    /// The next creation of `kind` fails with [CreationError::OutOfMemory].
    pub fn fail_next(&self, kind: ObjectKind) {
        self.script().fail_next.push(kind);
    }

    /// Every creation labeled `label` fails with [CreationError::Rejected].
    pub fn refuse(&self, label: impl Into<String>) {
        self.script().refused_labels.push(label.into());
    }

    /// Objects of `kind` created by this device and its predecessors.
    pub fn created(&self, kind: ObjectKind) -> usize {
        self.stats.created[kind.index()].load(Ordering::SeqCst)
    }

    /// Objects of `kind` not yet dropped.
    pub fn live(&self, kind: ObjectKind) -> usize {
        self.stats.live[kind.index()].load(Ordering::SeqCst)
    }

    fn script(&self) -> std::sync::MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn create(&self, kind: ObjectKind, label: &str) -> Result<HeadlessObject, CreationError> {
        if self.lost.load(Ordering::SeqCst) {
            return Err(CreationError::DeviceLost);
        }
        {
            let mut script = self.script();
            if let Some(i) = script.fail_next.iter().position(|k| *k == kind) {
                script.fail_next.remove(i);
                return Err(CreationError::OutOfMemory {
                    what: label.to_string(),
                });
            }
            if script.refused_labels.iter().any(|l| l == label) {
                return Err(CreationError::Rejected {
                    what: label.to_string(),
                    reason: "refused by script".to_string(),
                });
            }
        }
        self.stats.created[kind.index()].fetch_add(1, Ordering::SeqCst);
        self.stats.live[kind.index()].fetch_add(1, Ordering::SeqCst);
        Ok(HeadlessObject {
            id: self.stats.next_object.fetch_add(1, Ordering::SeqCst),
            kind,
            generation: self.generation,
            label: label.to_string(),
            stats: self.stats.clone(),
        })
    }
}

impl Default for HeadlessDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl HeapFactory for HeadlessDevice {
    type Heap = HeadlessHeap;

    fn create_descriptor_heap(&self, capacity: u32) -> Result<HeadlessHeap, CreationError> {
        let object = self.create(ObjectKind::DescriptorHeap, "descriptor heap")?;
        let size = u64::from(capacity) * HEADLESS_DESCRIPTOR_STRIDE;
        //round up so heaps never touch
        let span = size.next_multiple_of(FIRST_HEAP_BASE) + FIRST_HEAP_BASE;
        let base = self.stats.next_heap_base.fetch_add(span, Ordering::SeqCst);
        Ok(HeadlessHeap {
            object,
            base,
            capacity,
        })
    }

    fn descriptor_stride(&self) -> u64 {
        HEADLESS_DESCRIPTOR_STRIDE
    }
}

impl GraphicsDevice for HeadlessDevice {
    type Sampler = HeadlessObject;
    type Blend = HeadlessObject;
    type Rasterizer = HeadlessObject;
    type DepthStencil = HeadlessObject;
    type RenderTarget = HeadlessRenderTarget;

    fn create_sampler(
        &self,
        _descriptor: &SamplerState,
        label: &str,
    ) -> Result<HeadlessObject, CreationError> {
        self.create(ObjectKind::Sampler, label)
    }

    fn create_blend_state(
        &self,
        _descriptor: &BlendState,
        label: &str,
    ) -> Result<HeadlessObject, CreationError> {
        self.create(ObjectKind::Blend, label)
    }

    fn create_rasterizer_state(
        &self,
        _descriptor: &RasterizerState,
        label: &str,
    ) -> Result<HeadlessObject, CreationError> {
        self.create(ObjectKind::Rasterizer, label)
    }

    fn create_depth_stencil_state(
        &self,
        _descriptor: &DepthStencilState,
        label: &str,
    ) -> Result<HeadlessObject, CreationError> {
        self.create(ObjectKind::DepthStencil, label)
    }

    fn create_render_target(
        &self,
        config: &RenderTargetConfig,
        view: DescriptorHandle,
    ) -> Result<HeadlessRenderTarget, CreationError> {
        if config.width > HEADLESS_MAX_DIMENSION || config.height > HEADLESS_MAX_DIMENSION {
            return Err(CreationError::Rejected {
                what: config.name.clone(),
                reason: format!(
                    "{}x{} exceeds {HEADLESS_MAX_DIMENSION}",
                    config.width, config.height
                ),
            });
        }
        let object = self.create(ObjectKind::RenderTarget, &config.name)?;
        Ok(HeadlessRenderTarget {
            object,
            view,
            width: config.width,
            height: config.height,
        })
    }

    fn status(&self) -> DeviceStatus {
        if self.lost.load(Ordering::SeqCst) {
            DeviceStatus::Lost
        } else {
            DeviceStatus::Operational
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pixel_formats::PixelFormat;

    #[test]
    fn test_objects_are_counted() {
        let device = HeadlessDevice::new();
        let a = device
            .create_sampler(&SamplerState::DEFAULT, "Sampler State #0")
            .unwrap();
        assert_eq!(a.label(), "Sampler State #0");
        assert_eq!(device.created(ObjectKind::Sampler), 1);
        assert_eq!(device.live(ObjectKind::Sampler), 1);
        drop(a);
        assert_eq!(device.live(ObjectKind::Sampler), 0);
        assert_eq!(device.created(ObjectKind::Sampler), 1);
    }

    #[test]
    fn test_scripted_failures() {
        let device = HeadlessDevice::new();
        device.fail_next(ObjectKind::Blend);
        assert!(matches!(
            device.create_blend_state(&BlendState::ADDITIVE, "b"),
            Err(CreationError::OutOfMemory { .. })
        ));
        assert!(device.create_blend_state(&BlendState::ADDITIVE, "b").is_ok());

        device.refuse("shadow");
        let config = RenderTargetConfig::new("shadow", 64, 64, PixelFormat::R32Float);
        let view = DescriptorHandle {
            heap: 0,
            address: FIRST_HEAP_BASE,
            count: 1,
        };
        assert!(matches!(
            device.create_render_target(&config, view),
            Err(CreationError::Rejected { .. })
        ));
    }

    #[test]
    fn test_loss_and_successor() {
        let device = HeadlessDevice::new();
        let before = device
            .create_rasterizer_state(&RasterizerState::WIREFRAME, "r")
            .unwrap();
        device.simulate_loss();
        assert_eq!(device.status(), DeviceStatus::Lost);
        assert_eq!(
            device
                .create_rasterizer_state(&RasterizerState::WIREFRAME, "r")
                .unwrap_err(),
            CreationError::DeviceLost
        );
        let next = device.successor();
        assert_eq!(next.status(), DeviceStatus::Operational);
        let after = next
            .create_rasterizer_state(&RasterizerState::WIREFRAME, "r")
            .unwrap();
        assert_eq!((before.generation(), after.generation()), (0, 1));
        assert_eq!(next.created(ObjectKind::Rasterizer), 2);
    }

    #[test]
    fn test_heaps_do_not_overlap() {
        let device = HeadlessDevice::new();
        let a = device.create_descriptor_heap(256).unwrap();
        let b = device.create_descriptor_heap(256).unwrap();
        assert!(a.base_address() + 256 * HEADLESS_DESCRIPTOR_STRIDE <= b.base_address());
    }
}
