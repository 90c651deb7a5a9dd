// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
use super::BoundDevice;
use super::error::scoped;
use crate::descriptor::DescriptorHeap;
use crate::error::CreationError;

/// Size in bytes of one descriptor record.
pub const DESCRIPTOR_STRIDE: u64 = 32;

/**
A descriptor heap backed by a GPU buffer.

wgpu manages views itself, so the buffer holds descriptor records uploaded by the application
(e.g. for bindless lookups) and the addresses are offsets into a per-device synthetic address
space.
*/
#[derive(Debug)]
pub struct NativeHeap {
    buffer: wgpu::Buffer,
    base: u64,
    capacity: u32,
}

impl NativeHeap {
    pub fn buffer(&self) -> &wgpu::Buffer {
        &self.buffer
    }

    /// Byte offset of `address` into [Self::buffer], if it lies in this heap.
    pub fn offset_of(&self, address: u64) -> Option<u64> {
        let offset = address.checked_sub(self.base)?;
        (offset < self.buffer.size()).then_some(offset)
    }
}

impl DescriptorHeap for NativeHeap {
    fn base_address(&self) -> u64 {
        self.base
    }
    fn capacity(&self) -> u32 {
        self.capacity
    }
}

impl Drop for NativeHeap {
    fn drop(&mut self) {
        self.buffer.destroy();
    }
}

pub(crate) fn create_heap(
    bound_device: &BoundDevice,
    capacity: u32,
) -> Result<NativeHeap, CreationError> {
    if bound_device.is_lost() {
        return Err(CreationError::DeviceLost);
    }
    let size = u64::from(capacity) * DESCRIPTOR_STRIDE;
    let max = bound_device.device().limits().max_buffer_size;
    if size > max {
        return Err(CreationError::OutOfMemory {
            what: format!("descriptor heap of {size} bytes (limit {max})"),
        });
    }
    let buffer = scoped(bound_device.device(), "descriptor heap", || {
        bound_device.device().create_buffer(&wgpu::BufferDescriptor {
            label: Some("descriptor heap"),
            size,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        })
    })?;
    Ok(NativeHeap {
        buffer,
        base: bound_device.reserve_heap_range(size),
        capacity,
    })
}
