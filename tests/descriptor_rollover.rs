// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Descriptor heaps roll over when full and are released in bulk.
use gpu_state_cache::descriptor::{
    DEFAULT_HEAP_CAPACITY, DescriptorAllocator, DescriptorHandle, DescriptorHeap,
};
use gpu_state_cache::error::AllocationError;
use gpu_state_cache::headless::{HEADLESS_DESCRIPTOR_STRIDE, HeadlessDevice, ObjectKind};

#[cfg(target_arch = "wasm32")]
wasm_bindgen_test::wasm_bindgen_test_configure!(run_in_browser);

fn end(handle: &DescriptorHandle) -> u64 {
    handle.address + u64::from(handle.count) * HEADLESS_DESCRIPTOR_STRIDE
}

#[test]
#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
fn request_that_does_not_fit_opens_a_new_heap() {
    let device = HeadlessDevice::new();
    let allocator = DescriptorAllocator::new();
    assert_eq!(allocator.heap_capacity(), DEFAULT_HEAP_CAPACITY);

    let first = allocator.allocate(&device, 200).unwrap();
    let second = allocator.allocate(&device, 100).unwrap();
    assert_eq!(allocator.heap_count(), 2);
    assert_eq!(device.live(ObjectKind::DescriptorHeap), 2);

    let mut heaps = Vec::new();
    allocator.for_each_heap(|h| heaps.push((h.base_address(), h.capacity())));
    let (base, capacity) = heaps[1];
    let heap_end = base + u64::from(capacity) * HEADLESS_DESCRIPTOR_STRIDE;
    assert!(second.address >= base && end(&second) <= heap_end);
    assert!(end(&first) <= heaps[0].0 + 256 * HEADLESS_DESCRIPTOR_STRIDE);

    allocator.dispose();
    assert_eq!(device.live(ObjectKind::DescriptorHeap), 0);
    assert_eq!(allocator.allocate(&device, 1), Err(AllocationError::Disposed));
}

#[test]
#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
fn ranges_are_disjoint_across_rollover() {
    let device = HeadlessDevice::new();
    let allocator = DescriptorAllocator::with_heap_capacity(32);
    let mut handles: Vec<DescriptorHandle> = Vec::new();
    for i in 0..200u32 {
        handles.push(allocator.allocate(&device, i % 13 + 1).unwrap());
    }
    handles.sort_by_key(|h| h.address);
    for pair in handles.windows(2) {
        assert!(end(&pair[0]) <= pair[1].address, "{:?} overlaps {:?}", pair[0], pair[1]);
    }
    assert!(allocator.heap_count() > 1);
}

#[test]
#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
fn heap_creation_failure_is_surfaced() {
    let device = HeadlessDevice::new();
    let allocator = DescriptorAllocator::new();
    device.fail_next(ObjectKind::DescriptorHeap);
    assert!(matches!(
        allocator.allocate(&device, 1),
        Err(AllocationError::Heap(_))
    ));
    assert_eq!(allocator.heap_count(), 0);
    assert!(allocator.allocate(&device, 1).is_ok());
}

#[test]
#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
fn dropping_the_allocator_releases_heaps() {
    let device = HeadlessDevice::new();
    {
        let allocator = DescriptorAllocator::with_heap_capacity(4);
        for _ in 0..3 {
            allocator.allocate(&device, 4).unwrap();
        }
        assert_eq!(device.live(ObjectKind::DescriptorHeap), 3);
    }
    assert_eq!(device.live(ObjectKind::DescriptorHeap), 0);
}
