// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
Bump allocation of descriptor slots.

Descriptor heaps are expensive to create and cheapest to use as large contiguous blocks, while
individual views (render-target views and the like) are tiny and numerous. [DescriptorAllocator]
creates fixed-capacity heaps on demand and hands out slot ranges from the active one by bumping a
cursor.

There is no per-allocation free. Heaps are only ever released in bulk: by
[DescriptorAllocator::release_heaps] when the device is lost, or by
[DescriptorAllocator::dispose] at teardown. When a request does not fit in the active heap, the
remainder of that heap is abandoned and a new heap becomes active.

# Threading

Allocation is expected to come from the thread owning the rendering context. Disposal may race
with it: the pool is swapped out under its lock and every heap in it, active one included, is
dropped afterwards.
*/

use crate::error::{AllocationError, CreationError};
use std::fmt::{Debug, Formatter};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Slots per heap unless configured otherwise.
pub const DEFAULT_HEAP_CAPACITY: u32 = 256;

/// A fixed-capacity block of descriptor slots. Dropping it releases the native heap.
pub trait DescriptorHeap: Send {
    /// Address of slot 0.
    fn base_address(&self) -> u64;
    fn capacity(&self) -> u32;
}

/// Creates descriptor heaps; implemented by graphics devices.
pub trait HeapFactory {
    type Heap: DescriptorHeap;
    fn create_descriptor_heap(&self, capacity: u32) -> Result<Self::Heap, CreationError>;
    /// Distance in bytes between consecutive slots.
    fn descriptor_stride(&self) -> u64;
}

/// A range of `count` consecutive slots starting at `address`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DescriptorHandle {
    /// Sequence number of the heap the slots came from, counting every heap this allocator created.
    pub heap: u64,
    pub address: u64,
    pub count: u32,
}

#[derive(Debug, Clone, Copy)]
struct Cursor {
    heap: u64,
    address: u64,
    free: u32,
    stride: u64,
}

struct Allocation {
    cursor: Option<Cursor>,
    heaps_created: u64,
    disposed: bool,
}

pub struct DescriptorAllocator<H> {
    heap_capacity: u32,
    allocation: Mutex<Allocation>,
    pool: Mutex<Vec<H>>,
}

fn relock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<H: DescriptorHeap> DescriptorAllocator<H> {
    pub fn new() -> Self {
        Self::with_heap_capacity(DEFAULT_HEAP_CAPACITY)
    }

    pub fn with_heap_capacity(heap_capacity: u32) -> Self {
        assert!(heap_capacity > 0, "descriptor heaps need at least one slot");
        DescriptorAllocator {
            heap_capacity,
            allocation: Mutex::new(Allocation {
                cursor: None,
                heaps_created: 0,
                disposed: false,
            }),
            pool: Mutex::new(Vec::new()),
        }
    }

    pub fn heap_capacity(&self) -> u32 {
        self.heap_capacity
    }

    /// Slot stride of the active heap, once there is one.
    pub fn stride(&self) -> Option<u64> {
        relock(&self.allocation).cursor.map(|c| c.stride)
    }

    /// Heaps currently held in the pool, including the active one.
    pub fn heap_count(&self) -> usize {
        relock(&self.pool).len()
    }

    /// Calls `f` with each pooled heap, oldest first.
    pub fn for_each_heap(&self, mut f: impl FnMut(&H)) {
        for heap in relock(&self.pool).iter() {
            f(heap);
        }
    }

    /**
    Reserves `count` consecutive slots.

    A new heap is created through `factory` when the active heap has fewer than `count` free
    slots. Heap-creation errors are returned as-is and leave the allocator unchanged, as does a
    new heap too small for `count`, which fails with [AllocationError::TooLarge].
    */
    pub fn allocate<F>(&self, factory: &F, count: u32) -> Result<DescriptorHandle, AllocationError>
    where
        F: HeapFactory<Heap = H> + ?Sized,
    {
        if count == 0 {
            return Err(AllocationError::ZeroCount);
        }
        if count > self.heap_capacity {
            return Err(AllocationError::TooLarge {
                requested: count,
                capacity: self.heap_capacity,
            });
        }
        let mut allocation = relock(&self.allocation);
        if allocation.disposed {
            return Err(AllocationError::Disposed);
        }
        let mut active = match allocation.cursor.take() {
            Some(cursor) if cursor.free >= count => cursor,
            previous => match self.create_heap(factory, allocation.heaps_created, count) {
                Ok(fresh) => {
                    allocation.heaps_created += 1;
                    fresh
                }
                Err(e) => {
                    allocation.cursor = previous;
                    return Err(e);
                }
            },
        };
        let handle = DescriptorHandle {
            heap: active.heap,
            address: active.address,
            count,
        };
        active.address += u64::from(count) * active.stride;
        active.free -= count;
        allocation.cursor = Some(active);
        logwise::trace_sync!(
            "allocated {count} descriptors from heap {heap}, {free} left",
            count = count,
            heap = handle.heap,
            free = active.free
        );
        Ok(handle)
    }

    fn create_heap<F>(&self, factory: &F, serial: u64, count: u32) -> Result<Cursor, AllocationError>
    where
        F: HeapFactory<Heap = H> + ?Sized,
    {
        let heap = factory.create_descriptor_heap(self.heap_capacity)?;
        let cursor = Cursor {
            heap: serial,
            address: heap.base_address(),
            free: heap.capacity().min(self.heap_capacity),
            stride: factory.descriptor_stride(),
        };
        if cursor.free < count {
            logwise::warn_sync!(
                "descriptor heap came back with {capacity} of {requested} slots",
                capacity = cursor.free,
                requested = self.heap_capacity
            );
            return Err(AllocationError::TooLarge {
                requested: count,
                capacity: cursor.free,
            });
        }
        logwise::info_sync!(
            "created descriptor heap {serial} with {capacity} slots",
            serial = serial,
            capacity = cursor.free
        );
        relock(&self.pool).push(heap);
        Ok(cursor)
    }

    fn take_pool(&self, allocation: &mut Allocation) -> Vec<H> {
        allocation.cursor = None;
        std::mem::take(&mut *relock(&self.pool))
    }

    /**
    Releases every heap but keeps the allocator usable.

    Used when the device is lost: the next allocation creates a fresh heap, normally on the
    replacement device. Returns how many heaps were released.
    */
    pub fn release_heaps(&self) -> usize {
        let heaps = {
            let mut allocation = relock(&self.allocation);
            self.take_pool(&mut allocation)
        };
        let released = heaps.len();
        drop(heaps);
        if released > 0 {
            logwise::info_sync!("released {count} descriptor heaps", count = released);
        }
        released
    }

    /// Releases every heap, permanently. Later allocations fail with [AllocationError::Disposed].
    pub fn dispose(&self) {
        let heaps = {
            let mut allocation = relock(&self.allocation);
            if allocation.disposed {
                return;
            }
            allocation.disposed = true;
            self.take_pool(&mut allocation)
        };
        logwise::info_sync!(
            "disposing descriptor allocator with {count} heaps",
            count = heaps.len()
        );
        drop(heaps);
    }

    pub fn is_disposed(&self) -> bool {
        relock(&self.allocation).disposed
    }
}

impl<H: DescriptorHeap> Default for DescriptorAllocator<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H> Debug for DescriptorAllocator<H> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let allocation = relock(&self.allocation);
        f.debug_struct("DescriptorAllocator")
            .field("heap_capacity", &self.heap_capacity)
            .field("heaps", &relock(&self.pool).len())
            .field("active", &allocation.cursor)
            .field("disposed", &allocation.disposed)
            .finish()
    }
}

impl<H> Drop for DescriptorAllocator<H> {
    fn drop(&mut self) {
        let pool = self.pool.get_mut().unwrap_or_else(PoisonError::into_inner);
        if !pool.is_empty() {
            logwise::trace_sync!("dropping {count} descriptor heaps", count = pool.len());
        }
        pool.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

    const STRIDE: u64 = 32;

    struct Heap {
        base: u64,
        capacity: u32,
        disposed: Arc<AtomicUsize>,
    }
    impl DescriptorHeap for Heap {
        fn base_address(&self) -> u64 {
            self.base
        }
        fn capacity(&self) -> u32 {
            self.capacity
        }
    }
    impl Drop for Heap {
        fn drop(&mut self) {
            self.disposed.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct Factory {
        next_base: AtomicU64,
        created: AtomicUsize,
        disposed: Arc<AtomicUsize>,
        fail: bool,
        /// Hands out heaps of this many slots regardless of what was asked.
        short: Option<u32>,
    }
    impl Factory {
        fn new() -> Self {
            Factory {
                next_base: AtomicU64::new(0x1000),
                created: AtomicUsize::new(0),
                disposed: Arc::new(AtomicUsize::new(0)),
                fail: false,
                short: None,
            }
        }
    }
    impl HeapFactory for Factory {
        type Heap = Heap;
        fn create_descriptor_heap(&self, capacity: u32) -> Result<Heap, CreationError> {
            if self.fail {
                return Err(CreationError::OutOfMemory {
                    what: "descriptor heap".to_string(),
                });
            }
            self.created.fetch_add(1, Ordering::SeqCst);
            //leave a gap so heaps are never adjacent
            let base = self
                .next_base
                .fetch_add(u64::from(capacity) * STRIDE * 2, Ordering::SeqCst);
            Ok(Heap {
                base,
                capacity: self.short.unwrap_or(capacity),
                disposed: self.disposed.clone(),
            })
        }
        fn descriptor_stride(&self) -> u64 {
            STRIDE
        }
    }

    fn range(handle: &DescriptorHandle) -> std::ops::Range<u64> {
        handle.address..handle.address + u64::from(handle.count) * STRIDE
    }

    #[test]
    fn test_bump_within_one_heap() {
        let factory = Factory::new();
        let allocator = DescriptorAllocator::new();
        assert_eq!(allocator.stride(), None);
        let a = allocator.allocate(&factory, 1).unwrap();
        let b = allocator.allocate(&factory, 4).unwrap();
        let c = allocator.allocate(&factory, 1).unwrap();
        assert_eq!(a.address, 0x1000);
        assert_eq!(b.address, 0x1000 + STRIDE);
        assert_eq!(c.address, 0x1000 + 5 * STRIDE);
        assert_eq!(allocator.stride(), Some(STRIDE));
        assert_eq!(allocator.heap_count(), 1);
        assert_eq!(factory.created.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_rollover_creates_new_heap() {
        let factory = Factory::new();
        let allocator = DescriptorAllocator::new();
        let first = allocator.allocate(&factory, 200).unwrap();
        let second = allocator.allocate(&factory, 100).unwrap();
        assert_eq!(allocator.heap_count(), 2);
        assert_ne!(first.heap, second.heap);

        let mut bases = Vec::new();
        allocator.for_each_heap(|h| bases.push((h.base_address(), h.capacity())));
        let (base, capacity) = bases[1];
        let end = base + u64::from(capacity) * STRIDE;
        assert_eq!(second.address, base);
        assert!(range(&second).end <= end);

        allocator.dispose();
        assert_eq!(factory.disposed.load(Ordering::SeqCst), 2);
        assert_eq!(allocator.heap_count(), 0);
    }

    #[test]
    fn test_ranges_never_overlap() {
        let factory = Factory::new();
        let allocator = DescriptorAllocator::with_heap_capacity(16);
        let mut handles = Vec::new();
        for i in 0..100u32 {
            handles.push(allocator.allocate(&factory, i % 7 + 1).unwrap());
        }
        for (i, a) in handles.iter().enumerate() {
            for b in &handles[i + 1..] {
                let (ra, rb) = (range(a), range(b));
                assert!(ra.end <= rb.start || rb.end <= ra.start, "{a:?} overlaps {b:?}");
            }
        }
    }

    #[test]
    fn test_invalid_counts() {
        let factory = Factory::new();
        let allocator = DescriptorAllocator::with_heap_capacity(8);
        assert_eq!(allocator.allocate(&factory, 0), Err(AllocationError::ZeroCount));
        assert_eq!(
            allocator.allocate(&factory, 9),
            Err(AllocationError::TooLarge {
                requested: 9,
                capacity: 8
            })
        );
        assert_eq!(factory.created.load(Ordering::SeqCst), 0);
        //exactly one heap's worth is fine
        assert!(allocator.allocate(&factory, 8).is_ok());
    }

    #[test]
    fn test_heap_failure_propagates() {
        let mut factory = Factory::new();
        let allocator = DescriptorAllocator::with_heap_capacity(8);
        let first = allocator.allocate(&factory, 6).unwrap();
        factory.fail = true;
        assert!(matches!(
            allocator.allocate(&factory, 4),
            Err(AllocationError::Heap(CreationError::OutOfMemory { .. }))
        ));
        //the active heap survived the failure
        let next = allocator.allocate(&factory, 2).unwrap();
        assert_eq!(next.address, first.address + 6 * STRIDE);
    }

    #[test]
    fn test_undersized_heap_is_rejected() {
        let mut factory = Factory::new();
        factory.short = Some(2);
        let allocator = DescriptorAllocator::with_heap_capacity(8);
        assert_eq!(
            allocator.allocate(&factory, 4),
            Err(AllocationError::TooLarge {
                requested: 4,
                capacity: 2
            })
        );
        assert_eq!(allocator.heap_count(), 0);
        assert_eq!(factory.disposed.load(Ordering::SeqCst), 1);
        //requests the short heap can hold still work
        let a = allocator.allocate(&factory, 2).unwrap();
        let b = allocator.allocate(&factory, 2).unwrap();
        assert_ne!(a.heap, b.heap);
        assert_eq!(allocator.heap_count(), 2);
    }

    #[test]
    fn test_release_heaps_is_not_terminal() {
        let factory = Factory::new();
        let allocator = DescriptorAllocator::with_heap_capacity(8);
        allocator.allocate(&factory, 3).unwrap();
        assert_eq!(allocator.release_heaps(), 1);
        assert_eq!(factory.disposed.load(Ordering::SeqCst), 1);
        let after = allocator.allocate(&factory, 3).unwrap();
        assert_eq!(after.heap, 1);
        assert_eq!(allocator.heap_count(), 1);
    }

    #[test]
    fn test_dispose_is_terminal() {
        let factory = Factory::new();
        let allocator = DescriptorAllocator::new();
        allocator.allocate(&factory, 1).unwrap();
        allocator.dispose();
        allocator.dispose();
        assert!(allocator.is_disposed());
        assert_eq!(factory.disposed.load(Ordering::SeqCst), 1);
        assert_eq!(allocator.allocate(&factory, 1), Err(AllocationError::Disposed));
    }

    #[test]
    fn test_dispose_races_allocation() {
        let factory = Arc::new(Factory::new());
        let allocator = Arc::new(DescriptorAllocator::with_heap_capacity(64));
        let worker = {
            let factory = factory.clone();
            let allocator = allocator.clone();
            std::thread::spawn(move || {
                let mut granted = 0usize;
                while allocator.allocate(&*factory, 1).is_ok() {
                    granted += 1;
                }
                granted
            })
        };
        std::thread::sleep(std::time::Duration::from_millis(5));
        allocator.dispose();
        worker.join().unwrap();
        assert_eq!(allocator.heap_count(), 0);
        //every heap ever created was released exactly once
        assert_eq!(
            factory.disposed.load(Ordering::SeqCst),
            factory.created.load(Ordering::SeqCst)
        );
    }
}
