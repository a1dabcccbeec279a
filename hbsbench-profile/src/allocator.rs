//! Allocation Tracking
//!
//! A counting wrapper around the system allocator. Counters are process-wide
//! and only move when [`TrackingAllocator`] is the `#[global_allocator]`.

use std::alloc::{GlobalAlloc, Layout, System};
use std::sync::atomic::{AtomicU64, Ordering};

static ALLOCATED_BYTES: AtomicU64 = AtomicU64::new(0);
static FREED_BYTES: AtomicU64 = AtomicU64::new(0);
static PEAK_BYTES: AtomicU64 = AtomicU64::new(0);
static ALLOCATIONS: AtomicU64 = AtomicU64::new(0);
static DEALLOCATIONS: AtomicU64 = AtomicU64::new(0);

/// Global allocator that counts allocations on top of [`System`]
pub struct TrackingAllocator;

unsafe impl GlobalAlloc for TrackingAllocator {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        let ptr = unsafe { System.alloc(layout) };
        if !ptr.is_null() {
            record_alloc(layout.size());
        }
        ptr
    }

    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
        let ptr = unsafe { System.alloc_zeroed(layout) };
        if !ptr.is_null() {
            record_alloc(layout.size());
        }
        ptr
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        unsafe { System.dealloc(ptr, layout) };
        record_dealloc(layout.size());
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        let new_ptr = unsafe { System.realloc(ptr, layout, new_size) };
        if !new_ptr.is_null() {
            record_dealloc(layout.size());
            record_alloc(new_size);
        }
        new_ptr
    }
}

fn record_alloc(size: usize) {
    let size = size as u64;
    let allocated = ALLOCATED_BYTES.fetch_add(size, Ordering::Relaxed) + size;
    ALLOCATIONS.fetch_add(1, Ordering::Relaxed);
    let live = allocated.saturating_sub(FREED_BYTES.load(Ordering::Relaxed));
    PEAK_BYTES.fetch_max(live, Ordering::Relaxed);
}

fn record_dealloc(size: usize) {
    FREED_BYTES.fetch_add(size as u64, Ordering::Relaxed);
    DEALLOCATIONS.fetch_add(1, Ordering::Relaxed);
}

/// Snapshot of the allocator counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct AllocationStats {
    /// Bytes ever allocated
    pub allocated_bytes: u64,
    /// Bytes ever freed
    pub freed_bytes: u64,
    /// Bytes currently held
    pub live_bytes: u64,
    /// Highest live size since start or the last [`reset_peak`]
    pub peak_bytes: u64,
    /// Allocation calls
    pub allocations: u64,
    /// Deallocation calls
    pub deallocations: u64,
}

impl AllocationStats {
    /// Whether the counters have ever moved
    pub fn is_tracking(&self) -> bool {
        self.allocations > 0
    }
}

/// Read the current counters
pub fn allocation_stats() -> AllocationStats {
    let allocated_bytes = ALLOCATED_BYTES.load(Ordering::Relaxed);
    let freed_bytes = FREED_BYTES.load(Ordering::Relaxed);
    AllocationStats {
        allocated_bytes,
        freed_bytes,
        live_bytes: allocated_bytes.saturating_sub(freed_bytes),
        peak_bytes: PEAK_BYTES.load(Ordering::Relaxed),
        allocations: ALLOCATIONS.load(Ordering::Relaxed),
        deallocations: DEALLOCATIONS.load(Ordering::Relaxed),
    }
}

/// Reset the peak to the current live size
pub fn reset_peak() {
    let live = ALLOCATED_BYTES
        .load(Ordering::Relaxed)
        .saturating_sub(FREED_BYTES.load(Ordering::Relaxed));
    PEAK_BYTES.store(live, Ordering::Relaxed);
}
