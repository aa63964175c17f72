// alloc.rs - Port of reg_mem_init and the re_malloc/re_realloc wrappers.
// Pluggable memory accounting for compile- and match-time growth.

//! Every growth of an internal structure (node array, DFA states and their
//! transition tables, state logs, the backtracking fail stack, the
//! backreference cache) is first charged against the [`RegAllocator`] that
//! belongs to the pattern buffer. A refused charge becomes
//! `RegErrcode::ESpace` at compile time and `-2` from the `re_search`
//! family. The default [`SystemAllocator`] never refuses; [`MemoryLimit`]
//! enforces a byte budget shared by every structure charged to it.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::regex::RegErrcode;

/// Memory capability: the four operations GNU callers install through
/// `reg_mem_init`.
pub trait RegAllocator: Send + Sync {
    /// Account for `bytes` of new storage. Returns `false` to refuse.
    fn allocate(&self, bytes: usize) -> bool;

    /// Account for resizing a block from `old` to `new` bytes.
    fn reallocate(&self, old: usize, new: usize) -> bool {
        if new > old {
            self.allocate(new - old)
        } else {
            self.release(old - new);
            true
        }
    }

    /// Return `bytes` of storage.
    fn release(&self, bytes: usize);

    /// Account for `count` zeroed items of `size` bytes.
    fn zero_allocate(&self, count: usize, size: usize) -> bool {
        match count.checked_mul(size) {
            Some(bytes) => self.allocate(bytes),
            None => false,
        }
    }
}

/// Never refuses.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemAllocator;

impl RegAllocator for SystemAllocator {
    fn allocate(&self, _bytes: usize) -> bool {
        true
    }

    fn release(&self, _bytes: usize) {}
}

/// Refuses once the outstanding total would exceed `limit` bytes.
pub struct MemoryLimit {
    limit: usize,
    used: AtomicUsize,
}

impl MemoryLimit {
    pub fn new(limit: usize) -> Self {
        MemoryLimit {
            limit,
            used: AtomicUsize::new(0),
        }
    }

    /// Bytes currently charged.
    pub fn used(&self) -> usize {
        self.used.load(Ordering::Relaxed)
    }

    pub fn limit(&self) -> usize {
        self.limit
    }
}

impl RegAllocator for MemoryLimit {
    fn allocate(&self, bytes: usize) -> bool {
        let mut cur = self.used.load(Ordering::Relaxed);
        loop {
            let Some(next) = cur.checked_add(bytes).filter(|&n| n <= self.limit) else {
                return false;
            };
            match self
                .used
                .compare_exchange_weak(cur, next, Ordering::AcqRel, Ordering::Relaxed)
            {
                Ok(_) => return true,
                Err(actual) => cur = actual,
            }
        }
    }

    fn release(&self, bytes: usize) {
        let mut cur = self.used.load(Ordering::Relaxed);
        loop {
            let next = cur.saturating_sub(bytes);
            match self
                .used
                .compare_exchange_weak(cur, next, Ordering::AcqRel, Ordering::Relaxed)
            {
                Ok(_) => return,
                Err(actual) => cur = actual,
            }
        }
    }
}

impl fmt::Debug for MemoryLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryLimit")
            .field("limit", &self.limit)
            .field("used", &self.used())
            .finish()
    }
}

/// Running total charged by one owner; released when the owner drops.
pub(crate) struct Charge {
    allocator: Arc<dyn RegAllocator>,
    bytes: usize,
}

impl Charge {
    pub fn new(allocator: Arc<dyn RegAllocator>) -> Self {
        Charge { allocator, bytes: 0 }
    }

    /// Charge `bytes` more, or fail with `ESpace`.
    pub fn grow(&mut self, bytes: usize) -> Result<(), RegErrcode> {
        if bytes == 0 {
            return Ok(());
        }
        if !self.allocator.allocate(bytes) {
            return Err(RegErrcode::ESpace);
        }
        self.bytes += bytes;
        Ok(())
    }

    /// Charge `count` items of `T`.
    pub fn grow_items<T>(&mut self, count: usize) -> Result<(), RegErrcode> {
        let bytes = count
            .checked_mul(std::mem::size_of::<T>())
            .ok_or(RegErrcode::ESpace)?;
        self.grow(bytes)
    }

    /// Return everything charged so far.
    pub fn reset(&mut self) {
        if self.bytes > 0 {
            self.allocator.release(self.bytes);
            self.bytes = 0;
        }
    }

    pub fn allocator(&self) -> &Arc<dyn RegAllocator> {
        &self.allocator
    }
}

impl Drop for Charge {
    fn drop(&mut self) {
        self.reset();
    }
}
