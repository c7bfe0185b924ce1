//! Host-side model of the device memory manager the gradient engine
//! collaborates with: a best-fit free-list allocator over one reserved span,
//! with optional growth, explicit release and fenced prefetch/offload
//! transfers. Failures are reported as status codes, never panics.

use std::collections::HashMap;

use log::trace;

/// Opaque handle to an allocated buffer.
pub type BufferHandle = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemStatus {
    Success,
    InvalidArgument,
    NotInitialized,
    OutOfMemory,
}

#[derive(Debug, Clone, Copy)]
struct Block {
    offset: usize,
    size: usize,
}

/// Best-fit free-list allocator.
///
/// Allocation picks the smallest free block that fits and splits off the
/// remainder; release re-inserts the block and coalesces adjacent neighbours.
/// With `can_grow` the pool extends its capacity instead of reporting
/// [`MemStatus::OutOfMemory`].
pub struct MemoryPool {
    capacity: usize,
    can_grow: bool,
    free: Vec<Block>,
    used: HashMap<BufferHandle, Block>,
    annotations: HashMap<BufferHandle, String>,
    next_handle: BufferHandle,
    in_use: usize,
    peak: usize,
    pending_transfers: usize,
}

impl MemoryPool {
    pub fn new(capacity: usize, can_grow: bool) -> Self {
        let mut pool = MemoryPool {
            capacity: 0,
            can_grow,
            free: Vec::new(),
            used: HashMap::new(),
            annotations: HashMap::new(),
            next_handle: 1,
            in_use: 0,
            peak: 0,
            pending_transfers: 0,
        };
        if capacity > 0 {
            pool.grow(capacity);
        }
        pool
    }

    /// Extends the reserved span by `size` bytes.
    pub fn reserve(&mut self, size: usize) -> MemStatus {
        if size == 0 {
            return MemStatus::InvalidArgument;
        }
        self.grow(size);
        MemStatus::Success
    }

    fn grow(&mut self, size: usize) {
        self.free.push(Block { offset: self.capacity, size });
        self.capacity += size;
        self.coalesce();
    }

    pub fn allocate(&mut self, size: usize, annotation: &str) -> Result<BufferHandle, MemStatus> {
        if size == 0 {
            return Err(MemStatus::InvalidArgument);
        }
        if self.capacity == 0 && !self.can_grow {
            return Err(MemStatus::NotInitialized);
        }

        let best = self
            .free
            .iter()
            .enumerate()
            .filter(|(_, b)| b.size >= size)
            .min_by_key(|(_, b)| b.size)
            .map(|(i, _)| i);

        let index = match best {
            Some(i) => i,
            None => {
                if !self.can_grow {
                    return Err(MemStatus::OutOfMemory);
                }
                self.grow(size);
                return self.allocate(size, annotation);
            }
        };

        let block = self.free[index];
        if block.size == size {
            self.free.remove(index);
        } else {
            self.free[index] = Block { offset: block.offset + size, size: block.size - size };
        }

        let handle = self.next_handle;
        self.next_handle += 1;
        self.used.insert(handle, Block { offset: block.offset, size });
        self.annotations.insert(handle, annotation.to_string());
        self.in_use += size;
        self.peak = self.peak.max(self.in_use);
        trace!("allocated {} bytes for '{}'", size, annotation);
        Ok(handle)
    }

    pub fn release(&mut self, handle: BufferHandle) -> MemStatus {
        let Some(block) = self.used.remove(&handle) else {
            return MemStatus::InvalidArgument;
        };
        if let Some(annotation) = self.annotations.remove(&handle) {
            trace!("released {} bytes of '{}'", block.size, annotation);
        }
        self.in_use -= block.size;
        self.free.push(block);
        self.coalesce();
        MemStatus::Success
    }

    fn coalesce(&mut self) {
        self.free.sort_by_key(|b| b.offset);
        let mut merged: Vec<Block> = Vec::with_capacity(self.free.len());
        for block in self.free.drain(..) {
            match merged.last_mut() {
                Some(last) if last.offset + last.size == block.offset => last.size += block.size,
                _ => merged.push(block),
            }
        }
        self.free = merged;
    }

    /// Queues an asynchronous copy towards compute-resident storage. The
    /// transfer is fenced by [`MemoryPool::sync`].
    pub fn prefetch(&mut self, dst: BufferHandle, src: BufferHandle, size: usize) -> MemStatus {
        self.transfer(dst, src, size)
    }

    /// Queues an asynchronous copy away from compute-resident storage.
    pub fn offload(&mut self, dst: BufferHandle, src: BufferHandle, size: usize) -> MemStatus {
        self.transfer(dst, src, size)
    }

    fn transfer(&mut self, dst: BufferHandle, src: BufferHandle, size: usize) -> MemStatus {
        let (Some(d), Some(s)) = (self.used.get(&dst), self.used.get(&src)) else {
            return MemStatus::InvalidArgument;
        };
        if size > d.size || size > s.size {
            return MemStatus::InvalidArgument;
        }
        self.pending_transfers += 1;
        MemStatus::Success
    }

    /// Waits for all queued transfers.
    pub fn sync(&mut self) -> MemStatus {
        self.pending_transfers = 0;
        MemStatus::Success
    }

    pub fn used_memory(&self) -> usize {
        self.in_use
    }

    pub fn free_memory(&self) -> usize {
        self.capacity - self.in_use
    }

    pub fn peak_memory(&self) -> usize {
        self.peak
    }

    pub fn pending_transfers(&self) -> usize {
        self.pending_transfers
    }
}

/// Hooks the gradient engine drives while walking the backward order:
/// `prefetch` is issued for node N+1 while node N computes, and `release`
/// follows every "gradient consumed" notification so buffers are reclaimed
/// promptly instead of at end-of-pass.
pub trait ResidencyHooks {
    fn prefetch(&mut self, node: &str, bytes: usize) -> MemStatus;
    fn release(&mut self, node: &str, bytes: usize) -> MemStatus;
}

/// [`ResidencyHooks`] backed by a [`MemoryPool`], holding one live buffer per
/// node name.
pub struct PoolResidency {
    pool: MemoryPool,
    handles: HashMap<String, BufferHandle>,
}

impl PoolResidency {
    pub fn new(pool: MemoryPool) -> Self {
        PoolResidency { pool, handles: HashMap::new() }
    }

    pub fn pool(&self) -> &MemoryPool {
        &self.pool
    }
}

impl ResidencyHooks for PoolResidency {
    fn prefetch(&mut self, node: &str, bytes: usize) -> MemStatus {
        if self.handles.contains_key(node) {
            return MemStatus::Success;
        }
        match self.pool.allocate(bytes.max(1), node) {
            Ok(handle) => {
                self.handles.insert(node.to_string(), handle);
                MemStatus::Success
            }
            Err(status) => status,
        }
    }

    fn release(&mut self, node: &str, _bytes: usize) -> MemStatus {
        match self.handles.remove(node) {
            Some(handle) => self.pool.release(handle),
            None => MemStatus::Success,
        }
    }
}
