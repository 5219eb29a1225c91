//! Pooled descriptor set allocation.

use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::Result;
use ash::vk;

use crate::core::traits::Backend;
use crate::descriptor::descriptor_pool::create_pool;
use crate::descriptor::settings::AllocatorSettings;
use crate::{Device, Error};

static NEXT_ALLOCATOR_ID: AtomicU64 = AtomicU64::new(0);

/// Identifies the lifetime of descriptor sets handed out by an allocator.
/// Sets allocated under one epoch stay valid until the epoch changes, which happens on every
/// [`DescriptorAllocator::reset_pools`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct AllocatorEpoch {
    allocator: u64,
    generation: u64,
}

/// Allocates descriptor sets from a growing set of descriptor pools.
///
/// Sets are never freed individually. Instead, once the GPU is done with every set allocated
/// in a frame, [`reset_pools`](DescriptorAllocator::reset_pools) reclaims all of them at once and
/// keeps the pools around for reuse. Each frame in flight should get its own allocator.
///
/// # Example
/// ```ignore
/// # use descriptors::*;
/// let mut allocator = DescriptorAllocator::new(device.clone(), AllocatorBuilder::new().build())?;
/// let set = allocator.allocate(layout)?;
/// // ... record commands using `set`, submit, wait for the frame fence ...
/// allocator.reset_pools()?;
/// ```
#[derive(Derivative)]
#[derivative(Debug)]
pub struct DescriptorAllocator<B: Backend = Device> {
    #[derivative(Debug = "ignore")]
    backend: B,
    settings: AllocatorSettings,
    free: Vec<vk::DescriptorPool>,
    used: Vec<vk::DescriptorPool>,
    current: Option<vk::DescriptorPool>,
    id: u64,
    generation: u64,
    grow_count: u64,
}

fn is_pool_pressure(result: vk::Result) -> bool {
    result == vk::Result::ERROR_OUT_OF_POOL_MEMORY || result == vk::Result::ERROR_FRAGMENTED_POOL
}

impl<B: Backend> DescriptorAllocator<B> {
    /// Create a new descriptor allocator. No pools are created until the first allocation.
    /// # Errors
    /// - Fails with [`Error::InvalidSettings`] if `sets_per_pool` or `max_grow_retries` is zero.
    pub fn new(backend: B, settings: AllocatorSettings) -> Result<Self> {
        if settings.sets_per_pool == 0 {
            return Err(Error::InvalidSettings("sets_per_pool must be greater than zero").into());
        }
        if settings.max_grow_retries == 0 {
            return Err(Error::InvalidSettings("max_grow_retries must be at least one").into());
        }
        Ok(Self {
            backend,
            settings,
            free: Vec::new(),
            used: Vec::new(),
            current: None,
            id: NEXT_ALLOCATOR_ID.fetch_add(1, Ordering::Relaxed),
            generation: 0,
            grow_count: 0,
        })
    }

    /// Take a pool out of the free list, or create a new one if there is none left.
    /// The pool is marked as used and becomes the current pool.
    fn grab_pool(&mut self) -> Result<vk::DescriptorPool> {
        let pool = match self.free.pop() {
            Some(pool) => pool,
            None => create_pool(
                &self.backend,
                &self.settings.pool_sizes,
                self.settings.sets_per_pool,
                self.settings.pool_flags,
            )?,
        };
        self.used.push(pool);
        self.current = Some(pool);
        Ok(pool)
    }

    /// Allocate a descriptor set with the given layout.
    ///
    /// If the current pool is exhausted or fragmented, a fresh pool is grabbed and the allocation is
    /// retried, up to `max_grow_retries` times.
    /// # Errors
    /// - Fails with [`Error::DescriptorPoolExhausted`] if every retry also hit pool exhaustion or fragmentation.
    /// - Fails with [`Error::VkError`] on any other backend error, without retrying.
    pub fn allocate(&mut self, layout: vk::DescriptorSetLayout) -> Result<vk::DescriptorSet> {
        let pool = match self.current {
            Some(pool) => pool,
            None => self.grab_pool()?,
        };

        let mut last = match self.backend.allocate_descriptor_set(pool, layout) {
            Ok(set) => return Ok(set),
            Err(result) if is_pool_pressure(result) => result,
            Err(result) => return Err(Error::VkError(result).into()),
        };

        for _ in 0..self.settings.max_grow_retries {
            self.grow_count += 1;
            let pool = self.grab_pool()?;
            info!(
                "Descriptor pool allocation failed with {last:?}, switched to a fresh pool ({} pools total)",
                self.pool_count()
            );
            match self.backend.allocate_descriptor_set(pool, layout) {
                Ok(set) => return Ok(set),
                Err(result) if is_pool_pressure(result) => last = result,
                Err(result) => return Err(Error::VkError(result).into()),
            }
        }

        let attempts = self.settings.max_grow_retries + 1;
        error!("Descriptor set allocation failed after {attempts} attempts: {last:?}");
        Err(Error::DescriptorPoolExhausted {
            attempts,
            last,
        }
        .into())
    }

    /// Reclaim every descriptor set allocated since the last reset.
    ///
    /// Only call this once the GPU finished executing all work referencing those sets.
    /// All used pools are reset and moved to the free list, and a new epoch starts.
    /// If a reset fails partway, the pools reset before the failure still start a new epoch.
    pub fn reset_pools(&mut self) -> Result<()> {
        let mut used = std::mem::take(&mut self.used).into_iter();
        let mut reset_any = false;
        while let Some(pool) = used.next() {
            if let Err(err) = self.backend.reset_descriptor_pool(pool) {
                // Keep ownership of the remaining pools so they are still destroyed on drop.
                self.used.push(pool);
                self.used.extend(used);
                if reset_any {
                    // Sets handed out from the recycled pools are gone.
                    if self.current.map_or(false, |current| !self.used.contains(&current)) {
                        self.current = None;
                    }
                    self.generation += 1;
                }
                return Err(err);
            }
            reset_any = true;
            self.free.push(pool);
        }
        self.current = None;
        self.generation += 1;
        Ok(())
    }

    /// The current allocation epoch.
    pub fn epoch(&self) -> AllocatorEpoch {
        AllocatorEpoch {
            allocator: self.id,
            generation: self.generation,
        }
    }

    /// Total number of pools owned by this allocator.
    pub fn pool_count(&self) -> usize {
        self.free.len() + self.used.len()
    }

    /// Number of pools available for reuse.
    pub fn free_pool_count(&self) -> usize {
        self.free.len()
    }

    /// Number of pools that served allocations since the last reset.
    pub fn used_pool_count(&self) -> usize {
        self.used.len()
    }

    /// Number of times a fresh pool was grabbed because the current one was exhausted or fragmented.
    pub fn grow_count(&self) -> u64 {
        self.grow_count
    }

    /// The settings this allocator was created with.
    pub fn settings(&self) -> &AllocatorSettings {
        &self.settings
    }
}

impl<B: Backend> Drop for DescriptorAllocator<B> {
    fn drop(&mut self) {
        for pool in self.free.drain(..).chain(self.used.drain(..)) {
            self.backend.destroy_descriptor_pool(pool);
        }
    }
}
