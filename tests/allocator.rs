use std::collections::HashSet;

use anyhow::Result;
use ash::vk;
use ash::vk::Handle;

use descriptors::prelude::*;
use framework::MockBackend;

mod framework;

fn layout() -> vk::DescriptorSetLayout {
    vk::DescriptorSetLayout::from_raw(0xdead)
}

fn allocator_with_capacity(backend: &MockBackend, sets: u32) -> Result<DescriptorAllocator<MockBackend>> {
    DescriptorAllocator::new(backend.clone(), AllocatorBuilder::new().sets_per_pool(sets).build())
}

#[test]
pub fn allocations_return_distinct_handles() -> Result<()> {
    let backend = MockBackend::new();
    let mut allocator = allocator_with_capacity(&backend, 64)?;
    let mut seen = HashSet::new();
    for _ in 0..64 {
        let set = allocator.allocate(layout())?;
        assert_ne!(set, vk::DescriptorSet::null(), "Allocated set should not be null");
        assert!(seen.insert(set), "Every allocation should return a new set");
    }
    assert_eq!(allocator.pool_count(), 1);
    assert_eq!(allocator.grow_count(), 0);
    Ok(())
}

#[test]
pub fn no_pool_before_first_allocation() -> Result<()> {
    let backend = MockBackend::new();
    let allocator = allocator_with_capacity(&backend, 8)?;
    assert_eq!(allocator.pool_count(), 0);
    assert!(backend.state().pools.is_empty());
    Ok(())
}

#[test]
pub fn exceeding_capacity_grows_exactly_once() -> Result<()> {
    let backend = MockBackend::new();
    let mut allocator = DescriptorAllocator::new(backend.clone(), AllocatorSettings::default())?;
    for _ in 0..1001 {
        allocator.allocate(layout())?;
    }
    assert_eq!(allocator.grow_count(), 1, "Only the 1001st allocation should need a new pool");
    assert_eq!(allocator.pool_count(), 2);
    assert_eq!(allocator.used_pool_count(), 2);
    assert_eq!(backend.state().allocations, 1001);
    Ok(())
}

#[test]
pub fn pool_sizes_follow_ratios() -> Result<()> {
    let backend = MockBackend::new();
    let settings = AllocatorBuilder::new()
        .sets_per_pool(10)
        .pool_sizes(DescriptorPoolSizes::new([
            (vk::DescriptorType::UNIFORM_BUFFER, 2.0),
            (vk::DescriptorType::SAMPLER, 0.01),
        ]))
        .build();
    let mut allocator = DescriptorAllocator::new(backend.clone(), settings)?;
    allocator.allocate(layout())?;

    let state = backend.state();
    let pool = state.pools.values().next().expect("A pool should have been created");
    assert_eq!(pool.max_sets, 10);
    assert_eq!(
        pool.sizes,
        vec![
            vk::DescriptorPoolSize {
                ty: vk::DescriptorType::UNIFORM_BUFFER,
                descriptor_count: 20,
            },
            // Tiny ratios still get room for one descriptor.
            vk::DescriptorPoolSize {
                ty: vk::DescriptorType::SAMPLER,
                descriptor_count: 1,
            },
        ]
    );
    Ok(())
}

#[test]
pub fn reset_makes_capacity_available_again() -> Result<()> {
    let backend = MockBackend::new();
    let mut allocator = allocator_with_capacity(&backend, 4)?;
    for _ in 0..4 {
        allocator.allocate(layout())?;
    }
    let before = allocator.epoch();
    allocator.reset_pools()?;
    assert_ne!(allocator.epoch(), before, "Resetting should start a new epoch");
    assert_eq!(allocator.free_pool_count(), 1);
    assert_eq!(allocator.used_pool_count(), 0);

    for _ in 0..4 {
        allocator.allocate(layout())?;
    }
    assert_eq!(allocator.pool_count(), 1, "The reset pool should be reused instead of creating a new one");
    assert_eq!(allocator.grow_count(), 0);
    Ok(())
}

#[test]
pub fn reset_recycles_every_used_pool() -> Result<()> {
    let backend = MockBackend::new();
    let mut allocator = allocator_with_capacity(&backend, 2)?;
    for _ in 0..5 {
        allocator.allocate(layout())?;
    }
    assert_eq!(allocator.pool_count(), 3);
    allocator.reset_pools()?;
    assert_eq!(allocator.free_pool_count(), 3);
    assert!(backend.state().pools.values().all(|pool| pool.resets == 1 && pool.allocated == 0));
    Ok(())
}

#[test]
pub fn partial_reset_failure_still_starts_new_epoch() -> Result<()> {
    let backend = MockBackend::new();
    let mut allocator = allocator_with_capacity(&backend, 1)?;
    for _ in 0..3 {
        allocator.allocate(layout())?;
    }
    let before = allocator.epoch();
    backend.fail_reset_after(1);
    let err = allocator.reset_pools().unwrap_err();
    match err.downcast_ref::<Error>() {
        Some(Error::VkError(result)) => assert_eq!(*result, vk::Result::ERROR_DEVICE_LOST),
        other => panic!("Expected a Vulkan error, got {other:?}"),
    }
    assert_ne!(allocator.epoch(), before, "Sets from the pool that was reset must not be reused");
    assert_eq!(allocator.free_pool_count(), 1);
    assert_eq!(allocator.used_pool_count(), 2);
    assert_eq!(allocator.pool_count(), 3);
    Ok(())
}

#[test]
pub fn failed_first_reset_keeps_epoch() -> Result<()> {
    let backend = MockBackend::new();
    let mut allocator = allocator_with_capacity(&backend, 1)?;
    for _ in 0..2 {
        allocator.allocate(layout())?;
    }
    let before = allocator.epoch();
    backend.fail_reset_after(0);
    assert!(allocator.reset_pools().is_err());
    assert_eq!(allocator.epoch(), before, "No pool was reset, so earlier sets are still valid");
    assert_eq!(allocator.used_pool_count(), 2);

    // A later reset recycles everything.
    allocator.reset_pools()?;
    assert_ne!(allocator.epoch(), before);
    assert_eq!(allocator.free_pool_count(), 2);
    Ok(())
}

#[test]
pub fn fatal_errors_are_not_retried() -> Result<()> {
    let backend = MockBackend::new();
    let mut allocator = allocator_with_capacity(&backend, 8)?;
    backend.fail_allocations([vk::Result::ERROR_OUT_OF_DEVICE_MEMORY]);
    let err = allocator.allocate(layout()).unwrap_err();
    match err.downcast_ref::<Error>() {
        Some(Error::VkError(result)) => assert_eq!(*result, vk::Result::ERROR_OUT_OF_DEVICE_MEMORY),
        other => panic!("Expected a Vulkan error, got {other:?}"),
    }
    assert_eq!(allocator.pool_count(), 1);
    assert_eq!(allocator.grow_count(), 0);
    // The allocator is still usable afterwards.
    allocator.allocate(layout())?;
    Ok(())
}

#[test]
pub fn fragmentation_is_retried_in_a_new_pool() -> Result<()> {
    let backend = MockBackend::new();
    let mut allocator = allocator_with_capacity(&backend, 8)?;
    backend.fail_allocations([vk::Result::ERROR_FRAGMENTED_POOL]);
    allocator.allocate(layout())?;
    assert_eq!(allocator.grow_count(), 1);
    assert_eq!(allocator.pool_count(), 2);
    Ok(())
}

#[test]
pub fn persistent_fragmentation_fails() -> Result<()> {
    let backend = MockBackend::new();
    let mut allocator = allocator_with_capacity(&backend, 8)?;
    backend.fail_allocations([vk::Result::ERROR_FRAGMENTED_POOL, vk::Result::ERROR_FRAGMENTED_POOL]);
    let err = allocator.allocate(layout()).unwrap_err();
    match err.downcast_ref::<Error>() {
        Some(Error::DescriptorPoolExhausted {
            attempts,
            last,
        }) => {
            assert_eq!(*attempts, 2);
            assert_eq!(*last, vk::Result::ERROR_FRAGMENTED_POOL);
        }
        other => panic!("Expected pool exhaustion, got {other:?}"),
    }
    Ok(())
}

#[test]
pub fn retry_budget_is_configurable() -> Result<()> {
    let backend = MockBackend::new();
    let settings = AllocatorBuilder::new().sets_per_pool(8).max_grow_retries(3).build();
    let mut allocator = DescriptorAllocator::new(backend.clone(), settings)?;
    backend.fail_allocations([vk::Result::ERROR_OUT_OF_POOL_MEMORY; 3]);
    allocator.allocate(layout())?;
    assert_eq!(allocator.grow_count(), 3);
    assert_eq!(allocator.pool_count(), 4);
    Ok(())
}

#[test]
pub fn invalid_settings_are_rejected() {
    let backend = MockBackend::new();
    let zero_sets = AllocatorBuilder::new().sets_per_pool(0).build();
    assert!(DescriptorAllocator::new(backend.clone(), zero_sets).is_err());
    let zero_retries = AllocatorBuilder::new().max_grow_retries(0).build();
    assert!(DescriptorAllocator::new(backend, zero_retries).is_err());
}

#[test]
pub fn drop_destroys_all_pools() -> Result<()> {
    let backend = MockBackend::new();
    {
        let mut allocator = allocator_with_capacity(&backend, 1)?;
        for _ in 0..3 {
            allocator.allocate(layout())?;
        }
        allocator.reset_pools()?;
        allocator.allocate(layout())?;
        assert_eq!(allocator.pool_count(), 3);
    }
    let state = backend.state();
    assert_eq!(state.destroyed_pools.len(), 3);
    assert_eq!(state.live_pools(), 0);
    Ok(())
}

#[test]
pub fn epochs_differ_between_allocators() -> Result<()> {
    let backend = MockBackend::new();
    let a = allocator_with_capacity(&backend, 1)?;
    let b = allocator_with_capacity(&backend, 1)?;
    assert_ne!(a.epoch(), b.epoch());
    Ok(())
}
