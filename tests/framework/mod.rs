#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::Result;
use ash::vk;
use ash::vk::Handle;

use descriptors::prelude::*;

/// Pool created through the mock backend.
#[derive(Debug, Clone)]
pub struct MockPool {
    pub sizes: PoolSizes,
    pub max_sets: u32,
    pub allocated: u32,
    pub resets: u32,
}

/// Pool sizes recorded by the mock backend. `vk::DescriptorPoolSize` has no
/// `PartialEq` in ash 0.37, so compare field-wise here.
#[derive(Debug, Clone)]
pub struct PoolSizes(pub Vec<vk::DescriptorPoolSize>);

impl PartialEq<Vec<vk::DescriptorPoolSize>> for PoolSizes {
    fn eq(&self, other: &Vec<vk::DescriptorPoolSize>) -> bool {
        self.0.len() == other.len()
            && self
                .0
                .iter()
                .zip(other)
                .all(|(a, b)| a.ty == b.ty && a.descriptor_count == b.descriptor_count)
    }
}

/// A recorded `vkCmdBindDescriptorSets` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindCommand {
    pub cmd: vk::CommandBuffer,
    pub bind_point: vk::PipelineBindPoint,
    pub layout: vk::PipelineLayout,
    pub first_set: u32,
    pub sets: Vec<vk::DescriptorSet>,
    pub dynamic_offsets: Vec<u32>,
}

#[derive(Debug, Clone)]
pub struct MockPipelineLayout {
    pub set_layouts: Vec<vk::DescriptorSetLayout>,
    pub push_constants: Vec<PushConstantRange>,
}

#[derive(Debug, Default)]
pub struct State {
    next_handle: u64,
    next_module_key: u32,
    pub pools: HashMap<vk::DescriptorPool, MockPool>,
    pub destroyed_pools: Vec<vk::DescriptorPool>,
    pub allocations: u32,
    /// Results returned by the next allocation calls, before looking at pool capacity.
    pub allocation_failures: VecDeque<vk::Result>,
    /// Number of pool resets that still succeed before the next one fails.
    pub reset_failure_after: Option<u32>,
    pub set_layouts: HashMap<vk::DescriptorSetLayout, Vec<LayoutBinding>>,
    pub destroyed_set_layouts: Vec<vk::DescriptorSetLayout>,
    pub pipeline_layouts: HashMap<vk::PipelineLayout, MockPipelineLayout>,
    pub destroyed_pipeline_layouts: Vec<vk::PipelineLayout>,
    pub shader_modules: Vec<vk::ShaderModule>,
    pub destroyed_shader_modules: Vec<vk::ShaderModule>,
    /// Reflection data handed out by `reflect_module`, keyed by the first word of the bytecode.
    pub reflections: HashMap<u32, ModuleReflection>,
    pub writes: Vec<(vk::DescriptorSet, Vec<DescriptorBufferWrite>)>,
    pub binds: Vec<BindCommand>,
}

impl State {
    fn next_raw(&mut self) -> u64 {
        self.next_handle += 1;
        self.next_handle
    }

    pub fn live_pools(&self) -> usize {
        self.pools.len() - self.destroyed_pools.len()
    }
}

/// Backend that records every call instead of talking to a GPU.
#[derive(Debug, Clone, Default)]
pub struct MockBackend {
    state: Arc<Mutex<State>>,
}

impl MockBackend {
    pub fn new() -> Self {
        init_logging();
        Self::default()
    }

    pub fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    /// Make the next allocation calls fail with the given results.
    pub fn fail_allocations(&self, results: impl IntoIterator<Item = vk::Result>) {
        self.state().allocation_failures.extend(results);
    }

    /// Let `successes` pool resets go through, then fail the next one with `ERROR_DEVICE_LOST`.
    pub fn fail_reset_after(&self, successes: u32) {
        self.state().reset_failure_after = Some(successes);
    }

    /// Register reflection data and return bytecode that reflects to it.
    pub fn register_module(&self, reflection: ModuleReflection) -> Vec<u32> {
        let mut state = self.state();
        state.next_module_key += 1;
        let key = 0x1000 + state.next_module_key;
        state.reflections.insert(key, reflection);
        vec![key, 0x0723_0203]
    }

    /// Create a shader module from registered reflection data.
    pub fn module(&self, reflection: ModuleReflection) -> Result<Arc<ShaderModule<MockBackend>>> {
        let code = self.register_module(reflection);
        Ok(Arc::new(ShaderModule::from_spirv(self.clone(), code)?))
    }
}

impl Backend for MockBackend {
    fn create_descriptor_pool(
        &self,
        sizes: &[vk::DescriptorPoolSize],
        max_sets: u32,
        _flags: vk::DescriptorPoolCreateFlags,
    ) -> Result<vk::DescriptorPool> {
        let mut state = self.state();
        let pool = vk::DescriptorPool::from_raw(state.next_raw());
        state.pools.insert(
            pool,
            MockPool {
                sizes: PoolSizes(sizes.to_vec()),
                max_sets,
                allocated: 0,
                resets: 0,
            },
        );
        Ok(pool)
    }

    fn destroy_descriptor_pool(&self, pool: vk::DescriptorPool) {
        self.state().destroyed_pools.push(pool);
    }

    fn allocate_descriptor_set(
        &self,
        pool: vk::DescriptorPool,
        _layout: vk::DescriptorSetLayout,
    ) -> std::result::Result<vk::DescriptorSet, vk::Result> {
        let mut state = self.state();
        if let Some(result) = state.allocation_failures.pop_front() {
            return Err(result);
        }
        let entry = state.pools.get_mut(&pool).ok_or(vk::Result::ERROR_UNKNOWN)?;
        if entry.allocated >= entry.max_sets {
            return Err(vk::Result::ERROR_OUT_OF_POOL_MEMORY);
        }
        entry.allocated += 1;
        state.allocations += 1;
        Ok(vk::DescriptorSet::from_raw(state.next_raw()))
    }

    fn reset_descriptor_pool(&self, pool: vk::DescriptorPool) -> Result<()> {
        let mut state = self.state();
        match state.reset_failure_after {
            Some(0) => {
                state.reset_failure_after = None;
                return Err(Error::VkError(vk::Result::ERROR_DEVICE_LOST).into());
            }
            Some(remaining) => state.reset_failure_after = Some(remaining - 1),
            None => {}
        }
        let entry = state.pools.get_mut(&pool).ok_or(Error::VkError(vk::Result::ERROR_UNKNOWN))?;
        entry.allocated = 0;
        entry.resets += 1;
        Ok(())
    }

    fn create_descriptor_set_layout(&self, bindings: &[LayoutBinding]) -> Result<vk::DescriptorSetLayout> {
        let mut state = self.state();
        let layout = vk::DescriptorSetLayout::from_raw(state.next_raw());
        state.set_layouts.insert(layout, bindings.to_vec());
        Ok(layout)
    }

    fn destroy_descriptor_set_layout(&self, layout: vk::DescriptorSetLayout) {
        self.state().destroyed_set_layouts.push(layout);
    }

    fn create_pipeline_layout(
        &self,
        set_layouts: &[vk::DescriptorSetLayout],
        push_constants: &[PushConstantRange],
    ) -> Result<vk::PipelineLayout> {
        let mut state = self.state();
        let layout = vk::PipelineLayout::from_raw(state.next_raw());
        state.pipeline_layouts.insert(
            layout,
            MockPipelineLayout {
                set_layouts: set_layouts.to_vec(),
                push_constants: push_constants.to_vec(),
            },
        );
        Ok(layout)
    }

    fn destroy_pipeline_layout(&self, layout: vk::PipelineLayout) {
        self.state().destroyed_pipeline_layouts.push(layout);
    }

    fn create_shader_module(&self, _code: &[u32]) -> Result<vk::ShaderModule> {
        let mut state = self.state();
        let module = vk::ShaderModule::from_raw(state.next_raw());
        state.shader_modules.push(module);
        Ok(module)
    }

    fn destroy_shader_module(&self, module: vk::ShaderModule) {
        self.state().destroyed_shader_modules.push(module);
    }

    fn reflect_module(&self, code: &[u32]) -> Result<ModuleReflection> {
        let state = self.state();
        code.first()
            .and_then(|key| state.reflections.get(key))
            .cloned()
            .ok_or_else(|| Error::InvalidSpirv("unknown test module".to_string()).into())
    }

    fn write_buffer_descriptors(&self, set: vk::DescriptorSet, writes: &[DescriptorBufferWrite]) {
        self.state().writes.push((set, writes.to_vec()));
    }

    fn cmd_bind_descriptor_sets(
        &self,
        cmd: vk::CommandBuffer,
        bind_point: vk::PipelineBindPoint,
        layout: vk::PipelineLayout,
        first_set: u32,
        sets: &[vk::DescriptorSet],
        dynamic_offsets: &[u32],
    ) {
        self.state().binds.push(BindCommand {
            cmd,
            bind_point,
            layout,
            first_set,
            sets: sets.to_vec(),
            dynamic_offsets: dynamic_offsets.to_vec(),
        });
    }
}

pub fn init_logging() {
    let _ = pretty_env_logger::try_init();
}

/// A reflected binding without array dimensions.
pub fn binding(name: &str, set: u32, binding: u32, ty: vk::DescriptorType) -> ReflectedBinding {
    ReflectedBinding {
        name: name.to_string(),
        set,
        binding,
        ty,
        array_dims: vec![],
    }
}

pub fn reflection(stage: vk::ShaderStageFlags, bindings: Vec<ReflectedBinding>) -> ModuleReflection {
    ModuleReflection {
        stage,
        bindings,
        push_constants: None,
    }
}

pub fn buffer(raw: u64, offset: u64, size: u64) -> BufferView {
    BufferView::new(vk::Buffer::from_raw(raw), offset, size)
}
