use std::ops::Deref;
use std::sync::Arc;

use anyhow::Result;
use ash::vk;

use crate::core::traits::Backend;
use crate::descriptor::descriptor_set::DescriptorBufferWrite;
use crate::pipeline::pipeline_layout::PushConstantRange;
use crate::pipeline::set_layout::LayoutBinding;
use crate::pipeline::shader_reflection::ModuleReflection;

#[derive(Derivative)]
#[derivative(Debug)]
struct DeviceInner {
    #[derivative(Debug = "ignore")]
    handle: ash::Device,
}

/// Wrapper around a `VkDevice` created by the engine. Internal state is wrapped in an `Arc<DeviceInner>`,
/// so this is safe to clone.
///
/// The device is borrowed, not owned: dropping the last copy does not destroy the `VkDevice`.
/// The engine must keep it alive until every allocator, cache and effect created from it was dropped.
#[derive(Debug, Clone)]
pub struct Device {
    inner: Arc<DeviceInner>,
}

assert_impl_all!(Device: Send, Sync);

impl Device {
    /// Wrap an already created logical device.
    pub fn new(handle: ash::Device) -> Self {
        Self {
            inner: Arc::new(DeviceInner {
                handle,
            }),
        }
    }

    /// Get unsafe access to the underlying VkDevice handle
    /// # Safety
    /// * The caller should not call `vkDestroyDevice` on this.
    /// * This handle is valid as long as there is a copy of `self` alive.
    pub unsafe fn handle(&self) -> ash::Device {
        self.inner.handle.clone()
    }
}

impl Deref for Device {
    type Target = ash::Device;

    fn deref(&self) -> &Self::Target {
        &self.inner.handle
    }
}

impl Backend for Device {
    fn create_descriptor_pool(
        &self,
        sizes: &[vk::DescriptorPoolSize],
        max_sets: u32,
        flags: vk::DescriptorPoolCreateFlags,
    ) -> Result<vk::DescriptorPool> {
        let info = vk::DescriptorPoolCreateInfo::builder()
            .flags(flags)
            .max_sets(max_sets)
            .pool_sizes(sizes)
            .build();
        let handle = unsafe { self.inner.handle.create_descriptor_pool(&info, None)? };
        #[cfg(feature = "log-objects")]
        trace!("Created new VkDescriptorPool {handle:p}");
        Ok(handle)
    }

    fn destroy_descriptor_pool(&self, pool: vk::DescriptorPool) {
        #[cfg(feature = "log-objects")]
        trace!("Destroying VkDescriptorPool {pool:p}");
        unsafe {
            self.inner.handle.destroy_descriptor_pool(pool, None);
        }
    }

    fn allocate_descriptor_set(
        &self,
        pool: vk::DescriptorPool,
        layout: vk::DescriptorSetLayout,
    ) -> std::result::Result<vk::DescriptorSet, vk::Result> {
        let info = vk::DescriptorSetAllocateInfo::builder()
            .descriptor_pool(pool)
            .set_layouts(std::slice::from_ref(&layout))
            .build();
        let sets = unsafe { self.inner.handle.allocate_descriptor_sets(&info)? };
        sets.first().copied().ok_or(vk::Result::ERROR_UNKNOWN)
    }

    fn reset_descriptor_pool(&self, pool: vk::DescriptorPool) -> Result<()> {
        unsafe {
            self.inner
                .handle
                .reset_descriptor_pool(pool, vk::DescriptorPoolResetFlags::empty())?;
        }
        Ok(())
    }

    fn create_descriptor_set_layout(&self, bindings: &[LayoutBinding]) -> Result<vk::DescriptorSetLayout> {
        let bindings = bindings.iter().map(|binding| binding.to_vk()).collect::<Vec<_>>();
        let info = vk::DescriptorSetLayoutCreateInfo::builder()
            .bindings(bindings.as_slice())
            .build();
        let handle = unsafe { self.inner.handle.create_descriptor_set_layout(&info, None)? };
        #[cfg(feature = "log-objects")]
        trace!("Created new VkDescriptorSetLayout {handle:p}");
        Ok(handle)
    }

    fn destroy_descriptor_set_layout(&self, layout: vk::DescriptorSetLayout) {
        #[cfg(feature = "log-objects")]
        trace!("Destroying VkDescriptorSetLayout {layout:p}");
        unsafe {
            self.inner.handle.destroy_descriptor_set_layout(layout, None);
        }
    }

    fn create_pipeline_layout(
        &self,
        set_layouts: &[vk::DescriptorSetLayout],
        push_constants: &[PushConstantRange],
    ) -> Result<vk::PipelineLayout> {
        let pc = push_constants.iter().map(|pc| pc.to_vk()).collect::<Vec<_>>();
        let info = vk::PipelineLayoutCreateInfo::builder()
            .push_constant_ranges(pc.as_slice())
            .set_layouts(set_layouts)
            .build();
        let handle = unsafe { self.inner.handle.create_pipeline_layout(&info, None)? };
        #[cfg(feature = "log-objects")]
        trace!("Created new VkPipelineLayout {handle:p}");
        Ok(handle)
    }

    fn destroy_pipeline_layout(&self, layout: vk::PipelineLayout) {
        #[cfg(feature = "log-objects")]
        trace!("Destroying VkPipelineLayout {layout:p}");
        unsafe {
            self.inner.handle.destroy_pipeline_layout(layout, None);
        }
    }

    fn create_shader_module(&self, code: &[u32]) -> Result<vk::ShaderModule> {
        let info = vk::ShaderModuleCreateInfo::builder().code(code).build();
        let handle = unsafe { self.inner.handle.create_shader_module(&info, None)? };
        #[cfg(feature = "log-objects")]
        trace!("Created new VkShaderModule {handle:p}");
        Ok(handle)
    }

    fn destroy_shader_module(&self, module: vk::ShaderModule) {
        #[cfg(feature = "log-objects")]
        trace!("Destroying VkShaderModule {module:p}");
        unsafe {
            self.inner.handle.destroy_shader_module(module, None);
        }
    }

    #[cfg(feature = "shader-reflection")]
    fn reflect_module(&self, code: &[u32]) -> Result<ModuleReflection> {
        crate::pipeline::shader_reflection::reflect_spirv(code)
    }

    #[cfg(not(feature = "shader-reflection"))]
    fn reflect_module(&self, _code: &[u32]) -> Result<ModuleReflection> {
        Err(crate::Error::NoReflectionInformation.into())
    }

    fn write_buffer_descriptors(&self, set: vk::DescriptorSet, writes: &[DescriptorBufferWrite]) {
        // Buffer infos must stay alive and in place until the update call returns.
        let infos = writes.iter().map(|write| write.buffer_info()).collect::<Vec<_>>();
        let vk_writes = writes
            .iter()
            .zip(infos.iter())
            .map(|(write, info)| {
                vk::WriteDescriptorSet::builder()
                    .dst_set(set)
                    .dst_binding(write.binding)
                    .dst_array_element(0)
                    .descriptor_type(write.ty)
                    .buffer_info(std::slice::from_ref(info))
                    .build()
            })
            .collect::<Vec<_>>();
        unsafe {
            self.inner.handle.update_descriptor_sets(vk_writes.as_slice(), &[]);
        }
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
        unsafe {
            self.inner
                .handle
                .cmd_bind_descriptor_sets(cmd, bind_point, layout, first_set, sets, dynamic_offsets);
        }
    }
}
