//! Shader effects combine the stages of a pipeline and derive its descriptor set layouts and pipeline layout
//! from reflection.
//!
//! # Example
//! ```ignore
//! use descriptors::prelude::*;
//!
//! let mut shaders = ShaderCache::new(device.clone());
//! let mut layouts = LayoutCache::new(device.clone());
//!
//! let mut effect = ShaderEffect::new(device.clone());
//! effect.add_stage(shaders.get_shader("mesh.vert.spv")?, vk::ShaderStageFlags::VERTEX)?;
//! effect.add_stage(shaders.get_shader("textured.frag.spv")?, vk::ShaderStageFlags::FRAGMENT)?;
//! // Reflection reports `sampler2D` bindings as combined image samplers. If the shader
//! // declares a separate texture, say so explicitly.
//! effect.reflect_layout(&mut layouts, &[ReflectionOverride::new("albedo", vk::DescriptorType::SAMPLED_IMAGE)])?;
//!
//! let layout = effect.pipeline_layout()?;
//! ```

use std::collections::btree_map::BTreeMap;
use std::collections::HashMap;
use std::ffi::CStr;
use std::sync::Arc;

use anyhow::Result;
use ash::vk;

use crate::core::traits::Backend;
use crate::pipeline::pipeline_layout::{PipelineLayout, PushConstantRange};
use crate::pipeline::set_layout::{LayoutBinding, LayoutCache, LayoutDescriptor};
use crate::pipeline::shader::ShaderModule;
use crate::{Device, Error};

/// Number of descriptor sets an effect can use. Shaders declaring a higher set index are rejected.
pub const MAX_DESCRIPTOR_SETS: usize = 4;

// Every Vulkan implementation supports binding at least four sets at once.
const_assert!(MAX_DESCRIPTOR_SETS > 0 && MAX_DESCRIPTOR_SETS <= 4);

/// Where a named shader resource lives.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct EffectBinding {
    pub set: u32,
    pub binding: u32,
    pub ty: vk::DescriptorType,
}

/// Replaces the reflected descriptor type of every binding with the given name.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ReflectionOverride<'a> {
    pub name: &'a str,
    pub ty: vk::DescriptorType,
}

impl<'a> ReflectionOverride<'a> {
    pub fn new(name: &'a str, ty: vk::DescriptorType) -> Self {
        Self {
            name,
            ty,
        }
    }
}

#[derive(Debug)]
struct ShaderStage<B: Backend> {
    module: Arc<ShaderModule<B>>,
    stage: vk::ShaderStageFlags,
}

#[derive(Debug)]
struct ReflectedLayout<B: Backend> {
    set_bindings: [LayoutDescriptor; MAX_DESCRIPTOR_SETS],
    set_layouts: [vk::DescriptorSetLayout; MAX_DESCRIPTOR_SETS],
    bindings: HashMap<String, EffectBinding>,
    pipeline_layout: PipelineLayout<B>,
}

/// A set of shader stages used together in one pipeline, plus everything derived from their reflection data:
/// merged per-set layouts, a name lookup table for bindings, push constant ranges and the pipeline layout.
///
/// Add all stages with [`add_stage`](ShaderEffect::add_stage), then call
/// [`reflect_layout`](ShaderEffect::reflect_layout) exactly once. The derived state is immutable afterwards.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct ShaderEffect<B: Backend = Device> {
    #[derivative(Debug = "ignore")]
    backend: B,
    stages: Vec<ShaderStage<B>>,
    layout: Option<ReflectedLayout<B>>,
}

fn merge_set(bindings: Vec<LayoutBinding>) -> LayoutDescriptor {
    // The first occurrence of a binding index decides type and count, later stages only add their visibility.
    let mut merged = BTreeMap::new();
    for binding in bindings {
        merged
            .entry(binding.binding)
            .and_modify(|existing: &mut LayoutBinding| existing.stages |= binding.stages)
            .or_insert(binding);
    }
    LayoutDescriptor::new(merged.into_values().collect::<Vec<_>>())
}

impl<B: Backend> ShaderEffect<B> {
    /// Create an empty effect.
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            stages: Vec::new(),
            layout: None,
        }
    }

    /// Append a shader stage.
    /// # Errors
    /// - Fails with [`Error::EffectAlreadyReflected`] if the layout was already reflected.
    pub fn add_stage(&mut self, module: Arc<ShaderModule<B>>, stage: vk::ShaderStageFlags) -> Result<()> {
        if self.layout.is_some() {
            return Err(Error::EffectAlreadyReflected.into());
        }
        self.stages.push(ShaderStage {
            module,
            stage,
        });
        Ok(())
    }

    /// Derive set layouts, push constant ranges and the pipeline layout from the reflection data of all stages.
    ///
    /// When two bindings share a name, the one reflected last wins and a warning is logged. Use
    /// [`reflect_layout_strict`](ShaderEffect::reflect_layout_strict) to reject such shaders instead.
    /// # Errors
    /// - Fails with [`Error::SetIndexOutOfRange`] if a shader uses a set index of [`MAX_DESCRIPTOR_SETS`] or higher.
    /// - Fails with [`Error::EffectAlreadyReflected`] if called twice.
    /// - Fails if creating a set layout or the pipeline layout fails.
    pub fn reflect_layout(&mut self, cache: &mut LayoutCache<B>, overrides: &[ReflectionOverride]) -> Result<()> {
        self.reflect(cache, overrides, false)
    }

    /// Same as [`reflect_layout`](ShaderEffect::reflect_layout), but a name that refers to two different bindings
    /// fails with [`Error::AliasedDescriptor`].
    pub fn reflect_layout_strict(&mut self, cache: &mut LayoutCache<B>, overrides: &[ReflectionOverride]) -> Result<()> {
        self.reflect(cache, overrides, true)
    }

    fn reflect(&mut self, cache: &mut LayoutCache<B>, overrides: &[ReflectionOverride], strict: bool) -> Result<()> {
        if self.layout.is_some() {
            return Err(Error::EffectAlreadyReflected.into());
        }

        let mut bindings = HashMap::new();
        let mut per_set: [Vec<LayoutBinding>; MAX_DESCRIPTOR_SETS] = Default::default();
        let mut push_constants = Vec::new();

        for stage in &self.stages {
            let reflection = stage.module.reflection();
            if reflection.stage != stage.stage {
                warn!(
                    "Shader module reflected as {:?} was added as stage {:?}, using {:?}",
                    reflection.stage, stage.stage, stage.stage
                );
            }

            for reflected in &reflection.bindings {
                let set = reflected.set as usize;
                if set >= MAX_DESCRIPTOR_SETS {
                    return Err(Error::SetIndexOutOfRange {
                        set: reflected.set,
                        max: MAX_DESCRIPTOR_SETS,
                    }
                    .into());
                }

                let ty = overrides
                    .iter()
                    .rev()
                    .find(|ov| ov.name == reflected.name)
                    .map(|ov| ov.ty)
                    .unwrap_or(reflected.ty);

                let entry = EffectBinding {
                    set: reflected.set,
                    binding: reflected.binding,
                    ty,
                };
                if let Some(previous) = bindings.insert(reflected.name.clone(), entry) {
                    if previous != entry {
                        if strict {
                            return Err(Error::AliasedDescriptor(reflected.name.clone()).into());
                        }
                        warn!(
                            "Descriptor `{}` declared as set {} binding {} and as set {} binding {}, keeping the latter",
                            reflected.name, previous.set, previous.binding, entry.set, entry.binding
                        );
                    }
                }

                per_set[set].push(LayoutBinding::new(reflected.binding, ty, reflected.descriptor_count(), stage.stage));
            }

            if let Some(block) = reflection.push_constants {
                push_constants.push(PushConstantRange {
                    stage_flags: stage.stage,
                    offset: block.offset,
                    size: block.size,
                });
            }
        }

        let set_bindings = per_set.map(merge_set);
        let mut set_layouts = [vk::DescriptorSetLayout::null(); MAX_DESCRIPTOR_SETS];
        for (index, descriptor) in set_bindings.iter().enumerate() {
            if !descriptor.is_empty() {
                set_layouts[index] = cache.get_or_create_descriptor(descriptor)?;
            }
        }

        // Unused sets are left out of the pipeline layout entirely.
        let compacted = set_layouts
            .iter()
            .copied()
            .filter(|layout| *layout != vk::DescriptorSetLayout::null())
            .collect::<Vec<_>>();
        if let Some(highest) = set_layouts.iter().rposition(|layout| *layout != vk::DescriptorSetLayout::null()) {
            if compacted.len() != highest + 1 {
                warn!(
                    "Shader effect uses {} descriptor sets with gaps up to set {highest}, pipeline layout set indices will not match shader set indices",
                    compacted.len()
                );
            }
        }

        let pipeline_layout = PipelineLayout::new(self.backend.clone(), compacted, push_constants)?;
        debug!(
            "Reflected shader effect with {} stages: {} named bindings, {} push constant ranges",
            self.stages.len(),
            bindings.len(),
            pipeline_layout.push_constants().len()
        );

        self.layout = Some(ReflectedLayout {
            set_bindings,
            set_layouts,
            bindings,
            pipeline_layout,
        });
        Ok(())
    }

    fn reflected(&self) -> Result<&ReflectedLayout<B>> {
        self.layout.as_ref().ok_or_else(|| Error::EffectNotReflected.into())
    }

    /// Whether [`reflect_layout`](ShaderEffect::reflect_layout) was called successfully.
    pub fn is_reflected(&self) -> bool {
        self.layout.is_some()
    }

    /// The pipeline layout built from all used set layouts and push constant ranges.
    /// # Errors
    /// - Fails with [`Error::EffectNotReflected`] before reflection.
    pub fn pipeline_layout(&self) -> Result<vk::PipelineLayout> {
        Ok(unsafe { self.reflected()?.pipeline_layout.handle() })
    }

    /// The layout of descriptor set `set`. Null for unused sets, out of range indices or before reflection.
    pub fn set_layout(&self, set: usize) -> vk::DescriptorSetLayout {
        self.layout
            .as_ref()
            .and_then(|layout| layout.set_layouts.get(set).copied())
            .unwrap_or_default()
    }

    /// The layouts of all sets, indexed by set number. Empty before reflection.
    pub fn set_layouts(&self) -> &[vk::DescriptorSetLayout] {
        match &self.layout {
            Some(layout) => layout.set_layouts.as_slice(),
            None => &[],
        }
    }

    /// The merged bindings of descriptor set `set`.
    pub fn set_bindings(&self, set: usize) -> Option<&LayoutDescriptor> {
        self.layout.as_ref().and_then(|layout| layout.set_bindings.get(set))
    }

    /// Look up a binding by the name used in the shader.
    pub fn binding(&self, name: &str) -> Option<&EffectBinding> {
        self.layout.as_ref().and_then(|layout| layout.bindings.get(name))
    }

    /// All named bindings of this effect.
    pub fn bindings(&self) -> impl Iterator<Item = (&str, &EffectBinding)> {
        self.layout
            .iter()
            .flat_map(|layout| layout.bindings.iter())
            .map(|(name, binding)| (name.as_str(), binding))
    }

    /// Push constant ranges, one per stage that declares a push constant block.
    pub fn push_constants(&self) -> &[PushConstantRange] {
        match &self.layout {
            Some(layout) => layout.pipeline_layout.push_constants(),
            None => &[],
        }
    }

    /// The shader stages of this effect, in the order they were added.
    pub fn stages(&self) -> impl Iterator<Item = (&Arc<ShaderModule<B>>, vk::ShaderStageFlags)> {
        self.stages.iter().map(|stage| (&stage.module, stage.stage))
    }

    /// The pipeline bind point matching the stages of this effect.
    pub fn bind_point(&self) -> vk::PipelineBindPoint {
        let ray_tracing = vk::ShaderStageFlags::RAYGEN_KHR
            | vk::ShaderStageFlags::MISS_KHR
            | vk::ShaderStageFlags::CLOSEST_HIT_KHR
            | vk::ShaderStageFlags::ANY_HIT_KHR
            | vk::ShaderStageFlags::INTERSECTION_KHR
            | vk::ShaderStageFlags::CALLABLE_KHR;
        let all = self.stages.iter().fold(vk::ShaderStageFlags::empty(), |acc, stage| acc | stage.stage);
        if all == vk::ShaderStageFlags::COMPUTE {
            vk::PipelineBindPoint::COMPUTE
        } else if !all.is_empty() && ray_tracing.contains(all) {
            vk::PipelineBindPoint::RAY_TRACING_KHR
        } else {
            vk::PipelineBindPoint::GRAPHICS
        }
    }

    /// Shader stage create infos for building a pipeline with this effect.
    /// The returned structs point into `entry`, which must outlive their use.
    pub fn stage_create_infos(&self, entry: &CStr) -> Vec<vk::PipelineShaderStageCreateInfo> {
        self.stages
            .iter()
            .map(|stage| {
                vk::PipelineShaderStageCreateInfo::builder()
                    .stage(stage.stage)
                    .module(unsafe { stage.module.handle() })
                    .name(entry)
                    .build()
            })
            .collect()
    }
}
