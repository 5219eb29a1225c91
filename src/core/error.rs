//! Exposes the error type of this crate

use std::path::PathBuf;

use ash::vk;
use thiserror::Error;

/// Error type that descriptor management can return.
#[derive(Error, Debug)]
pub enum Error {
    /// Generic Vulkan error type. Any backend failure that is not pool pressure ends up here.
    #[error("Vulkan error: `{0}`")]
    VkError(vk::Result),
    /// Allocating a descriptor set kept failing with `VK_ERROR_OUT_OF_POOL_MEMORY` or `VK_ERROR_FRAGMENTED_POOL`,
    /// even after grabbing fresh pools.
    #[error("Descriptor pool exhausted after {attempts} attempts (last result: `{last}`)")]
    DescriptorPoolExhausted {
        /// Number of allocation attempts made, including the first one.
        attempts: u32,
        /// Result of the final attempt.
        last: vk::Result,
    },
    /// A shader file could not be read.
    #[error("Failed to load shader `{path}`: {source}")]
    ShaderLoadFailed {
        /// Path that was requested.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Shader bytecode could not be parsed by the reflection layer.
    #[error("Invalid SPIR-V: {0}")]
    InvalidSpirv(String),
    /// Shader needs an entry point.
    #[error("Shader does not have an entry point.")]
    NoEntryPoint,
    /// A shader declared a descriptor set index outside of the supported range.
    #[error("Descriptor set index {set} is out of range, at most {max} sets are supported.")]
    SetIndexOutOfRange {
        /// Set index found in the shader.
        set: u32,
        /// Number of supported sets.
        max: usize,
    },
    /// Shader uses the same descriptor name for different bindings.
    #[error("Shader uses aliased descriptor `{0}`, which is rejected in strict reflection mode.")]
    AliasedDescriptor(String),
    /// Call requires reflection information, but the backend cannot provide it.
    #[error("Missing shader reflection information in call that requires it.")]
    NoReflectionInformation,
    /// Shader effect was used before its layout was reflected.
    #[error("Shader effect used before `reflect_layout` was called.")]
    EffectNotReflected,
    /// Shader effect was modified or reflected again after its layout was reflected.
    #[error("Shader effect layout was already reflected.")]
    EffectAlreadyReflected,
    /// Descriptor binder was used without an active shader effect.
    #[error("No shader effect bound to the descriptor binder. Call `set_shader` first.")]
    NoShaderEffect,
    /// Invalid allocator configuration.
    #[error("Invalid allocator settings: {0}")]
    InvalidSettings(&'static str),
}

impl From<vk::Result> for Error {
    fn from(value: vk::Result) -> Self {
        Error::VkError(value)
    }
}
