use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use ash::vk;

use crate::core::traits::Backend;
use crate::pipeline::shader_reflection::ModuleReflection;
use crate::util::cache::{Cache, Resource};
use crate::{Device, Error};

/// Reinterpret raw bytes as SPIR-V words. A trailing partial word is zero-padded.
pub fn spirv_words(bytes: &[u8]) -> Vec<u32> {
    bytes
        .chunks(4)
        .map(|chunk| {
            let mut word = [0u8; 4];
            word[..chunk.len()].copy_from_slice(chunk);
            u32::from_ne_bytes(word)
        })
        .collect()
}

/// Load a SPIR-V binary from disk. The file size is rounded up to a multiple of four bytes.
/// # Errors
/// Fails with [`Error::ShaderLoadFailed`] if the file cannot be read.
pub fn load_spirv_file(path: &Path) -> Result<Vec<u32>> {
    let bytes = std::fs::read(path).map_err(|source| Error::ShaderLoadFailed {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(spirv_words(&bytes))
}

/// A compiled shader: its bytecode, the backend module created from it and its reflection data.
/// Shader modules are immutable once created.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct ShaderModule<B: Backend = Device> {
    #[derivative(Debug = "ignore")]
    backend: B,
    handle: vk::ShaderModule,
    #[derivative(Debug = "ignore")]
    code: Vec<u32>,
    code_hash: u64,
    reflection: ModuleReflection,
}

impl<B: Backend> ShaderModule<B> {
    /// Reflect SPIR-V bytecode and create a shader module from it.
    /// # Errors
    /// - Fails if the bytecode cannot be reflected. No backend object is created in this case.
    /// - Fails if the backend rejects the bytecode.
    pub fn from_spirv(backend: B, code: Vec<u32>) -> Result<Self> {
        let reflection = backend.reflect_module(code.as_slice())?;
        let handle = backend.create_shader_module(code.as_slice())?;
        let mut hasher = DefaultHasher::new();
        code.hash(&mut hasher);
        Ok(Self {
            backend,
            handle,
            code,
            code_hash: hasher.finish(),
            reflection,
        })
    }

    /// Get unsafe access to the underlying `VkShaderModule` object.
    /// # Safety
    /// Any vulkan calls that mutate the shader module may put the system in an undefined state.
    pub unsafe fn handle(&self) -> vk::ShaderModule {
        self.handle
    }

    pub fn code(&self) -> &[u32] {
        self.code.as_slice()
    }

    pub fn code_hash(&self) -> u64 {
        self.code_hash
    }

    pub fn reflection(&self) -> &ModuleReflection {
        &self.reflection
    }

    /// Stage of the module's entry point, as found by reflection.
    pub fn stage(&self) -> vk::ShaderStageFlags {
        self.reflection.stage
    }
}

impl<B: Backend> Drop for ShaderModule<B> {
    fn drop(&mut self) {
        self.backend.destroy_shader_module(self.handle);
    }
}

impl<B: Backend> Resource<B> for Arc<ShaderModule<B>> {
    type Key = PathBuf;
    type ExtraParams<'a> = ();

    fn create(backend: B, path: &Self::Key, _: Self::ExtraParams<'_>) -> Result<Self> {
        let code = load_spirv_file(path)?;
        let module = ShaderModule::from_spirv(backend, code)?;
        info!("Loaded {:?} shader {}", module.stage(), path.display());
        Ok(Arc::new(module))
    }
}

/// Caches shader modules by their source path. Modules are loaded on first request and live
/// as long as the cache.
///
/// # Example
/// ```ignore
/// # use descriptors::*;
/// let mut shaders = ShaderCache::new(device.clone());
/// let vertex = shaders.get_shader("shaders/mesh.vert.spv")?;
/// let again = shaders.get_shader("shaders/mesh.vert.spv")?;
/// assert!(std::sync::Arc::ptr_eq(&vertex, &again));
/// ```
#[derive(Derivative)]
#[derivative(Debug)]
pub struct ShaderCache<B: Backend = Device> {
    #[derivative(Debug = "ignore")]
    modules: Cache<B, Arc<ShaderModule<B>>>,
}

impl<B: Backend> ShaderCache<B> {
    pub fn new(backend: B) -> Self {
        Self {
            modules: Cache::new(backend),
        }
    }

    /// Get the shader module for a SPIR-V file, loading it on first use.
    /// # Errors
    /// - Fails if the file cannot be read, reflected or turned into a shader module. Nothing is cached in that case,
    ///   so a later call retries the load.
    pub fn get_shader(&mut self, path: impl AsRef<Path>) -> Result<Arc<ShaderModule<B>>> {
        let key = path.as_ref().to_path_buf();
        self.modules.get_or_create(&key, ()).cloned()
    }

    /// Number of loaded modules.
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}
