// Compute kernel loading
//
// Vulkan consumes SPIR-V as 32-bit words. Kernels are read from disk at
// runtime and wrapped in a shader module only long enough to build a pipeline.

use ash::vk;
use std::io::Cursor;
use std::path::Path;

use super::error::{ComputeError, Result, VkResultExt};
use super::ComputeDevice;

/// Read a SPIR-V kernel from `path` into aligned words.
pub fn load_kernel(path: &Path) -> Result<Vec<u32>> {
    let bytes = std::fs::read(path).map_err(|source| ComputeError::KernelIo {
        path: path.to_path_buf(),
        source,
    })?;

    let words = parse_spirv(&bytes).map_err(|reason| ComputeError::InvalidKernel {
        path: path.to_path_buf(),
        reason,
    })?;

    log::debug!("Loaded kernel {:?} ({} words)", path, words.len());
    Ok(words)
}

/// Validate the SPIR-V header and convert to native-endian words.
pub fn parse_spirv(bytes: &[u8]) -> std::result::Result<Vec<u32>, String> {
    ash::util::read_spv(&mut Cursor::new(bytes)).map_err(|e| e.to_string())
}

/// Shader module that lives only until the pipeline using it is built.
pub struct ShaderModule<'a> {
    device: &'a ComputeDevice,
    pub module: vk::ShaderModule,
}

impl<'a> ShaderModule<'a> {
    pub fn new(device: &'a ComputeDevice, code: &[u32]) -> Result<Self> {
        let create_info = vk::ShaderModuleCreateInfo::builder().code(code);

        let module = unsafe { device.device.create_shader_module(&create_info, None) }
            .vk_check("vkCreateShaderModule")?;

        Ok(Self { device, module })
    }
}

impl Drop for ShaderModule<'_> {
    fn drop(&mut self) {
        log::debug!("Destroying shader module");
        unsafe { self.device.device.destroy_shader_module(self.module, None) };
    }
}
