// =============================================================================
// VULKAN COMPUTE SQUARE - one dispatch, printed results
// =============================================================================
//
// FLOW:
// 1. Load config.toml (defaults if absent) and set up logging
// 2. Create the compute device (instance, GPU, compute queue)
// 3. Load the SPIR-V kernel
// 4. Upload [0..32), dispatch, wait, read back
// 5. Print inputs and outputs; everything is released on the way out
//
// =============================================================================

use anyhow::{Context, Result};
use square_compute::backend::shader::load_kernel;
use square_compute::backend::ComputeDevice;
use square_compute::config::CONFIG_PATH;
use square_compute::dispatch::{self, Kernel};
use square_compute::logging::init_from_config_file;
use std::path::Path;

fn main() -> Result<()> {
    let config = init_from_config_file(Path::new(CONFIG_PATH), "info");
    log::info!("Starting compute dispatch");

    let input = dispatch::ramp_input(config.kernel.element_count);
    println!("Compute Shader Squaring");
    println!("Inputs: {}", dispatch::format_values(&input));

    let device = ComputeDevice::new(&config.device.app_name, config.enable_validation())
        .context("Failed to initialize Vulkan compute device")?;

    let spirv = load_kernel(&config.kernel.path)?;
    let entry_point = config.kernel.entry_point_cstr()?;
    let kernel = Kernel {
        spirv: &spirv,
        entry_point: &entry_point,
        local_size_x: config.kernel.local_size_x,
    };

    let output = dispatch::run_elementwise(&device, &kernel, &input, config.kernel.fence_timeout())
        .context("Compute dispatch failed")?;

    println!("Output: {}", dispatch::format_values(&output));

    log::info!("Cleanup complete");
    Ok(())
}
