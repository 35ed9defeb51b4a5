// Buffer setup without a dispatch: create the device, upload powers of two
// into a storage buffer, release everything. Prints nothing on success.

use anyhow::{Context, Result};
use square_compute::backend::ComputeDevice;
use square_compute::config::CONFIG_PATH;
use square_compute::dispatch;
use square_compute::logging::init_from_config_file;
use std::path::Path;

fn main() -> Result<()> {
    let config = init_from_config_file(Path::new(CONFIG_PATH), "warn");

    let device = ComputeDevice::new(&config.device.app_name, config.enable_validation())
        .context("Failed to initialize Vulkan compute device")?;

    let input = dispatch::powers_of_two_input(config.kernel.element_count)?;
    dispatch::upload_only(&device, &input).context("Buffer upload failed")?;

    Ok(())
}
