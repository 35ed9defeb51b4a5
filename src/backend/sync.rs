// Synchronization primitives
//
// A single fence signals host-side completion of a submitted dispatch.

use ash::vk;
use std::time::Duration;

use super::device::fence_timeout_ns;
use super::error::{Result, VkResultExt};
use super::ComputeDevice;

pub struct Fence<'a> {
    device: &'a ComputeDevice,
    pub fence: vk::Fence,
}

impl<'a> Fence<'a> {
    /// Create an unsignalled fence.
    pub fn new(device: &'a ComputeDevice) -> Result<Self> {
        let fence_info = vk::FenceCreateInfo::builder();

        let fence = unsafe { device.device.create_fence(&fence_info, None) }
            .vk_check("vkCreateFence")?;

        Ok(Self { device, fence })
    }

    /// Block until the fence signals. `None` waits without a bound.
    pub fn wait(&self, timeout: Option<Duration>) -> Result<()> {
        unsafe {
            self.device
                .device
                .wait_for_fences(&[self.fence], true, fence_timeout_ns(timeout))
        }
        .vk_check("vkWaitForFences")
    }
}

impl Drop for Fence<'_> {
    fn drop(&mut self) {
        log::debug!("Destroying fence");
        unsafe { self.device.device.destroy_fence(self.fence, None) };
    }
}
