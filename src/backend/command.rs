// Command pool and one-shot compute recording

use ash::vk;

use super::error::{Result, VkResultExt};
use super::ComputeDevice;

/// Transient command pool on the compute queue family. Command buffers
/// allocated from it are freed with the pool.
pub struct CommandPool<'a> {
    device: &'a ComputeDevice,
    pub pool: vk::CommandPool,
}

impl<'a> CommandPool<'a> {
    pub fn transient(device: &'a ComputeDevice) -> Result<Self> {
        let pool_info = vk::CommandPoolCreateInfo::builder()
            .queue_family_index(device.compute_queue_family)
            .flags(vk::CommandPoolCreateFlags::TRANSIENT);

        let pool = unsafe { device.device.create_command_pool(&pool_info, None) }
            .vk_check("vkCreateCommandPool")?;

        Ok(Self { device, pool })
    }

    pub fn allocate_primary(&self) -> Result<vk::CommandBuffer> {
        let alloc_info = vk::CommandBufferAllocateInfo::builder()
            .command_pool(self.pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);

        let buffers = unsafe { self.device.device.allocate_command_buffers(&alloc_info) }
            .vk_check("vkAllocateCommandBuffers")?;

        Ok(buffers[0])
    }
}

impl Drop for CommandPool<'_> {
    fn drop(&mut self) {
        log::debug!("Destroying command pool");
        unsafe { self.device.device.destroy_command_pool(self.pool, None) };
    }
}

/// What a single compute dispatch binds.
#[derive(Debug, Clone, Copy)]
pub struct DispatchCommand {
    pub pipeline: vk::Pipeline,
    pub layout: vk::PipelineLayout,
    pub descriptor_set: vk::DescriptorSet,
    pub group_count_x: u32,
}

/// Record bind pipeline, bind descriptor set and one dispatch into `command_buffer`.
pub fn record_dispatch(
    device: &ComputeDevice,
    command_buffer: vk::CommandBuffer,
    command: &DispatchCommand,
) -> Result<()> {
    let begin_info =
        vk::CommandBufferBeginInfo::builder().flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);

    unsafe {
        device
            .device
            .begin_command_buffer(command_buffer, &begin_info)
            .vk_check("vkBeginCommandBuffer")?;

        device.device.cmd_bind_pipeline(
            command_buffer,
            vk::PipelineBindPoint::COMPUTE,
            command.pipeline,
        );
        device.device.cmd_bind_descriptor_sets(
            command_buffer,
            vk::PipelineBindPoint::COMPUTE,
            command.layout,
            0,
            &[command.descriptor_set],
            &[],
        );
        device
            .device
            .cmd_dispatch(command_buffer, command.group_count_x, 1, 1);

        device
            .device
            .end_command_buffer(command_buffer)
            .vk_check("vkEndCommandBuffer")?;
    }

    log::trace!("Recorded dispatch of {} group(s)", command.group_count_x);
    Ok(())
}
