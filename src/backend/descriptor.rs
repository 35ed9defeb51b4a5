// Descriptor set layout, pool and set for storage-buffer bindings

use ash::vk;

use super::buffer::StorageBuffer;
use super::error::{Result, VkResultExt};
use super::ComputeDevice;

/// Layout with one storage-buffer binding per slot, visible to the compute stage.
pub struct DescriptorSetLayout<'a> {
    device: &'a ComputeDevice,
    pub layout: vk::DescriptorSetLayout,
    pub binding_count: u32,
}

impl<'a> DescriptorSetLayout<'a> {
    pub fn storage_buffers(device: &'a ComputeDevice, binding_count: u32) -> Result<Self> {
        let bindings = storage_bindings(binding_count);

        let create_info = vk::DescriptorSetLayoutCreateInfo::builder().bindings(&bindings);

        let layout = unsafe { device.device.create_descriptor_set_layout(&create_info, None) }
            .vk_check("vkCreateDescriptorSetLayout")?;

        Ok(Self {
            device,
            layout,
            binding_count,
        })
    }
}

impl Drop for DescriptorSetLayout<'_> {
    fn drop(&mut self) {
        log::debug!("Destroying descriptor set layout");
        unsafe {
            self.device
                .device
                .destroy_descriptor_set_layout(self.layout, None);
        }
    }
}

/// Pool sized for exactly one set of `descriptor_count` storage buffers.
///
/// Sets allocated from the pool are freed together with it.
pub struct DescriptorPool<'a> {
    device: &'a ComputeDevice,
    pub pool: vk::DescriptorPool,
}

impl<'a> DescriptorPool<'a> {
    pub fn for_layout(device: &'a ComputeDevice, layout: &DescriptorSetLayout<'_>) -> Result<Self> {
        let pool_sizes = [vk::DescriptorPoolSize {
            ty: vk::DescriptorType::STORAGE_BUFFER,
            descriptor_count: layout.binding_count,
        }];

        let create_info = vk::DescriptorPoolCreateInfo::builder()
            .max_sets(1)
            .pool_sizes(&pool_sizes);

        let pool = unsafe { device.device.create_descriptor_pool(&create_info, None) }
            .vk_check("vkCreateDescriptorPool")?;

        Ok(Self { device, pool })
    }

    pub fn allocate(&self, layout: &DescriptorSetLayout<'_>) -> Result<vk::DescriptorSet> {
        let set_layouts = [layout.layout];
        let alloc_info = vk::DescriptorSetAllocateInfo::builder()
            .descriptor_pool(self.pool)
            .set_layouts(&set_layouts);

        let sets = unsafe { self.device.device.allocate_descriptor_sets(&alloc_info) }
            .vk_check("vkAllocateDescriptorSets")?;

        Ok(sets[0])
    }
}

impl Drop for DescriptorPool<'_> {
    fn drop(&mut self) {
        log::debug!("Destroying descriptor pool");
        unsafe { self.device.device.destroy_descriptor_pool(self.pool, None) };
    }
}

/// Point binding `i` of `set` at `buffers[i]`.
pub fn write_storage_buffers(
    device: &ComputeDevice,
    set: vk::DescriptorSet,
    buffers: &[&StorageBuffer<'_>],
) {
    let buffer_infos: Vec<vk::DescriptorBufferInfo> =
        buffers.iter().map(|buffer| buffer.descriptor_info()).collect();

    let writes: Vec<vk::WriteDescriptorSet> = buffer_infos
        .iter()
        .enumerate()
        .map(|(binding, info)| {
            vk::WriteDescriptorSet::builder()
                .dst_set(set)
                .dst_binding(binding as u32)
                .descriptor_type(vk::DescriptorType::STORAGE_BUFFER)
                .buffer_info(std::slice::from_ref(info))
                .build()
        })
        .collect();

    unsafe { device.device.update_descriptor_sets(&writes, &[]) };
}

fn storage_bindings(count: u32) -> Vec<vk::DescriptorSetLayoutBinding> {
    (0..count)
        .map(|binding| {
            vk::DescriptorSetLayoutBinding::builder()
                .binding(binding)
                .descriptor_type(vk::DescriptorType::STORAGE_BUFFER)
                .descriptor_count(1)
                .stage_flags(vk::ShaderStageFlags::COMPUTE)
                .build()
        })
        .collect()
}
