// Compute pipeline creation
//
// A compute pipeline is one shader stage plus a layout describing the
// descriptor sets it reads. The layout must outlive the pipeline.

use ash::vk;
use std::ffi::CStr;

use super::descriptor::DescriptorSetLayout;
use super::error::{Result, VkResultExt};
use super::shader::ShaderModule;
use super::ComputeDevice;

pub struct PipelineLayout<'a> {
    device: &'a ComputeDevice,
    pub layout: vk::PipelineLayout,
}

impl<'a> PipelineLayout<'a> {
    pub fn new(device: &'a ComputeDevice, set_layout: &DescriptorSetLayout<'_>) -> Result<Self> {
        let set_layouts = [set_layout.layout];
        let layout_info = vk::PipelineLayoutCreateInfo::builder().set_layouts(&set_layouts);

        let layout = unsafe { device.device.create_pipeline_layout(&layout_info, None) }
            .vk_check("vkCreatePipelineLayout")?;

        Ok(Self { device, layout })
    }
}

impl Drop for PipelineLayout<'_> {
    fn drop(&mut self) {
        log::debug!("Destroying pipeline layout");
        unsafe { self.device.device.destroy_pipeline_layout(self.layout, None) };
    }
}

pub struct ComputePipeline<'a> {
    device: &'a ComputeDevice,
    pub pipeline: vk::Pipeline,
}

impl<'a> ComputePipeline<'a> {
    /// Build a compute pipeline running `entry_point` of `module`.
    pub fn new(
        device: &'a ComputeDevice,
        layout: &PipelineLayout<'_>,
        module: &ShaderModule<'_>,
        entry_point: &CStr,
    ) -> Result<Self> {
        let stage = vk::PipelineShaderStageCreateInfo::builder()
            .stage(vk::ShaderStageFlags::COMPUTE)
            .module(module.module)
            .name(entry_point)
            .build();

        let pipeline_info = vk::ComputePipelineCreateInfo::builder()
            .stage(stage)
            .layout(layout.layout)
            .build();

        let pipelines = unsafe {
            device
                .device
                .create_compute_pipelines(vk::PipelineCache::null(), &[pipeline_info], None)
        }
        .map_err(|(partial, e)| {
            for pipeline in created_pipelines(&partial) {
                unsafe { device.device.destroy_pipeline(pipeline, None) };
            }
            e
        })
        .vk_check("vkCreateComputePipelines")?;

        log::debug!("Created compute pipeline (entry point {:?})", entry_point);
        Ok(Self {
            device,
            pipeline: pipelines[0],
        })
    }
}

impl Drop for ComputePipeline<'_> {
    fn drop(&mut self) {
        log::debug!("Destroying compute pipeline");
        unsafe { self.device.device.destroy_pipeline(self.pipeline, None) };
    }
}

/// Handles a failed batch creation still produced and the caller must destroy.
fn created_pipelines(pipelines: &[vk::Pipeline]) -> impl Iterator<Item = vk::Pipeline> + '_ {
    pipelines
        .iter()
        .copied()
        .filter(|&pipeline| pipeline != vk::Pipeline::null())
}
