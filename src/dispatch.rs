// =============================================================================
// ELEMENTWISE DISPATCH - one kernel run over a float array
// =============================================================================
//
// STAGES:
// 1. Resources   - input/output storage buffers, input uploaded
// 2. Bindings    - set layout, pipeline layout, pool, one set (0 = in, 1 = out)
// 3. Pipeline    - shader module -> compute pipeline, module dropped right away
// 4. Recording   - transient pool, one primary buffer, one dispatch
// 5. Submission  - submit, wait on a fence
// 6. Readback    - map output, copy, unmap
//
// Resources are locals declared in acquisition order; they drop in reverse
// (command pool, pipeline, descriptor pool, pipeline layout, set layout,
// output buffer, input buffer), on success and on every early `?` return.
//
// =============================================================================

use std::ffi::CStr;
use std::time::Duration;

use crate::backend::buffer::StorageBuffer;
use crate::backend::command::{record_dispatch, CommandPool, DispatchCommand};
use crate::backend::descriptor::{write_storage_buffers, DescriptorPool, DescriptorSetLayout};
use crate::backend::pipeline::{ComputePipeline, PipelineLayout};
use crate::backend::shader::ShaderModule;
use crate::backend::sync::Fence;
use crate::backend::{ComputeDevice, ComputeError, Result};

/// Input slot 0, output slot 1.
const BINDING_COUNT: u32 = 2;

/// A compiled kernel and the launch parameters it was compiled for.
pub struct Kernel<'k> {
    pub spirv: &'k [u32],
    pub entry_point: &'k CStr,
    /// `local_size_x` declared in the kernel
    pub local_size_x: u32,
}

/// Work-group count for `element_count` elements. The kernel has no bounds
/// check, so the count must be a non-zero multiple of the local size.
pub fn group_count(element_count: usize, local_size_x: u32) -> Result<u32> {
    let invalid = ComputeError::InvalidElementCount {
        count: element_count,
        local_size: local_size_x,
    };

    if element_count == 0 || local_size_x == 0 || element_count % local_size_x as usize != 0 {
        return Err(invalid);
    }

    u32::try_from(element_count / local_size_x as usize).map_err(|_| invalid)
}

/// Run `kernel` over `input` and return one output value per input element.
pub fn run_elementwise(
    device: &ComputeDevice,
    kernel: &Kernel<'_>,
    input: &[f32],
    fence_timeout: Option<Duration>,
) -> Result<Vec<f32>> {
    let groups = group_count(input.len(), kernel.local_size_x)?;
    let limit = device.max_work_group_count_x();
    if groups > limit {
        return Err(ComputeError::WorkGroupLimit { groups, limit });
    }

    // ─── Stage 1: resources ──────────────────────────────────────────────────
    let input_buffer = StorageBuffer::with_elements::<f32>(device, input.len())?;
    input_buffer.write(input)?;
    let output_buffer = StorageBuffer::with_elements::<f32>(device, input.len())?;

    // ─── Stage 2: bindings ───────────────────────────────────────────────────
    let set_layout = DescriptorSetLayout::storage_buffers(device, BINDING_COUNT)?;
    let pipeline_layout = PipelineLayout::new(device, &set_layout)?;
    let descriptor_pool = DescriptorPool::for_layout(device, &set_layout)?;
    let descriptor_set = descriptor_pool.allocate(&set_layout)?;
    write_storage_buffers(device, descriptor_set, &[&input_buffer, &output_buffer]);

    // ─── Stage 3: pipeline ───────────────────────────────────────────────────
    let pipeline = {
        let module = ShaderModule::new(device, kernel.spirv)?;
        ComputePipeline::new(device, &pipeline_layout, &module, kernel.entry_point)?
    };

    // ─── Stage 4: recording ──────────────────────────────────────────────────
    let command_pool = CommandPool::transient(device)?;
    let command_buffer = command_pool.allocate_primary()?;
    record_dispatch(
        device,
        command_buffer,
        &DispatchCommand {
            pipeline: pipeline.pipeline,
            layout: pipeline_layout.layout,
            descriptor_set,
            group_count_x: groups,
        },
    )?;

    // ─── Stage 5: submission ─────────────────────────────────────────────────
    {
        let fence = Fence::new(device)?;
        device.submit(command_buffer, fence.fence)?;
        log::info!("Dispatched {} work-group(s), waiting for completion", groups);
        if let Err(err) = fence.wait(fence_timeout) {
            // Every resource below is still referenced by the pending submit
            log::error!("{}; waiting for the device before releasing resources", err);
            if let Err(idle) = device.wait_idle() {
                log::error!("{}", idle);
            }
            return Err(err);
        }
    }

    // ─── Stage 6: readback ───────────────────────────────────────────────────
    let output = output_buffer.read::<f32>(input.len())?;
    log::info!("Read back {} values", output.len());

    Ok(output)
}

/// Allocate both buffers and upload `input` without running any kernel.
pub fn upload_only(device: &ComputeDevice, input: &[f32]) -> Result<()> {
    if input.is_empty() {
        return Err(ComputeError::EmptyBuffer);
    }

    let input_buffer = StorageBuffer::with_elements::<f32>(device, input.len())?;
    input_buffer.write(input)?;
    let _output_buffer = StorageBuffer::with_elements::<f32>(device, input.len())?;

    log::debug!("Uploaded {} values, releasing buffers", input.len());
    Ok(())
}

/// `[0, 1, 2, ..., count - 1]`
pub fn ramp_input(count: usize) -> Vec<f32> {
    (0..count).map(|i| i as f32).collect()
}

/// Longest powers-of-two input whose values stay finite in f32 (2^127).
pub const MAX_POWERS_OF_TWO: usize = f32::MAX_EXP as usize - 1;

/// `[2, 4, 8, ..., 2^count]`
pub fn powers_of_two_input(count: usize) -> Result<Vec<f32>> {
    let too_large = || ComputeError::InputTooLarge {
        count,
        max: MAX_POWERS_OF_TWO,
    };
    if count > MAX_POWERS_OF_TWO {
        return Err(too_large());
    }
    let last = i32::try_from(count).map_err(|_| too_large())?;

    Ok((1..=last).map(|exp| 2f32.powi(exp)).collect())
}

/// Render values the way the console output shows them: `[0, 1, 4]`.
pub fn format_values(values: &[f32]) -> String {
    let items: Vec<String> = values.iter().map(|v| v.to_string()).collect();
    format!("[{}]", items.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_input_needs_one_group() {
        assert_eq!(group_count(32, 32).unwrap(), 1);
        assert_eq!(group_count(96, 32).unwrap(), 3);
    }

    #[test]
    fn partial_groups_are_rejected() {
        for count in [0, 1, 31, 33, 100] {
            let err = group_count(count, 32).unwrap_err();
            assert!(matches!(
                err,
                ComputeError::InvalidElementCount { local_size: 32, .. }
            ));
        }
        assert!(group_count(32, 0).is_err());
    }

    #[test]
    fn ramp_counts_up_from_zero() {
        let input = ramp_input(32);
        assert_eq!(input.len(), 32);
        assert_eq!(input[0], 0.0);
        assert_eq!(input[31], 31.0);
    }

    #[test]
    fn powers_of_two_start_at_two() {
        let input = powers_of_two_input(32).unwrap();
        assert_eq!(input.len(), 32);
        assert_eq!(&input[..4], &[2.0, 4.0, 8.0, 16.0]);
        assert_eq!(input[31], 4_294_967_296.0);
    }

    #[test]
    fn powers_of_two_stay_finite() {
        let input = powers_of_two_input(MAX_POWERS_OF_TWO).unwrap();
        assert_eq!(input.len(), 127);
        assert!(input.iter().all(|v| v.is_finite()));

        for count in [MAX_POWERS_OF_TWO + 1, usize::MAX] {
            assert!(matches!(
                powers_of_two_input(count),
                Err(ComputeError::InputTooLarge { max: 127, .. })
            ));
        }
    }

    #[test]
    fn values_print_without_trailing_zeros() {
        assert_eq!(format_values(&[0.0, 1.0, 4.0, 961.0]), "[0, 1, 4, 961]");
        assert_eq!(format_values(&[0.5]), "[0.5]");
        assert_eq!(format_values(&[]), "[]");
    }
}
