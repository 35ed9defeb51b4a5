// End-to-end dispatch on a real Vulkan device.
//
// Each test returns early when the machine has no usable Vulkan driver or
// the kernel was not compiled (glslc missing at build time).

mod common;

use std::ffi::CStr;
use std::time::Duration;

use square_compute::backend::buffer::StorageBuffer;
use square_compute::backend::ComputeError;
use square_compute::dispatch::{self, Kernel};

use common::square_kernel;

fn device() -> Option<square_compute::backend::ComputeDevice> {
    common::device(false)
}

#[test]
fn squares_reference_input() {
    let Some(device) = device() else { return };
    let Some(spirv) = square_kernel() else { return };

    let kernel = Kernel {
        spirv: &spirv,
        entry_point: c"main",
        local_size_x: 32,
    };
    let input = dispatch::ramp_input(32);

    let output = dispatch::run_elementwise(&device, &kernel, &input, None).unwrap();

    let expected: Vec<f32> = (0..32).map(|i| (i * i) as f32).collect();
    assert_eq!(output, expected);
    assert_eq!(output[31], 961.0);
}

#[test]
fn squares_several_work_groups() {
    let Some(device) = device() else { return };
    let Some(spirv) = square_kernel() else { return };

    let kernel = Kernel {
        spirv: &spirv,
        entry_point: c"main",
        local_size_x: 32,
    };
    let input: Vec<f32> = (0..128).map(|i| i as f32 * 0.5 - 16.0).collect();

    let output = dispatch::run_elementwise(
        &device,
        &kernel,
        &input,
        Some(Duration::from_secs(10)),
    )
    .unwrap();

    for (x, y) in input.iter().zip(&output) {
        assert_eq!(*y, x * x);
    }
}

#[test]
fn rejects_partial_work_group_before_touching_the_gpu() {
    let Some(device) = device() else { return };

    let spirv = [0x0723_0203u32];
    let entry_point: &CStr = c"main";
    let kernel = Kernel {
        spirv: &spirv,
        entry_point,
        local_size_x: 32,
    };

    let err = dispatch::run_elementwise(&device, &kernel, &[1.0; 31], None).unwrap_err();
    assert!(matches!(
        err,
        ComputeError::InvalidElementCount {
            count: 31,
            local_size: 32
        }
    ));
}

#[test]
fn upload_without_dispatch() {
    let Some(device) = device() else { return };

    let input = dispatch::powers_of_two_input(32).unwrap();
    dispatch::upload_only(&device, &input).unwrap();
}

#[test]
fn upload_rejects_empty_input() {
    let Some(device) = device() else { return };

    let err = dispatch::upload_only(&device, &[]).unwrap_err();
    assert!(matches!(err, ComputeError::EmptyBuffer));
}

#[test]
fn buffer_round_trips_through_host_mapping() {
    let Some(device) = device() else { return };

    let buffer = StorageBuffer::with_elements::<f32>(&device, 32).unwrap();
    let input = dispatch::powers_of_two_input(32).unwrap();
    buffer.write(&input).unwrap();

    assert_eq!(buffer.read::<f32>(32).unwrap(), input);
    assert!(matches!(
        buffer.read::<f32>(33),
        Err(ComputeError::BufferOverflow { .. })
    ));
}
