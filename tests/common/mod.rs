// Helpers shared by the integration tests: device/kernel setup that skips on
// machines without Vulkan, and a logger that records messages per thread.

#![allow(dead_code)]

use std::cell::RefCell;
use std::path::Path;
use std::sync::Once;

use log::{Level, LevelFilter, Log, Metadata, Record};
use square_compute::backend::shader::load_kernel;
use square_compute::backend::ComputeDevice;

pub const KERNEL_PATH: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/shaders/square.comp.spv");

pub fn device(enable_validation: bool) -> Option<ComputeDevice> {
    match ComputeDevice::new("square-compute tests", enable_validation) {
        Ok(device) => Some(device),
        Err(e) => {
            eprintln!("skipping: no Vulkan compute device ({e})");
            None
        }
    }
}

pub fn square_kernel() -> Option<Vec<u32>> {
    if !Path::new(KERNEL_PATH).exists() {
        eprintln!("skipping: {KERNEL_PATH} not compiled");
        return None;
    }
    Some(load_kernel(Path::new(KERNEL_PATH)).expect("compiled kernel should be valid SPIR-V"))
}

thread_local! {
    static RECORDS: RefCell<Vec<(Level, String)>> = const { RefCell::new(Vec::new()) };
}

struct CaptureLogger;

impl Log for CaptureLogger {
    fn enabled(&self, _metadata: &Metadata<'_>) -> bool {
        true
    }

    fn log(&self, record: &Record<'_>) {
        RECORDS.with(|records| {
            records
                .borrow_mut()
                .push((record.level(), record.args().to_string()))
        });
    }

    fn flush(&self) {}
}

static LOGGER: CaptureLogger = CaptureLogger;

/// Install the capturing logger (once per test binary) and clear this
/// thread's records.
pub fn capture_logs() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        log::set_logger(&LOGGER).expect("no other logger installed in tests");
        log::set_max_level(LevelFilter::Trace);
    });
    RECORDS.with(|records| records.borrow_mut().clear());
}

/// Records logged on this thread since the last `capture_logs` or `take_logs`.
pub fn take_logs() -> Vec<(Level, String)> {
    RECORDS.with(|records| std::mem::take(&mut *records.borrow_mut()))
}
