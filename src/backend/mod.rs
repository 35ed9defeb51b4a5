// Backend module - Vulkan compute layer
//
// Thin owning wrappers around ash handles. Every wrapper borrows the
// `ComputeDevice` and releases its handle on drop, so resources declared in
// acquisition order are released in reverse.

pub mod buffer;
pub mod command;
pub mod descriptor;
pub mod device;
pub mod error;
pub mod pipeline;
pub mod shader;
pub mod sync;

pub use device::ComputeDevice;
pub use error::{ComputeError, Result};
