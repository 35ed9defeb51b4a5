// Error taxonomy for the compute backend
//
// Every native call is checked right where it is made; a non-success status
// becomes `ComputeError::Vulkan` carrying the call name and the status code.

use ash::prelude::VkResult;
use ash::vk;
use std::borrow::Cow;
use std::fmt;
use std::path::PathBuf;

/// Errors raised by the compute backend. All of them are fatal for the
/// dispatch that produced them.
#[derive(Debug)]
pub enum ComputeError {
    /// The Vulkan loader could not be initialized.
    Loader(String),
    /// A native call returned a non-success status.
    Vulkan {
        call: &'static str,
        result: vk::Result,
    },
    /// The instance enumerated no physical devices.
    NoPhysicalDevice,
    /// The selected device has no queue family with compute support.
    NoComputeQueue,
    /// No memory type is both allowed for the resource and host visible + coherent.
    NoCompatibleMemoryType {
        type_bits: u32,
        required: vk::MemoryPropertyFlags,
    },
    /// The kernel binary could not be read from disk.
    KernelIo {
        path: PathBuf,
        source: std::io::Error,
    },
    /// The kernel binary is not a SPIR-V module.
    InvalidKernel { path: PathBuf, reason: String },
    /// Element count is zero or not a whole number of work-groups.
    InvalidElementCount { count: usize, local_size: u32 },
    /// The dispatch needs more work-groups than the device allows.
    WorkGroupLimit { groups: u32, limit: u32 },
    /// Zero-sized buffers are not valid Vulkan objects.
    EmptyBuffer,
    /// Generated input would not fit the element type.
    InputTooLarge { count: usize, max: usize },
    /// A host copy does not fit in the mapped buffer.
    BufferOverflow {
        requested: vk::DeviceSize,
        capacity: vk::DeviceSize,
    },
}

impl fmt::Display for ComputeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Loader(msg) => write!(f, "Vulkan could not be initialized: {msg}"),
            Self::Vulkan { call, result } => {
                write!(f, "{call} failed: {}", describe_result(*result))
            }
            Self::NoPhysicalDevice => write!(f, "No Vulkan-capable GPU found"),
            Self::NoComputeQueue => write!(f, "GPU does not support any compute queues"),
            Self::NoCompatibleMemoryType {
                type_bits,
                required,
            } => write!(
                f,
                "No memory type in mask {type_bits:#b} has the requested flags {required:?}"
            ),
            Self::KernelIo { path, source } => {
                write!(f, "Unable to open kernel {}: {source}", path.display())
            }
            Self::InvalidKernel { path, reason } => {
                write!(f, "Invalid SPIR-V kernel {}: {reason}", path.display())
            }
            Self::InvalidElementCount { count, local_size } => write!(
                f,
                "Element count {count} is not a non-zero multiple of the local group size {local_size}"
            ),
            Self::WorkGroupLimit { groups, limit } => write!(
                f,
                "Dispatch needs {groups} work-groups but the device allows at most {limit}"
            ),
            Self::EmptyBuffer => write!(f, "Storage buffers must hold at least one element"),
            Self::InputTooLarge { count, max } => {
                write!(f, "Input of {count} elements exceeds the maximum of {max}")
            }
            Self::BufferOverflow {
                requested,
                capacity,
            } => write!(
                f,
                "Host copy of {requested} bytes exceeds buffer capacity of {capacity} bytes"
            ),
        }
    }
}

impl std::error::Error for ComputeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::KernelIo { source, .. } => Some(source),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ComputeError>;

/// Attach the native call name to a failed `VkResult`.
pub trait VkResultExt<T> {
    fn vk_check(self, call: &'static str) -> Result<T>;
}

impl<T> VkResultExt<T> for VkResult<T> {
    fn vk_check(self, call: &'static str) -> Result<T> {
        self.map_err(|result| ComputeError::Vulkan { call, result })
    }
}

/// Human-readable translation of a Vulkan status code.
pub fn describe_result(result: vk::Result) -> Cow<'static, str> {
    let text = match result {
        // Success codes
        vk::Result::SUCCESS => "Command successfully completed.",
        vk::Result::NOT_READY => "A fence or query has not yet completed.",
        vk::Result::TIMEOUT => "A wait operation has not completed in the specified time.",
        vk::Result::EVENT_SET => "An event is signaled.",
        vk::Result::EVENT_RESET => "An event is unsignaled.",
        vk::Result::INCOMPLETE => "A return array was too small for the result.",
        vk::Result::SUBOPTIMAL_KHR => {
            "A swapchain no longer matches the surface properties exactly, but can still be used to present to the surface successfully."
        }

        // Error codes
        vk::Result::ERROR_OUT_OF_HOST_MEMORY => "A host memory allocation has failed.",
        vk::Result::ERROR_OUT_OF_DEVICE_MEMORY => "A device memory allocation has failed.",
        vk::Result::ERROR_INITIALIZATION_FAILED => {
            "Initialization of an object could not be completed for implementation-specific reasons."
        }
        vk::Result::ERROR_DEVICE_LOST => "The logical or physical device has been lost.",
        vk::Result::ERROR_MEMORY_MAP_FAILED => "Mapping of a memory object has failed.",
        vk::Result::ERROR_LAYER_NOT_PRESENT => {
            "A requested layer is not present or could not be loaded."
        }
        vk::Result::ERROR_EXTENSION_NOT_PRESENT => "A requested extension is not supported.",
        vk::Result::ERROR_FEATURE_NOT_PRESENT => "A requested feature is not supported.",
        vk::Result::ERROR_INCOMPATIBLE_DRIVER => {
            "The requested version of Vulkan is not supported by the driver or is otherwise incompatible for implementation-specific reasons."
        }
        vk::Result::ERROR_TOO_MANY_OBJECTS => {
            "Too many objects of the type have already been created."
        }
        vk::Result::ERROR_FORMAT_NOT_SUPPORTED => {
            "A requested format is not supported on this device."
        }
        vk::Result::ERROR_SURFACE_LOST_KHR => "A surface is no longer available.",
        vk::Result::ERROR_NATIVE_WINDOW_IN_USE_KHR => {
            "The requested window is already connected to a VkSurfaceKHR, or to some other non-Vulkan API."
        }
        vk::Result::ERROR_OUT_OF_DATE_KHR => {
            "A surface has changed in such a way that it is no longer compatible with the swapchain, and further presentation requests using the swapchain will fail. Applications must query the new surface properties and recreate their swapchain if they wish to continue presenting to the surface."
        }
        vk::Result::ERROR_INCOMPATIBLE_DISPLAY_KHR => {
            "The display used by a swapchain does not use the same presentable image layout, or is incompatible in a way that prevents sharing an image."
        }
        vk::Result::ERROR_VALIDATION_FAILED_EXT => "A validation layer found an error.",
        other => return Cow::Owned(format!("Unknown VkResult: {:#x}", other.as_raw())),
    };

    Cow::Borrowed(text)
}
