// Vulkan Device - compute context
//
// Responsibilities:
// - Instance creation with optional validation layers
// - Physical device selection (prefer discrete GPU)
// - Compute queue family lookup + logical device creation
// - Host-visible memory binding for storage buffers

use ash::{vk, Entry};
use std::ffi::{CStr, CString};
use std::time::Duration;

use super::error::{ComputeError, Result, VkResultExt};

const VALIDATION_LAYER: &CStr = c"VK_LAYER_KHRONOS_validation";

/// Memory flags every storage buffer is bound with: the host writes inputs
/// and reads outputs through plain mappings, without explicit flushes.
pub const HOST_MEMORY_FLAGS: vk::MemoryPropertyFlags = vk::MemoryPropertyFlags::from_raw(
    vk::MemoryPropertyFlags::HOST_VISIBLE.as_raw() | vk::MemoryPropertyFlags::HOST_COHERENT.as_raw(),
);

/// Vulkan compute context with automatic cleanup.
///
/// Every GPU resource in this crate borrows the context, so it is always
/// dropped last.
pub struct ComputeDevice {
    pub device: ash::Device,
    pub physical_device: vk::PhysicalDevice,
    pub instance: ash::Instance,
    _entry: Entry,

    pub compute_queue: vk::Queue,
    pub compute_queue_family: u32,

    debug_utils: Option<(ash::extensions::ext::DebugUtils, vk::DebugUtilsMessengerEXT)>,

    pub properties: vk::PhysicalDeviceProperties,
    pub memory_properties: vk::PhysicalDeviceMemoryProperties,
}

impl ComputeDevice {
    /// Create the compute context
    ///
    /// # Arguments
    /// * `app_name` - Application name reported to the driver
    /// * `enable_validation` - Enable Vulkan validation layers when installed
    pub fn new(app_name: &str, enable_validation: bool) -> Result<Self> {
        log::info!("Creating Vulkan compute device: {}", app_name);

        let entry = unsafe { Entry::load() }
            .map_err(|e| ComputeError::Loader(e.to_string()))?;

        let enable_validation = enable_validation && Self::validation_layer_present(&entry)?;
        let instance = Self::create_instance(&entry, app_name, enable_validation)?;

        let debug_utils = if enable_validation {
            Some(Self::setup_debug_messenger(&entry, &instance)?)
        } else {
            None
        };

        let physical_device = Self::pick_physical_device(&instance)?;

        let properties = unsafe { instance.get_physical_device_properties(physical_device) };
        let memory_properties =
            unsafe { instance.get_physical_device_memory_properties(physical_device) };

        let queue_families =
            unsafe { instance.get_physical_device_queue_family_properties(physical_device) };
        let compute_queue_family =
            find_compute_queue_family(&queue_families).ok_or(ComputeError::NoComputeQueue)?;

        let (device, compute_queue) =
            Self::create_logical_device(&instance, physical_device, compute_queue_family)?;

        log::info!(
            "Selected GPU: {} ({:?})",
            unsafe { CStr::from_ptr(properties.device_name.as_ptr()) }.to_string_lossy(),
            properties.device_type
        );
        log::info!(
            "API Version: {}.{}.{}, compute queue family {}",
            vk::api_version_major(properties.api_version),
            vk::api_version_minor(properties.api_version),
            vk::api_version_patch(properties.api_version),
            compute_queue_family
        );

        Ok(Self {
            device,
            physical_device,
            instance,
            _entry: entry,
            compute_queue,
            compute_queue_family,
            debug_utils,
            properties,
            memory_properties,
        })
    }

    fn validation_layer_present(entry: &Entry) -> Result<bool> {
        let layers = entry
            .enumerate_instance_layer_properties()
            .vk_check("vkEnumerateInstanceLayerProperties")?;

        let present = layers.iter().any(|layer| {
            let name = unsafe { CStr::from_ptr(layer.layer_name.as_ptr()) };
            name == VALIDATION_LAYER
        });
        if !present {
            log::warn!("Validation requested but VK_LAYER_KHRONOS_validation is not installed");
        }
        Ok(present)
    }

    fn create_instance(
        entry: &Entry,
        app_name: &str,
        enable_validation: bool,
    ) -> Result<ash::Instance> {
        let app_name_cstr = CString::new(app_name)
            .map_err(|e| ComputeError::Loader(format!("invalid application name: {e}")))?;

        let app_info = vk::ApplicationInfo::builder()
            .application_name(&app_name_cstr)
            .application_version(1)
            .engine_name(&app_name_cstr)
            .engine_version(1)
            .api_version(vk::API_VERSION_1_0);

        let (extensions, layer_names) = if enable_validation {
            (
                vec![ash::extensions::ext::DebugUtils::name().as_ptr()],
                vec![VALIDATION_LAYER.as_ptr()],
            )
        } else {
            (vec![], vec![])
        };

        let create_info = vk::InstanceCreateInfo::builder()
            .application_info(&app_info)
            .enabled_extension_names(&extensions)
            .enabled_layer_names(&layer_names);

        unsafe { entry.create_instance(&create_info, None) }.vk_check("vkCreateInstance")
    }

    fn setup_debug_messenger(
        entry: &Entry,
        instance: &ash::Instance,
    ) -> Result<(ash::extensions::ext::DebugUtils, vk::DebugUtilsMessengerEXT)> {
        let debug_utils = ash::extensions::ext::DebugUtils::new(entry, instance);

        let create_info = vk::DebugUtilsMessengerCreateInfoEXT::builder()
            .message_severity(
                vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                    | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
            )
            .message_type(
                vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                    | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                    | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
            )
            .pfn_user_callback(Some(debug_callback));

        let messenger = unsafe { debug_utils.create_debug_utils_messenger(&create_info, None) }
            .vk_check("vkCreateDebugUtilsMessengerEXT")?;

        Ok((debug_utils, messenger))
    }

    fn pick_physical_device(instance: &ash::Instance) -> Result<vk::PhysicalDevice> {
        let devices = unsafe { instance.enumerate_physical_devices() }
            .vk_check("vkEnumeratePhysicalDevices")?;

        let device_types: Vec<vk::PhysicalDeviceType> = devices
            .iter()
            .map(|&device| unsafe { instance.get_physical_device_properties(device) }.device_type)
            .collect();
        log::debug!("Enumerated {} physical device(s): {:?}", devices.len(), device_types);

        select_physical_device(&device_types)
            .map(|index| devices[index])
            .ok_or(ComputeError::NoPhysicalDevice)
    }

    fn create_logical_device(
        instance: &ash::Instance,
        physical_device: vk::PhysicalDevice,
        compute_queue_family: u32,
    ) -> Result<(ash::Device, vk::Queue)> {
        let queue_priorities = [1.0];
        let queue_create_info = vk::DeviceQueueCreateInfo::builder()
            .queue_family_index(compute_queue_family)
            .queue_priorities(&queue_priorities)
            .build();

        let create_info = vk::DeviceCreateInfo::builder()
            .queue_create_infos(std::slice::from_ref(&queue_create_info));

        let device = unsafe { instance.create_device(physical_device, &create_info, None) }
            .vk_check("vkCreateDevice")?;

        let compute_queue = unsafe { device.get_device_queue(compute_queue_family, 0) };

        Ok((device, compute_queue))
    }

    /// Allocate host-visible, host-coherent memory for `buffer` and bind it.
    ///
    /// The caller owns the returned memory and must free it after the buffer
    /// is no longer in use.
    pub fn bind_memory(&self, buffer: vk::Buffer) -> Result<vk::DeviceMemory> {
        let requirements = unsafe { self.device.get_buffer_memory_requirements(buffer) };

        let memory_type_index = find_memory_type(
            &self.memory_properties,
            requirements.memory_type_bits,
            HOST_MEMORY_FLAGS,
        )?;

        let alloc_info = vk::MemoryAllocateInfo::builder()
            .allocation_size(requirements.size)
            .memory_type_index(memory_type_index);

        let memory = unsafe { self.device.allocate_memory(&alloc_info, None) }
            .vk_check("vkAllocateMemory")?;

        if let Err(err) =
            unsafe { self.device.bind_buffer_memory(buffer, memory, 0) }.vk_check("vkBindBufferMemory")
        {
            unsafe { self.device.free_memory(memory, None) };
            return Err(err);
        }

        log::trace!(
            "Bound {} bytes of memory type {} to buffer {:?}",
            requirements.size,
            memory_type_index,
            buffer
        );
        Ok(memory)
    }

    /// Submit a single command buffer to the compute queue, signalling `fence`.
    pub fn submit(&self, command_buffer: vk::CommandBuffer, fence: vk::Fence) -> Result<()> {
        let command_buffers = [command_buffer];
        let submit_info = vk::SubmitInfo::builder()
            .command_buffers(&command_buffers)
            .build();

        unsafe {
            self.device
                .queue_submit(self.compute_queue, &[submit_info], fence)
        }
        .vk_check("vkQueueSubmit")
    }

    /// Largest work-group count a single dispatch may use along X.
    pub fn max_work_group_count_x(&self) -> u32 {
        self.properties.limits.max_compute_work_group_count[0]
    }

    /// Wait for device to be idle (e.g., before cleanup)
    pub fn wait_idle(&self) -> Result<()> {
        unsafe { self.device.device_wait_idle() }.vk_check("vkDeviceWaitIdle")
    }
}

impl Drop for ComputeDevice {
    fn drop(&mut self) {
        log::info!("Destroying Vulkan device...");

        if let Err(err) = self.wait_idle() {
            log::warn!("{}", err);
        }

        // Device before instance
        unsafe {
            if let Some((debug_utils, messenger)) = self.debug_utils.take() {
                debug_utils.destroy_debug_utils_messenger(messenger, None);
            }

            self.device.destroy_device(None);
            self.instance.destroy_instance(None);
        }
    }
}

/// Index of the device to use: the first discrete GPU, otherwise the first
/// enumerated device. With several discrete GPUs the earliest one in
/// enumeration order wins, so the choice is stable across runs.
pub fn select_physical_device(device_types: &[vk::PhysicalDeviceType]) -> Option<usize> {
    device_types
        .iter()
        .position(|&ty| ty == vk::PhysicalDeviceType::DISCRETE_GPU)
        .or_else(|| (!device_types.is_empty()).then_some(0))
}

/// First queue family advertising compute support.
pub fn find_compute_queue_family(families: &[vk::QueueFamilyProperties]) -> Option<u32> {
    families
        .iter()
        .position(|family| family.queue_flags.contains(vk::QueueFlags::COMPUTE))
        .map(|index| index as u32)
}

/// First memory type allowed by `type_bits` whose flags contain all of `required`.
pub fn find_memory_type(
    memory_properties: &vk::PhysicalDeviceMemoryProperties,
    type_bits: u32,
    required: vk::MemoryPropertyFlags,
) -> Result<u32> {
    let count = memory_properties.memory_type_count.min(vk::MAX_MEMORY_TYPES as u32);

    (0..count)
        .find(|&i| {
            let allowed = type_bits & (1 << i) != 0;
            allowed
                && memory_properties.memory_types[i as usize]
                    .property_flags
                    .contains(required)
        })
        .ok_or(ComputeError::NoCompatibleMemoryType {
            type_bits,
            required,
        })
}

/// Convert an optional wait bound into the nanosecond timeout Vulkan expects.
/// `None` waits forever.
pub fn fence_timeout_ns(timeout: Option<Duration>) -> u64 {
    timeout
        .map(|t| u64::try_from(t.as_nanos()).unwrap_or(u64::MAX))
        .unwrap_or(u64::MAX)
}

// Debug callback for validation layers
unsafe extern "system" fn debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    _message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _p_user_data: *mut std::ffi::c_void,
) -> vk::Bool32 {
    let message = CStr::from_ptr((*p_callback_data).p_message);

    match message_severity {
        vk::DebugUtilsMessageSeverityFlagsEXT::ERROR => {
            log::error!("[Vulkan] {}", message.to_string_lossy());
        }
        vk::DebugUtilsMessageSeverityFlagsEXT::WARNING => {
            log::warn!("[Vulkan] {}", message.to_string_lossy());
        }
        _ => {
            log::debug!("[Vulkan] {}", message.to_string_lossy());
        }
    }

    vk::FALSE
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_table(flags: &[vk::MemoryPropertyFlags]) -> vk::PhysicalDeviceMemoryProperties {
        let mut props = vk::PhysicalDeviceMemoryProperties::default();
        props.memory_type_count = flags.len() as u32;
        for (slot, &property_flags) in props.memory_types.iter_mut().zip(flags) {
            slot.property_flags = property_flags;
        }
        props
    }

    #[test]
    fn prefers_discrete_gpu() {
        let types = [
            vk::PhysicalDeviceType::INTEGRATED_GPU,
            vk::PhysicalDeviceType::CPU,
            vk::PhysicalDeviceType::DISCRETE_GPU,
        ];
        assert_eq!(select_physical_device(&types), Some(2));
    }

    #[test]
    fn falls_back_to_first_device() {
        let types = [vk::PhysicalDeviceType::CPU, vk::PhysicalDeviceType::INTEGRATED_GPU];
        assert_eq!(select_physical_device(&types), Some(0));
        assert_eq!(select_physical_device(&[]), None);
    }

    #[test]
    fn first_discrete_gpu_wins() {
        let types = [
            vk::PhysicalDeviceType::DISCRETE_GPU,
            vk::PhysicalDeviceType::DISCRETE_GPU,
        ];
        assert_eq!(select_physical_device(&types), Some(0));
    }

    #[test]
    fn finds_first_compute_queue_family() {
        let families = [
            vk::QueueFamilyProperties {
                queue_flags: vk::QueueFlags::TRANSFER,
                queue_count: 1,
                ..Default::default()
            },
            vk::QueueFamilyProperties {
                queue_flags: vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE,
                queue_count: 16,
                ..Default::default()
            },
            vk::QueueFamilyProperties {
                queue_flags: vk::QueueFlags::COMPUTE,
                queue_count: 2,
                ..Default::default()
            },
        ];
        assert_eq!(find_compute_queue_family(&families), Some(1));
    }

    #[test]
    fn no_compute_queue_family() {
        let families = [vk::QueueFamilyProperties {
            queue_flags: vk::QueueFlags::GRAPHICS | vk::QueueFlags::TRANSFER,
            queue_count: 1,
            ..Default::default()
        }];
        assert_eq!(find_compute_queue_family(&families), None);
    }

    #[test]
    fn memory_type_must_have_every_requested_flag() {
        let props = memory_table(&[
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
            vk::MemoryPropertyFlags::HOST_VISIBLE,
            vk::MemoryPropertyFlags::HOST_VISIBLE
                | vk::MemoryPropertyFlags::HOST_COHERENT
                | vk::MemoryPropertyFlags::HOST_CACHED,
        ]);

        let index = find_memory_type(&props, 0b111, HOST_MEMORY_FLAGS).unwrap();
        assert_eq!(index, 2);
        assert!(props.memory_types[index as usize]
            .property_flags
            .contains(HOST_MEMORY_FLAGS));
    }

    #[test]
    fn memory_type_respects_type_bits() {
        let props = memory_table(&[HOST_MEMORY_FLAGS, HOST_MEMORY_FLAGS]);

        assert_eq!(find_memory_type(&props, 0b10, HOST_MEMORY_FLAGS).unwrap(), 1);
    }

    #[test]
    fn memory_type_never_settles_for_weaker_flags() {
        let props = memory_table(&[
            vk::MemoryPropertyFlags::HOST_VISIBLE,
            vk::MemoryPropertyFlags::DEVICE_LOCAL | vk::MemoryPropertyFlags::HOST_COHERENT,
        ]);

        let err = find_memory_type(&props, u32::MAX, HOST_MEMORY_FLAGS).unwrap_err();
        assert!(matches!(
            err,
            ComputeError::NoCompatibleMemoryType { type_bits: u32::MAX, .. }
        ));
    }

    #[test]
    fn host_memory_flags_are_visible_and_coherent() {
        assert_eq!(
            HOST_MEMORY_FLAGS,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT
        );
    }

    #[test]
    fn fence_timeout_defaults_to_forever() {
        assert_eq!(fence_timeout_ns(None), u64::MAX);
        assert_eq!(fence_timeout_ns(Some(Duration::from_millis(5))), 5_000_000);
    }
}
