// Storage buffers backed by host-visible memory
//
// Each buffer owns exactly one memory allocation. Host access goes through a
// `HostMapping` guard that borrows the buffer and unmaps on drop.

use ash::vk;
use std::ffi::c_void;
use std::mem::size_of;

use super::error::{ComputeError, Result, VkResultExt};
use super::ComputeDevice;

/// A storage buffer and the memory bound to it.
pub struct StorageBuffer<'a> {
    device: &'a ComputeDevice,
    pub buffer: vk::Buffer,
    pub memory: vk::DeviceMemory,
    pub size: vk::DeviceSize,
}

impl<'a> StorageBuffer<'a> {
    /// Create a buffer of `size` bytes with host-visible, host-coherent memory bound.
    pub fn new(device: &'a ComputeDevice, size: vk::DeviceSize) -> Result<Self> {
        check_size(size)?;

        let buffer_info = vk::BufferCreateInfo::builder()
            .size(size)
            .usage(vk::BufferUsageFlags::STORAGE_BUFFER)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let buffer = unsafe { device.device.create_buffer(&buffer_info, None) }
            .vk_check("vkCreateBuffer")?;

        let memory = match device.bind_memory(buffer) {
            Ok(memory) => memory,
            Err(err) => {
                unsafe { device.device.destroy_buffer(buffer, None) };
                return Err(err);
            }
        };

        log::debug!("Created storage buffer {:?} ({} bytes)", buffer, size);
        Ok(Self {
            device,
            buffer,
            memory,
            size,
        })
    }

    /// Create a buffer sized for `count` elements of `T`.
    pub fn with_elements<T: Copy>(device: &'a ComputeDevice, count: usize) -> Result<Self> {
        Self::new(device, byte_len::<T>(count))
    }

    /// Map the whole buffer into host memory for the lifetime of the guard.
    pub fn map(&self) -> Result<HostMapping<'_>> {
        let ptr = unsafe {
            self.device
                .device
                .map_memory(self.memory, 0, self.size, vk::MemoryMapFlags::empty())
        }
        .vk_check("vkMapMemory")?;

        log::trace!("Mapped buffer {:?}", self.buffer);
        Ok(HostMapping {
            device: &self.device.device,
            buffer: self.buffer,
            memory: self.memory,
            ptr,
            len: self.size,
        })
    }

    /// Copy `data` to the start of the buffer through a scoped mapping.
    pub fn write<T: Copy>(&self, data: &[T]) -> Result<()> {
        let mapping = self.map()?;
        mapping.write(data)
    }

    /// Copy the first `count` elements out of the buffer through a scoped mapping.
    pub fn read<T: Copy>(&self, count: usize) -> Result<Vec<T>> {
        let mapping = self.map()?;
        mapping.read(count)
    }

    /// Descriptor info covering the whole buffer.
    pub fn descriptor_info(&self) -> vk::DescriptorBufferInfo {
        vk::DescriptorBufferInfo {
            buffer: self.buffer,
            offset: 0,
            range: vk::WHOLE_SIZE,
        }
    }
}

impl Drop for StorageBuffer<'_> {
    fn drop(&mut self) {
        // Memory before buffer
        log::debug!("Freeing memory {:?}", self.memory);
        unsafe { self.device.device.free_memory(self.memory, None) };
        log::debug!("Destroying buffer {:?}", self.buffer);
        unsafe { self.device.device.destroy_buffer(self.buffer, None) };
    }
}

/// Host view of a mapped buffer. Unmapped when dropped.
pub struct HostMapping<'b> {
    device: &'b ash::Device,
    buffer: vk::Buffer,
    memory: vk::DeviceMemory,
    ptr: *mut c_void,
    len: vk::DeviceSize,
}

impl HostMapping<'_> {
    pub fn write<T: Copy>(&self, data: &[T]) -> Result<()> {
        check_fits::<T>(data.len(), self.len)?;
        unsafe {
            (self.ptr as *mut T).copy_from_nonoverlapping(data.as_ptr(), data.len());
        }
        Ok(())
    }

    pub fn read<T: Copy>(&self, count: usize) -> Result<Vec<T>> {
        check_fits::<T>(count, self.len)?;
        let values = unsafe { std::slice::from_raw_parts(self.ptr as *const T, count) };
        Ok(values.to_vec())
    }
}

impl Drop for HostMapping<'_> {
    fn drop(&mut self) {
        unsafe { self.device.unmap_memory(self.memory) };
        log::trace!("Unmapped buffer {:?}", self.buffer);
    }
}

/// Size in bytes of `count` elements of `T`.
pub fn byte_len<T>(count: usize) -> vk::DeviceSize {
    (size_of::<T>() * count) as vk::DeviceSize
}

fn check_size(size: vk::DeviceSize) -> Result<()> {
    if size == 0 {
        return Err(ComputeError::EmptyBuffer);
    }
    Ok(())
}

fn check_fits<T>(count: usize, capacity: vk::DeviceSize) -> Result<()> {
    let requested = byte_len::<T>(count);
    if requested > capacity {
        return Err(ComputeError::BufferOverflow {
            requested,
            capacity,
        });
    }
    Ok(())
}
