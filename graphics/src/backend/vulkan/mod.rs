//! Native Vulkan backend implementation using ash.
//!
//! The backend does not create the instance or device. The application owns
//! them (together with the swapchain and the pipelines) and hands a
//! [`VulkanDevice`] to [`VulkanBackend::new`]. The backend adds:
//! - gpu-allocator for buffer and image memory
//! - a fixed-capacity descriptor pool
//! - one in-flight fence per frame slot
//! - dynamic rendering (VK_KHR_dynamic_rendering) for render passes
//!
//! The device must have Vulkan 1.2 `drawIndirectCount` and the dynamic
//! rendering extension enabled.

mod allocator;
mod command;
pub(crate) mod conversion;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use ash::vk;
use gpu_allocator::MemoryLocation;
use gpu_allocator::vulkan::{Allocation, Allocator};
use parking_lot::Mutex;

use crate::descriptors::ResourceLayout;
use crate::error::GraphicsError;
use crate::types::{
    BarrierTarget, BufferDescriptor, CommandBufferHandle, DescriptorSetHandle, GpuBufferHandle,
    GpuObject, GpuTextureHandle, LayoutHandle, PipelineBarrier, PipelineHandle, TextureDescriptor,
};

use super::{BoundResource, DescriptorWrite, GpuBackend, PipelineBindPoint, RenderPassInfo};

use self::conversion::{
    aspect_mask, buffer_memory_location, convert_access_flags, convert_bind_point,
    convert_buffer_usage, convert_image_layout, convert_pipeline_stage, convert_result,
    convert_texture_format, convert_texture_usage,
};

/// An externally created Vulkan device.
#[derive(Clone)]
pub struct VulkanDevice {
    /// Vulkan instance.
    pub instance: ash::Instance,
    /// Physical device the logical device was created on.
    pub physical_device: vk::PhysicalDevice,
    /// Logical device.
    pub device: ash::Device,
    /// Graphics and compute queue used for all submissions.
    pub queue: vk::Queue,
    /// Family of `queue`.
    pub queue_family_index: u32,
}

struct VulkanBuffer {
    buffer: vk::Buffer,
    allocation: Option<Allocation>,
    size: u64,
}

struct VulkanTexture {
    image: vk::Image,
    view: vk::ImageView,
    allocation: Option<Allocation>,
    aspect: vk::ImageAspectFlags,
}

struct VulkanPipeline {
    pipeline: vk::Pipeline,
    layout: vk::PipelineLayout,
    bind_point: vk::PipelineBindPoint,
    push_constant_stages: vk::ShaderStageFlags,
}

/// Backend objects by raw handle.
///
/// The command pool and descriptor pool are only used while this table is
/// locked, which provides their external synchronization.
#[derive(Default)]
struct VulkanObjects {
    next_handle: u64,
    buffers: HashMap<u64, VulkanBuffer>,
    textures: HashMap<u64, VulkanTexture>,
    layouts: HashMap<u64, vk::DescriptorSetLayout>,
    sets: HashMap<u64, vk::DescriptorSet>,
    pipelines: HashMap<u64, VulkanPipeline>,
    command_buffers: HashMap<u64, vk::CommandBuffer>,
}

impl VulkanObjects {
    fn next_handle(&mut self) -> u64 {
        self.next_handle += 1;
        self.next_handle
    }

    fn command_buffer(&self, cmd: CommandBufferHandle) -> Option<vk::CommandBuffer> {
        let found = self.command_buffers.get(&cmd.raw()).copied();
        if found.is_none() {
            log::warn!("Vulkan: unknown command buffer {:?}", cmd);
        }
        found
    }
}

/// Vulkan-based GPU backend using ash.
pub struct VulkanBackend {
    device: ash::Device,
    queue: Mutex<vk::Queue>,
    allocator: Mutex<Allocator>,
    dynamic_rendering: ash::khr::dynamic_rendering::Device,
    command_pool: vk::CommandPool,
    descriptor_pool: vk::DescriptorPool,
    descriptor_set_capacity: u32,
    default_sampler: vk::Sampler,
    frame_fences: Vec<vk::Fence>,
    frames_submitted: AtomicU64,
    objects: Mutex<VulkanObjects>,
}

impl std::fmt::Debug for VulkanBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VulkanBackend")
            .field("frame_count", &self.frame_fences.len())
            .field("descriptor_set_capacity", &self.descriptor_set_capacity)
            .finish_non_exhaustive()
    }
}

impl VulkanBackend {
    /// Create a backend over an existing device.
    ///
    /// `frame_count` is the swapchain image count; `descriptor_set_capacity`
    /// sizes the descriptor pool and must match the resource handler's.
    pub fn new(
        device: VulkanDevice,
        frame_count: u32,
        descriptor_set_capacity: u32,
    ) -> Result<Self, GraphicsError> {
        if frame_count == 0 {
            return Err(GraphicsError::InitializationFailed(
                "frame count must be at least 1".into(),
            ));
        }

        let allocator = allocator::create_allocator(&device)?;
        let dynamic_rendering =
            ash::khr::dynamic_rendering::Device::new(&device.instance, &device.device);
        let raw = &device.device;

        let command_pool = command::create_command_pool(raw, device.queue_family_index)?;
        let descriptor_pool = match command::create_descriptor_pool(raw, descriptor_set_capacity) {
            Ok(pool) => pool,
            Err(e) => {
                unsafe { raw.destroy_command_pool(command_pool, None) };
                return Err(e);
            }
        };
        let cleanup_pools = || unsafe {
            raw.destroy_descriptor_pool(descriptor_pool, None);
            raw.destroy_command_pool(command_pool, None);
        };
        let default_sampler = match command::create_default_sampler(raw) {
            Ok(sampler) => sampler,
            Err(e) => {
                cleanup_pools();
                return Err(e);
            }
        };
        let frame_fences = match command::create_frame_fences(raw, frame_count) {
            Ok(fences) => fences,
            Err(e) => {
                unsafe { raw.destroy_sampler(default_sampler, None) };
                cleanup_pools();
                return Err(e);
            }
        };

        log::info!(
            "Vulkan backend created: {} frames in flight, {} descriptor sets",
            frame_count,
            descriptor_set_capacity
        );

        Ok(Self {
            device: device.device,
            queue: Mutex::new(device.queue),
            allocator: Mutex::new(allocator),
            dynamic_rendering,
            command_pool,
            descriptor_pool,
            descriptor_set_capacity,
            default_sampler,
            frame_fences,
            frames_submitted: AtomicU64::new(0),
            objects: Mutex::new(VulkanObjects::default()),
        })
    }

    /// Get the logical device.
    pub fn device(&self) -> &ash::Device {
        &self.device
    }

    /// Register an externally created pipeline.
    ///
    /// The backend takes ownership of the pipeline and its layout; both are
    /// destroyed when the returned handle is destroyed.
    pub fn register_pipeline(
        &self,
        pipeline: vk::Pipeline,
        layout: vk::PipelineLayout,
        bind_point: PipelineBindPoint,
    ) -> PipelineHandle {
        let (bind_point, push_constant_stages) = convert_bind_point(bind_point);
        let mut objects = self.objects.lock();
        let handle = objects.next_handle();
        objects.pipelines.insert(
            handle,
            VulkanPipeline {
                pipeline,
                layout,
                bind_point,
                push_constant_stages,
            },
        );
        PipelineHandle::from_raw(handle)
    }

    fn free_allocation(&self, allocation: Option<Allocation>) {
        if let Some(allocation) = allocation
            && let Err(e) = self.allocator.lock().free(allocation)
        {
            log::error!("Failed to free GPU memory: {}", e);
        }
    }

    fn destroy_buffer_object(&self, buffer: VulkanBuffer) {
        unsafe { self.device.destroy_buffer(buffer.buffer, None) };
        self.free_allocation(buffer.allocation);
    }

    fn destroy_texture_object(&self, texture: VulkanTexture) {
        unsafe {
            self.device.destroy_image_view(texture.view, None);
            self.device.destroy_image(texture.image, None);
        }
        self.free_allocation(texture.allocation);
    }

    fn destroy_pipeline_object(&self, pipeline: VulkanPipeline) {
        unsafe {
            self.device.destroy_pipeline(pipeline.pipeline, None);
            self.device.destroy_pipeline_layout(pipeline.layout, None);
        }
    }

    fn end_and_submit(
        &self,
        cmd: CommandBufferHandle,
        fence: vk::Fence,
    ) -> Result<(), GraphicsError> {
        let cb = self.objects.lock().command_buffer(cmd).ok_or_else(|| {
            GraphicsError::InvalidParameter(format!("command buffer {cmd:?} is not recording"))
        })?;

        unsafe { self.device.end_command_buffer(cb) }
            .map_err(|e| convert_result("Failed to end command buffer", e))?;

        let command_buffers = [cb];
        let submit_info = vk::SubmitInfo::default().command_buffers(&command_buffers);
        let queue = self.queue.lock();
        unsafe { self.device.queue_submit(*queue, &[submit_info], fence) }
            .map_err(|e| convert_result("Failed to submit command buffer", e))
    }

    /// Allocate and bind memory for a new buffer.
    fn create_buffer_object(
        &self,
        descriptor: &BufferDescriptor,
    ) -> Result<VulkanBuffer, GraphicsError> {
        let buffer_info = vk::BufferCreateInfo::default()
            .size(descriptor.size)
            .usage(convert_buffer_usage(descriptor.usage))
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let buffer = unsafe { self.device.create_buffer(&buffer_info, None) }
            .map_err(|e| convert_result("Failed to create buffer", e))?;

        let requirements = unsafe { self.device.get_buffer_memory_requirements(buffer) };
        let allocation = match allocator::allocate(
            &mut self.allocator.lock(),
            descriptor.label.as_deref().unwrap_or("buffer"),
            requirements,
            buffer_memory_location(descriptor.usage),
            true,
        ) {
            Ok(allocation) => allocation,
            Err(e) => {
                unsafe { self.device.destroy_buffer(buffer, None) };
                return Err(e);
            }
        };

        let object = VulkanBuffer {
            buffer,
            size: descriptor.size,
            allocation: None,
        };
        if let Err(e) = unsafe {
            self.device
                .bind_buffer_memory(buffer, allocation.memory(), allocation.offset())
        } {
            self.destroy_buffer_object(VulkanBuffer {
                allocation: Some(allocation),
                ..object
            });
            return Err(convert_result("Failed to bind buffer memory", e));
        }

        Ok(VulkanBuffer {
            allocation: Some(allocation),
            ..object
        })
    }

    fn create_texture_object(
        &self,
        descriptor: &TextureDescriptor,
    ) -> Result<VulkanTexture, GraphicsError> {
        let format = convert_texture_format(descriptor.format);
        let aspect = aspect_mask(descriptor.format);

        let image_info = vk::ImageCreateInfo::default()
            .image_type(vk::ImageType::TYPE_2D)
            .format(format)
            .extent(vk::Extent3D {
                width: descriptor.size.width,
                height: descriptor.size.height,
                depth: 1,
            })
            .mip_levels(descriptor.mip_level_count.max(1))
            .array_layers(1)
            .samples(vk::SampleCountFlags::TYPE_1)
            .tiling(vk::ImageTiling::OPTIMAL)
            .usage(convert_texture_usage(descriptor.usage, descriptor.format))
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(vk::ImageLayout::UNDEFINED);

        let image = unsafe { self.device.create_image(&image_info, None) }
            .map_err(|e| convert_result("Failed to create image", e))?;

        let requirements = unsafe { self.device.get_image_memory_requirements(image) };
        let allocation = match allocator::allocate(
            &mut self.allocator.lock(),
            descriptor.label.as_deref().unwrap_or("texture"),
            requirements,
            MemoryLocation::GpuOnly,
            false,
        ) {
            Ok(allocation) => allocation,
            Err(e) => {
                unsafe { self.device.destroy_image(image, None) };
                return Err(e);
            }
        };

        let release = |allocation: Allocation| {
            unsafe { self.device.destroy_image(image, None) };
            self.free_allocation(Some(allocation));
        };

        if let Err(e) = unsafe {
            self.device
                .bind_image_memory(image, allocation.memory(), allocation.offset())
        } {
            release(allocation);
            return Err(convert_result("Failed to bind image memory", e));
        }

        let view_info = vk::ImageViewCreateInfo::default()
            .image(image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(format)
            .components(vk::ComponentMapping::default())
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: aspect,
                base_mip_level: 0,
                level_count: vk::REMAINING_MIP_LEVELS,
                base_array_layer: 0,
                layer_count: 1,
            });

        let view = match unsafe { self.device.create_image_view(&view_info, None) } {
            Ok(view) => view,
            Err(e) => {
                release(allocation);
                return Err(convert_result("Failed to create image view", e));
            }
        };

        Ok(VulkanTexture {
            image,
            view,
            allocation: Some(allocation),
            aspect,
        })
    }
}

impl Drop for VulkanBackend {
    fn drop(&mut self) {
        unsafe {
            let _ = self.device.device_wait_idle();
        }

        let objects = std::mem::take(&mut *self.objects.lock());
        if !objects.buffers.is_empty() || !objects.textures.is_empty() {
            log::warn!(
                "Vulkan backend dropped with {} buffers and {} textures alive",
                objects.buffers.len(),
                objects.textures.len()
            );
        }
        for (_, buffer) in objects.buffers {
            self.destroy_buffer_object(buffer);
        }
        for (_, texture) in objects.textures {
            self.destroy_texture_object(texture);
        }
        for (_, pipeline) in objects.pipelines {
            self.destroy_pipeline_object(pipeline);
        }

        unsafe {
            for (_, layout) in objects.layouts {
                self.device.destroy_descriptor_set_layout(layout, None);
            }
            for fence in &self.frame_fences {
                self.device.destroy_fence(*fence, None);
            }
            self.device.destroy_sampler(self.default_sampler, None);
            // Frees every set allocated from it.
            self.device
                .destroy_descriptor_pool(self.descriptor_pool, None);
            // Frees every command buffer allocated from it.
            self.device.destroy_command_pool(self.command_pool, None);
        }
        // The allocator drops after this, while the device is still alive.
    }
}

impl GpuBackend for VulkanBackend {
    fn name(&self) -> &'static str {
        "Vulkan Backend (ash)"
    }

    fn frame_count(&self) -> u32 {
        self.frame_fences.len() as u32
    }

    fn frame_index(&self) -> u32 {
        (self.frames_submitted.load(Ordering::Acquire) % self.frame_fences.len() as u64) as u32
    }

    fn wait_for_frame(&self, slot: u32) -> Result<(), GraphicsError> {
        let fence = self.frame_fences.get(slot as usize).ok_or_else(|| {
            GraphicsError::InvalidParameter(format!("frame slot {slot} out of range"))
        })?;
        unsafe { self.device.wait_for_fences(&[*fence], true, u64::MAX) }
            .map_err(|e| convert_result("Failed to wait for frame fence", e))
    }

    fn create_buffer(
        &self,
        descriptor: &BufferDescriptor,
    ) -> Result<GpuBufferHandle, GraphicsError> {
        log::trace!(
            "Vulkan: creating buffer {:?} (size: {})",
            descriptor.label,
            descriptor.size
        );
        let buffer = self.create_buffer_object(descriptor)?;
        let mut objects = self.objects.lock();
        let handle = objects.next_handle();
        objects.buffers.insert(handle, buffer);
        Ok(GpuBufferHandle::from_raw(handle))
    }

    fn write_buffer(
        &self,
        buffer: GpuBufferHandle,
        offset: u64,
        data: &[u8],
    ) -> Result<(), GraphicsError> {
        let objects = self.objects.lock();
        let target = objects.buffers.get(&buffer.raw()).ok_or_else(|| {
            GraphicsError::InvalidParameter(format!("unknown buffer {buffer:?}"))
        })?;
        if offset + data.len() as u64 > target.size {
            return Err(GraphicsError::InvalidParameter(format!(
                "write of {} bytes at offset {} overflows buffer {:?}",
                data.len(),
                offset,
                buffer
            )));
        }
        let Some(mapped_ptr) = target.allocation.as_ref().and_then(|a| a.mapped_ptr()) else {
            return Err(GraphicsError::InvalidParameter(format!(
                "buffer {buffer:?} is not mapped for CPU access"
            )));
        };

        unsafe {
            let dst = (mapped_ptr.as_ptr() as *mut u8).add(offset as usize);
            std::ptr::copy_nonoverlapping(data.as_ptr(), dst, data.len());
        }
        Ok(())
    }

    fn read_buffer(
        &self,
        buffer: GpuBufferHandle,
        offset: u64,
        size: u64,
    ) -> Result<Vec<u8>, GraphicsError> {
        let objects = self.objects.lock();
        let source = objects.buffers.get(&buffer.raw()).ok_or_else(|| {
            GraphicsError::InvalidParameter(format!("unknown buffer {buffer:?}"))
        })?;
        if offset + size > source.size {
            return Err(GraphicsError::InvalidParameter(format!(
                "read of {size} bytes at offset {offset} overflows buffer {buffer:?}"
            )));
        }
        let Some(mapped_ptr) = source.allocation.as_ref().and_then(|a| a.mapped_ptr()) else {
            return Err(GraphicsError::InvalidParameter(format!(
                "buffer {buffer:?} is not mapped for CPU access"
            )));
        };

        let mut result = vec![0u8; size as usize];
        unsafe {
            let src = (mapped_ptr.as_ptr() as *const u8).add(offset as usize);
            std::ptr::copy_nonoverlapping(src, result.as_mut_ptr(), size as usize);
        }
        Ok(result)
    }

    fn create_texture(
        &self,
        descriptor: &TextureDescriptor,
    ) -> Result<GpuTextureHandle, GraphicsError> {
        log::trace!(
            "Vulkan: creating texture {:?} ({}x{} {:?})",
            descriptor.label,
            descriptor.size.width,
            descriptor.size.height,
            descriptor.format
        );
        let texture = self.create_texture_object(descriptor)?;
        let mut objects = self.objects.lock();
        let handle = objects.next_handle();
        objects.textures.insert(handle, texture);
        Ok(GpuTextureHandle::from_raw(handle))
    }

    fn create_descriptor_layout(
        &self,
        layout: &ResourceLayout,
    ) -> Result<LayoutHandle, GraphicsError> {
        let set_layout = command::create_set_layout(&self.device, layout)?;
        let mut objects = self.objects.lock();
        let handle = objects.next_handle();
        objects.layouts.insert(handle, set_layout);
        Ok(LayoutHandle::from_raw(handle))
    }

    fn allocate_descriptor_set(
        &self,
        layout: LayoutHandle,
    ) -> Result<DescriptorSetHandle, GraphicsError> {
        let mut objects = self.objects.lock();
        let set_layout = *objects
            .layouts
            .get(&layout.raw())
            .ok_or(GraphicsError::UnknownLayout(layout.raw() as u32))?;

        let set_layouts = [set_layout];
        let alloc_info = vk::DescriptorSetAllocateInfo::default()
            .descriptor_pool(self.descriptor_pool)
            .set_layouts(&set_layouts);

        let set = match unsafe { self.device.allocate_descriptor_sets(&alloc_info) } {
            Ok(sets) => sets
                .into_iter()
                .next()
                .ok_or_else(|| GraphicsError::Internal("no descriptor set allocated".into()))?,
            Err(vk::Result::ERROR_OUT_OF_POOL_MEMORY | vk::Result::ERROR_FRAGMENTED_POOL) => {
                return Err(GraphicsError::DescriptorPoolExhausted {
                    capacity: self.descriptor_set_capacity,
                });
            }
            Err(e) => return Err(convert_result("Failed to allocate descriptor set", e)),
        };

        let handle = objects.next_handle();
        objects.sets.insert(handle, set);
        Ok(DescriptorSetHandle::from_raw(handle))
    }

    fn write_descriptor(
        &self,
        set: DescriptorSetHandle,
        write: &DescriptorWrite,
    ) -> Result<(), GraphicsError> {
        let objects = self.objects.lock();
        let dst_set = *objects
            .sets
            .get(&set.raw())
            .ok_or_else(|| GraphicsError::InvalidParameter(format!("unknown set {set:?}")))?;

        let unknown_buffer =
            |buffer: GpuBufferHandle| GraphicsError::InvalidParameter(format!("unknown buffer {buffer:?}"));

        match write.resource {
            BoundResource::UniformBuffer {
                buffer,
                offset,
                size,
            }
            | BoundResource::StorageBuffer {
                buffer,
                offset,
                size,
            } => {
                let raw = objects
                    .buffers
                    .get(&buffer.raw())
                    .ok_or_else(|| unknown_buffer(buffer))?
                    .buffer;
                let descriptor_type = match write.resource {
                    BoundResource::UniformBuffer { .. } => vk::DescriptorType::UNIFORM_BUFFER,
                    _ => vk::DescriptorType::STORAGE_BUFFER,
                };
                let infos = [vk::DescriptorBufferInfo {
                    buffer: raw,
                    offset,
                    range: size,
                }];
                let vk_write = vk::WriteDescriptorSet::default()
                    .dst_set(dst_set)
                    .dst_binding(write.binding)
                    .descriptor_type(descriptor_type)
                    .buffer_info(&infos);
                unsafe { self.device.update_descriptor_sets(&[vk_write], &[]) };
            }
            BoundResource::Texture { texture, combined } => {
                let view = objects
                    .textures
                    .get(&texture.raw())
                    .ok_or_else(|| {
                        GraphicsError::InvalidParameter(format!("unknown texture {texture:?}"))
                    })?
                    .view;
                let (descriptor_type, sampler) = if combined {
                    (
                        vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
                        self.default_sampler,
                    )
                } else {
                    (vk::DescriptorType::SAMPLED_IMAGE, vk::Sampler::null())
                };
                let infos = [vk::DescriptorImageInfo {
                    sampler,
                    image_view: view,
                    image_layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
                }];
                let vk_write = vk::WriteDescriptorSet::default()
                    .dst_set(dst_set)
                    .dst_binding(write.binding)
                    .descriptor_type(descriptor_type)
                    .image_info(&infos);
                unsafe { self.device.update_descriptor_sets(&[vk_write], &[]) };
            }
        }
        Ok(())
    }

    fn destroy(&self, object: GpuObject) {
        log::trace!("Vulkan: destroying {:?}", object);
        let mut objects = self.objects.lock();
        match object {
            GpuObject::Buffer(handle) => {
                if let Some(buffer) = objects.buffers.remove(&handle.raw()) {
                    drop(objects);
                    self.destroy_buffer_object(buffer);
                }
            }
            GpuObject::Texture(handle) | GpuObject::RenderTarget(handle) => {
                if let Some(texture) = objects.textures.remove(&handle.raw()) {
                    drop(objects);
                    self.destroy_texture_object(texture);
                }
            }
            GpuObject::CommandBuffer(handle) => {
                if let Some(cb) = objects.command_buffers.remove(&handle.raw()) {
                    unsafe { self.device.free_command_buffers(self.command_pool, &[cb]) };
                }
            }
            GpuObject::Pipeline(handle) => {
                if let Some(pipeline) = objects.pipelines.remove(&handle.raw()) {
                    self.destroy_pipeline_object(pipeline);
                }
            }
            GpuObject::DescriptorLayout(handle) => {
                if let Some(layout) = objects.layouts.remove(&handle.raw()) {
                    unsafe { self.device.destroy_descriptor_set_layout(layout, None) };
                }
            }
        }
    }

    fn begin_command_buffer(&self) -> Result<CommandBufferHandle, GraphicsError> {
        let mut objects = self.objects.lock();
        let cb = command::begin_command_buffer(&self.device, self.command_pool)?;
        let handle = objects.next_handle();
        objects.command_buffers.insert(handle, cb);
        Ok(CommandBufferHandle::from_raw(handle))
    }

    fn submit_frame(&self, cmd: CommandBufferHandle, slot: u32) -> Result<(), GraphicsError> {
        let fence = *self.frame_fences.get(slot as usize).ok_or_else(|| {
            GraphicsError::InvalidParameter(format!("frame slot {slot} out of range"))
        })?;
        unsafe { self.device.reset_fences(&[fence]) }
            .map_err(|e| convert_result("Failed to reset frame fence", e))?;
        self.end_and_submit(cmd, fence)?;
        self.frames_submitted.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    fn submit_and_wait(&self, cmd: CommandBufferHandle) -> Result<(), GraphicsError> {
        let fence = unsafe {
            self.device
                .create_fence(&vk::FenceCreateInfo::default(), None)
        }
        .map_err(|e| convert_result("Failed to create fence", e))?;

        let result = self.end_and_submit(cmd, fence).and_then(|()| {
            unsafe { self.device.wait_for_fences(&[fence], true, u64::MAX) }
                .map_err(|e| convert_result("Failed to wait for fence", e))
        });
        unsafe { self.device.destroy_fence(fence, None) };
        result
    }

    fn wait_idle(&self) -> Result<(), GraphicsError> {
        unsafe { self.device.device_wait_idle() }
            .map_err(|e| convert_result("Failed to wait for device idle", e))
    }

    fn cmd_fill_buffer(
        &self,
        cmd: CommandBufferHandle,
        buffer: GpuBufferHandle,
        offset: u64,
        size: u64,
        value: u32,
    ) {
        let objects = self.objects.lock();
        if let Some(cb) = objects.command_buffer(cmd)
            && let Some(target) = objects.buffers.get(&buffer.raw())
        {
            unsafe {
                self.device
                    .cmd_fill_buffer(cb, target.buffer, offset, size, value)
            };
        }
    }

    fn cmd_bind_pipeline(&self, cmd: CommandBufferHandle, pipeline: PipelineHandle) {
        let objects = self.objects.lock();
        if let Some(cb) = objects.command_buffer(cmd)
            && let Some(pipeline) = objects.pipelines.get(&pipeline.raw())
        {
            unsafe {
                self.device
                    .cmd_bind_pipeline(cb, pipeline.bind_point, pipeline.pipeline)
            };
        }
    }

    fn cmd_bind_descriptor_set(
        &self,
        cmd: CommandBufferHandle,
        pipeline: PipelineHandle,
        set_slot: u32,
        set: DescriptorSetHandle,
    ) {
        let objects = self.objects.lock();
        if let Some(cb) = objects.command_buffer(cmd)
            && let Some(pipeline) = objects.pipelines.get(&pipeline.raw())
            && let Some(set) = objects.sets.get(&set.raw())
        {
            unsafe {
                self.device.cmd_bind_descriptor_sets(
                    cb,
                    pipeline.bind_point,
                    pipeline.layout,
                    set_slot,
                    &[*set],
                    &[],
                )
            };
        }
    }

    fn cmd_push_constants(
        &self,
        cmd: CommandBufferHandle,
        pipeline: PipelineHandle,
        offset: u32,
        data: &[u8],
    ) {
        let objects = self.objects.lock();
        if let Some(cb) = objects.command_buffer(cmd)
            && let Some(pipeline) = objects.pipelines.get(&pipeline.raw())
        {
            unsafe {
                self.device.cmd_push_constants(
                    cb,
                    pipeline.layout,
                    pipeline.push_constant_stages,
                    offset,
                    data,
                )
            };
        }
    }

    fn cmd_dispatch(&self, cmd: CommandBufferHandle, x: u32, y: u32, z: u32) {
        let objects = self.objects.lock();
        if let Some(cb) = objects.command_buffer(cmd) {
            unsafe { self.device.cmd_dispatch(cb, x, y, z) };
        }
    }

    fn cmd_pipeline_barrier(&self, cmd: CommandBufferHandle, barrier: &PipelineBarrier) {
        let objects = self.objects.lock();
        let Some(cb) = objects.command_buffer(cmd) else {
            return;
        };

        let src_stage =
            convert_pipeline_stage(barrier.src.stage, vk::PipelineStageFlags::TOP_OF_PIPE);
        let dst_stage =
            convert_pipeline_stage(barrier.dst.stage, vk::PipelineStageFlags::BOTTOM_OF_PIPE);
        let src_access = convert_access_flags(barrier.src.access);
        let dst_access = convert_access_flags(barrier.dst.access);

        match barrier.target {
            BarrierTarget::Buffer {
                buffer,
                offset,
                size,
            } => {
                let Some(target) = objects.buffers.get(&buffer.raw()) else {
                    log::warn!("Vulkan: barrier on unknown buffer {:?}", buffer);
                    return;
                };
                let buffer_barrier = vk::BufferMemoryBarrier::default()
                    .src_access_mask(src_access)
                    .dst_access_mask(dst_access)
                    .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                    .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                    .buffer(target.buffer)
                    .offset(offset)
                    .size(size);
                unsafe {
                    self.device.cmd_pipeline_barrier(
                        cb,
                        src_stage,
                        dst_stage,
                        vk::DependencyFlags::empty(),
                        &[],
                        &[buffer_barrier],
                        &[],
                    )
                };
            }
            BarrierTarget::Texture { texture, depth } => {
                let Some(target) = objects.textures.get(&texture.raw()) else {
                    log::warn!("Vulkan: barrier on unknown texture {:?}", texture);
                    return;
                };
                debug_assert_eq!(
                    depth,
                    target.aspect.contains(vk::ImageAspectFlags::DEPTH),
                    "barrier aspect does not match texture format"
                );
                let image_barrier = vk::ImageMemoryBarrier::default()
                    .old_layout(convert_image_layout(barrier.src.layout))
                    .new_layout(convert_image_layout(barrier.dst.layout))
                    .src_access_mask(src_access)
                    .dst_access_mask(dst_access)
                    .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                    .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                    .image(target.image)
                    .subresource_range(vk::ImageSubresourceRange {
                        aspect_mask: target.aspect,
                        base_mip_level: 0,
                        level_count: vk::REMAINING_MIP_LEVELS,
                        base_array_layer: 0,
                        layer_count: vk::REMAINING_ARRAY_LAYERS,
                    });
                unsafe {
                    self.device.cmd_pipeline_barrier(
                        cb,
                        src_stage,
                        dst_stage,
                        vk::DependencyFlags::empty(),
                        &[],
                        &[],
                        &[image_barrier],
                    )
                };
            }
        }
    }

    fn cmd_begin_render_pass(&self, cmd: CommandBufferHandle, info: &RenderPassInfo) {
        let objects = self.objects.lock();
        let Some(cb) = objects.command_buffer(cmd) else {
            return;
        };
        let Some(color) = objects.textures.get(&info.color.raw()) else {
            log::warn!("Vulkan: render pass with unknown color target {:?}", info.color);
            return;
        };

        let color_attachments = [vk::RenderingAttachmentInfo::default()
            .image_view(color.view)
            .image_layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::STORE)
            .clear_value(vk::ClearValue {
                color: vk::ClearColorValue {
                    float32: info.clear.color,
                },
            })];

        let depth_attachment = info
            .depth
            .and_then(|depth| objects.textures.get(&depth.raw()))
            .map(|depth| {
                vk::RenderingAttachmentInfo::default()
                    .image_view(depth.view)
                    .image_layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL)
                    .load_op(vk::AttachmentLoadOp::CLEAR)
                    .store_op(vk::AttachmentStoreOp::STORE)
                    .clear_value(vk::ClearValue {
                        depth_stencil: vk::ClearDepthStencilValue {
                            depth: info.clear.depth,
                            stencil: info.clear.stencil,
                        },
                    })
            });

        let extent = vk::Extent2D {
            width: info.extent.width,
            height: info.extent.height,
        };
        let render_area = vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent,
        };

        let mut rendering_info = vk::RenderingInfo::default()
            .render_area(render_area)
            .layer_count(1)
            .color_attachments(&color_attachments);
        if let Some(depth_attachment) = depth_attachment.as_ref() {
            rendering_info = rendering_info.depth_attachment(depth_attachment);
        }

        let viewport = vk::Viewport {
            x: 0.0,
            y: 0.0,
            width: extent.width as f32,
            height: extent.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        };

        unsafe {
            self.dynamic_rendering
                .cmd_begin_rendering(cb, &rendering_info);
            self.device.cmd_set_viewport(cb, 0, &[viewport]);
            self.device.cmd_set_scissor(cb, 0, &[render_area]);
        }
    }

    fn cmd_end_render_pass(&self, cmd: CommandBufferHandle) {
        let objects = self.objects.lock();
        if let Some(cb) = objects.command_buffer(cmd) {
            unsafe { self.dynamic_rendering.cmd_end_rendering(cb) };
        }
    }

    fn cmd_bind_vertex_buffer(&self, cmd: CommandBufferHandle, buffer: GpuBufferHandle, offset: u64) {
        let objects = self.objects.lock();
        if let Some(cb) = objects.command_buffer(cmd)
            && let Some(target) = objects.buffers.get(&buffer.raw())
        {
            unsafe {
                self.device
                    .cmd_bind_vertex_buffers(cb, 0, &[target.buffer], &[offset])
            };
        }
    }

    fn cmd_bind_index_buffer(&self, cmd: CommandBufferHandle, buffer: GpuBufferHandle, offset: u64) {
        let objects = self.objects.lock();
        if let Some(cb) = objects.command_buffer(cmd)
            && let Some(target) = objects.buffers.get(&buffer.raw())
        {
            unsafe {
                self.device
                    .cmd_bind_index_buffer(cb, target.buffer, offset, vk::IndexType::UINT32)
            };
        }
    }

    fn cmd_draw_indexed_indirect_count(
        &self,
        cmd: CommandBufferHandle,
        indirect: GpuBufferHandle,
        indirect_offset: u64,
        count: GpuBufferHandle,
        count_offset: u64,
        max_draw_count: u32,
        stride: u32,
    ) {
        let objects = self.objects.lock();
        if let Some(cb) = objects.command_buffer(cmd)
            && let Some(indirect) = objects.buffers.get(&indirect.raw())
            && let Some(count) = objects.buffers.get(&count.raw())
        {
            unsafe {
                self.device.cmd_draw_indexed_indirect_count(
                    cb,
                    indirect.buffer,
                    indirect_offset,
                    count.buffer,
                    count_offset,
                    max_draw_count,
                    stride,
                )
            };
        }
    }
}

static_assertions::assert_impl_all!(VulkanBackend: Send, Sync);
