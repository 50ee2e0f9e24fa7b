//! Vulkan command pool, descriptor pool and frame fences.

use ash::vk;

use crate::descriptors::ResourceLayout;
use crate::error::GraphicsError;

use super::conversion::{convert_descriptor_type, convert_result, convert_shader_stages};

/// Create a command pool for graphics operations.
pub fn create_command_pool(
    device: &ash::Device,
    queue_family_index: u32,
) -> Result<vk::CommandPool, GraphicsError> {
    let pool_info = vk::CommandPoolCreateInfo::default()
        .queue_family_index(queue_family_index)
        .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);

    unsafe { device.create_command_pool(&pool_info, None) }.map_err(|e| {
        GraphicsError::InitializationFailed(format!("Failed to create command pool: {:?}", e))
    })
}

/// Allocate a primary command buffer and begin one-time recording.
pub fn begin_command_buffer(
    device: &ash::Device,
    pool: vk::CommandPool,
) -> Result<vk::CommandBuffer, GraphicsError> {
    let alloc_info = vk::CommandBufferAllocateInfo::default()
        .command_pool(pool)
        .level(vk::CommandBufferLevel::PRIMARY)
        .command_buffer_count(1);

    let cmd = unsafe { device.allocate_command_buffers(&alloc_info) }
        .map_err(|e| convert_result("Failed to allocate command buffer", e))?
        .into_iter()
        .next()
        .ok_or_else(|| GraphicsError::Internal("no command buffer allocated".into()))?;

    let begin_info =
        vk::CommandBufferBeginInfo::default().flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
    if let Err(e) = unsafe { device.begin_command_buffer(cmd, &begin_info) } {
        unsafe { device.free_command_buffers(pool, &[cmd]) };
        return Err(convert_result("Failed to begin command buffer", e));
    }
    Ok(cmd)
}

/// Create one signaled fence per frame in flight.
pub fn create_frame_fences(
    device: &ash::Device,
    count: u32,
) -> Result<Vec<vk::Fence>, GraphicsError> {
    let info = vk::FenceCreateInfo::default().flags(vk::FenceCreateFlags::SIGNALED);
    let mut fences = Vec::with_capacity(count as usize);
    for _ in 0..count {
        match unsafe { device.create_fence(&info, None) } {
            Ok(fence) => fences.push(fence),
            Err(e) => {
                for fence in fences {
                    unsafe { device.destroy_fence(fence, None) };
                }
                return Err(GraphicsError::InitializationFailed(format!(
                    "Failed to create frame fence: {:?}",
                    e
                )));
            }
        }
    }
    Ok(fences)
}

/// Create the fixed-capacity descriptor pool.
///
/// Every descriptor type gets `capacity` descriptors, so any mix of
/// single-binding sets fits until `capacity` sets are allocated.
pub fn create_descriptor_pool(
    device: &ash::Device,
    capacity: u32,
) -> Result<vk::DescriptorPool, GraphicsError> {
    let pool_sizes = [
        vk::DescriptorType::UNIFORM_BUFFER,
        vk::DescriptorType::STORAGE_BUFFER,
        vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
        vk::DescriptorType::SAMPLED_IMAGE,
        vk::DescriptorType::STORAGE_IMAGE,
    ]
    .map(|ty| vk::DescriptorPoolSize {
        ty,
        descriptor_count: capacity,
    });

    let info = vk::DescriptorPoolCreateInfo::default()
        .max_sets(capacity)
        .pool_sizes(&pool_sizes);

    unsafe { device.create_descriptor_pool(&info, None) }.map_err(|e| {
        GraphicsError::InitializationFailed(format!("Failed to create descriptor pool: {:?}", e))
    })
}

/// Create a descriptor-set layout with one binding per layout entry.
pub fn create_set_layout(
    device: &ash::Device,
    layout: &ResourceLayout,
) -> Result<vk::DescriptorSetLayout, GraphicsError> {
    let bindings: Vec<vk::DescriptorSetLayoutBinding> = layout
        .bindings()
        .iter()
        .enumerate()
        .map(|(slot, binding)| {
            vk::DescriptorSetLayoutBinding::default()
                .binding(slot as u32)
                .descriptor_type(convert_descriptor_type(binding))
                .descriptor_count(1)
                .stage_flags(convert_shader_stages(binding.stages))
        })
        .collect();

    let info = vk::DescriptorSetLayoutCreateInfo::default().bindings(&bindings);
    unsafe { device.create_descriptor_set_layout(&info, None) }
        .map_err(|e| convert_result("Failed to create descriptor set layout", e))
}

/// Create the sampler bound with combined texture bindings.
pub fn create_default_sampler(device: &ash::Device) -> Result<vk::Sampler, GraphicsError> {
    let info = vk::SamplerCreateInfo::default()
        .mag_filter(vk::Filter::LINEAR)
        .min_filter(vk::Filter::LINEAR)
        .mipmap_mode(vk::SamplerMipmapMode::LINEAR)
        .address_mode_u(vk::SamplerAddressMode::REPEAT)
        .address_mode_v(vk::SamplerAddressMode::REPEAT)
        .address_mode_w(vk::SamplerAddressMode::REPEAT)
        .max_lod(vk::LOD_CLAMP_NONE);

    unsafe { device.create_sampler(&info, None) }.map_err(|e| {
        GraphicsError::InitializationFailed(format!("Failed to create default sampler: {:?}", e))
    })
}
