//! GPU backend abstraction layer.
//!
//! The frame core never talks to a graphics API directly. Everything it needs
//! from the device, queue and allocator goes through the [`GpuBackend`] trait,
//! which hands out plain handles (see [`crate::types`]) and records commands
//! into command buffers identified by handle.
//!
//! # Available Backends
//!
//! - `dummy` (default): records commands and keeps buffer contents in memory
//! - `vulkan-backend`: native Vulkan backend using ash over an existing device
//!
//! Pipelines are compiled outside of this crate and registered with the
//! backend; the core only ever sees [`PipelineHandle`]s.

#[cfg(feature = "vulkan-backend")]
pub mod vulkan;

#[cfg(any(test, feature = "dummy"))]
pub mod dummy;

use crate::descriptors::ResourceLayout;
use crate::error::GraphicsError;
use crate::types::{
    BufferDescriptor, ClearValues, CommandBufferHandle, DescriptorSetHandle, Extent2d,
    GpuBufferHandle, GpuObject, GpuTextureHandle, LayoutHandle, PipelineBarrier, PipelineHandle,
    TextureDescriptor,
};

/// Pipeline bind point of an externally created pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineBindPoint {
    /// Compute pipeline.
    Compute,
    /// Graphics pipeline.
    Graphics,
}

/// Resource written into a descriptor binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BoundResource {
    /// A uniform buffer range.
    UniformBuffer {
        /// Buffer handle.
        buffer: GpuBufferHandle,
        /// Byte offset.
        offset: u64,
        /// Byte size.
        size: u64,
    },
    /// A storage buffer range.
    StorageBuffer {
        /// Buffer handle.
        buffer: GpuBufferHandle,
        /// Byte offset.
        offset: u64,
        /// Byte size.
        size: u64,
    },
    /// A sampled texture, optionally combined with the backend default sampler.
    Texture {
        /// Texture handle.
        texture: GpuTextureHandle,
        /// Bound together with a sampler.
        combined: bool,
    },
}

/// One descriptor write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DescriptorWrite {
    /// Destination binding slot.
    pub binding: u32,
    /// Resource to write.
    pub resource: BoundResource,
}

/// Attachments and clear values for a render pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderPassInfo {
    /// Color attachment.
    pub color: GpuTextureHandle,
    /// Optional depth attachment.
    pub depth: Option<GpuTextureHandle>,
    /// Render area.
    pub extent: Extent2d,
    /// Clear values applied at load.
    pub clear: ClearValues,
}

/// GPU backend trait for abstracting different GPU APIs.
///
/// All methods take `&self`; implementations use interior mutability so a
/// backend can be shared as `Arc<dyn GpuBackend>`.
pub trait GpuBackend: Send + Sync + 'static {
    /// Get the backend name.
    fn name(&self) -> &'static str;

    /// Number of frames in flight (swapchain image count).
    fn frame_count(&self) -> u32;

    /// Index of the swapchain image currently being rendered.
    fn frame_index(&self) -> u32;

    /// Block until the GPU finished the last submission made for `slot`.
    ///
    /// There is no timeout.
    fn wait_for_frame(&self, slot: u32) -> Result<(), GraphicsError>;

    // --- resources ---

    /// Create a buffer.
    fn create_buffer(&self, descriptor: &BufferDescriptor)
    -> Result<GpuBufferHandle, GraphicsError>;

    /// Write bytes into a host-mapped buffer.
    fn write_buffer(
        &self,
        buffer: GpuBufferHandle,
        offset: u64,
        data: &[u8],
    ) -> Result<(), GraphicsError>;

    /// Read bytes back from a host-mapped buffer.
    fn read_buffer(
        &self,
        buffer: GpuBufferHandle,
        offset: u64,
        size: u64,
    ) -> Result<Vec<u8>, GraphicsError>;

    /// Create a texture with a default view.
    fn create_texture(
        &self,
        descriptor: &TextureDescriptor,
    ) -> Result<GpuTextureHandle, GraphicsError>;

    /// Create a descriptor-set layout.
    fn create_descriptor_layout(
        &self,
        layout: &ResourceLayout,
    ) -> Result<LayoutHandle, GraphicsError>;

    /// Allocate a descriptor set from the fixed-capacity pool.
    fn allocate_descriptor_set(
        &self,
        layout: LayoutHandle,
    ) -> Result<DescriptorSetHandle, GraphicsError>;

    /// Write a resource into a descriptor set binding.
    fn write_descriptor(
        &self,
        set: DescriptorSetHandle,
        write: &DescriptorWrite,
    ) -> Result<(), GraphicsError>;

    /// Destroy an object. Callers guarantee the GPU no longer uses it.
    fn destroy(&self, object: GpuObject);

    // --- submission ---

    /// Allocate a command buffer and begin recording.
    fn begin_command_buffer(&self) -> Result<CommandBufferHandle, GraphicsError>;

    /// End recording and submit as the work of frame `slot`.
    ///
    /// The slot's in-flight fence is signaled when the GPU is done.
    fn submit_frame(&self, cmd: CommandBufferHandle, slot: u32) -> Result<(), GraphicsError>;

    /// End recording, submit, and block until the work completes.
    fn submit_and_wait(&self, cmd: CommandBufferHandle) -> Result<(), GraphicsError>;

    /// Block until the device is idle.
    fn wait_idle(&self) -> Result<(), GraphicsError>;

    // --- recording ---

    /// Fill a buffer range with a 32-bit value.
    fn cmd_fill_buffer(
        &self,
        cmd: CommandBufferHandle,
        buffer: GpuBufferHandle,
        offset: u64,
        size: u64,
        value: u32,
    );

    /// Bind a pipeline.
    fn cmd_bind_pipeline(&self, cmd: CommandBufferHandle, pipeline: PipelineHandle);

    /// Bind a descriptor set at `set_slot` of the pipeline layout.
    fn cmd_bind_descriptor_set(
        &self,
        cmd: CommandBufferHandle,
        pipeline: PipelineHandle,
        set_slot: u32,
        set: DescriptorSetHandle,
    );

    /// Push constants for the bound pipeline.
    fn cmd_push_constants(
        &self,
        cmd: CommandBufferHandle,
        pipeline: PipelineHandle,
        offset: u32,
        data: &[u8],
    );

    /// Dispatch compute work groups.
    fn cmd_dispatch(&self, cmd: CommandBufferHandle, x: u32, y: u32, z: u32);

    /// Record a pipeline barrier.
    fn cmd_pipeline_barrier(&self, cmd: CommandBufferHandle, barrier: &PipelineBarrier);

    /// Begin a render pass.
    fn cmd_begin_render_pass(&self, cmd: CommandBufferHandle, info: &RenderPassInfo);

    /// End the current render pass.
    fn cmd_end_render_pass(&self, cmd: CommandBufferHandle);

    /// Bind a vertex buffer at binding 0.
    fn cmd_bind_vertex_buffer(&self, cmd: CommandBufferHandle, buffer: GpuBufferHandle, offset: u64);

    /// Bind a 32-bit index buffer.
    fn cmd_bind_index_buffer(&self, cmd: CommandBufferHandle, buffer: GpuBufferHandle, offset: u64);

    /// Indexed indirect multi-draw with a GPU-side draw count.
    #[allow(clippy::too_many_arguments)]
    fn cmd_draw_indexed_indirect_count(
        &self,
        cmd: CommandBufferHandle,
        indirect: GpuBufferHandle,
        indirect_offset: u64,
        count: GpuBufferHandle,
        count_offset: u64,
        max_draw_count: u32,
        stride: u32,
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    static_assertions::assert_obj_safe!(GpuBackend);
    static_assertions::assert_impl_all!(dummy::DummyBackend: GpuBackend, Send, Sync);
}
