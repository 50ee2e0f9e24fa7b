//! Dummy GPU backend for testing and development.
//!
//! This backend doesn't talk to a GPU. It hands out handles, keeps buffer
//! contents in memory, and records every command so tests can inspect exactly
//! what a frame would have submitted. Fills recorded into a command buffer are
//! applied to the in-memory contents when the command buffer is submitted.

use std::collections::HashMap;

use parking_lot::Mutex;

use crate::descriptors::ResourceLayout;
use crate::error::GraphicsError;
use crate::types::{
    BufferDescriptor, CommandBufferHandle, DescriptorSetHandle, GpuBufferHandle, GpuObject,
    GpuTextureHandle, LayoutHandle, PipelineBarrier, PipelineHandle, TextureDescriptor,
};

use super::{DescriptorWrite, GpuBackend, PipelineBindPoint, RenderPassInfo};

/// Default number of frames in flight.
pub const DEFAULT_FRAME_COUNT: u32 = 3;

/// A command recorded by the dummy backend.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedCommand {
    /// `cmd_fill_buffer`.
    FillBuffer {
        buffer: GpuBufferHandle,
        offset: u64,
        size: u64,
        value: u32,
    },
    /// `cmd_bind_pipeline`.
    BindPipeline(PipelineHandle),
    /// `cmd_bind_descriptor_set`.
    BindDescriptorSet {
        pipeline: PipelineHandle,
        set_slot: u32,
        set: DescriptorSetHandle,
    },
    /// `cmd_push_constants`.
    PushConstants {
        pipeline: PipelineHandle,
        offset: u32,
        data: Vec<u8>,
    },
    /// `cmd_dispatch`.
    Dispatch { x: u32, y: u32, z: u32 },
    /// `cmd_pipeline_barrier`.
    Barrier(PipelineBarrier),
    /// `cmd_begin_render_pass`.
    BeginRenderPass(RenderPassInfo),
    /// `cmd_end_render_pass`.
    EndRenderPass,
    /// `cmd_bind_vertex_buffer`.
    BindVertexBuffer { buffer: GpuBufferHandle, offset: u64 },
    /// `cmd_bind_index_buffer`.
    BindIndexBuffer { buffer: GpuBufferHandle, offset: u64 },
    /// `cmd_draw_indexed_indirect_count`.
    DrawIndexedIndirectCount {
        indirect: GpuBufferHandle,
        indirect_offset: u64,
        count: GpuBufferHandle,
        count_offset: u64,
        max_draw_count: u32,
        stride: u32,
    },
}

/// A submitted command buffer.
#[derive(Debug, Clone)]
pub struct Submission {
    /// Command buffer handle.
    pub command_buffer: CommandBufferHandle,
    /// Frame slot for frame submissions, `None` for blocking single-use ones.
    pub slot: Option<u32>,
    /// Commands in recording order.
    pub commands: Vec<RecordedCommand>,
}

#[derive(Debug)]
struct DummyBuffer {
    descriptor: BufferDescriptor,
    data: Vec<u8>,
}

#[derive(Debug)]
struct DummySet {
    layout: LayoutHandle,
    writes: HashMap<u32, DescriptorWrite>,
}

#[derive(Debug, Default)]
struct DummyState {
    next_handle: u64,
    buffers: HashMap<u64, DummyBuffer>,
    textures: HashMap<u64, TextureDescriptor>,
    layouts: HashMap<u64, ResourceLayout>,
    sets: HashMap<u64, DummySet>,
    pipelines: HashMap<u64, (String, PipelineBindPoint)>,
    recording: HashMap<u64, Vec<RecordedCommand>>,
    submissions: Vec<Submission>,
    destroyed: Vec<GpuObject>,
    frame_waits: Vec<u32>,
    frames_submitted: u64,
    buffer_creations_before_failure: Option<usize>,
    fail_next_command_buffer: bool,
    descriptor_set_capacity: Option<usize>,
}

impl DummyState {
    fn next_handle(&mut self) -> u64 {
        self.next_handle += 1;
        self.next_handle
    }

    fn record(&mut self, cmd: CommandBufferHandle, command: RecordedCommand) {
        match self.recording.get_mut(&cmd.raw()) {
            Some(commands) => commands.push(command),
            None => log::warn!(
                "DummyBackend: recording into unknown command buffer {:?}",
                cmd
            ),
        }
    }

    fn submit(
        &mut self,
        cmd: CommandBufferHandle,
        slot: Option<u32>,
    ) -> Result<(), GraphicsError> {
        let commands = self.recording.remove(&cmd.raw()).ok_or_else(|| {
            GraphicsError::InvalidParameter(format!("command buffer {cmd:?} is not recording"))
        })?;

        // Execute the only commands with observable effects on memory.
        for command in &commands {
            if let RecordedCommand::FillBuffer {
                buffer,
                offset,
                size,
                value,
            } = command
                && let Some(target) = self.buffers.get_mut(&buffer.raw())
            {
                let start = (*offset as usize).min(target.data.len());
                let end = (offset + size).min(target.data.len() as u64) as usize;
                for chunk in target.data[start..end].chunks_mut(4) {
                    let bytes = value.to_le_bytes();
                    chunk.copy_from_slice(&bytes[..chunk.len()]);
                }
            }
        }

        self.submissions.push(Submission {
            command_buffer: cmd,
            slot,
            commands,
        });
        Ok(())
    }
}

/// Dummy GPU backend.
#[derive(Debug)]
pub struct DummyBackend {
    frame_count: u32,
    state: Mutex<DummyState>,
}

impl Default for DummyBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl DummyBackend {
    /// Create a new dummy backend with [`DEFAULT_FRAME_COUNT`] frames in flight.
    pub fn new() -> Self {
        Self::with_frame_count(DEFAULT_FRAME_COUNT)
    }

    /// Create a new dummy backend with a specific number of frames in flight.
    pub fn with_frame_count(frame_count: u32) -> Self {
        Self {
            frame_count: frame_count.max(1),
            state: Mutex::new(DummyState::default()),
        }
    }

    /// Limit the number of descriptor sets that can be allocated.
    pub fn with_descriptor_set_capacity(self, capacity: usize) -> Self {
        self.state.lock().descriptor_set_capacity = Some(capacity);
        self
    }

    /// Make buffer creation fail after `successes` more successful creations.
    pub fn fail_buffer_creation_after(&self, successes: usize) {
        self.state.lock().buffer_creations_before_failure = Some(successes);
    }

    /// Make the next command buffer allocation fail once.
    pub fn fail_next_command_buffer(&self) {
        self.state.lock().fail_next_command_buffer = true;
    }

    /// Register an externally created pipeline.
    pub fn create_pipeline(
        &self,
        label: impl Into<String>,
        bind_point: PipelineBindPoint,
    ) -> PipelineHandle {
        let mut state = self.state.lock();
        let handle = state.next_handle();
        state.pipelines.insert(handle, (label.into(), bind_point));
        PipelineHandle::from_raw(handle)
    }

    // --- inspection ---

    /// Current contents of a buffer.
    pub fn buffer_contents(&self, buffer: GpuBufferHandle) -> Option<Vec<u8>> {
        self.state
            .lock()
            .buffers
            .get(&buffer.raw())
            .map(|b| b.data.clone())
    }

    /// Descriptor a live buffer was created with.
    pub fn buffer_descriptor(&self, buffer: GpuBufferHandle) -> Option<BufferDescriptor> {
        self.state
            .lock()
            .buffers
            .get(&buffer.raw())
            .map(|b| b.descriptor.clone())
    }

    /// Descriptor a live texture was created with.
    pub fn texture_descriptor(&self, texture: GpuTextureHandle) -> Option<TextureDescriptor> {
        self.state.lock().textures.get(&texture.raw()).cloned()
    }

    /// Layout a descriptor set was allocated with.
    pub fn descriptor_set_layout(&self, set: DescriptorSetHandle) -> Option<LayoutHandle> {
        self.state.lock().sets.get(&set.raw()).map(|s| s.layout)
    }

    /// Latest write at a descriptor binding.
    pub fn descriptor_write(&self, set: DescriptorSetHandle, binding: u32) -> Option<DescriptorWrite> {
        self.state
            .lock()
            .sets
            .get(&set.raw())
            .and_then(|s| s.writes.get(&binding).copied())
    }

    /// Number of live buffers.
    pub fn live_buffer_count(&self) -> usize {
        self.state.lock().buffers.len()
    }

    /// Number of live textures.
    pub fn live_texture_count(&self) -> usize {
        self.state.lock().textures.len()
    }

    /// Number of descriptor layouts created and not destroyed.
    pub fn layout_count(&self) -> usize {
        self.state.lock().layouts.len()
    }

    /// Number of allocated descriptor sets.
    pub fn descriptor_set_count(&self) -> usize {
        self.state.lock().sets.len()
    }

    /// All submissions in order.
    pub fn submissions(&self) -> Vec<Submission> {
        self.state.lock().submissions.clone()
    }

    /// Commands of the most recent submission.
    pub fn last_submitted_commands(&self) -> Vec<RecordedCommand> {
        self.state
            .lock()
            .submissions
            .last()
            .map(|s| s.commands.clone())
            .unwrap_or_default()
    }

    /// Objects destroyed so far, in destruction order.
    pub fn destroyed(&self) -> Vec<GpuObject> {
        self.state.lock().destroyed.clone()
    }

    /// Frame slots waited on, in order.
    pub fn frame_waits(&self) -> Vec<u32> {
        self.state.lock().frame_waits.clone()
    }
}

impl GpuBackend for DummyBackend {
    fn name(&self) -> &'static str {
        "Dummy Backend"
    }

    fn frame_count(&self) -> u32 {
        self.frame_count
    }

    fn frame_index(&self) -> u32 {
        (self.state.lock().frames_submitted % self.frame_count as u64) as u32
    }

    fn wait_for_frame(&self, slot: u32) -> Result<(), GraphicsError> {
        // Submissions complete immediately.
        self.state.lock().frame_waits.push(slot);
        Ok(())
    }

    fn create_buffer(
        &self,
        descriptor: &BufferDescriptor,
    ) -> Result<GpuBufferHandle, GraphicsError> {
        let mut state = self.state.lock();
        if let Some(remaining) = state.buffer_creations_before_failure.as_mut() {
            if *remaining == 0 {
                return Err(GraphicsError::ResourceCreationFailed(format!(
                    "injected failure creating buffer {:?}",
                    descriptor.label
                )));
            }
            *remaining -= 1;
        }

        log::trace!(
            "DummyBackend: creating buffer {:?} (size: {})",
            descriptor.label,
            descriptor.size
        );
        let handle = state.next_handle();
        state.buffers.insert(
            handle,
            DummyBuffer {
                descriptor: descriptor.clone(),
                data: vec![0; descriptor.size as usize],
            },
        );
        Ok(GpuBufferHandle::from_raw(handle))
    }

    fn write_buffer(
        &self,
        buffer: GpuBufferHandle,
        offset: u64,
        data: &[u8],
    ) -> Result<(), GraphicsError> {
        let mut state = self.state.lock();
        let target = state.buffers.get_mut(&buffer.raw()).ok_or_else(|| {
            GraphicsError::InvalidParameter(format!("unknown buffer {buffer:?}"))
        })?;
        if !target.descriptor.is_host_mapped() {
            return Err(GraphicsError::InvalidParameter(format!(
                "buffer {:?} is not host mapped",
                target.descriptor.label
            )));
        }
        let end = offset + data.len() as u64;
        if end > target.data.len() as u64 {
            return Err(GraphicsError::InvalidParameter(format!(
                "write of {} bytes at offset {} exceeds buffer size {}",
                data.len(),
                offset,
                target.data.len()
            )));
        }
        target.data[offset as usize..end as usize].copy_from_slice(data);
        Ok(())
    }

    fn read_buffer(
        &self,
        buffer: GpuBufferHandle,
        offset: u64,
        size: u64,
    ) -> Result<Vec<u8>, GraphicsError> {
        let state = self.state.lock();
        let target = state.buffers.get(&buffer.raw()).ok_or_else(|| {
            GraphicsError::InvalidParameter(format!("unknown buffer {buffer:?}"))
        })?;
        let end = offset + size;
        if end > target.data.len() as u64 {
            return Err(GraphicsError::InvalidParameter(format!(
                "read of {} bytes at offset {} exceeds buffer size {}",
                size,
                offset,
                target.data.len()
            )));
        }
        Ok(target.data[offset as usize..end as usize].to_vec())
    }

    fn create_texture(
        &self,
        descriptor: &TextureDescriptor,
    ) -> Result<GpuTextureHandle, GraphicsError> {
        log::trace!(
            "DummyBackend: creating texture {:?} ({}x{})",
            descriptor.label,
            descriptor.size.width,
            descriptor.size.height
        );
        let mut state = self.state.lock();
        let handle = state.next_handle();
        state.textures.insert(handle, descriptor.clone());
        Ok(GpuTextureHandle::from_raw(handle))
    }

    fn create_descriptor_layout(
        &self,
        layout: &ResourceLayout,
    ) -> Result<LayoutHandle, GraphicsError> {
        let mut state = self.state.lock();
        let handle = state.next_handle();
        state.layouts.insert(handle, layout.clone());
        Ok(LayoutHandle::from_raw(handle))
    }

    fn allocate_descriptor_set(
        &self,
        layout: LayoutHandle,
    ) -> Result<DescriptorSetHandle, GraphicsError> {
        let mut state = self.state.lock();
        if !state.layouts.contains_key(&layout.raw()) {
            return Err(GraphicsError::InvalidParameter(format!(
                "unknown layout {layout:?}"
            )));
        }
        if let Some(capacity) = state.descriptor_set_capacity
            && state.sets.len() >= capacity
        {
            return Err(GraphicsError::DescriptorPoolExhausted {
                capacity: capacity as u32,
            });
        }
        let handle = state.next_handle();
        state.sets.insert(
            handle,
            DummySet {
                layout,
                writes: HashMap::new(),
            },
        );
        Ok(DescriptorSetHandle::from_raw(handle))
    }

    fn write_descriptor(
        &self,
        set: DescriptorSetHandle,
        write: &DescriptorWrite,
    ) -> Result<(), GraphicsError> {
        let mut state = self.state.lock();
        let target = state.sets.get_mut(&set.raw()).ok_or_else(|| {
            GraphicsError::InvalidParameter(format!("unknown descriptor set {set:?}"))
        })?;
        target.writes.insert(write.binding, *write);
        Ok(())
    }

    fn destroy(&self, object: GpuObject) {
        log::trace!("DummyBackend: destroying {:?}", object);
        let mut state = self.state.lock();
        match object {
            GpuObject::Buffer(handle) => {
                state.buffers.remove(&handle.raw());
            }
            GpuObject::Texture(handle) | GpuObject::RenderTarget(handle) => {
                state.textures.remove(&handle.raw());
            }
            GpuObject::CommandBuffer(handle) => {
                state.recording.remove(&handle.raw());
            }
            GpuObject::Pipeline(handle) => {
                state.pipelines.remove(&handle.raw());
            }
            GpuObject::DescriptorLayout(handle) => {
                state.layouts.remove(&handle.raw());
                state.sets.retain(|_, set| set.layout != handle);
            }
        }
        state.destroyed.push(object);
    }

    fn begin_command_buffer(&self) -> Result<CommandBufferHandle, GraphicsError> {
        let mut state = self.state.lock();
        if std::mem::take(&mut state.fail_next_command_buffer) {
            return Err(GraphicsError::OutOfMemory);
        }
        let handle = state.next_handle();
        state.recording.insert(handle, Vec::new());
        Ok(CommandBufferHandle::from_raw(handle))
    }

    fn submit_frame(&self, cmd: CommandBufferHandle, slot: u32) -> Result<(), GraphicsError> {
        let mut state = self.state.lock();
        state.submit(cmd, Some(slot))?;
        state.frames_submitted += 1;
        Ok(())
    }

    fn submit_and_wait(&self, cmd: CommandBufferHandle) -> Result<(), GraphicsError> {
        self.state.lock().submit(cmd, None)
    }

    fn wait_idle(&self) -> Result<(), GraphicsError> {
        Ok(())
    }

    fn cmd_fill_buffer(
        &self,
        cmd: CommandBufferHandle,
        buffer: GpuBufferHandle,
        offset: u64,
        size: u64,
        value: u32,
    ) {
        self.state.lock().record(
            cmd,
            RecordedCommand::FillBuffer {
                buffer,
                offset,
                size,
                value,
            },
        );
    }

    fn cmd_bind_pipeline(&self, cmd: CommandBufferHandle, pipeline: PipelineHandle) {
        self.state
            .lock()
            .record(cmd, RecordedCommand::BindPipeline(pipeline));
    }

    fn cmd_bind_descriptor_set(
        &self,
        cmd: CommandBufferHandle,
        pipeline: PipelineHandle,
        set_slot: u32,
        set: DescriptorSetHandle,
    ) {
        self.state.lock().record(
            cmd,
            RecordedCommand::BindDescriptorSet {
                pipeline,
                set_slot,
                set,
            },
        );
    }

    fn cmd_push_constants(
        &self,
        cmd: CommandBufferHandle,
        pipeline: PipelineHandle,
        offset: u32,
        data: &[u8],
    ) {
        self.state.lock().record(
            cmd,
            RecordedCommand::PushConstants {
                pipeline,
                offset,
                data: data.to_vec(),
            },
        );
    }

    fn cmd_dispatch(&self, cmd: CommandBufferHandle, x: u32, y: u32, z: u32) {
        self.state
            .lock()
            .record(cmd, RecordedCommand::Dispatch { x, y, z });
    }

    fn cmd_pipeline_barrier(&self, cmd: CommandBufferHandle, barrier: &PipelineBarrier) {
        self.state
            .lock()
            .record(cmd, RecordedCommand::Barrier(*barrier));
    }

    fn cmd_begin_render_pass(&self, cmd: CommandBufferHandle, info: &RenderPassInfo) {
        self.state
            .lock()
            .record(cmd, RecordedCommand::BeginRenderPass(*info));
    }

    fn cmd_end_render_pass(&self, cmd: CommandBufferHandle) {
        self.state.lock().record(cmd, RecordedCommand::EndRenderPass);
    }

    fn cmd_bind_vertex_buffer(&self, cmd: CommandBufferHandle, buffer: GpuBufferHandle, offset: u64) {
        self.state
            .lock()
            .record(cmd, RecordedCommand::BindVertexBuffer { buffer, offset });
    }

    fn cmd_bind_index_buffer(&self, cmd: CommandBufferHandle, buffer: GpuBufferHandle, offset: u64) {
        self.state
            .lock()
            .record(cmd, RecordedCommand::BindIndexBuffer { buffer, offset });
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
        self.state.lock().record(
            cmd,
            RecordedCommand::DrawIndexedIndirectCount {
                indirect,
                indirect_offset,
                count,
                count_offset,
                max_draw_count,
                stride,
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BufferUsage;

    fn mapped(size: u64) -> BufferDescriptor {
        BufferDescriptor::new(size, BufferUsage::STORAGE | BufferUsage::HOST_MAPPED)
    }

    #[test]
    fn test_buffer_write_and_read() {
        let backend = DummyBackend::new();
        let buffer = backend.create_buffer(&mapped(16)).unwrap();

        backend.write_buffer(buffer, 4, &[1, 2, 3, 4]).unwrap();
        assert_eq!(
            backend.read_buffer(buffer, 0, 8).unwrap(),
            vec![0, 0, 0, 0, 1, 2, 3, 4]
        );
    }

    #[test]
    fn test_out_of_bounds_write_fails() {
        let backend = DummyBackend::new();
        let buffer = backend.create_buffer(&mapped(4)).unwrap();
        assert!(backend.write_buffer(buffer, 2, &[0; 4]).is_err());
    }

    #[test]
    fn test_unmapped_write_fails() {
        let backend = DummyBackend::new();
        let buffer = backend
            .create_buffer(&BufferDescriptor::new(16, BufferUsage::STORAGE))
            .unwrap();
        assert!(backend.write_buffer(buffer, 0, &[1]).is_err());
    }

    #[test]
    fn test_injected_failure() {
        let backend = DummyBackend::new();
        backend.fail_buffer_creation_after(1);
        assert!(backend.create_buffer(&mapped(4)).is_ok());
        assert!(matches!(
            backend.create_buffer(&mapped(4)),
            Err(GraphicsError::ResourceCreationFailed(_))
        ));
    }

    #[test]
    fn test_fill_applied_on_submit() {
        let backend = DummyBackend::new();
        let buffer = backend.create_buffer(&mapped(8)).unwrap();
        backend.write_buffer(buffer, 0, &[0xff; 8]).unwrap();

        let cmd = backend.begin_command_buffer().unwrap();
        backend.cmd_fill_buffer(cmd, buffer, 0, 4, 0);
        assert_eq!(backend.buffer_contents(buffer).unwrap()[0], 0xff);

        backend.submit_frame(cmd, 0).unwrap();
        let contents = backend.buffer_contents(buffer).unwrap();
        assert_eq!(&contents[..4], &[0, 0, 0, 0]);
        assert_eq!(&contents[4..], &[0xff; 4]);
        assert_eq!(backend.frame_index(), 1);
    }

    #[test]
    fn test_descriptor_pool_capacity() {
        let backend = DummyBackend::new().with_descriptor_set_capacity(1);
        let layout = backend
            .create_descriptor_layout(&ResourceLayout::new())
            .unwrap();
        assert!(backend.allocate_descriptor_set(layout).is_ok());
        assert_eq!(
            backend.allocate_descriptor_set(layout),
            Err(GraphicsError::DescriptorPoolExhausted { capacity: 1 })
        );
    }

    #[test]
    fn test_submit_unknown_command_buffer() {
        let backend = DummyBackend::new();
        assert!(
            backend
                .submit_and_wait(CommandBufferHandle::from_raw(99))
                .is_err()
        );
    }
}
