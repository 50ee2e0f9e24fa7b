//! Host-mapped GPU buffer resource.
//!
//! Frame buffers are persistently mapped: the CPU writes them directly and
//! the GPU reads them after submission. A buffer created with a
//! [`SetBinding`] owns a resource set and keeps its descriptor up to date
//! across resizes.

use crate::context::RenderContext;
use crate::descriptors::{LayoutIndex, ResourceSetIndex};
use crate::error::GraphicsError;
use crate::types::{
    BarrierInfo, BufferDescriptor, BufferKind, BufferUsage, CommandBufferHandle, GpuBufferHandle,
    GpuObject,
};

use super::ring_buffer::FrameResource;

/// Where a buffer is bound: a binding of a set with the given layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SetBinding {
    /// Layout of the set the buffer is written into.
    pub layout: LayoutIndex,
    /// Binding slot within that layout.
    pub binding: u32,
}

/// Everything needed to create a [`Buffer`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BufferSpecification {
    /// Debug label.
    pub label: String,
    /// Size in bytes.
    pub size: u64,
    /// Role of the buffer.
    pub kind: BufferKind,
    /// Resource set binding, if the buffer is read by shaders.
    pub binding: Option<SetBinding>,
}

impl BufferSpecification {
    /// Create a specification without a resource set.
    pub fn new(label: impl Into<String>, size: u64, kind: BufferKind) -> Self {
        Self {
            label: label.into(),
            size,
            kind,
            binding: None,
        }
    }

    /// Give the buffer its own resource set with `layout`, written at `binding`.
    pub fn with_binding(mut self, layout: LayoutIndex, binding: u32) -> Self {
        self.binding = Some(SetBinding { layout, binding });
        self
    }

    fn descriptor(&self, label: &str, size: u64) -> BufferDescriptor {
        BufferDescriptor::new(size, self.kind.usage() | BufferUsage::HOST_MAPPED)
            .with_label(label)
    }
}

/// A host-mapped GPU buffer.
#[derive(Debug)]
pub struct Buffer {
    label: String,
    specification: BufferSpecification,
    handle: GpuBufferHandle,
    size: u64,
    resource_set: Option<ResourceSetIndex>,
}

impl Buffer {
    /// Create a buffer, and its resource set if the specification has one.
    pub fn create(
        ctx: &mut RenderContext,
        specification: &BufferSpecification,
    ) -> Result<Self, GraphicsError> {
        Self::create_labeled(ctx, specification, &specification.label)
    }

    fn create_labeled(
        ctx: &mut RenderContext,
        specification: &BufferSpecification,
        label: &str,
    ) -> Result<Self, GraphicsError> {
        if specification.size == 0 {
            return Err(GraphicsError::InvalidParameter(format!(
                "buffer '{label}' has zero size"
            )));
        }

        let handle = ctx
            .backend()
            .create_buffer(&specification.descriptor(label, specification.size))?;
        ctx.lifetimes().track(GpuObject::Buffer(handle));

        let mut buffer = Self {
            label: label.to_string(),
            specification: specification.clone(),
            handle,
            size: specification.size,
            resource_set: None,
        };

        if let Some(binding) = specification.binding {
            let set = match ctx.resources_mut().create_resource_set(binding.layout) {
                Ok(set) => set,
                Err(e) => {
                    buffer.destroy(ctx);
                    return Err(e);
                }
            };
            buffer.resource_set = Some(set);
            if let Err(e) = ctx.resources().write_buffer(&buffer) {
                buffer.destroy(ctx);
                return Err(e);
            }
        }

        log::trace!("Created buffer '{}' ({} bytes)", label, buffer.size);
        Ok(buffer)
    }

    /// Backend handle. Null after [`destroy`](Self::destroy).
    pub fn handle(&self) -> GpuBufferHandle {
        self.handle
    }

    /// Current size in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Debug label.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Role of the buffer.
    pub fn kind(&self) -> BufferKind {
        self.specification.kind
    }

    /// Resource set owned by this buffer.
    pub fn resource_set(&self) -> Option<ResourceSetIndex> {
        self.resource_set
    }

    /// `(set, binding)` the buffer is written into.
    pub fn set_binding(&self) -> Option<(ResourceSetIndex, u32)> {
        Some((self.resource_set?, self.specification.binding?.binding))
    }

    /// Whether the buffer has been destroyed.
    pub fn is_destroyed(&self) -> bool {
        self.handle.is_null()
    }

    /// Write bytes at `offset` through the mapping.
    pub fn set_data(
        &self,
        ctx: &RenderContext,
        data: &[u8],
        offset: u64,
    ) -> Result<(), GraphicsError> {
        if offset + data.len() as u64 > self.size {
            return Err(GraphicsError::InvalidParameter(format!(
                "write of {} bytes at offset {} overflows buffer '{}' ({} bytes)",
                data.len(),
                offset,
                self.label,
                self.size
            )));
        }
        if data.is_empty() {
            return Ok(());
        }
        ctx.backend().write_buffer(self.handle, offset, data)
    }

    /// Read bytes back through the mapping.
    pub fn read_back(
        &self,
        ctx: &RenderContext,
        offset: u64,
        size: u64,
    ) -> Result<Vec<u8>, GraphicsError> {
        ctx.backend().read_buffer(self.handle, offset, size)
    }

    /// Replace the buffer with one of `size` bytes. Contents are not preserved.
    ///
    /// The old buffer is retired, so frames still in flight keep reading it.
    pub fn resize(&mut self, ctx: &mut RenderContext, size: u64) -> Result<(), GraphicsError> {
        if size == 0 {
            return Err(GraphicsError::InvalidParameter(format!(
                "buffer '{}' cannot be resized to zero",
                self.label
            )));
        }

        let handle = ctx
            .backend()
            .create_buffer(&self.specification.descriptor(&self.label, size))?;
        ctx.lifetimes().track(GpuObject::Buffer(handle));

        let old = std::mem::replace(&mut self.handle, handle);
        if !old.is_null() {
            ctx.lifetimes().retire(GpuObject::Buffer(old));
            ctx.resources_mut().states_mut().forget_buffer(old);
        }
        self.size = size;

        if self.resource_set.is_some() {
            ctx.resources().write_buffer(self)?;
        }
        log::debug!("Resized buffer '{}' to {} bytes", self.label, size);
        Ok(())
    }

    /// Record a zero fill of the whole buffer.
    pub fn clear(&self, ctx: &mut RenderContext, cmd: CommandBufferHandle) {
        ctx.resources_mut()
            .transition_buffer(cmd, self.handle, self.size, BarrierInfo::TRANSFER_WRITE);
        ctx.backend().cmd_fill_buffer(cmd, self.handle, 0, self.size, 0);
    }

    /// Retire the buffer. Calling this more than once is a no-op.
    ///
    /// The resource set stays with the handler.
    pub fn destroy(&mut self, ctx: &mut RenderContext) {
        let handle = std::mem::replace(&mut self.handle, GpuBufferHandle::NULL);
        if handle.is_null() {
            return;
        }
        ctx.lifetimes().retire(GpuObject::Buffer(handle));
        ctx.resources_mut().states_mut().forget_buffer(handle);
    }
}

impl FrameResource for Buffer {
    type Specification = BufferSpecification;

    fn specification_label(specification: &Self::Specification) -> &str {
        &specification.label
    }

    fn create_instance(
        ctx: &mut RenderContext,
        specification: &Self::Specification,
        label: &str,
    ) -> Result<Self, GraphicsError> {
        Self::create_labeled(ctx, specification, label)
    }

    fn destroy_instance(&mut self, ctx: &mut RenderContext) {
        self.destroy(ctx);
    }
}

static_assertions::assert_impl_all!(Buffer: Send, Sync);
