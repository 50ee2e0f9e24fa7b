//! Buffer types and descriptors.

use bitflags::bitflags;
use bytemuck::{Pod, Zeroable};

bitflags! {
    /// Usage flags for buffers.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BufferUsage: u32 {
        /// Buffer can be used as a vertex buffer.
        const VERTEX = 1 << 0;
        /// Buffer can be used as an index buffer.
        const INDEX = 1 << 1;
        /// Buffer can be used as a uniform buffer.
        const UNIFORM = 1 << 2;
        /// Buffer can be used as a storage buffer.
        const STORAGE = 1 << 3;
        /// Buffer can be used as an indirect buffer.
        const INDIRECT = 1 << 4;
        /// Buffer can be copied from.
        const COPY_SRC = 1 << 5;
        /// Buffer can be copied to (also required for fills).
        const COPY_DST = 1 << 6;
        /// Buffer lives in host-visible, persistently mapped memory.
        const HOST_MAPPED = 1 << 7;
    }
}

impl Default for BufferUsage {
    fn default() -> Self {
        Self::empty()
    }
}

/// Role a buffer plays in the frame.
///
/// The kind decides the default usage flags and which descriptor type the
/// buffer is written as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferKind {
    /// Small, read-only shader constants.
    Uniform,
    /// Large read/write shader data.
    Storage,
    /// Storage buffer that is also consumed as indirect draw arguments or counts.
    Indirect,
    /// Vertex data.
    Vertex,
    /// Index data.
    Index,
}

impl BufferKind {
    /// Default usage flags for a buffer of this kind.
    pub fn usage(self) -> BufferUsage {
        match self {
            Self::Uniform => BufferUsage::UNIFORM | BufferUsage::COPY_DST,
            Self::Storage => BufferUsage::STORAGE | BufferUsage::COPY_DST,
            Self::Indirect => {
                BufferUsage::STORAGE | BufferUsage::INDIRECT | BufferUsage::COPY_DST
            }
            Self::Vertex => BufferUsage::VERTEX | BufferUsage::COPY_DST,
            Self::Index => BufferUsage::INDEX | BufferUsage::COPY_DST,
        }
    }
}

/// Descriptor for creating a backend buffer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct BufferDescriptor {
    /// Debug label for the buffer.
    pub label: Option<String>,
    /// Size in bytes.
    pub size: u64,
    /// Usage flags.
    pub usage: BufferUsage,
}

impl BufferDescriptor {
    /// Create a new buffer descriptor.
    pub fn new(size: u64, usage: BufferUsage) -> Self {
        Self {
            label: None,
            size,
            usage,
        }
    }

    /// Set the debug label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Check whether the buffer is persistently mapped for CPU writes.
    pub fn is_host_mapped(&self) -> bool {
        self.usage.contains(BufferUsage::HOST_MAPPED)
    }
}

// ============================================================================
// Indirect Drawing Arguments
// ============================================================================

/// Arguments for an indexed indirect draw call.
///
/// Matches the GPU layout of `VkDrawIndexedIndirectCommand`. One record per
/// queued mesh is written to the cull-input buffer; the culling pass copies the
/// surviving records into the indirect output buffer.
///
/// # Memory Layout
///
/// - Total size: 20 bytes
/// - Alignment: 4 bytes
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Pod, Zeroable)]
pub struct DrawIndexedIndirectArgs {
    /// Number of indices to draw.
    pub index_count: u32,
    /// Number of instances to draw.
    pub instance_count: u32,
    /// Index of the first index to draw.
    pub first_index: u32,
    /// Value added to each index before reading from the vertex buffer.
    pub vertex_offset: i32,
    /// Instance ID of the first instance to draw.
    pub first_instance: u32,
}

impl DrawIndexedIndirectArgs {
    /// Size of the struct in bytes.
    pub const SIZE: u64 = std::mem::size_of::<Self>() as u64;

    /// Create new indexed indirect draw arguments.
    pub fn new(index_count: u32, instance_count: u32) -> Self {
        Self {
            index_count,
            instance_count,
            first_index: 0,
            vertex_offset: 0,
            first_instance: 0,
        }
    }

    /// Set the first index.
    pub fn with_first_index(mut self, first_index: u32) -> Self {
        self.first_index = first_index;
        self
    }

    /// Set the vertex offset.
    pub fn with_vertex_offset(mut self, vertex_offset: i32) -> Self {
        self.vertex_offset = vertex_offset;
        self
    }

    /// Set the first instance index.
    pub fn with_first_instance(mut self, first_instance: u32) -> Self {
        self.first_instance = first_instance;
        self
    }
}

static_assertions::const_assert_eq!(DrawIndexedIndirectArgs::SIZE, 20);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_usage() {
        assert!(BufferKind::Indirect.usage().contains(BufferUsage::INDIRECT));
        assert!(BufferKind::Indirect.usage().contains(BufferUsage::STORAGE));
        assert!(!BufferKind::Uniform.usage().contains(BufferUsage::STORAGE));
    }

    #[test]
    fn test_indirect_args_builder() {
        let args = DrawIndexedIndirectArgs::new(36, 4)
            .with_first_index(12)
            .with_vertex_offset(-3)
            .with_first_instance(8);

        assert_eq!(args.index_count, 36);
        assert_eq!(args.instance_count, 4);
        assert_eq!(args.first_index, 12);
        assert_eq!(args.vertex_offset, -3);
        assert_eq!(args.first_instance, 8);
        assert_eq!(bytemuck::bytes_of(&args).len(), 20);
    }
}
