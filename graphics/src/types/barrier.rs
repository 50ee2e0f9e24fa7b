//! Memory barrier descriptions.
//!
//! A barrier orders two GPU operations that touch the same resource. Each side
//! of the barrier is a [`BarrierInfo`]: which accesses, at which pipeline stage,
//! and for textures which image layout.

use bitflags::bitflags;

use super::{GpuBufferHandle, GpuTextureHandle};

bitflags! {
    /// Memory access kinds.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct AccessFlags: u32 {
        /// Indirect command or count reads.
        const INDIRECT_COMMAND_READ = 1 << 0;
        /// Index buffer reads.
        const INDEX_READ = 1 << 1;
        /// Vertex attribute reads.
        const VERTEX_ATTRIBUTE_READ = 1 << 2;
        /// Uniform buffer reads.
        const UNIFORM_READ = 1 << 3;
        /// Shader storage/sampled reads.
        const SHADER_READ = 1 << 4;
        /// Shader storage writes.
        const SHADER_WRITE = 1 << 5;
        /// Color attachment reads.
        const COLOR_ATTACHMENT_READ = 1 << 6;
        /// Color attachment writes.
        const COLOR_ATTACHMENT_WRITE = 1 << 7;
        /// Depth/stencil attachment reads.
        const DEPTH_STENCIL_ATTACHMENT_READ = 1 << 8;
        /// Depth/stencil attachment writes.
        const DEPTH_STENCIL_ATTACHMENT_WRITE = 1 << 9;
        /// Transfer reads.
        const TRANSFER_READ = 1 << 10;
        /// Transfer writes (copies and fills).
        const TRANSFER_WRITE = 1 << 11;
        /// Host reads through a mapping.
        const HOST_READ = 1 << 12;
        /// Host writes through a mapping.
        const HOST_WRITE = 1 << 13;
    }
}

impl AccessFlags {
    /// All access kinds that modify memory.
    pub const WRITES: Self = Self::SHADER_WRITE
        .union(Self::COLOR_ATTACHMENT_WRITE)
        .union(Self::DEPTH_STENCIL_ATTACHMENT_WRITE)
        .union(Self::TRANSFER_WRITE)
        .union(Self::HOST_WRITE);

    /// Check whether any of the accesses write memory.
    pub fn is_write(self) -> bool {
        self.intersects(Self::WRITES)
    }
}

impl Default for AccessFlags {
    fn default() -> Self {
        Self::empty()
    }
}

bitflags! {
    /// Pipeline stages.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PipelineStage: u32 {
        /// Start of the pipeline.
        const TOP_OF_PIPE = 1 << 0;
        /// Indirect argument consumption.
        const DRAW_INDIRECT = 1 << 1;
        /// Vertex and index fetch.
        const VERTEX_INPUT = 1 << 2;
        /// Vertex shading.
        const VERTEX_SHADER = 1 << 3;
        /// Early depth/stencil tests.
        const EARLY_FRAGMENT_TESTS = 1 << 4;
        /// Fragment shading.
        const FRAGMENT_SHADER = 1 << 5;
        /// Late depth/stencil tests.
        const LATE_FRAGMENT_TESTS = 1 << 6;
        /// Color attachment output.
        const COLOR_ATTACHMENT_OUTPUT = 1 << 7;
        /// Compute shading.
        const COMPUTE_SHADER = 1 << 8;
        /// Copies, fills and clears.
        const TRANSFER = 1 << 9;
        /// End of the pipeline.
        const BOTTOM_OF_PIPE = 1 << 10;
        /// Host access.
        const HOST = 1 << 11;
    }
}

impl Default for PipelineStage {
    fn default() -> Self {
        Self::TOP_OF_PIPE
    }
}

/// Image layout states that textures can be in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ImageLayout {
    /// Initial state, contents undefined.
    #[default]
    Undefined,
    /// General layout (storage images, mixed access).
    General,
    /// Optimal for color attachment writes.
    ColorAttachment,
    /// Optimal for depth/stencil attachment writes.
    DepthStencilAttachment,
    /// Optimal for depth read-only access.
    DepthStencilReadOnly,
    /// Optimal for shader sampling.
    ShaderReadOnly,
    /// Optimal for transfer source operations.
    TransferSrc,
    /// Optimal for transfer destination operations.
    TransferDst,
    /// Ready for presentation.
    PresentSrc,
}

/// One side of a barrier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct BarrierInfo {
    /// Accesses performed.
    pub access: AccessFlags,
    /// Stage performing the accesses.
    pub stage: PipelineStage,
    /// Image layout; ignored for buffers.
    pub layout: ImageLayout,
}

impl BarrierInfo {
    /// Nothing has touched the resource yet.
    pub const NONE: Self = Self {
        access: AccessFlags::empty(),
        stage: PipelineStage::TOP_OF_PIPE,
        layout: ImageLayout::Undefined,
    };

    /// Written by a compute shader.
    pub const COMPUTE_WRITE: Self = Self {
        access: AccessFlags::SHADER_WRITE,
        stage: PipelineStage::COMPUTE_SHADER,
        layout: ImageLayout::Undefined,
    };

    /// Read and written by a compute shader.
    pub const COMPUTE_READ_WRITE: Self = Self {
        access: AccessFlags::SHADER_READ.union(AccessFlags::SHADER_WRITE),
        stage: PipelineStage::COMPUTE_SHADER,
        layout: ImageLayout::Undefined,
    };

    /// Consumed as indirect draw arguments or draw count.
    pub const INDIRECT_READ: Self = Self {
        access: AccessFlags::INDIRECT_COMMAND_READ,
        stage: PipelineStage::DRAW_INDIRECT,
        layout: ImageLayout::Undefined,
    };

    /// Written by a copy or fill.
    pub const TRANSFER_WRITE: Self = Self {
        access: AccessFlags::TRANSFER_WRITE,
        stage: PipelineStage::TRANSFER,
        layout: ImageLayout::Undefined,
    };

    /// Create a buffer barrier side.
    pub fn new(access: AccessFlags, stage: PipelineStage) -> Self {
        Self {
            access,
            stage,
            layout: ImageLayout::Undefined,
        }
    }

    /// Set the image layout.
    pub fn with_layout(mut self, layout: ImageLayout) -> Self {
        self.layout = layout;
        self
    }

    /// State of a color attachment being rendered to.
    pub fn color_attachment() -> Self {
        Self::new(
            AccessFlags::COLOR_ATTACHMENT_READ | AccessFlags::COLOR_ATTACHMENT_WRITE,
            PipelineStage::COLOR_ATTACHMENT_OUTPUT,
        )
        .with_layout(ImageLayout::ColorAttachment)
    }

    /// State of a depth attachment being rendered to.
    pub fn depth_attachment() -> Self {
        Self::new(
            AccessFlags::DEPTH_STENCIL_ATTACHMENT_READ
                | AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
            PipelineStage::EARLY_FRAGMENT_TESTS | PipelineStage::LATE_FRAGMENT_TESTS,
        )
        .with_layout(ImageLayout::DepthStencilAttachment)
    }
}

/// Resource a barrier applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BarrierTarget {
    /// A range of a buffer.
    Buffer {
        /// Buffer handle.
        buffer: GpuBufferHandle,
        /// Byte offset of the range.
        offset: u64,
        /// Byte size of the range.
        size: u64,
    },
    /// All subresources of a texture.
    Texture {
        /// Texture handle.
        texture: GpuTextureHandle,
        /// Whether the texture has a depth aspect.
        depth: bool,
    },
}

/// A complete barrier ready to be recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PipelineBarrier {
    /// The resource being synchronized.
    pub target: BarrierTarget,
    /// Operation that must complete first.
    pub src: BarrierInfo,
    /// Operation that must wait.
    pub dst: BarrierInfo,
}

impl PipelineBarrier {
    /// Whether the barrier changes an image layout.
    pub fn is_layout_transition(&self) -> bool {
        matches!(self.target, BarrierTarget::Texture { .. }) && self.src.layout != self.dst.layout
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_detection() {
        assert!(AccessFlags::SHADER_WRITE.is_write());
        assert!((AccessFlags::SHADER_READ | AccessFlags::TRANSFER_WRITE).is_write());
        assert!(!AccessFlags::INDIRECT_COMMAND_READ.is_write());
        assert!(!AccessFlags::empty().is_write());
    }

    #[test]
    fn test_layout_transition() {
        let barrier = PipelineBarrier {
            target: BarrierTarget::Texture {
                texture: GpuTextureHandle::from_raw(1),
                depth: false,
            },
            src: BarrierInfo::NONE,
            dst: BarrierInfo::color_attachment(),
        };
        assert!(barrier.is_layout_transition());

        let buffer_barrier = PipelineBarrier {
            target: BarrierTarget::Buffer {
                buffer: GpuBufferHandle::from_raw(2),
                offset: 0,
                size: 64,
            },
            src: BarrierInfo::COMPUTE_WRITE,
            dst: BarrierInfo::INDIRECT_READ,
        };
        assert!(!buffer_barrier.is_layout_transition());
    }
}
