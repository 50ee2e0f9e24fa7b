//! Last known access state of buffers and textures.
//!
//! Barrier recording only needs the destination state from the caller. The
//! source side is whatever the resource was last transitioned to.

use std::collections::HashMap;

use crate::types::{
    BarrierInfo, BarrierTarget, GpuBufferHandle, GpuTextureHandle, PipelineBarrier,
};

/// Tracks `{access, stage, layout}` per resource.
#[derive(Debug, Default)]
pub struct ResourceStateTracker {
    buffers: HashMap<GpuBufferHandle, BarrierInfo>,
    textures: HashMap<GpuTextureHandle, BarrierInfo>,
}

impl ResourceStateTracker {
    /// Create an empty tracker. Unknown resources are in [`BarrierInfo::NONE`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Last known state of a buffer.
    pub fn buffer_state(&self, buffer: GpuBufferHandle) -> BarrierInfo {
        self.buffers
            .get(&buffer)
            .copied()
            .unwrap_or(BarrierInfo::NONE)
    }

    /// Last known state of a texture.
    pub fn texture_state(&self, texture: GpuTextureHandle) -> BarrierInfo {
        self.textures
            .get(&texture)
            .copied()
            .unwrap_or(BarrierInfo::NONE)
    }

    /// Move a buffer to `dst`, returning the barrier needed to get there.
    ///
    /// Read-after-read needs no barrier and yields `None`.
    pub fn transition_buffer(
        &mut self,
        buffer: GpuBufferHandle,
        offset: u64,
        size: u64,
        dst: BarrierInfo,
    ) -> Option<PipelineBarrier> {
        let src = self.buffers.insert(buffer, dst).unwrap_or(BarrierInfo::NONE);
        if !src.access.is_write() && !dst.access.is_write() {
            return None;
        }
        Some(PipelineBarrier {
            target: BarrierTarget::Buffer {
                buffer,
                offset,
                size,
            },
            src,
            dst,
        })
    }

    /// Move a texture to `dst`, returning the barrier needed to get there.
    pub fn transition_texture(
        &mut self,
        texture: GpuTextureHandle,
        depth: bool,
        dst: BarrierInfo,
    ) -> Option<PipelineBarrier> {
        let src = self
            .textures
            .insert(texture, dst)
            .unwrap_or(BarrierInfo::NONE);
        if src.layout == dst.layout && !src.access.is_write() && !dst.access.is_write() {
            return None;
        }
        Some(PipelineBarrier {
            target: BarrierTarget::Texture { texture, depth },
            src,
            dst,
        })
    }

    /// Forget a destroyed buffer.
    pub fn forget_buffer(&mut self, buffer: GpuBufferHandle) {
        self.buffers.remove(&buffer);
    }

    /// Forget a destroyed texture.
    pub fn forget_texture(&mut self, texture: GpuTextureHandle) {
        self.textures.remove(&texture);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AccessFlags, ImageLayout, PipelineStage};

    #[test]
    fn test_source_is_derived() {
        let mut states = ResourceStateTracker::new();
        let buffer = GpuBufferHandle::from_raw(1);

        states.transition_buffer(buffer, 0, 64, BarrierInfo::COMPUTE_WRITE);
        let barrier = states
            .transition_buffer(buffer, 0, 64, BarrierInfo::INDIRECT_READ)
            .unwrap();

        assert_eq!(barrier.src.access, AccessFlags::SHADER_WRITE);
        assert_eq!(barrier.src.stage, PipelineStage::COMPUTE_SHADER);
        assert_eq!(barrier.dst.access, AccessFlags::INDIRECT_COMMAND_READ);
        assert_eq!(barrier.dst.stage, PipelineStage::DRAW_INDIRECT);
        assert_eq!(states.buffer_state(buffer), BarrierInfo::INDIRECT_READ);
    }

    #[test]
    fn test_read_after_read_is_skipped() {
        let mut states = ResourceStateTracker::new();
        let buffer = GpuBufferHandle::from_raw(1);
        assert!(
            states
                .transition_buffer(buffer, 0, 4, BarrierInfo::INDIRECT_READ)
                .is_none()
        );
        assert!(
            states
                .transition_buffer(buffer, 0, 4, BarrierInfo::INDIRECT_READ)
                .is_none()
        );
    }

    #[test]
    fn test_texture_layout_change() {
        let mut states = ResourceStateTracker::new();
        let texture = GpuTextureHandle::from_raw(2);

        let barrier = states
            .transition_texture(texture, false, BarrierInfo::color_attachment())
            .unwrap();
        assert_eq!(barrier.src.layout, ImageLayout::Undefined);
        assert_eq!(barrier.dst.layout, ImageLayout::ColorAttachment);
        assert!(barrier.is_layout_transition());

        states.forget_texture(texture);
        assert_eq!(states.texture_state(texture), BarrierInfo::NONE);
    }
}
