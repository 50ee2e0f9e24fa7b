//! Common types and descriptors for graphics resources.
//!
//! This module contains handles, format enums, usage flags, barrier
//! descriptions and descriptor structs used throughout the graphics system.

mod barrier;
mod buffer;
mod common;
mod handles;
mod texture;

pub use barrier::{
    AccessFlags, BarrierInfo, BarrierTarget, ImageLayout, PipelineBarrier, PipelineStage,
};
pub use buffer::{BufferDescriptor, BufferKind, BufferUsage, DrawIndexedIndirectArgs};
pub use common::{ClearValues, Extent2d};
pub use handles::{
    CommandBufferHandle, DescriptorSetHandle, GpuBufferHandle, GpuObject, GpuTextureHandle,
    LayoutHandle, PipelineHandle,
};
pub use texture::{TextureDescriptor, TextureFormat, TextureUsage};
