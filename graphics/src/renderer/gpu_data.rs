//! Per-instance GPU data.
//!
//! These structs are written into storage buffers indexed by
//! `first_instance + instance` and must match the shader side byte for byte.

use bytemuck::{Pod, Zeroable};
use glam::Mat4;

/// Model matrix of one instance.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct InstanceTransform {
    /// Column-major model matrix.
    pub model: [[f32; 4]; 4],
}

impl InstanceTransform {
    /// Size in bytes.
    pub const SIZE: u64 = std::mem::size_of::<Self>() as u64;

    /// Wrap a model matrix.
    pub fn from_matrix(model: Mat4) -> Self {
        Self {
            model: model.to_cols_array_2d(),
        }
    }
}

/// Shading parameters of one instance.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct InstanceRenderingInfo {
    /// Opacity in `[0, 1]`.
    pub opacity: f32,
    /// Non-zero if the instance casts shadows.
    pub shadows_visible: u32,
    /// Padding to 16 bytes.
    pub _pad: [u32; 2],
}

impl InstanceRenderingInfo {
    /// Size in bytes.
    pub const SIZE: u64 = std::mem::size_of::<Self>() as u64;

    /// Create shading info.
    pub fn new(opacity: f32, shadows_visible: bool) -> Self {
        Self {
            opacity,
            shadows_visible: shadows_visible as u32,
            _pad: [0; 2],
        }
    }
}

/// Push constants of the culling pass.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct CullPushConstants {
    /// Number of queued meshes (entries in the cull input buffer).
    pub mesh_count: u32,
}

static_assertions::const_assert_eq!(InstanceTransform::SIZE, 64);
static_assertions::const_assert_eq!(InstanceRenderingInfo::SIZE, 16);
static_assertions::const_assert_eq!(std::mem::size_of::<CullPushConstants>(), 4);
