//! Renderer configuration.
//!
//! Capacities here size the per-frame GPU buffers and the descriptor pool.
//! The number of frames in flight is not configured here; it comes from the
//! backend's swapchain.

use crate::error::GraphicsError;
use crate::types::{Extent2d, TextureFormat};

/// Default maximum number of instances per frame.
pub const DEFAULT_MAX_INSTANCES: u32 = 16 * 1024;
/// Default maximum number of distinct meshes per frame.
pub const DEFAULT_MAX_MESHES: u32 = 1024;
/// Default maximum number of point lights.
pub const DEFAULT_MAX_POINT_LIGHTS: u32 = 256;
/// Default descriptor pool capacity in sets.
pub const DEFAULT_DESCRIPTOR_POOL_CAPACITY: u32 = 1024;

/// Configuration for a [`Renderer`](crate::Renderer) and its [`RenderContext`](crate::RenderContext).
///
/// # Example
///
/// ```
/// use redlilium_frame::RendererConfig;
///
/// let config = RendererConfig::new()
///     .with_max_instances(4096)
///     .with_render_target_size(1920, 1080);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct RendererConfig {
    /// Initial capacity of the per-instance buffers. They grow on demand.
    pub max_instances: u32,
    /// Initial capacity of the per-mesh draw argument buffers.
    pub max_meshes: u32,
    /// Capacity of the point light buffer.
    pub max_point_lights: u32,
    /// Number of descriptor sets the pool can hold.
    pub descriptor_pool_capacity: u32,
    /// Size of the color and depth render targets.
    pub render_target_size: Extent2d,
    /// Color render target format.
    pub color_format: TextureFormat,
    /// Depth render target format.
    pub depth_format: TextureFormat,
    /// Clear color of the main pass.
    pub clear_color: [f32; 4],
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            max_instances: DEFAULT_MAX_INSTANCES,
            max_meshes: DEFAULT_MAX_MESHES,
            max_point_lights: DEFAULT_MAX_POINT_LIGHTS,
            descriptor_pool_capacity: DEFAULT_DESCRIPTOR_POOL_CAPACITY,
            render_target_size: Extent2d::new(1280, 720),
            color_format: TextureFormat::Rgba16Float,
            depth_format: TextureFormat::Depth32Float,
            clear_color: [0.0, 0.0, 0.0, 1.0],
        }
    }
}

impl RendererConfig {
    /// Create a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the initial instance capacity.
    pub fn with_max_instances(mut self, count: u32) -> Self {
        self.max_instances = count;
        self
    }

    /// Set the initial mesh capacity.
    pub fn with_max_meshes(mut self, count: u32) -> Self {
        self.max_meshes = count;
        self
    }

    /// Set the point light capacity.
    pub fn with_max_point_lights(mut self, count: u32) -> Self {
        self.max_point_lights = count;
        self
    }

    /// Set the descriptor pool capacity.
    pub fn with_descriptor_pool_capacity(mut self, capacity: u32) -> Self {
        self.descriptor_pool_capacity = capacity;
        self
    }

    /// Set the render target size.
    pub fn with_render_target_size(mut self, width: u32, height: u32) -> Self {
        self.render_target_size = Extent2d::new(width, height);
        self
    }

    /// Set the color render target format.
    pub fn with_color_format(mut self, format: TextureFormat) -> Self {
        self.color_format = format;
        self
    }

    /// Set the depth render target format.
    pub fn with_depth_format(mut self, format: TextureFormat) -> Self {
        self.depth_format = format;
        self
    }

    /// Set the clear color.
    pub fn with_clear_color(mut self, color: [f32; 4]) -> Self {
        self.clear_color = color;
        self
    }

    /// Check the configuration for values the renderer cannot work with.
    pub fn validate(&self) -> Result<(), GraphicsError> {
        let capacities = [
            ("max_instances", self.max_instances),
            ("max_meshes", self.max_meshes),
            ("max_point_lights", self.max_point_lights),
            ("descriptor_pool_capacity", self.descriptor_pool_capacity),
        ];
        if let Some((name, _)) = capacities.iter().find(|(_, value)| *value == 0) {
            return Err(GraphicsError::InvalidParameter(format!(
                "{name} must be greater than zero"
            )));
        }
        if self.render_target_size.is_empty() {
            return Err(GraphicsError::InvalidParameter(
                "render target size must be non-zero".into(),
            ));
        }
        if self.color_format.is_depth_stencil() {
            return Err(GraphicsError::InvalidParameter(format!(
                "color format {:?} is a depth format",
                self.color_format
            )));
        }
        if !self.depth_format.is_depth_stencil() {
            return Err(GraphicsError::InvalidParameter(format!(
                "depth format {:?} has no depth aspect",
                self.depth_format
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(RendererConfig::default().validate().is_ok());
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let err = RendererConfig::new()
            .with_max_meshes(0)
            .validate()
            .unwrap_err();
        assert!(err.to_string().contains("max_meshes"));
    }

    #[test]
    fn test_formats_checked() {
        assert!(
            RendererConfig::new()
                .with_depth_format(TextureFormat::Rgba8Unorm)
                .validate()
                .is_err()
        );
        assert!(
            RendererConfig::new()
                .with_color_format(TextureFormat::Depth32Float)
                .validate()
                .is_err()
        );
        assert!(
            RendererConfig::new()
                .with_render_target_size(0, 10)
                .validate()
                .is_err()
        );
    }
}
