//! GPU texture resource.

use crate::context::RenderContext;
use crate::error::GraphicsError;
use crate::types::{
    Extent2d, GpuObject, GpuTextureHandle, TextureDescriptor, TextureFormat, TextureUsage,
};

use super::ring_buffer::FrameResource;

/// Everything needed to create a [`Texture`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TextureSpecification {
    /// Debug label.
    pub label: String,
    /// Size in pixels.
    pub size: Extent2d,
    /// Pixel format.
    pub format: TextureFormat,
    /// Usage flags.
    pub usage: TextureUsage,
}

impl TextureSpecification {
    /// Create a texture specification.
    pub fn new(
        label: impl Into<String>,
        size: Extent2d,
        format: TextureFormat,
        usage: TextureUsage,
    ) -> Self {
        Self {
            label: label.into(),
            size,
            format,
            usage,
        }
    }

    /// A render target that can also be sampled afterwards.
    pub fn render_target(label: impl Into<String>, size: Extent2d, format: TextureFormat) -> Self {
        Self::new(
            label,
            size,
            format,
            TextureUsage::RENDER_ATTACHMENT | TextureUsage::TEXTURE_BINDING,
        )
    }
}

/// A GPU texture with a default view.
///
/// Textures with [`TextureUsage::RENDER_ATTACHMENT`] are tracked as render
/// targets, which outlive plain textures at shutdown.
#[derive(Debug)]
pub struct Texture {
    label: String,
    specification: TextureSpecification,
    handle: GpuTextureHandle,
}

impl Texture {
    /// Create a texture.
    pub fn create(
        ctx: &mut RenderContext,
        specification: &TextureSpecification,
    ) -> Result<Self, GraphicsError> {
        Self::create_labeled(ctx, specification, &specification.label)
    }

    fn create_labeled(
        ctx: &mut RenderContext,
        specification: &TextureSpecification,
        label: &str,
    ) -> Result<Self, GraphicsError> {
        if specification.size.is_empty() {
            return Err(GraphicsError::InvalidParameter(format!(
                "texture '{label}' has an empty extent"
            )));
        }

        let descriptor = TextureDescriptor::new_2d(
            specification.size.width,
            specification.size.height,
            specification.format,
            specification.usage,
        )
        .with_label(label);
        let handle = ctx.backend().create_texture(&descriptor)?;

        let texture = Self {
            label: label.to_string(),
            specification: specification.clone(),
            handle,
        };
        ctx.lifetimes().track(texture.object());
        Ok(texture)
    }

    /// Backend handle. Null after [`destroy`](Self::destroy).
    pub fn handle(&self) -> GpuTextureHandle {
        self.handle
    }

    /// Debug label.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Size in pixels.
    pub fn size(&self) -> Extent2d {
        self.specification.size
    }

    /// Pixel format.
    pub fn format(&self) -> TextureFormat {
        self.specification.format
    }

    /// Whether the texture is a color or depth attachment.
    pub fn is_render_target(&self) -> bool {
        self.specification
            .usage
            .contains(TextureUsage::RENDER_ATTACHMENT)
    }

    /// Whether the format has a depth aspect.
    pub fn is_depth(&self) -> bool {
        self.specification.format.is_depth_stencil()
    }

    /// The tracked object for this texture.
    pub fn object(&self) -> GpuObject {
        if self.is_render_target() {
            GpuObject::RenderTarget(self.handle)
        } else {
            GpuObject::Texture(self.handle)
        }
    }

    /// Retire the texture. Calling this more than once is a no-op.
    pub fn destroy(&mut self, ctx: &mut RenderContext) {
        if self.handle.is_null() {
            return;
        }
        ctx.lifetimes().retire(self.object());
        ctx.resources_mut().states_mut().forget_texture(self.handle);
        self.handle = GpuTextureHandle::NULL;
    }
}

impl FrameResource for Texture {
    type Specification = TextureSpecification;

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
