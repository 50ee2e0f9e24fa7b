//! Per-frame GPU resources of the renderer.
//!
//! Each [`FrameBuffer`] is a ring of host-mapped buffers, one per frame in
//! flight, each with its own resource set. The color and depth targets are
//! rings of render targets.

use crate::config::RendererConfig;
use crate::context::RenderContext;
use crate::descriptors::{LayoutIndex, ResourceLayout, ResourceSetIndex, ShaderStage};
use crate::error::GraphicsError;
use crate::resources::{Buffer, BufferSpecification, RingBuffer, Texture, TextureSpecification};
use crate::scene::{CameraData, Frustum, LightManager};
use crate::types::{BufferKind, DrawIndexedIndirectArgs, Extent2d, GpuBufferHandle, GpuTextureHandle};

use super::gpu_data::{InstanceRenderingInfo, InstanceTransform};

/// The renderer's per-frame buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameBuffer {
    /// Camera uniform.
    Camera,
    /// Frustum planes.
    Frustum,
    /// Light header and point lights.
    Lights,
    /// Per-instance model matrices.
    Transforms,
    /// Per-instance shading info.
    RenderingInfo,
    /// Per-instance mesh ids.
    MeshIds,
    /// One draw record per queued mesh.
    CullInput,
    /// Draw records of visible instances, written by culling.
    CullOutput,
    /// Number of draws in the cull output.
    CullCount,
}

impl FrameBuffer {
    /// All buffers, in storage order.
    pub const ALL: [Self; 9] = [
        Self::Camera,
        Self::Frustum,
        Self::Lights,
        Self::Transforms,
        Self::RenderingInfo,
        Self::MeshIds,
        Self::CullInput,
        Self::CullOutput,
        Self::CullCount,
    ];

    /// Debug label of the ring.
    pub fn label(self) -> &'static str {
        match self {
            Self::Camera => "camera",
            Self::Frustum => "frustum",
            Self::Lights => "lights",
            Self::Transforms => "instance transforms",
            Self::RenderingInfo => "instance rendering info",
            Self::MeshIds => "instance mesh ids",
            Self::CullInput => "cull input",
            Self::CullOutput => "cull output",
            Self::CullCount => "cull count",
        }
    }

    fn kind(self) -> BufferKind {
        match self {
            Self::Camera | Self::Frustum => BufferKind::Uniform,
            Self::Lights | Self::Transforms | Self::RenderingInfo | Self::MeshIds => {
                BufferKind::Storage
            }
            Self::CullInput | Self::CullOutput | Self::CullCount => BufferKind::Indirect,
        }
    }

    /// Size of one element: an instance, a mesh, or the whole buffer.
    pub fn element_size(self) -> u64 {
        match self {
            Self::Camera => std::mem::size_of::<CameraData>() as u64,
            Self::Frustum => std::mem::size_of::<Frustum>() as u64,
            Self::Lights => LightManager::buffer_size(1),
            Self::Transforms => InstanceTransform::SIZE,
            Self::RenderingInfo => InstanceRenderingInfo::SIZE,
            Self::MeshIds | Self::CullCount => std::mem::size_of::<u32>() as u64,
            Self::CullInput | Self::CullOutput => DrawIndexedIndirectArgs::SIZE,
        }
    }

    fn initial_size(self, config: &RendererConfig) -> u64 {
        match self {
            Self::Camera | Self::Frustum | Self::CullCount => self.element_size(),
            Self::Lights => LightManager::buffer_size(config.max_point_lights),
            Self::Transforms | Self::RenderingInfo | Self::MeshIds => {
                self.element_size() * config.max_instances as u64
            }
            Self::CullInput | Self::CullOutput => self.element_size() * config.max_meshes as u64,
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// Layouts used by the renderer's resource sets.
#[derive(Debug, Clone, Copy)]
pub(crate) struct RendererLayouts {
    uniform: LayoutIndex,
    storage: LayoutIndex,
    compute_storage: LayoutIndex,
}

impl RendererLayouts {
    pub(crate) fn create(ctx: &mut RenderContext) -> Result<Self, GraphicsError> {
        let resources = ctx.resources_mut();
        Ok(Self {
            uniform: resources
                .create_layout(&ResourceLayout::new().with_uniform_buffer(ShaderStage::all()))?,
            storage: resources
                .create_layout(&ResourceLayout::new().with_storage_buffer(ShaderStage::all()))?,
            compute_storage: resources.create_layout(
                &ResourceLayout::new().with_storage_buffer(ShaderStage::COMPUTE),
            )?,
        })
    }

    fn layout_for(&self, buffer: FrameBuffer) -> LayoutIndex {
        match buffer.kind() {
            BufferKind::Uniform => self.uniform,
            BufferKind::Indirect => self.compute_storage,
            _ => self.storage,
        }
    }
}

/// A frame buffer as seen by this frame's commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameBufferBinding {
    /// Backend handle of the current instance.
    pub handle: GpuBufferHandle,
    /// Resource set of the current instance.
    pub set: ResourceSetIndex,
    /// Size of the current instance.
    pub size: u64,
}

/// Handles of this frame's instances. Valid until the frame ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurrentFrame {
    buffers: [FrameBufferBinding; FrameBuffer::ALL.len()],
    /// Color render target.
    pub color: GpuTextureHandle,
    /// Depth render target.
    pub depth: GpuTextureHandle,
}

impl CurrentFrame {
    /// Binding of one of the frame buffers.
    pub fn buffer(&self, buffer: FrameBuffer) -> FrameBufferBinding {
        self.buffers[buffer.index()]
    }
}

/// Rings of all per-frame resources.
#[derive(Debug)]
pub(crate) struct FrameResources {
    buffers: Vec<RingBuffer<Buffer>>,
    color: RingBuffer<Texture>,
    depth: RingBuffer<Texture>,
}

impl FrameResources {
    pub(crate) fn create(
        ctx: &mut RenderContext,
        config: &RendererConfig,
        layouts: &RendererLayouts,
    ) -> Result<Self, GraphicsError> {
        let mut buffers: Vec<RingBuffer<Buffer>> = Vec::with_capacity(FrameBuffer::ALL.len());
        for which in FrameBuffer::ALL {
            let specification =
                BufferSpecification::new(which.label(), which.initial_size(config), which.kind())
                    .with_binding(layouts.layout_for(which), 0);
            match RingBuffer::create(ctx, &specification) {
                Ok(ring) => buffers.push(ring),
                Err(e) => {
                    for ring in &mut buffers {
                        ring.shutdown(ctx);
                    }
                    return Err(e);
                }
            }
        }

        let (color, depth) = match Self::create_targets(ctx, config) {
            Ok(targets) => targets,
            Err(e) => {
                for ring in &mut buffers {
                    ring.shutdown(ctx);
                }
                return Err(e);
            }
        };

        Ok(Self {
            buffers,
            color,
            depth,
        })
    }

    fn create_targets(
        ctx: &mut RenderContext,
        config: &RendererConfig,
    ) -> Result<(RingBuffer<Texture>, RingBuffer<Texture>), GraphicsError> {
        let size: Extent2d = config.render_target_size;
        let mut color = RingBuffer::create(
            ctx,
            &TextureSpecification::render_target("color target", size, config.color_format),
        )?;
        match RingBuffer::create(
            ctx,
            &TextureSpecification::render_target("depth target", size, config.depth_format),
        ) {
            Ok(depth) => Ok((color, depth)),
            Err(e) => {
                color.shutdown(ctx);
                Err(e)
            }
        }
    }

    /// Advance every ring to this frame's instance.
    pub(crate) fn acquire(&mut self, ctx: &RenderContext) -> Result<(), GraphicsError> {
        for ring in &mut self.buffers {
            ring.acquire_next(ctx)?;
        }
        self.color.acquire_next(ctx)?;
        self.depth.acquire_next(ctx)?;
        Ok(())
    }

    pub(crate) fn ring_mut(&mut self, buffer: FrameBuffer) -> &mut RingBuffer<Buffer> {
        &mut self.buffers[buffer.index()]
    }

    /// This frame's instance of a buffer.
    pub(crate) fn buffer(&self, buffer: FrameBuffer) -> Result<&Buffer, GraphicsError> {
        self.buffers[buffer.index()]
            .current()
            .ok_or_else(|| Self::shut_down(buffer.label()))
    }

    /// Snapshot of this frame's handles.
    pub(crate) fn current(&self) -> Result<CurrentFrame, GraphicsError> {
        let mut buffers = [FrameBufferBinding {
            handle: GpuBufferHandle::NULL,
            set: ResourceSetIndex(0),
            size: 0,
        }; FrameBuffer::ALL.len()];
        for which in FrameBuffer::ALL {
            let buffer = self.buffer(which)?;
            let set = buffer.resource_set().ok_or_else(|| {
                GraphicsError::Internal(format!("frame buffer '{}' has no resource set", which.label()))
            })?;
            buffers[which.index()] = FrameBufferBinding {
                handle: buffer.handle(),
                set,
                size: buffer.size(),
            };
        }
        let color = self
            .color
            .current()
            .ok_or_else(|| Self::shut_down("color target"))?;
        let depth = self
            .depth
            .current()
            .ok_or_else(|| Self::shut_down("depth target"))?;

        Ok(CurrentFrame {
            buffers,
            color: color.handle(),
            depth: depth.handle(),
        })
    }

    /// Replace the render target rings.
    pub(crate) fn recreate_targets(
        &mut self,
        ctx: &mut RenderContext,
        config: &RendererConfig,
    ) -> Result<(), GraphicsError> {
        let (color, depth) = Self::create_targets(ctx, config)?;
        self.color.shutdown(ctx);
        self.depth.shutdown(ctx);
        self.color = color;
        self.depth = depth;
        Ok(())
    }

    pub(crate) fn shutdown(&mut self, ctx: &mut RenderContext) {
        for ring in &mut self.buffers {
            ring.shutdown(ctx);
        }
        self.color.shutdown(ctx);
        self.depth.shutdown(ctx);
    }

    fn shut_down(label: &str) -> GraphicsError {
        GraphicsError::InvalidParameter(format!("frame resource '{label}' is shut down"))
    }
}
