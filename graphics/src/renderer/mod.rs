//! Frame-pipelined mesh renderer.
//!
//! The [`Renderer`] turns per-frame mesh submissions into one culling
//! dispatch and one indirect-count draw:
//!
//! ```text
//! begin_frame -> begin_scene -> render_mesh* -> end_scene -> end_frame
//!                   |                              |
//!            camera, frustum,             batch, upload instances,
//!            lights upload                cull dispatch, render pass,
//!                                         indirect-count draw
//! ```
//!
//! Pipelines and geometry are created by the caller and handed over at
//! construction. Everything the renderer writes per frame lives in ring
//! buffers, so the CPU never touches memory a frame in flight still reads.

mod batch;
mod culling;
mod frame;
mod gpu_data;

pub use batch::{BatchSummary, MeshQueue, QueuedMesh};
pub use culling::{CULL_INSTANCES_PER_GROUP, CULL_MESHES_PER_GROUP, dispatch_grid};
pub use frame::{CurrentFrame, FrameBuffer, FrameBufferBinding};
pub use gpu_data::{CullPushConstants, InstanceRenderingInfo, InstanceTransform};

use crate::config::RendererConfig;
use crate::context::RenderContext;
use crate::error::GraphicsError;
use crate::resources::Buffer;
use crate::scene::{Camera, LightManager, MeshComponent, TransformComponent};
use crate::types::{
    BarrierInfo, ClearValues, CommandBufferHandle, DrawIndexedIndirectArgs, Extent2d,
    GpuBufferHandle, GpuObject, PipelineHandle,
};
use crate::backend::RenderPassInfo;
use crate::{frame_mark, profile_function, profile_plot, profile_scope};

use frame::{FrameResources, RendererLayouts};

/// Buffers bound to the cull pipeline, by set slot.
const CULL_SETS: [FrameBuffer; 7] = [
    FrameBuffer::Camera,
    FrameBuffer::Frustum,
    FrameBuffer::Transforms,
    FrameBuffer::MeshIds,
    FrameBuffer::CullInput,
    FrameBuffer::CullOutput,
    FrameBuffer::CullCount,
];

/// Buffers bound to the mesh pipeline, by set slot.
const MESH_SETS: [FrameBuffer; 5] = [
    FrameBuffer::Camera,
    FrameBuffer::Frustum,
    FrameBuffer::Transforms,
    FrameBuffer::RenderingInfo,
    FrameBuffer::Lights,
];

/// Pipelines created by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RendererPipelines {
    /// Compute pipeline of the culling pass.
    pub cull: PipelineHandle,
    /// Graphics pipeline drawing meshes.
    pub mesh: PipelineHandle,
}

/// Shared vertex and index buffers all meshes are allocated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeometryBuffers {
    /// Vertex buffer.
    pub vertex: GpuBufferHandle,
    /// 32-bit index buffer.
    pub index: GpuBufferHandle,
}

/// Where the renderer is in the frame sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramePhase {
    /// Between frames.
    Idle,
    /// Frame begun, scene not yet begun.
    Recording,
    /// Accepting meshes.
    InScene,
    /// Draws recorded, frame not yet ended.
    SceneEnded,
}

impl FramePhase {
    fn name(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Recording => "recording",
            Self::InScene => "in scene",
            Self::SceneEnded => "scene ended",
        }
    }
}

/// Mesh renderer with GPU culling.
#[derive(Debug)]
pub struct Renderer {
    config: RendererConfig,
    pipelines: RendererPipelines,
    geometry: GeometryBuffers,
    frame: FrameResources,
    queue: MeshQueue,
    phase: FramePhase,
    command_buffer: Option<CommandBufferHandle>,
    last_summary: BatchSummary,
    current: Option<CurrentFrame>,
    shut_down: bool,
}

impl Renderer {
    /// Create the renderer's layouts and per-frame resources.
    ///
    /// The pipelines are tracked by the context from here on and destroyed at
    /// context shutdown.
    pub fn new(
        ctx: &mut RenderContext,
        config: RendererConfig,
        pipelines: RendererPipelines,
        geometry: GeometryBuffers,
    ) -> Result<Self, GraphicsError> {
        config.validate()?;

        let layouts = RendererLayouts::create(ctx)?;
        let frame = FrameResources::create(ctx, &config, &layouts)?;
        ctx.lifetimes().track(GpuObject::Pipeline(pipelines.cull));
        ctx.lifetimes().track(GpuObject::Pipeline(pipelines.mesh));

        log::info!(
            "Renderer created: {} instances, {} meshes, {} point lights, {}x{} targets",
            config.max_instances,
            config.max_meshes,
            config.max_point_lights,
            config.render_target_size.width,
            config.render_target_size.height
        );

        Ok(Self {
            config,
            pipelines,
            geometry,
            frame,
            queue: MeshQueue::new(),
            phase: FramePhase::Idle,
            command_buffer: None,
            last_summary: BatchSummary::default(),
            current: None,
            shut_down: false,
        })
    }

    fn expect_phase(&self, expected: FramePhase, operation: &'static str) -> Result<(), GraphicsError> {
        if self.phase == expected {
            return Ok(());
        }
        log::error!(
            "Renderer::{} called while {}",
            operation,
            self.phase.name()
        );
        Err(GraphicsError::InvalidFrameState {
            operation,
            state: self.phase.name(),
        })
    }

    fn recording(&self) -> Result<CommandBufferHandle, GraphicsError> {
        self.command_buffer
            .ok_or_else(|| GraphicsError::Internal("no command buffer is recording".into()))
    }

    /// Start a frame: wait for its slot, advance the rings, begin recording.
    pub fn begin_frame(&mut self, ctx: &mut RenderContext) -> Result<(), GraphicsError> {
        profile_function!();
        self.expect_phase(FramePhase::Idle, "begin_frame")?;

        ctx.begin_frame()?;
        let cmd = match self
            .frame
            .acquire(ctx)
            .and_then(|()| ctx.backend().begin_command_buffer())
        {
            Ok(cmd) => cmd,
            Err(err) => {
                log::error!("Frame {} could not start recording: {}", ctx.frame_number(), err);
                ctx.abandon_frame();
                return Err(err);
            }
        };
        ctx.lifetimes().track(GpuObject::CommandBuffer(cmd));

        self.command_buffer = Some(cmd);
        self.current = Some(self.frame.current()?);
        self.phase = FramePhase::Recording;
        Ok(())
    }

    /// Upload the camera, its frustum and the lights for this frame.
    pub fn begin_scene(
        &mut self,
        ctx: &mut RenderContext,
        camera: &Camera,
        lights: &LightManager,
    ) -> Result<(), GraphicsError> {
        profile_function!();
        self.expect_phase(FramePhase::Recording, "begin_scene")?;

        self.frame
            .buffer(FrameBuffer::Camera)?
            .set_data(ctx, bytemuck::bytes_of(&camera.data()), 0)?;
        self.frame
            .buffer(FrameBuffer::Frustum)?
            .set_data(ctx, bytemuck::bytes_of(&camera.frustum()), 0)?;

        let light_size = LightManager::buffer_size(lights.point_light_count());
        if self
            .frame
            .ring_mut(FrameBuffer::Lights)
            .ensure_current_capacity(ctx, light_size)?
        {
            self.current = Some(self.frame.current()?);
        }
        lights.write_to(ctx, self.frame.buffer(FrameBuffer::Lights)?)?;

        self.phase = FramePhase::InScene;
        Ok(())
    }

    /// Queue a mesh instance. Invisible components and unloaded meshes are
    /// skipped.
    pub fn render_mesh(
        &mut self,
        component: &MeshComponent,
        transform: &TransformComponent,
    ) -> Result<(), GraphicsError> {
        self.expect_phase(FramePhase::InScene, "render_mesh")?;
        if let Some(mesh) = component.drawable_mesh() {
            self.queue.push(mesh, component, transform);
        }
        Ok(())
    }

    /// Upload the queued instances and record culling and drawing.
    pub fn end_scene(&mut self, ctx: &mut RenderContext) -> Result<BatchSummary, GraphicsError> {
        profile_function!();
        self.expect_phase(FramePhase::InScene, "end_scene")?;

        let summary = self.process_queued_meshes(ctx)?;
        self.phase = FramePhase::SceneEnded;
        Ok(summary)
    }

    /// Submit the frame.
    pub fn end_frame(&mut self, ctx: &mut RenderContext) -> Result<(), GraphicsError> {
        profile_function!();
        self.expect_phase(FramePhase::SceneEnded, "end_frame")?;

        let cmd = self.recording()?;
        ctx.end_frame(cmd)?;
        self.command_buffer = None;
        self.queue.clear();
        self.phase = FramePhase::Idle;
        frame_mark!();
        Ok(())
    }

    fn process_queued_meshes(
        &mut self,
        ctx: &mut RenderContext,
    ) -> Result<BatchSummary, GraphicsError> {
        let cmd = self.recording()?;
        let summary = self.queue.assign_instance_offsets();

        {
            profile_scope!("upload instances");
            self.ensure_instance_capacity(ctx, &summary)?;
            self.upload_instances(ctx)?;
        }

        let current = self.frame.current()?;
        self.current = Some(current);
        self.record_cull(ctx, cmd, &current, &summary)?;
        self.record_draw(ctx, cmd, &current, &summary)?;

        log::trace!(
            "Frame {}: {} meshes, {} instances",
            ctx.frame_number(),
            summary.mesh_count,
            summary.instance_count
        );
        profile_plot!("instances", summary.instance_count as f64);
        self.last_summary = summary;
        Ok(summary)
    }

    fn ensure_instance_capacity(
        &mut self,
        ctx: &mut RenderContext,
        summary: &BatchSummary,
    ) -> Result<(), GraphicsError> {
        let instances = summary.instance_count as u64;
        let meshes = summary.mesh_count as u64;
        for (which, count) in [
            (FrameBuffer::Transforms, instances),
            (FrameBuffer::RenderingInfo, instances),
            (FrameBuffer::MeshIds, instances),
            (FrameBuffer::CullInput, meshes),
            (FrameBuffer::CullOutput, meshes),
        ] {
            self.frame
                .ring_mut(which)
                .ensure_current_capacity(ctx, which.element_size() * count)?;
        }
        Ok(())
    }

    fn upload_instances(&self, ctx: &RenderContext) -> Result<(), GraphicsError> {
        let transforms = self.frame.buffer(FrameBuffer::Transforms)?;
        let infos = self.frame.buffer(FrameBuffer::RenderingInfo)?;
        let mesh_ids = self.frame.buffer(FrameBuffer::MeshIds)?;
        let cull_input = self.frame.buffer(FrameBuffer::CullInput)?;

        for (position, queued) in self.queue.iter().enumerate() {
            let first = queued.draw_args().first_instance as u64;
            transforms.set_data(
                ctx,
                bytemuck::cast_slice(queued.transforms()),
                first * InstanceTransform::SIZE,
            )?;
            infos.set_data(
                ctx,
                bytemuck::cast_slice(queued.rendering_infos()),
                first * InstanceRenderingInfo::SIZE,
            )?;
            mesh_ids.set_data(
                ctx,
                bytemuck::cast_slice(queued.mesh_ids()),
                first * FrameBuffer::MeshIds.element_size(),
            )?;
            cull_input.set_data(
                ctx,
                bytemuck::bytes_of(queued.draw_args()),
                position as u64 * DrawIndexedIndirectArgs::SIZE,
            )?;
        }
        Ok(())
    }

    fn bind_sets(
        &self,
        ctx: &RenderContext,
        cmd: CommandBufferHandle,
        pipeline: PipelineHandle,
        current: &CurrentFrame,
        sets: &[FrameBuffer],
    ) -> Result<(), GraphicsError> {
        for (slot, which) in sets.iter().enumerate() {
            ctx.resources()
                .bind_resource_set(cmd, pipeline, slot as u32, current.buffer(*which).set)?;
        }
        Ok(())
    }

    fn record_cull(
        &self,
        ctx: &mut RenderContext,
        cmd: CommandBufferHandle,
        current: &CurrentFrame,
        summary: &BatchSummary,
    ) -> Result<(), GraphicsError> {
        profile_scope!("record cull");
        let output = current.buffer(FrameBuffer::CullOutput);
        let count = current.buffer(FrameBuffer::CullCount);

        let count_buffer: &Buffer = self.frame.buffer(FrameBuffer::CullCount)?;
        count_buffer.clear(ctx, cmd);
        // The cull shader increments the count atomically, so it reads the zeroed value.
        ctx.resources_mut().transition_buffer(
            cmd,
            count.handle,
            count.size,
            BarrierInfo::COMPUTE_READ_WRITE,
        );
        ctx.resources_mut()
            .transition_buffer(cmd, output.handle, output.size, BarrierInfo::COMPUTE_WRITE);

        ctx.backend().cmd_bind_pipeline(cmd, self.pipelines.cull);
        self.bind_sets(ctx, cmd, self.pipelines.cull, current, &CULL_SETS)?;
        let constants = CullPushConstants {
            mesh_count: summary.mesh_count,
        };
        ctx.backend()
            .cmd_push_constants(cmd, self.pipelines.cull, 0, bytemuck::bytes_of(&constants));
        let [x, y, z] = dispatch_grid(summary.mesh_count, summary.max_instance_count);
        ctx.backend().cmd_dispatch(cmd, x, y, z);

        ctx.resources_mut()
            .transition_buffer(cmd, output.handle, output.size, BarrierInfo::INDIRECT_READ);
        ctx.resources_mut()
            .transition_buffer(cmd, count.handle, count.size, BarrierInfo::INDIRECT_READ);
        Ok(())
    }

    fn record_draw(
        &self,
        ctx: &mut RenderContext,
        cmd: CommandBufferHandle,
        current: &CurrentFrame,
        summary: &BatchSummary,
    ) -> Result<(), GraphicsError> {
        profile_scope!("record draw");
        ctx.resources_mut().transition_texture(
            cmd,
            current.color,
            false,
            BarrierInfo::color_attachment(),
        );
        ctx.resources_mut().transition_texture(
            cmd,
            current.depth,
            true,
            BarrierInfo::depth_attachment(),
        );

        let backend = ctx.backend();
        backend.cmd_begin_render_pass(
            cmd,
            &RenderPassInfo {
                color: current.color,
                depth: Some(current.depth),
                extent: self.config.render_target_size,
                clear: ClearValues::with_color(self.config.clear_color),
            },
        );
        backend.cmd_bind_pipeline(cmd, self.pipelines.mesh);
        self.bind_sets(ctx, cmd, self.pipelines.mesh, current, &MESH_SETS)?;

        let backend = ctx.backend();
        backend.cmd_bind_vertex_buffer(cmd, self.geometry.vertex, 0);
        backend.cmd_bind_index_buffer(cmd, self.geometry.index, 0);
        backend.cmd_draw_indexed_indirect_count(
            cmd,
            current.buffer(FrameBuffer::CullOutput).handle,
            0,
            current.buffer(FrameBuffer::CullCount).handle,
            0,
            summary.mesh_count,
            DrawIndexedIndirectArgs::SIZE as u32,
        );
        backend.cmd_end_render_pass(cmd);
        Ok(())
    }

    /// Recreate the render targets at a new size. Only allowed between frames.
    pub fn resize(
        &mut self,
        ctx: &mut RenderContext,
        width: u32,
        height: u32,
    ) -> Result<(), GraphicsError> {
        self.expect_phase(FramePhase::Idle, "resize")?;
        let size = Extent2d::new(width, height);
        if size.is_empty() {
            return Err(GraphicsError::InvalidParameter(format!(
                "cannot resize render targets to {width}x{height}"
            )));
        }
        if size == self.config.render_target_size {
            return Ok(());
        }

        let mut config = self.config.clone();
        config.render_target_size = size;
        self.frame.recreate_targets(ctx, &config)?;
        self.config = config;
        // The snapshot still names the retired targets.
        self.current = None;
        log::info!("Render targets resized to {}x{}", width, height);
        Ok(())
    }

    /// Retire every per-frame resource. Calling this more than once is a no-op.
    ///
    /// Objects are destroyed once the context releases them.
    pub fn shutdown(&mut self, ctx: &mut RenderContext) {
        if self.shut_down {
            return;
        }
        self.frame.shutdown(ctx);
        self.queue.clear();
        self.command_buffer = None;
        self.current = None;
        self.phase = FramePhase::Idle;
        self.shut_down = true;
        log::info!("Renderer shut down");
    }

    /// Current phase.
    pub fn phase(&self) -> FramePhase {
        self.phase
    }

    /// Totals of the last processed scene.
    pub fn last_summary(&self) -> BatchSummary {
        self.last_summary
    }

    /// Meshes queued in the current scene.
    pub fn queue(&self) -> &MeshQueue {
        &self.queue
    }

    /// Configuration.
    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    /// Pipelines.
    pub fn pipelines(&self) -> RendererPipelines {
        self.pipelines
    }

    /// Handles of the frame being recorded, or of the last submitted frame
    /// until the next [`begin_frame`](Self::begin_frame). Cleared by
    /// [`resize`](Self::resize) and [`shutdown`](Self::shutdown).
    pub fn current_frame(&self) -> Option<CurrentFrame> {
        self.current
    }

    /// This frame's instance of a buffer.
    pub fn frame_buffer(&self, which: FrameBuffer) -> Option<&Buffer> {
        self.frame.buffer(which).ok()
    }

    /// Command buffer being recorded, if in a frame.
    pub fn command_buffer(&self) -> Option<CommandBufferHandle> {
        self.command_buffer
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use glam::Vec3;

    use super::*;
    use crate::backend::PipelineBindPoint;
    use crate::backend::dummy::{DummyBackend, RecordedCommand};
    use crate::backend::GpuBackend;
    use crate::scene::{Mesh, MeshAllocation, MeshId};
    use crate::types::{
        AccessFlags, BarrierTarget, BufferDescriptor, BufferUsage, PipelineBarrier,
    };

    struct Fixture {
        backend: Arc<DummyBackend>,
        ctx: RenderContext,
        renderer: Renderer,
    }

    fn fixture(config: RendererConfig) -> Fixture {
        let backend = Arc::new(DummyBackend::with_frame_count(2));
        let mut ctx = RenderContext::new(backend.clone(), &config).unwrap();
        let pipelines = RendererPipelines {
            cull: backend.create_pipeline("cull", PipelineBindPoint::Compute),
            mesh: backend.create_pipeline("mesh", PipelineBindPoint::Graphics),
        };
        let geometry = GeometryBuffers {
            vertex: backend
                .create_buffer(&BufferDescriptor::new(1024, BufferUsage::VERTEX))
                .unwrap(),
            index: backend
                .create_buffer(&BufferDescriptor::new(1024, BufferUsage::INDEX))
                .unwrap(),
        };
        let renderer = Renderer::new(&mut ctx, config, pipelines, geometry).unwrap();
        Fixture {
            backend,
            ctx,
            renderer,
        }
    }

    fn camera() -> Camera {
        Camera::perspective(1.0, 16.0 / 9.0, 0.1, 100.0).looking_at(
            Vec3::new(0.0, 0.0, 5.0),
            Vec3::ZERO,
            Vec3::Y,
        )
    }

    fn mesh(id: u32) -> Arc<Mesh> {
        Mesh::loaded(
            MeshId(id),
            format!("mesh {id}"),
            MeshAllocation::new(id * 36, 36),
            MeshAllocation::new(id * 24, 24),
        )
    }

    fn render_frame(f: &mut Fixture, submissions: &[(Arc<Mesh>, usize)]) -> BatchSummary {
        let lights = LightManager::new(4);
        f.renderer.begin_frame(&mut f.ctx).unwrap();
        f.renderer.begin_scene(&mut f.ctx, &camera(), &lights).unwrap();
        for (mesh, count) in submissions {
            let component = MeshComponent::new(mesh.clone());
            for i in 0..*count {
                f.renderer
                    .render_mesh(
                        &component,
                        &TransformComponent::from_translation(Vec3::new(i as f32, 0.0, 0.0)),
                    )
                    .unwrap();
            }
        }
        let summary = f.renderer.end_scene(&mut f.ctx).unwrap();
        f.renderer.end_frame(&mut f.ctx).unwrap();
        summary
    }

    #[test]
    fn test_phase_order_enforced() {
        let mut f = fixture(RendererConfig::default());
        assert_eq!(
            f.renderer.end_scene(&mut f.ctx).unwrap_err(),
            GraphicsError::InvalidFrameState {
                operation: "end_scene",
                state: "idle"
            }
        );
        f.renderer.begin_frame(&mut f.ctx).unwrap();
        assert!(matches!(
            f.renderer.render_mesh(&MeshComponent::default(), &TransformComponent::IDENTITY),
            Err(GraphicsError::InvalidFrameState {
                state: "recording",
                ..
            })
        ));
        assert!(f.renderer.end_frame(&mut f.ctx).is_err());
        assert!(f.renderer.resize(&mut f.ctx, 64, 64).is_err());
    }

    #[test]
    fn test_empty_scene_still_dispatches() {
        let mut f = fixture(RendererConfig::default());
        let summary = render_frame(&mut f, &[]);
        assert_eq!(summary, BatchSummary::default());

        let commands = f.backend.last_submitted_commands();
        assert!(commands.contains(&RecordedCommand::Dispatch { x: 0, y: 0, z: 1 }));
        assert!(commands.iter().any(|c| matches!(
            c,
            RecordedCommand::DrawIndexedIndirectCount {
                max_draw_count: 0,
                stride: 20,
                ..
            }
        )));
    }

    #[test]
    fn test_cull_dispatch_follows_batch() {
        let mut f = fixture(RendererConfig::default());
        let summary = render_frame(&mut f, &[(mesh(1), 3), (mesh(2), 5)]);
        assert_eq!(summary.max_instance_count, 5);

        let commands = f.backend.last_submitted_commands();
        assert!(commands.contains(&RecordedCommand::Dispatch { x: 1, y: 2, z: 1 }));
        assert!(commands.contains(&RecordedCommand::PushConstants {
            pipeline: f.renderer.pipelines().cull,
            offset: 0,
            data: 2u32.to_le_bytes().to_vec(),
        }));
    }

    #[test]
    fn test_invisible_meshes_skipped() {
        let mut f = fixture(RendererConfig::default());
        let lights = LightManager::new(1);
        f.renderer.begin_frame(&mut f.ctx).unwrap();
        f.renderer.begin_scene(&mut f.ctx, &camera(), &lights).unwrap();

        let hidden = MeshComponent::new(mesh(1)).with_visible(false);
        f.renderer
            .render_mesh(&hidden, &TransformComponent::IDENTITY)
            .unwrap();
        f.renderer
            .render_mesh(&MeshComponent::default(), &TransformComponent::IDENTITY)
            .unwrap();
        assert!(f.renderer.queue().is_empty());
    }

    #[test]
    fn test_instance_buffers_grow() {
        let config = RendererConfig::default()
            .with_max_instances(2)
            .with_max_meshes(1);
        let mut f = fixture(config);
        let summary = render_frame(&mut f, &[(mesh(1), 3), (mesh(2), 1)]);
        assert_eq!(summary.instance_count, 4);
        assert!(f.ctx.lifetimes().pending_count() > 0);
    }

    #[test]
    fn test_count_buffer_readable_by_cull_shader() {
        let mut f = fixture(RendererConfig::default());
        render_frame(&mut f, &[(mesh(1), 2)]);
        let count = f
            .renderer
            .current_frame()
            .unwrap()
            .buffer(FrameBuffer::CullCount)
            .handle;

        let barriers: Vec<PipelineBarrier> = f
            .backend
            .last_submitted_commands()
            .into_iter()
            .filter_map(|c| match c {
                RecordedCommand::Barrier(b) => Some(b),
                _ => None,
            })
            .filter(|b| matches!(b.target, BarrierTarget::Buffer { buffer, .. } if buffer == count))
            .collect();

        let after_fill = barriers
            .iter()
            .find(|b| b.src.access == AccessFlags::TRANSFER_WRITE)
            .unwrap();
        assert!(after_fill.dst.access.contains(AccessFlags::SHADER_READ));
        assert!(after_fill.dst.access.contains(AccessFlags::SHADER_WRITE));

        let after_cull = barriers.last().unwrap();
        assert!(after_cull.src.access.contains(AccessFlags::SHADER_WRITE));
        assert_eq!(after_cull.dst.access, AccessFlags::INDIRECT_COMMAND_READ);
    }

    #[test]
    fn test_failed_begin_frame_recovers() {
        let mut f = fixture(RendererConfig::default());
        f.backend.fail_next_command_buffer();
        assert_eq!(
            f.renderer.begin_frame(&mut f.ctx).unwrap_err(),
            GraphicsError::OutOfMemory
        );
        assert!(!f.ctx.is_in_frame());
        assert_eq!(f.renderer.phase(), FramePhase::Idle);

        let summary = render_frame(&mut f, &[(mesh(1), 1)]);
        assert_eq!(summary.instance_count, 1);
    }

    #[test]
    fn test_snapshot_kept_until_next_frame() {
        let mut f = fixture(RendererConfig::default());
        assert!(f.renderer.current_frame().is_none());
        render_frame(&mut f, &[]);
        assert!(f.renderer.current_frame().is_some());

        f.renderer.resize(&mut f.ctx, 320, 200).unwrap();
        assert!(f.renderer.current_frame().is_none());
    }

    #[test]
    fn test_resize_replaces_targets() {
        let mut f = fixture(RendererConfig::default());
        render_frame(&mut f, &[]);
        f.renderer.resize(&mut f.ctx, 640, 480).unwrap();
        assert_eq!(f.renderer.config().render_target_size, Extent2d::new(640, 480));
        assert!(f.renderer.resize(&mut f.ctx, 0, 480).is_err());

        f.renderer.begin_frame(&mut f.ctx).unwrap();
        let color = f.renderer.current_frame().unwrap().color;
        assert_eq!(f.backend.texture_descriptor(color).unwrap().size.width, 640);
    }

    #[test]
    fn test_shutdown_is_idempotent() {
        let mut f = fixture(RendererConfig::default());
        f.renderer.shutdown(&mut f.ctx);
        f.renderer.shutdown(&mut f.ctx);
        f.ctx.shutdown().unwrap();
        assert_eq!(f.backend.live_texture_count(), 0);
        assert!(
            f.backend
                .destroyed()
                .contains(&GpuObject::Pipeline(f.renderer.pipelines().mesh))
        );
    }
}
