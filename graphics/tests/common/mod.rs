//! Shared infrastructure for the frame integration tests.
//!
//! Everything runs on the recording dummy backend, which applies buffer fills
//! and writes on submit so the tests can read results back.

#![allow(dead_code)]

use std::sync::Arc;

use glam::Vec3;

use redlilium_frame::backend::PipelineBindPoint;
use redlilium_frame::types::{BufferDescriptor, BufferUsage, CommandBufferHandle};
use redlilium_frame::{
    Camera, DummyBackend, GeometryBuffers, GpuBackend, GpuObject, Mesh, MeshAllocation, MeshId,
    RenderContext, Renderer, RendererConfig, RendererPipelines,
};

/// Route `log` output through the test harness.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A dummy backend and a context over it.
pub struct TestContext {
    pub backend: Arc<DummyBackend>,
    pub ctx: RenderContext,
}

impl TestContext {
    /// Create a context with `frames` frames in flight.
    pub fn new(frames: u32) -> Self {
        Self::with_config(frames, &RendererConfig::default())
    }

    /// Create a context with a specific configuration.
    pub fn with_config(frames: u32, config: &RendererConfig) -> Self {
        init_logging();
        let backend = Arc::new(DummyBackend::with_frame_count(frames));
        let ctx = RenderContext::new(backend.clone(), config).expect("context creation failed");
        Self { backend, ctx }
    }

    /// Begin a tracked command buffer, as the renderer does for a frame.
    pub fn frame_command_buffer(&self) -> CommandBufferHandle {
        let cmd = self
            .backend
            .begin_command_buffer()
            .expect("command buffer allocation failed");
        self.ctx.lifetimes().track(GpuObject::CommandBuffer(cmd));
        cmd
    }

    /// Run an empty frame through the context.
    pub fn advance_frame(&mut self) {
        self.ctx.begin_frame().expect("begin_frame failed");
        let cmd = self.frame_command_buffer();
        self.ctx.end_frame(cmd).expect("end_frame failed");
    }
}

/// A context plus a renderer over dummy pipelines and geometry.
pub struct RendererFixture {
    pub backend: Arc<DummyBackend>,
    pub ctx: RenderContext,
    pub renderer: Renderer,
}

impl RendererFixture {
    pub fn new(frames: u32, config: RendererConfig) -> Self {
        let TestContext { backend, mut ctx } = TestContext::with_config(frames, &config);
        let pipelines = RendererPipelines {
            cull: backend.create_pipeline("cull", PipelineBindPoint::Compute),
            mesh: backend.create_pipeline("mesh", PipelineBindPoint::Graphics),
        };
        let geometry = GeometryBuffers {
            vertex: backend
                .create_buffer(&BufferDescriptor::new(4096, BufferUsage::VERTEX))
                .expect("vertex buffer"),
            index: backend
                .create_buffer(&BufferDescriptor::new(4096, BufferUsage::INDEX))
                .expect("index buffer"),
        };
        let renderer =
            Renderer::new(&mut ctx, config, pipelines, geometry).expect("renderer creation failed");
        Self {
            backend,
            ctx,
            renderer,
        }
    }
}

/// A camera at +5 on Z looking at the origin.
pub fn test_camera() -> Camera {
    Camera::perspective(1.0, 16.0 / 9.0, 0.1, 100.0).looking_at(
        Vec3::new(0.0, 0.0, 5.0),
        Vec3::ZERO,
        Vec3::Y,
    )
}

/// A loaded cube-sized mesh whose allocations are derived from `id`.
pub fn test_mesh(id: u32) -> Arc<Mesh> {
    Mesh::loaded(
        MeshId(id),
        format!("mesh {id}"),
        MeshAllocation::new(id * 36, 36),
        MeshAllocation::new(id * 24, 24),
    )
}
