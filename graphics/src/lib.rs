//! # RedLilium Frame
//!
//! Frame-pipelined GPU resources and GPU-driven draw orchestration.
//!
//! ## Overview
//!
//! This crate provides:
//! - [`RenderContext`] - frame counter, backend, resource handler and
//!   deferred destruction in one explicitly passed owner
//! - [`RingBuffer`] - one resource instance per frame in flight
//! - [`ResourceHandler`] - deduplicated layouts, a fixed-capacity pool of
//!   resource sets, reference-counted texture sets and derived barriers
//! - [`Renderer`] - batches mesh submissions, culls them on the GPU and
//!   draws them with a single indirect-count call
//! - [`GpuBackend`] - the backend seam, with a Vulkan implementation and a
//!   recording dummy for tests
//!
//! ## Example
//!
//! ```ignore
//! use redlilium_frame::{RenderContext, Renderer, RendererConfig};
//!
//! let mut ctx = RenderContext::new(backend, &config)?;
//! let mut renderer = Renderer::new(&mut ctx, config, pipelines, geometry)?;
//!
//! loop {
//!     renderer.begin_frame(&mut ctx)?;
//!     renderer.begin_scene(&mut ctx, &camera, &lights)?;
//!     for (mesh, transform) in &scene {
//!         renderer.render_mesh(mesh, transform)?;
//!     }
//!     renderer.end_scene(&mut ctx)?;
//!     renderer.end_frame(&mut ctx)?;
//! }
//! ```

pub mod backend;
pub mod config;
pub mod context;
pub mod descriptors;
pub mod error;
pub mod profiling;
pub mod renderer;
pub mod resources;
pub mod scene;
pub mod types;

// Re-export main types for convenience
#[cfg(any(test, feature = "dummy"))]
pub use backend::dummy::DummyBackend;
pub use backend::{GpuBackend, PipelineBindPoint};
pub use config::RendererConfig;
pub use context::RenderContext;
pub use descriptors::{
    LayoutIndex, ResourceHandler, ResourceLayout, ResourceSetIndex, ResourceType, ShaderStage,
    TextureSetGuard,
};
pub use error::GraphicsError;
pub use renderer::{
    BatchSummary, FrameBuffer, FramePhase, GeometryBuffers, Renderer, RendererPipelines,
};
pub use resources::{
    Buffer, BufferSpecification, FrameResource, ResourceLifetimeTracker, RingBuffer, Texture,
    TextureSpecification,
};
pub use scene::{
    Camera, LightManager, Mesh, MeshAllocation, MeshComponent, MeshId, PointLight,
    TransformComponent,
};
pub use types::{BufferKind, Extent2d, GpuObject, TextureFormat};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the frame subsystem.
///
/// This should be called before using any graphics functionality.
pub fn init() {
    log::info!("RedLilium Frame v{} initialized", VERSION);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_dummy_backend() {
        let backend = DummyBackend::new();
        assert_eq!(backend.name(), "Dummy Backend");
    }
}
