//! The render context.
//!
//! [`RenderContext`] is the single owner of everything frame code needs to
//! reach: the backend, the resource handler and the lifetime tracker, plus the
//! frame counter that decides which ring buffer slot is safe to touch.
//! It is created once, passed explicitly, and mutated only from the render
//! thread.

use std::sync::Arc;

use crate::backend::GpuBackend;
use crate::config::RendererConfig;
use crate::descriptors::ResourceHandler;
use crate::error::GraphicsError;
use crate::resources::ResourceLifetimeTracker;
use crate::types::{CommandBufferHandle, GpuObject};

/// Frame-level owner of the backend and shared resource state.
pub struct RenderContext {
    backend: Arc<dyn GpuBackend>,
    lifetimes: Arc<ResourceLifetimeTracker>,
    resources: ResourceHandler,
    frame_count: u32,
    frame_number: u64,
    in_frame: bool,
    shut_down: bool,
}

impl std::fmt::Debug for RenderContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderContext")
            .field("backend", &self.backend.name())
            .field("frame_count", &self.frame_count)
            .field("frame_number", &self.frame_number)
            .field("in_frame", &self.in_frame)
            .finish_non_exhaustive()
    }
}

impl RenderContext {
    /// Create a context over a backend.
    pub fn new(
        backend: Arc<dyn GpuBackend>,
        config: &RendererConfig,
    ) -> Result<Self, GraphicsError> {
        config.validate()?;

        let frame_count = backend.frame_count();
        if frame_count == 0 {
            log::error!("Backend '{}' reports zero frames in flight", backend.name());
            return Err(GraphicsError::InitializationFailed(
                "backend reports zero frames in flight".into(),
            ));
        }

        let lifetimes = Arc::new(ResourceLifetimeTracker::new(frame_count));
        let resources = ResourceHandler::new(
            Arc::clone(&backend),
            Arc::clone(&lifetimes),
            config.descriptor_pool_capacity,
        );

        log::info!(
            "Render context created on {} with {} frames in flight",
            backend.name(),
            frame_count
        );

        Ok(Self {
            backend,
            lifetimes,
            resources,
            frame_count,
            frame_number: 0,
            in_frame: false,
            shut_down: false,
        })
    }

    /// The GPU backend.
    pub fn backend(&self) -> &Arc<dyn GpuBackend> {
        &self.backend
    }

    /// The lifetime tracker.
    pub fn lifetimes(&self) -> &ResourceLifetimeTracker {
        &self.lifetimes
    }

    /// The resource handler.
    pub fn resources(&self) -> &ResourceHandler {
        &self.resources
    }

    /// The resource handler, mutably.
    pub fn resources_mut(&mut self) -> &mut ResourceHandler {
        &mut self.resources
    }

    /// Number of frames in flight.
    pub fn frame_count(&self) -> u32 {
        self.frame_count
    }

    /// Number of the current (or next) frame.
    pub fn frame_number(&self) -> u64 {
        self.frame_number
    }

    /// The only slot the CPU may write this frame: `frame_number mod frame_count`.
    pub fn current_slot(&self) -> u32 {
        (self.frame_number % self.frame_count as u64) as u32
    }

    /// Whether a frame has begun and not yet ended.
    pub fn is_in_frame(&self) -> bool {
        self.in_frame
    }

    /// Start a frame.
    ///
    /// Blocks until the GPU finished the last frame that used the current
    /// slot, then destroys the objects retired in that frame.
    pub fn begin_frame(&mut self) -> Result<u32, GraphicsError> {
        if self.in_frame {
            return Err(GraphicsError::InvalidFrameState {
                operation: "begin_frame",
                state: "recording",
            });
        }
        let slot = self.current_slot();
        self.backend.wait_for_frame(slot)?;
        self.lifetimes.begin_frame(self.frame_number, self.backend.as_ref());
        self.in_frame = true;
        log::debug!(
            "Frame {} begins in slot {} (swapchain image {})",
            self.frame_number,
            slot,
            self.backend.frame_index()
        );
        Ok(slot)
    }

    /// Submit a frame's command buffer for the current slot and end the frame.
    pub fn end_frame(&mut self, cmd: CommandBufferHandle) -> Result<(), GraphicsError> {
        if !self.in_frame {
            return Err(GraphicsError::InvalidFrameState {
                operation: "end_frame",
                state: "idle",
            });
        }
        self.backend.submit_frame(cmd, self.current_slot())?;
        self.lifetimes.retire(GpuObject::CommandBuffer(cmd));
        self.in_frame = false;
        self.frame_number += 1;
        Ok(())
    }

    /// End a begun frame without submitting anything.
    ///
    /// The frame number is consumed, so rings acquired for it stay in step
    /// with the slots. Does nothing outside a frame.
    pub fn abandon_frame(&mut self) {
        if !self.in_frame {
            return;
        }
        log::warn!("Frame {} abandoned without a submission", self.frame_number);
        self.in_frame = false;
        self.frame_number += 1;
    }

    /// Begin a command buffer for one-off work outside the frame loop.
    pub fn begin_single_use_commands(&self) -> Result<CommandBufferHandle, GraphicsError> {
        let cmd = self.backend.begin_command_buffer()?;
        self.lifetimes.track(GpuObject::CommandBuffer(cmd));
        Ok(cmd)
    }

    /// Submit one-off work and block until it completes.
    pub fn submit_single_use_commands(
        &self,
        cmd: CommandBufferHandle,
    ) -> Result<(), GraphicsError> {
        let result = self.backend.submit_and_wait(cmd);
        // The GPU is done with it either way.
        self.lifetimes.retire(GpuObject::CommandBuffer(cmd));
        result
    }

    /// Wait for the device and destroy every tracked object.
    ///
    /// Calling this more than once is a no-op.
    pub fn shutdown(&mut self) -> Result<(), GraphicsError> {
        if self.shut_down {
            return Ok(());
        }
        self.backend.wait_idle()?;
        self.lifetimes.release_all(self.backend.as_ref());
        self.shut_down = true;
        log::info!(
            "Render context shut down after {} frames",
            self.frame_number
        );
        Ok(())
    }
}
