//! Per-frame resource ring.
//!
//! A [`RingBuffer`] holds one instance of a resource per frame in flight
//! behind a single logical handle. Each frame the ring advances by one slot,
//! so the CPU writes the instance the GPU finished with `N` frames ago while
//! the GPU still reads the others.
//!
//! ```text
//! frame:     0   1   2   3   4   5
//! instance:  0   1   2   0   1   2     (N = 3)
//! ```
//!
//! # Example
//!
//! ```ignore
//! let mut cameras = RingBuffer::<Buffer>::create(
//!     &mut ctx,
//!     &BufferSpecification::new("camera", 256, BufferKind::Uniform),
//! )?;
//!
//! // Every frame
//! let camera = cameras.acquire_next(&ctx)?;
//! camera.set_data(&ctx, bytemuck::bytes_of(&camera_data), 0)?;
//! ```

use crate::context::RenderContext;
use crate::error::GraphicsError;

use super::Buffer;

/// A resource that can live in a [`RingBuffer`].
pub trait FrameResource: Sized {
    /// Creation parameters shared by all instances of a ring.
    type Specification: Clone + std::fmt::Debug;

    /// Base debug label of a specification.
    fn specification_label(specification: &Self::Specification) -> &str;

    /// Create one instance with the given debug label.
    fn create_instance(
        ctx: &mut RenderContext,
        specification: &Self::Specification,
        label: &str,
    ) -> Result<Self, GraphicsError>;

    /// Retire one instance.
    fn destroy_instance(&mut self, ctx: &mut RenderContext);
}

/// One resource instance per frame in flight.
#[derive(Debug)]
pub struct RingBuffer<T: FrameResource> {
    label: String,
    specification: T::Specification,
    instances: Vec<T>,
    cursor: usize,
    last_acquired: Option<u64>,
}

impl<T: FrameResource> RingBuffer<T> {
    /// Create `frame_count` instances named `"<label> frame <i>"`.
    ///
    /// If any instance fails, the instances already built are destroyed and
    /// the error is returned.
    pub fn create(
        ctx: &mut RenderContext,
        specification: &T::Specification,
    ) -> Result<Self, GraphicsError> {
        let label = T::specification_label(specification).to_string();
        let count = ctx.frame_count() as usize;
        let mut instances = Vec::with_capacity(count);

        for index in 0..count {
            let instance_label = format!("{label} frame {index}");
            match T::create_instance(ctx, specification, &instance_label) {
                Ok(instance) => instances.push(instance),
                Err(e) => {
                    log::error!("Failed to create '{}': {}", instance_label, e);
                    for built in &mut instances {
                        built.destroy_instance(ctx);
                    }
                    return Err(e);
                }
            }
        }

        Ok(Self {
            label,
            specification: specification.clone(),
            instances,
            // Frame 0 lands on instance 0.
            cursor: count.saturating_sub(1),
            last_acquired: None,
        })
    }

    /// Advance to the next instance and return it.
    ///
    /// A ring can be acquired once per frame; a second call in the same frame
    /// fails and leaves the cursor where it was.
    pub fn acquire_next(&mut self, ctx: &RenderContext) -> Result<&mut T, GraphicsError> {
        let frame = ctx.frame_number();
        if self.last_acquired == Some(frame) {
            return Err(GraphicsError::RingBufferReacquired {
                label: self.label.clone(),
                frame,
            });
        }
        if self.instances.is_empty() {
            return Err(GraphicsError::InvalidParameter(format!(
                "ring buffer '{}' is shut down",
                self.label
            )));
        }

        self.cursor = (self.cursor + 1) % self.instances.len();
        self.last_acquired = Some(frame);
        Ok(&mut self.instances[self.cursor])
    }

    /// The instance at the cursor.
    pub fn current(&self) -> Option<&T> {
        self.instances.get(self.cursor)
    }

    /// The instance at the cursor, mutably.
    pub fn current_mut(&mut self) -> Option<&mut T> {
        self.instances.get_mut(self.cursor)
    }

    /// Instance by index.
    pub fn instance(&self, index: usize) -> Option<&T> {
        self.instances.get(index)
    }

    /// Iterate over all instances.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.instances.iter()
    }

    /// Cursor position.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Number of instances.
    pub fn len(&self) -> usize {
        self.instances.len()
    }

    /// Whether the ring has no instances (after shutdown).
    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    /// Base debug label.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Specification shared by all instances.
    pub fn specification(&self) -> &T::Specification {
        &self.specification
    }

    /// Retire every instance. Calling this more than once is a no-op.
    pub fn shutdown(&mut self, ctx: &mut RenderContext) {
        if self.instances.is_empty() {
            return;
        }
        for instance in &mut self.instances {
            instance.destroy_instance(ctx);
        }
        self.instances.clear();
        log::debug!("Ring buffer '{}' shut down", self.label);
    }
}

impl RingBuffer<Buffer> {
    /// Make sure the current instance holds at least `size` bytes.
    ///
    /// Only the current instance grows; the others grow when their turn comes.
    /// Returns whether the instance was replaced.
    pub fn ensure_current_capacity(
        &mut self,
        ctx: &mut RenderContext,
        size: u64,
    ) -> Result<bool, GraphicsError> {
        let Some(buffer) = self.instances.get_mut(self.cursor) else {
            return Err(GraphicsError::InvalidParameter(format!(
                "ring buffer '{}' is shut down",
                self.label
            )));
        };
        if size <= buffer.size() {
            return Ok(false);
        }
        let grown = size.max(buffer.size().saturating_mul(2));
        buffer.resize(ctx, grown)?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::backend::GpuBackend;
    use crate::backend::dummy::DummyBackend;
    use crate::config::RendererConfig;
    use crate::resources::BufferSpecification;
    use crate::types::BufferKind;

    fn context(frames: u32) -> (Arc<DummyBackend>, RenderContext) {
        let backend = Arc::new(DummyBackend::with_frame_count(frames));
        let ctx = RenderContext::new(backend.clone(), &RendererConfig::default()).unwrap();
        (backend, ctx)
    }

    fn advance(ctx: &mut RenderContext, backend: &DummyBackend) {
        ctx.begin_frame().unwrap();
        let cmd = backend.begin_command_buffer().unwrap();
        ctx.end_frame(cmd).unwrap();
    }

    #[test]
    fn test_instances_are_labeled() {
        let (backend, mut ctx) = context(3);
        let ring = RingBuffer::<Buffer>::create(
            &mut ctx,
            &BufferSpecification::new("camera", 64, BufferKind::Uniform),
        )
        .unwrap();

        assert_eq!(ring.len(), 3);
        let labels: Vec<_> = ring
            .iter()
            .map(|b| backend.buffer_descriptor(b.handle()).unwrap().label.unwrap())
            .collect();
        assert_eq!(labels, ["camera frame 0", "camera frame 1", "camera frame 2"]);
    }

    #[test]
    fn test_wraps_after_frame_count_acquisitions() {
        let (backend, mut ctx) = context(3);
        let mut ring = RingBuffer::<Buffer>::create(
            &mut ctx,
            &BufferSpecification::new("camera", 64, BufferKind::Uniform),
        )
        .unwrap();

        let first = ring.acquire_next(&ctx).unwrap().handle();
        assert_eq!(first, ring.instance(0).unwrap().handle());
        for _ in 0..3 {
            advance(&mut ctx, &backend);
            ring.acquire_next(&ctx).unwrap();
        }
        assert_eq!(ring.current().unwrap().handle(), first);
    }

    #[test]
    fn test_second_acquire_in_frame_fails() {
        let (_backend, mut ctx) = context(2);
        let mut ring = RingBuffer::<Buffer>::create(
            &mut ctx,
            &BufferSpecification::new("lights", 64, BufferKind::Storage),
        )
        .unwrap();

        ring.acquire_next(&ctx).unwrap();
        let cursor = ring.cursor();
        assert_eq!(
            ring.acquire_next(&ctx).unwrap_err(),
            GraphicsError::RingBufferReacquired {
                label: "lights".into(),
                frame: 0
            }
        );
        assert_eq!(ring.cursor(), cursor);
    }

    #[test]
    fn test_failed_creation_cleans_up() {
        let (backend, mut ctx) = context(3);
        backend.fail_buffer_creation_after(2);

        let result = RingBuffer::<Buffer>::create(
            &mut ctx,
            &BufferSpecification::new("transforms", 64, BufferKind::Storage),
        );
        assert!(matches!(
            result,
            Err(GraphicsError::ResourceCreationFailed(_))
        ));
        assert_eq!(ctx.lifetimes().live_count(), 0);
        assert_eq!(ctx.lifetimes().pending_count(), 2);
    }

    #[test]
    fn test_shutdown_is_idempotent() {
        let (_backend, mut ctx) = context(2);
        let mut ring = RingBuffer::<Buffer>::create(
            &mut ctx,
            &BufferSpecification::new("ids", 64, BufferKind::Storage),
        )
        .unwrap();

        ring.shutdown(&mut ctx);
        ring.shutdown(&mut ctx);
        assert!(ring.is_empty());
        assert_eq!(ctx.lifetimes().pending_count(), 2);
        assert!(ring.acquire_next(&ctx).is_err());
    }

    #[test]
    fn test_ensure_capacity_grows_current_only() {
        let (_backend, mut ctx) = context(2);
        let mut ring = RingBuffer::<Buffer>::create(
            &mut ctx,
            &BufferSpecification::new("instances", 64, BufferKind::Storage),
        )
        .unwrap();
        ring.acquire_next(&ctx).unwrap();

        assert!(!ring.ensure_current_capacity(&mut ctx, 32).unwrap());
        assert!(ring.ensure_current_capacity(&mut ctx, 100).unwrap());
        assert_eq!(ring.current().unwrap().size(), 128);
        assert_eq!(ring.instance(1).unwrap().size(), 64);
    }
}
