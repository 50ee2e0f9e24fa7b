//! Lifetime tracking of GPU objects.
//!
//! Every object the core creates is [`track`](ResourceLifetimeTracker::track)ed.
//! Objects that are no longer needed while frames are in flight are
//! [`retire`](ResourceLifetimeTracker::retire)d into the queue of the current
//! frame and destroyed only when that frame's slot comes around again, i.e.
//! after the in-flight fence for it has been waited on.
//!
//! ```text
//! retire() in frame F      ->  queue[F % N]
//! begin_frame(F + N)       ->  fence(F % N) waited, queue[F % N] destroyed
//! release_all()            ->  everything, in dependency order
//! ```

use std::collections::HashMap;

use parking_lot::Mutex;

use crate::backend::GpuBackend;
use crate::types::GpuObject;

/// Destruction tier. Lower tiers are destroyed first at shutdown.
fn destruction_tier(object: &GpuObject) -> u8 {
    match object {
        GpuObject::Buffer(_) | GpuObject::Texture(_) | GpuObject::CommandBuffer(_) => 0,
        GpuObject::RenderTarget(_) => 1,
        GpuObject::Pipeline(_) => 2,
        GpuObject::DescriptorLayout(_) => 3,
    }
}

#[derive(Debug)]
struct TrackerState {
    /// Live objects with their creation sequence number.
    live: HashMap<GpuObject, u64>,
    next_sequence: u64,
    /// Retired objects. Index is `frame % frame_queues.len()`.
    frame_queues: Vec<Vec<GpuObject>>,
    current_frame: u64,
}

impl TrackerState {
    fn queue_index(&self, frame: u64) -> usize {
        (frame % self.frame_queues.len() as u64) as usize
    }
}

/// Records GPU objects and destroys them when the GPU is done with them.
///
/// Shared between the context and the resource handler, so all methods take
/// `&self`.
#[derive(Debug)]
pub struct ResourceLifetimeTracker {
    state: Mutex<TrackerState>,
}

impl ResourceLifetimeTracker {
    /// Create a tracker for `frame_count` frames in flight.
    pub fn new(frame_count: u32) -> Self {
        Self {
            state: Mutex::new(TrackerState {
                live: HashMap::new(),
                next_sequence: 0,
                frame_queues: vec![Vec::new(); frame_count.max(1) as usize],
                current_frame: 0,
            }),
        }
    }

    /// Start tracking a newly created object.
    pub fn track(&self, object: GpuObject) {
        let mut state = self.state.lock();
        let sequence = state.next_sequence;
        state.next_sequence += 1;
        state.live.insert(object, sequence);
    }

    /// Queue a live object for destruction once the current frame retires.
    ///
    /// Retiring an untracked or already retired object is ignored.
    pub fn retire(&self, object: GpuObject) {
        let mut state = self.state.lock();
        if state.live.remove(&object).is_none() {
            log::warn!("Retiring untracked GPU object {:?}", object);
            return;
        }
        let index = state.queue_index(state.current_frame);
        state.frame_queues[index].push(object);
    }

    /// Destroy the objects retired `frame_count` frames before `frame`.
    ///
    /// The caller must have waited for the in-flight fence of `frame`'s slot.
    pub fn begin_frame(&self, frame: u64, backend: &dyn GpuBackend) {
        let retired = {
            let mut state = self.state.lock();
            state.current_frame = frame;
            let index = state.queue_index(frame);
            std::mem::take(&mut state.frame_queues[index])
        };
        if !retired.is_empty() {
            log::trace!(
                "Destroying {} retired GPU objects at frame {}",
                retired.len(),
                frame
            );
        }
        for object in retired {
            backend.destroy(object);
        }
    }

    /// Destroy every pending and live object.
    ///
    /// Buffers, textures and command buffers go first, then render targets,
    /// then pipelines, then descriptor layouts. The device must be idle.
    pub fn release_all(&self, backend: &dyn GpuBackend) {
        let mut objects: Vec<(u8, u64, GpuObject)> = Vec::new();
        {
            let mut state = self.state.lock();
            for queue in &mut state.frame_queues {
                for object in queue.drain(..) {
                    objects.push((destruction_tier(&object), 0, object));
                }
            }
            for (object, sequence) in state.live.drain() {
                objects.push((destruction_tier(&object), sequence, object));
            }
        }
        objects.sort_by_key(|(tier, sequence, _)| (*tier, *sequence));

        log::info!("Releasing {} GPU objects", objects.len());
        for (_, _, object) in objects {
            backend.destroy(object);
        }
    }

    /// Whether an object is tracked and not retired.
    pub fn is_live(&self, object: &GpuObject) -> bool {
        self.state.lock().live.contains_key(object)
    }

    /// Number of live objects.
    pub fn live_count(&self) -> usize {
        self.state.lock().live.len()
    }

    /// Number of retired objects awaiting destruction.
    pub fn pending_count(&self) -> usize {
        self.state.lock().frame_queues.iter().map(Vec::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::dummy::DummyBackend;
    use crate::types::{
        BufferDescriptor, BufferUsage, CommandBufferHandle, GpuBufferHandle, GpuTextureHandle,
        LayoutHandle, PipelineHandle,
    };

    #[test]
    fn test_retired_object_survives_frames_in_flight() {
        let backend = DummyBackend::with_frame_count(2);
        let tracker = ResourceLifetimeTracker::new(2);
        let buffer = backend
            .create_buffer(&BufferDescriptor::new(4, BufferUsage::STORAGE))
            .unwrap();
        tracker.track(GpuObject::Buffer(buffer));

        tracker.begin_frame(0, &backend);
        tracker.retire(GpuObject::Buffer(buffer));
        assert_eq!(tracker.pending_count(), 1);

        tracker.begin_frame(1, &backend);
        assert!(backend.destroyed().is_empty());

        tracker.begin_frame(2, &backend);
        assert_eq!(backend.destroyed(), vec![GpuObject::Buffer(buffer)]);
        assert_eq!(tracker.pending_count(), 0);
    }

    #[test]
    fn test_double_retire_is_ignored() {
        let backend = DummyBackend::new();
        let tracker = ResourceLifetimeTracker::new(1);
        let object = GpuObject::Buffer(GpuBufferHandle::from_raw(7));
        tracker.track(object);
        tracker.retire(object);
        tracker.retire(object);
        assert_eq!(tracker.pending_count(), 1);
        tracker.begin_frame(1, &backend);
        assert_eq!(backend.destroyed().len(), 1);
    }

    #[test]
    fn test_release_all_order() {
        let backend = DummyBackend::new();
        let tracker = ResourceLifetimeTracker::new(3);

        let layout = GpuObject::DescriptorLayout(LayoutHandle::from_raw(1));
        let pipeline = GpuObject::Pipeline(PipelineHandle::from_raw(2));
        let target = GpuObject::RenderTarget(GpuTextureHandle::from_raw(3));
        let buffer = GpuObject::Buffer(GpuBufferHandle::from_raw(4));
        let cmd = GpuObject::CommandBuffer(CommandBufferHandle::from_raw(5));

        for object in [layout, pipeline, target, buffer, cmd] {
            tracker.track(object);
        }
        tracker.retire(cmd);

        tracker.release_all(&backend);
        assert_eq!(
            backend.destroyed(),
            vec![cmd, buffer, target, pipeline, layout]
        );
        assert_eq!(tracker.live_count(), 0);
        assert_eq!(tracker.pending_count(), 0);
    }
}
