//! GPU resources.
//!
//! - [`Buffer`] - host-mapped buffer, optionally owning a resource set
//! - [`Texture`] - texture or render target
//! - [`RingBuffer`] - one resource instance per frame in flight
//! - [`ResourceLifetimeTracker`] - deferred and ordered destruction

mod buffer;
mod lifetime;
mod ring_buffer;
mod texture;

pub use buffer::{Buffer, BufferSpecification, SetBinding};
pub use lifetime::ResourceLifetimeTracker;
pub use ring_buffer::{FrameResource, RingBuffer};
pub use texture::{Texture, TextureSpecification};
