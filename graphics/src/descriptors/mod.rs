//! Descriptor management.
//!
//! - [`ResourceLayout`] - ordered bindings of one descriptor set
//! - [`ResourceHandler`] - deduplicated layouts, the fixed-capacity set pool,
//!   reference-counted texture sets, descriptor writes and barriers
//! - [`ResourceStateTracker`] - last known state per resource, used to derive
//!   the source side of barriers

mod handler;
mod layout;
mod state;
mod texture_set;

pub use handler::{LayoutIndex, ResourceHandler, ResourceSetIndex};
pub use layout::{ResourceBinding, ResourceLayout, ResourceType, ShaderStage};
pub use state::ResourceStateTracker;
pub use texture_set::TextureSetGuard;
