//! Reference-counted texture sets.
//!
//! A texture set is a resource set handed out to whoever needs a set of
//! textures bound with a given layout. While its reference count is positive
//! it belongs to its current users; at zero it can be handed out again.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use super::{LayoutIndex, ResourceSetIndex};

/// Decrement a reference count, stopping at zero.
fn release(references: &AtomicU32) {
    // Err means the count was already zero; that is a tolerated no-op.
    let _ = references.fetch_update(Ordering::AcqRel, Ordering::Acquire, |count| {
        count.checked_sub(1)
    });
}

#[derive(Debug)]
struct TextureSetEntry {
    set: ResourceSetIndex,
    layout: LayoutIndex,
    references: Arc<AtomicU32>,
}

/// All texture sets ever created, in creation order.
#[derive(Debug, Default)]
pub(crate) struct TextureSetPool {
    entries: Vec<TextureSetEntry>,
}

impl TextureSetPool {
    /// First set with `layout` and no references, with its count set to one.
    pub(crate) fn claim_free(&self, layout: LayoutIndex) -> Option<ResourceSetIndex> {
        self.entries.iter().find_map(|entry| {
            (entry.layout == layout
                && entry
                    .references
                    .compare_exchange(0, 1, Ordering::AcqRel, Ordering::Acquire)
                    .is_ok())
            .then_some(entry.set)
        })
    }

    /// Register a freshly allocated set with a count of one.
    pub(crate) fn insert(&mut self, set: ResourceSetIndex, layout: LayoutIndex) {
        self.entries.push(TextureSetEntry {
            set,
            layout,
            references: Arc::new(AtomicU32::new(1)),
        });
    }

    fn entry(&self, set: ResourceSetIndex) -> Option<&TextureSetEntry> {
        self.entries.iter().find(|entry| entry.set == set)
    }

    /// Increment the count of a texture set. Returns false for unknown sets.
    pub(crate) fn increment(&self, set: ResourceSetIndex) -> bool {
        self.entry(set)
            .map(|entry| entry.references.fetch_add(1, Ordering::AcqRel))
            .is_some()
    }

    /// Decrement the count of a texture set. Returns false for unknown sets.
    pub(crate) fn decrement(&self, set: ResourceSetIndex) -> bool {
        self.entry(set)
            .map(|entry| release(&entry.references))
            .is_some()
    }

    /// Whether any [`TextureSetGuard`] refers to the set.
    pub(crate) fn is_guarded(&self, set: ResourceSetIndex) -> Option<bool> {
        self.entry(set)
            .map(|entry| Arc::strong_count(&entry.references) > 1)
    }

    pub(crate) fn reference_count(&self, set: ResourceSetIndex) -> Option<u32> {
        self.entry(set)
            .map(|entry| entry.references.load(Ordering::Acquire))
    }

    pub(crate) fn guard(&self, set: ResourceSetIndex) -> Option<TextureSetGuard> {
        self.entry(set).map(|entry| TextureSetGuard {
            set,
            references: Arc::clone(&entry.references),
        })
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Holds one reference to a texture set.
///
/// Cloning the guard adds a reference and dropping it removes one, so the set
/// becomes reusable exactly when the last guard is gone.
#[derive(Debug)]
pub struct TextureSetGuard {
    set: ResourceSetIndex,
    references: Arc<AtomicU32>,
}

impl TextureSetGuard {
    /// The guarded resource set.
    pub fn set(&self) -> ResourceSetIndex {
        self.set
    }

    /// Current number of references to the set.
    pub fn reference_count(&self) -> u32 {
        self.references.load(Ordering::Acquire)
    }
}

impl Clone for TextureSetGuard {
    fn clone(&self) -> Self {
        self.references.fetch_add(1, Ordering::AcqRel);
        Self {
            set: self.set,
            references: Arc::clone(&self.references),
        }
    }
}

impl Drop for TextureSetGuard {
    fn drop(&mut self) {
        release(&self.references);
    }
}
