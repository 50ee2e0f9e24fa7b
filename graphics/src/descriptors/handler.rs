//! Resource layouts, resource sets and barriers.
//!
//! The handler owns every layout and resource set; callers only ever hold the
//! small indices it returns. Layouts are deduplicated by structural equality,
//! resource sets come from a pool whose capacity is fixed at startup, and
//! texture sets are recycled once nobody references them.

use std::sync::Arc;

use crate::backend::{BoundResource, DescriptorWrite, GpuBackend};
use crate::error::GraphicsError;
use crate::resources::{Buffer, ResourceLifetimeTracker};
use crate::types::{
    BarrierInfo, BarrierTarget, CommandBufferHandle, DescriptorSetHandle, GpuBufferHandle,
    GpuObject, GpuTextureHandle, LayoutHandle, PipelineBarrier, PipelineHandle,
};

use super::layout::{ResourceLayout, ResourceType};
use super::state::ResourceStateTracker;
use super::texture_set::{TextureSetGuard, TextureSetPool};

/// Index of a layout created by a [`ResourceHandler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LayoutIndex(pub u32);

/// Index of a resource set allocated by a [`ResourceHandler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceSetIndex(pub u32);

#[derive(Debug)]
struct LayoutEntry {
    layout: ResourceLayout,
    handle: LayoutHandle,
}

#[derive(Debug, Clone, Copy)]
struct ResourceSetEntry {
    layout: LayoutIndex,
    handle: DescriptorSetHandle,
}

/// Owner of layouts, resource sets and per-resource barrier state.
pub struct ResourceHandler {
    backend: Arc<dyn GpuBackend>,
    lifetimes: Arc<ResourceLifetimeTracker>,
    capacity: u32,
    layouts: Vec<LayoutEntry>,
    sets: Vec<ResourceSetEntry>,
    texture_sets: TextureSetPool,
    states: ResourceStateTracker,
}

impl std::fmt::Debug for ResourceHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceHandler")
            .field("backend", &self.backend.name())
            .field("capacity", &self.capacity)
            .field("layouts", &self.layouts.len())
            .field("sets", &self.sets.len())
            .field("texture_sets", &self.texture_sets.len())
            .finish_non_exhaustive()
    }
}

impl ResourceHandler {
    /// Create a handler whose pool holds at most `capacity` resource sets.
    pub fn new(
        backend: Arc<dyn GpuBackend>,
        lifetimes: Arc<ResourceLifetimeTracker>,
        capacity: u32,
    ) -> Self {
        Self {
            backend,
            lifetimes,
            capacity,
            layouts: Vec::new(),
            sets: Vec::new(),
            texture_sets: TextureSetPool::default(),
            states: ResourceStateTracker::new(),
        }
    }

    // ------------------------------------------------------------------
    // Layouts
    // ------------------------------------------------------------------

    /// Get the index of a layout, creating it if no equal layout exists.
    pub fn create_layout(&mut self, layout: &ResourceLayout) -> Result<LayoutIndex, GraphicsError> {
        if let Some(position) = self.layouts.iter().position(|entry| entry.layout == *layout) {
            return Ok(LayoutIndex(position as u32));
        }

        let handle = self.backend.create_descriptor_layout(layout)?;
        self.lifetimes.track(GpuObject::DescriptorLayout(handle));
        self.layouts.push(LayoutEntry {
            layout: layout.clone(),
            handle,
        });
        log::debug!(
            "Created resource layout {} with {} bindings",
            self.layouts.len() - 1,
            layout.len()
        );
        Ok(LayoutIndex(self.layouts.len() as u32 - 1))
    }

    /// The layout behind an index.
    pub fn layout(&self, index: LayoutIndex) -> Option<&ResourceLayout> {
        self.layouts.get(index.0 as usize).map(|entry| &entry.layout)
    }

    /// Number of distinct layouts.
    pub fn layout_count(&self) -> usize {
        self.layouts.len()
    }

    // ------------------------------------------------------------------
    // Resource sets
    // ------------------------------------------------------------------

    /// Allocate a resource set for a layout.
    ///
    /// Running out of pool capacity is a configuration error.
    pub fn create_resource_set(
        &mut self,
        layout: LayoutIndex,
    ) -> Result<ResourceSetIndex, GraphicsError> {
        let layout_handle = self
            .layouts
            .get(layout.0 as usize)
            .map(|entry| entry.handle)
            .ok_or(GraphicsError::UnknownLayout(layout.0))?;

        if self.sets.len() as u32 >= self.capacity {
            log::error!(
                "Descriptor pool exhausted: all {} resource sets are allocated",
                self.capacity
            );
            return Err(GraphicsError::DescriptorPoolExhausted {
                capacity: self.capacity,
            });
        }

        let handle = self
            .backend
            .allocate_descriptor_set(layout_handle)
            .inspect_err(|e| log::error!("Failed to allocate resource set: {}", e))?;
        self.sets.push(ResourceSetEntry { layout, handle });
        Ok(ResourceSetIndex(self.sets.len() as u32 - 1))
    }

    fn set_entry(&self, set: ResourceSetIndex) -> Result<ResourceSetEntry, GraphicsError> {
        self.sets
            .get(set.0 as usize)
            .copied()
            .ok_or(GraphicsError::UnknownResourceSet(set.0))
    }

    /// Backend handle of a resource set.
    pub fn resource_set_handle(
        &self,
        set: ResourceSetIndex,
    ) -> Result<DescriptorSetHandle, GraphicsError> {
        Ok(self.set_entry(set)?.handle)
    }

    /// Layout a resource set was allocated with.
    pub fn resource_set_layout(&self, set: ResourceSetIndex) -> Option<LayoutIndex> {
        self.sets.get(set.0 as usize).map(|entry| entry.layout)
    }

    /// Number of allocated resource sets.
    pub fn resource_set_count(&self) -> usize {
        self.sets.len()
    }

    /// Pool capacity in resource sets.
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    // ------------------------------------------------------------------
    // Texture sets
    // ------------------------------------------------------------------

    /// Get an unreferenced texture set with `layout`, or allocate a new one.
    ///
    /// The returned set has a reference count of one.
    pub fn get_texture_set(
        &mut self,
        layout: LayoutIndex,
    ) -> Result<ResourceSetIndex, GraphicsError> {
        if let Some(set) = self.texture_sets.claim_free(layout) {
            return Ok(set);
        }
        let set = self.create_resource_set(layout)?;
        self.texture_sets.insert(set, layout);
        Ok(set)
    }

    /// Add a reference to a texture set.
    pub fn increment_texture_set_reference(
        &self,
        set: ResourceSetIndex,
    ) -> Result<(), GraphicsError> {
        if self.texture_sets.increment(set) {
            Ok(())
        } else {
            Err(GraphicsError::UnknownResourceSet(set.0))
        }
    }

    /// Remove a reference from a texture set. At zero this is a no-op.
    ///
    /// Sets obtained through [`acquire_texture_set`](Self::acquire_texture_set)
    /// are released by dropping their guards; decrementing them by hand is
    /// refused while any guard is alive.
    pub fn decrement_texture_set_reference(
        &self,
        set: ResourceSetIndex,
    ) -> Result<(), GraphicsError> {
        match self.texture_sets.is_guarded(set) {
            None => Err(GraphicsError::UnknownResourceSet(set.0)),
            Some(true) => {
                log::warn!("Refusing to release guarded texture set {}", set.0);
                Err(GraphicsError::TextureSetGuarded(set.0))
            }
            Some(false) => {
                self.texture_sets.decrement(set);
                Ok(())
            }
        }
    }

    /// Current reference count of a texture set.
    pub fn texture_set_reference_count(&self, set: ResourceSetIndex) -> Option<u32> {
        self.texture_sets.reference_count(set)
    }

    /// Like [`get_texture_set`](Self::get_texture_set), but the reference is
    /// released when the returned guard (and all its clones) are dropped.
    pub fn acquire_texture_set(
        &mut self,
        layout: LayoutIndex,
    ) -> Result<TextureSetGuard, GraphicsError> {
        let set = self.get_texture_set(layout)?;
        self.texture_sets
            .guard(set)
            .ok_or_else(|| GraphicsError::Internal(format!("texture set {} vanished", set.0)))
    }

    // ------------------------------------------------------------------
    // Descriptor writes
    // ------------------------------------------------------------------

    fn binding_type(
        &self,
        entry: ResourceSetEntry,
        binding: u32,
    ) -> Result<(ResourceType, bool), GraphicsError> {
        self.layout(entry.layout)
            .and_then(|layout| layout.binding(binding))
            .map(|b| (b.resource_type, b.combined))
            .ok_or_else(|| {
                GraphicsError::InvalidParameter(format!(
                    "layout {} has no binding {}",
                    entry.layout.0, binding
                ))
            })
    }

    /// Write a whole buffer into a binding of a resource set.
    pub fn write_buffer_binding(
        &self,
        set: ResourceSetIndex,
        binding: u32,
        buffer: GpuBufferHandle,
        size: u64,
    ) -> Result<(), GraphicsError> {
        let entry = self.set_entry(set)?;
        let resource = match self.binding_type(entry, binding)? {
            (ResourceType::UniformBuffer, _) => BoundResource::UniformBuffer {
                buffer,
                offset: 0,
                size,
            },
            (ResourceType::StorageBuffer, _) => BoundResource::StorageBuffer {
                buffer,
                offset: 0,
                size,
            },
            (other, _) => {
                return Err(GraphicsError::InvalidParameter(format!(
                    "binding {binding} expects {other:?}, not a buffer"
                )));
            }
        };
        self.backend
            .write_descriptor(entry.handle, &DescriptorWrite { binding, resource })
    }

    /// Write a buffer into the `{set, binding}` it was created for.
    pub fn write_buffer(&self, buffer: &Buffer) -> Result<(), GraphicsError> {
        let (set, binding) = buffer.set_binding().ok_or_else(|| {
            GraphicsError::InvalidParameter(format!(
                "buffer '{}' has no resource set",
                buffer.label()
            ))
        })?;
        self.write_buffer_binding(set, binding, buffer.handle(), buffer.size())
    }

    /// Write a texture into a binding of a resource set.
    pub fn write_texture(
        &self,
        set: ResourceSetIndex,
        binding: u32,
        texture: GpuTextureHandle,
    ) -> Result<(), GraphicsError> {
        let entry = self.set_entry(set)?;
        let resource = match self.binding_type(entry, binding)? {
            (ResourceType::Texture | ResourceType::StorageTexture, combined) => {
                BoundResource::Texture { texture, combined }
            }
            (other, _) => {
                return Err(GraphicsError::InvalidParameter(format!(
                    "binding {binding} expects {other:?}, not a texture"
                )));
            }
        };
        self.backend
            .write_descriptor(entry.handle, &DescriptorWrite { binding, resource })
    }

    // ------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------

    /// Bind a resource set at `set_slot` of a pipeline's layout.
    ///
    /// Compatibility of the set's layout with the pipeline is not checked.
    pub fn bind_resource_set(
        &self,
        cmd: CommandBufferHandle,
        pipeline: PipelineHandle,
        set_slot: u32,
        set: ResourceSetIndex,
    ) -> Result<(), GraphicsError> {
        let handle = self.resource_set_handle(set)?;
        self.backend
            .cmd_bind_descriptor_set(cmd, pipeline, set_slot, handle);
        Ok(())
    }

    /// Record a buffer barrier with explicit source and destination.
    pub fn buffer_barrier(
        &mut self,
        cmd: CommandBufferHandle,
        buffer: GpuBufferHandle,
        size: u64,
        src: BarrierInfo,
        dst: BarrierInfo,
    ) {
        self.backend.cmd_pipeline_barrier(
            cmd,
            &PipelineBarrier {
                target: BarrierTarget::Buffer {
                    buffer,
                    offset: 0,
                    size,
                },
                src,
                dst,
            },
        );
        // Keep derived transitions consistent with explicit ones.
        self.states.transition_buffer(buffer, 0, size, dst);
    }

    /// Record a texture barrier with explicit source and destination.
    pub fn texture_barrier(
        &mut self,
        cmd: CommandBufferHandle,
        texture: GpuTextureHandle,
        depth: bool,
        src: BarrierInfo,
        dst: BarrierInfo,
    ) {
        self.backend.cmd_pipeline_barrier(
            cmd,
            &PipelineBarrier {
                target: BarrierTarget::Texture { texture, depth },
                src,
                dst,
            },
        );
        self.states.transition_texture(texture, depth, dst);
    }

    /// Move a buffer to `dst`, recording a barrier from its last known state.
    pub fn transition_buffer(
        &mut self,
        cmd: CommandBufferHandle,
        buffer: GpuBufferHandle,
        size: u64,
        dst: BarrierInfo,
    ) {
        if let Some(barrier) = self.states.transition_buffer(buffer, 0, size, dst) {
            self.backend.cmd_pipeline_barrier(cmd, &barrier);
        }
    }

    /// Move a texture to `dst`, recording a barrier from its last known state.
    pub fn transition_texture(
        &mut self,
        cmd: CommandBufferHandle,
        texture: GpuTextureHandle,
        depth: bool,
        dst: BarrierInfo,
    ) {
        if let Some(barrier) = self.states.transition_texture(texture, depth, dst) {
            self.backend.cmd_pipeline_barrier(cmd, &barrier);
        }
    }

    /// Barrier state tracker.
    pub fn states(&self) -> &ResourceStateTracker {
        &self.states
    }

    /// Mutable barrier state tracker.
    pub fn states_mut(&mut self) -> &mut ResourceStateTracker {
        &mut self.states
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::dummy::DummyBackend;
    use crate::descriptors::ShaderStage;

    fn handler(capacity: u32) -> (Arc<DummyBackend>, ResourceHandler) {
        let backend = Arc::new(DummyBackend::new());
        let handler = ResourceHandler::new(
            backend.clone(),
            Arc::new(ResourceLifetimeTracker::new(3)),
            capacity,
        );
        (backend, handler)
    }

    fn storage_layout() -> ResourceLayout {
        ResourceLayout::new().with_storage_buffer(ShaderStage::COMPUTE)
    }

    #[test]
    fn test_layout_dedup() {
        let (backend, mut handler) = handler(8);

        let a = handler.create_layout(&storage_layout()).unwrap();
        let b = handler.create_layout(&storage_layout()).unwrap();
        let c = handler
            .create_layout(&ResourceLayout::new().with_uniform_buffer(ShaderStage::VERTEX))
            .unwrap();

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(handler.layout_count(), 2);
        assert_eq!(backend.layout_count(), 2);
    }

    #[test]
    fn test_pool_exhaustion() {
        let (_backend, mut handler) = handler(2);
        let layout = handler.create_layout(&storage_layout()).unwrap();

        handler.create_resource_set(layout).unwrap();
        handler.create_resource_set(layout).unwrap();
        assert_eq!(
            handler.create_resource_set(layout),
            Err(GraphicsError::DescriptorPoolExhausted { capacity: 2 })
        );
    }

    #[test]
    fn test_unknown_layout() {
        let (_backend, mut handler) = handler(2);
        assert_eq!(
            handler.create_resource_set(LayoutIndex(5)),
            Err(GraphicsError::UnknownLayout(5))
        );
    }

    #[test]
    fn test_texture_set_reuse() {
        let (_backend, mut handler) = handler(8);
        let layout = handler
            .create_layout(&ResourceLayout::new().with_combined_texture(ShaderStage::FRAGMENT))
            .unwrap();

        let first = handler.get_texture_set(layout).unwrap();
        let second = handler.get_texture_set(layout).unwrap();
        assert_ne!(first, second);

        handler.decrement_texture_set_reference(first).unwrap();
        assert_eq!(handler.get_texture_set(layout).unwrap(), first);
        assert_eq!(handler.texture_set_reference_count(first), Some(1));
        assert_eq!(handler.resource_set_count(), 2);
    }

    #[test]
    fn test_texture_guard_releases_on_drop() {
        let (_backend, mut handler) = handler(8);
        let layout = handler
            .create_layout(&ResourceLayout::new().with_combined_texture(ShaderStage::FRAGMENT))
            .unwrap();

        let guard = handler.acquire_texture_set(layout).unwrap();
        let set = guard.set();
        drop(guard);

        assert_eq!(handler.texture_set_reference_count(set), Some(0));
        assert_eq!(handler.acquire_texture_set(layout).unwrap().set(), set);
    }

    #[test]
    fn test_guarded_set_not_released_by_hand() {
        let (_backend, mut handler) = handler(8);
        let layout = handler
            .create_layout(&ResourceLayout::new().with_combined_texture(ShaderStage::FRAGMENT))
            .unwrap();

        let guard = handler.acquire_texture_set(layout).unwrap();
        let set = guard.set();
        assert_eq!(
            handler.decrement_texture_set_reference(set),
            Err(GraphicsError::TextureSetGuarded(set.0))
        );
        assert_eq!(handler.texture_set_reference_count(set), Some(1));
        assert_ne!(handler.get_texture_set(layout).unwrap(), set);

        drop(guard);
        assert_eq!(handler.get_texture_set(layout).unwrap(), set);
    }

    #[test]
    fn test_write_texture_uses_layout_binding() {
        let (backend, mut handler) = handler(8);
        let layout = handler
            .create_layout(&ResourceLayout::new().with_combined_texture(ShaderStage::FRAGMENT))
            .unwrap();
        let set = handler.get_texture_set(layout).unwrap();
        let texture = GpuTextureHandle::from_raw(77);

        handler.write_texture(set, 0, texture).unwrap();
        let write = backend
            .descriptor_write(handler.resource_set_handle(set).unwrap(), 0)
            .unwrap();
        assert_eq!(
            write.resource,
            BoundResource::Texture {
                texture,
                combined: true
            }
        );

        assert!(handler.write_texture(set, 1, texture).is_err());
        assert!(
            handler
                .write_buffer_binding(set, 0, GpuBufferHandle::from_raw(1), 4)
                .is_err()
        );
    }
}
