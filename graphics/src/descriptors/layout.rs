//! Resource layout definitions.
//!
//! A layout describes the resources a shader expects in one descriptor set.
//! The position of a binding in the layout is its binding slot, so two layouts
//! are only interchangeable when their bindings are equal element by element.

/// Type of resource that can be bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceType {
    /// Uniform buffer (read-only, small, frequently updated).
    UniformBuffer,
    /// Storage buffer (read-write, larger data).
    StorageBuffer,
    /// Sampled texture.
    Texture,
    /// Storage texture.
    StorageTexture,
}

bitflags::bitflags! {
    /// Shader stages that can access a binding.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ShaderStage: u32 {
        /// Vertex shader stage.
        const VERTEX = 1 << 0;
        /// Fragment shader stage.
        const FRAGMENT = 1 << 1;
        /// Compute shader stage.
        const COMPUTE = 1 << 2;
    }
}

impl ShaderStage {
    /// Vertex and fragment stages.
    pub const GRAPHICS: Self = Self::VERTEX.union(Self::FRAGMENT);
}

/// Describes a single binding slot in a layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResourceBinding {
    /// Type of resource expected at this binding.
    pub resource_type: ResourceType,
    /// Shader stages that can access this binding.
    pub stages: ShaderStage,
    /// Texture bindings only: the texture is bound together with a sampler.
    pub combined: bool,
}

impl ResourceBinding {
    /// Create a new binding visible to the given stages.
    pub fn new(resource_type: ResourceType, stages: ShaderStage) -> Self {
        Self {
            resource_type,
            stages,
            combined: false,
        }
    }

    /// Mark a texture binding as a combined texture + sampler.
    pub fn combined(mut self) -> Self {
        self.combined = true;
        self
    }
}

/// Ordered sequence of bindings for one descriptor set.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct ResourceLayout {
    bindings: Vec<ResourceBinding>,
}

impl ResourceLayout {
    /// Create a new empty layout.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a binding; it occupies the next binding slot.
    pub fn with_binding(mut self, binding: ResourceBinding) -> Self {
        self.bindings.push(binding);
        self
    }

    /// Append a uniform buffer binding.
    pub fn with_uniform_buffer(self, stages: ShaderStage) -> Self {
        self.with_binding(ResourceBinding::new(ResourceType::UniformBuffer, stages))
    }

    /// Append a storage buffer binding.
    pub fn with_storage_buffer(self, stages: ShaderStage) -> Self {
        self.with_binding(ResourceBinding::new(ResourceType::StorageBuffer, stages))
    }

    /// Append a combined texture + sampler binding.
    pub fn with_combined_texture(self, stages: ShaderStage) -> Self {
        self.with_binding(ResourceBinding::new(ResourceType::Texture, stages).combined())
    }

    /// Bindings in slot order.
    pub fn bindings(&self) -> &[ResourceBinding] {
        &self.bindings
    }

    /// Binding at a slot.
    pub fn binding(&self, slot: u32) -> Option<&ResourceBinding> {
        self.bindings.get(slot as usize)
    }

    /// Number of bindings.
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Check whether the layout has no bindings.
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}
