//! Meshes and the components that submit them.
//!
//! Mesh geometry lives in shared vertex and index buffers owned by the mesh
//! pool. A [`Mesh`] only records where its ranges are and whether loading
//! has finished; loading may complete on any thread.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use glam::{Mat4, Quat, Vec3};

/// Stable identity of a mesh. Instances of one mesh are batched together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MeshId(pub u32);

/// A range inside a shared geometry buffer, in elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MeshAllocation {
    /// First element.
    pub offset: u32,
    /// Number of elements.
    pub count: u32,
}

impl MeshAllocation {
    /// Create an allocation.
    pub fn new(offset: u32, count: u32) -> Self {
        Self { offset, count }
    }
}

/// A mesh registered with the mesh pool.
#[derive(Debug)]
pub struct Mesh {
    id: MeshId,
    label: String,
    index_allocation: MeshAllocation,
    vertex_allocation: MeshAllocation,
    loaded: AtomicBool,
}

impl Mesh {
    /// Create a mesh whose geometry is not uploaded yet.
    pub fn new(
        id: MeshId,
        label: impl Into<String>,
        index_allocation: MeshAllocation,
        vertex_allocation: MeshAllocation,
    ) -> Self {
        Self {
            id,
            label: label.into(),
            index_allocation,
            vertex_allocation,
            loaded: AtomicBool::new(false),
        }
    }

    /// Create a mesh that is already loaded, wrapped for sharing.
    pub fn loaded(
        id: MeshId,
        label: impl Into<String>,
        index_allocation: MeshAllocation,
        vertex_allocation: MeshAllocation,
    ) -> Arc<Self> {
        let mesh = Self::new(id, label, index_allocation, vertex_allocation);
        mesh.mark_loaded();
        Arc::new(mesh)
    }

    /// Mesh identity.
    pub fn mesh_id(&self) -> MeshId {
        self.id
    }

    /// Debug label.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Range of this mesh in the shared index buffer.
    pub fn index_allocation(&self) -> MeshAllocation {
        self.index_allocation
    }

    /// Range of this mesh in the shared vertex buffer.
    pub fn vertex_allocation(&self) -> MeshAllocation {
        self.vertex_allocation
    }

    /// Whether the geometry has been uploaded.
    pub fn is_loaded(&self) -> bool {
        self.loaded.load(Ordering::Acquire)
    }

    /// Flag the geometry as uploaded.
    pub fn mark_loaded(&self) {
        self.loaded.store(true, Ordering::Release);
    }

    /// Flag the geometry as no longer resident.
    pub fn mark_unloaded(&self) {
        self.loaded.store(false, Ordering::Release);
    }
}

static_assertions::assert_impl_all!(Mesh: Send, Sync);

/// Renderable mesh attached to an entity.
#[derive(Debug, Clone)]
pub struct MeshComponent {
    /// Whether the entity is drawn at all.
    pub visible: bool,
    /// Mesh to draw.
    pub mesh: Option<Arc<Mesh>>,
    /// Opacity in `[0, 1]`.
    pub opacity: f32,
    /// Whether the instance shows up in shadow passes.
    pub shadows_visible: bool,
}

impl Default for MeshComponent {
    fn default() -> Self {
        Self {
            visible: true,
            mesh: None,
            opacity: 1.0,
            shadows_visible: true,
        }
    }
}

impl MeshComponent {
    /// A visible, opaque component drawing `mesh`.
    pub fn new(mesh: Arc<Mesh>) -> Self {
        Self {
            mesh: Some(mesh),
            ..Self::default()
        }
    }

    /// Set the opacity.
    #[must_use]
    pub fn with_opacity(mut self, opacity: f32) -> Self {
        self.opacity = opacity;
        self
    }

    /// Set shadow visibility.
    #[must_use]
    pub fn with_shadows_visible(mut self, visible: bool) -> Self {
        self.shadows_visible = visible;
        self
    }

    /// Set visibility.
    #[must_use]
    pub fn with_visible(mut self, visible: bool) -> Self {
        self.visible = visible;
        self
    }

    /// The mesh, if the component is visible and its mesh is loaded.
    pub fn drawable_mesh(&self) -> Option<&Arc<Mesh>> {
        self.mesh
            .as_ref()
            .filter(|mesh| self.visible && mesh.is_loaded())
    }
}

/// World transform of an entity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransformComponent {
    /// Translation in world units.
    pub translation: Vec3,
    /// Rotation as a unit quaternion.
    pub rotation: Quat,
    /// Non-uniform scale.
    pub scale: Vec3,
}

impl TransformComponent {
    /// Identity transform.
    pub const IDENTITY: Self = Self {
        translation: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: Vec3::ONE,
    };

    /// Create from translation, rotation, and scale.
    pub fn new(translation: Vec3, rotation: Quat, scale: Vec3) -> Self {
        Self {
            translation,
            rotation,
            scale,
        }
    }

    /// Create from translation only.
    pub fn from_translation(translation: Vec3) -> Self {
        Self {
            translation,
            ..Self::IDENTITY
        }
    }

    /// Model matrix (T * R * S).
    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }
}

impl Default for TransformComponent {
    fn default() -> Self {
        Self::IDENTITY
    }
}
