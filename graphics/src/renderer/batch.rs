//! Per-frame draw queue.
//!
//! Every mesh submitted in a frame gets one [`QueuedMesh`], keyed by mesh
//! identity, collecting the per-instance data of all its submissions. Queue
//! order is first-submission order, and instance ranges are assigned
//! contiguously in that order:
//!
//! ```text
//! mesh A (3 instances)  -> first_instance 0   instances 0..3
//! mesh B (5 instances)  -> first_instance 3   instances 3..8
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use crate::scene::{Mesh, MeshComponent, MeshId, TransformComponent};
use crate::types::DrawIndexedIndirectArgs;

use super::gpu_data::{InstanceRenderingInfo, InstanceTransform};

/// All instances of one mesh submitted this frame.
#[derive(Debug)]
pub struct QueuedMesh {
    mesh: Arc<Mesh>,
    transforms: Vec<InstanceTransform>,
    rendering_infos: Vec<InstanceRenderingInfo>,
    mesh_ids: Vec<u32>,
    draw_args: DrawIndexedIndirectArgs,
}

impl QueuedMesh {
    fn new(mesh: Arc<Mesh>) -> Self {
        let indices = mesh.index_allocation();
        let vertices = mesh.vertex_allocation();
        let draw_args = DrawIndexedIndirectArgs::new(indices.count, 0)
            .with_first_index(indices.offset)
            .with_vertex_offset(vertices.offset as i32);
        Self {
            mesh,
            transforms: Vec::new(),
            rendering_infos: Vec::new(),
            mesh_ids: Vec::new(),
            draw_args,
        }
    }

    fn push(&mut self, component: &MeshComponent, transform: &TransformComponent) {
        self.transforms
            .push(InstanceTransform::from_matrix(transform.matrix()));
        self.rendering_infos.push(InstanceRenderingInfo::new(
            component.opacity,
            component.shadows_visible,
        ));
        self.mesh_ids.push(self.mesh.mesh_id().0);
        self.draw_args.instance_count += 1;
    }

    /// The mesh.
    pub fn mesh(&self) -> &Arc<Mesh> {
        &self.mesh
    }

    /// Number of instances.
    pub fn instance_count(&self) -> u32 {
        self.draw_args.instance_count
    }

    /// Draw record, with `first_instance` valid after
    /// [`MeshQueue::assign_instance_offsets`].
    pub fn draw_args(&self) -> &DrawIndexedIndirectArgs {
        &self.draw_args
    }

    /// Per-instance model matrices.
    pub fn transforms(&self) -> &[InstanceTransform] {
        &self.transforms
    }

    /// Per-instance shading info.
    pub fn rendering_infos(&self) -> &[InstanceRenderingInfo] {
        &self.rendering_infos
    }

    /// Per-instance mesh ids.
    pub fn mesh_ids(&self) -> &[u32] {
        &self.mesh_ids
    }
}

/// Totals of a queue after offsets are assigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BatchSummary {
    /// Number of distinct meshes.
    pub mesh_count: u32,
    /// Number of instances across all meshes.
    pub instance_count: u32,
    /// Largest instance count of a single mesh.
    pub max_instance_count: u32,
}

/// The frame's queued meshes in submission order.
#[derive(Debug, Default)]
pub struct MeshQueue {
    meshes: Vec<QueuedMesh>,
    index: HashMap<MeshId, usize>,
}

impl MeshQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one instance of `mesh`.
    pub fn push(&mut self, mesh: &Arc<Mesh>, component: &MeshComponent, transform: &TransformComponent) {
        let id = mesh.mesh_id();
        let position = match self.index.get(&id) {
            Some(&position) => position,
            None => {
                self.meshes.push(QueuedMesh::new(Arc::clone(mesh)));
                self.index.insert(id, self.meshes.len() - 1);
                self.meshes.len() - 1
            }
        };
        self.meshes[position].push(component, transform);
    }

    /// Give each mesh a contiguous instance range in queue order.
    pub fn assign_instance_offsets(&mut self) -> BatchSummary {
        let mut summary = BatchSummary {
            mesh_count: self.meshes.len() as u32,
            ..BatchSummary::default()
        };
        for queued in &mut self.meshes {
            queued.draw_args.first_instance = summary.instance_count;
            summary.instance_count += queued.instance_count();
            summary.max_instance_count = summary.max_instance_count.max(queued.instance_count());
        }
        summary
    }

    /// Queued meshes in submission order.
    pub fn iter(&self) -> impl Iterator<Item = &QueuedMesh> {
        self.meshes.iter()
    }

    /// Queued mesh by identity.
    pub fn get(&self, id: MeshId) -> Option<&QueuedMesh> {
        self.index.get(&id).map(|&position| &self.meshes[position])
    }

    /// Number of distinct meshes.
    pub fn len(&self) -> usize {
        self.meshes.len()
    }

    /// Whether nothing was queued.
    pub fn is_empty(&self) -> bool {
        self.meshes.is_empty()
    }

    /// Remove everything.
    pub fn clear(&mut self) {
        self.meshes.clear();
        self.index.clear();
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec3;

    use super::*;
    use crate::scene::MeshAllocation;

    fn mesh(id: u32, index_offset: u32) -> Arc<Mesh> {
        Mesh::loaded(
            MeshId(id),
            format!("mesh {id}"),
            MeshAllocation::new(index_offset, 36),
            MeshAllocation::new(id * 100, 24),
        )
    }

    fn submit(queue: &mut MeshQueue, mesh: &Arc<Mesh>, count: usize) {
        let component = MeshComponent::new(mesh.clone());
        for i in 0..count {
            queue.push(
                mesh,
                &component,
                &TransformComponent::from_translation(Vec3::new(i as f32, 0.0, 0.0)),
            );
        }
    }

    #[test]
    fn test_contiguous_offsets() {
        let mut queue = MeshQueue::new();
        let (a, b) = (mesh(1, 0), mesh(2, 36));
        submit(&mut queue, &a, 3);
        submit(&mut queue, &b, 5);

        let summary = queue.assign_instance_offsets();
        assert_eq!(
            summary,
            BatchSummary {
                mesh_count: 2,
                instance_count: 8,
                max_instance_count: 5
            }
        );

        let offsets: Vec<_> = queue.iter().map(|q| q.draw_args().first_instance).collect();
        assert_eq!(offsets, [0, 3]);
        assert_eq!(queue.get(MeshId(2)).unwrap().draw_args().first_index, 36);
        assert_eq!(queue.get(MeshId(2)).unwrap().draw_args().vertex_offset, 200);
    }

    #[test]
    fn test_interleaved_submissions_keep_first_order() {
        let mut queue = MeshQueue::new();
        let (a, b) = (mesh(1, 0), mesh(2, 36));
        submit(&mut queue, &b, 1);
        submit(&mut queue, &a, 1);
        submit(&mut queue, &b, 1);

        let ids: Vec<_> = queue.iter().map(|q| q.mesh().mesh_id()).collect();
        assert_eq!(ids, [MeshId(2), MeshId(1)]);
        assert_eq!(queue.get(MeshId(2)).unwrap().instance_count(), 2);
        assert_eq!(queue.get(MeshId(2)).unwrap().mesh_ids(), &[2, 2]);
    }

    #[test]
    fn test_clear() {
        let mut queue = MeshQueue::new();
        submit(&mut queue, &mesh(1, 0), 2);
        queue.clear();
        assert!(queue.is_empty());
        assert!(queue.get(MeshId(1)).is_none());
        assert_eq!(queue.assign_instance_offsets(), BatchSummary::default());
    }
}
