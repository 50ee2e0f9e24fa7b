//! Compute culling pass contract.
//!
//! The cull shader runs one invocation per `(mesh, instance)` pair. Work
//! groups are 128 meshes wide along X and 4 instances tall along Y. Each
//! invocation tests its instance against the frustum and, if visible, appends
//! it to the mesh's draw in the output buffer and bumps the draw count.
//!
//! Descriptor set slots of the cull pipeline:
//!
//! | slot | contents                 |
//! |------|--------------------------|
//! | 0    | camera                   |
//! | 1    | frustum planes           |
//! | 2    | instance transforms      |
//! | 3    | instance mesh ids        |
//! | 4    | input draw arguments     |
//! | 5    | output draw arguments    |
//! | 6    | output draw count        |

/// Meshes per work group along X.
pub const CULL_MESHES_PER_GROUP: u32 = 128;

/// Instances per work group along Y.
pub const CULL_INSTANCES_PER_GROUP: u32 = 4;

/// Work group counts for a culling dispatch.
///
/// Zero meshes yield a zero-sized grid; the dispatch is still recorded.
pub fn dispatch_grid(mesh_count: u32, max_instance_count: u32) -> [u32; 3] {
    [
        mesh_count.div_ceil(CULL_MESHES_PER_GROUP),
        max_instance_count.div_ceil(CULL_INSTANCES_PER_GROUP),
        1,
    ]
}
