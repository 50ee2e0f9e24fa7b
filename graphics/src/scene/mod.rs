//! Scene inputs consumed by the renderer.
//!
//! - [`Mesh`], [`MeshComponent`], [`TransformComponent`] - what gets drawn
//! - [`Camera`], [`Frustum`] - from where
//! - [`LightManager`] - the scene's lights in their GPU layout

mod camera;
mod lights;
mod mesh;

pub use camera::{Camera, CameraData, Frustum};
pub use lights::{
    DirectionalLight, LightBufferHeader, LightManager, LightOwner, LightRelocation, PointLight,
    PointLightData, PointLightIndex,
};
pub use mesh::{Mesh, MeshAllocation, MeshComponent, MeshId, TransformComponent};
