//! Camera and view frustum.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3, Vec4};

/// A perspective or orthographic camera.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    /// World-to-camera matrix.
    pub view: Mat4,
    /// Projection matrix with a `[0, 1]` depth range.
    pub projection: Mat4,
}

impl Camera {
    /// Create a perspective camera at the origin looking down -Z.
    pub fn perspective(yfov: f32, aspect: f32, znear: f32, zfar: f32) -> Self {
        Self {
            view: Mat4::IDENTITY,
            projection: Mat4::perspective_rh(yfov, aspect, znear, zfar),
        }
    }

    /// Create an orthographic camera at the origin looking down -Z.
    pub fn orthographic(xmag: f32, ymag: f32, znear: f32, zfar: f32) -> Self {
        Self {
            view: Mat4::IDENTITY,
            projection: Mat4::orthographic_rh(-xmag, xmag, -ymag, ymag, znear, zfar),
        }
    }

    /// Place the camera at `eye` looking at `target`.
    #[must_use]
    pub fn looking_at(mut self, eye: Vec3, target: Vec3, up: Vec3) -> Self {
        self.view = Mat4::look_at_rh(eye, target, up);
        self
    }

    /// Projection * view.
    pub fn view_projection(&self) -> Mat4 {
        self.projection * self.view
    }

    /// World-space camera position.
    pub fn position(&self) -> Vec3 {
        self.view.inverse().w_axis.truncate()
    }

    /// Uniform data for shaders.
    pub fn data(&self) -> CameraData {
        CameraData {
            view: self.view.to_cols_array_2d(),
            projection: self.projection.to_cols_array_2d(),
            view_projection: self.view_projection().to_cols_array_2d(),
            position: self.position().extend(1.0).to_array(),
        }
    }

    /// Frustum planes of this camera.
    pub fn frustum(&self) -> Frustum {
        Frustum::from_view_projection(self.view_projection())
    }
}

/// Camera uniform buffer contents.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct CameraData {
    /// World-to-camera matrix.
    pub view: [[f32; 4]; 4],
    /// Projection matrix.
    pub projection: [[f32; 4]; 4],
    /// Projection * view.
    pub view_projection: [[f32; 4]; 4],
    /// World-space position, w = 1.
    pub position: [f32; 4],
}

static_assertions::const_assert_eq!(std::mem::size_of::<CameraData>(), 208);

/// Six normalized planes `(normal, distance)` facing into the frustum.
///
/// Order: left, right, bottom, top, near, far.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Frustum {
    /// Plane equations, `dot(normal, p) + distance >= 0` inside.
    pub planes: [[f32; 4]; 6],
}

static_assertions::const_assert_eq!(std::mem::size_of::<Frustum>(), 96);

impl Frustum {
    /// Extract the planes of a view-projection matrix with a `[0, 1]` depth range.
    pub fn from_view_projection(m: Mat4) -> Self {
        let (r0, r1, r2, r3) = (m.row(0), m.row(1), m.row(2), m.row(3));
        let planes = [r3 + r0, r3 - r0, r3 + r1, r3 - r1, r2, r3 - r2].map(|plane: Vec4| {
            let length = plane.truncate().length();
            if length > f32::EPSILON {
                (plane / length).to_array()
            } else {
                plane.to_array()
            }
        });
        Self { planes }
    }

    /// Whether a sphere intersects or lies inside the frustum.
    pub fn intersects_sphere(&self, center: Vec3, radius: f32) -> bool {
        self.planes
            .iter()
            .all(|plane| Vec4::from_array(*plane).dot(center.extend(1.0)) >= -radius)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn camera() -> Camera {
        Camera::perspective(std::f32::consts::FRAC_PI_2, 1.0, 0.1, 100.0)
    }

    #[test]
    fn test_view_projection_identity_view() {
        let cam = camera();
        assert_eq!(cam.view_projection(), cam.projection);
    }

    #[test]
    fn test_frustum_contains_points_ahead() {
        let frustum = camera().frustum();
        assert!(frustum.intersects_sphere(Vec3::new(0.0, 0.0, -5.0), 1.0));
        assert!(!frustum.intersects_sphere(Vec3::new(0.0, 0.0, 5.0), 1.0));
        assert!(!frustum.intersects_sphere(Vec3::new(0.0, 0.0, -200.0), 1.0));
        assert!(!frustum.intersects_sphere(Vec3::new(50.0, 0.0, -5.0), 1.0));
    }

    #[test]
    fn test_camera_position() {
        let cam = camera().looking_at(Vec3::new(0.0, 2.0, 10.0), Vec3::ZERO, Vec3::Y);
        assert!((cam.position() - Vec3::new(0.0, 2.0, 10.0)).length() < 1e-4);
        assert_eq!(cam.data().position[3], 1.0);
    }
}
