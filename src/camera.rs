//! Perspective camera and NDC unprojection.

use glam::{Mat4, Vec2, Vec3};

use crate::config::CameraConfig;

/// Maps normalized device coordinates to the world-space `z = 0` plane.
///
/// The pointer tracker only needs this one operation from a camera.
pub trait Projector {
    /// Intersect the view ray through `ndc` with `z = 0`.
    ///
    /// Returns `None` when the ray is parallel to the plane.
    fn ndc_to_plane(&self, ndc: Vec2) -> Option<Vec3>;
}

/// Fixed perspective camera looking at the origin.
#[derive(Debug, Clone, Copy)]
pub struct Camera {
    pub position: Vec3,
    pub target: Vec3,
    /// Vertical field of view in radians.
    pub fov_y: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
}

impl Camera {
    pub fn new(config: &CameraConfig, aspect: f32) -> Self {
        Self {
            position: Vec3::from_array(config.position),
            target: Vec3::ZERO,
            fov_y: config.fov_y_degrees.to_radians(),
            aspect,
            near: config.near,
            far: config.far,
        }
    }

    pub fn set_aspect(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.aspect = width as f32 / height as f32;
        }
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.target, Vec3::Y)
    }

    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov_y, self.aspect, self.near, self.far)
    }

    pub fn view_proj(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }
}

impl Projector for Camera {
    fn ndc_to_plane(&self, ndc: Vec2) -> Option<Vec3> {
        let inv = self.view_proj().inverse();
        // wgpu clip space depth runs 0 (near) to 1 (far)
        let near = inv.project_point3(ndc.extend(0.0));
        let far = inv.project_point3(ndc.extend(1.0));
        let dir = far - near;
        if dir.z.abs() < f32::EPSILON {
            return None;
        }
        let t = -near.z / dir.z;
        Some(near + dir * t)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn camera() -> Camera {
        Camera::new(&CameraConfig::default(), 16.0 / 9.0)
    }

    #[test]
    fn test_center_unprojects_to_origin() {
        let hit = camera().ndc_to_plane(Vec2::ZERO).unwrap();
        assert!(hit.length() < 1e-3, "{:?}", hit);
    }

    #[test]
    fn test_top_right_matches_frustum() {
        let cam = camera();
        let hit = cam.ndc_to_plane(Vec2::ONE).unwrap();
        let half_height = 45.0 * (cam.fov_y * 0.5).tan();
        let half_width = half_height * cam.aspect;
        assert!((hit.y - half_height).abs() < 2e-2);
        assert!((hit.x - half_width).abs() < 2e-2);
        assert!(hit.z.abs() < 1e-3);
    }

    #[test]
    fn test_unprojected_point_reprojects_to_ndc() {
        let cam = camera();
        let ndc = Vec2::new(-0.4, 0.25);
        let hit = cam.ndc_to_plane(ndc).unwrap();
        let back = cam.view_proj().project_point3(hit);
        assert!((back.truncate() - ndc).length() < 1e-3);
    }
}
