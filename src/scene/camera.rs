//! Camera system

use bevy_ecs::prelude::*;
use glam::{Mat3, Mat4, Quat, Vec3};

use super::frustum::Frustum;
use super::transform::Transform;
use crate::viewport::Extent;

/// Shape of the view volume
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProjectionKind {
    /// Vertical field of view in radians
    Perspective { fov_y: f32, aspect: f32 },
    /// Half extents of the view box
    Orthographic { half_width: f32, half_height: f32 },
}

/// Camera projection with its clip planes
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projection {
    pub kind: ProjectionKind,
    pub near: f32,
    pub far: f32,
}

impl Default for Projection {
    fn default() -> Self {
        Self::perspective(45.0, 16.0 / 9.0, 0.1, 1000.0)
    }
}

impl Projection {
    pub fn perspective(fov_y_degrees: f32, aspect: f32, near: f32, far: f32) -> Self {
        Self {
            kind: ProjectionKind::Perspective {
                fov_y: fov_y_degrees.to_radians(),
                aspect,
            },
            near,
            far,
        }
    }

    /// Box `width` by `height` world units centered on the view axis
    pub fn orthographic(width: f32, height: f32, near: f32, far: f32) -> Self {
        Self {
            kind: ProjectionKind::Orthographic {
                half_width: width * 0.5,
                half_height: height * 0.5,
            },
            near,
            far,
        }
    }

    pub fn matrix(&self) -> Mat4 {
        match self.kind {
            ProjectionKind::Perspective { fov_y, aspect } => {
                Mat4::perspective_rh(fov_y, aspect, self.near, self.far)
            }
            ProjectionKind::Orthographic {
                half_width,
                half_height,
            } => Mat4::orthographic_rh(
                -half_width,
                half_width,
                -half_height,
                half_height,
                self.near,
                self.far,
            ),
        }
    }

    /// Only perspective projections follow the surface aspect
    pub fn set_aspect(&mut self, new_aspect: f32) {
        if let ProjectionKind::Perspective { aspect, .. } = &mut self.kind {
            *aspect = new_aspect;
        }
    }
}

/// Camera for viewing the scene
///
/// Holds the view and projection inputs plus every matrix derived from them.
/// The derived values are refreshed whenever an input changes, so they can be
/// read freely during a frame.
#[derive(Debug, Clone)]
pub struct Camera {
    position: Vec3,
    view: Mat4,
    projection: Projection,

    projection_matrix: Mat4,
    view_inv: Mat4,
    view_proj: Mat4,
    view_proj_inv: Mat4,
    stat_view_proj: Mat4,
    stat_view_proj_inv: Mat4,
    frustum: Frustum,
}

impl Default for Camera {
    fn default() -> Self {
        Self::looking_at(Vec3::new(0.0, 2.0, 5.0), Vec3::ZERO, Projection::default())
    }
}

impl Camera {
    /// Camera at `position` with the given orientation
    pub fn new(position: Vec3, rotation: Quat, projection: Projection) -> Self {
        let mut camera = Self::blank(projection);
        camera.set_view(position, rotation);
        camera
    }

    pub fn looking_at(position: Vec3, target: Vec3, projection: Projection) -> Self {
        let mut camera = Self::blank(projection);
        camera.look_at(position, target, Vec3::Y);
        camera
    }

    fn blank(projection: Projection) -> Self {
        Self {
            position: Vec3::ZERO,
            view: Mat4::IDENTITY,
            projection,
            projection_matrix: Mat4::IDENTITY,
            view_inv: Mat4::IDENTITY,
            view_proj: Mat4::IDENTITY,
            view_proj_inv: Mat4::IDENTITY,
            stat_view_proj: Mat4::IDENTITY,
            stat_view_proj_inv: Mat4::IDENTITY,
            frustum: Frustum::default(),
        }
    }

    /// Place the camera; scale is ignored
    pub fn set_view(&mut self, position: Vec3, rotation: Quat) {
        self.position = position;
        self.view = Mat4::from_rotation_translation(rotation, position).inverse();
        self.recalculate();
    }

    pub fn look_at(&mut self, position: Vec3, target: Vec3, up: Vec3) {
        self.position = position;
        self.view = Mat4::look_at_rh(position, target, up);
        self.recalculate();
    }

    pub fn set_projection(&mut self, projection: Projection) {
        self.projection = projection;
        self.recalculate();
    }

    /// Update aspect ratio for perspective projection
    pub fn set_aspect(&mut self, extent: Extent) {
        self.projection.set_aspect(extent.aspect_ratio());
        self.recalculate();
    }

    fn recalculate(&mut self) {
        self.projection_matrix = self.projection.matrix();
        self.view_inv = self.view.inverse();
        self.view_proj = self.projection_matrix * self.view;
        self.view_proj_inv = self.view_proj.inverse();

        // rotation only, so infinitely distant content does not parallax
        let stat_view = Mat4::from_mat3(Mat3::from_mat4(self.view));
        self.stat_view_proj = self.projection_matrix * stat_view;
        self.stat_view_proj_inv = self.stat_view_proj.inverse();

        self.frustum = Frustum::from_view_projection(&self.view_proj);
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    /// Get the forward direction
    pub fn forward(&self) -> Vec3 {
        self.view_inv.transform_vector3(-Vec3::Z).normalize()
    }

    pub fn projection(&self) -> &Projection {
        &self.projection
    }

    pub fn view(&self) -> Mat4 {
        self.view
    }

    pub fn view_inverse(&self) -> Mat4 {
        self.view_inv
    }

    pub fn projection_matrix(&self) -> Mat4 {
        self.projection_matrix
    }

    pub fn view_projection(&self) -> Mat4 {
        self.view_proj
    }

    pub fn view_projection_inverse(&self) -> Mat4 {
        self.view_proj_inv
    }

    /// View-projection with the camera translation removed
    pub fn stat_view_projection(&self) -> Mat4 {
        self.stat_view_proj
    }

    pub fn stat_view_projection_inverse(&self) -> Mat4 {
        self.stat_view_proj_inv
    }

    pub fn frustum(&self) -> &Frustum {
        &self.frustum
    }
}

/// Describes a view into the scene
#[derive(Component, Debug, Clone, Copy, PartialEq)]
pub struct CameraComponent {
    pub is_perspective: bool,
    /// Perspective vertical field of view in degrees
    pub field_of_view: f32,
    /// Orthographic view width
    pub ortho_size: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for CameraComponent {
    fn default() -> Self {
        Self {
            is_perspective: true,
            field_of_view: 45.0,
            ortho_size: 25.0,
            near: 0.1,
            far: 1000.0,
        }
    }
}

impl CameraComponent {
    pub fn perspective(field_of_view: f32) -> Self {
        Self {
            field_of_view,
            ..Default::default()
        }
    }

    pub fn orthographic(size: f32) -> Self {
        Self {
            is_perspective: false,
            ortho_size: size,
            ..Default::default()
        }
    }

    pub fn with_clip_planes(mut self, near: f32, far: f32) -> Self {
        self.near = near;
        self.far = far;
        self
    }

    pub fn projection(&self, extent: Extent) -> Projection {
        let aspect = extent.aspect_ratio();
        if self.is_perspective {
            Projection::perspective(self.field_of_view, aspect, self.near, self.far)
        } else {
            Projection::orthographic(self.ortho_size, self.ortho_size / aspect, self.near, self.far)
        }
    }

    /// Write this component's view into `camera`
    pub fn populate(&self, camera: &mut Camera, extent: Extent, transform: &Transform) {
        camera.projection = self.projection(extent);
        camera.set_view(transform.position, transform.rotation);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec4;

    #[test]
    fn static_view_projection_ignores_translation() {
        let projection = Projection::perspective(60.0, 1.0, 0.1, 100.0);
        let a = Camera::new(Vec3::ZERO, Quat::from_rotation_y(0.3), projection);
        let b = Camera::new(Vec3::new(40.0, -3.0, 7.0), Quat::from_rotation_y(0.3), projection);

        assert!(a
            .stat_view_projection()
            .abs_diff_eq(b.stat_view_projection(), 1e-5));
        assert!(!a.view_projection().abs_diff_eq(b.view_projection(), 1e-3));
    }

    #[test]
    fn inverse_matrices_round_trip() {
        let camera = Camera::looking_at(
            Vec3::new(3.0, 4.0, 5.0),
            Vec3::ZERO,
            Projection::perspective(45.0, 1.5, 0.1, 500.0),
        );
        let identity = camera.view_projection() * camera.view_projection_inverse();
        assert!(identity.abs_diff_eq(Mat4::IDENTITY, 1e-4));

        let stat = camera.stat_view_projection() * camera.stat_view_projection_inverse();
        assert!(stat.abs_diff_eq(Mat4::IDENTITY, 1e-4));
    }

    #[test]
    fn frustum_follows_view() {
        let mut camera = Camera::new(Vec3::ZERO, Quat::IDENTITY, Projection::default());
        let ahead = Vec3::new(0.0, 0.0, -10.0);
        assert!(camera.frustum().contains_point(ahead));

        camera.set_view(Vec3::ZERO, Quat::from_rotation_y(std::f32::consts::PI));
        assert!(!camera.frustum().contains_point(ahead));
        assert!(camera.forward().abs_diff_eq(Vec3::Z, 1e-5));
    }

    #[test]
    fn component_populates_camera() {
        let component = CameraComponent::orthographic(20.0);
        let mut camera = Camera::default();
        let transform = Transform::from_position(Vec3::new(0.0, 0.0, 10.0));

        component.populate(&mut camera, Extent::new(200, 100), &transform);

        assert_eq!(camera.position(), Vec3::new(0.0, 0.0, 10.0));
        // orthographic width 20 over a 2:1 viewport puts x = 10 on the right edge
        let clip = camera.view_projection() * Vec4::new(10.0, 0.0, 0.0, 1.0);
        assert!((clip.x / clip.w - 1.0).abs() < 1e-5);
    }
}
