//! View frustum and sphere classification

use glam::{Mat4, Vec3, Vec4};

/// Plane in Hessian normal form; points with `normal.dot(p) + distance >= 0` are on the inner side
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane {
    pub normal: Vec3,
    pub distance: f32,
}

impl Plane {
    /// Build from raw coefficients (a, b, c, d), normalizing the result
    pub fn from_coefficients(coefficients: Vec4) -> Self {
        let normal = coefficients.truncate();
        let length = normal.length();
        if length <= f32::EPSILON {
            return Self {
                normal: Vec3::ZERO,
                distance: coefficients.w,
            };
        }
        Self {
            normal: normal / length,
            distance: coefficients.w / length,
        }
    }

    /// Signed distance from the plane to a point
    pub fn signed_distance(&self, point: Vec3) -> f32 {
        self.normal.dot(point) + self.distance
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sphere {
    pub center: Vec3,
    pub radius: f32,
}

impl Sphere {
    pub fn new(center: Vec3, radius: f32) -> Self {
        Self { center, radius }
    }
}

/// Result of testing a volume against a frustum
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VolumeCheck {
    Inside,
    Intersecting,
    Outside,
}

impl VolumeCheck {
    /// Only volumes fully outside may be culled
    pub fn is_visible(self) -> bool {
        self != VolumeCheck::Outside
    }
}

/// Six clip planes extracted from a view-projection matrix
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frustum {
    planes: [Plane; 6],
}

impl Default for Frustum {
    fn default() -> Self {
        Self::from_view_projection(&Mat4::IDENTITY)
    }
}

impl Frustum {
    /// Extract world-space planes from a view-projection matrix with a [0, 1] depth range
    pub fn from_view_projection(view_proj: &Mat4) -> Self {
        let r0 = view_proj.row(0);
        let r1 = view_proj.row(1);
        let r2 = view_proj.row(2);
        let r3 = view_proj.row(3);

        Self {
            planes: [
                Plane::from_coefficients(r3 + r0), // left
                Plane::from_coefficients(r3 - r0), // right
                Plane::from_coefficients(r3 + r1), // bottom
                Plane::from_coefficients(r3 - r1), // top
                Plane::from_coefficients(r2),      // near
                Plane::from_coefficients(r3 - r2), // far
            ],
        }
    }

    pub fn planes(&self) -> &[Plane; 6] {
        &self.planes
    }

    pub fn contains_point(&self, point: Vec3) -> bool {
        self.planes.iter().all(|p| p.signed_distance(point) >= 0.0)
    }

    pub fn contains_sphere(&self, sphere: &Sphere) -> VolumeCheck {
        let mut result = VolumeCheck::Inside;
        for plane in &self.planes {
            let distance = plane.signed_distance(sphere.center);
            if distance < -sphere.radius {
                return VolumeCheck::Outside;
            }
            if distance < sphere.radius {
                result = VolumeCheck::Intersecting;
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn looking_down_negative_z() -> Frustum {
        let proj = Mat4::perspective_rh(45f32.to_radians(), 1.0, 0.1, 1000.0);
        let view = Mat4::look_at_rh(Vec3::ZERO, -Vec3::Z, Vec3::Y);
        Frustum::from_view_projection(&(proj * view))
    }

    #[rstest]
    #[case::ahead(Vec3::new(0.0, 0.0, -5.0), 1.0, VolumeCheck::Inside)]
    #[case::far_to_the_side(Vec3::new(1000.0, 0.0, 0.0), 1.0, VolumeCheck::Outside)]
    #[case::behind(Vec3::new(0.0, 0.0, 5.0), 1.0, VolumeCheck::Outside)]
    #[case::straddling_near(Vec3::new(0.0, 0.0, -0.1), 1.0, VolumeCheck::Intersecting)]
    #[case::straddling_far(Vec3::new(0.0, 0.0, -1000.0), 5.0, VolumeCheck::Intersecting)]
    #[case::beyond_far(Vec3::new(0.0, 0.0, -1100.0), 1.0, VolumeCheck::Outside)]
    #[case::edge_of_view(Vec3::new(4.14, 0.0, -10.0), 1.0, VolumeCheck::Intersecting)]
    fn classifies_spheres(#[case] center: Vec3, #[case] radius: f32, #[case] expected: VolumeCheck) {
        let frustum = looking_down_negative_z();
        assert_eq!(frustum.contains_sphere(&Sphere::new(center, radius)), expected);
    }

    #[test]
    fn planes_are_normalized() {
        for plane in looking_down_negative_z().planes() {
            assert!((plane.normal.length() - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn camera_position_is_outside_only_the_near_plane() {
        let frustum = looking_down_negative_z();
        assert!(!frustum.contains_point(Vec3::ZERO));
        assert!(frustum.contains_point(Vec3::new(0.0, 0.0, -1.0)));
    }
}
