//! CPU-side meshes and their vertex array uploads

use crate::backend::types::{IndexFormat, Vertex, VertexArrayDescriptor};
use crate::backend::{BackendResult, GpuContext, VertexArrayHandle};
use crate::scene::BoundingSphere;
use glam::{Vec2, Vec3};

/// Indexed triangle geometry before upload
#[derive(Debug, Clone)]
pub struct Mesh {
    pub name: String,
    pub vertices: Vec<Vertex>,
    /// Empty for non-indexed meshes
    pub indices: Vec<u32>,
}

/// A mesh uploaded to a vertex array
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GpuMesh {
    pub vertex_array: VertexArrayHandle,
    pub vertex_count: u32,
    pub index_count: u32,
    pub index_format: IndexFormat,
}

impl Mesh {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            vertices: Vec::new(),
            indices: Vec::new(),
        }
    }

    pub fn index_count(&self) -> usize {
        self.indices.len()
    }

    /// Vertices as raw bytes for upload
    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    /// Smallest origin-independent sphere around every vertex
    pub fn bounds(&self) -> BoundingSphere {
        if self.vertices.is_empty() {
            return BoundingSphere::new(Vec3::ZERO, 0.0);
        }
        let (min, max) = self.vertices.iter().fold(
            (Vec3::splat(f32::MAX), Vec3::splat(f32::MIN)),
            |(min, max), v| (min.min(v.position), max.max(v.position)),
        );
        let center = (min + max) * 0.5;
        let radius = self
            .vertices
            .iter()
            .map(|v| v.position.distance(center))
            .fold(0.0, f32::max);
        BoundingSphere::new(center, radius)
    }

    /// Upload into a new vertex array
    pub fn upload(&self, ctx: &mut dyn GpuContext) -> BackendResult<GpuMesh> {
        let indices = (!self.indices.is_empty()).then_some(self.indices.as_slice());
        let vertex_array = ctx.create_vertex_array(&VertexArrayDescriptor {
            label: Some(&self.name),
            vertex_data: self.vertex_bytes(),
            layout: Vertex::layout(),
            indices,
        })?;
        Ok(GpuMesh {
            vertex_array,
            vertex_count: self.vertices.len() as u32,
            index_count: self.indices.len() as u32,
            index_format: IndexFormat::Uint32,
        })
    }

    /// Unit cube around the origin with per-face normals
    pub fn cube() -> Self {
        let mut mesh = Self::new("cube");

        let faces = [
            (Vec3::Z, Vec3::X, Vec3::Y),
            (-Vec3::Z, -Vec3::X, Vec3::Y),
            (Vec3::X, -Vec3::Z, Vec3::Y),
            (-Vec3::X, Vec3::Z, Vec3::Y),
            (Vec3::Y, Vec3::X, -Vec3::Z),
            (-Vec3::Y, Vec3::X, Vec3::Z),
        ];
        let corners = [
            (Vec2::new(-0.5, -0.5), Vec2::new(0.0, 1.0)),
            (Vec2::new(0.5, -0.5), Vec2::new(1.0, 1.0)),
            (Vec2::new(0.5, 0.5), Vec2::new(1.0, 0.0)),
            (Vec2::new(-0.5, 0.5), Vec2::new(0.0, 0.0)),
        ];

        for (normal, right, up) in faces {
            let base = mesh.vertices.len() as u32;
            for (corner, uv) in corners {
                let position = normal * 0.5 + right * corner.x + up * corner.y;
                mesh.vertices.push(Vertex::new(position, normal, uv));
            }
            // Two triangles per face
            mesh.indices
                .extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
        }

        mesh
    }

    /// Latitude-longitude sphere of diameter one
    ///
    /// Each latitude row repeats its first vertex at the seam so the uv
    /// wraps cleanly.
    pub fn sphere(segments: u32, rings: u32) -> Self {
        use std::f32::consts::{PI, TAU};

        let mut mesh = Mesh::new("sphere");
        let row = segments + 1;

        for lat in 0..=rings {
            let v = lat as f32 / rings as f32;
            let (sin_polar, cos_polar) = (v * PI).sin_cos();
            mesh.vertices.extend((0..=segments).map(|lon| {
                let u = lon as f32 / segments as f32;
                let (sin_azimuth, cos_azimuth) = (u * TAU).sin_cos();
                let normal = Vec3::new(sin_polar * cos_azimuth, cos_polar, sin_polar * sin_azimuth);
                Vertex::new(normal * 0.5, normal, Vec2::new(u, v))
            }));
        }

        for lat in 0..rings {
            let top = lat * row;
            let bottom = top + row;
            for lon in 0..segments {
                let (a, b) = (top + lon, bottom + lon);
                mesh.indices.extend_from_slice(&[a, b, a + 1, a + 1, b, b + 1]);
            }
        }

        mesh
    }

    /// Full-screen quad in clip space, drawn as a triangle strip without indices
    ///
    /// Counter-clockwise, so it is front facing.
    pub fn quad() -> Self {
        Self::strip_quad("quad", [(-1.0, 1.0), (-1.0, -1.0), (1.0, 1.0), (1.0, -1.0)])
    }

    /// Clockwise twin of [`Mesh::quad`], kept when front faces are culled
    pub fn back_facing_quad() -> Self {
        Self::strip_quad("back facing quad", [(-1.0, -1.0), (-1.0, 1.0), (1.0, -1.0), (1.0, 1.0)])
    }

    fn strip_quad(name: &str, corners: [(f32, f32); 4]) -> Self {
        let mut mesh = Mesh::new(name);
        for (x, y) in corners {
            mesh.vertices.push(Vertex::new(
                Vec3::new(x, y, 0.0),
                Vec3::Z,
                Vec2::new((x + 1.0) * 0.5, (y + 1.0) * 0.5),
            ));
        }
        mesh
    }
}
