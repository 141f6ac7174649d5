//! Renderable collections grouped by shader, material and mesh

use std::sync::Arc;

use glam::{Mat4, Vec3};

use super::frustum::{Frustum, Sphere};
use crate::backend::{GpuContext, IndexFormat, PrimitiveTopology, VertexArrayHandle};
use crate::resources::{GpuMesh, Material, ShaderProgram};

/// Stable index into a [`NodeStore`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

/// Dense world transforms of scene nodes, addressed by [`NodeId`]
#[derive(Debug, Clone, Default)]
pub struct NodeStore {
    transforms: Vec<Mat4>,
}

impl NodeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, transform: Mat4) -> NodeId {
        let id = NodeId(self.transforms.len() as u32);
        self.transforms.push(transform);
        id
    }

    pub fn get(&self, id: NodeId) -> Option<&Mat4> {
        self.transforms.get(id.0 as usize)
    }

    /// Replace a node's transform; returns false for an unknown id
    pub fn set(&mut self, id: NodeId, transform: Mat4) -> bool {
        match self.transforms.get_mut(id.0 as usize) {
            Some(slot) => {
                *slot = transform;
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.transforms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }
}

/// Object-space bounding sphere of a mesh
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingSphere {
    pub center: Vec3,
    pub radius: f32,
}

impl BoundingSphere {
    pub fn new(center: Vec3, radius: f32) -> Self {
        Self { center, radius }
    }

    /// World-space sphere for an instance drawn with `transform`
    ///
    /// The radius grows with the largest axis scale, so non-uniform scaling
    /// still yields an enclosing volume.
    pub fn world_sphere(&self, transform: &Mat4) -> Sphere {
        let scale = transform
            .x_axis
            .truncate()
            .length()
            .max(transform.y_axis.truncate().length())
            .max(transform.z_axis.truncate().length());
        Sphere::new(transform.transform_point3(self.center), self.radius * scale)
    }
}

/// One mesh and the nodes it is instanced at
#[derive(Debug, Clone)]
pub struct MeshEntry {
    pub vertex_array: VertexArrayHandle,
    pub index_count: u32,
    pub index_format: IndexFormat,
    pub bounds: BoundingSphere,
    pub instances: Vec<NodeId>,
}

/// Instances submitted and rejected by [`MeshEntry::draw_visible`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrawCounts {
    pub drawn: usize,
    pub culled: usize,
}

impl std::ops::AddAssign for DrawCounts {
    fn add_assign(&mut self, rhs: Self) {
        self.drawn += rhs.drawn;
        self.culled += rhs.culled;
    }
}

impl MeshEntry {
    pub fn new(mesh: &GpuMesh, bounds: BoundingSphere) -> Self {
        Self {
            vertex_array: mesh.vertex_array,
            index_count: mesh.index_count,
            index_format: mesh.index_format,
            bounds,
            instances: Vec::new(),
        }
    }

    pub fn with_instance(mut self, node: NodeId) -> Self {
        self.instances.push(node);
        self
    }

    /// Bind the vertex array once, then draw every instance whose sphere is not
    /// fully outside `frustum`
    pub fn draw_visible(
        &self,
        ctx: &mut dyn GpuContext,
        nodes: &NodeStore,
        frustum: &Frustum,
        mut upload_model: impl FnMut(&mut dyn GpuContext, &Mat4),
    ) -> DrawCounts {
        let mut counts = DrawCounts::default();
        ctx.bind_vertex_array(self.vertex_array);
        for &node in &self.instances {
            let Some(transform) = nodes.get(node) else {
                log::warn!("Instance references unknown node {:?}", node);
                continue;
            };
            let sphere = self.bounds.world_sphere(transform);
            if !frustum.contains_sphere(&sphere).is_visible() {
                counts.culled += 1;
                continue;
            }
            upload_model(ctx, transform);
            ctx.draw_elements(
                PrimitiveTopology::TriangleList,
                self.index_count,
                self.index_format,
                0,
            );
            counts.drawn += 1;
        }
        counts
    }
}

/// A material and the meshes drawn with it
#[derive(Debug, Clone)]
pub struct MaterialInstance {
    pub material: Arc<dyn Material>,
    pub meshes: Vec<MeshEntry>,
}

/// Every material sharing one shader program
#[derive(Debug, Clone)]
pub struct MaterialCollection {
    pub shader: Arc<ShaderProgram>,
    pub materials: Vec<MaterialInstance>,
}

impl MaterialCollection {
    pub fn new(shader: Arc<ShaderProgram>) -> Self {
        Self {
            shader,
            materials: Vec::new(),
        }
    }

    pub fn with_material(mut self, material: Arc<dyn Material>, meshes: Vec<MeshEntry>) -> Self {
        self.materials.push(MaterialInstance { material, meshes });
        self
    }

    pub fn instance_count(&self) -> usize {
        self.materials
            .iter()
            .flat_map(|m| &m.meshes)
            .map(|mesh| mesh.instances.len())
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Quat;

    #[test]
    fn world_sphere_uses_largest_axis_scale() {
        let bounds = BoundingSphere::new(Vec3::new(1.0, 0.0, 0.0), 1.0);
        let transform = Mat4::from_scale_rotation_translation(
            Vec3::new(1.0, 3.0, 2.0),
            Quat::from_rotation_z(0.7),
            Vec3::new(0.0, 10.0, 0.0),
        );

        let sphere = bounds.world_sphere(&transform);

        assert!((sphere.radius - 3.0).abs() < 1e-5);
        assert!(sphere
            .center
            .abs_diff_eq(transform.transform_point3(Vec3::X), 1e-5));
    }

    #[test]
    fn node_store_lookups() {
        let mut nodes = NodeStore::new();
        let a = nodes.insert(Mat4::IDENTITY);
        let b = nodes.insert(Mat4::from_translation(Vec3::X));
        assert_eq!(nodes.len(), 2);
        assert!(nodes.set(a, Mat4::from_translation(Vec3::Y)));
        assert!(!nodes.set(NodeId(9), Mat4::IDENTITY));
        assert_eq!(nodes.get(b), Some(&Mat4::from_translation(Vec3::X)));
        assert_eq!(nodes.get(NodeId(9)), None);
    }
}
