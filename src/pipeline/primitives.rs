//! Shared unit primitives

use crate::backend::{GpuContext, PrimitiveTopology};
use crate::error::RenderResult;
use crate::resources::{GpuMesh, Mesh};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Primitive {
    /// Unit cube around the origin, for skyboxes and volume proxies
    Cube,
    /// Full-screen clip-space quad
    Quad,
    /// Full-screen quad wound clockwise, drawn while front faces are culled
    BackQuad,
}

/// Draws unit primitives, uploading each on first use
#[derive(Debug, Default)]
pub struct PrimitiveRenderer {
    cube: Option<GpuMesh>,
    quad: Option<GpuMesh>,
    back_quad: Option<GpuMesh>,
}

impl PrimitiveRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Draw with whatever shader and state are bound
    pub fn draw(&mut self, ctx: &mut dyn GpuContext, primitive: Primitive) -> RenderResult<()> {
        let slot = match primitive {
            Primitive::Cube => &mut self.cube,
            Primitive::Quad => &mut self.quad,
            Primitive::BackQuad => &mut self.back_quad,
        };
        let mesh = match slot {
            Some(mesh) => *mesh,
            None => {
                let mesh = match primitive {
                    Primitive::Cube => Mesh::cube(),
                    Primitive::Quad => Mesh::quad(),
                    Primitive::BackQuad => Mesh::back_facing_quad(),
                }
                .upload(ctx)?;
                *slot = Some(mesh);
                mesh
            }
        };

        ctx.bind_vertex_array(mesh.vertex_array);
        match primitive {
            Primitive::Cube => ctx.draw_elements(
                PrimitiveTopology::TriangleList,
                mesh.index_count,
                mesh.index_format,
                0,
            ),
            Primitive::Quad | Primitive::BackQuad => {
                ctx.draw_arrays(PrimitiveTopology::TriangleStrip, 0, mesh.vertex_count)
            }
        }
        Ok(())
    }

    pub fn release(&mut self, ctx: &mut dyn GpuContext) {
        for mesh in [self.cube.take(), self.quad.take(), self.back_quad.take()].into_iter().flatten() {
            ctx.delete_vertex_array(mesh.vertex_array);
        }
    }
}
