//! Light volume passes

use std::sync::Arc;

use glam::Vec3;

use crate::backend::{GpuContext, UniformId};
use crate::error::RenderResult;
use crate::pipeline::{Primitive, PrimitiveRenderer};
use crate::resources::ShaderProgram;
use crate::scene::Camera;
use crate::target::Gbuffer;

const DIRECTION: UniformId = UniformId::from_name("direction");
const COLOR: UniformId = UniformId::from_name("color");
const VIEW_PROJ_INV: UniformId = UniformId::from_name("viewProjInv");
const CAM_POS: UniformId = UniformId::from_name("camPos");

/// Full-screen pass adding one directional light's contribution
///
/// Expects additive blending and front-face culling to be enabled by the
/// caller. The quad is back facing so it survives the cull.
#[derive(Debug)]
pub struct DirectLightVolume {
    shader: Arc<ShaderProgram>,
}

impl DirectLightVolume {
    pub fn new(shader: Arc<ShaderProgram>) -> Self {
        Self { shader }
    }

    pub fn draw(
        &self,
        ctx: &mut dyn GpuContext,
        gbuffer: &Gbuffer,
        camera: &Camera,
        direction: Vec3,
        color: Vec3,
        primitives: &mut PrimitiveRenderer,
    ) -> RenderResult<()> {
        self.shader.bind(ctx);
        gbuffer.bind_textures(ctx)?;

        ctx.upload_uniform(DIRECTION, direction.into());
        ctx.upload_uniform(COLOR, color.into());
        ctx.upload_uniform(VIEW_PROJ_INV, camera.view_projection_inverse().into());
        ctx.upload_uniform(CAM_POS, camera.position().into());

        primitives.draw(ctx, Primitive::BackQuad)
    }
}
