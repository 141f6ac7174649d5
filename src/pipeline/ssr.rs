//! Screen-space reflections stage

use std::sync::Arc;

use crate::backend::*;
use crate::error::{RenderError, RenderResult};
use crate::pipeline::{Primitive, PrimitiveRenderer};
use crate::resources::ShaderProgram;
use crate::scene::Camera;
use crate::target::{FrameTarget, FrameTargetDescriptor, Gbuffer};
use crate::viewport::Extent;

const TEX_SCENE: UniformId = UniformId::from_name("texScene");
const VIEW_PROJ: UniformId = UniformId::from_name("viewProj");
const VIEW_PROJ_INV: UniformId = UniformId::from_name("viewProjInv");
const CAM_POS: UniformId = UniformId::from_name("camPos");

/// Kept clear of every unit the gbuffer composite samples
const SCENE_UNIT: u32 = 6;

/// Receives the lit deferred image, then traces reflections over it into the
/// next stage's input
#[derive(Debug)]
pub struct ScreenSpaceReflections {
    target: FrameTarget,
    shader: Arc<ShaderProgram>,
}

impl ScreenSpaceReflections {
    pub const LABEL: &'static str = "ssr";

    pub fn new(shader: Arc<ShaderProgram>) -> Self {
        Self {
            target: FrameTarget::new(FrameTargetDescriptor::color(
                Self::LABEL,
                TextureFormat::Rgba16Float,
            )),
            shader,
        }
    }

    pub fn initialize(&mut self, ctx: &mut dyn GpuContext, viewport: Extent) -> RenderResult<()> {
        self.target.initialize(ctx, viewport)
    }

    pub fn reset(&mut self, ctx: &mut dyn GpuContext, viewport: Extent) -> RenderResult<()> {
        self.target.reset(ctx, viewport)
    }

    pub fn release(&mut self, ctx: &mut dyn GpuContext) {
        self.target.release(ctx);
    }

    /// Bind the stage's own target so earlier passes render into it
    pub fn enable_input(&self, ctx: &mut dyn GpuContext) -> RenderResult<()> {
        self.target.enable(ctx, false)
    }

    pub fn target(&self) -> &FrameTarget {
        &self.target
    }

    pub fn target_framebuffer(&self) -> Option<FramebufferHandle> {
        self.target.framebuffer()
    }

    pub fn is_valid(&self) -> bool {
        self.target.is_valid()
    }

    /// Composite reflections into the currently bound target
    pub fn draw(
        &self,
        ctx: &mut dyn GpuContext,
        gbuffer: &Gbuffer,
        camera: &Camera,
        primitives: &mut PrimitiveRenderer,
    ) -> RenderResult<()> {
        let scene = self
            .target
            .color_texture(0)
            .ok_or_else(|| RenderError::InvalidTarget(Self::LABEL.into()))?;

        self.shader.bind(ctx);
        gbuffer.bind_textures(ctx)?;

        ctx.upload_uniform(TEX_SCENE, UniformValue::Sampler(SCENE_UNIT));
        ctx.lazy_bind_texture(SCENE_UNIT, TextureTarget::Texture2D, scene);

        ctx.upload_uniform(VIEW_PROJ, camera.view_projection().into());
        ctx.upload_uniform(VIEW_PROJ_INV, camera.view_projection_inverse().into());
        ctx.upload_uniform(CAM_POS, camera.position().into());

        primitives.draw(ctx, Primitive::Quad)
    }
}
