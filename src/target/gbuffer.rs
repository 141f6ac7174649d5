//! Geometry buffer

use std::sync::Arc;

use super::{DepthAttachment, FrameTarget, FrameTargetDescriptor};
use crate::backend::*;
use crate::error::{RenderError, RenderResult};
use crate::pipeline::{Primitive, PrimitiveRenderer};
use crate::resources::{ShaderProgram, TextureAsset};
use crate::scene::{Camera, Skybox};
use crate::viewport::Extent;

const TEX_GBUFFER_A: UniformId = UniformId::from_name("texGBufferA");
const TEX_GBUFFER_B: UniformId = UniformId::from_name("texGBufferB");
const TEX_GBUFFER_C: UniformId = UniformId::from_name("texGBufferC");
const VIEW_PROJ_INV: UniformId = UniformId::from_name("viewProjInv");
const TEX_IRRADIANCE: UniformId = UniformId::from_name("texIrradiance");
const TEX_ENV_RADIANCE: UniformId = UniformId::from_name("texEnvRadiance");
const MAX_REFLECTION_LOD: UniformId = UniformId::from_name("MAX_REFLECTION_LOD");
const TEX_BRDF_LUT: UniformId = UniformId::from_name("texBRDFLUT");

const IRRADIANCE_UNIT: u32 = 3;
const RADIANCE_UNIT: u32 = 4;
const BRDF_LUT_UNIT: u32 = 5;

/// Deferred geometry buffer
///
/// Attachment layout:
/// - A (unit 0): depth, sampled for position reconstruction
/// - B (unit 1): world normal + metalness
/// - C (unit 2): base color + roughness
///
/// The opaque pass writes it; [`Gbuffer::draw`] composites ambient and
/// image-based lighting from it into whatever target is bound.
#[derive(Debug)]
pub struct Gbuffer {
    target: FrameTarget,
    shader: Arc<ShaderProgram>,
}

impl Gbuffer {
    pub const LABEL: &'static str = "gbuffer";

    pub fn new(composite_shader: Arc<ShaderProgram>) -> Self {
        let desc = FrameTargetDescriptor::color(Self::LABEL, TextureFormat::Rgba16Float)
            .with_color_attachments(2)
            .with_depth(DepthAttachment::Texture(TextureFormat::Depth24))
            .with_sampler(SamplerDescriptor::nearest());
        Self {
            target: FrameTarget::new(desc),
            shader: composite_shader,
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

    pub fn enable(&self, ctx: &mut dyn GpuContext, clear: bool) -> RenderResult<()> {
        self.target.enable(ctx, clear)
    }

    pub fn target(&self) -> &FrameTarget {
        &self.target
    }

    pub fn is_valid(&self) -> bool {
        self.target.is_valid()
    }

    /// Sampleable depth (attachment A)
    pub fn depth_texture(&self) -> Option<TextureHandle> {
        self.target.depth_texture()
    }

    /// Attachments A, B and C in unit order
    pub fn textures(&self) -> RenderResult<[TextureHandle; 3]> {
        let missing = || RenderError::InvalidTarget(Self::LABEL.to_string());
        Ok([
            self.target.depth_texture().ok_or_else(missing)?,
            self.target.color_texture(0).ok_or_else(missing)?,
            self.target.color_texture(1).ok_or_else(missing)?,
        ])
    }

    /// Point the bound shader's gbuffer samplers at units 0..=2 and bind the attachments there
    pub fn bind_textures(&self, ctx: &mut dyn GpuContext) -> RenderResult<()> {
        let textures = self.textures()?;
        for (unit, (id, texture)) in [TEX_GBUFFER_A, TEX_GBUFFER_B, TEX_GBUFFER_C]
            .into_iter()
            .zip(textures)
            .enumerate()
        {
            ctx.upload_uniform(id, UniformValue::Sampler(unit as u32));
            ctx.lazy_bind_texture(unit as u32, TextureTarget::Texture2D, texture);
        }
        Ok(())
    }

    /// Full-screen ambient / IBL composite into the currently bound target
    pub fn draw(
        &self,
        ctx: &mut dyn GpuContext,
        camera: &Camera,
        skybox: &Skybox,
        brdf_lut: &TextureAsset,
        primitives: &mut PrimitiveRenderer,
    ) -> RenderResult<()> {
        self.shader.bind(ctx);
        self.bind_textures(ctx)?;

        // position reconstruction
        ctx.upload_uniform(VIEW_PROJ_INV, camera.stat_view_projection_inverse().into());

        if let Some(environment_map) = &skybox.environment_map {
            ctx.upload_uniform(TEX_IRRADIANCE, UniformValue::Sampler(IRRADIANCE_UNIT));
            ctx.lazy_bind_texture(IRRADIANCE_UNIT, TextureTarget::CubeMap, environment_map.irradiance);

            ctx.upload_uniform(TEX_ENV_RADIANCE, UniformValue::Sampler(RADIANCE_UNIT));
            ctx.lazy_bind_texture(RADIANCE_UNIT, TextureTarget::CubeMap, environment_map.radiance);

            ctx.upload_uniform(
                MAX_REFLECTION_LOD,
                UniformValue::Float(environment_map.mip_count as f32),
            );
        }

        ctx.upload_uniform(TEX_BRDF_LUT, UniformValue::Sampler(BRDF_LUT_UNIT));
        ctx.lazy_bind_texture(BRDF_LUT_UNIT, brdf_lut.target, brdf_lut.handle);

        primitives.draw(ctx, Primitive::Quad)
    }
}
