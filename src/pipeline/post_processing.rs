//! Post-processing: bloom chain and final tonemapped composite

use std::sync::Arc;

use crate::backend::*;
use crate::error::{RenderError, RenderResult};
use crate::pipeline::{Primitive, PrimitiveRenderer};
use crate::resources::ShaderProgram;
use crate::scene::PostProcessSettings;
use crate::target::{DepthAttachment, FrameTarget, FrameTargetDescriptor, TextureSize};
use crate::viewport::Extent;

const INPUT_TEX: UniformId = UniformId::from_name("inputTex");
const BLOOM_PASS: UniformId = UniformId::from_name("bloomPass");
const THRESHOLD: UniformId = UniformId::from_name("threshold");

const TEX_COLOR: UniformId = UniformId::from_name("texColor");
const EXPOSURE: UniformId = UniformId::from_name("exposure");
const GAMMA: UniformId = UniformId::from_name("gamma");
const TONEMAP_OPERATOR: UniformId = UniformId::from_name("tonemapOperator");
const BLOOM_INTENSITY: UniformId = UniformId::from_name("bloomIntensity");
const BLOOM_LEVELS: UniformId = UniformId::from_name("bloomLevels");

/// Bright-pass extraction into the first bloom level
const BRIGHT_PASS: i32 = 0;
/// Downsample from the previous level
const DOWNSAMPLE_PASS: i32 = 1;

/// Collects the HDR scene, then resolves it into a presentable target
#[derive(Debug)]
pub struct PostProcessingRenderer {
    collect: FrameTarget,
    bloom: Vec<FrameTarget>,
    composite_shader: Arc<ShaderProgram>,
    bloom_shader: Option<Arc<ShaderProgram>>,
    viewport: Extent,
}

impl PostProcessingRenderer {
    pub const LABEL: &'static str = "post processing";
    /// Longest bloom chain; level 15 is already 1/32768 of the viewport
    pub const MAX_BLOOM_LEVELS: u32 = 16;

    /// Without a bloom shader the chain is skipped entirely
    pub fn new(
        composite_shader: Arc<ShaderProgram>,
        bloom_shader: Option<Arc<ShaderProgram>>,
        bloom_mip_levels: u32,
    ) -> Self {
        if bloom_mip_levels > Self::MAX_BLOOM_LEVELS {
            log::warn!(
                "{} bloom levels requested, clamping to {}",
                bloom_mip_levels,
                Self::MAX_BLOOM_LEVELS
            );
        }
        let levels = match bloom_shader {
            Some(_) => bloom_mip_levels.min(Self::MAX_BLOOM_LEVELS),
            None => 0,
        };
        let bloom = (0..levels)
            .map(|i| {
                let scale = 0.5f32.powi(i as i32);
                FrameTarget::new(
                    FrameTargetDescriptor::color(&format!("bloom mip {}", i), TextureFormat::Rgba16Float)
                        .with_depth(DepthAttachment::None)
                        .with_size(TextureSize::uniform(scale)),
                )
            })
            .collect();

        Self {
            collect: FrameTarget::new(FrameTargetDescriptor::color(
                Self::LABEL,
                TextureFormat::Rgba16Float,
            )),
            bloom,
            composite_shader,
            bloom_shader,
            viewport: Extent::new(1, 1),
        }
    }

    /// Allocate the collect target (required) and the bloom chain
    ///
    /// A bloom level that fails to allocate disables bloom without failing the stage.
    pub fn initialize(&mut self, ctx: &mut dyn GpuContext, viewport: Extent) -> RenderResult<()> {
        self.viewport = viewport;
        for level in &mut self.bloom {
            if let Err(err) = level.initialize(ctx, viewport) {
                log::warn!("Bloom disabled: {}", err);
            }
        }
        self.collect.initialize(ctx, viewport)
    }

    pub fn reset(&mut self, ctx: &mut dyn GpuContext, viewport: Extent) -> RenderResult<()> {
        self.initialize(ctx, viewport)
    }

    pub fn release(&mut self, ctx: &mut dyn GpuContext) {
        self.collect.release(ctx);
        for level in &mut self.bloom {
            level.release(ctx);
        }
    }

    /// Bind the collect target so earlier passes render into it
    pub fn enable_input(&self, ctx: &mut dyn GpuContext) -> RenderResult<()> {
        self.collect.enable(ctx, false)
    }

    pub fn target(&self) -> &FrameTarget {
        &self.collect
    }

    pub fn target_framebuffer(&self) -> Option<FramebufferHandle> {
        self.collect.framebuffer()
    }

    pub fn is_valid(&self) -> bool {
        self.collect.is_valid()
    }

    pub fn bloom_targets(&self) -> &[FrameTarget] {
        &self.bloom
    }

    fn bloom_active(&self) -> bool {
        !self.bloom.is_empty() && self.bloom.iter().all(FrameTarget::is_valid)
    }

    /// Resolve the collected frame into `target_fb`
    pub fn draw(
        &self,
        ctx: &mut dyn GpuContext,
        target_fb: FramebufferHandle,
        settings: &PostProcessSettings,
        primitives: &mut PrimitiveRenderer,
    ) -> RenderResult<()> {
        let scene = self
            .collect
            .color_texture(0)
            .ok_or_else(|| RenderError::InvalidTarget(Self::LABEL.into()))?;

        let bloom_active = self.bloom_active();
        if bloom_active {
            self.draw_bloom(ctx, scene, settings, primitives)?;
        }

        ctx.bind_framebuffer(target_fb);
        ctx.set_viewport(0, 0, self.viewport);

        self.composite_shader.bind(ctx);
        ctx.upload_uniform(TEX_COLOR, UniformValue::Sampler(0));
        ctx.lazy_bind_texture(0, TextureTarget::Texture2D, scene);

        let mut levels = 0;
        if bloom_active {
            for (i, level) in self.bloom.iter().enumerate() {
                if let Some(texture) = level.color_texture(0) {
                    let unit = 1 + i as u32;
                    let name = format!("texBloom{}", i);
                    ctx.upload_uniform(UniformId::from_name(&name), UniformValue::Sampler(unit));
                    ctx.lazy_bind_texture(unit, TextureTarget::Texture2D, texture);
                    levels += 1;
                }
            }
        }
        ctx.upload_uniform(BLOOM_LEVELS, UniformValue::Int(levels));
        ctx.upload_uniform(BLOOM_INTENSITY, settings.bloom_intensity.into());

        ctx.upload_uniform(EXPOSURE, settings.exposure.into());
        ctx.upload_uniform(GAMMA, settings.gamma.into());
        ctx.upload_uniform(
            TONEMAP_OPERATOR,
            UniformValue::Int(settings.tonemap.shader_index()),
        );

        primitives.draw(ctx, Primitive::Quad)
    }

    fn draw_bloom(
        &self,
        ctx: &mut dyn GpuContext,
        scene: TextureHandle,
        settings: &PostProcessSettings,
        primitives: &mut PrimitiveRenderer,
    ) -> RenderResult<()> {
        let Some(shader) = &self.bloom_shader else {
            return Ok(());
        };
        shader.bind(ctx);
        ctx.upload_uniform(INPUT_TEX, UniformValue::Sampler(0));
        ctx.upload_uniform(THRESHOLD, settings.bloom_threshold.into());

        let mut source = scene;
        for (i, level) in self.bloom.iter().enumerate() {
            let pass = if i == 0 { BRIGHT_PASS } else { DOWNSAMPLE_PASS };
            ctx.upload_uniform(BLOOM_PASS, UniformValue::Int(pass));
            ctx.lazy_bind_texture(0, TextureTarget::Texture2D, source);

            level.enable(ctx, false)?;
            if let Some(extent) = level.extent() {
                ctx.set_viewport(0, 0, extent);
            }
            primitives.draw(ctx, Primitive::Quad)?;

            source = level
                .color_texture(0)
                .ok_or_else(|| RenderError::InvalidTarget(level.label().to_string()))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::ResourceCache;

    fn renderer(ctx: &mut HeadlessContext, bloom: bool) -> PostProcessingRenderer {
        let mut cache = ResourceCache::new();
        let composite = cache.load_shader(ctx, "PostProcessing").unwrap();
        let bloom_shader = bloom.then(|| cache.load_shader(ctx, "PostBloom").unwrap());
        PostProcessingRenderer::new(composite, bloom_shader, 4)
    }

    #[test]
    fn bloom_chain_halves_each_level() {
        let mut ctx = HeadlessContext::new(Extent::new(256, 128));
        let mut post = renderer(&mut ctx, true);
        post.initialize(&mut ctx, Extent::new(256, 128)).unwrap();

        let extents: Vec<_> = post.bloom_targets().iter().filter_map(FrameTarget::extent).collect();
        assert_eq!(
            extents,
            vec![
                Extent::new(256, 128),
                Extent::new(128, 64),
                Extent::new(64, 32),
                Extent::new(32, 16)
            ]
        );
    }

    #[test]
    fn oversized_bloom_chain_is_clamped() {
        let mut ctx = HeadlessContext::new(Extent::new(64, 64));
        let mut cache = ResourceCache::new();
        let composite = cache.load_shader(&mut ctx, "PostProcessing").unwrap();
        let bloom = cache.load_shader(&mut ctx, "PostBloom").unwrap();
        let mut post = PostProcessingRenderer::new(composite, Some(bloom), 40);

        post.initialize(&mut ctx, Extent::new(64, 64)).unwrap();

        let levels = post.bloom_targets();
        assert_eq!(levels.len(), PostProcessingRenderer::MAX_BLOOM_LEVELS as usize);
        assert_eq!(levels.last().unwrap().extent(), Some(Extent::new(1, 1)));
        assert!(post.bloom_active());
    }

    #[test]
    fn final_composite_uploads_settings() {
        let mut ctx = HeadlessContext::new(Extent::new(64, 64));
        let mut post = renderer(&mut ctx, true);
        post.initialize(&mut ctx, Extent::new(64, 64)).unwrap();
        let mut primitives = PrimitiveRenderer::new();
        let settings = PostProcessSettings::default().with_exposure(2.5);

        post.draw(&mut ctx, FramebufferHandle::DEFAULT, &settings, &mut primitives)
            .unwrap();

        assert_eq!(ctx.draws_with_shader("PostBloom"), 4);
        assert_eq!(ctx.draws_with_shader("PostProcessing"), 1);
        let last = ctx.draw_calls().last().unwrap();
        assert_eq!(last.framebuffer, FramebufferHandle::DEFAULT);
        assert_eq!(last.uniform(EXPOSURE), Some(UniformValue::Float(2.5)));
        assert_eq!(last.uniform(BLOOM_LEVELS), Some(UniformValue::Int(4)));
        assert!(ctx.violations().is_empty());
    }

    #[test]
    fn failed_bloom_level_only_disables_bloom() {
        let mut ctx = HeadlessContext::new(Extent::new(64, 64));
        let mut post = renderer(&mut ctx, true);
        ctx.fail_allocations_labelled("bloom mip 2");

        post.initialize(&mut ctx, Extent::new(64, 64)).unwrap();
        let mut primitives = PrimitiveRenderer::new();
        post.draw(
            &mut ctx,
            FramebufferHandle::DEFAULT,
            &PostProcessSettings::default(),
            &mut primitives,
        )
        .unwrap();

        assert_eq!(ctx.draws_with_shader("PostBloom"), 0);
        let last = ctx.draw_calls().last().unwrap();
        assert_eq!(last.uniform(BLOOM_LEVELS), Some(UniformValue::Int(0)));
    }
}
