//! Deferred scene renderer

use std::sync::Arc;

use glam::Vec4;

use super::{
    DirectLightVolume, PostProcessingRenderer, Primitive, PrimitiveRenderer,
    ScreenSpaceReflections,
};
use crate::backend::*;
use crate::error::{RenderError, RenderResult};
use crate::events::{EventSource, RenderEvent, RenderEventBus, RenderEventKind, ShadedFrame};
use crate::resources::{upload_skybox, ResourceLibrary, ShaderProgram, TextureAsset};
use crate::scene::{Camera, CameraComponent, Light, RenderScene, SharedScene, Transform};
use crate::target::Gbuffer;
use crate::viewport::{Extent, ResizeSubscription, Viewport};
use crate::RendererConfig;

/// Work done by one [`ShadedSceneRenderer::render`] call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub opaque_draws: usize,
    pub culled_instances: usize,
    pub light_volume_draws: usize,
    pub skybox_drawn: bool,
    /// Point lights have no volume pass yet
    pub point_lights_skipped: usize,
}

/// Owns every deferred stage and runs them in a fixed order each frame
///
/// Pass order:
/// 1. Gbuffer fill, culling instances against the camera frustum
/// 2. Ambient / IBL composite into the SSR input
/// 3. Gbuffer depth copied into the SSR target
/// 4. Directional light volumes, additively blended
/// 5. SSR composite into the post-processing input, depth copied along
/// 6. Skybox where nothing nearer was drawn
/// 7. Post-processing into the target framebuffer
/// 8. Outline and overlay events
pub struct ShadedSceneRenderer {
    scene: SharedScene,
    camera: Camera,
    extent: Extent,
    clear_color: Vec4,

    gbuffer: Gbuffer,
    ssr: ScreenSpaceReflections,
    post_processing: PostProcessingRenderer,
    direct_light: DirectLightVolume,
    skybox_shader: Arc<ShaderProgram>,
    brdf_lut: TextureAsset,
    primitives: PrimitiveRenderer,

    events: RenderEventBus,
    resize: Option<ResizeSubscription>,
}

impl ShadedSceneRenderer {
    /// Resolve every shader and texture, then allocate all targets at the viewport size
    ///
    /// A missing asset is a [`RenderError::Configuration`]. A failed SSR target
    /// only disables reflections; gbuffer and post-processing failures are fatal.
    pub fn initialize(
        ctx: &mut dyn GpuContext,
        library: &dyn ResourceLibrary,
        scene: SharedScene,
        viewport: &mut Viewport,
        config: &RendererConfig,
    ) -> RenderResult<Self> {
        let shaders = &config.shaders;
        let skybox_shader = library.require_shader(&shaders.skybox)?;
        let composite = library.require_shader(&shaders.deferred_composite)?;
        let direct_light = library.require_shader(&shaders.direct_light)?;
        let ssr = library.require_shader(&shaders.ssr)?;
        let post = library.require_shader(&shaders.post_processing)?;
        let bloom = if config.enable_bloom {
            Some(library.require_shader(&shaders.bloom)?)
        } else {
            None
        };
        let brdf_lut = library.require_texture(&shaders.brdf_lut)?;

        let extent = viewport.extent();
        let mut camera = Camera::default();
        camera.set_aspect(extent);

        let mut renderer = Self {
            scene,
            camera,
            extent,
            clear_color: config.clear_color,
            gbuffer: Gbuffer::new(composite),
            ssr: ScreenSpaceReflections::new(ssr),
            post_processing: PostProcessingRenderer::new(post, bloom, config.bloom_mip_levels),
            direct_light: DirectLightVolume::new(direct_light),
            skybox_shader,
            brdf_lut,
            primitives: PrimitiveRenderer::new(),
            events: RenderEventBus::new(),
            resize: None,
        };
        if let Err(err) = renderer.allocate_targets(ctx, extent) {
            renderer.release_targets(ctx);
            return Err(err);
        }
        renderer.resize = Some(viewport.subscribe());

        log::info!(
            "Shaded scene renderer initialized at {}x{} on {}",
            extent.width,
            extent.height,
            ctx.name()
        );
        Ok(renderer)
    }

    fn allocate_targets(&mut self, ctx: &mut dyn GpuContext, extent: Extent) -> RenderResult<()> {
        let post = self.post_processing.reset(ctx, extent);
        let gbuffer = self.gbuffer.reset(ctx, extent);
        if let Err(err) = self.ssr.reset(ctx, extent) {
            log::warn!("Screen-space reflections disabled: {}", err);
        }
        post.and(gbuffer)
    }

    fn release_targets(&mut self, ctx: &mut dyn GpuContext) {
        self.post_processing.release(ctx);
        self.gbuffer.release(ctx);
        self.ssr.release(ctx);
    }

    /// Tear down and reallocate every owned target at `extent`
    pub fn on_resize(&mut self, ctx: &mut dyn GpuContext, extent: Extent) -> RenderResult<()> {
        self.extent = extent;
        self.camera.set_aspect(extent);
        self.allocate_targets(ctx, extent)
    }

    /// Release every owned GPU object and the viewport subscription; repeat calls do nothing
    pub fn teardown(&mut self, ctx: &mut dyn GpuContext, viewport: &mut Viewport) {
        self.release_targets(ctx);
        self.primitives.release(ctx);
        if let Some(subscription) = self.resize.take() {
            viewport.unsubscribe(&subscription);
        }
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut Camera {
        &mut self.camera
    }

    /// Apply an ECS camera at the current viewport size
    pub fn update_camera(&mut self, component: &CameraComponent, transform: &Transform) {
        component.populate(&mut self.camera, self.extent, transform);
    }

    pub fn gbuffer(&self) -> &Gbuffer {
        &self.gbuffer
    }

    pub fn ssr(&self) -> &ScreenSpaceReflections {
        &self.ssr
    }

    pub fn post_processing(&self) -> &PostProcessingRenderer {
        &self.post_processing
    }

    pub fn events_mut(&mut self) -> &mut RenderEventBus {
        &mut self.events
    }

    pub fn scene(&self) -> &SharedScene {
        &self.scene
    }

    pub fn extent(&self) -> Extent {
        self.extent
    }

    /// Render one frame into `target`
    ///
    /// If a required target is invalid the frame is abandoned before any draw,
    /// leaving `target` with its previous contents.
    pub fn render(
        &mut self,
        ctx: &mut dyn GpuContext,
        target: FramebufferHandle,
    ) -> RenderResult<FrameStats> {
        if let Some(extent) = self.resize.as_ref().and_then(ResizeSubscription::take_pending) {
            if let Err(err) = self.on_resize(ctx, extent) {
                log::error!("Resize to {}x{} failed: {}", extent.width, extent.height, err);
            }
        }

        if !self.gbuffer.is_valid() {
            return Err(RenderError::InvalidTarget(Gbuffer::LABEL.to_string()));
        }
        if !self.post_processing.is_valid() {
            return Err(RenderError::InvalidTarget(
                PostProcessingRenderer::LABEL.to_string(),
            ));
        }

        let shared = Arc::clone(&self.scene);
        let guard = shared.read();
        let scene: &dyn RenderScene = &*guard;
        let mut stats = FrameStats::default();

        self.fill_gbuffer(ctx, scene, &mut stats)?;
        self.shade(ctx, scene, &mut stats)?;
        self.forward(ctx, scene, &mut stats);

        ctx.set_cull_enabled(false);
        self.post_processing.draw(
            ctx,
            target,
            &scene.post_processing(),
            &mut self.primitives,
        )?;

        for kind in [RenderEventKind::RenderOutlines, RenderEventKind::RenderOverlays] {
            let event = RenderEvent {
                kind,
                target,
                viewport: self.extent,
                source: EventSource::Shaded(ShadedFrame {
                    camera: &self.camera,
                    gbuffer: &self.gbuffer,
                    scene,
                }),
            };
            self.events.dispatch(ctx, &event);
        }

        log::trace!("Frame rendered: {:?}", stats);
        Ok(stats)
    }

    fn fill_gbuffer(
        &self,
        ctx: &mut dyn GpuContext,
        scene: &dyn RenderScene,
        stats: &mut FrameStats,
    ) -> RenderResult<()> {
        self.gbuffer.enable(ctx, false)?;
        ctx.set_viewport(0, 0, self.extent);
        ctx.set_depth_enabled(true);
        ctx.set_depth_function(CompareFunction::Less);
        ctx.set_cull_enabled(true);
        ctx.set_face_culling_mode(CullFace::Back);
        ctx.set_clear_color(self.clear_color);
        ctx.clear(ClearFlags::COLOR_DEPTH);

        let frustum = self.camera.frustum();
        for collection in scene.opaque_renderables() {
            collection.shader.bind(ctx);
            for instance in &collection.materials {
                let material = &instance.material;
                material.upload_shared(ctx, &self.camera);
                for mesh in &instance.meshes {
                    let counts = mesh.draw_visible(ctx, scene.nodes(), frustum, |ctx, model| {
                        material.upload_model(ctx, model)
                    });
                    stats.opaque_draws += counts.drawn;
                    stats.culled_instances += counts.culled;
                }
            }
        }
        Ok(())
    }

    /// Ambient composite, light volumes and reflections
    fn shade(
        &mut self,
        ctx: &mut dyn GpuContext,
        scene: &dyn RenderScene,
        stats: &mut FrameStats,
    ) -> RenderResult<()> {
        ctx.set_face_culling_mode(CullFace::Back);
        ctx.set_cull_enabled(false);

        // without reflections the composite lands straight in the post-processing input
        let ssr_active = self.ssr.is_valid();
        if ssr_active {
            self.ssr.enable_input(ctx)?;
        } else {
            self.post_processing.enable_input(ctx)?;
        }
        self.gbuffer.draw(
            ctx,
            &self.camera,
            scene.skybox(),
            &self.brdf_lut,
            &mut self.primitives,
        )?;

        let lit = if ssr_active {
            self.ssr.target()
        } else {
            self.post_processing.target()
        };
        self.gbuffer.target().copy_depth_to(ctx, lit)?;

        ctx.set_depth_enabled(false);
        ctx.set_blend_enabled(true);
        ctx.set_blend_equation(BlendOperation::Add);
        ctx.set_blend_function(BlendFactor::One, BlendFactor::One);
        ctx.set_cull_enabled(true);
        ctx.set_face_culling_mode(CullFace::Front);
        for light in scene.lights() {
            match light {
                Light::Directional(light) => {
                    self.direct_light.draw(
                        ctx,
                        &self.gbuffer,
                        &self.camera,
                        light.direction,
                        light.radiance(),
                        &mut self.primitives,
                    )?;
                    stats.light_volume_draws += 1;
                }
                Light::Point(_) => stats.point_lights_skipped += 1,
            }
        }

        ctx.set_face_culling_mode(CullFace::Back);
        ctx.set_blend_enabled(false);
        ctx.set_cull_enabled(false);
        if ssr_active {
            self.post_processing.enable_input(ctx)?;
            self.ssr
                .draw(ctx, &self.gbuffer, &self.camera, &mut self.primitives)?;
            self.ssr
                .target()
                .copy_depth_to(ctx, self.post_processing.target())?;
        }
        ctx.set_depth_enabled(true);
        Ok(())
    }

    fn forward(&mut self, ctx: &mut dyn GpuContext, scene: &dyn RenderScene, stats: &mut FrameStats) {
        let skybox = scene.skybox();
        let Some(environment_map) = &skybox.environment_map else {
            return;
        };
        self.skybox_shader.bind(ctx);
        upload_skybox(ctx, environment_map, skybox.roughness, &self.camera);
        ctx.set_depth_function(CompareFunction::LessEqual);
        match self.primitives.draw(ctx, Primitive::Cube) {
            Ok(()) => stats.skybox_drawn = true,
            Err(err) => log::warn!("Skybox skipped: {}", err),
        }
    }
}

impl std::fmt::Debug for ShadedSceneRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShadedSceneRenderer")
            .field("extent", &self.extent)
            .field("gbuffer", &self.gbuffer)
            .field("ssr", &self.ssr)
            .field("post_processing", &self.post_processing)
            .field("events", &self.events)
            .finish_non_exhaustive()
    }
}
