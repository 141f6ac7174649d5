//! Highlight outlines drawn over the composited frame

use std::sync::Arc;

use glam::{Vec2, Vec4};
use parking_lot::Mutex;

use super::{Primitive, PrimitiveRenderer};
use crate::backend::*;
use crate::error::{RenderError, RenderResult};
use crate::events::{
    EventSource, ListenerId, RenderEvent, RenderEventBus, RenderEventKind, RenderEventListener,
    SharedListener,
};
use crate::resources::{ColorMaterial, Material, ResourceLibrary, ShaderProgram};
use crate::scene::{find_extension, OutlineExtension};
use crate::target::{FrameTarget, FrameTargetDescriptor};
use crate::viewport::{Extent, ResizeSubscription, Viewport};
use crate::RendererConfig;

const VIEW_SIZE: UniformId = UniformId::from_name("uViewSize");
const OCCLUSION_FACTOR: UniformId = UniformId::from_name("uOcclusionFactor");
const TEX_GBUFFER_A: UniformId = UniformId::from_name("texGBufferA");
const IN_COLOR_TEX: UniformId = UniformId::from_name("inColorTex");

const DEPTH_UNIT: u32 = 0;
const SILHOUETTE_UNIT: u32 = 1;

#[derive(Debug)]
struct Shaders {
    color: Arc<ShaderProgram>,
    sobel: Arc<ShaderProgram>,
}

/// Draws flat-color silhouettes of outlined instances into its own target,
/// then adds their Sobel edges onto the event's framebuffer
///
/// Listens for [`RenderEventKind::RenderOutlines`]. Scenes without an
/// [`OutlineExtension`] are skipped.
#[derive(Debug)]
pub struct OutlineRenderer {
    target: FrameTarget,
    shaders: Option<Shaders>,
    color_shader_name: String,
    sobel_shader_name: String,
    occlusion_factor: f32,
    primitives: PrimitiveRenderer,
    resize: Option<ResizeSubscription>,
    listener: Option<ListenerId>,
}

impl OutlineRenderer {
    pub const LABEL: &'static str = "outline";

    pub fn new(config: &RendererConfig) -> Self {
        let desc = FrameTargetDescriptor::color(Self::LABEL, TextureFormat::Rgb16Float)
            .with_sampler(SamplerDescriptor::clamp_to_border(Vec4::ZERO));
        Self {
            target: FrameTarget::new(desc).with_clear_color(Vec4::new(0.0, 0.0, 0.0, 1.0)),
            shaders: None,
            color_shader_name: config.shaders.outline_color.clone(),
            sobel_shader_name: config.shaders.outline_sobel.clone(),
            occlusion_factor: config.outline_occlusion_factor,
            primitives: PrimitiveRenderer::new(),
            resize: None,
            listener: None,
        }
    }

    /// Resolve shaders, allocate the silhouette target and follow viewport resizes
    pub fn initialize(
        &mut self,
        ctx: &mut dyn GpuContext,
        library: &dyn ResourceLibrary,
        viewport: &mut Viewport,
    ) -> RenderResult<()> {
        let shaders = Shaders {
            color: library.require_shader(&self.color_shader_name)?,
            sobel: library.require_shader(&self.sobel_shader_name)?,
        };
        self.target.initialize(ctx, viewport.extent())?;
        self.shaders = Some(shaders);
        if self.resize.is_none() {
            self.resize = Some(viewport.subscribe());
        }
        Ok(())
    }

    /// Register `renderer` for outline events; registering twice keeps the first id
    pub fn register(renderer: &Arc<Mutex<Self>>, bus: &mut RenderEventBus) -> ListenerId {
        if let Some(id) = renderer.lock().listener {
            return id;
        }
        let listener: SharedListener = renderer.clone();
        let id = bus.register(RenderEventKind::RenderOutlines, listener);
        renderer.lock().listener = Some(id);
        id
    }

    pub fn is_ready(&self) -> bool {
        self.shaders.is_some() && self.target.is_valid()
    }

    pub fn target(&self) -> &FrameTarget {
        &self.target
    }

    pub fn on_resize(&mut self, ctx: &mut dyn GpuContext, extent: Extent) -> RenderResult<()> {
        self.target.reset(ctx, extent)
    }

    /// Release GPU objects, the event registration and the resize subscription
    ///
    /// Safe to call more than once.
    pub fn teardown(
        &mut self,
        ctx: &mut dyn GpuContext,
        bus: &mut RenderEventBus,
        viewport: &mut Viewport,
    ) {
        self.target.release(ctx);
        self.primitives.release(ctx);
        self.shaders = None;
        if let Some(id) = self.listener.take() {
            bus.unregister(id);
        }
        if let Some(subscription) = self.resize.take() {
            viewport.unsubscribe(&subscription);
        }
    }

    fn draw(&mut self, ctx: &mut dyn GpuContext, event: &RenderEvent<'_>) -> RenderResult<()> {
        let frame = match event.source {
            EventSource::Shaded(frame) => frame,
            EventSource::Unshaded { .. } => {
                debug_assert!(false, "outline renderer needs a shaded frame");
                log::warn!("Outline event from an unshaded renderer ignored");
                return Ok(());
            }
        };
        // applies even when there is nothing to outline
        if let Some(extent) = self.resize.as_ref().and_then(ResizeSubscription::take_pending) {
            self.on_resize(ctx, extent)?;
        }
        let Some(outlines) = find_extension::<OutlineExtension>(frame.scene, OutlineExtension::ID)
        else {
            log::debug!("Scene has no outline extension, skipping outlines");
            return Ok(());
        };
        if outlines.lists().iter().all(|list| list.meshes.is_empty()) {
            return Ok(());
        }

        let shaders = self.shaders.as_ref().ok_or(RenderError::NotInitialized)?;
        let silhouettes = self
            .target
            .color_texture(0)
            .ok_or_else(|| RenderError::InvalidTarget(Self::LABEL.to_string()))?;
        let extent = self.target.extent().unwrap_or(event.viewport);

        ctx.set_viewport(0, 0, extent);
        self.target.enable(ctx, true)?;

        shaders.color.bind(ctx);
        ctx.upload_uniform(
            VIEW_SIZE,
            Vec2::new(extent.width as f32, extent.height as f32).into(),
        );
        ctx.upload_uniform(OCCLUSION_FACTOR, self.occlusion_factor.into());
        if let Some(depth) = frame.gbuffer.depth_texture() {
            ctx.upload_uniform(TEX_GBUFFER_A, UniformValue::Sampler(DEPTH_UNIT));
            ctx.lazy_bind_texture(DEPTH_UNIT, TextureTarget::Texture2D, depth);
        }

        ctx.set_depth_enabled(true);
        ctx.set_depth_function(CompareFunction::Less);
        let frustum = frame.camera.frustum();
        for list in outlines.lists() {
            let material = ColorMaterial::new(Arc::clone(&shaders.color), list.color);
            material.upload_shared(ctx, frame.camera);
            for mesh in &list.meshes {
                mesh.draw_visible(ctx, frame.scene.nodes(), frustum, |ctx, model| {
                    material.upload_model(ctx, model)
                });
            }
        }

        ctx.bind_framebuffer(event.target);
        ctx.set_viewport(0, 0, event.viewport);
        ctx.set_depth_enabled(false);
        ctx.set_blend_enabled(true);
        ctx.set_blend_equation(BlendOperation::Add);
        ctx.set_blend_function(BlendFactor::One, BlendFactor::One);

        shaders.sobel.bind(ctx);
        ctx.upload_uniform(IN_COLOR_TEX, UniformValue::Sampler(SILHOUETTE_UNIT));
        ctx.lazy_bind_texture(SILHOUETTE_UNIT, TextureTarget::Texture2D, silhouettes);
        let result = self.primitives.draw(ctx, Primitive::Quad);

        ctx.set_blend_enabled(false);
        result
    }
}

impl RenderEventListener for OutlineRenderer {
    fn on_event(&mut self, ctx: &mut dyn GpuContext, event: &RenderEvent<'_>) -> RenderResult<()> {
        match event.kind {
            RenderEventKind::RenderOutlines => self.draw(ctx, event),
            RenderEventKind::RenderOverlays => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::{GpuMesh, Mesh, ResourceCache};
    use crate::scene::{Camera, MeshEntry, Scene};
    use crate::target::Gbuffer;
    use glam::Mat4;

    struct Fixture {
        ctx: HeadlessContext,
        viewport: Viewport,
        bus: RenderEventBus,
        outline: Arc<Mutex<OutlineRenderer>>,
        gbuffer: Gbuffer,
        cube: GpuMesh,
    }

    fn fixture() -> Fixture {
        let extent = Extent::new(64, 48);
        let mut ctx = HeadlessContext::new(extent);
        let mut viewport = Viewport::new(extent);
        let mut cache = ResourceCache::new();
        for name in ["FwdColorShader", "PostSobel", "PostDeferredComposite"] {
            cache.load_shader(&mut ctx, name).unwrap();
        }
        let mut gbuffer = Gbuffer::new(cache.require_shader("PostDeferredComposite").unwrap());
        gbuffer.initialize(&mut ctx, extent).unwrap();

        let mut outline = OutlineRenderer::new(&RendererConfig::default());
        outline.initialize(&mut ctx, &cache, &mut viewport).unwrap();
        let outline = Arc::new(Mutex::new(outline));
        let mut bus = RenderEventBus::new();
        OutlineRenderer::register(&outline, &mut bus);

        let cube = Mesh::cube().upload(&mut ctx).unwrap();
        Fixture {
            ctx,
            viewport,
            bus,
            outline,
            gbuffer,
            cube,
        }
    }

    fn dispatch(fixture: &mut Fixture, scene: &Scene, camera: &Camera) -> usize {
        let event = RenderEvent {
            kind: RenderEventKind::RenderOutlines,
            target: FramebufferHandle::DEFAULT,
            viewport: fixture.viewport.extent(),
            source: EventSource::Shaded(crate::events::ShadedFrame {
                camera,
                gbuffer: &fixture.gbuffer,
                scene,
            }),
        };
        fixture.bus.dispatch(&mut fixture.ctx, &event)
    }

    #[test]
    fn scene_without_extension_draws_nothing() {
        let mut fixture = fixture();
        let scene = Scene::new();
        let camera = Camera::default();

        assert_eq!(dispatch(&mut fixture, &scene, &camera), 1);
        assert!(fixture.ctx.draw_calls().is_empty());
        assert!(fixture.ctx.clears().is_empty());
    }

    #[test]
    fn resize_applies_on_frames_without_outlines() {
        let mut fixture = fixture();
        let resized = Extent::new(128, 96);
        fixture.viewport.resize(resized);
        let scene = Scene::new();
        let camera = Camera::default();

        dispatch(&mut fixture, &scene, &camera);

        let outline = fixture.outline.lock();
        assert_eq!(outline.target().extent(), Some(resized));
        assert!(fixture.ctx.draw_calls().is_empty());
    }

    #[test]
    fn outlined_instances_then_one_edge_pass() {
        let mut fixture = fixture();
        let mut scene = Scene::new();
        let visible = scene.add_node(Mat4::IDENTITY);
        let hidden = scene.add_node(Mat4::from_translation(glam::Vec3::new(1000.0, 0.0, 0.0)));
        let entry = MeshEntry::new(&fixture.cube, Mesh::cube().bounds())
            .with_instance(visible)
            .with_instance(hidden);
        let mut extension = OutlineExtension::new();
        extension.add_list(Vec4::new(1.0, 0.5, 0.0, 1.0), vec![entry]);
        scene.add_extension(Box::new(extension));
        let camera = Camera::default();

        dispatch(&mut fixture, &scene, &camera);

        let ctx = &fixture.ctx;
        assert_eq!(ctx.draws_with_shader("FwdColorShader"), 1);
        assert_eq!(ctx.draws_with_shader("PostSobel"), 1);
        let sobel = ctx.draw_calls().last().unwrap();
        assert_eq!(sobel.framebuffer, FramebufferHandle::DEFAULT);
        assert!(sobel.state.blend_enabled);
        assert!(ctx.violations().is_empty(), "{:?}", ctx.violations());
    }

    #[test]
    fn teardown_twice_is_safe() {
        let mut fixture = fixture();
        let mut outline = fixture.outline.lock();
        outline.teardown(&mut fixture.ctx, &mut fixture.bus, &mut fixture.viewport);
        outline.teardown(&mut fixture.ctx, &mut fixture.bus, &mut fixture.viewport);

        assert!(!outline.is_ready());
        assert_eq!(fixture.bus.listener_count(RenderEventKind::RenderOutlines), 0);
        assert_eq!(fixture.viewport.listener_count(), 0);
    }

    #[test]
    #[cfg_attr(debug_assertions, should_panic)]
    fn unshaded_source_is_ignored() {
        let mut fixture = fixture();
        let camera = Camera::default();
        let event = RenderEvent {
            kind: RenderEventKind::RenderOutlines,
            target: FramebufferHandle::DEFAULT,
            viewport: fixture.viewport.extent(),
            source: EventSource::Unshaded { camera: &camera },
        };
        let result = fixture.outline.lock().on_event(&mut fixture.ctx, &event);
        assert_eq!(result, Ok(()));
        assert!(fixture.ctx.draw_calls().is_empty());
    }
}
