//! Integration tests for the deferred pipeline on the headless context.
//!
//! # Test Categories
//!
//! - **Culling Tests**: instances outside the frustum never reach the gbuffer
//! - **Forward Tests**: skybox drawn exactly when an environment map exists
//! - **Resource Tests**: resize reallocation, depth copies, failure handling
//! - **Overlay Tests**: outline pass through the render event bus

mod common;

use std::sync::Arc;

use glam::{Mat4, Vec3, Vec4};
use parking_lot::Mutex;
use rstest::rstest;

use common::TestContext;
use scene_renderer::backend::{
    AttachmentPoint, BlendFactor, CullFace, FramebufferHandle, UniformId, UniformValue,
};
use scene_renderer::events::RenderEventKind;
use scene_renderer::scene::{
    BoundingSphere, Camera, MeshEntry, OutlineExtension, PostProcessSettings, Projection,
    RenderScene, Skybox,
};
use scene_renderer::{Extent, OutlineRenderer, RenderError, RendererConfig, ShadedSceneRenderer};

const EXTENT: Extent = Extent::new(320, 180);

fn camera_down_negative_z(extent: Extent) -> Camera {
    Camera::looking_at(
        Vec3::ZERO,
        Vec3::NEG_Z,
        Projection::perspective(45.0, extent.aspect_ratio(), 0.1, 100.0),
    )
}

/// One white directional light and one cube at `center`
fn single_cube_scene(center: Vec3) -> (TestContext, ShadedSceneRenderer) {
    let mut test = TestContext::new(EXTENT);
    test.add_cube(Mat4::IDENTITY, BoundingSphere::new(center, 1.0));
    test.scene
        .write()
        .add_directional_light(Vec3::new(0.0, -1.0, -1.0), Vec3::ONE, 1.0);
    let mut renderer = test.renderer(&RendererConfig::default()).unwrap();
    *renderer.camera_mut() = camera_down_negative_z(EXTENT);
    (test, renderer)
}

// ============================================================================
// Culling Tests
// ============================================================================

/// A cube around the camera's position is drawn once and lit once.
#[test]
fn visible_cube_draws_once_and_lights_once() {
    let (mut test, mut renderer) = single_cube_scene(Vec3::ZERO);

    let stats = renderer
        .render(&mut test.ctx, FramebufferHandle::DEFAULT)
        .unwrap();

    let gbuffer_fb = renderer.gbuffer().target().framebuffer().unwrap();
    assert_eq!(test.ctx.draws_into(gbuffer_fb), 1);
    assert_eq!(test.ctx.draws_with_shader("DirectLightVolume"), 1);
    assert_eq!(stats.opaque_draws, 1);
    assert_eq!(stats.light_volume_draws, 1);
    assert_eq!(stats.culled_instances, 0);
    assert!(test.ctx.violations().is_empty(), "{:?}", test.ctx.violations());
}

/// Light volumes accumulate additively with front faces culled, then the
/// state is restored for the passes after them.
#[test]
fn light_volume_culls_front_faces() {
    let (mut test, mut renderer) = single_cube_scene(Vec3::ZERO);

    renderer
        .render(&mut test.ctx, FramebufferHandle::DEFAULT)
        .unwrap();

    let draws = test.ctx.draw_calls();
    let light = draws
        .iter()
        .find(|d| d.shader_label.as_deref() == Some("DirectLightVolume"))
        .unwrap();
    assert!(light.state.cull_enabled);
    assert_eq!(light.state.cull_face, CullFace::Front);
    assert!(light.state.blend_enabled);
    assert_eq!(
        (light.state.blend_src, light.state.blend_dst),
        (BlendFactor::One, BlendFactor::One)
    );
    assert!(!light.state.depth_test);

    let composite = draws
        .iter()
        .find(|d| d.shader_label.as_deref() == Some("PostDeferredComposite"))
        .unwrap();
    assert_ne!(light.vertex_array, composite.vertex_array);

    let last = draws.last().unwrap();
    assert_eq!(last.shader_label.as_deref(), Some("PostProcessing"));
    assert!(!last.state.cull_enabled);
    assert!(!last.state.blend_enabled);
}

/// Moving the bounding sphere far to the side culls the only instance.
#[test]
fn distant_cube_is_culled() {
    let (mut test, mut renderer) = single_cube_scene(Vec3::new(1000.0, 0.0, 0.0));

    let stats = renderer
        .render(&mut test.ctx, FramebufferHandle::DEFAULT)
        .unwrap();

    let gbuffer_fb = renderer.gbuffer().target().framebuffer().unwrap();
    assert_eq!(test.ctx.draws_into(gbuffer_fb), 0);
    assert_eq!(stats.culled_instances, 1);
    // lighting still runs over the cleared gbuffer
    assert_eq!(stats.light_volume_draws, 1);
}

#[rstest]
#[case::inside(Vec3::new(0.0, 0.0, -10.0), 1)]
#[case::straddling_left(Vec3::new(-7.5, 0.0, -10.0), 1)]
#[case::behind(Vec3::new(0.0, 0.0, 10.0), 0)]
#[case::beyond_far(Vec3::new(0.0, 0.0, -150.0), 0)]
fn instances_are_culled_only_when_fully_outside(#[case] center: Vec3, #[case] expected: usize) {
    let (mut test, mut renderer) = single_cube_scene(center);

    let stats = renderer
        .render(&mut test.ctx, FramebufferHandle::DEFAULT)
        .unwrap();

    assert_eq!(stats.opaque_draws, expected);
    assert_eq!(stats.opaque_draws + stats.culled_instances, 1);
}

/// Point lights have no volume pass and are reported as skipped.
#[test]
fn point_lights_are_skipped() {
    let (mut test, mut renderer) = single_cube_scene(Vec3::ZERO);
    test.scene
        .write()
        .add_point_light(Vec3::new(0.0, 2.0, 0.0), Vec3::ONE, 5.0, 10.0);

    let stats = renderer
        .render(&mut test.ctx, FramebufferHandle::DEFAULT)
        .unwrap();

    assert_eq!(stats.light_volume_draws, 1);
    assert_eq!(stats.point_lights_skipped, 1);
}

// ============================================================================
// Forward Tests
// ============================================================================

#[rstest]
#[case::with_environment(true)]
#[case::without_environment(false)]
fn skybox_drawn_iff_environment_map(#[case] with_environment: bool) {
    let (mut test, mut renderer) = single_cube_scene(Vec3::ZERO);
    if with_environment {
        let map = test.environment_map(6);
        test.scene.write().set_skybox(Skybox::new(map).with_roughness(0.2));
    }

    let stats = renderer
        .render(&mut test.ctx, FramebufferHandle::DEFAULT)
        .unwrap();

    let expected = usize::from(with_environment);
    assert_eq!(test.ctx.draws_with_shader("FwdSkyboxShader"), expected);
    assert_eq!(stats.skybox_drawn, with_environment);
    if with_environment {
        let skybox = test
            .ctx
            .draw_calls()
            .iter()
            .find(|d| d.shader_label.as_deref() == Some("FwdSkyboxShader"))
            .unwrap();
        assert_eq!(
            skybox.uniform(UniformId::from_name("viewProj")),
            Some(UniformValue::Mat4(renderer.camera().stat_view_projection()))
        );
        assert_eq!(
            skybox.framebuffer,
            renderer.post_processing().target_framebuffer().unwrap()
        );
    }
    assert!(test.ctx.violations().is_empty(), "{:?}", test.ctx.violations());
}

/// The last draw of a frame is the tonemap composite into the target.
#[test]
fn frame_ends_with_post_processing_into_target() {
    let (mut test, mut renderer) = single_cube_scene(Vec3::ZERO);
    let exposure = 1.75;
    let settings = test.scene.read().post_processing().with_exposure(exposure);
    test.scene.write().set_post_processing(settings);

    renderer
        .render(&mut test.ctx, FramebufferHandle::DEFAULT)
        .unwrap();

    let last = test.ctx.draw_calls().last().unwrap();
    assert_eq!(last.shader_label.as_deref(), Some("PostProcessing"));
    assert_eq!(last.framebuffer, FramebufferHandle::DEFAULT);
    assert_eq!(
        last.uniform(UniformId::from_name("exposure")),
        Some(UniformValue::Float(exposure))
    );
}

#[test]
fn exposure_round_trips_exactly() {
    let test = TestContext::new(EXTENT);
    let settings = PostProcessSettings::default().with_exposure(0.123_456_7);

    test.scene.write().set_post_processing(settings);

    assert_eq!(test.scene.read().post_processing(), settings);
    assert_eq!(test.scene.read().post_processing().exposure, 0.123_456_7);
}

/// Consecutive frames reuse state without feedback loops or stale binds.
#[test]
fn repeated_frames_stay_clean() {
    let (mut test, mut renderer) = single_cube_scene(Vec3::ZERO);
    let map = test.environment_map(4);
    test.scene.write().set_skybox(Skybox::new(map));

    for _ in 0..3 {
        test.ctx.reset_frame_log();
        let stats = renderer
            .render(&mut test.ctx, FramebufferHandle::DEFAULT)
            .unwrap();
        assert_eq!(stats.opaque_draws, 1);
        assert!(stats.skybox_drawn);
    }
    assert!(test.ctx.violations().is_empty(), "{:?}", test.ctx.violations());
}

// ============================================================================
// Resource Tests
// ============================================================================

#[rstest]
#[case::grow(vec![Extent::new(640, 360)])]
#[case::shrink(vec![Extent::new(100, 50)])]
#[case::sequence(vec![Extent::new(640, 360), Extent::new(17, 9), Extent::new(320, 180)])]
fn resize_reallocates_every_target(#[case] sizes: Vec<Extent>) {
    let (mut test, mut renderer) = single_cube_scene(Vec3::ZERO);
    renderer
        .render(&mut test.ctx, FramebufferHandle::DEFAULT)
        .unwrap();
    let live_textures = test.ctx.live_texture_count();
    let live_framebuffers = test.ctx.live_framebuffer_count();

    for size in sizes {
        let before = test.ctx.bound_textures();
        test.viewport.resize(size);
        renderer
            .render(&mut test.ctx, FramebufferHandle::DEFAULT)
            .unwrap();

        assert_eq!(renderer.extent(), size);
        let full_size = [
            renderer.gbuffer().target(),
            renderer.ssr().target(),
            renderer.post_processing().target(),
        ];
        for target in full_size {
            let fb = target.framebuffer().unwrap();
            let extents = test.ctx.attachment_extents(fb);
            assert!(!extents.is_empty());
            assert!(
                extents.iter().all(|(_, e)| *e == size),
                "{} has {:?}, expected {:?}",
                target.label(),
                extents,
                size
            );
        }
        // render targets from before the resize are gone and not bound
        let gone: Vec<_> = before
            .into_iter()
            .filter(|t| !test.ctx.is_texture_alive(*t))
            .collect();
        assert!(gone.iter().all(|t| !test.ctx.bound_textures().contains(t)));
        assert!(test
            .ctx
            .bound_textures()
            .iter()
            .all(|t| test.ctx.is_texture_alive(*t)));
        assert_eq!(test.ctx.live_texture_count(), live_textures);
        assert_eq!(test.ctx.live_framebuffer_count(), live_framebuffers);
    }
    assert!(test.ctx.violations().is_empty(), "{:?}", test.ctx.violations());
}

/// Copying gbuffer depth into the SSR target reproduces it pixel for pixel.
#[test]
fn gbuffer_depth_copies_exactly() {
    let (mut test, renderer) = single_cube_scene(Vec3::ZERO);
    let gbuffer = renderer.gbuffer().target();
    let ssr = renderer.ssr().target();
    let gbuffer_fb = gbuffer.framebuffer().unwrap();
    let ssr_fb = ssr.framebuffer().unwrap();
    test.ctx
        .fill_depth(gbuffer_fb, |x, y| ((x * 7 + y * 13) % 101) as f32 / 100.0);

    gbuffer.copy_depth_to(&mut test.ctx, ssr).unwrap();

    let source = test.ctx.depth_values(gbuffer_fb).unwrap();
    let copied = test.ctx.depth_values(ssr_fb).unwrap();
    assert_eq!(source.len(), EXTENT.pixel_count());
    assert_eq!(source, copied);
    assert!(test
        .ctx
        .attachment_extents(ssr_fb)
        .iter()
        .any(|(point, _)| *point == AttachmentPoint::Depth));
}

/// A gbuffer that fails to reallocate abandons the frame before any draw.
#[test]
fn invalid_gbuffer_skips_the_frame() {
    let (mut test, mut renderer) = single_cube_scene(Vec3::ZERO);
    test.ctx.fail_allocations_labelled("gbuffer");
    test.viewport.resize(Extent::new(200, 100));

    let result = renderer.render(&mut test.ctx, FramebufferHandle::DEFAULT);

    assert_eq!(result, Err(RenderError::InvalidTarget("gbuffer".into())));
    assert!(test.ctx.draw_calls().is_empty());
    assert!(test.ctx.clears().is_empty());
    assert!(renderer.gbuffer().target().is_invalid());

    // recovers on the next successful resize
    test.ctx.clear_failures();
    test.viewport.resize(EXTENT);
    assert!(renderer
        .render(&mut test.ctx, FramebufferHandle::DEFAULT)
        .is_ok());
}

/// Reflections are optional: without their target the composite goes straight to post-processing.
#[test]
fn failed_ssr_target_degrades_gracefully() {
    let mut test = TestContext::new(EXTENT);
    test.add_cube(Mat4::IDENTITY, BoundingSphere::new(Vec3::ZERO, 1.0));
    test.ctx.fail_allocations_labelled("ssr");
    let mut renderer = test.renderer(&RendererConfig::default()).unwrap();
    test.ctx.clear_failures();

    renderer
        .render(&mut test.ctx, FramebufferHandle::DEFAULT)
        .unwrap();

    assert!(!renderer.ssr().is_valid());
    assert_eq!(test.ctx.draws_with_shader("PostScreenSpaceReflections"), 0);
    let composite = test
        .ctx
        .draw_calls()
        .iter()
        .find(|d| d.shader_label.as_deref() == Some("PostDeferredComposite"))
        .unwrap();
    assert_eq!(
        composite.framebuffer,
        renderer.post_processing().target_framebuffer().unwrap()
    );
    assert!(test.ctx.violations().is_empty(), "{:?}", test.ctx.violations());
}

#[rstest]
#[case::ssr("PostScreenSpaceReflections")]
#[case::skybox("FwdSkyboxShader")]
#[case::composite("PostDeferredComposite")]
fn missing_shader_is_a_configuration_error(#[case] missing: &str) {
    let mut test = TestContext::without_shader(EXTENT, Some(missing));
    let live_before = test.ctx.live_texture_count();

    let result = test.renderer(&RendererConfig::default());

    match result {
        Err(RenderError::Configuration(message)) => assert!(message.contains(missing)),
        other => panic!("expected a configuration error, got {:?}", other.map(|_| ())),
    }
    assert_eq!(test.ctx.live_texture_count(), live_before);
    assert_eq!(test.viewport.listener_count(), 0);
}

#[test]
fn teardown_releases_everything() {
    let (mut test, mut renderer) = single_cube_scene(Vec3::ZERO);
    renderer
        .render(&mut test.ctx, FramebufferHandle::DEFAULT)
        .unwrap();
    assert_eq!(test.viewport.listener_count(), 1);

    renderer.teardown(&mut test.ctx, &mut test.viewport);
    renderer.teardown(&mut test.ctx, &mut test.viewport);

    assert_eq!(test.ctx.live_framebuffer_count(), 0);
    assert_eq!(test.ctx.live_renderbuffer_count(), 0);
    // only the brdf lut remains
    assert_eq!(test.ctx.live_texture_count(), 1);
    assert_eq!(test.viewport.listener_count(), 0);
    assert!(matches!(
        renderer.render(&mut test.ctx, FramebufferHandle::DEFAULT),
        Err(RenderError::InvalidTarget(_))
    ));
}

// ============================================================================
// Overlay Tests
// ============================================================================

fn attach_outlines(test: &mut TestContext, renderer: &mut ShadedSceneRenderer) -> Arc<Mutex<OutlineRenderer>> {
    let mut outline = OutlineRenderer::new(&RendererConfig::default());
    outline
        .initialize(&mut test.ctx, &test.library, &mut test.viewport)
        .unwrap();
    let outline = Arc::new(Mutex::new(outline));
    OutlineRenderer::register(&outline, renderer.events_mut());
    outline
}

#[test]
fn outlines_without_extension_draw_nothing() {
    let (mut test, mut renderer) = single_cube_scene(Vec3::ZERO);
    let _outline = attach_outlines(&mut test, &mut renderer);

    renderer
        .render(&mut test.ctx, FramebufferHandle::DEFAULT)
        .unwrap();

    assert_eq!(test.ctx.draws_with_shader("FwdColorShader"), 0);
    assert_eq!(test.ctx.draws_with_shader("PostSobel"), 0);
}

#[test]
fn outlines_draw_after_the_composite() {
    let (mut test, mut renderer) = single_cube_scene(Vec3::ZERO);
    let outline = attach_outlines(&mut test, &mut renderer);
    {
        let mut scene = test.scene.write();
        let node = scene.add_node(Mat4::from_translation(Vec3::new(0.0, 0.0, -5.0)));
        let entry = MeshEntry::new(&test.cube, BoundingSphere::new(Vec3::ZERO, 1.0)).with_instance(node);
        let mut extension = OutlineExtension::new();
        extension.add_list(Vec4::new(1.0, 0.8, 0.0, 1.0), vec![entry]);
        scene.add_extension(Box::new(extension));
    }

    renderer
        .render(&mut test.ctx, FramebufferHandle::DEFAULT)
        .unwrap();

    let labels: Vec<_> = test
        .ctx
        .draw_calls()
        .iter()
        .filter_map(|d| d.shader_label.as_deref())
        .collect();
    let composite = labels.iter().position(|l| *l == "PostProcessing").unwrap();
    let silhouette = labels.iter().position(|l| *l == "FwdColorShader").unwrap();
    let edges = labels.iter().position(|l| *l == "PostSobel").unwrap();
    assert!(composite < silhouette && silhouette < edges);
    assert!(test.ctx.violations().is_empty(), "{:?}", test.ctx.violations());

    outline
        .lock()
        .teardown(&mut test.ctx, renderer.events_mut(), &mut test.viewport);
    assert_eq!(renderer.events_mut().listener_count(RenderEventKind::RenderOutlines), 0);
}
