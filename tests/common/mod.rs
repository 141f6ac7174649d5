//! Common utilities for pipeline integration tests.
//!
//! Builds a headless context with every pipeline asset registered and a
//! shared scene that tests populate.

// each test binary uses a different subset
#![allow(dead_code)]

use std::sync::Arc;

use glam::{Mat4, Vec3};

use scene_renderer::backend::{GpuContext, HeadlessContext, TextureDescriptor, TextureTarget};
use scene_renderer::resources::{GpuMesh, Mesh, PbrMaterial, ResourceCache, ShaderProgram, TextureAsset};
use scene_renderer::scene::{
    BoundingSphere, EnvironmentMap, MaterialCollection, MeshEntry, NodeId, Scene, SharedScene,
};
use scene_renderer::{Extent, RenderResult, RendererConfig, ShadedSceneRenderer, ShaderSet, Viewport};

pub const GBUFFER_SHADER: &str = "GBufferPbr";

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Every asset name the renderer resolves, shaders first
pub fn pipeline_shaders(set: &ShaderSet) -> Vec<String> {
    vec![
        set.skybox.clone(),
        set.deferred_composite.clone(),
        set.direct_light.clone(),
        set.ssr.clone(),
        set.bloom.clone(),
        set.post_processing.clone(),
        set.outline_color.clone(),
        set.outline_sobel.clone(),
    ]
}

pub struct TestContext {
    pub ctx: HeadlessContext,
    pub viewport: Viewport,
    pub library: ResourceCache,
    pub scene: SharedScene,
    pub pbr: Arc<ShaderProgram>,
    pub cube: GpuMesh,
}

impl TestContext {
    pub fn new(extent: Extent) -> Self {
        Self::without_shader(extent, None)
    }

    /// Like [`TestContext::new`] but never registers `missing`
    pub fn without_shader(extent: Extent, missing: Option<&str>) -> Self {
        init_logging();
        let mut ctx = HeadlessContext::new(extent);
        let mut library = ResourceCache::new();
        for name in pipeline_shaders(&ShaderSet::default()) {
            if Some(name.as_str()) != missing {
                library.load_shader(&mut ctx, &name).unwrap();
            }
        }
        let pbr = library.load_shader(&mut ctx, GBUFFER_SHADER).unwrap();

        let lut = ctx
            .create_texture(&TextureDescriptor {
                label: Some("brdf lut".into()),
                width: 64,
                height: 64,
                ..Default::default()
            })
            .unwrap();
        library.insert_texture(
            &ShaderSet::default().brdf_lut,
            TextureAsset {
                handle: lut,
                target: TextureTarget::Texture2D,
            },
        );

        let cube = Mesh::cube().upload(&mut ctx).unwrap();
        Self {
            ctx,
            viewport: Viewport::new(extent),
            library,
            scene: Scene::new().into_shared(),
            pbr,
            cube,
        }
    }

    pub fn renderer(&mut self, config: &RendererConfig) -> RenderResult<ShadedSceneRenderer> {
        ShadedSceneRenderer::initialize(
            &mut self.ctx,
            &self.library,
            Arc::clone(&self.scene),
            &mut self.viewport,
            config,
        )
    }

    /// Radiance and irradiance cube maps with `mip_count` levels
    pub fn environment_map(&mut self, mip_count: u32) -> Arc<EnvironmentMap> {
        let mut cube = |label: &str| {
            self.ctx
                .create_texture(&TextureDescriptor {
                    label: Some(label.into()),
                    width: 32,
                    height: 32,
                    mip_levels: mip_count,
                    target: TextureTarget::CubeMap,
                    ..Default::default()
                })
                .unwrap()
        };
        Arc::new(EnvironmentMap {
            radiance: cube("radiance"),
            irradiance: cube("irradiance"),
            mip_count,
        })
    }

    /// Add one cube instance in its own collection
    pub fn add_cube(&mut self, transform: Mat4, bounds: BoundingSphere) -> NodeId {
        let mut scene = self.scene.write();
        let node = scene.add_node(transform);
        let material = Arc::new(PbrMaterial::plastic(Arc::clone(&self.pbr), Vec3::ONE));
        let entry = MeshEntry::new(&self.cube, bounds).with_instance(node);
        scene.add_collection(
            MaterialCollection::new(Arc::clone(&self.pbr)).with_material(material, vec![entry]),
        );
        node
    }
}
