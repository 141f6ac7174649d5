//! Scene Renderer - a deferred scene-rendering pipeline
//!
//! Renders a scene of instanced meshes, directional lights and an optional
//! environment map through a fixed sequence of passes:
//! - Geometry buffer fill with per-instance frustum culling
//! - Ambient / image-based lighting composite
//! - Additive directional light volumes
//! - Screen-space reflections
//! - Forward skybox
//! - Bloom, exposure and tonemapping into the presented framebuffer
//! - Overlay events for auxiliary renderers such as outlines
//!
//! Every pass talks to the GPU through [`backend::GpuContext`].
//! [`backend::HeadlessContext`] implements it in memory for tests and tools.

pub mod backend;
pub mod error;
pub mod events;
pub mod pipeline;
pub mod resources;
pub mod scene;
pub mod target;
pub mod viewport;

// Re-export Bevy ECS prelude for users
pub use bevy_ecs::prelude::*;

pub use error::{RenderError, RenderResult};
pub use pipeline::{FrameStats, OutlineRenderer, ShadedSceneRenderer};
pub use viewport::{Extent, Viewport};

use glam::Vec4;

/// Asset identifiers of every shader and texture the pipeline resolves at initialize
#[derive(Debug, Clone)]
pub struct ShaderSet {
    pub skybox: String,
    pub deferred_composite: String,
    pub direct_light: String,
    pub ssr: String,
    pub bloom: String,
    pub post_processing: String,
    pub outline_color: String,
    pub outline_sobel: String,
    /// Precomputed split-sum BRDF lookup texture
    pub brdf_lut: String,
}

impl Default for ShaderSet {
    fn default() -> Self {
        Self {
            skybox: "FwdSkyboxShader".to_string(),
            deferred_composite: "PostDeferredComposite".to_string(),
            direct_light: "DirectLightVolume".to_string(),
            ssr: "PostScreenSpaceReflections".to_string(),
            bloom: "PostBloom".to_string(),
            post_processing: "PostProcessing".to_string(),
            outline_color: "FwdColorShader".to_string(),
            outline_sobel: "PostSobel".to_string(),
            brdf_lut: "BrdfLut".to_string(),
        }
    }
}

/// Configuration for initializing the renderer
#[derive(Debug, Clone)]
pub struct RendererConfig {
    /// Gbuffer clear color
    pub clear_color: Vec4,
    /// Enable bloom post-processing
    pub enable_bloom: bool,
    /// Number of halving bloom levels
    pub bloom_mip_levels: u32,
    /// How strongly occluded outline fragments are dimmed
    pub outline_occlusion_factor: f32,
    pub shaders: ShaderSet,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            clear_color: Vec4::new(0.0, 0.0, 0.0, 1.0),
            enable_bloom: true,
            bloom_mip_levels: 5,
            outline_occlusion_factor: 0.15,
            shaders: ShaderSet::default(),
        }
    }
}

impl RendererConfig {
    pub fn with_clear_color(mut self, color: Vec4) -> Self {
        self.clear_color = color;
        self
    }

    pub fn with_bloom(mut self, enabled: bool) -> Self {
        self.enable_bloom = enabled;
        self
    }

    pub fn with_bloom_mip_levels(mut self, levels: u32) -> Self {
        self.bloom_mip_levels = levels;
        self
    }

    pub fn with_outline_occlusion_factor(mut self, factor: f32) -> Self {
        self.outline_occlusion_factor = factor;
        self
    }

    pub fn with_shaders(mut self, shaders: ShaderSet) -> Self {
        self.shaders = shaders;
        self
    }
}

/// Install `env_logger`, honouring `RUST_LOG`; later calls are ignored
#[cfg(not(target_arch = "wasm32"))]
pub fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .try_init();
}
