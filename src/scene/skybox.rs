//! Skybox and environment map references

use std::sync::Arc;

use crate::backend::TextureHandle;

/// Prefiltered environment cube maps
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvironmentMap {
    pub radiance: TextureHandle,
    pub irradiance: TextureHandle,
    /// Mip levels of the radiance map
    pub mip_count: u32,
}

/// Background of a scene; without an environment map nothing is drawn
#[derive(Debug, Clone, Default)]
pub struct Skybox {
    pub environment_map: Option<Arc<EnvironmentMap>>,
    /// Selects which radiance mip the background samples
    pub roughness: f32,
}

impl Skybox {
    pub fn new(environment_map: Arc<EnvironmentMap>) -> Self {
        Self {
            environment_map: Some(environment_map),
            roughness: 0.0,
        }
    }

    pub fn with_roughness(mut self, roughness: f32) -> Self {
        self.roughness = roughness;
        self
    }
}
