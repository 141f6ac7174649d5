//! Resource lookup by identifier

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::backend::types::fnv1a;
use crate::backend::{BackendResult, GpuContext, ShaderHandle, TextureHandle, TextureTarget};
use crate::error::{RenderError, RenderResult};
use crate::scene::EnvironmentMap;

/// Identifier of a loadable asset, an FNV-1a hash of its name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AssetId(pub u64);

impl AssetId {
    pub const fn from_name(name: &str) -> Self {
        Self(fnv1a(name.as_bytes()))
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#018x}", self.0)
    }
}

/// A linked shader program
#[derive(Debug, PartialEq, Eq)]
pub struct ShaderProgram {
    pub name: String,
    pub handle: ShaderHandle,
}

impl ShaderProgram {
    pub fn bind(&self, ctx: &mut dyn GpuContext) {
        ctx.set_shader(self.handle);
    }
}

/// A loaded texture and how it must be bound
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureAsset {
    pub handle: TextureHandle,
    pub target: TextureTarget,
}

/// Asset source the renderer resolves its shaders and textures from
pub trait ResourceLibrary {
    fn shader(&self, id: AssetId) -> Option<Arc<ShaderProgram>>;

    fn texture(&self, id: AssetId) -> Option<TextureAsset>;

    fn environment_map(&self, id: AssetId) -> Option<Arc<EnvironmentMap>>;

    /// Resolve a shader the pipeline cannot run without
    fn require_shader(&self, name: &str) -> RenderResult<Arc<ShaderProgram>> {
        self.shader(AssetId::from_name(name))
            .ok_or_else(|| RenderError::Configuration(format!("missing shader '{}'", name)))
    }

    fn require_texture(&self, name: &str) -> RenderResult<TextureAsset> {
        self.texture(AssetId::from_name(name))
            .ok_or_else(|| RenderError::Configuration(format!("missing texture '{}'", name)))
    }
}

/// In-memory [`ResourceLibrary`]
#[derive(Debug, Default)]
pub struct ResourceCache {
    shaders: HashMap<AssetId, Arc<ShaderProgram>>,
    textures: HashMap<AssetId, TextureAsset>,
    environment_maps: HashMap<AssetId, Arc<EnvironmentMap>>,
}

impl ResourceCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a program in `ctx` and register it under `name`
    pub fn load_shader(
        &mut self,
        ctx: &mut dyn GpuContext,
        name: &str,
    ) -> BackendResult<Arc<ShaderProgram>> {
        let id = AssetId::from_name(name);
        if let Some(shader) = self.shaders.get(&id) {
            return Ok(Arc::clone(shader));
        }
        let handle = ctx.create_shader(name)?;
        let shader = Arc::new(ShaderProgram {
            name: name.to_string(),
            handle,
        });
        log::debug!("Loaded shader {} ({})", name, id);
        self.shaders.insert(id, Arc::clone(&shader));
        Ok(shader)
    }

    pub fn insert_texture(&mut self, name: &str, texture: TextureAsset) {
        self.textures.insert(AssetId::from_name(name), texture);
    }

    pub fn insert_environment_map(&mut self, name: &str, map: Arc<EnvironmentMap>) {
        self.environment_maps.insert(AssetId::from_name(name), map);
    }

    pub fn shader_count(&self) -> usize {
        self.shaders.len()
    }
}

impl ResourceLibrary for ResourceCache {
    fn shader(&self, id: AssetId) -> Option<Arc<ShaderProgram>> {
        self.shaders.get(&id).cloned()
    }

    fn texture(&self, id: AssetId) -> Option<TextureAsset> {
        self.textures.get(&id).copied()
    }

    fn environment_map(&self, id: AssetId) -> Option<Arc<EnvironmentMap>> {
        self.environment_maps.get(&id).cloned()
    }
}
