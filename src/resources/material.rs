//! Materials and their uniform upload contract

use std::fmt::Debug;
use std::sync::Arc;

use glam::{Mat4, Vec3, Vec4};

use super::library::ShaderProgram;
use crate::backend::{GpuContext, TextureTarget, UniformId, UniformValue};
use crate::scene::{Camera, EnvironmentMap};

pub const MODEL: UniformId = UniformId::from_name("model");
pub const VIEW_PROJ: UniformId = UniformId::from_name("viewProj");
pub const WORLD_VIEW_PROJ: UniformId = UniformId::from_name("worldViewProj");
pub const CAMERA_POSITION: UniformId = UniformId::from_name("camPos");
pub const COLOR: UniformId = UniformId::from_name("uColor");

const BASE_COLOR: UniformId = UniformId::from_name("baseColor");
const METALLIC: UniformId = UniformId::from_name("metallic");
const ROUGHNESS: UniformId = UniformId::from_name("roughness");
const EMISSIVE: UniformId = UniformId::from_name("emissive");

const SKYBOX: UniformId = UniformId::from_name("skybox");
const NUM_MIP_MAPS: UniformId = UniformId::from_name("numMipMaps");

/// Something that can be drawn with a shader program
///
/// The renderer binds [`Material::shader`] once per collection, calls
/// [`Material::upload_shared`] once per material and [`Material::upload_model`]
/// once per visible instance.
pub trait Material: Send + Sync + Debug {
    fn shader(&self) -> &Arc<ShaderProgram>;

    /// Uniforms shared by every instance drawn with this material
    fn upload_shared(&self, ctx: &mut dyn GpuContext, camera: &Camera);

    /// Per-instance world transform
    fn upload_model(&self, ctx: &mut dyn GpuContext, model: &Mat4);
}

/// PBR material properties
#[derive(Debug, Clone)]
pub struct PbrMaterial {
    pub name: String,
    pub shader: Arc<ShaderProgram>,
    pub base_color: Vec4,
    pub metallic: f32,
    pub roughness: f32,
    pub emissive: Vec3,
    pub emissive_strength: f32,
}

impl PbrMaterial {
    pub fn new(name: &str, shader: Arc<ShaderProgram>) -> Self {
        Self {
            name: name.to_string(),
            shader,
            base_color: Vec4::ONE,
            metallic: 0.0,
            roughness: 0.5,
            emissive: Vec3::ZERO,
            emissive_strength: 1.0,
        }
    }

    pub fn with_base_color(mut self, color: Vec4) -> Self {
        self.base_color = color;
        self
    }

    pub fn with_metallic(mut self, metallic: f32) -> Self {
        self.metallic = metallic;
        self
    }

    pub fn with_roughness(mut self, roughness: f32) -> Self {
        self.roughness = roughness;
        self
    }

    pub fn with_emissive(mut self, emissive: Vec3, strength: f32) -> Self {
        self.emissive = emissive;
        self.emissive_strength = strength;
        self
    }

    // Preset materials

    pub fn plastic(shader: Arc<ShaderProgram>, color: Vec3) -> Self {
        Self::new("plastic", shader)
            .with_base_color(color.extend(1.0))
            .with_roughness(0.4)
    }
}

impl Material for PbrMaterial {
    fn shader(&self) -> &Arc<ShaderProgram> {
        &self.shader
    }

    fn upload_shared(&self, ctx: &mut dyn GpuContext, camera: &Camera) {
        ctx.upload_uniform(VIEW_PROJ, camera.view_projection().into());
        ctx.upload_uniform(CAMERA_POSITION, camera.position().into());
        ctx.upload_uniform(BASE_COLOR, self.base_color.into());
        ctx.upload_uniform(METALLIC, self.metallic.into());
        ctx.upload_uniform(ROUGHNESS, self.roughness.into());
        ctx.upload_uniform(EMISSIVE, (self.emissive * self.emissive_strength).into());
    }

    fn upload_model(&self, ctx: &mut dyn GpuContext, model: &Mat4) {
        ctx.upload_uniform(MODEL, (*model).into());
    }
}

/// Flat unlit color, used for highlight silhouettes and debug geometry
#[derive(Debug, Clone)]
pub struct ColorMaterial {
    pub shader: Arc<ShaderProgram>,
    pub color: Vec4,
}

impl ColorMaterial {
    pub fn new(shader: Arc<ShaderProgram>, color: Vec4) -> Self {
        Self { shader, color }
    }
}

impl Material for ColorMaterial {
    fn shader(&self) -> &Arc<ShaderProgram> {
        &self.shader
    }

    fn upload_shared(&self, ctx: &mut dyn GpuContext, camera: &Camera) {
        ctx.upload_uniform(WORLD_VIEW_PROJ, camera.view_projection().into());
        ctx.upload_uniform(COLOR, self.color.into());
    }

    fn upload_model(&self, ctx: &mut dyn GpuContext, model: &Mat4) {
        ctx.upload_uniform(MODEL, (*model).into());
    }
}

/// Bind the radiance cube map on unit 0 and upload the background sampling parameters
///
/// Expects the skybox program to be bound.
pub fn upload_skybox(
    ctx: &mut dyn GpuContext,
    environment_map: &EnvironmentMap,
    roughness: f32,
    camera: &Camera,
) {
    ctx.upload_uniform(SKYBOX, UniformValue::Sampler(0));
    ctx.lazy_bind_texture(0, TextureTarget::CubeMap, environment_map.radiance);

    ctx.upload_uniform(NUM_MIP_MAPS, UniformValue::Int(environment_map.mip_count as i32));
    ctx.upload_uniform(ROUGHNESS, roughness.into());

    ctx.upload_uniform(VIEW_PROJ, camera.stat_view_projection().into());
}

/// Forward material drawing an environment map as the background
#[derive(Debug, Clone)]
pub struct SkyboxMaterial {
    pub shader: Arc<ShaderProgram>,
    pub environment_map: Arc<EnvironmentMap>,
    pub roughness: f32,
}

impl SkyboxMaterial {
    pub fn new(shader: Arc<ShaderProgram>, environment_map: Arc<EnvironmentMap>) -> Self {
        Self {
            shader,
            environment_map,
            roughness: 0.0,
        }
    }
}

impl Material for SkyboxMaterial {
    fn shader(&self) -> &Arc<ShaderProgram> {
        &self.shader
    }

    fn upload_shared(&self, ctx: &mut dyn GpuContext, camera: &Camera) {
        upload_skybox(ctx, &self.environment_map, self.roughness, camera);
    }

    /// The skybox is centered on the camera, so there is no model transform
    fn upload_model(&self, _ctx: &mut dyn GpuContext, _model: &Mat4) {}
}
