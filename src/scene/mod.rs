//! Scene management
//!
//! The renderer reads scenes through [`RenderScene`]. [`Scene`] is the in-crate
//! implementation: render collections, lights, skybox, post-processing settings,
//! node transforms and optional per-feature extensions.

mod camera;
mod collection;
mod frustum;
mod light;
mod settings;
mod skybox;
mod transform;

pub use camera::*;
pub use collection::*;
pub use frustum::*;
pub use light::*;
pub use settings::*;
pub use skybox::*;
pub use transform::*;

use std::any::Any;
use std::fmt::Debug;
use std::sync::Arc;

use bevy_ecs::prelude::*;
use glam::{Vec3, Vec4};
use parking_lot::RwLock;

use crate::backend::types::fnv1a;

/// Identifier of a scene extension type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExtensionId(pub u64);

impl ExtensionId {
    pub const fn from_name(name: &str) -> Self {
        Self(fnv1a(name.as_bytes()))
    }
}

/// Optional per-feature data attached to a scene
pub trait SceneExtension: Any + Send + Sync + Debug {
    fn id(&self) -> ExtensionId;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Meshes highlighted with one color
#[derive(Debug, Clone)]
pub struct OutlineList {
    pub color: Vec4,
    pub meshes: Vec<MeshEntry>,
}

/// Instances the outline renderer draws silhouettes for
#[derive(Debug, Clone, Default)]
pub struct OutlineExtension {
    lists: Vec<OutlineList>,
}

impl OutlineExtension {
    pub const ID: ExtensionId = ExtensionId::from_name("OutlineExtension");

    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_list(&mut self, color: Vec4, meshes: Vec<MeshEntry>) {
        self.lists.push(OutlineList { color, meshes });
    }

    pub fn lists(&self) -> &[OutlineList] {
        &self.lists
    }

    pub fn clear(&mut self) {
        self.lists.clear();
    }
}

impl SceneExtension for OutlineExtension {
    fn id(&self) -> ExtensionId {
        Self::ID
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Read access to everything the renderer draws
pub trait RenderScene: Send + Sync {
    /// Opaque collections, one per shader
    fn opaque_renderables(&self) -> &[MaterialCollection];

    fn lights(&self) -> &[Light];

    fn directional_lights(&self) -> Vec<DirectionalLight> {
        self.lights()
            .iter()
            .filter_map(Light::as_directional)
            .copied()
            .collect()
    }

    fn skybox(&self) -> &Skybox;

    /// Copy of the current settings
    fn post_processing(&self) -> PostProcessSettings;

    /// Replace the settings as a whole
    fn set_post_processing(&mut self, settings: PostProcessSettings);

    fn nodes(&self) -> &NodeStore;

    fn extension(&self, id: ExtensionId) -> Option<&dyn SceneExtension>;
}

/// Look up an extension and downcast it to its concrete type
pub fn find_extension<T: SceneExtension>(scene: &dyn RenderScene, id: ExtensionId) -> Option<&T> {
    scene.extension(id)?.as_any().downcast_ref::<T>()
}

/// The scene containing all renderable content
#[derive(Debug, Default)]
pub struct Scene {
    pub collections: Vec<MaterialCollection>,
    pub lights: Vec<Light>,
    pub skybox: Skybox,
    pub nodes: NodeStore,
    post_processing: PostProcessSettings,
    extensions: Vec<Box<dyn SceneExtension>>,
}

/// A scene shared between the renderer and whoever mutates it between frames
pub type SharedScene = Arc<RwLock<Scene>>;

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_shared(self) -> SharedScene {
        Arc::new(RwLock::new(self))
    }

    pub fn add_node(&mut self, transform: glam::Mat4) -> NodeId {
        self.nodes.insert(transform)
    }

    pub fn add_collection(&mut self, collection: MaterialCollection) {
        self.collections.push(collection);
    }

    /// Add a directional light to the scene
    pub fn add_directional_light(&mut self, direction: Vec3, color: Vec3, brightness: f32) {
        self.lights
            .push(DirectionalLight::new(direction, color, brightness).into());
    }

    /// Add a point light to the scene
    pub fn add_point_light(&mut self, position: Vec3, color: Vec3, brightness: f32, radius: f32) {
        self.lights
            .push(PointLight::new(color, brightness, radius).at(position).into());
    }

    pub fn set_skybox(&mut self, skybox: Skybox) {
        self.skybox = skybox;
    }

    /// Attach an extension, replacing any with the same id
    pub fn add_extension(&mut self, extension: Box<dyn SceneExtension>) {
        let id = extension.id();
        self.extensions.retain(|e| e.id() != id);
        self.extensions.push(extension);
    }

    pub fn remove_extension(&mut self, id: ExtensionId) -> bool {
        let before = self.extensions.len();
        self.extensions.retain(|e| e.id() != id);
        self.extensions.len() != before
    }

    pub fn extension_mut<T: SceneExtension>(&mut self, id: ExtensionId) -> Option<&mut T> {
        self.extensions
            .iter_mut()
            .find(|e| e.id() == id)?
            .as_any_mut()
            .downcast_mut::<T>()
    }

    pub fn point_light_count(&self) -> usize {
        self.lights
            .iter()
            .filter(|l| matches!(l, Light::Point(_)))
            .count()
    }

    /// Rebuild the light list from light components in `world`
    ///
    /// Point lights take their position from a `Transform` on the same entity
    /// when one exists.
    pub fn gather_lights(&mut self, world: &mut World) {
        self.lights.clear();

        let mut directional = world.query::<&DirectionalLight>();
        self.lights
            .extend(directional.iter(world).map(|l| Light::Directional(*l)));

        let mut point = world.query::<(&PointLight, Option<&Transform>)>();
        self.lights.extend(point.iter(world).map(|(light, transform)| {
            let mut light = *light;
            if let Some(transform) = transform {
                light.position = transform.position;
            }
            Light::Point(light)
        }));

        log::debug!("Gathered {} lights from the world", self.lights.len());
    }

    /// Write every `Transform` linked through a [`SceneNode`] into the node store
    ///
    /// Returns how many nodes were updated. Links to removed nodes are skipped.
    pub fn sync_nodes(&mut self, world: &mut World) -> usize {
        let mut linked = world.query::<(&Transform, &SceneNode)>();
        let mut updated = 0;
        for (transform, node) in linked.iter(world) {
            if self.nodes.set(node.0, transform.matrix()) {
                updated += 1;
            } else {
                log::warn!("Entity links to unknown scene node {:?}", node.0);
            }
        }
        updated
    }
}

impl RenderScene for Scene {
    fn opaque_renderables(&self) -> &[MaterialCollection] {
        &self.collections
    }

    fn lights(&self) -> &[Light] {
        &self.lights
    }

    fn skybox(&self) -> &Skybox {
        &self.skybox
    }

    fn post_processing(&self) -> PostProcessSettings {
        self.post_processing
    }

    fn set_post_processing(&mut self, settings: PostProcessSettings) {
        self.post_processing = settings;
    }

    fn nodes(&self) -> &NodeStore {
        &self.nodes
    }

    fn extension(&self, id: ExtensionId) -> Option<&dyn SceneExtension> {
        self.extensions
            .iter()
            .find(|e| e.id() == id)
            .map(|e| e.as_ref())
    }
}
