use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use crate::animation::Action;
use crate::world::WorldNodeGraph;

/// Scene document model standing in for the host application's live scene
/// graph. Objects and collections are keyed by name, matching the host's
/// name-referenced object model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scene {
    #[serde(default = "default_frame_start")]
    pub frame_start: i32,
    #[serde(default = "default_frame_end")]
    pub frame_end: i32,
    #[serde(default)]
    pub objects: BTreeMap<String, SceneObject>,
    #[serde(default)]
    pub collections: BTreeMap<String, Collection>,
    #[serde(default)]
    pub root_members: BTreeSet<String>,
    #[serde(default)]
    pub materials: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub world: Option<WorldNodeGraph>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_camera: Option<String>,
    #[serde(default)]
    pub render: RenderSettings,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_file: Option<PathBuf>,
}

const fn default_frame_start() -> i32 {
    1
}

const fn default_frame_end() -> i32 {
    250
}

impl Default for Scene {
    fn default() -> Self {
        Self {
            frame_start: default_frame_start(),
            frame_end: default_frame_end(),
            objects: BTreeMap::new(),
            collections: BTreeMap::new(),
            root_members: BTreeSet::new(),
            materials: BTreeSet::new(),
            world: None,
            active_camera: None,
            render: RenderSettings::default(),
            project_file: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneObject {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    #[serde(default)]
    pub display_mode: DisplayMode,
    #[serde(default)]
    pub location: Vec3Data,
    #[serde(default)]
    pub rotation_euler: Vec3Data,
    pub data: ObjectData,
    /// Marker for transient objects owned by a preview run. Sweeps match on
    /// this tag first and fall back to the reserved name prefix.
    #[serde(default)]
    pub preview_tag: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub animation: Option<Action>,
}

impl SceneObject {
    pub fn new(name: impl Into<String>, data: ObjectData) -> Self {
        Self {
            name: name.into(),
            parent: None,
            display_mode: DisplayMode::default(),
            location: Vec3Data::default(),
            rotation_euler: Vec3Data::default(),
            data,
            preview_tag: false,
            animation: None,
        }
    }

    pub fn is_mesh(&self) -> bool {
        matches!(self.data, ObjectData::Mesh(_))
    }

    pub fn is_light(&self) -> bool {
        matches!(self.data, ObjectData::Light(_))
    }

    pub fn material_slots(&self) -> Option<&MaterialSlots> {
        match &self.data {
            ObjectData::Mesh(mesh) => Some(&mesh.material_slots),
            _ => None,
        }
    }

    pub fn material_slots_mut(&mut self) -> Option<&mut MaterialSlots> {
        match &mut self.data {
            ObjectData::Mesh(mesh) => Some(&mut mesh.material_slots),
            _ => None,
        }
    }

    pub fn animation_mut(&mut self) -> &mut Action {
        self.animation.get_or_insert_with(Action::default)
    }
}

pub type MaterialSlots = SmallVec<[Option<String>; 4]>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ObjectData {
    Empty,
    Mesh(MeshObjectData),
    Light(LightData),
    Camera,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MeshObjectData {
    #[serde(default)]
    pub material_slots: MaterialSlots,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LightData {
    pub kind: LightKind,
    pub energy: f32,
    #[serde(default = "default_light_color")]
    pub color: Vec3Data,
}

fn default_light_color() -> Vec3Data {
    Vec3Data { x: 1.0, y: 1.0, z: 1.0 }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LightKind {
    Point,
    Area,
    Sun,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DisplayMode {
    #[default]
    Textured,
    Solid,
    Wire,
}

/// Top-level grouping container. `exclude` hides the collection and its
/// members from both the viewport and renders, mirroring the host's
/// view-layer exclusion flag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Collection {
    pub name: String,
    #[serde(default)]
    pub members: BTreeSet<String>,
    #[serde(default)]
    pub exclude: bool,
}

impl Collection {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), members: BTreeSet::new(), exclude: false }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageFormatId {
    Png,
    Jpeg,
    Ffmpeg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaType {
    Image,
    Video,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VideoContainer {
    Mpeg4,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderSettings {
    pub engine: String,
    pub resolution_percentage: u32,
    pub resolution_x: u32,
    pub resolution_y: u32,
    #[serde(default)]
    pub filepath: PathBuf,
    pub image_format: ImageFormatId,
    /// Newer host versions split image/video selection out of the file
    /// format; older ones omit the field entirely.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<MediaType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_container: Option<VideoContainer>,
    #[serde(default)]
    pub use_ambient_occlusion: bool,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            engine: "BLENDER_WORKBENCH".to_string(),
            resolution_percentage: 100,
            resolution_x: 1920,
            resolution_y: 1080,
            filepath: PathBuf::new(),
            image_format: ImageFormatId::Png,
            media_type: Some(MediaType::Image),
            video_container: None,
            use_ambient_occlusion: false,
        }
    }
}

impl Scene {
    /// Registers an object without linking it anywhere, like the host's
    /// data-block creation call.
    pub fn add_object(&mut self, object: SceneObject) -> Result<()> {
        if self.objects.contains_key(&object.name) {
            bail!("object '{}' already exists", object.name);
        }
        self.objects.insert(object.name.clone(), object);
        Ok(())
    }

    /// Registers an object and links it into the scene root.
    pub fn add_root_object(&mut self, object: SceneObject) -> Result<()> {
        let name = object.name.clone();
        self.add_object(object)?;
        self.root_members.insert(name);
        Ok(())
    }

    /// Removes an object, detaching its children and unlinking it from the
    /// root and every collection. Clears the active camera if it pointed at
    /// the removed object.
    pub fn remove_object(&mut self, name: &str) {
        if self.objects.remove(name).is_none() {
            return;
        }
        for object in self.objects.values_mut() {
            if object.parent.as_deref() == Some(name) {
                object.parent = None;
            }
        }
        self.root_members.remove(name);
        for collection in self.collections.values_mut() {
            collection.members.remove(name);
        }
        if self.active_camera.as_deref() == Some(name) {
            self.active_camera = None;
        }
    }

    pub fn reparent(&mut self, child: &str, parent: Option<&str>) -> Result<()> {
        if let Some(parent) = parent {
            if !self.objects.contains_key(parent) {
                bail!("parent object '{parent}' does not exist");
            }
        }
        let object =
            self.objects.get_mut(child).ok_or_else(|| anyhow!("object '{child}' does not exist"))?;
        object.parent = parent.map(|p| p.to_string());
        Ok(())
    }

    pub fn children_of(&self, name: &str) -> Vec<String> {
        self.objects
            .values()
            .filter(|object| object.parent.as_deref() == Some(name))
            .map(|object| object.name.clone())
            .collect()
    }

    pub fn create_collection(&mut self, name: impl Into<String>) -> Result<()> {
        let name = name.into();
        if self.collections.contains_key(&name) {
            bail!("collection '{name}' already exists");
        }
        self.collections.insert(name.clone(), Collection::new(name));
        Ok(())
    }

    pub fn link_to_collection(&mut self, collection: &str, object: &str) -> Result<()> {
        if !self.objects.contains_key(object) {
            bail!("object '{object}' does not exist");
        }
        let collection = self
            .collections
            .get_mut(collection)
            .ok_or_else(|| anyhow!("collection '{collection}' does not exist"))?;
        collection.members.insert(object.to_string());
        Ok(())
    }

    /// Number of containers (collections plus the scene root) an object is
    /// linked into.
    pub fn users_collection(&self, object: &str) -> usize {
        let mut count = usize::from(self.root_members.contains(object));
        count += self.collections.values().filter(|c| c.members.contains(object)).count();
        count
    }

    /// Unlinks every member of a collection and removes it; members that
    /// would otherwise become orphaned are relinked into the scene root.
    pub fn remove_collection(&mut self, name: &str) {
        let Some(collection) = self.collections.remove(name) else {
            return;
        };
        for member in collection.members {
            if self.objects.contains_key(&member) && self.users_collection(&member) == 0 {
                self.root_members.insert(member);
            }
        }
    }

    pub fn add_material(&mut self, name: impl Into<String>) {
        self.materials.insert(name.into());
    }

    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path).with_context(|| format!("Reading scene file {}", path.display()))?;
        let scene = serde_json::from_slice::<Scene>(&bytes)
            .with_context(|| format!("Parsing scene file {}", path.display()))?;
        Ok(scene)
    }

    pub fn save_to_path(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Creating scene directory {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json.as_bytes())
            .with_context(|| format!("Writing scene file {}", path.display()))?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Vec3Data {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl From<glam::Vec3> for Vec3Data {
    fn from(value: glam::Vec3) -> Self {
        Self { x: value.x, y: value.y, z: value.z }
    }
}

impl From<Vec3Data> for glam::Vec3 {
    fn from(value: Vec3Data) -> Self {
        glam::Vec3::new(value.x, value.y, value.z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mesh(name: &str) -> SceneObject {
        SceneObject::new(name, ObjectData::Mesh(MeshObjectData::default()))
    }

    #[test]
    fn remove_object_detaches_children_and_unlinks() {
        let mut scene = Scene::default();
        scene.add_root_object(mesh("parent")).expect("add parent");
        scene.add_root_object(mesh("child")).expect("add child");
        scene.reparent("child", Some("parent")).expect("reparent");
        scene.create_collection("group").expect("create collection");
        scene.link_to_collection("group", "parent").expect("link");

        scene.remove_object("parent");

        assert!(scene.objects.get("child").expect("child survives").parent.is_none());
        assert!(!scene.collections["group"].members.contains("parent"));
        assert!(!scene.root_members.contains("parent"));
    }

    #[test]
    fn remove_collection_relinks_orphans_to_root() {
        let mut scene = Scene::default();
        scene.add_object(mesh("a")).expect("add a");
        scene.create_collection("group").expect("create collection");
        scene.link_to_collection("group", "a").expect("link");
        assert_eq!(scene.users_collection("a"), 1);

        scene.remove_collection("group");
        assert!(scene.root_members.contains("a"));
    }

    #[test]
    fn reparent_rejects_missing_parent() {
        let mut scene = Scene::default();
        scene.add_root_object(mesh("a")).expect("add a");
        assert!(scene.reparent("a", Some("ghost")).is_err());
    }
}
