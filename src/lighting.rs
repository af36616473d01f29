use anyhow::Result;
use glam::Vec3;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::scene::{LightData, LightKind, ObjectData, Scene, SceneObject, Vec3Data};

pub const KEY_LIGHT_NAME: &str = "Preview_Key_Light";
pub const FILL_LIGHT_NAME: &str = "Preview_Fill_Light";
pub const SUN_LIGHT_NAME: &str = "Preview_Sun_Light";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LightingPreset {
    #[default]
    None,
    Studio,
    Sunset,
}

impl LightingPreset {
    pub fn label(self) -> &'static str {
        match self {
            LightingPreset::None => "None",
            LightingPreset::Studio => "Studio",
            LightingPreset::Sunset => "Sunset",
        }
    }
}

/// Applies a lighting preset inside the rig collection. Lights already in
/// the collection that are not part of the user's selection are removed
/// first, so re-running a preset never accumulates helper lights.
pub fn apply_lighting_preset(
    scene: &mut Scene,
    preset: LightingPreset,
    collection: &str,
    selection: &BTreeSet<String>,
) -> Result<()> {
    if preset == LightingPreset::None {
        return Ok(());
    }

    let stale: Vec<String> = scene
        .collections
        .get(collection)
        .map(|entry| {
            entry
                .members
                .iter()
                .filter(|name| !selection.contains(*name))
                .filter(|name| scene.objects.get(*name).is_some_and(SceneObject::is_light))
                .cloned()
                .collect()
        })
        .unwrap_or_default();
    for name in stale {
        scene.remove_object(&name);
    }

    match preset {
        LightingPreset::None => {}
        LightingPreset::Studio => {
            add_preset_light(
                scene,
                collection,
                KEY_LIGHT_NAME,
                LightKind::Area,
                1000.0,
                Vec3::new(1.0, 1.0, 1.0),
                Vec3::new(5.0, -5.0, 5.0),
                Vec3::new(45f32.to_radians(), 0.0, 45f32.to_radians()),
            )?;
            add_preset_light(
                scene,
                collection,
                FILL_LIGHT_NAME,
                LightKind::Area,
                500.0,
                Vec3::new(1.0, 1.0, 1.0),
                Vec3::new(-5.0, -5.0, 5.0),
                Vec3::new(45f32.to_radians(), 0.0, (-45f32).to_radians()),
            )?;
        }
        LightingPreset::Sunset => {
            add_preset_light(
                scene,
                collection,
                SUN_LIGHT_NAME,
                LightKind::Sun,
                5.0,
                Vec3::new(1.0, 0.5, 0.0),
                Vec3::ZERO,
                Vec3::new(120f32.to_radians(), 0.0, 45f32.to_radians()),
            )?;
        }
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn add_preset_light(
    scene: &mut Scene,
    collection: &str,
    name: &str,
    kind: LightKind,
    energy: f32,
    color: Vec3,
    location: Vec3,
    rotation: Vec3,
) -> Result<()> {
    let mut light =
        SceneObject::new(name, ObjectData::Light(LightData { kind, energy, color: Vec3Data::from(color) }));
    light.location = location.into();
    light.rotation_euler = rotation.into();
    light.preview_tag = true;
    scene.add_object(light)?;
    scene.link_to_collection(collection, name)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::MeshObjectData;

    fn rigged_scene() -> (Scene, BTreeSet<String>) {
        let mut scene = Scene::default();
        scene
            .add_root_object(SceneObject::new("statue", ObjectData::Mesh(MeshObjectData::default())))
            .expect("add mesh");
        scene.create_collection("Preview_Collection").expect("create collection");
        scene.link_to_collection("Preview_Collection", "statue").expect("link");
        let selection = BTreeSet::from(["statue".to_string()]);
        (scene, selection)
    }

    #[test]
    fn studio_preset_adds_key_and_fill() {
        let (mut scene, selection) = rigged_scene();
        apply_lighting_preset(&mut scene, LightingPreset::Studio, "Preview_Collection", &selection)
            .expect("apply studio");

        let key = &scene.objects[KEY_LIGHT_NAME];
        let fill = &scene.objects[FILL_LIGHT_NAME];
        let (ObjectData::Light(key_data), ObjectData::Light(fill_data)) = (&key.data, &fill.data) else {
            panic!("preset objects should be lights");
        };
        assert_eq!(key_data.energy, 1000.0);
        assert_eq!(fill_data.energy, 500.0);
        assert_eq!(key.location, Vec3Data { x: 5.0, y: -5.0, z: 5.0 });
        assert_eq!(fill.location, Vec3Data { x: -5.0, y: -5.0, z: 5.0 });
        assert!((key.rotation_euler.z - 45f32.to_radians()).abs() < 1e-6);
        assert!((fill.rotation_euler.z + 45f32.to_radians()).abs() < 1e-6);
    }

    #[test]
    fn reapplying_studio_does_not_accumulate_lights() {
        let (mut scene, selection) = rigged_scene();
        apply_lighting_preset(&mut scene, LightingPreset::Studio, "Preview_Collection", &selection)
            .expect("first apply");
        apply_lighting_preset(&mut scene, LightingPreset::Studio, "Preview_Collection", &selection)
            .expect("second apply");

        let lights =
            scene.objects.values().filter(|object| object.is_light()).count();
        assert_eq!(lights, 2);
    }

    #[test]
    fn preset_switch_removes_previous_helpers_but_keeps_selected_lights() {
        let (mut scene, mut selection) = rigged_scene();
        scene
            .add_root_object(SceneObject::new(
                "user_lamp",
                ObjectData::Light(LightData {
                    kind: LightKind::Point,
                    energy: 60.0,
                    color: Vec3Data { x: 1.0, y: 1.0, z: 1.0 },
                }),
            ))
            .expect("add user light");
        scene.link_to_collection("Preview_Collection", "user_lamp").expect("link user light");
        selection.insert("user_lamp".to_string());

        apply_lighting_preset(&mut scene, LightingPreset::Studio, "Preview_Collection", &selection)
            .expect("studio");
        apply_lighting_preset(&mut scene, LightingPreset::Sunset, "Preview_Collection", &selection)
            .expect("sunset");

        assert!(scene.objects.contains_key("user_lamp"));
        assert!(scene.objects.contains_key(SUN_LIGHT_NAME));
        assert!(!scene.objects.contains_key(KEY_LIGHT_NAME));
        assert!(!scene.objects.contains_key(FILL_LIGHT_NAME));
        let ObjectData::Light(sun) = &scene.objects[SUN_LIGHT_NAME].data else {
            panic!("sun should be a light");
        };
        assert_eq!(sun.energy, 5.0);
        assert_eq!(sun.color, Vec3Data { x: 1.0, y: 0.5, z: 0.0 });
    }

    #[test]
    fn none_preset_is_a_no_op() {
        let (mut scene, selection) = rigged_scene();
        let before = scene.objects.len();
        apply_lighting_preset(&mut scene, LightingPreset::None, "Preview_Collection", &selection)
            .expect("none");
        assert_eq!(scene.objects.len(), before);
    }
}
