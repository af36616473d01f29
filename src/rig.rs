use anyhow::{bail, Result};
use std::collections::BTreeMap;

use crate::scene::{ObjectData, Scene, SceneObject};

pub const PIVOT_NAME: &str = "Preview_Empty";
pub const COLLECTION_NAME: &str = "Preview_Collection";
pub const RESERVED_PREFIX: &str = "Preview_";

pub const ROTATION_PATH: &str = "rotation_euler";
const ROTATION_Z: usize = 2;

/// Handle to the transient rig created for one run.
#[derive(Debug, Clone)]
pub struct TurntableRig {
    pub pivot: String,
    pub collection: String,
}

/// Deletes leftovers from a previous run so re-invoking Start never stacks
/// a second pivot or collection. Transient objects are identified by their
/// preview tag; the reserved-name prefix remains as a fallback for objects
/// written by sessions that predate the tag.
pub fn sweep_stale(scene: &mut Scene) {
    let stale: Vec<String> = scene
        .objects
        .values()
        .filter(|object| is_transient(object))
        .map(|object| object.name.clone())
        .collect();

    // Detach children first so deleting a pivot cannot cascade onto user
    // objects parented under it.
    for name in &stale {
        for child in scene.children_of(name) {
            if let Some(object) = scene.objects.get_mut(&child) {
                object.parent = None;
            }
        }
    }
    for name in &stale {
        scene.remove_object(name);
    }

    scene.remove_collection(COLLECTION_NAME);
}

fn is_transient(object: &SceneObject) -> bool {
    if object.preview_tag {
        return true;
    }
    object.name.starts_with(PIVOT_NAME)
        || (object.is_light() && object.name.starts_with(RESERVED_PREFIX))
}

/// Builds the turntable rig: a pivot empty at the origin inside a fresh
/// grouping collection, the selection reparented under the pivot, and the
/// Z-rotation keyframed from zero at frame 1 to the full rotation at the
/// last frame with linear interpolation.
pub fn build(
    scene: &mut Scene,
    selection: &[String],
    frame_count: u32,
    rotation_degrees: f32,
) -> Result<TurntableRig> {
    if selection.is_empty() {
        bail!("cannot build a turntable rig from an empty selection");
    }
    if frame_count < 1 {
        bail!("frame count must be at least 1");
    }

    let mut pivot = SceneObject::new(PIVOT_NAME, ObjectData::Empty);
    pivot.preview_tag = true;
    scene.add_object(pivot)?;
    scene.create_collection(COLLECTION_NAME)?;
    scene.link_to_collection(COLLECTION_NAME, PIVOT_NAME)?;

    for name in selection {
        // Single-parent model: any existing parent link is overwritten.
        scene.reparent(name, Some(PIVOT_NAME))?;
        scene.link_to_collection(COLLECTION_NAME, name)?;
    }

    let pivot = scene.objects.get_mut(PIVOT_NAME).expect("pivot created above");
    pivot.rotation_euler.z = 0.0;
    let action = pivot.animation_mut();
    action.keyframe_insert(ROTATION_PATH, ROTATION_Z, 1, 0.0);
    action.keyframe_insert(ROTATION_PATH, ROTATION_Z, frame_count as i32, rotation_degrees.to_radians());
    action.set_linear_interpolation();
    pivot.rotation_euler.z = rotation_degrees.to_radians();

    Ok(TurntableRig { pivot: PIVOT_NAME.to_string(), collection: COLLECTION_NAME.to_string() })
}

/// Makes the rig collection the only visible top-level container. Absolute,
/// not additive: every other collection is excluded. Returns the prior
/// exclude flags so the run can restore them.
pub fn isolate_collection(scene: &mut Scene, collection: &str) -> BTreeMap<String, bool> {
    let mut previous = BTreeMap::new();
    for entry in scene.collections.values_mut() {
        previous.insert(entry.name.clone(), entry.exclude);
        entry.exclude = entry.name != collection;
    }
    previous
}

pub fn restore_visibility(scene: &mut Scene, previous: &BTreeMap<String, bool>) {
    for (name, exclude) in previous {
        if let Some(collection) = scene.collections.get_mut(name) {
            collection.exclude = *exclude;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::Interpolation;
    use crate::scene::{MeshObjectData, ObjectData};

    fn scene_with_meshes(names: &[&str]) -> Scene {
        let mut scene = Scene::default();
        for name in names {
            scene
                .add_root_object(SceneObject::new(*name, ObjectData::Mesh(MeshObjectData::default())))
                .expect("add mesh");
        }
        scene
    }

    #[test]
    fn build_reparents_selection_under_pivot() {
        let mut scene = scene_with_meshes(&["a", "b"]);
        let selection = vec!["a".to_string(), "b".to_string()];
        let rig = build(&mut scene, &selection, 200, 720.0).expect("rig build");

        assert_eq!(scene.objects["a"].parent.as_deref(), Some(PIVOT_NAME));
        assert_eq!(scene.objects["b"].parent.as_deref(), Some(PIVOT_NAME));
        let members = &scene.collections[&rig.collection].members;
        assert!(members.contains("a") && members.contains("b") && members.contains(PIVOT_NAME));
    }

    #[test]
    fn build_writes_linear_rotation_keys() {
        let mut scene = scene_with_meshes(&["a"]);
        build(&mut scene, &["a".to_string()], 200, 720.0).expect("rig build");

        let pivot = &scene.objects[PIVOT_NAME];
        let action = pivot.animation.as_ref().expect("pivot animated");
        let curve = action.fcurve(ROTATION_PATH, ROTATION_Z).expect("z rotation curve");
        assert_eq!(curve.keyframes[0].frame, 1);
        assert_eq!(curve.keyframes[0].value, 0.0);
        assert_eq!(curve.keyframes[1].frame, 200);
        assert!((curve.keyframes[1].value - 4.0 * std::f32::consts::PI).abs() < 1e-4);
        assert!(curve.keyframes.iter().all(|kf| kf.interpolation == Interpolation::Linear));
    }

    #[test]
    fn sweep_detaches_children_before_deleting_pivot() {
        let mut scene = scene_with_meshes(&["user_obj"]);
        build(&mut scene, &["user_obj".to_string()], 10, 360.0).expect("rig build");

        sweep_stale(&mut scene);

        let object = scene.objects.get("user_obj").expect("user object survives sweep");
        assert!(object.parent.is_none());
        assert!(!scene.collections.contains_key(COLLECTION_NAME));
        assert!(!scene.objects.contains_key(PIVOT_NAME));
        assert!(scene.root_members.contains("user_obj"));
    }

    #[test]
    fn sweep_relinks_collection_only_members_to_root() {
        let mut scene = Scene::default();
        scene
            .add_object(SceneObject::new("loose", ObjectData::Mesh(MeshObjectData::default())))
            .expect("add mesh");
        scene.create_collection(COLLECTION_NAME).expect("create collection");
        scene.link_to_collection(COLLECTION_NAME, "loose").expect("link");

        sweep_stale(&mut scene);
        assert!(scene.root_members.contains("loose"));
    }

    #[test]
    fn untagged_user_object_with_prefix_survives_sweep() {
        let mut scene = scene_with_meshes(&["Preview_Statue"]);
        sweep_stale(&mut scene);
        assert!(scene.objects.contains_key("Preview_Statue"));
    }

    #[test]
    fn isolate_excludes_every_other_collection() {
        let mut scene = scene_with_meshes(&["a"]);
        scene.create_collection("Props").expect("create props");
        build(&mut scene, &["a".to_string()], 10, 360.0).expect("rig build");

        let previous = isolate_collection(&mut scene, COLLECTION_NAME);
        assert!(!scene.collections[COLLECTION_NAME].exclude);
        assert!(scene.collections["Props"].exclude);

        restore_visibility(&mut scene, &previous);
        assert!(!scene.collections["Props"].exclude);
    }
}
