use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::scene::{
    DisplayMode, ImageFormatId, MaterialSlots, MediaType, Scene, VideoContainer,
};

/// Verbatim copy of the mutable scene-level render properties. Captured
/// once at the start of a run, written back on failure or cleanup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneStateSnapshot {
    engine: String,
    resolution_percentage: u32,
    resolution_x: u32,
    resolution_y: u32,
    frame_start: i32,
    frame_end: i32,
    filepath: PathBuf,
    image_format: ImageFormatId,
    media_type: Option<MediaType>,
    video_container: Option<VideoContainer>,
    camera: Option<String>,
}

impl SceneStateSnapshot {
    pub fn capture(scene: &Scene) -> Self {
        Self {
            engine: scene.render.engine.clone(),
            resolution_percentage: scene.render.resolution_percentage,
            resolution_x: scene.render.resolution_x,
            resolution_y: scene.render.resolution_y,
            frame_start: scene.frame_start,
            frame_end: scene.frame_end,
            filepath: scene.render.filepath.clone(),
            image_format: scene.render.image_format,
            media_type: scene.render.media_type,
            video_container: scene.render.video_container,
            camera: scene.active_camera.clone(),
        }
    }

    /// Restores every captured field. Optional fields absent at capture
    /// time are left untouched. Idempotent; safe to replay on stale scenes.
    pub fn restore(&self, scene: &mut Scene) {
        scene.render.engine = self.engine.clone();
        scene.render.resolution_percentage = self.resolution_percentage;
        scene.render.resolution_x = self.resolution_x;
        scene.render.resolution_y = self.resolution_y;
        scene.frame_start = self.frame_start;
        scene.frame_end = self.frame_end;
        scene.render.filepath = self.filepath.clone();
        if let Some(media_type) = self.media_type {
            scene.render.media_type = Some(media_type);
        }
        scene.render.image_format = self.image_format;
        if let Some(container) = self.video_container {
            scene.render.video_container = Some(container);
        }
        scene.active_camera = self.camera.clone();
    }
}

/// Per-object state captured for each selected object before rigging:
/// parent link, display mode, and (for meshes) the ordered material slots.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectStateSnapshot {
    pub parent: Option<String>,
    pub display_mode: DisplayMode,
    pub materials: Option<MaterialSlots>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ObjectSnapshots {
    entries: BTreeMap<String, ObjectStateSnapshot>,
}

/// Outcome for one snapshot entry during restore. Stale references are
/// recorded rather than silently skipped so callers can assert exactly
/// which entries degraded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestoreOutcome {
    Restored,
    ObjectMissing,
    Partial { parent_missing: bool, slot_count_changed: bool },
}

#[derive(Debug, Clone, Default)]
pub struct RestoreReport {
    pub entries: Vec<(String, RestoreOutcome)>,
}

impl RestoreReport {
    pub fn restored(&self) -> usize {
        self.entries.iter().filter(|(_, o)| *o == RestoreOutcome::Restored).count()
    }

    pub fn skipped(&self) -> usize {
        self.entries.len() - self.restored()
    }

    pub fn fully_restored(&self) -> bool {
        self.skipped() == 0
    }

    pub fn outcome(&self, name: &str) -> Option<&RestoreOutcome> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, o)| o)
    }
}

impl ObjectSnapshots {
    pub fn capture<'a>(scene: &Scene, names: impl IntoIterator<Item = &'a String>) -> Self {
        let mut entries = BTreeMap::new();
        for name in names {
            let Some(object) = scene.objects.get(name) else {
                continue;
            };
            entries.insert(
                name.clone(),
                ObjectStateSnapshot {
                    parent: object.parent.clone(),
                    display_mode: object.display_mode,
                    materials: object.material_slots().cloned(),
                },
            );
        }
        Self { entries }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Re-applies parent, display mode, and material slots per entry.
    /// Objects deleted since capture are skipped; a parent deleted since
    /// capture leaves the child's current parent untouched; material slots
    /// are only re-applied positionally when the slot count still matches.
    pub fn restore(&self, scene: &mut Scene) -> RestoreReport {
        let mut report = RestoreReport::default();
        for (name, snapshot) in &self.entries {
            if !scene.objects.contains_key(name) {
                report.entries.push((name.clone(), RestoreOutcome::ObjectMissing));
                continue;
            }

            let parent_missing = match &snapshot.parent {
                Some(parent) if !scene.objects.contains_key(parent) => true,
                _ => false,
            };
            if !parent_missing {
                scene
                    .reparent(name, snapshot.parent.as_deref())
                    .expect("object and parent existence checked above");
            }

            let object = scene.objects.get_mut(name).expect("existence checked above");
            object.display_mode = snapshot.display_mode;

            let mut slot_count_changed = false;
            if let Some(materials) = &snapshot.materials {
                match object.material_slots_mut() {
                    Some(slots) if slots.len() == materials.len() => {
                        slots.clone_from(materials);
                    }
                    _ => slot_count_changed = true,
                }
            }

            let outcome = if parent_missing || slot_count_changed {
                RestoreOutcome::Partial { parent_missing, slot_count_changed }
            } else {
                RestoreOutcome::Restored
            };
            report.entries.push((name.clone(), outcome));
        }
        report
    }
}
