use anyhow::{bail, Result};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use uuid::Uuid;

use crate::lighting::apply_lighting_preset;
use crate::output::resolve_output;
use crate::report::{ReportBus, RunReport};
use crate::rig;
use crate::scene::{DisplayMode, MediaType, Scene, VideoContainer};
use crate::settings::{FileFormat, PreviewSettings, RenderEngine};
use crate::snapshot::{ObjectSnapshots, RestoreReport, SceneStateSnapshot};
use crate::world::{animate_environment_rotation, build_environment_graph};

/// Render hand-off seam. The host renders asynchronously; this call is
/// fire-and-forget and the run never learns about frame completion.
pub trait RenderInvoker {
    fn render_animation(&mut self, scene: &Scene) -> Result<()>;
}

/// Caller-owned backup of one run, returned by [`start`] and consumed by
/// [`cleanup`]. Replaces a process-wide "last backup" slot: holding at most
/// one outstanding session becomes the caller's decision, and cleaning up a
/// run that was never started is unrepresentable.
#[derive(Debug)]
pub struct PreviewSession {
    token: Uuid,
    scene_state: SceneStateSnapshot,
    objects: ObjectSnapshots,
    visibility: BTreeMap<String, bool>,
}

impl PreviewSession {
    pub fn token(&self) -> Uuid {
        self.token
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunPhase {
    Preparing,
    Rigged,
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunPhase::Preparing => write!(f, "Preparing"),
            RunPhase::Rigged => write!(f, "Rigged"),
        }
    }
}

/// Runs the whole Start action: stale-rig sweep, snapshot capture, rig and
/// environment construction, scene render-property mutation, and the
/// asynchronous render hand-off. On any failure the scene is restored to
/// its pre-run state and the error is returned; the scene is never left
/// partially rigged.
///
/// Returns `Ok(None)` when the selection is empty (warning reported, no
/// mutation), otherwise the session handle for a later [`cleanup`].
pub fn start(
    scene: &mut Scene,
    settings: &PreviewSettings,
    selection: &[String],
    reports: &mut ReportBus,
    invoker: &mut dyn RenderInvoker,
) -> Result<Option<PreviewSession>> {
    if selection.is_empty() {
        reports.push(RunReport::EmptySelection);
        return Ok(None);
    }
    settings.validate()?;

    rig::sweep_stale(scene);

    // The sweep can delete tagged objects the user had selected.
    let live: Vec<String> =
        selection.iter().filter(|name| scene.objects.contains_key(*name)).cloned().collect();
    if live.is_empty() {
        reports.push(RunReport::SelectionLost);
        return Ok(None);
    }

    let scene_state = SceneStateSnapshot::capture(scene);
    let objects = ObjectSnapshots::capture(scene, &live);
    let mut visibility = BTreeMap::new();

    match execute(scene, settings, &live, &mut visibility, reports, invoker) {
        Ok(()) => Ok(Some(PreviewSession { token: Uuid::new_v4(), scene_state, objects, visibility })),
        Err(err) => {
            let phase =
                if visibility.is_empty() { RunPhase::Preparing } else { RunPhase::Rigged };
            scene_state.restore(scene);
            rig::restore_visibility(scene, &visibility);
            objects.restore(scene);
            rig::sweep_stale(scene);
            reports.push(RunReport::SetupFailed { phase: phase.to_string(), reason: format!("{err:#}") });
            Err(err)
        }
    }
}

fn execute(
    scene: &mut Scene,
    settings: &PreviewSettings,
    selection: &[String],
    visibility: &mut BTreeMap<String, bool>,
    reports: &mut ReportBus,
    invoker: &mut dyn RenderInvoker,
) -> Result<()> {
    let output = resolve_output(scene, settings, reports)?;
    scene.render.filepath = output.filepath.clone();

    let turntable =
        rig::build(scene, selection, settings.frame_count, settings.rotation_degrees)?;
    *visibility = rig::isolate_collection(scene, &turntable.collection);

    scene.render.engine = settings.engine_id().to_string();
    scene.render.resolution_percentage = settings.resolution_percentage;
    if settings.custom_resolution {
        scene.render.resolution_x = settings.resolution_x;
        scene.render.resolution_y = settings.resolution_y;
    }
    scene.frame_start = 1;
    scene.frame_end = settings.frame_count as i32;

    match settings.file_format {
        FileFormat::Video => {
            if scene.render.media_type.is_some() {
                scene.render.media_type = Some(MediaType::Video);
            }
            scene.render.image_format = settings.file_format.image_format_id();
            scene.render.video_container = Some(VideoContainer::Mpeg4);
        }
        FileFormat::Png | FileFormat::Jpeg => {
            if scene.render.media_type.is_some() {
                scene.render.media_type = Some(MediaType::Image);
            }
            scene.render.image_format = settings.file_format.image_format_id();
        }
    }

    if !settings.use_active_camera {
        if let Some(camera) = &settings.camera_object {
            if !scene.objects.contains_key(camera) {
                bail!("camera object '{camera}' does not exist");
            }
            scene.active_camera = Some(camera.clone());
        }
    }

    if settings.material_override {
        if let Some(material) = &settings.override_material {
            if !scene.materials.contains(material) {
                bail!("override material '{material}' does not exist");
            }
            for name in selection {
                if let Some(slots) =
                    scene.objects.get_mut(name).and_then(|object| object.material_slots_mut())
                {
                    for slot in slots.iter_mut() {
                        *slot = Some(material.clone());
                    }
                }
            }
        }
    }

    if settings.wireframe {
        for name in selection {
            if let Some(object) = scene.objects.get_mut(name) {
                object.display_mode = DisplayMode::Wire;
            }
        }
    }

    if settings.engine.is_physically_based() {
        if let Some(hdri) = &settings.hdri_file {
            let mut graph = build_environment_graph(hdri, reports);
            animate_environment_rotation(&mut graph, settings.hdri_rotation_degrees, settings.frame_count);
            scene.world = Some(graph);
        }
        if settings.engine == RenderEngine::Eevee {
            scene.render.use_ambient_occlusion = true;
        }
        let selected: BTreeSet<String> = selection.iter().cloned().collect();
        apply_lighting_preset(scene, settings.lighting_preset, &turntable.collection, &selected)?;
    }

    reports.push(RunReport::RenderStarted { filepath: output.filepath });
    invoker.render_animation(scene)?;
    Ok(())
}

/// Reverses a run: restores scene render state, collection visibility, and
/// per-object state from the session, then sweeps the transient rig
/// objects out of the scene. Without a session the sweep still runs, which
/// makes Cleanup safe to invoke at any time.
pub fn cleanup(
    scene: &mut Scene,
    session: Option<PreviewSession>,
    reports: &mut ReportBus,
) -> RestoreReport {
    let report = match session {
        Some(session) => {
            session.scene_state.restore(scene);
            rig::restore_visibility(scene, &session.visibility);
            session.objects.restore(scene)
        }
        None => RestoreReport::default(),
    };
    rig::sweep_stale(scene);
    reports.push(RunReport::CleanupFinished { restored: report.restored(), skipped: report.skipped() });
    report
}
