use anyhow::{bail, Result};
use smallvec::smallvec;
use std::path::PathBuf;

use turntable_preview::report::{ReportBus, RunReport};
use turntable_preview::rig::{COLLECTION_NAME, PIVOT_NAME};
use turntable_preview::scene::{MeshObjectData, ObjectData, Scene, SceneObject};
use turntable_preview::settings::{PreviewSettings, RenderEngine};
use turntable_preview::{cleanup, start, RenderInvoker};

struct OkInvoker;

impl RenderInvoker for OkInvoker {
    fn render_animation(&mut self, _scene: &Scene) -> Result<()> {
        Ok(())
    }
}

struct FailingInvoker;

impl RenderInvoker for FailingInvoker {
    fn render_animation(&mut self, _scene: &Scene) -> Result<()> {
        bail!("host refused the render job")
    }
}

fn scene_with_mesh(project_dir: &std::path::Path) -> Scene {
    let mut scene = Scene::default();
    scene.project_file = Some(project_dir.join("project.blend"));
    scene.add_material("clay");
    let statue = SceneObject::new(
        "statue",
        ObjectData::Mesh(MeshObjectData { material_slots: smallvec![Some("clay".to_string())] }),
    );
    scene.add_root_object(statue).expect("add statue");
    scene.create_collection("Props").expect("create props");
    scene
}

#[test]
fn missing_override_material_rolls_back_completely() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut scene = scene_with_mesh(dir.path());
    let before = serde_json::to_string(&scene).expect("serialize");
    let settings = PreviewSettings {
        material_override: true,
        override_material: Some("ghost_material".to_string()),
        ..PreviewSettings::default()
    };
    let mut reports = ReportBus::default();
    let mut invoker = OkInvoker;

    let result = start(&mut scene, &settings, &["statue".to_string()], &mut reports, &mut invoker);
    assert!(result.is_err());
    assert!(reports.iter().any(|r| matches!(r, RunReport::SetupFailed { .. })));
    assert_eq!(serde_json::to_string(&scene).expect("serialize"), before);
}

#[test]
fn render_handoff_failure_restores_scene() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut scene = scene_with_mesh(dir.path());
    let before = serde_json::to_string(&scene).expect("serialize");
    let mut reports = ReportBus::default();
    let mut invoker = FailingInvoker;

    let result = start(
        &mut scene,
        &PreviewSettings::default(),
        &["statue".to_string()],
        &mut reports,
        &mut invoker,
    );
    assert!(result.is_err());

    // Fully restored: no pivot, no collection, visibility back, render
    // state back.
    assert!(!scene.objects.contains_key(PIVOT_NAME));
    assert!(!scene.collections.contains_key(COLLECTION_NAME));
    assert!(!scene.collections["Props"].exclude);
    assert_eq!(serde_json::to_string(&scene).expect("serialize"), before);

    let failure = reports
        .iter()
        .find_map(|r| match r {
            RunReport::SetupFailed { phase, reason } => Some((phase.clone(), reason.clone())),
            _ => None,
        })
        .expect("failure report emitted");
    assert_eq!(failure.0, "Rigged");
    assert!(failure.1.contains("host refused"));
}

#[test]
fn missing_camera_override_fails_in_rigged_phase() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut scene = scene_with_mesh(dir.path());
    let before = serde_json::to_string(&scene).expect("serialize");
    let settings = PreviewSettings {
        use_active_camera: false,
        camera_object: Some("ghost_cam".to_string()),
        ..PreviewSettings::default()
    };
    let mut reports = ReportBus::default();
    let mut invoker = OkInvoker;

    let result = start(&mut scene, &settings, &["statue".to_string()], &mut reports, &mut invoker);
    assert!(result.is_err());
    assert_eq!(serde_json::to_string(&scene).expect("serialize"), before);
}

#[test]
fn bad_hdri_degrades_without_failing_the_run() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut scene = scene_with_mesh(dir.path());
    let settings = PreviewSettings {
        engine: RenderEngine::Cycles,
        hdri_file: Some(PathBuf::from("/nonexistent/dusk.exr")),
        ..PreviewSettings::default()
    };
    let mut reports = ReportBus::default();
    let mut invoker = OkInvoker;

    let session = start(&mut scene, &settings, &["statue".to_string()], &mut reports, &mut invoker)
        .expect("start succeeds despite bad HDRI")
        .expect("session returned");

    let world = scene.world.as_ref().expect("world graph installed");
    assert!(!world.environment_connected());
    assert!(reports.iter().any(|r| matches!(r, RunReport::HdriMissing { .. })));

    cleanup(&mut scene, Some(session), &mut reports);
    assert!(!scene.objects.contains_key(PIVOT_NAME));
}

#[test]
fn undecodable_hdri_reports_load_failure() {
    let dir = tempfile::tempdir().expect("tempdir");
    let bogus = dir.path().join("broken.hdr");
    std::fs::write(&bogus, b"not an image").expect("write bogus file");
    let mut scene = scene_with_mesh(dir.path());
    let settings = PreviewSettings {
        engine: RenderEngine::Cycles,
        hdri_file: Some(bogus),
        ..PreviewSettings::default()
    };
    let mut reports = ReportBus::default();
    let mut invoker = OkInvoker;

    start(&mut scene, &settings, &["statue".to_string()], &mut reports, &mut invoker)
        .expect("start succeeds despite undecodable HDRI")
        .expect("session returned");

    let world = scene.world.as_ref().expect("world graph installed");
    assert!(!world.environment_connected());
    assert!(reports.iter().any(|r| matches!(r, RunReport::HdriLoadFailed { .. })));
}

#[test]
fn invalid_settings_fail_before_any_mutation() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut scene = scene_with_mesh(dir.path());
    let before = serde_json::to_string(&scene).expect("serialize");
    let settings = PreviewSettings { frame_count: 0, ..PreviewSettings::default() };
    let mut reports = ReportBus::default();
    let mut invoker = OkInvoker;

    let result = start(&mut scene, &settings, &["statue".to_string()], &mut reports, &mut invoker);
    assert!(result.is_err());
    assert_eq!(serde_json::to_string(&scene).expect("serialize"), before);
}
