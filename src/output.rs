use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use crate::report::{ReportBus, RunReport};
use crate::scene::Scene;
use crate::settings::{FileFormat, PreviewSettings};

pub const PREVIEW_DIR_NAME: &str = "Preview_Renders";
pub const VERSION_PREFIX: &str = "render_";
pub const VIDEO_FILE_NAME: &str = "preview.mp4";
pub const FRAME_PREFIX: &str = "frame_";

/// Resolved render destination for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderOutput {
    pub directory: PathBuf,
    /// What the host's render filepath is set to: a video file, a frame
    /// filename prefix, or the bare directory for custom output paths.
    pub filepath: PathBuf,
}

/// Applies the output-path policy. Auto-save derives a fresh versioned
/// directory next to the saved project file (system temp with a warning if
/// unsaved); otherwise the user-supplied path is used directly, created if
/// missing.
pub fn resolve_output(
    scene: &Scene,
    settings: &PreviewSettings,
    reports: &mut ReportBus,
) -> Result<RenderOutput> {
    if settings.auto_save {
        let base = match scene.project_file.as_ref().and_then(|p| p.parent()) {
            Some(dir) => dir.to_path_buf(),
            None => {
                let dir = std::env::temp_dir();
                reports.push(RunReport::UnsavedProjectFallback { dir: dir.clone() });
                dir
            }
        };
        let preview_dir = base.join(PREVIEW_DIR_NAME);
        fs::create_dir_all(&preview_dir)
            .with_context(|| format!("creating preview directory {}", preview_dir.display()))?;

        let version = next_version(&preview_dir)?;
        let directory = preview_dir.join(format!("{VERSION_PREFIX}{version:03}"));
        fs::create_dir_all(&directory)
            .with_context(|| format!("creating render directory {}", directory.display()))?;

        let filepath = match settings.file_format {
            FileFormat::Video => directory.join(VIDEO_FILE_NAME),
            FileFormat::Png | FileFormat::Jpeg => directory.join(FRAME_PREFIX),
        };
        Ok(RenderOutput { directory, filepath })
    } else {
        let directory = settings.output_path.clone();
        if !directory.is_dir() {
            fs::create_dir_all(&directory)
                .with_context(|| format!("creating output directory {}", directory.display()))?;
        }
        Ok(RenderOutput { filepath: directory.clone(), directory })
    }
}

/// Next unused version suffix: max over existing `render_N` siblings plus
/// one, so deleted intermediates are never reused.
fn next_version(preview_dir: &Path) -> Result<u32> {
    let mut max_version = 0u32;
    let entries = fs::read_dir(preview_dir)
        .with_context(|| format!("scanning preview directory {}", preview_dir.display()))?;
    for entry in entries {
        let entry = entry?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        let Some(rest) = name.strip_prefix(VERSION_PREFIX) else {
            continue;
        };
        // Suffix after the last underscore, tolerating extra segments.
        let suffix = rest.rsplit('_').next().unwrap_or(rest);
        if let Ok(version) = suffix.parse::<u32>() {
            max_version = max_version.max(version);
        }
    }
    Ok(max_version + 1)
}
