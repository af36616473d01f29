use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::lighting::LightingPreset;
use crate::scene::ImageFormatId;

/// Host application version, used to pick the engine identifier variant
/// for newer vs older hosts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HostVersion(pub u32, pub u32, pub u32);

impl Default for HostVersion {
    fn default() -> Self {
        HostVersion(5, 0, 0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RenderEngine {
    #[default]
    Workbench,
    Eevee,
    Cycles,
}

impl RenderEngine {
    /// Engine identifier as the host names it. The Eevee id changed twice
    /// across host versions.
    pub fn engine_id(self, host: HostVersion) -> &'static str {
        match self {
            RenderEngine::Workbench => "BLENDER_WORKBENCH",
            RenderEngine::Cycles => "CYCLES",
            RenderEngine::Eevee => {
                if host >= HostVersion(5, 0, 0) {
                    "BLENDER_EEVEE"
                } else if host >= HostVersion(4, 2, 0) {
                    "BLENDER_EEVEE_NEXT"
                } else {
                    "BLENDER_EEVEE"
                }
            }
        }
    }

    /// Workbench is the flat viewport engine; the other two trace light and
    /// therefore get the HDRI world and lighting presets.
    pub fn is_physically_based(self) -> bool {
        !matches!(self, RenderEngine::Workbench)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FileFormat {
    #[default]
    Png,
    Jpeg,
    Video,
}

impl FileFormat {
    pub fn image_format_id(self) -> ImageFormatId {
        match self {
            FileFormat::Png => ImageFormatId::Png,
            FileFormat::Jpeg => ImageFormatId::Jpeg,
            FileFormat::Video => ImageFormatId::Ffmpeg,
        }
    }
}

pub const RESOLUTION_PERCENTAGES: [u32; 5] = [100, 75, 50, 40, 30];

/// Flat settings record supplied by the UI layer before a run. Immutable
/// for the duration of one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreviewSettings {
    #[serde(default)]
    pub engine: RenderEngine,
    #[serde(default = "default_resolution_percentage")]
    pub resolution_percentage: u32,
    #[serde(default)]
    pub custom_resolution: bool,
    #[serde(default = "default_resolution_x")]
    pub resolution_x: u32,
    #[serde(default = "default_resolution_y")]
    pub resolution_y: u32,
    #[serde(default = "default_frame_count")]
    pub frame_count: u32,
    #[serde(default = "default_rotation_degrees")]
    pub rotation_degrees: f32,
    #[serde(default = "default_rotation_degrees")]
    pub hdri_rotation_degrees: f32,
    #[serde(default = "default_auto_save")]
    pub auto_save: bool,
    #[serde(default = "default_output_path")]
    pub output_path: PathBuf,
    #[serde(default)]
    pub file_format: FileFormat,
    #[serde(default)]
    pub wireframe: bool,
    #[serde(default = "default_use_active_camera")]
    pub use_active_camera: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub camera_object: Option<String>,
    #[serde(default)]
    pub material_override: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub override_material: Option<String>,
    #[serde(default)]
    pub lighting_preset: LightingPreset,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hdri_directory: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hdri_file: Option<PathBuf>,
    #[serde(default)]
    pub host_version: HostVersion,
}

const fn default_resolution_percentage() -> u32 {
    100
}

const fn default_resolution_x() -> u32 {
    1920
}

const fn default_resolution_y() -> u32 {
    1080
}

const fn default_frame_count() -> u32 {
    200
}

const fn default_rotation_degrees() -> f32 {
    720.0
}

const fn default_auto_save() -> bool {
    true
}

const fn default_use_active_camera() -> bool {
    true
}

fn default_output_path() -> PathBuf {
    std::env::temp_dir().join("turntable_previews")
}

impl Default for PreviewSettings {
    fn default() -> Self {
        Self {
            engine: RenderEngine::default(),
            resolution_percentage: default_resolution_percentage(),
            custom_resolution: false,
            resolution_x: default_resolution_x(),
            resolution_y: default_resolution_y(),
            frame_count: default_frame_count(),
            rotation_degrees: default_rotation_degrees(),
            hdri_rotation_degrees: default_rotation_degrees(),
            auto_save: default_auto_save(),
            output_path: default_output_path(),
            file_format: FileFormat::default(),
            wireframe: false,
            use_active_camera: default_use_active_camera(),
            camera_object: None,
            material_override: false,
            override_material: None,
            lighting_preset: LightingPreset::default(),
            hdri_directory: None,
            hdri_file: None,
            host_version: HostVersion::default(),
        }
    }
}

impl PreviewSettings {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes =
            fs::read(path).with_context(|| format!("Failed to read settings file {}", path.display()))?;
        let settings = serde_json::from_slice(&bytes)
            .with_context(|| format!("Failed to parse settings file {}", path.display()))?;
        Ok(settings)
    }

    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        match Self::load(path) {
            Ok(settings) => settings,
            Err(err) => {
                eprintln!("Settings load error: {err:?}. Falling back to defaults.");
                Self::default()
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(1..=10_000).contains(&self.frame_count) {
            bail!("frame count {} outside 1..=10000", self.frame_count);
        }
        if !(-3600.0..=3600.0).contains(&self.rotation_degrees) {
            bail!("rotation {}° outside -3600..=3600", self.rotation_degrees);
        }
        if !(-3600.0..=3600.0).contains(&self.hdri_rotation_degrees) {
            bail!("HDRI rotation {}° outside -3600..=3600", self.hdri_rotation_degrees);
        }
        if !RESOLUTION_PERCENTAGES.contains(&self.resolution_percentage) {
            bail!("resolution percentage {} not one of {RESOLUTION_PERCENTAGES:?}", self.resolution_percentage);
        }
        if self.custom_resolution {
            for (axis, value) in [("x", self.resolution_x), ("y", self.resolution_y)] {
                if !(1..=8192).contains(&value) {
                    bail!("resolution {axis} {value} outside 1..=8192");
                }
            }
        }
        Ok(())
    }

    pub fn engine_id(&self) -> &'static str {
        self.engine.engine_id(self.host_version)
    }
}

/// Lists the HDRI candidates in a directory (`.hdr` / `.exr`), sorted, for
/// the UI layer's environment chooser. A missing directory yields an empty
/// list rather than an error.
pub fn hdri_candidates(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut candidates = Vec::new();
    let entries =
        fs::read_dir(dir).with_context(|| format!("reading HDRI directory {}", dir.display()))?;
    for entry in entries {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let path = entry.path();
        let is_hdri = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("hdr") || ext.eq_ignore_ascii_case("exr"));
        if is_hdri {
            candidates.push(path);
        }
    }
    candidates.sort();
    Ok(candidates)
}
