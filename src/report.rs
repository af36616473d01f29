use std::fmt;
use std::path::PathBuf;

/// User-visible messages emitted during a preview run. The caller (UI
/// layer) drains the bus and surfaces each report at its level.
#[derive(Debug, Clone)]
pub enum RunReport {
    EmptySelection,
    SelectionLost,
    UnsavedProjectFallback { dir: PathBuf },
    RenderStarted { filepath: PathBuf },
    HdriMissing { path: PathBuf },
    HdriLoadFailed { path: PathBuf, reason: String },
    SetupFailed { phase: String, reason: String },
    CleanupFinished { restored: usize, skipped: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportLevel {
    Info,
    Warning,
    Error,
}

impl RunReport {
    pub fn level(&self) -> ReportLevel {
        match self {
            RunReport::EmptySelection | RunReport::UnsavedProjectFallback { .. } => ReportLevel::Warning,
            RunReport::RenderStarted { .. } | RunReport::CleanupFinished { .. } => ReportLevel::Info,
            RunReport::SelectionLost
            | RunReport::HdriMissing { .. }
            | RunReport::HdriLoadFailed { .. }
            | RunReport::SetupFailed { .. } => ReportLevel::Error,
        }
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunReport::EmptySelection => write!(f, "No objects selected."),
            RunReport::SelectionLost => write!(f, "Selection lost during cleanup."),
            RunReport::UnsavedProjectFallback { dir } => {
                write!(f, "Project not saved. Saving to temporary directory {}", dir.display())
            }
            RunReport::RenderStarted { filepath } => {
                write!(f, "Starting render to: {}", filepath.display())
            }
            RunReport::HdriMissing { path } => write!(f, "HDRI file not found: {}", path.display()),
            RunReport::HdriLoadFailed { path, reason } => {
                write!(f, "Failed to load HDRI {}: {reason}", path.display())
            }
            RunReport::SetupFailed { phase, reason } => {
                write!(f, "Render setup failed during {phase}: {reason}")
            }
            RunReport::CleanupFinished { restored, skipped } => {
                write!(f, "Preview objects cleaned up (restored={restored} skipped={skipped})")
            }
        }
    }
}

#[derive(Default)]
pub struct ReportBus {
    reports: Vec<RunReport>,
}

impl ReportBus {
    pub fn push(&mut self, report: RunReport) {
        self.reports.push(report);
    }

    pub fn drain(&mut self) -> Vec<RunReport> {
        self.reports.drain(..).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RunReport> {
        self.reports.iter()
    }

    pub fn has_level(&self, level: ReportLevel) -> bool {
        self.reports.iter().any(|r| r.level() == level)
    }
}
