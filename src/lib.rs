pub mod animation;
pub mod lighting;
pub mod output;
pub mod report;
pub mod rig;
pub mod run;
pub mod scene;
pub mod settings;
pub mod snapshot;
pub mod world;

pub use run::{cleanup, start, PreviewSession, RenderInvoker};
pub use settings::PreviewSettings;
