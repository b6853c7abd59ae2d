//! Rendering passes
//!
//! The frame is built in three stages: a base pass (environment background
//! plus opaque surfaces), one capture-and-composite round per translucent
//! shell, and the glass pass that refracts each capture. `transmission`
//! orchestrates the rounds; the other modules own one pipeline each.

pub mod background;
pub mod glass;
pub mod scene_pass;
pub mod target;
pub mod transmission;

pub use background::BackgroundPass;
pub use glass::{GlassPass, GlassPassUniforms};
pub use scene_pass::ScenePass;
pub use target::{OffscreenTarget, TargetSpec};
pub use transmission::{
    run_all_shells, run_shell_pass, FrameAssets, ShellPassState, ShellStages,
    TransmissionRenderer, VisibilityGuard,
};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("pipeline validation failed: {0}")]
    PipelineBuild(String),
    #[error("shell capture failed: {0}")]
    Capture(String),
}
