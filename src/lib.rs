//! Lustre - layered transmission renderer for procedural glass fixtures
//!
//! The crate covers the whole path from a seeded layout to a finished frame:
//! - Deterministic slot layout: variant planning and arm transform generation
//!   driven entirely by a seed, so the same configuration always produces the
//!   same fixture
//! - Instance batching: one instanced draw per (variant, sub-mesh) pair
//! - Scene model with translucent shell descriptors and name-based material
//!   classification
//! - Environment probe building from an equirectangular HDR panorama
//! - The transmission pipeline: per-shell capture of everything behind the
//!   shell, then a glass composite with dispersion, absorption, and
//!   edge reflections
//!
//! Rendering is headless over wgpu; every pass draws into caller-supplied or
//! offscreen texture views.

pub mod batch;
pub mod gpu;
pub mod layout;
pub mod probe;
pub mod render;
pub mod resources;
pub mod scene;

pub use batch::{InstanceBatcher, VariantAssets};
pub use gpu::{GpuContext, GpuError};
pub use layout::{Layout, LayoutConfig, VariantSet};
pub use probe::{ProbeBuilder, ProbeError};
pub use render::{RenderError, TargetSpec, TransmissionRenderer};
pub use scene::{Scene, ShellDescriptor, Surface};
