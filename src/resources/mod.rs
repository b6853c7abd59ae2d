//! Mesh and material resources

mod material;
mod mesh;

pub use material::*;
pub use mesh::*;
