//! Resource management
//!
//! Shader programs, textures and environment maps are resolved by identifier
//! through [`ResourceLibrary`]; materials define what each draw uploads.

mod library;
mod material;
mod mesh;

pub use library::*;
pub use material::*;
pub use mesh::*;
