//! Backend abstraction layer
//!
//! Provides the [`GpuContext`] trait every renderer stage issues commands
//! through, plus a headless implementation that records instead of rasterizing.

pub mod headless;
pub mod state_cache;
pub mod traits;
pub mod types;

pub use headless::{DrawCall, HeadlessContext};
pub use state_cache::BindStateCache;
pub use traits::*;
pub use types::*;
