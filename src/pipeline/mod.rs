//! Deferred rendering pipeline
//!
//! [`ShadedSceneRenderer`] owns and sequences the stages:
//! 1. Gbuffer fill and ambient composite ([`crate::target::Gbuffer`])
//! 2. Light accumulation ([`DirectLightVolume`])
//! 3. Screen-space reflections ([`ScreenSpaceReflections`])
//! 4. Post-processing - bloom, tonemapping ([`PostProcessingRenderer`])
//!
//! [`OutlineRenderer`] is an auxiliary pass driven by render events.

mod light_volume;
mod outline;
mod post_processing;
mod primitives;
mod shaded;
mod ssr;

pub use light_volume::DirectLightVolume;
pub use outline::OutlineRenderer;
pub use post_processing::PostProcessingRenderer;
pub use primitives::{Primitive, PrimitiveRenderer};
pub use shaded::{FrameStats, ShadedSceneRenderer};
pub use ssr::ScreenSpaceReflections;
