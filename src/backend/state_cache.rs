//! Bind state cache used to skip redundant texture binds

use std::collections::HashMap;

use super::traits::TextureHandle;
use super::types::TextureTarget;

/// Tracks which texture each unit currently holds.
///
/// Owned by a [`GpuContext`](super::GpuContext) implementation. A rebind is
/// skipped only when the unit already holds exactly the requested handle and
/// target; anything else (including a unit never bound) goes through.
#[derive(Debug, Default, Clone)]
pub struct BindStateCache {
    units: HashMap<u32, (TextureTarget, TextureHandle)>,
}

impl BindStateCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `unit` already holds exactly this texture and target
    pub fn holds(&self, unit: u32, target: TextureTarget, texture: TextureHandle) -> bool {
        self.units.get(&unit) == Some(&(target, texture))
    }

    /// Record a bind that took effect
    pub fn record_bind(&mut self, unit: u32, target: TextureTarget, texture: TextureHandle) {
        self.units.insert(unit, (target, texture));
    }

    /// Texture currently recorded on `unit`
    pub fn bound_texture(&self, unit: u32) -> Option<TextureHandle> {
        self.units.get(&unit).map(|(_, texture)| *texture)
    }

    /// Drop every unit that references `texture`; call when the texture is deleted
    pub fn forget_texture(&mut self, texture: TextureHandle) {
        self.units.retain(|_, (_, bound)| *bound != texture);
    }

    pub fn bound_unit_count(&self) -> usize {
        self.units.len()
    }
}
