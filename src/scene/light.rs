//! Scene lights
//!
//! Both kinds are ECS components so they can be gathered from a `World`.
//! Only directional lights are shaded; point lights are accepted and counted.

use bevy_ecs::prelude::*;
use glam::Vec3;

/// Infinitely distant light shining along `direction`
#[derive(Component, Debug, Clone, Copy, PartialEq)]
pub struct DirectionalLight {
    /// Unit vector the light travels along
    pub direction: Vec3,
    pub color: Vec3,
    pub brightness: f32,
}

impl DirectionalLight {
    pub fn new(direction: Vec3, color: Vec3, brightness: f32) -> Self {
        Self {
            direction: direction.normalize_or_zero(),
            color,
            brightness,
        }
    }

    /// Color scaled by brightness, what the light volume pass uploads
    pub fn radiance(&self) -> Vec3 {
        self.color * self.brightness
    }
}

/// Light with a finite range around `position`
///
/// When gathered from a world, `position` is taken from the entity's
/// `Transform` if it has one.
#[derive(Component, Debug, Clone, Copy, PartialEq)]
pub struct PointLight {
    pub position: Vec3,
    pub color: Vec3,
    pub brightness: f32,
    pub radius: f32,
}

impl PointLight {
    pub fn new(color: Vec3, brightness: f32, radius: f32) -> Self {
        Self {
            position: Vec3::ZERO,
            color,
            brightness,
            radius,
        }
    }

    pub fn at(mut self, position: Vec3) -> Self {
        self.position = position;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Light {
    Directional(DirectionalLight),
    Point(PointLight),
}

impl Light {
    pub fn as_directional(&self) -> Option<&DirectionalLight> {
        match self {
            Light::Directional(light) => Some(light),
            Light::Point(_) => None,
        }
    }
}

impl From<DirectionalLight> for Light {
    fn from(light: DirectionalLight) -> Self {
        Light::Directional(light)
    }
}

impl From<PointLight> for Light {
    fn from(light: PointLight) -> Self {
        Light::Point(light)
    }
}
