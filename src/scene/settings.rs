//! Post-processing settings owned by the scene

/// Tonemapping operator applied in the final composite
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TonemapOperator {
    /// Simple Reinhard
    Reinhard,
    /// ACES filmic
    #[default]
    Aces,
    /// Uncharted 2
    Uncharted2,
    /// Passthrough
    None,
}

impl TonemapOperator {
    /// Value of the `tonemapOperator` shader uniform
    pub fn shader_index(self) -> i32 {
        match self {
            TonemapOperator::Reinhard => 0,
            TonemapOperator::Aces => 1,
            TonemapOperator::Uncharted2 => 2,
            TonemapOperator::None => 3,
        }
    }
}

/// Per-scene post-processing parameters
///
/// Read and written as a whole value: callers copy it out, change it and write
/// the full struct back.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PostProcessSettings {
    pub exposure: f32,
    pub gamma: f32,
    pub tonemap: TonemapOperator,
    pub bloom_threshold: f32,
    pub bloom_intensity: f32,
}

impl Default for PostProcessSettings {
    fn default() -> Self {
        Self {
            exposure: 1.0,
            gamma: 2.2,
            tonemap: TonemapOperator::Aces,
            bloom_threshold: 1.0,
            bloom_intensity: 0.5,
        }
    }
}

impl PostProcessSettings {
    pub fn with_exposure(mut self, exposure: f32) -> Self {
        self.exposure = exposure;
        self
    }

    /// Exponential exposure ramp driven by held input over `delta_time` seconds
    pub fn adjust_exposure(&mut self, up: bool, delta_time: f32) {
        let target = self.exposure * 4.0;
        let sign = if up { 1.0 } else { -1.0 };
        self.exposure += (target - self.exposure) * delta_time * sign;
    }
}
