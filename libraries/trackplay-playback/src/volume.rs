//! Volume with a host-controlled multiplier
//!
//! The user sets a volume; the host may scale it (ducking, per-output trims)
//! through a multiplier. The engine only ever sees `volume * multiplier`,
//! and the user keeps seeing the value they set.

/// User volume and multiplier, both clamped to 0.0-1.0
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VolumeControl {
    /// Last volume the user asked for
    user: f32,

    multiplier: f32,
}

impl VolumeControl {
    pub fn new(volume: f32, multiplier: f32) -> Self {
        Self {
            user: clamp_unit(volume),
            multiplier: clamp_unit(multiplier),
        }
    }

    /// Set the user-visible volume, returning the engine volume to apply
    pub fn set_volume(&mut self, volume: f32) -> f32 {
        self.user = clamp_unit(volume);
        self.engine_volume()
    }

    /// Change the multiplier, returning the engine volume to apply
    ///
    /// The user-visible volume is unchanged.
    pub fn set_multiplier(&mut self, multiplier: f32) -> f32 {
        self.multiplier = clamp_unit(multiplier);
        self.engine_volume()
    }

    /// Volume as the user sees it, recovered from the engine's volume
    ///
    /// With a zero multiplier the engine volume says nothing, so the stored
    /// user volume is returned instead.
    pub fn user_volume(&self, engine_volume: f32) -> f32 {
        if self.multiplier <= f32::EPSILON {
            return self.user;
        }
        clamp_unit(engine_volume / self.multiplier)
    }

    pub fn engine_volume(&self) -> f32 {
        clamp_unit(self.user * self.multiplier)
    }

    pub fn multiplier(&self) -> f32 {
        self.multiplier
    }
}

impl Default for VolumeControl {
    fn default() -> Self {
        Self::new(1.0, 1.0)
    }
}

fn clamp_unit(value: f32) -> f32 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, 1.0)
}
