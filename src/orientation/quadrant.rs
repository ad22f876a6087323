//! Quadrant arithmetic for orientation samples
//!
//! Everything here is pure. Angles are whole degrees; the sensor reports the
//! physical rotation of the device clockwise from its natural position.

use super::OrientationError;

/// A validated raw sensor sample in `[0, 360)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawOrientation(u16);

impl RawOrientation {
    /// Checked constructor; the sensor's "unknown" value (-1) and anything
    /// outside a single turn are rejected
    pub fn new(degrees: i32) -> Result<Self, OrientationError> {
        match u16::try_from(degrees) {
            Ok(value) if value < 360 => Ok(Self(value)),
            _ => Err(OrientationError::InvalidSample(degrees)),
        }
    }

    pub fn degrees(self) -> u16 {
        self.0
    }
}

/// Snaps a raw angle to the nearest quadrant
///
/// `(45,135] → 270`, `(135,225] → 180`, `(225,315] → 90`, everything else `→ 0`.
/// Controls counter-rotate the device, hence the inverted mapping.
pub fn snap_to_quadrant(raw: u16) -> u16 {
    match raw {
        46..=135 => 270,
        136..=225 => 180,
        226..=315 => 90,
        _ => 0,
    }
}

/// Display surface rotation as reported by the window system
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceRotation {
    Rotation0,
    Rotation90,
    Rotation180,
    Rotation270,
}

impl SurfaceRotation {
    /// Window system code (0..=3); unknown codes read as `Rotation0`
    pub fn from_code(code: i32) -> Self {
        match code {
            1 => SurfaceRotation::Rotation90,
            2 => SurfaceRotation::Rotation180,
            3 => SurfaceRotation::Rotation270,
            _ => SurfaceRotation::Rotation0,
        }
    }
}

pub fn surface_rotation_to_degrees(rotation: SurfaceRotation) -> u16 {
    match rotation {
        SurfaceRotation::Rotation0 => 0,
        SurfaceRotation::Rotation90 => 90,
        SurfaceRotation::Rotation180 => 180,
        SurfaceRotation::Rotation270 => 270,
    }
}

/// Per-screen correction, fixed at creation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeviceCorrection {
    #[default]
    Unset,
    Degrees(u16),
}

impl DeviceCorrection {
    /// Reads the explicit correction argument of split layouts (-1 = unset)
    pub fn from_arg(value: i32) -> Self {
        match u16::try_from(value) {
            Ok(degrees) if degrees < 360 => DeviceCorrection::Degrees(degrees),
            _ => DeviceCorrection::Unset,
        }
    }

    pub fn from_surface(rotation: SurfaceRotation) -> Self {
        DeviceCorrection::Degrees(surface_rotation_to_degrees(rotation))
    }

    /// Unset counts as no correction
    pub fn degrees(self) -> u16 {
        match self {
            DeviceCorrection::Unset => 0,
            DeviceCorrection::Degrees(degrees) => degrees,
        }
    }

    /// Value handed to the outbound video frame, only when positive
    pub fn video_out(self) -> Option<u16> {
        match self {
            DeviceCorrection::Degrees(degrees) if degrees > 0 => Some(degrees),
            _ => None,
        }
    }
}

/// `(capped + 360 - correction) mod 360`
pub fn effective_orientation(capped: u16, correction: DeviceCorrection) -> u16 {
    (capped + 360 - correction.degrees()) % 360
}
