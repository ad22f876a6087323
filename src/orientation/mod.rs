//! Orientation-correction engine
//!
//! Turns raw sensor samples into debounced rotation commands for the in-call
//! controls, and provides the one-shot correction used for outbound video.
//!
//! ```text
//! Sensor ──► OrientationTracker ──► OrientationEngine<Listening>
//!                                        │ (quadrant changed)
//!                                        ▼
//!                                 RotationCommand ──► ControlPanel
//! ```

pub mod engine;
pub mod quadrant;
pub mod rotation;

pub use engine::OrientationTracker;
pub use quadrant::{DeviceCorrection, SurfaceRotation};
pub use rotation::{ControlId, ControlPanel};

#[derive(Debug, thiserror::Error)]
pub enum OrientationError {
    #[error("Orientation sample out of range: {0}")]
    InvalidSample(i32),

    #[error("Sensor cannot detect orientation")]
    Undetectable,
}
