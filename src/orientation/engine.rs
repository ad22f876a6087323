//! Orientation engine with statum state machine for sensor lifecycle
//!
//! # State Machine
//!
//! ```text
//! Detached ──► Listening ◄──► Suspended
//!   (start)     (suspend / resume)
//! ```
//!
//! The sensor registration is held only while `Listening`. Dropping the engine
//! in any state releases it.

use std::sync::Arc;

use statum::{machine, state};
use tracing::{debug, info, warn};

use super::quadrant::{effective_orientation, snap_to_quadrant, DeviceCorrection, RawOrientation};
use super::rotation::RotationCommand;
use super::OrientationError;
use crate::device::OrientationSensor;

/// Scoped sensor registration, released on drop
pub struct SensorRegistration {
    sensor: Arc<dyn OrientationSensor>,
    held: bool,
}

impl SensorRegistration {
    fn new(sensor: Arc<dyn OrientationSensor>) -> Self {
        Self {
            sensor,
            held: false,
        }
    }

    fn acquire(&mut self) {
        if !self.held {
            self.sensor.enable();
            self.held = true;
            debug!("Orientation sensor acquired");
        }
    }

    fn release(&mut self) {
        if self.held {
            self.sensor.disable();
            self.held = false;
            debug!("Orientation sensor released");
        }
    }
}

impl Drop for SensorRegistration {
    fn drop(&mut self) {
        self.release();
    }
}

#[state]
#[derive(Debug, Clone)]
pub enum SensorState {
    Detached,  // Created, sensor not registered yet
    Listening, // Registered, samples are processed
    Suspended, // Owner in background, sensor released
}

#[machine]
pub struct OrientationEngine<S: SensorState> {
    registration: SensorRegistration,
    correction: DeviceCorrection,
    last_applied: Option<u16>,
}

impl<S: SensorState> OrientationEngine<S> {
    pub fn correction(&self) -> DeviceCorrection {
        self.correction
    }

    pub fn last_applied(&self) -> Option<u16> {
        self.last_applied
    }
}

impl OrientationEngine<Detached> {
    pub fn create(sensor: Arc<dyn OrientationSensor>, correction: DeviceCorrection) -> Self {
        debug!("Creating orientation engine with correction {:?}", correction);
        Self::new(
            SensorRegistration::new(sensor),
            correction,
            None, // last_applied
        )
    }

    pub fn start(mut self) -> Result<OrientationEngine<Listening>, OrientationError> {
        if !self.registration.sensor.can_detect_orientation() {
            warn!("Device cannot detect orientation, controls keep their default angle");
            return Err(OrientationError::Undetectable);
        }
        self.registration.acquire();
        info!("Orientation engine listening");
        Ok(self.transition())
    }
}

impl OrientationEngine<Listening> {
    /// Processes one sample; yields a command only when the effective
    /// orientation differs from the last applied one
    pub fn on_sample(&mut self, sample: RawOrientation) -> Option<RotationCommand> {
        let capped = snap_to_quadrant(sample.degrees());
        let effective = effective_orientation(capped, self.correction);
        if self.last_applied == Some(effective) {
            return None;
        }
        debug!(
            "Orientation {} -> {} (capped {}, correction {:?})",
            sample.degrees(),
            effective,
            capped,
            self.correction
        );
        self.last_applied = Some(effective);
        Some(RotationCommand { target: effective })
    }

    pub fn suspend(mut self) -> OrientationEngine<Suspended> {
        self.registration.release();
        debug!("Orientation engine suspended");
        self.transition()
    }
}

impl OrientationEngine<Suspended> {
    pub fn resume(mut self) -> OrientationEngine<Listening> {
        self.registration.acquire();
        debug!("Orientation engine resumed");
        self.transition()
    }
}

enum OrientationLifecycle {
    Detached(OrientationEngine<Detached>),
    Listening(OrientationEngine<Listening>),
    Suspended(OrientationEngine<Suspended>),
}

/// Owner-side wrapper that follows the screen's foreground visibility
///
/// An empty slot means the engine is absent: the screen follows the device
/// orientation natively, or the sensor could not detect orientation.
pub struct OrientationTracker {
    slot: Option<OrientationLifecycle>,
}

impl OrientationTracker {
    pub fn new(sensor: Arc<dyn OrientationSensor>, correction: DeviceCorrection) -> Self {
        Self {
            slot: Some(OrientationLifecycle::Detached(OrientationEngine::create(
                sensor, correction,
            ))),
        }
    }

    pub fn absent() -> Self {
        Self { slot: None }
    }

    pub fn is_listening(&self) -> bool {
        matches!(self.slot, Some(OrientationLifecycle::Listening(_)))
    }

    pub fn foreground(&mut self) {
        self.slot = match self.slot.take() {
            Some(OrientationLifecycle::Detached(engine)) => match engine.start() {
                Ok(engine) => Some(OrientationLifecycle::Listening(engine)),
                Err(e) => {
                    warn!("Orientation engine not started: {}", e);
                    None
                }
            },
            Some(OrientationLifecycle::Suspended(engine)) => {
                Some(OrientationLifecycle::Listening(engine.resume()))
            }
            other => other,
        };
    }

    pub fn background(&mut self) {
        self.slot = match self.slot.take() {
            Some(OrientationLifecycle::Listening(engine)) => {
                Some(OrientationLifecycle::Suspended(engine.suspend()))
            }
            other => other,
        };
    }

    pub fn on_sample(&mut self, degrees: i32) -> Option<RotationCommand> {
        let Some(OrientationLifecycle::Listening(engine)) = self.slot.as_mut() else {
            return None;
        };
        match RawOrientation::new(degrees) {
            Ok(sample) => engine.on_sample(sample),
            Err(e) => {
                debug!("Dropping sample: {}", e);
                None
            }
        }
    }

    pub fn release(&mut self) {
        if self.slot.take().is_some() {
            debug!("Orientation engine released");
        }
    }
}
