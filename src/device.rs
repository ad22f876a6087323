//! Device collaborators: orientation sensor, audio route, ring tone, display
//!
//! The host platform provides these; the crate ships simulated versions for the
//! demo binary and the tests.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Local};
use tokio::sync::mpsc;
use tracing::{debug, info, trace};

use crate::orientation::SurfaceRotation;

#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    #[error("Ring asset {path} is unavailable: {source}")]
    RingAsset {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Ring asset {0} is not a file")]
    NotAFile(PathBuf),
}

/// Raw sample as produced by the sensor, timestamped on arrival
#[derive(Debug, Clone, Copy)]
pub struct OrientationSample {
    pub degrees: i32,
    pub timestamp: DateTime<Local>,
}

impl OrientationSample {
    pub fn now(degrees: i32) -> Self {
        Self {
            degrees,
            timestamp: Local::now(),
        }
    }
}

pub trait OrientationSensor: Send + Sync {
    fn can_detect_orientation(&self) -> bool;

    fn enable(&self);

    fn disable(&self);
}

pub trait AudioRouter: Send + Sync {
    fn set_speakerphone_on(&self, on: bool);

    fn is_speakerphone_on(&self) -> bool;

    fn is_wired_headset_on(&self) -> bool;
}

pub trait RingTone: Send {
    fn start(&mut self);

    fn stop(&mut self);

    fn is_playing(&self) -> bool;
}

/// Looping ring player backed by an audio asset
#[derive(Debug)]
pub struct LoopingRingPlayer {
    asset: PathBuf,
    playing: bool,
}

impl LoopingRingPlayer {
    pub fn prepare(asset: impl AsRef<Path>) -> Result<Self, DeviceError> {
        let asset = asset.as_ref().to_path_buf();
        let metadata = std::fs::metadata(&asset).map_err(|source| DeviceError::RingAsset {
            path: asset.clone(),
            source,
        })?;
        if !metadata.is_file() {
            return Err(DeviceError::NotAFile(asset));
        }
        debug!("Ring player prepared from {}", asset.display());
        Ok(Self {
            asset,
            playing: false,
        })
    }
}

impl RingTone for LoopingRingPlayer {
    fn start(&mut self) {
        info!("Ring started: {}", self.asset.display());
        self.playing = true;
    }

    fn stop(&mut self) {
        info!("Ring stopped");
        self.playing = false;
    }

    fn is_playing(&self) -> bool {
        self.playing
    }
}

impl Drop for LoopingRingPlayer {
    fn drop(&mut self) {
        if self.playing {
            self.stop();
        }
        debug!("Ring player released");
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplayInfo {
    pub surface_rotation: SurfaceRotation,
    /// Pixels per density-independent pixel
    pub density: f32,
    pub camera_count: u32,
}

impl Default for DisplayInfo {
    fn default() -> Self {
        Self {
            surface_rotation: SurfaceRotation::Rotation0,
            density: 1.0,
            camera_count: 2,
        }
    }
}

/// Bundle of device collaborators handed to the surfaces
#[derive(Clone)]
pub struct DeviceServices {
    pub sensor: Arc<dyn OrientationSensor>,
    pub audio: Arc<dyn AudioRouter>,
    pub display: DisplayInfo,
}

/// Sensor that forwards samples to the UI loop only while enabled
pub struct SimulatedSensor {
    detectable: bool,
    enabled: AtomicBool,
    samples: mpsc::UnboundedSender<OrientationSample>,
}

impl SimulatedSensor {
    pub fn new(
        detectable: bool,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<OrientationSample>) {
        let (samples, receiver) = mpsc::unbounded_channel();
        let sensor = Arc::new(Self {
            detectable,
            enabled: AtomicBool::new(false),
            samples,
        });
        (sensor, receiver)
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Emits a sample; returns whether it was delivered
    pub fn emit(&self, degrees: i32) -> bool {
        if !self.is_enabled() {
            trace!("Sensor disabled, dropping sample {}", degrees);
            return false;
        }
        self.samples.send(OrientationSample::now(degrees)).is_ok()
    }
}

impl OrientationSensor for SimulatedSensor {
    fn can_detect_orientation(&self) -> bool {
        self.detectable
    }

    fn enable(&self) {
        self.enabled.store(true, Ordering::SeqCst);
    }

    fn disable(&self) {
        self.enabled.store(false, Ordering::SeqCst);
    }
}

#[derive(Debug, Default)]
pub struct SimulatedAudio {
    speakerphone: AtomicBool,
    wired_headset: AtomicBool,
}

impl SimulatedAudio {
    pub fn plug_headset(&self, plugged: bool) {
        self.wired_headset.store(plugged, Ordering::SeqCst);
    }
}

impl AudioRouter for SimulatedAudio {
    fn set_speakerphone_on(&self, on: bool) {
        self.speakerphone.store(on, Ordering::SeqCst);
    }

    fn is_speakerphone_on(&self) -> bool {
        self.speakerphone.load(Ordering::SeqCst)
    }

    fn is_wired_headset_on(&self) -> bool {
        self.wired_headset.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_ring_asset_is_an_error() {
        let result = LoopingRingPlayer::prepare("/nonexistent/ring.ogg");
        assert!(matches!(result, Err(DeviceError::RingAsset { .. })));
    }

    #[test]
    fn directory_is_not_a_ring_asset() {
        let result = LoopingRingPlayer::prepare(std::env::temp_dir());
        assert!(matches!(result, Err(DeviceError::NotAFile(_))));
    }

    #[test]
    fn sensor_gates_samples() {
        let (sensor, mut samples) = SimulatedSensor::new(true);
        assert!(!sensor.emit(10));
        sensor.enable();
        assert!(sensor.emit(20));
        sensor.disable();
        assert!(!sensor.emit(30));

        let received = samples.try_recv().expect("one sample");
        assert_eq!(received.degrees, 20);
        assert!(samples.try_recv().is_err());
    }
}
