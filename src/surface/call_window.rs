//! Active-call window host
//!
//! Shown either as its own orientation-locked screen (fullscreen) or as a pane
//! next to the contact list (embedded). Only the fullscreen window runs the
//! orientation engine; the embedded one follows the device orientation.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::{engine_view, Surface, SurfaceError, SurfaceLink};
use crate::device::DeviceServices;
use crate::orientation::{ControlPanel, DeviceCorrection, OrientationTracker};
use crate::router::call_window::{
    CallWindowEffect, CallWindowReducer, CallWindowState, PreviewLayout, WindowKind,
};
use crate::router::step;
use crate::sdk::{
    CallHandle, CallId, CallStatus, SessionEvent, VideoOutFrame, VideoSource, VideoSurfaceId,
};
use crate::session::{SessionContext, SessionError};

const VIDEO_IN_SURFACE: VideoSurfaceId = VideoSurfaceId(1);
const VIDEO_OUT_SURFACE: VideoSurfaceId = VideoSurfaceId(2);

#[derive(Debug, Clone)]
pub struct CallWindowSettings {
    pub animation: Duration,
    pub preview_overlay_dp: u32,
    pub can_come_back: bool,
}

/// Local preview size in pixels, `MatchParent` when filling the window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreviewSize {
    Fixed { width: u32, height: u32 },
    MatchParent,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallControls {
    pub speakerphone: bool,
    pub muted: bool,
    pub video_running: bool,
    pub front_camera: bool,
    pub source_toggle_visible: bool,
    pub preview_visible: bool,
}

pub struct CallWindow {
    link: SurfaceLink,
    session: SessionContext,
    device: Option<DeviceServices>,
    settings: CallWindowSettings,
    call: Option<Arc<dyn CallHandle>>,
    state: Option<CallWindowState>,
    orientation: OrientationTracker,
    panel: ControlPanel,
    controls: CallControls,
    preview: PreviewSize,
    title: String,
}

impl CallWindow {
    /// Opens the window for `call_id`; a missing id, a missing engine, an
    /// unknown call or one that already ended close it right away
    pub fn create(
        session: SessionContext,
        device: DeviceServices,
        settings: CallWindowSettings,
        call_id: Option<CallId>,
        kind: WindowKind,
        correction: DeviceCorrection,
    ) -> Self {
        let mut window = Self {
            link: SurfaceLink::finished("call-window"),
            session,
            device: None,
            panel: ControlPanel::new(settings.animation),
            settings,
            call: None,
            state: None,
            orientation: OrientationTracker::absent(),
            controls: CallControls {
                speakerphone: false,
                muted: false,
                video_running: true,
                front_camera: true,
                source_toggle_visible: device.display.camera_count > 1,
                preview_visible: true,
            },
            preview: PreviewSize::MatchParent,
            title: String::new(),
        };

        let call = match resolve_call(&window.session, call_id) {
            Ok(call) => call,
            Err(e) => {
                warn!("Call window closed: {}", e);
                return window;
            }
        };
        let call_id = call.call_id();

        window.link = SurfaceLink::attach("call-window", window.session.bus());
        let locked = kind == WindowKind::Fullscreen;

        // Video out follows the device when locked, otherwise takes the explicit correction
        call.set_video_out(Some(VideoOutFrame {
            surface: VIDEO_OUT_SURFACE,
            use_device_orientation: locked,
            device_correction: if locked { None } else { correction.video_out() },
        }));
        call.set_video_in(Some(VIDEO_IN_SURFACE));

        if locked {
            window.orientation = OrientationTracker::new(
                device.sensor.clone(),
                DeviceCorrection::from_surface(device.display.surface_rotation),
            );
        }

        let speakerphone = !device.audio.is_wired_headset_on();
        window.device = Some(device);
        window.set_speakerphone(speakerphone);

        let state = CallWindowState::new(call_id, kind, call.is_receiving_video());
        window.resize_preview(state.preview);
        window.title = call.contact_display_name();
        info!("Call window for {} opened ({:?})", call_id, kind);

        window.state = Some(state);
        window.call = Some(call);
        window
    }

    pub fn call_id(&self) -> Option<CallId> {
        self.state.as_ref().map(|state| state.tracked)
    }

    pub fn kind(&self) -> Option<WindowKind> {
        self.state.as_ref().map(|state| state.kind)
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn controls(&self) -> &CallControls {
        &self.controls
    }

    pub fn preview(&self) -> PreviewSize {
        self.preview
    }

    pub fn panel(&self) -> &ControlPanel {
        &self.panel
    }

    pub fn is_tracking_orientation(&self) -> bool {
        self.orientation.is_listening()
    }

    fn active_call(&self) -> Result<&Arc<dyn CallHandle>, SurfaceError> {
        self.link.ensure_alive()?;
        self.call
            .as_ref()
            .ok_or(SurfaceError::Finished(self.link.name()))
    }

    /// Screen became visible
    pub fn start(&mut self) {
        if self.link.is_alive() {
            self.orientation.foreground();
        }
    }

    /// Screen went to the background
    pub fn stop(&mut self) {
        self.orientation.background();
    }

    pub fn on_orientation_sample(&mut self, degrees: i32) {
        if !self.link.is_alive() {
            return;
        }
        if let Some(command) = self.orientation.on_sample(degrees) {
            self.panel.apply(command);
        }
    }

    fn set_speakerphone(&mut self, on: bool) {
        if let Some(device) = &self.device {
            device.audio.set_speakerphone_on(on);
        }
        self.controls.speakerphone = on;
    }

    pub fn toggle_speakerphone(&mut self) -> Result<(), SurfaceError> {
        self.link.ensure_alive()?;
        let on = self
            .device
            .as_ref()
            .map_or(self.controls.speakerphone, |device| {
                device.audio.is_speakerphone_on()
            });
        self.set_speakerphone(!on);
        Ok(())
    }

    /// Headset (un)plugged: speaker only without a wired headset
    pub fn on_headset_plug(&mut self) {
        if !self.link.is_alive() {
            return;
        }
        let wired = self
            .device
            .as_ref()
            .is_some_and(|device| device.audio.is_wired_headset_on());
        self.set_speakerphone(!wired);
    }

    pub fn toggle_mute(&mut self) -> Result<(), SurfaceError> {
        let call = self.active_call()?.clone();
        let muted = !self.controls.muted;
        if muted {
            call.audio_mute();
        } else {
            call.audio_unmute();
        }
        self.controls.muted = muted;
        Ok(())
    }

    pub fn toggle_video(&mut self) -> Result<(), SurfaceError> {
        let call = self.active_call()?.clone();
        let running = !self.controls.video_running;
        let cameras = self
            .device
            .as_ref()
            .map_or(0, |device| device.display.camera_count);
        if running {
            call.video_start();
        } else {
            call.video_stop();
        }
        self.controls.video_running = running;
        self.controls.preview_visible = running;
        self.controls.source_toggle_visible = running && cameras > 1;
        Ok(())
    }

    pub fn toggle_video_source(&mut self) -> Result<(), SurfaceError> {
        let call = self.active_call()?.clone();
        let front = !self.controls.front_camera;
        call.set_video_source(if front {
            VideoSource::Front
        } else {
            VideoSource::Back
        });
        self.controls.front_camera = front;
        Ok(())
    }

    pub fn hangup(&self) -> Result<(), SurfaceError> {
        self.active_call()?.hangup();
        Ok(())
    }

    /// Back navigation, honoured only when configured
    pub fn back(&mut self) -> bool {
        if !self.settings.can_come_back {
            debug!("Back ignored on the call window");
            return false;
        }
        self.destroy();
        true
    }

    fn resize_preview(&mut self, layout: PreviewLayout) {
        self.preview = match layout {
            PreviewLayout::Overlay => {
                let density = self.device.as_ref().map_or(1.0, |d| d.display.density);
                let side = (self.settings.preview_overlay_dp as f32 * density).round() as u32;
                PreviewSize::Fixed {
                    width: side,
                    height: side,
                }
            }
            PreviewLayout::Fill => PreviewSize::MatchParent,
        };
    }

    fn tear_down_video(&self) {
        if let Some(call) = &self.call {
            call.set_video_out(None);
            call.set_video_in(None);
        }
    }

    pub fn destroy(&mut self) {
        if !self.link.is_alive() && self.call.is_none() {
            return;
        }
        if self.kind() == Some(WindowKind::Fullscreen) {
            if let Some(call) = &self.call {
                call.video_stop();
            }
            self.tear_down_video();
        }
        self.orientation.release();
        self.call = None;
        self.link.finish();
    }

    fn handle(&mut self, event: &SessionEvent) {
        let Some(state) = self.state.as_ref() else {
            return;
        };
        let view = engine_view(&self.session);
        let transition = step::<CallWindowReducer>(state, event, &view);
        self.state = Some(transition.state);

        for effect in transition.effects {
            if !self.link.is_alive() {
                debug!("Call window gone, dropping {:?}", effect);
                break;
            }
            match effect {
                CallWindowEffect::ResizePreview(layout) => self.resize_preview(layout),
                CallWindowEffect::TearDownVideo => self.tear_down_video(),
                CallWindowEffect::Leave => self.destroy(),
            }
        }
    }
}

/// The call a window may be opened for: given, known and not ended
fn resolve_call(
    session: &SessionContext,
    call_id: Option<CallId>,
) -> Result<Arc<dyn CallHandle>, SurfaceError> {
    let call_id = call_id.ok_or(SessionError::MissingArgument("call_id"))?;
    let call = session.call(call_id)?;
    if call.status() == CallStatus::Ended {
        return Err(SurfaceError::CallEnded(call_id));
    }
    Ok(call)
}

impl Surface for CallWindow {
    fn name(&self) -> &'static str {
        self.link.name()
    }

    fn is_alive(&self) -> bool {
        self.link.is_alive()
    }

    fn process_pending(&mut self) -> usize {
        let events = self.link.pending();
        for event in &events {
            if !self.link.is_alive() {
                break;
            }
            self.handle(event);
        }
        events.len()
    }
}

impl Drop for CallWindow {
    fn drop(&mut self) {
        self.destroy();
    }
}
