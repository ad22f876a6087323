//! Application shell
//!
//! Owns every surface, the session context and the navigation queue. All
//! handlers run on the loop driven by [`AppShell::run`]: bus publications,
//! sensor samples and UI commands are marshalled here before any surface sees
//! them.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::config::AppConfig;
use crate::device::{DeviceServices, OrientationSample, RingTone};
use crate::orientation::{ControlId, DeviceCorrection};
use crate::router::call_window::WindowKind;
use crate::sdk::{CallHandle, CallId, CallStatus, EngineConnector, EventBus};
use crate::session::SessionContext;
use crate::surface::call_window::{CallWindowSettings, PreviewSize};
use crate::surface::presence::prepare_ring;
use crate::surface::{
    CallWindow, ConnectScreen, ContactsScreen, Navigation, Navigator, PresenceService, Surface,
    SurfaceError,
};

/// Upper bound of dispatch rounds before the shell yields
const MAX_DISPATCH_ROUNDS: usize = 64;

/// User input fed to the loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiCommand {
    SubmitAppId(String),
    ChooseUser(String),
    SetDisplayName(String),
    CallContact(String),
    PickUp(CallId),
    Decline(CallId),
    ToggleCheckedMode,
    CancelOutgoingCall,
    ToggleSpeakerphone,
    /// Wired headset plugged or unplugged
    HeadsetChanged,
    ToggleMute,
    ToggleVideo,
    ToggleVideoSource,
    HangUp,
    Back,
    Background,
    Foreground,
    Disconnect,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingPrompt {
    pub call_id: CallId,
    pub display_name: String,
}

type RingFactory = Box<dyn Fn() -> Option<Box<dyn RingTone>> + Send>;

pub struct AppShell {
    config: AppConfig,
    session: SessionContext,
    connector: Arc<dyn EngineConnector>,
    device: DeviceServices,
    ring_factory: RingFactory,
    navigator: Navigator,
    navigation: mpsc::UnboundedReceiver<Navigation>,
    connect: Option<ConnectScreen>,
    contacts: Option<ContactsScreen>,
    call_screen: Option<CallWindow>,
    embedded: Option<CallWindow>,
    presence: Option<PresenceService>,
    incoming: Option<IncomingPrompt>,
}

impl AppShell {
    pub fn new(
        config: AppConfig,
        connector: Arc<dyn EngineConnector>,
        device: DeviceServices,
    ) -> Self {
        let session = SessionContext::new(EventBus::new(), config.demo_accounts());
        let (navigator, navigation) = Navigator::channel();
        let ring_asset = config.presence.ring_asset.clone();
        Self {
            config,
            session,
            connector,
            device,
            ring_factory: Box::new(move || prepare_ring(ring_asset.as_deref())),
            navigator,
            navigation,
            connect: None,
            contacts: None,
            call_screen: None,
            embedded: None,
            presence: None,
            incoming: None,
        }
    }

    /// Replaces how the presence service obtains its ring tone
    #[cfg(test)]
    pub fn set_ring_factory(
        &mut self,
        factory: impl Fn() -> Option<Box<dyn RingTone>> + Send + 'static,
    ) {
        self.ring_factory = Box::new(factory);
    }

    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    pub fn connect(&mut self) -> Option<&mut ConnectScreen> {
        self.connect.as_mut()
    }

    pub fn contacts(&mut self) -> Option<&mut ContactsScreen> {
        self.contacts.as_mut()
    }

    pub fn call_screen(&mut self) -> Option<&mut CallWindow> {
        self.call_screen.as_mut()
    }

    #[cfg(test)]
    pub fn embedded_call_window(&mut self) -> Option<&mut CallWindow> {
        self.embedded.as_mut()
    }

    pub fn presence(&self) -> Option<&PresenceService> {
        self.presence.as_ref()
    }

    pub fn incoming(&self) -> Option<&IncomingPrompt> {
        self.incoming.as_ref()
    }

    /// Opens the first screen
    pub fn launch(&mut self) {
        info!("Launching application shell");
        self.connect = Some(ConnectScreen::create(
            self.session.clone(),
            self.connector.clone(),
            self.navigator.clone(),
        ));
        self.dispatch();
    }

    fn call_window_settings(&self, can_come_back: bool) -> CallWindowSettings {
        CallWindowSettings {
            animation: self.config.animation(),
            preview_overlay_dp: self.config.call_window.preview_overlay_dp,
            can_come_back,
        }
    }

    pub fn navigate(&mut self, navigation: Navigation) {
        debug!("Navigating: {:?}", navigation);
        match navigation {
            Navigation::OpenContacts { pickup } => {
                if let Some(contacts) = self.contacts.as_mut().filter(|c| c.is_alive()) {
                    contacts.new_request(pickup);
                    return;
                }
                let mut contacts = ContactsScreen::create(
                    self.session.clone(),
                    self.navigator.clone(),
                    self.config.placement(),
                    self.config.call_window.can_come_back,
                    pickup,
                );
                contacts.start();
                self.contacts = Some(contacts);
            }
            Navigation::OpenCallScreen {
                call_id,
                can_come_back,
            } => {
                let showing = self
                    .call_screen
                    .as_ref()
                    .is_some_and(|window| window.is_alive() && window.call_id() == Some(call_id));
                if showing {
                    return;
                }
                let mut window = CallWindow::create(
                    self.session.clone(),
                    self.device.clone(),
                    self.call_window_settings(can_come_back),
                    Some(call_id),
                    WindowKind::Fullscreen,
                    DeviceCorrection::Unset,
                );
                window.start();
                self.call_screen = Some(window);
            }
            Navigation::EmbedCallWindow {
                call_id,
                correction,
            } => {
                if let Some(mut previous) = self.embedded.take() {
                    previous.destroy();
                }
                let mut window = CallWindow::create(
                    self.session.clone(),
                    self.device.clone(),
                    self.call_window_settings(false),
                    Some(call_id),
                    WindowKind::Embedded,
                    correction,
                );
                window.start();
                self.embedded = Some(window);
            }
            Navigation::RemoveEmbeddedCallWindow => {
                if let Some(mut window) = self.embedded.take() {
                    window.destroy();
                }
            }
            Navigation::ShowIncomingPrompt {
                call_id,
                display_name,
            } => {
                info!("Incoming call {} from {}", call_id, display_name);
                self.incoming = Some(IncomingPrompt {
                    call_id,
                    display_name,
                });
            }
            Navigation::DismissIncomingPrompt { call_id } => {
                if self.incoming.as_ref().is_some_and(|p| p.call_id == call_id) {
                    info!("Incoming prompt for {} dismissed", call_id);
                    self.incoming = None;
                }
            }
            Navigation::StartPresenceService => {
                if !self.presence.as_ref().is_some_and(|p| p.is_alive()) {
                    let ring = (self.ring_factory)();
                    self.presence = Some(PresenceService::create(
                        self.session.clone(),
                        self.navigator.clone(),
                        self.config.presence.app_name.clone(),
                        ring,
                    ));
                }
                if let Some(presence) = self.presence.as_mut() {
                    presence.refresh();
                }
            }
            Navigation::RefreshPresence => {
                if let Some(presence) = self.presence.as_mut() {
                    presence.refresh();
                }
            }
            Navigation::StopPresenceService => {
                if let Some(mut presence) = self.presence.take() {
                    presence.destroy();
                }
            }
        }
    }

    fn surfaces(&mut self) -> Vec<&mut dyn Surface> {
        let mut surfaces: Vec<&mut dyn Surface> = Vec::new();
        if let Some(connect) = self.connect.as_mut() {
            surfaces.push(connect);
        }
        if let Some(contacts) = self.contacts.as_mut() {
            surfaces.push(contacts);
        }
        if let Some(window) = self.call_screen.as_mut() {
            surfaces.push(window);
        }
        if let Some(window) = self.embedded.as_mut() {
            surfaces.push(window);
        }
        if let Some(presence) = self.presence.as_mut() {
            surfaces.push(presence);
        }
        surfaces
    }

    /// Pumps events and navigation until both are quiet
    pub fn dispatch(&mut self) -> usize {
        let mut total = 0;
        for _ in 0..MAX_DISPATCH_ROUNDS {
            let mut handled = 0;
            for surface in self.surfaces() {
                handled += surface.process_pending();
            }
            while let Ok(navigation) = self.navigation.try_recv() {
                self.navigate(navigation);
                handled += 1;
            }
            self.reap_finished();
            if handled == 0 {
                return total;
            }
            total += handled;
        }
        warn!("Dispatch still busy after {} rounds", MAX_DISPATCH_ROUNDS);
        total
    }

    /// Drops surfaces that finished
    pub fn reap_finished(&mut self) {
        fn reap<S: Surface>(slot: &mut Option<S>) {
            if slot.as_ref().is_some_and(|surface| !surface.is_alive()) {
                if let Some(surface) = slot.take() {
                    debug!("Reaping surface {}", surface.name());
                }
            }
        }
        reap(&mut self.connect);
        reap(&mut self.contacts);
        reap(&mut self.call_screen);
        reap(&mut self.embedded);
        reap(&mut self.presence);
    }

    /// The call behind the incoming prompt, as long as it still rings
    fn ringing_call(&mut self, call_id: CallId) -> Result<Arc<dyn CallHandle>, SurfaceError> {
        if self.incoming.as_ref().is_some_and(|p| p.call_id == call_id) {
            self.incoming = None;
        }
        let call = self.session.call(call_id)?;
        if call.status() != CallStatus::Ringing {
            return Err(SurfaceError::NotRinging(call_id));
        }
        Ok(call)
    }

    /// Accepts the call of the incoming prompt and shows it
    pub fn pick_up(&mut self, call_id: CallId) -> Result<(), SurfaceError> {
        self.ringing_call(call_id)?.accept();
        self.navigate(Navigation::OpenContacts {
            pickup: Some(call_id),
        });
        self.dispatch();
        Ok(())
    }

    pub fn decline(&mut self, call_id: CallId) -> Result<(), SurfaceError> {
        self.ringing_call(call_id)?.hangup();
        self.dispatch();
        Ok(())
    }

    pub fn on_orientation_sample(&mut self, sample: OrientationSample) {
        trace!(
            "Orientation sample {} at {}",
            sample.degrees,
            sample.timestamp.format("%H:%M:%S%.3f")
        );
        if let Some(window) = self.call_screen.as_mut() {
            window.on_orientation_sample(sample.degrees);
        }
    }

    pub fn background(&mut self) {
        if let Some(window) = self.call_screen.as_mut() {
            window.stop();
        }
        if let Some(contacts) = self.contacts.as_mut() {
            contacts.stop();
        }
    }

    pub fn foreground(&mut self) {
        if let Some(contacts) = self.contacts.as_mut() {
            contacts.start();
        }
        if let Some(window) = self.call_screen.as_mut() {
            window.start();
        }
    }

    pub fn on_headset_plug(&mut self) {
        for window in [self.call_screen.as_mut(), self.embedded.as_mut()]
            .into_iter()
            .flatten()
        {
            window.on_headset_plug();
        }
    }

    /// Back press on the topmost screen
    pub fn back(&mut self) {
        if let Some(window) = self.call_screen.as_mut().filter(|w| w.is_alive()) {
            window.back();
        } else if let Some(contacts) = self.contacts.as_mut() {
            contacts.back();
        }
    }

    fn contacts_screen(&mut self) -> Result<&mut ContactsScreen, SurfaceError> {
        self.contacts
            .as_mut()
            .ok_or(SurfaceError::Finished("contacts"))
    }

    fn active_window(&mut self) -> Result<&mut CallWindow, SurfaceError> {
        self.call_screen
            .as_mut()
            .or(self.embedded.as_mut())
            .ok_or(SurfaceError::Finished("call-window"))
    }

    pub fn execute(&mut self, command: UiCommand) -> Result<(), SurfaceError> {
        debug!("Executing {:?}", command);
        match command {
            UiCommand::SubmitAppId(app_id) => self
                .connect
                .as_mut()
                .ok_or(SurfaceError::Finished("connect"))?
                .submit_app_id(&app_id)?,
            UiCommand::ChooseUser(user_id) => self
                .connect
                .as_mut()
                .ok_or(SurfaceError::Finished("connect"))?
                .choose_user(&user_id)?,
            UiCommand::SetDisplayName(name) => self.contacts_screen()?.set_display_name(&name)?,
            UiCommand::CallContact(contact) => self.contacts_screen()?.choose(&contact)?,
            UiCommand::ToggleCheckedMode => self.contacts_screen()?.toggle_checked_mode(),
            UiCommand::CancelOutgoingCall => self.contacts_screen()?.cancel_outgoing_call()?,
            UiCommand::PickUp(call_id) => self.pick_up(call_id)?,
            UiCommand::Decline(call_id) => self.decline(call_id)?,
            UiCommand::ToggleSpeakerphone => self.active_window()?.toggle_speakerphone()?,
            UiCommand::HeadsetChanged => self.on_headset_plug(),
            UiCommand::ToggleMute => self.active_window()?.toggle_mute()?,
            UiCommand::ToggleVideo => self.active_window()?.toggle_video()?,
            UiCommand::ToggleVideoSource => self.active_window()?.toggle_video_source()?,
            UiCommand::HangUp => self.active_window()?.hangup()?,
            UiCommand::Back => self.back(),
            UiCommand::Background => self.background(),
            UiCommand::Foreground => self.foreground(),
            UiCommand::Disconnect => match self.contacts.as_mut() {
                Some(contacts) => contacts.disconnect(),
                None => self.session.disconnect(),
            },
        }
        self.dispatch();
        self.log_status();
        Ok(())
    }

    /// What the user currently sees
    fn log_status(&self) {
        if let Some(connect) = &self.connect {
            let view = connect.view();
            debug!(
                "Connect {:?}: dialog {:?}, error {:?}, {} notices",
                connect.phase(),
                view.dialog,
                view.error,
                view.notices.len()
            );
        }
        if let Some(contacts) = &self.contacts {
            let view = contacts.view();
            debug!(
                "Contacts {:?}: {:?} action enabled {}, calling {:?}, tracking {:?}",
                view.title,
                view.action_label,
                view.call_action_enabled,
                view.calling_indicator,
                contacts.state().tracked
            );
            if let Some(name) = &view.display_name_prompt {
                debug!("Display name prompt, pre-filled with {:?}", name);
            }
            if let Some(contact) = &view.contact_check {
                debug!("Availability of {} shown", contact);
            }
            if let Some(error) = view.errors.last() {
                debug!("Last contacts error: {}", error);
            }
        }
        for window in [&self.call_screen, &self.embedded].into_iter().flatten() {
            let controls = window.controls();
            let preview = match window.preview() {
                PreviewSize::Fixed { width, height } => format!("{}x{}", width, height),
                PreviewSize::MatchParent => "fill".to_string(),
            };
            let angles: Vec<f32> = ControlId::ALL
                .iter()
                .map(|id| window.panel().control(*id).rotation)
                .collect();
            debug!(
                "Call window {:?}: speaker {}, muted {}, video {}, front camera {}, source toggle {}",
                window.title(),
                controls.speakerphone,
                controls.muted,
                controls.video_running,
                controls.front_camera,
                controls.source_toggle_visible
            );
            debug!(
                "Preview {} (visible {}), controls at {:?}, orientation tracked {}",
                preview,
                controls.preview_visible,
                angles,
                window.is_tracking_orientation()
            );
        }
        if let Some(presence) = &self.presence {
            if let Some(notification) = presence.notification() {
                debug!(
                    "Notification {:?} {:?}, in call {}, ringing {}",
                    notification.title,
                    notification.text,
                    notification.in_call,
                    presence.state().ringing
                );
            }
        }
        if let Some(prompt) = &self.incoming {
            debug!("Incoming prompt: {} from {}", prompt.call_id, prompt.display_name);
        }
    }

    /// UI loop; returns when `shutdown` is cancelled
    pub async fn run(
        &mut self,
        mut samples: mpsc::UnboundedReceiver<OrientationSample>,
        mut commands: mpsc::UnboundedReceiver<UiCommand>,
        shutdown: CancellationToken,
    ) {
        let bus = self.session.bus().clone();
        info!("UI loop started");
        loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => {
                    info!("UI loop shutting down");
                    break;
                }
                Some(command) = commands.recv() => {
                    if let Err(e) = self.execute(command) {
                        warn!("Command failed: {}", e);
                    }
                }
                Some(sample) = samples.recv() => {
                    self.on_orientation_sample(sample);
                }
                _ = bus.notified() => {
                    debug!("Bus activity");
                }
            }
            self.dispatch();
        }
        self.shutdown();
    }

    /// Releases every surface
    pub fn shutdown(&mut self) {
        if let Some(mut window) = self.call_screen.take() {
            window.destroy();
        }
        if let Some(mut window) = self.embedded.take() {
            window.destroy();
        }
        self.contacts = None;
        if let Some(mut connect) = self.connect.take() {
            connect.destroy();
        }
        if let Some(mut presence) = self.presence.take() {
            presence.destroy();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    use crate::device::{DisplayInfo, SimulatedAudio, SimulatedSensor};
    use crate::sdk::simulated::{SimulatedConnector, SimulatedEngine};
    use crate::sdk::{
        CallEngine, CallSnapshot, CallStatus, CanCreateCallError, CanCreateCallFault,
        SessionEvent,
    };
    use crate::surface::presence::tests::CountingRing;

    struct Harness {
        shell: AppShell,
        connector: Arc<SimulatedConnector>,
        sensor: Arc<SimulatedSensor>,
        ring: CountingRing,
    }

    impl Harness {
        fn new(config: AppConfig) -> Self {
            let connector = Arc::new(SimulatedConnector::new());
            let (sensor, _samples) = SimulatedSensor::new(true);
            let device = DeviceServices {
                sensor: sensor.clone(),
                audio: Arc::new(SimulatedAudio::default()),
                display: DisplayInfo::default(),
            };
            let mut shell = AppShell::new(config, connector.clone(), device);
            let ring = CountingRing::default();
            let factory_ring = ring.clone();
            shell.set_ring_factory(move || Some(Box::new(factory_ring.clone()) as Box<dyn RingTone>));
            Self {
                shell,
                connector,
                sensor,
                ring,
            }
        }

        fn logged_in(config: AppConfig) -> Self {
            let mut harness = Self::new(config);
            harness.shell.launch();
            harness
                .shell
                .execute(UiCommand::SubmitAppId("demo-app".to_string()))
                .expect("connect open");
            harness
                .shell
                .execute(UiCommand::ChooseUser("k.tenma".to_string()))
                .expect("connect open");
            harness
        }

        fn engine(&self) -> Arc<SimulatedEngine> {
            self.connector.engine().expect("engine initialized")
        }
    }

    fn snapshot(id: i32) -> CallSnapshot {
        CallSnapshot {
            id: CallId(id),
            status: CallStatus::Ended,
            contact_display_name: "Eva Heinman".to_string(),
            receiving_video: false,
        }
    }

    #[test]
    fn login_opens_contacts_and_presence() {
        let mut h = Harness::logged_in(AppConfig::default());
        assert!(h.shell.connect().is_none());
        assert!(h.shell.contacts().is_some_and(|c| c.is_alive()));
        assert!(h.shell.contacts().is_some_and(|c| c.view().call_action_enabled));
        let notification = h.shell.presence().and_then(|p| p.notification()).cloned();
        assert_eq!(notification.map(|n| n.title), Some("Call Helper".to_string()));
    }

    #[test]
    fn contacts_without_engine_exit() {
        let mut h = Harness::new(AppConfig::default());
        h.shell.navigate(Navigation::OpenContacts { pickup: None });
        h.shell.dispatch();
        assert!(h.shell.contacts().is_none());
        assert!(h.shell.presence().is_none());
    }

    #[test]
    fn call_screen_without_engine_exits() {
        let mut h = Harness::new(AppConfig::default());
        h.shell.navigate(Navigation::OpenCallScreen {
            call_id: CallId(7),
            can_come_back: false,
        });
        h.shell.dispatch();
        assert!(h.shell.call_screen().is_none());
    }

    #[test]
    fn call_seven_lifecycle_stops_ring_once() {
        let mut h = Harness::logged_in(AppConfig::default());
        let engine = h.engine();
        engine.reserve_call_ids(7);

        h.shell
            .execute(UiCommand::CallContact("fortner-n".to_string()))
            .expect("call action enabled");
        assert_eq!(
            h.shell.contacts().and_then(|c| c.view().calling_indicator),
            Some(CallId(7))
        );

        engine.set_call_status(CallId(7), CallStatus::Ringing);
        h.shell.dispatch();
        assert_eq!(h.ring.starts.load(Ordering::SeqCst), 1);
        assert_eq!(h.shell.incoming().map(|p| p.call_id), Some(CallId(7)));

        engine.set_call_status(CallId(7), CallStatus::Active);
        h.shell.dispatch();
        assert_eq!(h.shell.call_screen().and_then(|w| w.call_id()), Some(CallId(7)));
        assert!(h.sensor.is_enabled());
        assert!(h.shell.incoming().is_none());

        engine.set_call_status(CallId(7), CallStatus::Ended);
        h.shell.dispatch();
        assert_eq!(h.ring.stops.load(Ordering::SeqCst), 1);
        assert!(h.shell.call_screen().is_none());
        assert!(!h.sensor.is_enabled());
        assert!(h.shell.contacts().is_some_and(|c| c.view().call_action_enabled));
        assert_eq!(
            h.shell.presence().and_then(|p| p.notification()).map(|n| n.in_call),
            Some(false)
        );
    }

    #[test]
    fn pick_up_opens_the_call_screen_once() {
        let mut h = Harness::logged_in(AppConfig::default());
        let engine = h.engine();
        let id = engine.incoming_call("Johan Liebert").expect("incoming");
        h.shell.dispatch();
        assert_eq!(h.shell.incoming().map(|p| p.call_id), Some(id));

        h.shell.execute(UiCommand::PickUp(id)).expect("known call");
        assert!(h.shell.incoming().is_none());
        assert_eq!(h.shell.call_screen().and_then(|w| w.call_id()), Some(id));
        assert_eq!(
            h.shell.contacts().and_then(|c| c.state().call_window),
            Some(id)
        );
        assert_eq!(h.ring.stops.load(Ordering::SeqCst), 1);

        let speaker = h.shell.call_screen().is_some_and(|w| w.controls().speakerphone);
        h.shell
            .execute(UiCommand::ToggleSpeakerphone)
            .expect("window open");
        h.shell.execute(UiCommand::ToggleVideoSource).expect("window open");
        h.shell.execute(UiCommand::Back).expect("ignored");
        let controls = h.shell.call_screen().map(|w| w.controls().clone());
        assert_eq!(controls.as_ref().map(|c| c.speakerphone), Some(!speaker));
        assert_eq!(controls.map(|c| c.front_camera), Some(false));

        h.shell.execute(UiCommand::HangUp).expect("window open");
        assert!(h.shell.call_screen().is_none());
    }

    #[test]
    fn decline_stops_ring_and_clears_prompt() {
        let mut h = Harness::logged_in(AppConfig::default());
        let engine = h.engine();
        let id = engine.incoming_call("Eva Heinman").expect("incoming");
        h.shell.dispatch();
        assert_eq!(h.ring.starts.load(Ordering::SeqCst), 1);

        h.shell.execute(UiCommand::Decline(id)).expect("ringing call");
        assert!(h.shell.incoming().is_none());
        assert_eq!(h.ring.stops.load(Ordering::SeqCst), 1);
        assert!(engine.current_call().is_none());
        assert!(h.shell.call_screen().is_none());
        assert!(h
            .shell
            .contacts()
            .is_some_and(|c| c.view().call_action_enabled && c.state().tracked.is_none()));

        // Nothing left to decline
        assert!(matches!(
            h.shell.execute(UiCommand::Decline(id)),
            Err(SurfaceError::NotRinging(call)) if call == id
        ));
    }

    #[test]
    fn caller_hangs_up_before_pickup() {
        let mut h = Harness::logged_in(AppConfig::default());
        let engine = h.engine();
        let id = engine.incoming_call("Johan Liebert").expect("incoming");
        h.shell.dispatch();
        assert_eq!(h.shell.incoming().map(|p| p.call_id), Some(id));

        engine.set_call_status(id, CallStatus::Ended);
        h.shell.dispatch();
        assert!(h.shell.incoming().is_none());
        assert_eq!(h.ring.stops.load(Ordering::SeqCst), 1);

        assert!(matches!(
            h.shell.execute(UiCommand::PickUp(id)),
            Err(SurfaceError::NotRinging(call)) if call == id
        ));
        h.shell.dispatch();
        assert!(h.shell.call_screen().is_none());
        assert!(h
            .shell
            .contacts()
            .is_some_and(|c| c.view().call_action_enabled && c.state().call_window.is_none()));
    }

    #[test]
    fn contact_list_commands() {
        let mut h = Harness::logged_in(AppConfig::default());
        let engine = h.engine();

        h.shell.execute(UiCommand::ToggleCheckedMode).expect("contacts open");
        h.shell
            .execute(UiCommand::CallContact("fortner-n".to_string()))
            .expect("contacts open");
        assert_eq!(
            h.shell.contacts().and_then(|c| c.view().contact_check.clone()),
            Some("fortner-n".to_string())
        );
        assert!(engine.current_call().is_none());

        h.shell.execute(UiCommand::ToggleCheckedMode).expect("contacts open");
        h.shell
            .execute(UiCommand::CallContact("fortner-n".to_string()))
            .expect("call action enabled");
        let id = engine.current_call().map(|call| call.call_id());
        assert!(id.is_some());
        assert_eq!(h.shell.contacts().and_then(|c| c.view().calling_indicator), id);

        h.shell.execute(UiCommand::CancelOutgoingCall).expect("contacts open");
        assert!(engine.current_call().is_none());
        assert_eq!(h.shell.contacts().and_then(|c| c.view().calling_indicator), None);

        // No call in progress, back closes the list
        h.shell.execute(UiCommand::Back).expect("back");
        assert!(h.shell.contacts().is_none());
    }

    #[test]
    fn network_lost_then_recovered() {
        let mut h = Harness::logged_in(AppConfig::default());
        let engine = h.engine();

        engine.set_can_create_call(Some(CanCreateCallError::new(
            CanCreateCallFault::NetworkLost,
            "network lost",
        )));
        h.shell.dispatch();
        assert!(h.shell.contacts().is_some_and(|c| !c.view().call_action_enabled));
        assert!(h.shell.presence().is_some());

        engine.set_can_create_call(None);
        h.shell.dispatch();
        assert!(h.shell.contacts().is_some_and(|c| c.view().call_action_enabled));
    }

    #[test]
    fn disconnect_unwinds_to_nothing() {
        let mut h = Harness::logged_in(AppConfig::default());
        h.shell.execute(UiCommand::Disconnect).expect("disconnect");
        assert!(!h.shell.session().is_ready());
        assert!(h.shell.contacts().is_none());
        assert!(h.shell.presence().is_none());
        assert_eq!(h.shell.session().bus().listener_count(), 0);
    }

    #[test]
    fn events_for_other_calls_are_filtered() {
        let mut h = Harness::logged_in(AppConfig::default());
        let engine = h.engine();
        let id = engine.incoming_call("Eva Heinman").expect("incoming");
        h.shell.dispatch();
        h.shell.pick_up(id).expect("known call");

        h.shell.session().bus().publish(SessionEvent::CallStatusChanged {
            call: snapshot(id.0 + 1),
            status: CallStatus::Ended,
        });
        h.shell.dispatch();
        assert!(h.shell.call_screen().is_some_and(|w| w.is_alive()));
        assert!(h.shell.contacts().is_some_and(|c| !c.view().call_action_enabled));
    }

    #[test]
    fn ended_twice_is_a_noop() {
        let mut h = Harness::logged_in(AppConfig::default());
        let engine = h.engine();
        let id = engine.incoming_call("Eva Heinman").expect("incoming");
        h.shell.dispatch();
        h.shell.pick_up(id).expect("known call");

        engine.set_call_status(id, CallStatus::Ended);
        h.shell.dispatch();
        let contacts_view = h.shell.contacts().map(|c| c.view().clone());
        let notification = h.shell.presence().and_then(|p| p.notification()).cloned();

        h.shell.session().bus().publish(SessionEvent::CallStatusChanged {
            call: snapshot(id.0),
            status: CallStatus::Ended,
        });
        h.shell.dispatch();
        assert_eq!(h.shell.contacts().map(|c| c.view().clone()), contacts_view);
        assert_eq!(
            h.shell.presence().and_then(|p| p.notification()).cloned(),
            notification
        );
        assert_eq!(h.ring.stops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn split_layout_embeds_call_window() {
        let mut config = AppConfig::default();
        config.layout.split = true;
        let mut h = Harness::logged_in(config);
        let engine = h.engine();
        let id = engine.incoming_call("Eva Heinman").expect("incoming");
        h.shell.dispatch();
        h.shell.pick_up(id).expect("known call");

        assert!(h.shell.call_screen().is_none());
        assert_eq!(
            h.shell.embedded_call_window().and_then(|w| w.call_id()),
            Some(id)
        );
        assert!(h.shell.embedded_call_window().is_some_and(|w| !w.is_tracking_orientation()));

        engine.set_call_status(id, CallStatus::Ended);
        h.shell.dispatch();
        assert!(h.shell.embedded_call_window().is_none());
    }

    #[tokio::test]
    async fn run_loop_processes_commands_until_shutdown() {
        let mut h = Harness::new(AppConfig::default());
        h.shell.launch();

        let (command_tx, commands) = mpsc::unbounded_channel();
        let (_sample_tx, samples) = mpsc::unbounded_channel();
        let shutdown = CancellationToken::new();

        command_tx
            .send(UiCommand::SubmitAppId("demo-app".to_string()))
            .expect("loop alive");
        command_tx
            .send(UiCommand::ChooseUser("k.tenma".to_string()))
            .expect("loop alive");

        let stopper = shutdown.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            stopper.cancel();
        });

        h.shell.run(samples, commands, shutdown).await;
        assert_eq!(
            h.shell.session().current_user().ok().as_deref(),
            Some("k.tenma")
        );
        // Shutdown released every surface
        assert!(h.shell.contacts().is_none());
        assert_eq!(h.shell.session().bus().listener_count(), 0);
    }
}
