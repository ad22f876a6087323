//! Background presence service host
//!
//! Keeps the foreground notification up to date and plays the ring tone for
//! incoming calls. A ring asset that cannot be prepared only disables the
//! sound.

use std::path::Path;

use tracing::{debug, info, warn};

use super::{engine_view, Navigation, Navigator, Surface, SurfaceLink};
use crate::device::{LoopingRingPlayer, RingTone};
use crate::router::presence::{
    refresh, PresenceEffect, PresenceNotification, PresenceReducer, PresenceState,
};
use crate::router::{step, Transition};
use crate::sdk::SessionEvent;
use crate::session::SessionContext;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub title: String,
    pub text: String,
    pub in_call: bool,
}

/// Prepares the looping ring player, `None` when the asset is unusable
pub fn prepare_ring(asset: Option<&Path>) -> Option<Box<dyn RingTone>> {
    let Some(asset) = asset else {
        debug!("No ring asset configured");
        return None;
    };
    match LoopingRingPlayer::prepare(asset) {
        Ok(player) => Some(Box::new(player)),
        Err(e) => {
            warn!("Ringing disabled: {}", e);
            None
        }
    }
}

pub struct PresenceService {
    link: SurfaceLink,
    session: SessionContext,
    navigator: Navigator,
    app_name: String,
    ring: Option<Box<dyn RingTone>>,
    state: PresenceState,
    notification: Option<Notification>,
}

impl PresenceService {
    pub fn create(
        session: SessionContext,
        navigator: Navigator,
        app_name: impl Into<String>,
        ring: Option<Box<dyn RingTone>>,
    ) -> Self {
        let link = SurfaceLink::attach("presence", session.bus());
        let state = PresenceState::new(&engine_view(&session));
        info!("Presence service started");
        Self {
            link,
            session,
            navigator,
            app_name: app_name.into(),
            ring,
            state,
            notification: None,
        }
    }

    pub fn notification(&self) -> Option<&Notification> {
        self.notification.as_ref()
    }

    pub fn state(&self) -> &PresenceState {
        &self.state
    }

    /// Start command or display name change
    pub fn refresh(&mut self) {
        if !self.link.is_alive() || !self.session.is_ready() {
            return;
        }
        let view = engine_view(&self.session);
        let transition = refresh(&self.state, &view);
        self.apply(transition);
    }

    pub fn destroy(&mut self) {
        if self.link.is_alive() {
            info!("Presence service stopped");
        }
        if let Some(mut ring) = self.ring.take() {
            if ring.is_playing() {
                ring.stop();
            }
        }
        self.notification = None;
        self.link.finish();
    }

    fn apply(&mut self, transition: Transition<PresenceState, PresenceEffect>) {
        self.state = transition.state;
        for effect in transition.effects {
            if !self.link.is_alive() {
                debug!("Presence service gone, dropping {:?}", effect);
                break;
            }
            match effect {
                PresenceEffect::ShowNotification(PresenceNotification::Presence { display_name }) => {
                    self.notification = Some(Notification {
                        title: self.app_name.clone(),
                        text: display_name,
                        in_call: false,
                    });
                }
                PresenceEffect::ShowNotification(PresenceNotification::InCall { contact }) => {
                    self.notification = Some(Notification {
                        title: contact,
                        text: String::new(),
                        in_call: true,
                    });
                }
                PresenceEffect::StartRing => match self.ring.as_mut() {
                    Some(ring) => ring.start(),
                    None => debug!("No ring player, staying silent"),
                },
                PresenceEffect::StopRing => {
                    if let Some(ring) = self.ring.as_mut() {
                        if ring.is_playing() {
                            ring.stop();
                        }
                    }
                }
                PresenceEffect::LaunchIncomingPrompt {
                    call_id,
                    display_name,
                } => self.navigator.navigate(Navigation::ShowIncomingPrompt {
                    call_id,
                    display_name,
                }),
                PresenceEffect::DismissIncomingPrompt(call_id) => self
                    .navigator
                    .navigate(Navigation::DismissIncomingPrompt { call_id }),
            }
        }
    }

    fn handle(&mut self, event: &SessionEvent) {
        let view = engine_view(&self.session);
        let transition = step::<PresenceReducer>(&self.state, event, &view);
        self.apply(transition);
    }
}

impl Surface for PresenceService {
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

impl Drop for PresenceService {
    fn drop(&mut self) {
        self.destroy();
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use crate::sdk::simulated::SimulatedEngine;
    use crate::sdk::{CallEngine, CallId, CallStatus, EventBus, UserType};
    use crate::session::DemoAccounts;

    /// Ring tone counting starts and stops
    #[derive(Clone, Default)]
    pub(crate) struct CountingRing {
        pub starts: Arc<AtomicUsize>,
        pub stops: Arc<AtomicUsize>,
        playing: bool,
    }

    impl RingTone for CountingRing {
        fn start(&mut self) {
            self.starts.fetch_add(1, Ordering::SeqCst);
            self.playing = true;
        }

        fn stop(&mut self) {
            self.stops.fetch_add(1, Ordering::SeqCst);
            self.playing = false;
        }

        fn is_playing(&self) -> bool {
            self.playing
        }
    }

    fn start_service(
        ring: Option<Box<dyn RingTone>>,
    ) -> (
        PresenceService,
        Arc<SimulatedEngine>,
        tokio::sync::mpsc::UnboundedReceiver<Navigation>,
    ) {
        let bus = EventBus::new();
        let session = SessionContext::new(bus.clone(), DemoAccounts::default());
        let engine = SimulatedEngine::new("app", bus);
        engine.authenticate("k.tenma", UserType::Internal);
        engine.set_display_name("Kenzo Tenma");
        session.attach_engine(engine.clone());
        let (navigator, navigation) = Navigator::channel();
        let service = PresenceService::create(session, navigator, "Call Helper", ring);
        (service, engine, navigation)
    }

    #[test]
    fn refresh_shows_presence() {
        let (mut service, _engine, _navigation) = start_service(None);
        service.refresh();
        assert_eq!(
            service.notification(),
            Some(&Notification {
                title: "Call Helper".to_string(),
                text: "Kenzo Tenma".to_string(),
                in_call: false
            })
        );
    }

    #[test]
    fn incoming_call_rings_and_prompts_once() {
        let ring = CountingRing::default();
        let (mut service, engine, mut navigation) = start_service(Some(Box::new(ring.clone())));
        engine.reserve_call_ids(7);
        let id = engine.incoming_call("Nina Fortner").expect("call");
        assert_eq!(id, CallId(7));
        service.process_pending();

        assert_eq!(ring.starts.load(Ordering::SeqCst), 1);
        assert_eq!(
            navigation.try_recv().ok(),
            Some(Navigation::ShowIncomingPrompt {
                call_id: CallId(7),
                display_name: "Nina Fortner".to_string()
            })
        );
        assert_eq!(service.notification().map(|n| n.in_call), Some(true));

        engine.get_call(id).expect("call").accept();
        engine.set_call_status(id, CallStatus::Ended);
        service.process_pending();
        assert_eq!(ring.stops.load(Ordering::SeqCst), 1);
        assert_eq!(
            navigation.try_recv().ok(),
            Some(Navigation::DismissIncomingPrompt { call_id: CallId(7) })
        );
        assert!(navigation.try_recv().is_err());
        assert_eq!(service.notification().map(|n| n.in_call), Some(false));
    }

    #[test]
    fn missing_ring_asset_is_swallowed() {
        assert!(prepare_ring(Some(Path::new("/nonexistent/ring.ogg"))).is_none());
        assert!(prepare_ring(None).is_none());

        let (mut service, engine, _navigation) = start_service(None);
        engine.incoming_call("Nina Fortner").expect("call");
        service.process_pending();
        assert!(service.is_alive());
        assert!(service.state().ringing);
    }

    #[test]
    fn destroy_unsubscribes() {
        let (mut service, engine, _navigation) = start_service(None);
        service.destroy();
        assert_eq!(engine.bus().listener_count(), 0);
        assert!(!service.is_alive());
    }
}
