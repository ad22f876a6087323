//! Contact-list screen host

use tracing::{debug, error, info, warn};

use super::{engine_view, Navigation, Navigator, Surface, SurfaceError, SurfaceLink};
use crate::router::contacts::{
    open_call_window, CallWindowPlacement, ContactsEffect, ContactsReducer, ContactsState,
};
use crate::router::{step, Transition};
use crate::sdk::{CallHandle, CallId, SessionEvent};
use crate::session::SessionContext;

/// Label of the contact action button
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionLabel {
    Call,
    Check,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactsView {
    pub title: String,
    pub action_label: ActionLabel,
    pub call_action_enabled: bool,
    pub calling_indicator: Option<CallId>,
    /// Pre-filled value of the display name prompt, when shown
    pub display_name_prompt: Option<String>,
    /// Contact whose availability check is displayed
    pub contact_check: Option<String>,
    pub errors: Vec<String>,
}

pub struct ContactsScreen {
    link: SurfaceLink,
    session: SessionContext,
    navigator: Navigator,
    can_come_back: bool,
    state: ContactsState,
    view: ContactsView,
}

impl ContactsScreen {
    pub fn create(
        session: SessionContext,
        navigator: Navigator,
        placement: CallWindowPlacement,
        can_come_back: bool,
        pickup: Option<CallId>,
    ) -> Self {
        let mut screen = Self {
            link: SurfaceLink::finished("contacts"),
            state: ContactsState::new(placement, &engine_view(&session)),
            session,
            navigator,
            can_come_back,
            view: ContactsView {
                title: String::new(),
                action_label: ActionLabel::Call,
                call_action_enabled: false,
                calling_indicator: None,
                display_name_prompt: None,
                contact_check: None,
                errors: Vec::new(),
            },
        };

        let engine = match screen.session.engine() {
            Ok(engine) => engine,
            Err(e) => {
                error!("Contacts opened while {}", e);
                screen.navigator.navigate(Navigation::StopPresenceService);
                return screen;
            }
        };
        let user = match screen.session.current_user() {
            Ok(user) => user,
            Err(e) => {
                error!("Contacts opened while {}", e);
                return screen;
            }
        };

        screen.link = SurfaceLink::attach("contacts", screen.session.bus());
        info!("Contacts opened for {}", user);

        let display_name = engine.display_name();
        if display_name.is_empty() {
            let default_name = screen
                .session
                .accounts()
                .display_name(&user)
                .unwrap_or_default()
                .to_string();
            screen.view.display_name_prompt = Some(default_name);
        }
        screen.update_title();

        match engine.current_call() {
            Some(call) => screen.open_call_window(call.call_id()),
            None => match pickup {
                Some(call_id) => screen.open_call_window(call_id),
                None => screen.navigator.navigate(Navigation::StartPresenceService),
            },
        }
        screen
    }

    pub fn view(&self) -> &ContactsView {
        &self.view
    }

    pub fn state(&self) -> &ContactsState {
        &self.state
    }

    /// Re-entry, e.g. from the notification or the incoming prompt
    pub fn new_request(&mut self, pickup: Option<CallId>) {
        let engine = match self.session.engine() {
            Ok(engine) => engine,
            Err(e) => {
                warn!("Contacts re-entered while {}", e);
                self.link.finish();
                return;
            }
        };
        if let Some(call) = engine.current_call() {
            self.open_call_window(call.call_id());
        }
        if let Some(call_id) = pickup {
            self.open_call_window(call_id);
        }
    }

    /// Screen became visible
    pub fn start(&mut self) {
        if !self.link.is_alive() {
            return;
        }
        let Ok(engine) = self.session.engine() else {
            return;
        };
        match engine.current_call() {
            Some(call) => self.state.tracked = Some(call.call_id()),
            None => {
                let enabled = engine.can_create_call();
                self.state.call_action_enabled = enabled;
                self.view.call_action_enabled = enabled;
            }
        }
        if engine.is_in_background() {
            engine.go_to_foreground();
        }
    }

    /// Screen went to the background
    pub fn stop(&mut self) {
        if let Ok(engine) = self.session.engine() {
            if engine.current_call().is_none() {
                debug!("No call in progress, engine goes to background");
                engine.go_to_background();
            }
        }
    }

    pub fn choose(&mut self, contact_id: &str) -> Result<(), SurfaceError> {
        self.link.ensure_alive()?;
        if self.view.action_label == ActionLabel::Check {
            self.view.contact_check = Some(contact_id.to_string());
            return Ok(());
        }
        if !self.view.call_action_enabled {
            return Err(SurfaceError::CallActionDisabled);
        }
        info!("Calling {}", contact_id);
        self.session.engine()?.create_call(contact_id);
        Ok(())
    }

    pub fn toggle_checked_mode(&mut self) {
        self.view.action_label = match self.view.action_label {
            ActionLabel::Call => ActionLabel::Check,
            ActionLabel::Check => ActionLabel::Call,
        };
    }

    /// Hangs up the call shown by the "calling…" indicator
    pub fn cancel_outgoing_call(&mut self) -> Result<(), SurfaceError> {
        self.link.ensure_alive()?;
        if let Some(call_id) = self.view.calling_indicator {
            self.session.call(call_id)?.hangup();
        }
        Ok(())
    }

    pub fn set_display_name(&mut self, display_name: &str) -> Result<(), SurfaceError> {
        self.link.ensure_alive()?;
        self.session.engine()?.set_display_name(display_name);
        self.view.display_name_prompt = None;
        self.navigator.navigate(Navigation::RefreshPresence);
        self.update_title();
        Ok(())
    }

    /// User-requested disconnect; the engine reports `CLOSED` and the screen leaves
    pub fn disconnect(&mut self) {
        match self.session.engine() {
            Ok(engine) => engine.disconnect(),
            Err(e) => warn!("Nothing to disconnect: {}", e),
        }
    }

    /// Back navigation, allowed only while no call is in progress
    pub fn back(&mut self) -> bool {
        let in_call = self
            .session
            .engine()
            .map(|engine| engine.current_call().is_some())
            .unwrap_or(false);
        if in_call {
            debug!("Back ignored while a call is in progress");
            return false;
        }
        self.link.finish();
        true
    }

    fn update_title(&mut self) {
        let display_name = self
            .session
            .engine()
            .map(|engine| engine.display_name())
            .unwrap_or_default();
        self.view.title = if display_name.is_empty() {
            let user = self.session.current_user().unwrap_or_default();
            format!("{{{}}}", user)
        } else {
            display_name
        };
    }

    fn open_call_window(&mut self, call_id: CallId) {
        let status = match self.session.call(call_id) {
            Ok(call) => call.status(),
            Err(e) => {
                warn!("No call window: {}", e);
                return;
            }
        };
        let transition = open_call_window(&self.state, call_id, status);
        self.apply(transition);
    }

    fn apply(&mut self, transition: Transition<ContactsState, ContactsEffect>) {
        self.state = transition.state;
        for effect in transition.effects {
            if !self.link.is_alive() {
                debug!("Contacts gone, dropping {:?}", effect);
                break;
            }
            match effect {
                ContactsEffect::EnableCallAction => self.view.call_action_enabled = true,
                ContactsEffect::DisableCallAction => self.view.call_action_enabled = false,
                ContactsEffect::ShowCallingIndicator(call_id) => {
                    self.view.calling_indicator = Some(call_id)
                }
                ContactsEffect::DismissCallingIndicator => self.view.calling_indicator = None,
                ContactsEffect::OpenCallScreen(call_id) => {
                    self.navigator.navigate(Navigation::OpenCallScreen {
                        call_id,
                        can_come_back: self.can_come_back,
                    })
                }
                ContactsEffect::EmbedCallWindow {
                    call_id,
                    correction,
                } => self.navigator.navigate(Navigation::EmbedCallWindow {
                    call_id,
                    correction,
                }),
                ContactsEffect::RemoveEmbeddedCallWindow => {
                    self.navigator.navigate(Navigation::RemoveEmbeddedCallWindow)
                }
                ContactsEffect::ShowError(description) => {
                    error!("Contacts: {}", description);
                    self.view.errors.push(description);
                }
                ContactsEffect::StopPresenceService => {
                    self.navigator.navigate(Navigation::StopPresenceService)
                }
                ContactsEffect::ReleaseEngine => self.session.disconnect(),
                ContactsEffect::Leave => self.link.finish(),
            }
        }
    }

    fn handle(&mut self, event: &SessionEvent) {
        let view = engine_view(&self.session);
        let transition = step::<ContactsReducer>(&self.state, event, &view);
        self.apply(transition);
    }
}

impl Surface for ContactsScreen {
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

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio::sync::mpsc;

    use crate::sdk::simulated::SimulatedEngine;
    use crate::sdk::{CallEngine, CallStatus, CanCreateCallError, CanCreateCallFault, EventBus, UserType};
    use crate::session::{DemoAccounts, SessionError};

    fn logged_in() -> (SessionContext, Arc<SimulatedEngine>) {
        let bus = EventBus::new();
        let session = SessionContext::new(bus.clone(), DemoAccounts::default());
        let engine = SimulatedEngine::new("app", bus);
        engine.authenticate("k.tenma", UserType::Internal);
        session.attach_engine(engine.clone());
        session.set_current_user("k.tenma");
        (session, engine)
    }

    fn drain(receiver: &mut mpsc::UnboundedReceiver<Navigation>) -> Vec<Navigation> {
        std::iter::from_fn(|| receiver.try_recv().ok()).collect()
    }

    #[test]
    fn engine_absent_stops_service_and_exits() {
        let session = SessionContext::new(EventBus::new(), DemoAccounts::default());
        let (navigator, mut navigation) = Navigator::channel();
        let screen = ContactsScreen::create(session, navigator, CallWindowPlacement::Fullscreen, false, None);
        assert!(!screen.is_alive());
        assert_eq!(drain(&mut navigation), vec![Navigation::StopPresenceService]);
    }

    #[test]
    fn missing_user_exits() {
        let (session, _engine) = logged_in();
        let session = {
            let fresh = SessionContext::new(session.bus().clone(), DemoAccounts::default());
            fresh.attach_engine(session.engine().expect("engine"));
            fresh
        };
        let (navigator, _navigation) = Navigator::channel();
        let screen = ContactsScreen::create(session, navigator, CallWindowPlacement::Fullscreen, false, None);
        assert!(!screen.is_alive());
    }

    #[test]
    fn create_prompts_for_name_and_starts_service() {
        let (session, _engine) = logged_in();
        let (navigator, mut navigation) = Navigator::channel();
        let mut screen = ContactsScreen::create(session, navigator, CallWindowPlacement::Fullscreen, false, None);
        screen.start();

        assert_eq!(screen.view().display_name_prompt.as_deref(), Some("Kenzo Tenma"));
        assert_eq!(screen.view().title, "{k.tenma}");
        assert!(screen.view().call_action_enabled);
        assert_eq!(drain(&mut navigation), vec![Navigation::StartPresenceService]);

        screen.set_display_name("Kenzo Tenma").expect("alive");
        assert_eq!(screen.view().title, "Kenzo Tenma");
        assert_eq!(drain(&mut navigation), vec![Navigation::RefreshPresence]);
    }

    #[test]
    fn outgoing_call_opens_call_screen() {
        let (session, engine) = logged_in();
        let (navigator, mut navigation) = Navigator::channel();
        let mut screen = ContactsScreen::create(session, navigator, CallWindowPlacement::Fullscreen, true, None);
        screen.start();
        screen.process_pending();
        drain(&mut navigation);

        screen.choose("fortner-n").expect("call placed");
        screen.process_pending();
        let call_id = engine.current_call().map(|call| call.call_id()).expect("call");
        assert_eq!(screen.view().calling_indicator, Some(call_id));
        assert!(!screen.back());

        engine.set_call_status(call_id, CallStatus::Active);
        screen.process_pending();
        assert_eq!(screen.view().calling_indicator, None);
        assert!(!screen.view().call_action_enabled);
        assert_eq!(
            drain(&mut navigation),
            vec![Navigation::OpenCallScreen {
                call_id,
                can_come_back: true
            }]
        );

        engine.set_call_status(call_id, CallStatus::Ended);
        screen.process_pending();
        assert!(screen.view().call_action_enabled);
    }

    #[test]
    fn calling_indicator_cancels_the_call() {
        let (session, engine) = logged_in();
        let (navigator, _navigation) = Navigator::channel();
        let mut screen = ContactsScreen::create(session, navigator, CallWindowPlacement::Fullscreen, false, None);
        screen.start();
        screen.choose("fortner-n").expect("call placed");
        screen.process_pending();

        screen.cancel_outgoing_call().expect("alive");
        screen.process_pending();
        assert!(engine.current_call().is_none());
        assert_eq!(screen.view().calling_indicator, None);
        assert!(screen.view().call_action_enabled);
    }

    #[test]
    fn checked_mode_checks_instead_of_calling() {
        let (session, engine) = logged_in();
        let (navigator, _navigation) = Navigator::channel();
        let mut screen = ContactsScreen::create(session, navigator, CallWindowPlacement::Fullscreen, false, None);
        screen.start();
        screen.toggle_checked_mode();
        screen.choose("runge_h@bka.de").expect("alive");
        assert_eq!(screen.view().contact_check.as_deref(), Some("runge_h@bka.de"));
        assert!(engine.current_call().is_none());
    }

    #[test]
    fn closed_engine_is_fatal() {
        let (session, _engine) = logged_in();
        let (navigator, mut navigation) = Navigator::channel();
        let mut screen =
            ContactsScreen::create(session.clone(), navigator, CallWindowPlacement::Fullscreen, false, None);
        drain(&mut navigation);

        screen.disconnect();
        screen.process_pending();
        assert!(!screen.is_alive());
        assert_eq!(screen.view().errors.len(), 1);
        assert_eq!(drain(&mut navigation), vec![Navigation::StopPresenceService]);
        assert!(matches!(screen.choose("fortner-n"), Err(SurfaceError::Finished(_))));
        assert!(!session.is_ready());
        assert!(matches!(session.current_user(), Err(SessionError::NoUser)));
    }

    #[test]
    fn pickup_of_ended_call_opens_nothing() {
        let (session, engine) = logged_in();
        let call_id = engine.incoming_call("Eva Heinman").expect("incoming");
        engine.set_call_status(call_id, CallStatus::Ended);

        let (navigator, mut navigation) = Navigator::channel();
        let mut screen = ContactsScreen::create(
            session,
            navigator,
            CallWindowPlacement::Fullscreen,
            false,
            Some(call_id),
        );
        screen.start();
        assert!(drain(&mut navigation).is_empty());
        assert_eq!(screen.state().call_window, None);
        assert!(screen.view().call_action_enabled);
    }

    #[test]
    fn network_loss_disables_until_recovered() {
        let (session, engine) = logged_in();
        let (navigator, _navigation) = Navigator::channel();
        let mut screen = ContactsScreen::create(session, navigator, CallWindowPlacement::Fullscreen, false, None);
        screen.start();
        screen.process_pending();

        engine.set_can_create_call(Some(CanCreateCallError::new(
            CanCreateCallFault::NetworkLost,
            "network lost",
        )));
        screen.process_pending();
        assert!(!screen.view().call_action_enabled);
        assert!(matches!(screen.choose("fortner-n"), Err(SurfaceError::CallActionDisabled)));

        engine.set_can_create_call(None);
        screen.process_pending();
        assert!(screen.view().call_action_enabled);
        assert!(screen.is_alive());
    }
}
