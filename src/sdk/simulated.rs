//! In-memory calling engine
//!
//! Stands in for the real SDK in the demo binary and in tests. Every state
//! change is published on the [`EventBus`] exactly like the real engine would,
//! so surfaces cannot tell the difference.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tracing::{debug, info, warn};

use super::{
    AuthError, AuthFault, CallEngine, CallHandle, CallId, CallStatus, CanCreateCallError,
    CanCreateCallFault, ConnectError, ConnectFault, EngineConnector, EventBus, SessionEvent, UserType,
    VideoOutFrame, VideoSource, VideoSurfaceId,
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Observable state of a simulated call
#[derive(Debug, Clone, PartialEq)]
pub struct CallState {
    pub status: CallStatus,
    pub receiving_video: bool,
    pub audio_muted: bool,
    pub video_running: bool,
    pub source: VideoSource,
    pub video_in: Option<VideoSurfaceId>,
    pub video_out: Option<VideoOutFrame>,
}

pub struct SimulatedCall {
    id: CallId,
    contact: String,
    engine: Weak<SimulatedEngine>,
    state: Mutex<CallState>,
}

impl SimulatedCall {
    fn new(id: CallId, contact: &str, engine: Weak<SimulatedEngine>) -> Self {
        Self {
            id,
            contact: contact.to_string(),
            engine,
            state: Mutex::new(CallState {
                status: CallStatus::Created,
                receiving_video: false,
                audio_muted: false,
                video_running: true,
                source: VideoSource::Front,
                video_in: None,
                video_out: None,
            }),
        }
    }

    pub fn state(&self) -> CallState {
        lock(&self.state).clone()
    }
}

impl CallHandle for SimulatedCall {
    fn call_id(&self) -> CallId {
        self.id
    }

    fn status(&self) -> CallStatus {
        lock(&self.state).status
    }

    fn contact_display_name(&self) -> String {
        self.contact.clone()
    }

    fn is_receiving_video(&self) -> bool {
        lock(&self.state).receiving_video
    }

    fn accept(&self) {
        if self.status() != CallStatus::Ringing {
            warn!("Call {} is not ringing, nothing to accept", self.id);
            return;
        }
        if let Some(engine) = self.engine.upgrade() {
            engine.set_call_status(self.id, CallStatus::Active);
        }
    }

    fn hangup(&self) {
        if let Some(engine) = self.engine.upgrade() {
            engine.set_call_status(self.id, CallStatus::Ended);
        }
    }

    fn audio_mute(&self) {
        lock(&self.state).audio_muted = true;
    }

    fn audio_unmute(&self) {
        lock(&self.state).audio_muted = false;
    }

    fn video_start(&self) {
        lock(&self.state).video_running = true;
    }

    fn video_stop(&self) {
        lock(&self.state).video_running = false;
    }

    fn set_video_source(&self, source: VideoSource) {
        lock(&self.state).source = source;
    }

    fn set_video_in(&self, surface: Option<VideoSurfaceId>) {
        lock(&self.state).video_in = surface;
    }

    fn set_video_out(&self, frame: Option<VideoOutFrame>) {
        if let Some(frame) = &frame {
            debug!(
                "Call {} video out on {:?}, device orientation {}, correction {:?}",
                self.id, frame.surface, frame.use_device_orientation, frame.device_correction
            );
        }
        lock(&self.state).video_out = frame;
    }
}

struct EngineState {
    user: Option<String>,
    authenticated: bool,
    display_name: String,
    can_create_call: bool,
    in_background: bool,
    closed: bool,
    calls: BTreeMap<CallId, Arc<SimulatedCall>>,
    current: Option<CallId>,
    next_call_id: i32,
}

pub struct SimulatedEngine {
    me: Weak<SimulatedEngine>,
    app_id: String,
    bus: EventBus,
    state: Mutex<EngineState>,
}

impl SimulatedEngine {
    pub fn new(app_id: &str, bus: EventBus) -> Arc<Self> {
        info!("Creating simulated engine for application {}", app_id);
        Arc::new_cyclic(|me| Self {
            me: me.clone(),
            app_id: app_id.to_string(),
            bus,
            state: Mutex::new(EngineState {
                user: None,
                authenticated: false,
                display_name: String::new(),
                can_create_call: false,
                in_background: false,
                closed: false,
                calls: BTreeMap::new(),
                current: None,
                next_call_id: 1,
            }),
        })
    }

    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn user(&self) -> Option<String> {
        lock(&self.state).user.clone()
    }

    pub fn is_closed(&self) -> bool {
        lock(&self.state).closed
    }

    pub fn call(&self, id: CallId) -> Option<Arc<SimulatedCall>> {
        lock(&self.state).calls.get(&id).cloned()
    }

    /// Finishes the asynchronous connection started by the connector
    pub fn complete_connection(&self, error: Option<ConnectError>) {
        self.bus.publish(SessionEvent::ConnectionEstablished(error));
    }

    /// Moves the next call identifier, so scenarios can pick stable ids
    #[cfg(test)]
    pub fn reserve_call_ids(&self, next: i32) {
        lock(&self.state).next_call_id = next;
    }

    fn register_call(&self, contact: &str) -> Arc<SimulatedCall> {
        let mut state = lock(&self.state);
        let id = CallId(state.next_call_id);
        state.next_call_id += 1;
        let call = Arc::new(SimulatedCall::new(id, contact, self.me.clone()));
        state.calls.insert(id, call.clone());
        state.current = Some(id);
        call
    }

    /// Remote party calls us; emits `CallCreated` then `RINGING`
    pub fn incoming_call(&self, contact: &str) -> Option<CallId> {
        if lock(&self.state).current.is_some() {
            warn!("Rejecting incoming call from {}: a call is in progress", contact);
            return None;
        }
        let call = self.register_call(contact);
        info!("Incoming call {} from {}", call.call_id(), contact);
        self.bus.publish(SessionEvent::CallCreated(call.snapshot()));
        self.set_call_status(call.call_id(), CallStatus::Ringing);
        Some(call.call_id())
    }

    pub fn set_call_status(&self, id: CallId, status: CallStatus) {
        let call = {
            let mut state = lock(&self.state);
            let Some(call) = state.calls.get(&id).cloned() else {
                warn!("Status change for unknown call {}", id);
                return;
            };
            if status == CallStatus::Ended && state.current == Some(id) {
                state.current = None;
            }
            call
        };

        lock(&call.state).status = status;
        debug!("Call {} is now {}", id, status);
        self.bus.publish(SessionEvent::CallStatusChanged {
            call: call.snapshot(),
            status,
        });
    }

    pub fn set_receiving_video(&self, id: CallId, receiving: bool) {
        let Some(call) = self.call(id) else {
            warn!("Video change for unknown call {}", id);
            return;
        };
        lock(&call.state).receiving_video = receiving;
        self.bus.publish(SessionEvent::ReceivingVideoChanged {
            call: call.snapshot(),
            receiving,
        });
    }

    pub fn set_can_create_call(&self, error: Option<CanCreateCallError>) {
        lock(&self.state).can_create_call = error.is_none();
        self.bus.publish(SessionEvent::CanCreateCallChanged(error));
    }
}

impl CallEngine for SimulatedEngine {
    fn get_call(&self, id: CallId) -> Option<Arc<dyn CallHandle>> {
        self.call(id).map(|call| call as Arc<dyn CallHandle>)
    }

    fn current_call(&self) -> Option<Arc<dyn CallHandle>> {
        let state = lock(&self.state);
        state
            .current
            .and_then(|id| state.calls.get(&id).cloned())
            .map(|call| call as Arc<dyn CallHandle>)
    }

    fn is_authenticated(&self) -> bool {
        lock(&self.state).authenticated
    }

    fn can_create_call(&self) -> bool {
        let state = lock(&self.state);
        state.can_create_call && !state.closed
    }

    fn create_call(&self, contact_id: &str) {
        {
            let state = lock(&self.state);
            if !state.can_create_call || state.current.is_some() {
                warn!("Cannot create a call to {} right now", contact_id);
                return;
            }
        }
        let call = self.register_call(contact_id);
        info!("Outgoing call {} to {}", call.call_id(), contact_id);
        self.bus.publish(SessionEvent::CallCreated(call.snapshot()));
        self.set_call_status(call.call_id(), CallStatus::Proceeding);
    }

    fn authenticate(&self, user_id: &str, user_type: UserType) {
        debug!("Authenticating {} as {:?}", user_id, user_type);
        if user_id.is_empty() || user_id.contains(char::is_whitespace) {
            self.bus.publish(SessionEvent::Authenticated(Some(AuthError::new(
                AuthFault::Other,
                format!("Invalid user id: {:?}", user_id),
            ))));
            return;
        }

        {
            let mut state = lock(&self.state);
            state.user = Some(user_id.to_string());
            state.authenticated = true;
            state.can_create_call = true;
        }
        self.bus.publish(SessionEvent::Authenticated(None));
        self.bus.publish(SessionEvent::CanCreateCallChanged(None));
    }

    fn display_name(&self) -> String {
        lock(&self.state).display_name.clone()
    }

    fn set_display_name(&self, display_name: &str) {
        lock(&self.state).display_name = display_name.to_string();
    }

    fn go_to_foreground(&self) {
        lock(&self.state).in_background = false;
    }

    fn go_to_background(&self) {
        lock(&self.state).in_background = true;
    }

    fn is_in_background(&self) -> bool {
        lock(&self.state).in_background
    }

    fn disconnect(&self) {
        {
            let mut state = lock(&self.state);
            if state.closed {
                return;
            }
            state.closed = true;
            state.authenticated = false;
            state.can_create_call = false;
        }
        info!("Simulated engine {} closed", self.app_id);
        self.bus
            .publish(SessionEvent::CanCreateCallChanged(Some(CanCreateCallError::new(
                CanCreateCallFault::Closed,
                "The engine was closed",
            ))));
    }
}

/// Connector producing [`SimulatedEngine`]s
#[derive(Default)]
pub struct SimulatedConnector {
    next_error: Mutex<Option<ConnectError>>,
    last: Mutex<Option<Arc<SimulatedEngine>>>,
}

impl SimulatedConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next connection attempt fail with `error`
    pub fn fail_next_connection(&self, error: ConnectError) {
        *lock(&self.next_error) = Some(error);
    }

    /// The most recently initialized engine
    pub fn engine(&self) -> Option<Arc<SimulatedEngine>> {
        lock(&self.last).clone()
    }
}

impl EngineConnector for SimulatedConnector {
    fn initialize(&self, app_id: &str, bus: EventBus) -> Arc<dyn CallEngine> {
        let engine = SimulatedEngine::new(app_id, bus);
        *lock(&self.last) = Some(engine.clone());
        let error = lock(&self.next_error).take().or_else(|| {
            (!app_id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')).then(
                || {
                    ConnectError::new(
                        ConnectFault::Initialization,
                        format!("Unknown application id {:?}", app_id),
                    )
                },
            )
        });
        engine.complete_connection(error);
        engine
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sdk::Fault;

    #[test]
    fn outgoing_call_emits_created_then_proceeding() {
        let bus = EventBus::new();
        let (_subscription, mut inbox) = bus.subscribe("test");
        let engine = SimulatedEngine::new("app", bus.clone());
        engine.authenticate("k.tenma", UserType::Internal);
        engine.create_call("fortner-n");

        let events: Vec<_> = std::iter::from_fn(|| inbox.try_recv().ok())
            .map(|envelope| envelope.event.name())
            .collect();
        assert_eq!(
            events,
            vec![
                "Authenticated",
                "CanCreateCallChanged",
                "CallCreated",
                "CallStatusChanged"
            ]
        );
        assert!(engine.current_call().is_some());
    }

    #[test]
    fn hangup_clears_current_call() {
        let engine = SimulatedEngine::new("app", EventBus::new());
        engine.authenticate("k.tenma", UserType::Internal);
        let id = engine.incoming_call("Nina Fortner").expect("call created");

        engine.get_call(id).expect("known call").hangup();
        assert!(engine.current_call().is_none());
        assert_eq!(engine.call(id).map(|c| c.status()), Some(CallStatus::Ended));
    }

    #[test]
    fn whitespace_user_fails_authentication() {
        let bus = EventBus::new();
        let (_subscription, mut inbox) = bus.subscribe("test");
        let engine = SimulatedEngine::new("app", bus.clone());
        engine.authenticate("l j", UserType::Internal);

        let envelope = inbox.try_recv().expect("event");
        assert!(matches!(
            envelope.event,
            SessionEvent::Authenticated(Some(Fault {
                kind: AuthFault::Other,
                ..
            }))
        ));
        assert!(!engine.is_authenticated());
    }
}
