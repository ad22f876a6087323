//! Surface hosts
//!
//! A host owns one surface's reducer state, its bus subscription and the view
//! model the user sees. Events are drained from the subscription inbox on the UI
//! loop, reduced, and the resulting effects applied in order. Before each
//! effect the host checks that the surface is still alive; once it finished,
//! remaining updates are dropped.
//!
//! Surfaces never talk to each other. Anything that crosses a surface boundary
//! (opening a screen, embedding the call window, driving the presence service)
//! is sent to the application shell as a [`Navigation`].

pub mod call_window;
pub mod connect;
pub mod contacts;
pub mod presence;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::orientation::DeviceCorrection;
use crate::router::EngineView;
use crate::sdk::{CallId, EventBus, EventEnvelope, SessionEvent, Subscription};
use crate::session::{SessionContext, SessionError};

pub use call_window::CallWindow;
pub use connect::ConnectScreen;
pub use contacts::ContactsScreen;
pub use presence::PresenceService;

#[derive(Debug, thiserror::Error)]
pub enum SurfaceError {
    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("Invalid application id: {0:?}")]
    InvalidAppId(String),

    #[error("The call action is disabled")]
    CallActionDisabled,

    #[error("Surface {0} has finished")]
    Finished(&'static str),

    #[error("Call {0} is not ringing")]
    NotRinging(CallId),

    #[error("Call {0} has ended")]
    CallEnded(CallId),
}

/// Requests crossing surface boundaries, handled by the application shell
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Navigation {
    OpenContacts { pickup: Option<CallId> },
    OpenCallScreen { call_id: CallId, can_come_back: bool },
    EmbedCallWindow { call_id: CallId, correction: DeviceCorrection },
    RemoveEmbeddedCallWindow,
    ShowIncomingPrompt { call_id: CallId, display_name: String },
    DismissIncomingPrompt { call_id: CallId },
    StartPresenceService,
    RefreshPresence,
    StopPresenceService,
}

#[derive(Clone)]
pub struct Navigator {
    sender: mpsc::UnboundedSender<Navigation>,
}

impl Navigator {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Navigation>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }

    pub fn navigate(&self, navigation: Navigation) {
        debug!("Navigation requested: {:?}", navigation);
        if self.sender.send(navigation).is_err() {
            warn!("Navigation dropped, the shell is gone");
        }
    }
}

/// Liveness token plus bus subscription of one surface
pub struct SurfaceLink {
    name: &'static str,
    alive: CancellationToken,
    subscription: Option<Subscription>,
    inbox: Option<mpsc::UnboundedReceiver<EventEnvelope>>,
}

impl SurfaceLink {
    pub fn attach(name: &'static str, bus: &EventBus) -> Self {
        let (subscription, inbox) = bus.subscribe(name);
        Self {
            name,
            alive: CancellationToken::new(),
            subscription: Some(subscription),
            inbox: Some(inbox),
        }
    }

    /// Link of a surface that exited during creation
    pub fn finished(name: &'static str) -> Self {
        let alive = CancellationToken::new();
        alive.cancel();
        Self {
            name,
            alive,
            subscription: None,
            inbox: None,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_alive(&self) -> bool {
        !self.alive.is_cancelled()
    }

    pub fn ensure_alive(&self) -> Result<(), SurfaceError> {
        if self.is_alive() {
            Ok(())
        } else {
            Err(SurfaceError::Finished(self.name))
        }
    }

    /// Drains everything delivered so far
    pub fn pending(&mut self) -> Vec<SessionEvent> {
        let Some(inbox) = self.inbox.as_mut() else {
            return Vec::new();
        };
        let mut events = Vec::new();
        while let Ok(envelope) = inbox.try_recv() {
            if let Some(subscription) = &self.subscription {
                trace!(
                    "{} {:?} <- {} #{} at {}",
                    subscription.name(),
                    subscription.id(),
                    envelope.event.name(),
                    envelope.sequence,
                    envelope.published_at.format("%H:%M:%S%.3f")
                );
            }
            events.push(envelope.event);
        }
        events
    }

    /// Marks the surface finished and unsubscribes
    pub fn finish(&mut self) {
        if self.is_alive() {
            debug!("Surface {} finished", self.name);
        }
        self.alive.cancel();
        self.subscription = None;
        self.inbox = None;
    }
}

impl Drop for SurfaceLink {
    fn drop(&mut self) {
        self.finish();
    }
}

/// Common interface the shell uses to pump surfaces
pub trait Surface {
    fn name(&self) -> &'static str;

    fn is_alive(&self) -> bool;

    /// Reduces every pending event; returns how many were taken from the inbox
    fn process_pending(&mut self) -> usize;
}

/// Engine view for the next reducer step, offline when no engine is attached
pub fn engine_view(session: &SessionContext) -> EngineView {
    session
        .engine()
        .map(|engine| EngineView::capture(engine.as_ref()))
        .unwrap_or_else(|_| EngineView::offline())
}
