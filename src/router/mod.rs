//! Call-lifecycle event router
//!
//! One pure reducer per surface. A reducer takes the surface's current state,
//! one [`SessionEvent`] and an [`EngineView`] captured just before dispatch,
//! and returns the next state together with the effects the surface host has
//! to apply, in order.
//!
//! ```text
//!                ┌──► call_window::reduce ──► ResizePreview / TearDownVideo / Leave
//! SessionEvent ──┼──► contacts::reduce    ──► call action / indicator / call window
//!                ├──► presence::reduce    ──► notification / ring / incoming prompt
//!                └──► connect::reduce     ──► dialogs / chooser / contacts
//! ```
//!
//! Reducers never touch the engine. Re-delivering an event to a surface that is
//! already in the resulting state yields no effects.

pub mod call_window;
pub mod connect;
pub mod contacts;
pub mod presence;

use std::fmt;

use tracing::{debug, trace};

use crate::sdk::{CallEngine, CallId, CallSnapshot, SessionEvent};

/// Result of one reducer step
#[derive(Debug, Clone, PartialEq)]
pub struct Transition<S, E> {
    pub state: S,
    pub effects: Vec<E>,
}

impl<S, E> Transition<S, E> {
    pub fn new(state: S, effects: Vec<E>) -> Self {
        Self { state, effects }
    }

    /// Same state, nothing to do
    pub fn unchanged(state: S) -> Self {
        Self {
            state,
            effects: Vec::new(),
        }
    }

    pub fn is_noop(&self) -> bool {
        self.effects.is_empty()
    }
}

/// The parts of the engine a reducer may read
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineView {
    pub current_call: Option<CallSnapshot>,
    pub display_name: String,
    pub can_create_call: bool,
}

impl EngineView {
    pub fn capture(engine: &dyn CallEngine) -> Self {
        Self {
            current_call: engine.current_call().map(|call| call.snapshot()),
            display_name: engine.display_name(),
            can_create_call: engine.can_create_call(),
        }
    }

    /// View used when no engine is attached
    pub fn offline() -> Self {
        Self::default()
    }

    pub fn current_call_id(&self) -> Option<CallId> {
        self.current_call.as_ref().map(|call| call.id)
    }
}

/// Whether `call` is the call the surface displays
pub fn concerns_tracked_call(call: CallId, tracked: Option<CallId>) -> bool {
    tracked == Some(call)
}

/// Shared filter: connection-wide events always pass, call-scoped events only
/// for the tracked call
pub fn admits(event: &SessionEvent, tracked: Option<CallId>) -> bool {
    match event.call_id() {
        Some(call) => concerns_tracked_call(call, tracked),
        None => true,
    }
}

pub trait SurfaceReducer {
    type State: Clone + fmt::Debug + PartialEq;
    type Effect: Clone + fmt::Debug + PartialEq;

    /// Name used in logs
    const SURFACE: &'static str;

    fn reduce(
        state: &Self::State,
        event: &SessionEvent,
        view: &EngineView,
    ) -> Transition<Self::State, Self::Effect>;
}

/// Runs one reducer step with logging
pub fn step<R: SurfaceReducer>(
    state: &R::State,
    event: &SessionEvent,
    view: &EngineView,
) -> Transition<R::State, R::Effect> {
    let transition = R::reduce(state, event, view);
    if transition.is_noop() {
        trace!("{}: {} produced no effects", R::SURFACE, event.name());
    } else {
        debug!(
            "{}: {} -> {:?}",
            R::SURFACE,
            event.name(),
            transition.effects
        );
    }
    transition
}

#[cfg(test)]
pub(crate) mod fixtures {
    use crate::sdk::{CallId, CallSnapshot, CallStatus, SessionEvent};

    pub fn snapshot(id: i32, status: CallStatus) -> CallSnapshot {
        CallSnapshot {
            id: CallId(id),
            status,
            contact_display_name: "Nina Fortner".to_string(),
            receiving_video: false,
        }
    }

    pub fn created(id: i32) -> SessionEvent {
        SessionEvent::CallCreated(snapshot(id, CallStatus::Created))
    }

    pub fn status(id: i32, status: CallStatus) -> SessionEvent {
        SessionEvent::CallStatusChanged {
            call: snapshot(id, status),
            status,
        }
    }

    pub fn receiving(id: i32, receiving: bool) -> SessionEvent {
        SessionEvent::ReceivingVideoChanged {
            call: snapshot(id, CallStatus::Active),
            receiving,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use crate::sdk::CallStatus;

    #[test]
    fn filter_drops_other_calls() {
        let event = status(8, CallStatus::Ended);
        assert!(!admits(&event, Some(CallId(7))));
        assert!(!admits(&event, None));
        assert!(admits(&event, Some(CallId(8))));
    }

    #[test]
    fn connection_events_are_never_filtered() {
        let event = SessionEvent::CanCreateCallChanged(None);
        assert!(admits(&event, None));
        assert!(admits(&event, Some(CallId(7))));
    }
}
