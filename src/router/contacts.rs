//! Reducer of the contact-list screen
//!
//! The screen adopts the call it follows from `CallCreated` (or from the engine
//! snapshot when it is created or resumed) and forgets it on `ENDED`.

use super::{admits, EngineView, SurfaceReducer, Transition};
use crate::orientation::DeviceCorrection;
use crate::sdk::{CallId, CallStatus, CanCreateCallFault, SessionEvent};

/// Where the call window goes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallWindowPlacement {
    /// Separate orientation-locked screen
    Fullscreen,
    /// Pane next to the contact list
    Split { big_tablet: bool },
}

impl CallWindowPlacement {
    pub fn from_layout(split: bool, big_tablet: bool) -> Self {
        if split {
            CallWindowPlacement::Split { big_tablet }
        } else {
            CallWindowPlacement::Fullscreen
        }
    }

    /// Correction argument handed to an embedded window: -1 on big tablets
    pub fn embedded_correction(self) -> DeviceCorrection {
        let argument = match self {
            CallWindowPlacement::Split { big_tablet: false } => 90,
            _ => -1,
        };
        DeviceCorrection::from_arg(argument)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactsState {
    pub placement: CallWindowPlacement,
    pub tracked: Option<CallId>,
    pub call_action_enabled: bool,
    pub calling_indicator: Option<CallId>,
    pub call_window: Option<CallId>,
    pub leaving: bool,
}

impl ContactsState {
    pub fn new(placement: CallWindowPlacement, view: &EngineView) -> Self {
        Self {
            placement,
            tracked: view.current_call_id(),
            call_action_enabled: false,
            calling_indicator: None,
            call_window: None,
            leaving: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContactsEffect {
    EnableCallAction,
    DisableCallAction,
    /// Hangup-cancelable "calling…" indicator scoped to one call
    ShowCallingIndicator(CallId),
    DismissCallingIndicator,
    OpenCallScreen(CallId),
    EmbedCallWindow {
        call_id: CallId,
        correction: DeviceCorrection,
    },
    RemoveEmbeddedCallWindow,
    ShowError(String),
    StopPresenceService,
    /// Forget the closed engine and the user
    ReleaseEngine,
    Leave,
}

pub struct ContactsReducer;

impl SurfaceReducer for ContactsReducer {
    type State = ContactsState;
    type Effect = ContactsEffect;

    const SURFACE: &'static str = "contacts";

    fn reduce(
        state: &ContactsState,
        event: &SessionEvent,
        view: &EngineView,
    ) -> Transition<ContactsState, ContactsEffect> {
        reduce(state, event, view)
    }
}

/// Shows the window of `call_id`; repeated requests for the same call and
/// calls that already ended are no-ops
pub fn open_call_window(
    state: &ContactsState,
    call_id: CallId,
    status: CallStatus,
) -> Transition<ContactsState, ContactsEffect> {
    if state.call_window == Some(call_id) || status == CallStatus::Ended {
        return Transition::unchanged(state.clone());
    }

    let mut effects = Vec::new();
    if state.call_action_enabled {
        effects.push(ContactsEffect::DisableCallAction);
    }
    effects.push(match state.placement {
        CallWindowPlacement::Fullscreen => ContactsEffect::OpenCallScreen(call_id),
        placement @ CallWindowPlacement::Split { .. } => ContactsEffect::EmbedCallWindow {
            call_id,
            correction: placement.embedded_correction(),
        },
    });

    Transition::new(
        ContactsState {
            tracked: Some(call_id),
            call_action_enabled: false,
            call_window: Some(call_id),
            ..state.clone()
        },
        effects,
    )
}

pub fn reduce(
    state: &ContactsState,
    event: &SessionEvent,
    view: &EngineView,
) -> Transition<ContactsState, ContactsEffect> {
    if state.leaving {
        return Transition::unchanged(state.clone());
    }

    match event {
        SessionEvent::CallCreated(call) => Transition::unchanged(ContactsState {
            tracked: Some(call.id),
            ..state.clone()
        }),
        SessionEvent::CallStatusChanged { call, status } if admits(event, state.tracked) => {
            on_status(state, call.id, *status)
        }
        SessionEvent::CanCreateCallChanged(Some(error))
            if error.kind == CanCreateCallFault::NetworkLost =>
        {
            if !state.call_action_enabled {
                return Transition::unchanged(state.clone());
            }
            Transition::new(
                ContactsState {
                    call_action_enabled: false,
                    ..state.clone()
                },
                vec![ContactsEffect::DisableCallAction],
            )
        }
        SessionEvent::CanCreateCallChanged(Some(error)) => {
            let mut effects = vec![
                ContactsEffect::ShowError(error.description.clone()),
                ContactsEffect::StopPresenceService,
            ];
            if error.kind == CanCreateCallFault::Closed {
                effects.push(ContactsEffect::ReleaseEngine);
            }
            effects.push(ContactsEffect::Leave);
            Transition::new(
                ContactsState {
                    leaving: true,
                    ..state.clone()
                },
                effects,
            )
        }
        SessionEvent::CanCreateCallChanged(None) => {
            if view.current_call.is_some() || state.call_action_enabled {
                return Transition::unchanged(state.clone());
            }
            Transition::new(
                ContactsState {
                    call_action_enabled: true,
                    ..state.clone()
                },
                vec![ContactsEffect::EnableCallAction],
            )
        }
        _ => Transition::unchanged(state.clone()),
    }
}

fn on_status(
    state: &ContactsState,
    call_id: CallId,
    status: CallStatus,
) -> Transition<ContactsState, ContactsEffect> {
    match status {
        CallStatus::Proceeding => {
            if state.calling_indicator == Some(call_id) {
                return Transition::unchanged(state.clone());
            }
            Transition::new(
                ContactsState {
                    calling_indicator: Some(call_id),
                    ..state.clone()
                },
                vec![ContactsEffect::ShowCallingIndicator(call_id)],
            )
        }
        CallStatus::Active => {
            let mut effects = Vec::new();
            let mut next = state.clone();
            if next.calling_indicator.take().is_some() {
                effects.push(ContactsEffect::DismissCallingIndicator);
            }
            let opened = open_call_window(&next, call_id, CallStatus::Active);
            effects.extend(opened.effects);
            Transition::new(opened.state, effects)
        }
        CallStatus::Ended => {
            let mut effects = Vec::new();
            let mut next = ContactsState {
                tracked: None,
                ..state.clone()
            };
            if next.calling_indicator.take().is_some() {
                effects.push(ContactsEffect::DismissCallingIndicator);
            }
            if !next.call_action_enabled {
                next.call_action_enabled = true;
                effects.push(ContactsEffect::EnableCallAction);
            }
            if next.call_window.take().is_some()
                && matches!(next.placement, CallWindowPlacement::Split { .. })
            {
                effects.push(ContactsEffect::RemoveEmbeddedCallWindow);
            }
            Transition::new(next, effects)
        }
        CallStatus::Created | CallStatus::Ringing => Transition::unchanged(state.clone()),
    }
}
