//! Reducer of the background presence service
//!
//! Owns the foreground notification and the ring tone. The ring is stopped on
//! every status event other than `RINGING` while it plays; a repeated `RINGING`
//! neither restarts it nor launches a second incoming prompt. The prompt is
//! dismissed as soon as its call leaves `RINGING`.

use super::{admits, EngineView, SurfaceReducer, Transition};
use crate::sdk::{CallId, CallStatus, SessionEvent};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PresenceNotification {
    /// Normal presence, titled with the application name
    Presence { display_name: String },
    InCall { contact: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresenceState {
    pub tracked: Option<CallId>,
    pub notification: Option<PresenceNotification>,
    pub ringing: bool,
    pub prompted: Option<CallId>,
    pub prompt_open: bool,
}

impl PresenceState {
    pub fn new(view: &EngineView) -> Self {
        Self {
            tracked: view.current_call_id(),
            notification: None,
            ringing: false,
            prompted: None,
            prompt_open: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PresenceEffect {
    ShowNotification(PresenceNotification),
    StartRing,
    StopRing,
    LaunchIncomingPrompt {
        call_id: CallId,
        display_name: String,
    },
    DismissIncomingPrompt(CallId),
}

pub struct PresenceReducer;

impl SurfaceReducer for PresenceReducer {
    type State = PresenceState;
    type Effect = PresenceEffect;

    const SURFACE: &'static str = "presence";

    fn reduce(
        state: &PresenceState,
        event: &SessionEvent,
        view: &EngineView,
    ) -> Transition<PresenceState, PresenceEffect> {
        reduce(state, event, view)
    }
}

fn show(
    next: &mut PresenceState,
    effects: &mut Vec<PresenceEffect>,
    notification: PresenceNotification,
) {
    if next.notification.as_ref() != Some(&notification) {
        next.notification = Some(notification.clone());
        effects.push(PresenceEffect::ShowNotification(notification));
    }
}

/// Re-shows normal presence unless a call is being followed
pub fn refresh(state: &PresenceState, view: &EngineView) -> Transition<PresenceState, PresenceEffect> {
    if state.tracked.is_some() {
        return Transition::unchanged(state.clone());
    }
    let mut next = state.clone();
    let mut effects = Vec::new();
    show(
        &mut next,
        &mut effects,
        PresenceNotification::Presence {
            display_name: view.display_name.clone(),
        },
    );
    Transition::new(next, effects)
}

pub fn reduce(
    state: &PresenceState,
    event: &SessionEvent,
    view: &EngineView,
) -> Transition<PresenceState, PresenceEffect> {
    let mut next = state.clone();
    let mut effects = Vec::new();

    match event {
        SessionEvent::CallCreated(call) => {
            next.tracked = Some(call.id);
            show(
                &mut next,
                &mut effects,
                PresenceNotification::InCall {
                    contact: call.contact_display_name.clone(),
                },
            );
        }
        SessionEvent::CallStatusChanged { call, status } if admits(event, state.tracked) => {
            if next.ringing && *status != CallStatus::Ringing {
                next.ringing = false;
                effects.push(PresenceEffect::StopRing);
            }
            if next.prompt_open && next.prompted == Some(call.id) && *status != CallStatus::Ringing {
                next.prompt_open = false;
                effects.push(PresenceEffect::DismissIncomingPrompt(call.id));
            }
            match status {
                CallStatus::Ringing => {
                    if !next.ringing {
                        next.ringing = true;
                        effects.push(PresenceEffect::StartRing);
                    }
                    if next.prompted != Some(call.id) {
                        next.prompted = Some(call.id);
                        next.prompt_open = true;
                        effects.push(PresenceEffect::LaunchIncomingPrompt {
                            call_id: call.id,
                            display_name: call.contact_display_name.clone(),
                        });
                    }
                }
                CallStatus::Ended => {
                    next.tracked = None;
                    show(
                        &mut next,
                        &mut effects,
                        PresenceNotification::Presence {
                            display_name: view.display_name.clone(),
                        },
                    );
                }
                _ => {}
            }
        }
        _ => {}
    }

    Transition::new(next, effects)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router::fixtures::{created, status};

    fn view() -> EngineView {
        EngineView {
            display_name: "Kenzo Tenma".to_string(),
            ..EngineView::default()
        }
    }

    fn run(
        mut state: PresenceState,
        events: &[SessionEvent],
    ) -> (PresenceState, Vec<PresenceEffect>) {
        let view = view();
        let mut effects = Vec::new();
        for event in events {
            let t = reduce(&state, event, &view);
            state = t.state;
            effects.extend(t.effects);
        }
        (state, effects)
    }

    #[test]
    fn ringing_call_lifecycle_stops_ring_once() {
        let (state, effects) = run(
            PresenceState::new(&view()),
            &[
                created(7),
                status(7, CallStatus::Proceeding),
                status(7, CallStatus::Ringing),
                status(7, CallStatus::Active),
                status(7, CallStatus::Ended),
            ],
        );
        assert_eq!(
            effects,
            vec![
                PresenceEffect::ShowNotification(PresenceNotification::InCall {
                    contact: "Nina Fortner".to_string()
                }),
                PresenceEffect::StartRing,
                PresenceEffect::LaunchIncomingPrompt {
                    call_id: CallId(7),
                    display_name: "Nina Fortner".to_string()
                },
                PresenceEffect::StopRing,
                PresenceEffect::DismissIncomingPrompt(CallId(7)),
                PresenceEffect::ShowNotification(PresenceNotification::Presence {
                    display_name: "Kenzo Tenma".to_string()
                }),
            ]
        );
        assert_eq!(
            effects
                .iter()
                .filter(|e| **e == PresenceEffect::StopRing)
                .count(),
            1
        );
        assert!(!state.ringing);
        assert_eq!(state.tracked, None);
    }

    #[test]
    fn repeated_ringing_is_a_noop() {
        let (state, _) = run(
            PresenceState::new(&view()),
            &[created(7), status(7, CallStatus::Ringing)],
        );
        let again = reduce(&state, &status(7, CallStatus::Ringing), &view());
        assert!(again.is_noop());
    }

    #[test]
    fn ring_stops_on_ended() {
        let (_, effects) = run(
            PresenceState::new(&view()),
            &[
                created(2),
                status(2, CallStatus::Ringing),
                status(2, CallStatus::Ended),
            ],
        );
        assert!(effects.contains(&PresenceEffect::StopRing));
    }

    #[test]
    fn prompt_is_dismissed_when_caller_hangs_up() {
        let (state, effects) = run(
            PresenceState::new(&view()),
            &[
                created(3),
                status(3, CallStatus::Ringing),
                status(3, CallStatus::Ended),
            ],
        );
        assert_eq!(
            effects
                .iter()
                .filter(|e| **e == PresenceEffect::DismissIncomingPrompt(CallId(3)))
                .count(),
            1
        );
        assert!(!state.prompt_open);
        assert!(reduce(&state, &status(3, CallStatus::Ended), &view()).is_noop());
    }

    #[test]
    fn other_call_is_ignored() {
        let (state, _) = run(PresenceState::new(&view()), &[created(7)]);
        assert!(reduce(&state, &status(9, CallStatus::Ringing), &view()).is_noop());
    }

    #[test]
    fn refresh_keeps_in_call_notification() {
        let (state, _) = run(PresenceState::new(&view()), &[created(7)]);
        assert!(refresh(&state, &view()).is_noop());

        let idle = PresenceState::new(&view());
        let t = refresh(&idle, &view());
        assert_eq!(
            t.effects,
            vec![PresenceEffect::ShowNotification(PresenceNotification::Presence {
                display_name: "Kenzo Tenma".to_string()
            })]
        );
        assert!(refresh(&t.state, &view()).is_noop());
    }
}
