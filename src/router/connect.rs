//! Reducer of the connect screen: application id, connection, login

use super::{EngineView, SurfaceReducer, Transition};
use crate::sdk::{AuthFault, SessionEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectPhase {
    AwaitingAppId,
    Connecting,
    ChoosingUser,
    Authenticating,
    LoggedIn,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectState {
    pub phase: ConnectPhase,
}

impl Default for ConnectState {
    fn default() -> Self {
        Self {
            phase: ConnectPhase::AwaitingAppId,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectEffect {
    DismissDialog,
    ShowLoginChooser,
    /// Replaces the screen content, terminal
    ShowError(String),
    /// Short-lived message, the screen stays usable
    ShowNotice(String),
    EnterContacts,
}

pub struct ConnectReducer;

impl SurfaceReducer for ConnectReducer {
    type State = ConnectState;
    type Effect = ConnectEffect;

    const SURFACE: &'static str = "connect";

    fn reduce(
        state: &ConnectState,
        event: &SessionEvent,
        _view: &EngineView,
    ) -> Transition<ConnectState, ConnectEffect> {
        reduce(state, event)
    }
}

fn moved(phase: ConnectPhase, effects: Vec<ConnectEffect>) -> Transition<ConnectState, ConnectEffect> {
    Transition::new(ConnectState { phase }, effects)
}

pub fn reduce(state: &ConnectState, event: &SessionEvent) -> Transition<ConnectState, ConnectEffect> {
    match (state.phase, event) {
        (ConnectPhase::Connecting, SessionEvent::ConnectionEstablished(Some(error))) => moved(
            ConnectPhase::Failed,
            vec![
                ConnectEffect::DismissDialog,
                ConnectEffect::ShowError(error.description.clone()),
            ],
        ),
        (ConnectPhase::Connecting, SessionEvent::ConnectionEstablished(None)) => moved(
            ConnectPhase::ChoosingUser,
            vec![ConnectEffect::DismissDialog, ConnectEffect::ShowLoginChooser],
        ),
        (ConnectPhase::Authenticating, SessionEvent::Authenticated(Some(error)))
            if error.kind == AuthFault::BadApiKey =>
        {
            moved(
                ConnectPhase::Failed,
                vec![
                    ConnectEffect::DismissDialog,
                    ConnectEffect::ShowError(error.description.clone()),
                ],
            )
        }
        (ConnectPhase::Authenticating, SessionEvent::Authenticated(Some(error))) => moved(
            ConnectPhase::ChoosingUser,
            vec![
                ConnectEffect::DismissDialog,
                ConnectEffect::ShowNotice(error.description.clone()),
            ],
        ),
        (ConnectPhase::Authenticating, SessionEvent::Authenticated(None)) => moved(
            ConnectPhase::LoggedIn,
            vec![ConnectEffect::DismissDialog, ConnectEffect::EnterContacts],
        ),
        _ => Transition::unchanged(state.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sdk::{AuthError, ConnectError, ConnectFault};

    fn at(phase: ConnectPhase) -> ConnectState {
        ConnectState { phase }
    }

    #[test]
    fn connection_success_shows_chooser() {
        let t = reduce(&at(ConnectPhase::Connecting), &SessionEvent::ConnectionEstablished(None));
        assert_eq!(t.state.phase, ConnectPhase::ChoosingUser);
        assert_eq!(
            t.effects,
            vec![ConnectEffect::DismissDialog, ConnectEffect::ShowLoginChooser]
        );
        // A second delivery finds the screen already past connecting
        let again = reduce(&t.state, &SessionEvent::ConnectionEstablished(None));
        assert!(again.is_noop());
    }

    #[test]
    fn connection_failure_is_terminal() {
        let error = ConnectError::new(ConnectFault::Network, "no route");
        let t = reduce(
            &at(ConnectPhase::Connecting),
            &SessionEvent::ConnectionEstablished(Some(error)),
        );
        assert_eq!(t.state.phase, ConnectPhase::Failed);
        assert_eq!(t.effects.last(), Some(&ConnectEffect::ShowError("no route".to_string())));
    }

    #[test]
    fn bad_api_key_is_fatal_other_errors_are_not() {
        let bad_key = SessionEvent::Authenticated(Some(AuthError::new(AuthFault::BadApiKey, "bad key")));
        let t = reduce(&at(ConnectPhase::Authenticating), &bad_key);
        assert_eq!(t.state.phase, ConnectPhase::Failed);

        let other = SessionEvent::Authenticated(Some(AuthError::new(AuthFault::Other, "bad uid")));
        let t = reduce(&at(ConnectPhase::Authenticating), &other);
        assert_eq!(t.state.phase, ConnectPhase::ChoosingUser);
        assert_eq!(
            t.effects,
            vec![
                ConnectEffect::DismissDialog,
                ConnectEffect::ShowNotice("bad uid".to_string())
            ]
        );
    }

    #[test]
    fn authentication_enters_contacts() {
        let t = reduce(&at(ConnectPhase::Authenticating), &SessionEvent::Authenticated(None));
        assert_eq!(t.state.phase, ConnectPhase::LoggedIn);
        assert_eq!(t.effects.last(), Some(&ConnectEffect::EnterContacts));
    }

    #[test]
    fn events_outside_their_phase_are_ignored() {
        assert!(reduce(&at(ConnectPhase::AwaitingAppId), &SessionEvent::Authenticated(None)).is_noop());
        assert!(reduce(&at(ConnectPhase::LoggedIn), &SessionEvent::ConnectionEstablished(None)).is_noop());
    }
}
