use chrono::{DateTime, Local};

use super::{AuthError, CallId, CallSnapshot, CallStatus, CanCreateCallError, ConnectError};

/// Session events emitted by the engine
///
/// Call-scoped variants carry the snapshot of the call they concern; the
/// remaining variants describe the connection as a whole.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    CallCreated(CallSnapshot),
    CallStatusChanged {
        call: CallSnapshot,
        status: CallStatus,
    },
    ReceivingVideoChanged {
        call: CallSnapshot,
        receiving: bool,
    },
    ConnectionEstablished(Option<ConnectError>),
    Authenticated(Option<AuthError>),
    CanCreateCallChanged(Option<CanCreateCallError>),
}

impl SessionEvent {
    /// Identifier of the call this event concerns, `None` for connection-wide events
    pub fn call_id(&self) -> Option<CallId> {
        match self {
            SessionEvent::CallCreated(call)
            | SessionEvent::CallStatusChanged { call, .. }
            | SessionEvent::ReceivingVideoChanged { call, .. } => Some(call.id),
            SessionEvent::ConnectionEstablished(_)
            | SessionEvent::Authenticated(_)
            | SessionEvent::CanCreateCallChanged(_) => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            SessionEvent::CallCreated(_) => "CallCreated",
            SessionEvent::CallStatusChanged { .. } => "CallStatusChanged",
            SessionEvent::ReceivingVideoChanged { .. } => "ReceivingVideoChanged",
            SessionEvent::ConnectionEstablished(_) => "ConnectionEstablished",
            SessionEvent::Authenticated(_) => "Authenticated",
            SessionEvent::CanCreateCallChanged(_) => "CanCreateCallChanged",
        }
    }
}

/// An event as delivered to one subscriber
#[derive(Debug, Clone)]
pub struct EventEnvelope {
    pub sequence: u64,
    pub published_at: DateTime<Local>,
    pub event: SessionEvent,
}
