//! Boundary of the third-party calling SDK
//!
//! The engine, its calls and the video widgets are opaque collaborators. This
//! module only fixes the shape the orchestration core talks to:
//!
//! 1. [`CallEngine`] / [`CallHandle`] - engine and call operations
//! 2. [`events`] - the closed session event vocabulary
//! 3. [`bus`] - process-wide event delivery with scoped subscriptions
//! 4. [`simulated`] - in-memory engine used by the demo binary and the tests
//!
//! # Architecture
//!
//! ```text
//! Engine ──► EventBus ──► Surface inbox ──► Reducer ──► Effects
//!             (publish)    (per subscription)
//! ```

pub mod bus;
pub mod events;
pub mod simulated;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

pub use bus::{EventBus, Subscription};
pub use events::{EventEnvelope, SessionEvent};

/// Engine-assigned call identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CallId(pub i32);

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Call status as reported by the engine, in lifecycle order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CallStatus {
    Created,
    Proceeding,
    Ringing,
    Active,
    Ended,
}

impl fmt::Display for CallStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallStatus::Created => write!(f, "CREATED"),
            CallStatus::Proceeding => write!(f, "PROCEEDING"),
            CallStatus::Ringing => write!(f, "RINGING"),
            CallStatus::Active => write!(f, "ACTIVE"),
            CallStatus::Ended => write!(f, "ENDED"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoSource {
    Front,
    Back,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserType {
    Internal,
    External,
}

/// Error reported by the engine: a category tag plus an opaque description
///
/// The core only ever branches on `kind`; `description` is shown to the user as-is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fault<K> {
    pub kind: K,
    pub description: String,
}

impl<K> Fault<K> {
    pub fn new(kind: K, description: impl Into<String>) -> Self {
        Self {
            kind,
            description: description.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectFault {
    Network,
    Initialization,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthFault {
    BadApiKey,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CanCreateCallFault {
    NetworkLost,
    SipNok,
    Closed,
}

pub type ConnectError = Fault<ConnectFault>;
pub type AuthError = Fault<AuthFault>;
pub type CanCreateCallError = Fault<CanCreateCallFault>;

/// Read-only view of a call at the moment an event was emitted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallSnapshot {
    pub id: CallId,
    pub status: CallStatus,
    pub contact_display_name: String,
    pub receiving_video: bool,
}

/// Video widget the engine renders into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VideoSurfaceId(pub u32);

/// Outbound video frame binding, including its one-shot orientation correction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoOutFrame {
    pub surface: VideoSurfaceId,
    pub use_device_orientation: bool,
    pub device_correction: Option<u16>,
}

/// Operations on a single call owned by the engine
pub trait CallHandle: Send + Sync {
    fn call_id(&self) -> CallId;

    fn status(&self) -> CallStatus;

    fn contact_display_name(&self) -> String;

    fn is_receiving_video(&self) -> bool;

    /// Answers an incoming call
    fn accept(&self);

    fn hangup(&self);

    fn audio_mute(&self);

    fn audio_unmute(&self);

    fn video_start(&self);

    fn video_stop(&self);

    fn set_video_source(&self, source: VideoSource);

    fn set_video_in(&self, surface: Option<VideoSurfaceId>);

    fn set_video_out(&self, frame: Option<VideoOutFrame>);

    fn snapshot(&self) -> CallSnapshot {
        CallSnapshot {
            id: self.call_id(),
            status: self.status(),
            contact_display_name: self.contact_display_name(),
            receiving_video: self.is_receiving_video(),
        }
    }
}

/// Operations on the engine instance
pub trait CallEngine: Send + Sync {
    fn get_call(&self, id: CallId) -> Option<Arc<dyn CallHandle>>;

    fn current_call(&self) -> Option<Arc<dyn CallHandle>>;

    fn is_authenticated(&self) -> bool;

    fn can_create_call(&self) -> bool;

    fn create_call(&self, contact_id: &str);

    fn authenticate(&self, user_id: &str, user_type: UserType);

    fn display_name(&self) -> String;

    fn set_display_name(&self, display_name: &str);

    fn go_to_foreground(&self);

    fn go_to_background(&self);

    fn is_in_background(&self) -> bool;

    /// Tears the engine down; emits `CanCreateCallChanged(CLOSED)`
    fn disconnect(&self);
}

/// Creates engine instances; initialization completes asynchronously with a
/// `ConnectionEstablished` event on the given bus.
pub trait EngineConnector: Send + Sync {
    fn initialize(&self, app_id: &str, bus: EventBus) -> Arc<dyn CallEngine>;
}
