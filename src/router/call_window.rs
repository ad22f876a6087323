//! Reducer of the active-call window (fullscreen screen or embedded pane)

use super::{admits, EngineView, SurfaceReducer, Transition};
use crate::sdk::{CallId, CallStatus, SessionEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowKind {
    /// Own screen, orientation locked
    Fullscreen,
    /// Pane inside the contacts screen of a split layout
    Embedded,
}

/// Local preview sizing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreviewLayout {
    /// Small fixed square while the remote video is shown
    Overlay,
    /// Fills the window
    Fill,
}

impl PreviewLayout {
    pub fn for_receiving(receiving: bool) -> Self {
        if receiving {
            PreviewLayout::Overlay
        } else {
            PreviewLayout::Fill
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallWindowState {
    pub tracked: CallId,
    pub kind: WindowKind,
    pub preview: PreviewLayout,
    pub ended: bool,
}

impl CallWindowState {
    pub fn new(tracked: CallId, kind: WindowKind, receiving_video: bool) -> Self {
        Self {
            tracked,
            kind,
            preview: PreviewLayout::for_receiving(receiving_video),
            ended: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallWindowEffect {
    ResizePreview(PreviewLayout),
    /// Unbind video in and out
    TearDownVideo,
    Leave,
}

pub struct CallWindowReducer;

impl SurfaceReducer for CallWindowReducer {
    type State = CallWindowState;
    type Effect = CallWindowEffect;

    const SURFACE: &'static str = "call-window";

    fn reduce(
        state: &CallWindowState,
        event: &SessionEvent,
        _view: &EngineView,
    ) -> Transition<CallWindowState, CallWindowEffect> {
        reduce(state, event)
    }
}

pub fn reduce(
    state: &CallWindowState,
    event: &SessionEvent,
) -> Transition<CallWindowState, CallWindowEffect> {
    if state.ended || !admits(event, Some(state.tracked)) {
        return Transition::unchanged(state.clone());
    }

    match event {
        SessionEvent::ReceivingVideoChanged { receiving, .. } => {
            let preview = PreviewLayout::for_receiving(*receiving);
            if preview == state.preview {
                return Transition::unchanged(state.clone());
            }
            Transition::new(
                CallWindowState {
                    preview,
                    ..state.clone()
                },
                vec![CallWindowEffect::ResizePreview(preview)],
            )
        }
        SessionEvent::CallStatusChanged {
            status: CallStatus::Ended,
            ..
        } => {
            // Leaving a fullscreen window already unbinds the video
            let effect = match state.kind {
                WindowKind::Fullscreen => CallWindowEffect::Leave,
                WindowKind::Embedded => CallWindowEffect::TearDownVideo,
            };
            Transition::new(
                CallWindowState {
                    ended: true,
                    ..state.clone()
                },
                vec![effect],
            )
        }
        _ => Transition::unchanged(state.clone()),
    }
}
