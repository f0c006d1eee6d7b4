use super::SessionState;
use crate::handle::SessionHandle;
use crate::time::XrTime;
use std::collections::VecDeque;

/// Runtime events delivered to the application through `poll_event`.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    SessionStateChanged {
        session: SessionHandle,
        state: SessionState,
        time: XrTime,
    },
    DisplayRefreshRateChanged {
        session: SessionHandle,
        from_hz: f32,
        to_hz: f32,
    },
}

impl Event {
    pub fn session(&self) -> SessionHandle {
        match self {
            Event::SessionStateChanged { session, .. }
            | Event::DisplayRefreshRateChanged { session, .. } => *session,
        }
    }
}

/// Instance-wide FIFO of pending events.
#[derive(Debug, Default)]
pub struct EventQueue {
    pending: VecDeque<Event>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: Event) {
        log::trace!("[events] queued {event:?}");
        self.pending.push_back(event);
    }

    pub fn pop(&mut self) -> Option<Event> {
        self.pending.pop_front()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Drops events for a session that no longer exists.
    pub fn discard_session(&mut self, session: SessionHandle) {
        self.pending.retain(|event| event.session() != session);
    }
}
