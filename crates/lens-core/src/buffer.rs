use std::collections::VecDeque;

use crate::events::AgentEvent;

pub const EVENT_BUFFER_CAPACITY: usize = 100;

/// Bounded raw-event feed, most recent first. The oldest entries are
/// evicted past capacity; consumers only get read-only iteration.
#[derive(Debug, Clone)]
pub struct EventBuffer {
    events: VecDeque<AgentEvent>,
    capacity: usize,
}

impl Default for EventBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBuffer {
    pub fn new() -> Self {
        Self::with_capacity(EVENT_BUFFER_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            events: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, event: AgentEvent) {
        self.events.push_front(event);
        self.events.truncate(self.capacity);
    }

    /// Drops every buffered event; used when a new task is submitted so
    /// stale events never leak into fresh derived state.
    pub fn clear(&mut self) {
        self.events.clear();
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Most recently pushed event, if any.
    pub fn latest(&self) -> Option<&AgentEvent> {
        self.events.front()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AgentEvent> {
        self.events.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventKind;

    fn event(kind: EventKind, agent: &str) -> AgentEvent {
        AgentEvent {
            kind,
            agent: agent.to_string(),
            timestamp: None,
            data: serde_json::Map::new(),
        }
    }

    #[test]
    fn newest_event_sits_at_the_front() {
        let mut buffer = EventBuffer::new();
        buffer.push(event(EventKind::AgentStart, "coder"));
        buffer.push(event(EventKind::Token, "coder"));
        assert_eq!(buffer.latest().map(|e| e.kind.clone()), Some(EventKind::Token));
        assert_eq!(buffer.len(), 2);
    }

    #[test]
    fn capacity_is_never_exceeded() {
        let mut buffer = EventBuffer::new();
        for i in 0..250 {
            buffer.push(event(EventKind::Other(format!("e{i}")), "coder"));
        }
        assert_eq!(buffer.len(), EVENT_BUFFER_CAPACITY);
        // Eviction is oldest-first, so the front holds the newest push.
        assert_eq!(buffer.latest().map(|e| e.kind.as_str().to_string()), Some("e249".to_string()));
        assert_eq!(
            buffer.iter().last().map(|e| e.kind.as_str().to_string()),
            Some("e150".to_string())
        );
    }

    #[test]
    fn clear_empties_the_buffer() {
        let mut buffer = EventBuffer::new();
        buffer.push(event(EventKind::Complete, "orchestrator"));
        buffer.clear();
        assert!(buffer.is_empty());
        assert!(buffer.latest().is_none());
    }
}
