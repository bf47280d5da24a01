use crate::DomainEvent;

/// Events staged by business code while its transaction is still open.
///
/// Nothing in here is visible to any handler until the owner of the transaction
/// drains it after a successful commit. Dropping the buffer (rollback, error,
/// panic) discards the events.
#[derive(Debug, Default)]
pub struct PendingEvents {
    events: Vec<DomainEvent>,
}

impl PendingEvents {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stage(&mut self, event: DomainEvent) {
        self.events.push(event);
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Consumes the buffer, yielding events in the order they were staged.
    pub fn into_events(self) -> Vec<DomainEvent> {
        self.events
    }
}
