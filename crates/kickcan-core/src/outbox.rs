use kickcan_protocol::{Cue, EntityId, Event};

/// Who a queued message is for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Audience {
    All,
    /// Only the observer owning this entity.
    Only(EntityId),
}

#[derive(Clone, Debug, PartialEq)]
pub enum Payload {
    Event(Event),
    Cue(Cue),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Envelope {
    pub audience: Audience,
    pub payload: Payload,
}

/// Reliable authority-to-observer messages produced during a tick, in the
/// order they were confirmed.
#[derive(Clone, Debug, Default)]
pub struct Outbox {
    queue: Vec<Envelope>,
}

impl Outbox {
    pub fn broadcast(&mut self, event: Event) {
        self.queue.push(Envelope {
            audience: Audience::All,
            payload: Payload::Event(event),
        });
    }

    pub fn notify(&mut self, entity: EntityId, cue: Cue) {
        self.queue.push(Envelope {
            audience: Audience::Only(entity),
            payload: Payload::Cue(cue),
        });
    }

    pub fn cue_all(&mut self, cue: Cue) {
        self.queue.push(Envelope {
            audience: Audience::All,
            payload: Payload::Cue(cue),
        });
    }

    pub fn drain(&mut self) -> Vec<Envelope> {
        std::mem::take(&mut self.queue)
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}
