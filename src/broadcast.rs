use std::fmt;

use uuid::Uuid;

use crate::gateway::events::ServerEvent;

/// One live gateway connection. A user may hold several at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> ConnectionId {
        ConnectionId(Uuid::now_v7())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        ConnectionId::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

/// A broadcast group: everyone who joined a conversation, or every
/// connection of one user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Room {
    Conversation(Uuid),
    User(Uuid),
}

/// Fire-and-forget fan-out. Emitting never waits on delivery and never fails
/// the caller; a recipient that is offline simply misses the event.
pub trait Broadcaster: Send + Sync {
    /// Delivers once per connection even when it sits in several of `rooms`.
    fn emit(&self, rooms: &[Room], event: &ServerEvent, except: Option<ConnectionId>);

    fn emit_to_all(&self, event: &ServerEvent, except: Option<ConnectionId>);

    fn emit_to_room(&self, room: Room, event: &ServerEvent, except: Option<ConnectionId>) {
        self.emit(&[room], event, except);
    }

    fn emit_to_user(&self, user_id: Uuid, event: &ServerEvent) {
        self.emit(&[Room::User(user_id)], event, None);
    }
}
