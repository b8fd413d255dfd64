use std::collections::{HashMap, HashSet};

use axum::extract::ws::Utf8Bytes;
use tokio::sync::mpsc::{self, error::TrySendError};
use uuid::Uuid;

use crate::broadcast::{Broadcaster, ConnectionId, Room};

use super::events::{ServerEvent, Status};

/// Frames a connection may have queued before further frames for it are
/// dropped.
pub(crate) const OUTBOX_CAPACITY: usize = 256;

pub(crate) type Outbox = mpsc::Sender<Utf8Bytes>;

enum Command {
    Connect { conn: ConnectionId, user_id: Uuid, outbox: Outbox },
    Disconnect { conn: ConnectionId },
    Join { conn: ConnectionId, conversation_id: Uuid },
    Leave { conn: ConnectionId, conversation_id: Uuid },
    Touch { conn: ConnectionId },
    Emit { rooms: Vec<Room>, frame: Utf8Bytes, except: Option<ConnectionId> },
    EmitAll { frame: Utf8Bytes, except: Option<ConnectionId> },
}

struct Member {
    user_id: Uuid,
    outbox: Outbox,
    rooms: HashSet<Uuid>,
}

/// Presence and room membership. Owned by the hub task alone, so nothing
/// here needs a lock.
#[derive(Default)]
struct HubState {
    members: HashMap<ConnectionId, Member>,
    presence: HashMap<Uuid, HashSet<ConnectionId>>,
    rooms: HashMap<Uuid, HashSet<ConnectionId>>,
}

impl HubState {
    fn apply(&mut self, command: Command) {
        match command {
            Command::Connect { conn, user_id, outbox } => self.connect(conn, user_id, outbox),
            Command::Disconnect { conn } => self.disconnect(conn),
            Command::Join { conn, conversation_id } => self.join(conn, conversation_id),
            Command::Leave { conn, conversation_id } => self.leave(conn, conversation_id),
            Command::Touch { conn } => self.touch(conn),
            Command::Emit { rooms, frame, except } => self.deliver(&rooms, &frame, except),
            Command::EmitAll { frame, except } => self.deliver_all(&frame, except),
        }
    }

    fn connect(&mut self, conn: ConnectionId, user_id: Uuid, outbox: Outbox) {
        self.members.insert(conn, Member { user_id, outbox, rooms: HashSet::new() });

        let connections = self.presence.entry(user_id).or_default();
        connections.insert(conn);
        tracing::debug!(%conn, user = %user_id, connections = connections.len(), "connection registered");
        if connections.len() == 1 {
            self.announce_status(user_id, Status::Online, None);
        }
    }

    fn disconnect(&mut self, conn: ConnectionId) {
        let Some(member) = self.members.remove(&conn) else {
            return;
        };

        for conversation_id in &member.rooms {
            if let Some(room) = self.rooms.get_mut(conversation_id) {
                room.remove(&conn);
                if room.is_empty() {
                    self.rooms.remove(conversation_id);
                }
            }
        }

        let went_offline = match self.presence.get_mut(&member.user_id) {
            Some(connections) => {
                connections.remove(&conn);
                connections.is_empty()
            }
            None => false,
        };
        if went_offline {
            self.presence.remove(&member.user_id);
            self.announce_status(member.user_id, Status::Offline, None);
        }
        tracing::debug!(%conn, user = %member.user_id, "connection released");
    }

    fn join(&mut self, conn: ConnectionId, conversation_id: Uuid) {
        let Some(member) = self.members.get_mut(&conn) else {
            return;
        };
        member.rooms.insert(conversation_id);
        self.rooms.entry(conversation_id).or_default().insert(conn);
    }

    fn leave(&mut self, conn: ConnectionId, conversation_id: Uuid) {
        if let Some(member) = self.members.get_mut(&conn) {
            member.rooms.remove(&conversation_id);
        }
        if let Some(room) = self.rooms.get_mut(&conversation_id) {
            room.remove(&conn);
            if room.is_empty() {
                self.rooms.remove(&conversation_id);
            }
        }
    }

    fn touch(&mut self, conn: ConnectionId) {
        if let Some(member) = self.members.get(&conn) {
            self.announce_status(member.user_id, Status::Online, Some(conn));
        }
    }

    fn announce_status(&self, user_id: Uuid, status: Status, except: Option<ConnectionId>) {
        match ServerEvent::user_status(user_id, status).frame() {
            Ok(frame) => self.deliver_all(&frame, except),
            Err(err) => tracing::error!(error = %err, "could not encode user_status"),
        }
    }

    fn recipients(&self, rooms: &[Room]) -> HashSet<ConnectionId> {
        let mut recipients = HashSet::new();
        for room in rooms {
            let connections = match room {
                Room::Conversation(id) => self.rooms.get(id),
                Room::User(id) => self.presence.get(id),
            };
            recipients.extend(connections.into_iter().flatten().copied());
        }
        recipients
    }

    /// An event relayed from a connection only reaches rooms that connection
    /// has joined.
    fn origin_is_member(&self, rooms: &[Room], origin: ConnectionId) -> bool {
        let Some(member) = self.members.get(&origin) else {
            return false;
        };
        rooms.iter().all(|room| match room {
            Room::Conversation(id) => member.rooms.contains(id),
            Room::User(id) => member.user_id == *id,
        })
    }

    fn deliver(&self, rooms: &[Room], frame: &Utf8Bytes, except: Option<ConnectionId>) {
        if let Some(origin) = except {
            if !self.origin_is_member(rooms, origin) {
                tracing::debug!(conn = %origin, "relay from outside the room dropped");
                return;
            }
        }
        for conn in self.recipients(rooms) {
            if Some(conn) == except {
                continue;
            }
            self.send(conn, frame);
        }
    }

    fn deliver_all(&self, frame: &Utf8Bytes, except: Option<ConnectionId>) {
        for &conn in self.members.keys() {
            if Some(conn) == except {
                continue;
            }
            self.send(conn, frame);
        }
    }

    fn send(&self, conn: ConnectionId, frame: &Utf8Bytes) {
        let Some(member) = self.members.get(&conn) else {
            return;
        };
        match member.outbox.try_send(frame.clone()) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                tracing::warn!(%conn, user = %member.user_id, "outbox full, frame dropped");
            }
            // the connection is on its way out
            Err(TrySendError::Closed(_)) => {}
        }
    }
}

/// Handle to the single task that owns presence and rooms. Commands are
/// applied in the order they are sent, so frames reach each connection in
/// the order the server produced them.
#[derive(Clone)]
pub struct Hub {
    commands: mpsc::UnboundedSender<Command>,
}

impl Hub {
    pub fn spawn() -> Hub {
        let (commands, mut inbox) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            let mut state = HubState::default();
            while let Some(command) = inbox.recv().await {
                state.apply(command);
            }
            tracing::debug!("hub stopped");
        });
        Hub { commands }
    }

    fn send(&self, command: Command) {
        if self.commands.send(command).is_err() {
            tracing::warn!("hub is not running, dropping command");
        }
    }

    pub(crate) fn connect(&self, conn: ConnectionId, user_id: Uuid, outbox: Outbox) {
        self.send(Command::Connect { conn, user_id, outbox });
    }

    pub(crate) fn disconnect(&self, conn: ConnectionId) {
        self.send(Command::Disconnect { conn });
    }

    pub(crate) fn join(&self, conn: ConnectionId, conversation_id: Uuid) {
        self.send(Command::Join { conn, conversation_id });
    }

    pub(crate) fn leave(&self, conn: ConnectionId, conversation_id: Uuid) {
        self.send(Command::Leave { conn, conversation_id });
    }

    pub(crate) fn touch(&self, conn: ConnectionId) {
        self.send(Command::Touch { conn });
    }
}

impl Broadcaster for Hub {
    fn emit(&self, rooms: &[Room], event: &ServerEvent, except: Option<ConnectionId>) {
        match event.frame() {
            Ok(frame) => self.send(Command::Emit { rooms: rooms.to_vec(), frame, except }),
            Err(err) => tracing::error!(error = %err, event = event.name(), "could not encode event"),
        }
    }

    fn emit_to_all(&self, event: &ServerEvent, except: Option<ConnectionId>) {
        match event.frame() {
            Ok(frame) => self.send(Command::EmitAll { frame, except }),
            Err(err) => tracing::error!(error = %err, event = event.name(), "could not encode event"),
        }
    }
}
