//! The relay actor: owns the connection table and the room registry.
//!
//! All membership mutations and broadcasts flow through one command channel,
//! so the registry needs no locking and fan-out for a message happens
//! atomically with respect to joins and disconnects.

use std::collections::HashMap;

use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::protocol::ServerEvent;
use crate::registry::RoomRegistry;

pub type SessionId = Uuid;

/// Delivery handle for one connected session's outbound queue.
pub type Outbound = mpsc::UnboundedSender<ServerEvent>;

enum Command {
    Connect { session: SessionId, outbound: Outbound },
    Join { session: SessionId, room: String },
    Leave { session: SessionId, room: String },
    Broadcast { room: String, event: ServerEvent },
    Disconnect { session: SessionId },
}

#[derive(Clone)]
pub struct RelayHandle {
    commands: mpsc::UnboundedSender<Command>,
}

impl RelayHandle {
    pub fn connect(&self, session: SessionId, outbound: Outbound) {
        let _ = self.commands.send(Command::Connect { session, outbound });
    }

    pub fn join(&self, session: SessionId, room: String) {
        let _ = self.commands.send(Command::Join { session, room });
    }

    pub fn leave(&self, session: SessionId, room: String) {
        let _ = self.commands.send(Command::Leave { session, room });
    }

    /// Fans the event out to every session currently joined to the room.
    pub fn broadcast(&self, room: String, event: ServerEvent) {
        let _ = self.commands.send(Command::Broadcast { room, event });
    }

    pub fn disconnect(&self, session: SessionId) {
        let _ = self.commands.send(Command::Disconnect { session });
    }
}

pub struct Relay {
    sessions: HashMap<SessionId, Outbound>,
    registry: RoomRegistry,
}

impl Relay {
    pub fn spawn() -> RelayHandle {
        let (commands, mut rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            let mut relay = Relay {
                sessions: HashMap::new(),
                registry: RoomRegistry::default(),
            };

            while let Some(command) = rx.recv().await {
                relay.handle(command);
            }
        });

        RelayHandle { commands }
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::Connect { session, outbound } => {
                debug!(%session, "client connected");
                self.sessions.insert(session, outbound);
            }
            Command::Join { session, room } => {
                if !self.sessions.contains_key(&session) {
                    warn!(%session, %room, "join from unknown session, ignoring");
                    return;
                }
                self.registry.join(session, room);
            }
            Command::Leave { session, room } => {
                self.registry.leave(session, &room);
            }
            Command::Broadcast { room, event } => {
                let mut stale = Vec::new();
                for &session in self.registry.members_of(&room) {
                    match self.sessions.get(&session) {
                        Some(outbound) if outbound.send(event.clone()).is_ok() => {}
                        // receiver gone but no disconnect seen yet
                        _ => stale.push(session),
                    }
                }
                for session in stale {
                    debug!(%session, "evicting stale session");
                    self.sessions.remove(&session);
                    self.registry.leave_all(session);
                }
            }
            Command::Disconnect { session } => {
                debug!(%session, "client disconnected");
                self.sessions.remove(&session);
                self.registry.leave_all(session);
            }
        }
    }
}
