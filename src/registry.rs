//! Room membership table: which live sessions receive broadcasts for which room.

use std::collections::{HashMap, HashSet};

use crate::relay::SessionId;

/// Pure membership map, mutated only by the relay actor. Performs no I/O.
#[derive(Debug, Default)]
pub struct RoomRegistry {
    rooms: HashMap<String, HashSet<SessionId>>,
}

impl RoomRegistry {
    /// Adds a session to a room. Joining twice is a no-op.
    pub fn join(&mut self, session: SessionId, room: String) {
        self.rooms.entry(room).or_default().insert(session);
    }

    pub fn leave(&mut self, session: SessionId, room: &str) {
        if let Some(members) = self.rooms.get_mut(room) {
            members.remove(&session);
            if members.is_empty() {
                self.rooms.remove(room);
            }
        }
    }

    /// Removes the session from every room it had joined. Safe to call for
    /// sessions that never joined anything.
    pub fn leave_all(&mut self, session: SessionId) {
        self.rooms.retain(|_, members| {
            members.remove(&session);
            !members.is_empty()
        });
    }

    pub fn members_of(&self, room: &str) -> impl Iterator<Item = &SessionId> {
        self.rooms.get(room).into_iter().flatten()
    }
}
