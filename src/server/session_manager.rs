use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use tracing::{debug, info};

use crate::{
    common::{GuildId, SessionId, UserId},
    player::{PlayerHandle, PlayerRegistry, PlayerServices},
    protocol::OutgoingMessage,
};

/// One control client connection and the players it owns.
pub struct Session {
    pub session_id: SessionId,
    pub user_id: UserId,
    pub players: Arc<PlayerRegistry>,
    /// Outgoing messages, drained by the socket writer.
    pub sender: flume::Sender<OutgoingMessage>,
}

impl Session {
    pub fn new(session_id: SessionId, user_id: UserId, sender: flume::Sender<OutgoingMessage>) -> Self {
        Self {
            session_id,
            user_id,
            players: Arc::new(PlayerRegistry::new()),
            sender,
        }
    }

    pub fn get(&self, guild_id: &GuildId) -> Option<PlayerHandle> {
        self.players
            .get(guild_id)
            .map(|p| p.clone())
            .filter(|p| !p.is_destroyed())
    }

    /// The guild's player, created on first use.
    pub fn player(&self, guild_id: &GuildId, services: &PlayerServices) -> PlayerHandle {
        let spawn = || {
            debug!("[{}] creating player for session {}", guild_id, self.session_id);
            PlayerHandle::spawn(
                guild_id.clone(),
                self.user_id,
                services.clone(),
                self.sender.clone(),
                &self.players,
            )
        };

        match self.players.entry(guild_id.clone()) {
            Entry::Occupied(mut entry) => {
                if entry.get().is_destroyed() {
                    // teardown of the old actor has not run yet
                    let handle = spawn();
                    entry.insert(handle.clone());
                    handle
                } else {
                    entry.get().clone()
                }
            }
            Entry::Vacant(entry) => entry.insert(spawn()).clone(),
        }
    }

    /// Destroys the guild's player. Returns whether one existed.
    pub fn destroy_player(&self, guild_id: &GuildId) -> bool {
        match self.players.remove(guild_id) {
            Some((_, handle)) => {
                handle.destroy();
                true
            }
            None => false,
        }
    }

    pub fn send(&self, message: OutgoingMessage) {
        if self.sender.send(message).is_err() {
            debug!("session {} is closed, message dropped", self.session_id);
        }
    }

    pub fn shutdown(&self) {
        info!("Shutting down session: {}", self.session_id);
        for item in self.players.iter() {
            item.value().destroy();
        }
        self.players.clear();
    }
}
