//! The public facade (§6.3): a thin wrapper over [`Session`] exposing
//! the small set of operations a bot/observer actually calls. All
//! methods run on whichever thread owns the `Client` — call them from
//! event handlers registered with [`Client::subscribe`] to react to
//! inbound traffic from the same thread that drives
//! [`Client::run_until_closed`] (§5's single-owner session actor).

use crate::bytes::Vector2;
use crate::config::ClientConfig;
use crate::errors::*;
use crate::event::Handler;
use crate::session::{Phase, Session};
use slog::Logger;

/// One connected client.
pub struct Client {
    session: Session,
}

impl Client {
    /// Connects to `config.host`/`config.port`, presenting as
    /// `config.name` running `config.game_version`. Blocks up to
    /// `config.connect_timeout`.
    pub fn connect(logger: Logger, config: ClientConfig) -> Result<Client> {
        Ok(Client {
            session: Session::connect(logger, config)?,
        })
    }

    /// Gracefully (`force=false`) or immediately (`force=true`) leaves.
    pub fn disconnect(&mut self, force: bool) -> Result<()> {
        self.session.disconnect(force)
    }

    /// Joins a lobby by its 6-letter code.
    pub fn join_lobby(&mut self, code: &str) -> Result<()> {
        self.session.join_lobby(code)
    }

    /// Requests the public lobby list matching `map_mask` (a bitmask
    /// of map ids), `impostors` (0-3), and `language`.
    pub fn find_games(&mut self, map_mask: u8, impostors: u8, language: u32) -> Result<()> {
        self.session.find_games(map_mask, impostors, language)
    }

    /// Sends a chat message as the local avatar.
    pub fn send_chat(&mut self, message: &str) -> Result<()> {
        self.session.send_chat(message)
    }

    /// Broadcasts a movement update. Named `move_` since `move` is a
    /// reserved word.
    pub fn move_(&mut self, position: Vector2, velocity: Vector2) -> Result<()> {
        self.session.move_avatar(position, velocity)
    }

    /// Subscribes `handler` to every future event named `event_name`
    /// (one of §6.3's event names, e.g. `"chat"`, `"player_move"`).
    pub fn subscribe(&self, event_name: &str, handler: Handler) -> Result<()> {
        self.session.subscribe(event_name, handler)
    }

    /// Drives the connection until it closes, invoking subscribed
    /// handlers inline as datagrams arrive.
    pub fn run_until_closed(&mut self) -> Result<()> {
        self.session.run_until_closed()
    }

    /// The session's current lifecycle phase.
    pub fn phase(&self) -> Phase {
        self.session.phase()
    }

    /// This client's assigned id, once known.
    pub fn client_id(&self) -> u32 {
        self.session.client_id()
    }
}
