//! The session actor: owns the transport, reliability table, and game
//! model, and drives the connection lifecycle (§4.5).

pub mod udp;

use crate::bytes::{game_name_to_int, Vector2};
use crate::config::ClientConfig;
use crate::dispatch::{Dispatcher, SessionState};
use crate::errors::*;
use crate::event::{Event, EventBus, EventKind, InboundFrame, WaitResult, Waiters};
use crate::protocol::frame::{DataFlagFrame, GameDataFrame};
use crate::protocol::messages::{
    GetGameListV2Request, JoinGameRequest, JoinGameResponse, MapSearchMask,
};
use crate::protocol::{MatchMakingFrame, OuterFrame, RpcFrame};
use crate::reliability::Reliability;
use byteorder::{LittleEndian, WriteBytesExt};
use self::udp::{ReaderEvent, UdpTransport};
use slog::Logger;
use std::net::{SocketAddr, ToSocketAddrs};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

#[allow(unused_imports)]
pub use self::udp::ReaderEvent as TransportEvent;

/// Where the session currently sits in its connection lifecycle (§4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// No transport open yet
    Disconnected,
    /// Transport open, awaiting the first inbound datagram
    Connecting,
    /// Handshake complete, not yet in a game
    Ready,
    /// Joined a game
    InGame,
    /// Torn down; `Session::close_reason` explains why
    Closed,
}

/// Maps a public event name (§6.3) to its [`EventKind`].
fn event_kind_from_name(name: &str) -> Option<EventKind> {
    Some(match name {
        "ready" => EventKind::Ready,
        "game_join" => EventKind::GameJoin,
        "game_start" => EventKind::GameStart,
        "game_end" => EventKind::GameEnd,
        "game_settings" => EventKind::GameSettings,
        "chat" => EventKind::Chat,
        "death" => EventKind::Death,
        "player_kill" => EventKind::PlayerKill,
        "player_move" => EventKind::PlayerMove,
        "player_update" => EventKind::PlayerUpdate,
        "players_update" => EventKind::PlayersUpdate,
        "player_remove" => EventKind::PlayerRemove,
        "player_leave" => EventKind::PlayerLeave,
        "player_tasks_update" => EventKind::PlayerTasksUpdate,
        "player_vote" => EventKind::PlayerVote,
        "attribute_update" => EventKind::AttributeUpdate,
        "start_counter" => EventKind::StartCounter,
        "meeting_start" => EventKind::MeetingStart,
        "meeting_stop" => EventKind::MeetingStop,
        "voting_end" => EventKind::VotingEnd,
        "vent_enter" => EventKind::VentEnter,
        "vent_exit" => EventKind::VentExit,
        "vent_move" => EventKind::VentMove,
        "button_press" => EventKind::ButtonPress,
        "body_report" => EventKind::BodyReport,
        "name_update" => EventKind::NameUpdate,
        "color_update" => EventKind::ColorUpdate,
        _ => return None,
    })
}

/// Validates a lobby code's shape. Six-letter codes decode via the
/// alphabet bijection (§4.1); four-letter (pre-v2) codes use a scheme
/// this crate does not implement, so they are rejected rather than
/// guessed at (§9's ambiguity note).
fn validate_lobby_code(code: &str) -> Result<u32> {
    let upper = code.to_uppercase();
    if upper.len() == 6 && upper.bytes().all(|b| b.is_ascii_uppercase()) {
        return game_name_to_int(&upper);
    }
    Err(ErrorKind::InvalidLobbyCode(code.to_owned()).into())
}

/// One live client session: transport, reliability bookkeeping, game
/// model, and the connection-lifecycle state machine, all owned by a
/// single thread that drains the transport's reader channel (§5).
pub struct Session {
    logger: Logger,
    config: ClientConfig,
    remote: SocketAddr,
    events: Arc<EventBus>,
    waiters: Arc<Waiters>,
    reliability: Arc<Mutex<Reliability>>,
    dispatcher: Dispatcher,
    state: SessionState,
    phase: Phase,
    transport: Option<UdpTransport>,
    close_reason: Option<Error>,
    spectator_reconnect_done: bool,
    joined: bool,
    move_sequence: u16,
}

impl Session {
    /// Resolves `config.host`/`config.port`, opens the socket, and
    /// performs the handshake, blocking up to `config.connect_timeout`.
    pub fn connect(logger: Logger, config: ClientConfig) -> Result<Session> {
        config.validate()?;
        let remote = (config.host.as_str(), config.port)
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| ErrorKind::ProtocolDecode("could not resolve host"))?;

        let mut session = Session {
            logger: logger.clone(),
            config,
            remote,
            events: Arc::new(EventBus::new()),
            waiters: Arc::new(Waiters::new()),
            reliability: Arc::new(Mutex::new(Reliability::new(Duration::from_millis(0)))),
            dispatcher: Dispatcher::new(logger.new(o!("component" => "dispatch"))),
            state: SessionState::new(),
            phase: Phase::Disconnected,
            transport: None,
            close_reason: None,
            spectator_reconnect_done: false,
            joined: false,
            move_sequence: 0,
        };
        session.state.spectator = session.config.spectator;
        session.open(remote)?;
        Ok(session)
    }

    fn open(&mut self, remote: SocketAddr) -> Result<()> {
        self.reliability = Arc::new(Mutex::new(Reliability::new(self.config.keep_alive_timeout)));
        let transport = UdpTransport::connect(
            self.logger.new(o!("remote" => remote.to_string())),
            remote,
            self.config.recv_timeout,
            self.reliability.clone(),
        )?;
        self.phase = Phase::Connecting;

        let id = {
            let mut rel = self.reliability.lock().unwrap();
            rel.next_id()?
        };
        let hello = OuterFrame::Hello {
            id,
            game_version: self.config.game_version,
            name: self.config.name.clone(),
        };
        transport.send(hello.encode()?)?;
        {
            let mut rel = self.reliability.lock().unwrap();
            rel.track(id, None);
        }
        self.transport = Some(transport);

        let deadline = Instant::now() + self.config.connect_timeout;
        loop {
            if Instant::now() >= deadline {
                self.phase = Phase::Closed;
                return Err(ErrorKind::ConnectTimeout.into());
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.transport.as_ref().unwrap().recv_event_timeout(remaining) {
                Some(ReaderEvent::Datagram(data)) => {
                    if self.phase == Phase::Connecting {
                        self.phase = Phase::Ready;
                        self.transport.as_ref().unwrap().mark_ready();
                        self.events.emit(Event::Ready);
                    }
                    self.handle_datagram(&data)?;
                    return Ok(());
                }
                Some(ReaderEvent::Timeout) | None => continue,
            }
        }
    }

    /// Reconnects to `remote` (recv-timeout or redirect recovery),
    /// preserving identity/cosmetics and in-memory roster, and resetting
    /// in-flight ack tables and the ready state (§4.4 Redirect bullet).
    fn reconnect(&mut self, remote: SocketAddr) -> Result<()> {
        self.waiters.cancel_all();
        self.transport = None;
        self.remote = remote;
        self.open(remote)
    }

    fn handle_datagram(&mut self, data: &[u8]) -> Result<()> {
        let frame = OuterFrame::decode(data)?;
        if let Some(id) = frame.reliable_id() {
            if frame.is_reliable_class() && !matches!(frame, OuterFrame::Ack { .. }) {
                self.send_ack(id)?;
            }
        }
        match frame {
            OuterFrame::Unreliable(frames) => self.handle_matchmaking_frames(frames)?,
            OuterFrame::Reliable { frames, .. } => self.handle_matchmaking_frames(frames)?,
            OuterFrame::Hello { .. } => {
                warn!(self.logger, "received a Hello on the client side; ignoring");
            }
            OuterFrame::Disconnect { reason, custom, .. } => {
                self.waiters.cancel_all();
                self.phase = Phase::Closed;
                self.close_reason = Some(
                    ErrorKind::ServerDisconnect(reason.map(|r| r.tag()).unwrap_or(0), custom).into(),
                );
            }
            OuterFrame::Ack { id } => {
                self.reliability.lock().unwrap().handle_ack(id);
            }
            OuterFrame::Fragment(_) => {
                warn!(self.logger, "received a Fragment; this protocol layer never emits them, ignoring");
            }
            OuterFrame::Ping { .. } => {}
        }
        Ok(())
    }

    /// Dispatches `frames`, then intercepts any `Redirect` the
    /// dispatcher would otherwise just log as unhandled: redirecting is
    /// a transport-level concern the dispatcher cannot act on itself.
    fn handle_matchmaking_frames(&mut self, frames: Vec<MatchMakingFrame>) -> Result<()> {
        let mut redirect = None;
        let mut rest = Vec::with_capacity(frames.len());
        for f in frames {
            match f {
                MatchMakingFrame::Redirect(r) => redirect = Some(r),
                other => rest.push(other),
            }
        }
        self.dispatcher.dispatch(&mut self.state, &self.events, &self.waiters, &rest)?;
        self.after_dispatch()?;
        if let Some(r) = redirect {
            let remote = SocketAddr::new(r.host.into(), r.port);
            self.phase = Phase::Connecting;
            self.reconnect(remote)?;
        }
        Ok(())
    }

    fn after_dispatch(&mut self) -> Result<()> {
        if !self.joined && self.state.client_id != 0 {
            self.joined = true;
            self.phase = Phase::InGame;
            self.events.emit(Event::GameJoin {
                game_id: self.state.game_id,
                client_id: self.state.client_id,
            });
        }
        if !self.config.spectator || self.spectator_reconnect_done {
            return Ok(());
        }
        if self.state.local_player_id.is_some() && self.state.players.is_complete() {
            self.spectator_reconnect_done = true;
            let remote = self.remote;
            self.reconnect(remote)?;
        }
        Ok(())
    }

    fn send_ack(&self, id: u16) -> Result<()> {
        self.transport.as_ref().unwrap().send(OuterFrame::Ack { id }.encode()?)
    }

    fn send_reliable(&mut self, frames: Vec<MatchMakingFrame>) -> Result<u16> {
        let id = {
            let mut rel = self.reliability.lock().unwrap();
            let id = rel.next_id()?;
            rel.track(id, None);
            rel.defer_pinger();
            id
        };
        let bytes = OuterFrame::Reliable { id, frames }.encode()?;
        self.transport.as_ref().ok_or_else(|| Error::from(ErrorKind::ConnectionClosed))?.send(bytes)?;
        Ok(id)
    }

    fn send_unreliable(&self, frames: Vec<MatchMakingFrame>) -> Result<()> {
        let bytes = OuterFrame::Unreliable(frames).encode()?;
        self.transport.as_ref().ok_or_else(|| Error::from(ErrorKind::ConnectionClosed))?.send(bytes)
    }

    /// Joins a lobby by its human code (§6.3).
    pub fn join_lobby(&mut self, code: &str) -> Result<()> {
        let wire_code = validate_lobby_code(code)?;
        self.send_reliable(vec![MatchMakingFrame::JoinGameRequest(JoinGameRequest {
            code: wire_code,
            map_id: 0x07,
        })])?;

        match self.waiters.wait_for(
            |f| matches!(
                f,
                InboundFrame::MatchMaking(MatchMakingFrame::JoinGameResponse(_))
                    | InboundFrame::MatchMaking(MatchMakingFrame::JoinedGame(_))
            ),
            self.config.recv_timeout,
        ) {
            WaitResult::Matched(InboundFrame::MatchMaking(MatchMakingFrame::JoinGameResponse(
                JoinGameResponse::Failure { reason, custom },
            ))) => Err(ErrorKind::JoinGameFailed(reason.tag(), custom).into()),
            WaitResult::Matched(_) => Ok(()),
            WaitResult::Cancelled => Err(ErrorKind::ConnectionClosed.into()),
            WaitResult::TimedOut => Err(ErrorKind::ReceiveTimeout.into()),
        }
    }

    /// Requests the public lobby list (§6.3).
    pub fn find_games(&mut self, map_mask: u8, impostors: u8, language: u32) -> Result<()> {
        if impostors > 3 {
            return Err(ErrorKind::InvalidImpostorCount(impostors).into());
        }
        self.send_reliable(vec![MatchMakingFrame::GetGameListV2Request(GetGameListV2Request {
            map_mask: MapSearchMask(map_mask),
            impostors,
            language,
        })])?;
        Ok(())
    }

    /// Sends a chat message as our avatar's `control` net-id (§6.3).
    pub fn send_chat(&mut self, message: &str) -> Result<()> {
        if self.state.spectator {
            return Err(ErrorKind::SpectatorMisuse.into());
        }
        let net_id = self.local_control_net_id()?;
        let game_id = self.state.game_id;
        self.send_reliable(vec![MatchMakingFrame::GameData {
            game_id,
            frames: vec![GameDataFrame::RpcFlag {
                net_id,
                rpc: RpcFrame::SendChat(message.to_owned()),
            }],
        }])?;
        Ok(())
    }

    /// Broadcasts a movement update as our avatar's `network` net-id,
    /// unreliable, per the teacher's "ordered-but-not-acked" movement
    /// path (§4.4/§9).
    pub fn move_avatar(&mut self, position: Vector2, velocity: Vector2) -> Result<()> {
        if self.state.spectator {
            return Err(ErrorKind::SpectatorMisuse.into());
        }
        let net_id = self.local_network_net_id()?;
        self.move_sequence = self.move_sequence.wrapping_add(1);
        let mut raw = Vec::new();
        raw.write_u16::<LittleEndian>(self.move_sequence)?;
        position.write(&mut raw)?;
        velocity.write(&mut raw)?;

        let game_id = self.state.game_id;
        self.send_unreliable(vec![MatchMakingFrame::GameData {
            game_id,
            frames: vec![GameDataFrame::DataFlag(DataFlagFrame { net_id, raw })],
        }])
    }

    fn local_control_net_id(&self) -> Result<u32> {
        self.state
            .local_player_id
            .and_then(|id| self.state.players.by_id(id))
            .and_then(|p| p.net_ids.control)
            .ok_or_else(|| ErrorKind::ProtocolDecode("local avatar not yet spawned").into())
    }

    fn local_network_net_id(&self) -> Result<u32> {
        self.state
            .local_player_id
            .and_then(|id| self.state.players.by_id(id))
            .and_then(|p| p.net_ids.network)
            .ok_or_else(|| ErrorKind::ProtocolDecode("local avatar not yet spawned").into())
    }

    /// Subscribes `handler` to every future event named `event_name`.
    pub fn subscribe(&self, event_name: &str, handler: crate::event::Handler) -> Result<()> {
        let kind = event_kind_from_name(event_name)
            .ok_or_else(|| ErrorKind::ProtocolDecode("unknown event name"))?;
        self.events.subscribe(kind, handler);
        Ok(())
    }

    /// Gracefully (`force=false`) or immediately (`force=true`) tears
    /// down the connection.
    pub fn disconnect(&mut self, force: bool) -> Result<()> {
        if !force {
            if let Some(t) = &self.transport {
                let _ = t.send(
                    OuterFrame::Disconnect {
                        body_present: true,
                        reason: Some(crate::protocol::DisconnectReason::ExitGame),
                        custom: None,
                    }
                    .encode()?,
                );
            }
        }
        self.waiters.cancel_all();
        self.transport = None;
        self.phase = Phase::Closed;
        Ok(())
    }

    /// Drives the session until it closes, processing inbound datagrams
    /// and reconnecting on a receive timeout, per §4.5/§5.
    pub fn run_until_closed(&mut self) -> Result<()> {
        loop {
            match self.phase {
                Phase::Closed => {
                    return match self.close_reason.take() {
                        Some(e) => Err(e),
                        None => Ok(()),
                    };
                }
                _ => {}
            }
            let event = self.transport.as_ref().unwrap().recv_event();
            match event {
                Ok(ReaderEvent::Datagram(data)) => {
                    if let Err(e) = self.handle_datagram(&data) {
                        warn!(self.logger, "dropping undecodable datagram"; "error" => %e);
                    }
                }
                Ok(ReaderEvent::Timeout) => {
                    let remote = self.remote;
                    self.reconnect(remote)?;
                }
                Err(_) => {
                    self.phase = Phase::Closed;
                    return Err(ErrorKind::ConnectionClosed.into());
                }
            }
        }
    }

    /// The session's current lifecycle phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// This client's assigned id, once known.
    pub fn client_id(&self) -> u32 {
        self.state.client_id
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_event_kind_from_name_covers_every_public_name() {
        for name in &[
            "ready", "game_join", "game_start", "game_end", "game_settings", "chat", "death",
            "player_kill", "player_move", "player_update", "players_update", "player_remove",
            "player_leave", "player_tasks_update", "player_vote", "attribute_update",
            "start_counter", "meeting_start", "meeting_stop", "voting_end", "vent_enter",
            "vent_exit", "vent_move", "button_press", "body_report", "name_update", "color_update",
        ] {
            assert!(event_kind_from_name(name).is_some(), "missing mapping for {}", name);
        }
        assert!(event_kind_from_name("not_a_real_event").is_none());
    }

    #[test]
    fn test_validate_lobby_code_accepts_six_letter_and_rejects_four_letter() {
        assert!(validate_lobby_code("ABCDEF").is_ok());
        assert!(validate_lobby_code("ABCD").is_err());
        assert!(validate_lobby_code("AB1DEF").is_err());
    }
}
