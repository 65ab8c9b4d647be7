//! Routes parsed frames to typed handlers that mutate the shared
//! game/player model and emit events (§4.6).

use crate::errors::*;
use crate::event::{Event, EventBus, InboundFrame, Waiters};
use crate::model::game::Game;
use crate::model::player::{NetIds, Player, PlayerList, PlayerStatus};
use crate::protocol::frame::{DataFlagPayload, GameDataFrame, MatchMakingFrame, RpcFrame};
use crate::protocol::tags::{ComponentRole, SpawnType, SpawnTypeOrRaw};
use fnv::FnvHashMap;
use slog::Logger;

/// The colour enumeration this crate validates `SetColor`/`CheckColor`
/// against. Cosmetic catalogues (hats/pets/skins) are live-ops content
/// that grows independently of the wire protocol, so only colour is
/// bounds-checked locally.
const MAX_COLOR_INDEX: u8 = 17;

/// The mutable game/player state a [`Dispatcher`] updates in place.
/// Owned by the session actor; the dispatcher never holds it across
/// calls.
pub struct SessionState {
    /// Current lobby/game settings
    pub game: Game,
    /// The player roster
    pub players: PlayerList,
    /// Net-id -> component role, learned from `PlayerControl` spawns
    pub net_id_roles: FnvHashMap<u32, ComponentRole>,
    /// This client's assigned id
    pub client_id: u32,
    /// The current host's client id
    pub host_id: u32,
    /// The joined game's id
    pub game_id: u32,
    /// This client's player-id, once its `PlayerControl` spawn arrives
    pub local_player_id: Option<u8>,
    /// Whether this session is a spectator
    pub spectator: bool,
}

impl SessionState {
    /// A freshly connected, not-yet-joined state.
    pub fn new() -> SessionState {
        SessionState {
            game: Game::default_template(),
            players: PlayerList::new(),
            net_id_roles: FnvHashMap::default(),
            client_id: 0,
            host_id: 0,
            game_id: 0,
            local_player_id: None,
            spectator: false,
        }
    }

    /// Whether `net_id` belongs to our own avatar's components.
    fn is_local_net_id(&self, net_id: u32) -> bool {
        self.local_player_id
            .and_then(|id| self.players.by_id(id))
            .map(|p| {
                p.net_ids.control == Some(net_id)
                    || p.net_ids.physics == Some(net_id)
                    || p.net_ids.network == Some(net_id)
            })
            .unwrap_or(false)
    }
}

impl Default for SessionState {
    fn default() -> SessionState {
        SessionState::new()
    }
}

/// Dispatches decoded matchmaking/game-data/RPC/spawn/data-flag frames
/// into [`SessionState`] mutations and [`Event`] emissions.
pub struct Dispatcher {
    logger: Logger,
}

impl Dispatcher {
    /// Creates a dispatcher logging through `logger`.
    pub fn new(logger: Logger) -> Dispatcher {
        Dispatcher { logger }
    }

    /// Dispatches every matchmaking-layer frame carried by one
    /// `Reliable`/`Unreliable` outer frame.
    pub fn dispatch(
        &self,
        state: &mut SessionState,
        events: &EventBus,
        waiters: &Waiters,
        frames: &[MatchMakingFrame],
    ) -> Result<()> {
        for frame in frames {
            self.dispatch_matchmaking(state, events, waiters, frame)?;
        }
        Ok(())
    }

    fn dispatch_matchmaking(
        &self,
        state: &mut SessionState,
        events: &EventBus,
        waiters: &Waiters,
        frame: &MatchMakingFrame,
    ) -> Result<()> {
        waiters.notify(&InboundFrame::MatchMaking(frame.clone()));

        let handled = match frame {
            MatchMakingFrame::JoinGameResponse(resp) => {
                use crate::protocol::messages::JoinGameResponse;
                if let JoinGameResponse::Success(s) = resp {
                    state.game_id = s.game_id;
                    state.host_id = s.host_id;
                }
                true
            }
            MatchMakingFrame::JoinedGame(j) => {
                state.game_id = j.game_id;
                state.client_id = j.client_id;
                state.host_id = j.host_id;
                true
            }
            MatchMakingFrame::AlterGame(a) => {
                state.game.public = a.is_public;
                true
            }
            MatchMakingFrame::RemovePlayer(p) => {
                state.host_id = p.host_id;
                if let Some(player) = state.players.remove(p.player_id as u8) {
                    events.emit(Event::PlayerRemove {
                        player_id: player.id,
                        reason: p.reason,
                    });
                }
                true
            }
            MatchMakingFrame::StartGame { game_id } if *game_id == state.game_id => {
                events.emit(Event::GameStart);
                true
            }
            MatchMakingFrame::EndGame { game_id, .. } if *game_id == state.game_id => {
                for player in state.players.iter().map(|p| p.id).collect::<Vec<_>>() {
                    if let Some(p) = state.players.by_id_mut(player) {
                        p.tasks.clear();
                    }
                }
                events.emit(Event::GameEnd);
                true
            }
            MatchMakingFrame::GameData { game_id, frames } if *game_id == state.game_id => {
                for f in frames {
                    self.dispatch_game_data(state, events, waiters, f)?;
                }
                true
            }
            MatchMakingFrame::GameDataTo { game_id, target, frames } if *game_id == state.game_id => {
                if *target == state.client_id {
                    for f in frames {
                        self.dispatch_game_data(state, events, waiters, f)?;
                    }
                }
                // silently dropped for other targets, per §4.6
                true
            }
            _ => false,
        };

        if !handled {
            warn!(self.logger, "unhandled matchmaking frame"; "frame" => ?frame);
        }
        Ok(())
    }

    fn dispatch_game_data(
        &self,
        state: &mut SessionState,
        events: &EventBus,
        waiters: &Waiters,
        frame: &GameDataFrame,
    ) -> Result<()> {
        waiters.notify(&InboundFrame::GameData(frame.clone()));

        let handled = match frame {
            GameDataFrame::RpcFlag { net_id, rpc } => self.dispatch_rpc(state, events, *net_id, rpc)?,
            GameDataFrame::SpawnFlag(spawn) => {
                self.dispatch_spawn(state, events, spawn)?;
                true
            }
            GameDataFrame::DespawnFlag { net_id } => {
                state.net_id_roles.remove(net_id);
                true
            }
            GameDataFrame::DataFlag(data_flag) => {
                if let Some(role) = state.net_id_roles.get(&data_flag.net_id).copied() {
                    if let Some(DataFlagPayload::Movement { sequence_id, position, velocity }) =
                        data_flag.resolve(role)?
                    {
                        if let Some(player) = state.players.by_net_id_mut(data_flag.net_id) {
                            if sequence_id > player.last_seen_seq {
                                player.last_seen_seq = sequence_id;
                                player.position = position;
                                player.velocity = velocity;
                                let player_id = player.id;
                                events.emit(Event::PlayerMove { player_id });
                            }
                        }
                    }
                }
                true
            }
            GameDataFrame::SceneChangeFlag(_) | GameDataFrame::ReadyFlag(_) => true,
            GameDataFrame::ChangeSettingsFlag(game) => {
                let public = state.game.public;
                state.game = game.clone();
                state.game.public = public;
                events.emit(Event::GameSettings(state.game.clone()));
                true
            }
            GameDataFrame::Unknown { .. } => false,
        };

        if !handled {
            warn!(self.logger, "unhandled game-data frame"; "frame" => ?frame);
        }
        Ok(())
    }

    fn dispatch_spawn(&self, state: &mut SessionState, events: &EventBus, spawn: &crate::protocol::frame::SpawnFrame) -> Result<()> {
        if let Some(info) = spawn.as_player_control() {
            state
                .net_id_roles
                .insert(info.control_net_id, ComponentRole::Control);
            state
                .net_id_roles
                .insert(info.physics_net_id, ComponentRole::Physics);
            state
                .net_id_roles
                .insert(info.network_net_id, ComponentRole::Network);

            let mut player = state
                .players
                .by_id(info.player_id)
                .cloned()
                .unwrap_or_else(|| Player::new(info.player_id, spawn.owner, String::new()));
            player.net_ids = NetIds {
                control: Some(info.control_net_id),
                physics: Some(info.physics_net_id),
                network: Some(info.network_net_id),
            };
            player.client_id = spawn.owner;
            state.players.upsert(player);

            if spawn.owner == state.client_id {
                state.local_player_id = Some(info.player_id);
            }
            events.emit(Event::PlayersUpdate);
            return Ok(());
        }

        if spawn.spawn_type == SpawnTypeOrRaw::Known(SpawnType::GameData) {
            if let Some(roster) = spawn.as_roster()? {
                state.players.expected_count = Some(roster.len());
                for entry in roster {
                    let mut player = Player::new(entry.player_id, 0, entry.name);
                    player.color = entry.color;
                    player.hat = entry.hat;
                    player.pet = entry.pet;
                    player.skin = entry.skin;
                    player.status = entry.status;
                    state.players.upsert(player);
                }
                events.emit(Event::PlayersUpdate);
            }
        }
        Ok(())
    }

    fn dispatch_rpc(&self, state: &mut SessionState, events: &EventBus, net_id: u32, rpc: &RpcFrame) -> Result<bool> {
        Ok(match rpc {
            RpcFrame::SyncSettings(game) => {
                let public = state.game.public;
                state.game = game.clone();
                state.game.public = public;
                events.emit(Event::GameSettings(state.game.clone()));
                true
            }
            RpcFrame::SetInfected(ids) => {
                for id in ids {
                    if let Some(p) = state.players.by_id_mut(*id) {
                        p.status |= PlayerStatus::IMPOSTOR.bits();
                    }
                    events.emit(Event::PlayerUpdate { player_id: *id });
                }
                true
            }
            RpcFrame::SetName(name) => {
                self.set_cosmetic(state, events, net_id, |p| p.name = name.clone());
                events.emit(Event::NameUpdate { name: name.clone() });
                true
            }
            RpcFrame::SetColor(color) => {
                if *color > MAX_COLOR_INDEX {
                    warn!(self.logger, "rejecting out-of-range color"; "color" => color);
                    return Ok(true);
                }
                self.set_cosmetic(state, events, net_id, |p| p.color = *color);
                events.emit(Event::ColorUpdate { color: *color });
                true
            }
            RpcFrame::SetHat(hat) => {
                self.set_cosmetic(state, events, net_id, |p| p.hat = *hat);
                true
            }
            RpcFrame::SetPet(pet) => {
                self.set_cosmetic(state, events, net_id, |p| p.pet = *pet);
                true
            }
            RpcFrame::SetSkin(skin) => {
                self.set_cosmetic(state, events, net_id, |p| p.skin = *skin);
                true
            }
            RpcFrame::ReportDeadBody(player_id) => {
                events.emit(Event::BodyReport { player_id: *player_id });
                true
            }
            RpcFrame::MurderPlayer { victim_net_id } => {
                if state.is_local_net_id(*victim_net_id) {
                    let impostor = state
                        .local_player_id
                        .and_then(|id| state.players.by_id(id))
                        .map(|p| p.is_impostor())
                        .unwrap_or(false);
                    events.emit(Event::Death { impostor });
                } else if let Some(victim) = state.players.by_net_id_mut(*victim_net_id) {
                    victim.status |= PlayerStatus::DEAD.bits();
                    victim.death_position = Some(victim.position);
                    let victim_id = victim.id;
                    let impostor = state
                        .local_player_id
                        .and_then(|id| state.players.by_id(id))
                        .map(|p| p.is_impostor())
                        .unwrap_or(false);
                    events.emit(Event::PlayerKill { impostor, victim_id });
                }
                true
            }
            RpcFrame::SendChat(message) => {
                let player_id = state
                    .players
                    .by_net_id(net_id)
                    .map(|p| p.id)
                    .unwrap_or(0xFF);
                events.emit(Event::Chat { player_id, message: message.clone() });
                true
            }
            RpcFrame::StartMeeting(_) => {
                events.emit(Event::MeetingStart);
                true
            }
            RpcFrame::SetStartCounter { seconds_left, .. } => {
                if *seconds_left < 0xFF {
                    events.emit(Event::StartCounter { seconds_left: *seconds_left });
                }
                true
            }
            RpcFrame::EnterVent(vent_net_id) => {
                events.emit(Event::VentEnter { net_id: *vent_net_id });
                true
            }
            RpcFrame::ExitVent(vent_net_id) => {
                events.emit(Event::VentExit { net_id: *vent_net_id });
                true
            }
            RpcFrame::Close => {
                events.emit(Event::MeetingStop);
                true
            }
            RpcFrame::VotingComplete(_) => {
                events.emit(Event::VotingEnd);
                true
            }
            RpcFrame::SetTasks(task_ids) => {
                if let Some(player) = state.players.by_net_id_mut(net_id) {
                    player.tasks = task_ids
                        .iter()
                        .map(|&task_id| crate::model::player::TaskState { task_id, complete: false })
                        .collect();
                    let player_id = player.id;
                    events.emit(Event::PlayerTasksUpdate { player_id });
                }
                true
            }
            RpcFrame::CheckName(_)
            | RpcFrame::CheckColor(_)
            | RpcFrame::SnapTo { .. }
            | RpcFrame::SendChatNote(_)
            | RpcFrame::UpdateGameData(_) => true,
        })
    }

    fn set_cosmetic<F: FnOnce(&mut Player)>(&self, state: &mut SessionState, events: &EventBus, net_id: u32, apply: F) {
        if state.is_local_net_id(net_id) {
            if let Some(id) = state.local_player_id {
                if let Some(p) = state.players.by_id_mut(id) {
                    apply(p);
                }
            }
            events.emit(Event::AttributeUpdate);
        } else if let Some(p) = state.players.by_net_id_mut(net_id) {
            apply(p);
            let player_id = p.id;
            events.emit(Event::PlayerUpdate { player_id });
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::model::player::NetIds;
    use slog::{Discard, Logger};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn test_logger() -> Logger {
        Logger::root(Discard, o!())
    }

    #[test]
    fn test_player_control_spawn_assigns_local_player_id() {
        let dispatcher = Dispatcher::new(test_logger());
        let events = EventBus::new();
        let waiters = Waiters::new();
        let mut state = SessionState::new();
        state.client_id = 7;

        let mut component0 = vec![1u8, 3u8]; // is_new=true, player_id=3
        component0.extend_from_slice(&[]);
        let spawn = crate::protocol::frame::SpawnFrame {
            spawn_type: SpawnTypeOrRaw::Known(SpawnType::PlayerControl),
            owner: 7,
            flags: 0,
            components: vec![
                crate::protocol::frame::SpawnComponent { net_id: 10, data: component0 },
                crate::protocol::frame::SpawnComponent { net_id: 11, data: vec![] },
                crate::protocol::frame::SpawnComponent { net_id: 12, data: vec![] },
            ],
        };

        dispatcher
            .dispatch_game_data(&mut state, &events, &waiters, &GameDataFrame::SpawnFlag(spawn))
            .unwrap();

        assert_eq!(state.local_player_id, Some(3));
        assert_eq!(state.net_id_roles.get(&12), Some(&ComponentRole::Network));
        let player = state.players.by_id(3).unwrap();
        assert_eq!(player.net_ids, NetIds { control: Some(10), physics: Some(11), network: Some(12) });
    }

    #[test]
    fn test_murder_of_other_player_marks_dead_and_emits_kill() {
        let dispatcher = Dispatcher::new(test_logger());
        let events = EventBus::new();
        let waiters = Waiters::new();
        let mut state = SessionState::new();

        let mut victim = Player::new(2, 99, "Victim".into());
        victim.net_ids = NetIds { control: Some(20), physics: Some(21), network: Some(22) };
        state.players.upsert(victim);

        let hits = Arc::new(AtomicUsize::new(0));
        let h = hits.clone();
        events.subscribe(
            crate::event::EventKind::PlayerKill,
            Box::new(move |_| {
                h.fetch_add(1, Ordering::SeqCst);
            }),
        );

        dispatcher
            .dispatch_rpc(&mut state, &events, 1, &RpcFrame::MurderPlayer { victim_net_id: 21 })
            .unwrap();

        assert_eq!(hits.load(Ordering::SeqCst), 1);
        let victim = state.players.by_id(2).unwrap();
        assert!(victim.is_dead());
    }

    #[test]
    fn test_set_color_rejects_out_of_range() {
        let dispatcher = Dispatcher::new(test_logger());
        let events = EventBus::new();
        let mut state = SessionState::new();
        let mut p = Player::new(1, 5, "A".into());
        p.net_ids = NetIds { control: Some(1), physics: Some(2), network: Some(3) };
        state.players.upsert(p);

        dispatcher.dispatch_rpc(&mut state, &events, 1, &RpcFrame::SetColor(200)).unwrap();
        assert_eq!(state.players.by_id(1).unwrap().color, 0);
    }
}
