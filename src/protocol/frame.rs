//! The recursive frame tree and its tag-dispatched encoder/decoder
//! (§4.2). `Frame` here is a family of concrete sum types — one per
//! nesting layer — rather than a single node type with a back-pointer
//! and a bag of fields; see the design notes in SPEC_FULL.md §9.

use crate::bytes::*;
use crate::errors::*;
use crate::protocol::messages::*;
use crate::protocol::tags::*;
use crate::model::game::Game;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Cursor, Read, Write};

/// Reads one nested message header (`u16 size | u8 tag`) and returns
/// the tag plus a cursor scoped to exactly `size` bytes. The caller's
/// cursor is advanced past the payload regardless of whether the
/// payload is fully consumed, so a decoder can never read past what
/// the length field announced.
fn read_nested(r: &mut Cursor<Vec<u8>>) -> Result<(u8, Cursor<Vec<u8>>)> {
    let size = r.read_u16::<LittleEndian>()? as usize;
    let tag = r.read_u8()?;
    let pos = r.position() as usize;
    let buf = r.get_ref();
    if pos + size > buf.len() {
        return Err(ErrorKind::FrameTooShort.into());
    }
    let body = buf[pos..pos + size].to_vec();
    r.set_position((pos + size) as u64);
    Ok((tag, Cursor::new(body)))
}

/// Writes one nested message: `u16 size | u8 tag | payload`.
fn write_nested<W: Write>(w: &mut W, tag: u8, payload: &[u8]) -> io::Result<()> {
    w.write_u16::<LittleEndian>(payload.len() as u16)?;
    w.write_u8(tag)?;
    w.write_all(payload)
}

fn remaining(c: &Cursor<Vec<u8>>) -> &[u8] {
    let pos = c.position() as usize;
    &c.get_ref()[pos..]
}

/// An RPC's decoded body, nested inside [`GameDataFrame::RpcFlag`].
#[derive(Debug, Clone, PartialEq)]
pub enum RpcFrame {
    /// Replace the game's settings
    SyncSettings(Game),
    /// Mark player-ids as impostor
    SetInfected(Vec<u8>),
    /// Candidate name to validate
    CheckName(String),
    /// Server-assigned name
    SetName(String),
    /// Candidate color to validate
    CheckColor(u8),
    /// Server-assigned color
    SetColor(u8),
    /// Server-assigned hat
    SetHat(u32),
    /// Server-assigned pet
    SetPet(u32),
    /// Server-assigned skin
    SetSkin(u32),
    /// A dead body was reported, carrying the victim's player-id (or
    /// `None` for a self-report with no specific body)
    ReportDeadBody(Option<u8>),
    /// A player was murdered, carrying the victim's net-id
    MurderPlayer {
        /// The victim's network net-id
        victim_net_id: u32,
    },
    /// A chat message
    SendChat(String),
    /// A meeting/emergency started, carrying the reporter's player-id
    StartMeeting(Option<u8>),
    /// Sets the meeting start counter
    SetStartCounter {
        /// Sequence id, to discard stale updates
        sequence_id: u8,
        /// Seconds left; `0xFF` means "no counter"
        seconds_left: u8,
    },
    /// Entered the vent with this id
    EnterVent(u32),
    /// Exited the vent with this id
    ExitVent(u32),
    /// Anti-cheat position reconciliation
    SnapTo {
        /// The corrected position
        position: Vector2,
        /// The movement sequence id this correction applies from
        sequence_id: u16,
    },
    /// Closes the current meeting UI
    Close,
    /// The vote is complete; payload kept raw, not interpreted by the core
    VotingComplete(Vec<u8>),
    /// A non-verbal chat note; payload kept raw
    SendChatNote(Vec<u8>),
    /// Updated task list for a player
    SetTasks(Vec<u32>),
    /// Opaque data, applied only after a spectator reconnect (§9.ii)
    UpdateGameData(Vec<u8>),
}

impl RpcFrame {
    fn decode(tag: RpcTag, r: &mut Cursor<Vec<u8>>) -> Result<RpcFrame> {
        Ok(match tag {
            RpcTag::SyncSettings => RpcFrame::SyncSettings(Game::deserialize(r)?),
            RpcTag::SetInfected => {
                let count = r.read_u8()? as usize;
                let mut ids = Vec::with_capacity(count);
                for _ in 0..count {
                    ids.push(r.read_u8()?);
                }
                RpcFrame::SetInfected(ids)
            }
            RpcTag::CheckName => RpcFrame::CheckName(read_string(r)?),
            RpcTag::SetName => RpcFrame::SetName(read_string(r)?),
            RpcTag::CheckColor => RpcFrame::CheckColor(r.read_u8()?),
            RpcTag::SetColor => RpcFrame::SetColor(r.read_u8()?),
            RpcTag::SetHat => RpcFrame::SetHat(read_packed(r)?),
            RpcTag::SetPet => RpcFrame::SetPet(read_packed(r)?),
            RpcTag::SetSkin => RpcFrame::SetSkin(read_packed(r)?),
            RpcTag::ReportDeadBody => {
                let id = r.read_u8()?;
                RpcFrame::ReportDeadBody(if id == 0xFF { None } else { Some(id) })
            }
            RpcTag::MurderPlayer => RpcFrame::MurderPlayer {
                victim_net_id: read_packed(r)?,
            },
            RpcTag::SendChat => RpcFrame::SendChat(read_string(r)?),
            RpcTag::StartMeeting => {
                let id = r.read_u8()?;
                RpcFrame::StartMeeting(if id == 0xFF { None } else { Some(id) })
            }
            RpcTag::SetStartCounter => RpcFrame::SetStartCounter {
                sequence_id: r.read_u8()?,
                seconds_left: r.read_u8()?,
            },
            RpcTag::EnterVent => RpcFrame::EnterVent(read_packed(r)?),
            RpcTag::ExitVent => RpcFrame::ExitVent(read_packed(r)?),
            RpcTag::SnapTo => {
                let position = Vector2::read(r)?;
                let sequence_id = r.read_u16::<LittleEndian>()?;
                RpcFrame::SnapTo { position, sequence_id }
            }
            RpcTag::Close => RpcFrame::Close,
            RpcTag::VotingComplete => {
                let mut raw = Vec::new();
                r.read_to_end(&mut raw)?;
                RpcFrame::VotingComplete(raw)
            }
            RpcTag::SendChatNote => {
                let mut raw = Vec::new();
                r.read_to_end(&mut raw)?;
                RpcFrame::SendChatNote(raw)
            }
            RpcTag::SetTasks => {
                let count = read_packed(r)? as usize;
                let mut tasks = Vec::with_capacity(count);
                for _ in 0..count {
                    tasks.push(read_packed(r)?);
                }
                RpcFrame::SetTasks(tasks)
            }
            RpcTag::UpdateGameData => {
                let mut raw = Vec::new();
                r.read_to_end(&mut raw)?;
                RpcFrame::UpdateGameData(raw)
            }
        })
    }

    fn tag(&self) -> RpcTag {
        match self {
            RpcFrame::SyncSettings(_) => RpcTag::SyncSettings,
            RpcFrame::SetInfected(_) => RpcTag::SetInfected,
            RpcFrame::CheckName(_) => RpcTag::CheckName,
            RpcFrame::SetName(_) => RpcTag::SetName,
            RpcFrame::CheckColor(_) => RpcTag::CheckColor,
            RpcFrame::SetColor(_) => RpcTag::SetColor,
            RpcFrame::SetHat(_) => RpcTag::SetHat,
            RpcFrame::SetPet(_) => RpcTag::SetPet,
            RpcFrame::SetSkin(_) => RpcTag::SetSkin,
            RpcFrame::ReportDeadBody(_) => RpcTag::ReportDeadBody,
            RpcFrame::MurderPlayer { .. } => RpcTag::MurderPlayer,
            RpcFrame::SendChat(_) => RpcTag::SendChat,
            RpcFrame::StartMeeting(_) => RpcTag::StartMeeting,
            RpcFrame::SetStartCounter { .. } => RpcTag::SetStartCounter,
            RpcFrame::EnterVent(_) => RpcTag::EnterVent,
            RpcFrame::ExitVent(_) => RpcTag::ExitVent,
            RpcFrame::SnapTo { .. } => RpcTag::SnapTo,
            RpcFrame::Close => RpcTag::Close,
            RpcFrame::VotingComplete(_) => RpcTag::VotingComplete,
            RpcFrame::SendChatNote(_) => RpcTag::SendChatNote,
            RpcFrame::SetTasks(_) => RpcTag::SetTasks,
            RpcFrame::UpdateGameData(_) => RpcTag::UpdateGameData,
        }
    }

    fn encode(&self) -> io::Result<Vec<u8>> {
        let mut buf = Vec::new();
        match self {
            RpcFrame::SyncSettings(game) => game.serialize(&mut buf)?,
            RpcFrame::SetInfected(ids) => {
                buf.write_u8(ids.len() as u8)?;
                for id in ids {
                    buf.write_u8(*id)?;
                }
            }
            RpcFrame::CheckName(s) | RpcFrame::SetName(s) | RpcFrame::SendChat(s) => {
                write_string(&mut buf, s)?
            }
            RpcFrame::CheckColor(c) | RpcFrame::SetColor(c) => buf.write_u8(*c)?,
            RpcFrame::SetHat(v) | RpcFrame::SetPet(v) | RpcFrame::SetSkin(v) => {
                write_packed(&mut buf, *v)?
            }
            RpcFrame::ReportDeadBody(id) => buf.write_u8(id.unwrap_or(0xFF))?,
            RpcFrame::MurderPlayer { victim_net_id } => write_packed(&mut buf, *victim_net_id)?,
            RpcFrame::StartMeeting(id) => buf.write_u8(id.unwrap_or(0xFF))?,
            RpcFrame::SetStartCounter { sequence_id, seconds_left } => {
                buf.write_u8(*sequence_id)?;
                buf.write_u8(*seconds_left)?;
            }
            RpcFrame::EnterVent(id) | RpcFrame::ExitVent(id) => write_packed(&mut buf, *id)?,
            RpcFrame::SnapTo { position, sequence_id } => {
                position.write(&mut buf)?;
                buf.write_u16::<LittleEndian>(*sequence_id)?;
            }
            RpcFrame::Close => {}
            RpcFrame::VotingComplete(raw) | RpcFrame::SendChatNote(raw) | RpcFrame::UpdateGameData(raw) => {
                buf.extend_from_slice(raw)
            }
            RpcFrame::SetTasks(tasks) => {
                write_packed(&mut buf, tasks.len() as u32)?;
                for t in tasks {
                    write_packed(&mut buf, *t)?;
                }
            }
        }
        Ok(buf)
    }
}

/// One net-id-addressed component block inside a [`SpawnFrame`].
#[derive(Debug, Clone, PartialEq)]
pub struct SpawnComponent {
    /// The net-id assigned to this component
    pub net_id: u32,
    /// The component's raw data, interpreted per spawn type
    pub data: Vec<u8>,
}

/// A `SpawnFlag` message: a new game object and its component net-ids.
#[derive(Debug, Clone, PartialEq)]
pub struct SpawnFrame {
    /// The kind of object spawned
    pub spawn_type: SpawnTypeOrRaw,
    /// The owning client (or `u32::max_value()` for global objects)
    pub owner: u32,
    /// Spawn flags bitfield (e.g. "spawned by host")
    pub flags: u8,
    /// Each component, in spawn order
    pub components: Vec<SpawnComponent>,
}

/// A spawn type, falling back to the raw wire value when unrecognised
/// rather than failing the whole decode (unknown spawn types are
/// common across client versions).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpawnTypeOrRaw {
    /// A recognised spawn type
    Known(SpawnType),
    /// An unrecognised spawn type, kept by its raw wire value
    Raw(u32),
}

/// The player-id and three net-ids declared by a `PlayerControl` spawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayerControlInfo {
    /// Whether the server considers this a new (not rejoining) player
    pub is_new: bool,
    /// The player's stable short id
    pub player_id: u8,
    /// The control component's net-id
    pub control_net_id: u32,
    /// The physics component's net-id
    pub physics_net_id: u32,
    /// The network-sync component's net-id
    pub network_net_id: u32,
}

impl SpawnFrame {
    fn decode(r: &mut Cursor<Vec<u8>>) -> Result<SpawnFrame> {
        let spawn_type_raw = read_packed(r)?;
        let spawn_type = match SpawnType::from_tag(spawn_type_raw) {
            Some(t) => SpawnTypeOrRaw::Known(t),
            None => SpawnTypeOrRaw::Raw(spawn_type_raw),
        };
        let owner = read_packed(r)?;
        let flags = r.read_u8()?;
        let component_count = read_packed(r)? as usize;
        let mut components = Vec::with_capacity(component_count);
        for _ in 0..component_count {
            let net_id = read_packed(r)?;
            let len = r.read_u16::<LittleEndian>()? as usize;
            let mut data = vec![0u8; len];
            r.read_exact(&mut data)?;
            components.push(SpawnComponent { net_id, data });
        }
        Ok(SpawnFrame {
            spawn_type,
            owner,
            flags,
            components,
        })
    }

    fn encode(&self) -> io::Result<Vec<u8>> {
        let mut buf = Vec::new();
        let raw_type = match self.spawn_type {
            SpawnTypeOrRaw::Known(t) => t.tag(),
            SpawnTypeOrRaw::Raw(v) => v,
        };
        write_packed(&mut buf, raw_type)?;
        write_packed(&mut buf, self.owner)?;
        buf.write_u8(self.flags)?;
        write_packed(&mut buf, self.components.len() as u32)?;
        for c in &self.components {
            write_packed(&mut buf, c.net_id)?;
            buf.write_u16::<LittleEndian>(c.data.len() as u16)?;
            buf.write_all(&c.data)?;
        }
        Ok(buf)
    }

    /// If this is a `PlayerControl` spawn with exactly the three
    /// expected components, extracts the player-id and net-ids.
    pub fn as_player_control(&self) -> Option<PlayerControlInfo> {
        if self.spawn_type != SpawnTypeOrRaw::Known(SpawnType::PlayerControl) {
            return None;
        }
        if self.components.len() != 3 {
            return None;
        }
        let mut cur = Cursor::new(&self.components[0].data[..]);
        let is_new = cur.read_u8().ok()? != 0;
        let player_id = cur.read_u8().ok()?;
        Some(PlayerControlInfo {
            is_new,
            player_id,
            control_net_id: self.components[0].net_id,
            physics_net_id: self.components[1].net_id,
            network_net_id: self.components[2].net_id,
        })
    }

    /// If this is a `GameData` spawn, decodes the initial player roster
    /// carried by its first component.
    pub fn as_roster(&self) -> Result<Option<Vec<RosterEntry>>> {
        if self.spawn_type != SpawnTypeOrRaw::Known(SpawnType::GameData) {
            return Ok(None);
        }
        let component = match self.components.first() {
            Some(c) => c,
            None => return Ok(None),
        };
        let mut cur = Cursor::new(&component.data[..]);
        let count = cur.read_u8()? as usize;
        let mut roster = Vec::with_capacity(count);
        for _ in 0..count {
            roster.push(RosterEntry::read(&mut cur)?);
        }
        Ok(Some(roster))
    }
}

/// A `DataFlag`'s sub-payload, resolved once the owning net-id's
/// component role is known (§4.4 "data-flag resolution"). Today only
/// `Network` carries a meaning the core understands.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DataFlagPayload {
    /// A movement update
    Movement {
        /// Sequence id; a later update with a lower id is discarded
        sequence_id: u16,
        /// The new position
        position: Vector2,
        /// The new velocity
        velocity: Vector2,
    },
}

/// An unresolved `DataFlag` frame: carries its net-id and raw payload
/// until the dispatcher can supply the net-id's role.
#[derive(Debug, Clone, PartialEq)]
pub struct DataFlagFrame {
    /// The net-id this update targets
    pub net_id: u32,
    /// The undecoded payload
    pub raw: Vec<u8>,
}

impl DataFlagFrame {
    fn decode(r: &mut Cursor<Vec<u8>>) -> Result<DataFlagFrame> {
        let net_id = read_packed(r)?;
        let mut raw = Vec::new();
        r.read_to_end(&mut raw)?;
        Ok(DataFlagFrame { net_id, raw })
    }

    fn encode(&self) -> io::Result<Vec<u8>> {
        let mut buf = Vec::new();
        write_packed(&mut buf, self.net_id)?;
        buf.extend_from_slice(&self.raw);
        Ok(buf)
    }

    /// Resolves this frame's payload now that `role` is known. Only
    /// `Network` is meaningful today; every other role decodes to
    /// `None` rather than erroring, since the core doesn't need to
    /// understand ship-status/meeting-hud data flags to stay correct.
    pub fn resolve(&self, role: ComponentRole) -> Result<Option<DataFlagPayload>> {
        match role {
            ComponentRole::Network => {
                let mut cur = Cursor::new(&self.raw[..]);
                let sequence_id = cur.read_u16::<LittleEndian>()?;
                let position = Vector2::read(&mut cur)?;
                let velocity = Vector2::read(&mut cur)?;
                Ok(Some(DataFlagPayload::Movement {
                    sequence_id,
                    position,
                    velocity,
                }))
            }
            ComponentRole::Control | ComponentRole::Physics => Ok(None),
        }
    }
}

/// A message nested inside `GameData`/`GameDataTo` (§6.1 "GameData tags").
#[derive(Debug, Clone, PartialEq)]
pub enum GameDataFrame {
    /// A per-component update, not yet resolved to a concrete payload
    DataFlag(DataFlagFrame),
    /// An RPC call targeted at a net-id
    RpcFlag {
        /// The target net-id
        net_id: u32,
        /// The RPC body
        rpc: RpcFrame,
    },
    /// A new object was spawned
    SpawnFlag(SpawnFrame),
    /// An object was despawned
    DespawnFlag {
        /// The despawned object's net-id
        net_id: u32,
    },
    /// The client changed scene
    SceneChangeFlag(SceneChange),
    /// A client marked itself ready
    ReadyFlag(ReadyFlag),
    /// Updated settings
    ChangeSettingsFlag(Game),
    /// An unrecognised tag; its bytes are preserved and skipped safely
    Unknown {
        /// The unrecognised wire tag
        tag: u8,
        /// Its undecoded payload
        data: Vec<u8>,
    },
}

impl GameDataFrame {
    fn decode(tag: u8, mut body: Cursor<Vec<u8>>) -> Result<GameDataFrame> {
        Ok(match GameDataTag::from_tag(tag) {
            Some(GameDataTag::DataFlag) => GameDataFrame::DataFlag(DataFlagFrame::decode(&mut body)?),
            Some(GameDataTag::RpcFlag) => {
                let net_id = read_packed(&mut body)?;
                let rpc_tag = body.read_u8()?;
                let rpc = match RpcTag::from_tag(rpc_tag) {
                    Some(t) => RpcFrame::decode(t, &mut body)?,
                    None => {
                        let mut raw = Vec::new();
                        body.read_to_end(&mut raw)?;
                        return Ok(GameDataFrame::Unknown { tag, data: raw });
                    }
                };
                GameDataFrame::RpcFlag { net_id, rpc }
            }
            Some(GameDataTag::SpawnFlag) => GameDataFrame::SpawnFlag(SpawnFrame::decode(&mut body)?),
            Some(GameDataTag::DespawnFlag) => GameDataFrame::DespawnFlag {
                net_id: read_packed(&mut body)?,
            },
            Some(GameDataTag::SceneChangeFlag) => {
                GameDataFrame::SceneChangeFlag(SceneChange::read(&mut body)?)
            }
            Some(GameDataTag::ReadyFlag) => GameDataFrame::ReadyFlag(ReadyFlag::read(&mut body)?),
            Some(GameDataTag::ChangeSettingsFlag) => {
                GameDataFrame::ChangeSettingsFlag(Game::deserialize(&mut body)?)
            }
            None => {
                let mut raw = Vec::new();
                body.read_to_end(&mut raw)?;
                GameDataFrame::Unknown { tag, data: raw }
            }
        })
    }

    fn encode(&self) -> Result<(u8, Vec<u8>)> {
        Ok(match self {
            GameDataFrame::DataFlag(f) => (GameDataTag::DataFlag.tag(), f.encode()?),
            GameDataFrame::RpcFlag { net_id, rpc } => {
                let mut buf = Vec::new();
                write_packed(&mut buf, *net_id)?;
                buf.write_u8(rpc.tag().tag())?;
                buf.extend_from_slice(&rpc.encode()?);
                (GameDataTag::RpcFlag.tag(), buf)
            }
            GameDataFrame::SpawnFlag(f) => (GameDataTag::SpawnFlag.tag(), f.encode()?),
            GameDataFrame::DespawnFlag { net_id } => {
                let mut buf = Vec::new();
                write_packed(&mut buf, *net_id)?;
                (GameDataTag::DespawnFlag.tag(), buf)
            }
            GameDataFrame::SceneChangeFlag(f) => {
                let mut buf = Vec::new();
                f.write(&mut buf)?;
                (GameDataTag::SceneChangeFlag.tag(), buf)
            }
            GameDataFrame::ReadyFlag(f) => {
                let mut buf = Vec::new();
                f.write(&mut buf)?;
                (GameDataTag::ReadyFlag.tag(), buf)
            }
            GameDataFrame::ChangeSettingsFlag(g) => {
                let mut buf = Vec::new();
                g.serialize(&mut buf)?;
                (GameDataTag::ChangeSettingsFlag.tag(), buf)
            }
            GameDataFrame::Unknown { tag, data } => (*tag, data.clone()),
        })
    }
}

/// A message nested directly under `Reliable`/`Unreliable` (§6.1
/// "Matchmaking tags").
#[derive(Debug, Clone, PartialEq)]
pub enum MatchMakingFrame {
    /// Host a new game; payload kept raw (not detailed by this crate's scope)
    HostGame(Vec<u8>),
    /// Join a game by lobby code
    JoinGameRequest(JoinGameRequest),
    /// The server's response to a join request
    JoinGameResponse(JoinGameResponse),
    /// The host started the game
    StartGame {
        /// The game being started
        game_id: u32,
    },
    /// A hosted game was removed
    RemoveGame {
        /// The removed game
        game_id: u32,
    },
    /// A player was removed
    RemovePlayer(RemovePlayer),
    /// Carries nested game-data frames for every client
    GameData {
        /// The game these frames belong to
        game_id: u32,
        /// The nested frames
        frames: Vec<GameDataFrame>,
    },
    /// Carries nested game-data frames for one target client
    GameDataTo {
        /// The game these frames belong to
        game_id: u32,
        /// The targeted client
        target: u32,
        /// The nested frames
        frames: Vec<GameDataFrame>,
    },
    /// Confirms a successful join, with the full roster of ids
    JoinedGame(JoinedGame),
    /// The game ended
    EndGame {
        /// The game that ended
        game_id: u32,
        /// Why it ended
        reason: u8,
    },
    /// Request the (legacy) public game list; payload kept raw
    GetGameList(Vec<u8>),
    /// Toggle a game's public/private visibility
    AlterGame(AlterGame),
    /// A player was kicked
    KickPlayer {
        /// The game the player is in
        game_id: u32,
        /// The kicked player
        player_id: u32,
        /// Whether this is a ban
        ban: bool,
    },
    /// Client must wait for the host
    WaitForHost {
        /// The game being waited on
        game_id: u32,
        /// The waiting client
        client_id: u32,
    },
    /// Redirect to a different server
    Redirect(Redirect),
    /// Ask the client to reselect a region/server; payload kept raw
    ReselectServer(Vec<u8>),
    /// Request the public game list
    GetGameListV2Request(GetGameListV2Request),
    /// The public game list response
    GetGameListV2Response(GetGameListV2Response),
    /// An unrecognised tag; its bytes are preserved and skipped safely
    Unknown {
        /// The unrecognised wire tag
        tag: u8,
        /// Its undecoded payload
        data: Vec<u8>,
    },
}

fn decode_game_data_frames(r: &mut Cursor<Vec<u8>>) -> Result<Vec<GameDataFrame>> {
    let mut frames = Vec::new();
    while !remaining(r).is_empty() {
        let (tag, body) = read_nested(r)?;
        frames.push(GameDataFrame::decode(tag, body)?);
    }
    Ok(frames)
}

impl MatchMakingFrame {
    fn decode(tag: u8, mut body: Cursor<Vec<u8>>) -> Result<MatchMakingFrame> {
        Ok(match MatchMakingTag::from_tag(tag) {
            Some(MatchMakingTag::HostGame) => {
                let mut raw = Vec::new();
                body.read_to_end(&mut raw)?;
                MatchMakingFrame::HostGame(raw)
            }
            Some(MatchMakingTag::JoinGame) => {
                // The server's success/failure response and the client's
                // request share a tag; try the response shape first since
                // it's unambiguous (first 4 bytes + either 8 more or a string).
                let mut raw = Vec::new();
                body.read_to_end(&mut raw)?;
                if raw.len() == 5 {
                    let mut cur = Cursor::new(&raw[..]);
                    MatchMakingFrame::JoinGameRequest(JoinGameRequest::read(&mut cur)?)
                } else {
                    let mut cur = Cursor::new(&raw[..]);
                    MatchMakingFrame::JoinGameResponse(JoinGameResponse::read(&mut cur)?)
                }
            }
            Some(MatchMakingTag::StartGame) => MatchMakingFrame::StartGame {
                game_id: body.read_u32::<LittleEndian>()?,
            },
            Some(MatchMakingTag::RemoveGame) => MatchMakingFrame::RemoveGame {
                game_id: body.read_u32::<LittleEndian>()?,
            },
            Some(MatchMakingTag::RemovePlayer) => {
                MatchMakingFrame::RemovePlayer(RemovePlayer::read(&mut body)?)
            }
            Some(MatchMakingTag::GameData) => {
                let game_id = body.read_u32::<LittleEndian>()?;
                let frames = decode_game_data_frames(&mut body)?;
                MatchMakingFrame::GameData { game_id, frames }
            }
            Some(MatchMakingTag::GameDataTo) => {
                let game_id = body.read_u32::<LittleEndian>()?;
                let target = read_packed(&mut body)?;
                let frames = decode_game_data_frames(&mut body)?;
                MatchMakingFrame::GameDataTo { game_id, target, frames }
            }
            Some(MatchMakingTag::JoinedGame) => {
                MatchMakingFrame::JoinedGame(JoinedGame::read(&mut body)?)
            }
            Some(MatchMakingTag::EndGame) => MatchMakingFrame::EndGame {
                game_id: body.read_u32::<LittleEndian>()?,
                reason: body.read_u8()?,
            },
            Some(MatchMakingTag::GetGameList) => {
                let mut raw = Vec::new();
                body.read_to_end(&mut raw)?;
                MatchMakingFrame::GetGameList(raw)
            }
            Some(MatchMakingTag::AlterGame) => MatchMakingFrame::AlterGame(AlterGame::read(&mut body)?),
            Some(MatchMakingTag::KickPlayer) => MatchMakingFrame::KickPlayer {
                game_id: body.read_u32::<LittleEndian>()?,
                player_id: body.read_u32::<LittleEndian>()?,
                ban: body.read_u8()? != 0,
            },
            Some(MatchMakingTag::WaitForHost) => MatchMakingFrame::WaitForHost {
                game_id: body.read_u32::<LittleEndian>()?,
                client_id: body.read_u32::<LittleEndian>()?,
            },
            Some(MatchMakingTag::Redirect) => MatchMakingFrame::Redirect(Redirect::read(&mut body)?),
            Some(MatchMakingTag::ReselectServer) => {
                let mut raw = Vec::new();
                body.read_to_end(&mut raw)?;
                MatchMakingFrame::ReselectServer(raw)
            }
            Some(MatchMakingTag::GetGameListV2) => {
                // The request is a fixed 6-byte body; the response nests
                // two length-prefixed blocks (counts, then games), so the
                // two shapes never collide on size.
                if remaining(&body).len() == 6 {
                    MatchMakingFrame::GetGameListV2Request(GetGameListV2Request::read(&mut body)?)
                } else {
                    let (_tag, mut counts_cur) = read_nested(&mut body)?;
                    let counts = GameCounts::read(&mut counts_cur)?;
                    let (_tag, mut games_cur) = read_nested(&mut body)?;
                    let mut games = Vec::new();
                    while !remaining(&games_cur).is_empty() {
                        games.push(GameListing::read(&mut games_cur)?);
                    }
                    MatchMakingFrame::GetGameListV2Response(GetGameListV2Response { counts, games })
                }
            }
            None => {
                let mut raw = Vec::new();
                body.read_to_end(&mut raw)?;
                MatchMakingFrame::Unknown { tag, data: raw }
            }
        })
    }

    fn encode(&self) -> Result<(u8, Vec<u8>)> {
        Ok(match self {
            MatchMakingFrame::HostGame(raw) => (MatchMakingTag::HostGame.tag(), raw.clone()),
            MatchMakingFrame::JoinGameRequest(req) => {
                let mut buf = Vec::new();
                req.write(&mut buf)?;
                (MatchMakingTag::JoinGame.tag(), buf)
            }
            MatchMakingFrame::JoinGameResponse(resp) => {
                let mut buf = Vec::new();
                match resp {
                    JoinGameResponse::Success(s) => {
                        buf.write_u32::<LittleEndian>(s.game_id)?;
                        buf.write_u32::<LittleEndian>(s.player_id)?;
                        buf.write_u32::<LittleEndian>(s.host_id)?;
                    }
                    JoinGameResponse::Failure { reason, custom } => {
                        buf.write_u32::<LittleEndian>(u32::from(reason.tag()))?;
                        if let Some(c) = custom {
                            write_string(&mut buf, c)?;
                        }
                    }
                }
                (MatchMakingTag::JoinGame.tag(), buf)
            }
            MatchMakingFrame::StartGame { game_id } => {
                let mut buf = Vec::new();
                buf.write_u32::<LittleEndian>(*game_id)?;
                (MatchMakingTag::StartGame.tag(), buf)
            }
            MatchMakingFrame::RemoveGame { game_id } => {
                let mut buf = Vec::new();
                buf.write_u32::<LittleEndian>(*game_id)?;
                (MatchMakingTag::RemoveGame.tag(), buf)
            }
            MatchMakingFrame::RemovePlayer(p) => {
                let mut buf = Vec::new();
                p.write(&mut buf)?;
                (MatchMakingTag::RemovePlayer.tag(), buf)
            }
            MatchMakingFrame::GameData { game_id, frames } => {
                let mut buf = Vec::new();
                buf.write_u32::<LittleEndian>(*game_id)?;
                for f in frames {
                    let (tag, payload) = f.encode()?;
                    write_nested(&mut buf, tag, &payload)?;
                }
                (MatchMakingTag::GameData.tag(), buf)
            }
            MatchMakingFrame::GameDataTo { game_id, target, frames } => {
                let mut buf = Vec::new();
                buf.write_u32::<LittleEndian>(*game_id)?;
                write_packed(&mut buf, *target)?;
                for f in frames {
                    let (tag, payload) = f.encode()?;
                    write_nested(&mut buf, tag, &payload)?;
                }
                (MatchMakingTag::GameDataTo.tag(), buf)
            }
            MatchMakingFrame::JoinedGame(j) => {
                let mut buf = Vec::new();
                j.write(&mut buf)?;
                (MatchMakingTag::JoinedGame.tag(), buf)
            }
            MatchMakingFrame::EndGame { game_id, reason } => {
                let mut buf = Vec::new();
                buf.write_u32::<LittleEndian>(*game_id)?;
                buf.write_u8(*reason)?;
                (MatchMakingTag::EndGame.tag(), buf)
            }
            MatchMakingFrame::GetGameList(raw) => (MatchMakingTag::GetGameList.tag(), raw.clone()),
            MatchMakingFrame::AlterGame(a) => {
                let mut buf = Vec::new();
                a.write(&mut buf)?;
                (MatchMakingTag::AlterGame.tag(), buf)
            }
            MatchMakingFrame::KickPlayer { game_id, player_id, ban } => {
                let mut buf = Vec::new();
                buf.write_u32::<LittleEndian>(*game_id)?;
                buf.write_u32::<LittleEndian>(*player_id)?;
                buf.write_u8(*ban as u8)?;
                (MatchMakingTag::KickPlayer.tag(), buf)
            }
            MatchMakingFrame::WaitForHost { game_id, client_id } => {
                let mut buf = Vec::new();
                buf.write_u32::<LittleEndian>(*game_id)?;
                buf.write_u32::<LittleEndian>(*client_id)?;
                (MatchMakingTag::WaitForHost.tag(), buf)
            }
            MatchMakingFrame::Redirect(r) => {
                let mut buf = Vec::new();
                r.write(&mut buf)?;
                (MatchMakingTag::Redirect.tag(), buf)
            }
            MatchMakingFrame::ReselectServer(raw) => (MatchMakingTag::ReselectServer.tag(), raw.clone()),
            MatchMakingFrame::GetGameListV2Request(req) => {
                let mut buf = Vec::new();
                req.write(&mut buf)?;
                (MatchMakingTag::GetGameListV2.tag(), buf)
            }
            MatchMakingFrame::GetGameListV2Response(resp) => {
                let mut buf = Vec::new();
                let mut counts_buf = Vec::new();
                resp.counts.write(&mut counts_buf)?;
                write_nested(&mut buf, 0, &counts_buf)?;
                let mut games_buf = Vec::new();
                for g in &resp.games {
                    g.write(&mut games_buf)?;
                }
                write_nested(&mut buf, 0, &games_buf)?;
                (MatchMakingTag::GetGameListV2.tag(), buf)
            }
            MatchMakingFrame::Unknown { tag, data } => (*tag, data.clone()),
        })
    }
}

/// The outer packet: the top-level datagram, never itself length-prefixed.
#[derive(Debug, Clone, PartialEq)]
pub enum OuterFrame {
    /// Best-effort, unordered
    Unreliable(Vec<MatchMakingFrame>),
    /// Tracked for ack
    Reliable {
        /// This packet's reliable id
        id: u16,
        /// The nested matchmaking-layer frames
        frames: Vec<MatchMakingFrame>,
    },
    /// The handshake packet
    Hello {
        /// This packet's reliable id
        id: u16,
        /// The hello game-version scalar (§4.1)
        game_version: u32,
        /// The connecting client's display name
        name: String,
    },
    /// Graceful teardown
    Disconnect {
        /// Opaque framing prefix (§9.i): `Some` iff a body was present
        body_present: bool,
        /// The disconnect reason, if a body was present
        reason: Option<DisconnectReason>,
        /// A custom reason string, present iff `reason == Custom`
        custom: Option<String>,
    },
    /// Acknowledges a reliable id
    Ack {
        /// The acknowledged reliable id
        id: u16,
    },
    /// Reserved; never emitted, decoded only so stray bytes don't error
    Fragment(Vec<u8>),
    /// Keep-alive
    Ping {
        /// This ping's reliable id
        id: u16,
    },
}

impl OuterFrame {
    /// Whether this outer frame is reliable-class (allocates/consumes a
    /// reliable id and is tracked for ack matching), per §4.2.
    pub fn is_reliable_class(&self) -> bool {
        matches!(self, OuterFrame::Reliable { .. } | OuterFrame::Hello { .. } | OuterFrame::Ack { .. } | OuterFrame::Ping { .. })
    }

    /// The reliable id carried by this frame, if any.
    pub fn reliable_id(&self) -> Option<u16> {
        match self {
            OuterFrame::Reliable { id, .. }
            | OuterFrame::Hello { id, .. }
            | OuterFrame::Ack { id }
            | OuterFrame::Ping { id } => Some(*id),
            _ => None,
        }
    }

    /// Decodes a full UDP datagram into an `OuterFrame`.
    pub fn decode(data: &[u8]) -> Result<OuterFrame> {
        if data.is_empty() {
            return Err(ErrorKind::FrameTooShort.into());
        }
        let kind_byte = data[0];
        let kind = OuterKind::from_tag(kind_byte)
            .ok_or(ErrorKind::ProtocolDecode("unknown outer packet kind"))?;
        let mut r = Cursor::new(data[1..].to_vec());
        Ok(match kind {
            OuterKind::Unreliable => {
                OuterFrame::Unreliable(decode_matchmaking_sequence(&mut r)?)
            }
            OuterKind::Reliable => {
                let id = read_reliable_id(&mut r)?;
                OuterFrame::Reliable {
                    id,
                    frames: decode_matchmaking_sequence(&mut r)?,
                }
            }
            OuterKind::Hello => {
                let _zero = r.read_u8()?; // leading 0x00 framing byte, precedes the reliable id
                let id = read_reliable_id(&mut r)?;
                let game_version = r.read_u32::<LittleEndian>()?;
                let name = read_string(&mut r)?;
                OuterFrame::Hello { id, game_version, name }
            }
            OuterKind::Disconnect => {
                let mut raw = Vec::new();
                r.read_to_end(&mut raw)?;
                if raw.is_empty() {
                    OuterFrame::Disconnect { body_present: false, reason: None, custom: None }
                } else {
                    // A 4-byte opaque prefix (possible-reconnect flag +
                    // an unused size-like field) precedes the reason
                    // byte; neither is decoded further than this (§9).
                    if raw.len() < 5 {
                        return Err(ErrorKind::FrameTooShort.into());
                    }
                    let mut cur = Cursor::new(&raw[4..]);
                    let reason = DisconnectReason::from_tag(cur.read_u8()?);
                    let custom = if let DisconnectReason::Custom = reason {
                        Some(read_string(&mut cur)?)
                    } else {
                        None
                    };
                    OuterFrame::Disconnect { body_present: true, reason: Some(reason), custom }
                }
            }
            OuterKind::Ack => {
                let id = read_reliable_id(&mut r)?;
                OuterFrame::Ack { id }
            }
            OuterKind::Fragment => {
                let mut raw = Vec::new();
                r.read_to_end(&mut raw)?;
                OuterFrame::Fragment(raw)
            }
            OuterKind::Ping => {
                let id = read_reliable_id(&mut r)?;
                OuterFrame::Ping { id }
            }
        })
    }

    /// Encodes this frame into a full UDP datagram.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        match self {
            OuterFrame::Unreliable(frames) => {
                buf.write_u8(OuterKind::Unreliable.tag())?;
                encode_matchmaking_sequence(&mut buf, frames)?;
            }
            OuterFrame::Reliable { id, frames } => {
                buf.write_u8(OuterKind::Reliable.tag())?;
                write_reliable_id(&mut buf, *id)?;
                encode_matchmaking_sequence(&mut buf, frames)?;
            }
            OuterFrame::Hello { id, game_version, name } => {
                buf.write_u8(OuterKind::Hello.tag())?;
                buf.write_u8(0)?;
                write_reliable_id(&mut buf, *id)?;
                buf.write_u32::<LittleEndian>(*game_version)?;
                write_string(&mut buf, name)?;
            }
            OuterFrame::Disconnect { body_present, reason, custom } => {
                buf.write_u8(OuterKind::Disconnect.tag())?;
                if *body_present {
                    // Mirrors the 4-byte opaque prefix consumed on decode.
                    buf.write_all(&[0u8; 4])?;
                    let reason = reason.unwrap_or(DisconnectReason::ExitGame);
                    buf.write_u8(reason.tag())?;
                    if let (DisconnectReason::Custom, Some(c)) = (reason, custom) {
                        write_string(&mut buf, c)?;
                    }
                }
            }
            OuterFrame::Ack { id } => {
                buf.write_u8(OuterKind::Ack.tag())?;
                write_reliable_id(&mut buf, *id)?;
                buf.write_u8(0xFF)?;
            }
            OuterFrame::Fragment(raw) => {
                buf.write_u8(OuterKind::Fragment.tag())?;
                buf.extend_from_slice(raw);
            }
            OuterFrame::Ping { id } => {
                buf.write_u8(OuterKind::Ping.tag())?;
                write_reliable_id(&mut buf, *id)?;
            }
        }
        Ok(buf)
    }
}

fn decode_matchmaking_sequence(r: &mut Cursor<Vec<u8>>) -> Result<Vec<MatchMakingFrame>> {
    let mut frames = Vec::new();
    while !remaining(r).is_empty() {
        let (tag, body) = read_nested(r)?;
        frames.push(MatchMakingFrame::decode(tag, body)?);
    }
    Ok(frames)
}

fn encode_matchmaking_sequence<W: Write>(w: &mut W, frames: &[MatchMakingFrame]) -> Result<()> {
    for f in frames {
        let (tag, payload) = f.encode()?;
        write_nested(w, tag, &payload)?;
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_disconnect_skips_opaque_prefix_before_reason() {
        // Outer kind byte, a 4-byte opaque prefix, then the reason
        // byte at offset 4 — the shape a real server's Disconnect
        // datagram takes.
        let data = [OuterKind::Disconnect.tag(), 0, 0, 0, 0, 7];
        let frame = OuterFrame::decode(&data).unwrap();
        match frame {
            OuterFrame::Disconnect { body_present, reason, custom } => {
                assert!(body_present);
                assert_eq!(reason, Some(DisconnectReason::Kicked));
                assert_eq!(custom, None);
            }
            _ => panic!("wrong frame kind"),
        }
    }

    #[test]
    fn test_disconnect_roundtrip_with_custom_reason() {
        let frame = OuterFrame::Disconnect {
            body_present: true,
            reason: Some(DisconnectReason::Custom),
            custom: Some("banned for a week".to_owned()),
        };
        let bytes = frame.encode().unwrap();
        let decoded = OuterFrame::decode(&bytes).unwrap();
        match decoded {
            OuterFrame::Disconnect { body_present, reason, custom } => {
                assert!(body_present);
                assert_eq!(reason, Some(DisconnectReason::Custom));
                assert_eq!(custom, Some("banned for a week".to_owned()));
            }
            _ => panic!("wrong frame kind"),
        }
    }
}
