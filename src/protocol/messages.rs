//! Leaf payload schemas: one concrete struct/enum per message kind,
//! carrying exactly its decoded fields (no bag-of-fields `values` map).

use crate::bytes::*;
use crate::errors::*;
use crate::model::game::Game;
use crate::protocol::tags::DisconnectReason;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Read, Write};
use std::net::Ipv4Addr;

/// Converts the wire's "LE, reversed-octet" host encoding into a
/// standard `Ipv4Addr` (see concrete scenario 6 in the design notes).
pub fn decode_host(raw: u32) -> Ipv4Addr {
    Ipv4Addr::from(raw.to_be_bytes())
}

/// The inverse of [`decode_host`].
pub fn encode_host(addr: Ipv4Addr) -> u32 {
    u32::from_be_bytes(addr.octets())
}

/// `JoinGame` request body: client -> server.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinGameRequest {
    /// The lobby code, as its wire `u32`
    pub code: u32,
    /// A fixed map-id selector byte; protocol constant `0x07`
    pub map_id: u8,
}

impl JoinGameRequest {
    /// Writes this request.
    pub fn write<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_u32::<LittleEndian>(self.code)?;
        w.write_u8(self.map_id)
    }

    /// Reads a request.
    pub fn read<R: Read>(r: &mut R) -> Result<JoinGameRequest> {
        Ok(JoinGameRequest {
            code: r.read_u32::<LittleEndian>()?,
            map_id: r.read_u8()?,
        })
    }
}

/// Successful `JoinGame` response: server -> client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinGameSuccess {
    /// The id of the joined game
    pub game_id: u32,
    /// The id assigned to this client within the game
    pub player_id: u32,
    /// The id of the current host
    pub host_id: u32,
}

/// `JoinGame` either succeeds with ids or fails with a reason.
#[derive(Debug, Clone, PartialEq)]
pub enum JoinGameResponse {
    /// The join succeeded
    Success(JoinGameSuccess),
    /// The join failed with a server-provided reason
    Failure {
        /// The reason the join failed
        reason: DisconnectReason,
        /// An optional human-readable custom reason
        custom: Option<String>,
    },
}

impl JoinGameResponse {
    /// Reads a response. The first four bytes decide whether this is a
    /// disconnect-reason failure or a success triple, per §4.6.
    pub fn read<R: Read>(r: &mut R) -> Result<JoinGameResponse> {
        let first = r.read_u32::<LittleEndian>()?;
        if first <= 0xFF && DisconnectReason::from_tag(first as u8).tag() == first as u8 {
            let reason = DisconnectReason::from_tag(first as u8);
            let custom = if let DisconnectReason::Custom = reason {
                Some(read_string(r)?)
            } else {
                None
            };
            return Ok(JoinGameResponse::Failure { reason, custom });
        }
        let player_id = r.read_u32::<LittleEndian>()?;
        let host_id = r.read_u32::<LittleEndian>()?;
        Ok(JoinGameResponse::Success(JoinGameSuccess {
            game_id: first,
            player_id,
            host_id,
        }))
    }
}

/// `JoinedGame`: confirms the full roster of an already-joined game.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinedGame {
    /// The id of the joined game
    pub game_id: u32,
    /// The id assigned to this client
    pub client_id: u32,
    /// The id of the current host
    pub host_id: u32,
    /// The ids of every player currently in the game
    pub player_ids: Vec<u32>,
}

impl JoinedGame {
    /// Reads a `JoinedGame` message.
    pub fn read<R: Read>(r: &mut R) -> Result<JoinedGame> {
        let game_id = r.read_u32::<LittleEndian>()?;
        let client_id = r.read_u32::<LittleEndian>()?;
        let host_id = r.read_u32::<LittleEndian>()?;
        let count = read_packed(r)? as usize;
        let mut player_ids = Vec::with_capacity(count);
        for _ in 0..count {
            player_ids.push(read_packed(r)?);
        }
        Ok(JoinedGame {
            game_id,
            client_id,
            host_id,
            player_ids,
        })
    }

    /// Writes a `JoinedGame` message.
    pub fn write<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_u32::<LittleEndian>(self.game_id)?;
        w.write_u32::<LittleEndian>(self.client_id)?;
        w.write_u32::<LittleEndian>(self.host_id)?;
        write_packed(w, self.player_ids.len() as u32)?;
        for id in &self.player_ids {
            write_packed(w, *id)?;
        }
        Ok(())
    }
}

/// `RemovePlayer`: a player left or was removed from a game.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemovePlayer {
    /// The game the player left
    pub game_id: u32,
    /// The id of the removed player
    pub player_id: u32,
    /// The id of the (possibly new) host
    pub host_id: u32,
    /// Why the player was removed
    pub reason: DisconnectReason,
}

impl RemovePlayer {
    /// Reads a `RemovePlayer` message.
    pub fn read<R: Read>(r: &mut R) -> Result<RemovePlayer> {
        Ok(RemovePlayer {
            game_id: r.read_u32::<LittleEndian>()?,
            player_id: r.read_u32::<LittleEndian>()?,
            host_id: r.read_u32::<LittleEndian>()?,
            reason: DisconnectReason::from_tag(r.read_u8()?),
        })
    }

    /// Writes a `RemovePlayer` message.
    pub fn write<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_u32::<LittleEndian>(self.game_id)?;
        w.write_u32::<LittleEndian>(self.player_id)?;
        w.write_u32::<LittleEndian>(self.host_id)?;
        w.write_u8(self.reason.tag())
    }
}

/// `AlterGame`: toggles a hosted game's public/private visibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlterGame {
    /// The game being altered
    pub game_id: u32,
    /// Whether the game is now publicly listed
    pub is_public: bool,
}

impl AlterGame {
    /// Reads an `AlterGame` message.
    pub fn read<R: Read>(r: &mut R) -> Result<AlterGame> {
        Ok(AlterGame {
            game_id: r.read_u32::<LittleEndian>()?,
            is_public: r.read_u8()? != 0,
        })
    }

    /// Writes an `AlterGame` message.
    pub fn write<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_u32::<LittleEndian>(self.game_id)?;
        w.write_u8(self.is_public as u8)
    }
}

/// `Redirect`: ask the client to reconnect to a different endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Redirect {
    /// The new server's address
    pub host: Ipv4Addr,
    /// The new server's port
    pub port: u16,
}

impl Redirect {
    /// Reads a `Redirect` message.
    pub fn read<R: Read>(r: &mut R) -> Result<Redirect> {
        let raw_host = r.read_u32::<LittleEndian>()?;
        let port = r.read_u16::<LittleEndian>()?;
        Ok(Redirect {
            host: decode_host(raw_host),
            port,
        })
    }

    /// Writes a `Redirect` message.
    pub fn write<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_u32::<LittleEndian>(encode_host(self.host))?;
        w.write_u16::<LittleEndian>(self.port)
    }
}

/// Search mask used by [`GetGameListV2Request`]; distinct from the
/// ordinal map id used in [`Game`] so the two conventions (§9) can
/// never be mixed up by the type system.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MapSearchMask(pub u8);

/// `GetGameListV2` request: client -> server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GetGameListV2Request {
    /// Bitmask of maps to search (not the ordinal map id)
    pub map_mask: MapSearchMask,
    /// Desired impostor count, `0..=3` (`0` = any)
    pub impostors: u8,
    /// The language/region filter
    pub language: u32,
}

impl GetGameListV2Request {
    /// Writes this request.
    pub fn write<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_u32::<LittleEndian>(self.language)?;
        w.write_u8(self.map_mask.0)?;
        w.write_u8(self.impostors)
    }

    /// Reads a request (mostly used by tests exercising round trips).
    pub fn read<R: Read>(r: &mut R) -> Result<GetGameListV2Request> {
        let language = r.read_u32::<LittleEndian>()?;
        let map_mask = MapSearchMask(r.read_u8()?);
        let impostors = r.read_u8()?;
        Ok(GetGameListV2Request {
            map_mask,
            impostors,
            language,
        })
    }
}

/// The per-map lobby counts in a `GetGameListV2` response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GameCounts {
    /// Lobbies currently running on The Skeld
    pub skeld: u32,
    /// Lobbies currently running on MIRA HQ
    pub mira: u32,
    /// Lobbies currently running on Polus
    pub polus: u32,
}

impl GameCounts {
    /// Reads the counts block.
    pub fn read<R: Read>(r: &mut R) -> io::Result<GameCounts> {
        Ok(GameCounts {
            skeld: r.read_u32::<LittleEndian>()?,
            mira: r.read_u32::<LittleEndian>()?,
            polus: r.read_u32::<LittleEndian>()?,
        })
    }

    /// Writes the counts block.
    pub fn write<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_u32::<LittleEndian>(self.skeld)?;
        w.write_u32::<LittleEndian>(self.mira)?;
        w.write_u32::<LittleEndian>(self.polus)
    }
}

/// A single public lobby listing entry.
#[derive(Debug, Clone, PartialEq)]
pub struct GameListing {
    /// The lobby's host address
    pub host: Ipv4Addr,
    /// The lobby's port
    pub port: u16,
    /// The lobby code
    pub code: u32,
    /// The host's displayed name
    pub name: String,
    /// Current player count
    pub player_count: u8,
    /// Age of the lobby, in minutes
    pub age: u32,
    /// Ordinal map id (not a search mask)
    pub map_id: u8,
    /// Number of impostors
    pub impostors: u8,
    /// Maximum players allowed
    pub max_players: u8,
}

impl GameListing {
    /// Reads a single listing entry.
    pub fn read<R: Read>(r: &mut R) -> Result<GameListing> {
        let raw_host = r.read_u32::<LittleEndian>()?;
        let port = r.read_u16::<LittleEndian>()?;
        let code = r.read_u32::<LittleEndian>()?;
        let name = read_string(r)?;
        let player_count = r.read_u8()?;
        let age = read_packed(r)?;
        let map_id = r.read_u8()?;
        let impostors = r.read_u8()?;
        let max_players = r.read_u8()?;
        Ok(GameListing {
            host: decode_host(raw_host),
            port,
            code,
            name,
            player_count,
            age,
            map_id,
            impostors,
            max_players,
        })
    }

    /// Writes a single listing entry.
    pub fn write<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_u32::<LittleEndian>(encode_host(self.host))?;
        w.write_u16::<LittleEndian>(self.port)?;
        w.write_u32::<LittleEndian>(self.code)?;
        write_string(w, &self.name)?;
        w.write_u8(self.player_count)?;
        write_packed(w, self.age)?;
        w.write_u8(self.map_id)?;
        w.write_u8(self.impostors)?;
        w.write_u8(self.max_players)
    }
}

/// `GetGameListV2` response: server -> client.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GetGameListV2Response {
    /// Per-map lobby counts
    pub counts: GameCounts,
    /// The matching public lobbies
    pub games: Vec<GameListing>,
}

/// `SceneChange`: client has entered the online-game scene.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SceneChange {
    /// The client changing scene
    pub client_id: u32,
    /// The scene name; always `"OnlineGame"` in practice
    pub scene: String,
}

impl SceneChange {
    /// Reads a `SceneChange` message.
    pub fn read<R: Read>(r: &mut R) -> Result<SceneChange> {
        Ok(SceneChange {
            client_id: read_packed(r)?,
            scene: read_string(r)?,
        })
    }

    /// Writes a `SceneChange` message.
    pub fn write<W: Write>(&self, w: &mut W) -> io::Result<()> {
        write_packed(w, self.client_id)?;
        write_string(w, &self.scene)
    }
}

/// The well known scene name sent after joining a game.
pub const ONLINE_GAME_SCENE: &str = "OnlineGame";

/// `ReadyFlag`: marks a client ready for the current game.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadyFlag {
    /// The client that is ready
    pub client_id: u32,
}

impl ReadyFlag {
    /// Reads a `ReadyFlag` message.
    pub fn read<R: Read>(r: &mut R) -> Result<ReadyFlag> {
        Ok(ReadyFlag {
            client_id: read_packed(r)?,
        })
    }

    /// Writes a `ReadyFlag` message.
    pub fn write<W: Write>(&self, w: &mut W) -> io::Result<()> {
        write_packed(w, self.client_id)
    }
}

/// One entry of the initial roster carried by a `GameData` spawn.
#[derive(Debug, Clone, PartialEq)]
pub struct RosterEntry {
    /// The player's stable short id
    pub player_id: u8,
    /// Displayed name
    pub name: String,
    /// Color index
    pub color: u8,
    /// Hat cosmetic id
    pub hat: u32,
    /// Pet cosmetic id
    pub pet: u32,
    /// Skin cosmetic id
    pub skin: u32,
    /// Status bitfield (disconnected/impostor/dead/...)
    pub status: u8,
    /// Whether each of the player's tasks is complete
    pub tasks: Vec<bool>,
}

impl RosterEntry {
    /// Reads one roster entry.
    pub fn read<R: Read>(r: &mut R) -> Result<RosterEntry> {
        let player_id = r.read_u8()?;
        let len = r.read_u16::<LittleEndian>()? as usize;
        let mut body = vec![0u8; len];
        r.read_exact(&mut body)?;
        let mut cur = io::Cursor::new(&body[..]);
        let name = read_string(&mut cur)?;
        let color = cur.read_u8()?;
        let hat = read_packed(&mut cur)?;
        let pet = read_packed(&mut cur)?;
        let skin = read_packed(&mut cur)?;
        let status = cur.read_u8()?;
        let task_count = read_packed(&mut cur)? as usize;
        let mut tasks = Vec::with_capacity(task_count);
        for _ in 0..task_count {
            let _task_id = read_packed(&mut cur)?;
            tasks.push(cur.read_u8()? != 0);
        }
        Ok(RosterEntry {
            player_id,
            name,
            color,
            hat,
            pet,
            skin,
            status,
            tasks,
        })
    }

    /// Writes one roster entry.
    pub fn write<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_u8(self.player_id)?;
        let mut body = Vec::new();
        write_string(&mut body, &self.name)?;
        body.write_u8(self.color)?;
        write_packed(&mut body, self.hat)?;
        write_packed(&mut body, self.pet)?;
        write_packed(&mut body, self.skin)?;
        body.write_u8(self.status)?;
        write_packed(&mut body, self.tasks.len() as u32)?;
        for (i, complete) in self.tasks.iter().enumerate() {
            write_packed(&mut body, i as u32)?;
            body.write_u8(*complete as u8)?;
        }
        w.write_u16::<LittleEndian>(body.len() as u16)?;
        w.write_all(&body)
    }
}

/// Re-exported so callers building `SyncSettings` don't need to reach
/// into `crate::model`.
pub type SyncSettings = Game;
