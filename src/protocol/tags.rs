//! Closed tag enumerations for every nesting layer of the frame codec.
//!
//! Each layer's decoder only needs to know its own enum; see
//! [`crate::protocol::frame`] for the tag-indexed dispatch tables built
//! from these.

/// The outer packet kind, the very first byte of every datagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OuterKind {
    /// Best-effort, unordered, no ack
    Unreliable,
    /// Tracked for ack, assigned a reliable id
    Reliable,
    /// Handshake packet
    Hello,
    /// Graceful teardown
    Disconnect,
    /// Acknowledges a reliable id
    Ack,
    /// Reserved; never emitted by this client
    Fragment,
    /// Keep-alive
    Ping,
}

impl OuterKind {
    /// Maps a wire byte to its `OuterKind`, if known.
    pub fn from_tag(tag: u8) -> Option<OuterKind> {
        Some(match tag {
            0 => OuterKind::Unreliable,
            1 => OuterKind::Reliable,
            8 => OuterKind::Hello,
            9 => OuterKind::Disconnect,
            10 => OuterKind::Ack,
            11 => OuterKind::Fragment,
            12 => OuterKind::Ping,
            _ => return None,
        })
    }

    /// The wire byte for this kind.
    pub fn tag(self) -> u8 {
        match self {
            OuterKind::Unreliable => 0,
            OuterKind::Reliable => 1,
            OuterKind::Hello => 8,
            OuterKind::Disconnect => 9,
            OuterKind::Ack => 10,
            OuterKind::Fragment => 11,
            OuterKind::Ping => 12,
        }
    }

    /// Whether this outer kind is tracked for ack/reliable-id bookkeeping.
    pub fn is_reliable_class(self) -> bool {
        matches!(
            self,
            OuterKind::Reliable | OuterKind::Hello | OuterKind::Ack | OuterKind::Ping
        )
    }
}

/// Tags carried by messages nested directly under `Reliable`/`Unreliable`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMakingTag {
    /// Host a new game
    HostGame,
    /// Join an existing game
    JoinGame,
    /// Host starts the game
    StartGame,
    /// A hosted game is removed
    RemoveGame,
    /// A player is removed from a game
    RemovePlayer,
    /// Carries nested game-data frames
    GameData,
    /// Carries nested game-data frames, targeted at one client
    GameDataTo,
    /// Response confirming a successful join
    JoinedGame,
    /// The game has ended
    EndGame,
    /// Request the public game list
    GetGameList,
    /// Toggles a game's public/private visibility
    AlterGame,
    /// A player is kicked
    KickPlayer,
    /// Client must wait for the host
    WaitForHost,
    /// Redirect the client to a different server
    Redirect,
    /// Ask the client to reselect a region/server
    ReselectServer,
    /// v2 of the public game list request/response
    GetGameListV2,
}

impl MatchMakingTag {
    /// Maps a wire byte to its `MatchMakingTag`, if known.
    pub fn from_tag(tag: u8) -> Option<MatchMakingTag> {
        Some(match tag {
            0 => MatchMakingTag::HostGame,
            1 => MatchMakingTag::JoinGame,
            2 => MatchMakingTag::StartGame,
            3 => MatchMakingTag::RemoveGame,
            4 => MatchMakingTag::RemovePlayer,
            5 => MatchMakingTag::GameData,
            6 => MatchMakingTag::GameDataTo,
            7 => MatchMakingTag::JoinedGame,
            8 => MatchMakingTag::EndGame,
            9 => MatchMakingTag::GetGameList,
            10 => MatchMakingTag::AlterGame,
            11 => MatchMakingTag::KickPlayer,
            12 => MatchMakingTag::WaitForHost,
            13 => MatchMakingTag::Redirect,
            14 => MatchMakingTag::ReselectServer,
            16 => MatchMakingTag::GetGameListV2,
            _ => return None,
        })
    }

    /// The wire byte for this tag.
    pub fn tag(self) -> u8 {
        match self {
            MatchMakingTag::HostGame => 0,
            MatchMakingTag::JoinGame => 1,
            MatchMakingTag::StartGame => 2,
            MatchMakingTag::RemoveGame => 3,
            MatchMakingTag::RemovePlayer => 4,
            MatchMakingTag::GameData => 5,
            MatchMakingTag::GameDataTo => 6,
            MatchMakingTag::JoinedGame => 7,
            MatchMakingTag::EndGame => 8,
            MatchMakingTag::GetGameList => 9,
            MatchMakingTag::AlterGame => 10,
            MatchMakingTag::KickPlayer => 11,
            MatchMakingTag::WaitForHost => 12,
            MatchMakingTag::Redirect => 13,
            MatchMakingTag::ReselectServer => 14,
            MatchMakingTag::GetGameListV2 => 16,
        }
    }
}

/// Tags carried by messages nested inside `GameData`/`GameDataTo`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameDataTag {
    /// A per-component data update; meaning depends on the net-id's role
    DataFlag,
    /// An RPC call targeted at a net-id
    RpcFlag,
    /// A new game object is spawned
    SpawnFlag,
    /// A game object is despawned
    DespawnFlag,
    /// The client has changed scene
    SceneChangeFlag,
    /// Marks readiness for the current game
    ReadyFlag,
    /// Updated game settings
    ChangeSettingsFlag,
}

impl GameDataTag {
    /// Maps a wire byte to its `GameDataTag`, if known.
    pub fn from_tag(tag: u8) -> Option<GameDataTag> {
        Some(match tag {
            1 => GameDataTag::DataFlag,
            2 => GameDataTag::RpcFlag,
            4 => GameDataTag::SpawnFlag,
            5 => GameDataTag::DespawnFlag,
            6 => GameDataTag::SceneChangeFlag,
            7 => GameDataTag::ReadyFlag,
            8 => GameDataTag::ChangeSettingsFlag,
            _ => return None,
        })
    }

    /// The wire byte for this tag.
    pub fn tag(self) -> u8 {
        match self {
            GameDataTag::DataFlag => 1,
            GameDataTag::RpcFlag => 2,
            GameDataTag::SpawnFlag => 4,
            GameDataTag::DespawnFlag => 5,
            GameDataTag::SceneChangeFlag => 6,
            GameDataTag::ReadyFlag => 7,
            GameDataTag::ChangeSettingsFlag => 8,
        }
    }
}

/// RPC tags, nested inside an `RpcFlag`.
///
/// Numbered in the order this protocol's documentation enumerates them;
/// the handful the core dispatcher doesn't act on are still decoded so
/// unknown-tag skipping never has to special-case them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RpcTag {
    /// Replace the game's settings
    SyncSettings,
    /// Mark player-ids as impostors
    SetInfected,
    /// Ask the server to validate a candidate name
    CheckName,
    /// Server-assigned name
    SetName,
    /// Ask the server to validate a candidate color
    CheckColor,
    /// Server-assigned color
    SetColor,
    /// Server-assigned hat
    SetHat,
    /// Server-assigned pet
    SetPet,
    /// Server-assigned skin
    SetSkin,
    /// A dead body was reported
    ReportDeadBody,
    /// A player was murdered
    MurderPlayer,
    /// A chat message
    SendChat,
    /// A meeting/emergency started
    StartMeeting,
    /// Sets the meeting start counter
    SetStartCounter,
    /// Entered a vent
    EnterVent,
    /// Exited a vent
    ExitVent,
    /// Teleported a player (anti-cheat reconciliation)
    SnapTo,
    /// Closes the current meeting UI
    Close,
    /// The vote is complete
    VotingComplete,
    /// A non-verbal chat note
    SendChatNote,
    /// Updated task list for a player
    SetTasks,
    /// Opaque data applied only after a spectator reconnect
    UpdateGameData,
}

impl RpcTag {
    /// Maps a wire byte to its `RpcTag`, if known.
    pub fn from_tag(tag: u8) -> Option<RpcTag> {
        Some(match tag {
            0 => RpcTag::SyncSettings,
            1 => RpcTag::SetInfected,
            2 => RpcTag::CheckName,
            3 => RpcTag::SetName,
            4 => RpcTag::CheckColor,
            5 => RpcTag::SetColor,
            6 => RpcTag::SetHat,
            7 => RpcTag::SetPet,
            8 => RpcTag::SetSkin,
            9 => RpcTag::ReportDeadBody,
            10 => RpcTag::MurderPlayer,
            11 => RpcTag::SendChat,
            12 => RpcTag::StartMeeting,
            13 => RpcTag::SetStartCounter,
            14 => RpcTag::EnterVent,
            15 => RpcTag::ExitVent,
            16 => RpcTag::SnapTo,
            17 => RpcTag::Close,
            18 => RpcTag::VotingComplete,
            19 => RpcTag::SendChatNote,
            20 => RpcTag::SetTasks,
            21 => RpcTag::UpdateGameData,
            _ => return None,
        })
    }

    /// The wire byte for this tag.
    pub fn tag(self) -> u8 {
        match self {
            RpcTag::SyncSettings => 0,
            RpcTag::SetInfected => 1,
            RpcTag::CheckName => 2,
            RpcTag::SetName => 3,
            RpcTag::CheckColor => 4,
            RpcTag::SetColor => 5,
            RpcTag::SetHat => 6,
            RpcTag::SetPet => 7,
            RpcTag::SetSkin => 8,
            RpcTag::ReportDeadBody => 9,
            RpcTag::MurderPlayer => 10,
            RpcTag::SendChat => 11,
            RpcTag::StartMeeting => 12,
            RpcTag::SetStartCounter => 13,
            RpcTag::EnterVent => 14,
            RpcTag::ExitVent => 15,
            RpcTag::SnapTo => 16,
            RpcTag::Close => 17,
            RpcTag::VotingComplete => 18,
            RpcTag::SendChatNote => 19,
            RpcTag::SetTasks => 20,
            RpcTag::UpdateGameData => 21,
        }
    }
}

/// Spawn types nested inside a `SpawnFlag`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpawnType {
    /// The ship/map state, revision 0
    ShipStatus0,
    /// The meeting/voting UI
    MeetingHud,
    /// Lobby countdown behaviour
    LobbyBehavior,
    /// Carries the initial player roster
    GameData,
    /// Declares a player's three component net-ids
    PlayerControl,
    /// The ship/map state, revision 1
    ShipStatus1,
    /// The ship/map state, revision 2
    ShipStatus2,
    /// The ship/map state, revision 3
    ShipStatus3,
}

impl SpawnType {
    /// Maps a wire VarInt7 value to its `SpawnType`, if known.
    pub fn from_tag(tag: u32) -> Option<SpawnType> {
        Some(match tag {
            0 => SpawnType::ShipStatus0,
            1 => SpawnType::MeetingHud,
            2 => SpawnType::LobbyBehavior,
            3 => SpawnType::GameData,
            4 => SpawnType::PlayerControl,
            5 => SpawnType::ShipStatus1,
            6 => SpawnType::ShipStatus2,
            7 => SpawnType::ShipStatus3,
            _ => return None,
        })
    }

    /// The wire value for this spawn type.
    pub fn tag(self) -> u32 {
        match self {
            SpawnType::ShipStatus0 => 0,
            SpawnType::MeetingHud => 1,
            SpawnType::LobbyBehavior => 2,
            SpawnType::GameData => 3,
            SpawnType::PlayerControl => 4,
            SpawnType::ShipStatus1 => 5,
            SpawnType::ShipStatus2 => 6,
            SpawnType::ShipStatus3 => 7,
        }
    }
}

/// The role of a net-id, learned from a `PlayerControl` spawn and used
/// to resolve a later `DataFlag`'s sub-payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentRole {
    /// The player's control component (cosmetics, tasks, ...)
    Control,
    /// The player's physics component (vents, collision)
    Physics,
    /// The player's network-sync component (movement)
    Network,
}

/// Disconnect/terminal reasons, both protocol-defined and internal
/// sentinels used by the reliability engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    /// The player left normally
    ExitGame,
    /// The game was full
    GameFull,
    /// The game had already started
    GameStarted,
    /// No game matched the requested code
    GameNotFound,
    /// Client/server version mismatch
    IncorrectVersion,
    /// The player is banned
    Banned,
    /// The player was kicked
    Kicked,
    /// A custom reason string follows
    Custom,
    /// The requested name was invalid
    InvalidName,
    /// Anti-cheat tripped
    Hacking,
    /// The game object was destroyed
    Destroy,
    /// A generic server error
    Error,
    /// Game id mismatch
    IncorrectGame,
    /// The server requested the disconnect
    ServerRequest,
    /// The server was full
    ServerFull,
    /// The client lost focus while backgrounded
    FocusLostBackground,
    /// The player intentionally left
    IntentionalLeaving,
    /// The client lost focus
    FocusLost,
    /// A new connection superseded this one
    NewConnection,
    /// Internal: no datagram arrived within `recv_timeout`
    Timeout,
    /// Internal: too many unanswered pings
    UnansweredPings,
    /// A reason byte this crate doesn't recognise
    Unknown(u8),
}

impl DisconnectReason {
    /// Maps a wire byte to its `DisconnectReason`.
    pub fn from_tag(tag: u8) -> DisconnectReason {
        match tag {
            0 => DisconnectReason::ExitGame,
            1 => DisconnectReason::GameFull,
            2 => DisconnectReason::GameStarted,
            3 => DisconnectReason::GameNotFound,
            5 => DisconnectReason::IncorrectVersion,
            6 => DisconnectReason::Banned,
            7 => DisconnectReason::Kicked,
            8 => DisconnectReason::Custom,
            9 => DisconnectReason::InvalidName,
            10 => DisconnectReason::Hacking,
            16 => DisconnectReason::Destroy,
            17 => DisconnectReason::Error,
            18 => DisconnectReason::IncorrectGame,
            19 => DisconnectReason::ServerRequest,
            20 => DisconnectReason::ServerFull,
            207 => DisconnectReason::FocusLostBackground,
            208 => DisconnectReason::IntentionalLeaving,
            209 => DisconnectReason::FocusLost,
            210 => DisconnectReason::NewConnection,
            other => DisconnectReason::Unknown(other),
        }
    }

    /// The wire byte for this reason, where one exists.
    pub fn tag(self) -> u8 {
        match self {
            DisconnectReason::ExitGame => 0,
            DisconnectReason::GameFull => 1,
            DisconnectReason::GameStarted => 2,
            DisconnectReason::GameNotFound => 3,
            DisconnectReason::IncorrectVersion => 5,
            DisconnectReason::Banned => 6,
            DisconnectReason::Kicked => 7,
            DisconnectReason::Custom => 8,
            DisconnectReason::InvalidName => 9,
            DisconnectReason::Hacking => 10,
            DisconnectReason::Destroy => 16,
            DisconnectReason::Error => 17,
            DisconnectReason::IncorrectGame => 18,
            DisconnectReason::ServerRequest => 19,
            DisconnectReason::ServerFull => 20,
            DisconnectReason::FocusLostBackground => 207,
            DisconnectReason::IntentionalLeaving => 208,
            DisconnectReason::FocusLost => 209,
            DisconnectReason::NewConnection => 210,
            DisconnectReason::Timeout | DisconnectReason::UnansweredPings => 0xFF,
            DisconnectReason::Unknown(v) => v,
        }
    }
}
