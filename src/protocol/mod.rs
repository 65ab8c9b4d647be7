//! The wire protocol: tag enums, leaf message schemas, and the frame
//! tree codec built from both.

pub mod frame;
pub mod messages;
pub mod tags;

pub use self::frame::{
    DataFlagFrame, DataFlagPayload, GameDataFrame, MatchMakingFrame, OuterFrame,
    PlayerControlInfo, RpcFrame, SpawnComponent, SpawnFrame, SpawnTypeOrRaw,
};
pub use self::tags::{ComponentRole, DisconnectReason, GameDataTag, MatchMakingTag, OuterKind, RpcTag, SpawnType};
