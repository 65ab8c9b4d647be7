//! The in-memory lobby/game model: settings and player roster.

pub mod game;
pub mod player;

pub use self::game::{Game, MapId};
pub use self::player::{NetIds, Player, PlayerList, PlayerStatus, TaskState};
