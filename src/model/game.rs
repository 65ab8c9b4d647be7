//! The lobby's game settings, version-gated per §4.7.

use crate::errors::*;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Read, Write};

/// Ordinal map id as carried inside `Game`, distinct from the search
/// bitmask used by `GetGameListV2Request` (§9, open question iii).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MapId(pub u8);

/// The current game/lobby settings.
///
/// Fields are added as the protocol version increases; `deserialize`
/// and `serialize` must stay symmetric for every version they handle.
#[derive(Debug, Clone, PartialEq)]
pub struct Game {
    /// The settings schema version
    pub version: u8,
    /// Maximum players allowed
    pub max_players: u8,
    /// Language/keyword filter bitmask
    pub keywords: u32,
    /// The map being played
    pub map_id: MapId,
    /// Player movement speed multiplier
    pub player_speed: f32,
    /// Crewmate vision light radius multiplier
    pub crewmate_light: f32,
    /// Impostor vision light radius multiplier
    pub impostor_light: f32,
    /// Seconds between kills an impostor may use
    pub kill_cooldown: f32,
    /// Common task count
    pub num_common_tasks: u8,
    /// Long task count
    pub num_long_tasks: u8,
    /// Short task count
    pub num_short_tasks: u8,
    /// Emergency meeting count allowed per player
    pub emergency_meeting_count: u32,
    /// Number of impostors
    pub num_impostors: u8,
    /// Kill distance setting (0=short, 1=medium, 2=long)
    pub kill_distance: u8,
    /// Seconds allotted for discussion before voting opens
    pub discussion_time: u32,
    /// Seconds allotted for voting
    pub voting_time: u32,
    /// Whether the game is publicly listed
    pub public: bool,
    /// Emergency meeting cooldown, seconds (v>=2)
    pub emergency_cooldown: u8,
    /// Whether impostors must confirm a kill (v>=3)
    pub confirm_impostor: bool,
    /// Whether tasks are visible on the map (v>=3)
    pub visual_tasks: bool,
    /// Whether votes are anonymous (v>=4)
    pub anonymous_votes: bool,
    /// Whether the task progress bar updates live (v>=4)
    pub task_bar_updates: bool,
}

impl Game {
    /// Reads version-gated settings from `r`.
    pub fn deserialize<R: Read>(r: &mut R) -> Result<Game> {
        let version = r.read_u8()?;
        let max_players = r.read_u8()?;
        let keywords = r.read_u32::<LittleEndian>()?;
        let map_id = MapId(r.read_u8()?);
        let player_speed = r.read_f32::<LittleEndian>()?;
        let crewmate_light = r.read_f32::<LittleEndian>()?;
        let impostor_light = r.read_f32::<LittleEndian>()?;
        let kill_cooldown = r.read_f32::<LittleEndian>()?;
        let num_common_tasks = r.read_u8()?;
        let num_long_tasks = r.read_u8()?;
        let num_short_tasks = r.read_u8()?;
        let emergency_meeting_count = r.read_u32::<LittleEndian>()?;
        let num_impostors = r.read_u8()?;
        let kill_distance = r.read_u8()?;
        let discussion_time = r.read_u32::<LittleEndian>()?;
        let voting_time = r.read_u32::<LittleEndian>()?;
        let public = r.read_u8()? != 0;

        let mut emergency_cooldown = 15;
        let mut confirm_impostor = false;
        let mut visual_tasks = false;
        let mut anonymous_votes = false;
        let mut task_bar_updates = false;

        if version >= 2 {
            emergency_cooldown = r.read_u8()?;
        }
        if version >= 3 {
            confirm_impostor = r.read_u8()? != 0;
            visual_tasks = r.read_u8()? != 0;
        }
        if version >= 4 {
            anonymous_votes = r.read_u8()? != 0;
            task_bar_updates = r.read_u8()? != 0;
        }

        Ok(Game {
            version,
            max_players,
            keywords,
            map_id,
            player_speed,
            crewmate_light,
            impostor_light,
            kill_cooldown,
            num_common_tasks,
            num_long_tasks,
            num_short_tasks,
            emergency_meeting_count,
            num_impostors,
            kill_distance,
            discussion_time,
            voting_time,
            public,
            emergency_cooldown,
            confirm_impostor,
            visual_tasks,
            anonymous_votes,
            task_bar_updates,
        })
    }

    /// Writes settings, gated the same way `deserialize` reads them.
    pub fn serialize<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_u8(self.version)?;
        w.write_u8(self.max_players)?;
        w.write_u32::<LittleEndian>(self.keywords)?;
        w.write_u8(self.map_id.0)?;
        w.write_f32::<LittleEndian>(self.player_speed)?;
        w.write_f32::<LittleEndian>(self.crewmate_light)?;
        w.write_f32::<LittleEndian>(self.impostor_light)?;
        w.write_f32::<LittleEndian>(self.kill_cooldown)?;
        w.write_u8(self.num_common_tasks)?;
        w.write_u8(self.num_long_tasks)?;
        w.write_u8(self.num_short_tasks)?;
        w.write_u32::<LittleEndian>(self.emergency_meeting_count)?;
        w.write_u8(self.num_impostors)?;
        w.write_u8(self.kill_distance)?;
        w.write_u32::<LittleEndian>(self.discussion_time)?;
        w.write_u32::<LittleEndian>(self.voting_time)?;
        w.write_u8(self.public as u8)?;

        if self.version >= 2 {
            w.write_u8(self.emergency_cooldown)?;
        }
        if self.version >= 3 {
            w.write_u8(self.confirm_impostor as u8)?;
            w.write_u8(self.visual_tasks as u8)?;
        }
        if self.version >= 4 {
            w.write_u8(self.anonymous_votes as u8)?;
            w.write_u8(self.task_bar_updates as u8)?;
        }
        Ok(())
    }

    /// A reasonable default template, version 4, used e.g. when
    /// building `GetGameListV2` host requests.
    pub fn default_template() -> Game {
        Game {
            version: 4,
            max_players: 10,
            keywords: 0x02, // English
            map_id: MapId(0),
            player_speed: 1.0,
            crewmate_light: 1.0,
            impostor_light: 1.5,
            kill_cooldown: 45.0,
            num_common_tasks: 1,
            num_long_tasks: 1,
            num_short_tasks: 2,
            emergency_meeting_count: 1,
            num_impostors: 1,
            kill_distance: 1,
            discussion_time: 15,
            voting_time: 120,
            public: true,
            emergency_cooldown: 15,
            confirm_impostor: true,
            visual_tasks: true,
            anonymous_votes: false,
            task_bar_updates: true,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn roundtrip(version: u8) {
        let mut game = Game::default_template();
        game.version = version;
        let mut buf = Vec::new();
        game.serialize(&mut buf).unwrap();
        let mut cursor = io::Cursor::new(&buf[..]);
        let back = Game::deserialize(&mut cursor).unwrap();
        assert_eq!(game, back);
        assert_eq!(cursor.position() as usize, buf.len());
    }

    #[test]
    fn test_roundtrip_all_versions() {
        roundtrip(1);
        roundtrip(2);
        roundtrip(3);
        roundtrip(4);
    }

    #[test]
    fn test_deserialize_matches_original_fixed_layout() {
        // Hand-built bytes in the original's field order: the
        // unconditional `emergencyMeetings` u32 sits right after
        // `num_short_tasks` and before `num_impostors`, and the
        // version-gated `emergency_cooldown` is a single byte.
        let mut buf = Vec::new();
        buf.write_u8(4).unwrap(); // version
        buf.write_u8(10).unwrap(); // max_players
        buf.write_u32::<LittleEndian>(0x02).unwrap(); // keywords
        buf.write_u8(0).unwrap(); // map_id
        buf.write_f32::<LittleEndian>(1.0).unwrap(); // player_speed
        buf.write_f32::<LittleEndian>(1.0).unwrap(); // crewmate_light
        buf.write_f32::<LittleEndian>(1.5).unwrap(); // impostor_light
        buf.write_f32::<LittleEndian>(45.0).unwrap(); // kill_cooldown
        buf.write_u8(1).unwrap(); // num_common_tasks
        buf.write_u8(1).unwrap(); // num_long_tasks
        buf.write_u8(2).unwrap(); // num_short_tasks
        buf.write_u32::<LittleEndian>(9).unwrap(); // emergency_meeting_count
        buf.write_u8(2).unwrap(); // num_impostors
        buf.write_u8(1).unwrap(); // kill_distance
        buf.write_u32::<LittleEndian>(15).unwrap(); // discussion_time
        buf.write_u32::<LittleEndian>(120).unwrap(); // voting_time
        buf.write_u8(1).unwrap(); // public
        buf.write_u8(17).unwrap(); // emergency_cooldown (version >= 2)
        buf.write_u8(1).unwrap(); // confirm_impostor (version >= 3)
        buf.write_u8(0).unwrap(); // visual_tasks (version >= 3)
        buf.write_u8(1).unwrap(); // anonymous_votes (version >= 4)
        buf.write_u8(1).unwrap(); // task_bar_updates (version >= 4)

        let mut cursor = io::Cursor::new(&buf[..]);
        let game = Game::deserialize(&mut cursor).unwrap();
        assert_eq!(game.emergency_meeting_count, 9);
        assert_eq!(game.num_impostors, 2);
        assert_eq!(game.discussion_time, 15);
        assert_eq!(game.voting_time, 120);
        assert!(game.public);
        assert_eq!(game.emergency_cooldown, 17);
        assert!(game.confirm_impostor);
        assert!(!game.visual_tasks);
        assert!(game.anonymous_votes);
        assert!(game.task_bar_updates);
        assert_eq!(cursor.position() as usize, buf.len());
    }
}
