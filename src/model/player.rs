//! The lobby's player roster (§3, §4.7).

use crate::bytes::Vector2;
use fnv::FnvHashMap;

bitflags! {
    /// Status bits packed into [`Player::status`].
    pub struct PlayerStatus: u8 {
        /// The player's client disconnected
        const DISCONNECTED = 0x01;
        /// The player is an impostor
        const IMPOSTOR = 0x02;
        /// The player is dead
        const DEAD = 0x04;
    }
}

/// The three per-component net-ids a `PlayerControl` spawn declares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NetIds {
    /// Cosmetics/tasks/identity component
    pub control: Option<u32>,
    /// Vent/collision component
    pub physics: Option<u32>,
    /// Movement-sync component
    pub network: Option<u32>,
}

impl NetIds {
    /// Whether all three net-ids are known.
    pub fn is_complete(&self) -> bool {
        self.control.is_some() && self.physics.is_some() && self.network.is_some()
    }

    /// Merges another set of net-ids in, keeping existing values unless
    /// `other` is fully populated (see `PlayerList::upsert`'s overwrite rule).
    fn merge_keep_unless_complete(&mut self, other: NetIds) {
        if other.is_complete() {
            *self = other;
        }
    }
}

/// A single task slot and whether it has been completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskState {
    /// The task's id
    pub task_id: u32,
    /// Whether it has been completed
    pub complete: bool,
}

/// A player in the current lobby/game.
#[derive(Debug, Clone, PartialEq)]
pub struct Player {
    /// Stable short id within the lobby
    pub id: u8,
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
    /// Packed status bits; see [`PlayerStatus`]
    pub status: u8,
    /// This player's tasks and completion state
    pub tasks: Vec<TaskState>,
    /// The three per-component net-ids, once known
    pub net_ids: NetIds,
    /// The connected client id owning this player
    pub client_id: u32,
    /// Whether this player is the current host
    pub host: bool,
    /// Position, updated by Movement data-flags
    pub position: Vector2,
    /// Velocity, updated by Movement data-flags
    pub velocity: Vector2,
    /// Position at time of death, if dead
    pub death_position: Option<Vector2>,
    /// The last accepted movement sequence id, for monotonicity
    pub last_seen_seq: u16,
}

impl Player {
    /// Creates a freshly-seen player with no net-ids yet known.
    pub fn new(id: u8, client_id: u32, name: String) -> Player {
        Player {
            id,
            name,
            color: 0,
            hat: 0,
            pet: 0,
            skin: 0,
            status: 0,
            tasks: Vec::new(),
            net_ids: NetIds::default(),
            client_id,
            host: false,
            position: Vector2::new(0.0, 0.0),
            velocity: Vector2::new(0.0, 0.0),
            death_position: None,
            last_seen_seq: 0,
        }
    }

    /// Whether this player is an impostor, per the status bitfield.
    pub fn is_impostor(&self) -> bool {
        self.status & PlayerStatus::IMPOSTOR.bits() != 0
    }

    /// Whether this player is dead, per the status bitfield.
    pub fn is_dead(&self) -> bool {
        self.status & PlayerStatus::DEAD.bits() != 0
    }

    /// Whether this player's three net-ids are all known.
    pub fn is_complete(&self) -> bool {
        self.net_ids.is_complete()
    }
}

/// The in-memory roster of an in-progress lobby/game.
#[derive(Debug, Default)]
pub struct PlayerList {
    players: FnvHashMap<u8, Player>,
    /// The number of players the server announced via the `GameData`
    /// spawn; the roster is complete once this many players are known
    /// and each of them is [`Player::is_complete`].
    pub expected_count: Option<usize>,
}

impl PlayerList {
    /// Creates an empty roster.
    pub fn new() -> PlayerList {
        PlayerList::default()
    }

    /// Adds a player, or overwrites an existing entry with the same id.
    ///
    /// Per §4.7: net-ids on an overwrite are kept from the existing
    /// record unless the incoming record has all three net-ids present.
    pub fn upsert(&mut self, mut player: Player) {
        if let Some(existing) = self.players.get(&player.id) {
            let mut merged_ids = existing.net_ids;
            merged_ids.merge_keep_unless_complete(player.net_ids);
            player.net_ids = merged_ids;
        }
        self.players.insert(player.id, player);
    }

    /// Removes a player by id, returning it if present.
    pub fn remove(&mut self, id: u8) -> Option<Player> {
        self.players.remove(&id)
    }

    /// Looks up a player by its stable short id.
    pub fn by_id(&self, id: u8) -> Option<&Player> {
        self.players.get(&id)
    }

    /// Looks up a mutable player by its stable short id.
    pub fn by_id_mut(&mut self, id: u8) -> Option<&mut Player> {
        self.players.get_mut(&id)
    }

    /// Looks up a player owning the given net-id, in any of the three
    /// component roles.
    pub fn by_net_id(&self, net_id: u32) -> Option<&Player> {
        self.players.values().find(|p| {
            p.net_ids.control == Some(net_id)
                || p.net_ids.physics == Some(net_id)
                || p.net_ids.network == Some(net_id)
        })
    }

    /// Mutable version of [`PlayerList::by_net_id`].
    pub fn by_net_id_mut(&mut self, net_id: u32) -> Option<&mut Player> {
        self.players.values_mut().find(|p| {
            p.net_ids.control == Some(net_id)
                || p.net_ids.physics == Some(net_id)
                || p.net_ids.network == Some(net_id)
        })
    }

    /// Iterates over every known player.
    pub fn iter(&self) -> impl Iterator<Item = &Player> {
        self.players.values()
    }

    /// The number of known players.
    pub fn len(&self) -> usize {
        self.players.len()
    }

    /// Whether the roster has no players at all.
    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    /// True once every known player is complete and the count matches
    /// the announced `expected_count` (§3 invariants).
    pub fn is_complete(&self) -> bool {
        match self.expected_count {
            Some(expected) => self.players.len() == expected && self.players.values().all(Player::is_complete),
            None => false,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_overwrite_keeps_existing_net_ids_unless_complete() {
        let mut list = PlayerList::new();
        let mut p = Player::new(1, 42, "Boot".into());
        p.net_ids.control = Some(10);
        list.upsert(p);

        let mut update = Player::new(1, 42, "Boot".into());
        update.color = 3;
        list.upsert(update);

        let stored = list.by_id(1).unwrap();
        assert_eq!(stored.color, 3);
        assert_eq!(stored.net_ids.control, Some(10));
        assert!(!stored.is_complete());

        let mut full = Player::new(1, 42, "Boot".into());
        full.net_ids = NetIds { control: Some(1), physics: Some(2), network: Some(3) };
        list.upsert(full);
        let stored = list.by_id(1).unwrap();
        assert_eq!(stored.net_ids.control, Some(1));
        assert!(stored.is_complete());
    }

    #[test]
    fn test_lookup_by_any_net_id() {
        let mut list = PlayerList::new();
        let mut p = Player::new(5, 1, "A".into());
        p.net_ids = NetIds { control: Some(100), physics: Some(101), network: Some(102) };
        list.upsert(p);

        assert_eq!(list.by_net_id(101).map(|p| p.id), Some(5));
        assert_eq!(list.by_net_id(999), None);
    }

    #[test]
    fn test_roster_completeness() {
        let mut list = PlayerList::new();
        list.expected_count = Some(2);
        assert!(!list.is_complete());

        let mut p1 = Player::new(1, 1, "A".into());
        p1.net_ids = NetIds { control: Some(1), physics: Some(2), network: Some(3) };
        list.upsert(p1);
        assert!(!list.is_complete());

        let mut p2 = Player::new(2, 2, "B".into());
        p2.net_ids = NetIds { control: Some(4), physics: Some(5), network: Some(6) };
        list.upsert(p2);
        assert!(list.is_complete());
    }
}
