#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the Blastgrid engine.
//!
//! This crate defines the surface that connects the authoritative world,
//! the agent execution boundary, and presentation clients. The engine is
//! the single writer of world state; agents and clients only ever observe
//! serialized, read-only views ([`GameState`], [`PlayerState`],
//! [`GameStats`]) and feed actions back through a small fixed vocabulary
//! ([`PlayerAction`]).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Unique identifier assigned to a player, monotonically allocated by the
/// engine at registration time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PlayerId(u32);

impl PlayerId {
    /// Creates a new player identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for PlayerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Location of a single grid cell expressed as column and row coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellCoord {
    column: u32,
    row: u32,
}

impl CellCoord {
    /// Creates a new grid cell coordinate.
    #[must_use]
    pub const fn new(column: u32, row: u32) -> Self {
        Self { column, row }
    }

    /// Zero-based column index of the cell.
    #[must_use]
    pub const fn column(&self) -> u32 {
        self.column
    }

    /// Zero-based row index of the cell.
    #[must_use]
    pub const fn row(&self) -> u32 {
        self.row
    }

    /// Translates the cell by the provided deltas, returning `None` when the
    /// result would leave the non-negative quadrant. Bounds against a
    /// specific grid are the caller's concern.
    #[must_use]
    pub fn offset(self, delta_column: i64, delta_row: i64) -> Option<CellCoord> {
        let column = i64::from(self.column).checked_add(delta_column)?;
        let row = i64::from(self.row).checked_add(delta_row)?;
        if column < 0 || row < 0 {
            return None;
        }
        Some(CellCoord::new(
            u32::try_from(column).ok()?,
            u32::try_from(row).ok()?,
        ))
    }
}

/// Actions a player may take on a single tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PlayerAction {
    /// Do nothing this tick.
    NoOp,
    /// Move one cell toward increasing row indices.
    Up,
    /// Move one cell toward decreasing row indices.
    Down,
    /// Move one cell toward decreasing column indices.
    Left,
    /// Move one cell toward increasing column indices.
    Right,
    /// Arm a bomb on the player's current cell.
    PlaceBomb,
}

impl PlayerAction {
    /// Wire code used by the recorder and the worker result channel.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::NoOp => "",
            Self::Up => "u",
            Self::Down => "d",
            Self::Left => "l",
            Self::Right => "r",
            Self::PlaceBomb => "p",
        }
    }

    /// Decodes a wire token into an action. `"b"` is accepted as a legacy
    /// alias for bomb placement; unknown tokens decode to `None` so callers
    /// can log and ignore them.
    #[must_use]
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "" => Some(Self::NoOp),
            "u" => Some(Self::Up),
            "d" => Some(Self::Down),
            "l" => Some(Self::Left),
            "r" => Some(Self::Right),
            "p" | "b" => Some(Self::PlaceBomb),
            _ => None,
        }
    }
}

/// Tags identifying non-player entities in the serialized occupancy map.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityTag {
    /// Collectable ammunition.
    #[serde(rename = "a")]
    Ammo,
    /// Collectable treasure.
    #[serde(rename = "t")]
    Treasure,
    /// An armed bomb.
    #[serde(rename = "b")]
    Bomb,
    /// Destructible low-value block.
    #[serde(rename = "sb")]
    SoftBlock,
    /// Destructible high-value block.
    #[serde(rename = "ob")]
    OreBlock,
    /// Indestructible block.
    #[serde(rename = "ib")]
    IndestructibleBlock,
}

/// A single occupancy-map cell tag: either a player id or an entity tag.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MapTag {
    /// Cell occupied by the identified player.
    Player(PlayerId),
    /// Cell occupied by a non-player entity.
    Entity(EntityTag),
}

/// Sparse per-cell occupancy view serialized for agent perception.
///
/// Writes are last-writer-wins per cell; the engine writes layers in a
/// fixed order (players, static blocks, value blocks, ammo, treasure,
/// bombs) so the visible tag for a shared cell is deterministic.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OccupancyMap {
    cells: BTreeMap<u32, BTreeMap<u32, MapTag>>,
}

impl OccupancyMap {
    /// Creates an empty occupancy map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Writes a tag at the provided cell, replacing any previous tag.
    pub fn set(&mut self, cell: CellCoord, tag: MapTag) {
        let _ = self
            .cells
            .entry(cell.column())
            .or_default()
            .insert(cell.row(), tag);
    }

    /// Returns the tag written at the provided cell, if any.
    #[must_use]
    pub fn get(&self, cell: CellCoord) -> Option<MapTag> {
        self.cells
            .get(&cell.column())
            .and_then(|column| column.get(&cell.row()))
            .copied()
    }

    /// Iterates over every occupied cell with its tag.
    pub fn iter(&self) -> impl Iterator<Item = (CellCoord, MapTag)> + '_ {
        self.cells.iter().flat_map(|(column, rows)| {
            rows.iter()
                .map(move |(row, tag)| (CellCoord::new(*column, *row), *tag))
        })
    }
}

/// Read-only snapshot of the world handed to agents once per tick.
#[derive(Clone, Debug, PartialEq)]
pub struct GameState {
    is_over: bool,
    tick_number: u64,
    size: (u32, u32),
    occupancy: OccupancyMap,
    ammo: Vec<CellCoord>,
    treasure: Vec<CellCoord>,
    bombs: Vec<CellCoord>,
    blocks: Vec<(EntityTag, CellCoord)>,
    players: Vec<(PlayerId, Option<CellCoord>)>,
}

impl GameState {
    /// Assembles a new snapshot from serialized world collections.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        is_over: bool,
        tick_number: u64,
        size: (u32, u32),
        occupancy: OccupancyMap,
        ammo: Vec<CellCoord>,
        treasure: Vec<CellCoord>,
        bombs: Vec<CellCoord>,
        blocks: Vec<(EntityTag, CellCoord)>,
        players: Vec<(PlayerId, Option<CellCoord>)>,
    ) -> Self {
        Self {
            is_over,
            tick_number,
            size,
            occupancy,
            ammo,
            treasure,
            bombs,
            blocks,
            players,
        }
    }

    /// Reports whether the match had ended when the snapshot was taken.
    #[must_use]
    pub const fn is_over(&self) -> bool {
        self.is_over
    }

    /// Tick number at which the snapshot was taken.
    #[must_use]
    pub const fn tick_number(&self) -> u64 {
        self.tick_number
    }

    /// Grid dimensions as `(columns, rows)`.
    #[must_use]
    pub const fn size(&self) -> (u32, u32) {
        self.size
    }

    /// Serialized occupancy map.
    #[must_use]
    pub const fn occupancy(&self) -> &OccupancyMap {
        &self.occupancy
    }

    /// Positions of collectable ammunition.
    #[must_use]
    pub fn ammo(&self) -> &[CellCoord] {
        &self.ammo
    }

    /// Positions of collectable treasure.
    #[must_use]
    pub fn treasure(&self) -> &[CellCoord] {
        &self.treasure
    }

    /// Positions of armed bombs.
    #[must_use]
    pub fn bombs(&self) -> &[CellCoord] {
        &self.bombs
    }

    /// Tagged positions of every block on the map.
    #[must_use]
    pub fn blocks(&self) -> &[(EntityTag, CellCoord)] {
        &self.blocks
    }

    /// Every registered player with its position, dead players included.
    #[must_use]
    pub fn players(&self) -> &[(PlayerId, Option<CellCoord>)] {
        &self.players
    }

    /// Tests whether a cell lies within the grid.
    #[must_use]
    pub const fn is_in_bounds(&self, cell: CellCoord) -> bool {
        cell.column() < self.size.0 && cell.row() < self.size.1
    }

    /// Returns the visible tag at a cell, or `None` for free or
    /// out-of-bounds cells. Out-of-bounds lookups never fail.
    #[must_use]
    pub fn entity_at(&self, cell: CellCoord) -> Option<MapTag> {
        if !self.is_in_bounds(cell) {
            return None;
        }
        self.occupancy.get(cell)
    }

    /// Tests whether any tag is visible at the cell.
    #[must_use]
    pub fn is_occupied(&self, cell: CellCoord) -> bool {
        self.entity_at(cell).is_some()
    }

    /// Positions of every player other than the excluded one.
    #[must_use]
    pub fn opponents(&self, excluding: PlayerId) -> Vec<CellCoord> {
        self.players
            .iter()
            .filter(|(pid, _)| *pid != excluding)
            .filter_map(|(_, position)| *position)
            .collect()
    }
}

/// Per-player view handed to that player's agent alongside the game state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PlayerState {
    /// Identifier of the player this view describes.
    pub id: PlayerId,
    /// Bombs the player can still place.
    pub ammo: u32,
    /// Remaining hit points; zero means dead.
    pub hp: u32,
    /// Current cell, `None` before the map is generated.
    pub position: Option<CellCoord>,
    /// Accumulated reward; may be negative.
    pub reward: i64,
    /// Blast radius of bombs placed by the player.
    pub power: u32,
}

/// Per-player entry in the presentation stats report.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PlayerStat {
    /// Display name of the player.
    pub name: String,
    /// Whether the player is driven by an agent rather than a human.
    pub is_bot: bool,
    /// Accumulated reward.
    pub score: i64,
    /// Remaining hit points.
    pub hp: u32,
    /// Bombs the player can still place.
    pub ammo: u32,
    /// Current cell, `None` before the map is generated.
    pub position: Option<CellCoord>,
}

/// Per-tick report consumed by presentation clients.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct GameStats {
    /// Whether the match has ended.
    pub is_over: bool,
    /// Number of completed ticks.
    pub iteration: u64,
    /// Winning player once the match is over, if any player survived or
    /// outscored the field.
    pub winner: Option<PlayerId>,
    /// Stats for every registered player, dead players included.
    pub players: BTreeMap<PlayerId, PlayerStat>,
}

/// Events appended to the match log, one per line.
#[derive(Clone, Debug, PartialEq)]
pub enum GameEvent {
    /// A new map was generated from the given seed.
    MapGenerated {
        /// Seed the engine rng was initialized with.
        seed: u64,
        /// Occupancy map of the freshly generated world.
        map: OccupancyMap,
    },
    /// A player joined the match.
    PlayerAdded {
        /// Identifier assigned at registration.
        pid: PlayerId,
        /// Display name of the player.
        name: String,
    },
    /// A player's action was admitted for execution.
    Move {
        /// Acting player.
        pid: PlayerId,
        /// Admitted action.
        action: PlayerAction,
    },
}

/// Sink for match events. The engine records map generation, player
/// registration, and every admitted move.
pub trait Recorder {
    /// Appends one event observed at the given tick.
    fn record(&mut self, tick: u64, event: &GameEvent);
}

/// Recorder that discards everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullRecorder;

impl Recorder for NullRecorder {
    fn record(&mut self, _tick: u64, _event: &GameEvent) {}
}

/// Engine-facing contract for one player's decision source.
///
/// The engine calls `update` once per tick with fresh views, then expects
/// `next_move` to reflect them on a later poll. Both calls must be
/// non-blocking; a slow or faulty implementation answers `None` and the
/// engine treats the tick as a no-op for that player.
pub trait Agent {
    /// Delivers the latest world and player views.
    fn update(&mut self, game: &GameState, player: &PlayerState);

    /// Polls for the agent's chosen action, if one is available.
    fn next_move(&mut self) -> Option<PlayerAction>;

    /// Notifies the agent that the match has ended.
    fn on_game_over(&mut self, game: &GameState, player: &PlayerState);
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::de::DeserializeOwned;

    fn assert_round_trip<T>(value: &T)
    where
        T: Serialize + DeserializeOwned + PartialEq + std::fmt::Debug,
    {
        let bytes = bincode::serialize(value).expect("serialize");
        let restored: T = bincode::deserialize(&bytes).expect("deserialize");
        assert_eq!(&restored, value);
    }

    #[test]
    fn player_id_round_trips_through_bincode() {
        assert_round_trip(&PlayerId::new(7));
    }

    #[test]
    fn cell_coord_round_trips_through_bincode() {
        assert_round_trip(&CellCoord::new(11, 9));
    }

    #[test]
    fn action_codes_round_trip() {
        for action in [
            PlayerAction::NoOp,
            PlayerAction::Up,
            PlayerAction::Down,
            PlayerAction::Left,
            PlayerAction::Right,
            PlayerAction::PlaceBomb,
        ] {
            assert_eq!(PlayerAction::from_code(action.code()), Some(action));
        }
    }

    #[test]
    fn legacy_bomb_alias_decodes() {
        assert_eq!(PlayerAction::from_code("b"), Some(PlayerAction::PlaceBomb));
    }

    #[test]
    fn unknown_tokens_decode_to_none() {
        assert_eq!(PlayerAction::from_code("zz"), None);
        assert_eq!(PlayerAction::from_code("can_haz_boom"), None);
    }

    #[test]
    fn offset_rejects_departure_from_quadrant() {
        let origin = CellCoord::new(0, 3);
        assert_eq!(origin.offset(-1, 0), None);
        assert_eq!(origin.offset(2, -3), Some(CellCoord::new(2, 0)));
    }

    #[test]
    fn occupancy_writes_are_last_writer_wins() {
        let mut map = OccupancyMap::new();
        let cell = CellCoord::new(4, 2);
        map.set(cell, MapTag::Player(PlayerId::new(0)));
        map.set(cell, MapTag::Entity(EntityTag::Bomb));
        assert_eq!(map.get(cell), Some(MapTag::Entity(EntityTag::Bomb)));
    }

    #[test]
    fn occupancy_serializes_players_as_numbers_and_entities_as_tags() {
        let mut map = OccupancyMap::new();
        map.set(CellCoord::new(0, 0), MapTag::Player(PlayerId::new(3)));
        map.set(CellCoord::new(1, 2), MapTag::Entity(EntityTag::SoftBlock));
        let json = serde_json::to_string(&map).expect("serialize");
        assert_eq!(json, r#"{"0":{"0":3},"1":{"2":"sb"}}"#);

        let restored: OccupancyMap = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(restored, map);
    }

    #[test]
    fn entity_at_is_none_out_of_bounds() {
        let mut occupancy = OccupancyMap::new();
        occupancy.set(CellCoord::new(0, 0), MapTag::Entity(EntityTag::Ammo));
        let state = GameState::new(
            false,
            0,
            (2, 2),
            occupancy,
            vec![CellCoord::new(0, 0)],
            Vec::new(),
            Vec::new(),
            Vec::new(),
            Vec::new(),
        );
        assert_eq!(state.entity_at(CellCoord::new(5, 5)), None);
        assert!(!state.is_occupied(CellCoord::new(5, 5)));
        assert_eq!(
            state.entity_at(CellCoord::new(0, 0)),
            Some(MapTag::Entity(EntityTag::Ammo))
        );
    }

    #[test]
    fn opponents_excludes_the_requesting_player_and_unspawned() {
        let state = GameState::new(
            false,
            0,
            (4, 4),
            OccupancyMap::new(),
            Vec::new(),
            Vec::new(),
            Vec::new(),
            Vec::new(),
            vec![
                (PlayerId::new(0), Some(CellCoord::new(1, 1))),
                (PlayerId::new(1), Some(CellCoord::new(2, 2))),
                (PlayerId::new(2), None),
            ],
        );
        assert_eq!(state.opponents(PlayerId::new(0)), vec![CellCoord::new(2, 2)]);
    }
}
