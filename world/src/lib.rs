#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Authoritative world state and tick resolution for Blastgrid.
//!
//! The [`Game`] is the single writer: it owns the grid, every entity list,
//! the per-player action queues, and the seeded rng. Each call to
//! [`Game::tick`] runs the full resolution pipeline, from agent polling
//! through shuffled action application, hazard resolution, pickups, aging
//! and termination, and then pushes immutable [`GameState`] views back to
//! the registered agents. Agents and presentation clients never touch the
//! world directly.

pub mod entities;
mod mapgen;

use std::collections::{BTreeMap, VecDeque};

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use thiserror::Error;
use tracing::{debug, info};

use blastgrid_core::{
    Agent, CellCoord, EntityTag, GameEvent, GameState, GameStats, MapTag, NullRecorder,
    OccupancyMap, PlayerAction, PlayerId, PlayerState, PlayerStat, Recorder,
};
use entities::{
    Ammo, Bomb, DeadBody, DelayedEffect, DelayedEffectKind, Destructible, Fire, Perishable,
    Player, StaticBlock, Treasure, ValueBlock,
};

/// Tunable match rules. Replaces the pile of class constants of a typical
/// ruleset with one explicit value object passed at construction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rules {
    /// Number of indestructible blocks placed at generation.
    pub static_block_count: usize,
    /// Number of soft blocks placed at generation.
    pub soft_block_count: usize,
    /// Number of ore blocks placed at generation.
    pub ore_block_count: usize,
    /// Number of free ammunition pickups placed at generation.
    pub free_ammo_count: usize,
    /// Ammo a player starts the match with.
    pub player_start_ammo: u32,
    /// Hit points a player starts the match with.
    pub player_start_hp: u32,
    /// Blast radius a player starts the match with.
    pub player_start_power: u32,
    /// Hit points of a soft block.
    pub soft_block_hp: u32,
    /// Hit points of an ore block.
    pub ore_block_hp: u32,
    /// Reward paid for destroying a soft block.
    pub soft_block_reward: i64,
    /// Reward paid for destroying an ore block.
    pub ore_block_reward: i64,
    /// Reward value of a spawned treasure.
    pub treasure_reward: u32,
    /// Hit points removed from a player standing in fire.
    pub fire_hit: u32,
    /// Reward paid to a fire's owner per opponent hit.
    pub fire_reward: i64,
    /// Reward taken from a player standing in fire. Zero in the current
    /// ruleset; earlier rulesets used a nonzero penalty.
    pub fire_penalty: i64,
    /// Fuse length of a placed bomb, in ticks.
    pub bomb_ttl: u32,
    /// Ticks before an unclaimed ammunition pickup perishes.
    pub ammo_perish_ttl: u32,
    /// Ticks before consumed ammunition respawns somewhere else.
    pub ammo_respawn_ttl: u32,
    /// Lower bound of the randomized treasure spawn countdown.
    pub treasure_spawn_min: u32,
    /// Upper bound of the randomized treasure spawn countdown.
    pub treasure_spawn_max: u32,
    /// Tick cap after which the match ends with a score comparison.
    /// `None` runs until one player remains.
    pub max_iterations: Option<u64>,
}

impl Default for Rules {
    fn default() -> Self {
        Self {
            static_block_count: 18,
            soft_block_count: 20,
            ore_block_count: 5,
            free_ammo_count: 1,
            player_start_ammo: 3,
            player_start_hp: 3,
            player_start_power: 2,
            soft_block_hp: 1,
            ore_block_hp: 3,
            soft_block_reward: 2,
            ore_block_reward: 10,
            treasure_reward: 1,
            fire_hit: 1,
            fire_reward: 25,
            fire_penalty: 0,
            bomb_ttl: 35,
            ammo_perish_ttl: 5 * 35,
            ammo_respawn_ttl: 2 * 35,
            treasure_spawn_min: 50,
            treasure_spawn_max: 250,
            max_iterations: None,
        }
    }
}

/// Errors surfaced before or during scenario setup. Setup faults fail fast;
/// nothing mid-match returns an error.
#[derive(Debug, Error)]
pub enum GameError {
    /// The grid cannot host the configured players, blocks and items.
    #[error(
        "{columns}x{rows} grid cannot host {required} more placements ({available} cells free)"
    )]
    MapCapacity {
        /// Grid columns.
        columns: u32,
        /// Grid rows.
        rows: u32,
        /// Placements still required at the failing stage.
        required: usize,
        /// Free cells remaining at the failing stage.
        available: usize,
    },
    /// The treasure spawn countdown window is inverted.
    #[error("treasure spawn window {min}..={max} is inverted")]
    TreasureWindow {
        /// Configured lower bound.
        min: u32,
        /// Configured upper bound.
        max: u32,
    },
    /// The referenced player was never registered.
    #[error("unknown player {0}")]
    UnknownPlayer(PlayerId),
    /// The referenced cell lies outside the grid.
    #[error("cell ({0:?}) is out of bounds")]
    OutOfBounds(CellCoord),
    /// The referenced cell is already occupied.
    #[error("cell ({0:?}) is occupied")]
    Occupied(CellCoord),
}

/// Authoritative match state and tick engine.
pub struct Game {
    columns: u32,
    rows: u32,
    rules: Rules,
    rng: ChaCha8Rng,
    recorder: Box<dyn Recorder>,
    tick_counter: u64,
    is_over: bool,
    winner: Option<PlayerId>,
    next_pid: u32,
    players: BTreeMap<PlayerId, Player>,
    agents: BTreeMap<PlayerId, Box<dyn Agent>>,
    action_queues: BTreeMap<PlayerId, VecDeque<PlayerAction>>,
    effects: Vec<DelayedEffect>,
    static_blocks: Vec<StaticBlock>,
    value_blocks: Vec<ValueBlock>,
    ammo: Vec<Ammo>,
    treasure: Vec<Treasure>,
    bombs: Vec<Bomb>,
    fire: Vec<Fire>,
    dead_bodies: Vec<DeadBody>,
}

impl Game {
    /// Creates a new match on a `columns` x `rows` grid with a discarding
    /// recorder.
    #[must_use]
    pub fn new(columns: u32, rows: u32, rules: Rules) -> Self {
        Self::with_recorder(columns, rows, rules, Box::new(NullRecorder))
    }

    /// Creates a new match that appends its events to the given recorder.
    #[must_use]
    pub fn with_recorder(
        columns: u32,
        rows: u32,
        rules: Rules,
        recorder: Box<dyn Recorder>,
    ) -> Self {
        Self {
            columns,
            rows,
            rules,
            rng: ChaCha8Rng::seed_from_u64(0),
            recorder,
            tick_counter: 0,
            is_over: false,
            winner: None,
            next_pid: 0,
            players: BTreeMap::new(),
            agents: BTreeMap::new(),
            action_queues: BTreeMap::new(),
            effects: Vec::new(),
            static_blocks: Vec::new(),
            value_blocks: Vec::new(),
            ammo: Vec::new(),
            treasure: Vec::new(),
            bombs: Vec::new(),
            fire: Vec::new(),
            dead_bodies: Vec::new(),
        }
    }

    /// Registers a new player and returns its identifier. Registration is
    /// recorded in the event log.
    pub fn add_player(&mut self, name: Option<&str>) -> PlayerId {
        let pid = PlayerId::new(self.next_pid);
        self.next_pid += 1;
        let name = name.map_or_else(|| format!("P[{pid}]"), str::to_owned);
        let _ = self.players.insert(
            pid,
            Player::new(
                name.clone(),
                self.rules.player_start_hp,
                self.rules.player_start_ammo,
                self.rules.player_start_power,
            ),
        );
        self.recorder
            .record(self.tick_counter, &GameEvent::PlayerAdded { pid, name });
        pid
    }

    /// Registers a new agent-driven player and returns its identifier.
    pub fn add_agent(&mut self, agent: Box<dyn Agent>, name: Option<&str>) -> PlayerId {
        let pid = self.add_player(name);
        let _ = self.agents.insert(pid, agent);
        pid
    }

    /// Reports whether the player is driven by a registered agent rather
    /// than a human.
    #[must_use]
    pub fn is_bot(&self, pid: PlayerId) -> bool {
        self.agents.contains_key(&pid)
    }

    /// Queues an action for execution on a future tick. Each player's queue
    /// is FIFO and at most one entry is consumed per tick; a no-op is
    /// dropped outright since it is indistinguishable from silence.
    pub fn enqueue_action(&mut self, pid: PlayerId, action: PlayerAction) {
        if action == PlayerAction::NoOp {
            return;
        }
        self.action_queues.entry(pid).or_default().push_back(action);
    }

    /// Places a registered player on a specific cell, for deterministic
    /// scenario setups and replays. Fails on out-of-bounds or occupied
    /// cells.
    pub fn place_player(&mut self, pid: PlayerId, cell: CellCoord) -> Result<(), GameError> {
        if !self.is_in_bounds(cell) {
            return Err(GameError::OutOfBounds(cell));
        }
        if !self.players.contains_key(&pid) {
            return Err(GameError::UnknownPlayer(pid));
        }
        let occupied = self.block_at(cell)
            || self.bombs.iter().any(|bomb| bomb.position() == cell)
            || self
                .players
                .iter()
                .any(|(other, player)| *other != pid && player.position() == Some(cell));
        if occupied {
            return Err(GameError::Occupied(cell));
        }
        if let Some(player) = self.players.get_mut(&pid) {
            player.position = Some(cell);
        }
        Ok(())
    }

    /// Advances the match by one tick, running the full resolution
    /// pipeline in its fixed order.
    pub fn tick(&mut self) {
        if !self.is_over {
            // Poll agents of living players; a silent or faulty agent simply
            // contributes nothing this tick.
            let mut polled: Vec<(PlayerId, PlayerAction)> = Vec::new();
            for (pid, agent) in self.agents.iter_mut() {
                let alive = self.players.get(pid).map_or(false, Destructible::is_alive);
                if !alive {
                    continue;
                }
                if let Some(action) = agent.next_move() {
                    polled.push((*pid, action));
                }
            }
            for (pid, action) in polled {
                self.enqueue_action(pid, action);
            }

            // Admit at most one queued action per player, oldest first.
            // Admission order is player-id order; recording happens here,
            // before the shuffle, so a replay reproduces the match.
            let mut orders: Vec<(PlayerId, PlayerAction)> = Vec::new();
            for (pid, queue) in self.action_queues.iter_mut() {
                if let Some(action) = queue.pop_front() {
                    self.recorder
                        .record(self.tick_counter, &GameEvent::Move { pid: *pid, action });
                    orders.push((*pid, action));
                }
            }

            // Application order is uniformly shuffled; the draws come from
            // the engine rng so replays see the same order.
            orders.shuffle(&mut self.rng);
            for (pid, action) in orders {
                let _ = self.apply_action(pid, action);
            }

            self.resolve_fire_against_players();
            self.resolve_fire_against_entities();
            self.resolve_pickups();
        }

        self.age_entities();
        self.convert_dead_players();
        self.ignite_expired_bombs();
        self.apply_due_effects();
        self.compact();

        if !self.is_over {
            self.evaluate_termination();
            self.push_agent_views();
        }

        self.tick_counter += 1;
    }

    /// Per-tick stats report for presentation clients.
    #[must_use]
    pub fn stats(&self) -> GameStats {
        GameStats {
            is_over: self.is_over,
            iteration: self.tick_counter,
            winner: self.winner,
            players: self
                .players
                .iter()
                .map(|(pid, player)| {
                    (
                        *pid,
                        PlayerStat {
                            name: player.name().to_owned(),
                            is_bot: self.agents.contains_key(pid),
                            score: player.reward(),
                            hp: player.hp(),
                            ammo: player.ammo(),
                            position: player.position(),
                        },
                    )
                })
                .collect(),
        }
    }

    /// Serializes the world into an immutable agent-facing view.
    #[must_use]
    pub fn game_state(&self) -> GameState {
        let mut blocks: Vec<(EntityTag, CellCoord)> = self
            .static_blocks
            .iter()
            .map(|block| (EntityTag::IndestructibleBlock, block.position()))
            .collect();
        blocks.extend(
            self.value_blocks
                .iter()
                .map(|block| (block.kind().tag(), block.position())),
        );
        GameState::new(
            self.is_over,
            self.tick_counter,
            (self.columns, self.rows),
            self.occupancy_map(),
            self.ammo.iter().map(|item| item.position()).collect(),
            self.treasure.iter().map(|item| item.position()).collect(),
            self.bombs.iter().map(|bomb| bomb.position()).collect(),
            blocks,
            self.players
                .iter()
                .map(|(pid, player)| (*pid, player.position()))
                .collect(),
        )
    }

    /// Read-only view of one player, if registered.
    #[must_use]
    pub fn player_state(&self, pid: PlayerId) -> Option<PlayerState> {
        self.players.get(&pid).map(|player| Self::view_of(pid, player))
    }

    /// Delivers the terminal game-over notification to every registered
    /// agent.
    pub fn notify_game_over(&mut self) {
        let state = self.game_state();
        let views: Vec<(PlayerId, PlayerState)> = self
            .players
            .iter()
            .map(|(pid, player)| (*pid, Self::view_of(*pid, player)))
            .collect();
        for (pid, view) in views {
            if let Some(agent) = self.agents.get_mut(&pid) {
                agent.on_game_over(&state, &view);
            }
        }
    }

    /// Reports whether the match has ended.
    #[must_use]
    pub const fn is_over(&self) -> bool {
        self.is_over
    }

    /// Winning player once the match is over.
    #[must_use]
    pub const fn winner(&self) -> Option<PlayerId> {
        self.winner
    }

    /// Number of completed ticks.
    #[must_use]
    pub const fn tick_counter(&self) -> u64 {
        self.tick_counter
    }

    /// Grid dimensions as `(columns, rows)`.
    #[must_use]
    pub const fn size(&self) -> (u32, u32) {
        (self.columns, self.rows)
    }

    /// Rules the match was configured with.
    #[must_use]
    pub const fn rules(&self) -> &Rules {
        &self.rules
    }

    fn view_of(pid: PlayerId, player: &Player) -> PlayerState {
        PlayerState {
            id: pid,
            ammo: player.ammo(),
            hp: player.hp(),
            position: player.position(),
            reward: player.reward(),
            power: player.power(),
        }
    }

    fn apply_action(&mut self, pid: PlayerId, action: PlayerAction) -> bool {
        let alive = self.players.get(&pid).map_or(false, Destructible::is_alive);
        if !alive {
            // Dead or unknown players cannot act.
            return false;
        }
        match action {
            PlayerAction::NoOp => true,
            PlayerAction::Up => self.try_move(pid, 0, 1),
            PlayerAction::Down => self.try_move(pid, 0, -1),
            PlayerAction::Left => self.try_move(pid, -1, 0),
            PlayerAction::Right => self.try_move(pid, 1, 0),
            PlayerAction::PlaceBomb => self.place_bomb(pid),
        }
    }

    fn try_move(&mut self, pid: PlayerId, delta_column: i64, delta_row: i64) -> bool {
        let Some(origin) = self.players.get(&pid).and_then(Player::position) else {
            return false;
        };
        let column = (i64::from(origin.column()) + delta_column)
            .clamp(0, i64::from(self.columns) - 1) as u32;
        let row = (i64::from(origin.row()) + delta_row).clamp(0, i64::from(self.rows) - 1) as u32;
        let destination = CellCoord::new(column, row);
        // A clamped edge move lands on the actor's own cell and is rejected
        // like any other occupied destination.
        if self.movement_blocked(destination) {
            return false;
        }
        if let Some(player) = self.players.get_mut(&pid) {
            player.position = Some(destination);
        }
        true
    }

    fn place_bomb(&mut self, pid: PlayerId) -> bool {
        let Some((position, ammo, power)) = self
            .players
            .get(&pid)
            .and_then(|player| player.position().map(|pos| (pos, player.ammo(), player.power())))
        else {
            return false;
        };
        if ammo == 0 {
            return false;
        }
        if self.bombs.iter().any(|bomb| bomb.position() == position) {
            return false;
        }
        if let Some(player) = self.players.get_mut(&pid) {
            player.ammo -= 1;
        }
        self.bombs
            .push(Bomb::new(pid, position, self.rules.bomb_ttl, power));
        self.enqueue_effect(DelayedEffectKind::SpawnAmmo, self.rules.ammo_respawn_ttl);
        true
    }

    fn movement_blocked(&self, cell: CellCoord) -> bool {
        self.block_at(cell)
            || self
                .players
                .values()
                .any(|player| player.position() == Some(cell))
            || self.bombs.iter().any(|bomb| bomb.position() == cell)
    }

    fn block_at(&self, cell: CellCoord) -> bool {
        self.static_blocks
            .iter()
            .any(|block| block.position() == cell)
            || self
                .value_blocks
                .iter()
                .any(|block| block.position() == cell)
    }

    fn resolve_fire_against_players(&mut self) {
        let mut hits: Vec<(PlayerId, PlayerId)> = Vec::new();
        for (pid, player) in &self.players {
            if !player.is_alive() {
                continue;
            }
            let Some(position) = player.position() else {
                continue;
            };
            for fire in self.fire.iter().filter(|fire| fire.position() == position) {
                hits.push((*pid, fire.owner()));
            }
        }
        for (victim, owner) in hits {
            if let Some(player) = self.players.get_mut(&victim) {
                let _ = player.apply_hit(self.rules.fire_hit);
                player.reward -= self.rules.fire_penalty;
            }
            if owner != victim {
                if let Some(owner_player) = self.players.get_mut(&owner) {
                    owner_player.reward += self.rules.fire_reward;
                }
            }
        }
    }

    fn resolve_fire_against_entities(&mut self) {
        let blasts: Vec<(CellCoord, PlayerId)> = self
            .fire
            .iter()
            .map(|fire| (fire.position(), fire.owner()))
            .collect();
        for (position, owner) in blasts {
            let mut payout: i64 = 0;
            for block in self
                .value_blocks
                .iter_mut()
                .filter(|block| block.position() == position)
            {
                let was_alive = block.is_alive();
                let _ = block.apply_hit(self.rules.fire_hit);
                if was_alive && !block.is_alive() {
                    payout += block.reward;
                }
            }
            if payout != 0 {
                if let Some(owner_player) = self.players.get_mut(&owner) {
                    owner_player.reward += payout;
                }
            }
            // Overlapped bombs detonate with full remaining damage; their
            // fire appears through the normal expiry step, so chains never
            // recurse within the application loop.
            for bomb in self
                .bombs
                .iter_mut()
                .filter(|bomb| bomb.position() == position)
            {
                let remaining = bomb.hp();
                let _ = bomb.apply_hit(remaining);
            }
        }
    }

    fn resolve_pickups(&mut self) {
        for player in self.players.values_mut() {
            if !player.is_alive() {
                continue;
            }
            let Some(position) = player.position() else {
                continue;
            };
            for item in self.ammo.iter_mut().filter(|item| item.position() == position) {
                player.ammo += item.value;
                item.value = 0;
            }
            for item in self
                .treasure
                .iter_mut()
                .filter(|item| item.position() == position)
            {
                player.reward += i64::from(item.value);
                item.value = 0;
            }
        }
    }

    fn age_entities(&mut self) {
        for effect in &mut self.effects {
            let _ = effect.update();
        }
        for bomb in &mut self.bombs {
            let _ = bomb.update();
        }
        for fire in &mut self.fire {
            let _ = fire.update();
        }
        let mut respawn_requests = 0;
        for item in &mut self.ammo {
            let was_ticking = item.hp() > 0;
            let remaining = item.update();
            if was_ticking && remaining == 0 && item.respawns {
                respawn_requests += 1;
            }
        }
        for _ in 0..respawn_requests {
            self.enqueue_effect(DelayedEffectKind::SpawnAmmo, self.rules.ammo_respawn_ttl);
        }
        // Value blocks and players only lose hp to damage, never to age.
    }

    fn convert_dead_players(&mut self) {
        let newly_dead: Vec<(PlayerId, CellCoord)> = self
            .players
            .iter()
            .filter(|(_, player)| !player.is_alive())
            .filter_map(|(pid, player)| player.position().map(|position| (*pid, position)))
            .filter(|(pid, _)| !self.dead_bodies.iter().any(|body| body.pid() == *pid))
            .collect();
        for (pid, position) in newly_dead {
            info!(player = %pid, ?position, "player died");
            self.dead_bodies.push(DeadBody::new(pid, position));
        }
    }

    fn ignite_expired_bombs(&mut self) {
        let expired: Vec<(PlayerId, CellCoord, u32)> = self
            .bombs
            .iter()
            .filter(|bomb| !bomb.is_alive())
            .map(|bomb| (bomb.owner(), bomb.position(), bomb.power()))
            .collect();
        for (owner, position, power) in expired {
            self.start_fire(owner, position, power);
        }
    }

    fn start_fire(&mut self, owner: PlayerId, origin: CellCoord, power: u32) {
        self.fire.push(Fire::new(owner, origin));
        for (delta_column, delta_row) in [(-1_i64, 0_i64), (1, 0), (0, -1), (0, 1)] {
            for step in 1..=i64::from(power) {
                let Some(cell) = origin.offset(delta_column * step, delta_row * step) else {
                    break;
                };
                if !self.is_in_bounds(cell) {
                    break;
                }
                // The blocking cell itself still burns; the arm stops after it.
                let blocked =
                    self.block_at(cell) || self.bombs.iter().any(|bomb| bomb.position() == cell);
                self.fire.push(Fire::new(owner, cell));
                if blocked {
                    break;
                }
            }
        }
    }

    fn apply_due_effects(&mut self) {
        let due: Vec<DelayedEffectKind> = self
            .effects
            .iter()
            .filter(|effect| !effect.is_alive())
            .map(|effect| effect.kind())
            .collect();
        for kind in due {
            match kind {
                DelayedEffectKind::SpawnAmmo => self.spawn_ammo(),
                DelayedEffectKind::SpawnTreasure => self.spawn_treasure(),
            }
        }
    }

    fn spawn_ammo(&mut self) {
        let free = self.free_cells();
        if free.is_empty() {
            debug!("no free cell for ammo, deferring spawn");
            self.enqueue_effect(DelayedEffectKind::SpawnAmmo, self.rules.ammo_respawn_ttl);
            return;
        }
        let cell = free[self.gen_index(free.len())];
        self.ammo
            .push(Ammo::new(cell, self.rules.ammo_perish_ttl, 1, true));
    }

    fn spawn_treasure(&mut self) {
        let free = self.free_cells();
        if free.is_empty() {
            debug!("no free cell for treasure, deferring spawn");
            let ttl = self.gen_countdown(1, self.rules.treasure_spawn_min.max(1));
            self.enqueue_effect(DelayedEffectKind::SpawnTreasure, ttl);
            return;
        }
        let cell = free[self.gen_index(free.len())];
        self.treasure
            .push(Treasure::new(cell, self.rules.treasure_reward));
        let ttl = self.gen_countdown(self.rules.treasure_spawn_min, self.rules.treasure_spawn_max);
        self.enqueue_effect(DelayedEffectKind::SpawnTreasure, ttl);
    }

    fn gen_index(&mut self, bound: usize) -> usize {
        use rand::Rng as _;
        self.rng.gen_range(0..bound)
    }

    /// Callers guarantee `min <= max`; [`Game::generate_map`] rejects an
    /// inverted treasure window up front.
    fn gen_countdown(&mut self, min: u32, max: u32) -> u32 {
        use rand::Rng as _;
        self.rng.gen_range(min..=max)
    }

    fn enqueue_effect(&mut self, kind: DelayedEffectKind, ttl: u32) {
        if ttl == 0 {
            return;
        }
        self.effects.push(DelayedEffect::new(kind, ttl));
    }

    fn compact(&mut self) {
        self.effects.retain(Destructible::is_alive);
        self.ammo.retain(Destructible::is_alive);
        self.treasure.retain(Destructible::is_alive);
        self.bombs.retain(Destructible::is_alive);
        self.fire.retain(Destructible::is_alive);
        self.value_blocks.retain(Destructible::is_alive);
    }

    fn evaluate_termination(&mut self) {
        let over_iteration_limit = self
            .rules
            .max_iterations
            .map_or(false, |limit| self.tick_counter > limit);
        let living = self
            .players
            .values()
            .filter(|player| player.is_alive())
            .count();
        let has_opponents = living > 1;
        self.is_over = !has_opponents || over_iteration_limit;
        if self.is_over {
            self.winner = if has_opponents {
                // Cap reached with several players standing: strictly highest
                // reward wins, ties resolve to the highest player id.
                self.players
                    .iter()
                    .max_by_key(|(pid, player)| (player.reward(), **pid))
                    .map(|(pid, _)| *pid)
            } else {
                self.players
                    .iter()
                    .find(|(_, player)| player.is_alive())
                    .map(|(pid, _)| *pid)
            };
            info!(tick = self.tick_counter, winner = ?self.winner, "match over");
        }
    }

    fn push_agent_views(&mut self) {
        let state = self.game_state();
        let views: Vec<(PlayerId, PlayerState)> = self
            .players
            .iter()
            .map(|(pid, player)| (*pid, Self::view_of(*pid, player)))
            .collect();
        for (pid, view) in views {
            if let Some(agent) = self.agents.get_mut(&pid) {
                agent.update(&state, &view);
            }
        }
    }

    fn occupancy_map(&self) -> OccupancyMap {
        let mut map = OccupancyMap::new();
        // Fixed write order; later layers win shared cells.
        for (pid, player) in &self.players {
            if let Some(position) = player.position() {
                map.set(position, MapTag::Player(*pid));
            }
        }
        for block in &self.static_blocks {
            map.set(
                block.position(),
                MapTag::Entity(EntityTag::IndestructibleBlock),
            );
        }
        for block in &self.value_blocks {
            map.set(block.position(), MapTag::Entity(block.kind().tag()));
        }
        for item in &self.ammo {
            map.set(item.position(), MapTag::Entity(EntityTag::Ammo));
        }
        for item in &self.treasure {
            map.set(item.position(), MapTag::Entity(EntityTag::Treasure));
        }
        for bomb in &self.bombs {
            map.set(bomb.position(), MapTag::Entity(EntityTag::Bomb));
        }
        map
    }

    fn free_cells(&self) -> Vec<CellCoord> {
        let mut free = Vec::new();
        for column in 0..self.columns {
            for row in 0..self.rows {
                let cell = CellCoord::new(column, row);
                let occupied = self
                    .players
                    .values()
                    .any(|player| player.position() == Some(cell))
                    || self.block_at(cell)
                    || self.ammo.iter().any(|item| item.position() == cell)
                    || self.treasure.iter().any(|item| item.position() == cell)
                    || self.bombs.iter().any(|bomb| bomb.position() == cell);
                if !occupied {
                    free.push(cell);
                }
            }
        }
        free
    }

    fn is_in_bounds(&self, cell: CellCoord) -> bool {
        cell.column() < self.columns && cell.row() < self.rows
    }
}

/// Query functions that provide read-only access to engine internals for
/// presentation layers and tests.
pub mod query {
    use blastgrid_core::{CellCoord, PlayerId};

    use super::Game;
    use crate::entities::Destructible;

    /// Cells currently covered by active fire.
    #[must_use]
    pub fn fire_cells(game: &Game) -> Vec<CellCoord> {
        game.fire.iter().map(|fire| fire.position()).collect()
    }

    /// Cells currently holding an armed bomb.
    #[must_use]
    pub fn bomb_cells(game: &Game) -> Vec<CellCoord> {
        game.bombs.iter().map(|bomb| bomb.position()).collect()
    }

    /// Cells currently holding an ammunition pickup.
    #[must_use]
    pub fn ammo_cells(game: &Game) -> Vec<CellCoord> {
        game.ammo.iter().map(|item| item.position()).collect()
    }

    /// Cells currently holding a treasure.
    #[must_use]
    pub fn treasure_cells(game: &Game) -> Vec<CellCoord> {
        game.treasure.iter().map(|item| item.position()).collect()
    }

    /// Number of delayed effects waiting to expire.
    #[must_use]
    pub fn pending_effects(game: &Game) -> usize {
        game.effects.len()
    }

    /// Dead-body markers accumulated so far.
    #[must_use]
    pub fn dead_bodies(game: &Game) -> Vec<(PlayerId, CellCoord)> {
        game.dead_bodies
            .iter()
            .map(|body| (body.pid(), body.position()))
            .collect()
    }

    /// Number of players still alive.
    #[must_use]
    pub fn living_players(game: &Game) -> usize {
        game.players
            .values()
            .filter(|player| player.is_alive())
            .count()
    }

    /// Current position of a player, if registered and spawned.
    #[must_use]
    pub fn player_position(game: &Game, pid: PlayerId) -> Option<CellCoord> {
        game.players.get(&pid).and_then(|player| player.position())
    }
}
