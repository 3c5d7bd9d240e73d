//! Seeded map generation.
//!
//! Placement runs in stages over a shrinking pool of free cells: player
//! spawns with their exclusion buffers, then indestructible blocks, soft
//! blocks, ore blocks and the free ammunition pickup. Every draw comes from
//! the engine rng, so one seed reproduces one arena exactly.

use rand::Rng as _;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::debug;

use blastgrid_core::{CellCoord, GameEvent, PlayerId};

use crate::entities::{Ammo, BlockKind, DelayedEffectKind, StaticBlock, ValueBlock};
use crate::{Game, GameError};

const ORTHOGONAL: [(i64, i64); 4] = [(-1, 0), (1, 0), (0, -1), (0, 1)];
const DISTANCE_TWO: [(i64, i64); 4] = [(-2, 0), (2, 0), (0, -2), (0, 2)];

impl Game {
    /// Resets the match and generates a fresh arena from the seed.
    ///
    /// Registered players survive the reset with their stats restored to
    /// the configured starting values; everything else is rebuilt. Fails
    /// with [`GameError::MapCapacity`] when the grid cannot host the
    /// configured placements and with [`GameError::TreasureWindow`] when
    /// the treasure countdown bounds are inverted.
    pub fn generate_map(&mut self, seed: u64) -> Result<(), GameError> {
        if self.rules.treasure_spawn_max < self.rules.treasure_spawn_min {
            return Err(GameError::TreasureWindow {
                min: self.rules.treasure_spawn_min,
                max: self.rules.treasure_spawn_max,
            });
        }
        self.reset_state();
        self.rng = ChaCha8Rng::seed_from_u64(seed);

        let ttl = self.gen_countdown(self.rules.treasure_spawn_min, self.rules.treasure_spawn_max);
        self.enqueue_effect(DelayedEffectKind::SpawnTreasure, ttl);

        let mut free: Vec<CellCoord> = Vec::with_capacity((self.columns * self.rows) as usize);
        for column in 0..self.columns {
            for row in 0..self.rows {
                free.push(CellCoord::new(column, row));
            }
        }

        let pids: Vec<PlayerId> = self.players.keys().copied().collect();
        for pid in pids {
            let spawn = self.draw_cells(&mut free, 1)?[0];
            if let Some(player) = self.players.get_mut(&pid) {
                player.position = Some(spawn);
            }
            // Orthogonal neighbours stay clear so no spawn starts walled in.
            for (delta_column, delta_row) in ORTHOGONAL {
                if let Some(cell) = spawn.offset(delta_column, delta_row) {
                    free.retain(|candidate| *candidate != cell);
                }
            }
            // One extra buffer cell at distance two, best effort.
            let mut extras: Vec<CellCoord> = DISTANCE_TWO
                .iter()
                .filter_map(|(delta_column, delta_row)| spawn.offset(*delta_column, *delta_row))
                .collect();
            while !extras.is_empty() {
                let candidate = extras.remove(self.rng.gen_range(0..extras.len()));
                if let Some(found) = free.iter().position(|cell| *cell == candidate) {
                    let _ = free.remove(found);
                    break;
                }
            }
        }

        for cell in self.draw_cells(&mut free, self.rules.static_block_count)? {
            self.static_blocks.push(StaticBlock::new(cell));
        }
        for cell in self.draw_cells(&mut free, self.rules.soft_block_count)? {
            self.value_blocks.push(ValueBlock::new(
                cell,
                BlockKind::Soft,
                self.rules.soft_block_hp,
                self.rules.soft_block_reward,
            ));
        }
        for cell in self.draw_cells(&mut free, self.rules.ore_block_count)? {
            self.value_blocks.push(ValueBlock::new(
                cell,
                BlockKind::Ore,
                self.rules.ore_block_hp,
                self.rules.ore_block_reward,
            ));
        }
        for cell in self.draw_cells(&mut free, self.rules.free_ammo_count)? {
            self.ammo
                .push(Ammo::new(cell, self.rules.ammo_perish_ttl, 1, true));
        }

        debug!(seed, free_cells = free.len(), "map generated");
        let map = self.occupancy_map();
        self.recorder
            .record(self.tick_counter, &GameEvent::MapGenerated { seed, map });
        Ok(())
    }

    fn reset_state(&mut self) {
        self.is_over = false;
        self.winner = None;
        self.tick_counter = 0;
        self.action_queues.clear();
        self.effects.clear();
        self.static_blocks.clear();
        self.value_blocks.clear();
        self.ammo.clear();
        self.treasure.clear();
        self.bombs.clear();
        self.fire.clear();
        self.dead_bodies.clear();
        let (hp, ammo, power) = (
            self.rules.player_start_hp,
            self.rules.player_start_ammo,
            self.rules.player_start_power,
        );
        for player in self.players.values_mut() {
            player.reset(hp, ammo, power);
        }
    }

    fn draw_cells(
        &mut self,
        free: &mut Vec<CellCoord>,
        count: usize,
    ) -> Result<Vec<CellCoord>, GameError> {
        if free.len() < count {
            return Err(GameError::MapCapacity {
                columns: self.columns,
                rows: self.rows,
                required: count,
                available: free.len(),
            });
        }
        let mut drawn = Vec::with_capacity(count);
        for _ in 0..count {
            drawn.push(free.remove(self.rng.gen_range(0..free.len())));
        }
        Ok(drawn)
    }
}
