//! Built-in policies for headless matches and smoke tests.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use blastgrid_core::{CellCoord, GameState, PlayerAction, PlayerState};

use crate::{Policy, PolicyError};

/// Does nothing every tick. Useful as a stationary target.
#[derive(Debug, Default)]
pub struct Idle;

impl Policy for Idle {
    fn choose_move(&mut self, _state: &GameState, _view: &PlayerState) -> Option<PlayerAction> {
        None
    }
}

/// Wanders toward random free neighbouring cells and occasionally drops a
/// bomb. Deterministic for a given seed.
#[derive(Debug)]
pub struct RandomWalk {
    rng: StdRng,
}

impl RandomWalk {
    /// Creates a walker with its own seeded rng.
    #[must_use]
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    fn open_moves(state: &GameState, origin: CellCoord) -> Vec<PlayerAction> {
        const STEPS: [(PlayerAction, i64, i64); 4] = [
            (PlayerAction::Left, -1, 0),
            (PlayerAction::Right, 1, 0),
            (PlayerAction::Down, 0, -1),
            (PlayerAction::Up, 0, 1),
        ];
        STEPS
            .iter()
            .filter(|(_, delta_column, delta_row)| {
                origin
                    .offset(*delta_column, *delta_row)
                    .map_or(false, |cell| {
                        state.is_in_bounds(cell) && !state.is_occupied(cell)
                    })
            })
            .map(|(action, _, _)| *action)
            .collect()
    }
}

impl Policy for RandomWalk {
    fn choose_move(&mut self, state: &GameState, view: &PlayerState) -> Option<PlayerAction> {
        let origin = view.position?;
        if view.ammo > 0 && self.rng.gen_range(0_u32..10) == 0 {
            return Some(PlayerAction::PlaceBomb);
        }
        let open = Self::open_moves(state, origin);
        if open.is_empty() {
            return None;
        }
        let pick = self.rng.gen_range(0..open.len());
        Some(open[pick])
    }
}

/// Resolves a policy by registry name, seeding stochastic policies from
/// `seed`.
pub fn from_name(name: &str, seed: u64) -> Result<Box<dyn Policy>, PolicyError> {
    match name {
        "idle" | "noop" => Ok(Box::new(Idle)),
        "random" => Ok(Box::new(RandomWalk::seeded(seed))),
        other => Err(PolicyError::Unknown(other.to_owned())),
    }
}

#[cfg(test)]
mod tests {
    use blastgrid_core::{OccupancyMap, PlayerId};

    use super::*;

    fn open_state() -> GameState {
        GameState::new(
            false,
            0,
            (12, 10),
            OccupancyMap::new(),
            Vec::new(),
            Vec::new(),
            Vec::new(),
            Vec::new(),
            vec![(PlayerId::new(0), Some(CellCoord::new(5, 5)))],
        )
    }

    fn view_at(cell: CellCoord) -> PlayerState {
        PlayerState {
            id: PlayerId::new(0),
            ammo: 0,
            hp: 3,
            position: Some(cell),
            reward: 0,
            power: 2,
        }
    }

    #[test]
    fn idle_never_moves() {
        let mut policy = Idle;
        assert_eq!(
            policy.choose_move(&open_state(), &view_at(CellCoord::new(5, 5))),
            None
        );
    }

    #[test]
    fn random_walk_is_deterministic_per_seed() {
        let state = open_state();
        let view = view_at(CellCoord::new(5, 5));
        let mut first = RandomWalk::seeded(9);
        let mut second = RandomWalk::seeded(9);
        for _ in 0..50 {
            assert_eq!(
                first.choose_move(&state, &view),
                second.choose_move(&state, &view)
            );
        }
    }

    #[test]
    fn random_walk_stays_put_with_no_open_neighbours() {
        let mut map = OccupancyMap::new();
        for (column, row) in [(4_u32, 5_u32), (6, 5), (5, 4), (5, 6)] {
            map.set(
                CellCoord::new(column, row),
                blastgrid_core::MapTag::Entity(blastgrid_core::EntityTag::IndestructibleBlock),
            );
        }
        let state = GameState::new(
            false,
            0,
            (12, 10),
            map,
            Vec::new(),
            Vec::new(),
            Vec::new(),
            Vec::new(),
            vec![(PlayerId::new(0), Some(CellCoord::new(5, 5)))],
        );
        let mut policy = RandomWalk::seeded(1);
        let view = view_at(CellCoord::new(5, 5));
        for _ in 0..20 {
            assert_eq!(policy.choose_move(&state, &view), None);
        }
    }

    #[test]
    fn unknown_policy_name_is_rejected() {
        assert!(matches!(
            from_name("definitely-not-registered", 0),
            Err(PolicyError::Unknown(_))
        ));
        assert!(from_name("idle", 0).is_ok());
        assert!(from_name("random", 7).is_ok());
    }
}
