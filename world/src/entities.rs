//! Entity records and their decay/damage capabilities.
//!
//! Every destructible thing in the arena shares one damage mutator,
//! [`Destructible::apply_hit`], which saturates at zero so liveness is
//! always `hp > 0`. Perishables additionally decay by one point per tick.

use blastgrid_core::{CellCoord, EntityTag, PlayerId};

/// Shared damage capability.
pub trait Destructible {
    /// Remaining hit points.
    fn hp(&self) -> u32;

    /// Applies damage, saturating at zero, and returns the remaining hit
    /// points. This is the only mutator that lowers hp; hp never rises.
    fn apply_hit(&mut self, amount: u32) -> u32;

    /// Alive while hit points remain.
    fn is_alive(&self) -> bool {
        self.hp() > 0
    }
}

/// Destructible that also decays naturally, one hit point per tick.
pub trait Perishable: Destructible {
    /// Ages the entity by one tick and returns the remaining hit points.
    fn update(&mut self) -> u32 {
        self.apply_hit(1)
    }
}

/// Indestructible block. Static for the whole match.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StaticBlock {
    pub(crate) position: CellCoord,
}

impl StaticBlock {
    pub(crate) const fn new(position: CellCoord) -> Self {
        Self { position }
    }

    /// Cell occupied by the block.
    #[must_use]
    pub const fn position(&self) -> CellCoord {
        self.position
    }
}

/// Flavour of a destructible value block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlockKind {
    /// Low-value block destroyed by a single hit under default rules.
    Soft,
    /// High-value block that takes several hits.
    Ore,
}

impl BlockKind {
    /// Occupancy tag for the block kind.
    #[must_use]
    pub const fn tag(&self) -> EntityTag {
        match self {
            Self::Soft => EntityTag::SoftBlock,
            Self::Ore => EntityTag::OreBlock,
        }
    }
}

/// Destructible block that pays a reward to whoever destroys it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ValueBlock {
    pub(crate) position: CellCoord,
    pub(crate) kind: BlockKind,
    pub(crate) reward: i64,
    ttl: u32,
}

impl ValueBlock {
    pub(crate) const fn new(position: CellCoord, kind: BlockKind, hp: u32, reward: i64) -> Self {
        Self {
            position,
            kind,
            reward,
            ttl: hp,
        }
    }

    /// Cell occupied by the block.
    #[must_use]
    pub const fn position(&self) -> CellCoord {
        self.position
    }

    /// Flavour of the block.
    #[must_use]
    pub const fn kind(&self) -> BlockKind {
        self.kind
    }
}

impl Destructible for ValueBlock {
    fn hp(&self) -> u32 {
        self.ttl
    }

    fn apply_hit(&mut self, amount: u32) -> u32 {
        self.ttl = self.ttl.saturating_sub(amount);
        self.ttl
    }
}

/// Collectable ammunition. Perishes naturally and may request a respawn
/// effect when it does.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Ammo {
    pub(crate) position: CellCoord,
    pub(crate) value: u32,
    pub(crate) respawns: bool,
    ttl: u32,
}

impl Ammo {
    pub(crate) const fn new(position: CellCoord, ttl: u32, value: u32, respawns: bool) -> Self {
        Self {
            position,
            value,
            respawns,
            ttl,
        }
    }

    /// Cell occupied by the ammunition.
    #[must_use]
    pub const fn position(&self) -> CellCoord {
        self.position
    }

    /// Ammo granted on pickup.
    #[must_use]
    pub const fn value(&self) -> u32 {
        self.value
    }
}

impl Destructible for Ammo {
    fn hp(&self) -> u32 {
        self.ttl
    }

    fn apply_hit(&mut self, amount: u32) -> u32 {
        self.ttl = self.ttl.saturating_sub(amount);
        self.ttl
    }

    fn is_alive(&self) -> bool {
        self.ttl > 0 && self.value > 0
    }
}

impl Perishable for Ammo {}

/// Collectable treasure. Does not decay; consumed only by pickup.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Treasure {
    pub(crate) position: CellCoord,
    pub(crate) value: u32,
    ttl: u32,
}

impl Treasure {
    pub(crate) const fn new(position: CellCoord, value: u32) -> Self {
        Self {
            position,
            value,
            ttl: 1,
        }
    }

    /// Cell occupied by the treasure.
    #[must_use]
    pub const fn position(&self) -> CellCoord {
        self.position
    }

    /// Reward granted on pickup.
    #[must_use]
    pub const fn value(&self) -> u32 {
        self.value
    }
}

impl Destructible for Treasure {
    fn hp(&self) -> u32 {
        self.ttl
    }

    fn apply_hit(&mut self, amount: u32) -> u32 {
        self.ttl = self.ttl.saturating_sub(amount);
        self.ttl
    }

    fn is_alive(&self) -> bool {
        self.ttl > 0 && self.value > 0
    }
}

/// Armed bomb. Converts into fire when its fuse runs out.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Bomb {
    pub(crate) owner: PlayerId,
    pub(crate) position: CellCoord,
    pub(crate) power: u32,
    ttl: u32,
}

impl Bomb {
    pub(crate) const fn new(owner: PlayerId, position: CellCoord, ttl: u32, power: u32) -> Self {
        Self {
            owner,
            position,
            power,
            ttl,
        }
    }

    /// Player that placed the bomb.
    #[must_use]
    pub const fn owner(&self) -> PlayerId {
        self.owner
    }

    /// Cell occupied by the bomb.
    #[must_use]
    pub const fn position(&self) -> CellCoord {
        self.position
    }

    /// Blast radius the bomb will produce.
    #[must_use]
    pub const fn power(&self) -> u32 {
        self.power
    }
}

impl Destructible for Bomb {
    fn hp(&self) -> u32 {
        self.ttl
    }

    fn apply_hit(&mut self, amount: u32) -> u32 {
        self.ttl = self.ttl.saturating_sub(amount);
        self.ttl
    }
}

impl Perishable for Bomb {}

/// Active blast tile. Lives for a single tick and keeps its owner so
/// rewards can be attributed after the bomb is gone.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Fire {
    pub(crate) owner: PlayerId,
    pub(crate) position: CellCoord,
    ttl: u32,
}

impl Fire {
    pub(crate) const fn new(owner: PlayerId, position: CellCoord) -> Self {
        Self {
            owner,
            position,
            ttl: 1,
        }
    }

    /// Player whose bomb produced the fire.
    #[must_use]
    pub const fn owner(&self) -> PlayerId {
        self.owner
    }

    /// Cell covered by the blast tile.
    #[must_use]
    pub const fn position(&self) -> CellCoord {
        self.position
    }
}

impl Destructible for Fire {
    fn hp(&self) -> u32 {
        self.ttl
    }

    fn apply_hit(&mut self, amount: u32) -> u32 {
        self.ttl = self.ttl.saturating_sub(amount);
        self.ttl
    }
}

impl Perishable for Fire {}

/// Cosmetic marker left where a player died. No gameplay effect.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DeadBody {
    pub(crate) pid: PlayerId,
    pub(crate) position: CellCoord,
}

impl DeadBody {
    pub(crate) const fn new(pid: PlayerId, position: CellCoord) -> Self {
        Self { pid, position }
    }

    /// Player the body belonged to.
    #[must_use]
    pub const fn pid(&self) -> PlayerId {
        self.pid
    }

    /// Cell where the player died.
    #[must_use]
    pub const fn position(&self) -> CellCoord {
        self.position
    }
}

/// World-level side effect triggered by a delayed-effect timer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DelayedEffectKind {
    /// Spawn one ammunition pickup on a random free cell.
    SpawnAmmo,
    /// Spawn one treasure on a random free cell.
    SpawnTreasure,
}

/// Positionless countdown whose expiry triggers a world-level effect.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DelayedEffect {
    pub(crate) kind: DelayedEffectKind,
    ttl: u32,
}

impl DelayedEffect {
    pub(crate) const fn new(kind: DelayedEffectKind, ttl: u32) -> Self {
        Self { kind, ttl }
    }

    /// Effect applied when the countdown expires.
    #[must_use]
    pub const fn kind(&self) -> DelayedEffectKind {
        self.kind
    }
}

impl Destructible for DelayedEffect {
    fn hp(&self) -> u32 {
        self.ttl
    }

    fn apply_hit(&mut self, amount: u32) -> u32 {
        self.ttl = self.ttl.saturating_sub(amount);
        self.ttl
    }
}

impl Perishable for DelayedEffect {}

/// A registered player. Never removed during a match; a dead player
/// persists at zero hp, excluded from movement and pickups but present
/// in stats and agent views.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Player {
    pub(crate) name: String,
    pub(crate) ammo: u32,
    pub(crate) power: u32,
    pub(crate) reward: i64,
    pub(crate) position: Option<CellCoord>,
    hp: u32,
}

impl Player {
    pub(crate) const fn new(name: String, hp: u32, ammo: u32, power: u32) -> Self {
        Self {
            name,
            ammo,
            power,
            reward: 0,
            position: None,
            hp,
        }
    }

    pub(crate) fn reset(&mut self, hp: u32, ammo: u32, power: u32) {
        self.hp = hp;
        self.ammo = ammo;
        self.power = power;
        self.reward = 0;
        self.position = None;
    }

    /// Display name of the player.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Bombs the player can still place.
    #[must_use]
    pub const fn ammo(&self) -> u32 {
        self.ammo
    }

    /// Blast radius of bombs placed by the player.
    #[must_use]
    pub const fn power(&self) -> u32 {
        self.power
    }

    /// Accumulated reward; may be negative.
    #[must_use]
    pub const fn reward(&self) -> i64 {
        self.reward
    }

    /// Current cell, `None` before the map is generated.
    #[must_use]
    pub const fn position(&self) -> Option<CellCoord> {
        self.position
    }
}

impl Destructible for Player {
    fn hp(&self) -> u32 {
        self.hp
    }

    fn apply_hit(&mut self, amount: u32) -> u32 {
        self.hp = self.hp.saturating_sub(amount);
        self.hp
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apply_hit_saturates_at_zero() {
        let mut bomb = Bomb::new(PlayerId::new(0), CellCoord::new(0, 0), 2, 1);
        assert_eq!(bomb.apply_hit(5), 0);
        assert_eq!(bomb.apply_hit(1), 0);
        assert!(!bomb.is_alive());
    }

    #[test]
    fn perishable_update_is_a_single_hit() {
        let mut fire = Fire::new(PlayerId::new(1), CellCoord::new(3, 3));
        assert!(fire.is_alive());
        assert_eq!(fire.update(), 0);
        assert!(!fire.is_alive());
    }

    #[test]
    fn picked_up_ammo_is_dead_despite_remaining_ttl() {
        let mut ammo = Ammo::new(CellCoord::new(1, 1), 100, 1, true);
        assert!(ammo.is_alive());
        ammo.value = 0;
        assert!(!ammo.is_alive());
        assert!(ammo.hp() > 0);
    }

    #[test]
    fn treasure_does_not_decay() {
        let treasure = Treasure::new(CellCoord::new(2, 2), 1);
        assert!(treasure.is_alive());
        // No Perishable impl: nothing ages treasure, only pickups zero it.
        assert_eq!(treasure.hp(), 1);
    }

    #[test]
    fn dead_player_keeps_its_entry() {
        let mut player = Player::new("P[0]".to_owned(), 3, 3, 2);
        let _ = player.apply_hit(3);
        assert!(!player.is_alive());
        assert_eq!(player.hp(), 0);
        assert_eq!(player.name(), "P[0]");
    }
}
