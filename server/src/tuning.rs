//! Balancing constants and map-specific overrides.
//!
//! Several of these thresholds are deliberate, undocumented balancing
//! choices (accuracy ceilings, map damage floors, flat map drop
//! multipliers). They are kept as literal named constants here rather than
//! folded into a derived rule.

use realm_shared::{Faction, ItemClass};

// Behavior loop scheduling.
pub const BEHAVIOR_DELAY_MIN_MS: u64 = 1000;
pub const BEHAVIOR_DELAY_MAX_MS: u64 = 1500;

// Movement.
pub const MOVE_TICK_MS: u64 = 300;

// Targeting and engagement.
pub const MELEE_RANGE: f32 = 4.0;
pub const DEFAULT_LEASH_RANGE: f32 = 100.0;
pub const AGGRO_RANGE: f32 = 20.0;
pub const AGGRO_TRIGGER_CHANCE: f64 = 0.5;
/// A player can have at most this many creatures aggroed on them.
pub const AGGRO_CAP: u32 = 5;
pub const PET_REDIRECT_CHANCE: f64 = 0.25;
pub const WANDER_CHANCE: f64 = 0.75;
pub const SKILL_CAST_CHANCE: f64 = 0.4;
/// Energy a creature spends per skill cast; basic attack when broke.
pub const SKILL_ENERGY_COST: u32 = 5;
/// Chase destinations are jittered by up to this much around the target.
pub const CHASE_OFFSET: f32 = 2.0;

// Combat.
pub const MIN_DAMAGE: u32 = 3;
/// Attackers below this level get a percentage bonus on the raw roll.
pub const LOW_LEVEL_BONUS_CAP: u32 = 20;
pub const ACCURACY_BRACKET_LEVEL: u32 = 200;
pub const ACCURACY_CEILING_LOW: u32 = 2000;
pub const ACCURACY_CEILING_HIGH: u32 = 3500;
pub const INJURY_STEP: u32 = 1;
pub const INJURY_CAP: u32 = 100;

// Death and respawn.
pub const DEATH_DESPAWN_DELAY_MS: u64 = 1000;
/// Respawn delay jitter, plus or minus, as a percentage of the template
/// window.
pub const RESPAWN_JITTER_PCT: u32 = 15;

// Loot.
pub const BASE_DROP_RATE: f64 = 1.0;
pub const PVP_SERVER_DROP_BONUS: f64 = 0.5;
pub const BOSS_DROP_BONUS: f64 = 0.3;
pub const MAX_DROP_ATTEMPTS: u32 = 100;
/// When ceiling * rate falls below this, thresholds are linearly rescaled.
pub const DROP_RESCALE_FLOOR: u32 = 900;
pub const MIN_DROP_ROLLS: u32 = 1;
pub const BOSS_MIN_DROP_ROLLS: u32 = 3;
/// How many independent walk passes a death runs.
pub const DROP_PASSES: u32 = 1;
pub const BOSS_DROP_PASSES: u32 = 3;
pub const SECONDARY_DROP_GATE: f64 = 0.5;
pub const APPEARANCE_CHANCE: f64 = 0.02;
pub const CLAIM_WINDOW_SECS: u64 = 10;
pub const DROP_LIFETIME_SECS: u64 = 60;
pub const BOSS_REWARD_CAP: u32 = 5000;
pub const BOSS_REWARD_LEVEL_GAP: u32 = 100;

/// Ring of offsets applied to successive drops from one death so they do
/// not stack on a single point.
pub const DROP_RING: [(f32, f32); 9] = [
    (0.0, 0.0),
    (1.0, 0.0),
    (0.0, 1.0),
    (-1.0, 0.0),
    (0.0, -1.0),
    (1.0, 1.0),
    (-1.0, 1.0),
    (-1.0, -1.0),
    (1.0, -1.0),
];

/// Cumulative enhancement ladder over a 0..1000 roll: (threshold, plus).
pub const PLUS_LADDER: [(u32, u8); 6] =
    [(600, 0), (800, 1), (900, 2), (960, 3), (990, 4), (1000, 5)];

/// Upgrade-code pools are disjoint per item class.
pub const WEAPON_UPGRADE_CODES: [u8; 4] = [1, 2, 3, 4];
pub const ARMOR_UPGRADE_CODES: [u8; 4] = [10, 11, 12, 13];
pub const ACCESSORY_UPGRADE_CODES: [u8; 3] = [20, 21, 22];
pub const PENDANT_UPGRADE_CODES: [u8; 2] = [30, 31];
pub const PENDANT_MIN_PLUS: u8 = 1;

// Scripted behavior hooks.
pub const SCAVENGER_ITEM_ID: u32 = 90;
pub const SCAVENGE_RANGE: f32 = 10.0;
pub const SCAVENGE_CHANCE: f64 = 0.3;
pub const MATE_SEEK_CHANCE: f64 = 0.15;
pub const MATE_SEEK_RANGE: f32 = 30.0;
pub const MATING_SECS: u64 = 20;
pub const MATE_DROP_CHANCE: f64 = 0.05;
pub const MATE_DROP_ITEM_ID: u32 = 91;

/// Maps with a forced minimum damage regardless of the computed value.
pub fn map_damage_floor(map: u16) -> Option<u32> {
    match map {
        5 => Some(10),
        12 => Some(6),
        _ => None,
    }
}

/// Maps where the drop-rate formula is replaced by a flat multiplier.
pub fn map_drop_override(map: u16) -> Option<f64> {
    match map {
        27 => Some(3.0),
        33 => Some(2.0),
        _ => None,
    }
}

/// Additive map bonus folded into the drop-rate formula.
pub fn map_drop_bonus(map: u16) -> f64 {
    match map {
        40 => 0.5,
        _ => 0.0,
    }
}

/// Maps that force a fixed respawn window regardless of template.
pub fn forced_respawn_secs(map: u16) -> Option<u32> {
    match map {
        9 => Some(60),
        _ => None,
    }
}

/// Per-map leash override: early retreat on 5, late retreat on 27.
pub fn leash_range(map: u16) -> f32 {
    match map {
        5 => 60.0,
        27 => 140.0,
        _ => DEFAULT_LEASH_RANGE,
    }
}

/// Faction-aligned creatures are town guards: they never pursue past melee
/// range and fall back to their zone anchor instead. Wild creatures chase.
pub fn always_retreats(faction: Faction) -> bool {
    !matches!(faction, Faction::Wild)
}

/// Maps where relics are suppressed entirely.
pub fn relic_suppressed(map: u16) -> bool {
    matches!(map, 1 | 2)
}

/// Maps where relic drops pass an extra double probability gate.
pub fn relic_double_gate(map: u16) -> bool {
    matches!(map, 27)
}

/// Valid upgrade-code pool for an item class, if the class enhances at all.
pub fn upgrade_pool(class: ItemClass) -> Option<&'static [u8]> {
    match class {
        ItemClass::Weapon => Some(&WEAPON_UPGRADE_CODES),
        ItemClass::Armor => Some(&ARMOR_UPGRADE_CODES),
        ItemClass::Accessory => Some(&ACCESSORY_UPGRADE_CODES),
        ItemClass::Pendant => Some(&PENDANT_UPGRADE_CODES),
        _ => None,
    }
}
