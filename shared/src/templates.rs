//! Static creature templates, spawn zones and drop tables.
//!
//! All of these are loaded once at startup and treated as read-only for the
//! lifetime of the process.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::types::{Faction, Vec2};

/// Scripted behavior attached to a handful of templates. Hooks run before
/// the generic decision step of the behavior loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BehaviorHook {
    /// Periodically picks up and consumes a specific item near it.
    Scavenger,
    /// Periodically seeks a same-template peer; a pair enters a timed
    /// mating state that blocks combat targeting.
    MateSeeker,
}

/// Immutable per-species stat block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatureTemplate {
    pub id: u32,
    pub name: String,
    pub level: u32,
    pub max_hp: u32,
    pub max_energy: u32,
    pub min_atk: u32,
    pub max_atk: u32,
    pub defense: u32,
    pub arts_defense: u32,
    pub dodge: u32,
    #[serde(default)]
    pub damage_reduction_pct: u32,
    #[serde(default)]
    pub reflect_chance_pct: u32,
    #[serde(default)]
    pub reflect_reduction_pct: u32,
    #[serde(default)]
    pub poison_attack: u32,
    #[serde(default)]
    pub paralysis_attack: u32,
    #[serde(default)]
    pub confusion_attack: u32,
    #[serde(default)]
    pub poison_resist: u32,
    #[serde(default)]
    pub paralysis_resist: u32,
    #[serde(default)]
    pub confusion_resist: u32,
    #[serde(default)]
    pub skill_ids: Vec<u32>,
    pub walk_speed: f32,
    pub run_speed: f32,
    pub gold_reward: u32,
    pub exp_reward: u32,
    /// 0 means the template drops nothing.
    #[serde(default)]
    pub drop_table_id: u32,
    pub respawn_secs: u32,
    #[serde(default)]
    pub combat_capable: bool,
    #[serde(default)]
    pub boss: bool,
    #[serde(default)]
    pub hook: Option<BehaviorHook>,
}

impl CreatureTemplate {
    pub fn knows_skills(&self) -> bool {
        !self.skill_ids.is_empty()
    }
}

/// Axis-aligned rectangular spawn zone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpawnZone {
    pub id: u32,
    pub map: u16,
    pub min: Vec2,
    pub max: Vec2,
    /// Retreating creatures run back toward this point.
    pub anchor: Vec2,
    pub template_id: u32,
    pub population: u32,
    /// Alignment its creatures spawn with.
    #[serde(default = "default_faction")]
    pub faction: Faction,
    /// Non-attackable zones deliver every resolved drop straight into the
    /// claimant's inventory instead of spawning world drops.
    #[serde(default = "default_true")]
    pub attackable: bool,
    /// Once-only zones never respawn their creatures.
    #[serde(default)]
    pub once_only: bool,
}

fn default_true() -> bool {
    true
}

fn default_faction() -> Faction {
    Faction::Wild
}

impl SpawnZone {
    pub fn contains(&self, p: Vec2) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.y >= self.min.y && p.y <= self.max.y
    }

    /// Uniform random point inside the zone bounds.
    pub fn random_point(&self, rng: &mut impl Rng) -> Vec2 {
        if self.min.x >= self.max.x || self.min.y >= self.max.y {
            return self.anchor;
        }
        Vec2::new(
            rng.gen_range(self.min.x..self.max.x),
            rng.gen_range(self.min.y..self.max.y),
        )
    }
}

/// One entry of a drop table: an item id and the cumulative probability
/// threshold that selects it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DropEntry {
    pub item_id: u32,
    pub threshold: u32,
}

/// Ordered cumulative-threshold drop table. Seeds between the last entry
/// threshold and `fail_threshold` mean "no drop". Tables chain: a resolved
/// item id that is itself a table id re-enters the walk against that table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DropTable {
    pub id: u32,
    pub entries: Vec<DropEntry>,
    /// Roll ceiling. The band past the last entry threshold is the fail
    /// band; a table whose fail threshold equals its last entry always
    /// resolves something.
    #[serde(default)]
    pub fail_threshold: u32,
}

impl DropTable {
    /// The roll ceiling: the fail threshold, never below the last entry
    /// threshold (data files may omit the fail band).
    pub fn ceiling(&self) -> u32 {
        let last = self.entries.last().map(|e| e.threshold).unwrap_or(0);
        self.fail_threshold.max(last)
    }

    /// Binary-search the cumulative thresholds: the first index whose
    /// threshold is >= seed. Past-the-end means no drop.
    pub fn resolve(&self, seed: u32) -> Option<u32> {
        let idx = self.entries.partition_point(|e| e.threshold < seed);
        self.entries.get(idx).map(|e| e.item_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn table() -> DropTable {
        DropTable {
            id: 1,
            entries: vec![
                DropEntry { item_id: 10, threshold: 200 },
                DropEntry { item_id: 11, threshold: 500 },
                DropEntry { item_id: 12, threshold: 1000 },
            ],
            fail_threshold: 1500,
        }
    }

    #[test]
    fn test_resolve_picks_first_matching_threshold() {
        let t = table();
        assert_eq!(t.resolve(150), Some(10));
        assert_eq!(t.resolve(200), Some(10));
        assert_eq!(t.resolve(201), Some(11));
        assert_eq!(t.resolve(1000), Some(12));
        assert_eq!(t.resolve(1001), None);
    }

    #[test]
    fn test_ceiling_covers_the_fail_band() {
        let t = table();
        assert_eq!(t.ceiling(), 1500);
        assert_eq!(t.resolve(1400), None);
        // Omitted fail band: the ceiling collapses to the last entry.
        let always = DropTable { fail_threshold: 0, ..table() };
        assert_eq!(always.ceiling(), 1000);
    }

    #[test]
    fn test_zone_random_point_stays_inside() {
        let zone = SpawnZone {
            id: 1,
            map: 1,
            min: Vec2::new(-10.0, -10.0),
            max: Vec2::new(10.0, 10.0),
            anchor: Vec2::new(0.0, 0.0),
            template_id: 1,
            population: 1,
            faction: Faction::Wild,
            attackable: true,
            once_only: false,
        };
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            assert!(zone.contains(zone.random_point(&mut rng)));
        }
    }
}
