//! Combat resolution.
//!
//! Pure functions over stat snapshots: callers gather `CombatantStats` from
//! the attacker and defender (never holding both entity locks at once),
//! resolve the hit here, then apply the outcome under the defender's lock.

use rand::Rng;

use realm_shared::StatusEffect;

use crate::tuning;

/// Flattened combat-relevant stats of one combatant.
#[derive(Debug, Clone, Copy, Default)]
pub struct CombatantStats {
    pub level: u32,
    pub min_atk: u32,
    pub max_atk: u32,
    pub defense: u32,
    pub arts_defense: u32,
    pub dodge: u32,
    pub damage_reduction_pct: u32,
    pub reflect_chance_pct: u32,
    pub reflect_reduction_pct: u32,
    pub poison_attack: u32,
    pub paralysis_attack: u32,
    pub confusion_attack: u32,
    pub poison_resist: u32,
    pub paralysis_resist: u32,
    pub confusion_resist: u32,
}

/// Resolved hit, before application to the defender.
#[derive(Debug, Clone)]
pub struct AttackOutcome {
    pub damage: u32,
    pub missed: bool,
    pub reflected: bool,
    pub afflictions: Vec<StatusEffect>,
}

impl AttackOutcome {
    fn miss() -> Self {
        Self { damage: 0, missed: true, reflected: false, afflictions: Vec::new() }
    }
}

/// Accuracy requirement: defender dodge minus a level-gap bonus, floored at
/// zero.
fn required_accuracy(attacker_level: u32, defender_level: u32, dodge: u32) -> u32 {
    let gap = attacker_level as i64 - defender_level as i64;
    let bonus = 3 * gap / 5;
    ((dodge as i64) - bonus).max(0) as u32
}

/// The roll ceiling diverges above the high-level bracket; the balancing
/// intent behind the two values is undocumented upstream.
fn accuracy_ceiling(attacker_level: u32) -> u32 {
    if attacker_level >= tuning::ACCURACY_BRACKET_LEVEL {
        tuning::ACCURACY_CEILING_HIGH
    } else {
        tuning::ACCURACY_CEILING_LOW
    }
}

fn roll_misses(
    attacker: &CombatantStats,
    defender: &CombatantStats,
    rng: &mut impl Rng,
) -> bool {
    let required = required_accuracy(attacker.level, defender.level, defender.dodge);
    if required == 0 {
        return false;
    }
    rng.gen_range(0..accuracy_ceiling(attacker.level)) < required
}

fn raw_roll(attacker: &CombatantStats, rng: &mut impl Rng) -> u32 {
    let mut raw = if attacker.max_atk > attacker.min_atk {
        rng.gen_range(attacker.min_atk..=attacker.max_atk)
    } else {
        attacker.min_atk
    };
    // Low-level attackers get an experience bonus on the raw roll.
    if attacker.level < tuning::LOW_LEVEL_BONUS_CAP {
        raw += raw * (tuning::LOW_LEVEL_BONUS_CAP - attacker.level) / 100;
    }
    raw
}

fn apply_mitigation(
    mut damage: u32,
    defender: &CombatantStats,
    level_gap_term: i64,
    map: u16,
    rng: &mut impl Rng,
) -> (u32, bool) {
    damage -= damage * defender.damage_reduction_pct.min(100) / 100;
    damage = ((damage as i64) + level_gap_term).max(0) as u32;
    if let Some(floor) = tuning::map_damage_floor(map) {
        damage = damage.max(floor);
    }
    let mut reflected = false;
    if defender.reflect_chance_pct > 0
        && rng.gen_range(0..100) < defender.reflect_chance_pct.min(100)
    {
        damage -= damage * defender.reflect_reduction_pct.min(100) / 100;
        reflected = true;
    }
    (damage, reflected)
}

fn afflictions(attacker: &CombatantStats, defender: &CombatantStats) -> Vec<StatusEffect> {
    let mut out = Vec::new();
    if attacker.poison_attack > defender.poison_resist {
        out.push(StatusEffect::Poison);
    }
    if attacker.paralysis_attack > defender.paralysis_resist {
        out.push(StatusEffect::Paralysis);
    }
    if attacker.confusion_attack > defender.confusion_resist {
        out.push(StatusEffect::Confusion);
    }
    out
}

/// Basic physical attack.
pub fn attack(
    attacker: &CombatantStats,
    defender: &CombatantStats,
    map: u16,
    rng: &mut impl Rng,
) -> AttackOutcome {
    if roll_misses(attacker, defender, rng) {
        return AttackOutcome::miss();
    }
    let raw = raw_roll(attacker, rng);
    let base = raw.saturating_sub(defender.defense).max(tuning::MIN_DAMAGE);
    let gap = attacker.level as i64 - defender.level as i64;
    let (damage, reflected) = apply_mitigation(base, defender, 3 * gap / 5, map, rng);
    AttackOutcome {
        damage,
        missed: false,
        reflected,
        afflictions: afflictions(attacker, defender),
    }
}

/// Skill cast: same shape against arts defense, with an unconditional
/// level-gap penalty in place of the bonus term.
pub fn cast_skill(
    attacker: &CombatantStats,
    defender: &CombatantStats,
    map: u16,
    rng: &mut impl Rng,
) -> AttackOutcome {
    if roll_misses(attacker, defender, rng) {
        return AttackOutcome::miss();
    }
    let raw = raw_roll(attacker, rng);
    let base = raw.saturating_sub(defender.arts_defense).max(tuning::MIN_DAMAGE);
    let gap = (attacker.level as i64 - defender.level as i64).abs();
    let (damage, reflected) = apply_mitigation(base, defender, -(3 * gap / 5), map, rng);
    AttackOutcome {
        damage,
        missed: false,
        reflected,
        afflictions: afflictions(attacker, defender),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn attacker() -> CombatantStats {
        CombatantStats {
            level: 10,
            min_atk: 10,
            max_atk: 20,
            ..CombatantStats::default()
        }
    }

    fn defender() -> CombatantStats {
        CombatantStats {
            level: 10,
            defense: 5,
            arts_defense: 5,
            ..CombatantStats::default()
        }
    }

    #[test]
    fn test_damage_in_expected_band() {
        // min 10, max 20, DEF 5, no level gap, no reduction: raw-5, never
        // below 3.
        let mut rng = StdRng::seed_from_u64(11);
        let att = CombatantStats { level: 25, ..attacker() };
        let def = CombatantStats { level: 25, ..defender() };
        for _ in 0..500 {
            let out = attack(&att, &def, 1, &mut rng);
            assert!(!out.missed);
            assert!(out.damage >= 3, "damage {} below floor", out.damage);
            assert!((5..=15).contains(&out.damage), "damage {} out of band", out.damage);
        }
    }

    #[test]
    fn test_high_defense_clamps_to_min_damage() {
        let mut rng = StdRng::seed_from_u64(3);
        let att = CombatantStats { level: 25, ..attacker() };
        let def = CombatantStats { level: 25, defense: 1000, ..defender() };
        let out = attack(&att, &def, 1, &mut rng);
        assert_eq!(out.damage, tuning::MIN_DAMAGE);
    }

    #[test]
    fn test_unhittable_dodge_forces_miss() {
        let mut rng = StdRng::seed_from_u64(4);
        // Dodge at the ceiling: every roll lands below the requirement.
        let def = CombatantStats {
            dodge: tuning::ACCURACY_CEILING_LOW + 100,
            ..defender()
        };
        for _ in 0..50 {
            let out = attack(&attacker(), &def, 1, &mut rng);
            assert!(out.missed);
            assert_eq!(out.damage, 0);
        }
    }

    #[test]
    fn test_zero_dodge_never_misses() {
        let mut rng = StdRng::seed_from_u64(5);
        for _ in 0..200 {
            assert!(!attack(&attacker(), &defender(), 1, &mut rng).missed);
        }
    }

    #[test]
    fn test_map_damage_floor_applies() {
        let mut rng = StdRng::seed_from_u64(6);
        let att = CombatantStats { level: 25, ..attacker() };
        let def = CombatantStats { level: 25, defense: 1000, ..defender() };
        // Map 5 configures a floor of 10, above the global minimum of 3.
        let out = attack(&att, &def, 5, &mut rng);
        assert_eq!(out.damage, 10);
    }

    #[test]
    fn test_skill_gap_penalty_is_unconditional() {
        let mut rng = StdRng::seed_from_u64(7);
        // Attacker 50 levels above: physical gains, skill loses.
        let att = CombatantStats { level: 75, min_atk: 100, max_atk: 100, ..attacker() };
        let def = CombatantStats { level: 25, ..defender() };
        let physical = attack(&att, &def, 1, &mut rng);
        let skill = cast_skill(&att, &def, 1, &mut rng);
        assert!(physical.damage > skill.damage);
    }

    #[test]
    fn test_status_inflicted_when_attack_exceeds_resist() {
        let mut rng = StdRng::seed_from_u64(8);
        let att = CombatantStats { poison_attack: 10, ..attacker() };
        let def = CombatantStats { poison_resist: 5, ..defender() };
        let out = attack(&att, &def, 1, &mut rng);
        assert!(out.afflictions.contains(&StatusEffect::Poison));
        assert!(!out.afflictions.contains(&StatusEffect::Paralysis));
    }

    #[test]
    fn test_reflection_reduces_damage() {
        let mut rng = StdRng::seed_from_u64(9);
        let att = CombatantStats { level: 25, min_atk: 100, max_atk: 100, ..attacker() };
        let plain = CombatantStats { level: 25, ..defender() };
        let mirrored = CombatantStats {
            level: 25,
            reflect_chance_pct: 100,
            reflect_reduction_pct: 50,
            ..defender()
        };
        let base = attack(&att, &plain, 1, &mut rng);
        let reduced = attack(&att, &mirrored, 1, &mut rng);
        assert!(reduced.reflected);
        assert!(reduced.damage < base.damage);
    }
}
