//! The simulated creature entity.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use realm_shared::{CreatureTemplate, Faction, ScopeKey, SpawnZone, StatusEffect, Vec2};

use crate::combat::CombatantStats;

/// What a creature is currently engaging. At most one target at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetRef {
    /// A player, by directory id.
    Player(u64),
    /// A player's combat pet, addressed through its owner.
    Pet(u64),
    /// A peer creature, by pseudo-id in the same scope.
    Creature(u16),
}

/// Result of applying damage under the state lock.
#[derive(Debug, Clone, Copy)]
pub struct DamageApplied {
    pub remaining_hp: u32,
    /// True for exactly one lethal hit, no matter how many attackers land
    /// one concurrently.
    pub killed: bool,
}

/// Mutable runtime state, guarded by the creature's mutex. Attacker tasks,
/// the behavior loop and movement chains all go through this lock.
#[derive(Debug)]
pub struct CreatureState {
    pub hp: u32,
    pub energy: u32,
    pub position: Vec2,
    /// Generation counter for movement chains; bumping it cancels any
    /// chain holding an older value.
    pub move_token: u64,
    pub moving: bool,
    pub target: Option<TargetRef>,
    pub dead: bool,
    /// Cleared on teardown; the behavior loop exits when it sees false.
    pub loop_active: bool,
    /// Players currently aware of this creature, maintained by the
    /// (external) visibility layer.
    pub sensed_by: HashSet<u64>,
    /// Cumulative damage per player (pet damage credits the owner). Ranked
    /// at death to pick the claimant, cleared on reward distribution.
    pub damage_by: HashMap<u64, u64>,
    pub injury: u32,
    pub afflictions: Vec<StatusEffect>,
    /// While set and in the future, combat targeting is blocked.
    pub mating_until: Option<Instant>,
}

/// Copy of the fields the decision step reads, taken under one lock.
#[derive(Debug, Clone)]
pub struct CreatureSnapshot {
    pub hp: u32,
    pub dead: bool,
    pub moving: bool,
    pub position: Vec2,
    pub target: Option<TargetRef>,
    pub sensed_count: usize,
    pub mating: bool,
}

pub struct Creature {
    pub id: u16,
    pub scope: ScopeKey,
    pub faction: Faction,
    pub template: Arc<CreatureTemplate>,
    pub zone: Arc<SpawnZone>,
    pub state: Mutex<CreatureState>,
}

impl Creature {
    pub fn new(
        id: u16,
        scope: ScopeKey,
        faction: Faction,
        template: Arc<CreatureTemplate>,
        zone: Arc<SpawnZone>,
        position: Vec2,
    ) -> Arc<Self> {
        let state = CreatureState {
            hp: template.max_hp,
            energy: template.max_energy,
            position,
            move_token: 0,
            moving: false,
            target: None,
            dead: false,
            loop_active: true,
            sensed_by: HashSet::new(),
            damage_by: HashMap::new(),
            injury: 0,
            afflictions: Vec::new(),
            mating_until: None,
        };
        Arc::new(Self { id, scope, faction, template, zone, state: Mutex::new(state) })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CreatureState> {
        // A poisoned lock means another thread panicked mid-update; the
        // state is still structurally sound, so keep going.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn snapshot(&self) -> CreatureSnapshot {
        let s = self.lock();
        CreatureSnapshot {
            hp: s.hp,
            dead: s.dead,
            moving: s.moving,
            position: s.position,
            target: s.target,
            sensed_count: s.sensed_by.len(),
            mating: s.mating_until.map(|t| t > Instant::now()).unwrap_or(false),
        }
    }

    pub fn position(&self) -> Vec2 {
        self.lock().position
    }

    pub fn is_dead(&self) -> bool {
        self.lock().dead
    }

    pub fn loop_active(&self) -> bool {
        self.lock().loop_active
    }

    pub fn deactivate_loop(&self) {
        self.lock().loop_active = false;
    }

    /// Apply damage atomically. The dead flag flips on exactly one lethal
    /// hit; later hits see it set and report `killed = false`.
    pub fn apply_damage(&self, amount: u32, attacker: Option<u64>) -> DamageApplied {
        let mut s = self.lock();
        if s.dead {
            return DamageApplied { remaining_hp: 0, killed: false };
        }
        if let Some(player_id) = attacker {
            *s.damage_by.entry(player_id).or_insert(0) += amount as u64;
        }
        s.injury = (s.injury + crate::tuning::INJURY_STEP).min(crate::tuning::INJURY_CAP);
        s.hp = s.hp.saturating_sub(amount);
        if s.hp == 0 {
            s.dead = true;
            DamageApplied { remaining_hp: 0, killed: true }
        } else {
            DamageApplied { remaining_hp: s.hp, killed: false }
        }
    }

    pub fn inflict(&self, effect: StatusEffect) {
        let mut s = self.lock();
        if !s.afflictions.contains(&effect) {
            s.afflictions.push(effect);
        }
    }

    /// Out-of-combat passive regeneration: snap back to full.
    pub fn heal_full(&self) {
        let mut s = self.lock();
        if !s.dead {
            s.hp = self.template.max_hp;
            s.energy = self.template.max_energy;
        }
    }

    pub fn set_target(&self, target: Option<TargetRef>) {
        self.lock().target = target;
    }

    pub fn target(&self) -> Option<TargetRef> {
        self.lock().target
    }

    pub fn add_senser(&self, player_id: u64) {
        self.lock().sensed_by.insert(player_id);
    }

    pub fn remove_senser(&self, player_id: u64) {
        self.lock().sensed_by.remove(&player_id);
    }

    pub fn sensed_players(&self) -> Vec<u64> {
        self.lock().sensed_by.iter().copied().collect()
    }

    pub fn begin_mating(&self, until: Instant) {
        self.lock().mating_until = Some(until);
    }

    /// Highest cumulative damage contributor, if any player hit it.
    pub fn top_contributor(&self) -> Option<u64> {
        let s = self.lock();
        s.damage_by
            .iter()
            .max_by_key(|(_, dmg)| **dmg)
            .map(|(id, _)| *id)
    }

    /// Damage table snapshot for reward splitting.
    pub fn damage_contributions(&self) -> Vec<(u64, u64)> {
        let s = self.lock();
        s.damage_by.iter().map(|(id, dmg)| (*id, *dmg)).collect()
    }

    pub fn clear_damage_table(&self) {
        self.lock().damage_by.clear();
    }

    /// Stat snapshot for the combat resolver; creature stats come straight
    /// off the template.
    pub fn combat_stats(&self) -> CombatantStats {
        let t = &self.template;
        CombatantStats {
            level: t.level,
            min_atk: t.min_atk,
            max_atk: t.max_atk,
            defense: t.defense,
            arts_defense: t.arts_defense,
            dodge: t.dodge,
            damage_reduction_pct: t.damage_reduction_pct,
            reflect_chance_pct: t.reflect_chance_pct,
            reflect_reduction_pct: t.reflect_reduction_pct,
            poison_attack: t.poison_attack,
            paralysis_attack: t.paralysis_attack,
            confusion_attack: t.confusion_attack,
            poison_resist: t.poison_resist,
            paralysis_resist: t.paralysis_resist,
            confusion_resist: t.confusion_resist,
        }
    }
}

impl std::fmt::Debug for Creature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Creature")
            .field("id", &self.id)
            .field("scope", &self.scope)
            .field("template", &self.template.id)
            .finish()
    }
}
