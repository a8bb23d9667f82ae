//! A player's combat pet. Leveling and evolution live outside the core;
//! this is just enough state for creatures to target and hit one.

use std::sync::{Arc, Mutex};

use realm_shared::{ScopeKey, Vec2};

use crate::combat::CombatantStats;

#[derive(Debug)]
pub struct PetState {
    pub position: Vec2,
    pub hp: u32,
    pub max_hp: u32,
    pub defense: u32,
    pub arts_defense: u32,
    pub dodge: u32,
    /// Only pets in combat stance draw redirected aggro.
    pub in_combat: bool,
}

pub struct Pet {
    pub id: u16,
    pub owner: u64,
    pub scope: ScopeKey,
    pub level: u32,
    pub state: Mutex<PetState>,
}

impl Pet {
    pub fn new(id: u16, owner: u64, scope: ScopeKey, level: u32, position: Vec2) -> Arc<Self> {
        let state = PetState {
            position,
            hp: 80,
            max_hp: 80,
            defense: 4,
            arts_defense: 4,
            dodge: 0,
            in_combat: true,
        };
        Arc::new(Self { id, owner, scope, level, state: Mutex::new(state) })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, PetState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn position(&self) -> Vec2 {
        self.lock().position
    }

    pub fn is_dead(&self) -> bool {
        self.lock().hp == 0
    }

    pub fn in_combat(&self) -> bool {
        self.lock().in_combat
    }

    pub fn defense_stats(&self) -> CombatantStats {
        let s = self.lock();
        CombatantStats {
            level: self.level,
            defense: s.defense,
            arts_defense: s.arts_defense,
            dodge: s.dodge,
            ..CombatantStats::default()
        }
    }

    /// Returns (remaining HP, died now).
    pub fn apply_hit(&self, damage: u32) -> (u32, bool) {
        let mut s = self.lock();
        let was_alive = s.hp > 0;
        s.hp = s.hp.saturating_sub(damage);
        (s.hp, was_alive && s.hp == 0)
    }
}

impl std::fmt::Debug for Pet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pet")
            .field("id", &self.id)
            .field("owner", &self.owner)
            .finish()
    }
}
