//! Server-side view of a connected player.
//!
//! The connection and persistence layers own the player's authoritative
//! record; the core only needs online state, position, faction, combat
//! stats, an inventory sink and a payload push channel.

use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

use log::trace;
use realm_shared::{Faction, ItemInstance, Payload, ScopeKey, StatusEffect, Vec2};

use crate::combat::CombatantStats;
use crate::entities::pet::Pet;

#[derive(Debug)]
pub struct PlayerState {
    pub online: bool,
    pub scope: ScopeKey,
    pub position: Vec2,
    pub hp: u32,
    pub max_hp: u32,
    pub min_atk: u32,
    pub max_atk: u32,
    pub defense: u32,
    pub arts_defense: u32,
    pub dodge: u32,
    pub damage_reduction_pct: u32,
    pub reflect_chance_pct: u32,
    pub reflect_reduction_pct: u32,
    pub poison_resist: u32,
    pub paralysis_resist: u32,
    pub confusion_resist: u32,
    pub mounted: bool,
    pub invisible: bool,
    /// Passive-regeneration mode; interrupted by any hit.
    pub meditating: bool,
    pub injury: u32,
    pub afflictions: Vec<StatusEffect>,
    /// How many creatures currently have this player targeted.
    pub aggro_count: u32,
    /// Personal drop-rate multiplier (premium bonuses and the like).
    pub drop_multiplier: f64,
    pub inventory: Vec<ItemInstance>,
    pub gold: u64,
    pub experience: u64,
    pub pet: Option<Arc<Pet>>,
}

pub struct Player {
    /// Directory id. The connection layer allocates it from the player
    /// pseudo-id band at login, so it doubles as the broadcast id.
    pub id: u64,
    pub name: String,
    pub faction: Faction,
    pub level: u32,
    pub state: Mutex<PlayerState>,
    tx: mpsc::UnboundedSender<Vec<u8>>,
}

impl Player {
    /// Returns the player plus the receiving half of its push channel; the
    /// connection layer drains the receiver into the socket.
    pub fn new(
        id: u64,
        name: String,
        faction: Faction,
        level: u32,
        scope: ScopeKey,
        position: Vec2,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<Vec<u8>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let state = PlayerState {
            online: true,
            scope,
            position,
            hp: 100,
            max_hp: 100,
            min_atk: 8,
            max_atk: 14,
            defense: 5,
            arts_defense: 5,
            dodge: 0,
            damage_reduction_pct: 0,
            reflect_chance_pct: 0,
            reflect_reduction_pct: 0,
            poison_resist: 0,
            paralysis_resist: 0,
            confusion_resist: 0,
            mounted: false,
            invisible: false,
            meditating: false,
            injury: 0,
            afflictions: Vec::new(),
            aggro_count: 0,
            drop_multiplier: 1.0,
            inventory: Vec::new(),
            gold: 0,
            experience: 0,
            pet: None,
        };
        (Arc::new(Self { id, name, faction, level, state: Mutex::new(state), tx }), rx)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, PlayerState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn is_online(&self) -> bool {
        self.lock().online
    }

    pub fn set_online(&self, online: bool) {
        self.lock().online = online;
    }

    pub fn scope(&self) -> ScopeKey {
        self.lock().scope
    }

    pub fn position(&self) -> Vec2 {
        self.lock().position
    }

    pub fn is_dead(&self) -> bool {
        self.lock().hp == 0
    }

    pub fn is_visible(&self) -> bool {
        !self.lock().invisible
    }

    pub fn is_mounted(&self) -> bool {
        self.lock().mounted
    }

    pub fn aggro_count(&self) -> u32 {
        self.lock().aggro_count
    }

    pub fn aggro_acquired(&self) {
        self.lock().aggro_count += 1;
    }

    pub fn aggro_released(&self) {
        let mut s = self.lock();
        s.aggro_count = s.aggro_count.saturating_sub(1);
    }

    pub fn combat_pet(&self) -> Option<Arc<Pet>> {
        let s = self.lock();
        s.pet.as_ref().filter(|p| p.in_combat() && !p.is_dead()).map(Arc::clone)
    }

    pub fn set_pet(&self, pet: Option<Arc<Pet>>) {
        self.lock().pet = pet;
    }

    /// Defender stat snapshot for the combat resolver.
    pub fn defense_stats(&self) -> CombatantStats {
        let s = self.lock();
        stats_from(self.level, &s)
    }

    /// Attacker stat snapshot for the combat resolver.
    pub fn attack_stats(&self) -> CombatantStats {
        let s = self.lock();
        CombatantStats { min_atk: s.min_atk, max_atk: s.max_atk, ..stats_from(self.level, &s) }
    }

    /// Apply a resolved hit: interrupts meditation, accrues injury, records
    /// afflictions and subtracts HP. Returns (remaining HP, died now).
    pub fn apply_hit(&self, damage: u32, afflictions: &[StatusEffect]) -> (u32, bool) {
        let mut s = self.lock();
        let was_alive = s.hp > 0;
        s.meditating = false;
        s.injury = (s.injury + crate::tuning::INJURY_STEP).min(crate::tuning::INJURY_CAP);
        for effect in afflictions {
            if !s.afflictions.contains(effect) {
                s.afflictions.push(*effect);
            }
        }
        s.hp = s.hp.saturating_sub(damage);
        (s.hp, was_alive && s.hp == 0)
    }

    pub fn add_item(&self, item: ItemInstance) {
        self.lock().inventory.push(item);
    }

    pub fn add_gold(&self, amount: u32) {
        self.lock().gold += amount as u64;
    }

    pub fn add_experience(&self, amount: u32) {
        self.lock().experience += amount as u64;
    }

    pub fn drop_multiplier(&self) -> f64 {
        self.lock().drop_multiplier
    }

    /// Push an encoded payload to this player's connection. Fire and
    /// forget: a closed channel just means the player is gone.
    pub fn write(&self, payload: &Payload) {
        if self.tx.send(payload.encode()).is_err() {
            trace!("dropping payload for disconnected player {}", self.id);
        }
    }
}

fn stats_from(level: u32, s: &PlayerState) -> CombatantStats {
    CombatantStats {
        level,
        min_atk: 0,
        max_atk: 0,
        defense: s.defense,
        arts_defense: s.arts_defense,
        dodge: s.dodge,
        damage_reduction_pct: s.damage_reduction_pct,
        reflect_chance_pct: s.reflect_chance_pct,
        reflect_reduction_pct: s.reflect_reduction_pct,
        poison_attack: 0,
        paralysis_attack: 0,
        confusion_attack: 0,
        poison_resist: s.poison_resist,
        paralysis_resist: s.paralysis_resist,
        confusion_resist: s.confusion_resist,
    }
}

impl std::fmt::Debug for Player {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Player")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("faction", &self.faction)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_interrupts_meditation_and_caps_injury() {
        let (p, _rx) = Player::new(
            1,
            "tester".into(),
            Faction::Crimson,
            10,
            ScopeKey::new(0, 1),
            Vec2::new(0.0, 0.0),
        );
        p.lock().meditating = true;
        for _ in 0..200 {
            p.apply_hit(0, &[]);
        }
        let s = p.lock();
        assert!(!s.meditating);
        assert_eq!(s.injury, crate::tuning::INJURY_CAP);
    }

    #[test]
    fn test_lethal_hit_reports_death_once() {
        let (p, _rx) = Player::new(
            2,
            "tester".into(),
            Faction::Azure,
            10,
            ScopeKey::new(0, 1),
            Vec2::new(0.0, 0.0),
        );
        let (_, died) = p.apply_hit(150, &[]);
        assert!(died);
        let (_, died_again) = p.apply_hit(50, &[]);
        assert!(!died_again);
    }
}
