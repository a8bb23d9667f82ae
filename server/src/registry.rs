//! Pseudo-id registry, one namespace per (server, map) scope.
//!
//! Every addressable entity (creature, player, pet, drop) holds a small
//! integer id used in broadcast payloads. Concurrent lookups share a read
//! lock; allocate and release take the write lock.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use rand::Rng;

use realm_shared::{ScopeKey, Vec2};

use crate::entities::{Creature, Pet, Player, WorldDrop};

/// How many random probes a band allocation makes before falling back to a
/// linear scan. The bands dwarf expected populations, so the scan is a
/// rarely taken safety net.
const RANDOM_PROBES: u32 = 64;

#[derive(Clone)]
pub enum EntityRef {
    Creature(Arc<Creature>),
    Player(Arc<Player>),
    Pet(Arc<Pet>),
    Drop(Arc<WorldDrop>),
}

impl EntityRef {
    pub fn position(&self) -> Vec2 {
        match self {
            EntityRef::Creature(c) => c.position(),
            EntityRef::Player(p) => p.position(),
            EntityRef::Pet(p) => p.position(),
            EntityRef::Drop(d) => d.position,
        }
    }

    pub fn as_creature(&self) -> Option<&Arc<Creature>> {
        match self {
            EntityRef::Creature(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_player(&self) -> Option<&Arc<Player>> {
        match self {
            EntityRef::Player(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_drop(&self) -> Option<&Arc<WorldDrop>> {
        match self {
            EntityRef::Drop(d) => Some(d),
            _ => None,
        }
    }
}

impl std::fmt::Debug for EntityRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntityRef::Creature(c) => write!(f, "Creature({})", c.id),
            EntityRef::Player(p) => write!(f, "Player({})", p.id),
            EntityRef::Pet(p) => write!(f, "Pet({})", p.id),
            EntityRef::Drop(d) => write!(f, "Drop({})", d.id),
        }
    }
}

/// Where an allocation draws its id from.
#[derive(Debug, Clone, Copy)]
pub enum AllocPolicy {
    /// Random probe inside [lo, hi], linear scan fallback. Creatures and
    /// drops.
    RandomBand { lo: u16, hi: u16 },
    /// First free slot in [lo, hi]; exhaustion is a capacity error.
    /// Players.
    Sequential { lo: u16, hi: u16 },
    /// Owner-derived preferred slot, then linear scan in [lo, hi]. Pets.
    Preferred { slot: u16, lo: u16, hi: u16 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryError {
    /// No free id in the requested range for this scope.
    Exhausted(ScopeKey),
}

impl std::fmt::Display for RegistryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegistryError::Exhausted(scope) => {
                write!(f, "id space exhausted for server {} map {}", scope.server, scope.map)
            }
        }
    }
}

impl std::error::Error for RegistryError {}

#[derive(Default)]
pub struct EntityRegistry {
    scopes: RwLock<HashMap<ScopeKey, HashMap<u16, EntityRef>>>,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<ScopeKey, HashMap<u16, EntityRef>>> {
        self.scopes.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<ScopeKey, HashMap<u16, EntityRef>>> {
        self.scopes.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Allocate an id for `entity` in `scope` according to `policy`.
    pub fn allocate(
        &self,
        scope: ScopeKey,
        policy: AllocPolicy,
        entity: EntityRef,
        rng: &mut impl Rng,
    ) -> Result<u16, RegistryError> {
        let mut scopes = self.write();
        let slots = scopes.entry(scope).or_default();

        let id = match policy {
            AllocPolicy::RandomBand { lo, hi } => {
                let mut found = None;
                for _ in 0..RANDOM_PROBES {
                    let candidate = rng.gen_range(lo..=hi);
                    if !slots.contains_key(&candidate) {
                        found = Some(candidate);
                        break;
                    }
                }
                match found {
                    Some(id) => id,
                    None => first_free(slots, lo, hi).ok_or(RegistryError::Exhausted(scope))?,
                }
            }
            AllocPolicy::Sequential { lo, hi } => {
                first_free(slots, lo, hi).ok_or(RegistryError::Exhausted(scope))?
            }
            AllocPolicy::Preferred { slot, lo, hi } => {
                if !slots.contains_key(&slot) {
                    slot
                } else {
                    first_free(slots, lo, hi).ok_or(RegistryError::Exhausted(scope))?
                }
            }
        };

        slots.insert(id, entity);
        Ok(id)
    }

    /// Swap the entity registered under an already-allocated id. Used when
    /// an entity carries its own id and can only be built after allocation.
    pub fn replace(&self, scope: ScopeKey, id: u16, entity: EntityRef) -> bool {
        let mut scopes = self.write();
        match scopes.get_mut(&scope).and_then(|slots| slots.get_mut(&id)) {
            Some(slot) => {
                *slot = entity;
                true
            }
            None => false,
        }
    }

    /// Remove and return the entity holding `id`, making the id available
    /// for reuse.
    pub fn release(&self, scope: ScopeKey, id: u16) -> Option<EntityRef> {
        let mut scopes = self.write();
        scopes.get_mut(&scope)?.remove(&id)
    }

    pub fn lookup(&self, scope: ScopeKey, id: u16) -> Option<EntityRef> {
        let scopes = self.read();
        scopes.get(&scope)?.get(&id).cloned()
    }

    /// Snapshot of one scope for O(n) spatial scans.
    pub fn snapshot(&self, scope: ScopeKey) -> Vec<(u16, EntityRef)> {
        let scopes = self.read();
        scopes
            .get(&scope)
            .map(|slots| slots.iter().map(|(id, e)| (*id, e.clone())).collect())
            .unwrap_or_default()
    }

    pub fn count(&self, scope: ScopeKey) -> usize {
        let scopes = self.read();
        scopes.get(&scope).map(|s| s.len()).unwrap_or(0)
    }
}

fn first_free(slots: &HashMap<u16, EntityRef>, lo: u16, hi: u16) -> Option<u16> {
    (lo..=hi).find(|id| !slots.contains_key(id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use realm_shared::Faction;

    fn player_ref(id: u64) -> EntityRef {
        let (p, _rx) = Player::new(
            id,
            format!("p{}", id),
            Faction::Crimson,
            10,
            ScopeKey::new(0, 1),
            Vec2::new(0.0, 0.0),
        );
        EntityRef::Player(p)
    }

    #[test]
    fn test_random_band_never_duplicates() {
        let registry = EntityRegistry::new();
        let scope = ScopeKey::new(0, 1);
        let mut rng = StdRng::seed_from_u64(1);
        let mut seen = std::collections::HashSet::new();
        for i in 0..500u64 {
            let id = registry
                .allocate(
                    scope,
                    AllocPolicy::RandomBand { lo: 100, hi: 1099 },
                    player_ref(i),
                    &mut rng,
                )
                .unwrap();
            assert!(seen.insert(id), "id {} assigned twice", id);
        }
    }

    #[test]
    fn test_release_makes_id_reusable() {
        let registry = EntityRegistry::new();
        let scope = ScopeKey::new(0, 1);
        let mut rng = StdRng::seed_from_u64(2);
        let id = registry
            .allocate(scope, AllocPolicy::Sequential { lo: 1, hi: 1 }, player_ref(1), &mut rng)
            .unwrap();
        assert_eq!(id, 1);
        assert!(registry
            .allocate(scope, AllocPolicy::Sequential { lo: 1, hi: 1 }, player_ref(2), &mut rng)
            .is_err());
        registry.release(scope, id);
        let again = registry
            .allocate(scope, AllocPolicy::Sequential { lo: 1, hi: 1 }, player_ref(3), &mut rng)
            .unwrap();
        assert_eq!(again, 1);
    }

    #[test]
    fn test_sequential_pool_reports_exhaustion() {
        let registry = EntityRegistry::new();
        let scope = ScopeKey::new(0, 2);
        let mut rng = StdRng::seed_from_u64(3);
        for i in 0..4u64 {
            registry
                .allocate(scope, AllocPolicy::Sequential { lo: 1, hi: 4 }, player_ref(i), &mut rng)
                .unwrap();
        }
        let err = registry
            .allocate(scope, AllocPolicy::Sequential { lo: 1, hi: 4 }, player_ref(9), &mut rng)
            .unwrap_err();
        assert_eq!(err, RegistryError::Exhausted(scope));
    }

    #[test]
    fn test_preferred_slot_falls_back_when_taken() {
        let registry = EntityRegistry::new();
        let scope = ScopeKey::new(0, 3);
        let mut rng = StdRng::seed_from_u64(4);
        let policy = AllocPolicy::Preferred { slot: 50, lo: 50, hi: 60 };
        assert_eq!(registry.allocate(scope, policy, player_ref(1), &mut rng).unwrap(), 50);
        let second = registry.allocate(scope, policy, player_ref(2), &mut rng).unwrap();
        assert_ne!(second, 50);
        assert!((50..=60).contains(&second));
    }

    #[test]
    fn test_replace_requires_live_allocation() {
        let registry = EntityRegistry::new();
        let scope = ScopeKey::new(0, 4);
        let mut rng = StdRng::seed_from_u64(6);
        assert!(!registry.replace(scope, 7, player_ref(1)));
        let id = registry
            .allocate(scope, AllocPolicy::Sequential { lo: 7, hi: 7 }, player_ref(1), &mut rng)
            .unwrap();
        assert!(registry.replace(scope, id, player_ref(2)));
        let found = registry.lookup(scope, id).unwrap();
        assert_eq!(found.as_player().unwrap().id, 2);
    }

    #[test]
    fn test_scopes_are_independent_namespaces() {
        let registry = EntityRegistry::new();
        let mut rng = StdRng::seed_from_u64(5);
        let a = registry
            .allocate(
                ScopeKey::new(0, 1),
                AllocPolicy::Sequential { lo: 1, hi: 10 },
                player_ref(1),
                &mut rng,
            )
            .unwrap();
        let b = registry
            .allocate(
                ScopeKey::new(0, 2),
                AllocPolicy::Sequential { lo: 1, hi: 10 },
                player_ref(2),
                &mut rng,
            )
            .unwrap();
        assert_eq!(a, b);
    }
}
