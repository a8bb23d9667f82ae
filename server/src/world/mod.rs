//! World state and lifecycle orchestration: spawning, death, respawn,
//! player attacks and drop pickup.

pub mod static_data;

pub use static_data::StaticDataStore;

use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use rand::Rng;

use realm_shared::{
    Payload, ScopeKey, SpawnZone, Vec2, CREATURE_ID_HI, CREATURE_ID_LO,
};

use crate::broadcast::BroadcastGateway;
use crate::entities::{Creature, TargetRef};
use crate::loot;
use crate::players::PlayerDirectory;
use crate::registry::{AllocPolicy, EntityRef, EntityRegistry, RegistryError};
use crate::tuning;
use crate::{ai, combat};

/// Shared world handle. Everything long-lived hangs off this.
pub struct World {
    pub server: u8,
    pub statics: Arc<StaticDataStore>,
    pub registry: EntityRegistry,
    pub players: PlayerDirectory,
    pub gateway: Arc<dyn BroadcastGateway>,
    /// PvP servers carry a global drop-rate bonus.
    pub pvp_server: bool,
}

impl World {
    pub fn new(
        server: u8,
        statics: Arc<StaticDataStore>,
        gateway: Arc<dyn BroadcastGateway>,
        pvp_server: bool,
    ) -> Arc<Self> {
        Arc::new(Self {
            server,
            statics,
            registry: EntityRegistry::new(),
            players: PlayerDirectory::new(),
            gateway,
            pvp_server,
        })
    }

    /// Spawn one creature into `zone` and start its behavior loop.
    pub fn spawn_creature(
        self: &Arc<Self>,
        zone: &Arc<SpawnZone>,
        rng: &mut impl Rng,
    ) -> Result<Arc<Creature>, RegistryError> {
        let template = match self.statics.template(zone.template_id) {
            Some(t) => t,
            None => {
                // A zone referencing a missing template is a data bug; skip
                // it rather than abort the whole population.
                warn!("zone {} references unknown template {}", zone.id, zone.template_id);
                return Err(RegistryError::Exhausted(ScopeKey::new(self.server, zone.map)));
            }
        };
        let scope = ScopeKey::new(self.server, zone.map);
        let position = zone.random_point(rng);

        let placeholder =
            Creature::new(0, scope, zone.faction, Arc::clone(&template), Arc::clone(zone), position);
        let id = self.registry.allocate(
            scope,
            AllocPolicy::RandomBand { lo: CREATURE_ID_LO, hi: CREATURE_ID_HI },
            EntityRef::Creature(placeholder),
            rng,
        )?;
        let creature =
            Creature::new(id, scope, zone.faction, template, Arc::clone(zone), position);
        self.registry.replace(scope, id, EntityRef::Creature(Arc::clone(&creature)));

        debug!(
            "spawned {} ({}) at ({:.1}, {:.1}) on map {}",
            creature.template.name, id, position.x, position.y, zone.map
        );
        self.gateway.cast_near(
            scope,
            position,
            Payload::CreatureSpawn { id, template_id: creature.template.id, position }.encode(),
        );

        ai::spawn_behavior_loop(Arc::clone(self), Arc::clone(&creature));
        Ok(creature)
    }

    /// Fill one zone to its configured population.
    pub fn spawn_zone_population(self: &Arc<Self>, zone: &Arc<SpawnZone>, rng: &mut impl Rng) {
        let mut spawned = 0;
        for _ in 0..zone.population {
            if self.spawn_creature(zone, rng).is_ok() {
                spawned += 1;
            }
        }
        info!("zone {} on map {}: {}/{} spawned", zone.id, zone.map, spawned, zone.population);
    }

    /// Spawn every zone's population across all maps.
    pub fn spawn_all_zones(self: &Arc<Self>, rng: &mut impl Rng) {
        let zones: Vec<_> = self.statics.zones().cloned().collect();
        for zone in &zones {
            self.spawn_zone_population(zone, rng);
        }
    }

    /// Full death sequence: freeze the creature, generate and place loot,
    /// hand out rewards, then despawn after a delay and schedule the
    /// respawn.
    pub fn handle_creature_death(self: &Arc<Self>, creature: &Arc<Creature>, rng: &mut impl Rng) {
        let prior_target = {
            // Stop the behavior loop and cancel any movement chain in one
            // lock.
            let mut s = creature.state.lock().unwrap_or_else(|e| e.into_inner());
            s.loop_active = false;
            s.move_token += 1;
            s.moving = false;
            s.target.take()
        };
        if let Some(TargetRef::Player(id) | TargetRef::Pet(id)) = prior_target {
            if let Some(player) = self.players.find(id) {
                player.aggro_released();
            }
        }
        let scope = creature.scope;
        let corpse = creature.position();
        info!("{} ({}) died on map {}", creature.template.name, creature.id, scope.map);
        self.gateway
            .cast_near_entity(scope, creature.id, Payload::CreatureDeath { id: creature.id }.encode());

        let claimant = creature.top_contributor();
        self.place_loot(creature, claimant, corpse, rng);

        if creature.template.boss {
            loot::distribute_boss_reward(self, creature);
        } else if let Some(player_id) = claimant {
            loot::award_kill(self, creature, player_id);
            creature.clear_damage_table();
        }

        // Corpse lingers briefly so clients can play the death before the
        // entity disappears.
        let world = Arc::clone(self);
        let dead = Arc::clone(creature);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(tuning::DEATH_DESPAWN_DELAY_MS)).await;
            world.registry.release(scope, dead.id);
            world
                .gateway
                .cast_near(scope, corpse, Payload::CreatureDespawn { id: dead.id }.encode());
        });

        self.schedule_respawn(creature, rng);
    }

    fn place_loot(
        self: &Arc<Self>,
        creature: &Arc<Creature>,
        claimant: Option<u64>,
        corpse: Vec2,
        rng: &mut impl Rng,
    ) {
        let map = creature.scope.map;
        let personal = claimant
            .and_then(|id| self.players.find(id))
            .map(|p| p.drop_multiplier())
            .unwrap_or(1.0);
        let rate =
            loot::effective_drop_rate(personal, self.pvp_server, creature.template.boss, map);
        let mut generated = loot::generate_drops(
            &self.statics,
            creature.template.drop_table_id,
            creature.template.boss,
            map,
            rate,
            rng,
        );

        // Non-attackable zones never put loot on the ground.
        if !creature.zone.attackable {
            generated.direct.append(&mut generated.ground);
        }

        if let Some(player) = claimant.and_then(|id| self.players.find(id)) {
            for item in generated.direct.drain(..) {
                player.write(&Payload::ItemDelivered { item: item.clone() });
                player.add_item(item);
            }
        }
        for (index, item) in generated.ground.into_iter().enumerate() {
            loot::spawn_world_drop(self, creature.scope, corpse, index, item, claimant, rng);
        }
    }

    fn schedule_respawn(self: &Arc<Self>, creature: &Arc<Creature>, rng: &mut impl Rng) {
        if creature.zone.once_only {
            info!("{} was a once-only spawn, not rescheduling", creature.template.name);
            return;
        }
        let base = tuning::forced_respawn_secs(creature.scope.map)
            .unwrap_or(creature.template.respawn_secs) as u64;
        let jitter_span = base * tuning::RESPAWN_JITTER_PCT as u64 / 100;
        let delay = if jitter_span > 0 {
            rng.gen_range(base - jitter_span..=base + jitter_span)
        } else {
            base
        };

        let world = Arc::clone(self);
        let zone = Arc::clone(&creature.zone);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(delay)).await;
            let result = {
                let mut rng = rand::thread_rng();
                world.spawn_creature(&zone, &mut rng)
            };
            if let Err(e) = result {
                warn!("respawn in zone {} failed: {}", zone.id, e);
            }
        });
    }

    /// A player's basic attack against a creature. Resolves the hit,
    /// applies it, makes the creature retaliate and runs the death
    /// sequence on a kill.
    pub fn player_attack_creature(
        self: &Arc<Self>,
        player_id: u64,
        creature_id: u16,
        rng: &mut impl Rng,
    ) {
        let Some(player) = self.players.find(player_id) else {
            return;
        };
        let scope = player.scope();
        let Some(creature) =
            self.registry.lookup(scope, creature_id).and_then(|e| e.as_creature().cloned())
        else {
            return;
        };
        if !creature.zone.attackable || creature.is_dead() {
            return;
        }

        let outcome =
            combat::attack(&player.attack_stats(), &creature.combat_stats(), scope.map, rng);
        // The connection layer rewrites the attacker slot with the
        // player's own pseudo-id before fan-out.
        self.gateway.cast_near_entity(
            scope,
            creature.id,
            Payload::AttackOutcome {
                attacker: 0,
                target: creature.id,
                damage: outcome.damage,
                missed: outcome.missed,
            }
            .encode(),
        );
        if outcome.missed {
            return;
        }

        let applied = creature.apply_damage(outcome.damage, Some(player_id));
        // A hit creature fights back if it is idle and able.
        if !applied.killed
            && creature.template.combat_capable
            && creature.target().is_none()
        {
            creature.set_target(Some(TargetRef::Player(player_id)));
            player.aggro_acquired();
        }
        if applied.killed {
            self.handle_creature_death(&creature, rng);
        }
    }

    /// Attempt a drop pickup. Honors the claim window, then moves the item
    /// into the player's inventory and despawns the drop.
    pub fn pickup_drop(self: &Arc<Self>, player_id: u64, drop_id: u16) -> bool {
        let Some(player) = self.players.find(player_id) else {
            return false;
        };
        let scope = player.scope();
        let Some(drop) = self.registry.lookup(scope, drop_id).and_then(|e| e.as_drop().cloned())
        else {
            return false;
        };
        if !drop.claimable_by(player_id, std::time::Instant::now()) {
            debug!("player {} denied pickup of claimed drop {}", player_id, drop_id);
            return false;
        }
        if self.registry.release(scope, drop_id).is_none() {
            // Someone else released it between lookup and here.
            return false;
        }
        player.write(&Payload::ItemDelivered { item: drop.item.clone() });
        player.add_item(drop.item.clone());
        self.gateway
            .cast_near(scope, drop.position, Payload::DropDespawn { id: drop_id }.encode());
        true
    }
}
