//! Per-creature behavior loop.
//!
//! Every creature runs its own self-rescheduling task: sleep a randomized
//! delay, take one decision tick, repeat. There is no global tick. The
//! decision step itself is synchronous so it can be driven directly from
//! tests with a seeded generator.

pub mod hooks;

use std::sync::Arc;
use std::time::Duration;

use log::{debug, trace, warn};
use rand::Rng;

use realm_shared::{Payload, Vec2};

use crate::entities::{Creature, TargetRef};
use crate::registry::EntityRef;
use crate::world::World;
use crate::{combat, movement, spatial, tuning};

/// Start the behavior loop task for a freshly spawned creature.
pub fn spawn_behavior_loop(world: Arc<World>, creature: Arc<Creature>) {
    tokio::spawn(async move {
        loop {
            let delay = {
                let mut rng = rand::thread_rng();
                rng.gen_range(tuning::BEHAVIOR_DELAY_MIN_MS..=tuning::BEHAVIOR_DELAY_MAX_MS)
            };
            tokio::time::sleep(Duration::from_millis(delay)).await;
            if !creature.loop_active() {
                trace!("behavior loop for creature {} exiting", creature.id);
                return;
            }
            let mut rng = rand::thread_rng();
            tick(&world, &creature, &mut rng);
        }
    });
}

/// One decision tick. Ordering matters: the cheap disqualifiers come
/// first, scripted hooks may consume the tick, then target upkeep, then
/// the distance-driven action.
pub fn tick(world: &Arc<World>, creature: &Arc<Creature>, rng: &mut impl Rng) {
    if creature.is_dead() {
        return;
    }

    // Nobody around to watch it: snap back to full and stand still.
    prune_sensers(world, creature);
    if creature.sensed_players().is_empty() {
        if let Some(target) = creature.target() {
            release_target(world, creature, target);
        }
        creature.heal_full();
        return;
    }

    if hooks::run(world, creature, rng) {
        return;
    }

    if creature.snapshot().mating {
        return;
    }

    validate_target(world, creature);

    if creature.target().is_none() && creature.template.combat_capable {
        acquire_target(world, creature, rng);
    }

    act(world, creature, rng);
}

/// Drop sensers that logged off or left the map.
fn prune_sensers(world: &Arc<World>, creature: &Arc<Creature>) {
    for player_id in creature.sensed_players() {
        let keep = world
            .players
            .find(player_id)
            .map(|p| p.is_online() && p.scope() == creature.scope)
            .unwrap_or(false);
        if !keep {
            creature.remove_senser(player_id);
        }
    }
}

fn release_target(world: &Arc<World>, creature: &Arc<Creature>, target: TargetRef) {
    creature.set_target(None);
    let owner = match target {
        TargetRef::Player(id) | TargetRef::Pet(id) => id,
        TargetRef::Creature(_) => return,
    };
    if let Some(player) = world.players.find(owner) {
        player.aggro_released();
    }
}

/// Clear a target that stopped being a valid victim; a mounted owner with
/// a fighting pet redirects to the pet instead.
fn validate_target(world: &Arc<World>, creature: &Arc<Creature>) {
    let Some(target) = creature.target() else {
        return;
    };
    match target {
        TargetRef::Player(id) => {
            let Some(player) = world.players.find(id) else {
                release_target(world, creature, target);
                return;
            };
            if !player.is_online()
                || player.is_dead()
                || !player.is_visible()
                || player.scope() != creature.scope
            {
                release_target(world, creature, target);
                return;
            }
            if player.is_mounted() {
                match player.combat_pet() {
                    // Keep the aggro count on the owner, swap the victim.
                    Some(_) => creature.set_target(Some(TargetRef::Pet(id))),
                    None => release_target(world, creature, target),
                }
            }
        }
        TargetRef::Pet(owner) => {
            let valid = world
                .players
                .find(owner)
                .filter(|p| p.is_online() && p.scope() == creature.scope)
                .and_then(|p| p.combat_pet())
                .is_some();
            if !valid {
                release_target(world, creature, target);
            }
        }
        TargetRef::Creature(id) => {
            let alive = world
                .registry
                .lookup(creature.scope, id)
                .and_then(|e| e.as_creature().map(|c| !c.is_dead()))
                .unwrap_or(false);
            if !alive {
                creature.set_target(None);
            }
        }
    }
}

/// Sample nearby hostile players for a new target. Acquisition is
/// probabilistic so a creature does not lock on the instant someone walks
/// by.
fn acquire_target(world: &Arc<World>, creature: &Arc<Creature>, rng: &mut impl Rng) {
    let origin = creature.position();
    let faction = creature.faction;
    let candidates = spatial::nearby(
        &world.registry,
        creature.scope,
        origin,
        tuning::AGGRO_RANGE,
        Some(tuning::AGGRO_TRIGGER_CHANCE),
        |e| {
            e.as_player()
                .map(|p| {
                    faction.hostile_to(p.faction)
                        && p.is_online()
                        && !p.is_dead()
                        && p.is_visible()
                        && p.aggro_count() < tuning::AGGRO_CAP
                })
                .unwrap_or(false)
        },
        rng,
    );
    let Some(EntityRef::Player(player)) = candidates.into_iter().next() else {
        return;
    };

    // A mounted owner can't be engaged directly, so the pet always takes
    // the hit; on foot the redirect is an occasional roll.
    let target = match player.combat_pet() {
        Some(_) if player.is_mounted() || rng.gen_bool(tuning::PET_REDIRECT_CHANCE) => {
            TargetRef::Pet(player.id)
        }
        _ => TargetRef::Player(player.id),
    };
    debug!("creature {} acquired {:?}", creature.id, target);
    creature.set_target(Some(target));
    player.aggro_acquired();
}

/// The distance-driven action: wander, strike, chase or retreat.
fn act(world: &Arc<World>, creature: &Arc<Creature>, rng: &mut impl Rng) {
    let snapshot = creature.snapshot();
    let Some(target) = snapshot.target else {
        if !snapshot.moving && rng.gen_bool(tuning::WANDER_CHANCE) {
            let destination = creature.zone.random_point(rng);
            movement::begin_move(world, creature, destination, creature.template.walk_speed, false);
        }
        return;
    };

    let Some(victim_pos) = target_position(world, creature, target) else {
        release_target(world, creature, target);
        return;
    };

    let leash = tuning::leash_range(creature.scope.map);
    let to_victim = snapshot.position.distance_to(victim_pos);

    if to_victim <= tuning::MELEE_RANGE {
        strike(world, creature, target, rng);
    } else if to_victim > leash || tuning::always_retreats(creature.faction) {
        // Leashed out (or a guard that never pursues): give up and run
        // home.
        release_target(world, creature, target);
        movement::begin_move(
            world,
            creature,
            creature.zone.anchor,
            creature.template.run_speed,
            true,
        );
    } else {
        let jitter = Vec2::new(
            rng.gen_range(-tuning::CHASE_OFFSET..=tuning::CHASE_OFFSET),
            rng.gen_range(-tuning::CHASE_OFFSET..=tuning::CHASE_OFFSET),
        );
        movement::begin_move(
            world,
            creature,
            victim_pos + jitter,
            creature.template.run_speed,
            true,
        );
    }
}

fn target_position(world: &Arc<World>, creature: &Arc<Creature>, target: TargetRef) -> Option<Vec2> {
    match target {
        TargetRef::Player(id) => world.players.find(id).map(|p| p.position()),
        TargetRef::Pet(owner) => {
            world.players.find(owner).and_then(|p| p.combat_pet()).map(|pet| pet.position())
        }
        TargetRef::Creature(id) => world
            .registry
            .lookup(creature.scope, id)
            .and_then(|e| e.as_creature().map(|c| c.position())),
    }
}

/// Resolve one melee-range strike against the current target. Skills are
/// an occasional roll when the template knows any and has the energy.
fn strike(world: &Arc<World>, creature: &Arc<Creature>, target: TargetRef, rng: &mut impl Rng) {
    let attacker = creature.combat_stats();
    let map = creature.scope.map;
    let skill_id = pick_skill(creature, rng);

    match target {
        TargetRef::Player(id) => {
            let Some(player) = world.players.find(id) else {
                release_target(world, creature, target);
                return;
            };
            // Directory ids are allocated from the player pseudo-id band,
            // so they fit a payload slot; anything wider is not
            // addressable and must not be truncated into one.
            let Ok(victim) = u16::try_from(id) else {
                warn!("player {} directory id is outside the broadcast id range", id);
                release_target(world, creature, target);
                return;
            };
            let outcome = resolve(&attacker, &player.defense_stats(), skill_id, map, rng);
            announce(world, creature, skill_id, victim, &outcome);
            if outcome.missed {
                return;
            }
            let (_, died) = player.apply_hit(outcome.damage, &outcome.afflictions);
            for effect in &outcome.afflictions {
                world.gateway.cast_near_entity(
                    creature.scope,
                    creature.id,
                    Payload::StatusInflicted { target: victim, effect: *effect }.encode(),
                );
            }
            if died {
                debug!("creature {} killed player {}", creature.id, id);
                release_target(world, creature, target);
            }
        }
        TargetRef::Pet(owner) => {
            let Some(pet) = world.players.find(owner).and_then(|p| p.combat_pet()) else {
                release_target(world, creature, target);
                return;
            };
            let outcome = resolve(&attacker, &pet.defense_stats(), skill_id, map, rng);
            announce(world, creature, skill_id, pet.id, &outcome);
            if outcome.missed {
                return;
            }
            let (_, died) = pet.apply_hit(outcome.damage);
            if died {
                release_target(world, creature, target);
            }
        }
        TargetRef::Creature(id) => {
            let Some(victim) =
                world.registry.lookup(creature.scope, id).and_then(|e| e.as_creature().cloned())
            else {
                creature.set_target(None);
                return;
            };
            let outcome = resolve(&attacker, &victim.combat_stats(), skill_id, map, rng);
            announce(world, creature, skill_id, id, &outcome);
            if outcome.missed {
                return;
            }
            let applied = victim.apply_damage(outcome.damage, None);
            if applied.killed {
                creature.set_target(None);
                world.handle_creature_death(&victim, rng);
            }
        }
    }
}

fn resolve(
    attacker: &combat::CombatantStats,
    defender: &combat::CombatantStats,
    skill_id: Option<u32>,
    map: u16,
    rng: &mut impl Rng,
) -> combat::AttackOutcome {
    match skill_id {
        Some(_) => combat::cast_skill(attacker, defender, map, rng),
        None => combat::attack(attacker, defender, map, rng),
    }
}

/// Roll whether this strike is a skill cast, and pay the energy cost if
/// so.
fn pick_skill(creature: &Arc<Creature>, rng: &mut impl Rng) -> Option<u32> {
    if !creature.template.knows_skills() || !rng.gen_bool(tuning::SKILL_CAST_CHANCE) {
        return None;
    }
    let skill = *creature.template.skill_ids.get(rng.gen_range(0..creature.template.skill_ids.len()))?;
    let mut s = creature.state.lock().unwrap_or_else(|e| e.into_inner());
    if s.energy < tuning::SKILL_ENERGY_COST {
        return None;
    }
    s.energy -= tuning::SKILL_ENERGY_COST;
    Some(skill)
}

fn announce(
    world: &Arc<World>,
    creature: &Arc<Creature>,
    skill_id: Option<u32>,
    victim: u16,
    outcome: &combat::AttackOutcome,
) {
    let payload = match skill_id {
        Some(skill_id) => Payload::SkillOutcome {
            attacker: creature.id,
            target: victim,
            skill_id,
            damage: outcome.damage,
            missed: outcome.missed,
        },
        None => Payload::AttackOutcome {
            attacker: creature.id,
            target: victim,
            damage: outcome.damage,
            missed: outcome.missed,
        },
    };
    world.gateway.cast_near_entity(creature.scope, creature.id, payload.encode());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broadcast::ChannelGateway;
    use crate::entities::Player;
    use crate::world::StaticDataStore;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use realm_shared::{Faction, ScopeKey};
    use std::time::Instant;

    fn world() -> Arc<World> {
        let (gateway, _rx) = ChannelGateway::new();
        let statics = Arc::new(StaticDataStore::with_defaults());
        World::new(0, statics, Arc::new(gateway), false)
    }

    fn join_player(world: &Arc<World>, id: u64, map: u16, pos: Vec2) -> Arc<Player> {
        let (player, _rx) =
            Player::new(id, format!("p{}", id), Faction::Crimson, 15, ScopeKey::new(0, map), pos);
        world.players.insert(Arc::clone(&player));
        player
    }

    fn spawn(world: &Arc<World>, zone_id: u32, rng: &mut StdRng) -> Arc<Creature> {
        let zone = world.statics.spawn_zone(zone_id).unwrap();
        let creature = world.spawn_creature(&zone, rng).unwrap();
        creature.deactivate_loop();
        creature
    }

    #[tokio::test]
    async fn test_unsensed_creature_regenerates_and_drops_target() {
        let world = world();
        let mut rng = StdRng::seed_from_u64(1);
        let creature = spawn(&world, 1, &mut rng);
        let player = join_player(&world, 1, 1, creature.position());
        creature.apply_damage(50, Some(1));
        creature.set_target(Some(TargetRef::Player(1)));
        player.aggro_acquired();

        tick(&world, &creature, &mut rng);
        assert_eq!(creature.snapshot().hp, creature.template.max_hp);
        assert_eq!(creature.target(), None);
        assert_eq!(player.aggro_count(), 0);
    }

    #[tokio::test]
    async fn test_sensed_hostile_player_gets_acquired() {
        let world = world();
        let mut rng = StdRng::seed_from_u64(2);
        let creature = spawn(&world, 1, &mut rng);
        let player = join_player(&world, 2, 1, creature.position());
        creature.add_senser(2);

        // Acquisition is sampled, so allow several ticks.
        for _ in 0..50 {
            tick(&world, &creature, &mut rng);
            if creature.target().is_some() {
                break;
            }
        }
        assert_eq!(creature.target(), Some(TargetRef::Player(2)));
        assert_eq!(player.aggro_count(), 1);
    }

    #[tokio::test]
    async fn test_saturated_player_is_not_acquired() {
        let world = world();
        let mut rng = StdRng::seed_from_u64(3);
        let creature = spawn(&world, 1, &mut rng);
        let player = join_player(&world, 3, 1, creature.position());
        creature.add_senser(3);
        for _ in 0..tuning::AGGRO_CAP {
            player.aggro_acquired();
        }

        for _ in 0..50 {
            tick(&world, &creature, &mut rng);
        }
        assert_eq!(creature.target(), None);
    }

    #[tokio::test]
    async fn test_invisible_player_is_ignored() {
        let world = world();
        let mut rng = StdRng::seed_from_u64(4);
        let creature = spawn(&world, 1, &mut rng);
        let player = join_player(&world, 4, 1, creature.position());
        player.state.lock().unwrap().invisible = true;
        creature.add_senser(4);

        for _ in 0..50 {
            tick(&world, &creature, &mut rng);
        }
        assert_eq!(creature.target(), None);
    }

    #[tokio::test]
    async fn test_offline_target_is_released() {
        let world = world();
        let mut rng = StdRng::seed_from_u64(5);
        let creature = spawn(&world, 1, &mut rng);
        let player = join_player(&world, 5, 1, creature.position());
        creature.add_senser(5);
        creature.set_target(Some(TargetRef::Player(5)));
        player.aggro_acquired();
        player.set_online(false);

        tick(&world, &creature, &mut rng);
        assert_eq!(creature.target(), None);
        assert_eq!(player.aggro_count(), 0);
    }

    #[tokio::test]
    async fn test_melee_strike_damages_player() {
        let world = world();
        let mut rng = StdRng::seed_from_u64(6);
        let creature = spawn(&world, 1, &mut rng);
        let player = join_player(&world, 6, 1, creature.position());
        player.state.lock().unwrap().max_hp = 100_000;
        player.state.lock().unwrap().hp = 100_000;
        creature.add_senser(6);
        creature.set_target(Some(TargetRef::Player(6)));
        player.aggro_acquired();

        for _ in 0..20 {
            tick(&world, &creature, &mut rng);
        }
        let hp = player.state.lock().unwrap().hp;
        assert!(hp < 100_000, "player took no damage over 20 ticks");
    }

    #[tokio::test]
    async fn test_guard_never_pursues_past_melee() {
        let world = world();
        let mut rng = StdRng::seed_from_u64(7);
        // Zone 3 spawns Crimson-aligned guards.
        let creature = spawn(&world, 3, &mut rng);
        assert!(tuning::always_retreats(creature.faction));
        let far = creature.position() + Vec2::new(tuning::MELEE_RANGE + 10.0, 0.0);
        // Azure so the Crimson guard is hostile.
        let (hostile, _rx) =
            Player::new(7, "p7".into(), Faction::Azure, 15, ScopeKey::new(0, 9), far);
        world.players.insert(hostile);
        creature.add_senser(7);
        creature.set_target(Some(TargetRef::Player(7)));

        tick(&world, &creature, &mut rng);
        assert_eq!(creature.target(), None, "guard kept chasing");
    }

    #[tokio::test]
    async fn test_leash_is_measured_to_the_target() {
        let world = world();
        let mut rng = StdRng::seed_from_u64(12);
        let creature = spawn(&world, 1, &mut rng);
        creature.state.lock().unwrap().position = creature.zone.anchor;
        let far = creature.zone.anchor + Vec2::new(tuning::leash_range(1) + 50.0, 0.0);
        let player = join_player(&world, 13, 1, far);
        creature.add_senser(13);
        creature.set_target(Some(TargetRef::Player(13)));
        player.aggro_acquired();

        tick(&world, &creature, &mut rng);
        assert_eq!(creature.target(), None, "kept chasing a target beyond leash range");
        assert_eq!(player.aggro_count(), 0);
    }

    #[tokio::test]
    async fn test_wide_directory_id_never_truncates_into_payloads() {
        let (gateway, mut rx) = ChannelGateway::new();
        let statics = Arc::new(StaticDataStore::with_defaults());
        let world = World::new(0, statics, Arc::new(gateway), false);
        let mut rng = StdRng::seed_from_u64(13);
        let creature = spawn(&world, 1, &mut rng);
        let wide_id = u64::from(u16::MAX) + 5_000;
        join_player(&world, wide_id, 1, creature.position());
        creature.add_senser(wide_id);
        creature.set_target(Some(TargetRef::Player(wide_id)));

        tick(&world, &creature, &mut rng);
        assert_eq!(creature.target(), None, "unaddressable target was kept");

        let aliased = wide_id as u16;
        while let Ok(request) = rx.try_recv() {
            let bytes = match request {
                crate::broadcast::BroadcastRequest::NearEntity { payload, .. } => payload,
                crate::broadcast::BroadcastRequest::Near { payload, .. } => payload,
                crate::broadcast::BroadcastRequest::Global { payload } => payload,
            };
            match Payload::decode(&bytes) {
                Some(Payload::AttackOutcome { target, .. })
                | Some(Payload::SkillOutcome { target, .. })
                | Some(Payload::StatusInflicted { target, .. }) => {
                    assert_ne!(target, aliased, "payload carries a truncated directory id");
                }
                _ => {}
            }
        }
    }

    #[tokio::test]
    async fn test_mating_blocks_combat_targeting() {
        let world = world();
        let mut rng = StdRng::seed_from_u64(8);
        let creature = spawn(&world, 1, &mut rng);
        join_player(&world, 8, 1, creature.position());
        creature.add_senser(8);
        creature.begin_mating(Instant::now() + std::time::Duration::from_secs(60));

        for _ in 0..50 {
            tick(&world, &creature, &mut rng);
        }
        assert_eq!(creature.target(), None);
    }

    #[tokio::test]
    async fn test_mounted_owner_redirects_to_pet() {
        let world = world();
        let mut rng = StdRng::seed_from_u64(9);
        let creature = spawn(&world, 1, &mut rng);
        let player = join_player(&world, 10, 1, creature.position());
        let pet =
            crate::entities::Pet::new(5010, 10, ScopeKey::new(0, 1), 12, creature.position());
        player.set_pet(Some(pet));
        player.state.lock().unwrap().mounted = true;
        creature.add_senser(10);
        creature.set_target(Some(TargetRef::Player(10)));

        tick(&world, &creature, &mut rng);
        assert_eq!(creature.target(), Some(TargetRef::Pet(10)));
    }

    #[tokio::test]
    async fn test_mate_seekers_pair_up_when_adjacent() {
        let world = world();
        let mut rng = StdRng::seed_from_u64(11);
        // Zone 2 spawns Plains Rabbits (mate seekers) on map 1.
        let a = spawn(&world, 2, &mut rng);
        let b = spawn(&world, 2, &mut rng);
        let spot = Vec2::new(100.0, 100.0);
        a.state.lock().unwrap().position = spot;
        b.state.lock().unwrap().position = spot;
        join_player(&world, 12, 1, spot);
        a.add_senser(12);

        // Seeking is chance-gated, so allow plenty of ticks.
        for _ in 0..200 {
            tick(&world, &a, &mut rng);
            if a.snapshot().mating {
                break;
            }
        }
        assert!(a.snapshot().mating, "seeker never entered the mating state");
        assert!(b.snapshot().mating, "peer was not pulled into the mating state");
    }

    #[tokio::test]
    async fn test_scavenger_consumes_marked_drop() {
        let world = world();
        let mut rng = StdRng::seed_from_u64(10);
        // Zone 5 spawns Gutter Imps (scavengers) on map 2.
        let creature = spawn(&world, 5, &mut rng);
        join_player(&world, 11, 2, creature.position());
        creature.add_senser(11);
        crate::loot::spawn_world_drop(
            &world,
            creature.scope,
            creature.position(),
            0,
            realm_shared::ItemInstance::plain(tuning::SCAVENGER_ITEM_ID, 1),
            None,
            &mut rng,
        );
        let had_drop = world
            .registry
            .snapshot(creature.scope)
            .into_iter()
            .any(|(_, e)| e.as_drop().is_some());
        assert!(had_drop);

        for _ in 0..200 {
            tick(&world, &creature, &mut rng);
            let gone = !world
                .registry
                .snapshot(creature.scope)
                .into_iter()
                .any(|(_, e)| e.as_drop().is_some());
            if gone {
                return;
            }
        }
        panic!("scavenger never consumed the drop");
    }
}
