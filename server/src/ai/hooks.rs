//! Scripted per-template behaviors that run ahead of the generic decision
//! step. Only a handful of templates carry one.

use std::sync::Arc;
use std::time::{Duration, Instant};

use log::debug;
use rand::Rng;

use realm_shared::{BehaviorHook, Payload};

use crate::entities::Creature;
use crate::registry::EntityRef;
use crate::{loot, movement, spatial, tuning};
use crate::world::World;

/// Run the creature's hook, if any. Returns true when the hook consumed
/// this tick and the generic decision step should be skipped.
pub fn run(world: &Arc<World>, creature: &Arc<Creature>, rng: &mut impl Rng) -> bool {
    match creature.template.hook {
        None => false,
        Some(BehaviorHook::Scavenger) => scavenge(world, creature, rng),
        Some(BehaviorHook::MateSeeker) => seek_mate(world, creature, rng),
    }
}

/// Scavengers wander toward a specific item lying nearby and eat it.
fn scavenge(world: &Arc<World>, creature: &Arc<Creature>, rng: &mut impl Rng) -> bool {
    if !rng.gen_bool(tuning::SCAVENGE_CHANCE) {
        return false;
    }
    let origin = creature.position();
    let found = spatial::nearby(
        &world.registry,
        creature.scope,
        origin,
        tuning::SCAVENGE_RANGE,
        None,
        |e| {
            e.as_drop()
                .map(|d| d.item.item_id == tuning::SCAVENGER_ITEM_ID)
                .unwrap_or(false)
        },
        rng,
    );
    let Some(EntityRef::Drop(drop)) = found.into_iter().next() else {
        return false;
    };

    if drop.position.distance_to(origin) <= tuning::MELEE_RANGE {
        // Close enough: eat it.
        if world.registry.release(creature.scope, drop.id).is_some() {
            debug!("{} ({}) scavenged drop {}", creature.template.name, creature.id, drop.id);
            world.gateway.cast_near(
                creature.scope,
                drop.position,
                Payload::DropDespawn { id: drop.id }.encode(),
            );
        }
    } else {
        movement::begin_move(world, creature, drop.position, creature.template.walk_speed, false);
    }
    true
}

/// Mate seekers approach a same-template peer; once adjacent, both enter a
/// timed mating state that blocks combat targeting. Mating occasionally
/// leaves a claimless drop behind.
fn seek_mate(world: &Arc<World>, creature: &Arc<Creature>, rng: &mut impl Rng) -> bool {
    if creature.snapshot().mating {
        return false;
    }
    if !rng.gen_bool(tuning::MATE_SEEK_CHANCE) {
        return false;
    }
    let origin = creature.position();
    let template_id = creature.template.id;
    let own_id = creature.id;
    let found = spatial::nearby(
        &world.registry,
        creature.scope,
        origin,
        tuning::MATE_SEEK_RANGE,
        None,
        |e| {
            e.as_creature()
                .map(|c| {
                    c.id != own_id && c.template.id == template_id && {
                        let snap = c.snapshot();
                        !snap.dead && !snap.mating
                    }
                })
                .unwrap_or(false)
        },
        rng,
    );
    let Some(EntityRef::Creature(peer)) = found.into_iter().next() else {
        return false;
    };

    let peer_pos = peer.position();
    if peer_pos.distance_to(origin) > tuning::MELEE_RANGE {
        movement::begin_move(world, creature, peer_pos, creature.template.walk_speed, false);
        return true;
    }

    let until = Instant::now() + Duration::from_secs(tuning::MATING_SECS);
    creature.begin_mating(until);
    peer.begin_mating(until);
    debug!("{} {} and {} started mating", creature.template.name, creature.id, peer.id);

    let world = Arc::clone(world);
    let scope = creature.scope;
    let midpoint = (origin + peer_pos) * 0.5;
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(tuning::MATING_SECS)).await;
        let mut rng = rand::thread_rng();
        if rng.gen_bool(tuning::MATE_DROP_CHANCE) {
            loot::spawn_world_drop(
                &world,
                scope,
                midpoint,
                0,
                realm_shared::ItemInstance::plain(tuning::MATE_DROP_ITEM_ID, 1),
                None,
                &mut rng,
            );
        }
    });
    true
}
