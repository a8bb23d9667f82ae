//! Loot generation and reward distribution.
//!
//! A death walks the template's drop table with a seeded cascade: roll a
//! seed against the table's cumulative thresholds, follow chained tables,
//! and reject classes that never hit the ground. The resolved items are
//! either spawned as claimable world drops or pushed straight into the
//! claimant's inventory.

use std::time::{Duration, Instant};

use log::{debug, info, warn};
use rand::seq::SliceRandom;
use rand::Rng;

use realm_shared::{
    DropTable, ItemClass, ItemInstance, Payload, ScopeKey, Vec2, DROP_ID_HI, DROP_ID_LO,
};

use crate::entities::{Creature, WorldDrop};
use crate::registry::AllocPolicy;
use crate::tuning;
use crate::world::{StaticDataStore, World};
use std::sync::Arc;

/// Everything one death produced.
#[derive(Debug, Default)]
pub struct GeneratedLoot {
    /// Items that become claimable world drops.
    pub ground: Vec<ItemInstance>,
    /// Items delivered straight to the claimant (relics, and everything
    /// from non-attackable zones).
    pub direct: Vec<ItemInstance>,
}

/// Effective drop rate for one death. A flat per-map override replaces the
/// whole formula; otherwise the personal multiplier, PvP-server bonus, boss
/// bonus and additive map bonus all fold in.
pub fn effective_drop_rate(personal: f64, pvp_server: bool, boss: bool, map: u16) -> f64 {
    if let Some(flat) = tuning::map_drop_override(map) {
        return flat;
    }
    let mut multiplier = personal;
    if pvp_server {
        multiplier += tuning::PVP_SERVER_DROP_BONUS;
    }
    let mut rate = tuning::BASE_DROP_RATE * multiplier;
    if boss {
        rate += tuning::BOSS_DROP_BONUS;
    }
    rate + tuning::map_drop_bonus(map)
}

/// Roll a seed for one table walk. The roll space is `ceiling * rate`
/// (the ceiling being the table's fail threshold), widened to the rescale
/// floor when the scaled ceiling falls below it (equivalent to linearly
/// rescaling the thresholds up), then mapped back into table space by
/// dividing the rate out. Seeds landing in the fail band past the entry
/// thresholds mean no drop.
fn roll_seed(table: &DropTable, rate: f64, rng: &mut impl Rng) -> Option<u32> {
    let ceiling = table.ceiling();
    if ceiling == 0 || rate <= 0.0 {
        return None;
    }
    let scaled = (ceiling as f64 * rate).max(1.0);
    let roll_space = scaled.max(tuning::DROP_RESCALE_FLOOR as f64);
    let roll = rng.gen_range(0.0..roll_space);
    Some((roll / rate) as u32)
}

/// One full walk of `root_table`, following chained tables. A resolved item
/// id that names another drop table re-enters the walk against that table.
/// Every roll (including chain hops) counts against the shared attempt
/// budget.
fn walk_table(
    statics: &StaticDataStore,
    root_table: u32,
    rate: f64,
    attempts: &mut u32,
    rng: &mut impl Rng,
) -> Option<u32> {
    let mut table = statics.drop_table(root_table)?;
    loop {
        if *attempts >= tuning::MAX_DROP_ATTEMPTS {
            warn!("drop walk hit attempt cap on table {}", table.id);
            return None;
        }
        *attempts += 1;
        let seed = roll_seed(&table, rate, rng)?;
        let item_id = table.resolve(seed)?;
        match statics.drop_table(item_id) {
            Some(next) => table = next,
            None => return Some(item_id),
        }
    }
}

/// Roll the enhancement block for a dropped equipment piece. Classes
/// without an upgrade pool come out plain.
pub fn roll_enhancement(item_id: u32, class: ItemClass, rng: &mut impl Rng) -> ItemInstance {
    let mut item = ItemInstance::plain(item_id, 1);
    let Some(pool) = tuning::upgrade_pool(class) else {
        return item;
    };

    // A cosmetic appearance roll replaces the functional upgrade entirely.
    if rng.gen_bool(tuning::APPEARANCE_CHANCE) {
        item.appearance = true;
        return item;
    }

    let roll = rng.gen_range(0..1000u32);
    let mut plus = 0u8;
    for (threshold, ladder_plus) in tuning::PLUS_LADDER {
        if roll < threshold {
            plus = ladder_plus;
            break;
        }
    }
    if class == ItemClass::Pendant {
        plus = plus.max(tuning::PENDANT_MIN_PLUS);
    }
    item.plus = plus;
    if let Some(code) = pool.choose(rng) {
        item.upgrade_code = *code;
    }
    item
}

/// Generate the full loot of one death. Bosses run extra passes and roll
/// more times per pass. Quest items never drop; relics are suppressed or
/// double-gated per map and always deliver directly; everything else must
/// pass a flat probability gate before it hits the ground.
pub fn generate_drops(
    statics: &StaticDataStore,
    table_id: u32,
    boss: bool,
    map: u16,
    rate: f64,
    rng: &mut impl Rng,
) -> GeneratedLoot {
    let mut loot = GeneratedLoot::default();
    if table_id == 0 {
        return loot;
    }

    let passes = if boss { tuning::BOSS_DROP_PASSES } else { tuning::DROP_PASSES };
    let rolls = if boss { tuning::BOSS_MIN_DROP_ROLLS } else { tuning::MIN_DROP_ROLLS };
    let mut attempts = 0u32;

    for _ in 0..passes {
        for _ in 0..rolls {
            // A disallowed category or a failed flat gate discards the
            // item and re-rolls the walk; the shared attempt budget bounds
            // the retries. A fail-band seed ends the roll empty-handed.
            loop {
                if attempts >= tuning::MAX_DROP_ATTEMPTS {
                    return loot;
                }
                let Some(item_id) = walk_table(statics, table_id, rate, &mut attempts, rng)
                else {
                    break;
                };
                let Some(def) = statics.item_def(item_id) else {
                    warn!("drop table {} resolved unknown item {}", table_id, item_id);
                    break;
                };
                match def.class {
                    ItemClass::Quest => continue,
                    ItemClass::Relic => {
                        if tuning::relic_suppressed(map) {
                            debug!("relic {} suppressed on map {}", item_id, map);
                            break;
                        }
                        if tuning::relic_double_gate(map)
                            && !(rng.gen_bool(0.5) && rng.gen_bool(0.5))
                        {
                            break;
                        }
                        loot.direct.push(ItemInstance::plain(item_id, 1));
                        break;
                    }
                    _ => {}
                }
                if !rng.gen_bool(tuning::SECONDARY_DROP_GATE) {
                    continue;
                }
                loot.ground.push(roll_enhancement(item_id, def.class, rng));
                break;
            }
        }
    }
    loot
}

/// Register and broadcast one world drop. `ring_index` offsets successive
/// drops from the same death around the corpse. Spawns the expiry task.
pub fn spawn_world_drop(
    world: &Arc<World>,
    scope: ScopeKey,
    corpse: Vec2,
    ring_index: usize,
    item: ItemInstance,
    claimant: Option<u64>,
    rng: &mut impl Rng,
) {
    let (dx, dy) = tuning::DROP_RING[ring_index % tuning::DROP_RING.len()];
    let position = corpse + Vec2::new(dx, dy);
    let now = Instant::now();

    // Id is assigned by the registry, so build the drop, allocate, then
    // rebuild with the real id.
    let make = |id: u16| WorldDrop {
        id,
        scope,
        item: item.clone(),
        position,
        claimant,
        claim_until: now + Duration::from_secs(tuning::CLAIM_WINDOW_SECS),
        expires_at: now + Duration::from_secs(tuning::DROP_LIFETIME_SECS),
    };
    let placeholder = Arc::new(make(0));
    let id = match world.registry.allocate(
        scope,
        AllocPolicy::RandomBand { lo: DROP_ID_LO, hi: DROP_ID_HI },
        crate::registry::EntityRef::Drop(Arc::clone(&placeholder)),
        rng,
    ) {
        Ok(id) => id,
        Err(e) => {
            warn!("could not place world drop: {}", e);
            return;
        }
    };
    let drop = Arc::new(make(id));
    // Swap the placeholder for the drop carrying its real id.
    if !world.registry.replace(scope, id, crate::registry::EntityRef::Drop(Arc::clone(&drop))) {
        return;
    }

    world.gateway.cast_near(
        scope,
        position,
        Payload::DropSpawn { id, item: drop.item.clone(), position }.encode(),
    );

    let world = Arc::clone(world);
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(tuning::DROP_LIFETIME_SECS)).await;
        // Pickup may have released the id already; only despawn if the
        // same drop is still registered.
        let still_there = world
            .registry
            .lookup(scope, id)
            .and_then(|e| e.as_drop().map(|d| Arc::ptr_eq(d, &drop)))
            .unwrap_or(false);
        if still_there {
            world.registry.release(scope, id);
            world.gateway.cast_near(scope, position, Payload::DropDespawn { id }.encode());
            debug!("world drop {} expired", id);
        }
    });
}

/// Standard kill rewards: full gold and experience to the claimant.
pub fn award_kill(world: &Arc<World>, creature: &Creature, claimant: u64) {
    let Some(player) = world.players.find(claimant) else {
        return;
    };
    if !player.is_online() {
        return;
    }
    let gold = creature.template.gold_reward;
    let exp = creature.template.exp_reward;
    if gold > 0 {
        player.add_gold(gold);
        player.write(&Payload::GoldReward { amount: gold });
    }
    if exp > 0 {
        player.add_experience(exp);
        player.write(&Payload::ExpReward { amount: exp });
    }
}

/// Boss kills split the gold reward across every damage contributor in
/// proportion to damage dealt. Offline contributors and players too far
/// below the boss's level forfeit their share. Clears the damage table.
pub fn distribute_boss_reward(world: &Arc<World>, creature: &Creature) {
    let contributions = creature.damage_contributions();
    let total: u64 = contributions.iter().map(|(_, dmg)| dmg).sum();
    if total == 0 {
        creature.clear_damage_table();
        return;
    }
    let boss_level = creature.template.level;
    let floor_level = boss_level.saturating_sub(tuning::BOSS_REWARD_LEVEL_GAP);

    for (player_id, dmg) in contributions {
        let Some(player) = world.players.find(player_id) else {
            continue;
        };
        if !player.is_online() || player.level < floor_level {
            continue;
        }
        let share = (creature.template.gold_reward as u64 * dmg / total) as u32;
        let gold = share.min(tuning::BOSS_REWARD_CAP);
        let exp = (creature.template.exp_reward as u64 * dmg / total) as u32;
        if gold > 0 {
            player.add_gold(gold);
            player.write(&Payload::GoldReward { amount: gold });
        }
        if exp > 0 {
            player.add_experience(exp);
            player.write(&Payload::ExpReward { amount: exp });
        }
        info!(
            "boss {} reward: player {} dealt {}/{} damage, {} gold {} exp",
            creature.template.name, player_id, dmg, total, gold, exp
        );
    }
    creature.clear_damage_table();
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use realm_shared::DropEntry;

    fn statics() -> StaticDataStore {
        StaticDataStore::with_defaults()
    }

    #[test]
    fn test_map_override_replaces_formula() {
        // Map 27 carries a flat 3.0 multiplier.
        let rate = effective_drop_rate(10.0, true, true, 27);
        assert!((rate - 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_rate_formula_composition() {
        // personal 1.0 + pvp 0.5 = 1.5, boss +0.3, map 40 +0.5.
        let rate = effective_drop_rate(1.0, true, true, 40);
        assert!((rate - 2.3).abs() < 1e-9);
    }

    #[test]
    fn test_walk_resolves_through_chained_table() {
        // Table 1 entry at threshold 350 names table 200, which only
        // resolves real items, so no walk may ever return id 200.
        let statics = statics();
        let mut rng = StdRng::seed_from_u64(42);
        let mut attempts = 0;
        for _ in 0..300 {
            if let Some(item) = walk_table(&statics, 1, 1.0, &mut attempts, &mut rng) {
                assert_ne!(item, 200);
                assert!(statics.item_def(item).is_some());
            }
            attempts = 0;
        }
    }

    #[test]
    fn test_fail_band_produces_empty_rolls() {
        // A standalone table must be able to resolve nothing: the roll
        // space reaches the fail threshold, not just the last entry.
        let table = DropTable {
            id: 7,
            entries: vec![
                DropEntry { item_id: 10, threshold: 200 },
                DropEntry { item_id: 11, threshold: 500 },
                DropEntry { item_id: 12, threshold: 1000 },
            ],
            fail_threshold: 2000,
        };
        let mut rng = StdRng::seed_from_u64(9);
        let mut fails = 0u32;
        let mut hits = 0u32;
        for _ in 0..10_000 {
            match roll_seed(&table, 1.0, &mut rng).and_then(|seed| table.resolve(seed)) {
                Some(_) => hits += 1,
                None => fails += 1,
            }
        }
        assert!(fails > 0, "table never failed to drop");
        assert!(hits > 0, "table never dropped at all");
    }

    #[test]
    fn test_flat_gate_thins_single_roll_kills() {
        // The flat gate applies to every resolved item, and a rejection
        // re-rolls the walk instead of voiding the roll. On table 1 at
        // rate 1.0 that works out to landing an item roughly half the
        // time.
        let statics = statics();
        let mut rng = StdRng::seed_from_u64(21);
        let runs = 2000u32;
        let mut landed = 0u32;
        for _ in 0..runs {
            let loot = generate_drops(&statics, 1, false, 1, 1.0, &mut rng);
            assert!(loot.ground.len() <= 1);
            if !loot.ground.is_empty() {
                landed += 1;
            }
        }
        assert!(landed > runs * 2 / 5, "gate rejections must retry the walk, not void the roll");
        assert!(landed < runs * 3 / 5, "the gate must also apply to the first resolved item");
    }

    #[test]
    fn test_walk_attempt_budget_is_bounded() {
        let statics = statics();
        let mut rng = StdRng::seed_from_u64(1);
        let mut attempts = tuning::MAX_DROP_ATTEMPTS;
        assert_eq!(walk_table(&statics, 1, 1.0, &mut attempts, &mut rng), None);
    }

    #[test]
    fn test_zero_rate_never_drops() {
        let statics = statics();
        let mut rng = StdRng::seed_from_u64(2);
        let loot = generate_drops(&statics, 1, false, 1, 0.0, &mut rng);
        assert!(loot.ground.is_empty());
        assert!(loot.direct.is_empty());
    }

    #[test]
    fn test_missing_table_drops_nothing() {
        let statics = statics();
        let mut rng = StdRng::seed_from_u64(3);
        let loot = generate_drops(&statics, 0, false, 1, 1.0, &mut rng);
        assert!(loot.ground.is_empty());
    }

    #[test]
    fn test_relics_suppressed_on_town_maps() {
        // Boss table 2 leads with a relic; map 1 suppresses relics, so
        // nothing may ever deliver one there.
        let statics = statics();
        let mut rng = StdRng::seed_from_u64(4);
        for _ in 0..50 {
            let loot = generate_drops(&statics, 2, true, 1, 1.0, &mut rng);
            assert!(loot.direct.is_empty());
            for item in &loot.ground {
                assert_ne!(item.item_id, 16);
            }
        }
    }

    #[test]
    fn test_relics_go_direct_not_ground() {
        let statics = statics();
        let mut rng = StdRng::seed_from_u64(5);
        let mut saw_relic = false;
        for _ in 0..200 {
            let loot = generate_drops(&statics, 2, true, 9, 1.0, &mut rng);
            for item in &loot.ground {
                assert_ne!(item.item_id, 16);
            }
            saw_relic |= loot.direct.iter().any(|i| i.item_id == 16);
        }
        assert!(saw_relic, "boss table never delivered its relic");
    }

    #[test]
    fn test_pendant_enhancement_floor() {
        let mut rng = StdRng::seed_from_u64(6);
        for _ in 0..200 {
            let item = roll_enhancement(13, ItemClass::Pendant, &mut rng);
            if !item.appearance {
                assert!(item.plus >= tuning::PENDANT_MIN_PLUS);
                assert!(tuning::PENDANT_UPGRADE_CODES.contains(&item.upgrade_code));
            }
        }
    }

    #[test]
    fn test_consumables_drop_plain() {
        let mut rng = StdRng::seed_from_u64(7);
        let item = roll_enhancement(14, ItemClass::Consumable, &mut rng);
        assert_eq!(item.plus, 0);
        assert_eq!(item.upgrade_code, 0);
        assert!(!item.appearance);
    }

    #[test]
    fn test_enhancement_plus_never_exceeds_ladder_top() {
        let mut rng = StdRng::seed_from_u64(8);
        for _ in 0..2000 {
            let item = roll_enhancement(10, ItemClass::Weapon, &mut rng);
            assert!(item.plus <= 5);
        }
    }
}
