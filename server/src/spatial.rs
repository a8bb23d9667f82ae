//! Radius queries over one (server, map) slice.
//!
//! A flat O(n) scan over the scope's registered entities. Per-map
//! populations are bounded, so no spatial index is kept. Results are
//! shuffled so callers picking a head element get a uniformly random
//! candidate rather than a positionally biased one.

use rand::seq::SliceRandom;
use rand::Rng;

use realm_shared::{ScopeKey, Vec2};

use crate::registry::{EntityRegistry, EntityRef};

/// Entities within `radius` of `origin` that pass `filter`.
///
/// `sample_chance`, when set, gates each candidate with an independent
/// probability roll (the aggro-trigger chance lives here so target
/// acquisition samples rather than always locking on).
pub fn nearby<F>(
    registry: &EntityRegistry,
    scope: ScopeKey,
    origin: Vec2,
    radius: f32,
    sample_chance: Option<f64>,
    filter: F,
    rng: &mut impl Rng,
) -> Vec<EntityRef>
where
    F: Fn(&EntityRef) -> bool,
{
    let mut out: Vec<EntityRef> = registry
        .snapshot(scope)
        .into_iter()
        .map(|(_, entity)| entity)
        .filter(|entity| entity.position().distance_to(origin) <= radius)
        .filter(|entity| filter(entity))
        .collect();

    if let Some(chance) = sample_chance {
        out.retain(|_| rng.gen_bool(chance.clamp(0.0, 1.0)));
    }

    out.shuffle(rng);
    out
}
