//! Movement interpolation.
//!
//! Each `begin_move` bumps the creature's movement token and spawns a
//! self-rescheduling chain task. A chain only continues while the token it
//! captured still matches the creature's live token; a newer intent
//! silently supersedes an older chain. There is no explicit cancel call.

use std::sync::Arc;
use std::time::Duration;

use log::trace;

use realm_shared::{Payload, Vec2};

use crate::entities::Creature;
use crate::tuning;
use crate::world::World;

/// One interpolation step.
#[derive(Debug, Clone, Copy)]
pub struct StepOutcome {
    pub position: Vec2,
    pub arrived: bool,
}

/// Advance `start` toward `end` by one `speed`-length step; snap to `end`
/// when the remaining distance is shorter than the step.
pub fn advance(start: Vec2, end: Vec2, speed: f32) -> StepOutcome {
    let remaining = start.distance_to(end);
    if remaining < speed || remaining <= f32::EPSILON {
        return StepOutcome { position: end, arrived: true };
    }
    let direction = (end - start).normalized();
    StepOutcome { position: start + direction * speed, arrived: false }
}

/// Issue a fresh movement intent. Any chain holding the previous token
/// stops at its next wake-up.
pub fn begin_move(
    world: &Arc<World>,
    creature: &Arc<Creature>,
    target: Vec2,
    speed: f32,
    running: bool,
) {
    if speed <= 0.0 {
        return;
    }
    let token = {
        let mut s = creature.state.lock().unwrap_or_else(|e| e.into_inner());
        if s.dead {
            return;
        }
        s.move_token += 1;
        s.moving = true;
        s.move_token
    };
    trace!(
        "creature {} move intent to ({:.1}, {:.1}) token {}",
        creature.id,
        target.x,
        target.y,
        token
    );
    let world = Arc::clone(world);
    let creature = Arc::clone(creature);
    tokio::spawn(async move {
        run_chain(world, creature, token, target, speed, running).await;
    });
}

async fn run_chain(
    world: Arc<World>,
    creature: Arc<Creature>,
    token: u64,
    end: Vec2,
    speed: f32,
    running: bool,
) {
    loop {
        // One invocation: step under the state lock, then broadcast
        // outside it.
        let segment = {
            let mut s = creature.state.lock().unwrap_or_else(|e| e.into_inner());
            if s.move_token != token || s.dead {
                return;
            }
            let from = s.position;
            let step = advance(from, end, speed);
            s.position = step.position;
            if step.arrived {
                s.moving = false;
                return;
            }
            from
        };

        world.gateway.cast_near_entity(
            creature.scope,
            creature.id,
            Payload::Move { id: creature.id, from: segment, to: end, speed, running }.encode(),
        );

        tokio::time::sleep(Duration::from_millis(tuning::MOVE_TICK_MS)).await;
    }
}
