//! Server-side entity definitions.

pub mod creature;
pub mod pet;
pub mod player;
pub mod world_drop;

pub use creature::{Creature, CreatureSnapshot, DamageApplied, TargetRef};
pub use pet::Pet;
pub use player::Player;
pub use world_drop::WorldDrop;
