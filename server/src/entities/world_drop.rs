//! A dropped item lying in the world.

use std::time::Instant;

use realm_shared::{ItemInstance, ScopeKey, Vec2};

/// Immutable once created; pickup removes it from the registry, the expiry
/// task removes it on timeout.
#[derive(Debug, Clone)]
pub struct WorldDrop {
    pub id: u16,
    pub scope: ScopeKey,
    pub item: ItemInstance,
    pub position: Vec2,
    /// Priority pickup holder, normally the top damage contributor.
    pub claimant: Option<u64>,
    /// After this instant anyone may pick the drop up.
    pub claim_until: Instant,
    pub expires_at: Instant,
}

impl WorldDrop {
    pub fn claimable_by(&self, player_id: u64, now: Instant) -> bool {
        match self.claimant {
            None => true,
            Some(owner) => owner == player_id || now >= self.claim_until,
        }
    }
}
