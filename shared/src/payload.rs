//! Broadcastable payloads produced by the simulation core.
//!
//! The protocol layer treats these as opaque bytes; `encode` is the only
//! contract between the core and the wire.

use serde::{Deserialize, Serialize};

use crate::items::ItemInstance;
use crate::types::{StatusEffect, Vec2};

/// Everything the core broadcasts near an entity or pushes to one player.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Payload {
    CreatureSpawn {
        id: u16,
        template_id: u32,
        position: Vec2,
    },
    CreatureDespawn {
        id: u16,
    },
    /// One movement segment: the client interpolates from `from` to `to`.
    Move {
        id: u16,
        from: Vec2,
        to: Vec2,
        speed: f32,
        running: bool,
    },
    AttackOutcome {
        attacker: u16,
        target: u16,
        damage: u32,
        missed: bool,
    },
    SkillOutcome {
        attacker: u16,
        target: u16,
        skill_id: u32,
        damage: u32,
        missed: bool,
    },
    StatusInflicted {
        target: u16,
        effect: StatusEffect,
    },
    CreatureDeath {
        id: u16,
    },
    DropSpawn {
        id: u16,
        item: ItemInstance,
        position: Vec2,
    },
    DropDespawn {
        id: u16,
    },
    /// Pushed directly to one player's connection.
    GoldReward {
        amount: u32,
    },
    ExpReward {
        amount: u32,
    },
    ItemDelivered {
        item: ItemInstance,
    },
}

impl Payload {
    /// Encode for broadcast. Encoding these enums cannot realistically
    /// fail; an empty payload is returned (and ignored downstream) if it
    /// ever does.
    pub fn encode(&self) -> Vec<u8> {
        bincode::serialize(self).unwrap_or_default()
    }

    pub fn decode(bytes: &[u8]) -> Option<Self> {
        bincode::deserialize(bytes).ok()
    }
}
