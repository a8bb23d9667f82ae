//! Core spatial and identity types shared between the simulation core and
//! the protocol layer.

use serde::{Deserialize, Serialize};

/// A 2D world position (maps are flat planes).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn length(&self) -> f32 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    pub fn distance_to(&self, other: Vec2) -> f32 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        (dx * dx + dy * dy).sqrt()
    }

    pub fn normalized(&self) -> Self {
        let len = self.length();
        if len > 0.0001 {
            Self { x: self.x / len, y: self.y / len }
        } else {
            Self { x: 0.0, y: 0.0 }
        }
    }
}

impl std::ops::Add for Vec2 {
    type Output = Vec2;
    fn add(self, rhs: Vec2) -> Vec2 {
        Vec2 { x: self.x + rhs.x, y: self.y + rhs.y }
    }
}

impl std::ops::Sub for Vec2 {
    type Output = Vec2;
    fn sub(self, rhs: Vec2) -> Vec2 {
        Vec2 { x: self.x - rhs.x, y: self.y - rhs.y }
    }
}

impl std::ops::Mul<f32> for Vec2 {
    type Output = Vec2;
    fn mul(self, rhs: f32) -> Vec2 {
        Vec2 { x: self.x * rhs, y: self.y * rhs }
    }
}

/// Identifies one (server, map) partition. Pseudo-ids are unique within a
/// scope, never across scopes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScopeKey {
    pub server: u8,
    pub map: u16,
}

impl ScopeKey {
    pub fn new(server: u8, map: u16) -> Self {
        Self { server, map }
    }
}

/// Faction alignment. Creatures only aggro players of a hostile faction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Faction {
    Crimson = 0,
    Azure = 1,
    Wild = 2,
}

impl Faction {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Crimson),
            1 => Some(Self::Azure),
            2 => Some(Self::Wild),
            _ => None,
        }
    }

    pub fn as_u8(&self) -> u8 {
        *self as u8
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Crimson => "Crimson",
            Self::Azure => "Azure",
            Self::Wild => "Wild",
        }
    }

    /// Wild creatures are hostile to everyone; the two player factions are
    /// hostile to each other.
    pub fn hostile_to(&self, other: Faction) -> bool {
        match self {
            Self::Wild => true,
            _ => *self != other,
        }
    }
}

/// Status effects a hit can inflict when the attacker's corresponding
/// attack stat exceeds the defender's matching resist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatusEffect {
    Poison,
    Paralysis,
    Confusion,
}

// Pseudo-id bands per entity class. Players draw from a small sequential
// pool, pets from an owner-derived preferred slot, creatures and drops from
// wide random bands.
pub const PLAYER_ID_LO: u16 = 1;
pub const PLAYER_ID_HI: u16 = 1000;
pub const PET_ID_BASE: u16 = 5000;
pub const PET_ID_SPAN: u16 = 2000;
pub const CREATURE_ID_LO: u16 = 10000;
pub const CREATURE_ID_HI: u16 = 30000;
pub const DROP_ID_LO: u16 = 35000;
pub const DROP_ID_HI: u16 = 60000;
