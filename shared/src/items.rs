//! Item definitions and item instances.

use serde::{Deserialize, Serialize};

/// Item class. Drives which enhancement pool applies and whether the item
/// may drop at all (quest items never drop; relics are delivered directly).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemClass {
    Weapon,
    Armor,
    Accessory,
    Pendant,
    Consumable,
    Quest,
    Relic,
}

/// Static item definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemDef {
    pub id: u32,
    pub name: String,
    pub class: ItemClass,
    #[serde(default = "default_stack")]
    pub max_stack: u32,
}

fn default_stack() -> u32 {
    1
}

/// A concrete item as it exists in an inventory or on the ground.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemInstance {
    pub item_id: u32,
    pub quantity: u32,
    /// Enhancement level rolled at drop time.
    pub plus: u8,
    /// Which upgrade-code pool slot the enhancement occupies.
    pub upgrade_code: u8,
    /// Cosmetic variant flag; replaces the functional upgrade.
    pub appearance: bool,
}

impl ItemInstance {
    pub fn plain(item_id: u32, quantity: u32) -> Self {
        Self { item_id, quantity, plus: 0, upgrade_code: 0, appearance: false }
    }
}
