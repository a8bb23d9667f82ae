//! Static game data: creature templates, spawn zones, drop tables, items.
//!
//! Loaded once at startup from JSON files exported by the data pipeline,
//! with hardcoded fallback content when the files are missing so the server
//! always comes up. Read-only after load.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use log::{error, info, warn};

use realm_shared::{
    BehaviorHook, CreatureTemplate, DropEntry, DropTable, Faction, ItemClass, ItemDef, SpawnZone,
    Vec2,
};

#[derive(Default)]
pub struct StaticDataStore {
    templates: HashMap<u32, Arc<CreatureTemplate>>,
    zones: HashMap<u32, Arc<SpawnZone>>,
    drop_tables: HashMap<u32, Arc<DropTable>>,
    items: HashMap<u32, ItemDef>,
}

impl StaticDataStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load all data files from `dir`. Files that are missing or fail to
    /// parse fall back to the built-in defaults for that category.
    pub fn load_from_dir<P: AsRef<Path>>(dir: P) -> Self {
        let dir = dir.as_ref();
        let mut store = Self::new();

        if !store.load_templates(dir.join("templates.json")) {
            info!("No usable templates.json, using built-in templates");
            store.install_default_templates();
        }
        if !store.load_zones(dir.join("zones.json")) {
            info!("No usable zones.json, using built-in spawn zones");
            store.install_default_zones();
        }
        if !store.load_drop_tables(dir.join("drop_tables.json")) {
            info!("No usable drop_tables.json, using built-in drop tables");
            store.install_default_drop_tables();
        }
        if !store.load_items(dir.join("items.json")) {
            info!("No usable items.json, using built-in items");
            store.install_default_items();
        }

        info!(
            "Static data ready: {} templates, {} zones, {} drop tables, {} items",
            store.templates.len(),
            store.zones.len(),
            store.drop_tables.len(),
            store.items.len()
        );
        store
    }

    /// Entirely built-in content; used by tests and when no data directory
    /// exists.
    pub fn with_defaults() -> Self {
        let mut store = Self::new();
        store.install_default_templates();
        store.install_default_zones();
        store.install_default_drop_tables();
        store.install_default_items();
        store
    }

    fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Option<T> {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) => {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!("Failed to read {:?}: {}", path, e);
                }
                return None;
            }
        };
        match serde_json::from_str(&content) {
            Ok(v) => Some(v),
            Err(e) => {
                error!("Failed to parse {:?}: {}", path, e);
                None
            }
        }
    }

    fn load_templates(&mut self, path: std::path::PathBuf) -> bool {
        let Some(list) = Self::read_json::<Vec<CreatureTemplate>>(&path) else {
            return false;
        };
        for t in list {
            self.templates.insert(t.id, Arc::new(t));
        }
        info!("Loaded {} creature templates from {:?}", self.templates.len(), path);
        !self.templates.is_empty()
    }

    fn load_zones(&mut self, path: std::path::PathBuf) -> bool {
        let Some(list) = Self::read_json::<Vec<SpawnZone>>(&path) else {
            return false;
        };
        for z in list {
            if z.min.x >= z.max.x || z.min.y >= z.max.y {
                warn!("Spawn zone {} has degenerate bounds, skipping", z.id);
                continue;
            }
            self.zones.insert(z.id, Arc::new(z));
        }
        info!("Loaded {} spawn zones from {:?}", self.zones.len(), path);
        !self.zones.is_empty()
    }

    fn load_drop_tables(&mut self, path: std::path::PathBuf) -> bool {
        let Some(list) = Self::read_json::<Vec<DropTable>>(&path) else {
            return false;
        };
        for t in list {
            let ordered = t.entries.windows(2).all(|w| w[0].threshold <= w[1].threshold);
            if !ordered {
                warn!("Drop table {} thresholds are not cumulative, skipping", t.id);
                continue;
            }
            self.drop_tables.insert(t.id, Arc::new(t));
        }
        info!("Loaded {} drop tables from {:?}", self.drop_tables.len(), path);
        !self.drop_tables.is_empty()
    }

    fn load_items(&mut self, path: std::path::PathBuf) -> bool {
        let Some(list) = Self::read_json::<Vec<ItemDef>>(&path) else {
            return false;
        };
        for i in list {
            self.items.insert(i.id, i);
        }
        info!("Loaded {} item definitions from {:?}", self.items.len(), path);
        !self.items.is_empty()
    }

    pub fn template(&self, id: u32) -> Option<Arc<CreatureTemplate>> {
        self.templates.get(&id).cloned()
    }

    pub fn spawn_zone(&self, id: u32) -> Option<Arc<SpawnZone>> {
        self.zones.get(&id).cloned()
    }

    pub fn zones(&self) -> impl Iterator<Item = &Arc<SpawnZone>> {
        self.zones.values()
    }

    pub fn drop_table(&self, id: u32) -> Option<Arc<DropTable>> {
        self.drop_tables.get(&id).cloned()
    }

    pub fn item_def(&self, id: u32) -> Option<&ItemDef> {
        self.items.get(&id)
    }

    fn install_default_templates(&mut self) {
        let base = CreatureTemplate {
            id: 0,
            name: String::new(),
            level: 1,
            max_hp: 50,
            max_energy: 20,
            min_atk: 4,
            max_atk: 8,
            defense: 2,
            arts_defense: 2,
            dodge: 0,
            damage_reduction_pct: 0,
            reflect_chance_pct: 0,
            reflect_reduction_pct: 0,
            poison_attack: 0,
            paralysis_attack: 0,
            confusion_attack: 0,
            poison_resist: 0,
            paralysis_resist: 0,
            confusion_resist: 0,
            skill_ids: vec![],
            walk_speed: 1.2,
            run_speed: 2.6,
            gold_reward: 10,
            exp_reward: 15,
            drop_table_id: 0,
            respawn_secs: 40,
            combat_capable: true,
            boss: false,
            hook: None,
        };

        let templates = vec![
            CreatureTemplate {
                id: 1,
                name: "Dire Wolf".into(),
                level: 12,
                max_hp: 120,
                min_atk: 8,
                max_atk: 14,
                defense: 4,
                drop_table_id: 1,
                ..base.clone()
            },
            CreatureTemplate {
                id: 2,
                name: "Barrow Guard".into(),
                level: 45,
                max_hp: 600,
                min_atk: 22,
                max_atk: 38,
                defense: 14,
                arts_defense: 10,
                dodge: 120,
                poison_attack: 8,
                skill_ids: vec![301],
                drop_table_id: 1,
                respawn_secs: 120,
                ..base.clone()
            },
            CreatureTemplate {
                id: 3,
                name: "Ashen Colossus".into(),
                level: 130,
                max_hp: 20000,
                min_atk: 90,
                max_atk: 140,
                defense: 45,
                arts_defense: 40,
                dodge: 400,
                skill_ids: vec![310, 311],
                gold_reward: 20000,
                exp_reward: 50000,
                drop_table_id: 2,
                respawn_secs: 1800,
                boss: true,
                ..base.clone()
            },
            CreatureTemplate {
                id: 4,
                name: "Plains Rabbit".into(),
                level: 1,
                max_hp: 20,
                min_atk: 1,
                max_atk: 2,
                defense: 0,
                gold_reward: 0,
                exp_reward: 1,
                combat_capable: false,
                hook: Some(BehaviorHook::MateSeeker),
                ..base.clone()
            },
            CreatureTemplate {
                id: 5,
                name: "Gutter Imp".into(),
                level: 8,
                max_hp: 60,
                min_atk: 5,
                max_atk: 9,
                defense: 2,
                drop_table_id: 1,
                hook: Some(BehaviorHook::Scavenger),
                ..base.clone()
            },
        ];
        for t in templates {
            self.templates.insert(t.id, Arc::new(t));
        }
    }

    fn install_default_zones(&mut self) {
        let zones = vec![
            SpawnZone {
                id: 1,
                map: 1,
                min: Vec2::new(-60.0, -60.0),
                max: Vec2::new(60.0, 60.0),
                anchor: Vec2::new(0.0, 0.0),
                template_id: 1,
                population: 6,
                faction: Faction::Wild,
                attackable: true,
                once_only: false,
            },
            SpawnZone {
                id: 2,
                map: 1,
                min: Vec2::new(80.0, 80.0),
                max: Vec2::new(120.0, 120.0),
                anchor: Vec2::new(100.0, 100.0),
                template_id: 4,
                population: 4,
                faction: Faction::Wild,
                attackable: true,
                once_only: false,
            },
            SpawnZone {
                id: 3,
                map: 9,
                min: Vec2::new(-20.0, -20.0),
                max: Vec2::new(20.0, 20.0),
                anchor: Vec2::new(0.0, 0.0),
                template_id: 2,
                population: 2,
                faction: Faction::Crimson,
                attackable: true,
                once_only: true,
            },
            SpawnZone {
                id: 4,
                map: 27,
                min: Vec2::new(-30.0, -30.0),
                max: Vec2::new(30.0, 30.0),
                anchor: Vec2::new(0.0, 0.0),
                template_id: 3,
                population: 1,
                faction: Faction::Wild,
                attackable: true,
                once_only: false,
            },
            // Sanctum: kills here deliver loot directly, nothing hits the
            // ground.
            SpawnZone {
                id: 5,
                map: 2,
                min: Vec2::new(-15.0, -15.0),
                max: Vec2::new(15.0, 15.0),
                anchor: Vec2::new(0.0, 0.0),
                template_id: 5,
                population: 3,
                faction: Faction::Wild,
                attackable: false,
                once_only: false,
            },
        ];
        for z in zones {
            self.zones.insert(z.id, Arc::new(z));
        }
    }

    fn install_default_drop_tables(&mut self) {
        let tables = vec![
            // Entry 200 chains into table 200 below.
            DropTable {
                id: 1,
                entries: vec![
                    DropEntry { item_id: 10, threshold: 200 },
                    DropEntry { item_id: 200, threshold: 350 },
                    DropEntry { item_id: 11, threshold: 500 },
                    DropEntry { item_id: 14, threshold: 1000 },
                ],
                fail_threshold: 1400,
            },
            DropTable {
                id: 2,
                entries: vec![
                    DropEntry { item_id: 16, threshold: 100 },
                    DropEntry { item_id: 13, threshold: 300 },
                    DropEntry { item_id: 12, threshold: 600 },
                ],
                fail_threshold: 900,
            },
            DropTable {
                id: 200,
                entries: vec![
                    DropEntry { item_id: 12, threshold: 300 },
                    DropEntry { item_id: 13, threshold: 800 },
                ],
                fail_threshold: 1000,
            },
        ];
        for t in tables {
            self.drop_tables.insert(t.id, Arc::new(t));
        }
    }

    fn install_default_items(&mut self) {
        let items = vec![
            ItemDef { id: 10, name: "Short Sword".into(), class: ItemClass::Weapon, max_stack: 1 },
            ItemDef { id: 11, name: "Leather Cuirass".into(), class: ItemClass::Armor, max_stack: 1 },
            ItemDef { id: 12, name: "Copper Ring".into(), class: ItemClass::Accessory, max_stack: 1 },
            ItemDef { id: 13, name: "Moon Pendant".into(), class: ItemClass::Pendant, max_stack: 1 },
            ItemDef {
                id: 14,
                name: "Healing Draught".into(),
                class: ItemClass::Consumable,
                max_stack: 20,
            },
            ItemDef { id: 15, name: "Sealed Writ".into(), class: ItemClass::Quest, max_stack: 1 },
            ItemDef { id: 16, name: "Sunfire Relic".into(), class: ItemClass::Relic, max_stack: 1 },
            ItemDef {
                id: 90,
                name: "Carrion Scrap".into(),
                class: ItemClass::Consumable,
                max_stack: 50,
            },
            ItemDef { id: 91, name: "Rabbit Tuft".into(), class: ItemClass::Consumable, max_stack: 50 },
        ];
        for i in items {
            self.items.insert(i.id, i);
        }
    }
}
