//! Player directory: the core's narrow window onto connected players.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::entities::Player;

#[derive(Default)]
pub struct PlayerDirectory {
    players: RwLock<HashMap<u64, Arc<Player>>>,
}

impl PlayerDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<u64, Arc<Player>>> {
        self.players.read().unwrap_or_else(|e| e.into_inner())
    }

    pub fn insert(&self, player: Arc<Player>) {
        let mut players = self.players.write().unwrap_or_else(|e| e.into_inner());
        players.insert(player.id, player);
    }

    pub fn remove(&self, id: u64) -> Option<Arc<Player>> {
        let mut players = self.players.write().unwrap_or_else(|e| e.into_inner());
        players.remove(&id)
    }

    pub fn find(&self, id: u64) -> Option<Arc<Player>> {
        self.read().get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }
}
