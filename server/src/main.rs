//! Realm creature simulation server.
//!
//! Hosts the per-map creature populations: spawning, behavior loops,
//! movement, combat, loot and respawn. The connection layer attaches to
//! the broadcast channel and the world handle.

mod ai;
mod broadcast;
mod combat;
mod entities;
mod loot;
mod movement;
mod players;
mod registry;
mod spatial;
mod tuning;
mod world;

use std::sync::Arc;

use log::{debug, info};

use crate::broadcast::{BroadcastRequest, ChannelGateway};
use crate::world::{StaticDataStore, World};

const SERVER_ID: u8 = 0;
const DATA_DIR: &str = "data";

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    info!("Starting realm server {}...", SERVER_ID);

    let statics = Arc::new(StaticDataStore::load_from_dir(DATA_DIR));
    let pvp_server = std::env::var("REALM_PVP").map(|v| v == "1").unwrap_or(false);
    if pvp_server {
        info!("PvP ruleset active, drop-rate bonus applies");
    }

    let (gateway, mut broadcasts) = ChannelGateway::new();
    // The connection layer will take over this receiver; until then just
    // log the traffic so the simulation can run standalone.
    tokio::spawn(async move {
        while let Some(request) = broadcasts.recv().await {
            match request {
                BroadcastRequest::NearEntity { scope, entity_id, .. } => {
                    debug!("broadcast near entity {} on map {}", entity_id, scope.map);
                }
                BroadcastRequest::Near { scope, origin, .. } => {
                    debug!(
                        "broadcast near ({:.1}, {:.1}) on map {}",
                        origin.x, origin.y, scope.map
                    );
                }
                BroadcastRequest::Global { .. } => {
                    debug!("global broadcast");
                }
            }
        }
    });

    let world = World::new(SERVER_ID, statics, Arc::new(gateway), pvp_server);
    {
        let mut rng = rand::thread_rng();
        world.spawn_all_zones(&mut rng);
    }
    info!("World populated, simulation running");

    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("Failed to listen for shutdown signal: {}", e);
    }
    info!("Shutting down");
}
