//! Broadcast boundary. The core only knows "cast these bytes near X";
//! framing and fan-out belong to the connection layer.

use log::warn;
use tokio::sync::mpsc;

use realm_shared::{ScopeKey, Vec2};

/// Fire-and-forget broadcast sink. Implementations must never block the
/// caller; failures are logged and swallowed.
pub trait BroadcastGateway: Send + Sync {
    fn cast_near_entity(&self, scope: ScopeKey, entity_id: u16, payload: Vec<u8>);
    fn cast_near(&self, scope: ScopeKey, origin: Vec2, payload: Vec<u8>);
    fn cast_global(&self, payload: Vec<u8>);
}

/// A broadcast request as handed to the connection layer.
#[derive(Debug)]
pub enum BroadcastRequest {
    NearEntity { scope: ScopeKey, entity_id: u16, payload: Vec<u8> },
    Near { scope: ScopeKey, origin: Vec2, payload: Vec<u8> },
    Global { payload: Vec<u8> },
}

/// Channel-backed gateway: the connection layer drains the receiver.
pub struct ChannelGateway {
    tx: mpsc::UnboundedSender<BroadcastRequest>,
}

impl ChannelGateway {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<BroadcastRequest>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn send(&self, request: BroadcastRequest) {
        if self.tx.send(request).is_err() {
            warn!("broadcast gateway closed, dropping request");
        }
    }
}

impl BroadcastGateway for ChannelGateway {
    fn cast_near_entity(&self, scope: ScopeKey, entity_id: u16, payload: Vec<u8>) {
        self.send(BroadcastRequest::NearEntity { scope, entity_id, payload });
    }

    fn cast_near(&self, scope: ScopeKey, origin: Vec2, payload: Vec<u8>) {
        self.send(BroadcastRequest::Near { scope, origin, payload });
    }

    fn cast_global(&self, payload: Vec<u8>) {
        self.send(BroadcastRequest::Global { payload });
    }
}
