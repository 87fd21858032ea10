//! Outbound events for external collaborators (notification, analytics).

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

use crate::Amount;
use crate::model::{EntryId, ScopeId, UserId};

/// Events emitted by the engine. Delivery is fire-and-forget: the engine
/// never blocks or fails on event emission.
#[derive(Debug, Clone)]
pub enum EngineEvent {
    PurchaseCompleted {
        purchase_id: Uuid,
        buyer: UserId,
        seller: UserId,
        scope: ScopeId,
        total_price: Amount,
        fee: Amount,
        completed_at: DateTime<Utc>,
    },
    RewardDistributed {
        calculation_id: Uuid,
        user: UserId,
        scope: ScopeId,
        amount: Amount,
        entry: EntryId,
        distributed_at: DateTime<Utc>,
    },
}

/// Cloneable fan-out bus over a tokio broadcast channel.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<EngineEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.sender.subscribe()
    }

    /// Emit an event. Having no subscribers is not an error.
    pub fn emit(&self, event: EngineEvent) {
        if self.sender.send(event).is_err() {
            debug!("event emitted with no subscribers");
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(64)
    }
}
