// Analytics events go out on the Redis bus. Tracking must never fail a
// user-facing flow, so publish errors are logged and dropped.

use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tracing::warn;

use crate::state::current_timestamp;

pub const ANALYTICS_CHANNEL: &str = "wallet_events";
// Non-transaction inpage requests are relayed here for the flows that own
// them.
pub const INPAGE_CHANNEL: &str = "inpage_events";

pub const EVENT_VIEW_TRANSACTION_SIGNING: &str = "view_transaction_signing";
pub const EVENT_SUBMIT_FEE_FOR_TRANSACTION: &str = "submit_fee_for_transaction";

#[derive(Clone)]
pub struct AnalyticsBus {
    redis: ConnectionManager,
}

impl AnalyticsBus {
    pub fn new(redis: ConnectionManager) -> Self {
        Self { redis }
    }

    pub async fn publish(&self, channel: &str, payload: serde_json::Value) {
        let mut redis_conn = self.redis.clone();
        let result: Result<(), _> = redis_conn.publish(channel, payload.to_string()).await;
        if let Err(e) = result {
            warn!("[ANALYTICS] Failed to publish to {}: {}", channel, e);
        }
    }

    pub async fn track(&self, event: &str, properties: serde_json::Value) {
        let payload = serde_json::json!({
            "event": event,
            "properties": properties,
            "timestamp": current_timestamp(),
        });
        self.publish(ANALYTICS_CHANNEL, payload).await;
    }
}
