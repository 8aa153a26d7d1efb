//! Fire-and-forget notification sink.
//!
//! Called after a trading transaction commits. Persists a notification
//! record per recipient; failures are logged and swallowed - they must
//! never affect the trade that triggered them. Delivery to devices is
//! an external concern.

use tracing::{debug, warn};

use crate::db::DbPool;
use crate::models::notification::{EventKind, NewNotification, Notification};

pub struct Notifier {
    db: DbPool,
}

impl Notifier {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }

    /// Emit one notification. Never blocks the caller and never fails.
    pub fn notify(
        &self,
        user_id: &str,
        event_kind: EventKind,
        title: &str,
        message: &str,
        payload: Option<serde_json::Value>,
    ) {
        let record = NewNotification::new(
            user_id,
            event_kind,
            title,
            message,
            payload.map(|p| p.to_string()),
        );
        let db = self.db.clone();

        tokio::spawn(async move {
            let result = tokio::task::spawn_blocking(move || {
                let mut conn = db.get()?;
                Notification::create(&mut conn, record)?;
                Ok::<_, anyhow::Error>(())
            })
            .await;

            match result {
                Ok(Ok(())) => debug!(event = ?event_kind, "notification recorded"),
                Ok(Err(e)) => warn!("failed to record notification: {e:#}"),
                Err(e) => warn!("notification task panicked: {e}"),
            }
        });
    }

    /// Notify both parties of an order with the same event.
    pub fn notify_parties(
        &self,
        buyer_id: &str,
        seller_id: &str,
        event_kind: EventKind,
        title: &str,
        message: &str,
        payload: Option<serde_json::Value>,
    ) {
        self.notify(buyer_id, event_kind, title, message, payload.clone());
        self.notify(seller_id, event_kind, title, message, payload);
    }
}
