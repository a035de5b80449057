//! ============================================================================
//! Account Refresh - Periodic balance and notification snapshots
//! ============================================================================
//! Runs on its own tokio task and publishes through a watch channel. It takes
//! no locks shared with verification; a failed refresh is logged and skipped.
//! ============================================================================

use anyhow::Result;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::db::{Notification, WasteDb};

/// Default refresh period
pub const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 60;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AccountSnapshot {
    pub user_id: u64,
    pub balance: u64,
    pub unread: Vec<Notification>,
    pub refreshed_at: i64,
}

pub fn snapshot(db: &WasteDb, user_id: u64) -> Result<AccountSnapshot> {
    Ok(AccountSnapshot {
        user_id,
        balance: db.user_balance(user_id)?,
        unread: db.unread_notifications(user_id)?,
        refreshed_at: chrono::Utc::now().timestamp(),
    })
}

/// Spawn the refresh loop. It stops once every receiver is dropped.
pub fn spawn_account_refresh(
    db: Arc<WasteDb>,
    user_id: u64,
    every: Duration,
) -> (watch::Receiver<AccountSnapshot>, JoinHandle<()>) {
    let (tx, rx) = watch::channel(AccountSnapshot {
        user_id,
        ..Default::default()
    });

    let handle = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = tx.closed() => break,
            }
            match snapshot(&db, user_id) {
                Ok(snap) => {
                    debug!("Refreshed account {}: balance {}", user_id, snap.balance);
                    if tx.send(snap).is_err() {
                        break;
                    }
                }
                Err(e) => warn!("Account refresh for {} failed: {}", user_id, e),
            }
        }
        debug!("Account refresh for {} stopped", user_id);
    });

    (rx, handle)
}
