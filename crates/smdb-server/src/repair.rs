use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use smdb_db::Database;

/// Background task that persists aggregates left stale by a failed recompute.
///
/// Readers already see repaired values through read-repair, so persisting
/// them changes no view and needs no invalidation.
pub async fn run_repair_loop(db: Arc<Database>, interval_secs: u64) {
    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));

    loop {
        interval.tick().await;

        match repair_once(db.clone()).await {
            Ok(count) => {
                if count > 0 {
                    info!("Repair: persisted {} stale aggregates", count);
                }
            }
            Err(e) => {
                warn!("Repair error: {}", e);
            }
        }
    }
}

async fn repair_once(db: Arc<Database>) -> anyhow::Result<usize> {
    tokio::task::spawn_blocking(move || db.repair_stale_aggregates())
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            anyhow::anyhow!("repair task failed: {}", e)
        })?
}
