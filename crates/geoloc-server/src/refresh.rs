//! Background database refresh.

use crate::server::GeoLookup;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

/// Run `update(false)` every `period`, starting one period from now.
///
/// Failures are logged and the task keeps going. Abort the returned handle
/// to stop it.
pub fn spawn_refresh_task(service: Arc<dyn GeoLookup>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            match service.update(false).await {
                Ok(status) if status.updated => {
                    tracing::info!("Scheduled refresh installed a new database: {}", status.reason);
                }
                Ok(status) => {
                    tracing::debug!("Scheduled refresh skipped: {}", status.reason);
                }
                Err(e) => {
                    tracing::warn!("Scheduled database refresh failed: {e}");
                }
            }
        }
    })
}
