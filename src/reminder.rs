use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::engine::Engine;
use crate::limits::REMINDER_SCAN_INTERVAL_SECS;

/// Background task that publishes a starting-soon reminder for each active
/// reservation entering the horizon. De-dup state lives here, so a
/// reservation is announced once even though the scan window overlaps
/// between ticks.
pub async fn run_reminder_scanner(engine: Arc<Engine>) {
    let mut interval = tokio::time::interval(Duration::from_secs(REMINDER_SCAN_INTERVAL_SECS));
    let mut notified = HashMap::new();
    loop {
        interval.tick().await;
        match engine.publish_starting_soon(&mut notified).await {
            Ok(0) => {}
            Ok(sent) => info!("published {sent} starting-soon reminders"),
            Err(e) => tracing::debug!("reminder sweep skipped: {e}"),
        }
    }
}
