use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::engine::Engine;

const CHECK_INTERVAL: Duration = Duration::from_secs(30);

/// Background task that compacts the WAL once enough appends pile up.
pub async fn run_compactor(engine: Arc<Engine>) {
    let mut interval = tokio::time::interval(CHECK_INTERVAL);
    loop {
        interval.tick().await;
        match engine.maybe_compact().await {
            Ok(true) => debug!("compactor rewrote WAL"),
            Ok(false) => {}
            Err(e) => warn!("compaction failed: {e}"),
        }
    }
}
