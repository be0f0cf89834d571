//! Cancellation and shutdown.

use super::Harvester;
use crate::types::Event;
use tokio_util::sync::CancellationToken;

impl Harvester {
    /// Ask every running feed to stop
    ///
    /// Crawls stop before their next fetch, workers abandon in-flight downloads and the
    /// feed's unfinished media is written to the resume ledger before the running
    /// operation returns. No new feed is started afterwards.
    pub fn cancel(&self) {
        if !self.cancel.is_cancelled() {
            tracing::info!("Cancellation requested");
        }
        self.cancel.cancel();
    }

    /// Whether [`Harvester::cancel`] was called
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Token that fires on cancellation, for wiring into an embedding application
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Cancel, emit [`Event::Shutdown`] and close the database pool
    ///
    /// Call after the running operation has returned: its resume ledger needs the
    /// database.
    pub async fn shutdown(&self) {
        self.cancel();
        self.emit_event(Event::Shutdown);
        self.db.pool().close().await;
        tracing::info!("Shutdown complete");
    }
}
