//! Feed membership snapshots.

use super::Harvester;
use crate::error::{Error, Result};
use crate::retry::with_retry;
use crate::transport::Transport;
use crate::types::RemoteFeed;

impl Harvester {
    /// Fetch a feed's members and store them in one transaction
    ///
    /// Returns the number of newly linked members. Known members get their profile
    /// refreshed.
    pub async fn harvest_participants(&self, feed: &RemoteFeed) -> Result<u64> {
        if self.cancel.is_cancelled() {
            return Err(Error::ShuttingDown);
        }

        let transport: &dyn Transport = self.transport.as_ref();
        let feed_id = feed.id;
        let participants = with_retry(&self.config.retry, &self.cancel, move || {
            transport.fetch_participants(feed_id)
        })
        .await?;

        let mut tx = self.db.begin().await?;
        let written = async {
            tx.upsert_feed(feed.id, &feed.name, None).await?;
            tx.upsert_participants(feed.id, &participants).await
        }
        .await;

        let linked = match written {
            Ok(linked) => {
                tx.commit().await?;
                linked
            }
            Err(e) => {
                tx.rollback().await.ok();
                return Err(e);
            }
        };

        tracing::info!(
            feed_id = %feed.id,
            total = participants.len(),
            linked,
            "Participants stored"
        );
        Ok(linked)
    }
}
