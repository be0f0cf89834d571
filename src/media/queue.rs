//! Unbounded media queue with join semantics
//!
//! The crawl pushes media-bearing items; workers pop them. Every pushed item counts as
//! unfinished until a worker calls [`MediaQueue::task_done`] for it, which lets the
//! crawl wait for the queue to run dry with [`MediaQueue::join`].
//!
//! Items a worker could not complete (download failed, or abandoned on cancellation) are
//! parked with [`MediaQueue::defer`]. [`MediaQueue::drain`] hands back everything not yet
//! confirmed done, deferred items first, for the resume ledger.

use crate::types::Item;
use std::collections::VecDeque;
use tokio::sync::{Mutex, Notify, watch};
use tokio_util::sync::CancellationToken;

/// Shared queue between one producer and any number of media workers
#[derive(Debug)]
pub struct MediaQueue {
    items: Mutex<VecDeque<Item>>,
    deferred: Mutex<Vec<Item>>,
    available: Notify,
    unfinished: watch::Sender<usize>,
}

impl Default for MediaQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl MediaQueue {
    /// Create an empty queue
    pub fn new() -> Self {
        let (unfinished, _) = watch::channel(0);
        Self {
            items: Mutex::new(VecDeque::new()),
            deferred: Mutex::new(Vec::new()),
            available: Notify::new(),
            unfinished,
        }
    }

    /// Append items at the back; never blocks on consumers
    pub async fn extend<I>(&self, items: I) -> usize
    where
        I: IntoIterator<Item = Item>,
    {
        let added = {
            let mut queue = self.items.lock().await;
            let before = queue.len();
            queue.extend(items);
            queue.len() - before
        };

        if added > 0 {
            self.unfinished.send_modify(|n| *n += added);
            self.available.notify_waiters();
        }
        added
    }

    /// Append one item
    pub async fn push(&self, item: Item) {
        self.extend(std::iter::once(item)).await;
    }

    /// Take the next item, waiting while the queue is empty
    ///
    /// Returns `None` once `cancel` fires; items still queued stay put for [`drain`].
    ///
    /// [`drain`]: MediaQueue::drain
    pub async fn pop(&self, cancel: &CancellationToken) -> Option<Item> {
        loop {
            let notified = self.available.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if cancel.is_cancelled() {
                return None;
            }
            if let Some(item) = self.items.lock().await.pop_front() {
                return Some(item);
            }

            tokio::select! {
                _ = cancel.cancelled() => return None,
                _ = &mut notified => {}
            }
        }
    }

    /// Mark one popped item as handled (downloaded, skipped or deferred)
    pub fn task_done(&self) {
        self.unfinished.send_modify(|n| *n = n.saturating_sub(1));
    }

    /// Park an item that was popped but not completed
    pub async fn defer(&self, item: Item) {
        self.deferred.lock().await.push(item);
    }

    /// Wait until every pushed item has been handled
    pub async fn join(&self) {
        let mut rx = self.unfinished.subscribe();
        // The sender lives in `self`, so the channel cannot close while we wait
        let _ = rx.wait_for(|n| *n == 0).await;
    }

    /// Number of items pushed but not yet handled
    pub fn unfinished(&self) -> usize {
        *self.unfinished.borrow()
    }

    /// Number of items waiting to be popped
    pub async fn len(&self) -> usize {
        self.items.lock().await.len()
    }

    /// Whether no item is waiting to be popped
    pub async fn is_empty(&self) -> bool {
        self.items.lock().await.is_empty()
    }

    /// Remove everything not confirmed done: deferred items, then queued items in order
    pub async fn drain(&self) -> Vec<Item> {
        let mut drained = std::mem::take(&mut *self.deferred.lock().await);
        let queued: Vec<Item> = self.items.lock().await.drain(..).collect();

        if !queued.is_empty() {
            let count = queued.len();
            self.unfinished.send_modify(|n| *n = n.saturating_sub(count));
        }
        drained.extend(queued);
        drained
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::harvester::test_helpers::media_item;
    use crate::types::ItemId;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn fifo_order() {
        let queue = MediaQueue::new();
        let cancel = CancellationToken::new();
        queue.extend([media_item(1), media_item(2), media_item(3)]).await;

        for expected in 1..=3 {
            assert_eq!(queue.pop(&cancel).await.unwrap().id, ItemId(expected));
        }
        assert!(queue.is_empty().await);
    }

    #[tokio::test]
    async fn pop_waits_for_producer() {
        let queue = Arc::new(MediaQueue::new());
        let cancel = CancellationToken::new();

        let consumer = {
            let queue = queue.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { queue.pop(&cancel).await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        queue.push(media_item(7)).await;

        let item = tokio::time::timeout(Duration::from_secs(5), consumer)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(item.unwrap().id, ItemId(7));
    }

    #[tokio::test]
    async fn pop_returns_none_on_cancel_and_keeps_items() {
        let queue = MediaQueue::new();
        let cancel = CancellationToken::new();
        cancel.cancel();

        queue.push(media_item(1)).await;
        assert!(queue.pop(&cancel).await.is_none());
        assert_eq!(queue.len().await, 1);
    }

    #[tokio::test]
    async fn join_waits_for_task_done() {
        let queue = Arc::new(MediaQueue::new());
        let cancel = CancellationToken::new();
        queue.extend([media_item(1), media_item(2)]).await;
        assert_eq!(queue.unfinished(), 2);

        let worker = {
            let queue = queue.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move {
                while let Some(_item) = queue.pop(&cancel).await {
                    queue.task_done();
                }
            })
        };

        tokio::time::timeout(Duration::from_secs(5), queue.join())
            .await
            .unwrap();
        assert_eq!(queue.unfinished(), 0);

        cancel.cancel();
        worker.await.unwrap();
    }

    #[tokio::test]
    async fn join_on_empty_queue_returns_immediately() {
        let queue = MediaQueue::new();
        tokio::time::timeout(Duration::from_millis(100), queue.join())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn drain_returns_deferred_then_queued() {
        let queue = MediaQueue::new();
        let cancel = CancellationToken::new();
        queue
            .extend([media_item(1), media_item(2), media_item(3)])
            .await;

        let first = queue.pop(&cancel).await.unwrap();
        queue.defer(first).await;
        queue.task_done();

        let drained: Vec<ItemId> = queue.drain().await.into_iter().map(|i| i.id).collect();
        assert_eq!(drained, vec![ItemId(1), ItemId(2), ItemId(3)]);
        assert_eq!(queue.unfinished(), 0);
        assert!(queue.drain().await.is_empty());
    }
}
