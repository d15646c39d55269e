//! Shared work queue for one content session.

use tokio::sync::Mutex;

use crate::types::WorkItem;

/// Stack of pending work items behind one async mutex
///
/// Workers pop from the end and push failed items back. An empty queue means "no more
/// work for you", never "wait": items in flight are owned by exactly one worker, which
/// will either finish them or push them back before it looks for more.
#[derive(Debug, Default)]
pub(crate) struct WorkQueue {
    items: Mutex<Vec<WorkItem>>,
}

impl WorkQueue {
    pub(crate) fn new(items: Vec<WorkItem>) -> Self {
        Self {
            items: Mutex::new(items),
        }
    }

    /// Take the last item, if any
    pub(crate) async fn try_pop(&self) -> Option<WorkItem> {
        self.items.lock().await.pop()
    }

    /// Return an item for another attempt
    pub(crate) async fn push(&self, item: WorkItem) {
        self.items.lock().await.push(item);
    }

    #[cfg(test)]
    pub(crate) async fn len(&self) -> usize {
        self.items.lock().await.len()
    }
}
