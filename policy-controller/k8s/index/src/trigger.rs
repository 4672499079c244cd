use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::Notify;

/// A coalescing wake-up signal for a reconciliation worker.
///
/// Any number of triggers issued while the worker is busy collapse into a single pending pass.
#[derive(Clone, Debug, Default)]
pub struct Trigger(Arc<Notify>);

// === impl Trigger ===

impl Trigger {
    pub fn trigger(&self) {
        self.0.notify_one();
    }

    /// Completes once a trigger has been issued since the last time this returned.
    pub async fn triggered(&self) {
        self.0.notified().await;
    }

    pub fn shared(self) -> Arc<RwLock<Self>> {
        Arc::new(RwLock::new(self))
    }
}

/// Watching any cluster-scoped resource through a trigger pokes the worker on every event.
impl<R> kubert::index::IndexClusterResource<R> for Trigger {
    fn apply(&mut self, _: R) {
        self.trigger();
    }

    fn delete(&mut self, name: String) {
        tracing::debug!(%name, "Deleted");
        self.trigger();
    }

    fn reset(&mut self, _: Vec<R>, _: kubert::index::ClusterRemoved) {
        self.trigger();
    }
}
