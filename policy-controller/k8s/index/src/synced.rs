use tokio::sync::watch;

/// Records whether an index has received its initial resource listing.
///
/// Watches deliver an initial `reset` once the list phase completes; until then, an index only
/// holds a partial view of the cluster.
#[derive(Debug)]
pub struct Synced {
    tx: watch::Sender<bool>,
}

/// Waits until every receiver reports that its index is synced.
///
/// Returns `false` if any index was dropped before it synced.
pub async fn wait_synced(receivers: impl IntoIterator<Item = watch::Receiver<bool>>) -> bool {
    for mut rx in receivers {
        if rx.wait_for(|synced| *synced).await.is_err() {
            return false;
        }
    }
    true
}

// === impl Synced ===

impl Default for Synced {
    fn default() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx }
    }
}

impl Synced {
    pub fn receiver(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }

    pub fn mark(&self) {
        self.tx.send_if_modified(|synced| !std::mem::replace(synced, true));
    }

    pub fn is_synced(&self) -> bool {
        *self.tx.borrow()
    }
}
