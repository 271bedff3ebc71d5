//! Live collections: one subscription folded into one mirror on a spawned task.
//!
//! The owning view holds a [`LiveCollection`] for as long as it is mounted. Dropping the
//! handle aborts the task and closes the socket, on every exit path, so nothing is
//! published for that collection afterwards.
//!
//! `JoinHandle::abort` only takes effect at the task's next yield point, and a task that
//! is mid-poll on another worker can still reach a publish. Every publish therefore
//! happens under a shared release lock that `Drop` sets before aborting, which makes the
//! guarantee hold once `drop` returns rather than at some later poll.

use std::{
    fmt,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use futures::StreamExt;
use tokio::{
    sync::{broadcast, watch},
    task::JoinHandle,
};
use tokio_stream::wrappers::WatchStream;
use tracing::{debug, info, warn};

use crate::{
    config::ClientConfig,
    mirror::{ConceptPolicy, EntityMirror, PeerPolicy, ReconcilePolicy, Snapshot},
    transport,
};

pub const CONCEPTS: &str = "concepts";
pub const PEERS: &str = "peers";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndReason {
    RemoteClosed,
    TransportFailed(String),
}

impl fmt::Display for EndReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RemoteClosed => f.write_str("remote closed the channel"),
            Self::TransportFailed(err) => write!(f, "transport failed: {err}"),
        }
    }
}

/// Diagnostics emitted while a collection is live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    Applied {
        collection: &'static str,
        generation: u64,
        len: usize,
    },
    DecodeFailed {
        collection: &'static str,
        error: String,
    },
    Ended {
        collection: &'static str,
        reason: EndReason,
    },
}

pub struct LiveCollection<P: ReconcilePolicy> {
    collection: &'static str,
    snapshots: watch::Receiver<Arc<Snapshot<P::Key, P::Entity>>>,
    released: Arc<Mutex<bool>>,
    task: JoinHandle<()>,
}

/// Upserts by `Guid` and keeps first-seen order, assuming the backend sends one concept
/// per message.
///
/// Unverified contract: the Go backend's `/ws` handler instead writes its whole concept
/// map on connect and every 5 s. Those messages fail to decode here and are reported as
/// `DecodeFailed`, leaving the snapshot empty. Confirm which shape the deployed backend
/// sends before relying on this; for full maps use `FullReplace<Guid, Concept>`.
pub fn concepts(
    config: &ClientConfig,
    events: broadcast::Sender<SyncEvent>,
) -> LiveCollection<ConceptPolicy> {
    LiveCollection::spawn(CONCEPTS, config.concept_channel_url(), events)
}

/// The backend recomputes the peer table wholesale, so every message replaces the set.
pub fn peers(
    config: &ClientConfig,
    events: broadcast::Sender<SyncEvent>,
) -> LiveCollection<PeerPolicy> {
    LiveCollection::spawn(PEERS, config.peer_channel_url(), events)
}

impl<P: ReconcilePolicy> LiveCollection<P> {
    /// Must be called from within a tokio runtime.
    pub fn spawn(
        collection: &'static str,
        url: String,
        events: broadcast::Sender<SyncEvent>,
    ) -> Self {
        let (tx, snapshots) = watch::channel(Arc::new(Snapshot::new()));
        let released = Arc::new(Mutex::new(false));
        let task = tokio::spawn(pump::<P>(
            collection,
            url,
            tx,
            events,
            Arc::clone(&released),
        ));
        Self {
            collection,
            snapshots,
            released,
            task,
        }
    }

    /// Latest reconciled snapshot. Cheap; safe to call every frame.
    pub fn current(&self) -> Arc<Snapshot<P::Key, P::Entity>> {
        Arc::clone(&self.snapshots.borrow())
    }

    /// Waits for the next published snapshot. Returns `false` once the collection has
    /// stopped updating.
    pub async fn changed(&mut self) -> bool {
        self.snapshots.changed().await.is_ok()
    }

    /// Every snapshot published from now on, ending when the collection stops updating.
    pub fn updates(&self) -> WatchStream<Arc<Snapshot<P::Key, P::Entity>>> {
        WatchStream::from_changes(self.snapshots.clone())
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl<P: ReconcilePolicy> Drop for LiveCollection<P> {
    fn drop(&mut self) {
        // Waits out a publish already in progress; none can start after this.
        *lock(&self.released) = true;
        self.task.abort();
        debug!(collection = self.collection, "live: collection released");
    }
}

fn lock(released: &Mutex<bool>) -> MutexGuard<'_, bool> {
    released.lock().unwrap_or_else(PoisonError::into_inner)
}

async fn pump<P: ReconcilePolicy>(
    collection: &'static str,
    url: String,
    snapshots: watch::Sender<Arc<Snapshot<P::Key, P::Entity>>>,
    events: broadcast::Sender<SyncEvent>,
    released: Arc<Mutex<bool>>,
) {
    let mut subscription = transport::connect(url).await;
    let mut mirror = EntityMirror::<P>::new(collection);
    let mut reason = EndReason::RemoteClosed;

    while let Some(item) = subscription.next().await {
        let raw = match item {
            Ok(raw) => raw,
            Err(err) => {
                reason = EndReason::TransportFailed(err.to_string());
                continue;
            }
        };

        let applied = mirror.apply(&raw);
        // Held until the end of this message; never across an await.
        let gate = lock(&released);
        if *gate {
            debug!(collection, "live: released mid-message; stopping");
            subscription.close();
            return;
        }
        match applied {
            Ok(snapshot) => {
                let len = snapshot.len();
                if snapshots.send(snapshot).is_err() {
                    debug!(collection, "live: no observers left; stopping");
                    subscription.close();
                    return;
                }
                let _ = events.send(SyncEvent::Applied {
                    collection,
                    generation: mirror.generation(),
                    len,
                });
            }
            Err(err) => {
                warn!(collection, bytes = raw.len(), "live: dropped undecodable message: {err}");
                let _ = events.send(SyncEvent::DecodeFailed {
                    collection,
                    error: err.to_string(),
                });
            }
        }
    }

    info!(collection, "live: collection stopped updating: {reason}");
    let gate = lock(&released);
    if !*gate {
        let _ = events.send(SyncEvent::Ended { collection, reason });
    }
}

#[cfg(test)]
#[path = "tests/live_tests.rs"]
mod tests;
