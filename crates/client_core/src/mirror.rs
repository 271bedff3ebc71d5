//! Entity mirror: an in-memory, keyed copy of a server-held collection.
//!
//! Messages are folded into the current [`Snapshot`] by a [`ReconcilePolicy`] that is fixed
//! per collection when the mirror is created. The two policies are not interchangeable:
//!
//! - [`UpsertByKey`]: every message is one entity carrying its own key. An existing entry is
//!   overwritten whole, a new key is appended. Keys are never removed.
//! - [`FullReplace`]: every message is the complete key→entity mapping. The previous
//!   snapshot is discarded. A `null` payload is an empty collection.
//!
//! Feeding full snapshots through `UpsertByKey` would keep entries the backend has already
//! dropped, so each collection names its policy where it subscribes (see [`crate::live`]).
//!
//! Snapshots are shared as `Arc`s and updated copy-on-write, so a view holding the previous
//! snapshot never observes a half-applied message.

use std::{
    collections::{BTreeMap, HashMap},
    fmt,
    hash::Hash,
    marker::PhantomData,
    sync::Arc,
};

use serde::de::DeserializeOwned;
use shared::{
    domain::{Guid, PeerId},
    protocol::{Concept, PeerInfo},
};

use crate::{error::DecodeError, transport::RawMessage};

/// Keyed entity set that iterates in first-seen key order.
#[derive(Clone)]
pub struct Snapshot<K, V> {
    entries: Vec<(K, V)>,
    index: HashMap<K, usize>,
}

impl<K, V> Snapshot<K, V>
where
    K: Clone + Eq + Hash,
{
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.index.get(key).map(|&slot| &self.entries[slot].1)
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.index.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.entries.iter().map(|(k, v)| (k, v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.entries.iter().map(|(k, _)| k)
    }

    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.entries.iter().map(|(_, v)| v)
    }

    /// Overwrites the value in place if `key` is present, otherwise appends.
    /// Returns `true` when the key was new.
    pub fn upsert(&mut self, key: K, value: V) -> bool {
        match self.index.get(&key) {
            Some(&slot) => {
                self.entries[slot].1 = value;
                false
            }
            None => {
                self.index.insert(key.clone(), self.entries.len());
                self.entries.push((key, value));
                true
            }
        }
    }
}

impl<K, V> Default for Snapshot<K, V>
where
    K: Clone + Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> FromIterator<(K, V)> for Snapshot<K, V>
where
    K: Clone + Eq + Hash,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut snapshot = Self::new();
        for (key, value) in iter {
            snapshot.upsert(key, value);
        }
        snapshot
    }
}

impl<K: PartialEq, V: PartialEq> PartialEq for Snapshot<K, V> {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

impl<K: Eq, V: Eq> Eq for Snapshot<K, V> {}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for Snapshot<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.entries.iter().map(|(k, v)| (k, v)))
            .finish()
    }
}

/// How one decoded message changes a collection.
pub trait ReconcilePolicy: Send + Sync + 'static {
    type Key: Clone + Eq + Hash + Send + Sync + 'static;
    type Entity: Clone + Send + Sync + 'static;
    type Message: DeserializeOwned;

    fn reconcile(snapshot: &mut Snapshot<Self::Key, Self::Entity>, message: Self::Message);
}

/// An entity that carries its own collection key.
pub trait Keyed {
    type Key;

    fn key(&self) -> Self::Key;
}

impl Keyed for Concept {
    type Key = Guid;

    fn key(&self) -> Guid {
        self.guid.clone()
    }
}

pub struct UpsertByKey<T>(PhantomData<fn() -> T>);

impl<T> ReconcilePolicy for UpsertByKey<T>
where
    T: Keyed + DeserializeOwned + Clone + Send + Sync + 'static,
    T::Key: Clone + Eq + Hash + Send + Sync + 'static,
{
    type Key = T::Key;
    type Entity = T;
    type Message = T;

    fn reconcile(snapshot: &mut Snapshot<T::Key, T>, entity: T) {
        snapshot.upsert(entity.key(), entity);
    }
}

pub struct FullReplace<K, V>(PhantomData<fn() -> (K, V)>);

impl<K, V> ReconcilePolicy for FullReplace<K, V>
where
    K: Ord + Clone + Eq + Hash + DeserializeOwned + Send + Sync + 'static,
    V: Clone + DeserializeOwned + Send + Sync + 'static,
{
    type Key = K;
    type Entity = V;
    type Message = Option<BTreeMap<K, V>>;

    fn reconcile(snapshot: &mut Snapshot<K, V>, message: Self::Message) {
        *snapshot = message.unwrap_or_default().into_iter().collect();
    }
}

/// Assumes one concept per message; see [`crate::live::concepts`] for the backend contract.
pub type ConceptPolicy = UpsertByKey<Concept>;
/// The peer table is rebroadcast whole on every change.
pub type PeerPolicy = FullReplace<PeerId, PeerInfo>;

pub type ConceptSnapshot = Snapshot<Guid, Concept>;
pub type PeerSnapshot = Snapshot<PeerId, PeerInfo>;

pub struct EntityMirror<P: ReconcilePolicy> {
    collection: &'static str,
    snapshot: Arc<Snapshot<P::Key, P::Entity>>,
    generation: u64,
}

impl<P: ReconcilePolicy> EntityMirror<P> {
    pub fn new(collection: &'static str) -> Self {
        Self {
            collection,
            snapshot: Arc::new(Snapshot::new()),
            generation: 0,
        }
    }

    pub fn current(&self) -> Arc<Snapshot<P::Key, P::Entity>> {
        Arc::clone(&self.snapshot)
    }

    /// Number of successful applies so far.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn decode(&self, raw: &RawMessage) -> Result<P::Message, DecodeError> {
        serde_json::from_slice(raw.as_bytes()).map_err(|source| DecodeError {
            collection: self.collection,
            source,
        })
    }

    /// Decodes and folds one message. On a decode failure the snapshot and generation
    /// are left exactly as they were.
    pub fn apply(
        &mut self,
        raw: &RawMessage,
    ) -> Result<Arc<Snapshot<P::Key, P::Entity>>, DecodeError> {
        let message = self.decode(raw)?;
        Ok(self.apply_message(message))
    }

    pub fn apply_message(&mut self, message: P::Message) -> Arc<Snapshot<P::Key, P::Entity>> {
        P::reconcile(Arc::make_mut(&mut self.snapshot), message);
        self.generation += 1;
        self.current()
    }
}

#[cfg(test)]
#[path = "tests/mirror_tests.rs"]
mod tests;
