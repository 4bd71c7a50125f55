//! In-process document database.
//!
//! Models the contract of the hosted backend the client core is written
//! against: documents keyed by `(collection, id)`, get / set / targeted
//! field update, an atomic set-union array append, and a per-document
//! change subscription that delivers full-document snapshots.
//!
//! A single lock serializes all mutations, which gives each document the
//! last-writer-wins semantics of the real service and makes the array
//! append a true merge: two near-simultaneous senders' appends are both
//! retained, in lock-acquisition order.

use std::collections::HashMap;

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use tokio::sync::watch;
use tracing::debug;

use crate::error::{Result, StoreError};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct DocKey {
    collection: String,
    id: String,
}

impl DocKey {
    fn new(collection: &str, id: &str) -> Self {
        Self {
            collection: collection.to_string(),
            id: id.to_string(),
        }
    }
}

#[derive(Default)]
struct Inner {
    docs: HashMap<DocKey, Value>,
    watchers: HashMap<DocKey, watch::Sender<Option<Value>>>,
}

impl Inner {
    /// Publish the current state of a document to its subscribers, if any.
    fn notify(&self, key: &DocKey) {
        if let Some(tx) = self.watchers.get(key) {
            tx.send_replace(self.docs.get(key).cloned());
        }
    }
}

/// Handle to the document database.  Cheap to share behind an `Arc`.
#[derive(Default)]
pub struct DocStore {
    inner: Mutex<Inner>,
}

impl DocStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create or replace a whole document (last writer wins).
    pub fn set(&self, collection: &str, id: &str, value: Value) {
        let key = DocKey::new(collection, id);
        let mut inner = self.inner.lock();
        inner.docs.insert(key.clone(), value);
        inner.notify(&key);
        debug!(collection, id, "document set");
    }

    /// Fetch a full document snapshot.
    pub fn get(&self, collection: &str, id: &str) -> Option<Value> {
        let inner = self.inner.lock();
        inner.docs.get(&DocKey::new(collection, id)).cloned()
    }

    pub fn exists(&self, collection: &str, id: &str) -> bool {
        let inner = self.inner.lock();
        inner.docs.contains_key(&DocKey::new(collection, id))
    }

    /// Merge the given top-level fields into an existing document.
    pub fn update(&self, collection: &str, id: &str, fields: Map<String, Value>) -> Result<()> {
        let key = DocKey::new(collection, id);
        let mut inner = self.inner.lock();
        let doc = inner.docs.get_mut(&key).ok_or(StoreError::NotFound)?;
        match doc {
            Value::Object(map) => {
                for (k, v) in fields {
                    map.insert(k, v);
                }
            }
            other => *other = Value::Object(fields),
        }
        inner.notify(&key);
        debug!(collection, id, "document updated");
        Ok(())
    }

    /// Atomic set-union append: each item not already present (by value
    /// equality) is pushed onto the named array field.  The whole operation
    /// runs under the store lock, so there is no read-modify-write race on
    /// the array itself.
    pub fn array_union(
        &self,
        collection: &str,
        id: &str,
        field: &str,
        items: Vec<Value>,
    ) -> Result<()> {
        let key = DocKey::new(collection, id);
        let mut inner = self.inner.lock();
        let doc = inner.docs.get_mut(&key).ok_or(StoreError::NotFound)?;

        let map = doc
            .as_object_mut()
            .ok_or_else(|| StoreError::NotAnArray {
                field: field.to_string(),
            })?;
        let slot = map
            .entry(field.to_string())
            .or_insert_with(|| Value::Array(Vec::new()));
        let array = slot.as_array_mut().ok_or_else(|| StoreError::NotAnArray {
            field: field.to_string(),
        })?;

        for item in items {
            if !array.contains(&item) {
                array.push(item);
            }
        }

        inner.notify(&key);
        debug!(collection, id, field, "array union applied");
        Ok(())
    }

    /// Atomic per-document read-modify-write.  The closure sees and edits
    /// the live document under the store lock, so a concurrent writer can
    /// no longer clobber the change between read and write-back.
    pub fn mutate<F>(&self, collection: &str, id: &str, f: F) -> Result<()>
    where
        F: FnOnce(&mut Value),
    {
        let key = DocKey::new(collection, id);
        let mut inner = self.inner.lock();
        let doc = inner.docs.get_mut(&key).ok_or(StoreError::NotFound)?;
        f(doc);
        inner.notify(&key);
        Ok(())
    }

    /// Equality query: all documents in `collection` whose top-level
    /// `field` equals `value`.  Linear scan; collections here are small.
    pub fn find_eq(&self, collection: &str, field: &str, value: &Value) -> Vec<Value> {
        let inner = self.inner.lock();
        inner
            .docs
            .iter()
            .filter(|(key, _)| key.collection == collection)
            .filter(|(_, doc)| doc.get(field) == Some(value))
            .map(|(_, doc)| doc.clone())
            .collect()
    }

    /// Subscribe to a document.  The receiver is seeded with the current
    /// snapshot (or `None` if the document does not exist yet) and sees a
    /// full new snapshot after every mutation, conflated to the latest.
    pub fn watch(&self, collection: &str, id: &str) -> watch::Receiver<Option<Value>> {
        let key = DocKey::new(collection, id);
        let mut inner = self.inner.lock();
        let current = inner.docs.get(&key).cloned();
        inner
            .watchers
            .entry(key)
            .or_insert_with(|| watch::channel(current).0)
            .subscribe()
    }

    // -- typed helpers ------------------------------------------------------

    /// Fetch and deserialize a document.
    pub fn get_as<T: DeserializeOwned>(&self, collection: &str, id: &str) -> Result<Option<T>> {
        match self.get(collection, id) {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    /// Serialize and store a document.
    pub fn set_from<T: Serialize>(&self, collection: &str, id: &str, value: &T) -> Result<()> {
        self.set(collection, id, serde_json::to_value(value)?);
        Ok(())
    }
}
