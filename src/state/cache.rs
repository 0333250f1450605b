// state/cache.rs
// Cached copy of one backend collection with loading and error state.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::{collections::HashMap, future::Future};
use tokio::sync::RwLock;

use crate::error::{KosError, Result};
use crate::models::{Id, Keyed};

/// Point-in-time copy of a cached collection, shaped for display.
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot<T> {
    pub items: Vec<T>,
    pub is_loading: bool,
    pub error: Option<String>,
    pub synced_at: Option<DateTime<Utc>>,
}

struct Inner<T> {
    records: Vec<T>,
    index: HashMap<Id, usize>,
    is_loading: bool,
    error: Option<String>,
    synced_at: Option<DateTime<Utc>>,
}

impl<T: Keyed> Inner<T> {
    fn reindex(&mut self) {
        self.index = self
            .records
            .iter()
            .enumerate()
            .map(|(pos, record)| (record.id(), pos))
            .collect();
    }
}

/// Last-fetched copy of one backend collection, in backend order and keyed by id.
///
/// The copy is only ever replaced wholesale by a successful fetch; a failed
/// fetch keeps the previous records and records the error message instead.
pub struct Collection<T> {
    inner: RwLock<Inner<T>>,
}

impl<T: Keyed + Clone> Default for Collection<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Keyed + Clone> Collection<T> {
    pub fn new() -> Self {
        Collection {
            inner: RwLock::new(Inner {
                records: Vec::new(),
                index: HashMap::new(),
                is_loading: false,
                error: None,
                synced_at: None,
            }),
        }
    }

    /// Runs `fetch` and replaces the records with its result.
    pub async fn sync<F>(&self, label: &'static str, fetch: F) -> Result<()>
    where
        F: Future<Output = Result<Vec<T>>>,
    {
        self.begin().await;
        match fetch.await {
            Ok(records) => {
                let count = records.len();
                let mut inner = self.inner.write().await;
                inner.records = records;
                inner.reindex();
                inner.is_loading = false;
                inner.error = None;
                inner.synced_at = Some(Utc::now());
                tracing::debug!(collection = label, count, "collection refreshed");
                Ok(())
            }
            Err(err) => {
                tracing::warn!(collection = label, error = %err, "refresh failed; keeping cached copy");
                self.fail(&err).await;
                Err(err)
            }
        }
    }

    /// Runs a backend mutation, recording its failure. The caller refreshes on success.
    pub async fn mutate<R, F>(&self, label: &'static str, op: F) -> Result<R>
    where
        F: Future<Output = Result<R>>,
    {
        self.begin().await;
        match op.await {
            Ok(value) => Ok(value),
            Err(err) => {
                tracing::warn!(collection = label, error = %err, "mutation rejected");
                self.fail(&err).await;
                Err(err)
            }
        }
    }

    async fn begin(&self) {
        let mut inner = self.inner.write().await;
        inner.is_loading = true;
        inner.error = None;
    }

    /// Records a user-facing error message and clears the loading flag.
    pub async fn fail(&self, err: &KosError) {
        let mut inner = self.inner.write().await;
        inner.is_loading = false;
        inner.error = Some(err.to_string());
    }

    pub async fn get(&self, id: Id) -> Option<T> {
        let inner = self.inner.read().await;
        inner.index.get(&id).map(|&pos| inner.records[pos].clone())
    }

    /// Cached record for `id`. On a miss the collection is re-read once, so a
    /// copy that was never loaded (or predates the record) does not hide it.
    pub async fn lookup<F>(
        &self,
        label: &'static str,
        id: Id,
        fetch: impl FnOnce() -> F,
    ) -> Result<Option<T>>
    where
        F: Future<Output = Result<Vec<T>>>,
    {
        if let Some(record) = self.get(id).await {
            return Ok(Some(record));
        }
        self.sync(label, fetch()).await?;
        Ok(self.get(id).await)
    }

    pub async fn items(&self) -> Vec<T> {
        self.inner.read().await.records.clone()
    }

    pub async fn snapshot(&self) -> Snapshot<T> {
        let inner = self.inner.read().await;
        Snapshot {
            items: inner.records.clone(),
            is_loading: inner.is_loading,
            error: inner.error.clone(),
            synced_at: inner.synced_at,
        }
    }

    /// Evaluates `f` over the cached records without cloning them.
    pub async fn with_records<R>(&self, f: impl FnOnce(&[T]) -> R) -> R {
        let inner = self.inner.read().await;
        f(&inner.records)
    }

    /// Applies `f` to one cached record in place. Returns false when the id is not cached.
    pub async fn patch(&self, id: Id, f: impl FnOnce(&mut T)) -> bool {
        let mut inner = self.inner.write().await;
        match inner.index.get(&id).copied() {
            Some(pos) => {
                f(&mut inner.records[pos]);
                true
            }
            None => false,
        }
    }

    pub async fn patch_all(&self, mut f: impl FnMut(&mut T)) {
        let mut inner = self.inner.write().await;
        inner.records.iter_mut().for_each(&mut f);
    }

    /// Adds a record pushed out-of-band ahead of the fetched ones.
    /// Returns false when a record with the same id is already cached.
    pub async fn prepend(&self, record: T) -> bool {
        let mut inner = self.inner.write().await;
        if inner.index.contains_key(&record.id()) {
            return false;
        }
        inner.records.insert(0, record);
        inner.reindex();
        true
    }
}
