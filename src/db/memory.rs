//! In-memory score store used by engine tests. Supports failure injection
//! per key and counts reads/writes so tests can assert on store traffic.

use async_trait::async_trait;
use chrono::Utc;
use futures_util::stream::{BoxStream, StreamExt};
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;

use super::models::{ScoreFingerprint, StoreEntry, StoredScore};
use super::{ScoreLookup, ScoreStore, StoreError};

pub struct MemoryScoreStore {
    inner: Mutex<Inner>,
    tx: broadcast::Sender<StoreEntry>,
    reads: AtomicUsize,
    writes: AtomicUsize,
}

#[derive(Default)]
struct Inner {
    values: BTreeMap<ScoreFingerprint, StoredScore>,
    history: Vec<StoreEntry>,
    next_revision: u64,
    failing_gets: HashSet<ScoreFingerprint>,
    failing_puts: HashSet<ScoreFingerprint>,
}

impl MemoryScoreStore {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(256);
        MemoryScoreStore {
            inner: Mutex::new(Inner::default()),
            tx,
            reads: AtomicUsize::new(0),
            writes: AtomicUsize::new(0),
        }
    }

    /// Seed a value without counting it as engine traffic.
    pub fn seed(&self, key: &ScoreFingerprint, value: &str) {
        let entry = self.commit(key, value);
        let _ = self.tx.send(entry);
    }

    pub fn fail_gets_for(&self, key: &ScoreFingerprint) {
        self.inner.lock().unwrap().failing_gets.insert(key.clone());
    }

    pub fn fail_puts_for(&self, key: &ScoreFingerprint) {
        self.inner.lock().unwrap().failing_puts.insert(key.clone());
    }

    pub fn value(&self, key: &ScoreFingerprint) -> Option<String> {
        self.inner
            .lock()
            .unwrap()
            .values
            .get(key)
            .map(|s| s.score.clone())
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn commit(&self, key: &ScoreFingerprint, value: &str) -> StoreEntry {
        let mut inner = self.inner.lock().unwrap();
        inner.next_revision += 1;
        let entry = StoreEntry {
            key: key.clone(),
            value: value.to_string(),
            revision: inner.next_revision,
            recorded_at: Utc::now(),
        };
        inner.values.insert(
            key.clone(),
            StoredScore {
                score: value.to_string(),
                revision: entry.revision,
            },
        );
        inner.history.push(entry.clone());
        entry
    }
}

#[async_trait]
impl ScoreStore for MemoryScoreStore {
    async fn get(&self, key: &ScoreFingerprint) -> ScoreLookup {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let inner = self.inner.lock().unwrap();
        if inner.failing_gets.contains(key) {
            return ScoreLookup::Failed(StoreError::Unavailable("injected read failure".into()));
        }
        match inner.values.get(key) {
            Some(stored) => ScoreLookup::Found(stored.clone()),
            None => ScoreLookup::Absent,
        }
    }

    async fn put(&self, key: &ScoreFingerprint, value: &str) -> Result<u64, StoreError> {
        if self.inner.lock().unwrap().failing_puts.contains(key) {
            return Err(StoreError::Unavailable("injected write failure".into()));
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        let entry = self.commit(key, value);
        let revision = entry.revision;
        let _ = self.tx.send(entry);
        Ok(revision)
    }

    async fn entries(&self) -> Result<Vec<StoreEntry>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .values
            .iter()
            .map(|(key, stored)| StoreEntry {
                key: key.clone(),
                value: stored.score.clone(),
                revision: stored.revision,
                recorded_at: Utc::now(),
            })
            .collect())
    }

    async fn history(&self, key: &ScoreFingerprint) -> Result<Vec<StoreEntry>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .history
            .iter()
            .rev()
            .filter(|e| &e.key == key)
            .cloned()
            .collect())
    }

    fn watch_all(&self) -> Result<BoxStream<'static, StoreEntry>, StoreError> {
        let rx = self.tx.subscribe();
        Ok(BroadcastStream::new(rx)
            .filter_map(|res| async move { res.ok() })
            .boxed())
    }
}
