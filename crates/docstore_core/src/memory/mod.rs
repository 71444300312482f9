//! In-process backend with server-like semantics and fault injection.
//!
//! `MemoryBackend` keeps one collection in memory, evaluates the common
//! query and update operators, and lets tests script failures: a failing
//! next call, added latency, a cursor that breaks after N documents, or an
//! unreachable server. Every backend call is counted so tests can assert
//! that rejected payloads never reach the server.

mod filter;
mod update;

use crate::backend::{DeleteOutcome, DocumentCursor, StoreBackend, UpdateOutcome};
use crate::error::{BackendError, BackendResult};
use bson::oid::ObjectId;
use bson::{Bson, Document as BsonDocument};
use futures::StreamExt;
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Default)]
struct Faults {
    next_error: Option<BackendError>,
    latency: Duration,
    cursor_failure: Option<(usize, BackendError)>,
    unreachable: bool,
}

struct Inner {
    documents: RwLock<Vec<BsonDocument>>,
    connected: AtomicBool,
    calls: AtomicU64,
    faults: Mutex<Faults>,
}

/// In-memory collection implementing [`StoreBackend`].
///
/// Clones share state, so a test can keep a handle for inspection and fault
/// injection after moving another into a store.
#[derive(Clone)]
pub struct MemoryBackend {
    inner: Arc<Inner>,
}

impl MemoryBackend {
    /// Creates an empty, connected backend.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                documents: RwLock::new(Vec::new()),
                connected: AtomicBool::new(true),
                calls: AtomicU64::new(0),
                faults: Mutex::new(Faults::default()),
            }),
        }
    }

    /// Creates a backend pre-loaded with documents.
    ///
    /// Documents without `_id` get a generated one. Seeding does not count
    /// as a call.
    pub fn with_documents(documents: impl IntoIterator<Item = BsonDocument>) -> Self {
        let backend = Self::new();
        {
            let mut stored = backend.inner.documents.write();
            for document in documents {
                stored.push(with_id(document).0);
            }
        }
        backend
    }

    /// Number of backend calls made so far, including pings.
    pub fn calls(&self) -> u64 {
        self.inner.calls.load(Ordering::SeqCst)
    }

    /// Number of stored documents.
    pub fn len(&self) -> usize {
        self.inner.documents.read().len()
    }

    /// Returns true if no documents are stored.
    pub fn is_empty(&self) -> bool {
        self.inner.documents.read().is_empty()
    }

    /// Snapshot of the stored documents in insertion order.
    pub fn documents(&self) -> Vec<BsonDocument> {
        self.inner.documents.read().clone()
    }

    /// Makes the next call fail with `error`.
    pub fn fail_next(&self, error: BackendError) {
        self.inner.faults.lock().next_error = Some(error);
    }

    /// Delays every subsequent call by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        self.inner.faults.lock().latency = latency;
    }

    /// Makes the next cursor yield `after` documents and then `error`.
    pub fn fail_cursor_after(&self, after: usize, error: BackendError) {
        self.inner.faults.lock().cursor_failure = Some((after, error));
    }

    /// Simulates the server going away (or coming back).
    ///
    /// While unreachable, `ping` and `connect` fail with
    /// [`BackendError::NotConnected`].
    pub fn set_reachable(&self, reachable: bool) {
        self.inner.faults.lock().unreachable = !reachable;
    }

    /// Clears every injected fault.
    pub fn clear_faults(&self) {
        *self.inner.faults.lock() = Faults::default();
    }

    /// Common prologue of every call: count, delay, then check state.
    async fn enter(&self, needs_connection: bool) -> BackendResult<()> {
        self.inner.calls.fetch_add(1, Ordering::SeqCst);

        let latency = self.inner.faults.lock().latency;
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        let mut faults = self.inner.faults.lock();
        if faults.unreachable || (needs_connection && !self.is_connected()) {
            return Err(BackendError::NotConnected);
        }
        match faults.next_error.take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn update(
        &self,
        filter: &BsonDocument,
        update: &BsonDocument,
        limit: Option<usize>,
    ) -> BackendResult<UpdateOutcome> {
        let mut documents = self.inner.documents.write();
        let positions = select(&documents, filter, limit)?;

        // Apply to copies so a rejected update leaves the collection intact.
        let mut staged = Vec::with_capacity(positions.len());
        for &position in &positions {
            let mut copy = documents[position].clone();
            let changed = update::apply(&mut copy, update)?;
            staged.push((position, copy, changed));
        }

        let mut outcome = UpdateOutcome {
            matched_count: positions.len() as u64,
            ..UpdateOutcome::default()
        };
        for (position, copy, changed) in staged {
            if changed {
                documents[position] = copy;
                outcome.modified_count += 1;
            }
        }
        Ok(outcome)
    }

    fn delete(&self, filter: &BsonDocument, limit: Option<usize>) -> BackendResult<DeleteOutcome> {
        let mut documents = self.inner.documents.write();
        let positions = select(&documents, filter, limit)?;
        for &position in positions.iter().rev() {
            documents.remove(position);
        }
        Ok(DeleteOutcome {
            deleted_count: positions.len() as u64,
        })
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemoryBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryBackend")
            .field("documents", &self.len())
            .field("connected", &self.is_connected())
            .field("calls", &self.calls())
            .finish()
    }
}

/// Positions of the documents matching `filter`, in insertion order.
fn select(
    documents: &[BsonDocument],
    filter: &BsonDocument,
    limit: Option<usize>,
) -> BackendResult<Vec<usize>> {
    let mut positions = Vec::new();
    for (position, document) in documents.iter().enumerate() {
        if limit.is_some_and(|l| positions.len() >= l) {
            break;
        }
        if filter::matches(document, filter)? {
            positions.push(position);
        }
    }
    Ok(positions)
}

/// Ensures `_id` is present and first; returns the document and its id.
fn with_id(document: BsonDocument) -> (BsonDocument, Bson) {
    if let Some(id) = document.get("_id").cloned() {
        return (document, id);
    }
    let id = Bson::ObjectId(ObjectId::new());
    let mut stored = BsonDocument::new();
    stored.insert("_id", id.clone());
    for (key, value) in document {
        stored.insert(key, value);
    }
    (stored, id)
}

impl StoreBackend for MemoryBackend {
    async fn ping(&self) -> BackendResult<()> {
        self.enter(false).await?;
        if !self.is_connected() {
            return Err(BackendError::NotConnected);
        }
        Ok(())
    }

    async fn connect(&self) -> BackendResult<()> {
        self.enter(false).await?;
        self.inner.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn disconnect(&self) -> BackendResult<()> {
        self.inner.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.connected.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.inner.connected.load(Ordering::SeqCst)
    }

    async fn insert_one(&self, document: BsonDocument) -> BackendResult<Bson> {
        self.enter(true).await?;
        let (document, id) = with_id(document);

        let mut documents = self.inner.documents.write();
        let duplicate = documents
            .iter()
            .any(|existing| existing.get("_id").is_some_and(|e| filter::values_equal(e, &id)));
        if duplicate {
            return Err(BackendError::rejected(format!(
                "E11000 duplicate key error dup key: {{ _id: {id} }}"
            )));
        }
        documents.push(document);
        Ok(id)
    }

    async fn find_one(&self, filter: BsonDocument) -> BackendResult<Option<BsonDocument>> {
        self.enter(true).await?;
        let documents = self.inner.documents.read();
        let positions = select(&documents, &filter, Some(1))?;
        Ok(positions.first().map(|&p| documents[p].clone()))
    }

    async fn find(&self, filter: BsonDocument) -> BackendResult<DocumentCursor> {
        self.enter(true).await?;
        let snapshot: Vec<BsonDocument> = {
            let documents = self.inner.documents.read();
            let positions = select(&documents, &filter, None)?;
            positions.iter().map(|&p| documents[p].clone()).collect()
        };

        let failure = self.inner.faults.lock().cursor_failure.take();
        let mut items: Vec<BackendResult<BsonDocument>> = match failure {
            Some((after, _)) => snapshot.into_iter().take(after).map(Ok).collect(),
            None => snapshot.into_iter().map(Ok).collect(),
        };
        if let Some((_, error)) = failure {
            items.push(Err(error));
        }
        Ok(futures::stream::iter(items).boxed())
    }

    async fn delete_one(&self, filter: BsonDocument) -> BackendResult<DeleteOutcome> {
        self.enter(true).await?;
        self.delete(&filter, Some(1))
    }

    async fn delete_many(&self, filter: BsonDocument) -> BackendResult<DeleteOutcome> {
        self.enter(true).await?;
        self.delete(&filter, None)
    }

    async fn update_one(
        &self,
        filter: BsonDocument,
        update: BsonDocument,
    ) -> BackendResult<UpdateOutcome> {
        self.enter(true).await?;
        self.update(&filter, &update, Some(1))
    }

    async fn update_many(
        &self,
        filter: BsonDocument,
        update: BsonDocument,
    ) -> BackendResult<UpdateOutcome> {
        self.enter(true).await?;
        self.update(&filter, &update, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;
    use futures::TryStreamExt;

    fn people() -> MemoryBackend {
        MemoryBackend::with_documents([
            doc! { "Name": "john", "Gender": "male", "Age": 32_i32 },
            doc! { "Name": "mary", "Gender": "female", "Age": 44_i32 },
            doc! { "Name": "ana", "Gender": "female", "Age": 27_i32 },
        ])
    }

    #[tokio::test]
    async fn insert_generates_leading_object_id() {
        let backend = MemoryBackend::new();
        let id = backend.insert_one(doc! { "Name": "john" }).await.unwrap();
        assert!(matches!(id, Bson::ObjectId(_)));

        let stored = backend.documents();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].keys().next().map(String::as_str), Some("_id"));
        assert_eq!(stored[0].get("_id"), Some(&id));
    }

    #[tokio::test]
    async fn insert_keeps_caller_id_and_rejects_duplicates() {
        let backend = MemoryBackend::new();
        let oid = ObjectId::new();
        let id = backend.insert_one(doc! { "_id": oid, "Name": "john" }).await.unwrap();
        assert_eq!(id, Bson::ObjectId(oid));

        let err = backend
            .insert_one(doc! { "_id": oid, "Name": "jack" })
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::Rejected(ref m) if m.contains("E11000")));
        assert_eq!(backend.len(), 1);
    }

    #[tokio::test]
    async fn find_one_returns_first_match_in_insertion_order() {
        let backend = people();
        let found = backend
            .find_one(doc! { "Gender": "female" })
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.get_str("Name").unwrap(), "mary");
        assert!(backend.find_one(doc! { "Name": "zed" }).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn find_streams_all_matches() {
        let backend = people();
        let cursor = backend.find(doc! { "Age": { "$gt": 30_i32 } }).await.unwrap();
        let names: Vec<String> = cursor
            .map_ok(|d| d.get_str("Name").unwrap().to_string())
            .try_collect()
            .await
            .unwrap();
        assert_eq!(names, vec!["john", "mary"]);
    }

    #[tokio::test]
    async fn cursor_failure_after_n() {
        let backend = people();
        backend.fail_cursor_after(1, BackendError::rejected("cursor killed"));

        let items: Vec<_> = backend.find(doc! {}).await.unwrap().collect().await;
        assert_eq!(items.len(), 2);
        assert!(items[0].is_ok());
        assert!(items[1].is_err());

        // One-shot.
        let items: Vec<_> = backend.find(doc! {}).await.unwrap().collect().await;
        assert!(items.iter().all(Result::is_ok));
        assert_eq!(items.len(), 3);
    }

    #[tokio::test]
    async fn deletes_respect_limits() {
        let backend = people();
        let one = backend.delete_one(doc! { "Gender": "female" }).await.unwrap();
        assert_eq!(one.deleted_count, 1);
        assert_eq!(backend.len(), 2);

        let none = backend.delete_one(doc! { "Name": "zed" }).await.unwrap();
        assert_eq!(none.deleted_count, 0);

        let all = backend.delete_many(doc! {}).await.unwrap();
        assert_eq!(all.deleted_count, 2);
        assert!(backend.is_empty());
    }

    #[tokio::test]
    async fn updates_report_matched_and_modified() {
        let backend = people();
        let outcome = backend
            .update_many(doc! { "Gender": "female" }, doc! { "$set": { "Age": 27_i32 } })
            .await
            .unwrap();
        assert_eq!(outcome.matched_count, 2);
        // ana already is 27.
        assert_eq!(outcome.modified_count, 1);
        assert!(outcome.upserted_id.is_none());

        let outcome = backend
            .update_one(doc! { "Name": "john" }, doc! { "$inc": { "Age": 1_i32 } })
            .await
            .unwrap();
        assert_eq!((outcome.matched_count, outcome.modified_count), (1, 1));
        let john = backend.find_one(doc! { "Name": "john" }).await.unwrap().unwrap();
        assert_eq!(john.get_i32("Age").unwrap(), 33);
    }

    #[tokio::test]
    async fn rejected_update_leaves_collection_untouched() {
        let backend = people();
        let before = backend.documents();
        let err = backend
            .update_many(doc! {}, doc! { "$inc": { "Name": 1_i32 } })
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::Rejected(_)));
        assert_eq!(backend.documents(), before);
    }

    #[tokio::test]
    async fn injected_failure_is_one_shot_and_counted() {
        let backend = people();
        let before = backend.calls();
        backend.fail_next(BackendError::rejected("boom"));

        assert!(backend.find_one(doc! {}).await.is_err());
        assert!(backend.find_one(doc! {}).await.is_ok());
        assert_eq!(backend.calls(), before + 2);
    }

    #[tokio::test]
    async fn disconnect_blocks_data_calls_until_connect() {
        let backend = people();
        backend.disconnect().await.unwrap();
        assert!(!backend.is_connected());
        assert!(matches!(
            backend.find_one(doc! {}).await,
            Err(BackendError::NotConnected)
        ));
        assert!(backend.ping().await.is_err());

        backend.connect().await.unwrap();
        assert!(backend.find_one(doc! {}).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn unreachable_server_fails_ping_and_connect() {
        let backend = MemoryBackend::new();
        backend.set_reachable(false);
        assert!(matches!(backend.ping().await, Err(BackendError::NotConnected)));
        assert!(backend.connect().await.is_err());

        backend.set_reachable(true);
        backend.ping().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn latency_delays_calls() {
        let backend = MemoryBackend::new();
        backend.set_latency(Duration::from_secs(5));

        let slow = tokio::time::timeout(Duration::from_secs(1), backend.ping()).await;
        assert!(slow.is_err());

        backend.clear_faults();
        let fast = tokio::time::timeout(Duration::from_secs(1), backend.ping()).await;
        assert!(fast.is_ok());
    }

    #[tokio::test]
    async fn clones_share_state() {
        let backend = MemoryBackend::new();
        let observer = backend.clone();
        backend.insert_one(doc! { "Name": "john" }).await.unwrap();
        assert_eq!(observer.len(), 1);
        assert_eq!(observer.calls(), 1);
    }
}
