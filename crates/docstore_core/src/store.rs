//! Document store facade.

use crate::backend::{DeleteOutcome, StoreBackend, UpdateOutcome};
use crate::config::StoreConfig;
use crate::context::Context;
use crate::error::{BackendError, BackendResult, StoreError, StoreResult};
use crate::mongo::MongoBackend;
use crate::telemetry::Telemetry;
use bson::{doc, Bson, Document as BsonDocument};
use docstore_codec::{json_to_bson, CodecError, Document, Identifier};
use futures::StreamExt;
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// JSON-in, document-out access to one collection.
///
/// `DocumentStore` is the primary entry point. It owns the configuration,
/// a [`StoreBackend`] and the [`Telemetry`] its events go to. Every
/// operation:
/// - converts its JSON argument(s) before touching the backend
/// - makes exactly one backend call, bounded by the shorter of the
///   [`Context`] deadline and the configured timeout
/// - maps failures to [`StoreError`] without retrying
///
/// The store is `Send + Sync`; share it across tasks with an `Arc`.
///
/// # Opening a Store
///
/// ```rust,ignore
/// use docstore_core::{Context, DocumentStore, StoreConfig, Telemetry};
///
/// let config = StoreConfig::new("testing", "persons");
/// let store = DocumentStore::open(config, Telemetry::current()).await?;
///
/// let ctx = Context::background();
/// let id = store.insert_one(&ctx, br#"{"Name":"john","Age":44}"#).await?;
/// let john = store.find_by_id(&ctx, id).await?;
///
/// store.disconnect(&ctx).await?;
/// ```
pub struct DocumentStore<B: StoreBackend = MongoBackend> {
    /// Configuration, immutable for the store's lifetime.
    config: StoreConfig,
    /// Connection to the collection.
    backend: B,
    /// Destination of spans and events.
    telemetry: Telemetry,
}

impl DocumentStore<MongoBackend> {
    /// Dials the configured MongoDB server and pings it.
    ///
    /// # Errors
    ///
    /// - `InvalidConfig` if the configuration does not validate
    /// - `ConnectionFailed` if the URL cannot be parsed or the server does
    ///   not answer within the configured timeout
    pub async fn open(config: StoreConfig, telemetry: Telemetry) -> StoreResult<Self> {
        config.validate()?;
        let backend = telemetry
            .operation(
                "open",
                &config.database,
                &config.collection,
                within(config.timeout(), MongoBackend::dial(&config)),
            )
            .await
            .map_err(connection_failed)?;
        Self::with_backend(config, backend, telemetry).await
    }
}

impl<B: StoreBackend> DocumentStore<B> {
    /// Wraps an existing backend and pings it.
    ///
    /// # Errors
    ///
    /// `InvalidConfig` for a bad configuration, `ConnectionFailed` if the
    /// ping fails or runs past the configured timeout.
    pub async fn with_backend(
        config: StoreConfig,
        backend: B,
        telemetry: Telemetry,
    ) -> StoreResult<Self> {
        config.validate()?;
        let store = Self {
            config,
            backend,
            telemetry,
        };
        store
            .traced("open", async {
                store
                    .bounded(&Context::background(), connection_failed, async {
                        store.backend.ping().await.map_err(connection_failed)
                    })
                    .await?;
                debug!("connected to database");
                Ok(())
            })
            .await?;
        Ok(store)
    }

    /// The configuration the store was opened with.
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Name of the bound database.
    pub fn database(&self) -> &str {
        &self.config.database
    }

    /// Name of the bound collection.
    pub fn collection(&self) -> &str {
        &self.config.collection
    }

    /// Configured per-operation timeout.
    pub fn timeout(&self) -> Duration {
        self.config.timeout()
    }

    /// The backend, for inspection.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Returns true if the backend is connected.
    pub fn is_connected(&self) -> bool {
        self.backend.is_connected()
    }

    /// Re-establishes the connection after [`disconnect`](Self::disconnect).
    pub async fn connect(&self, ctx: &Context) -> StoreResult<()> {
        self.traced("connect", async {
            self.bounded(ctx, connection_failed, async {
                self.backend.connect().await.map_err(connection_failed)
            })
            .await?;
            debug!("connected to database");
            Ok(())
        })
        .await
    }

    /// Closes the connection. Later operations fail with `NotConnected`
    /// until [`connect`](Self::connect) is called.
    pub async fn disconnect(&self, ctx: &Context) -> StoreResult<()> {
        const OP: &str = "disconnect";
        self.traced(OP, async {
            self.bounded(ctx, failed(OP), async {
                self.backend.disconnect().await.map_err(failed(OP))
            })
            .await?;
            debug!("disconnected from database");
            Ok(())
        })
        .await
    }

    /// Inserts a JSON object and returns its identifier.
    ///
    /// A caller-supplied `_id` is kept if it is an ObjectId (written as
    /// `{"$oid": "..."}`); any other `_id` is a malformed payload.
    pub async fn insert_one(&self, ctx: &Context, payload: &[u8]) -> StoreResult<Identifier> {
        const OP: &str = "insert_one";
        self.traced(OP, async {
            let document = json_to_bson(payload)?;
            if let Some(id) = document.get("_id") {
                if !matches!(id, Bson::ObjectId(_)) {
                    return Err(StoreError::from(CodecError::unsupported_value(
                        "_id",
                        format!("must be an ObjectId, got {:?}", id.element_type()),
                    )));
                }
            }

            let inserted = self
                .bounded(ctx, failed(OP), async {
                    self.backend.insert_one(document).await.map_err(failed(OP))
                })
                .await?;

            let Bson::ObjectId(oid) = inserted else {
                return Err(StoreError::operation(
                    OP,
                    BackendError::rejected(format!(
                        "server assigned a non-ObjectId _id: {inserted}"
                    )),
                ));
            };
            let id = Identifier::from(oid);
            debug!(id = %id, "inserted document");
            Ok(id)
        })
        .await
    }

    /// Returns the first document matching a JSON filter.
    ///
    /// # Errors
    ///
    /// `NotFound` when nothing matches.
    pub async fn find_one(&self, ctx: &Context, filter: &[u8]) -> StoreResult<Document> {
        const OP: &str = "find_one";
        self.traced(OP, async {
            let filter = json_to_bson(filter)?;
            self.fetch_one(ctx, OP, filter).await
        })
        .await
    }

    /// Returns the document with the given identifier.
    ///
    /// # Errors
    ///
    /// `NotFound` when no document has that identifier.
    pub async fn find_by_id(&self, ctx: &Context, id: Identifier) -> StoreResult<Document> {
        const OP: &str = "find_by_id";
        self.traced(OP, async {
            let filter = doc! { "_id": { "$eq": id.to_object_id() } };
            self.fetch_one(ctx, OP, filter).await
        })
        .await
    }

    /// Returns every document matching a JSON filter.
    ///
    /// No match is an empty vector, not an error.
    pub async fn find_many_filter_json(
        &self,
        ctx: &Context,
        filter: &[u8],
    ) -> StoreResult<Vec<Document>> {
        const OP: &str = "find_many_filter_json";
        self.traced(OP, async {
            let filter = json_to_bson(filter)?;
            self.fetch_many(ctx, OP, filter).await
        })
        .await
    }

    /// Returns every document matching a native filter.
    pub async fn find_many_filter_bson(
        &self,
        ctx: &Context,
        filter: BsonDocument,
    ) -> StoreResult<Vec<Document>> {
        const OP: &str = "find_many_filter_bson";
        self.traced(OP, self.fetch_many(ctx, OP, filter)).await
    }

    /// Deletes the first document matching a JSON filter.
    pub async fn delete_one(&self, ctx: &Context, filter: &[u8]) -> StoreResult<DeleteOutcome> {
        const OP: &str = "delete_one";
        self.traced(OP, async {
            let filter = json_to_bson(filter)?;
            let outcome = self
                .bounded(ctx, failed(OP), async {
                    self.backend.delete_one(filter).await.map_err(failed(OP))
                })
                .await?;
            debug!(deleted = outcome.deleted_count, "deleted documents");
            Ok(outcome)
        })
        .await
    }

    /// Deletes every document matching a JSON filter.
    pub async fn delete_all(&self, ctx: &Context, filter: &[u8]) -> StoreResult<DeleteOutcome> {
        const OP: &str = "delete_all";
        self.traced(OP, async {
            let filter = json_to_bson(filter)?;
            let outcome = self
                .bounded(ctx, failed(OP), async {
                    self.backend.delete_many(filter).await.map_err(failed(OP))
                })
                .await?;
            debug!(deleted = outcome.deleted_count, "deleted documents");
            Ok(outcome)
        })
        .await
    }

    /// Applies a JSON update document to the document with the given
    /// identifier.
    pub async fn update_by_id(
        &self,
        ctx: &Context,
        id: Identifier,
        update: &[u8],
    ) -> StoreResult<UpdateOutcome> {
        const OP: &str = "update_by_id";
        self.traced(OP, async {
            let update = json_to_bson(update)?;
            let filter = doc! { "_id": { "$eq": id.to_object_id() } };
            self.apply_update(ctx, OP, filter, update, false).await
        })
        .await
    }

    /// Applies a JSON update document to the first document matching a JSON
    /// filter.
    pub async fn update_one(
        &self,
        ctx: &Context,
        filter: &[u8],
        update: &[u8],
    ) -> StoreResult<UpdateOutcome> {
        const OP: &str = "update_one";
        self.traced(OP, async {
            let filter = json_to_bson(filter)?;
            let update = json_to_bson(update)?;
            self.apply_update(ctx, OP, filter, update, false).await
        })
        .await
    }

    /// Applies a JSON update document to every document matching a JSON
    /// filter.
    pub async fn update_many(
        &self,
        ctx: &Context,
        filter: &[u8],
        update: &[u8],
    ) -> StoreResult<UpdateOutcome> {
        const OP: &str = "update_many";
        self.traced(OP, async {
            let filter = json_to_bson(filter)?;
            let update = json_to_bson(update)?;
            self.apply_update(ctx, OP, filter, update, true).await
        })
        .await
    }

    async fn fetch_one(
        &self,
        ctx: &Context,
        op: &'static str,
        filter: BsonDocument,
    ) -> StoreResult<Document> {
        let found = self
            .bounded(ctx, failed(op), async {
                self.backend.find_one(filter).await.map_err(failed(op))
            })
            .await?;
        match found {
            Some(document) => {
                debug!("found document");
                Ok(Document::from(document))
            }
            None => Err(StoreError::NotFound),
        }
    }

    async fn fetch_many(
        &self,
        ctx: &Context,
        op: &'static str,
        filter: BsonDocument,
    ) -> StoreResult<Vec<Document>> {
        let documents = self
            .bounded(ctx, failed(op), async {
                let mut cursor = self.backend.find(filter).await.map_err(failed(op))?;
                let mut documents = Vec::new();
                while let Some(item) = cursor.next().await {
                    match item {
                        Ok(document) => documents.push(Document::from(document)),
                        Err(source) => {
                            return Err(StoreError::CursorIteration {
                                fetched: documents.len(),
                                source,
                            })
                        }
                    }
                }
                Ok(documents)
            })
            .await?;
        debug!(count = documents.len(), "fetched documents");
        Ok(documents)
    }

    async fn apply_update(
        &self,
        ctx: &Context,
        op: &'static str,
        filter: BsonDocument,
        update: BsonDocument,
        many: bool,
    ) -> StoreResult<UpdateOutcome> {
        let outcome = self
            .bounded(ctx, failed(op), async {
                let result = if many {
                    self.backend.update_many(filter, update).await
                } else {
                    self.backend.update_one(filter, update).await
                };
                result.map_err(failed(op))
            })
            .await?;
        debug!(
            matched = outcome.matched_count,
            modified = outcome.modified_count,
            "updated documents"
        );
        Ok(outcome)
    }

    /// Runs `call` under the context's cancellation and the operation budget.
    ///
    /// An already cancelled context or an exhausted budget fails without
    /// polling `call`, so nothing is dispatched.
    async fn bounded<T>(
        &self,
        ctx: &Context,
        abort: impl Fn(BackendError) -> StoreError,
        call: impl Future<Output = StoreResult<T>>,
    ) -> StoreResult<T> {
        if ctx.is_cancelled() {
            return Err(abort(BackendError::Cancelled));
        }
        let budget = ctx.budget(self.config.timeout());
        if budget.is_zero() {
            return Err(abort(BackendError::Timeout(budget)));
        }

        tokio::select! {
            biased;
            () = ctx.cancelled() => Err(abort(BackendError::Cancelled)),
            outcome = tokio::time::timeout(budget, call) => match outcome {
                Ok(result) => result,
                Err(_) => Err(abort(BackendError::Timeout(budget))),
            },
        }
    }

    /// Runs `body` inside this store's operation span and logs its failure.
    async fn traced<T>(
        &self,
        op: &'static str,
        body: impl Future<Output = StoreResult<T>>,
    ) -> StoreResult<T> {
        let database = self.config.database.as_str();
        let collection = self.config.collection.as_str();
        self.telemetry
            .operation(op, database, collection, async move {
                let outcome = body.await;
                match &outcome {
                    Ok(_) => {}
                    Err(StoreError::NotFound) => debug!("no document matched the filter"),
                    Err(err) => warn!(error = %err, "operation failed"),
                }
                outcome
            })
            .await
    }
}

fn failed(operation: &'static str) -> impl Fn(BackendError) -> StoreError + Copy {
    move |source| StoreError::operation(operation, source)
}

/// Runs a call that has no [`Context`], such as dialing, under a plain budget.
async fn within<T>(
    budget: Duration,
    call: impl Future<Output = BackendResult<T>>,
) -> BackendResult<T> {
    tokio::time::timeout(budget, call)
        .await
        .unwrap_or_else(|_| Err(BackendError::Timeout(budget)))
}

fn connection_failed(source: BackendError) -> StoreError {
    StoreError::ConnectionFailed { source }
}

impl<B: StoreBackend> fmt::Debug for DocumentStore<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentStore")
            .field("config", &self.config)
            .field("connected", &self.backend.is_connected())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryBackend;
    use crate::telemetry::capture;

    fn config() -> StoreConfig {
        StoreConfig::new("testing", "persons").with_timeout_secs(1)
    }

    async fn store() -> (DocumentStore<MemoryBackend>, MemoryBackend) {
        let backend = MemoryBackend::new();
        let store = DocumentStore::with_backend(config(), backend.clone(), Telemetry::silent())
            .await
            .unwrap();
        (store, backend)
    }

    #[tokio::test]
    async fn with_backend_rejects_bad_config() {
        let config = StoreConfig::new("", "persons");
        let err = DocumentStore::with_backend(config, MemoryBackend::new(), Telemetry::silent())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidConfig(_)));
    }

    #[tokio::test]
    async fn unreachable_backend_fails_fast() {
        let backend = MemoryBackend::new();
        backend.set_reachable(false);
        let err = DocumentStore::with_backend(config(), backend, Telemetry::silent())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::ConnectionFailed {
                source: BackendError::NotConnected
            }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn dialing_is_bounded() {
        let err = within(
            Duration::from_secs(2),
            std::future::pending::<BackendResult<()>>(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, BackendError::Timeout(budget) if budget == Duration::from_secs(2)));

        let ok = within(Duration::from_secs(2), async { Ok::<_, BackendError>(7) }).await;
        assert_eq!(ok.unwrap(), 7);
    }

    #[tokio::test]
    async fn accessors_forward_config() {
        let (store, _) = store().await;
        assert_eq!(store.database(), "testing");
        assert_eq!(store.collection(), "persons");
        assert_eq!(store.timeout(), Duration::from_secs(1));
        assert_eq!(store.config(), &config());
        assert!(store.is_connected());
    }

    #[tokio::test]
    async fn insert_then_find_by_id() {
        let (store, _) = store().await;
        let ctx = Context::background();

        let id = store
            .insert_one(&ctx, br#"{"Name":"john","Gender":"male","Age":44}"#)
            .await
            .unwrap();
        let found = store.find_by_id(&ctx, id).await.unwrap();
        assert_eq!(found.id(), Some(id));
        assert_eq!(found.get("Age").and_then(|v| v.as_int()), Some(44));
    }

    #[tokio::test]
    async fn insert_keeps_object_id_and_rejects_others() {
        let (store, backend) = store().await;
        let ctx = Context::background();

        let chosen = Identifier::generate();
        let payload = format!(r#"{{"_id":{{"$oid":"{chosen}"}},"Name":"john"}}"#);
        let id = store.insert_one(&ctx, payload.as_bytes()).await.unwrap();
        assert_eq!(id, chosen);

        let calls = backend.calls();
        let err = store
            .insert_one(&ctx, br#"{"_id":"john","Name":"john"}"#)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::MalformedPayload(_)));
        assert_eq!(backend.calls(), calls);
    }

    #[tokio::test]
    async fn missing_document_is_not_found() {
        let (store, _) = store().await;
        let err = store
            .find_one(&Context::background(), br#"{"Name":"nobody"}"#)
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn malformed_filter_never_reaches_backend() {
        let (store, backend) = store().await;
        let calls = backend.calls();
        let ctx = Context::background();

        assert!(matches!(
            store.find_one(&ctx, b"[1,2]").await,
            Err(StoreError::MalformedPayload(CodecError::NotAnObject { .. }))
        ));
        assert!(matches!(
            store.delete_all(&ctx, b"{not json").await,
            Err(StoreError::MalformedPayload(CodecError::InvalidJson { .. }))
        ));
        assert!(matches!(
            store.update_one(&ctx, b"{}", b"42").await,
            Err(StoreError::MalformedPayload(_))
        ));
        assert_eq!(backend.calls(), calls);
    }

    #[tokio::test]
    async fn expired_deadline_skips_dispatch() {
        let (store, backend) = store().await;
        let calls = backend.calls();
        let ctx = Context::background()
            .with_deadline(std::time::Instant::now() - Duration::from_millis(1));

        let err = store.find_one(&ctx, b"{}").await.unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(backend.calls(), calls);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_backend_times_out() {
        let (store, backend) = store().await;
        backend.set_latency(Duration::from_secs(30));

        let err = store
            .find_many_filter_json(&Context::background(), b"{}")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::OperationFailed {
                operation: "find_many_filter_json",
                source: BackendError::Timeout(_)
            }
        ));
    }

    #[tokio::test]
    async fn cancelled_context_aborts() {
        let (store, backend) = store().await;
        let (ctx, handle) = Context::background().with_cancel();
        handle.cancel();

        let calls = backend.calls();
        let err = store.insert_one(&ctx, br#"{"Name":"john"}"#).await.unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(backend.calls(), calls);
        assert!(backend.is_empty());
    }

    #[tokio::test]
    async fn cursor_failure_discards_partial_results() {
        let (store, backend) = store().await;
        let ctx = Context::background();
        for name in ["john", "mary", "ana"] {
            let payload = format!(r#"{{"Name":"{name}"}}"#);
            store.insert_one(&ctx, payload.as_bytes()).await.unwrap();
        }
        backend.fail_cursor_after(2, BackendError::rejected("cursor killed"));

        let err = store.find_many_filter_bson(&ctx, doc! {}).await.unwrap_err();
        assert!(matches!(err, StoreError::CursorIteration { fetched: 2, .. }));
    }

    #[tokio::test]
    async fn disconnect_and_reconnect() {
        let (store, _) = store().await;
        let ctx = Context::background();

        store.disconnect(&ctx).await.unwrap();
        assert!(!store.is_connected());
        let err = store.find_one(&ctx, b"{}").await.unwrap_err();
        assert!(matches!(err.backend_error(), Some(BackendError::NotConnected)));

        store.connect(&ctx).await.unwrap();
        assert!(store.is_connected());
        assert!(store.find_one(&ctx, b"{}").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn events_go_to_injected_subscriber() {
        let (subscriber, captured) = capture::subscriber();
        let telemetry = Telemetry::new(subscriber);
        let store = DocumentStore::with_backend(config(), MemoryBackend::new(), telemetry)
            .await
            .unwrap();
        let ctx = Context::background();

        store.insert_one(&ctx, br#"{"Name":"john"}"#).await.unwrap();
        let _ = store.find_one(&ctx, br#"{"Name":"mary"}"#).await;
        let _ = store.find_one(&ctx, b"[]").await;

        let messages = captured.messages();
        assert!(messages.iter().any(|m| m == "connected to database"));
        assert!(messages.iter().any(|m| m == "inserted document"));
        assert!(messages.iter().any(|m| m == "no document matched the filter"));
        assert!(messages.iter().any(|m| m == "operation failed"));
    }
}
