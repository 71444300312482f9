//! Backend abstraction for document operations.

use crate::error::BackendResult;
use bson::{Bson, Document as BsonDocument};
use futures::stream::BoxStream;
use std::future::Future;

/// Stream of documents produced by a find.
///
/// Each item is either a decoded document or the error that stopped the
/// cursor. Consumers stop at the first error.
pub type DocumentCursor = BoxStream<'static, BackendResult<BsonDocument>>;

/// Outcome of a delete, as reported by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeleteOutcome {
    /// Number of documents removed.
    pub deleted_count: u64,
}

/// Outcome of an update, as reported by the server.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct UpdateOutcome {
    /// Number of documents matching the filter.
    pub matched_count: u64,
    /// Number of documents actually changed.
    pub modified_count: u64,
    /// Identifier of an upserted document, if any.
    pub upserted_id: Option<Bson>,
}

impl From<mongodb::results::DeleteResult> for DeleteOutcome {
    fn from(result: mongodb::results::DeleteResult) -> Self {
        Self {
            deleted_count: result.deleted_count,
        }
    }
}

impl From<mongodb::results::UpdateResult> for UpdateOutcome {
    fn from(result: mongodb::results::UpdateResult) -> Self {
        Self {
            matched_count: result.matched_count,
            modified_count: result.modified_count,
            upserted_id: result.upserted_id,
        }
    }
}

/// A connection to one collection of a document database.
///
/// This trait is the seam between the facade and the driver. Every method
/// performs exactly one server round trip (or none, for `is_connected`);
/// deadlines and cancellation are applied by the caller around the returned
/// futures.
pub trait StoreBackend: Send + Sync {
    /// Checks that the server answers.
    fn ping(&self) -> impl Future<Output = BackendResult<()>> + Send;

    /// (Re)establishes the connection. Idempotent.
    fn connect(&self) -> impl Future<Output = BackendResult<()>> + Send;

    /// Closes the connection. Idempotent.
    fn disconnect(&self) -> impl Future<Output = BackendResult<()>> + Send;

    /// Returns true if the backend believes it is connected.
    fn is_connected(&self) -> bool;

    /// Inserts one document and returns the stored `_id`.
    fn insert_one(&self, document: BsonDocument)
        -> impl Future<Output = BackendResult<Bson>> + Send;

    /// Returns the first document matching `filter`.
    fn find_one(
        &self,
        filter: BsonDocument,
    ) -> impl Future<Output = BackendResult<Option<BsonDocument>>> + Send;

    /// Opens a cursor over every document matching `filter`.
    fn find(&self, filter: BsonDocument)
        -> impl Future<Output = BackendResult<DocumentCursor>> + Send;

    /// Deletes the first document matching `filter`.
    fn delete_one(
        &self,
        filter: BsonDocument,
    ) -> impl Future<Output = BackendResult<DeleteOutcome>> + Send;

    /// Deletes every document matching `filter`.
    fn delete_many(
        &self,
        filter: BsonDocument,
    ) -> impl Future<Output = BackendResult<DeleteOutcome>> + Send;

    /// Applies `update` to the first document matching `filter`.
    fn update_one(
        &self,
        filter: BsonDocument,
        update: BsonDocument,
    ) -> impl Future<Output = BackendResult<UpdateOutcome>> + Send;

    /// Applies `update` to every document matching `filter`.
    fn update_many(
        &self,
        filter: BsonDocument,
        update: BsonDocument,
    ) -> impl Future<Output = BackendResult<UpdateOutcome>> + Send;
}
