//! Stub backends.
//!
//! [`TripwireBackend`] answers pings and panics on any other call, which
//! proves that a failing operation never reached the server.
//! [`DownBackend`] behaves like an unreachable server.

use docstore_core::bson::{Bson, Document as BsonDocument};
use docstore_core::{
    BackendError, BackendResult, DeleteOutcome, DocumentCursor, StoreBackend, UpdateOutcome,
};
use std::sync::atomic::{AtomicU64, Ordering};

/// Backend that panics if anything other than `ping` is called.
#[derive(Debug, Default)]
pub struct TripwireBackend {
    pings: AtomicU64,
}

impl TripwireBackend {
    /// Creates a tripwire.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of pings answered.
    pub fn pings(&self) -> u64 {
        self.pings.load(Ordering::SeqCst)
    }
}

fn tripped(call: &str) -> ! {
    panic!("tripwire backend received a {call} call");
}

impl StoreBackend for TripwireBackend {
    async fn ping(&self) -> BackendResult<()> {
        self.pings.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn connect(&self) -> BackendResult<()> {
        tripped("connect")
    }

    async fn disconnect(&self) -> BackendResult<()> {
        tripped("disconnect")
    }

    fn is_connected(&self) -> bool {
        true
    }

    async fn insert_one(&self, _document: BsonDocument) -> BackendResult<Bson> {
        tripped("insert_one")
    }

    async fn find_one(&self, _filter: BsonDocument) -> BackendResult<Option<BsonDocument>> {
        tripped("find_one")
    }

    async fn find(&self, _filter: BsonDocument) -> BackendResult<DocumentCursor> {
        tripped("find")
    }

    async fn delete_one(&self, _filter: BsonDocument) -> BackendResult<DeleteOutcome> {
        tripped("delete_one")
    }

    async fn delete_many(&self, _filter: BsonDocument) -> BackendResult<DeleteOutcome> {
        tripped("delete_many")
    }

    async fn update_one(
        &self,
        _filter: BsonDocument,
        _update: BsonDocument,
    ) -> BackendResult<UpdateOutcome> {
        tripped("update_one")
    }

    async fn update_many(
        &self,
        _filter: BsonDocument,
        _update: BsonDocument,
    ) -> BackendResult<UpdateOutcome> {
        tripped("update_many")
    }
}

/// Backend for a server that never answers.
#[derive(Debug, Default, Clone, Copy)]
pub struct DownBackend;

impl StoreBackend for DownBackend {
    async fn ping(&self) -> BackendResult<()> {
        Err(BackendError::NotConnected)
    }

    async fn connect(&self) -> BackendResult<()> {
        Err(BackendError::NotConnected)
    }

    async fn disconnect(&self) -> BackendResult<()> {
        Ok(())
    }

    fn is_connected(&self) -> bool {
        false
    }

    async fn insert_one(&self, _document: BsonDocument) -> BackendResult<Bson> {
        Err(BackendError::NotConnected)
    }

    async fn find_one(&self, _filter: BsonDocument) -> BackendResult<Option<BsonDocument>> {
        Err(BackendError::NotConnected)
    }

    async fn find(&self, _filter: BsonDocument) -> BackendResult<DocumentCursor> {
        Err(BackendError::NotConnected)
    }

    async fn delete_one(&self, _filter: BsonDocument) -> BackendResult<DeleteOutcome> {
        Err(BackendError::NotConnected)
    }

    async fn delete_many(&self, _filter: BsonDocument) -> BackendResult<DeleteOutcome> {
        Err(BackendError::NotConnected)
    }

    async fn update_one(
        &self,
        _filter: BsonDocument,
        _update: BsonDocument,
    ) -> BackendResult<UpdateOutcome> {
        Err(BackendError::NotConnected)
    }

    async fn update_many(
        &self,
        _filter: BsonDocument,
        _update: BsonDocument,
    ) -> BackendResult<UpdateOutcome> {
        Err(BackendError::NotConnected)
    }
}
