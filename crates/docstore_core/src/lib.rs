//! # DocStore Core
//!
//! JSON-in, document-out facade over a MongoDB collection.
//!
//! This crate provides:
//! - [`DocumentStore`], the facade: insert, find, update and delete with
//!   JSON payloads and filters
//! - [`StoreBackend`], the seam to the database, with [`MongoBackend`] for
//!   production and [`MemoryBackend`] for tests and offline use
//! - [`Context`] for per-call deadlines and cancellation
//! - [`Telemetry`] for routing spans and events to a caller-chosen
//!   `tracing` subscriber
//!
//! ## Guarantees
//!
//! - A payload that is not a JSON object fails with `MalformedPayload`
//!   before anything is sent to the server
//! - Each operation makes at most one backend call and never retries
//! - Every call is bounded by the shorter of the context deadline and the
//!   configured timeout
//!
//! ## Usage
//!
//! ```
//! use docstore_core::{Context, DocumentStore, MemoryBackend, StoreConfig, Telemetry};
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let config = StoreConfig::new("testing", "persons");
//! let store = DocumentStore::with_backend(config, MemoryBackend::new(), Telemetry::silent())
//!     .await
//!     .unwrap();
//!
//! let ctx = Context::background();
//! let id = store.insert_one(&ctx, br#"{"Name":"john","Age":44}"#).await.unwrap();
//! let john = store.find_by_id(&ctx, id).await.unwrap();
//! assert_eq!(john.get("Age").and_then(|v| v.as_int()), Some(44));
//! # });
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod config;
mod context;
mod error;
mod memory;
mod mongo;
mod store;
mod telemetry;

pub use backend::{DeleteOutcome, DocumentCursor, StoreBackend, UpdateOutcome};
pub use config::{
    StoreConfig, ENV_APP_NAME, ENV_COLLECTION, ENV_DATABASE, ENV_TIMEOUT_SECONDS, ENV_URL,
};
pub use context::{CancelHandle, Context};
pub use error::{BackendError, BackendResult, StoreError, StoreResult};
pub use memory::MemoryBackend;
pub use mongo::MongoBackend;
pub use store::DocumentStore;
pub use telemetry::Telemetry;

pub use docstore_codec::{bson, CodecError, Document, Identifier, Value};
