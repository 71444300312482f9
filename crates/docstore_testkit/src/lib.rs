//! # DocStore Testkit
//!
//! Test utilities for DocStore.
//!
//! This crate provides:
//! - Fixtures: the `Person` record, test configurations and a store wired
//!   to an inspectable in-memory backend
//! - Stub backends that panic or refuse on contact
//! - Property-based test generators using proptest
//!
//! ## Usage
//!
//! ```rust,ignore
//! use docstore_testkit::prelude::*;
//!
//! #[tokio::test]
//! async fn finds_john() {
//!     let test = TestStore::memory().await;
//!     let id = test.insert_one(&ctx(), &Person::john().to_json()).await.unwrap();
//!     assert_eq!(test.backend.len(), 1);
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod stub;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::stub::*;
    pub use docstore_core::{
        BackendError, Context, Document, DocumentStore, Identifier, MemoryBackend, StoreConfig,
        StoreError, Telemetry, Value,
    };
}

pub use fixtures::*;
pub use generators::*;
pub use stub::*;
