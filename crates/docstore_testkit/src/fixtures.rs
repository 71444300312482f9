//! Test fixtures and store helpers.
//!
//! Provides the record type used across the test suites, configurations for
//! in-memory and live stores, and a store wired to a [`MemoryBackend`] the
//! test keeps a handle to.

use docstore_core::{Context, Document, DocumentStore, MemoryBackend, StoreConfig, Telemetry};
use serde::{Deserialize, Serialize};

/// Database used by test stores.
pub const TEST_DATABASE: &str = "testing";

/// Collection used by test stores.
pub const TEST_COLLECTION: &str = "persons";

/// Environment variable pointing live tests at a MongoDB server.
pub const ENV_TEST_URL: &str = "DOCSTORE_TEST_URL";

/// The record stored by the test suites.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    /// Full name.
    #[serde(rename = "Name")]
    pub name: String,
    /// Gender.
    #[serde(rename = "Gender")]
    pub gender: String,
    /// Age in years.
    #[serde(rename = "Age")]
    pub age: i64,
}

impl Person {
    /// Creates a person.
    pub fn new(name: impl Into<String>, gender: impl Into<String>, age: i64) -> Self {
        Self {
            name: name.into(),
            gender: gender.into(),
            age,
        }
    }

    /// john, male, 44.
    pub fn john() -> Self {
        Self::new("john", "male", 44)
    }

    /// mary, female, 44.
    pub fn mary() -> Self {
        Self::new("mary", "female", 44)
    }

    /// Serializes to a JSON payload.
    pub fn to_json(&self) -> Vec<u8> {
        serde_json::to_vec(self).expect("Person always serializes")
    }

    /// Reads a person back out of a stored document, ignoring `_id`.
    pub fn from_document(document: &Document) -> Option<Self> {
        serde_json::from_value(document.to_json()).ok()
    }
}

/// A context with no deadline and no cancellation.
pub fn ctx() -> Context {
    Context::background()
}

/// Configuration for in-memory test stores.
pub fn test_config() -> StoreConfig {
    StoreConfig::new(TEST_DATABASE, TEST_COLLECTION).with_timeout_secs(5)
}

/// Configuration for a live server, if `DOCSTORE_TEST_URL` is set.
///
/// Each caller passes its own collection so tests running in parallel do
/// not see each other's documents.
pub fn live_config(collection: &str) -> Option<StoreConfig> {
    let url = std::env::var(ENV_TEST_URL).ok()?;
    Some(
        StoreConfig::new(TEST_DATABASE, collection)
            .with_url(url)
            .with_timeout_secs(5)
            .with_app_name("docstore-testkit"),
    )
}

/// A store over an in-memory backend, plus a handle to that backend.
pub struct TestStore {
    /// The store under test.
    pub store: DocumentStore<MemoryBackend>,
    /// Shared handle for inspection and fault injection.
    pub backend: MemoryBackend,
}

impl TestStore {
    /// Opens a store over an empty in-memory backend.
    pub async fn memory() -> Self {
        Self::with_backend(MemoryBackend::new(), Telemetry::silent()).await
    }

    /// Opens a store over the given backend and telemetry.
    pub async fn with_backend(backend: MemoryBackend, telemetry: Telemetry) -> Self {
        let store = DocumentStore::with_backend(test_config(), backend.clone(), telemetry)
            .await
            .expect("Failed to open in-memory store");
        Self { store, backend }
    }

    /// Opens a store pre-loaded with the given people.
    pub async fn with_people(people: &[Person]) -> Self {
        let test = Self::memory().await;
        for person in people {
            test.store
                .insert_one(&ctx(), &person.to_json())
                .await
                .expect("Failed to seed person");
        }
        test
    }
}

impl std::ops::Deref for TestStore {
    type Target = DocumentStore<MemoryBackend>;

    fn deref(&self) -> &Self::Target {
        &self.store
    }
}
