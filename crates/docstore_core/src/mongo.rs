//! MongoDB driver backend.

use crate::backend::{DeleteOutcome, DocumentCursor, StoreBackend, UpdateOutcome};
use crate::config::StoreConfig;
use crate::error::{BackendError, BackendResult};
use bson::{doc, Bson, Document as BsonDocument};
use futures::{StreamExt, TryStreamExt};
use mongodb::options::ClientOptions;
use mongodb::{Client, Collection};
use parking_lot::RwLock;
use tracing::debug;

/// Backend over the official MongoDB driver, bound to one collection.
///
/// The driver client is internally pooled and safe to share; this type only
/// adds the connected/disconnected lifecycle on top.
pub struct MongoBackend {
    options: ClientOptions,
    database: String,
    collection: String,
    client: RwLock<Option<Client>>,
}

impl MongoBackend {
    /// Parses the connection string and builds a driver client.
    ///
    /// No round trip happens here; pair with [`StoreBackend::ping`] to fail
    /// fast on an unreachable server.
    pub async fn dial(config: &StoreConfig) -> BackendResult<Self> {
        let mut options = ClientOptions::parse(&config.url).await?;
        if let Some(name) = &config.app_name {
            options.app_name = Some(name.clone());
        }
        options.server_selection_timeout = Some(config.timeout());
        options.connect_timeout = Some(config.timeout());

        let client = Client::with_options(options.clone())?;
        debug!(hosts = ?options.hosts, database = %config.database, "dialed mongodb");

        Ok(Self {
            options,
            database: config.database.clone(),
            collection: config.collection.clone(),
            client: RwLock::new(Some(client)),
        })
    }

    /// Name of the bound database.
    pub fn database_name(&self) -> &str {
        &self.database
    }

    /// Name of the bound collection.
    pub fn collection_name(&self) -> &str {
        &self.collection
    }

    fn client(&self) -> BackendResult<Client> {
        self.client.read().clone().ok_or(BackendError::NotConnected)
    }

    fn collection(&self) -> BackendResult<Collection<BsonDocument>> {
        Ok(self
            .client()?
            .database(&self.database)
            .collection(&self.collection))
    }
}

impl StoreBackend for MongoBackend {
    async fn ping(&self) -> BackendResult<()> {
        self.client()?
            .database(&self.database)
            .run_command(doc! { "ping": 1 })
            .await?;
        debug!("database did respond to ping");
        Ok(())
    }

    async fn connect(&self) -> BackendResult<()> {
        if self.client.read().is_none() {
            let client = Client::with_options(self.options.clone())?;
            let mut slot = self.client.write();
            if slot.is_none() {
                *slot = Some(client);
            }
        }
        if let Err(err) = self.ping().await {
            // A client that never answered does not count as connected.
            *self.client.write() = None;
            return Err(err);
        }
        Ok(())
    }

    async fn disconnect(&self) -> BackendResult<()> {
        let client = self.client.write().take();
        if let Some(client) = client {
            client.shutdown().await;
            debug!("mongodb client shut down");
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.client.read().is_some()
    }

    async fn insert_one(&self, document: BsonDocument) -> BackendResult<Bson> {
        let result = self.collection()?.insert_one(document).await?;
        Ok(result.inserted_id)
    }

    async fn find_one(&self, filter: BsonDocument) -> BackendResult<Option<BsonDocument>> {
        Ok(self.collection()?.find_one(filter).await?)
    }

    async fn find(&self, filter: BsonDocument) -> BackendResult<DocumentCursor> {
        let cursor = self.collection()?.find(filter).await?;
        Ok(cursor.map_err(BackendError::from).boxed())
    }

    async fn delete_one(&self, filter: BsonDocument) -> BackendResult<DeleteOutcome> {
        Ok(self.collection()?.delete_one(filter).await?.into())
    }

    async fn delete_many(&self, filter: BsonDocument) -> BackendResult<DeleteOutcome> {
        Ok(self.collection()?.delete_many(filter).await?.into())
    }

    async fn update_one(
        &self,
        filter: BsonDocument,
        update: BsonDocument,
    ) -> BackendResult<UpdateOutcome> {
        Ok(self.collection()?.update_one(filter, update).await?.into())
    }

    async fn update_many(
        &self,
        filter: BsonDocument,
        update: BsonDocument,
    ) -> BackendResult<UpdateOutcome> {
        Ok(self.collection()?.update_many(filter, update).await?.into())
    }
}
