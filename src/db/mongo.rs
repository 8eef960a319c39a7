//! MongoDB-backed document store.

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::TryStreamExt;
use mongodb::bson::{doc, oid::ObjectId, Document};
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::options::{ClientOptions, ReturnDocument};
use mongodb::{Client, Collection, Database};

use crate::config::DatabaseConfig;
use crate::db::store::{Connector, DocumentStore, StoreError};

const DUPLICATE_KEY: i32 = 11000;

/// Connects to MongoDB and verifies the server answers a ping.
#[derive(Debug, Clone, Copy, Default)]
pub struct MongoConnector;

#[async_trait]
impl Connector for MongoConnector {
    async fn connect(&self, config: &DatabaseConfig) -> Result<Arc<dyn DocumentStore>, StoreError> {
        let store = MongoStore::connect(config).await?;
        Ok(Arc::new(store))
    }
}

/// A connected MongoDB database handle.
#[derive(Clone)]
pub struct MongoStore {
    client: Client,
    db: Database,
}

impl MongoStore {
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, StoreError> {
        let mut options = ClientOptions::parse(&config.url)
            .await
            .map_err(|e| StoreError::InvalidUrl(e.to_string()))?;
        options.server_selection_timeout = Some(config.connect_timeout());
        options.connect_timeout = Some(config.connect_timeout());
        options.app_name = Some(env!("CARGO_PKG_NAME").to_string());

        let db_name = options
            .default_database
            .clone()
            .unwrap_or_else(|| config.name.clone());

        let client = Client::with_options(options)?;
        let db = client.database(&db_name);

        // The driver connects lazily; force a round trip so failures surface here.
        db.run_command(doc! { "ping": 1 }).await?;
        tracing::info!(database = %db_name, "Connected to document store");

        Ok(Self { client, db })
    }

    fn collection(&self, name: &str) -> Collection<Document> {
        self.db.collection(name)
    }
}

fn object_id(id: &str) -> Result<ObjectId, StoreError> {
    ObjectId::parse_str(id).map_err(|_| StoreError::InvalidId(id.to_string()))
}

/// Turn duplicate key write errors into [`StoreError::Duplicate`].
fn classify(err: mongodb::error::Error) -> StoreError {
    if let ErrorKind::Write(WriteFailure::WriteError(write)) = err.kind.as_ref() {
        if write.code == DUPLICATE_KEY {
            return StoreError::Duplicate {
                field: duplicate_field(&write.message).unwrap_or_else(|| "unknown".to_string()),
            };
        }
    }
    StoreError::Driver(err)
}

/// Extract the key name from `... dup key: { email: "a@b.c" }`.
pub(crate) fn duplicate_field(message: &str) -> Option<String> {
    let rest = message.split("dup key: {").nth(1)?;
    let field = rest.split(':').next()?.trim();
    (!field.is_empty()).then(|| field.to_string())
}

#[async_trait]
impl DocumentStore for MongoStore {
    async fn find(
        &self,
        collection: &str,
        filter: Document,
        limit: i64,
    ) -> Result<Vec<Document>, StoreError> {
        let cursor = self.collection(collection).find(filter).limit(limit).await?;
        Ok(cursor.try_collect().await?)
    }

    async fn find_by_id(
        &self,
        collection: &str,
        id: &str,
    ) -> Result<Option<Document>, StoreError> {
        let oid = object_id(id)?;
        Ok(self.collection(collection).find_one(doc! { "_id": oid }).await?)
    }

    async fn insert(&self, collection: &str, mut doc: Document) -> Result<Document, StoreError> {
        doc.remove("_id");
        let result = self
            .collection(collection)
            .insert_one(&doc)
            .await
            .map_err(classify)?;
        doc.insert("_id", result.inserted_id);
        Ok(doc)
    }

    async fn update_by_id(
        &self,
        collection: &str,
        id: &str,
        mut changes: Document,
    ) -> Result<Option<Document>, StoreError> {
        let oid = object_id(id)?;
        changes.remove("_id");
        self.collection(collection)
            .find_one_and_update(doc! { "_id": oid }, doc! { "$set": changes })
            .return_document(ReturnDocument::After)
            .await
            .map_err(classify)
    }

    async fn delete_by_id(&self, collection: &str, id: &str) -> Result<bool, StoreError> {
        let oid = object_id(id)?;
        let result = self
            .collection(collection)
            .delete_one(doc! { "_id": oid })
            .await?;
        Ok(result.deleted_count > 0)
    }

    async fn close(&self) {
        self.client.clone().shutdown().await;
        tracing::info!("Document store connection closed");
    }
}
