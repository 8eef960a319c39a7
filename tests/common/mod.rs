//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, Response};
use mongodb::bson::{oid::ObjectId, Bson, Document};
use serde_json::Value;

use storefront_api::config::{AppConfig, DatabaseConfig};
use storefront_api::db::{Connector, DocumentStore, StoreError};

/// In-memory document store with call counters.
#[derive(Default)]
pub struct MemoryStore {
    collections: Mutex<HashMap<String, Vec<Document>>>,
    pub inserts: AtomicUsize,
    pub closed: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn documents(&self, collection: &str) -> Vec<Document> {
        self.collections
            .lock()
            .unwrap()
            .get(collection)
            .cloned()
            .unwrap_or_default()
    }

    fn parse_id(id: &str) -> Result<ObjectId, StoreError> {
        ObjectId::parse_str(id).map_err(|_| StoreError::InvalidId(id.to_string()))
    }
}

fn matches(doc: &Document, filter: &Document) -> bool {
    filter.iter().all(|(key, expected)| match doc.get(key) {
        Some(Bson::String(actual)) => Bson::String(actual.clone()) == *expected,
        Some(other) => Bson::String(other.to_string()) == *expected || other == expected,
        None => false,
    })
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn find(
        &self,
        collection: &str,
        filter: Document,
        limit: i64,
    ) -> Result<Vec<Document>, StoreError> {
        Ok(self
            .documents(collection)
            .into_iter()
            .filter(|d| matches(d, &filter))
            .take(limit as usize)
            .collect())
    }

    async fn find_by_id(
        &self,
        collection: &str,
        id: &str,
    ) -> Result<Option<Document>, StoreError> {
        let oid = Self::parse_id(id)?;
        Ok(self
            .documents(collection)
            .into_iter()
            .find(|d| d.get_object_id("_id").ok() == Some(oid)))
    }

    async fn insert(&self, collection: &str, mut doc: Document) -> Result<Document, StoreError> {
        self.inserts.fetch_add(1, Ordering::SeqCst);
        doc.insert("_id", ObjectId::new());
        self.collections
            .lock()
            .unwrap()
            .entry(collection.to_string())
            .or_default()
            .push(doc.clone());
        Ok(doc)
    }

    async fn update_by_id(
        &self,
        collection: &str,
        id: &str,
        changes: Document,
    ) -> Result<Option<Document>, StoreError> {
        let oid = Self::parse_id(id)?;
        let mut collections = self.collections.lock().unwrap();
        let Some(doc) = collections
            .get_mut(collection)
            .and_then(|docs| docs.iter_mut().find(|d| d.get_object_id("_id").ok() == Some(oid)))
        else {
            return Ok(None);
        };
        doc.extend(changes);
        Ok(Some(doc.clone()))
    }

    async fn delete_by_id(&self, collection: &str, id: &str) -> Result<bool, StoreError> {
        let oid = Self::parse_id(id)?;
        let mut collections = self.collections.lock().unwrap();
        let Some(docs) = collections.get_mut(collection) else {
            return Ok(false);
        };
        let before = docs.len();
        docs.retain(|d| d.get_object_id("_id").ok() != Some(oid));
        Ok(docs.len() < before)
    }

    async fn close(&self) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }
}

/// Hands out a prepared store.
pub struct StaticConnector(pub Arc<MemoryStore>);

#[async_trait]
impl Connector for StaticConnector {
    async fn connect(&self, _config: &DatabaseConfig) -> Result<Arc<dyn DocumentStore>, StoreError> {
        Ok(self.0.clone())
    }
}

/// Always fails like an unreachable database.
pub struct FailingConnector;

#[async_trait]
impl Connector for FailingConnector {
    async fn connect(&self, config: &DatabaseConfig) -> Result<Arc<dyn DocumentStore>, StoreError> {
        Err(StoreError::InvalidUrl(format!("cannot reach {}", config.url)))
    }
}

/// Defaults with a test database url, a signing secret and `public_dir`.
pub fn test_config(public_dir: &Path) -> AppConfig {
    let mut config = AppConfig::default();
    config.database.url = "mongodb://127.0.0.1:27017/storefront-test".into();
    config.security.cookie_secret = "test-secret".into();
    config.assets.public_dir = public_dir.to_path_buf();
    config.server.host = "127.0.0.1".into();
    config.server.port = 0;
    config
}

pub fn json_request(method: &str, uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
