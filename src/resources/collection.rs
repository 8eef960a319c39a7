//! Generic document collection endpoints.
//!
//! ```text
//! GET    /        list (query pairs filter, capped)   → 200 {<plural>: [...], count}
//! POST   /        create from the JSON body           → 201 {<singular>: {...}}
//! GET    /{id}    fetch one                           → 200 {<singular>: {...}}
//! PATCH  /{id}    $set fields from the JSON body      → 200 {<singular>: {...}}
//! DELETE /{id}    remove                              → 200 {msg}
//! ```

use std::sync::Arc;

use axum::{
    extract::{Path, RawQuery, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use mongodb::bson::{self, Bson, Document};
use serde_json::{json, Map, Value};
use url::form_urlencoded;

use crate::http::body::JsonBody;
use crate::http::response::ApiError;
use crate::http::server::AppContext;

pub const DEFAULT_LIST_LIMIT: i64 = 100;

/// Description of one collection exposed over HTTP.
#[derive(Debug, Clone)]
pub struct Collection {
    name: &'static str,
    singular: &'static str,
    hidden: Vec<&'static str>,
    list_limit: i64,
}

impl Collection {
    pub fn new(name: &'static str, singular: &'static str) -> Self {
        Self {
            name,
            singular,
            hidden: Vec::new(),
            list_limit: DEFAULT_LIST_LIMIT,
        }
    }

    /// Never return `field` to clients.
    pub fn hide(mut self, field: &'static str) -> Self {
        self.hidden.push(field);
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Client-facing JSON for a stored document.
    pub fn present(&self, mut doc: Document) -> Value {
        for field in &self.hidden {
            doc.remove(*field);
        }
        if let Ok(id) = doc.get_object_id("_id") {
            doc.insert("_id", id.to_hex());
        }
        Bson::Document(doc).into_relaxed_extjson()
    }

    fn not_found(id: &str) -> ApiError {
        ApiError::NotFound(format!("No item found with id : {id}"))
    }

    /// Equality filter from flat query pairs; `limit` sets the page size.
    fn filter(&self, query: Option<&str>) -> (Document, i64) {
        let mut filter = Document::new();
        let mut limit = self.list_limit;
        for (key, value) in form_urlencoded::parse(query.unwrap_or_default().as_bytes()) {
            if key == "limit" {
                if let Ok(n) = value.parse::<i64>() {
                    limit = n.clamp(1, self.list_limit);
                }
                continue;
            }
            filter.insert(key.into_owned(), value.into_owned());
        }
        (filter, limit)
    }
}

#[derive(Clone)]
struct CollectionState {
    context: AppContext,
    collection: Arc<Collection>,
}

/// CRUD routes for `collection`.
pub fn router(context: AppContext, collection: Collection) -> Router {
    Router::new()
        .route("/", get(list).post(create))
        .route("/{id}", get(show).patch(update).delete(remove))
        .with_state(CollectionState {
            context,
            collection: Arc::new(collection),
        })
}

/// Body fields as a document, minus the immutable `_id`.
fn document_from(body: JsonBody) -> Result<Document, ApiError> {
    let mut fields: Map<String, Value> = body.into_object()?;
    fields.remove("_id");
    bson::to_document(&fields).map_err(|e| ApiError::BadRequest(format!("Invalid document: {e}")))
}

async fn list(
    State(state): State<CollectionState>,
    RawQuery(query): RawQuery,
) -> Result<impl IntoResponse, ApiError> {
    let (filter, limit) = state.collection.filter(query.as_deref());
    let docs = state
        .context
        .store
        .find(state.collection.name, filter, limit)
        .await?;

    let count = docs.len();
    let items: Vec<Value> = docs.into_iter().map(|d| state.collection.present(d)).collect();
    Ok(Json(json!({ state.collection.name: items, "count": count })))
}

async fn create(
    State(state): State<CollectionState>,
    body: JsonBody,
) -> Result<impl IntoResponse, ApiError> {
    let doc = document_from(body)?;
    let stored = state
        .context
        .store
        .insert(state.collection.name, doc)
        .await?;

    tracing::info!(collection = state.collection.name, "Created document");
    Ok((
        StatusCode::CREATED,
        Json(json!({ state.collection.singular: state.collection.present(stored) })),
    ))
}

async fn show(
    State(state): State<CollectionState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let doc = state
        .context
        .store
        .find_by_id(state.collection.name, &id)
        .await?
        .ok_or_else(|| Collection::not_found(&id))?;

    Ok(Json(json!({ state.collection.singular: state.collection.present(doc) })))
}

async fn update(
    State(state): State<CollectionState>,
    Path(id): Path<String>,
    body: JsonBody,
) -> Result<impl IntoResponse, ApiError> {
    let changes = document_from(body)?;
    if changes.is_empty() {
        return Err(ApiError::BadRequest("Please provide fields to update".into()));
    }

    let doc = state
        .context
        .store
        .update_by_id(state.collection.name, &id, changes)
        .await?
        .ok_or_else(|| Collection::not_found(&id))?;

    Ok(Json(json!({ state.collection.singular: state.collection.present(doc) })))
}

async fn remove(
    State(state): State<CollectionState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let removed = state
        .context
        .store
        .delete_by_id(state.collection.name, &id)
        .await?;
    if !removed {
        return Err(Collection::not_found(&id));
    }

    tracing::info!(collection = state.collection.name, id = %id, "Removed document");
    Ok(Json(json!({ "msg": "Success! Item removed." })))
}
