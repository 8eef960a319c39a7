//! Products: a document collection plus image uploads.

use std::path::{Path, PathBuf};

use axum::{extract::State, routing::post, Json, Router};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::http::response::ApiError;
use crate::http::server::AppContext;
use crate::http::upload::UploadedFiles;
use crate::resources::collection::{self, Collection};

pub const IMAGE_FIELD: &str = "image";
pub const MAX_IMAGE_BYTES: usize = 1024 * 1024;
const UPLOADS_DIR: &str = "uploads";

pub fn collection() -> Collection {
    Collection::new("products", "product")
}

pub fn router(context: AppContext) -> Router {
    let uploads = Router::new()
        .route("/uploadImage", post(upload_image))
        .with_state(context.clone());

    collection::router(context, collection()).merge(uploads)
}

/// File name reduced to its last component with unusual characters replaced.
fn safe_file_name(name: &str) -> String {
    let base = Path::new(name)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("image");
    base.chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') { c } else { '_' })
        .collect()
}

async fn upload_image(
    State(context): State<AppContext>,
    files: UploadedFiles,
) -> Result<Json<Value>, ApiError> {
    let image = files
        .first(IMAGE_FIELD)
        .ok_or_else(|| ApiError::BadRequest("No File Uploaded".into()))?;

    if !image.is_image() {
        return Err(ApiError::BadRequest("Please Upload Image".into()));
    }
    if image.size() > MAX_IMAGE_BYTES {
        return Err(ApiError::BadRequest("Please upload image smaller than 1MB".into()));
    }

    let file_name = format!("{}-{}", Uuid::new_v4(), safe_file_name(&image.file_name));
    let dir: PathBuf = context.config.assets.public_dir.join(UPLOADS_DIR);
    tokio::fs::create_dir_all(&dir)
        .await
        .map_err(|e| ApiError::Internal(format!("creating {}: {e}", dir.display())))?;
    let path = dir.join(&file_name);
    tokio::fs::write(&path, &image.data)
        .await
        .map_err(|e| ApiError::Internal(format!("writing {}: {e}", path.display())))?;

    tracing::info!(file = %file_name, size = image.size(), "Stored product image");
    Ok(Json(json!({ "image": format!("/{UPLOADS_DIR}/{file_name}") })))
}
