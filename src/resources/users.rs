use axum::Router;

use crate::http::server::AppContext;
use crate::resources::collection::{self, Collection};

pub fn collection() -> Collection {
    Collection::new("users", "user").hide("password")
}

pub fn router(context: AppContext) -> Router {
    collection::router(context, collection())
}
