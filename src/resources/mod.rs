//! Route collaborators mounted under `/api/v1`.
//!
//! Each module exposes a sub-router; business rules beyond plain document
//! storage live outside this service.

pub mod auth;
pub mod collection;
pub mod orders;
pub mod products;
pub mod reviews;
pub mod users;

use crate::http::server::AppContext;
use crate::routing::{RouteError, RouterGroup};

pub const AUTH_PREFIX: &str = "/api/v1/auth";
pub const USERS_PREFIX: &str = "/api/v1/users";
pub const PRODUCTS_PREFIX: &str = "/api/v1/products";
pub const REVIEWS_PREFIX: &str = "/api/v1/reviews";
pub const ORDERS_PREFIX: &str = "/api/v1/orders";

/// The five API namespaces.
pub fn router_group(context: &AppContext) -> Result<RouterGroup, RouteError> {
    RouterGroup::new()
        .mount(AUTH_PREFIX, auth::router())?
        .mount(USERS_PREFIX, users::router(context.clone()))?
        .mount(PRODUCTS_PREFIX, products::router(context.clone()))?
        .mount(REVIEWS_PREFIX, reviews::router(context.clone()))?
        .mount(ORDERS_PREFIX, orders::router(context.clone()))
}
