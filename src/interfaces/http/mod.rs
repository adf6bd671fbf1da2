//! HTTP interface
//!
//! - `link_order`: order-by-link middleware
//! - `session`: context-token middleware
//! - `middleware`: admin API-key check
//! - `handlers`: storefront pages, rule admin, health
//! - `router`: storefront router with Swagger documentation

pub mod common;
pub mod handlers;
pub mod link_order;
pub mod metrics;
pub mod middleware;
pub mod request_id;
pub mod router;
pub mod session;

pub use router::{create_storefront_router, AppState};
