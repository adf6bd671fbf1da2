//! # Link Order
//!
//! Order-by-link storefront component: a home-page visit carrying
//! `?gArticle=<code>` adds the configured product to the shopper's cart at the
//! configured price and redirects to checkout.
//!
//! ## Architecture
//!
//! - **domain**: rules, cart records, errors and the platform ports
//! - **application**: the link-order use case
//! - **infrastructure**: in-memory platform adapters
//! - **interfaces**: axum middleware, handlers and router
//! - **server**: runtime wiring and graceful shutdown

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod interfaces;
pub mod server;
pub mod shared;

pub use application::{LinkOrderOutcome, LinkOrderService, LinkOrderSettings};
pub use config::{default_config_path, AppConfig, ConfigError};
pub use domain::{LinkOrderError, OrderRule};
pub use interfaces::http::create_storefront_router;
