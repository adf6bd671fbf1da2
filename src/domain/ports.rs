//! Platform ports
//!
//! The link-order component never owns carts, products or sessions. These
//! traits are the contracts the hosting commerce platform implements; the
//! application layer receives them as `Arc<dyn _>` at construction time.

use async_trait::async_trait;

use super::cart::Cart;
use super::context::{ContextToken, SalesChannelContext};
use super::error::PlatformResult;
use super::product::Product;

// ── SessionResolver ────────────────────────────────────────────

/// Resolves shopper context tokens into sales channel contexts.
#[async_trait]
pub trait SessionResolver: Send + Sync {
    /// Look up the context for `token`. `Ok(None)` means the token is unknown
    /// or expired.
    async fn resolve(&self, token: &ContextToken) -> PlatformResult<Option<SalesChannelContext>>;

    /// Open a fresh context for a visitor without a valid token.
    async fn open(&self) -> PlatformResult<SalesChannelContext>;
}

// ── ProductCatalog ─────────────────────────────────────────────

#[async_trait]
pub trait ProductCatalog: Send + Sync {
    /// Products whose product number equals `product_number` exactly.
    async fn search_by_product_number(
        &self,
        product_number: &str,
        context: &SalesChannelContext,
    ) -> PlatformResult<Vec<Product>>;
}

// ── CartService ────────────────────────────────────────────────

#[async_trait]
pub trait CartService: Send + Sync {
    /// Current cart for the token, created empty when none exists yet.
    async fn get_cart(
        &self,
        token: &ContextToken,
        context: &SalesChannelContext,
    ) -> PlatformResult<Cart>;

    /// Persist `cart` and return the cart as the platform stored it.
    async fn update(
        &self,
        token: &ContextToken,
        cart: Cart,
        context: &SalesChannelContext,
    ) -> PlatformResult<Cart>;
}

// ── SystemConfig ───────────────────────────────────────────────

/// Admin-managed key/value settings.
#[async_trait]
pub trait SystemConfig: Send + Sync {
    async fn get_string(&self, key: &str) -> PlatformResult<Option<String>>;

    async fn set_string(&self, key: &str, value: String) -> PlatformResult<()>;
}
