//! In-memory platform adapters for development and testing
//!
//! Stand-ins for the commerce platform's session, catalog, cart and
//! system-config services. Carts are stored exactly as handed to `update`.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use tracing::debug;
use uuid::Uuid;

use crate::config::ProductSeed;
use crate::domain::{
    Cart, CartService, ContextToken, PlatformError, PlatformResult, Product, ProductCatalog,
    SalesChannelContext, SessionResolver, SystemConfig, TaxState,
};

/// Values every newly opened context starts with
#[derive(Debug, Clone)]
pub struct SalesChannelDefaults {
    pub sales_channel_id: String,
    pub language_id: String,
    pub currency_id: String,
    pub tax_state: TaxState,
}

impl Default for SalesChannelDefaults {
    fn default() -> Self {
        Self {
            sales_channel_id: "storefront".to_string(),
            language_id: "en-GB".to_string(),
            currency_id: "EUR".to_string(),
            tax_state: TaxState::Gross,
        }
    }
}

// ── Sessions ───────────────────────────────────────────────────

pub struct InMemorySessions {
    defaults: SalesChannelDefaults,
    contexts: DashMap<ContextToken, SalesChannelContext>,
}

impl InMemorySessions {
    pub fn new(defaults: SalesChannelDefaults) -> Self {
        Self {
            defaults,
            contexts: DashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.contexts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }
}

#[async_trait]
impl SessionResolver for InMemorySessions {
    async fn resolve(&self, token: &ContextToken) -> PlatformResult<Option<SalesChannelContext>> {
        Ok(self.contexts.get(token).map(|c| c.clone()))
    }

    async fn open(&self) -> PlatformResult<SalesChannelContext> {
        let token = ContextToken::new(Uuid::new_v4().simple().to_string());
        let context = SalesChannelContext {
            token: token.clone(),
            sales_channel_id: self.defaults.sales_channel_id.clone(),
            language_id: self.defaults.language_id.clone(),
            currency_id: self.defaults.currency_id.clone(),
            tax_state: self.defaults.tax_state,
        };
        self.contexts.insert(token, context.clone());
        debug!(token = %context.token, "Opened sales channel context");
        Ok(context)
    }
}

// ── Catalog ────────────────────────────────────────────────────

/// Products keyed by product number
pub struct InMemoryCatalog {
    products: DashMap<String, Product>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self {
            products: DashMap::new(),
        }
    }

    pub fn from_seeds(seeds: &[ProductSeed]) -> Self {
        let catalog = Self::new();
        for seed in seeds {
            let product = Product {
                id: seed
                    .id
                    .clone()
                    .unwrap_or_else(|| Uuid::new_v4().simple().to_string()),
                product_number: seed.product_number.clone(),
                name: seed.name.clone(),
            };
            catalog.products.insert(product.product_number.clone(), product);
        }
        catalog
    }

    /// Add a product with a generated id and return it
    pub fn insert(&self, product_number: &str, name: &str) -> Product {
        let product = Product {
            id: Uuid::new_v4().simple().to_string(),
            product_number: product_number.to_string(),
            name: name.to_string(),
        };
        self.products
            .insert(product_number.to_string(), product.clone());
        product
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }
}

impl Default for InMemoryCatalog {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProductCatalog for InMemoryCatalog {
    async fn search_by_product_number(
        &self,
        product_number: &str,
        _context: &SalesChannelContext,
    ) -> PlatformResult<Vec<Product>> {
        Ok(self
            .products
            .get(product_number)
            .map(|p| vec![p.clone()])
            .unwrap_or_default())
    }
}

// ── Carts ──────────────────────────────────────────────────────

pub struct InMemoryCarts {
    carts: DashMap<ContextToken, Cart>,
}

impl InMemoryCarts {
    pub fn new() -> Self {
        Self {
            carts: DashMap::new(),
        }
    }

    /// Stored cart for `token`, if one was ever written
    pub fn snapshot(&self, token: &ContextToken) -> Option<Cart> {
        self.carts.get(token).map(|c| c.clone())
    }

    /// Number of carts ever written
    pub fn len(&self) -> usize {
        self.carts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.carts.is_empty()
    }
}

impl Default for InMemoryCarts {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CartService for InMemoryCarts {
    async fn get_cart(
        &self,
        token: &ContextToken,
        _context: &SalesChannelContext,
    ) -> PlatformResult<Cart> {
        Ok(self
            .snapshot(token)
            .unwrap_or_else(|| Cart::new(token.as_str())))
    }

    async fn update(
        &self,
        token: &ContextToken,
        mut cart: Cart,
        _context: &SalesChannelContext,
    ) -> PlatformResult<Cart> {
        if cart.token != token.as_str() {
            return Err(PlatformError::Rejected(format!(
                "cart {} does not belong to context {}",
                cart.token, token
            )));
        }
        cart.updated_at = Utc::now();
        self.carts.insert(token.clone(), cart.clone());
        Ok(cart)
    }
}

// ── System config ──────────────────────────────────────────────

pub struct InMemorySystemConfig {
    values: DashMap<String, String>,
}

impl InMemorySystemConfig {
    pub fn new() -> Self {
        Self {
            values: DashMap::new(),
        }
    }

    pub fn insert(&self, key: &str, value: &str) {
        self.values.insert(key.to_string(), value.to_string());
    }

    pub fn remove(&self, key: &str) {
        self.values.remove(key);
    }
}

impl Default for InMemorySystemConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SystemConfig for InMemorySystemConfig {
    async fn get_string(&self, key: &str) -> PlatformResult<Option<String>> {
        Ok(self.values.get(key).map(|v| v.clone()))
    }

    async fn set_string(&self, key: &str, value: String) -> PlatformResult<()> {
        self.values.insert(key.to_string(), value);
        Ok(())
    }
}

// ── Bundle ─────────────────────────────────────────────────────

/// All in-memory adapters wired together
#[derive(Clone)]
pub struct InMemoryPlatform {
    pub sessions: Arc<InMemorySessions>,
    pub catalog: Arc<InMemoryCatalog>,
    pub carts: Arc<InMemoryCarts>,
    pub system_config: Arc<InMemorySystemConfig>,
}

impl InMemoryPlatform {
    pub fn new(defaults: SalesChannelDefaults, seeds: &[ProductSeed]) -> Self {
        Self {
            sessions: Arc::new(InMemorySessions::new(defaults)),
            catalog: Arc::new(InMemoryCatalog::from_seeds(seeds)),
            carts: Arc::new(InMemoryCarts::new()),
            system_config: Arc::new(InMemorySystemConfig::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn opened_contexts_resolve() {
        let sessions = InMemorySessions::new(SalesChannelDefaults::default());
        let context = sessions.open().await.unwrap();
        assert_eq!(context.currency_id, "EUR");

        let resolved = sessions.resolve(&context.token).await.unwrap();
        assert_eq!(resolved, Some(context));
        assert!(sessions
            .resolve(&ContextToken::new("unknown"))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn catalog_search_is_exact() {
        let catalog = InMemoryCatalog::from_seeds(&[ProductSeed {
            id: Some("p-1".into()),
            product_number: "SW10001".into(),
            name: "Mug".into(),
        }]);
        let sessions = InMemorySessions::new(SalesChannelDefaults::default());
        let context = sessions.open().await.unwrap();

        let hits = catalog.search_by_product_number("SW10001", &context).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "p-1");
        assert!(catalog
            .search_by_product_number("sw10001", &context)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn carts_persist_updates_per_token() {
        let sessions = InMemorySessions::new(SalesChannelDefaults::default());
        let carts = InMemoryCarts::new();
        let context = sessions.open().await.unwrap();

        let mut cart = carts.get_cart(&context.token, &context).await.unwrap();
        assert!(cart.is_empty());
        cart.add(crate::domain::LineItem::product("p-1"));
        carts.update(&context.token, cart, &context).await.unwrap();

        assert_eq!(carts.snapshot(&context.token).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn update_rejects_foreign_cart() {
        let sessions = InMemorySessions::new(SalesChannelDefaults::default());
        let carts = InMemoryCarts::new();
        let context = sessions.open().await.unwrap();

        let err = carts
            .update(&context.token, Cart::new("someone-else"), &context)
            .await
            .unwrap_err();
        assert!(matches!(err, PlatformError::Rejected(_)));
    }

    #[tokio::test]
    async fn system_config_round_trip() {
        let config = InMemorySystemConfig::new();
        assert_eq!(config.get_string("k").await.unwrap(), None);
        config.set_string("k", "v".into()).await.unwrap();
        assert_eq!(config.get_string("k").await.unwrap(), Some("v".into()));
    }
}
