//! Order-by-link business logic
//!
//! Matches the requested order code against the configured rules, adds the
//! product to the shopper's cart at the configured price and tells the HTTP
//! layer whether to redirect.

use std::sync::Arc;

use tracing::{debug, error, info};

use crate::domain::{
    find_rule, parse_rules, CartLineRequest, CartService, ContextToken, LineItem, LinkOrderError,
    PriceDefinition, ProductCatalog, SessionResolver, SystemConfig, SHIPPING_FEE_PAYLOAD_KEY,
};

/// System config key holding the `code=price=flag;...` rule string
pub const RULES_CONFIG_KEY: &str = "LinkOrder.config.articleAndPrices";
pub const DEFAULT_QUERY_PARAMETER: &str = "gArticle";
pub const DEFAULT_REDIRECT_TARGET: &str = "/checkout/cart";

/// Behaviour switches for the link-order handler
#[derive(Debug, Clone)]
pub struct LinkOrderSettings {
    pub query_parameter: String,
    pub redirect_target: String,
    pub annotate_errors: bool,
}

impl Default for LinkOrderSettings {
    fn default() -> Self {
        Self {
            query_parameter: DEFAULT_QUERY_PARAMETER.to_string(),
            redirect_target: DEFAULT_REDIRECT_TARGET.to_string(),
            annotate_errors: true,
        }
    }
}

/// Framework-independent view of an inbound storefront request
#[derive(Debug, Clone, Default)]
pub struct StorefrontRequest {
    /// HTTP method, upper case
    pub method: String,
    pub path: String,
    pub xhr: bool,
    /// Value of the order-code query parameter
    pub article: Option<String>,
    pub token: Option<ContextToken>,
}

impl StorefrontRequest {
    /// Only full-page `GET`/`HEAD` loads of the site root are considered.
    pub fn is_candidate(&self) -> bool {
        matches!(self.method.as_str(), "GET" | "HEAD") && !self.xhr && self.path == "/"
    }
}

/// What the HTTP layer should do with the request
#[derive(Debug)]
pub enum LinkOrderOutcome {
    /// Leave the response untouched
    PassThrough,
    /// Product added; answer with a redirect
    Redirect {
        location: String,
        line_item_id: String,
    },
    /// Matched a rule but adding failed; serve the page, optionally annotated
    Failed(LinkOrderError),
}

impl LinkOrderOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            Self::PassThrough => "pass_through",
            Self::Redirect { .. } => "redirect",
            Self::Failed(_) => "failed",
        }
    }
}

/// Service for order-by-link requests
pub struct LinkOrderService {
    sessions: Arc<dyn SessionResolver>,
    catalog: Arc<dyn ProductCatalog>,
    carts: Arc<dyn CartService>,
    system_config: Arc<dyn SystemConfig>,
    settings: LinkOrderSettings,
}

impl LinkOrderService {
    pub fn new(
        sessions: Arc<dyn SessionResolver>,
        catalog: Arc<dyn ProductCatalog>,
        carts: Arc<dyn CartService>,
        system_config: Arc<dyn SystemConfig>,
        settings: LinkOrderSettings,
    ) -> Self {
        Self {
            sessions,
            catalog,
            carts,
            system_config,
            settings,
        }
    }

    pub fn settings(&self) -> &LinkOrderSettings {
        &self.settings
    }

    /// Raw rule string as currently configured. A missing key or an
    /// unreachable config store both read as an empty rule set.
    pub async fn raw_rules(&self) -> String {
        match self.system_config.get_string(RULES_CONFIG_KEY).await {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                debug!(key = RULES_CONFIG_KEY, "Link order rules not configured");
                String::new()
            }
            Err(e) => {
                error!(key = RULES_CONFIG_KEY, "Failed to read link order rules: {}", e);
                String::new()
            }
        }
    }

    /// Decide the fate of a storefront request.
    ///
    /// Rules are read from the system config on every call. Only the first
    /// matching rule is attempted.
    pub async fn handle(&self, request: &StorefrontRequest) -> LinkOrderOutcome {
        if !request.is_candidate() {
            return LinkOrderOutcome::PassThrough;
        }

        let Some(code) = request.article.as_deref().filter(|a| !a.is_empty()) else {
            return LinkOrderOutcome::PassThrough;
        };

        let rules = parse_rules(&self.raw_rules().await);
        let Some(rule) = find_rule(&rules, code) else {
            debug!(code, rules = rules.len(), "No link order rule matches");
            return LinkOrderOutcome::PassThrough;
        };

        match self
            .add_to_cart(request.token.as_ref(), &rule.code, &rule.price, rule.shipping_flag)
            .await
        {
            Ok(line_item) => LinkOrderOutcome::Redirect {
                location: self.settings.redirect_target.clone(),
                line_item_id: line_item.id,
            },
            Err(e) => {
                error!(
                    code,
                    error_kind = e.kind(),
                    "Error adding article to basket: {}",
                    e.detail()
                );
                LinkOrderOutcome::Failed(e)
            }
        }
    }

    /// Add one unit of the product with number `code` to the cart of the
    /// shopper identified by `token`, priced at `price`.
    pub async fn add_to_cart(
        &self,
        token: Option<&ContextToken>,
        code: &str,
        price: &str,
        shipping_fee: bool,
    ) -> Result<LineItem, LinkOrderError> {
        let token = token.ok_or_else(|| LinkOrderError::context("no context token on request"))?;

        let context = self
            .sessions
            .resolve(token)
            .await
            .map_err(|e| LinkOrderError::ContextResolution {
                reason: "session resolver failed".to_string(),
                source: Some(e),
            })?
            .ok_or_else(|| LinkOrderError::context(format!("unknown context token {}", token)))?;

        let product = self
            .catalog
            .search_by_product_number(code, &context)
            .await
            .map_err(|e| LinkOrderError::ProductNotFound {
                order_number: code.to_string(),
                source: Some(e),
            })?
            .into_iter()
            .next()
            .ok_or_else(|| LinkOrderError::product_not_found(code))?;

        let line = CartLineRequest::new(&product.product_number, price, shipping_fee)?;

        let mut cart = self
            .carts
            .get_cart(token, &context)
            .await
            .map_err(|e| LinkOrderError::CartCommit {
                reason: "could not load cart".to_string(),
                source: Some(e),
            })?;

        let mut line_item = LineItem::product(&product.id)
            .with_label(&product.name)
            .with_price_definition(PriceDefinition {
                unit_price: line.unit_price,
                currency_id: context.currency_id.clone(),
                tax_state: context.tax_state,
            });
        line_item.set_payload_value(SHIPPING_FEE_PAYLOAD_KEY, line.add_shipping_fee);

        cart.add(line_item.clone());

        let updated = self
            .carts
            .update(token, cart, &context)
            .await
            .map_err(|e| LinkOrderError::CartCommit {
                reason: "cart update failed".to_string(),
                source: Some(e),
            })?;

        if !updated.has(&line_item.id) {
            return Err(LinkOrderError::cart_commit(format!(
                "line item {} missing after update",
                line_item.id
            )));
        }

        info!(
            code,
            line_item_id = %line_item.id,
            price = %line.unit_price,
            shipping_fee = line.add_shipping_fee,
            "Successfully added article with order number {} to the cart",
            code
        );

        Ok(line_item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use rust_decimal::Decimal;
    use serde_json::Value;

    use crate::domain::{Cart, PlatformError, PlatformResult, SalesChannelContext};
    use crate::infrastructure::memory::{
        InMemoryCarts, InMemoryCatalog, InMemorySessions, InMemorySystemConfig,
    };

    const RULES: &str = "ABC=19.99=true;XYZ=5,00=false;ZERO=0=true;NEG=-3=false";

    struct Fixture {
        service: LinkOrderService,
        sessions: Arc<InMemorySessions>,
        carts: Arc<InMemoryCarts>,
        config: Arc<InMemorySystemConfig>,
    }

    fn fixture_with_carts(carts: Arc<dyn CartService>, mem_carts: Arc<InMemoryCarts>) -> Fixture {
        let sessions = Arc::new(InMemorySessions::new(Default::default()));
        let catalog = Arc::new(InMemoryCatalog::new());
        catalog.insert("XYZ", "Espresso Beans");
        catalog.insert("ZERO", "Free Sample");
        catalog.insert("NEG", "Refund");
        let config = Arc::new(InMemorySystemConfig::new());
        config.insert(RULES_CONFIG_KEY, RULES);

        let service = LinkOrderService::new(
            sessions.clone(),
            catalog,
            carts,
            config.clone(),
            LinkOrderSettings::default(),
        );
        Fixture {
            service,
            sessions,
            carts: mem_carts,
            config,
        }
    }

    fn fixture() -> Fixture {
        let carts = Arc::new(InMemoryCarts::new());
        fixture_with_carts(carts.clone(), carts)
    }

    async fn request(f: &Fixture, article: &str) -> StorefrontRequest {
        let context = f.sessions.open().await.unwrap();
        StorefrontRequest {
            method: "GET".into(),
            path: "/".into(),
            xhr: false,
            article: Some(article.into()),
            token: Some(context.token),
        }
    }

    #[tokio::test]
    async fn matched_rule_adds_line_and_redirects() {
        let f = fixture();
        let req = request(&f, "XYZ").await;

        let (location, line_item_id) = match f.service.handle(&req).await {
            LinkOrderOutcome::Redirect { location, line_item_id } => (location, line_item_id),
            other => panic!("expected redirect, got {:?}", other),
        };
        assert_eq!(location, "/checkout/cart");

        let cart = f.carts.snapshot(req.token.as_ref().unwrap()).unwrap();
        let item = cart.get(&line_item_id).unwrap();
        assert_eq!(item.label, "Espresso Beans");
        assert_eq!(item.quantity, 1);
        let price = item.price_definition.as_ref().unwrap();
        assert_eq!(price.unit_price, Decimal::new(500, 2));
        assert_eq!(item.payload_value(SHIPPING_FEE_PAYLOAD_KEY), Some(&Value::Bool(false)));
    }

    #[tokio::test]
    async fn missing_product_fails_without_redirect() {
        let f = fixture();
        let req = request(&f, "ABC").await;

        match f.service.handle(&req).await {
            LinkOrderOutcome::Failed(e) => assert_eq!(e.kind(), "product_not_found"),
            other => panic!("expected failure, got {:?}", other),
        }
        assert!(f.carts.snapshot(req.token.as_ref().unwrap()).is_none());
    }

    #[tokio::test]
    async fn zero_and_negative_prices_are_rejected() {
        let f = fixture();
        for code in ["ZERO", "NEG"] {
            let req = request(&f, code).await;
            match f.service.handle(&req).await {
                LinkOrderOutcome::Failed(e) => assert_eq!(e.kind(), "invalid_price"),
                other => panic!("expected failure for {code}, got {:?}", other),
            }
        }
    }

    #[tokio::test]
    async fn non_candidates_and_unknown_codes_pass_through() {
        let f = fixture();

        let mut req = request(&f, "XYZ").await;
        req.path = "/account".into();
        assert!(matches!(f.service.handle(&req).await, LinkOrderOutcome::PassThrough));

        let mut req = request(&f, "XYZ").await;
        req.xhr = true;
        assert!(matches!(f.service.handle(&req).await, LinkOrderOutcome::PassThrough));

        for method in ["POST", "PUT", "DELETE"] {
            let mut req = request(&f, "XYZ").await;
            req.method = method.into();
            assert!(matches!(f.service.handle(&req).await, LinkOrderOutcome::PassThrough));
        }
        assert!(f.carts.is_empty());

        let mut req = request(&f, "XYZ").await;
        req.article = None;
        assert!(matches!(f.service.handle(&req).await, LinkOrderOutcome::PassThrough));

        let req = request(&f, "").await;
        assert!(matches!(f.service.handle(&req).await, LinkOrderOutcome::PassThrough));

        let req = request(&f, "NOPE").await;
        assert!(matches!(f.service.handle(&req).await, LinkOrderOutcome::PassThrough));
    }

    #[tokio::test]
    async fn missing_or_unknown_token_is_a_context_error() {
        let f = fixture();

        let mut req = request(&f, "XYZ").await;
        req.token = None;
        match f.service.handle(&req).await {
            LinkOrderOutcome::Failed(e) => assert_eq!(e.kind(), "context_resolution"),
            other => panic!("expected failure, got {:?}", other),
        }

        req.token = Some(ContextToken::new("forged"));
        match f.service.handle(&req).await {
            LinkOrderOutcome::Failed(e) => assert_eq!(e.kind(), "context_resolution"),
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn repeated_requests_add_duplicate_lines() {
        let f = fixture();
        let req = request(&f, "XYZ").await;
        f.service.handle(&req).await;
        f.service.handle(&req).await;

        let cart = f.carts.snapshot(req.token.as_ref().unwrap()).unwrap();
        assert_eq!(cart.len(), 2);
        assert_eq!(cart.subtotal(), Decimal::new(1000, 2));
    }

    #[tokio::test]
    async fn rules_are_reloaded_on_every_request() {
        let f = fixture();
        let req = request(&f, "XYZ").await;

        f.config.insert(RULES_CONFIG_KEY, "ABC=1=true");
        assert!(matches!(f.service.handle(&req).await, LinkOrderOutcome::PassThrough));

        f.config.insert(RULES_CONFIG_KEY, "XYZ=2=true");
        assert!(matches!(f.service.handle(&req).await, LinkOrderOutcome::Redirect { .. }));
    }

    #[tokio::test]
    async fn unconfigured_rules_pass_through() {
        let f = fixture();
        f.config.remove(RULES_CONFIG_KEY);
        let req = request(&f, "XYZ").await;
        assert!(matches!(f.service.handle(&req).await, LinkOrderOutcome::PassThrough));
    }

    /// Cart service that accepts updates but never keeps the new line
    struct DroppingCarts;

    #[async_trait]
    impl CartService for DroppingCarts {
        async fn get_cart(
            &self,
            token: &ContextToken,
            _context: &SalesChannelContext,
        ) -> PlatformResult<Cart> {
            Ok(Cart::new(token.as_str()))
        }

        async fn update(
            &self,
            token: &ContextToken,
            _cart: Cart,
            _context: &SalesChannelContext,
        ) -> PlatformResult<Cart> {
            Ok(Cart::new(token.as_str()))
        }
    }

    struct OfflineCarts;

    #[async_trait]
    impl CartService for OfflineCarts {
        async fn get_cart(
            &self,
            _token: &ContextToken,
            _context: &SalesChannelContext,
        ) -> PlatformResult<Cart> {
            Err(PlatformError::Unavailable("cart store offline".into()))
        }

        async fn update(
            &self,
            _token: &ContextToken,
            _cart: Cart,
            _context: &SalesChannelContext,
        ) -> PlatformResult<Cart> {
            Err(PlatformError::Unavailable("cart store offline".into()))
        }
    }

    #[tokio::test]
    async fn dropped_line_item_is_a_commit_error() {
        let f = fixture_with_carts(Arc::new(DroppingCarts), Arc::new(InMemoryCarts::new()));
        let req = request(&f, "XYZ").await;
        match f.service.handle(&req).await {
            LinkOrderOutcome::Failed(e) => assert_eq!(e.kind(), "cart_commit"),
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn cart_service_failure_is_a_commit_error() {
        let f = fixture_with_carts(Arc::new(OfflineCarts), Arc::new(InMemoryCarts::new()));
        let req = request(&f, "XYZ").await;
        match f.service.handle(&req).await {
            LinkOrderOutcome::Failed(e) => {
                assert_eq!(e.kind(), "cart_commit");
                assert!(e.detail().contains("cart store offline"));
            }
            other => panic!("expected failure, got {:?}", other),
        }
    }
}
