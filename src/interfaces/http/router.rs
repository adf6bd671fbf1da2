//! Storefront router
//!
//! Layer order on the storefront routes (outermost first): trace, request id,
//! session, link order, handler. Admin, health and metrics routes skip the
//! session and link-order layers. Admin routes require `X-API-Key` and are
//! only mounted when an admin key is configured.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::FromRef,
    middleware,
    routing::get,
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::trace::TraceLayer;
use utoipa::openapi::security::{ApiKey, ApiKeyValue, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

use super::handlers::{admin, health, storefront};
use super::link_order::{link_order_middleware, LinkOrderState};
use super::metrics::{http_metrics_middleware, prometheus_metrics, MetricsState};
use super::middleware::{admin_auth_middleware, AdminAuthState, API_KEY_HEADER};
use super::request_id::request_id_middleware;
use super::session::{session_middleware, SessionState};
use crate::application::LinkOrderService;
use crate::domain::{CartService, SessionResolver, SystemConfig};

/// Everything the HTTP layer needs; handlers pick their slice via `FromRef`.
#[derive(Clone)]
pub struct AppState {
    pub link_order: Arc<LinkOrderService>,
    pub sessions: Arc<dyn SessionResolver>,
    pub carts: Arc<dyn CartService>,
    pub system_config: Arc<dyn SystemConfig>,
    pub shop_name: String,
    pub metrics: PrometheusHandle,
    pub started_at: Arc<Instant>,
    /// `None` leaves the admin routes unmounted
    pub admin_auth: Option<AdminAuthState>,
}

impl FromRef<AppState> for LinkOrderState {
    fn from_ref(s: &AppState) -> Self {
        LinkOrderState {
            service: Arc::clone(&s.link_order),
        }
    }
}

impl FromRef<AppState> for SessionState {
    fn from_ref(s: &AppState) -> Self {
        SessionState {
            sessions: Arc::clone(&s.sessions),
            query_parameter: s.link_order.settings().query_parameter.clone(),
        }
    }
}

impl FromRef<AppState> for storefront::StorefrontState {
    fn from_ref(s: &AppState) -> Self {
        storefront::StorefrontState {
            shop_name: s.shop_name.clone(),
            sessions: Arc::clone(&s.sessions),
            carts: Arc::clone(&s.carts),
        }
    }
}

impl FromRef<AppState> for admin::AdminState {
    fn from_ref(s: &AppState) -> Self {
        admin::AdminState {
            service: Arc::clone(&s.link_order),
            system_config: Arc::clone(&s.system_config),
        }
    }
}

impl FromRef<AppState> for health::HealthState {
    fn from_ref(s: &AppState) -> Self {
        health::HealthState {
            started_at: Arc::clone(&s.started_at),
        }
    }
}

impl FromRef<AppState> for MetricsState {
    fn from_ref(s: &AppState) -> Self {
        MetricsState {
            handle: s.metrics.clone(),
        }
    }
}

/// Security scheme modifier for OpenAPI
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "api_key",
                SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new(API_KEY_HEADER))),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        admin::get_rules,
        admin::update_rules,
        storefront::cart_json,
    ),
    components(schemas(
        health::HealthResponse,
        admin::RuleDto,
        admin::RulesView,
        admin::UpdateRulesRequest,
        storefront::CartView,
        storefront::LineItemView,
    )),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Service liveness"),
        (name = "Link order", description = "Order-by-link rule administration"),
        (name = "Cart", description = "Cart of the current shopper context")
    ),
    info(
        title = "Link Order",
        description = "Adds a configured product to the cart from a home-page link and redirects to checkout"
    )
)]
pub struct ApiDoc;

pub fn create_storefront_router(state: AppState) -> Router {
    let swagger = SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi());

    let mut router = Router::new()
        // Storefront
        .route("/", get(storefront::home))
        .route("/checkout/cart", get(storefront::cart_page))
        .route("/api/cart", get(storefront::cart_json))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            link_order_middleware,
        ))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            session_middleware,
        ));

    // Admin
    if let Some(auth) = state.admin_auth.clone() {
        router = router.merge(
            Router::new()
                .route(
                    "/admin/link-order/rules",
                    get(admin::get_rules).put(admin::update_rules),
                )
                .route_layer(middleware::from_fn_with_state(auth, admin_auth_middleware)),
        );
    }

    router
        // Ops
        .route("/health", get(health::health_check))
        .route("/metrics", get(prometheus_metrics))
        .route_layer(middleware::from_fn(http_metrics_middleware))
        .with_state(state)
        .merge(swagger)
        .layer(middleware::from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http())
}
