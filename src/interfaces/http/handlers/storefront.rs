//! Storefront pages served by the reference host
//!
//! The home page is what the link-order middleware intercepts; the cart page
//! is the redirect target.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    Extension, Json,
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::domain::{Cart, CartService, ContextToken, SessionResolver, SHIPPING_FEE_PAYLOAD_KEY};
use crate::interfaces::http::common::ApiResponse;

#[derive(Clone)]
pub struct StorefrontState {
    pub shop_name: String,
    pub sessions: Arc<dyn SessionResolver>,
    pub carts: Arc<dyn CartService>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LineItemView {
    pub id: String,
    pub product_id: String,
    pub label: String,
    pub quantity: u32,
    /// Decimal string, absent when the platform prices the line
    pub unit_price: Option<String>,
    pub shipping_fee: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CartView {
    pub token: String,
    pub currency_id: Option<String>,
    pub line_items: Vec<LineItemView>,
    pub subtotal: String,
}

impl CartView {
    fn from_cart(cart: &Cart, currency_id: Option<String>) -> Self {
        Self {
            token: cart.token.clone(),
            currency_id,
            line_items: cart
                .line_items
                .iter()
                .map(|item| LineItemView {
                    id: item.id.clone(),
                    product_id: item.reference_id.clone(),
                    label: item.label.clone(),
                    quantity: item.quantity,
                    unit_price: item
                        .price_definition
                        .as_ref()
                        .map(|p| p.unit_price.to_string()),
                    shipping_fee: item
                        .payload_value(SHIPPING_FEE_PAYLOAD_KEY)
                        .and_then(|v| v.as_bool())
                        .unwrap_or(false),
                })
                .collect(),
            subtotal: cart.subtotal().to_string(),
        }
    }
}

fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}

fn page(title: &str, body: &str) -> Html<String> {
    Html(format!(
        "<!DOCTYPE html>\n<html><head><meta charset=\"utf-8\"><title>{}</title></head>\
         <body>{}</body></html>",
        escape_html(title),
        body
    ))
}

/// Cart of the current visitor, if their context resolves
async fn load_cart(
    state: &StorefrontState,
    token: Option<&ContextToken>,
) -> Result<Option<CartView>, String> {
    let Some(token) = token else {
        return Ok(None);
    };
    let Some(context) = state.sessions.resolve(token).await.map_err(|e| e.to_string())? else {
        return Ok(None);
    };
    let cart = state
        .carts
        .get_cart(token, &context)
        .await
        .map_err(|e| e.to_string())?;
    Ok(Some(CartView::from_cart(&cart, Some(context.currency_id))))
}

/// `GET /`
pub async fn home(State(state): State<StorefrontState>) -> Html<String> {
    let name = escape_html(&state.shop_name);
    page(
        &state.shop_name,
        &format!("<h1>{}</h1><p><a href=\"/checkout/cart\">View cart</a></p>", name),
    )
}

/// `GET /checkout/cart`
pub async fn cart_page(
    State(state): State<StorefrontState>,
    token: Option<Extension<ContextToken>>,
) -> Response {
    let token = token.map(|Extension(t)| t);
    let cart = match load_cart(&state, token.as_ref()).await {
        Ok(cart) => cart,
        Err(e) => {
            tracing::error!("Failed to load cart: {}", e);
            return (StatusCode::SERVICE_UNAVAILABLE, page("Cart", "<p>Cart unavailable</p>"))
                .into_response();
        }
    };

    let body = match cart {
        Some(cart) if !cart.line_items.is_empty() => {
            let currency = cart.currency_id.clone().unwrap_or_default();
            let rows: String = cart
                .line_items
                .iter()
                .map(|item| {
                    format!(
                        "<tr><td>{}</td><td>{}</td><td>{} {}</td><td>{}</td></tr>",
                        escape_html(&item.label),
                        item.quantity,
                        item.unit_price.as_deref().unwrap_or("-"),
                        escape_html(&currency),
                        if item.shipping_fee { "yes" } else { "no" }
                    )
                })
                .collect();
            format!(
                "<h1>Cart</h1><table><tr><th>Product</th><th>Qty</th><th>Price</th>\
                 <th>Shipping fee</th></tr>{}</table><p>Subtotal: {} {}</p>",
                rows,
                cart.subtotal,
                escape_html(&currency)
            )
        }
        _ => "<h1>Cart</h1><p>Your cart is empty.</p>".to_string(),
    };

    page("Cart", &body).into_response()
}

#[utoipa::path(
    get,
    path = "/api/cart",
    tag = "Cart",
    params(
        ("sw-context-token" = Option<String>, Header, description = "Context token (cookie also accepted)")
    ),
    responses(
        (status = 200, description = "Cart of the current context", body = ApiResponse<CartView>),
        (status = 404, description = "No resolvable context"),
        (status = 503, description = "Platform unavailable")
    )
)]
pub async fn cart_json(
    State(state): State<StorefrontState>,
    token: Option<Extension<ContextToken>>,
) -> Response {
    let token = token.map(|Extension(t)| t);
    match load_cart(&state, token.as_ref()).await {
        Ok(Some(cart)) => Json(ApiResponse::success(cart)).into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::<()>::error("No sales channel context")),
        )
            .into_response(),
        Err(e) => (StatusCode::SERVICE_UNAVAILABLE, Json(ApiResponse::<()>::error(e))).into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_markup() {
        assert_eq!(
            escape_html("<b>\"Tom\" & 'Jerry'</b>"),
            "&lt;b&gt;&quot;Tom&quot; &amp; &#39;Jerry&#39;&lt;/b&gt;"
        );
    }
}
