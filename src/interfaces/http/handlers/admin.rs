//! Link-order rule administration
//!
//! Reads and replaces the `code=price=shippingFlag;...` setting. Changes are
//! visible to the very next storefront request. Mounted behind the admin
//! API-key middleware.

use std::borrow::Cow;
use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info};
use utoipa::ToSchema;
use validator::{Validate, ValidationError};

use crate::application::{LinkOrderService, RULES_CONFIG_KEY};
use crate::domain::{parse_price, parse_rules, OrderRule, SystemConfig, ENTRY_SEPARATOR, FIELD_SEPARATOR};
use crate::interfaces::http::common::{ApiResponse, ValidatedJson};

#[derive(Clone)]
pub struct AdminState {
    pub service: Arc<LinkOrderService>,
    pub system_config: Arc<dyn SystemConfig>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RuleDto {
    pub code: String,
    pub price: String,
    pub shipping_flag: bool,
}

impl From<OrderRule> for RuleDto {
    fn from(rule: OrderRule) -> Self {
        Self {
            code: rule.code,
            price: rule.price,
            shipping_flag: rule.shipping_flag,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RulesView {
    /// Setting as stored
    pub article_and_prices: String,
    /// Parsed rules in match order
    pub rules: Vec<RuleDto>,
}

impl RulesView {
    fn new(raw: String) -> Self {
        let rules = parse_rules(&raw).into_iter().map(RuleDto::from).collect();
        Self {
            article_and_prices: raw,
            rules,
        }
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateRulesRequest {
    /// `code=price=shippingFlag` entries separated by `;`
    #[validate(
        length(max = 65536, message = "is too long"),
        custom(function = "validate_rule_string")
    )]
    pub article_and_prices: String,
}

/// Every non-blank entry needs a code and a positive price.
fn validate_rule_string(raw: &str) -> Result<(), ValidationError> {
    for entry in raw.split(ENTRY_SEPARATOR).map(str::trim).filter(|e| !e.is_empty()) {
        let mut fields = entry.split(FIELD_SEPARATOR);
        let code = fields.next().unwrap_or_default().trim();
        if code.is_empty() {
            return Err(ValidationError::new("missing_code")
                .with_message(Cow::Owned(format!("entry {:?} has no order code", entry))));
        }
        let price = fields.next().unwrap_or_default();
        if parse_price(price).is_err() {
            return Err(ValidationError::new("invalid_price").with_message(Cow::Owned(
                format!("entry {:?} needs a positive price", entry),
            )));
        }
    }
    Ok(())
}

#[utoipa::path(
    get,
    path = "/admin/link-order/rules",
    tag = "Link order",
    security(("api_key" = [])),
    responses(
        (status = 200, description = "Configured rules", body = ApiResponse<RulesView>),
        (status = 401, description = "Missing or invalid API key")
    )
)]
pub async fn get_rules(State(state): State<AdminState>) -> Json<ApiResponse<RulesView>> {
    Json(ApiResponse::success(RulesView::new(state.service.raw_rules().await)))
}

#[utoipa::path(
    put,
    path = "/admin/link-order/rules",
    tag = "Link order",
    request_body = UpdateRulesRequest,
    security(("api_key" = [])),
    responses(
        (status = 200, description = "Rules replaced", body = ApiResponse<RulesView>),
        (status = 400, description = "Malformed JSON"),
        (status = 401, description = "Missing or invalid API key"),
        (status = 422, description = "Invalid rule string"),
        (status = 503, description = "Config store unavailable")
    )
)]
pub async fn update_rules(
    State(state): State<AdminState>,
    ValidatedJson(body): ValidatedJson<UpdateRulesRequest>,
) -> Response {
    let raw = body.article_and_prices.trim().to_string();
    if let Err(e) = state
        .system_config
        .set_string(RULES_CONFIG_KEY, raw.clone())
        .await
    {
        error!("Failed to store link order rules: {}", e);
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ApiResponse::<()>::error(e.to_string())),
        )
            .into_response();
    }

    let view = RulesView::new(raw);
    info!(rules = view.rules.len(), "Link order rules updated");
    Json(ApiResponse::success(view)).into_response()
}
