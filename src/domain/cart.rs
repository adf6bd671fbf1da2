//! Cart and line item records

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::{Map, Value};
use uuid::Uuid;

use super::context::TaxState;

/// Payload key recording whether a shipping fee applies to the line
pub const SHIPPING_FEE_PAYLOAD_KEY: &str = "shippingfee";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LineItemType {
    Product,
}

/// Explicit price that overrides the catalog price
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PriceDefinition {
    pub unit_price: Decimal,
    pub currency_id: String,
    pub tax_state: TaxState,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineItem {
    pub id: String,
    /// Product id the line refers to
    pub reference_id: String,
    pub item_type: LineItemType,
    pub label: String,
    pub quantity: u32,
    pub price_definition: Option<PriceDefinition>,
    pub payload: Map<String, Value>,
}

impl LineItem {
    /// New product line with a fresh id and quantity 1.
    pub fn product(product_id: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            reference_id: product_id.into(),
            item_type: LineItemType::Product,
            label: String::new(),
            quantity: 1,
            price_definition: None,
            payload: Map::new(),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_price_definition(mut self, definition: PriceDefinition) -> Self {
        self.price_definition = Some(definition);
        self
    }

    pub fn set_payload_value(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.payload.insert(key.into(), value.into());
    }

    pub fn payload_value(&self, key: &str) -> Option<&Value> {
        self.payload.get(key)
    }

    /// Unit price times quantity, when an explicit price is set
    pub fn total_price(&self) -> Option<Decimal> {
        self.price_definition
            .as_ref()
            .map(|p| p.unit_price * Decimal::from(self.quantity))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Cart {
    pub token: String,
    pub line_items: Vec<LineItem>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Cart {
    pub fn new(token: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            token: token.into(),
            line_items: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn add(&mut self, item: LineItem) {
        self.line_items.push(item);
    }

    pub fn has(&self, line_item_id: &str) -> bool {
        self.get(line_item_id).is_some()
    }

    pub fn get(&self, line_item_id: &str) -> Option<&LineItem> {
        self.line_items.iter().find(|item| item.id == line_item_id)
    }

    pub fn len(&self) -> usize {
        self.line_items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.line_items.is_empty()
    }

    /// Sum of all explicitly priced lines (display only)
    pub fn subtotal(&self) -> Decimal {
        self.line_items
            .iter()
            .filter_map(LineItem::total_price)
            .sum()
    }
}
