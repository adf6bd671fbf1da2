//! Shopper context handed out by the platform

use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque token identifying a shopper session and its cart
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContextToken(pub String);

impl ContextToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContextToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Whether prices are stored with or without tax
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaxState {
    #[default]
    Gross,
    Net,
    TaxFree,
}

impl fmt::Display for TaxState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Gross => write!(f, "gross"),
            Self::Net => write!(f, "net"),
            Self::TaxFree => write!(f, "tax-free"),
        }
    }
}

/// Sales channel context: the session, currency, language and tax state
/// needed to price and persist a cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SalesChannelContext {
    pub token: ContextToken,
    pub sales_channel_id: String,
    pub language_id: String,
    pub currency_id: String,
    pub tax_state: TaxState,
}
