//! Catalog product record

use serde::Serialize;

/// Product as returned by the catalog search
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Product {
    pub id: String,
    /// Stock-keeping unit the link rules refer to
    pub product_number: String,
    pub name: String,
}
