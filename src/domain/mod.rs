pub mod cart;
pub mod context;
pub mod error;
pub mod ports;
pub mod product;
pub mod rule;

// Re-export commonly used types
pub use cart::{Cart, LineItem, LineItemType, PriceDefinition, SHIPPING_FEE_PAYLOAD_KEY};
pub use context::{ContextToken, SalesChannelContext, TaxState};
pub use error::{LinkOrderError, PlatformError, PlatformResult};
pub use ports::{CartService, ProductCatalog, SessionResolver, SystemConfig};
pub use product::Product;
pub use rule::{
    find_rule, parse_price, parse_rules, parse_shipping_flag, CartLineRequest, OrderRule,
    ENTRY_SEPARATOR, FIELD_SEPARATOR,
};
