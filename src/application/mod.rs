//! Application layer - use cases on top of the platform ports

pub mod link_order;

// Re-export key types for convenience
pub use link_order::{
    LinkOrderOutcome, LinkOrderService, LinkOrderSettings, StorefrontRequest,
    DEFAULT_QUERY_PARAMETER, DEFAULT_REDIRECT_TARGET, RULES_CONFIG_KEY,
};
