//! Domain errors

use thiserror::Error;

/// Failure reported by an external platform collaborator
/// (session resolver, catalog, cart service, system config).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PlatformError {
    /// The collaborator could not be reached or is not ready
    #[error("Platform service unavailable: {0}")]
    Unavailable(String),

    /// The collaborator refused the operation
    #[error("Platform service rejected the request: {0}")]
    Rejected(String),
}

/// Result type for platform port calls
pub type PlatformResult<T> = Result<T, PlatformError>;

/// Reasons an order-by-link attempt can fail.
///
/// Every variant is terminal for the current request.
#[derive(Debug, Error)]
pub enum LinkOrderError {
    #[error("Sales channel context not found: {reason}")]
    ContextResolution {
        reason: String,
        #[source]
        source: Option<PlatformError>,
    },

    #[error("Product not found with order number {order_number}")]
    ProductNotFound {
        order_number: String,
        #[source]
        source: Option<PlatformError>,
    },

    #[error("Invalid price: {raw}")]
    InvalidPrice { raw: String },

    #[error("Failed to add line item to the cart: {reason}")]
    CartCommit {
        reason: String,
        #[source]
        source: Option<PlatformError>,
    },
}

impl LinkOrderError {
    pub fn context(reason: impl Into<String>) -> Self {
        Self::ContextResolution {
            reason: reason.into(),
            source: None,
        }
    }

    pub fn product_not_found(order_number: impl Into<String>) -> Self {
        Self::ProductNotFound {
            order_number: order_number.into(),
            source: None,
        }
    }

    pub fn invalid_price(raw: impl Into<String>) -> Self {
        Self::InvalidPrice { raw: raw.into() }
    }

    pub fn cart_commit(reason: impl Into<String>) -> Self {
        Self::CartCommit {
            reason: reason.into(),
            source: None,
        }
    }

    /// Stable label used in log fields and metric labels
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ContextResolution { .. } => "context_resolution",
            Self::ProductNotFound { .. } => "product_not_found",
            Self::InvalidPrice { .. } => "invalid_price",
            Self::CartCommit { .. } => "cart_commit",
        }
    }

    /// No failure is retried; the next request starts over.
    pub fn is_retryable(&self) -> bool {
        false
    }

    /// Message plus the chain of underlying causes, for logging
    pub fn detail(&self) -> String {
        let mut detail = self.to_string();
        let mut source = std::error::Error::source(self);
        while let Some(cause) = source {
            detail.push_str(": ");
            detail.push_str(&cause.to_string());
            source = cause.source();
        }
        detail
    }
}
