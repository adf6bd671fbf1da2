//! Infrastructure layer - platform adapters

pub mod memory;

pub use memory::{
    InMemoryCarts, InMemoryCatalog, InMemoryPlatform, InMemorySessions, InMemorySystemConfig,
    SalesChannelDefaults,
};
