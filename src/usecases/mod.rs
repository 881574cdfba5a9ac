//! Use Cases Layer - Feed Orchestration
//!
//! Orchestrates domain logic with the provider port to implement the
//! feed's workflows.
//!
//! Use cases:
//! - `ConnectionManager`: single provider connection, coalesced connects
//! - `SubscriptionRegistry`: keyed chart sessions and update delivery
//! - `MarketDataFeed`: facade implementing the `PriceFeed` port

pub mod connection_manager;
pub mod market_data_feed;
pub mod subscription_registry;

pub use connection_manager::{ConnectionManager, ConnectionState};
pub use market_data_feed::{FeedOptions, MarketDataFeed};
pub use subscription_registry::SubscriptionRegistry;
