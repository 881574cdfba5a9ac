//! Ports Layer - Hexagonal Architecture Boundaries
//!
//! Defines the interfaces (traits) between the feed use cases and the
//! outside world. Adapters implement the outbound side; chart views
//! consume the inbound side.
//!
//! Port categories:
//! - `MarketDataProvider`: outbound streaming provider (connection + chart sessions)
//! - `PriceFeed`: inbound subscribe/unsubscribe/snapshot interface

pub mod price_feed;
pub mod provider;

pub use price_feed::{FeedUpdate, PriceFeed, Snapshot, SubscriptionKey, UpdateCallback};
pub use provider::{ChartSession, MarketDataProvider, SessionId};
