pub mod analytics;
pub mod broadcast;
pub mod classify;
pub mod config;
pub mod engine;
pub mod error;
pub mod event;
pub mod session;
pub mod store;

pub use broadcast::{BroadcastHub, HubConfig, SubscriberHandle, SubscriberState, Subscription};
pub use engine::AnalyticsEngine;
pub use error::{AnalyticsError, AnalyticsResult};
pub use store::EventStore;
