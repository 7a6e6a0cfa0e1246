//! Event bus and request latency tracking shared across the indexer
//! engine.

pub mod error;
pub mod event_bus;
pub mod request_tracker;

pub use error::{EventError, Result};
pub use event_bus::{EmitOptions, Event, EventBus, HandlerFn, HandlerFuture, SubscribeOptions, SubscriptionId};
pub use request_tracker::{RequestContext, RequestMetrics, RequestTracker, ToolMetrics, DEFAULT_MAX_HISTORY};
