//! Cross-cutting services module
//!
//! Round lifecycle events and the metrics fed from them.

pub mod events;
pub mod metrics;

// Re-export commonly used types
pub use events::{
    EventDispatcher, EventHandler, LoggingHandler, MetricsHandler, RoundEvent,
    RoundFinishedEvent, RoundStartedEvent, RoundTimedOutEvent, RunHaltedEvent,
};
pub use metrics::{MetricsSnapshot, RoundMetrics, StrategyStats};
