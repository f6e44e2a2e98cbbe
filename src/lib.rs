/// Bus settings loading.
pub mod config;
/// Common error types: registry, membership, receiving.
pub mod error;
/// Flexible logging (formatting, filters).
pub mod logging;
/// Pub/Sub: EventBus, SubscriptionSet, Endpoint, Topic.
pub mod pubsub;

// -----------------------------------------------------------------------------
//  Frequently used public types
// -----------------------------------------------------------------------------

/// config
pub use crate::config::BusConfig;
/// Operation errors and result types.
pub use error::{BusError, BusResult, ConfigError, MembershipError, RecvError, TryRecvError};
/// Logging setup.
pub use logging::{init_logging, LogFormat, LoggingConfig, LoggingError};
/// Pub/Sub API.
pub use pubsub::{
    DeliveryOutcome, Endpoint, EndpointId, EventBus, MetricsSnapshot, PublishReport,
    SubscriptionSet, Topic,
};
