pub mod pubsub;

pub use config::ConfigError;
pub use pubsub::{BusError, MembershipError, RecvError, TryRecvError};

/// Результат операций реестра топиков.
pub type BusResult<T> = Result<T, BusError>;
