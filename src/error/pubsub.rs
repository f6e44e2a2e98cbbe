use thiserror::Error;
use tokio::sync::mpsc;

use crate::pubsub::{EndpointId, Topic};

/// Ошибки операций реестра топиков, которые возвращаются вызывающему.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BusError {
    #[error("unknown topic '{0}'")]
    UnknownTopic(Topic),

    #[error("endpoint {endpoint} is not subscribed to topic '{topic}'")]
    UnknownEndpoint { topic: Topic, endpoint: EndpointId },
}

/// Ошибка членства в наборе подписок одного топика.
///
/// Сигнализирует об ошибке вызывающего кода: двойная отписка или
/// отписка endpoint'а, который никогда не был подписан.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MembershipError {
    #[error("attempting to remove unknown subscriber {0}")]
    NotAMember(EndpointId),
}

/// Ошибка при получении событий из endpoint'а.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecvError {
    #[error("endpoint is closed")]
    Closed,

    #[error("operation exceeded the specified timeout")]
    Timeout,
}

/// Ошибка при неблокирующем получении событий.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TryRecvError {
    #[error("no events available")]
    Empty,

    #[error("endpoint is closed")]
    Closed,
}

// === Преобразования ===

impl MembershipError {
    /// Переводит ошибку членства в ошибку реестра для заданного топика.
    pub fn into_bus_error(
        self,
        topic: Topic,
    ) -> BusError {
        match self {
            MembershipError::NotAMember(endpoint) => BusError::UnknownEndpoint { topic, endpoint },
        }
    }
}

impl From<mpsc::error::TryRecvError> for TryRecvError {
    fn from(err: mpsc::error::TryRecvError) -> Self {
        match err {
            mpsc::error::TryRecvError::Empty => TryRecvError::Empty,
            mpsc::error::TryRecvError::Disconnected => TryRecvError::Closed,
        }
    }
}
