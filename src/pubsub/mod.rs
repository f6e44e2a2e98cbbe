//! Подсистема Publish–Subscribe (pub/sub).
//!
//! Внутрипроцессная шина событий с веерной доставкой:
//!
//! - `bus`: реестр топиков, точки входа subscribe/unsubscribe/publish.
//! - `subscription_set`: набор endpoint'ов одного топика, параллельная
//!   доставка и удаление endpoint'ов, закрытых потребителем.
//! - `endpoint`: однослотовая очередь доставки для одного потребителя.
//! - `topic`: имя топика.
//! - `metrics`: счётчики шины и отчёт о публикации.

pub mod bus;
pub mod endpoint;
pub mod metrics;
pub mod subscription_set;
pub mod topic;

pub use bus::*;
pub use endpoint::{Endpoint, EndpointId, ENDPOINT_CAPACITY};
pub use metrics::*;
pub use subscription_set::*;
pub use topic::*;
