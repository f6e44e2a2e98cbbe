use std::{path::Path, time::Duration};

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

/// Префикс переменных окружения, например `TOPICBUS_DELIVERY_TIMEOUT_MS`.
pub const ENV_PREFIX: &str = "TOPICBUS";

/// Настройки шины событий.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusConfig {
    /// Дедлайн одной доставки в миллисекундах. `None` — доставка ждёт,
    /// пока потребитель не освободит очередь или не закроет endpoint.
    #[serde(default)]
    pub delivery_timeout_ms: Option<u64>,
    /// Удалять топик сразу, когда самовосстановление опустошило его набор.
    #[serde(default = "default_prune_empty_topics")]
    pub prune_empty_topics: bool,
}

fn default_prune_empty_topics() -> bool {
    true
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            delivery_timeout_ms: None,
            prune_empty_topics: default_prune_empty_topics(),
        }
    }
}

impl BusConfig {
    /// Загружает настройки из переменных окружения с префиксом `TOPICBUS_`.
    pub fn load() -> Result<Self, ConfigError> {
        Self::build(None)
    }

    /// Загружает настройки из файла (формат по расширению), переменные
    /// окружения имеют приоритет над файлом.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::build(Some(path.as_ref()))
    }

    fn build(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder()
            // Значения по умолчанию
            .set_default("prune_empty_topics", default_prune_empty_topics())?;

        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }

        let cfg = builder
            .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?;

        let settings: Self = cfg.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.delivery_timeout_ms == Some(0) {
            return Err(ConfigError::Message(
                "delivery_timeout_ms must be greater than zero".into(),
            ));
        }
        Ok(())
    }

    pub fn delivery_timeout(&self) -> Option<Duration> {
        self.delivery_timeout_ms.map(Duration::from_millis)
    }

    /// Возвращает копию с заданным дедлайном доставки.
    ///
    /// Дедлайн округляется вверх до целых миллисекунд, минимум 1 мс.
    pub fn with_delivery_timeout(
        mut self,
        timeout: Duration,
    ) -> Self {
        let millis = timeout.as_nanos().div_ceil(1_000_000).max(1);
        self.delivery_timeout_ms = Some(u64::try_from(millis).unwrap_or(u64::MAX));
        self
    }
}
