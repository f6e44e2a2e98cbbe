use std::{env, fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use super::LoggingError;

const LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Формат вывода логов.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Pretty,
    #[default]
    Compact,
}

/// Настройки логирования.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Уровень для крейта `topicbus` и всех остальных целей
    pub level: String,
    pub format: LogFormat,
    pub with_ansi: bool,
    pub with_target: bool,
    pub with_thread_ids: bool,
    pub with_line_numbers: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
            with_ansi: true,
            with_target: true,
            with_thread_ids: false,
            with_line_numbers: false,
        }
    }
}

impl LoggingConfig {
    /// Директива для `EnvFilter`, например `"topicbus=debug,warn"`.
    ///
    /// Остальные крейты логируются не подробнее `warn`, если уровень
    /// крейта ниже.
    pub fn build_filter_directive(&self) -> String {
        let level = self.level.to_ascii_lowercase();
        match level.as_str() {
            "trace" | "debug" | "info" => format!("topicbus={level},warn"),
            _ => level,
        }
    }

    /// Переопределения из окружения: `TOPICBUS_LOG_LEVEL`, `TOPICBUS_LOG_FORMAT`.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(level) = env::var("TOPICBUS_LOG_LEVEL") {
            self.level = level;
        }
        if let Ok(format) = env::var("TOPICBUS_LOG_FORMAT") {
            match format.parse() {
                Ok(format) => self.format = format,
                Err(e) => eprintln!("Ignoring TOPICBUS_LOG_FORMAT: {e}"),
            }
        }
    }

    pub fn validate(&self) -> Result<(), LoggingError> {
        let level = self.level.to_ascii_lowercase();
        if !LEVELS.contains(&level.as_str()) {
            return Err(LoggingError::InvalidLevel(self.level.clone()));
        }
        Ok(())
    }
}

impl FromStr for LogFormat {
    type Err = LoggingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(LogFormat::Json),
            "pretty" => Ok(LogFormat::Pretty),
            "compact" => Ok(LogFormat::Compact),
            _ => Err(LoggingError::InvalidFormat(s.to_string())),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        let s = match self {
            LogFormat::Json => "json",
            LogFormat::Pretty => "pretty",
            LogFormat::Compact => "compact",
        };
        f.write_str(s)
    }
}
