use std::sync::atomic::{AtomicU64, Ordering};

/// Глобальные счётчики шины.
///
/// Обновляются с `Ordering::Relaxed`: это статистика, а не
/// синхронизация.
#[derive(Debug, Default)]
pub struct BusMetrics {
    /// Количество вызовов `publish`, дошедших до набора подписок
    pub published: AtomicU64,
    /// Количество успешных доставок в endpoint'ы
    pub delivered: AtomicU64,
    /// Количество endpoint'ов, удалённых самовосстановлением (каждый
    /// учитывается один раз)
    pub pruned: AtomicU64,
    /// Количество доставок, не уложившихся в дедлайн
    pub timed_out: AtomicU64,
    /// Количество публикаций в топик без подписчиков
    pub dropped_publishes: AtomicU64,
}

/// Копия счётчиков на момент вызова.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub published: u64,
    pub delivered: u64,
    pub pruned: u64,
    pub timed_out: u64,
    pub dropped_publishes: u64,
}

/// Итог одного вызова `publish`.
///
/// Не является ошибкой: мёртвые endpoint'ы и просроченные доставки
/// обрабатываются внутри шины, отчёт лишь сообщает, что произошло.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishReport {
    pub delivered: usize,
    pub pruned: usize,
    pub timed_out: usize,
}

impl BusMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_publish(
        &self,
        report: &PublishReport,
    ) {
        self.published.fetch_add(1, Ordering::Relaxed);
        self.delivered
            .fetch_add(report.delivered as u64, Ordering::Relaxed);
        self.pruned.fetch_add(report.pruned as u64, Ordering::Relaxed);
        self.timed_out
            .fetch_add(report.timed_out as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_dropped_publish(&self) {
        self.dropped_publishes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            published: self.published.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            pruned: self.pruned.load(Ordering::Relaxed),
            timed_out: self.timed_out.load(Ordering::Relaxed),
            dropped_publishes: self.dropped_publishes.load(Ordering::Relaxed),
        }
    }
}

impl PublishReport {
    /// Число endpoint'ов с итогом доставки. Закрытые endpoint'ы, которые
    /// удалил кто-то другой (параллельная публикация или отписка), не
    /// учитываются.
    pub fn attempted(&self) -> usize {
        self.delivered + self.pruned + self.timed_out
    }
}
