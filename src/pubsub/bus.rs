use std::{collections::HashMap, sync::Arc};

use parking_lot::RwLock;
use tracing::{debug, trace};

use super::{
    endpoint::endpoint, BusMetrics, Endpoint, MetricsSnapshot, PublishReport, SubscriptionSet,
    Topic,
};
use crate::{config::BusConfig, BusError, BusResult};

/// Реестр топиков: точка входа для подписки, отписки и публикации.
///
/// Поддерживает:
/// - Ленивое создание набора подписок при первой подписке на топик
/// - Удаление топика, когда в нём не осталось подписчиков
/// - Параллельную доставку события всем подписчикам топика
/// - Самовосстановление после endpoint'ов, закрытых потребителем
/// - Статистику публикаций и доставок
///
/// Шина не глобальна: создаётся явно и передаётся производителям и
/// потребителям (обычно через `Arc<EventBus<E>>`).
pub struct EventBus<E> {
    /// Топик → набор подписок. Запись существует, пока набор не пуст.
    topics: RwLock<HashMap<Topic, Arc<SubscriptionSet<E>>>>,
    config: BusConfig,
    metrics: BusMetrics,
}

impl<E> EventBus<E> {
    /// Создаёт шину с настройками по умолчанию.
    pub fn new() -> Self {
        Self::with_config(BusConfig::default())
    }

    pub fn with_config(config: BusConfig) -> Self {
        Self {
            topics: RwLock::new(HashMap::new()),
            config,
            metrics: BusMetrics::new(),
        }
    }

    pub fn config(&self) -> &BusConfig {
        &self.config
    }

    /// Подписка на топик.
    ///
    /// Создаёт новый открытый endpoint ёмкостью 1 и регистрирует его.
    /// Поиск и создание набора подписок выполняются под одной блокировкой
    /// записи, поэтому два одновременных первых подписчика не теряются.
    pub fn subscribe(
        &self,
        topic: impl Into<Topic>,
    ) -> Endpoint<E> {
        let topic = topic.into();
        let (id, tx, endpoint) = endpoint(topic.clone());

        let mut topics = self.topics.write();
        let set = topics.entry(topic.clone()).or_insert_with(|| {
            Arc::new(SubscriptionSet::new(
                topic.clone(),
                self.config.delivery_timeout(),
            ))
        });
        set.add(id, tx);
        let subscribers = set.len();
        drop(topics);

        debug!(topic = %topic, endpoint = %id, subscribers, "subscribed");
        endpoint
    }

    /// Отписка endpoint'а от топика.
    ///
    /// # Ошибки
    /// - `BusError::UnknownTopic` если у топика нет подписчиков
    /// - `BusError::UnknownEndpoint` если endpoint не подписан на этот топик
    ///   (в том числе повторная отписка); запись топика при этом не трогается
    ///
    /// Endpoint закрывается только после удаления из набора.
    pub fn unsubscribe(
        &self,
        topic: impl AsRef<str>,
        endpoint: &mut Endpoint<E>,
    ) -> BusResult<()> {
        let topic = topic.as_ref();
        let id = endpoint.id();

        let mut topics = self.topics.write();
        let set = topics
            .get(topic)
            .ok_or_else(|| BusError::UnknownTopic(Topic::from(topic)))?;
        set.remove(id)
            .map_err(|err| err.into_bus_error(set.topic().clone()))?;
        let remaining = set.len();
        if remaining == 0 {
            topics.remove(topic);
        }
        drop(topics);

        endpoint.close();
        debug!(topic, endpoint = %id, remaining, "unsubscribed");
        Ok(())
    }

    /// Количество подписчиков топика; 0 для неизвестного топика.
    pub fn subscriber_count(
        &self,
        topic: impl AsRef<str>,
    ) -> usize {
        self.topics
            .read()
            .get(topic.as_ref())
            .map_or(0, |set| set.len())
    }

    pub fn contains_topic(
        &self,
        topic: impl AsRef<str>,
    ) -> bool {
        self.topics.read().contains_key(topic.as_ref())
    }

    /// Список топиков, у которых есть подписчики.
    pub fn topics(&self) -> Vec<Topic> {
        self.topics.read().keys().cloned().collect()
    }

    pub fn topic_count(&self) -> usize {
        self.topics.read().len()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Удаляет запись топика, если набор опустел (самовосстановление
    /// текущей или ранее прерванной публикации).
    ///
    /// Запись удаляется, только если она всё ещё указывает на тот же набор:
    /// после отписки и новой подписки в реестре может быть уже другой.
    fn prune_topic_if_empty(
        &self,
        set: &Arc<SubscriptionSet<E>>,
    ) {
        let mut topics = self.topics.write();
        let stale = topics
            .get(set.topic())
            .is_some_and(|current| Arc::ptr_eq(current, set) && current.is_empty());
        if stale {
            topics.remove(set.topic());
            debug!(topic = %set.topic(), "topic removed after pruning closed endpoints");
        }
    }
}

impl<E> EventBus<E>
where
    E: Clone + Send + 'static,
{
    /// Публикация события в топик.
    ///
    /// Публикация в топик без подписчиков — штатная ситуация, а не ошибка:
    /// возвращается пустой отчёт. Иначе событие доставляется во все
    /// endpoint'ы, подписанные на момент вызова, и метод возвращается после
    /// завершения всех попыток доставки.
    ///
    /// Каждый подписчик получает свой клон события; для больших событий
    /// публикуйте `Arc<T>`.
    pub async fn publish(
        &self,
        topic: impl AsRef<str>,
        event: E,
    ) -> PublishReport {
        let set = self.topics.read().get(topic.as_ref()).cloned();
        let Some(set) = set else {
            self.metrics.record_dropped_publish();
            trace!(topic = topic.as_ref(), "publish to topic without subscribers");
            return PublishReport::default();
        };

        let report = set.publish(event).await;
        self.metrics.record_publish(&report);

        // Проверяем состояние набора, а не отчёт: набор мог опустеть при
        // прерванной ранее публикации.
        if self.config.prune_empty_topics && set.is_empty() {
            self.prune_topic_if_empty(&set);
        }
        report
    }
}

impl<E> Default for EventBus<E> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::future::Future;
    use std::time::Duration;

    use tokio::time::timeout;

    use super::*;

    /// Тест проверяет, что две подписки на один топик дают разные
    /// endpoint'ы, а разные топики — независимые наборы.
    #[test]
    fn test_subscribe_creates_sets() {
        let bus = EventBus::<u32>::new();
        let a = bus.subscribe("foo");
        let b = bus.subscribe("foo");
        let _c = bus.subscribe("bar");

        assert_ne!(a.id(), b.id());
        assert_eq!(bus.topic_count(), 2);
        assert_eq!(bus.subscriber_count("foo"), 2);
        assert_eq!(bus.subscriber_count("bar"), 1);
    }

    /// Тест проверяет, что отписка последнего подписчика удаляет топик.
    #[test]
    fn test_unsubscribe_last_removes_topic() {
        let bus = EventBus::<u32>::new();
        let mut ep = bus.subscribe("foo");
        assert!(bus.contains_topic("foo"));

        bus.unsubscribe("foo", &mut ep).unwrap();
        assert!(!bus.contains_topic("foo"));
        assert_eq!(bus.topic_count(), 0);
        assert_eq!(
            bus.unsubscribe("foo", &mut ep),
            Err(BusError::UnknownTopic(Topic::from("foo")))
        );
    }

    /// Тест проверяет, что повторная отписка даёт `UnknownEndpoint`
    /// и не удаляет топик с оставшимися подписчиками.
    #[test]
    fn test_double_unsubscribe_is_unknown_endpoint() {
        let bus = EventBus::<u32>::new();
        let mut a = bus.subscribe("foo");
        let _b = bus.subscribe("foo");

        bus.unsubscribe("foo", &mut a).unwrap();
        let err = bus.unsubscribe("foo", &mut a).unwrap_err();
        assert_eq!(
            err,
            BusError::UnknownEndpoint {
                topic: Topic::from("foo"),
                endpoint: a.id(),
            }
        );
        assert_eq!(bus.subscriber_count("foo"), 1);
    }

    /// Тест проверяет, что endpoint другого топика не отписывается
    /// от чужого топика.
    #[test]
    fn test_unsubscribe_wrong_topic() {
        let bus = EventBus::<u32>::new();
        let mut foo = bus.subscribe("foo");
        let _bar = bus.subscribe("bar");

        assert!(matches!(
            bus.unsubscribe("bar", &mut foo),
            Err(BusError::UnknownEndpoint { .. })
        ));
        assert_eq!(bus.subscriber_count("foo"), 1);
        assert_eq!(bus.subscriber_count("bar"), 1);
    }

    /// Тест проверяет, что после отписки endpoint закрыт.
    #[tokio::test]
    async fn test_unsubscribe_closes_endpoint() {
        let bus = EventBus::<u32>::new();
        let mut ep = bus.subscribe("foo");
        bus.unsubscribe("foo", &mut ep).unwrap();
        assert_eq!(ep.recv().await, Err(crate::RecvError::Closed));
    }

    /// Тест проверяет, что публикация без подписчиков ничего не делает
    /// и не создаёт топик.
    #[tokio::test]
    async fn test_publish_without_subscribers_is_noop() {
        let bus = EventBus::<u32>::new();
        let report = bus.publish("nobody", 1).await;
        assert_eq!(report, PublishReport::default());
        assert!(!bus.contains_topic("nobody"));
        assert_eq!(bus.metrics().dropped_publishes, 1);
        assert_eq!(bus.metrics().published, 0);
    }

    #[tokio::test]
    async fn test_publish_and_receive() {
        let bus = EventBus::<String>::new();
        let mut ep = bus.subscribe("chan");
        let report = bus.publish("chan", "x".to_string()).await;
        assert_eq!(report.delivered, 1);

        let ev = timeout(Duration::from_millis(100), ep.recv())
            .await
            .expect("timed out")
            .expect("no event");
        assert_eq!(ev, "x");
        assert_eq!(bus.metrics().published, 1);
        assert_eq!(bus.metrics().delivered, 1);
    }

    /// Тест проверяет, что событие не попадает в другой топик.
    #[tokio::test]
    async fn test_publish_is_topic_scoped() {
        let bus = EventBus::<u32>::new();
        let mut foo = bus.subscribe("foo");
        let mut bar = bus.subscribe("bar");

        bus.publish("foo", 5).await;
        assert_eq!(foo.try_recv(), Ok(5));
        assert_eq!(bar.try_recv(), Err(crate::TryRecvError::Empty));
    }

    /// Тест проверяет, что самовосстановление, опустошившее набор,
    /// удаляет и топик.
    #[tokio::test]
    async fn test_prune_removes_emptied_topic() {
        let bus = EventBus::<u32>::new();
        let mut ep = bus.subscribe("foo");
        ep.close();

        let report = bus.publish("foo", 1).await;
        assert_eq!(report.pruned, 1);
        assert!(!bus.contains_topic("foo"));
        assert_eq!(bus.metrics().pruned, 1);
    }

    /// Тест проверяет, что топик удаляется, даже если самовосстановление
    /// опустошило набор во время публикации, future которой был сброшен.
    #[tokio::test]
    async fn test_dropped_publish_does_not_leave_empty_topic() {
        let bus = EventBus::<u32>::new();
        let mut ep = bus.subscribe("foo");
        ep.close();

        // Публикация успевает удалить endpoint, но не дойти до барьера.
        let mut fut = std::pin::pin!(bus.publish("foo", 1));
        std::future::poll_fn(|cx| {
            assert!(fut.as_mut().poll(cx).is_pending());
            std::task::Poll::Ready(())
        })
        .await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        drop(fut);
        assert!(bus.contains_topic("foo"));
        assert_eq!(bus.subscriber_count("foo"), 0);

        let report = bus.publish("foo", 2).await;
        assert_eq!(report, PublishReport::default());
        assert!(!bus.contains_topic("foo"));
        assert_eq!(bus.topic_count(), 0);
        assert_eq!(
            bus.unsubscribe("foo", &mut ep),
            Err(BusError::UnknownTopic(Topic::from("foo")))
        );
    }

    /// Тест проверяет, что перекрывающиеся публикации учитывают
    /// удаление одного закрытого endpoint'а ровно один раз.
    #[tokio::test]
    async fn test_overlapping_publishes_count_prune_once() {
        let bus = EventBus::<u32>::new();
        let mut ep = bus.subscribe("foo");
        ep.close();

        let (first, second) = tokio::join!(bus.publish("foo", 1), bus.publish("foo", 2));
        assert_eq!(first.pruned + second.pruned, 1);
        assert_eq!(first.attempted() + second.attempted(), 1);

        let metrics = bus.metrics();
        assert_eq!(metrics.published, 2);
        assert_eq!(metrics.pruned, 1);
        assert!(!bus.contains_topic("foo"));
    }

    /// Тест проверяет ленивый режим: пустой топик остаётся в реестре.
    #[tokio::test]
    async fn test_lazy_prune_keeps_topic_entry() {
        let config = BusConfig {
            prune_empty_topics: false,
            ..BusConfig::default()
        };
        let bus = EventBus::<u32>::with_config(config);
        let mut ep = bus.subscribe("foo");
        ep.close();

        bus.publish("foo", 1).await;
        assert!(bus.contains_topic("foo"));
        assert_eq!(bus.subscriber_count("foo"), 0);
    }

    /// Тест проверяет, что закрытие endpoint'а без публикации
    /// не трогает реестр.
    #[test]
    fn test_close_without_publish_keeps_membership() {
        let bus = EventBus::<u32>::new();
        let mut ep = bus.subscribe("foo");
        ep.close();
        assert_eq!(bus.subscriber_count("foo"), 1);
    }

    #[test]
    fn test_topics_listing() {
        let bus = EventBus::<u32>::default();
        let _a = bus.subscribe("a");
        let _b = bus.subscribe(String::from("b"));
        let mut topics = bus.topics();
        topics.sort();
        assert_eq!(topics, vec![Topic::from("a"), Topic::from("b")]);
    }
}
