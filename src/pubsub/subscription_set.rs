use std::{collections::HashMap, sync::Arc, time::Duration};

use parking_lot::RwLock;
use tokio::{
    sync::mpsc::{self, error::SendTimeoutError},
    task::JoinSet,
};
use tracing::{debug, trace, warn};

use super::{EndpointId, PublishReport, Topic};
use crate::MembershipError;

/// Результат одной попытки доставки события в endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// Событие помещено в очередь endpoint'а.
    Delivered,
    /// Endpoint закрыт потребителем мимо `unsubscribe`, его нужно удалить.
    Abandoned,
    /// Очередь не освободилась до дедлайна; событие для этого endpoint'а
    /// отброшено, сам endpoint остаётся в наборе.
    TimedOut,
}

/// Набор живых endpoint'ов одного топика.
///
/// Отвечает за веерную доставку: каждое событие отправляется во все
/// endpoint'ы параллельно, `publish` возвращается только после того, как
/// завершились все попытки. Endpoint'ы, закрытые потребителем, удаляются
/// при первой неудачной доставке.
pub struct SubscriptionSet<E> {
    topic: Topic,
    subscribers: RwLock<HashMap<EndpointId, mpsc::Sender<E>>>,
    /// Дедлайн одной доставки; `None` означает ожидание без ограничения
    delivery_timeout: Option<Duration>,
}

impl<E> SubscriptionSet<E> {
    pub fn new(
        topic: Topic,
        delivery_timeout: Option<Duration>,
    ) -> Self {
        Self {
            topic,
            subscribers: RwLock::new(HashMap::new()),
            delivery_timeout,
        }
    }

    pub fn topic(&self) -> &Topic {
        &self.topic
    }

    /// Регистрирует endpoint. Повторное добавление того же id ничего не
    /// меняет: endpoint по-прежнему в наборе.
    pub fn add(
        &self,
        id: EndpointId,
        sender: mpsc::Sender<E>,
    ) {
        self.subscribers.write().insert(id, sender);
    }

    /// Удаляет endpoint из набора.
    ///
    /// Возвращает `NotAMember`, если endpoint не был зарегистрирован:
    /// так ловятся двойная отписка и отписка чужого endpoint'а.
    pub fn remove(
        &self,
        id: EndpointId,
    ) -> Result<(), MembershipError> {
        match self.subscribers.write().remove(&id) {
            Some(_) => Ok(()),
            None => Err(MembershipError::NotAMember(id)),
        }
    }

    pub fn contains(
        &self,
        id: EndpointId,
    ) -> bool {
        self.subscribers.read().contains_key(&id)
    }

    /// Текущее количество endpoint'ов.
    pub fn len(&self) -> usize {
        self.subscribers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.read().is_empty()
    }

    /// Удаляет мёртвый endpoint, обнаруженный при доставке.
    ///
    /// `NotAMember` здесь не ошибка: параллельный `unsubscribe` или
    /// другая публикация могли успеть удалить endpoint раньше.
    ///
    /// Возвращает `true`, только если endpoint удалён этим вызовом.
    fn prune(
        &self,
        id: EndpointId,
    ) -> bool {
        match self.remove(id) {
            Ok(()) => {
                warn!(
                    topic = %self.topic,
                    endpoint = %id,
                    "endpoint closed by consumer, removed from subscriptions"
                );
                true
            }
            Err(MembershipError::NotAMember(_)) => {
                debug!(
                    topic = %self.topic,
                    endpoint = %id,
                    "closed endpoint already removed"
                );
                false
            }
        }
    }
}

impl<E> SubscriptionSet<E>
where
    E: Clone + Send + 'static,
{
    /// Доставляет `event` во все endpoint'ы, зарегистрированные на момент
    /// вызова.
    ///
    /// Каждая доставка выполняется отдельной задачей, поэтому медленный
    /// потребитель не задерживает остальных. Метод ждёт завершения всех
    /// задач. Без дедлайна доставка в заполненный endpoint ждёт, пока
    /// потребитель его не освободит или не закроет: один зависший
    /// потребитель задерживает весь `publish`.
    ///
    /// Если future `publish` уронить до завершения, незавершённые
    /// доставки отменяются.
    pub async fn publish(
        self: &Arc<Self>,
        event: E,
    ) -> PublishReport {
        let targets: Vec<(EndpointId, mpsc::Sender<E>)> = self
            .subscribers
            .read()
            .iter()
            .map(|(id, tx)| (*id, tx.clone()))
            .collect();

        let mut tasks = JoinSet::new();
        for (id, tx) in targets {
            let set = Arc::clone(self);
            let event = event.clone();
            tasks.spawn(async move {
                let outcome = deliver(&tx, event, set.delivery_timeout).await;
                let removed = match outcome {
                    DeliveryOutcome::Delivered => {
                        trace!(topic = %set.topic, endpoint = %id, "event delivered");
                        false
                    }
                    DeliveryOutcome::Abandoned => set.prune(id),
                    DeliveryOutcome::TimedOut => {
                        warn!(
                            topic = %set.topic,
                            endpoint = %id,
                            "delivery deadline exceeded, event dropped for endpoint"
                        );
                        false
                    }
                };
                (outcome, removed)
            });
        }

        let mut report = PublishReport::default();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((DeliveryOutcome::Delivered, _)) => report.delivered += 1,
                Ok((DeliveryOutcome::Abandoned, true)) => report.pruned += 1,
                // Удалён параллельной публикацией или отпиской.
                Ok((DeliveryOutcome::Abandoned, false)) => {}
                Ok((DeliveryOutcome::TimedOut, _)) => report.timed_out += 1,
                Err(err) => warn!(topic = %self.topic, error = %err, "delivery task failed"),
            }
        }
        report
    }
}

/// Одна попытка доставки. Закрытый endpoint — типизированный результат,
/// а не ошибка.
pub async fn deliver<E>(
    tx: &mpsc::Sender<E>,
    event: E,
    timeout: Option<Duration>,
) -> DeliveryOutcome {
    match timeout {
        None => match tx.send(event).await {
            Ok(()) => DeliveryOutcome::Delivered,
            Err(_) => DeliveryOutcome::Abandoned,
        },
        Some(deadline) => match tx.send_timeout(event, deadline).await {
            Ok(()) => DeliveryOutcome::Delivered,
            Err(SendTimeoutError::Closed(_)) => DeliveryOutcome::Abandoned,
            Err(SendTimeoutError::Timeout(_)) => DeliveryOutcome::TimedOut,
        },
    }
}
