use std::{
    fmt,
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};

use tokio::sync::mpsc;

use super::Topic;
use crate::{RecvError, TryRecvError};

/// Ёмкость очереди доставки каждого endpoint'а.
pub const ENDPOINT_CAPACITY: usize = 1;

static NEXT_ENDPOINT_ID: AtomicU64 = AtomicU64::new(1);

/// Уникальный в пределах процесса идентификатор endpoint'а.
///
/// Членство в наборе подписок определяется идентичностью endpoint'а,
/// а не значением, поэтому каждый вызов `subscribe` получает новый id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EndpointId(u64);

impl EndpointId {
    pub(crate) fn next() -> Self {
        Self(NEXT_ENDPOINT_ID.fetch_add(1, Ordering::Relaxed))
    }

    #[cfg(test)]
    pub(crate) fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for EndpointId {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Приватная точка доставки событий одного подписчика.
///
/// Однослотовая очередь: пока предыдущее событие не прочитано,
/// следующая доставка ждёт. Потребитель может закрыть endpoint сам
/// через [`Endpoint::close`] или просто уронить его; шина обнаружит это
/// при следующей публикации и удалит endpoint из набора подписок.
///
/// Штатный способ завершения подписки — `EventBus::unsubscribe`.
pub struct Endpoint<E> {
    id: EndpointId,
    topic: Topic,
    inner: mpsc::Receiver<E>,
}

/// Создаёт пару (отправитель для набора подписок, endpoint для потребителя).
pub(crate) fn endpoint<E>(topic: Topic) -> (EndpointId, mpsc::Sender<E>, Endpoint<E>) {
    let (tx, rx) = mpsc::channel(ENDPOINT_CAPACITY);
    let id = EndpointId::next();
    let endpoint = Endpoint {
        id,
        topic,
        inner: rx,
    };
    (id, tx, endpoint)
}

impl<E> Endpoint<E> {
    pub fn id(&self) -> EndpointId {
        self.id
    }

    /// Топик, на который оформлена подписка.
    pub fn topic(&self) -> &Topic {
        &self.topic
    }

    /// Асинхронно ожидает следующее событие.
    ///
    /// # Возвращает
    /// - `Ok(E)` при успешном получении события
    /// - `Err(RecvError::Closed)` если endpoint закрыт и очередь пуста
    pub async fn recv(&mut self) -> Result<E, RecvError> {
        self.inner.recv().await.ok_or(RecvError::Closed)
    }

    /// Пытается получить событие без ожидания.
    ///
    /// # Возвращает
    /// - `Err(TryRecvError::Empty)` если событий нет
    /// - `Err(TryRecvError::Closed)` если endpoint удалён из шины и очередь пуста
    pub fn try_recv(&mut self) -> Result<E, TryRecvError> {
        self.inner.try_recv().map_err(Into::into)
    }

    /// Ожидает следующее событие не дольше `timeout`.
    pub async fn recv_timeout(
        &mut self,
        timeout: Duration,
    ) -> Result<E, RecvError> {
        match tokio::time::timeout(timeout, self.inner.recv()).await {
            Ok(Some(event)) => Ok(event),
            Ok(None) => Err(RecvError::Closed),
            Err(_) => Err(RecvError::Timeout),
        }
    }

    /// Закрывает endpoint со стороны потребителя.
    ///
    /// Уже доставленное событие остаётся доступным для чтения, новые
    /// доставки будут отклонены. Повторный вызов ничего не делает.
    pub fn close(&mut self) {
        self.inner.close();
    }
}

impl<E> fmt::Debug for Endpoint<E> {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("id", &self.id)
            .field("topic", &self.topic)
            .finish_non_exhaustive()
    }
}
