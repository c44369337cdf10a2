// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Stale notifications and the handles returned for background work.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

use crate::error::{CancelledError, Error, PopulateError, panic_cause};
use crate::leased::Leased;

/// Number of undelivered events a [`StaleNotifier`] buffers per subscriber.
const DEFAULT_CAPACITY: usize = 1024;

/// Notification that the cached value of `key` should be recomputed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StaleEvent<K> {
    /// The key whose value went stale.
    pub key: K,
}

impl<K> StaleEvent<K> {
    /// Creates an event for `key`.
    pub fn new(key: K) -> Self {
        Self { key }
    }
}

/// In-process fan-out of [`StaleEvent`]s.
///
/// Every subscriber receives every event published after it subscribed. A subscriber
/// that falls more than the buffer capacity behind skips the events it missed.
///
/// # Example
///
/// ```
/// use futures::StreamExt;
/// use leasecache::StaleNotifier;
///
/// # futures::executor::block_on(async {
/// let notifier = StaleNotifier::new();
/// let mut events = Box::pin(notifier.subscribe());
///
/// notifier.notify("user:1");
/// assert_eq!(events.next().await.unwrap().key, "user:1");
/// # });
/// ```
#[derive(Debug, Clone)]
pub struct StaleNotifier<K> {
    sender: broadcast::Sender<StaleEvent<K>>,
}

impl<K: Clone + Send + 'static> StaleNotifier<K> {
    /// Creates a notifier with the default buffer capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Creates a notifier buffering up to `capacity` undelivered events per subscriber.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publishes a stale event for `key` and returns how many subscribers it reached.
    pub fn notify(&self, key: K) -> usize {
        self.sender.send(StaleEvent::new(key)).unwrap_or(0)
    }

    /// Returns the number of live subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Returns a stream of the events published from now on.
    ///
    /// The stream ends when every clone of the notifier has been dropped.
    pub fn subscribe(&self) -> impl Stream<Item = StaleEvent<K>> + Send + 'static {
        futures::stream::unfold(self.sender.subscribe(), |mut receiver| async move {
            loop {
                match receiver.recv().await {
                    Ok(event) => return Some((event, receiver)),
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "stale subscriber fell behind, events were dropped");
                    }
                    Err(RecvError::Closed) => return None,
                }
            }
        })
    }
}

impl<K: Clone + Send + 'static> Default for StaleNotifier<K> {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle to a background repopulation.
///
/// Awaiting the handle yields the outcome; dropping it lets the repopulation finish on
/// its own. Failures are delivered to the cache's error sink whether or not the handle
/// is awaited.
#[derive(Debug)]
#[must_use = "drop the handle explicitly to run the refresh in the background"]
pub struct Refresh<V> {
    key: String,
    task: JoinHandle<Result<Leased<V>, Error>>,
}

impl<V> Refresh<V> {
    pub(crate) fn new(key: String, task: JoinHandle<Result<Leased<V>, Error>>) -> Self {
        Self { key, task }
    }

    /// The key being repopulated.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Returns `true` once the repopulation has finished.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl<V> Future for Refresh<V> {
    type Output = Result<Leased<V>, Error>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match Pin::new(&mut this.task).poll(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(join_error)) => {
                let error = if join_error.is_panic() {
                    PopulateError::unleased(this.key.clone(), panic_cause(join_error.into_panic())).into()
                } else {
                    CancelledError::new(this.key.clone()).into()
                };
                Poll::Ready(Err(error))
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

/// Keeps a stale-event stream connected to a cache.
///
/// Events are forwarded until the stream ends or this handle is dropped. Repopulations
/// already started keep running after the handle is dropped.
#[derive(Debug)]
#[must_use = "the subscription ends when this handle is dropped"]
pub struct Subscription {
    task: JoinHandle<()>,
}

impl Subscription {
    pub(crate) fn new(task: JoinHandle<()>) -> Self {
        Self { task }
    }

    /// Returns `true` while events are still being forwarded.
    #[must_use]
    pub fn is_active(&self) -> bool {
        !self.task.is_finished()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use futures::StreamExt;

    use super::*;

    static_assertions::assert_impl_all!(StaleNotifier<String>: Send, Sync, Clone);
    static_assertions::assert_impl_all!(Refresh<String>: Send, Unpin);
    static_assertions::assert_impl_all!(Subscription: Send, Sync);

    #[test]
    fn every_subscriber_sees_every_event() {
        let notifier = StaleNotifier::new();
        let mut first = Box::pin(notifier.subscribe());
        let mut second = Box::pin(notifier.subscribe());
        assert_eq!(notifier.subscriber_count(), 2);

        assert_eq!(notifier.notify("a"), 2);
        assert_eq!(notifier.notify("b"), 2);

        futures::executor::block_on(async {
            assert_eq!(first.next().await, Some(StaleEvent::new("a")));
            assert_eq!(first.next().await, Some(StaleEvent::new("b")));
            assert_eq!(second.next().await, Some(StaleEvent::new("a")));
            assert_eq!(second.next().await, Some(StaleEvent::new("b")));
        });
    }

    #[test]
    fn notify_without_subscribers_reaches_nobody() {
        let notifier = StaleNotifier::<&str>::default();
        assert_eq!(notifier.notify("a"), 0);
    }

    #[test]
    fn lagging_subscriber_skips_missed_events() {
        let notifier = StaleNotifier::with_capacity(2);
        let mut events = Box::pin(notifier.subscribe());

        for key in ["a", "b", "c", "d"] {
            notifier.notify(key);
        }

        futures::executor::block_on(async {
            assert_eq!(events.next().await, Some(StaleEvent::new("c")));
            assert_eq!(events.next().await, Some(StaleEvent::new("d")));
        });
    }

    #[test]
    fn stream_ends_when_notifier_is_dropped() {
        let notifier = StaleNotifier::<&str>::new();
        let mut events = Box::pin(notifier.subscribe());
        drop(notifier);

        assert_eq!(futures::executor::block_on(events.next()), None);
    }

    #[tokio::test]
    async fn dropping_subscription_aborts_forwarding() {
        let subscription = Subscription::new(tokio::spawn(std::future::pending::<()>()));
        assert!(subscription.is_active());
        drop(subscription);
    }

    #[tokio::test]
    async fn refresh_reports_outcome() {
        let refresh = Refresh::new("k".to_string(), tokio::spawn(async { Ok::<_, Error>(Leased::Populated(1)) }));
        assert_eq!(refresh.key(), "k");
        assert_eq!(refresh.await.unwrap(), Leased::Populated(1));
    }

    #[tokio::test]
    async fn cancelled_refresh_is_reported_as_cancelled() {
        let task = tokio::spawn(async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok::<_, Error>(Leased::<i32>::Skipped)
        });
        task.abort();

        let error = Refresh::new("k".to_string(), task).await.unwrap_err();

        assert!(matches!(error, Error::Cancelled(_)), "{error:?}");
        assert_eq!(error.key(), Some("k"));
        assert_eq!(error.to_string(), "repopulation of key 'k' was cancelled");
    }

    #[tokio::test]
    async fn panicked_refresh_is_a_populate_error() {
        let task = tokio::spawn(async { explode() });

        let error = Refresh::new("k".to_string(), task).await.unwrap_err();

        let Error::Populate(error) = error else {
            panic!("expected a populate error, got {error:?}");
        };
        assert_eq!(error.key(), "k");
        assert!(error.to_string().contains("panicked: sink blew up"), "{error}");
    }

    fn explode() -> Result<Leased<i32>, Error> {
        panic!("sink blew up")
    }
}
