// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use pin_project_lite::pin_project;
use tick::{Clock, Delay};
use tokio::task::JoinHandle;

use crate::error::{BoxError, TimeoutError};

pin_project! {
    /// Runs a fallible future on the Tokio runtime and waits for it for at most a fixed budget.
    ///
    /// - If the future finishes within the budget, its result is returned unchanged.
    /// - If the budget elapses first, a [`TimeoutError`] is returned and the future is left
    ///   running detached. Its eventual result is discarded, but any side effects it performs
    ///   still happen.
    /// - If the future panics, the panic is returned as an error instead of unwinding into the
    ///   caller.
    ///
    /// # Example
    ///
    /// ```
    /// use std::time::Duration;
    ///
    /// use leasecache::TimeoutGuard;
    /// use tick::Clock;
    ///
    /// # #[tokio::main(flavor = "current_thread")]
    /// # async fn main() {
    /// let clock = Clock::new_tokio();
    /// let result = TimeoutGuard::spawn(&clock, Duration::from_secs(5), async {
    ///     Ok::<_, std::io::Error>(42)
    /// })
    /// .await;
    ///
    /// assert_eq!(result.unwrap(), 42);
    /// # }
    /// ```
    #[derive(Debug)]
    #[must_use = "futures do nothing unless polled"]
    pub struct TimeoutGuard<T> {
        #[pin]
        task: JoinHandle<Result<T, BoxError>>,
        #[pin]
        deadline: Delay,
        timeout: Duration,
    }
}

impl<T: Send + 'static> TimeoutGuard<T> {
    /// Spawns `future` and starts the `timeout` budget.
    ///
    /// The budget is measured with `clock`. Must be called from within a Tokio runtime.
    pub fn spawn<F, E>(clock: &Clock, timeout: Duration, future: F) -> Self
    where
        F: Future<Output = Result<T, E>> + Send + 'static,
        E: Into<BoxError>,
    {
        Self {
            task: tokio::spawn(async move { future.await.map_err(Into::into) }),
            deadline: clock.delay(timeout),
            timeout,
        }
    }
}

impl<T> TimeoutGuard<T> {
    /// The budget this guard enforces.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl<T> Future for TimeoutGuard<T> {
    type Output = Result<T, BoxError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();

        match this.task.poll(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(join_error)) => Poll::Ready(Err(join_error.into())),
            Poll::Pending => match this.deadline.poll(cx) {
                Poll::Ready(()) => Poll::Ready(Err(TimeoutError::new(*this.timeout).into())),
                Poll::Pending => Poll::Pending,
            },
        }
    }
}
