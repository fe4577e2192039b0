//! Per-task request context for async code.
//!
//! Executors poll many tasks on one thread, so a thread slot alone would let
//! interleaved requests see each other's ids. [`WithRequestContext`] owns the
//! task's value and lends it to the thread only for the duration of a poll.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use pin_project::{pin_project, pinned_drop};
use tokio::task::JoinHandle;

use super::{begin_lending, end_lending, replace, snapshot, ContextSnapshot, RequestId};

/// A future that runs with its own request id.
///
/// The inner future is also dropped with the task's value lent, so guards it
/// still holds release into the task rather than into whoever drops it.
#[pin_project(PinnedDrop)]
#[derive(Debug)]
#[must_use = "futures do nothing unless polled"]
pub struct WithRequestContext<F> {
    #[pin]
    inner: Option<F>,
    value: Option<RequestId>,
}

impl<F> WithRequestContext<F> {
    pub fn new(snapshot: ContextSnapshot, inner: F) -> Self {
        Self {
            inner: Some(inner),
            value: snapshot.into_value(),
        }
    }

    /// The value the task will see on its next poll.
    pub fn request_id(&self) -> Option<&RequestId> {
        self.value.as_ref()
    }
}

impl<F: Future> Future for WithRequestContext<F> {
    type Output = F::Output;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();
        let _lent = Lend::new(this.value);
        this.inner
            .as_pin_mut()
            .expect("inner future is only taken while dropping")
            .poll(cx)
    }
}

#[pinned_drop]
impl<F> PinnedDrop for WithRequestContext<F> {
    fn drop(self: Pin<&mut Self>) {
        let mut this = self.project();
        let _lent = Lend::new(this.value);
        this.inner.set(None);
    }
}

/// Holds the task's value in the thread slot; hands it back on drop.
struct Lend<'a> {
    owned: &'a mut Option<RequestId>,
    outer: Option<RequestId>,
}

impl<'a> Lend<'a> {
    fn new(owned: &'a mut Option<RequestId>) -> Self {
        let outer = replace(owned.take());
        begin_lending();
        Self { owned, outer }
    }
}

impl Drop for Lend<'_> {
    fn drop(&mut self) {
        // Whatever the task left current (including ids it set and has not
        // released yet) stays with the task.
        *self.owned = replace(self.outer.take());
        end_lending();
    }
}

/// Binds request context to futures.
pub trait RequestContextExt: Future + Sized {
    /// Runs this future with `id` current.
    fn with_request_id(self, id: impl Into<RequestId>) -> WithRequestContext<Self> {
        WithRequestContext::new(ContextSnapshot::from(Some(id.into())), self)
    }

    /// Runs this future with a snapshot of the caller's current value.
    fn in_current_context(self) -> WithRequestContext<Self> {
        WithRequestContext::new(snapshot(), self)
    }
}

impl<F: Future> RequestContextExt for F {}

/// Spawns `future` on tokio, inheriting the caller's request id.
pub fn spawn<F>(future: F) -> JoinHandle<F::Output>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    tokio::spawn(future.in_current_context())
}
