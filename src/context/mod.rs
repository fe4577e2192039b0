//! Request context store.
//!
//! # Data Flow
//! ```text
//! boundary adapter
//!     → set(id) / enter(id)         (install id for the calling flow)
//!     → application code logs       (enricher calls try_current())
//!     → release(token) / guard drop (restore the prior value)
//!
//! async tasks:
//!     WithRequestContext::poll
//!         → swap task value into the thread slot
//!         → poll inner future
//!         → swap it back out, restore the poller's value
//! ```
//!
//! # Design Decisions
//! - One `thread_local!` slot per native thread; no locks on any path
//! - Tasks own their value and lend it to the thread only while being polled
//! - Tokens capture the prior value, so nested set/release behaves like a stack
//! - Guards release on every exit path, including unwinding
//! - Tokio tasks must run inside a [`WithRequestContext`] ([`spawn`],
//!   [`RequestContextExt::in_current_context`]) before they call [`set`] or
//!   [`enter`]. An unwrapped task shares its worker thread's slot with every
//!   other task polled there, so an id held across an `.await` would leak to
//!   them. Doing so logs a warning.

use std::cell::{Cell, RefCell};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use serde::{Serialize, Serializer};

mod future;

pub use future::{spawn, RequestContextExt, WithRequestContext};

thread_local! {
    static CURRENT: RefCell<Option<RequestId>> = const { RefCell::new(None) };
    static LENDING: Cell<usize> = const { Cell::new(0) };
}

/// Opaque correlation identifier for one inbound request.
///
/// Compared and propagated verbatim. Cloning is a reference-count bump.
/// Client attributes (such as `X-Client`) travel with the id but take no part
/// in comparisons.
#[derive(Clone)]
pub struct RequestId(Arc<Inner>);

#[derive(Clone)]
struct Inner {
    id: Box<str>,
    attributes: Vec<(Box<str>, Box<str>)>,
}

impl RequestId {
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(Arc::new(Inner {
            id: id.as_ref().into(),
            attributes: Vec::new(),
        }))
    }

    pub fn as_str(&self) -> &str {
        &self.0.id
    }

    /// Attaches `name = value`, replacing an earlier value for `name`.
    pub fn with_attribute(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        let (name, value) = (name.as_ref(), value.as_ref());
        let inner = Arc::make_mut(&mut self.0);
        match inner.attributes.iter_mut().find(|(n, _)| &**n == name) {
            Some((_, existing)) => *existing = value.into(),
            None => inner.attributes.push((name.into(), value.into())),
        }
        self
    }

    /// Attributes in the order they were attached.
    pub fn attributes(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.attributes.iter().map(|(n, v)| (&**n, &**v))
    }
}

impl PartialEq for RequestId {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl Eq for RequestId {}

impl Hash for RequestId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_str().hash(state);
    }
}

impl PartialOrd for RequestId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for RequestId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.as_str().cmp(other.as_str())
    }
}

impl fmt::Debug for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self.as_str(), f)
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl AsRef<str> for RequestId {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl From<&str> for RequestId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for RequestId {
    fn from(id: String) -> Self {
        Self::new(id)
    }
}

impl PartialEq<str> for RequestId {
    fn eq(&self, other: &str) -> bool {
        self.as_str() == other
    }
}

impl PartialEq<&str> for RequestId {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == *other
    }
}

impl Serialize for RequestId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Error returned when the calling thread's context slot cannot be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ContextError {
    /// The thread-local slot has already been destroyed (thread teardown).
    #[error("request context is unavailable on this thread")]
    Unavailable,
}

/// Handle returned by [`set`]; restores the prior state when passed to [`release`].
#[must_use = "a token that is never released leaves its request id installed"]
pub struct ContextToken {
    prior: Option<RequestId>,
}

impl fmt::Debug for ContextToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextToken").finish_non_exhaustive()
    }
}

/// Returns the request id of the calling flow, or `None` when unset.
///
/// Never blocks and never fails; an unreadable slot reads as unset.
pub fn current() -> Option<RequestId> {
    try_current().ok().flatten()
}

/// Like [`current`], but reports a slot that can no longer be read.
pub fn try_current() -> Result<Option<RequestId>, ContextError> {
    CURRENT
        .try_with(|slot| slot.borrow().clone())
        .map_err(|_| ContextError::Unavailable)
}

/// Installs `id` as current for the calling flow.
pub fn set(id: impl Into<RequestId>) -> ContextToken {
    check_task_binding();
    install(Some(id.into()))
}

/// Restores the state captured by `token`.
///
/// Tokens must be released in reverse order of creation; [`enter`] and
/// [`scope`] do this automatically.
pub fn release(token: ContextToken) {
    replace(token.prior);
}

/// Installs `id` and returns a guard that releases it when dropped.
pub fn enter(id: impl Into<RequestId>) -> ContextGuard {
    check_task_binding();
    ContextGuard::new(install(Some(id.into())))
}

/// Runs `f` with `id` current, restoring the prior value afterwards.
///
/// `f` cannot yield, so this is safe in any task.
pub fn scope<R>(id: impl Into<RequestId>, f: impl FnOnce() -> R) -> R {
    let _guard = ContextGuard::new(install(Some(id.into())));
    f()
}

/// Captures the calling flow's current value for use in another flow.
pub fn snapshot() -> ContextSnapshot {
    ContextSnapshot { value: current() }
}

pub(crate) fn install(value: Option<RequestId>) -> ContextToken {
    ContextToken {
        prior: replace(value),
    }
}

/// Marks the calling thread as polling a task that owns its value.
pub(crate) fn begin_lending() {
    let _ = LENDING.try_with(|depth| depth.set(depth.get() + 1));
}

pub(crate) fn end_lending() {
    let _ = LENDING.try_with(|depth| depth.set(depth.get().saturating_sub(1)));
}

fn check_task_binding() {
    if LENDING.try_with(Cell::get).unwrap_or(0) > 0 {
        return;
    }
    if let Some(task) = tokio::task::try_id() {
        tracing::warn!(
            task.id = %task,
            "request id set in a tokio task without its own request context; \
             spawn it with context::spawn or .in_current_context()"
        );
    }
}

/// Swaps the thread slot, returning the previous value.
pub(crate) fn replace(value: Option<RequestId>) -> Option<RequestId> {
    CURRENT.try_with(|slot| slot.replace(value)).unwrap_or(None)
}

/// Scoped acquisition of a request id; releases on drop.
#[must_use = "the request id is released as soon as the guard is dropped"]
#[derive(Debug)]
pub struct ContextGuard {
    token: Option<ContextToken>,
}

impl ContextGuard {
    fn new(token: ContextToken) -> Self {
        Self { token: Some(token) }
    }
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        if let Some(token) = self.token.take() {
            release(token);
        }
    }
}

/// Point-in-time copy of a flow's request id.
///
/// Entering a snapshot in a child thread gives it the parent's value; later
/// changes on either side stay local.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContextSnapshot {
    value: Option<RequestId>,
}

impl ContextSnapshot {
    pub fn request_id(&self) -> Option<&RequestId> {
        self.value.as_ref()
    }

    /// Installs the captured value (or absence) for the calling flow.
    pub fn enter(&self) -> ContextGuard {
        check_task_binding();
        ContextGuard::new(install(self.value.clone()))
    }

    pub(crate) fn into_value(self) -> Option<RequestId> {
        self.value
    }
}

impl From<Option<RequestId>> for ContextSnapshot {
    fn from(value: Option<RequestId>) -> Self {
        Self { value }
    }
}
