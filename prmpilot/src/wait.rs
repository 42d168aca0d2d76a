use crate::backend::DomBackend;
use crate::element::Element;
use crate::errors::AutomationError;
use crate::selector::Selector;
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, trace};

/// Engine defaults, matching the target application's render cadence.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);
pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(30);

/// Bounded polling primitive: converts "eventually true" DOM state into a
/// synchronous result.
///
/// Every poll re-evaluates the live document; nothing is cached between
/// polls because the application re-renders asynchronously. The condition
/// is checked once immediately, so an already-true predicate returns
/// without sleeping, and a never-true predicate fails no later than
/// `timeout` plus one interval.
#[derive(Debug, Clone, Copy)]
pub struct Waiter {
    interval: Duration,
    timeout: Duration,
}

impl Default for Waiter {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            timeout: DEFAULT_WAIT_TIMEOUT,
        }
    }
}

impl Waiter {
    pub fn new(interval: Duration, timeout: Duration) -> Self {
        Self { interval, timeout }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Polls `probe` until it yields a value or the deadline passes.
    ///
    /// `probe` must perform a fresh evaluation on every call. A probe
    /// error aborts the wait immediately; exhaustion of the deadline
    /// returns `NotFound` carrying `what`.
    pub async fn until<T, F, Fut>(
        &self,
        what: impl fmt::Display,
        mut probe: F,
    ) -> Result<T, AutomationError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Option<T>, AutomationError>>,
    {
        let deadline = Instant::now() + self.timeout;
        loop {
            if let Some(value) = probe().await? {
                return Ok(value);
            }
            if Instant::now() >= deadline {
                debug!(condition = %what, timeout = ?self.timeout, "wait deadline passed");
                return Err(AutomationError::NotFound(format!(
                    "condition not satisfied within {:?}: {what}",
                    self.timeout
                )));
            }
            trace!(condition = %what, "condition not met, sleeping");
            sleep(self.interval).await;
        }
    }

    /// Waits for an element matching `selector` to be present in the
    /// current context.
    pub async fn present(
        &self,
        backend: &dyn DomBackend,
        selector: &Selector,
    ) -> Result<Element, AutomationError> {
        self.until(format!("element present: {selector}"), move || {
            backend.try_find(selector)
        })
        .await
    }

    /// Waits for an element to be present, visible, and enabled.
    pub async fn visible(
        &self,
        backend: &dyn DomBackend,
        selector: &Selector,
    ) -> Result<Element, AutomationError> {
        self.until(format!("element visible: {selector}"), move || async move {
            match backend.try_find(selector).await? {
                Some(el) if el.is_visible().await? && el.is_enabled().await? => Ok(Some(el)),
                _ => Ok(None),
            }
        })
        .await
    }

    /// Waits until the current top-level URL equals `expected`.
    pub async fn url_is(
        &self,
        backend: &dyn DomBackend,
        expected: &str,
    ) -> Result<(), AutomationError> {
        self.until(format!("url equals {expected}"), move || async move {
            let current = backend.current_url().await?;
            Ok(if current == expected { Some(()) } else { None })
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn fast_waiter() -> Waiter {
        Waiter::new(Duration::from_millis(10), Duration::from_millis(60))
    }

    #[tokio::test]
    async fn already_true_returns_without_sleeping() {
        let waiter = fast_waiter();
        let started = Instant::now();
        let value = waiter
            .until("always true", || async { Ok(Some(42u32)) })
            .await
            .unwrap();
        assert_eq!(value, 42);
        assert!(started.elapsed() < waiter.interval());
    }

    #[tokio::test]
    async fn never_true_fails_within_timeout_plus_one_interval() {
        let waiter = fast_waiter();
        let started = Instant::now();
        let err = waiter
            .until("never true", || async { Ok(None::<u32>) })
            .await
            .unwrap_err();
        assert!(matches!(err, AutomationError::NotFound(_)));
        assert!(started.elapsed() <= waiter.timeout() + 2 * waiter.interval());
    }

    #[tokio::test]
    async fn probe_is_reevaluated_each_poll() {
        let waiter = Waiter::new(Duration::from_millis(5), Duration::from_secs(1));
        let calls = Cell::new(0u32);
        let value = waiter
            .until("third poll", || {
                calls.set(calls.get() + 1);
                let n = calls.get();
                async move { Ok(if n >= 3 { Some(n) } else { None }) }
            })
            .await
            .unwrap();
        assert_eq!(value, 3);
    }

    #[tokio::test]
    async fn probe_error_aborts_immediately() {
        let waiter = fast_waiter();
        let err = waiter
            .until("failing probe", || async {
                Err::<Option<u32>, _>(AutomationError::Session("gone".to_string()))
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AutomationError::Session(_)));
    }

    #[tokio::test]
    async fn not_found_carries_condition_description() {
        let waiter = fast_waiter();
        let err = waiter
            .until("element present: #save-button", || async {
                Ok(None::<u32>)
            })
            .await
            .unwrap_err();
        assert!(err.to_string().contains("element present: #save-button"));
    }
}
