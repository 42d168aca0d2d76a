use crate::backend::DomBackend;
use crate::element::Element;
use crate::errors::AutomationError;
use crate::selector::Selector;
use crate::wait::Waiter;
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;

/// A deferred element query: selector plus the wait policy to resolve it.
///
/// Locators are cheap to construct and hold no live DOM state. Resolution
/// happens at `wait`/`visible` time, against whatever the backend's
/// current context is, so a locator built before a frame switch resolves
/// inside the frame if awaited after it.
#[derive(Clone)]
pub struct Locator {
    backend: Arc<dyn DomBackend>,
    waiter: Waiter,
    selector: Selector,
    root: Option<Element>,
}

impl Locator {
    pub fn new(backend: Arc<dyn DomBackend>, waiter: Waiter, selector: Selector) -> Self {
        Self {
            backend,
            waiter,
            selector,
            root: None,
        }
    }

    /// Scopes resolution to descendants of an already located element.
    pub fn within(mut self, root: &Element) -> Self {
        self.root = Some(root.clone());
        self
    }

    /// Overrides the wait deadline for this locator only.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.waiter = self.waiter.with_timeout(timeout);
        self
    }

    pub fn selector(&self) -> &Selector {
        &self.selector
    }

    /// Waits until the element is present in the current context.
    #[instrument(level = "debug", skip(self), fields(selector = %self.selector))]
    pub async fn wait(&self) -> Result<Element, AutomationError> {
        let selector = &self.selector;
        match &self.root {
            None => self.waiter.present(self.backend.as_ref(), selector).await,
            Some(root) => {
                self.waiter
                    .until(format!("descendant present: {selector}"), move || {
                        root.try_find(selector.clone())
                    })
                    .await
            }
        }
    }

    /// Waits until the element is present, visible, and enabled.
    #[instrument(level = "debug", skip(self), fields(selector = %self.selector))]
    pub async fn visible(&self) -> Result<Element, AutomationError> {
        let selector = &self.selector;
        match &self.root {
            None => self.waiter.visible(self.backend.as_ref(), selector).await,
            Some(root) => {
                self.waiter
                    .until(format!("descendant visible: {selector}"), move || {
                        async move {
                            match root.try_find(selector.clone()).await? {
                                Some(el) if el.is_visible().await? && el.is_enabled().await? => {
                                    Ok(Some(el))
                                }
                                _ => Ok(None),
                            }
                        }
                    })
                    .await
            }
        }
    }

    /// Waits until at least one match is present, then returns all
    /// matches from that same poll.
    #[instrument(level = "debug", skip(self), fields(selector = %self.selector))]
    pub async fn all(&self) -> Result<Vec<Element>, AutomationError> {
        let backend = self.backend.as_ref();
        let root = self.root.as_ref();
        let selector = &self.selector;
        self.waiter
            .until(format!("any element: {selector}"), move || async move {
                let found = match root {
                    None => backend.try_find_all(selector).await?,
                    Some(r) => r.try_find_all(selector.clone()).await?,
                };
                Ok(if found.is_empty() { None } else { Some(found) })
            })
            .await
    }
}
