use crate::errors::AutomationError;
use crate::selector::Selector;
use std::any::Any;
use std::fmt;
use std::fmt::Debug;
use tracing::debug;

/// Interface for backend-specific element implementations.
///
/// A located element stays bound to the browsing context it was found in;
/// if the application re-renders, the handle may go stale and actions on
/// it surface `NotInteractable` or `Session` errors rather than silently
/// operating on a ghost.
#[async_trait::async_trait]
pub trait ElementImpl: Send + Sync + Debug {
    /// Standard pointer activation.
    async fn click(&self) -> Result<(), AutomationError>;

    /// Sends text as discrete key events, not a programmatic value
    /// assignment. The target application only reacts to real key events.
    async fn type_text(&self, text: &str) -> Result<(), AutomationError>;

    /// Moves the virtual pointer over the element without clicking.
    async fn hover(&self) -> Result<(), AutomationError>;

    /// Clears the element's current value.
    async fn clear(&self) -> Result<(), AutomationError>;

    async fn text(&self) -> Result<String, AutomationError>;
    async fn attr(&self, name: &str) -> Result<Option<String>, AutomationError>;
    async fn is_visible(&self) -> Result<bool, AutomationError>;
    async fn is_enabled(&self) -> Result<bool, AutomationError>;

    /// Single, non-blocking probe for a descendant. `Ok(None)` means "not
    /// present right now"; the condition waiter turns that into polling.
    async fn try_find(&self, selector: &Selector) -> Result<Option<Element>, AutomationError>;

    /// Non-blocking probe for all matching descendants.
    async fn try_find_all(&self, selector: &Selector) -> Result<Vec<Element>, AutomationError>;

    /// Human-readable description of how this element was reached.
    fn description(&self) -> String;

    fn as_any(&self) -> &dyn Any;
    fn clone_box(&self) -> Box<dyn ElementImpl>;
}

/// A located element in the live application.
pub struct Element {
    inner: Box<dyn ElementImpl>,
}

impl Element {
    pub fn new(inner: Box<dyn ElementImpl>) -> Self {
        Self { inner }
    }

    pub async fn click(&self) -> Result<(), AutomationError> {
        debug!(target = %self.inner.description(), "click");
        self.inner.click().await
    }

    pub async fn type_text(&self, text: &str) -> Result<(), AutomationError> {
        debug!(target = %self.inner.description(), "type text");
        self.inner.type_text(text).await
    }

    pub async fn hover(&self) -> Result<(), AutomationError> {
        debug!(target = %self.inner.description(), "hover");
        self.inner.hover().await
    }

    pub async fn clear(&self) -> Result<(), AutomationError> {
        debug!(target = %self.inner.description(), "clear");
        self.inner.clear().await
    }

    pub async fn text(&self) -> Result<String, AutomationError> {
        self.inner.text().await
    }

    pub async fn attr(&self, name: &str) -> Result<Option<String>, AutomationError> {
        self.inner.attr(name).await
    }

    pub async fn is_visible(&self) -> Result<bool, AutomationError> {
        self.inner.is_visible().await
    }

    pub async fn is_enabled(&self) -> Result<bool, AutomationError> {
        self.inner.is_enabled().await
    }

    pub async fn try_find(
        &self,
        selector: impl Into<Selector>,
    ) -> Result<Option<Element>, AutomationError> {
        self.inner.try_find(&selector.into()).await
    }

    pub async fn try_find_all(
        &self,
        selector: impl Into<Selector>,
    ) -> Result<Vec<Element>, AutomationError> {
        self.inner.try_find_all(&selector.into()).await
    }

    pub fn description(&self) -> String {
        self.inner.description()
    }

    pub fn impl_ref(&self) -> &dyn ElementImpl {
        self.inner.as_ref()
    }
}

impl Clone for Element {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone_box(),
        }
    }
}

impl fmt::Debug for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Element")
            .field("description", &self.inner.description())
            .finish()
    }
}
