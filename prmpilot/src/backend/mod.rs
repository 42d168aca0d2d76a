//! Backend seam between the engine and a concrete DOM surface.
//!
//! The live implementation speaks WebDriver; the scripted implementation
//! replays a canned DOM for offline tests. Both expose the same single
//! probe primitive (`try_find`) so that all waiting lives in one place,
//! the condition waiter.

use crate::actions::{Gesture, Key};
use crate::context::WindowOrdinal;
use crate::element::Element;
use crate::errors::AutomationError;
use crate::selector::Selector;

pub mod scripted;
pub mod webdriver;

pub use scripted::ScriptedBackend;
pub use webdriver::WebDriverBackend;

/// A concrete DOM + navigation surface.
///
/// All element queries resolve against the backend's current browsing
/// context (window + frame focus). The engine never caches results
/// across polls: each `try_find` call is a fresh evaluation.
#[async_trait::async_trait]
pub trait DomBackend: Send + Sync {
    /// Navigates the current window to `url`.
    async fn navigate(&self, url: &str) -> Result<(), AutomationError>;

    /// The current top-level URL of the focused window.
    async fn current_url(&self) -> Result<String, AutomationError>;

    /// Single non-blocking probe in the current context. `Ok(None)`
    /// means "not present right now".
    async fn try_find(&self, selector: &Selector) -> Result<Option<Element>, AutomationError>;

    /// Non-blocking probe for all matches in the current context.
    async fn try_find_all(&self, selector: &Selector) -> Result<Vec<Element>, AutomationError>;

    /// Moves focus into a frame element previously located in the
    /// current context.
    async fn enter_frame(&self, frame: &Element) -> Result<(), AutomationError>;

    /// Moves focus back to the parent of the current frame.
    async fn leave_frame(&self) -> Result<(), AutomationError>;

    /// Switches focus to another top-level window. Frame focus resets to
    /// that window's default content.
    async fn switch_window(&self, ordinal: WindowOrdinal) -> Result<(), AutomationError>;

    /// Sends a single key to whatever currently has focus.
    async fn send_key(&self, key: Key) -> Result<(), AutomationError>;

    /// Executes a composite gesture against the live page.
    async fn perform(&self, gesture: &Gesture) -> Result<(), AutomationError>;

    /// Ends the browser session. Idempotence is not required; callers
    /// invoke this exactly once, at the end of a batch.
    async fn quit(&self) -> Result<(), AutomationError>;
}
