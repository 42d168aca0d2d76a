//! Engine for driving a legacy browser-based project-management
//! application through scripted data-entry workflows.
//!
//! The engine is split along one seam: [`DomBackend`] abstracts the live
//! page (WebDriver in production, a scripted replay for tests), and
//! everything above it — waiting, locating, context bookkeeping, composite
//! gestures — is backend-agnostic. The application under automation
//! renders asynchronously and nests its screens in frames and popup
//! windows, so the engine's job is mostly disciplined waiting and focus
//! management.

pub mod actions;
pub mod backend;
pub mod context;
pub mod element;
pub mod errors;
pub mod locator;
pub mod selector;
pub mod wait;

pub use actions::{Gesture, GestureStep, Key};
pub use backend::{DomBackend, ScriptedBackend, WebDriverBackend};
pub use context::{Context, ContextEntry, ContextStack, WindowOrdinal};
pub use element::Element;
pub use errors::AutomationError;
pub use locator::Locator;
pub use selector::Selector;
pub use wait::{Waiter, DEFAULT_POLL_INTERVAL, DEFAULT_WAIT_TIMEOUT};

use std::sync::Arc;
use tracing::{debug, info, instrument};

/// A live automation session: one backend connection plus the context
/// stack describing where in the window/frame nesting the session
/// currently is.
///
/// All focus changes go through the session so the stack and the real
/// driver focus can never disagree: `enter_frame`/`enter_window` push
/// only after the backend switch succeeded, and `pop_context` restores
/// the backend to exactly the context implied by the remaining entries.
pub struct Session {
    backend: Arc<dyn DomBackend>,
    waiter: Waiter,
    stack: ContextStack,
}

impl Session {
    pub fn new(backend: Arc<dyn DomBackend>) -> Self {
        Self::with_waiter(backend, Waiter::default())
    }

    pub fn with_waiter(backend: Arc<dyn DomBackend>, waiter: Waiter) -> Self {
        Self {
            backend,
            waiter,
            stack: ContextStack::new(),
        }
    }

    pub fn waiter(&self) -> Waiter {
        self.waiter
    }

    pub fn backend(&self) -> &Arc<dyn DomBackend> {
        &self.backend
    }

    /// Builds a locator resolving in the session's current context.
    pub fn locator(&self, selector: impl Into<Selector>) -> Locator {
        Locator::new(self.backend.clone(), self.waiter, selector.into())
    }

    pub async fn goto(&self, url: &str) -> Result<(), AutomationError> {
        info!(url, "navigate");
        self.backend.navigate(url).await
    }

    pub async fn current_url(&self) -> Result<String, AutomationError> {
        self.backend.current_url().await
    }

    /// Waits for the frame element, moves driver focus into it, and
    /// records the switch.
    #[instrument(level = "debug", skip(self, selector))]
    pub async fn enter_frame(
        &mut self,
        selector: impl Into<Selector>,
    ) -> Result<(), AutomationError> {
        let selector = selector.into();
        let frame = self.waiter.present(self.backend.as_ref(), &selector).await?;
        self.backend.enter_frame(&frame).await?;
        self.stack.push_frame(selector.key());
        debug!(context = %self.stack.current(), "entered frame");
        Ok(())
    }

    /// Switches driver focus to another top-level window and records the
    /// switch. Frame focus lands at that window's default content.
    #[instrument(level = "debug", skip(self))]
    pub async fn enter_window(&mut self, ordinal: WindowOrdinal) -> Result<(), AutomationError> {
        self.backend.switch_window(ordinal).await?;
        self.stack.push_window(ordinal);
        debug!(context = %self.stack.current(), "entered window");
        Ok(())
    }

    /// Leaves the most recently entered frame or window, restoring the
    /// previous context exactly.
    ///
    /// Popping a frame maps to a parent-frame switch. Popping a window
    /// has no driver-level inverse, so the session switches to the window
    /// the remaining entries imply and re-enters their frames in order.
    #[instrument(level = "debug", skip(self))]
    pub async fn pop_context(&mut self) -> Result<(), AutomationError> {
        let popped = self.stack.pop()?;
        match popped {
            ContextEntry::Frame(_) => self.backend.leave_frame().await?,
            ContextEntry::Window(_) => self.rebuild_focus().await?,
        }
        debug!(context = %self.stack.current(), "popped context");
        Ok(())
    }

    /// Abandons all nesting and returns to the main window's default
    /// content. Used between records and after failures, when intervening
    /// popups may already be gone.
    #[instrument(level = "debug", skip(self))]
    pub async fn reset_to_top(&mut self) -> Result<(), AutomationError> {
        self.backend.switch_window(WindowOrdinal::First).await?;
        let dropped = self.stack.reset();
        debug!(dropped, "reset to top");
        Ok(())
    }

    /// Sends a single key to the currently focused element.
    pub async fn send_key(&self, key: Key) -> Result<(), AutomationError> {
        self.backend.send_key(key).await
    }

    /// Executes a composite gesture in the current context.
    pub async fn perform(&self, gesture: &Gesture) -> Result<(), AutomationError> {
        self.backend.perform(gesture).await
    }

    pub fn context(&self) -> Context {
        self.stack.current()
    }

    pub fn context_depth(&self) -> usize {
        self.stack.depth()
    }

    /// Ends the underlying browser session.
    pub async fn quit(self) -> Result<(), AutomationError> {
        info!("session quit");
        self.backend.quit().await
    }

    /// Re-derives driver focus from the remaining stack entries after a
    /// window pop: switch to the innermost remaining window (or the
    /// first), then re-enter the frames pushed since.
    async fn rebuild_focus(&mut self) -> Result<(), AutomationError> {
        let entries = self.stack.entries().to_vec();
        let window_pos = entries
            .iter()
            .rposition(|e| matches!(e, ContextEntry::Window(_)));
        let ordinal = match window_pos {
            Some(pos) => match entries[pos] {
                ContextEntry::Window(ord) => ord,
                ContextEntry::Frame(_) => unreachable!("rposition matched a window entry"),
            },
            None => WindowOrdinal::First,
        };
        self.backend.switch_window(ordinal).await?;
        let replay_from = window_pos.map(|p| p + 1).unwrap_or(0);
        for entry in &entries[replay_from..] {
            if let ContextEntry::Frame(sel) = entry {
                let selector = Selector::from(sel.as_str());
                let frame = self.waiter.present(self.backend.as_ref(), &selector).await?;
                self.backend.enter_frame(&frame).await?;
            }
        }
        Ok(())
    }
}
