//! Scripted in-memory backend.
//!
//! Replays a canned DOM so engine and workflow behavior can be exercised
//! without a browser: nodes are registered under the exact selector keys
//! the code under test will use, optionally becoming present only after
//! a number of polls (asynchronously rendered widgets), and every action
//! is recorded in a journal the test can assert against.

use crate::actions::{Gesture, GestureStep, Key};
use crate::backend::DomBackend;
use crate::context::WindowOrdinal;
use crate::element::{Element, ElementImpl};
use crate::errors::AutomationError;
use crate::selector::Selector;
use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// One recorded interaction with the scripted page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionRecord {
    Navigate { url: String },
    Click { target: String },
    TypeText { target: String, text: String },
    Hover { target: String },
    Clear { target: String },
    Key { key: Key },
    SwitchWindow { index: usize },
    EnterFrame { frame: String },
    LeaveFrame,
    Quit,
}

/// Side effect attached to a node's click.
#[derive(Debug, Clone)]
pub enum Effect {
    /// The page navigates (e.g. a login submit landing on the target
    /// screen).
    SetUrl(String),
    /// A popup window opens as the newest window handle.
    OpenWindow,
    /// The newest window handle closes (confirm buttons that dismiss
    /// their popup). Focus is not moved; callers switch explicitly.
    CloseWindow,
    /// Another node becomes present (flyout menus, inline editors).
    Reveal {
        window: usize,
        frames: Vec<String>,
        selector: String,
    },
}

/// Declarative description of one scripted node.
#[derive(Debug, Clone)]
pub struct NodeSpec {
    pub visible: bool,
    pub enabled: bool,
    pub text: String,
    pub value: Option<String>,
    /// Number of probes that see nothing before the node appears.
    pub appears_after: u32,
    pub on_click: Vec<Effect>,
}

impl Default for NodeSpec {
    fn default() -> Self {
        Self {
            visible: true,
            enabled: true,
            text: String::new(),
            value: None,
            appears_after: 0,
            on_click: Vec::new(),
        }
    }
}

impl NodeSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn appears_after(mut self, polls: u32) -> Self {
        self.appears_after = polls;
        self
    }

    pub fn on_click(mut self, effect: Effect) -> Self {
        self.on_click.push(effect);
        self
    }
}

struct NodeState {
    spec: NodeSpec,
    polls_remaining: u32,
}

struct ScriptedState {
    url: String,
    /// Requested URL -> URL the navigation actually lands on (auth
    /// redirects).
    redirects: HashMap<String, String>,
    /// Node maps per window; index 0 is the main window. Windows may be
    /// populated before they are "open".
    windows: Vec<HashMap<String, NodeState>>,
    open_windows: usize,
    current_window: usize,
    frame_path: Vec<String>,
    focused: Option<String>,
    journal: Vec<ActionRecord>,
    quit: bool,
}

fn scoped_key(frames: &[String], selector_key: &str) -> String {
    if frames.is_empty() {
        selector_key.to_string()
    } else {
        format!("{}::{}", frames.join("/"), selector_key)
    }
}

fn lock(state: &Mutex<ScriptedState>) -> MutexGuard<'_, ScriptedState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

fn apply_effects(state: &mut ScriptedState, effects: &[Effect]) {
    for effect in effects {
        match effect {
            Effect::SetUrl(url) => state.url = url.clone(),
            Effect::OpenWindow => {
                state.open_windows += 1;
                while state.windows.len() < state.open_windows {
                    state.windows.push(HashMap::new());
                }
            }
            Effect::CloseWindow => {
                state.open_windows = state.open_windows.saturating_sub(1).max(1);
            }
            Effect::Reveal {
                window,
                frames,
                selector,
            } => {
                while state.windows.len() <= *window {
                    state.windows.push(HashMap::new());
                }
                let key = scoped_key(frames, selector);
                state.windows[*window]
                    .entry(key)
                    .and_modify(|node| node.polls_remaining = 0)
                    .or_insert_with(|| NodeState {
                        spec: NodeSpec::default(),
                        polls_remaining: 0,
                    });
            }
        }
    }
}

/// Scripted DOM backend. Cloning shares the underlying page state, so a
/// test can keep a handle for assertions while the session drives it.
#[derive(Clone)]
pub struct ScriptedBackend {
    state: Arc<Mutex<ScriptedState>>,
}

impl ScriptedBackend {
    pub fn new(initial_url: impl Into<String>) -> Self {
        Self {
            state: Arc::new(Mutex::new(ScriptedState {
                url: initial_url.into(),
                redirects: HashMap::new(),
                windows: vec![HashMap::new()],
                open_windows: 1,
                current_window: 0,
                frame_path: Vec::new(),
                focused: None,
                journal: Vec::new(),
                quit: false,
            })),
        }
    }

    /// Registers a node reachable in `window` after entering `frames`.
    pub fn install(
        &self,
        window: usize,
        frames: &[&str],
        selector: impl Into<Selector>,
        spec: NodeSpec,
    ) {
        let frames: Vec<String> = frames.iter().map(|s| s.to_string()).collect();
        let key = scoped_key(&frames, &selector.into().key());
        let mut state = lock(&self.state);
        while state.windows.len() <= window {
            state.windows.push(HashMap::new());
        }
        let polls = spec.appears_after;
        state.windows[window].insert(
            key,
            NodeState {
                spec,
                polls_remaining: polls,
            },
        );
    }

    /// Registers a node found by a scoped (descendant) lookup under a
    /// previously installed parent.
    pub fn install_under(
        &self,
        window: usize,
        frames: &[&str],
        parent: impl Into<Selector>,
        child: impl Into<Selector>,
        spec: NodeSpec,
    ) {
        let frames_owned: Vec<String> = frames.iter().map(|s| s.to_string()).collect();
        let parent_key = scoped_key(&frames_owned, &parent.into().key());
        let key = format!("{parent_key} {}", child.into().key());
        let mut state = lock(&self.state);
        while state.windows.len() <= window {
            state.windows.push(HashMap::new());
        }
        let polls = spec.appears_after;
        state.windows[window].insert(
            key,
            NodeState {
                spec,
                polls_remaining: polls,
            },
        );
    }

    /// Makes navigation to `requested` land on `lands_on` instead, the
    /// way an unauthenticated session gets bounced to a login screen.
    pub fn redirect(&self, requested: impl Into<String>, lands_on: impl Into<String>) {
        lock(&self.state)
            .redirects
            .insert(requested.into(), lands_on.into());
    }

    pub fn journal(&self) -> Vec<ActionRecord> {
        lock(&self.state).journal.clone()
    }

    pub fn is_quit(&self) -> bool {
        lock(&self.state).quit
    }

    /// True if some click landed on a target whose key contains `what`.
    pub fn clicked(&self, what: &str) -> bool {
        self.journal().iter().any(|record| {
            matches!(record, ActionRecord::Click { target } if target.contains(what))
        })
    }

    /// All text typed into targets whose key contains `what`.
    pub fn typed_into(&self, what: &str) -> Vec<String> {
        self.journal()
            .iter()
            .filter_map(|record| match record {
                ActionRecord::TypeText { target, text } if target.contains(what) => {
                    Some(text.clone())
                }
                _ => None,
            })
            .collect()
    }

    fn element(&self, window: usize, key: String, selector_key: String) -> Element {
        Element::new(Box::new(ScriptedElement {
            state: self.state.clone(),
            window,
            key,
            selector_key,
        }))
    }
}

#[async_trait::async_trait]
impl DomBackend for ScriptedBackend {
    async fn navigate(&self, url: &str) -> Result<(), AutomationError> {
        let mut state = lock(&self.state);
        state.url = state
            .redirects
            .get(url)
            .cloned()
            .unwrap_or_else(|| url.to_string());
        state.journal.push(ActionRecord::Navigate {
            url: url.to_string(),
        });
        Ok(())
    }

    async fn current_url(&self) -> Result<String, AutomationError> {
        Ok(lock(&self.state).url.clone())
    }

    async fn try_find(&self, selector: &Selector) -> Result<Option<Element>, AutomationError> {
        let (window, key) = {
            let mut state = lock(&self.state);
            let window = state.current_window;
            let key = scoped_key(&state.frame_path, &selector.key());
            match state.windows[window].get_mut(&key) {
                None => return Ok(None),
                Some(node) if node.polls_remaining > 0 => {
                    node.polls_remaining -= 1;
                    return Ok(None);
                }
                Some(_) => {}
            }
            (window, key)
        };
        Ok(Some(self.element(window, key, selector.key())))
    }

    async fn try_find_all(&self, selector: &Selector) -> Result<Vec<Element>, AutomationError> {
        Ok(self
            .try_find(selector)
            .await?
            .into_iter()
            .collect())
    }

    async fn enter_frame(&self, frame: &Element) -> Result<(), AutomationError> {
        let inner = frame
            .impl_ref()
            .as_any()
            .downcast_ref::<ScriptedElement>()
            .ok_or_else(|| {
                AutomationError::ContextError(format!(
                    "element {} does not belong to this backend",
                    frame.description()
                ))
            })?;
        let mut state = lock(&self.state);
        state.frame_path.push(inner.selector_key.clone());
        state.journal.push(ActionRecord::EnterFrame {
            frame: inner.selector_key.clone(),
        });
        Ok(())
    }

    async fn leave_frame(&self) -> Result<(), AutomationError> {
        let mut state = lock(&self.state);
        if state.frame_path.pop().is_none() {
            return Err(AutomationError::ContextError(
                "leave_frame at default content".to_string(),
            ));
        }
        state.journal.push(ActionRecord::LeaveFrame);
        Ok(())
    }

    async fn switch_window(&self, ordinal: WindowOrdinal) -> Result<(), AutomationError> {
        let mut state = lock(&self.state);
        let index = match ordinal {
            WindowOrdinal::First => 0,
            WindowOrdinal::Last => state.open_windows.saturating_sub(1),
            WindowOrdinal::Index(i) => i,
        };
        if index >= state.open_windows {
            return Err(AutomationError::ContextError(format!(
                "{ordinal} does not exist ({} window(s) open)",
                state.open_windows
            )));
        }
        state.current_window = index;
        state.frame_path.clear();
        state.focused = None;
        state.journal.push(ActionRecord::SwitchWindow { index });
        Ok(())
    }

    async fn send_key(&self, key: Key) -> Result<(), AutomationError> {
        let mut state = lock(&self.state);
        state.journal.push(ActionRecord::Key { key });
        Ok(())
    }

    async fn perform(&self, gesture: &Gesture) -> Result<(), AutomationError> {
        let mut pointer: Option<String> = None;
        for step in gesture.steps() {
            match step {
                GestureStep::MoveTo(element) => {
                    let inner = element
                        .impl_ref()
                        .as_any()
                        .downcast_ref::<ScriptedElement>()
                        .ok_or_else(|| {
                            AutomationError::ContextError(format!(
                                "element {} does not belong to this backend",
                                element.description()
                            ))
                        })?;
                    let mut state = lock(&self.state);
                    state.journal.push(ActionRecord::Hover {
                        target: inner.key.clone(),
                    });
                    pointer = Some(inner.key.clone());
                }
                GestureStep::Click => {
                    let mut state = lock(&self.state);
                    let target = pointer
                        .clone()
                        .or_else(|| state.focused.clone())
                        .unwrap_or_else(|| "pointer".to_string());
                    state.journal.push(ActionRecord::Click {
                        target: target.clone(),
                    });
                    state.focused = Some(target.clone());
                    let effects: Vec<Effect> = state
                        .windows
                        .iter()
                        .find_map(|w| w.get(&target))
                        .map(|node| node.spec.on_click.clone())
                        .unwrap_or_default();
                    apply_effects(&mut state, &effects);
                }
                GestureStep::TypeText(text) => {
                    let mut state = lock(&self.state);
                    let target = state
                        .focused
                        .clone()
                        .unwrap_or_else(|| "focused".to_string());
                    state.journal.push(ActionRecord::TypeText {
                        target,
                        text: text.clone(),
                    });
                }
                GestureStep::Press(key) => {
                    let mut state = lock(&self.state);
                    state.journal.push(ActionRecord::Key { key: *key });
                }
            }
        }
        Ok(())
    }

    async fn quit(&self) -> Result<(), AutomationError> {
        let mut state = lock(&self.state);
        state.quit = true;
        state.journal.push(ActionRecord::Quit);
        Ok(())
    }
}

/// Element handle into the scripted page.
struct ScriptedElement {
    state: Arc<Mutex<ScriptedState>>,
    window: usize,
    /// Full scoped lookup key (frames + ancestors + selector).
    key: String,
    /// The bare selector key, used when this element is entered as a
    /// frame.
    selector_key: String,
}

impl std::fmt::Debug for ScriptedElement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptedElement")
            .field("window", &self.window)
            .field("key", &self.key)
            .finish()
    }
}

impl ScriptedElement {
    fn with_node<T>(
        &self,
        f: impl FnOnce(&NodeState) -> T,
    ) -> Result<T, AutomationError> {
        let state = lock(&self.state);
        state.windows[self.window]
            .get(&self.key)
            .map(f)
            .ok_or_else(|| {
                AutomationError::NotInteractable(format!("{} is no longer present", self.key))
            })
    }

    fn interactable(&self) -> Result<(), AutomationError> {
        let (visible, enabled) =
            self.with_node(|node| (node.spec.visible, node.spec.enabled))?;
        if !visible || !enabled {
            return Err(AutomationError::NotInteractable(format!(
                "{} is present but not interactable",
                self.key
            )));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl ElementImpl for ScriptedElement {
    async fn click(&self) -> Result<(), AutomationError> {
        self.interactable()?;
        let effects = self.with_node(|node| node.spec.on_click.clone())?;
        let mut state = lock(&self.state);
        state.journal.push(ActionRecord::Click {
            target: self.key.clone(),
        });
        state.focused = Some(self.key.clone());
        apply_effects(&mut state, &effects);
        Ok(())
    }

    async fn type_text(&self, text: &str) -> Result<(), AutomationError> {
        self.interactable()?;
        let mut state = lock(&self.state);
        state.journal.push(ActionRecord::TypeText {
            target: self.key.clone(),
            text: text.to_string(),
        });
        state.focused = Some(self.key.clone());
        Ok(())
    }

    async fn hover(&self) -> Result<(), AutomationError> {
        self.with_node(|_| ())?;
        let mut state = lock(&self.state);
        state.journal.push(ActionRecord::Hover {
            target: self.key.clone(),
        });
        Ok(())
    }

    async fn clear(&self) -> Result<(), AutomationError> {
        self.interactable()?;
        let mut state = lock(&self.state);
        state.journal.push(ActionRecord::Clear {
            target: self.key.clone(),
        });
        Ok(())
    }

    async fn text(&self) -> Result<String, AutomationError> {
        self.with_node(|node| node.spec.text.clone())
    }

    async fn attr(&self, name: &str) -> Result<Option<String>, AutomationError> {
        match name {
            "value" => self.with_node(|node| node.spec.value.clone()),
            _ => Ok(None),
        }
    }

    async fn is_visible(&self) -> Result<bool, AutomationError> {
        self.with_node(|node| node.spec.visible)
    }

    async fn is_enabled(&self) -> Result<bool, AutomationError> {
        self.with_node(|node| node.spec.enabled)
    }

    async fn try_find(&self, selector: &Selector) -> Result<Option<Element>, AutomationError> {
        let key = format!("{} {}", self.key, selector.key());
        let mut state = lock(&self.state);
        match state.windows[self.window].get_mut(&key) {
            None => Ok(None),
            Some(node) if node.polls_remaining > 0 => {
                node.polls_remaining -= 1;
                Ok(None)
            }
            Some(_) => Ok(Some(Element::new(Box::new(ScriptedElement {
                state: self.state.clone(),
                window: self.window,
                key,
                selector_key: selector.key(),
            })))),
        }
    }

    async fn try_find_all(&self, selector: &Selector) -> Result<Vec<Element>, AutomationError> {
        Ok(self.try_find(selector).await?.into_iter().collect())
    }

    fn description(&self) -> String {
        format!("w{} {}", self.window, self.key)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn clone_box(&self) -> Box<dyn ElementImpl> {
        Box::new(ScriptedElement {
            state: self.state.clone(),
            window: self.window,
            key: self.key.clone(),
            selector_key: self.selector_key.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn absent_node_probes_as_none() {
        let backend = ScriptedBackend::new("about:blank");
        let found = backend
            .try_find(&Selector::css("input[type='email']"))
            .await
            .unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn node_appears_after_configured_polls() {
        let backend = ScriptedBackend::new("about:blank");
        backend.install(
            0,
            &[],
            "text:Save",
            NodeSpec::new().appears_after(2),
        );
        let sel = Selector::from("text:Save");
        assert!(backend.try_find(&sel).await.unwrap().is_none());
        assert!(backend.try_find(&sel).await.unwrap().is_none());
        assert!(backend.try_find(&sel).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn click_on_disabled_node_is_not_interactable() {
        let backend = ScriptedBackend::new("about:blank");
        backend.install(0, &[], "button#go", NodeSpec::new().disabled());
        let el = backend
            .try_find(&Selector::css("button#go"))
            .await
            .unwrap()
            .unwrap();
        let err = el.click().await.unwrap_err();
        assert!(matches!(err, AutomationError::NotInteractable(_)));
    }

    #[tokio::test]
    async fn click_effect_opens_a_window() {
        let backend = ScriptedBackend::new("about:blank");
        backend.install(
            0,
            &[],
            "text:New Allocation",
            NodeSpec::new().on_click(Effect::OpenWindow),
        );
        let el = backend
            .try_find(&Selector::from("text:New Allocation"))
            .await
            .unwrap()
            .unwrap();
        el.click().await.unwrap();
        backend.switch_window(WindowOrdinal::Last).await.unwrap();
        assert!(backend
            .journal()
            .contains(&ActionRecord::SwitchWindow { index: 1 }));
    }

    #[tokio::test]
    async fn frame_scoping_changes_lookup_keys() {
        let backend = ScriptedBackend::new("about:blank");
        backend.install(0, &[], "iframe[name='a']", NodeSpec::new());
        backend.install(0, &["iframe[name='a']"], "input#inner", NodeSpec::new());

        // Not visible from the top context.
        assert!(backend
            .try_find(&Selector::css("input#inner"))
            .await
            .unwrap()
            .is_none());

        let frame = backend
            .try_find(&Selector::css("iframe[name='a']"))
            .await
            .unwrap()
            .unwrap();
        backend.enter_frame(&frame).await.unwrap();
        assert!(backend
            .try_find(&Selector::css("input#inner"))
            .await
            .unwrap()
            .is_some());

        backend.leave_frame().await.unwrap();
        assert!(backend
            .try_find(&Selector::css("input#inner"))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn journal_records_typed_text() {
        let backend = ScriptedBackend::new("about:blank");
        backend.install(0, &[], "input#name", NodeSpec::new());
        let el = backend
            .try_find(&Selector::css("input#name"))
            .await
            .unwrap()
            .unwrap();
        el.type_text("Jane Doe").await.unwrap();
        assert_eq!(backend.typed_into("input#name"), vec!["Jane Doe"]);
    }
}
