//! Live backend speaking the WebDriver protocol via fantoccini.

use crate::actions::{Gesture, GestureStep, Key};
use crate::backend::DomBackend;
use crate::context::WindowOrdinal;
use crate::element::{Element, ElementImpl};
use crate::errors::AutomationError;
use crate::selector::Selector;
use fantoccini::actions::{
    InputSource, KeyAction, KeyActions, MouseActions, PointerAction, MOUSE_BUTTON_LEFT,
};
use fantoccini::error::CmdError;
use fantoccini::key::Key as WdKey;
use fantoccini::{Client, ClientBuilder, Locator};
use serde_json::json;
use std::any::Any;
use tracing::{debug, info};

/// Engine backend over a remote WebDriver endpoint (chromedriver,
/// geckodriver, or a Selenium grid).
pub struct WebDriverBackend {
    client: Client,
}

impl WebDriverBackend {
    /// Opens a fresh browser session against `webdriver_url`.
    pub async fn connect(webdriver_url: &str, headless: bool) -> Result<Self, AutomationError> {
        let mut caps = serde_json::map::Map::new();
        if headless {
            caps.insert(
                "goog:chromeOptions".to_string(),
                json!({ "args": ["--headless=new", "--window-size=1600,1200"] }),
            );
        }

        let mut builder = ClientBuilder::native();
        builder.capabilities(caps);
        let client = builder.connect(webdriver_url).await.map_err(|e| {
            AutomationError::Session(format!(
                "failed to open WebDriver session at {webdriver_url}: {e}"
            ))
        })?;
        info!(%webdriver_url, headless, "browser session opened");
        Ok(Self { client })
    }

    async fn raw_find(
        &self,
        selector: &Selector,
    ) -> Result<Option<fantoccini::elements::Element>, AutomationError> {
        let query = wire_query(selector);
        let result = self.client.find(query.as_locator()).await;
        absent_as_none(result, selector)
    }

    async fn raw_find_all(
        &self,
        selector: &Selector,
    ) -> Result<Vec<fantoccini::elements::Element>, AutomationError> {
        let query = wire_query(selector);
        match self.client.find_all(query.as_locator()).await {
            Ok(elements) => Ok(elements),
            Err(e) if e.is_no_such_element() => Ok(Vec::new()),
            Err(e) => Err(transport_error("find_all", &selector.key(), e)),
        }
    }

    fn wrap(&self, element: fantoccini::elements::Element, description: String) -> Element {
        Element::new(Box::new(WebDriverElement {
            client: self.client.clone(),
            element,
            description,
        }))
    }
}

/// Owned query string plus the locator flavor to present it as.
/// `fantoccini::Locator` borrows, so the string has to live somewhere.
struct WireQuery {
    xpath: bool,
    query: String,
}

impl WireQuery {
    fn as_locator(&self) -> Locator<'_> {
        if self.xpath {
            Locator::XPath(&self.query)
        } else {
            Locator::Css(&self.query)
        }
    }
}

fn wire_query(selector: &Selector) -> WireQuery {
    match selector {
        Selector::Css(s) => WireQuery {
            xpath: false,
            query: s.clone(),
        },
        Selector::XPath(s) => WireQuery {
            xpath: true,
            query: s.clone(),
        },
        Selector::Text(t) => WireQuery {
            xpath: true,
            query: format!("//*[text()={}]", xpath_literal(t)),
        },
    }
}

/// Quotes arbitrary text for embedding in an XPath expression.
fn xpath_literal(text: &str) -> String {
    if !text.contains('\'') {
        format!("'{text}'")
    } else if !text.contains('"') {
        format!("\"{text}\"")
    } else {
        // Mixed quotes: stitch the pieces together with concat().
        let parts: Vec<String> = text
            .split('\'')
            .map(|part| format!("'{part}'"))
            .collect();
        format!("concat({})", parts.join(", \"'\", "))
    }
}

fn absent_as_none(
    result: Result<fantoccini::elements::Element, CmdError>,
    selector: &Selector,
) -> Result<Option<fantoccini::elements::Element>, AutomationError> {
    match result {
        Ok(element) => Ok(Some(element)),
        Err(e) if e.is_no_such_element() => Ok(None),
        Err(e) => Err(transport_error("find", &selector.key(), e)),
    }
}

fn transport_error(what: &str, target: &str, e: CmdError) -> AutomationError {
    AutomationError::Session(format!("{what} on {target}: {e}"))
}

fn action_error(what: &str, target: &str, e: CmdError) -> AutomationError {
    let message = e.to_string();
    // The driver reports stale or covered elements as distinct W3C error
    // codes; both mean "located but unusable" to the engine.
    if message.contains("interactable")
        || message.contains("intercepted")
        || message.contains("stale")
    {
        AutomationError::NotInteractable(format!("{what} on {target}: {message}"))
    } else {
        AutomationError::Session(format!("{what} on {target}: {message}"))
    }
}

fn key_char(key: Key) -> char {
    match key {
        Key::Enter => WdKey::Enter.into(),
        Key::Tab => WdKey::Tab.into(),
        Key::Escape => WdKey::Escape.into(),
    }
}

#[async_trait::async_trait]
impl DomBackend for WebDriverBackend {
    async fn navigate(&self, url: &str) -> Result<(), AutomationError> {
        debug!(%url, "navigate");
        self.client
            .goto(url)
            .await
            .map_err(|e| AutomationError::Session(format!("navigate to {url}: {e}")))
    }

    async fn current_url(&self) -> Result<String, AutomationError> {
        let url = self
            .client
            .current_url()
            .await
            .map_err(|e| AutomationError::Session(format!("current_url: {e}")))?;
        Ok(url.to_string())
    }

    async fn try_find(&self, selector: &Selector) -> Result<Option<Element>, AutomationError> {
        Ok(self
            .raw_find(selector)
            .await?
            .map(|el| self.wrap(el, selector.key())))
    }

    async fn try_find_all(&self, selector: &Selector) -> Result<Vec<Element>, AutomationError> {
        let elements = self.raw_find_all(selector).await?;
        Ok(elements
            .into_iter()
            .enumerate()
            .map(|(i, el)| self.wrap(el, format!("{}[{i}]", selector.key())))
            .collect())
    }

    async fn enter_frame(&self, frame: &Element) -> Result<(), AutomationError> {
        let inner = downcast(frame)?;
        let _ = inner
            .element
            .clone()
            .enter_frame()
            .await
            .map_err(|e| {
                AutomationError::ContextError(format!(
                    "enter frame {}: {e}",
                    frame.description()
                ))
            })?;
        Ok(())
    }

    async fn leave_frame(&self) -> Result<(), AutomationError> {
        let _ = self
            .client
            .clone()
            .enter_parent_frame()
            .await
            .map_err(|e| AutomationError::ContextError(format!("leave frame: {e}")))?;
        Ok(())
    }

    async fn switch_window(&self, ordinal: WindowOrdinal) -> Result<(), AutomationError> {
        let handles = self
            .client
            .windows()
            .await
            .map_err(|e| AutomationError::Session(format!("list windows: {e}")))?;
        let index = match ordinal {
            WindowOrdinal::First => 0,
            WindowOrdinal::Last => handles.len().saturating_sub(1),
            WindowOrdinal::Index(i) => i,
        };
        let handle = handles.get(index).cloned().ok_or_else(|| {
            AutomationError::ContextError(format!(
                "{ordinal} does not exist ({} window(s) open)",
                handles.len()
            ))
        })?;
        self.client
            .switch_to_window(handle)
            .await
            .map_err(|e| AutomationError::ContextError(format!("switch to {ordinal}: {e}")))
    }

    async fn send_key(&self, key: Key) -> Result<(), AutomationError> {
        let value = key_char(key);
        let actions = KeyActions::new("keyboard".to_string())
            .then(KeyAction::Down { value })
            .then(KeyAction::Up { value });
        self.client
            .perform_actions(actions)
            .await
            .map_err(|e| action_error("send_key", "focused element", e))
    }

    async fn perform(&self, gesture: &Gesture) -> Result<(), AutomationError> {
        // Each step becomes its own input sequence; the driver executes
        // them strictly in order, which is all the workflow needs.
        for step in gesture.steps() {
            match step {
                GestureStep::MoveTo(element) => {
                    let inner = downcast(element)?;
                    let actions =
                        MouseActions::new("mouse".to_string()).then(PointerAction::MoveToElement {
                            element: inner.element.clone(),
                            duration: None,
                            x: 0,
                            y: 0,
                        });
                    self.client
                        .perform_actions(actions)
                        .await
                        .map_err(|e| action_error("move_to", &element.description(), e))?;
                }
                GestureStep::Click => {
                    let actions = MouseActions::new("mouse".to_string())
                        .then(PointerAction::Down {
                            button: MOUSE_BUTTON_LEFT,
                        })
                        .then(PointerAction::Up {
                            button: MOUSE_BUTTON_LEFT,
                        });
                    self.client
                        .perform_actions(actions)
                        .await
                        .map_err(|e| action_error("click", "pointer position", e))?;
                }
                GestureStep::TypeText(text) => {
                    let mut actions = KeyActions::new("keyboard".to_string());
                    for ch in text.chars() {
                        actions = actions
                            .then(KeyAction::Down { value: ch })
                            .then(KeyAction::Up { value: ch });
                    }
                    self.client
                        .perform_actions(actions)
                        .await
                        .map_err(|e| action_error("type_text", "focused element", e))?;
                }
                GestureStep::Press(key) => {
                    self.send_key(*key).await?;
                }
            }
        }
        Ok(())
    }

    async fn quit(&self) -> Result<(), AutomationError> {
        info!("closing browser session");
        self.client
            .clone()
            .close()
            .await
            .map_err(|e| AutomationError::Session(format!("close session: {e}")))
    }
}

/// Element handle bound to the live session.
pub struct WebDriverElement {
    client: Client,
    element: fantoccini::elements::Element,
    description: String,
}

impl std::fmt::Debug for WebDriverElement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebDriverElement")
            .field("description", &self.description)
            .finish()
    }
}

fn downcast(element: &Element) -> Result<&WebDriverElement, AutomationError> {
    element
        .impl_ref()
        .as_any()
        .downcast_ref::<WebDriverElement>()
        .ok_or_else(|| {
            AutomationError::Session(format!(
                "element {} does not belong to this backend",
                element.description()
            ))
        })
}

#[async_trait::async_trait]
impl ElementImpl for WebDriverElement {
    async fn click(&self) -> Result<(), AutomationError> {
        self.element
            .click()
            .await
            .map_err(|e| action_error("click", &self.description, e))
    }

    async fn type_text(&self, text: &str) -> Result<(), AutomationError> {
        // WebDriver's element sendKeys dispatches real key events.
        self.element
            .send_keys(text)
            .await
            .map_err(|e| action_error("type_text", &self.description, e))
    }

    async fn hover(&self) -> Result<(), AutomationError> {
        let actions =
            MouseActions::new("mouse".to_string()).then(PointerAction::MoveToElement {
                element: self.element.clone(),
                duration: None,
                x: 0,
                y: 0,
            });
        self.client
            .perform_actions(actions)
            .await
            .map_err(|e| action_error("hover", &self.description, e))
    }

    async fn clear(&self) -> Result<(), AutomationError> {
        self.element
            .clear()
            .await
            .map_err(|e| action_error("clear", &self.description, e))
    }

    async fn text(&self) -> Result<String, AutomationError> {
        self.element
            .text()
            .await
            .map_err(|e| transport_error("text", &self.description, e))
    }

    async fn attr(&self, name: &str) -> Result<Option<String>, AutomationError> {
        self.element
            .attr(name)
            .await
            .map_err(|e| transport_error("attr", &self.description, e))
    }

    async fn is_visible(&self) -> Result<bool, AutomationError> {
        self.element
            .is_displayed()
            .await
            .map_err(|e| transport_error("is_visible", &self.description, e))
    }

    async fn is_enabled(&self) -> Result<bool, AutomationError> {
        self.element
            .is_enabled()
            .await
            .map_err(|e| transport_error("is_enabled", &self.description, e))
    }

    async fn try_find(&self, selector: &Selector) -> Result<Option<Element>, AutomationError> {
        let query = wire_query(selector);
        let result = self.element.find(query.as_locator()).await;
        let child = absent_as_none(result, selector)?;
        Ok(child.map(|el| {
            Element::new(Box::new(WebDriverElement {
                client: self.client.clone(),
                element: el,
                description: format!("{} {}", self.description, selector.key()),
            }))
        }))
    }

    async fn try_find_all(&self, selector: &Selector) -> Result<Vec<Element>, AutomationError> {
        let query = wire_query(selector);
        let elements = match self.element.find_all(query.as_locator()).await {
            Ok(elements) => elements,
            Err(e) if e.is_no_such_element() => Vec::new(),
            Err(e) => return Err(transport_error("find_all", &self.description, e)),
        };
        Ok(elements
            .into_iter()
            .enumerate()
            .map(|(i, el)| {
                Element::new(Box::new(WebDriverElement {
                    client: self.client.clone(),
                    element: el,
                    description: format!("{} {}[{i}]", self.description, selector.key()),
                }))
            })
            .collect())
    }

    fn description(&self) -> String {
        self.description.clone()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn clone_box(&self) -> Box<dyn ElementImpl> {
        Box::new(WebDriverElement {
            client: self.client.clone(),
            element: self.element.clone(),
            description: self.description.clone(),
        })
    }
}
