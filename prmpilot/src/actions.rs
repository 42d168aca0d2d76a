use crate::element::Element;

/// A single keyboard key, sent to whatever currently has focus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    Enter,
    Tab,
    Escape,
}

/// One step of a composite gesture.
#[derive(Debug, Clone)]
pub enum GestureStep {
    /// Move the virtual pointer over an element.
    MoveTo(Element),
    /// Press and release the primary button at the current pointer spot.
    Click,
    /// Emit text as discrete key events to the focused element.
    TypeText(String),
    /// Emit a single key to the focused element.
    Press(Key),
}

/// A composite pointer/keyboard gesture.
///
/// Some widgets in the target application reject direct input: the text
/// field only accepts keys after a real pointer click landed on it. A
/// gesture strings move / click / type together so they execute as one
/// scripted interaction against the live page.
#[derive(Debug, Clone, Default)]
pub struct Gesture {
    steps: Vec<GestureStep>,
}

impl Gesture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn move_to(mut self, element: &Element) -> Self {
        self.steps.push(GestureStep::MoveTo(element.clone()));
        self
    }

    pub fn click(mut self) -> Self {
        self.steps.push(GestureStep::Click);
        self
    }

    pub fn type_text(mut self, text: impl Into<String>) -> Self {
        self.steps.push(GestureStep::TypeText(text.into()));
        self
    }

    pub fn press(mut self, key: Key) -> Self {
        self.steps.push(GestureStep::Press(key));
        self
    }

    pub fn steps(&self) -> &[GestureStep] {
        &self.steps
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}
