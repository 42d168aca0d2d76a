use crate::errors::AutomationError;
use std::fmt;

/// Which top-level window a context refers to, by position in the
/// driver's handle list. The data-entry workflow only ever needs the
/// main window (first) and the most recently opened popup (last).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WindowOrdinal {
    First,
    Last,
    Index(usize),
}

impl fmt::Display for WindowOrdinal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WindowOrdinal::First => write!(f, "first window"),
            WindowOrdinal::Last => write!(f, "last window"),
            WindowOrdinal::Index(i) => write!(f, "window #{i}"),
        }
    }
}

/// The currently addressable browsing context, as a value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Context {
    /// The top-level main window, default content.
    Top,
    /// A different top-level window.
    Window(WindowOrdinal),
    /// A frame entered from a parent context.
    Frame {
        parent: Box<Context>,
        selector: String,
    },
}

impl fmt::Display for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Context::Top => write!(f, "top"),
            Context::Window(ord) => write!(f, "{ord}"),
            Context::Frame { parent, selector } => write!(f, "{parent} > frame[{selector}]"),
        }
    }
}

/// One entry on the context stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContextEntry {
    Window(WindowOrdinal),
    Frame(String),
}

/// Tracks the nesting of windows and frames entered since the last reset.
///
/// The stack is pure bookkeeping: the session performs the actual driver
/// focus switches and records them here, so that `current()` always
/// reflects exactly the nesting implied by the calls made. Popping past
/// the top is a programming error and is never retried.
#[derive(Debug, Default)]
pub struct ContextStack {
    entries: Vec<ContextEntry>,
}

impl ContextStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_window(&mut self, ordinal: WindowOrdinal) {
        self.entries.push(ContextEntry::Window(ordinal));
    }

    pub fn push_frame(&mut self, selector_key: String) {
        self.entries.push(ContextEntry::Frame(selector_key));
    }

    pub fn pop(&mut self) -> Result<ContextEntry, AutomationError> {
        self.entries.pop().ok_or_else(|| {
            AutomationError::ContextError(
                "pop without matching push: already at the top-level window".to_string(),
            )
        })
    }

    /// Drops every entry at once. Only valid as part of a return to the
    /// top-level window (e.g. after a popup closed). Returns the depth
    /// that was discarded.
    pub fn reset(&mut self) -> usize {
        let depth = self.entries.len();
        self.entries.clear();
        depth
    }

    pub fn depth(&self) -> usize {
        self.entries.len()
    }

    pub fn entries(&self) -> &[ContextEntry] {
        &self.entries
    }

    /// The context implied by the entries pushed so far.
    pub fn current(&self) -> Context {
        let mut ctx = Context::Top;
        for entry in &self.entries {
            ctx = match entry {
                // A window switch replaces the whole chain: the driver
                // lands in that window's default content.
                ContextEntry::Window(ord) => Context::Window(*ord),
                ContextEntry::Frame(sel) => Context::Frame {
                    parent: Box::new(ctx),
                    selector: sel.clone(),
                },
            };
        }
        ctx
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_at_top() {
        let stack = ContextStack::new();
        assert_eq!(stack.current(), Context::Top);
        assert_eq!(stack.depth(), 0);
    }

    #[test]
    fn push_pop_mirrors_nesting() {
        let mut stack = ContextStack::new();
        stack.push_frame("iframe[name='a']".to_string());
        stack.push_frame("frame[id='b']".to_string());
        assert_eq!(
            stack.current(),
            Context::Frame {
                parent: Box::new(Context::Frame {
                    parent: Box::new(Context::Top),
                    selector: "iframe[name='a']".to_string(),
                }),
                selector: "frame[id='b']".to_string(),
            }
        );

        stack.pop().unwrap();
        assert_eq!(
            stack.current(),
            Context::Frame {
                parent: Box::new(Context::Top),
                selector: "iframe[name='a']".to_string(),
            }
        );
        stack.pop().unwrap();
        assert_eq!(stack.current(), Context::Top);
    }

    #[test]
    fn pop_past_top_is_context_error() {
        let mut stack = ContextStack::new();
        let err = stack.pop().unwrap_err();
        assert!(matches!(err, AutomationError::ContextError(_)));
    }

    #[test]
    fn pop_never_yields_unpushed_context() {
        // Push two frames, pop one: the resulting context must be the
        // one implied by the single remaining push, nothing else.
        let mut stack = ContextStack::new();
        stack.push_frame("a".to_string());
        stack.push_frame("b".to_string());
        let seen_before_pop = stack.current();
        stack.pop().unwrap();
        let after = stack.current();
        assert_ne!(after, seen_before_pop);
        assert_eq!(
            after,
            Context::Frame {
                parent: Box::new(Context::Top),
                selector: "a".to_string(),
            }
        );
    }

    #[test]
    fn window_push_rebases_the_chain() {
        let mut stack = ContextStack::new();
        stack.push_frame("main-frame".to_string());
        stack.push_window(WindowOrdinal::Last);
        assert_eq!(stack.current(), Context::Window(WindowOrdinal::Last));
        stack.push_frame("popup-frame".to_string());
        assert_eq!(
            stack.current(),
            Context::Frame {
                parent: Box::new(Context::Window(WindowOrdinal::Last)),
                selector: "popup-frame".to_string(),
            }
        );
    }

    #[test]
    fn reset_returns_to_top_from_any_depth() {
        let mut stack = ContextStack::new();
        stack.push_window(WindowOrdinal::Last);
        stack.push_frame("a".to_string());
        stack.push_frame("b".to_string());
        assert_eq!(stack.reset(), 3);
        assert_eq!(stack.current(), Context::Top);
        assert_eq!(stack.depth(), 0);
    }
}
