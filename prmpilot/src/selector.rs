use std::fmt;

/// Represents ways to locate an element in the current browsing context.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Selector {
    /// CSS structural query.
    Css(String),
    /// XPath query.
    XPath(String),
    /// Exact visible text match (resolved as `//*[text()='...']`).
    Text(String),
}

impl Selector {
    pub fn css(s: impl Into<String>) -> Self {
        Selector::Css(s.into())
    }

    pub fn xpath(s: impl Into<String>) -> Self {
        Selector::XPath(s.into())
    }

    pub fn text(s: impl Into<String>) -> Self {
        Selector::Text(s.into())
    }

    /// A `<option value='...'>` query, the most common parameterized
    /// locate in the data-entry screens.
    pub fn option_value(value: &str) -> Self {
        Selector::Css(format!("option[value='{value}']"))
    }

    /// Canonical string form, stable across backends. Used as the lookup
    /// key by the scripted backend and in diagnostics.
    pub fn key(&self) -> String {
        match self {
            Selector::Css(s) => s.clone(),
            Selector::XPath(s) => format!("xpath:{s}"),
            Selector::Text(s) => format!("text:{s}"),
        }
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}

impl From<&str> for Selector {
    fn from(s: &str) -> Self {
        if let Some(rest) = s.strip_prefix("text:") {
            return Selector::Text(rest.to_string());
        }
        if let Some(rest) = s.strip_prefix("xpath:") {
            return Selector::XPath(rest.to_string());
        }
        // Bare XPath is recognizable by its leading axis
        if s.starts_with("//") || s.starts_with("(//") {
            return Selector::XPath(s.to_string());
        }
        Selector::Css(s.to_string())
    }
}

impl From<String> for Selector {
    fn from(s: String) -> Self {
        Selector::from(s.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_parsing() {
        assert_eq!(
            Selector::from("text:Save"),
            Selector::Text("Save".to_string())
        );
        assert_eq!(
            Selector::from("xpath://label[text()='X']"),
            Selector::XPath("//label[text()='X']".to_string())
        );
        assert_eq!(
            Selector::from("//button/span"),
            Selector::XPath("//button/span".to_string())
        );
        assert_eq!(
            Selector::from("input[type='email']"),
            Selector::Css("input[type='email']".to_string())
        );
    }

    #[test]
    fn option_value_builds_css() {
        assert_eq!(
            Selector::option_value("jdoe"),
            Selector::Css("option[value='jdoe']".to_string())
        );
    }

    #[test]
    fn key_roundtrips_through_from() {
        let sel = Selector::Text("New Allocation".to_string());
        assert_eq!(Selector::from(sel.key().as_str()), sel);
    }
}
