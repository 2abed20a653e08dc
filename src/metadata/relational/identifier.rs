use std::fmt;

/// A database object name, possibly quoted.
///
/// Mapping text quotes a name by enclosing it in back-ticks (`` `Order` ``). Quoted names keep
/// their case and are rendered with quotes in generated SQL.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Identifier {
    text: String,
    quoted: bool,
}

impl Identifier {
    /// Create an identifier
    pub fn new(text: impl Into<String>, quoted: bool) -> Self {
        Identifier {
            text: text.into(),
            quoted,
        }
    }

    /// Parse mapping text, recognizing back-tick quoting
    ///
    /// ## Arguments
    /// * 'text' - The name as written in the mapping
    #[must_use]
    pub fn to_identifier(text: &str) -> Identifier {
        Self::to_identifier_quoted(text, false)
    }

    /// Parse mapping text, forcing quoting when `force_quote` is set
    ///
    /// ## Arguments
    /// * 'text'        - The name as written in the mapping
    /// * 'force_quote' - Quote even without back-ticks (globally quoted identifiers)
    #[must_use]
    pub fn to_identifier_quoted(text: &str, force_quote: bool) -> Identifier {
        let trimmed = text.trim();
        if trimmed.len() > 1 && trimmed.starts_with('`') && trimmed.ends_with('`') {
            Identifier::new(&trimmed[1..trimmed.len() - 1], true)
        } else {
            Identifier::new(trimmed, force_quote)
        }
    }

    /// The name without quotes
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Whether the name is quoted
    #[must_use]
    pub fn is_quoted(&self) -> bool {
        self.quoted
    }

    /// Render for SQL with the given quote characters
    #[must_use]
    pub fn render(&self, open: char, close: char) -> String {
        if self.quoted {
            format!("{open}{}{close}", self.text)
        } else {
            self.text.clone()
        }
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.quoted {
            write!(f, "`{}`", self.text)
        } else {
            f.write_str(&self.text)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backtick_quoting() {
        let id = Identifier::to_identifier("`Order`");
        assert!(id.is_quoted());
        assert_eq!(id.text(), "Order");
        assert_eq!(id.to_string(), "`Order`");
        assert_eq!(id.render('"', '"'), "\"Order\"");
    }

    #[test]
    fn test_forced_quoting() {
        let id = Identifier::to_identifier_quoted("ORDERS", true);
        assert!(id.is_quoted());
        assert!(!Identifier::to_identifier("ORDERS").is_quoted());
        assert!(!Identifier::to_identifier("`").is_quoted());
    }
}
