//! Defines the closed AST for scalar path expressions.

use std::fmt;

/// A path rooted at a bound variable, such as `$x/name/text()` or `$x/@id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathExpr {
    /// The variable name without its `$` sigil.
    pub variable: String,
    pub steps: Vec<Step>,
}

/// A single navigation step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// `name`: a child element, i.e. a column of the row.
    Child(String),
    /// `@name`: an attribute, i.e. a column of the row viewed as an attribute.
    Attribute(String),
    /// `text()`
    Text,
}

impl PathExpr {
    pub fn new(variable: impl Into<String>, steps: Vec<Step>) -> Self {
        Self {
            variable: variable.into(),
            steps,
        }
    }

    /// Checks if the path is just `$var` with no steps.
    pub fn is_bare(&self) -> bool {
        self.steps.is_empty()
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Child(name) => write!(f, "{}", name),
            Step::Attribute(name) => write!(f, "@{}", name),
            Step::Text => write!(f, "text()"),
        }
    }
}

impl fmt::Display for PathExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${}", self.variable)?;
        for step in &self.steps {
            write!(f, "/{}", step)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_round_trips_the_written_form() {
        let path = PathExpr::new(
            "x",
            vec![Step::Child("a".into()), Step::Child("b".into()), Step::Text],
        );
        assert_eq!(path.to_string(), "$x/a/b/text()");

        let attr = PathExpr::new("row", vec![Step::Attribute("id".into())]);
        assert_eq!(attr.to_string(), "$row/@id");
        assert!(!attr.is_bare());
        assert!(PathExpr::new("x", vec![]).is_bare());
    }
}
