use serde::{Deserialize, Serialize};
use xqdoc_path::BareVariablePolicy;

/// Configuration for an execution run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExecutionConfig {
    /// How a bare `$x` reference is projected.
    pub bare_variable: BareVariablePolicy,
    /// If true, rows of a virtual document must carry exactly its declared
    /// columns.
    pub strict: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ExecutionConfig::default();
        assert_eq!(config.bare_variable, BareVariablePolicy::Reject);
        assert!(!config.strict);
    }

    #[test]
    fn test_deserialize_camel_case_with_missing_fields() {
        let config: ExecutionConfig =
            serde_json::from_str(r#"{ "bareVariable": "coerceToText" }"#).unwrap();
        assert_eq!(config.bare_variable, BareVariablePolicy::CoerceToText);
        assert!(!config.strict);

        let config: ExecutionConfig = serde_json::from_str(r#"{ "strict": true }"#).unwrap();
        assert!(config.strict);
    }
}
