use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PathError {
    #[error("Path parse error in '{0}': {1}")]
    Parse(String, String),

    #[error("step '{step}' of '{path}' is not present in the row")]
    NotPresent { path: String, step: String },

    #[error("step '{step}' of '{path}' is not a scalar: {matches} values match")]
    Ambiguous {
        path: String,
        step: String,
        matches: usize,
    },

    #[error("'{0}' has no scalar step; bare variable references are rejected")]
    BareVariable(String),
}
