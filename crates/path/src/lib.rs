pub mod ast;
pub mod engine;
pub mod error;
pub mod parser;

pub use ast::{PathExpr, Step};
pub use engine::{BareVariablePolicy, evaluate};
pub use error::PathError;
pub use parser::{parse_path, path_expr};
