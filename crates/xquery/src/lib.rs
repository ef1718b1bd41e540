//! Compiles XQuery-style document templates and executes them against a
//! relational data source, producing canonical XML.
//!
//! ```text
//! <Items>{for $x in doc("A") return <Item>{$x/text()}</Item>}</Items>
//! ```
//!
//! Compilation parses the template, classifies every `doc(...)` reference
//! and deduplicates root-level sources into plans. Execution fetches rows,
//! assembles the output tree and serializes it.

pub mod assembler;
pub mod ast;
pub mod config;
pub mod error;
pub mod executor;
pub mod output;
pub mod parser;
pub mod planner;
pub mod processor;
pub mod resolver;
pub mod serializer;

pub use ast::DocumentTemplate;
pub use config::ExecutionConfig;
pub use error::{CompileError, ExecuteError, Location};
pub use output::{AssembledDocument, AssembledNode, NodeId, OutputBuilder, TreeBuilder};
pub use parser::parse_template;
pub use planner::{Plan, PlanTable};
pub use processor::{CompiledDocument, compile};
pub use resolver::SourceResolver;
pub use serializer::serialize;
