//! The document template AST produced by the parser.
//!
//! A template is immutable once parsed. Everything compilation learns about
//! it afterwards (resolved sources, plan IDs) lives in side tables keyed by
//! `BindingId`, so one template can back any number of executions.

use xqdoc_path::PathExpr;
use xqdoc_types::BindingId;

#[derive(Debug, Clone, PartialEq)]
pub struct DocumentTemplate {
    /// The single root element.
    pub root: ElementTemplate,
    /// Number of `for` bindings, which are numbered `0..binding_count`.
    pub binding_count: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TemplateNode {
    Element(ElementTemplate),
    Text(ValueTemplate),
    ForBinding(ForBinding),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ElementTemplate {
    pub name: String,
    pub attributes: Vec<AttributeTemplate>,
    pub children: Vec<TemplateNode>,
}

// Drops the subtree with a work list instead of recursing per level.
impl Drop for ElementTemplate {
    fn drop(&mut self) {
        let mut pending = std::mem::take(&mut self.children);
        while let Some(node) = pending.pop() {
            match node {
                TemplateNode::Element(mut el) => pending.append(&mut el.children),
                TemplateNode::ForBinding(mut fb) => pending.append(&mut fb.body),
                TemplateNode::Text(_) => {}
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AttributeTemplate {
    pub name: String,
    pub value: ValueTemplate,
}

/// A value assembled from literal text and path projections.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ValueTemplate(pub Vec<ValuePart>);

#[derive(Debug, Clone, PartialEq)]
pub enum ValuePart {
    Literal(String),
    Path(PathExpr),
}

impl ValueTemplate {
    pub fn literal(text: impl Into<String>) -> Self {
        ValueTemplate(vec![ValuePart::Literal(text.into())])
    }

    pub fn path(path: PathExpr) -> Self {
        ValueTemplate(vec![ValuePart::Path(path)])
    }

    /// Returns the text if no part needs a row to be evaluated.
    pub fn as_literal(&self) -> Option<String> {
        let mut text = String::new();
        for part in &self.0 {
            match part {
                ValuePart::Literal(s) => text.push_str(s),
                ValuePart::Path(_) => return None,
            }
        }
        Some(text)
    }
}

/// `for $var in doc("source") nav-path return body`
#[derive(Debug, Clone, PartialEq)]
pub struct ForBinding {
    pub id: BindingId,
    /// The variable name without its `$` sigil.
    pub variable: String,
    /// The `doc(...)` argument exactly as written.
    pub source_text: String,
    /// False for `exactly-one(doc(...))`: the source must yield one row.
    pub repeating: bool,
    /// Steps written after `doc(...)`, e.g. `["rows", "row"]`.
    pub nav_path: Vec<String>,
    pub body: Vec<TemplateNode>,
    /// Byte offset of the opening `{` of the code block.
    pub position: usize,
}
