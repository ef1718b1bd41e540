//! Renders an `AssembledDocument` as canonical XML text.
//!
//! Output is the XML declaration followed by the tree with no indentation
//! and no whitespace between nodes. Childless elements self-close.

use crate::error::ExecuteError;
use crate::output::{AssembledDocument, AssembledNode, NodeId};
use quick_xml::Writer;
use quick_xml::escape::partial_escape;
use quick_xml::events::attributes::Attribute;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::name::QName;
use std::borrow::Cow;

enum Visit {
    Enter(NodeId),
    Exit(NodeId),
}

pub fn serialize(document: &AssembledDocument) -> Result<String, ExecuteError> {
    let mut writer = Writer::new(Vec::new());
    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .map_err(write_error)?;

    let mut stack: Vec<Visit> = document.root().map(Visit::Enter).into_iter().collect();
    while let Some(visit) = stack.pop() {
        match visit {
            Visit::Enter(id) => match document.node(id) {
                Some(AssembledNode::Text(text)) => {
                    let escaped = partial_escape(text.as_str());
                    writer
                        .write_event(Event::Text(BytesText::from_escaped(escaped)))
                        .map_err(write_error)?;
                }
                Some(AssembledNode::Element {
                    name,
                    attributes,
                    children,
                }) => {
                    let mut start = BytesStart::new(name.as_str());
                    for (key, value) in attributes {
                        start.push_attribute(Attribute {
                            key: QName(key.as_bytes()),
                            value: Cow::Owned(escape_attribute(value).into_bytes()),
                        });
                    }

                    if children.is_empty() {
                        writer.write_event(Event::Empty(start)).map_err(write_error)?;
                    } else {
                        writer.write_event(Event::Start(start)).map_err(write_error)?;
                        stack.push(Visit::Exit(id));
                        stack.extend(children.iter().rev().map(|child| Visit::Enter(*child)));
                    }
                }
                None => {
                    return Err(ExecuteError::Serialize(format!(
                        "node {} is not part of the document",
                        id.index()
                    )));
                }
            },
            Visit::Exit(id) => {
                if let Some(AssembledNode::Element { name, .. }) = document.node(id) {
                    writer
                        .write_event(Event::End(BytesEnd::new(name.as_str())))
                        .map_err(write_error)?;
                }
            }
        }
    }

    String::from_utf8(writer.into_inner()).map_err(|e| ExecuteError::Serialize(e.to_string()))
}

/// Attribute values are always double-quoted, so `"` is escaped on top of
/// `& < >`.
fn escape_attribute(value: &str) -> String {
    partial_escape(value).replace('"', "&quot;")
}

fn write_error(e: impl std::fmt::Display) -> ExecuteError {
    ExecuteError::Serialize(e.to_string())
}
