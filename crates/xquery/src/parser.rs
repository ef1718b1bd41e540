//! Reads template text into a `DocumentTemplate`.
//!
//! Markup is walked by a cursor-driven reader that tracks which variables
//! are in scope. The expression-level pieces (names, string literals, paths)
//! are `nom` parsers applied at the cursor.

use crate::ast::*;
use crate::error::CompileError;
use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::{take_while, take_while1},
    character::complete::char,
    combinator::recognize,
    sequence::{delimited, pair},
};
use quick_xml::escape::unescape;
use xqdoc_path::parser::variable_reference;
use xqdoc_path::{PathExpr, parse_path, path_expr};
use xqdoc_types::BindingId;

/// Parses a complete template: one root element, optionally surrounded by
/// whitespace, comments and an XML declaration.
pub fn parse_template(source: &str) -> Result<DocumentTemplate, CompileError> {
    let mut reader = TemplateReader::new(source);
    let root = reader.document()?;
    log::debug!(
        "Parsed template <{}> with {} binding(s)",
        root.name,
        reader.next_binding
    );
    Ok(DocumentTemplate {
        root,
        binding_count: reader.next_binding,
    })
}

// --- nom pieces ---

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '-' | '.' | ':')
}

fn xml_name(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        take_while1(|c: char| c.is_alphabetic() || c == '_' || c == ':'),
        take_while(is_name_char),
    ))
    .parse(input)
}

/// A quoted literal in which a doubled quote stands for one quote character.
fn quoted_with(input: &str, quote: char) -> IResult<&str, String> {
    let (mut rest, _) = char(quote).parse(input)?;
    let mut text = String::new();
    loop {
        let Some(end) = rest.find(quote) else {
            return Err(nom::Err::Failure(nom::error::Error::new(
                rest,
                nom::error::ErrorKind::Char,
            )));
        };
        text.push_str(&rest[..end]);
        let after = &rest[end + quote.len_utf8()..];
        match after.strip_prefix(quote) {
            Some(remaining) => {
                text.push(quote);
                rest = remaining;
            }
            None => return Ok((after, text)),
        }
    }
}

fn double_quoted(input: &str) -> IResult<&str, String> {
    quoted_with(input, '"')
}

fn single_quoted(input: &str) -> IResult<&str, String> {
    quoted_with(input, '\'')
}

fn string_literal(input: &str) -> IResult<&str, String> {
    alt((double_quoted, single_quoted)).parse(input)
}

fn raw_attribute_value(input: &str) -> IResult<&str, &str> {
    alt((
        delimited(char('"'), take_while(|c| c != '"'), char('"')),
        delimited(char('\''), take_while(|c| c != '\''), char('\'')),
    ))
    .parse(input)
}

// --- Literal text collection ---

#[derive(Default)]
struct TextBuffer {
    text: String,
    /// False while everything collected is boundary whitespace.
    significant: bool,
}

impl TextBuffer {
    fn push_markup_text(&mut self, raw: &str, unescaped: &str) {
        if !raw.trim().is_empty() {
            self.significant = true;
        }
        self.text.push_str(unescaped);
    }

    fn push_literal(&mut self, text: &str) {
        self.significant = true;
        self.text.push_str(text);
    }

    fn flush_into(&mut self, children: &mut Vec<TemplateNode>) {
        let text = std::mem::take(&mut self.text);
        if std::mem::take(&mut self.significant) {
            children.push(TemplateNode::Text(ValueTemplate::literal(text)));
        }
    }
}

// --- Open elements ---

/// An element whose start tag has been read but whose end tag has not.
struct OpenElement {
    name: String,
    attributes: Vec<AttributeTemplate>,
    children: Vec<TemplateNode>,
    text: TextBuffer,
    /// Offset of the `<` of the start tag.
    start: usize,
    self_closing: bool,
    /// Set when the element is the body of a `for` block.
    binding: Option<PendingBinding>,
}

/// A `for` header waiting for its body element to end.
struct PendingBinding {
    id: BindingId,
    variable: String,
    source_text: String,
    repeating: bool,
    nav_path: Vec<String>,
    position: usize,
}

impl PendingBinding {
    fn with_body(self, body: ElementTemplate) -> ForBinding {
        ForBinding {
            id: self.id,
            variable: self.variable,
            source_text: self.source_text,
            repeating: self.repeating,
            nav_path: self.nav_path,
            body: vec![TemplateNode::Element(body)],
            position: self.position,
        }
    }
}

enum Content {
    More,
    Open(OpenElement),
    Close,
}

// --- The reader ---

struct TemplateReader<'s> {
    source: &'s str,
    pos: usize,
    /// Variables bound by enclosing `for` expressions, innermost last.
    scopes: Vec<String>,
    next_binding: usize,
}

impl<'s> TemplateReader<'s> {
    fn new(source: &'s str) -> Self {
        Self {
            source,
            pos: 0,
            scopes: Vec::new(),
            next_binding: 0,
        }
    }

    fn rest(&self) -> &'s str {
        &self.source[self.pos..]
    }

    fn at(&self, prefix: &str) -> bool {
        self.rest().starts_with(prefix)
    }

    /// Like `at`, but the keyword must not run on into a longer name.
    fn at_keyword(&self, keyword: &str) -> bool {
        match self.rest().strip_prefix(keyword) {
            Some(after) => !after.starts_with(is_name_char),
            None => false,
        }
    }

    fn advance(&mut self, len: usize) {
        self.pos += len;
    }

    fn error(&self, position: usize, reason: impl Into<String>) -> CompileError {
        CompileError::parse(self.source, position, reason)
    }

    fn skip_ws(&mut self) {
        let rest = self.rest();
        self.pos += rest.len() - rest.trim_start().len();
    }

    fn require_ws(&mut self, context: &str) -> Result<(), CompileError> {
        let before = self.pos;
        self.skip_ws();
        if self.pos == before {
            return Err(self.error(self.pos, format!("expected whitespace {}", context)));
        }
        Ok(())
    }

    fn expect_literal(&mut self, literal: &str) -> Result<(), CompileError> {
        if self.at(literal) {
            self.advance(literal.len());
            Ok(())
        } else {
            Err(self.error(self.pos, format!("expected '{}'", literal)))
        }
    }

    /// Applies a `nom` parser at the cursor and moves past what it consumed.
    fn run<O, P>(&mut self, mut parser: P, expected: &str) -> Result<O, CompileError>
    where
        P: Parser<&'s str, Output = O, Error = nom::error::Error<&'s str>>,
    {
        match parser.parse(self.rest()) {
            Ok((remaining, output)) => {
                self.pos = self.source.len() - remaining.len();
                Ok(output)
            }
            Err(nom::Err::Error(e) | nom::Err::Failure(e)) => {
                let at = self.source.len() - e.input.len();
                Err(self.error(at, format!("expected {}", expected)))
            }
            Err(nom::Err::Incomplete(_)) => Err(self.error(
                self.source.len(),
                format!("unexpected end of template, expected {}", expected),
            )),
        }
    }

    fn check_in_scope(&self, path: &PathExpr, position: usize) -> Result<(), CompileError> {
        if self.scopes.iter().any(|v| *v == path.variable) {
            Ok(())
        } else {
            Err(self.error(
                position,
                format!("variable ${} is not bound here", path.variable),
            ))
        }
    }

    // --- Document structure ---

    fn document(&mut self) -> Result<ElementTemplate, CompileError> {
        self.skip_misc()?;
        if !self.at("<") {
            return Err(self.error(self.pos, "expected a root element"));
        }
        let root = self.element_tree()?;
        self.skip_misc()?;
        if !self.rest().is_empty() {
            return Err(self.error(self.pos, "unexpected content after the root element"));
        }
        Ok(root)
    }

    /// Skips whitespace, comments and processing instructions outside the root.
    fn skip_misc(&mut self) -> Result<(), CompileError> {
        loop {
            self.skip_ws();
            if self.at("<!--") {
                self.comment()?;
            } else if self.at("<?") {
                let start = self.pos;
                match self.rest().find("?>") {
                    Some(end) => self.advance(end + 2),
                    None => return Err(self.error(start, "unterminated processing instruction")),
                }
            } else {
                return Ok(());
            }
        }
    }

    fn comment(&mut self) -> Result<(), CompileError> {
        let start = self.pos;
        match self.rest()[4..].find("-->") {
            Some(end) => {
                self.advance(4 + end + 3);
                Ok(())
            }
            None => Err(self.error(start, "unterminated comment")),
        }
    }

    /// Reads a start tag through its closing `>` or `/>`.
    fn start_tag(&mut self, binding: Option<PendingBinding>) -> Result<OpenElement, CompileError> {
        let start = self.pos;
        self.expect_literal("<")?;
        let name = self.run(xml_name, "an element name")?.to_string();
        let mut attributes: Vec<AttributeTemplate> = Vec::new();

        let self_closing = loop {
            let before_ws = self.pos;
            self.skip_ws();
            if self.at("/>") {
                self.advance(2);
                break true;
            }
            if self.at(">") {
                self.advance(1);
                break false;
            }
            if self.rest().is_empty() {
                return Err(self.error(start, format!("unterminated start tag <{}>", name)));
            }
            if self.pos == before_ws {
                return Err(self.error(self.pos, "expected whitespace before attribute"));
            }

            let attr_start = self.pos;
            let attr_name = self.run(xml_name, "an attribute name")?.to_string();
            self.skip_ws();
            self.expect_literal("=")?;
            self.skip_ws();
            let value_start = self.pos + 1;
            let raw = self.run(raw_attribute_value, "a quoted attribute value")?;
            if attributes.iter().any(|a| a.name == attr_name) {
                return Err(self.error(
                    attr_start,
                    format!("duplicate attribute '{}' on <{}>", attr_name, name),
                ));
            }
            let value = self.attribute_value(raw, value_start)?;
            attributes.push(AttributeTemplate {
                name: attr_name,
                value,
            });
        };

        Ok(OpenElement {
            name,
            attributes,
            children: Vec::new(),
            text: TextBuffer::default(),
            start,
            self_closing,
            binding,
        })
    }

    /// Splits an attribute value into literal text and `{path}` parts.
    fn attribute_value(&self, raw: &str, offset: usize) -> Result<ValueTemplate, CompileError> {
        let mut parts = Vec::new();
        let mut literal = String::new();
        let mut i = 0;

        while i < raw.len() {
            let rest = &raw[i..];
            if rest.starts_with("{{") {
                literal.push('{');
                i += 2;
            } else if rest.starts_with("}}") {
                literal.push('}');
                i += 2;
            } else if rest.starts_with('{') {
                let Some(close) = rest.find('}') else {
                    return Err(self.error(offset + i, "unterminated '{' in attribute value"));
                };
                if !literal.is_empty() {
                    parts.push(ValuePart::Literal(std::mem::take(&mut literal)));
                }
                let path = self.path_in(&rest[1..close], offset + i + 1)?;
                parts.push(ValuePart::Path(path));
                i += close + 1;
            } else if rest.starts_with('}') {
                return Err(self.error(offset + i, "unmatched '}' in attribute value"));
            } else if rest.starts_with('<') {
                return Err(self.error(offset + i, "'<' is not allowed in attribute values"));
            } else {
                let len = rest.find(['{', '}', '<']).unwrap_or(rest.len());
                let chunk = &rest[..len];
                let text = unescape(chunk).map_err(|e| {
                    self.error(offset + i, format!("invalid entity reference: {}", e))
                })?;
                literal.push_str(&text);
                i += len;
            }
        }

        if !literal.is_empty() {
            parts.push(ValuePart::Literal(literal));
        }
        Ok(ValueTemplate(parts))
    }

    fn path_in(&self, text: &str, offset: usize) -> Result<PathExpr, CompileError> {
        let at = offset + (text.len() - text.trim_start().len());
        let path = parse_path(text).map_err(|e| self.error(at, e.to_string()))?;
        self.check_in_scope(&path, at)?;
        Ok(path)
    }

    /// Reads the root element and everything inside it.
    ///
    /// Open elements live on an explicit stack, so nesting depth is bounded
    /// by memory rather than by the call stack.
    fn element_tree(&mut self) -> Result<ElementTemplate, CompileError> {
        let mut stack: Vec<OpenElement> = Vec::new();
        let mut opened = Some(self.start_tag(None)?);

        loop {
            let done = match opened.take() {
                Some(open) if open.self_closing => open,
                Some(open) => {
                    stack.push(open);
                    continue;
                }
                None => {
                    let Some(current) = stack.last_mut() else {
                        return Err(self.error(self.pos, "expected a root element"));
                    };
                    match self.content(current)? {
                        Content::More => continue,
                        Content::Open(open) => {
                            opened = Some(open);
                            continue;
                        }
                        Content::Close => match stack.pop() {
                            Some(done) => done,
                            None => continue,
                        },
                    }
                }
            };
            if let Some(root) = self.finish_element(done, &mut stack)? {
                return Ok(root);
            }
        }
    }

    /// Attaches a finished element to its parent, or returns it as the root.
    fn finish_element(
        &mut self,
        done: OpenElement,
        stack: &mut [OpenElement],
    ) -> Result<Option<ElementTemplate>, CompileError> {
        let OpenElement {
            name,
            attributes,
            mut children,
            mut text,
            binding,
            ..
        } = done;
        text.flush_into(&mut children);
        let element = ElementTemplate {
            name,
            attributes,
            children,
        };

        let node = match binding {
            Some(pending) => {
                self.scopes.pop();
                self.close_code_block()?;
                TemplateNode::ForBinding(pending.with_body(element))
            }
            None => TemplateNode::Element(element),
        };
        match (stack.last_mut(), node) {
            (Some(parent), node) => {
                parent.children.push(node);
                Ok(None)
            }
            (None, TemplateNode::Element(root)) => Ok(Some(root)),
            (None, _) => Err(self.error(self.pos, "expected a root element")),
        }
    }

    /// Consumes one piece of an open element's content.
    fn content(&mut self, current: &mut OpenElement) -> Result<Content, CompileError> {
        let rest = self.rest();
        if rest.is_empty() {
            return Err(self.error(
                current.start,
                format!("unterminated element <{}>", current.name),
            ));
        }

        if rest.starts_with("</") {
            let end_tag = self.pos;
            self.advance(2);
            let end_name = self.run(xml_name, "an end tag name")?;
            self.skip_ws();
            self.expect_literal(">")?;
            if end_name != current.name {
                return Err(self.error(
                    end_tag,
                    format!("end tag </{}> does not match <{}>", end_name, current.name),
                ));
            }
            return Ok(Content::Close);
        } else if rest.starts_with("<!--") {
            self.comment()?;
        } else if rest.starts_with("<![CDATA[") {
            match rest.find("]]>") {
                Some(end) => {
                    current.text.push_literal(&rest[9..end]);
                    self.advance(end + 3);
                }
                None => return Err(self.error(self.pos, "unterminated CDATA section")),
            }
        } else if rest.starts_with('<') {
            current.text.flush_into(&mut current.children);
            return Ok(Content::Open(self.start_tag(None)?));
        } else if rest.starts_with("{{") {
            current.text.push_literal("{");
            self.advance(2);
        } else if rest.starts_with("}}") {
            current.text.push_literal("}");
            self.advance(2);
        } else if rest.starts_with('{') {
            current.text.flush_into(&mut current.children);
            return self.code_block(current);
        } else if rest.starts_with('}') {
            return Err(self.error(self.pos, "unmatched '}' in element content"));
        } else {
            let len = rest.find(['<', '{', '}']).unwrap_or(rest.len());
            let chunk = &rest[..len];
            let unescaped = unescape(chunk).map_err(|e| {
                self.error(self.pos, format!("invalid entity reference: {}", e))
            })?;
            current.text.push_markup_text(chunk, &unescaped);
            self.advance(len);
        }
        Ok(Content::More)
    }

    // --- Code blocks ---

    /// A path block is read whole. A `for` block opens its body element and
    /// is closed by `finish_element` once the body ends.
    fn code_block(&mut self, current: &mut OpenElement) -> Result<Content, CompileError> {
        let open = self.pos;
        self.expect_literal("{")?;
        self.skip_ws();

        if self.at_keyword("for") {
            let pending = self.for_header(open)?;
            self.scopes.push(pending.variable.clone());
            return Ok(Content::Open(self.start_tag(Some(pending))?));
        }

        let node = if self.at("$") {
            let at = self.pos;
            let path = self.run(path_expr, "a path expression")?;
            self.check_in_scope(&path, at)?;
            TemplateNode::Text(ValueTemplate::path(path))
        } else if self.at("}") {
            return Err(self.error(open, "empty code block"));
        } else {
            return Err(self.error(
                self.pos,
                "expected a 'for' expression or a path expression",
            ));
        };

        self.close_code_block()?;
        current.children.push(node);
        Ok(Content::More)
    }

    fn close_code_block(&mut self) -> Result<(), CompileError> {
        self.skip_ws();
        if !self.at("}") {
            return Err(self.error(self.pos, "expected '}' to close the code block"));
        }
        self.advance(1);
        Ok(())
    }

    /// Reads `for $x in doc("...") nav-path return` up to the body's `<`.
    fn for_header(&mut self, open: usize) -> Result<PendingBinding, CompileError> {
        self.advance("for".len());
        self.require_ws("after 'for'")?;
        let variable = self
            .run(variable_reference, "a variable such as $x")?
            .to_string();
        self.require_ws("after the variable")?;
        if !self.at_keyword("in") {
            return Err(self.error(self.pos, "expected 'in'"));
        }
        self.advance("in".len());
        self.require_ws("after 'in'")?;

        let (source_text, repeating) = if self.at_keyword("exactly-one") {
            self.advance("exactly-one".len());
            self.skip_ws();
            self.expect_literal("(")?;
            self.skip_ws();
            let text = self.doc_call()?;
            self.skip_ws();
            self.expect_literal(")")?;
            (text, false)
        } else {
            (self.doc_call()?, true)
        };
        let nav_path = self.nav_path()?;

        self.require_ws("before 'return'")?;
        if !self.at_keyword("return") {
            return Err(self.error(self.pos, "expected 'return'"));
        }
        self.advance("return".len());
        self.skip_ws();
        if !self.at("<") {
            return Err(self.error(self.pos, "expected an element template after 'return'"));
        }

        // Bindings are numbered in document order, before their bodies.
        let id = BindingId::new(self.next_binding);
        self.next_binding += 1;

        Ok(PendingBinding {
            id,
            variable,
            source_text,
            repeating,
            nav_path,
            position: open,
        })
    }

    fn doc_call(&mut self) -> Result<String, CompileError> {
        if !self.at_keyword("doc") {
            return Err(self.error(self.pos, "expected doc(\"...\")"));
        }
        self.advance("doc".len());
        self.skip_ws();
        self.expect_literal("(")?;
        self.skip_ws();
        let text = self.run(string_literal, "a quoted source string")?;
        self.skip_ws();
        self.expect_literal(")")?;
        Ok(text)
    }

    fn nav_path(&mut self) -> Result<Vec<String>, CompileError> {
        let mut steps = Vec::new();
        loop {
            if self.at("//") {
                self.advance(2);
            } else if self.at("/") {
                self.advance(1);
            } else {
                return Ok(steps);
            }
            steps.push(self.run(xml_name, "a step name")?.to_string());
        }
    }
}
