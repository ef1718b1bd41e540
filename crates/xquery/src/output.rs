//! Defines the `OutputBuilder` trait, which decouples the assembler from
//! the concrete output tree, and the arena-backed `AssembledDocument` that
//! `TreeBuilder` produces.

/// The semantic actions of building an output tree.
pub trait OutputBuilder {
    fn start_element(&mut self, name: &str);
    /// Sets an attribute on the currently open element.
    fn set_attribute(&mut self, name: &str, value: &str);
    fn add_text(&mut self, text: &str);
    fn end_element(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssembledNode {
    Element {
        name: String,
        attributes: Vec<(String, String)>,
        children: Vec<NodeId>,
    },
    Text(String),
}

/// An assembled document: nodes live in one arena and refer to their
/// children by `NodeId`. The first node, if any, is the root element.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssembledDocument {
    nodes: Vec<AssembledNode>,
}

impl AssembledDocument {
    pub fn root(&self) -> Option<NodeId> {
        (!self.nodes.is_empty()).then_some(NodeId(0))
    }

    pub fn node(&self, id: NodeId) -> Option<&AssembledNode> {
        self.nodes.get(id.0)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        match self.nodes.get(id.0) {
            Some(AssembledNode::Element { children, .. }) => children,
            _ => &[],
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// The names of the element children of `id`, in order.
    pub fn child_element_names(&self, id: NodeId) -> Vec<&str> {
        self.children(id)
            .iter()
            .filter_map(|child| match self.node(*child) {
                Some(AssembledNode::Element { name, .. }) => Some(name.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Concatenated text of every descendant of `id`, in document order.
    pub fn text_content(&self, id: NodeId) -> String {
        let mut text = String::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            match self.node(current) {
                Some(AssembledNode::Text(t)) => text.push_str(t),
                Some(AssembledNode::Element { children, .. }) => {
                    stack.extend(children.iter().rev().copied())
                }
                None => {}
            }
        }
        text
    }
}

/// Builds an `AssembledDocument` from `OutputBuilder` calls.
#[derive(Debug, Default)]
pub struct TreeBuilder {
    document: AssembledDocument,
    open: Vec<NodeId>,
}

impl TreeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn finish(self) -> AssembledDocument {
        if !self.open.is_empty() {
            log::warn!("Finished a document with {} unclosed element(s)", self.open.len());
        }
        self.document
    }

    fn push(&mut self, node: AssembledNode) -> NodeId {
        let id = NodeId(self.document.nodes.len());
        self.document.nodes.push(node);
        if let Some(parent) = self.open.last() {
            if let Some(AssembledNode::Element { children, .. }) =
                self.document.nodes.get_mut(parent.0)
            {
                children.push(id);
            }
        }
        id
    }

    fn last_child_of_open(&mut self) -> Option<&mut AssembledNode> {
        let parent = *self.open.last()?;
        let last = match self.document.nodes.get(parent.0)? {
            AssembledNode::Element { children, .. } => *children.last()?,
            AssembledNode::Text(_) => return None,
        };
        self.document.nodes.get_mut(last.0)
    }
}

impl OutputBuilder for TreeBuilder {
    fn start_element(&mut self, name: &str) {
        if self.open.is_empty() && !self.document.is_empty() {
            log::warn!("Ignoring second root element <{}>", name);
            return;
        }
        let id = self.push(AssembledNode::Element {
            name: name.to_string(),
            attributes: Vec::new(),
            children: Vec::new(),
        });
        self.open.push(id);
    }

    fn set_attribute(&mut self, name: &str, value: &str) {
        let Some(current) = self.open.last() else {
            return;
        };
        if let Some(AssembledNode::Element { attributes, .. }) =
            self.document.nodes.get_mut(current.0)
        {
            match attributes.iter_mut().find(|(n, _)| n == name) {
                Some((_, existing)) => *existing = value.to_string(),
                None => attributes.push((name.to_string(), value.to_string())),
            }
        }
    }

    /// Empty text adds nothing; adjacent text merges into one node.
    fn add_text(&mut self, text: &str) {
        if text.is_empty() || self.open.is_empty() {
            return;
        }
        if let Some(AssembledNode::Text(existing)) = self.last_child_of_open() {
            existing.push_str(text);
            return;
        }
        self.push(AssembledNode::Text(text.to_string()));
    }

    fn end_element(&mut self) {
        self.open.pop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_creates_nested_tree() {
        let mut builder = TreeBuilder::new();
        builder.start_element("Items");
        builder.set_attribute("count", "2");
        builder.start_element("Item");
        builder.add_text("Lamp");
        builder.end_element();
        builder.start_element("Item");
        builder.end_element();
        builder.end_element();
        let doc = builder.finish();

        let root = doc.root().unwrap();
        assert_eq!(doc.child_element_names(root), vec!["Item", "Item"]);
        assert_eq!(doc.text_content(root), "Lamp");
        match doc.node(root).unwrap() {
            AssembledNode::Element { attributes, .. } => {
                assert_eq!(attributes, &vec![("count".to_string(), "2".to_string())]);
            }
            other => panic!("expected element, got {:?}", other),
        }
        let second = doc.children(root)[1];
        assert!(doc.children(second).is_empty());
    }

    #[test]
    fn test_adjacent_text_merges_and_empty_text_is_dropped() {
        let mut builder = TreeBuilder::new();
        builder.start_element("P");
        builder.add_text("a");
        builder.add_text("");
        builder.add_text("b");
        builder.end_element();
        let doc = builder.finish();

        let root = doc.root().unwrap();
        assert_eq!(doc.children(root).len(), 1);
        assert_eq!(doc.len(), 2);
        assert_eq!(doc.text_content(root), "ab");
    }

    #[test]
    fn test_empty_builder_has_no_root() {
        assert!(TreeBuilder::new().finish().root().is_none());
    }
}
