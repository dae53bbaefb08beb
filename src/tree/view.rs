//! Borrowed views over arena nodes.

use super::{Attribute, Document, NodeId, NodeKind};
use crate::serial;
use std::borrow::Cow;
use std::fmt;

/// A node paired with the document that owns it.
///
/// This is the value element-typed callbacks receive. It is `Copy` and
/// cheap to pass around; every accessor forwards to the owning
/// [`Document`].
#[derive(Clone, Copy)]
pub struct NodeRef<'a> {
    doc: &'a Document,
    id: NodeId,
}

impl<'a> NodeRef<'a> {
    pub(crate) fn new(doc: &'a Document, id: NodeId) -> Self {
        Self { doc, id }
    }

    /// The arena id of this node.
    #[must_use]
    pub fn id(self) -> NodeId {
        self.id
    }

    /// The document that owns this node.
    #[must_use]
    pub fn document(self) -> &'a Document {
        self.doc
    }

    #[must_use]
    pub fn kind(self) -> &'a NodeKind {
        &self.doc.node(self.id).kind
    }

    /// Local name of an element (`street` for `b:street`).
    #[must_use]
    pub fn local_name(self) -> Option<&'a str> {
        self.doc.node_name(self.id)
    }

    #[must_use]
    pub fn prefix(self) -> Option<&'a str> {
        self.doc.node_prefix(self.id)
    }

    /// Name as written in the source (`b:street`).
    #[must_use]
    pub fn name(self) -> Option<Cow<'a, str>> {
        self.doc.qualified_name(self.id)
    }

    #[must_use]
    pub fn namespace(self) -> Option<&'a str> {
        self.doc.node_namespace(self.id)
    }

    #[must_use]
    pub fn attributes(self) -> &'a [Attribute] {
        self.doc.attributes(self.id)
    }

    #[must_use]
    pub fn attribute(self, name: &str) -> Option<&'a str> {
        self.doc.attribute(self.id, name)
    }

    #[must_use]
    pub fn parent(self) -> Option<NodeRef<'a>> {
        self.doc.parent(self.id).map(|id| Self::new(self.doc, id))
    }

    /// Iterates over the direct children of this node.
    pub fn children(self) -> impl Iterator<Item = NodeRef<'a>> + 'a {
        let doc = self.doc;
        doc.children(self.id).map(move |id| NodeRef::new(doc, id))
    }

    /// Iterates over the element children of this node.
    pub fn child_elements(self) -> impl Iterator<Item = NodeRef<'a>> + 'a {
        self.children().filter(|n| n.kind().is_element())
    }

    /// Returns the first element child with the given qualified name.
    #[must_use]
    pub fn child(self, name: &str) -> Option<NodeRef<'a>> {
        self.child_elements()
            .find(|n| n.name().is_some_and(|n| n == name))
    }

    /// Concatenated text of all descendant text and CDATA nodes.
    #[must_use]
    pub fn text(self) -> String {
        self.doc.text_content(self.id)
    }

    /// Serializes this node and its subtree.
    #[must_use]
    pub fn to_xml(self) -> String {
        serial::serialize_node(self.doc, self.id)
    }

    /// Serializes only the children of this node.
    #[must_use]
    pub fn inner_xml(self) -> String {
        serial::serialize_children(self.doc, self.id)
    }
}

impl fmt::Debug for NodeRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeRef")
            .field("id", &self.id)
            .field("kind", self.kind())
            .finish()
    }
}

impl fmt::Display for NodeRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_xml())
    }
}
