//! Node type definitions.
//!
//! The `NodeKind` enum covers every node a materialized fragment can hold.
//! Document-level constructs (DOCTYPE, XML declaration) never appear inside
//! an element, so fragments do not model them.

use super::Attribute;

/// The kind of a node and its associated data.
///
/// Navigation links (parent, children, siblings) are stored in `NodeData`,
/// not here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    /// The document node. There is exactly one per `Document`.
    Document,

    /// An element node, e.g., `<b:street id="1">`.
    Element {
        /// The element's local name.
        name: String,
        /// Namespace prefix (e.g., `"b"` in `b:street`), if any.
        prefix: Option<String>,
        /// Namespace URI after resolution, if any.
        namespace: Option<String>,
        /// Attributes on this element, namespace declarations included.
        attributes: Vec<Attribute>,
    },

    /// A text node containing character data (entities already resolved).
    Text {
        /// The text content.
        content: String,
    },

    /// A CDATA section, e.g., `<![CDATA[...]]>`.
    CData {
        /// The CDATA content (no escaping applied).
        content: String,
    },

    /// A comment node, e.g., `<!-- ... -->`.
    Comment {
        /// The comment text (without the `<!--` and `-->` delimiters).
        content: String,
    },

    /// A processing instruction, e.g., `<?target data?>`.
    ProcessingInstruction {
        /// The PI target.
        target: String,
        /// The PI data, if any.
        data: Option<String>,
    },
}

impl NodeKind {
    /// Creates an element kind with no attributes and no namespace.
    #[must_use]
    pub fn element(name: impl Into<String>) -> Self {
        Self::Element {
            name: name.into(),
            prefix: None,
            namespace: None,
            attributes: Vec::new(),
        }
    }

    /// Creates a text kind.
    #[must_use]
    pub fn text(content: impl Into<String>) -> Self {
        Self::Text {
            content: content.into(),
        }
    }

    /// Returns `true` for element nodes.
    #[must_use]
    pub fn is_element(&self) -> bool {
        matches!(self, Self::Element { .. })
    }
}
