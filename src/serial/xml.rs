//! XML serializer for nodes and fragments.
//!
//! Output is markup only: no XML declaration and no trailing newline, so a
//! serialized node can be embedded or compared directly.

use crate::namespace::{undeclared_bindings, Binding};
use crate::tree::{Attribute, Document, NodeId, NodeKind};
use crate::util::qname::qualified_name;

/// Options controlling XML serialization output.
///
/// # Examples
///
/// ```
/// use xmlreg::serial::{serialize_node_with_options, SerializeOptions};
/// use xmlreg::tree::{Document, NodeKind};
///
/// let mut doc = Document::new();
/// let root = doc.create_node(NodeKind::element("root"));
/// let child = doc.create_node(NodeKind::element("child"));
/// doc.append_child(root, child);
///
/// let xml = serialize_node_with_options(&doc, root, &SerializeOptions::default().indent(true));
/// assert_eq!(xml, "<root>\n  <child/>\n</root>");
/// ```
#[derive(Debug, Clone)]
pub struct SerializeOptions {
    /// Whether to produce indented (pretty-printed) output.
    /// Defaults to `false`.
    pub indent: bool,
    /// The indentation string used for each level when `indent` is `true`.
    /// Defaults to two spaces.
    pub indent_str: String,
}

impl Default for SerializeOptions {
    fn default() -> Self {
        Self {
            indent: false,
            indent_str: "  ".to_string(),
        }
    }
}

impl SerializeOptions {
    /// Enables or disables indented output.
    ///
    /// Mixed-content elements (text next to element children) are never
    /// indented, since that would change their text.
    #[must_use]
    pub fn indent(mut self, indent: bool) -> Self {
        self.indent = indent;
        self
    }

    /// Sets the indentation string used for each nesting level.
    #[must_use]
    pub fn indent_str(mut self, s: &str) -> Self {
        self.indent_str = s.to_string();
        self
    }
}

/// Serializes a node and its subtree.
///
/// Namespace bindings the subtree uses but does not declare are declared
/// on the outermost element, so the result is well-formed on its own.
#[must_use]
pub fn serialize_node(doc: &Document, id: NodeId) -> String {
    serialize_node_with_options(doc, id, &SerializeOptions::default())
}

/// Serializes a node and its subtree with the given options.
#[must_use]
pub fn serialize_node_with_options(doc: &Document, id: NodeId, options: &SerializeOptions) -> String {
    let mut out = String::new();
    let inherited = undeclared_bindings(doc, id);
    write_node(doc, id, &mut out, options, 0, false, &inherited);
    if options.indent && out.ends_with('\n') {
        out.pop();
    }
    out
}

/// Serializes the children of a node, each one standalone, and
/// concatenates the results. This is the node's inner XML.
#[must_use]
pub fn serialize_children(doc: &Document, id: NodeId) -> String {
    serialize_children_with_options(doc, id, &SerializeOptions::default())
}

/// Serializes the children of a node with the given options.
#[must_use]
pub fn serialize_children_with_options(
    doc: &Document,
    id: NodeId,
    options: &SerializeOptions,
) -> String {
    let mut out = String::new();
    for child in doc.children(id) {
        if options.indent && is_blank_text(doc, child) {
            continue;
        }
        let inherited = undeclared_bindings(doc, child);
        write_node(doc, child, &mut out, options, 0, options.indent, &inherited);
    }
    if options.indent && out.ends_with('\n') {
        out.pop();
    }
    out
}

fn is_blank_text(doc: &Document, id: NodeId) -> bool {
    matches!(&doc.node(id).kind, NodeKind::Text { content } if content.trim().is_empty())
}

/// Returns `true` if the element contains only other elements (and optional
/// whitespace text), meaning it's safe to add indentation.
fn is_element_only(doc: &Document, id: NodeId) -> bool {
    let mut has_element_child = false;
    for child in doc.children(id) {
        match &doc.node(child).kind {
            NodeKind::Element { .. } => has_element_child = true,
            NodeKind::Text { content } => {
                if !content.trim().is_empty() {
                    return false;
                }
            }
            NodeKind::CData { .. } => return false,
            _ => {}
        }
    }
    has_element_child
}

fn write_indent(out: &mut String, options: &SerializeOptions, depth: usize) {
    for _ in 0..depth {
        out.push_str(&options.indent_str);
    }
}

fn write_node(
    doc: &Document,
    id: NodeId,
    out: &mut String,
    options: &SerializeOptions,
    depth: usize,
    pretty: bool,
    inherited: &[Binding],
) {
    match &doc.node(id).kind {
        NodeKind::Element {
            name,
            prefix,
            attributes,
            ..
        } => {
            let tag = qualified_name(prefix.as_deref(), name);
            if pretty {
                write_indent(out, options, depth);
            }
            out.push('<');
            out.push_str(&tag);

            for (prefix, uri) in inherited {
                let decl = Attribute::namespace_declaration(prefix.as_deref(), uri.as_str());
                write_attribute(out, &decl);
            }
            for attr in attributes {
                write_attribute(out, attr);
            }

            if doc.first_child(id).is_none() {
                out.push_str("/>");
            } else {
                out.push('>');
                let element_only = options.indent && is_element_only(doc, id);
                if element_only {
                    out.push('\n');
                }
                for child in doc.children(id) {
                    if element_only && is_blank_text(doc, child) {
                        continue;
                    }
                    write_node(doc, child, out, options, depth + 1, element_only, &[]);
                }
                if element_only {
                    write_indent(out, options, depth);
                }
                out.push_str("</");
                out.push_str(&tag);
                out.push('>');
            }
            if pretty {
                out.push('\n');
            }
        }
        NodeKind::Text { content } => write_escaped_text(out, content),
        NodeKind::CData { content } => {
            out.push_str("<![CDATA[");
            out.push_str(content);
            out.push_str("]]>");
        }
        NodeKind::Comment { content } => {
            if pretty {
                write_indent(out, options, depth);
            }
            out.push_str("<!--");
            out.push_str(content);
            out.push_str("-->");
            if pretty {
                out.push('\n');
            }
        }
        NodeKind::ProcessingInstruction { target, data } => {
            if pretty {
                write_indent(out, options, depth);
            }
            out.push_str("<?");
            out.push_str(target);
            if let Some(d) = data {
                out.push(' ');
                out.push_str(d);
            }
            out.push_str("?>");
            if pretty {
                out.push('\n');
            }
        }
        NodeKind::Document => {
            for child in doc.children(id) {
                write_node(doc, child, out, options, depth, pretty, &[]);
            }
        }
    }
}

fn write_attribute(out: &mut String, attr: &Attribute) {
    out.push(' ');
    out.push_str(&attr.qualified_name());
    out.push_str("=\"");
    write_escaped_attr(out, &attr.value);
    out.push('"');
}

/// Escapes text content: `<`, `>` and `&` get named references, `\r` a
/// character reference so it survives end-of-line normalization.
fn write_escaped_text(out: &mut String, text: &str) {
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\r' => out.push_str("&#13;"),
            _ => out.push(ch),
        }
    }
}

/// Escapes an attribute value. Whitespace other than the space character
/// is written as a character reference so attribute-value normalization
/// does not turn it into a space on re-parse.
fn write_escaped_attr(out: &mut String, value: &str) {
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\t' => out.push_str("&#9;"),
            '\n' => out.push_str("&#10;"),
            '\r' => out.push_str("&#13;"),
            _ => out.push(ch),
        }
    }
}
