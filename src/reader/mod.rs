//! Pull-based streaming XML reader.
//!
//! [`XmlCursor`] is the small capability interface the dispatch driver
//! depends on: advance, inspect the current node, and copy the current
//! element out into a [`Document`]. [`XmlReader`] is the default
//! implementation, built on `quick-xml`.
//!
//! The reader advances one node at a time and never builds a tree of the
//! whole document. Only [`XmlCursor::expand_into`] reads ahead, and only
//! as far as the end of the current element.
//!
//! # Examples
//!
//! ```
//! use xmlreg::reader::{XmlCursor, XmlNodeType, XmlReader};
//!
//! let mut reader = XmlReader::from_bytes(b"<root><child>Hello</child></root>");
//! let mut elements = Vec::new();
//!
//! while reader.read().unwrap() {
//!     if reader.node_type() == XmlNodeType::Element {
//!         elements.push(reader.name().unwrap_or_default().to_string());
//!     }
//! }
//!
//! assert_eq!(elements, vec!["root", "child"]);
//! ```

mod entities;

use crate::error::ParseError;
use crate::namespace::{declare_missing, NamespaceResolver};
use crate::serial::{serialize_children, serialize_node};
use crate::tree::{Attribute, Document, NodeId, NodeKind};
use crate::util::qname::split_qname;
use entities::{internal_entities, EntityMap};
use log::{trace, warn};
use quick_xml::escape::{resolve_predefined_entity, unescape_with};
use quick_xml::events::{BytesStart, Event};
use std::borrow::Cow;
use std::collections::VecDeque;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

/// The type of the node the reader is positioned on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum XmlNodeType {
    /// The reader has not been advanced yet.
    None,

    /// An element start tag, e.g. `<div>` or `<br/>`.
    ///
    /// For self-closing elements (`<br/>`), `is_empty_element()` returns
    /// `true` and no separate `EndElement` follows.
    Element,

    /// An element end tag, e.g. `</div>`.
    EndElement,

    /// A text node containing character data.
    Text,

    /// A CDATA section, e.g. `<![CDATA[...]]>`.
    CData,

    /// An XML comment, e.g. `<!-- comment -->`.
    Comment,

    /// A processing instruction, e.g. `<?target data?>`.
    ProcessingInstruction,

    /// The XML declaration, e.g. `<?xml version="1.0"?>`.
    XmlDeclaration,

    /// A document type declaration, e.g. `<!DOCTYPE html>`.
    DocumentType,

    /// A whitespace-only text node in element content.
    Whitespace,

    /// The end of the document has been reached.
    EndDocument,
}

impl std::fmt::Display for XmlNodeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::None => "None",
            Self::Element => "Element",
            Self::EndElement => "EndElement",
            Self::Text => "Text",
            Self::CData => "CData",
            Self::Comment => "Comment",
            Self::ProcessingInstruction => "ProcessingInstruction",
            Self::XmlDeclaration => "XmlDeclaration",
            Self::DocumentType => "DocumentType",
            Self::Whitespace => "Whitespace",
            Self::EndDocument => "EndDocument",
        };
        f.write_str(name)
    }
}

/// The capabilities the dispatch driver needs from a tokenizer.
///
/// Implementations must report self-closing elements once, as `Element`
/// with [`is_empty_element`](Self::is_empty_element) set, without a
/// trailing `EndElement`.
pub trait XmlCursor {
    /// Advances to the next node. Returns `Ok(false)` at end of input.
    ///
    /// # Errors
    ///
    /// Returns `ParseError` if the source is not well-formed.
    fn read(&mut self) -> Result<bool, ParseError>;

    /// The type of the current node.
    fn node_type(&self) -> XmlNodeType;

    /// The qualified name of the current element (`b:street`).
    fn name(&self) -> Option<&str>;

    /// The local name of the current element (`street`).
    fn local_name(&self) -> Option<&str>;

    /// Whether the current element is self-closing.
    fn is_empty_element(&self) -> bool;

    /// Copies the current element and its subtree into `doc` as a detached
    /// node, without moving the cursor.
    ///
    /// Namespace bindings the copy inherits from ancestors are declared on
    /// the copy root.
    ///
    /// # Errors
    ///
    /// Returns `ParseError` if the cursor is not on an element or the
    /// subtree is not well-formed.
    fn expand_into(&mut self, doc: &mut Document) -> Result<NodeId, ParseError>;

    /// Chooses whether an unbound namespace prefix is a parse error
    /// (`false`, the default) or is reported with a warning and read as
    /// having no namespace (`true`). The driver turns recovery on when
    /// paths are built from local names.
    fn set_namespace_recovery(&mut self, _enabled: bool) {}

    /// Returns the markup of the current element's children.
    ///
    /// Returns an empty string when the cursor is not on an element.
    ///
    /// # Errors
    ///
    /// Returns `ParseError` if the subtree is not well-formed.
    fn read_inner_xml(&mut self) -> Result<String, ParseError> {
        if self.node_type() != XmlNodeType::Element {
            return Ok(String::new());
        }
        let mut scratch = Document::new();
        let id = self.expand_into(&mut scratch)?;
        Ok(serialize_children(&scratch, id))
    }

    /// Returns the markup of the current element, itself included.
    ///
    /// # Errors
    ///
    /// Returns `ParseError` if the subtree is not well-formed.
    fn read_outer_xml(&mut self) -> Result<String, ParseError> {
        if self.node_type() != XmlNodeType::Element {
            return Ok(String::new());
        }
        let mut scratch = Document::new();
        let id = self.expand_into(&mut scratch)?;
        Ok(serialize_node(&scratch, id))
    }
}

/// A node the reader is positioned on, or one buffered ahead of it.
#[derive(Debug, Clone)]
struct ReaderNode {
    node_type: XmlNodeType,
    /// Qualified name for elements, target for PIs.
    name: String,
    local_name: String,
    prefix: Option<String>,
    namespace_uri: Option<String>,
    /// Text, comment, CDATA and PI data content.
    value: Option<String>,
    depth: usize,
    is_empty_element: bool,
    attributes: Vec<Attribute>,
}

impl ReaderNode {
    fn new(node_type: XmlNodeType) -> Self {
        Self {
            node_type,
            name: String::new(),
            local_name: String::new(),
            prefix: None,
            namespace_uri: None,
            value: None,
            depth: 0,
            is_empty_element: false,
            attributes: Vec::new(),
        }
    }

    fn with_value(node_type: XmlNodeType, value: String, depth: usize) -> Self {
        Self {
            value: Some(value),
            depth,
            ..Self::new(node_type)
        }
    }

    /// Builds the tree node for this reader node, if it has one.
    fn to_kind(&self) -> Option<NodeKind> {
        let content = || self.value.clone().unwrap_or_default();
        match self.node_type {
            XmlNodeType::Element => Some(NodeKind::Element {
                name: self.local_name.clone(),
                prefix: self.prefix.clone(),
                namespace: self.namespace_uri.clone(),
                attributes: self.attributes.clone(),
            }),
            XmlNodeType::Text | XmlNodeType::Whitespace => Some(NodeKind::Text { content: content() }),
            XmlNodeType::CData => Some(NodeKind::CData { content: content() }),
            XmlNodeType::Comment => Some(NodeKind::Comment { content: content() }),
            XmlNodeType::ProcessingInstruction => Some(NodeKind::ProcessingInstruction {
                target: self.name.clone(),
                data: self.value.clone(),
            }),
            _ => None,
        }
    }
}

/// One step of pulling from the underlying tokenizer.
enum Pulled {
    Node(ReaderNode),
    Skip,
    Eof,
}

/// A pull-based streaming XML reader over any buffered byte source.
///
/// Namespace prefixes are resolved by the reader itself; element and
/// attribute namespace URIs are available on every node. Line ends are
/// normalized to `\n`, and references to general entities declared in
/// the DOCTYPE internal subset are expanded.
///
/// # Examples
///
/// ```
/// use xmlreg::reader::{XmlCursor, XmlNodeType, XmlReader};
///
/// let mut reader = XmlReader::from_bytes(b"<doc attr=\"val\">text</doc>");
///
/// assert!(reader.read().unwrap());
/// assert_eq!(reader.node_type(), XmlNodeType::Element);
/// assert_eq!(reader.name(), Some("doc"));
/// assert_eq!(reader.get_attribute("attr"), Some("val"));
///
/// assert!(reader.read().unwrap());
/// assert_eq!(reader.value(), Some("text"));
///
/// assert!(reader.read().unwrap());
/// assert_eq!(reader.node_type(), XmlNodeType::EndElement);
///
/// assert!(!reader.read().unwrap());
/// ```
pub struct XmlReader<R: BufRead> {
    inner: quick_xml::Reader<R>,
    buf: Vec<u8>,
    ns: NamespaceResolver,
    current: ReaderNode,
    /// Nodes already pulled from the source by `expand_into` but not yet
    /// returned by `read`.
    lookahead: VecDeque<ReaderNode>,
    /// Qualified names of the elements open in the source.
    open: Vec<String>,
    entities: EntityMap,
    recover_prefixes: bool,
    root_seen: bool,
    root_closed: bool,
    finished: bool,
}

impl<R: BufRead> XmlReader<R> {
    /// Creates a reader over a buffered source.
    ///
    /// The encoding is detected from a BOM or the XML declaration and
    /// defaults to UTF-8.
    pub fn new(source: R) -> Self {
        let mut inner = quick_xml::Reader::from_reader(source);
        let config = inner.config_mut();
        config.trim_text(false);
        config.check_end_names = false;
        Self {
            inner,
            buf: Vec::new(),
            ns: NamespaceResolver::new(),
            current: ReaderNode::new(XmlNodeType::None),
            lookahead: VecDeque::new(),
            open: Vec::new(),
            entities: EntityMap::new(),
            recover_prefixes: false,
            root_seen: false,
            root_closed: false,
            finished: false,
        }
    }

    /// Returns the underlying source.
    pub fn into_inner(self) -> R {
        self.inner.into_inner()
    }

    /// The namespace prefix of the current element, if any.
    #[must_use]
    pub fn prefix(&self) -> Option<&str> {
        self.current.prefix.as_deref()
    }

    /// The namespace URI of the current element, if any.
    #[must_use]
    pub fn namespace_uri(&self) -> Option<&str> {
        self.current.namespace_uri.as_deref()
    }

    /// The content of a text, CDATA, comment, whitespace or PI node.
    #[must_use]
    pub fn value(&self) -> Option<&str> {
        self.current.value.as_deref()
    }

    /// Nesting depth of the current node; the document element is at 0.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.current.depth
    }

    /// The attributes of the current element, namespace declarations
    /// included.
    #[must_use]
    pub fn attributes(&self) -> &[Attribute] {
        &self.current.attributes
    }

    /// Returns an attribute value of the current element by qualified name.
    #[must_use]
    pub fn get_attribute(&self, name: &str) -> Option<&str> {
        self.current
            .attributes
            .iter()
            .find(|a| a.qualified_name() == name)
            .map(|a| a.value.as_str())
    }

    /// Number of nodes read ahead of the cursor.
    #[must_use]
    pub fn buffered(&self) -> usize {
        self.lookahead.len()
    }

    fn offset(&self) -> usize {
        usize::try_from(self.inner.buffer_position()).unwrap_or(usize::MAX)
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError::new(message, self.offset())
    }

    fn decode(&self, bytes: &[u8]) -> Result<String, ParseError> {
        self.inner
            .decoder()
            .decode(bytes)
            .map(|text| normalize_line_ends(text.into_owned()))
            .map_err(|e| self.error(e.to_string()))
    }

    /// Expands character references, the predefined entities and the
    /// entities of the internal subset.
    fn unescape(&self, raw: &str) -> Result<String, ParseError> {
        let entities = &self.entities;
        unescape_with(raw, |name| {
            entities
                .get(name)
                .map(String::as_str)
                .or_else(|| resolve_predefined_entity(name))
        })
        .map(Cow::into_owned)
        .map_err(|e| self.error(e.to_string()))
    }

    /// Pulls the next reportable node from the source.
    fn pull(&mut self) -> Result<Option<ReaderNode>, ParseError> {
        loop {
            let mut buf = std::mem::take(&mut self.buf);
            buf.clear();
            let step = self.step(&mut buf);
            self.buf = buf;
            match step? {
                Pulled::Node(node) => return Ok(Some(node)),
                Pulled::Skip => {}
                Pulled::Eof => return Ok(None),
            }
        }
    }

    fn step(&mut self, buf: &mut Vec<u8>) -> Result<Pulled, ParseError> {
        let event = self
            .inner
            .read_event_into(buf)
            .map_err(|e| self.error(e.to_string()))?;

        let depth = self.open.len();
        let node = match event {
            Event::Start(e) => self.start_element(&e, false)?,
            Event::Empty(e) => self.start_element(&e, true)?,
            Event::End(e) => self.end_element(e.name().as_ref())?,
            Event::Text(e) => {
                let text = self.unescape(&self.decode(&e)?)?;
                let blank = text.trim().is_empty();
                if self.open.is_empty() {
                    if blank {
                        return Ok(Pulled::Skip);
                    }
                    return Err(self.error("text outside the document element"));
                }
                let kind = if blank {
                    XmlNodeType::Whitespace
                } else {
                    XmlNodeType::Text
                };
                ReaderNode::with_value(kind, text, depth)
            }
            Event::CData(e) => {
                self.require_open("CDATA section")?;
                ReaderNode::with_value(XmlNodeType::CData, self.decode(&e)?, depth)
            }
            Event::Comment(e) => ReaderNode::with_value(XmlNodeType::Comment, self.decode(&e)?, depth),
            Event::PI(e) => {
                let raw = self.decode(&e)?;
                let (target, data) = match raw.split_once(char::is_whitespace) {
                    Some((target, data)) => (target.to_string(), data.trim_start().to_string()),
                    None => (raw, String::new()),
                };
                ReaderNode {
                    name: target.clone(),
                    local_name: target,
                    value: (!data.is_empty()).then_some(data),
                    depth,
                    ..ReaderNode::new(XmlNodeType::ProcessingInstruction)
                }
            }
            Event::Decl(_) => ReaderNode::new(XmlNodeType::XmlDeclaration),
            Event::DocType(e) => {
                let body = self.decode(&e)?.trim().to_string();
                self.entities = internal_entities(&body).map_err(|message| self.error(message))?;
                if !self.entities.is_empty() {
                    trace!("internal subset declares {} entities", self.entities.len());
                }
                ReaderNode::with_value(XmlNodeType::DocumentType, body, 0)
            }
            Event::Eof => {
                if let Some(name) = self.open.last() {
                    return Err(self.error(format!(
                        "unexpected end of input in element content (<{name}> is not closed)"
                    )));
                }
                if !self.root_seen {
                    return Err(self.error("document has no root element"));
                }
                return Ok(Pulled::Eof);
            }
        };
        Ok(Pulled::Node(node))
    }

    fn require_open(&self, what: &str) -> Result<(), ParseError> {
        if self.open.is_empty() {
            return Err(self.error(format!("{what} outside the document element")));
        }
        Ok(())
    }

    fn resolve(&self, prefix: Option<&str>) -> Result<Option<String>, ParseError> {
        match (prefix, self.ns.resolve(prefix)) {
            (_, Some(uri)) => Ok(Some(uri.to_string())),
            (None, None) => Ok(None),
            (Some(p), None) if self.recover_prefixes => {
                warn!("namespace prefix '{p}' is not bound (offset {})", self.offset());
                Ok(None)
            }
            (Some(p), None) => Err(self.error(format!("namespace prefix '{p}' is not bound"))),
        }
    }

    fn start_element(&mut self, e: &BytesStart<'_>, empty: bool) -> Result<ReaderNode, ParseError> {
        if self.root_closed {
            return Err(self.error("content after document element"));
        }
        let qname = self.decode(e.name().as_ref())?;

        self.ns.push_scope();
        let mut attributes = Vec::new();
        for attr in e.attributes() {
            let attr = attr.map_err(|err| self.error(err.to_string()))?;
            let key = self.decode(attr.key.as_ref())?;
            let raw = self.decode(&attr.value)?;
            let value = self.unescape(&normalize_attribute_whitespace(raw))?;
            let (prefix, local) = split_qname(&key);
            let attribute = Attribute {
                name: local.to_string(),
                value,
                prefix: prefix.map(str::to_string),
                namespace: None,
            };
            if let Some(declared) = attribute.declared_prefix() {
                self.ns.bind(declared, &attribute.value);
            }
            attributes.push(attribute);
        }
        for attr in &mut attributes {
            if attr.prefix.is_some() && !attr.is_namespace_declaration() {
                attr.namespace = self.resolve(attr.prefix.as_deref())?;
            }
        }

        let (prefix, local) = split_qname(&qname);
        let node = ReaderNode {
            node_type: XmlNodeType::Element,
            local_name: local.to_string(),
            prefix: prefix.map(str::to_string),
            namespace_uri: self.resolve(prefix)?,
            depth: self.open.len(),
            is_empty_element: empty,
            attributes,
            value: None,
            name: qname.clone(),
        };

        self.root_seen = true;
        if empty {
            self.ns.pop_scope();
            self.root_closed = self.open.is_empty();
        } else {
            self.open.push(qname);
        }
        Ok(node)
    }

    fn end_element(&mut self, raw: &[u8]) -> Result<ReaderNode, ParseError> {
        let qname = self.decode(raw)?;
        match self.open.last() {
            Some(expected) if *expected == qname => {}
            Some(expected) => {
                return Err(self.error(format!(
                    "mismatched end tag: expected </{expected}>, found </{qname}>"
                )));
            }
            None => return Err(self.error(format!("unexpected end tag </{qname}>"))),
        }

        let (prefix, local) = split_qname(&qname);
        let namespace_uri = self.resolve(prefix)?;
        let prefix = prefix.map(str::to_string);
        let local_name = local.to_string();

        self.open.pop();
        self.ns.pop_scope();
        self.root_closed = self.open.is_empty();
        Ok(ReaderNode {
            name: qname,
            local_name,
            prefix,
            namespace_uri,
            depth: self.open.len(),
            ..ReaderNode::new(XmlNodeType::EndElement)
        })
    }
}

/// `\r\n` and a lone `\r` become `\n` (XML 1.0 §2.11).
fn normalize_line_ends(text: String) -> String {
    if !text.contains('\r') {
        return text;
    }
    text.replace("\r\n", "\n").replace('\r', "\n")
}

/// Literal tabs and newlines in an attribute value become spaces
/// (XML 1.0 §3.3.3). Character references are expanded afterwards, so
/// `&#10;` survives as a newline.
fn normalize_attribute_whitespace(raw: String) -> String {
    if !raw.contains(['\n', '\t']) {
        return raw;
    }
    raw.replace(['\n', '\t'], " ")
}

impl<'a> XmlReader<&'a [u8]> {
    /// Creates a reader over an in-memory document.
    #[must_use]
    pub fn from_bytes(bytes: &'a [u8]) -> Self {
        Self::new(bytes)
    }
}

impl XmlReader<BufReader<File>> {
    /// Opens a file for reading.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be opened.
    pub fn from_file(path: impl AsRef<Path>) -> io::Result<Self> {
        Ok(Self::new(BufReader::new(File::open(path)?)))
    }
}

impl<R: BufRead> XmlCursor for XmlReader<R> {
    fn read(&mut self) -> Result<bool, ParseError> {
        if let Some(node) = self.lookahead.pop_front() {
            self.current = node;
            return Ok(true);
        }
        if self.finished {
            return Ok(false);
        }
        match self.pull()? {
            Some(node) => {
                self.current = node;
                Ok(true)
            }
            None => {
                self.finished = true;
                self.current = ReaderNode::new(XmlNodeType::EndDocument);
                Ok(false)
            }
        }
    }

    fn node_type(&self) -> XmlNodeType {
        self.current.node_type
    }

    fn name(&self) -> Option<&str> {
        match self.current.node_type {
            XmlNodeType::Element | XmlNodeType::EndElement | XmlNodeType::ProcessingInstruction => {
                Some(self.current.name.as_str())
            }
            _ => None,
        }
    }

    fn local_name(&self) -> Option<&str> {
        match self.current.node_type {
            XmlNodeType::Element | XmlNodeType::EndElement | XmlNodeType::ProcessingInstruction => {
                Some(self.current.local_name.as_str())
            }
            _ => None,
        }
    }

    fn is_empty_element(&self) -> bool {
        self.current.node_type == XmlNodeType::Element && self.current.is_empty_element
    }

    fn set_namespace_recovery(&mut self, enabled: bool) {
        self.recover_prefixes = enabled;
    }

    fn expand_into(&mut self, doc: &mut Document) -> Result<NodeId, ParseError> {
        let Some(kind) = self
            .current
            .to_kind()
            .filter(|_| self.current.node_type == XmlNodeType::Element)
        else {
            return Err(self.error(format!(
                "cannot expand a {} node",
                self.current.node_type
            )));
        };
        let root = doc.create_node(kind);

        if !self.current.is_empty_element {
            let mut open = vec![root];
            let mut index = 0;
            while let Some(&parent) = open.last() {
                if index == self.lookahead.len() {
                    let Some(node) = self.pull()? else {
                        return Err(self.error("unexpected end of input in element content"));
                    };
                    trace!("buffered {} node at depth {}", node.node_type, node.depth);
                    self.lookahead.push_back(node);
                }
                let node = &self.lookahead[index];
                index += 1;

                if node.node_type == XmlNodeType::EndElement {
                    open.pop();
                    continue;
                }
                let Some(kind) = node.to_kind() else {
                    continue;
                };
                let id = doc.create_node(kind);
                doc.append_child(parent, id);
                if node.node_type == XmlNodeType::Element && !node.is_empty_element {
                    open.push(id);
                }
            }
        }

        declare_missing(doc, root);
        Ok(root)
    }
}
