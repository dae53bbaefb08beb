//! The forward-only dispatch loop.
//!
//! [`RegReader`] pulls events from an [`XmlCursor`], keeps the element path
//! up to date, and for every element start runs the registered patterns
//! against the path. Matching callbacks receive the element materialized
//! the way they asked for.
//!
//! # Examples
//!
//! ```
//! use xmlreg::{Callback, RegReader};
//!
//! let xml = b"<root><person><firstname>John</firstname></person></root>";
//! let mut names = Vec::new();
//!
//! let mut reader = RegReader::from_bytes(xml);
//! reader
//!     .process([(
//!         "/root/person/firstname",
//!         Callback::text(|name, _| {
//!             names.push(name);
//!             Ok(())
//!         }),
//!     )])
//!     .unwrap();
//!
//! assert_eq!(names, vec!["John"]);
//! ```

use crate::error::{Error, ParseError};
use crate::namespace::NamespaceFilter;
use crate::param::{Callback, Strategy, Value};
use crate::path::PathTracker;
use crate::pattern::PatternSet;
use crate::reader::{XmlCursor, XmlNodeType, XmlReader};
use crate::serial::serialize_children;
use crate::tree::{Document, NodeId};
use log::{debug, trace};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Session settings for [`RegReader`]. All three default to `true`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReaderOptions {
    /// Add `[n]` suffixes for repeated sibling names.
    pub array_notation: bool,
    /// Build paths from qualified names (`a:person`) rather than local
    /// names (`person`).
    pub use_namespaces: bool,
    /// Keep namespace declarations and prefixes in values. When `false`,
    /// tree and text values are stripped of them.
    pub output_namespace: bool,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        Self {
            array_notation: true,
            use_namespaces: true,
            output_namespace: true,
        }
    }
}

impl ReaderOptions {
    #[must_use]
    pub fn array_notation(mut self, enabled: bool) -> Self {
        self.array_notation = enabled;
        self
    }

    #[must_use]
    pub fn use_namespaces(mut self, enabled: bool) -> Self {
        self.use_namespaces = enabled;
        self
    }

    #[must_use]
    pub fn output_namespace(mut self, enabled: bool) -> Self {
        self.output_namespace = enabled;
        self
    }
}

/// A shareable stop request.
///
/// Clones share one flag. The driver checks it once per event, before
/// reading the next one, so a stop requested inside a callback lets that
/// callback (and any other pattern matching the same element) finish.
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    /// Asks the driver to stop at its next check.
    pub fn request_stop(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    #[must_use]
    pub fn is_stop_requested(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    fn reset(&self) {
        self.0.store(false, Ordering::Relaxed);
    }
}

/// Where the driver is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    /// No `process()` call has run yet.
    Idle,
    /// A `process()` call is running, or ended with an error.
    Reading,
    /// The last `process()` call reached the end of input or a stop
    /// request.
    Stopped,
}

/// Counters for one `process()` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcessStats {
    /// Events read from the cursor.
    pub events: usize,
    /// Element starts seen.
    pub elements: usize,
    /// Callback invocations.
    pub matches: usize,
    /// Whether a stop request ended the loop before end of input.
    pub stopped_early: bool,
}

/// Streaming reader that dispatches element paths to callbacks.
///
/// Every tree value handed out lives in a [`Document`]. Unless one was
/// supplied with [`set_document`](Self::set_document), the reader starts a
/// new document at each `process()` call and keeps it until the next one,
/// so nodes a callback received can be looked up afterwards through
/// [`document`](Self::document) by their [`NodeId`]. A supplied document
/// is kept across calls.
pub struct RegReader<C: XmlCursor> {
    cursor: C,
    options: ReaderOptions,
    document: Option<Document>,
    supplied: bool,
    stop: StopHandle,
    path: PathTracker,
    state: DriverState,
}

impl RegReader<XmlReader<BufReader<File>>> {
    /// Opens an XML file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file cannot be opened.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        Ok(Self::new(XmlReader::from_file(path)?))
    }
}

impl<'a> RegReader<XmlReader<&'a [u8]>> {
    /// Reads an in-memory document.
    #[must_use]
    pub fn from_bytes(bytes: &'a [u8]) -> Self {
        Self::new(XmlReader::from_bytes(bytes))
    }
}

impl<C: XmlCursor> RegReader<C> {
    /// Wraps a cursor with default options.
    pub fn new(cursor: C) -> Self {
        Self::with_options(cursor, ReaderOptions::default())
    }

    pub fn with_options(cursor: C, options: ReaderOptions) -> Self {
        Self {
            cursor,
            options,
            document: None,
            supplied: false,
            stop: StopHandle::default(),
            path: PathTracker::new(),
            state: DriverState::Idle,
        }
    }

    #[must_use]
    pub fn options(&self) -> ReaderOptions {
        self.options
    }

    pub fn set_array_notation(&mut self, enabled: bool) {
        self.options.array_notation = enabled;
    }

    pub fn set_use_namespaces(&mut self, enabled: bool) {
        self.options.use_namespaces = enabled;
    }

    pub fn set_output_namespaces(&mut self, enabled: bool) {
        self.options.output_namespace = enabled;
    }

    /// Supplies the document that will own every tree value, across all
    /// later `process()` calls until it is taken back.
    ///
    /// Returns the previous document, if any.
    pub fn set_document(&mut self, document: Document) -> Option<Document> {
        self.supplied = true;
        self.document.replace(document)
    }

    #[must_use]
    pub fn document(&self) -> Option<&Document> {
        self.document.as_ref()
    }

    pub fn document_mut(&mut self) -> Option<&mut Document> {
        self.document.as_mut()
    }

    /// Takes the document out; the next `process()` call starts a new one.
    pub fn take_document(&mut self) -> Option<Document> {
        self.supplied = false;
        self.document.take()
    }

    /// A handle that callbacks can use to stop the current `process()`.
    #[must_use]
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn request_stop(&self) {
        self.stop.request_stop();
    }

    #[must_use]
    pub fn state(&self) -> DriverState {
        self.state
    }

    #[must_use]
    pub fn cursor(&self) -> &C {
        &self.cursor
    }

    /// Returns the cursor, positioned after the last event consumed.
    pub fn into_inner(self) -> C {
        self.cursor
    }

    /// Reads the input to the end, or until a stop is requested, calling
    /// the callback of every pattern that matches an element's path.
    ///
    /// Patterns are tried in iteration order and all matches fire. The
    /// path and the stop flag are reset first, and so is the document
    /// unless the caller supplied it.
    ///
    /// # Errors
    ///
    /// - [`Error::Registration`] or [`Error::Pattern`] before any input is
    ///   read, if a callback or pattern is unusable.
    /// - [`Error::Parse`] if the input is malformed.
    /// - [`Error::Callback`] if a callback fails. The reader stays where
    ///   the failing element left it.
    pub fn process<'f, P, I>(&mut self, patterns: I) -> Result<ProcessStats, Error>
    where
        P: Into<String>,
        I: IntoIterator<Item = (P, Callback<'f>)>,
    {
        let Self {
            cursor,
            options,
            document,
            supplied,
            stop,
            path,
            state,
        } = self;
        let options = *options;

        let mut patterns = PatternSet::compile(patterns, options.output_namespace)?;
        debug!(
            "processing with {} pattern(s): array_notation={} use_namespaces={} output_namespace={}",
            patterns.len(),
            options.array_notation,
            options.use_namespaces,
            options.output_namespace
        );

        if !*supplied {
            *document = Some(Document::new());
        }
        let document = document.get_or_insert_with(Document::new);
        let mut filter = NamespaceFilter::new();
        cursor.set_namespace_recovery(!options.use_namespaces);
        stop.reset();
        path.reset();
        *state = DriverState::Reading;

        let mut stats = ProcessStats::default();
        loop {
            if stop.is_stop_requested() {
                stats.stopped_early = true;
                break;
            }
            if !cursor.read()? {
                break;
            }
            stats.events += 1;

            match cursor.node_type() {
                XmlNodeType::Element => {
                    stats.elements += 1;
                    let name = element_name(cursor, options.use_namespaces);
                    path.start(&name);
                    let current = path.current_path(options.array_notation);

                    stats.matches += patterns.dispatch(&current, |entry, captures| {
                        trace!("'{}' matched {current}", entry.pattern.as_str());
                        let value = materialize(
                            cursor,
                            document,
                            &mut filter,
                            entry.strategy,
                            options.output_namespace,
                        )?;
                        let value = match value {
                            Materialized::Node(id) => Value::Node(document.get(id)),
                            Materialized::Text(text) => Value::Text(text),
                        };
                        entry
                            .callback
                            .invoke(value, &captures)
                            .map_err(|source| Error::Callback {
                                pattern: entry.pattern.as_str().to_string(),
                                source,
                            })
                    })?;

                    if cursor.is_empty_element() {
                        path.end(&name);
                    }
                }
                XmlNodeType::EndElement => {
                    let name = element_name(cursor, options.use_namespaces);
                    path.end(&name);
                }
                _ => {}
            }
        }

        *state = DriverState::Stopped;
        debug!(
            "processed {} event(s), {} element(s), {} match(es){}; {} namespace declaration(s) stripped",
            stats.events,
            stats.elements,
            stats.matches,
            if stats.stopped_early { ", stopped early" } else { "" },
            filter.stripped()
        );
        Ok(stats)
    }
}

fn element_name<C: XmlCursor>(cursor: &C, use_namespaces: bool) -> String {
    let name = if use_namespaces {
        cursor.name()
    } else {
        cursor.local_name()
    };
    name.unwrap_or_default().to_string()
}

enum Materialized {
    Node(NodeId),
    Text(String),
}

fn materialize<C: XmlCursor>(
    cursor: &mut C,
    document: &mut Document,
    filter: &mut NamespaceFilter,
    strategy: Strategy,
    output_namespace: bool,
) -> Result<Materialized, ParseError> {
    match strategy {
        Strategy::DetachedTree => Ok(Materialized::Node(cursor.expand_into(document)?)),
        Strategy::NamespaceStrippedTree => {
            let id = cursor.expand_into(document)?;
            filter.strip(document, id);
            Ok(Materialized::Node(id))
        }
        Strategy::InnerText if output_namespace => {
            Ok(Materialized::Text(cursor.read_inner_xml()?.trim().to_string()))
        }
        Strategy::InnerText => {
            // The copy only feeds the string; keep it out of the session document
            let mut scratch = Document::new();
            let id = cursor.expand_into(&mut scratch)?;
            filter.strip(&mut scratch, id);
            let text = serialize_children(&scratch, id);
            Ok(Materialized::Text(text.trim().to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::NodeKind;
    use std::cell::RefCell;

    /// A cursor that replays a fixed list of element events.
    struct ScriptedCursor {
        events: Vec<(XmlNodeType, &'static str, bool)>,
        pos: Option<usize>,
        reads: usize,
    }

    impl ScriptedCursor {
        /// `<` opens, `>` closes, `/` is self-closing, anything else is text.
        fn new(script: &[&'static str]) -> Self {
            let events = script
                .iter()
                .map(|&s| match s.split_at(1) {
                    ("<", name) => (XmlNodeType::Element, name, false),
                    (">", name) => (XmlNodeType::EndElement, name, false),
                    ("/", name) => (XmlNodeType::Element, name, true),
                    _ => (XmlNodeType::Text, s, false),
                })
                .collect();
            Self {
                events,
                pos: None,
                reads: 0,
            }
        }

        fn current(&self) -> Option<&(XmlNodeType, &'static str, bool)> {
            self.pos.and_then(|p| self.events.get(p))
        }
    }

    impl XmlCursor for ScriptedCursor {
        fn read(&mut self) -> Result<bool, ParseError> {
            self.reads += 1;
            let next = self.pos.map_or(0, |p| p + 1);
            self.pos = Some(next);
            Ok(next < self.events.len())
        }

        fn node_type(&self) -> XmlNodeType {
            self.current().map_or(XmlNodeType::EndDocument, |e| e.0)
        }

        fn name(&self) -> Option<&str> {
            self.current().map(|e| e.1)
        }

        fn local_name(&self) -> Option<&str> {
            self.name().map(|n| n.rsplit(':').next().unwrap_or(n))
        }

        fn is_empty_element(&self) -> bool {
            self.current().is_some_and(|e| e.2)
        }

        fn expand_into(&mut self, doc: &mut Document) -> Result<NodeId, ParseError> {
            let name = self.name().unwrap_or_default().to_string();
            Ok(doc.create_node(NodeKind::element(name)))
        }
    }

    fn collect_paths(reader: &mut RegReader<ScriptedCursor>, pattern: &str) -> Vec<String> {
        let mut paths = Vec::new();
        reader
            .process([(
                pattern,
                Callback::node(|_, caps| {
                    paths.push(caps.path().to_string());
                    Ok(())
                }),
            )])
            .unwrap();
        paths
    }

    #[test]
    fn test_self_closing_counts_as_sibling() {
        let cursor = ScriptedCursor::new(&["<root", "/a", "<a", ">a", "/a", ">root"]);
        let mut reader = RegReader::new(cursor);
        assert_eq!(reader.state(), DriverState::Idle);

        let paths = collect_paths(&mut reader, ".*");
        assert_eq!(paths, vec!["/root", "/root/a", "/root/a[1]", "/root/a[2]"]);
        assert_eq!(reader.state(), DriverState::Stopped);
    }

    #[test]
    fn test_array_notation_off() {
        let cursor = ScriptedCursor::new(&["<root", "/a", "/a", ">root"]);
        let mut reader = RegReader::with_options(cursor, ReaderOptions::default().array_notation(false));
        let paths = collect_paths(&mut reader, "/root/a");
        assert_eq!(paths, vec!["/root/a", "/root/a"]);
    }

    #[test]
    fn test_local_names() {
        let cursor = ScriptedCursor::new(&["<x:root", "/a:person", ">x:root"]);
        let mut reader = RegReader::new(cursor);
        reader.set_use_namespaces(false);
        let paths = collect_paths(&mut reader, ".*person");
        assert_eq!(paths, vec!["/root/person"]);
    }

    #[test]
    fn test_stop_takes_effect_at_next_event() {
        let cursor = ScriptedCursor::new(&["<root", "/a", "/a", "/a", ">root"]);
        let mut reader = RegReader::new(cursor);
        let stop = reader.stop_handle();
        let seen = RefCell::new(Vec::new());

        let stats = reader
            .process([
                (
                    "/root/a.*",
                    Callback::node(|_, caps| {
                        seen.borrow_mut().push(format!("first {}", caps.path()));
                        stop.request_stop();
                        Ok(())
                    }),
                ),
                (
                    "/root/a",
                    Callback::node(|_, caps| {
                        seen.borrow_mut().push(format!("second {}", caps.path()));
                        Ok(())
                    }),
                ),
            ])
            .unwrap();

        // Both patterns matching the current element still fire
        assert_eq!(seen.into_inner(), vec!["first /root/a", "second /root/a"]);
        assert!(stats.stopped_early);
        assert_eq!(stats.matches, 2);
        assert_eq!(reader.state(), DriverState::Stopped);
        assert_eq!(reader.cursor().reads, 2);
    }

    #[test]
    fn test_registration_error_reads_nothing() {
        let cursor = ScriptedCursor::new(&["/root"]);
        let mut reader = RegReader::new(cursor);
        let result = reader.process([("/root", Callback::declared("int", |_, _| Ok(())))]);
        assert!(matches!(result, Err(Error::Registration(_))));
        assert_eq!(reader.cursor().reads, 0);
        assert_eq!(reader.state(), DriverState::Idle);
        assert!(reader.document().is_none());
    }

    #[test]
    fn test_callback_error_aborts() {
        let cursor = ScriptedCursor::new(&["<root", "/a", "/b", ">root"]);
        let mut reader = RegReader::new(cursor);
        let result = reader.process([(
            "/root/a",
            Callback::node(|_, _| Err("bad person".into())),
        )]);
        let Err(Error::Callback { pattern, source }) = result else {
            panic!("expected callback error");
        };
        assert_eq!(pattern, "/root/a");
        assert_eq!(source.to_string(), "bad person");
        assert_eq!(reader.state(), DriverState::Reading);
        assert_eq!(reader.cursor().reads, 2);
    }

    #[test]
    fn test_process_resets_stop_and_path() {
        let cursor = ScriptedCursor::new(&["<root", "/a", ">root"]);
        let mut reader = RegReader::new(cursor);
        reader.request_stop();
        let stats = reader.process(Vec::<(&str, Callback<'_>)>::new()).unwrap();
        assert!(!stats.stopped_early);
        assert_eq!(stats.elements, 2);
    }

    #[test]
    fn test_tree_values_live_in_reader_document() {
        let cursor = ScriptedCursor::new(&["<root", "/a", "/b", ">root"]);
        let mut reader = RegReader::new(cursor);
        let mut ids = Vec::new();
        reader
            .process([(
                "/root/.",
                Callback::node(|node, _| {
                    ids.push(node.id());
                    Ok(())
                }),
            )])
            .unwrap();

        let Some(doc) = reader.document() else {
            panic!("document should exist after process");
        };
        let names: Vec<_> = ids.iter().map(|&id| doc.node_name(id)).collect();
        assert_eq!(names, vec![Some("a"), Some("b")]);
    }

    #[test]
    fn test_owned_document_is_replaced_per_call() {
        let cursor = ScriptedCursor::new(&["<root", "/a", "/b", ">root"]);
        let mut reader = RegReader::new(cursor);
        reader.process([("/root/.", Callback::node(|_, _| Ok(())))]).unwrap();
        assert_eq!(reader.document().map(Document::node_count), Some(3));

        // Nothing left to read, but the values of the first call are gone
        reader.process([("/root/.", Callback::node(|_, _| Ok(())))]).unwrap();
        assert_eq!(reader.document().map(Document::node_count), Some(1));
    }

    #[test]
    fn test_caller_supplied_document_is_used() {
        let cursor = ScriptedCursor::new(&["/root"]);
        let mut reader = RegReader::new(cursor);
        let mut doc = Document::new();
        let marker = doc.create_node(NodeKind::element("marker"));
        assert!(reader.set_document(doc).is_none());

        reader
            .process([("/root", Callback::node(|_, _| Ok(())))])
            .unwrap();

        let Some(doc) = reader.take_document() else {
            panic!("document should be kept");
        };
        assert_eq!(doc.node_name(marker), Some("marker"));
        assert_eq!(doc.node_count(), 3);
        assert!(reader.document().is_none());
    }

    #[test]
    fn test_supplied_document_kept_across_calls() {
        let cursor = ScriptedCursor::new(&["/root", "/root"]);
        let mut reader = RegReader::new(cursor);
        reader.set_document(Document::new());

        let stop = reader.stop_handle();
        let first = Callback::node(|_, _| {
            stop.request_stop();
            Ok(())
        });
        reader.process([("/root", first)]).unwrap();
        reader.process([("/root", Callback::node(|_, _| Ok(())))]).unwrap();

        assert_eq!(reader.document().map(Document::node_count), Some(3));
    }
}
