//! Prefix-to-URI scope stack.

/// The well-known XML namespace URI, pre-bound to the `xml` prefix.
pub const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";

/// Tracks namespace bindings while walking nested elements.
///
/// Each frame holds the `xmlns` declarations introduced on one element.
/// Resolution walks the frames from innermost to outermost.
#[derive(Debug, Clone)]
pub(crate) struct NamespaceResolver {
    /// `(prefix, uri)` pairs per element; a `None` prefix is the default
    /// namespace.
    stack: Vec<Vec<(Option<String>, String)>>,
}

impl NamespaceResolver {
    /// Creates a resolver with the `xml` prefix pre-bound.
    pub fn new() -> Self {
        Self {
            stack: vec![vec![(Some("xml".to_string()), XML_NAMESPACE.to_string())]],
        }
    }

    /// Creates a resolver with no bindings at all.
    ///
    /// Used when walking a detached fragment, where only declarations that
    /// appear inside the fragment count.
    pub fn empty() -> Self {
        Self {
            stack: vec![Vec::new()],
        }
    }

    pub fn push_scope(&mut self) {
        self.stack.push(Vec::new());
    }

    pub fn pop_scope(&mut self) {
        // The outermost frame holds the pre-bound prefixes.
        if self.stack.len() > 1 {
            self.stack.pop();
        }
    }

    /// Binds `prefix` (`None` for `xmlns="..."`) in the innermost scope.
    pub fn bind(&mut self, prefix: Option<&str>, uri: &str) {
        if let Some(frame) = self.stack.last_mut() {
            frame.push((prefix.map(str::to_string), uri.to_string()));
        }
    }

    /// Resolves a prefix to its URI, innermost binding first.
    ///
    /// An empty default namespace (`xmlns=""`) resolves to `None`.
    pub fn resolve(&self, prefix: Option<&str>) -> Option<&str> {
        self.stack
            .iter()
            .rev()
            .flat_map(|frame| frame.iter().rev())
            .find(|(p, _)| p.as_deref() == prefix)
            .and_then(|(_, uri)| (!uri.is_empty()).then_some(uri.as_str()))
    }
}
