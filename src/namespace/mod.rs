//! Namespace bookkeeping for detached fragments.
//!
//! A fragment copied out of the stream keeps the prefixes and namespace
//! URIs its nodes had in the source, but the `xmlns` declarations that
//! bound them may live on ancestors that were never copied. This module
//! finds those missing bindings and either re-declares them on the
//! fragment root ([`declare_missing`]) or removes the namespace
//! information altogether ([`NamespaceFilter`]).

mod filter;
mod resolver;

pub use filter::NamespaceFilter;
pub use resolver::XML_NAMESPACE;
pub(crate) use resolver::NamespaceResolver;

use crate::tree::{Attribute, Document, NodeId, NodeKind};

/// A prefix (`None` for the default namespace) bound to a URI.
pub type Binding = (Option<String>, String);

/// Returns the bindings used inside the subtree at `id` that the subtree
/// does not declare itself.
///
/// Element and attribute prefixes are both considered. The reserved `xml`
/// prefix is never reported. When one prefix is used with two different
/// URIs, the first one seen wins.
#[must_use]
pub fn undeclared_bindings(doc: &Document, id: NodeId) -> Vec<Binding> {
    let mut scope = NamespaceResolver::empty();
    let mut missing = Vec::new();
    collect_undeclared(doc, id, &mut scope, &mut missing);
    missing
}

fn collect_undeclared(
    doc: &Document,
    id: NodeId,
    scope: &mut NamespaceResolver,
    missing: &mut Vec<Binding>,
) {
    let NodeKind::Element {
        prefix,
        namespace,
        attributes,
        ..
    } = &doc.node(id).kind
    else {
        return;
    };

    scope.push_scope();
    for attr in attributes {
        if let Some(declared) = attr.declared_prefix() {
            scope.bind(declared, &attr.value);
        }
    }

    if let Some(uri) = namespace {
        require(scope, missing, prefix.as_deref(), uri);
    }
    for attr in attributes.iter().filter(|a| !a.is_namespace_declaration()) {
        if let (Some(p), Some(uri)) = (attr.prefix.as_deref(), attr.namespace.as_deref()) {
            require(scope, missing, Some(p), uri);
        }
    }

    for child in doc.children(id) {
        collect_undeclared(doc, child, scope, missing);
    }
    scope.pop_scope();
}

fn require(scope: &NamespaceResolver, missing: &mut Vec<Binding>, prefix: Option<&str>, uri: &str) {
    if prefix == Some("xml") || scope.resolve(prefix) == Some(uri) {
        return;
    }
    if missing.iter().any(|(p, _)| p.as_deref() == prefix) {
        return;
    }
    missing.push((prefix.map(str::to_string), uri.to_string()));
}

/// Declares every binding from [`undeclared_bindings`] on the element at
/// `id`, ahead of its own attributes, so the fragment serializes as
/// namespace-well-formed XML on its own.
pub fn declare_missing(doc: &mut Document, id: NodeId) {
    let missing = undeclared_bindings(doc, id);
    if missing.is_empty() {
        return;
    }
    if let NodeKind::Element { attributes, .. } = &mut doc.node_mut(id).kind {
        let mut merged: Vec<Attribute> = missing
            .into_iter()
            .map(|(prefix, uri)| Attribute::namespace_declaration(prefix.as_deref(), uri))
            .collect();
        merged.append(attributes);
        *attributes = merged;
    }
}
