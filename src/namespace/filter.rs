//! Namespace stripping for detached copies.

use super::NamespaceResolver;
use crate::tree::{Document, NodeId, NodeKind};

/// Removes namespace information from detached copies.
///
/// The filter works on whichever document owns the copy it is given, so
/// one filter serves both the session document and scratch documents. A
/// new one is made for every `process()` call.
#[derive(Debug, Default)]
pub struct NamespaceFilter {
    stripped: usize,
}

impl NamespaceFilter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of declarations removed so far.
    #[must_use]
    pub fn stripped(&self) -> usize {
        self.stripped
    }

    /// Strips every non-`xml` namespace declaration from the subtree at
    /// `node`, together with the prefixes and namespace URIs they bound.
    ///
    /// The node is attached under the document node of `doc` for the duration of
    /// the walk and detached again afterwards. Nodes outside the subtree
    /// are never touched. Returns the number of declarations removed.
    pub fn strip(&mut self, doc: &mut Document, node: NodeId) -> usize {
        let owner = doc.root();
        let attached = doc.parent(node).is_none() && node != owner;
        if attached {
            doc.append_child(owner, node);
        }

        let mut scope = NamespaceResolver::empty();
        let removed = strip_element(doc, node, &mut scope);

        if attached {
            doc.detach(node);
        }
        self.stripped += removed;
        removed
    }
}

fn strip_element(doc: &mut Document, id: NodeId, scope: &mut NamespaceResolver) -> usize {
    let mut removed = 0;
    if let NodeKind::Element {
        prefix,
        namespace,
        attributes,
        ..
    } = &mut doc.node_mut(id).kind
    {
        scope.push_scope();
        attributes.retain(|attr| match attr.declared_prefix() {
            Some(Some("xml")) | None => true,
            Some(declared) => {
                scope.bind(declared, &attr.value);
                removed += 1;
                false
            }
        });

        if namespace.is_some() && scope.resolve(prefix.as_deref()) == namespace.as_deref() {
            *prefix = None;
            *namespace = None;
        } else if namespace.is_none() {
            // Unbound prefix read in recovery mode
            *prefix = None;
        }
        for attr in attributes.iter_mut() {
            if attr.prefix.is_some()
                && attr.namespace.is_some()
                && scope.resolve(attr.prefix.as_deref()) == attr.namespace.as_deref()
            {
                attr.prefix = None;
                attr.namespace = None;
            }
        }
    } else {
        return 0;
    }

    let children: Vec<NodeId> = doc.children(id).collect();
    for child in children {
        removed += strip_element(doc, child, scope);
    }
    scope.pop_scope();
    removed
}
