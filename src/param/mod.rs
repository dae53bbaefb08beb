//! Callback parameter types and materialization strategies.
//!
//! Every callback says, once, what shape of value it wants: a tree node or
//! a string. The choice is fixed before the first event is read, so a
//! matched element is only ever materialized in the one form its callback
//! asked for.
//!
//! Typed callbacks ([`Callback::node`], [`Callback::text`]) carry their
//! shape in their signature. Declared callbacks ([`Callback::declared`])
//! name it with a string, which is checked when `process()` starts.

use crate::error::{CallbackError, CallbackResult, RegistrationError};
use crate::pattern::Captures;
use crate::tree::NodeRef;
use std::fmt;

/// The shape a callback's value parameter asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    /// A detached tree node.
    Element,
    /// The element's inner markup as a string.
    Text,
}

impl ParamType {
    /// Resolves a declared type name.
    ///
    /// `element`, `node`, `noderef` and `tree` select a tree node.
    /// `string`, `str`, `&str`, `text` and the empty name select text.
    /// Matching ignores ASCII case. Returns `None` for anything else.
    #[must_use]
    pub fn from_type_name(name: &str) -> Option<Self> {
        let name = name.trim().to_ascii_lowercase();
        match name.as_str() {
            "element" | "node" | "noderef" | "tree" => Some(Self::Element),
            "" | "string" | "str" | "&str" | "text" => Some(Self::Text),
            _ => None,
        }
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Element => f.write_str("element"),
            Self::Text => f.write_str("string"),
        }
    }
}

/// How a matched element is turned into a callback value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Copy the subtree into the document, namespaces kept.
    DetachedTree,
    /// Copy the subtree, then strip every namespace declaration and prefix.
    NamespaceStrippedTree,
    /// Serialize the element's children and trim the result.
    InnerText,
}

impl Strategy {
    /// Picks the strategy for a parameter type under the session's
    /// namespace output setting.
    #[must_use]
    pub fn resolve(param: ParamType, output_namespace: bool) -> Self {
        match param {
            ParamType::Element if output_namespace => Self::DetachedTree,
            ParamType::Element => Self::NamespaceStrippedTree,
            ParamType::Text => Self::InnerText,
        }
    }

    /// Whether values produced by this strategy are tree nodes.
    #[must_use]
    pub fn is_tree(self) -> bool {
        !matches!(self, Self::InnerText)
    }
}

/// A materialized value handed to a declared callback.
#[derive(Debug, Clone)]
pub enum Value<'a> {
    /// A detached node owned by the reader's document.
    Node(NodeRef<'a>),
    /// Inner markup, trimmed.
    Text(String),
}

impl<'a> Value<'a> {
    #[must_use]
    pub fn as_node(&self) -> Option<NodeRef<'a>> {
        match self {
            Self::Node(n) => Some(*n),
            Self::Text(_) => None,
        }
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            Self::Node(_) => None,
        }
    }

    fn param_type(&self) -> ParamType {
        match self {
            Self::Node(_) => ParamType::Element,
            Self::Text(_) => ParamType::Text,
        }
    }
}

impl fmt::Display for Value<'_> {
    /// Nodes display as their markup, text as itself.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Node(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

type NodeFn<'f> = Box<dyn FnMut(NodeRef<'_>, &Captures) -> CallbackResult + 'f>;
type TextFn<'f> = Box<dyn FnMut(String, &Captures) -> CallbackResult + 'f>;
type ValueFn<'f> = Box<dyn FnMut(Value<'_>, &Captures) -> CallbackResult + 'f>;

/// A user callback bound to a pattern.
///
/// The second argument holds the capture groups of the match; callbacks
/// that only care about the value ignore it.
///
/// # Examples
///
/// ```
/// use xmlreg::{Callback, Captures};
///
/// let mut names = Vec::new();
/// let cb = Callback::text(|text: String, _: &Captures| {
///     names.push(text);
///     Ok(())
/// });
/// # drop(cb);
/// ```
pub enum Callback<'f> {
    /// Receives a tree node.
    Node(NodeFn<'f>),
    /// Receives inner text.
    Text(TextFn<'f>),
    /// Receives whichever value its declared type name selects.
    Declared {
        /// The declared parameter type name, e.g. `"element"` or `"string"`.
        type_name: String,
        /// The callback itself.
        f: ValueFn<'f>,
    },
}

impl<'f> Callback<'f> {
    /// A callback that receives the matched element as a tree node.
    pub fn node<F>(f: F) -> Self
    where
        F: FnMut(NodeRef<'_>, &Captures) -> CallbackResult + 'f,
    {
        Self::Node(Box::new(f))
    }

    /// A callback that receives the matched element's inner text.
    pub fn text<F>(f: F) -> Self
    where
        F: FnMut(String, &Captures) -> CallbackResult + 'f,
    {
        Self::Text(Box::new(f))
    }

    /// A callback whose value shape is named by `type_name`.
    ///
    /// The name is resolved with [`ParamType::from_type_name`] when
    /// `process()` starts; an unknown name fails the call before any
    /// input is read.
    pub fn declared<F>(type_name: impl Into<String>, f: F) -> Self
    where
        F: FnMut(Value<'_>, &Captures) -> CallbackResult + 'f,
    {
        Self::Declared {
            type_name: type_name.into(),
            f: Box::new(f),
        }
    }

    /// Resolves the parameter type this callback expects.
    ///
    /// # Errors
    ///
    /// Returns `RegistrationError` for an unknown declared type name.
    pub fn param_type(&self, pattern: &str) -> Result<ParamType, RegistrationError> {
        match self {
            Self::Node(_) => Ok(ParamType::Element),
            Self::Text(_) => Ok(ParamType::Text),
            Self::Declared { type_name, .. } => {
                ParamType::from_type_name(type_name).ok_or_else(|| RegistrationError {
                    pattern: pattern.to_string(),
                    type_name: type_name.clone(),
                })
            }
        }
    }

    /// Calls the callback with a value of the shape it asked for.
    ///
    /// # Errors
    ///
    /// Returns whatever the callback returns, or an error if `value` has
    /// the wrong shape for a typed callback.
    pub fn invoke(&mut self, value: Value<'_>, captures: &Captures) -> CallbackResult {
        match (self, value) {
            (Self::Node(f), Value::Node(node)) => f(node, captures),
            (Self::Text(f), Value::Text(text)) => f(text, captures),
            (Self::Declared { f, .. }, value) => f(value, captures),
            (Self::Node(_), value) | (Self::Text(_), value) => Err(CallbackError::from(format!(
                "callback cannot take a {} value",
                value.param_type()
            ))),
        }
    }
}

impl fmt::Debug for Callback<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Node(_) => f.write_str("Callback::Node"),
            Self::Text(_) => f.write_str("Callback::Text"),
            Self::Declared { type_name, .. } => {
                write!(f, "Callback::Declared({type_name:?})")
            }
        }
    }
}
