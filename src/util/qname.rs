//! `QName` (qualified name) handling.
//!
//! A `QName` is a name of the form `prefix:localname` or just `localname`.
//! Paths can be built from either form, so both directions are needed:
//! splitting what the tokenizer reports and joining what the tree stores.
//!
//! See <https://www.w3.org/TR/xml-names/#NT-QName>

use std::borrow::Cow;

/// Splits a `QName` into its prefix and local name parts.
///
/// Returns `(Some(prefix), localname)` if the name contains a colon,
/// or `(None, localname)` if it does not.
///
/// # Examples
///
/// ```
/// use xmlreg::util::qname::split_qname;
///
/// assert_eq!(split_qname("svg:rect"), (Some("svg"), "rect"));
/// assert_eq!(split_qname("div"), (None, "div"));
/// ```
#[must_use]
pub fn split_qname(qname: &str) -> (Option<&str>, &str) {
    match qname.find(':') {
        Some(pos) => (Some(&qname[..pos]), &qname[pos + 1..]),
        None => (None, qname),
    }
}

/// Joins a prefix and a local name back into a `QName`.
///
/// Borrows the local name when there is no prefix.
#[must_use]
pub fn qualified_name<'a>(prefix: Option<&str>, local: &'a str) -> Cow<'a, str> {
    match prefix {
        Some(p) => Cow::Owned(format!("{p}:{local}")),
        None => Cow::Borrowed(local),
    }
}
