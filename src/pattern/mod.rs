//! Path patterns and match dispatch.
//!
//! A pattern is a regular expression matched against the whole element
//! path, as if wrapped in `^(?:...)$`. All patterns are compiled before
//! the first event is read. For each element, every pattern is tried in
//! registration order and every one that matches fires.

use crate::error::Error;
use crate::param::{Callback, Strategy};
use regex::Regex;
use std::ops::Index;

/// A compiled, fully anchored path pattern.
#[derive(Debug, Clone)]
pub struct Pattern {
    source: String,
    regex: Regex,
}

impl Pattern {
    /// Compiles `source` anchored at both ends.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Pattern`] if `source` is not a valid regular
    /// expression.
    pub fn new(source: impl Into<String>) -> Result<Self, Error> {
        let source = source.into();
        match Regex::new(&format!("^(?:{source})$")) {
            Ok(regex) => Ok(Self { source, regex }),
            Err(e) => Err(Error::Pattern { pattern: source, source: e }),
        }
    }

    /// The pattern as written by the caller.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Matches `path` and returns its capture groups.
    #[must_use]
    pub fn captures(&self, path: &str) -> Option<Captures> {
        let caps = self.regex.captures(path)?;
        Some(Captures(
            caps.iter()
                .flatten()
                .map(|m| m.as_str().to_string())
                .collect(),
        ))
    }

    #[must_use]
    pub fn is_match(&self, path: &str) -> bool {
        self.regex.is_match(path)
    }
}

/// The capture groups of one match.
///
/// Index 0 is the whole path. The remaining entries are the groups that
/// took part in the match, in order of their opening parenthesis. Groups
/// that did not participate are left out, so the length varies between
/// matches of the same pattern.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Captures(Vec<String>);

impl Captures {
    /// The matched path.
    #[must_use]
    pub fn path(&self) -> &str {
        self.0.first().map_or("", String::as_str)
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&str> {
        self.0.get(index).map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    #[must_use]
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    #[must_use]
    pub fn into_vec(self) -> Vec<String> {
        self.0
    }
}

impl From<Vec<String>> for Captures {
    fn from(groups: Vec<String>) -> Self {
        Self(groups)
    }
}

impl Index<usize> for Captures {
    type Output = str;

    fn index(&self, index: usize) -> &str {
        &self.0[index]
    }
}

/// A pattern with its resolved strategy and callback.
#[derive(Debug)]
pub struct PatternEntry<'f> {
    pub pattern: Pattern,
    pub strategy: Strategy,
    pub callback: Callback<'f>,
}

/// The ordered patterns of one `process()` call.
#[derive(Debug, Default)]
pub struct PatternSet<'f> {
    entries: Vec<PatternEntry<'f>>,
}

impl<'f> PatternSet<'f> {
    /// Compiles every pattern and resolves every callback's strategy.
    ///
    /// Nothing is kept if any entry fails.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Registration`] for a callback with an unsupported
    /// declared type and [`Error::Pattern`] for an invalid expression.
    pub fn compile<P, I>(patterns: I, output_namespace: bool) -> Result<Self, Error>
    where
        P: Into<String>,
        I: IntoIterator<Item = (P, Callback<'f>)>,
    {
        let mut entries = Vec::new();
        for (source, callback) in patterns {
            let source = source.into();
            let param = callback.param_type(&source)?;
            entries.push(PatternEntry {
                pattern: Pattern::new(source)?,
                strategy: Strategy::resolve(param, output_namespace),
                callback,
            });
        }
        Ok(Self { entries })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PatternEntry<'f>> {
        self.entries.iter()
    }

    /// Runs `on_match` for every entry whose pattern matches `path`, in
    /// registration order. Stops at the first error.
    ///
    /// Returns the number of entries that matched.
    ///
    /// # Errors
    ///
    /// Returns the first error `on_match` returns.
    pub fn dispatch<F>(&mut self, path: &str, mut on_match: F) -> Result<usize, Error>
    where
        F: FnMut(&mut PatternEntry<'f>, Captures) -> Result<(), Error>,
    {
        let mut matched = 0;
        for entry in &mut self.entries {
            if let Some(captures) = entry.pattern.captures(path) {
                matched += 1;
                on_match(entry, captures)?;
            }
        }
        Ok(matched)
    }
}
