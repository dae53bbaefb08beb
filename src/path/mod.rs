//! Element path tracking with sibling counters.
//!
//! The tracker mirrors the nesting of the elements the driver has entered.
//! Next to the stack of names it keeps, for every open level, how many
//! times each child name has already been closed at that level. Those
//! counters produce the `[n]` suffixes:
//!
//! ```text
//! <root>
//!   <person/>     /root/person
//!   <person/>     /root/person[1]
//!   <other/>      /root/other
//!   <person/>     /root/person[2]
//! </root>
//! ```

use std::collections::HashMap;
use std::fmt::Write;

/// Stack of open element names and per-level sibling counters.
///
/// `frames` always holds one more entry than `names`: `frames[k]` counts
/// the closed children of the level above `names[k]`, and the last frame
/// belongs to the innermost open element.
#[derive(Debug, Clone)]
pub struct PathTracker {
    names: Vec<String>,
    frames: Vec<HashMap<String, usize>>,
}

impl PathTracker {
    #[must_use]
    pub fn new() -> Self {
        Self {
            names: Vec::new(),
            frames: vec![HashMap::new()],
        }
    }

    /// Enters an element.
    pub fn start(&mut self, name: &str) {
        self.names.push(name.to_string());
        self.frames.push(HashMap::new());
    }

    /// Leaves the innermost element and counts it against its parent.
    ///
    /// Ends of elements opened before the last [`reset`](Self::reset) find
    /// the stack empty and are ignored.
    pub fn end(&mut self, name: &str) {
        if self.names.pop().is_none() {
            return;
        }
        self.frames.pop();
        if let Some(parent) = self.frames.last_mut() {
            *parent.entry(name.to_string()).or_insert(0) += 1;
        }
    }

    /// Builds the path of the innermost open element.
    ///
    /// With `array_notation`, a level gets an `[n]` suffix when `n` earlier
    /// siblings of the same name have already closed.
    #[must_use]
    pub fn current_path(&self, array_notation: bool) -> String {
        let mut path = String::with_capacity(self.names.iter().map(|n| n.len() + 4).sum());
        for (name, siblings) in self.names.iter().zip(&self.frames) {
            path.push('/');
            path.push_str(name);
            if array_notation {
                if let Some(&count) = siblings.get(name).filter(|&&c| c > 0) {
                    let _ = write!(path, "[{count}]");
                }
            }
        }
        path
    }

    /// Number of open elements.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.names.len()
    }

    /// Forgets all open elements and counters.
    pub fn reset(&mut self) {
        self.names.clear();
        self.frames.clear();
        self.frames.push(HashMap::new());
    }
}

impl Default for PathTracker {
    fn default() -> Self {
        Self::new()
    }
}
