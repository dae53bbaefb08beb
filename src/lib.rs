//! # xmlreg
//!
//! A streaming XML reader that matches each element's path against a list
//! of regular expressions and hands matching elements to callbacks.
//!
//! Paths look like `/root/person[1]/firstname`: element names from the
//! document element down, with an optional `[n]` index when earlier
//! siblings had the same name. Each callback picks the shape of its value,
//! either a detached tree node or the element's inner markup, and is only
//! given that shape. The document is never held in memory as a whole;
//! only the subtree of a matched element is read ahead.
//!
//! ## Quick Start
//!
//! ```
//! use xmlreg::{Callback, RegReader};
//!
//! let xml = br#"<root>
//!     <person><firstname>John</firstname></person>
//!     <person><firstname>Jane</firstname></person>
//! </root>"#;
//!
//! let mut found = Vec::new();
//! let mut reader = RegReader::from_bytes(xml);
//! reader
//!     .process([(
//!         r"(/root/person(?:\[\d+\])?)/firstname",
//!         Callback::text(|name, caps| {
//!             found.push(format!("{} {name}", &caps[1]));
//!             Ok(())
//!         }),
//!     )])
//!     .unwrap();
//!
//! assert_eq!(found, vec!["/root/person John", "/root/person[1] Jane"]);
//! ```

pub mod driver;
pub mod error;
pub mod namespace;
pub mod param;
pub mod path;
pub mod pattern;
pub mod reader;
pub mod serial;
pub mod tree;
pub mod util;

// Re-export primary types at the crate root for convenience.
pub use driver::{DriverState, ProcessStats, ReaderOptions, RegReader, StopHandle};
pub use error::{CallbackError, CallbackResult, Error, ParseError, RegistrationError};
pub use param::{Callback, ParamType, Strategy, Value};
pub use pattern::Captures;
pub use reader::{XmlCursor, XmlNodeType, XmlReader};
pub use tree::{Attribute, Document, NodeId, NodeRef};
