//! XML serialization.
//!
//! Turns nodes from a [`Document`](crate::tree::Document) back into markup.
//! Used for inner-XML text values, for [`NodeRef`](crate::tree::NodeRef)
//! display, and by the CLI.

pub mod xml;

pub use xml::{
    serialize_children, serialize_children_with_options, serialize_node,
    serialize_node_with_options, SerializeOptions,
};
