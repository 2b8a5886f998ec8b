//! Shared topology graph handed to every probe through the [`Context`](crate::probe::Context).

pub mod store;
pub mod types;

pub use store::Graph;
pub use types::{Metadata, Node, NodeId};
