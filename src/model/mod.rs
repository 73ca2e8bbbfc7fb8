//! # Retrieval Model
//!
//! Value objects that cross every boundary: store ↔ pipeline ↔ caller.
//! All of them are query-scoped; the store owns identity.
//!
//! Design rule: this module is pure data. No I/O, no state, no async.

pub mod node;
pub mod relationship;
pub mod path;
pub mod subgraph;
pub mod value;
pub mod property_map;

pub use node::{Node, NodeId};
pub use relationship::Relationship;
pub use path::Path;
pub use subgraph::Subgraph;
pub use value::Value;
pub use property_map::PropertyMap;
