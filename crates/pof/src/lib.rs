//! Portable Object Format (POF) value engine.
//!
//! Parses a POF buffer into a lazy [`PofTree`]: only the nodes that are
//! navigated to are materialized and only the values that are read are
//! decoded. Nodes can be modified in place; the tree then produces a
//! compact delta against the original bytes, or the complete modified
//! buffer with its decorations intact.
//!
//! ```
//! use pof::{codec, DeltaFormat, PofTree, SimplePofContext, UserValue, Value};
//!
//! let ctx = SimplePofContext::new().with_type(1001, "Triple").unwrap();
//! let original = Value::User(UserValue::new(1001).with(0, 10).with(1, 20).with(2, 30));
//! let bytes = codec::encode(&original, &ctx).unwrap();
//!
//! let mut tree = PofTree::parse(&bytes, &ctx).unwrap();
//! let field = tree.child(tree.root(), 1).unwrap().unwrap();
//! tree.set(field, 99).unwrap();
//!
//! let delta = tree.get_changes().unwrap().unwrap();
//! assert_eq!(DeltaFormat::of(&delta), Some(DeltaFormat::BinDiff));
//!
//! let patched = pof::BinaryDeltaCompressor::apply_delta(&bytes, &delta).unwrap();
//! let expected = UserValue::new(1001).with(0, 10).with(1, 99).with(2, 30);
//! assert_eq!(codec::decode(&patched, &ctx).unwrap(), Value::User(expected));
//! ```
//!
//! Logging goes through `tracing`; the crate never installs a subscriber.

pub mod codec;
pub mod config;
pub mod constants;
pub mod context;
pub mod decoration;
pub mod delta;
pub mod error;
pub mod navigator;
pub mod tree;
pub mod value;

pub use config::{DeltaConfig, ParserConfig, PofConfig};
pub use context::{PofContext, SimplePofContext, UserTypeInfo};
pub use decoration::{decorate, Decoration};
pub use delta::{BinaryDeltaCompressor, DeltaFormat};
pub use error::{PofError, Result};
pub use navigator::{PofNavigator, SimplePofPath};
pub use tree::{NodeId, PofTree};
pub use value::{
    PofDateTime, PofDecimal, PofTime, PofType, PofZone, SparseArray, UserValue, Value,
};
