use std::collections::BTreeMap;

use crate::value::Value;

/// Handle of a node inside a [`PofTree`](super::PofTree).
///
/// Handles are only meaningful for the tree that issued them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

/// Shape-specific state of a node.
#[derive(Debug, Clone)]
pub(crate) enum NodeKind {
    /// Anything that cannot be navigated into.
    Terminal,
    /// Fixed-size array or collection, uniform when `element_type` is set.
    Array {
        of_children: usize,
        len: usize,
        element_type: Option<i32>,
        children: BTreeMap<i32, NodeId>,
    },
    /// Index/value pairs up to a negative terminator.
    Sparse {
        of_children: usize,
        element_type: Option<i32>,
        children: BTreeMap<i32, NodeId>,
    },
    /// User type: version id followed by indexed properties.
    User {
        of_children: usize,
        version: i32,
        children: BTreeMap<i32, NodeId>,
    },
    /// Back-reference to an identity registered earlier in the stream.
    Reference { id: i32, target: NodeId },
    /// Absent slot of a sparse container. Sits where the slot would be
    /// inserted and spans no bytes.
    Nil { index: i32 },
}

impl NodeKind {
    pub(crate) fn children(&self) -> Option<&BTreeMap<i32, NodeId>> {
        match self {
            NodeKind::Array { children, .. }
            | NodeKind::Sparse { children, .. }
            | NodeKind::User { children, .. } => Some(children),
            _ => None,
        }
    }

    pub(crate) fn children_mut(&mut self) -> Option<&mut BTreeMap<i32, NodeId>> {
        match self {
            NodeKind::Array { children, .. }
            | NodeKind::Sparse { children, .. }
            | NodeKind::User { children, .. } => Some(children),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Node {
    pub parent: Option<NodeId>,
    /// Start of the node relative to the root value.
    pub offset: usize,
    /// Encoded length in the original buffer.
    pub size: usize,
    /// Leading tag, or the container's element type for uniform nodes.
    pub type_id: i32,
    /// Encoded without a type tag.
    pub uniform: bool,
    pub kind: NodeKind,
    pub value: Option<Value>,
    pub dirty: bool,
}

impl Node {
    pub fn end(&self) -> usize {
        self.offset + self.size
    }
}
