//! Path-based navigation through a value tree.

use std::fmt;

use crate::error::Result;
use crate::tree::{NodeId, PofTree};

/// Locates a node relative to an origin node.
pub trait PofNavigator {
    /// Walks from `origin` to the target node. Returns `Ok(None)` as soon
    /// as a step lands on a null terminal value.
    fn navigate(&self, tree: &mut PofTree<'_>, origin: NodeId) -> Result<Option<NodeId>>;
}

/// A fixed sequence of child indices.
///
/// ```
/// use pof::SimplePofPath;
///
/// let path = SimplePofPath::from(vec![1, 2, 3]);
/// assert_eq!(path.to_string(), "1.2.3");
/// assert_eq!(path.indices(), &[1, 2, 3]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct SimplePofPath {
    indices: Box<[i32]>,
}

impl SimplePofPath {
    pub fn new(indices: &[i32]) -> Self {
        Self {
            indices: indices.into(),
        }
    }

    /// Path of a single step.
    pub fn single(index: i32) -> Self {
        Self::new(&[index])
    }

    pub fn indices(&self) -> &[i32] {
        &self.indices
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

impl From<Vec<i32>> for SimplePofPath {
    fn from(indices: Vec<i32>) -> Self {
        Self {
            indices: indices.into_boxed_slice(),
        }
    }
}

impl From<&[i32]> for SimplePofPath {
    fn from(indices: &[i32]) -> Self {
        Self::new(indices)
    }
}

impl fmt::Display for SimplePofPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, index) in self.indices.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{index}")?;
        }
        Ok(())
    }
}

impl PofNavigator for SimplePofPath {
    fn navigate(&self, tree: &mut PofTree<'_>, origin: NodeId) -> Result<Option<NodeId>> {
        let mut node = origin;
        for &index in self.indices.iter() {
            match tree.child(node, index)? {
                Some(child) => node = child,
                None => return Ok(None),
            }
        }
        Ok(Some(node))
    }
}
