//! Lazy child lookup.
//!
//! A container keeps the children it has handed out in an index-ordered
//! map. A lookup resumes scanning right after the nearest materialized
//! child below the requested index, or at the first child when there is
//! none, skipping whatever lies in between.

use pof_buffers::Reader;
use tracing::trace;

use super::node::{Node, NodeId, NodeKind};
use super::PofTree;
use crate::codec::skip::{skip_uniform_value, skip_value};
use crate::constants::{T_UNKNOWN, V_COLLECTION_EMPTY};
use crate::error::{PofError, Result};

impl<'a> PofTree<'a> {
    /// Child `index` of `node`.
    ///
    /// Returns `Ok(None)` when `node` is a terminal value holding null.
    /// Absent slots of sparse arrays and user types come back as nil nodes
    /// that read as the element type's default and can be set.
    pub fn child(&mut self, node: NodeId, index: i32) -> Result<Option<NodeId>> {
        let n = &self.nodes[node.0];
        if let NodeKind::Reference { target, .. } = n.kind {
            if !n.dirty {
                return self.child(target, index);
            }
        }
        if let Some(children) = n.kind.children() {
            if n.dirty {
                return Err(PofError::Unsupported(
                    "navigating into a container whose value was replaced",
                ));
            }
            if let Some(existing) = children.get(&index) {
                return Ok(Some(*existing));
            }
        }
        match n.kind {
            NodeKind::Array {
                of_children,
                len,
                element_type,
                ref children,
            } => {
                if index < 0 || index as usize >= len {
                    return Err(PofError::IndexOutOfBounds { index, len });
                }
                let (start, first) = children
                    .range(..index)
                    .next_back()
                    .map(|(i, c)| (self.nodes[c.0].end(), i + 1))
                    .unwrap_or((of_children, 0));
                let end = n.end();
                let depth = self.config.parser.max_depth;
                let mut r = Reader::from_slice(self.value, start, end);
                for _ in first..index {
                    match element_type {
                        Some(t) => skip_uniform_value(&mut r, t, depth)?,
                        None => skip_value(&mut r, depth)?,
                    }
                }
                trace!(index, skipped = index - first, "materializing array element");
                let child = self.instantiate(Some(node), r.x, end, element_type)?;
                self.attach(node, index, child);
                Ok(Some(child))
            }
            NodeKind::Sparse {
                of_children,
                element_type,
                ref children,
            } => {
                let start = self.resume_point(children, index, of_children)?;
                self.sparse_child(node, index, start, element_type)
                    .map(Some)
            }
            NodeKind::User {
                of_children,
                ref children,
                ..
            } => {
                let start = self.resume_point(children, index, of_children)?;
                self.sparse_child(node, index, start, None).map(Some)
            }
            _ => self.terminal_child(node, index),
        }
    }

    fn resume_point(
        &self,
        children: &std::collections::BTreeMap<i32, NodeId>,
        index: i32,
        of_children: usize,
    ) -> Result<usize> {
        if index < 0 {
            return Err(PofError::IndexOutOfBounds { index, len: 0 });
        }
        Ok(children
            .range(..index)
            .next_back()
            .map_or(of_children, |(_, c)| self.nodes[c.0].end()))
    }

    /// Scans `(index, value)` pairs from `start` for `index`, stopping at
    /// the first larger index or the terminator.
    fn sparse_child(
        &mut self,
        node: NodeId,
        index: i32,
        start: usize,
        element_type: Option<i32>,
    ) -> Result<NodeId> {
        let end = self.nodes[node.0].end();
        let depth = self.config.parser.max_depth;
        let mut r = Reader::from_slice(self.value, start, end);
        let mut skipped = 0usize;
        let child = loop {
            let at = r.x;
            let found = r.packed_i32()?;
            if found < 0 || found > index {
                trace!(index, skipped, "sparse slot is absent");
                break self.push(Node {
                    parent: Some(node),
                    offset: at,
                    size: 0,
                    type_id: element_type.unwrap_or(T_UNKNOWN),
                    uniform: element_type.is_some(),
                    kind: NodeKind::Nil { index },
                    value: None,
                    dirty: false,
                });
            }
            if found == index {
                trace!(index, skipped, "materializing sparse element");
                break self.instantiate(Some(node), r.x, end, element_type)?;
            }
            match element_type {
                Some(t) => skip_uniform_value(&mut r, t, depth)?,
                None => skip_value(&mut r, depth)?,
            }
            skipped += 1;
        };
        self.attach(node, index, child);
        Ok(child)
    }

    fn terminal_child(&mut self, node: NodeId, index: i32) -> Result<Option<NodeId>> {
        let n = &self.nodes[node.0];
        if n.type_id == V_COLLECTION_EMPTY && !n.dirty {
            return Err(PofError::IndexOutOfBounds { index, len: 0 });
        }
        let offset = n.offset;
        if self.get(node)?.is_null() {
            Ok(None)
        } else {
            Err(PofError::NotNavigable { offset })
        }
    }

    fn attach(&mut self, parent: NodeId, index: i32, child: NodeId) {
        if let Some(children) = self.nodes[parent.0].kind.children_mut() {
            children.insert(index, child);
        }
    }
}
