//! Stream envelopes and lazy node construction.

use std::collections::BTreeMap;

use pof_buffers::{Reader, Writer};
use tracing::{debug, trace, warn};

use super::node::{Node, NodeId, NodeKind};
use super::PofTree;
use crate::codec::skip::{read_size, skip_uniform_value, skip_value};
use crate::constants::*;
use crate::decoration::Decoration;
use crate::error::{PofError, Result};

/// How the value was wrapped in the parsed buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Wrapper<'a> {
    /// The buffer is the value.
    Plain,
    /// `FMT_EXT value`
    Ext,
    /// `FMT_IDO <packed int> FMT_EXT value`; `header` is everything before
    /// the value.
    IdentityOffset { header: &'a [u8] },
    /// Binary decoration around an optionally `FMT_EXT` prefixed value.
    Decorated { decoration: Decoration<'a>, ext: bool },
}

impl<'a> Wrapper<'a> {
    pub(crate) fn name(&self) -> &'static str {
        match self {
            Wrapper::Plain => "plain",
            Wrapper::Ext => "ext",
            Wrapper::IdentityOffset { .. } => "identity-offset",
            Wrapper::Decorated { .. } => "decorated",
        }
    }

    /// Puts `value` back into this wrapper.
    pub(crate) fn rewrap(&self, value: &[u8]) -> Vec<u8> {
        match self {
            Wrapper::Plain => value.to_vec(),
            Wrapper::Ext => {
                let mut w = Writer::with_capacity(value.len() + 1);
                w.u8(FMT_EXT);
                w.buf(value);
                w.flush()
            }
            Wrapper::IdentityOffset { header } => [*header, value].concat(),
            Wrapper::Decorated { decoration, ext } => decoration.wrap(value, *ext),
        }
    }
}

/// Splits `data` into its wrapper and the undecorated value bytes.
pub(crate) fn unwrap(data: &[u8]) -> Result<(Wrapper<'_>, &[u8])> {
    let mut r = Reader::new(data);
    let marker = r.peek()?;
    let (wrapper, value) = match marker {
        FMT_EXT => (Wrapper::Ext, &data[1..]),
        FMT_IDO => {
            r.skip(1)?;
            r.packed_i32()?;
            if r.u8()? != FMT_EXT {
                return Err(PofError::malformed(
                    r.x - 1,
                    "identity-offset wrapper without extended marker",
                ));
            }
            let header = &data[..r.x];
            (Wrapper::IdentityOffset { header }, r.rest())
        }
        FMT_BIN_DECO | FMT_BIN_EXT_DECO => {
            r.skip(1)?;
            let mask = if marker == FMT_BIN_DECO {
                r.u8()? as u64
            } else {
                r.packed_i64()? as u64
            };
            let decoration = Decoration { mask, bytes: &[] };
            if !decoration.has(DECO_VALUE) {
                return Err(PofError::MissingDecoratedValue);
            }
            let len = read_size(&mut r)?;
            let inner = r.buf(len)?;
            let decoration = Decoration {
                mask,
                bytes: r.rest(),
            };
            match inner.split_first() {
                Some((&FMT_EXT, value)) => (Wrapper::Decorated { decoration, ext: true }, value),
                _ => (Wrapper::Decorated { decoration, ext: false }, inner),
            }
        }
        _ => (Wrapper::Plain, data),
    };
    if value.is_empty() {
        return Err(PofError::malformed(data.len(), "buffer holds no value"));
    }
    debug!(wrapper = wrapper.name(), len = value.len(), "unwrapped POF buffer");
    Ok((wrapper, value))
}

impl<'a> PofTree<'a> {
    /// Creates the node starting at `offset` without decoding it.
    ///
    /// Containers only record where their children begin; the children
    /// themselves are created on first access. `element_type` is set when
    /// the node is an element of a uniform container.
    pub(crate) fn instantiate(
        &mut self,
        parent: Option<NodeId>,
        offset: usize,
        end: usize,
        element_type: Option<i32>,
    ) -> Result<NodeId> {
        let depth = self.config.parser.max_depth;
        let mut r = Reader::from_slice(self.value, offset, end);
        let (type_id, identity) = match element_type {
            Some(t) => (t, None),
            None => match r.packed_i32()? {
                T_IDENTITY => {
                    let id = r.packed_i32()?;
                    (r.packed_i32()?, Some(id))
                }
                tag => (tag, None),
            },
        };
        let kind = match type_id {
            T_ARRAY | T_COLLECTION => {
                let len = read_size(&mut r)?;
                NodeKind::Array {
                    of_children: r.x,
                    len,
                    element_type: None,
                    children: BTreeMap::new(),
                }
            }
            T_UNIFORM_ARRAY | T_UNIFORM_COLLECTION => {
                let element_type = r.packed_i32()?;
                let len = read_size(&mut r)?;
                NodeKind::Array {
                    of_children: r.x,
                    len,
                    element_type: Some(element_type),
                    children: BTreeMap::new(),
                }
            }
            T_SPARSE_ARRAY => {
                read_size(&mut r)?;
                NodeKind::Sparse {
                    of_children: r.x,
                    element_type: None,
                    children: BTreeMap::new(),
                }
            }
            T_UNIFORM_SPARSE_ARRAY => {
                let element_type = r.packed_i32()?;
                read_size(&mut r)?;
                NodeKind::Sparse {
                    of_children: r.x,
                    element_type: Some(element_type),
                    children: BTreeMap::new(),
                }
            }
            T_REFERENCE => {
                let id = r.packed_i32()?;
                let target = match self.registered(id) {
                    Some(target) => target,
                    None => self.resolve_identity(id, offset)?,
                };
                NodeKind::Reference { id, target }
            }
            id if id >= 0 => {
                self.ctx.type_for_id(id)?;
                let version = r.packed_i32()?;
                NodeKind::User {
                    of_children: r.x,
                    version,
                    children: BTreeMap::new(),
                }
            }
            _ => NodeKind::Terminal,
        };

        let mut span = Reader::from_slice(self.value, offset, end);
        match element_type {
            Some(t) => skip_uniform_value(&mut span, t, depth)?,
            None => skip_value(&mut span, depth)?,
        }

        let node = self.push(Node {
            parent,
            offset,
            size: span.x - offset,
            type_id,
            uniform: element_type.is_some(),
            kind,
            value: None,
            dirty: false,
        });
        trace!(offset, size = span.x - offset, type_id, "instantiated node");
        if let Some(id) = identity {
            self.register_identity(id, node)?;
        }
        Ok(node)
    }

    pub(crate) fn push(&mut self, node: Node) -> NodeId {
        self.nodes.push(node);
        NodeId(self.nodes.len() - 1)
    }

    fn registered(&self, id: i32) -> Option<NodeId> {
        self.identities
            .as_ref()
            .and_then(|registry| registry.get(&id))
            .copied()
    }

    /// Materializes the node carrying identity `id` when it sits before
    /// `before` but was skipped over by navigation so far.
    ///
    /// Identities nested in maps are not tracked; maps are terminal.
    fn resolve_identity(&mut self, id: i32, before: usize) -> Result<NodeId> {
        if self.nodes.is_empty() {
            return Err(PofError::UnresolvedReference(id));
        }
        let mut r = Reader::new(self.value);
        let mut path = Vec::new();
        let mut scan = IdentityScan {
            target: id,
            before,
            path: &mut path,
        };
        if scan.value(&mut r, self.config.parser.max_depth)? != Scan::Found {
            return Err(PofError::UnresolvedReference(id));
        }
        debug!(identity = id, ?path, "materializing identity ahead of its reference");
        let root = self.root();
        let target = path.into_iter().try_fold(root, |node, index| {
            self.child(node, index)?
                .ok_or(PofError::UnresolvedReference(id))
        })?;
        match self.registered(id) {
            Some(registered) if registered == target => Ok(target),
            _ => Err(PofError::UnresolvedReference(id)),
        }
    }

    fn register_identity(&mut self, id: i32, node: NodeId) -> Result<()> {
        let registry = self.identities.get_or_insert_with(BTreeMap::new);
        match registry.get(&id) {
            Some(existing) if self.nodes[existing.0].offset == self.nodes[node.0].offset => Ok(()),
            Some(_) => {
                warn!(identity = id, "rejecting duplicate identity");
                Err(PofError::DuplicateIdentity(id))
            }
            None => {
                registry.insert(id, node);
                Ok(())
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scan {
    Found,
    /// Reached the reference without meeting the identity.
    Passed,
    Continue,
}

/// Walks raw bytes looking for `T_IDENTITY target`, recording the child
/// indices leading to it.
struct IdentityScan<'p> {
    target: i32,
    before: usize,
    path: &'p mut Vec<i32>,
}

impl IdentityScan<'_> {
    fn value(&mut self, r: &mut Reader<'_>, depth: usize) -> Result<Scan> {
        if r.x >= self.before {
            return Ok(Scan::Passed);
        }
        let type_id = match r.packed_i32()? {
            T_IDENTITY => {
                if r.packed_i32()? == self.target {
                    return Ok(Scan::Found);
                }
                r.packed_i32()?
            }
            tag => tag,
        };
        self.body(r, type_id, depth)
    }

    fn body(&mut self, r: &mut Reader<'_>, type_id: i32, depth: usize) -> Result<Scan> {
        if depth == 0 {
            return Err(PofError::malformed(r.x, "value nesting exceeds the depth limit"));
        }
        let depth = depth - 1;
        match type_id {
            T_ARRAY | T_COLLECTION => {
                let n = read_size(r)?;
                for i in 0..n {
                    let scan = self.element(i as i32, |scan| scan.value(r, depth))?;
                    if scan != Scan::Continue {
                        return Ok(scan);
                    }
                }
            }
            T_UNIFORM_ARRAY | T_UNIFORM_COLLECTION => {
                let element_type = r.packed_i32()?;
                let n = read_size(r)?;
                for i in 0..n {
                    let scan = self.element(i as i32, |scan| scan.uniform(r, element_type, depth))?;
                    if scan != Scan::Continue {
                        return Ok(scan);
                    }
                }
            }
            T_SPARSE_ARRAY => {
                read_size(r)?;
                return self.properties(r, None, depth);
            }
            T_UNIFORM_SPARSE_ARRAY => {
                let element_type = r.packed_i32()?;
                read_size(r)?;
                return self.properties(r, Some(element_type), depth);
            }
            id if id >= 0 => {
                r.packed_i32()?;
                return self.properties(r, None, depth);
            }
            other => skip_uniform_value(r, other, depth + 1)?,
        }
        Ok(Scan::Continue)
    }

    fn uniform(&mut self, r: &mut Reader<'_>, element_type: i32, depth: usize) -> Result<Scan> {
        if r.x >= self.before {
            return Ok(Scan::Passed);
        }
        self.body(r, element_type, depth)
    }

    fn properties(
        &mut self,
        r: &mut Reader<'_>,
        element_type: Option<i32>,
        depth: usize,
    ) -> Result<Scan> {
        loop {
            let index = r.packed_i32()?;
            if index < 0 {
                return Ok(Scan::Continue);
            }
            let scan = self.element(index, |scan| match element_type {
                Some(t) => scan.uniform(r, t, depth),
                None => scan.value(r, depth),
            })?;
            if scan != Scan::Continue {
                return Ok(scan);
            }
        }
    }

    /// Scans one child, keeping its index on the path only if the
    /// identity was found inside it.
    fn element(
        &mut self,
        index: i32,
        scan: impl FnOnce(&mut Self) -> Result<Scan>,
    ) -> Result<Scan> {
        self.path.push(index);
        let result = scan(self)?;
        if result != Scan::Found {
            self.path.pop();
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_and_ext() {
        let (w, v) = unwrap(&[0x69]).unwrap();
        assert_eq!((w, v), (Wrapper::Plain, &[0x69][..]));
        let (w, v) = unwrap(&[FMT_EXT, 0x69]).unwrap();
        assert_eq!((w, v), (Wrapper::Ext, &[0x69][..]));
        assert_eq!(w.rewrap(&[0x68]), vec![FMT_EXT, 0x68]);
    }

    #[test]
    fn identity_offset_keeps_header() {
        let data = [FMT_IDO, 0x05, FMT_EXT, 0x69];
        let (w, v) = unwrap(&data).unwrap();
        assert_eq!(v, &[0x69]);
        assert_eq!(w.rewrap(&[0x68]), vec![FMT_IDO, 0x05, FMT_EXT, 0x68]);
    }

    #[test]
    fn decorated_value_and_trailer() {
        let data = [FMT_BIN_DECO, 0b11, 0x02, FMT_EXT, 0x69, 0xde, 0xad];
        let (w, v) = unwrap(&data).unwrap();
        assert_eq!(v, &[0x69]);
        match w {
            Wrapper::Decorated { decoration, ext } => {
                assert!(ext);
                assert_eq!(decoration.mask, 0b11);
                assert_eq!(decoration.bytes, &[0xde, 0xad]);
            }
            other => panic!("unexpected wrapper {other:?}"),
        }
        assert_eq!(w.rewrap(&[0x69]), data.to_vec());
    }

    #[test]
    fn decoration_without_value_bit() {
        let data = [FMT_BIN_DECO, 0b10, 0x01, 0x69];
        assert_eq!(unwrap(&data), Err(PofError::MissingDecoratedValue));
    }

    #[test]
    fn empty_buffer() {
        assert!(unwrap(&[]).is_err());
        assert!(unwrap(&[FMT_EXT]).is_err());
    }
}
