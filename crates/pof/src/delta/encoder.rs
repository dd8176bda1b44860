//! Deltas produced from the dirty nodes of a value tree.

use pof_buffers::{print_octets, Writer};
use tracing::{debug, trace};

use super::compressor::{append, extract};
use super::{BinaryDeltaCompressor, DeltaFormat, OP_TERM};
use crate::error::{PofError, Result};
use crate::tree::{NodeId, PofTree};

/// Receives the walk over a tree: ranges of the original value to keep and
/// freshly encoded bytes to insert.
trait PatchSink {
    fn copy(&mut self, original: &[u8], start: usize, end: usize);
    fn append(&mut self, bytes: &[u8]);
    fn finish(self) -> Vec<u8>;
}

/// Literal output: copied ranges and new bytes concatenated in order.
struct ReplaceSink {
    w: Writer,
}

impl ReplaceSink {
    fn new(marker: Option<DeltaFormat>, capacity: usize) -> Self {
        let mut w = Writer::with_capacity(capacity + 1);
        if let Some(format) = marker {
            w.u8(format.marker());
        }
        Self { w }
    }
}

impl PatchSink for ReplaceSink {
    fn copy(&mut self, original: &[u8], start: usize, end: usize) {
        self.w.buf(&original[start..end]);
    }

    fn append(&mut self, bytes: &[u8]) {
        self.w.buf(bytes);
    }

    fn finish(mut self) -> Vec<u8> {
        self.w.flush()
    }
}

/// Extract/append instructions against the original value.
struct BinDiffSink {
    w: Writer,
}

impl BinDiffSink {
    fn new() -> Self {
        let mut w = Writer::with_capacity(64);
        w.u8(DeltaFormat::BinDiff.marker());
        Self { w }
    }
}

impl PatchSink for BinDiffSink {
    fn copy(&mut self, _original: &[u8], start: usize, end: usize) {
        extract(&mut self.w, start, end - start);
    }

    fn append(&mut self, bytes: &[u8]) {
        append(&mut self.w, bytes);
    }

    fn finish(mut self) -> Vec<u8> {
        self.w.u8(OP_TERM);
        self.w.flush()
    }
}

impl<'a> PofTree<'a> {
    /// Format [`get_changes`](Self::get_changes) picks for the current
    /// modifications, `None` when there are none.
    ///
    /// Replace is chosen once the dirty bytes exceed the configured share
    /// of the original value (67% by default).
    pub fn delta_format(&self) -> Option<DeltaFormat> {
        if self.dirty_count == 0 {
            return None;
        }
        let ratio = self.dirty_bytes * 100 / self.value.len();
        if ratio > self.config.delta.replace_threshold as usize {
            Some(DeltaFormat::Replace)
        } else {
            Some(DeltaFormat::BinDiff)
        }
    }

    /// Delta from the original value to the modified one, `None` while
    /// nothing was set.
    pub fn get_changes(&self) -> Result<Option<Vec<u8>>> {
        let Some(format) = self.delta_format() else {
            return Ok(None);
        };
        debug!(
            ?format,
            dirty_count = self.dirty_count,
            dirty_bytes = self.dirty_bytes,
            len = self.value.len(),
            "encoding delta"
        );
        let root = self.root();
        let delta = match format {
            DeltaFormat::BinDiff => self.diff(root, BinDiffSink::new())?,
            _ => self.diff(root, ReplaceSink::new(Some(format), self.value.len()))?,
        };
        trace!(delta = %print_octets(&delta, 32), "delta encoded");
        Ok(Some(delta))
    }

    /// The complete modified buffer, wrapped the way the original was.
    ///
    /// Not available once the tree has met identities: a reference
    /// elsewhere may still point at a value that changed.
    pub fn apply_changes(&self) -> Result<Vec<u8>> {
        if self.identities.is_some() {
            return Err(PofError::Unsupported(
                "applying changes to a tree with object identities",
            ));
        }
        let value = match self.get_changes()? {
            Some(delta) => BinaryDeltaCompressor::apply_delta(self.value, &delta)?,
            None => self.value.to_vec(),
        };
        Ok(self.wrapper.rewrap(&value))
    }

    /// Bytes of a clean `node` with its dirty descendants spliced in.
    pub(crate) fn splice(&self, node: NodeId) -> Result<Vec<u8>> {
        self.diff(node, ReplaceSink::new(None, self.nodes[node.0].size))
    }

    fn diff<S: PatchSink>(&self, node: NodeId, mut sink: S) -> Result<Vec<u8>> {
        let n = &self.nodes[node.0];
        let mut pos = n.offset;
        self.walk(node, &mut pos, &mut sink)?;
        if pos < n.end() {
            sink.copy(self.value, pos, n.end());
        }
        Ok(sink.finish())
    }

    /// Emits dirty nodes in index order. A dirty node replaces its whole
    /// original span; clean containers are descended into.
    fn walk<S: PatchSink>(&self, node: NodeId, pos: &mut usize, sink: &mut S) -> Result<()> {
        let n = &self.nodes[node.0];
        if n.dirty {
            if *pos < n.offset {
                sink.copy(self.value, *pos, n.offset);
            }
            sink.append(&self.encode_node(node)?);
            *pos = (*pos).max(n.end());
            return Ok(());
        }
        if let Some(children) = n.kind.children() {
            for child in children.values() {
                self.walk(*child, pos, sink)?;
            }
        }
        Ok(())
    }
}
