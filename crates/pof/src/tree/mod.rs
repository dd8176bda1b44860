//! The lazy value tree.
//!
//! [`PofTree`] owns every node parsed out of one buffer in an arena and
//! hands out [`NodeId`] handles. Nodes borrow their bytes from the original
//! buffer; nothing is decoded until [`PofTree::get`] asks for it, and
//! containers only learn where their children are when one is requested.
//!
//! ```
//! use pof::{codec, PofTree, SimplePofContext, Value};
//!
//! let ctx = SimplePofContext::new();
//! let bytes = codec::encode(&Value::Int32Array(vec![1, 2, 3]), &ctx).unwrap();
//!
//! let mut tree = PofTree::parse(&bytes, &ctx).unwrap();
//! let second = tree.child(tree.root(), 1).unwrap().unwrap();
//! assert_eq!(tree.get_i32(second).unwrap(), 2);
//!
//! tree.set(second, 20).unwrap();
//! let patched = tree.apply_changes().unwrap();
//! assert_eq!(
//!     codec::decode(&patched, &ctx).unwrap(),
//!     Value::Int32Array(vec![1, 20, 3])
//! );
//! ```

mod children;
mod node;
pub(crate) mod parser;

use std::borrow::Cow;
use std::cell::Cell;
use std::collections::BTreeMap;

use chrono::NaiveDate;
use pof_buffers::{print_octets, Reader};
use tracing::trace;

pub use node::NodeId;
pub(crate) use node::{Node, NodeKind};

use crate::codec::{PofDecoder, PofEncoder};
use crate::config::PofConfig;
use crate::constants::*;
use crate::context::PofContext;
use crate::decoration::Decoration;
use crate::error::{PofError, Result};
use crate::value::{PofDateTime, PofDecimal, PofTime, PofType, UserValue, Value};
use parser::Wrapper;

/// A parsed POF buffer.
///
/// All offsets reported by the tree are relative to the start of the
/// undecorated value, which is also the buffer deltas apply to.
///
/// Node handles index into this tree's arena; passing a [`NodeId`] issued
/// by another tree panics or addresses an unrelated node.
pub struct PofTree<'a> {
    pub(crate) value: &'a [u8],
    pub(crate) wrapper: Wrapper<'a>,
    pub(crate) ctx: &'a dyn PofContext,
    pub(crate) config: PofConfig,
    pub(crate) nodes: Vec<Node>,
    pub(crate) identities: Option<BTreeMap<i32, NodeId>>,
    pub(crate) dirty_count: usize,
    pub(crate) dirty_bytes: usize,
    decode_count: Cell<usize>,
}

impl<'a> PofTree<'a> {
    /// Parses `data` with the default configuration.
    pub fn parse(data: &'a [u8], ctx: &'a dyn PofContext) -> Result<Self> {
        Self::parse_with_config(data, ctx, PofConfig::default())
    }

    pub fn parse_with_config(
        data: &'a [u8],
        ctx: &'a dyn PofContext,
        config: PofConfig,
    ) -> Result<Self> {
        config.validate()?;
        let (wrapper, value) = parser::unwrap(data)?;
        let mut tree = PofTree {
            value,
            wrapper,
            ctx,
            config,
            nodes: Vec::new(),
            identities: None,
            dirty_count: 0,
            dirty_bytes: 0,
            decode_count: Cell::new(0),
        };
        let root = tree.instantiate(None, 0, value.len(), None)?;
        let size = tree.nodes[root.0].size;
        if size != value.len() {
            return Err(PofError::malformed(
                size,
                format!("{} trailing bytes after value", value.len() - size),
            ));
        }
        Ok(tree)
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// The node's value at its natural type.
    ///
    /// A clean node with modified descendants is decoded from its merged
    /// bytes, so the result reflects those modifications.
    pub fn get(&mut self, node: NodeId) -> Result<Value> {
        let n = &self.nodes[node.0];
        if !n.dirty {
            match n.kind {
                NodeKind::Reference { target, .. } => return self.get(target),
                NodeKind::Nil { .. } => return Ok(self.nil_default(node)),
                _ => {}
            }
        }
        if let Some(value) = &n.value {
            if n.dirty || !self.has_dirty_descendant(node) {
                return Ok(value.clone());
            }
        }
        if self.has_dirty_descendant(node) {
            let bytes = self.serialized_bytes(node)?;
            return self.decode_span(&bytes, 0, bytes.len(), self.uniform_type(node), None);
        }
        let (offset, end) = (n.offset, n.end());
        let value = self.decode_span(self.value, offset, end, self.uniform_type(node), Some(node))?;
        self.nodes[node.0].value = Some(value.clone());
        Ok(value)
    }

    /// The node's value produced as `expected`.
    ///
    /// A node holding an explicit null yields `Null` whatever the type;
    /// an absent sparse slot yields the type's default.
    pub fn get_as(&mut self, node: NodeId, expected: PofType) -> Result<Value> {
        let value = self.get(node)?;
        if value.is_null() && !matches!(self.nodes[node.0].kind, NodeKind::Nil { .. }) {
            return Ok(Value::Null);
        }
        value.convert(expected)
    }

    /// Replaces the node's value and marks it dirty.
    ///
    /// Elements of uniform containers are converted to the container's
    /// element type right away, so a value the slot cannot hold is
    /// rejected here rather than when the delta is built.
    pub fn set(&mut self, node: NodeId, value: impl Into<Value>) -> Result<()> {
        let mut value = value.into();
        if let Some(element_type) = self.uniform_type(node) {
            let expected = PofType::from_id(element_type).ok_or_else(|| {
                PofError::mismatch(format!("type {element_type}"), value.type_name())
            })?;
            value = value.convert(expected)?;
        }
        let n = &mut self.nodes[node.0];
        if !n.dirty {
            n.dirty = true;
            self.dirty_count += 1;
            self.dirty_bytes += n.size;
        }
        if !n.uniform {
            n.type_id = match &value {
                Value::Null => V_REFERENCE_NULL,
                other => PofType::of(other).id(),
            };
        }
        trace!(offset = n.offset, size = n.size, "set node value");
        n.value = Some(value);
        Ok(())
    }

    /// Encoded bytes of the node: the original slice while nothing in its
    /// subtree changed, a fresh encoding otherwise.
    ///
    /// Uniform elements come back without a type tag, absent sparse slots
    /// that were set come back prefixed with their index.
    pub fn serialized_bytes(&self, node: NodeId) -> Result<Cow<'a, [u8]>> {
        let n = &self.nodes[node.0];
        if n.dirty {
            return self.encode_node(node).map(Cow::Owned);
        }
        if !self.has_dirty_descendant(node) {
            let value: &'a [u8] = self.value;
            return Ok(Cow::Borrowed(&value[n.offset..n.end()]));
        }
        self.splice(node).map(Cow::Owned)
    }

    /// Re-encodes a dirty node from its cached value.
    pub(crate) fn encode_node(&self, node: NodeId) -> Result<Vec<u8>> {
        let n = &self.nodes[node.0];
        let value = n.value.as_ref().unwrap_or(&Value::Null);
        let mut encoder = PofEncoder::new(self.ctx);
        if let NodeKind::Nil { index } = n.kind {
            encoder.writer.packed_i32(index);
        }
        if n.uniform {
            encoder.write_uniform(value, n.type_id)?;
        } else {
            encoder.write_value(value)?;
        }
        Ok(encoder.writer.flush())
    }

    pub(crate) fn has_dirty_descendant(&self, node: NodeId) -> bool {
        if self.dirty_count == 0 {
            return false;
        }
        self.nodes[node.0].kind.children().is_some_and(|children| {
            children
                .values()
                .any(|c| self.nodes[c.0].dirty || self.has_dirty_descendant(*c))
        })
    }

    fn uniform_type(&self, node: NodeId) -> Option<i32> {
        let n = &self.nodes[node.0];
        n.uniform.then_some(n.type_id)
    }

    fn nil_default(&self, node: NodeId) -> Value {
        self.uniform_type(node)
            .and_then(PofType::from_id)
            .map_or(Value::Null, Value::default_for)
    }

    /// Decodes `bytes[offset..end]`. Identities registered in the tree are
    /// made visible to references inside the span, except `skip` itself.
    fn decode_span(
        &self,
        bytes: &[u8],
        offset: usize,
        end: usize,
        element_type: Option<i32>,
        skip: Option<NodeId>,
    ) -> Result<Value> {
        self.decode_count.set(self.decode_count.get() + 1);
        trace!(offset, len = end - offset, "decoding node");
        let reader = Reader::from_slice(bytes, offset, end);
        let mut decoder = PofDecoder::new(reader, self.ctx, self.config.parser.max_depth);
        for (id, target) in self.identities.iter().flatten() {
            if Some(*target) == skip {
                continue;
            }
            if let Some(value) = self.identity_value(*target) {
                decoder.seed_identity(*id, value);
            }
        }
        match element_type {
            Some(t) => decoder.decode_uniform(t),
            None => decoder.decode_value(),
        }
    }

    /// Value of an identity target, decoded on its own.
    fn identity_value(&self, target: NodeId) -> Option<Value> {
        let n = &self.nodes[target.0];
        if let Some(value) = &n.value {
            return Some(value.clone());
        }
        let reader = Reader::from_slice(self.value, n.offset, n.end());
        PofDecoder::new(reader, self.ctx, self.config.parser.max_depth)
            .decode_value()
            .ok()
    }

    // introspection

    pub fn dirty_count(&self) -> usize {
        self.dirty_count
    }

    /// Sum of the original sizes of all dirty nodes.
    pub fn dirty_bytes(&self) -> usize {
        self.dirty_bytes
    }

    /// The undecorated value bytes deltas are computed against.
    pub fn original_value(&self) -> &'a [u8] {
        self.value
    }

    pub fn decoration(&self) -> Option<Decoration<'a>> {
        match self.wrapper {
            Wrapper::Decorated { decoration, .. } => Some(decoration),
            _ => None,
        }
    }

    /// Number of decodes performed so far. Navigation never decodes.
    pub fn decode_count(&self) -> usize {
        self.decode_count.get()
    }

    /// Number of nodes materialized so far.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes[node.0].parent
    }

    pub fn offset(&self, node: NodeId) -> usize {
        self.nodes[node.0].offset
    }

    pub fn size(&self, node: NodeId) -> usize {
        self.nodes[node.0].size
    }

    pub fn type_id(&self, node: NodeId) -> i32 {
        self.nodes[node.0].type_id
    }

    pub fn is_dirty(&self, node: NodeId) -> bool {
        self.nodes[node.0].dirty
    }

    pub fn is_uniform(&self, node: NodeId) -> bool {
        self.nodes[node.0].uniform
    }

    /// Element count of a fixed-size array or collection.
    pub fn len(&self, node: NodeId) -> Option<usize> {
        match self.nodes[node.0].kind {
            NodeKind::Array { len, .. } => Some(len),
            _ => None,
        }
    }

    /// Version id of a user type node.
    pub fn version(&self, node: NodeId) -> Option<i32> {
        match self.nodes[node.0].kind {
            NodeKind::User { version, .. } => Some(version),
            _ => None,
        }
    }

    /// Identity a reference node points at.
    pub fn reference(&self, node: NodeId) -> Option<i32> {
        match self.nodes[node.0].kind {
            NodeKind::Reference { id, .. } => Some(id),
            _ => None,
        }
    }

    // typed accessors

    fn primitive(&mut self, node: NodeId, pof_type: PofType) -> Result<Value> {
        self.get_as(node, pof_type)?.convert(pof_type)
    }

    pub fn get_bool(&mut self, node: NodeId) -> Result<bool> {
        match self.primitive(node, PofType::Boolean)? {
            Value::Bool(b) => Ok(b),
            other => Err(PofError::mismatch("boolean", other.type_name())),
        }
    }

    pub fn get_octet(&mut self, node: NodeId) -> Result<u8> {
        match self.primitive(node, PofType::Octet)? {
            Value::Octet(n) => Ok(n),
            other => Err(PofError::mismatch("octet", other.type_name())),
        }
    }

    pub fn get_char(&mut self, node: NodeId) -> Result<char> {
        match self.primitive(node, PofType::Char)? {
            Value::Char(c) => Ok(c),
            other => Err(PofError::mismatch("char", other.type_name())),
        }
    }

    pub fn get_i16(&mut self, node: NodeId) -> Result<i16> {
        match self.primitive(node, PofType::Int16)? {
            Value::Int16(n) => Ok(n),
            other => Err(PofError::mismatch("int16", other.type_name())),
        }
    }

    pub fn get_i32(&mut self, node: NodeId) -> Result<i32> {
        match self.primitive(node, PofType::Int32)? {
            Value::Int32(n) => Ok(n),
            other => Err(PofError::mismatch("int32", other.type_name())),
        }
    }

    pub fn get_i64(&mut self, node: NodeId) -> Result<i64> {
        match self.primitive(node, PofType::Int64)? {
            Value::Int64(n) => Ok(n),
            other => Err(PofError::mismatch("int64", other.type_name())),
        }
    }

    pub fn get_f32(&mut self, node: NodeId) -> Result<f32> {
        match self.primitive(node, PofType::Float32)? {
            Value::Float32(f) => Ok(f),
            other => Err(PofError::mismatch("float32", other.type_name())),
        }
    }

    pub fn get_f64(&mut self, node: NodeId) -> Result<f64> {
        match self.primitive(node, PofType::Float64)? {
            Value::Float64(f) => Ok(f),
            other => Err(PofError::mismatch("float64", other.type_name())),
        }
    }

    pub fn get_decimal(&mut self, node: NodeId) -> Result<Option<PofDecimal>> {
        match self.get_as(node, PofType::Decimal128)? {
            Value::Null => Ok(None),
            Value::Decimal(d) => Ok(Some(d)),
            other => Err(PofError::mismatch("decimal", other.type_name())),
        }
    }

    pub fn get_string(&mut self, node: NodeId) -> Result<Option<String>> {
        match self.get_as(node, PofType::CharString)? {
            Value::Null => Ok(None),
            Value::String(s) => Ok(Some(s)),
            other => Err(PofError::mismatch("char-string", other.type_name())),
        }
    }

    pub fn get_binary(&mut self, node: NodeId) -> Result<Option<Vec<u8>>> {
        match self.get_as(node, PofType::OctetString)? {
            Value::Null => Ok(None),
            Value::Binary(b) => Ok(Some(b)),
            other => Err(PofError::mismatch("octet-string", other.type_name())),
        }
    }

    pub fn get_date(&mut self, node: NodeId) -> Result<Option<NaiveDate>> {
        match self.get_as(node, PofType::Date)? {
            Value::Null => Ok(None),
            Value::Date(d) => Ok(Some(d)),
            other => Err(PofError::mismatch("date", other.type_name())),
        }
    }

    pub fn get_time(&mut self, node: NodeId) -> Result<Option<PofTime>> {
        match self.get_as(node, PofType::Time)? {
            Value::Null => Ok(None),
            Value::Time(t) => Ok(Some(t)),
            other => Err(PofError::mismatch("time", other.type_name())),
        }
    }

    pub fn get_datetime(&mut self, node: NodeId) -> Result<Option<PofDateTime>> {
        match self.get_as(node, PofType::DateTime)? {
            Value::Null => Ok(None),
            Value::DateTime(dt) => Ok(Some(dt)),
            other => Err(PofError::mismatch("datetime", other.type_name())),
        }
    }

    pub fn get_bool_array(&mut self, node: NodeId) -> Result<Option<Vec<bool>>> {
        self.primitive_array(node, PofType::Boolean, |v| match v {
            Value::Bool(b) => Some(b),
            _ => None,
        })
    }

    pub fn get_i32_array(&mut self, node: NodeId) -> Result<Option<Vec<i32>>> {
        self.primitive_array(node, PofType::Int32, |v| match v {
            Value::Int32(n) => Some(n),
            _ => None,
        })
    }

    pub fn get_i64_array(&mut self, node: NodeId) -> Result<Option<Vec<i64>>> {
        self.primitive_array(node, PofType::Int64, |v| match v {
            Value::Int64(n) => Some(n),
            _ => None,
        })
    }

    pub fn get_f32_array(&mut self, node: NodeId) -> Result<Option<Vec<f32>>> {
        self.primitive_array(node, PofType::Float32, |v| match v {
            Value::Float32(f) => Some(f),
            _ => None,
        })
    }

    pub fn get_f64_array(&mut self, node: NodeId) -> Result<Option<Vec<f64>>> {
        self.primitive_array(node, PofType::Float64, |v| match v {
            Value::Float64(f) => Some(f),
            _ => None,
        })
    }

    /// Elements of any array or collection.
    pub fn get_collection(&mut self, node: NodeId) -> Result<Option<Vec<Value>>> {
        match self.get(node)? {
            Value::Null => Ok(None),
            other => {
                let name = other.type_name();
                other
                    .into_elements()
                    .map(Some)
                    .ok_or_else(|| PofError::mismatch("collection", name))
            }
        }
    }

    pub fn get_map(&mut self, node: NodeId) -> Result<Option<Vec<(Value, Value)>>> {
        match self.get_as(node, PofType::Map)? {
            Value::Null => Ok(None),
            Value::Map(entries) => Ok(Some(entries)),
            other => Err(PofError::mismatch("map", other.type_name())),
        }
    }

    pub fn get_user(&mut self, node: NodeId) -> Result<Option<UserValue>> {
        match self.get(node)? {
            Value::Null => Ok(None),
            Value::User(user) => Ok(Some(user)),
            other => Err(PofError::mismatch("user type", other.type_name())),
        }
    }

    fn primitive_array<T>(
        &mut self,
        node: NodeId,
        element: PofType,
        extract: impl Fn(Value) -> Option<T>,
    ) -> Result<Option<Vec<T>>> {
        let value = match self.get(node)? {
            Value::Null => return Ok(None),
            value => value,
        };
        let name = value.type_name();
        let elements = value
            .into_elements()
            .ok_or_else(|| PofError::mismatch(format!("{element} array"), name))?;
        elements
            .into_iter()
            .map(|v| {
                let name = v.type_name();
                v.convert(element)
                    .ok()
                    .and_then(&extract)
                    .ok_or_else(|| PofError::mismatch(element.to_string(), name))
            })
            .collect::<Result<Vec<_>>>()
            .map(Some)
    }
}

impl<'a> std::fmt::Debug for PofTree<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PofTree")
            .field("wrapper", &self.wrapper.name())
            .field("value", &print_octets(self.value, 16))
            .field("nodes", &self.nodes.len())
            .field("dirty_count", &self.dirty_count)
            .field("dirty_bytes", &self.dirty_bytes)
            .finish()
    }
}
