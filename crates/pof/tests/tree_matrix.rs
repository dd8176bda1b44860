//! Parsing, navigation, reads and writes on value trees.

use pof::constants::*;
use pof::{codec, PofError, PofTree, PofType, SimplePofContext, SparseArray, UserValue, Value};
use pof_buffers::Writer;

const POINT: i32 = 1001;

fn ctx() -> SimplePofContext {
    SimplePofContext::new()
        .with_type(POINT, "Point")
        .unwrap()
}

fn strings(n: usize) -> Value {
    Value::Array((0..n).map(|i| Value::String(format!("item-{i}"))).collect())
}

// ---------------------------------------------------------------------------
// round trip and laziness
// ---------------------------------------------------------------------------

#[test]
fn unmodified_tree_serializes_to_original_bytes() {
    let ctx = ctx();
    let values = [
        Value::Int32(7),
        Value::from("hello"),
        strings(4),
        Value::Int64Array(vec![1, 1 << 40]),
        Value::SparseArray(SparseArray::new(8).with(1, true).with(6, 2.5f64)),
        Value::User(UserValue::new(POINT).with_version(3).with(0, 1).with(1, -2)),
    ];
    for value in values {
        let bytes = codec::encode(&value, &ctx).unwrap();
        let mut tree = PofTree::parse(&bytes, &ctx).unwrap();
        let root = tree.root();
        assert_eq!(&*tree.serialized_bytes(root).unwrap(), &bytes[..]);
        assert_eq!(tree.get(root).unwrap(), value);
        assert_eq!(tree.get_changes().unwrap(), None);
        assert_eq!(tree.apply_changes().unwrap(), bytes);
    }
}

#[test]
fn reading_one_child_decodes_only_that_child() {
    let ctx = ctx();
    let bytes = codec::encode(&strings(100), &ctx).unwrap();
    let mut tree = PofTree::parse(&bytes, &ctx).unwrap();
    assert_eq!(tree.decode_count(), 0);

    let child = tree.child(tree.root(), 50).unwrap().unwrap();
    assert_eq!(tree.decode_count(), 0);
    assert_eq!(tree.get_string(child).unwrap().as_deref(), Some("item-50"));
    assert_eq!(tree.decode_count(), 1);
    assert_eq!(tree.node_count(), 2);

    // cached at the natural type
    tree.get(child).unwrap();
    assert_eq!(tree.decode_count(), 1);
}

#[test]
fn children_are_identity_stable() {
    let ctx = ctx();
    let bytes = codec::encode(&strings(10), &ctx).unwrap();
    let mut tree = PofTree::parse(&bytes, &ctx).unwrap();
    let root = tree.root();
    let a = tree.child(root, 7).unwrap().unwrap();
    let b = tree.child(root, 3).unwrap().unwrap();
    let c = tree.child(root, 5).unwrap().unwrap();
    assert_eq!(tree.child(root, 7).unwrap(), Some(a));
    assert_ne!(a, b);
    assert_eq!(tree.get_string(c).unwrap().as_deref(), Some("item-5"));
    assert_eq!(tree.get_string(a).unwrap().as_deref(), Some("item-7"));
    assert_eq!(tree.parent(c), Some(root));
    assert_eq!(tree.parent(root), None);
    assert!(tree.offset(b) < tree.offset(c) && tree.offset(c) < tree.offset(a));
}

// ---------------------------------------------------------------------------
// navigation errors
// ---------------------------------------------------------------------------

#[test]
fn fixed_array_bounds() {
    let ctx = ctx();
    let bytes = codec::encode(&Value::Int32Array(vec![1, 2, 3]), &ctx).unwrap();
    let mut tree = PofTree::parse(&bytes, &ctx).unwrap();
    let root = tree.root();
    assert_eq!(tree.len(root), Some(3));
    assert_eq!(
        tree.child(root, 3),
        Err(PofError::IndexOutOfBounds { index: 3, len: 3 })
    );
    assert_eq!(
        tree.child(root, -1),
        Err(PofError::IndexOutOfBounds { index: -1, len: 3 })
    );
}

#[test]
fn empty_collection_has_no_children() {
    let ctx = ctx();
    let bytes = codec::encode(&Value::Collection(vec![]), &ctx).unwrap();
    assert_eq!(bytes, vec![0x63]);
    let mut tree = PofTree::parse(&bytes, &ctx).unwrap();
    let root = tree.root();
    assert_eq!(
        tree.child(root, 0),
        Err(PofError::IndexOutOfBounds { index: 0, len: 0 })
    );
}

#[test]
fn terminals_are_not_navigable_unless_null() {
    let ctx = ctx();
    let map = Value::Map(vec![(Value::from("k"), Value::Int32(1))]);
    let bytes = codec::encode(&map, &ctx).unwrap();
    let mut tree = PofTree::parse(&bytes, &ctx).unwrap();
    let root = tree.root();
    assert_eq!(tree.child(root, 0), Err(PofError::NotNavigable { offset: 0 }));
    assert_eq!(tree.get_map(root).unwrap(), Some(vec![(Value::from("k"), Value::Int32(1))]));

    let bytes = codec::encode(&Value::Null, &ctx).unwrap();
    let mut tree = PofTree::parse(&bytes, &ctx).unwrap();
    let root = tree.root();
    assert_eq!(tree.child(root, 4), Ok(None));
}

// ---------------------------------------------------------------------------
// typed reads
// ---------------------------------------------------------------------------

#[test]
fn typed_accessors_coerce_compact_values() {
    let ctx = ctx();
    let value = Value::Array(vec![
        Value::Int32(5),
        Value::Bool(true),
        Value::Float64(f64::INFINITY),
        Value::Char('q'),
        Value::Null,
        Value::Int32Array(vec![4, 5]),
    ]);
    let bytes = codec::encode(&value, &ctx).unwrap();
    let mut tree = PofTree::parse(&bytes, &ctx).unwrap();
    let root = tree.root();
    let at = |tree: &mut PofTree<'_>, i| tree.child(root, i).unwrap().unwrap();

    let n = at(&mut tree, 0);
    assert_eq!(tree.get_i64(n).unwrap(), 5);
    assert_eq!(tree.get_i16(n).unwrap(), 5);
    assert_eq!(tree.get_f64(n).unwrap(), 5.0);
    assert_eq!(tree.get_as(n, PofType::Int64).unwrap(), Value::Int64(5));
    let b = at(&mut tree, 1);
    assert!(tree.get_bool(b).unwrap());
    let f = at(&mut tree, 2);
    assert_eq!(tree.get_f32(f).unwrap(), f32::INFINITY);
    let c = at(&mut tree, 3);
    assert_eq!(tree.get_char(c).unwrap(), 'q');
    assert_eq!(tree.get_string(c).unwrap().as_deref(), Some("q"));
    let null = at(&mut tree, 4);
    assert_eq!(tree.get_as(null, PofType::Int32).unwrap(), Value::Null);
    assert_eq!(tree.get_i32(null).unwrap(), 0);
    assert_eq!(tree.get_string(null).unwrap(), None);
    let arr = at(&mut tree, 5);
    assert_eq!(tree.get_i64_array(arr).unwrap(), Some(vec![4, 5]));
    assert_eq!(tree.get_f64_array(arr).unwrap(), Some(vec![4.0, 5.0]));
    assert_eq!(
        tree.get_collection(arr).unwrap(),
        Some(vec![Value::Int32(4), Value::Int32(5)])
    );
}

#[test]
fn incompatible_reads_are_type_mismatches() {
    let ctx = ctx();
    let bytes = codec::encode(&Value::from("text"), &ctx).unwrap();
    let mut tree = PofTree::parse(&bytes, &ctx).unwrap();
    let root = tree.root();
    assert_eq!(
        tree.get_i32(root),
        Err(PofError::TypeMismatch {
            expected: "int32".into(),
            actual: "char-string".into()
        })
    );
    assert!(matches!(tree.get_date(root), Err(PofError::TypeMismatch { .. })));
    assert!(matches!(tree.get_user(root), Err(PofError::TypeMismatch { .. })));
}

#[test]
fn user_type_fields_and_version() {
    let ctx = ctx();
    let point = UserValue::new(POINT).with_version(2).with(0, 3).with(4, "label");
    let bytes = codec::encode(&Value::User(point.clone()), &ctx).unwrap();
    let mut tree = PofTree::parse(&bytes, &ctx).unwrap();
    let root = tree.root();
    assert_eq!(tree.type_id(root), POINT);
    assert_eq!(tree.version(root), Some(2));
    let label = tree.child(root, 4).unwrap().unwrap();
    assert_eq!(tree.get_string(label).unwrap().as_deref(), Some("label"));
    let missing = tree.child(root, 2).unwrap().unwrap();
    assert_eq!(tree.get(missing).unwrap(), Value::Null);
    assert_eq!(tree.get_i32(missing).unwrap(), 0);
    assert_eq!(tree.get_user(root).unwrap(), Some(point));
}

#[test]
fn unknown_user_type_fails_to_parse() {
    let ctx = ctx();
    let mut w = Writer::new();
    w.packed_i32(77);
    w.packed_i32(0);
    w.packed_i32(PROP_TERMINATOR);
    let bytes = w.flush();
    assert_eq!(
        PofTree::parse(&bytes, &ctx).unwrap_err(),
        PofError::UnknownUserType(77)
    );
}

#[test]
fn truncated_buffer_is_corrupt() {
    let ctx = ctx();
    let bytes = codec::encode(&strings(3), &ctx).unwrap();
    let err = PofTree::parse(&bytes[..bytes.len() - 2], &ctx).unwrap_err();
    assert!(err.is_corrupt_stream(), "{err}");
}

// ---------------------------------------------------------------------------
// sparse gaps
// ---------------------------------------------------------------------------

fn uniform_sparse(element_type: i32, entries: &[(i32, i32)]) -> Vec<u8> {
    let mut w = Writer::new();
    w.packed_i32(T_UNIFORM_SPARSE_ARRAY);
    w.packed_i32(element_type);
    w.packed_i32(10);
    for (index, value) in entries {
        w.packed_i32(*index);
        w.packed_i32(*value);
    }
    w.packed_i32(PROP_TERMINATOR);
    w.flush()
}

#[test]
fn sparse_gap_reads_int_default() {
    let ctx = ctx();
    let bytes = uniform_sparse(T_INT32, &[(2, 7), (5, 9)]);
    let mut tree = PofTree::parse(&bytes, &ctx).unwrap();
    let root = tree.root();

    let five = tree.child(root, 5).unwrap().unwrap();
    assert_eq!(tree.get_i32(five).unwrap(), 9);

    let gap = tree.child(root, 3).unwrap().unwrap();
    assert_eq!(tree.size(gap), 0);
    assert_eq!(tree.get(gap).unwrap(), Value::Int32(0));
    assert_eq!(tree.get_i32(gap).unwrap(), 0);
    assert!(!tree.is_dirty(gap));

    tree.set(gap, 42).unwrap();
    assert!(tree.is_dirty(gap));
    assert_eq!(tree.get_i32(gap).unwrap(), 42);
    assert_eq!(tree.dirty_count(), 1);
    assert_eq!(tree.dirty_bytes(), 0);

    let patched = tree.apply_changes().unwrap();
    let expected = SparseArray::new(10).with(2, 7).with(3, 42).with(5, 9);
    assert_eq!(
        codec::decode(&patched, &ctx).unwrap(),
        Value::SparseArray(expected)
    );
}

#[test]
fn sparse_gap_reads_bool_default() {
    let ctx = ctx();
    let bytes = uniform_sparse(T_BOOLEAN, &[(1, 1)]);
    let mut tree = PofTree::parse(&bytes, &ctx).unwrap();
    let root = tree.root();
    let gap = tree.child(root, 8).unwrap().unwrap();
    assert_eq!(tree.get(gap).unwrap(), Value::Bool(false));
    assert!(!tree.get_bool(gap).unwrap());
    tree.set(gap, true).unwrap();
    assert!(tree.get_bool(gap).unwrap());
    assert!(tree.is_dirty(gap));
}

#[test]
fn sparse_lookup_resumes_after_materialized_children() {
    let ctx = ctx();
    let sparse = SparseArray::new(100)
        .with(1, "a")
        .with(10, "b")
        .with(20, "c")
        .with(30, "d");
    let bytes = codec::encode(&Value::SparseArray(sparse), &ctx).unwrap();
    let mut tree = PofTree::parse(&bytes, &ctx).unwrap();
    let root = tree.root();
    let c = tree.child(root, 20).unwrap().unwrap();
    let gap = tree.child(root, 15).unwrap().unwrap();
    let d = tree.child(root, 30).unwrap().unwrap();
    let b = tree.child(root, 10).unwrap().unwrap();
    assert_eq!(tree.get_string(b).unwrap().as_deref(), Some("b"));
    assert_eq!(tree.get_string(c).unwrap().as_deref(), Some("c"));
    assert_eq!(tree.get_string(d).unwrap().as_deref(), Some("d"));
    assert_eq!(tree.get(gap).unwrap(), Value::Null);
    // the gap sits right where entry 20 starts
    assert_eq!(tree.offset(gap) + 1, tree.offset(c));
    let past_end = tree.child(root, 99).unwrap().unwrap();
    assert_eq!(tree.offset(past_end) + 1, tree.size(root));
}

// ---------------------------------------------------------------------------
// writes
// ---------------------------------------------------------------------------

#[test]
fn dirty_accounting_is_once_per_node() {
    let ctx = ctx();
    let value = Value::User(
        UserValue::new(POINT)
            .with(0, strings(3))
            .with(1, 1000),
    );
    let bytes = codec::encode(&value, &ctx).unwrap();
    let mut tree = PofTree::parse(&bytes, &ctx).unwrap();
    let root = tree.root();
    let list = tree.child(root, 0).unwrap().unwrap();
    let leaf = tree.child(list, 2).unwrap().unwrap();
    let leaf_size = tree.size(leaf);

    tree.set(leaf, "changed").unwrap();
    tree.set(leaf, "changed again").unwrap();
    assert_eq!(tree.dirty_count(), 1);
    assert_eq!(tree.dirty_bytes(), leaf_size);
    assert!(tree.is_dirty(leaf));
    assert!(!tree.is_dirty(list));
    assert!(!tree.is_dirty(root));

    let num = tree.child(root, 1).unwrap().unwrap();
    tree.set(num, 5).unwrap();
    assert_eq!(tree.dirty_count(), 2);
    assert_eq!(tree.dirty_bytes(), leaf_size + tree.size(num));
}

#[test]
fn reads_reflect_modified_descendants() {
    let ctx = ctx();
    let bytes = codec::encode(&strings(3), &ctx).unwrap();
    let mut tree = PofTree::parse(&bytes, &ctx).unwrap();
    let root = tree.root();
    assert_eq!(tree.get(root).unwrap(), strings(3));
    let middle = tree.child(root, 1).unwrap().unwrap();
    tree.set(middle, "new").unwrap();
    assert_eq!(
        tree.get(root).unwrap(),
        Value::Array(vec!["item-0".into(), "new".into(), "item-2".into()])
    );
}

#[test]
fn uniform_elements_reject_foreign_values() {
    let ctx = ctx();
    let bytes = codec::encode(&Value::Int32Array(vec![1, 2]), &ctx).unwrap();
    let mut tree = PofTree::parse(&bytes, &ctx).unwrap();
    let root = tree.root();
    let first = tree.child(root, 0).unwrap().unwrap();
    assert!(tree.is_uniform(first));
    assert!(matches!(
        tree.set(first, "nope"),
        Err(PofError::TypeMismatch { .. })
    ));
    assert!(!tree.is_dirty(first));
    tree.set(first, Value::Int64(1 << 20)).unwrap();
    assert_eq!(tree.get(first).unwrap(), Value::Int32(1 << 20));
    assert_eq!(tree.serialized_bytes(first).unwrap().as_ref(), &[0x80, 0x80, 0x80, 0x01]);
}

#[test]
fn replaced_container_cannot_be_navigated() {
    let ctx = ctx();
    let bytes = codec::encode(&strings(2), &ctx).unwrap();
    let mut tree = PofTree::parse(&bytes, &ctx).unwrap();
    let root = tree.root();
    tree.set(root, Value::Array(vec![Value::Int32(1)])).unwrap();
    assert!(matches!(tree.child(root, 0), Err(PofError::Unsupported(_))));
}

// ---------------------------------------------------------------------------
// identities
// ---------------------------------------------------------------------------

fn point_with_identity(w: &mut Writer, id: i32, x: i32) {
    w.packed_i32(T_IDENTITY);
    w.packed_i32(id);
    w.packed_i32(POINT);
    w.packed_i32(0);
    w.packed_i32(0);
    w.packed_i32(T_INT32);
    w.packed_i32(x);
    w.packed_i32(PROP_TERMINATOR);
}

#[test]
fn references_resolve_to_registered_identities() {
    let ctx = ctx();
    let mut w = Writer::new();
    w.packed_i32(T_ARRAY);
    w.packed_i32(2);
    point_with_identity(&mut w, 1, 300);
    w.packed_i32(T_REFERENCE);
    w.packed_i32(1);
    let bytes = w.flush();

    let mut tree = PofTree::parse(&bytes, &ctx).unwrap();
    let root = tree.root();
    let original = tree.child(root, 0).unwrap().unwrap();
    let reference = tree.child(root, 1).unwrap().unwrap();
    assert_eq!(tree.reference(reference), Some(1));
    assert_eq!(tree.get(reference).unwrap(), tree.get(original).unwrap());
    let x = tree.child(reference, 0).unwrap().unwrap();
    assert_eq!(tree.get_i32(x).unwrap(), 300);

    let point = Value::User(UserValue::new(POINT).with(0, 300));
    assert_eq!(tree.get(root).unwrap(), Value::Array(vec![point.clone(), point]));
}

#[test]
fn reference_resolves_without_visiting_its_identity() {
    let ctx = ctx();
    let mut w = Writer::new();
    w.packed_i32(T_ARRAY);
    w.packed_i32(2);
    point_with_identity(&mut w, 1, 300);
    w.packed_i32(T_REFERENCE);
    w.packed_i32(1);
    let bytes = w.flush();
    assert_eq!(
        codec::decode(&bytes, &ctx).unwrap(),
        Value::Array(vec![
            Value::User(UserValue::new(POINT).with(0, 300)),
            Value::User(UserValue::new(POINT).with(0, 300)),
        ])
    );

    let mut tree = PofTree::parse(&bytes, &ctx).unwrap();
    let root = tree.root();
    let reference = tree.child(root, 1).unwrap().unwrap();
    let x = tree.child(reference, 0).unwrap().unwrap();
    assert_eq!(tree.get_i32(x).unwrap(), 300);

    // the identity was attached where navigation would have put it
    let original = tree.child(root, 0).unwrap().unwrap();
    assert_eq!(tree.parent(original), Some(root));
    assert_eq!(tree.parent(x), Some(original));
}

#[test]
fn nested_identity_is_found_for_a_later_reference() {
    let ctx = ctx();
    let mut w = Writer::new();
    w.packed_i32(T_ARRAY);
    w.packed_i32(2);
    w.packed_i32(T_SPARSE_ARRAY);
    w.packed_i32(10);
    w.packed_i32(3);
    point_with_identity(&mut w, 7, 5);
    w.packed_i32(PROP_TERMINATOR);
    w.packed_i32(T_REFERENCE);
    w.packed_i32(7);
    let bytes = w.flush();

    let mut tree = PofTree::parse(&bytes, &ctx).unwrap();
    let root = tree.root();
    let reference = tree.child(root, 1).unwrap().unwrap();
    assert_eq!(
        tree.get(reference).unwrap(),
        Value::User(UserValue::new(POINT).with(0, 5))
    );
    let sparse = tree.child(root, 0).unwrap().unwrap();
    let original = tree.child(sparse, 3).unwrap().unwrap();
    assert_eq!(tree.parent(original), Some(sparse));
}

#[test]
fn reference_ahead_of_its_identity_is_unresolved() {
    let ctx = ctx();
    let mut w = Writer::new();
    w.packed_i32(T_ARRAY);
    w.packed_i32(3);
    w.packed_i32(T_REFERENCE);
    w.packed_i32(1);
    point_with_identity(&mut w, 1, 300);
    w.packed_i32(T_REFERENCE);
    w.packed_i32(9);
    let bytes = w.flush();

    let mut tree = PofTree::parse(&bytes, &ctx).unwrap();
    let root = tree.root();
    assert_eq!(tree.child(root, 0), Err(PofError::UnresolvedReference(1)));
    assert_eq!(tree.child(root, 2), Err(PofError::UnresolvedReference(9)));
}

#[test]
fn duplicate_identity_is_rejected() {
    let ctx = ctx();
    let mut w = Writer::new();
    w.packed_i32(T_ARRAY);
    w.packed_i32(2);
    point_with_identity(&mut w, 4, 1);
    point_with_identity(&mut w, 4, 2);
    let bytes = w.flush();

    let mut tree = PofTree::parse(&bytes, &ctx).unwrap();
    let root = tree.root();
    tree.child(root, 0).unwrap();
    assert_eq!(tree.child(root, 1), Err(PofError::DuplicateIdentity(4)));
}
