use livedoc_patch::{apply_patch, from_json_patch, Doc, Op, PatchError};
use livedoc_pointer::parse_json_pointer;
use proptest::prelude::*;
use serde_json::{json, Value};

fn arb_json() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i32>().prop_map(|n| json!(n)),
        "[a-z]{0,6}".prop_map(Value::String),
    ];
    leaf.prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            prop::collection::btree_map("[a-z]{1,3}", inner, 0..4)
                .prop_map(|m| Value::Object(m.into_iter().collect())),
        ]
    })
}

fn patch(v: Value) -> Vec<Op> {
    from_json_patch(&v).unwrap()
}

proptest! {
    #[test]
    fn failing_test_rejects_whole_batch(siblings in arb_json(), extra in arb_json()) {
        let before = Doc::from(json!({"s": siblings, "flag": 1}));
        let snapshot = Doc::from(before.to_value());
        let ops = patch(json!([
            {"op": "add", "path": "/new", "value": extra},
            {"op": "replace", "path": "/flag", "value": 2},
            {"op": "test", "path": "/flag", "value": 1}
        ]));
        prop_assert_eq!(apply_patch(&before, &ops), Err(PatchError::Test));
        prop_assert_eq!(&before, &snapshot);
        prop_assert!(before.get(&parse_json_pointer("/new")).is_none());
    }

    #[test]
    fn writes_only_copy_their_ancestors(
        other in arb_json(),
        sibling in arb_json(),
        value in arb_json(),
    ) {
        let before = Doc::from(json!({"a": {"b": 0, "keep": sibling}, "other": other}));
        let ops = patch(json!([{"op": "replace", "path": "/a/b", "value": value.clone()}]));
        let after = apply_patch(&before, &ops).unwrap();

        let at = |d: &Doc, p: &str| d.get(&parse_json_pointer(p)).cloned().unwrap();
        prop_assert!(Doc::ptr_eq(&at(&after, "/other"), &at(&before, "/other")));
        prop_assert!(Doc::ptr_eq(&at(&after, "/a/keep"), &at(&before, "/a/keep")));
        prop_assert!(!Doc::ptr_eq(&at(&after, "/a"), &at(&before, "/a")));
        prop_assert_eq!(at(&after, "/a/b"), Doc::from(value));
    }
}

#[test]
fn scenario_add_to_empty_document() {
    let before = Doc::empty_object();
    let after = apply_patch(&before, &patch(json!([{"op": "add", "path": "/foo", "value": "bar"}])))
        .unwrap();
    assert_eq!(after, Doc::from(json!({"foo": "bar"})));
}

#[test]
fn scenario_add_then_remove_restores_value() {
    let original = Doc::from(json!({"foo": "bar"}));
    let added = apply_patch(&original, &patch(json!([{"op": "add", "path": "/fiz", "value": "baz"}])))
        .unwrap();
    let removed = apply_patch(&added, &patch(json!([{"op": "remove", "path": "/fiz"}]))).unwrap();
    assert_eq!(removed, original);
}

#[test]
fn patch_order_is_significant() {
    let base = Doc::from(json!({"list": []}));
    let first = patch(json!([{"op": "add", "path": "/list/-", "value": 1}]));

    let replace = patch(json!([{"op": "replace", "path": "/list", "value": [9]}]));
    let a = apply_patch(&apply_patch(&base, &first).unwrap(), &replace).unwrap();
    let b = apply_patch(&apply_patch(&base, &replace).unwrap(), &first).unwrap();
    assert_ne!(a, b);
}

#[test]
fn operations_within_a_batch_see_earlier_results() {
    let before = Doc::from(json!({}));
    let after = apply_patch(
        &before,
        &patch(json!([
            {"op": "add", "path": "/panel", "value": {"children": []}},
            {"op": "add", "path": "/panel/children/-", "value": "a"},
            {"op": "copy", "path": "/panel/children/-", "from": "/panel/children/0"},
            {"op": "test", "path": "/panel/children", "value": ["a", "a"]}
        ])),
    )
    .unwrap();
    assert_eq!(after, Doc::from(json!({"panel": {"children": ["a", "a"]}})));
}
