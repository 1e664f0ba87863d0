use livedoc_pointer::{
    escape_component, format_json_pointer, is_child, parse_json_pointer, try_parse_json_pointer,
    unescape_component, JsonPointerError, ValidationError,
};

#[test]
fn pointer_parse_format_roundtrip_matrix() {
    let cases = ["", "/", "/foo", "/foo/bar", "/a~0b/c~1d", "/arr/0", "/~0/~1", "/arr/-", "//"];

    for pointer in cases {
        let path = parse_json_pointer(pointer);
        assert_eq!(format_json_pointer(&path), pointer, "pointer {pointer:?}");
    }
}

#[test]
fn component_escaping_is_lossless() {
    let keys = ["plain", "a/b", "a~b", "~1", "~0", "/~/", ""];
    for key in keys {
        assert_eq!(unescape_component(&escape_component(key)), key);
    }
}

#[test]
fn escaped_steps_address_literal_keys() {
    assert_eq!(parse_json_pointer("/m~0n"), vec!["m~n"]);
    assert_eq!(parse_json_pointer("/a~1b"), vec!["a/b"]);
    assert_eq!(parse_json_pointer("/~01"), vec!["~1"]);
}

#[test]
fn child_relationship() {
    let root: Vec<String> = vec![];
    let a = parse_json_pointer("/a");
    let ab = parse_json_pointer("/a/b");
    let ac = parse_json_pointer("/ac");
    assert!(is_child(&root, &a));
    assert!(is_child(&a, &ab));
    assert!(!is_child(&a, &ac));
}

#[test]
fn invalid_pointer_is_reported() {
    assert_eq!(
        try_parse_json_pointer("nope"),
        Err(JsonPointerError::Invalid(ValidationError::NotRooted))
    );
}
