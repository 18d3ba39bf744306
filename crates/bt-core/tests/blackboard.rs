use bt_core::{Blackboard, GlobalBlackboard};
use serde_json::json;

#[test]
fn blackboard_set_get_remove_roundtrip() {
    let mut bb = Blackboard::new();
    assert!(!bb.contains("count"));

    bb.set("count", json!(123));
    bb.set("greeting", json!("hello"));

    assert_eq!(bb.get_as::<u32>("count"), Some(123));
    assert_eq!(bb.get_as::<String>("greeting").as_deref(), Some("hello"));

    assert_eq!(bb.remove("count"), Some(json!(123)));
    assert_eq!(bb.get("count"), None);
}

#[test]
fn typed_read_of_other_shape_is_none() {
    let mut bb = Blackboard::new();
    bb.set("count", json!("not a number"));
    assert_eq!(bb.get_as::<u32>("count"), None);
}

#[test]
fn ensure_inserts_null_once() {
    let mut bb = Blackboard::new();
    assert!(bb.ensure("target"));
    assert!(!bb.ensure("target"));
    assert_eq!(bb.get("target"), Some(&json!(null)));

    bb.set("target", json!(5));
    assert!(!bb.ensure("target"));
    assert_eq!(bb.get("target"), Some(&json!(5)));
}

#[test]
fn keys_follow_insertion_order() {
    let mut bb = Blackboard::new();
    for key in ["zeta", "alpha", "mid"] {
        bb.set(key, json!(null));
    }
    // Overwriting keeps the original slot.
    bb.set("alpha", json!(1));
    assert_eq!(bb.keys().collect::<Vec<_>>(), vec!["zeta", "alpha", "mid"]);
}

#[test]
fn global_handles_share_one_store() {
    let globals = GlobalBlackboard::new();
    let other_view = globals.clone();

    globals.set("score", json!(3));
    assert_eq!(other_view.get("score"), Some(json!(3)));
    assert!(other_view.same_as(&globals));

    let isolated = GlobalBlackboard::new();
    assert!(!isolated.contains("score"));
}
