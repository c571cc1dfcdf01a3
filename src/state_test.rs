use std::time::Instant;

use super::*;
use crate::canvas::element::{ElementDraft, ElementType, Point};

#[test]
fn canvas_state_new_is_empty() {
    let cs = CanvasState::new(Duration::from_secs(30));
    assert!(cs.clients.is_empty());
    assert!(cs.doc.elements().is_empty());
    assert!(cs.doc.presence().is_empty());
    assert_eq!(cs.seq(), 0);
}

#[test]
fn stamp_assigns_strictly_increasing_seq() {
    let mut cs = CanvasState::new(Duration::from_secs(30));
    let canvas_id = Uuid::new_v4();
    let now = Instant::now();

    let (_, created) = cs
        .doc
        .create_element("A", ElementDraft::new(ElementType::Rectangle, Point::new(0.0, 0.0)), now);
    let (id, more) = cs
        .doc
        .create_element("A", ElementDraft::new(ElementType::Text, Point::new(0.0, 0.0)), now);
    let locked = cs.doc.acquire_lock("A", &id, now).unwrap();

    let mut frames = cs.stamp(canvas_id, Some("A"), created);
    frames.extend(cs.stamp(canvas_id, Some("A"), more));
    frames.extend(cs.stamp(canvas_id, None, locked));

    let seqs: Vec<u64> = frames
        .iter()
        .map(|f| f.data.get(FRAME_SEQ).and_then(serde_json::Value::as_u64).unwrap())
        .collect();
    assert_eq!(seqs, vec![1, 2, 3]);
    assert_eq!(cs.seq(), 3);
}

#[test]
fn stamped_frame_carries_syscall_type_and_origin() {
    let mut cs = CanvasState::new(Duration::from_secs(30));
    let canvas_id = Uuid::new_v4();
    let (id, _) = cs.doc.create_element(
        "A",
        ElementDraft::new(ElementType::Rectangle, Point::new(0.0, 0.0)),
        Instant::now(),
    );
    let events = cs.doc.acquire_lock("A", &id, Instant::now()).unwrap();

    let frames = cs.stamp(canvas_id, Some("A"), events);

    let frame = &frames[0];
    assert_eq!(frame.syscall, "element:locked");
    assert_eq!(frame.canvas_id, Some(canvas_id));
    assert_eq!(frame.from.as_deref(), Some("A"));
    assert_eq!(frame.str_field("type"), Some("ELEMENT_LOCKED"));
    assert_eq!(frame.uuid_field("element_id"), Some(id));
    assert!(frame.parent_id.is_none());
}

#[tokio::test]
async fn new_canvas_uses_configured_lease() {
    let state = test_helpers::test_app_state_with_lease(Duration::from_secs(7));
    let cs = state.new_canvas();
    assert_eq!(cs.doc.locks().ttl(), Duration::from_secs(7));
}

#[tokio::test]
async fn seed_helpers_register_client_and_element() {
    let state = test_helpers::test_app_state();
    let canvas_id = test_helpers::seed_canvas(&state).await;
    let (client_id, _rx) = test_helpers::seed_client(&state, canvas_id, "A").await;
    let element_id = test_helpers::seed_rect(&state, canvas_id, "A", 1.0, 2.0).await;

    let canvases = state.canvases.read().await;
    let cs = canvases.get(&canvas_id).unwrap();
    assert!(cs.clients.contains_key(&client_id));
    assert!(cs.doc.presence().get(&client_id).is_some());
    assert_eq!(cs.doc.element(&element_id).unwrap().position, Point::new(1.0, 2.0));
}
