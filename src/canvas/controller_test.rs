use std::time::Duration;

use super::*;
use crate::canvas::element::Size;
use crate::canvas::event::CanvasEvent;
use crate::canvas::presence::Presence;

fn setup(user: &'static str) -> (CanvasDoc, Uuid, CanvasController) {
    let mut doc = CanvasDoc::new(Duration::from_secs(30));
    let client_id = Uuid::new_v4();
    doc.join(Presence::new(client_id, user, user, "#000000"), Instant::now());
    (doc, client_id, CanvasController::new())
}

fn actor(client_id: Uuid, user_id: &str) -> Actor<'_> {
    Actor { client_id, user_id }
}

fn rect_at(doc: &mut CanvasDoc, user: &str, x: f64, y: f64) -> ElementId {
    doc.create_element(user, ElementDraft::new(ElementType::Rectangle, Point::new(x, y)), Instant::now())
        .0
}

// =============================================================
// Tools and zoom
// =============================================================

#[test]
fn tool_parse_accepts_wire_names() {
    assert_eq!(Tool::parse("select"), Some(Tool::Select));
    assert_eq!(Tool::parse("rectangle"), Some(Tool::Rectangle));
    assert_eq!(Tool::parse("text"), Some(Tool::Text));
    assert_eq!(Tool::parse("lasso"), None);
    for tool in [Tool::Select, Tool::Rectangle, Tool::Text] {
        assert_eq!(Tool::parse(tool.as_str()), Some(tool));
    }
}

#[test]
fn gesture_reports_name_and_target() {
    let id = Uuid::new_v4();
    assert_eq!(Gesture::Idle.as_str(), "idle");
    assert_eq!(Gesture::Idle.element_id(), None);

    let drawing = Gesture::Drawing { element_id: id };
    assert_eq!(drawing.as_str(), "drawing");
    assert_eq!(drawing.element_id(), Some(id));

    let selecting = Gesture::Selecting { element_id: id, drag_offset: Point::new(1.0, 2.0) };
    assert_eq!(selecting.as_str(), "selecting");
    assert_eq!(selecting.element_id(), Some(id));
}

#[test]
fn set_zoom_clamps_to_bounds() {
    let mut ctl = CanvasController::new();
    ctl.set_zoom(50.0);
    assert_eq!(ctl.zoom(), MAX_ZOOM);
    ctl.set_zoom(0.0);
    assert_eq!(ctl.zoom(), MIN_ZOOM);
    ctl.set_zoom(f64::NAN);
    assert_eq!(ctl.zoom(), MIN_ZOOM);
    ctl.set_zoom(2.5);
    assert_eq!(ctl.zoom(), 2.5);
}

#[test]
fn screen_to_world_divides_by_zoom() {
    let mut ctl = CanvasController::new();
    ctl.set_zoom(2.0);
    assert_eq!(ctl.screen_to_world(Point::new(100.0, 50.0)), Point::new(50.0, 25.0));
}

// =============================================================
// Drawing
// =============================================================

#[test]
fn pointer_down_with_rectangle_tool_inserts_on_top() {
    let (mut doc, client_id, mut ctl) = setup("A");
    rect_at(&mut doc, "A", 500.0, 500.0);
    rect_at(&mut doc, "A", 600.0, 600.0);
    ctl.set_tool(Tool::Rectangle);

    let events = ctl
        .pointer_down(&mut doc, actor(client_id, "A"), Point::new(50.0, 30.0), Instant::now())
        .unwrap();

    let Gesture::Drawing { element_id } = ctl.gesture() else {
        panic!("expected Drawing, got {:?}", ctl.gesture());
    };
    let el = doc.element(&element_id).unwrap();
    assert_eq!(el.kind, ElementType::Rectangle);
    assert_eq!(el.position, Point::new(50.0, 30.0));
    assert_eq!(el.z_index, 2);
    assert!(matches!(events[0], CanvasEvent::ElementCreated { .. }));
    assert!(matches!(events.last(), Some(CanvasEvent::PresenceUpdated { .. })));

    ctl.pointer_up(&mut doc, actor(client_id, "A"), Point::new(50.0, 30.0), Instant::now())
        .unwrap();
    assert_eq!(ctl.gesture(), Gesture::Idle);
}

#[test]
fn text_tool_uses_world_coordinates() {
    let (mut doc, client_id, mut ctl) = setup("A");
    ctl.set_tool(Tool::Text);
    ctl.set_zoom(2.0);

    ctl.pointer_down(&mut doc, actor(client_id, "A"), Point::new(80.0, 40.0), Instant::now())
        .unwrap();

    let Gesture::Drawing { element_id } = ctl.gesture() else {
        panic!("expected Drawing");
    };
    let el = doc.element(&element_id).unwrap();
    assert_eq!(el.kind, ElementType::Text);
    assert_eq!(el.position, Point::new(40.0, 20.0));
}

// =============================================================
// Selecting and dragging
// =============================================================

#[test]
fn drag_moves_element_by_pointer_delta_in_world_space() {
    let (mut doc, client_id, mut ctl) = setup("A");
    let id = rect_at(&mut doc, "A", 10.0, 10.0);
    ctl.set_zoom(2.0);
    let now = Instant::now();

    // Screen (40, 40) is world (20, 20), inside the 100x100 rect at (10, 10).
    ctl.pointer_down(&mut doc, actor(client_id, "A"), Point::new(40.0, 40.0), now)
        .unwrap();
    assert_eq!(ctl.gesture(), Gesture::Selecting { element_id: id, drag_offset: Point::new(20.0, 20.0) });
    assert_eq!(doc.presence().get(&client_id).unwrap().selected_element, Some(id));

    let events = ctl
        .pointer_move(&mut doc, actor(client_id, "A"), Point::new(100.0, 60.0), now)
        .unwrap();

    assert_eq!(doc.element(&id).unwrap().position, Point::new(40.0, 20.0));
    assert!(
        events
            .iter()
            .any(|e| matches!(e, CanvasEvent::ElementUpdated { element } if element.id == id))
    );

    ctl.pointer_up(&mut doc, actor(client_id, "A"), Point::new(100.0, 60.0), now)
        .unwrap();
    assert_eq!(ctl.gesture(), Gesture::Idle);

    // Moving after release no longer drags.
    ctl.pointer_move(&mut doc, actor(client_id, "A"), Point::new(300.0, 300.0), now)
        .unwrap();
    assert_eq!(doc.element(&id).unwrap().position, Point::new(40.0, 20.0));
}

#[test]
fn pointer_down_hits_topmost_element() {
    let (mut doc, client_id, mut ctl) = setup("A");
    let _below = rect_at(&mut doc, "A", 0.0, 0.0);
    let above = rect_at(&mut doc, "A", 50.0, 50.0);

    ctl.pointer_down(&mut doc, actor(client_id, "A"), Point::new(60.0, 60.0), Instant::now())
        .unwrap();

    assert!(matches!(ctl.gesture(), Gesture::Selecting { element_id, .. } if element_id == above));
}

#[test]
fn pointer_down_on_element_locked_by_other_is_rejected() {
    let (mut doc, client_id, mut ctl) = setup("B");
    let id = rect_at(&mut doc, "A", 0.0, 0.0);
    doc.acquire_lock("A", &id, Instant::now()).unwrap();

    let err = ctl
        .pointer_down(&mut doc, actor(client_id, "B"), Point::new(10.0, 10.0), Instant::now())
        .unwrap_err();

    assert!(matches!(err, CanvasError::LockConflict { ref holder, .. } if holder == "A"));
    assert_eq!(ctl.gesture(), Gesture::Idle);
    assert_eq!(doc.presence().get(&client_id).unwrap().selected_element, None);
}

#[test]
fn drag_is_skipped_once_another_user_locks_the_element() {
    let (mut doc, client_id, mut ctl) = setup("B");
    let id = rect_at(&mut doc, "A", 0.0, 0.0);
    let now = Instant::now();

    ctl.pointer_down(&mut doc, actor(client_id, "B"), Point::new(10.0, 10.0), now)
        .unwrap();
    doc.acquire_lock("A", &id, now).unwrap();

    let events = ctl
        .pointer_move(&mut doc, actor(client_id, "B"), Point::new(90.0, 90.0), now)
        .unwrap();

    assert_eq!(doc.element(&id).unwrap().position, Point::new(0.0, 0.0));
    assert!(
        !events
            .iter()
            .any(|e| matches!(e, CanvasEvent::ElementUpdated { .. }))
    );
    assert!(matches!(ctl.gesture(), Gesture::Selecting { .. }));
}

#[test]
fn drag_ends_when_element_is_deleted() {
    let (mut doc, client_id, mut ctl) = setup("A");
    let id = rect_at(&mut doc, "A", 0.0, 0.0);
    let now = Instant::now();

    ctl.pointer_down(&mut doc, actor(client_id, "A"), Point::new(10.0, 10.0), now)
        .unwrap();
    doc.delete_element("A", &id, now).unwrap();

    ctl.pointer_move(&mut doc, actor(client_id, "A"), Point::new(20.0, 20.0), now)
        .unwrap();
    assert_eq!(ctl.gesture(), Gesture::Idle);
}

#[test]
fn pointer_down_on_empty_canvas_clears_selection() {
    let (mut doc, client_id, mut ctl) = setup("A");
    let id = rect_at(&mut doc, "A", 0.0, 0.0);
    let now = Instant::now();
    doc.select(&client_id, Some(id), now).unwrap();

    let events = ctl
        .pointer_down(&mut doc, actor(client_id, "A"), Point::new(400.0, 400.0), now)
        .unwrap();

    assert_eq!(ctl.gesture(), Gesture::Idle);
    assert_eq!(doc.presence().get(&client_id).unwrap().selected_element, None);
    assert!(
        events
            .iter()
            .any(|e| matches!(e, CanvasEvent::ElementSelected { element_id: None, .. }))
    );
}

#[test]
fn resized_element_hit_area_follows_size() {
    let (mut doc, client_id, mut ctl) = setup("A");
    let (id, _) = doc.create_element(
        "A",
        ElementDraft::new(ElementType::Rectangle, Point::new(0.0, 0.0)).with_size(Size::new(10.0, 10.0)),
        Instant::now(),
    );

    ctl.pointer_down(&mut doc, actor(client_id, "A"), Point::new(50.0, 50.0), Instant::now())
        .unwrap();
    assert_eq!(ctl.gesture(), Gesture::Idle);

    ctl.pointer_down(&mut doc, actor(client_id, "A"), Point::new(5.0, 5.0), Instant::now())
        .unwrap();
    assert!(matches!(ctl.gesture(), Gesture::Selecting { element_id, .. } if element_id == id));
}

#[test]
fn pointer_events_require_a_joined_session() {
    let (mut doc, _, mut ctl) = setup("A");
    let ghost = Uuid::new_v4();
    let err = ctl
        .pointer_down(&mut doc, actor(ghost, "A"), Point::new(0.0, 0.0), Instant::now())
        .unwrap_err();
    assert_eq!(err, CanvasError::UnknownSession(ghost));
}
