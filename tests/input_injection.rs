use std::sync::Arc;

use franz::coords::{CoordinateSpace, ScreenSize, DEVICE_MAX};
use franz::input::{InputEvent, InputTiming, Injector, MouseButton, DRAG_STEPS};
use franz::platform::headless::RecordingInputSink;

fn injector() -> (Arc<RecordingInputSink>, Injector) {
    let sink = Arc::new(RecordingInputSink::default());
    let injector = Injector::new(sink.clone(), InputTiming::immediate());
    (sink, injector)
}

#[test]
fn drag_across_full_screen() {
    let coords = CoordinateSpace::new(ScreenSize::new(1920, 1080));
    let (sink, injector) = injector();
    injector
        .drag(
            coords.normalized_to_device(0.0, 0.0),
            coords.normalized_to_device(1000.0, 1000.0),
        )
        .unwrap();

    let events = sink.events();
    let down = events
        .iter()
        .position(|e| {
            *e == InputEvent::Button {
                button: MouseButton::Left,
                pressed: true,
            }
        })
        .unwrap();
    assert_eq!(events[down - 1], InputEvent::MoveAbsolute { x: 0, y: 0 });

    let moves_after_down = events[down..]
        .iter()
        .filter(|e| matches!(e, InputEvent::MoveAbsolute { .. }))
        .count();
    assert!(moves_after_down >= DRAG_STEPS as usize);

    let max = DEVICE_MAX as i32;
    let last_move = events
        .iter()
        .rev()
        .find(|e| matches!(e, InputEvent::MoveAbsolute { .. }))
        .unwrap();
    assert_eq!(*last_move, InputEvent::MoveAbsolute { x: max, y: max });
    assert_eq!(
        events.last(),
        Some(&InputEvent::Button {
            button: MouseButton::Left,
            pressed: false,
        })
    );
}

#[test]
fn partial_delivery_is_an_injection_failure() {
    let (sink, injector) = injector();
    sink.accept_at_most(Some(1));
    let err = injector.click(100, 100).unwrap_err();
    assert_eq!(err.kind(), "InjectionFailure");
}

#[test]
fn typing_sends_one_batch_of_code_units() {
    let (sink, injector) = injector();
    injector.type_text("a\u{1F600}").unwrap();
    let batches = sink.batches();
    assert_eq!(batches.len(), 1);
    // one BMP character plus a surrogate pair, each pressed and released
    assert_eq!(batches[0].len(), 6);
}
