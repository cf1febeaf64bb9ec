//! Tests for the consumer event bus.

use super::*;

#[test]
fn test_event_names() {
    assert_eq!(ConsumerEvent::Stopped.name(), "stopped");
    assert_eq!(ConsumerEvent::Flush(Vec::new()).name(), "flush");
    assert_eq!(
        ConsumerEvent::MessageReceived(Vec::new()).name(),
        "message:received"
    );
    assert_eq!(
        ConsumerEvent::ProcessingError(ConsumerError::MalformedAcknowledgement {
            message: "empty".to_string()
        })
        .name(),
        "processing:error"
    );
}

#[test]
fn test_every_subscriber_sees_events_in_order() {
    let bus = EventBus::default();
    let mut first = bus.subscribe();
    let mut second = bus.subscribe();

    bus.emit(ConsumerEvent::MessageReceived(Vec::new()));
    bus.emit(ConsumerEvent::Stopped);

    for receiver in [&mut first, &mut second] {
        assert!(matches!(
            receiver.try_recv(),
            Ok(ConsumerEvent::MessageReceived(_))
        ));
        assert!(matches!(receiver.try_recv(), Ok(ConsumerEvent::Stopped)));
        assert!(receiver.try_recv().is_err());
    }
}

#[test]
fn test_dropped_subscribers_are_pruned() {
    let bus = EventBus::default();
    let dropped = bus.subscribe();
    let mut kept = bus.subscribe();
    drop(dropped);

    bus.emit(ConsumerEvent::Stopped);

    assert_eq!(bus.subscribers.lock().unwrap().len(), 1);
    assert!(matches!(kept.try_recv(), Ok(ConsumerEvent::Stopped)));
}
