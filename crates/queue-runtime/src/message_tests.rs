//! Tests for message types.

use super::*;

const QUEUE: &str = "https://sqs.us-east-1.amazonaws.com/123456789012/orders";

fn received(body: &str) -> ReceivedMessage {
    ReceivedMessage {
        message_id: MessageId::new(),
        receipt_handle: ReceiptHandle::new("receipt-1"),
        body: body.to_string(),
        attributes: HashMap::new(),
        message_attributes: HashMap::new(),
    }
}

// ============================================================================
// QueueUrl Tests
// ============================================================================

#[test]
fn test_queue_url_validation() {
    assert!(QueueUrl::new(QUEUE.to_string()).is_ok());
    assert!(QueueUrl::new("http://localhost:4566/000000000000/local".to_string()).is_ok());

    assert!(matches!(
        QueueUrl::new("".to_string()),
        Err(ValidationError::Required { .. })
    ));
    assert!(QueueUrl::new("not a url".to_string()).is_err());
    assert!(QueueUrl::new("ftp://example.com/queue".to_string()).is_err());
}

#[test]
fn test_queue_url_name() {
    let url = QueueUrl::new(QUEUE.to_string()).unwrap();
    assert_eq!(url.queue_name(), "orders");

    let trailing = QueueUrl::new(format!("{}/", QUEUE)).unwrap();
    assert_eq!(trailing.queue_name(), "orders");
}

#[test]
fn test_queue_url_deserialize_validates() {
    let ok: Result<QueueUrl, _> = serde_json::from_str(&format!("\"{}\"", QUEUE));
    assert!(ok.is_ok());

    let bad: Result<QueueUrl, _> = serde_json::from_str("\"\"");
    assert!(bad.is_err());
}

#[test]
fn test_message_id_generation() {
    let id1 = MessageId::new();
    let id2 = MessageId::new();
    assert_ne!(id1, id2);
    assert!("".parse::<MessageId>().is_err());
}

// ============================================================================
// ReceivedMessage Tests
// ============================================================================

#[test]
fn test_received_message_system_attributes() {
    let mut message = received("{}");
    message
        .attributes
        .insert("ApproximateReceiveCount".to_string(), "3".to_string());
    message
        .attributes
        .insert("SentTimestamp".to_string(), "1700000000000".to_string());

    assert_eq!(message.receive_count(), Some(3));
    let sent = message.sent_at().unwrap();
    assert_eq!(sent.as_datetime().timestamp(), 1_700_000_000);
}

#[test]
fn test_received_message_missing_attributes() {
    let message = received("{}");
    assert_eq!(message.receive_count(), None);
    assert!(message.sent_at().is_none());
}

#[test]
fn test_received_message_body_json() {
    #[derive(Deserialize)]
    struct Order {
        id: u32,
    }

    let order: Order = received(r#"{"id": 42}"#).body_json().unwrap();
    assert_eq!(order.id, 42);

    let bad: Result<Order, _> = received("not json").body_json();
    assert!(matches!(bad, Err(SerializationError::Json(_))));
}

// ============================================================================
// OutboundMessage Tests
// ============================================================================

#[test]
fn test_outbound_message_builder() {
    let message = OutboundMessage::new("0", "hello")
        .with_delay(5)
        .with_attribute("source", "tests");

    assert_eq!(message.id, "0");
    assert_eq!(message.body, "hello");
    assert_eq!(message.delay_seconds, Some(5));
    assert_eq!(message.attributes.get("source"), Some(&"tests".to_string()));
}

#[test]
fn test_outbound_message_json_body() {
    let message = OutboundMessage::json("7", &serde_json::json!({"kind": "ping"})).unwrap();
    assert_eq!(message.body, r#"{"kind":"ping"}"#);
}

// ============================================================================
// BatchOutcome Tests
// ============================================================================

#[test]
fn test_batch_outcome_merge() {
    let mut outcome = BatchOutcome {
        successful: vec!["0".to_string()],
        failed: vec![],
    };
    assert!(outcome.is_complete());

    outcome.merge(BatchOutcome {
        successful: vec!["1".to_string()],
        failed: vec![BatchEntryFailure {
            id: "2".to_string(),
            code: "ReceiptHandleIsInvalid".to_string(),
            message: None,
            sender_fault: true,
        }],
    });

    assert_eq!(outcome.successful, vec!["0", "1"]);
    assert!(!outcome.is_complete());
}

// ============================================================================
// ReceiveRequest Tests
// ============================================================================

#[test]
fn test_receive_request_defaults() {
    let request = ReceiveRequest::new(QueueUrl::new(QUEUE.to_string()).unwrap());
    assert_eq!(request.max_messages, 1);
    assert!(request.wait_time_seconds.is_none());
    assert!(request.visibility_timeout_seconds.is_none());
    assert!(request.validate().is_ok());
}

#[test]
fn test_receive_request_limits() {
    let base = ReceiveRequest::new(QueueUrl::new(QUEUE.to_string()).unwrap());

    assert!(base.clone().with_max_messages(10).validate().is_ok());
    assert!(base.clone().with_max_messages(0).validate().is_err());
    assert!(base.clone().with_max_messages(11).validate().is_err());
    assert!(base.clone().with_wait_time_seconds(20).validate().is_ok());
    assert!(base.clone().with_wait_time_seconds(21).validate().is_err());
    assert!(base
        .clone()
        .with_visibility_timeout_seconds(43_200)
        .validate()
        .is_ok());
    assert!(base
        .with_visibility_timeout_seconds(43_201)
        .validate()
        .is_err());
}
