//! Tests for the queue-runtime library module.

use super::*;

#[test]
fn test_queue_url_validation() {
    assert!(QueueUrl::new("https://sqs.us-east-1.amazonaws.com/123456789012/jobs".to_string()).is_ok());
    assert!(QueueUrl::new("http://localhost:4566/000000000000/jobs".to_string()).is_ok());

    assert!(QueueUrl::new("".to_string()).is_err());
    assert!(QueueUrl::new("jobs".to_string()).is_err());
    assert!(QueueUrl::new("ftp://example.com/jobs".to_string()).is_err());
}

#[test]
fn test_batch_limit_matches_providers() {
    assert_eq!(MAX_BATCH_ENTRIES, ProviderType::AwsSqs.max_batch_size());
    assert_eq!(MAX_BATCH_ENTRIES, ProviderType::InMemory.max_batch_size());
}

#[tokio::test]
async fn test_factory_client_round_trip_through_crate_root() {
    let client = QueueClientFactory::create_test_client();
    let queue = QueueUrl::new("https://sqs.us-east-1.amazonaws.com/1/root".to_string()).unwrap();

    let outcome = client
        .send_message_batch(&queue, &[OutboundMessage::new("only", "payload")])
        .await
        .unwrap();
    assert!(outcome.is_complete());

    let received = client
        .receive_messages(&ReceiveRequest::new(queue.clone()))
        .await
        .unwrap();
    assert_eq!(received.len(), 1);

    client
        .delete_message(&queue, &received[0].receipt_handle)
        .await
        .unwrap();
}
