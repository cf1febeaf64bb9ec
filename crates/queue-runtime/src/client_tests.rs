//! Tests for the queue client trait and factory.

use super::*;
use crate::message::{DeleteBatchEntry, OutboundMessage, QueueUrl, ReceiveRequest};
use crate::provider::AwsSqsConfig;

fn queue() -> QueueUrl {
    QueueUrl::new("https://sqs.us-east-1.amazonaws.com/123456789012/client-tests".to_string())
        .unwrap()
}

// ============================================================================
// Contract Tests - QueueClient Trait
// ============================================================================

/// Contract: a sent batch can be received and deleted through the same client
async fn assert_send_receive_delete(client: &dyn QueueClient) {
    let queue = queue();
    let messages: Vec<OutboundMessage> = (0..3)
        .map(|i| OutboundMessage::new(i.to_string(), format!("body-{}", i)))
        .collect();

    let sent = client.send_message_batch(&queue, &messages).await.unwrap();
    assert!(sent.is_complete());
    assert_eq!(sent.successful.len(), 3);

    let request = ReceiveRequest::new(queue.clone()).with_max_messages(10);
    let received = client.receive_messages(&request).await.unwrap();
    assert_eq!(received.len(), 3);
    assert_eq!(received[0].body, "body-0");

    let entries: Vec<DeleteBatchEntry> = received
        .iter()
        .enumerate()
        .map(|(i, m)| DeleteBatchEntry::new(i.to_string(), m.receipt_handle.clone()))
        .collect();
    let deleted = client.delete_message_batch(&queue, &entries).await.unwrap();
    assert!(deleted.is_complete());
}

/// Contract: batches above the service limit are rejected before any call
async fn assert_rejects_oversized_batches(client: &dyn QueueClient) {
    let queue = queue();
    let messages: Vec<OutboundMessage> = (0..11)
        .map(|i| OutboundMessage::new(i.to_string(), "x"))
        .collect();

    let result = client.send_message_batch(&queue, &messages).await;
    assert!(matches!(
        result,
        Err(QueueError::BatchTooLarge {
            size: 11,
            max_size: 10
        })
    ));
}

#[tokio::test]
async fn test_in_memory_client_contract() {
    let client = QueueClientFactory::create_test_client();
    assert_eq!(client.provider_type(), ProviderType::InMemory);

    assert_send_receive_delete(client.as_ref()).await;
    assert_rejects_oversized_batches(client.as_ref()).await;
}

// ============================================================================
// Factory Tests
// ============================================================================

#[tokio::test]
async fn test_factory_creates_sqs_client() {
    let config = ProviderConfig::AwsSqs(
        AwsSqsConfig::new("us-east-1").with_credentials("AKIDEXAMPLE", "SECRET"),
    );

    let client = QueueClientFactory::create_client(config).await.unwrap();
    assert_eq!(client.provider_type(), ProviderType::AwsSqs);
}

#[tokio::test]
async fn test_factory_rejects_empty_region() {
    let config = ProviderConfig::AwsSqs(AwsSqsConfig::new(""));

    let result = QueueClientFactory::create_client(config).await;
    assert!(matches!(result, Err(QueueError::Configuration(_))));
}

#[test]
fn test_check_batch_size() {
    assert!(check_batch_size(0).is_ok());
    assert!(check_batch_size(MAX_BATCH_ENTRIES).is_ok());
    assert!(check_batch_size(MAX_BATCH_ENTRIES + 1).is_err());
}
