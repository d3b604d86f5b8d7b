//! Tests for the ephemeral SQS store

use super::*;
use crate::message::{InternalAttribute, Message, SystemAttribute};
use crate::queue::{QueueAttributeName, QueueAttributes};
use chrono::Utc;
use std::collections::BTreeMap;

const ACCOUNT: &str = "123456789012";

fn store() -> EphemeralStore {
    EphemeralStore::new("us-east-1")
}

fn store_with_queue(visibility_timeout: &str) -> EphemeralStore {
    let s = store();
    let mut attributes = QueueAttributes::default();
    attributes.set(QueueAttributeName::VisibilityTimeout, visibility_timeout);
    s.create_queue(ACCOUNT, "orders", &attributes).unwrap();
    s
}

fn message(body: &str) -> Message {
    let mut message = Message {
        message_id: uuid::Uuid::new_v4().to_string(),
        receipt_handle: None,
        body: body.to_string(),
        md5_of_body: crate::digest::digest_body(body),
        md5_of_message_attributes: None,
        message_attributes: BTreeMap::new(),
        attributes: BTreeMap::new(),
    };
    message.set_system_attribute(SystemAttribute::ApproximateReceiveCount, 0);
    message.set_system_attribute(SystemAttribute::SentTimestamp, Utc::now().timestamp_millis());
    message.set_internal_attribute(InternalAttribute::LocalReceiveCount, 0);
    message.set_internal_attribute(InternalAttribute::DelaySeconds, 0);
    message.set_internal_attribute(InternalAttribute::MessageRetentionPeriod, 345_600);
    message
}

// =============================================================================
// QUEUE OPERATIONS
// =============================================================================

mod queue_tests {
    use super::*;

    #[test]
    fn test_create_and_lookup_queue() {
        let s = store();
        let created = s
            .create_queue(ACCOUNT, "orders", &QueueAttributes::default())
            .unwrap();

        let found = s.lookup_queue(ACCOUNT, "orders").unwrap().unwrap();
        assert_eq!(found, created);
        assert_eq!(found.identity.queue_name, "orders");
        assert!(s.lookup_queue(ACCOUNT, "missing").unwrap().is_none());
    }

    #[test]
    fn test_create_queue_already_exists() {
        let s = store();
        s.create_queue(ACCOUNT, "orders", &QueueAttributes::default())
            .unwrap();

        let result = s.create_queue(ACCOUNT, "orders", &QueueAttributes::default());
        assert!(matches!(result, Err(StorageError::QueueAlreadyExists(_))));
    }

    #[test]
    fn test_queues_scoped_per_account() {
        let s = store();
        s.create_queue(ACCOUNT, "orders", &QueueAttributes::default())
            .unwrap();

        assert!(s.lookup_queue("210987654321", "orders").unwrap().is_none());
        assert!(s
            .create_queue("210987654321", "orders", &QueueAttributes::default())
            .is_ok());
    }

    #[test]
    fn test_list_queues_by_prefix() {
        let s = store();
        for name in ["orders", "orders-dlq", "payments"] {
            s.create_queue(ACCOUNT, name, &QueueAttributes::default())
                .unwrap();
        }

        let names = |prefix| {
            s.list_queues_by_prefix(ACCOUNT, prefix)
                .unwrap()
                .into_iter()
                .map(|q| q.identity.queue_name)
                .collect::<Vec<_>>()
        };

        assert_eq!(names(None), vec!["orders", "orders-dlq", "payments"]);
        assert_eq!(names(Some("orders")), vec!["orders", "orders-dlq"]);
        assert!(names(Some("z")).is_empty());
        assert!(s.list_queues_by_prefix("000000000000", None).unwrap().is_empty());
    }

    #[test]
    fn test_delete_queue() {
        let s = store_with_queue("30");
        s.delete_queue(ACCOUNT, "orders").unwrap();
        assert!(s.lookup_queue(ACCOUNT, "orders").unwrap().is_none());

        let result = s.delete_queue(ACCOUNT, "orders");
        assert!(matches!(result, Err(StorageError::QueueNotFound(_))));
    }
}

// =============================================================================
// MESSAGE OPERATIONS
// =============================================================================

mod message_tests {
    use super::*;

    #[test]
    fn test_send_to_missing_queue() {
        let s = store();
        let result = s.send_message(ACCOUNT, "orders", message("hi"));
        assert!(matches!(result, Err(StorageError::QueueNotFound(_))));
    }

    #[test]
    fn test_receive_assigns_receipt_and_counts() {
        let s = store_with_queue("0");
        s.send_message(ACCOUNT, "orders", message("hi")).unwrap();

        let first = s.receive_messages(ACCOUNT, "orders", 10).unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].body, "hi");
        assert_eq!(
            first[0].system_attribute(SystemAttribute::ApproximateReceiveCount),
            Some("1")
        );
        assert_eq!(first[0].internal_attribute(InternalAttribute::LocalReceiveCount), Some(1));
        assert!(first[0]
            .system_attribute(SystemAttribute::ApproximateFirstReceiveTimestamp)
            .is_some());

        // Zero visibility timeout makes the message immediately receivable again
        let second = s.receive_messages(ACCOUNT, "orders", 10).unwrap();
        assert_eq!(
            second[0].system_attribute(SystemAttribute::ApproximateReceiveCount),
            Some("2")
        );
        assert_ne!(first[0].receipt_handle, second[0].receipt_handle);
    }

    #[test]
    fn test_received_message_hidden_for_visibility_timeout() {
        let s = store_with_queue("30");
        s.send_message(ACCOUNT, "orders", message("hi")).unwrap();

        assert_eq!(s.receive_messages(ACCOUNT, "orders", 10).unwrap().len(), 1);
        assert!(s.receive_messages(ACCOUNT, "orders", 10).unwrap().is_empty());
    }

    #[test]
    fn test_delayed_message_not_visible() {
        let s = store_with_queue("0");
        let mut delayed = message("later");
        delayed.set_internal_attribute(InternalAttribute::DelaySeconds, 900);
        s.send_message(ACCOUNT, "orders", delayed).unwrap();
        s.send_message(ACCOUNT, "orders", message("now")).unwrap();

        let received = s.receive_messages(ACCOUNT, "orders", 10).unwrap();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].body, "now");
    }

    #[test]
    fn test_expired_message_dropped() {
        let s = store_with_queue("0");
        let mut old = message("old");
        old.set_system_attribute(
            SystemAttribute::SentTimestamp,
            Utc::now().timestamp_millis() - 120_000,
        );
        old.set_internal_attribute(InternalAttribute::MessageRetentionPeriod, 60);
        s.send_message(ACCOUNT, "orders", old).unwrap();

        assert!(s.receive_messages(ACCOUNT, "orders", 10).unwrap().is_empty());
    }

    #[test]
    fn test_receive_respects_max() {
        let s = store_with_queue("30");
        for i in 0..5 {
            s.send_message(ACCOUNT, "orders", message(&format!("m{i}")))
                .unwrap();
        }

        let received = s.receive_messages(ACCOUNT, "orders", 3).unwrap();
        let bodies: Vec<_> = received.iter().map(|m| m.body.as_str()).collect();
        assert_eq!(bodies, vec!["m0", "m1", "m2"]);
        assert_eq!(s.receive_messages(ACCOUNT, "orders", 10).unwrap().len(), 2);
    }

    #[test]
    fn test_delete_message() {
        let s = store_with_queue("0");
        s.send_message(ACCOUNT, "orders", message("hi")).unwrap();
        let received = s.receive_messages(ACCOUNT, "orders", 1).unwrap();
        let handle = received[0].receipt_handle.clone().unwrap();

        s.delete_message(ACCOUNT, "orders", &handle).unwrap();
        assert!(s.receive_messages(ACCOUNT, "orders", 10).unwrap().is_empty());

        let result = s.delete_message(ACCOUNT, "orders", &handle);
        assert!(matches!(result, Err(StorageError::ReceiptHandleNotFound(_))));
    }

    #[test]
    fn test_delete_all_messages() {
        let s = store_with_queue("0");
        s.send_message(ACCOUNT, "orders", message("a")).unwrap();
        s.send_message(ACCOUNT, "orders", message("b")).unwrap();

        s.delete_all_messages(ACCOUNT, "orders").unwrap();
        assert!(s.receive_messages(ACCOUNT, "orders", 10).unwrap().is_empty());
    }
}

// =============================================================================
// ACCOUNTS
// =============================================================================

#[test]
fn test_static_accounts() {
    let accounts = StaticAccounts::new(["123456789012"]);
    assert_eq!(
        accounts.lookup_account_by_id("123456789012"),
        Some("123456789012".to_string())
    );
    assert_eq!(accounts.lookup_account_by_id("000000000000"), None);
}
