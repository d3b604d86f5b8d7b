//! Persistence and account collaborator traits

use thiserror::Error;

use crate::message::Message;
use crate::queue::{Queue, QueueAttributes};

/// Errors from storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Queue not found: {0}")]
    QueueNotFound(String),

    #[error("Queue already exists: {0}")]
    QueueAlreadyExists(String),

    #[error("Receipt handle not found: {0}")]
    ReceiptHandleNotFound(String),

    #[error("Storage backend failure: {0}")]
    Backend(String),
}

/// Durable queue records
pub trait QueuePersistence: Send + Sync {
    /// `Ok(None)` when the account has no queue of that name
    fn lookup_queue(&self, account_id: &str, name: &str) -> Result<Option<Queue>, StorageError>;

    /// Create a queue. Fails with `QueueAlreadyExists` if the name is taken.
    fn create_queue(
        &self,
        account_id: &str,
        name: &str,
        attributes: &QueueAttributes,
    ) -> Result<Queue, StorageError>;

    /// Queues of an account, ordered by name
    fn list_queues_by_prefix(
        &self,
        account_id: &str,
        prefix: Option<&str>,
    ) -> Result<Vec<Queue>, StorageError>;

    fn delete_queue(&self, account_id: &str, name: &str) -> Result<(), StorageError>;
}

/// Durable message storage
pub trait MessagePersistence: Send + Sync {
    /// Enqueue a validated message carrying its digests and bookkeeping attributes
    fn send_message(&self, account_id: &str, name: &str, message: Message)
        -> Result<(), StorageError>;

    /// Take up to `max` visible messages, hiding them for the queue's
    /// visibility timeout. Each returned message has a fresh receipt handle.
    fn receive_messages(
        &self,
        account_id: &str,
        name: &str,
        max: usize,
    ) -> Result<Vec<Message>, StorageError>;

    fn delete_message(
        &self,
        account_id: &str,
        name: &str,
        receipt_handle: &str,
    ) -> Result<(), StorageError>;

    fn delete_all_messages(&self, account_id: &str, name: &str) -> Result<(), StorageError>;
}

/// Resolves account ids named in queue URLs
pub trait AccountLookup: Send + Sync {
    /// The account number, or `None` if no such account exists
    fn lookup_account_by_id(&self, account_id: &str) -> Option<String>;
}
