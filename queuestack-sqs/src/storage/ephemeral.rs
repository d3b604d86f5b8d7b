//! In-memory ephemeral storage backend

use super::traits::*;
use chrono::Utc;
use queuestack_core::StateStore;
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, info};
use uuid::Uuid;

use crate::address::QueueIdentity;
use crate::message::{InternalAttribute, Message, SystemAttribute};
use crate::queue::{Queue, QueueAttributes};

/// A message plus its scheduling state, in epoch milliseconds
#[derive(Debug)]
struct StoredMessage {
    message: Message,
    visible_at: i64,
    expires_at: i64,
}

#[derive(Debug)]
struct StoredQueue {
    queue: Queue,
    messages: Vec<StoredMessage>,
}

/// All queues of one account in this store's region
#[derive(Debug, Default)]
struct AccountQueues {
    queues: BTreeMap<String, StoredQueue>,
}

impl AccountQueues {
    fn queue_mut(&mut self, name: &str) -> Result<&mut StoredQueue, StorageError> {
        self.queues
            .get_mut(name)
            .ok_or_else(|| StorageError::QueueNotFound(name.to_string()))
    }
}

/// Ephemeral (in-memory) queue and message store for a single region
pub struct EphemeralStore {
    region: String,
    accounts: StateStore<AccountQueues>,
}

impl EphemeralStore {
    pub fn new(region: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            accounts: StateStore::new(),
        }
    }

    fn with_queue<R>(
        &self,
        account_id: &str,
        name: &str,
        f: impl FnOnce(&mut StoredQueue) -> Result<R, StorageError>,
    ) -> Result<R, StorageError> {
        self.accounts
            .write_existing(account_id, &self.region, |account| f(account.queue_mut(name)?))
            .unwrap_or_else(|| Err(StorageError::QueueNotFound(name.to_string())))
    }
}

impl QueuePersistence for EphemeralStore {
    fn lookup_queue(&self, account_id: &str, name: &str) -> Result<Option<Queue>, StorageError> {
        Ok(self
            .accounts
            .read(account_id, &self.region, |account| {
                account.queues.get(name).map(|stored| stored.queue.clone())
            })
            .flatten())
    }

    fn create_queue(
        &self,
        account_id: &str,
        name: &str,
        attributes: &QueueAttributes,
    ) -> Result<Queue, StorageError> {
        self.accounts.write(account_id, &self.region, |account| {
            if account.queues.contains_key(name) {
                return Err(StorageError::QueueAlreadyExists(name.to_string()));
            }

            let queue = Queue::new(QueueIdentity::new(account_id, name), attributes.clone());
            account.queues.insert(
                name.to_string(),
                StoredQueue {
                    queue: queue.clone(),
                    messages: Vec::new(),
                },
            );
            info!(account = %account_id, name = %name, "Stored queue");
            Ok(queue)
        })
    }

    fn list_queues_by_prefix(
        &self,
        account_id: &str,
        prefix: Option<&str>,
    ) -> Result<Vec<Queue>, StorageError> {
        let prefix = prefix.unwrap_or_default();
        Ok(self
            .accounts
            .read(account_id, &self.region, |account| {
                account
                    .queues
                    .range(prefix.to_string()..)
                    .take_while(|(name, _)| name.starts_with(prefix))
                    .map(|(_, stored)| stored.queue.clone())
                    .collect()
            })
            .unwrap_or_default())
    }

    fn delete_queue(&self, account_id: &str, name: &str) -> Result<(), StorageError> {
        self.accounts
            .write_existing(account_id, &self.region, |account| {
                account.queues.remove(name).map(|_| ())
            })
            .flatten()
            .ok_or_else(|| StorageError::QueueNotFound(name.to_string()))?;

        info!(account = %account_id, name = %name, "Removed queue");
        Ok(())
    }
}

impl MessagePersistence for EphemeralStore {
    fn send_message(
        &self,
        account_id: &str,
        name: &str,
        message: Message,
    ) -> Result<(), StorageError> {
        let sent_at = message
            .system_attribute(SystemAttribute::SentTimestamp)
            .and_then(|ts| ts.parse::<i64>().ok())
            .unwrap_or_else(|| Utc::now().timestamp_millis());
        let delay = message
            .internal_attribute(InternalAttribute::DelaySeconds)
            .unwrap_or_default();

        self.with_queue(account_id, name, |stored| {
            let retention = message
                .internal_attribute(InternalAttribute::MessageRetentionPeriod)
                .unwrap_or_else(|| i64::from(stored.queue.attributes.message_retention_period()));

            debug!(queue = %name, message_id = %message.message_id, delay, "Stored message");
            stored.messages.push(StoredMessage {
                message,
                visible_at: sent_at + delay * 1000,
                expires_at: sent_at + retention * 1000,
            });
            Ok(())
        })
    }

    fn receive_messages(
        &self,
        account_id: &str,
        name: &str,
        max: usize,
    ) -> Result<Vec<Message>, StorageError> {
        let now = Utc::now().timestamp_millis();

        self.with_queue(account_id, name, |stored| {
            let before = stored.messages.len();
            stored.messages.retain(|m| m.expires_at > now);
            if stored.messages.len() < before {
                debug!(queue = %name, expired = before - stored.messages.len(), "Dropped expired messages");
            }

            let hide_until = now + i64::from(stored.queue.attributes.visibility_timeout()) * 1000;
            let mut received = Vec::new();

            for entry in stored
                .messages
                .iter_mut()
                .filter(|m| m.visible_at <= now)
                .take(max)
            {
                let message = &mut entry.message;
                let count = message
                    .system_attribute(SystemAttribute::ApproximateReceiveCount)
                    .and_then(|c| c.parse::<u64>().ok())
                    .unwrap_or_default()
                    + 1;
                message.set_system_attribute(SystemAttribute::ApproximateReceiveCount, count);
                let local = message
                    .internal_attribute(InternalAttribute::LocalReceiveCount)
                    .unwrap_or_default();
                message.set_internal_attribute(InternalAttribute::LocalReceiveCount, local + 1);
                if message
                    .system_attribute(SystemAttribute::ApproximateFirstReceiveTimestamp)
                    .is_none()
                {
                    message.set_system_attribute(SystemAttribute::ApproximateFirstReceiveTimestamp, now);
                }
                message.receipt_handle = Some(Uuid::new_v4().to_string());

                entry.visible_at = hide_until;
                received.push(message.clone());
            }

            Ok(received)
        })
    }

    fn delete_message(
        &self,
        account_id: &str,
        name: &str,
        receipt_handle: &str,
    ) -> Result<(), StorageError> {
        self.with_queue(account_id, name, |stored| {
            let position = stored
                .messages
                .iter()
                .position(|m| m.message.receipt_handle.as_deref() == Some(receipt_handle))
                .ok_or_else(|| StorageError::ReceiptHandleNotFound(receipt_handle.to_string()))?;
            stored.messages.remove(position);
            Ok(())
        })
    }

    fn delete_all_messages(&self, account_id: &str, name: &str) -> Result<(), StorageError> {
        self.with_queue(account_id, name, |stored| {
            let purged = stored.messages.len();
            stored.messages.clear();
            info!(queue = %name, purged, "Purged queue");
            Ok(())
        })
    }
}

/// Account lookup over a fixed set of account ids
#[derive(Debug, Clone, Default)]
pub struct StaticAccounts {
    ids: HashSet<String>,
}

impl StaticAccounts {
    pub fn new<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            ids: ids.into_iter().map(Into::into).collect(),
        }
    }
}

impl AccountLookup for StaticAccounts {
    fn lookup_account_by_id(&self, account_id: &str) -> Option<String> {
        self.ids.get(account_id).cloned()
    }
}
