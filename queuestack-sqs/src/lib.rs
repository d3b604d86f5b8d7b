//! SQS engine for QueueStack
//!
//! Validates and digests SQS requests the way the hosted service does:
//! - CreateQueue, GetQueueUrl, ListQueues, GetQueueAttributes, DeleteQueue
//! - SendMessage, SendMessageBatch, ReceiveMessage, DeleteMessage, PurgeQueue
//! - Message attribute encoding and MD5 digests
//! - Queue URL resolution and redrive policy checks

pub mod address;
pub mod attributes;
pub mod charset;
pub mod digest;
pub mod error;
pub mod handlers;
pub mod limits;
pub mod message;
pub mod policy;
pub mod queue;
pub mod redrive;
pub mod service;
pub mod storage;


pub use address::{QueueAddressResolver, QueueIdentity};
pub use error::SqsError;
pub use handlers::{handle_request, SqsState};
pub use limits::{Limits, LimitsError, LimitsHandle};
pub use service::{CallerContext, SqsService};
pub use storage::{
    AccountLookup, EphemeralStore, MessagePersistence, QueuePersistence, StaticAccounts,
    StorageError,
};
