//! SQS storage backends

mod ephemeral;
mod traits;

#[cfg(test)]
mod tests;

pub use ephemeral::{EphemeralStore, StaticAccounts};
pub use traits::{AccountLookup, MessagePersistence, QueuePersistence, StorageError};
