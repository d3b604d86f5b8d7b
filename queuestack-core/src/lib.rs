//! Core types and traits for QueueStack
//!
//! This crate provides common types used across all QueueStack crates.

pub mod account;
pub mod arn;
pub mod error;
pub mod request_id;

pub use account::{AccountRegionKey, StateStore};
pub use arn::{Arn, ArnError};
pub use error::{escape_xml, AwsError, ErrorCode};
pub use request_id::RequestId;
