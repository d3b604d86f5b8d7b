//! SQS error taxonomy

use queuestack_core::{AwsError, ErrorCode};
use thiserror::Error;
use tracing::error;

use crate::storage::StorageError;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Every failure an SQS operation can surface to its caller
#[derive(Error, Debug)]
pub enum SqsError {
    #[error("{0}")]
    InvalidParameterValue(String),
    #[error("{0}")]
    MissingParameter(String),
    /// The feature is recognised but deliberately not implemented
    #[error("{0}")]
    UnsupportedOperation(String),
    #[error("{0}")]
    QueueDoesNotExist(String),
    #[error("{0}")]
    QueueAlreadyExists(String),
    #[error("{0}")]
    InvalidAddress(String),
    #[error("{0}")]
    AccessDenied(String),
    #[error("{0}")]
    ReceiptHandleIsInvalid(String),
    #[error("{0}")]
    InvalidAction(String),
    #[error("{0}")]
    EmptyBatchRequest(String),
    #[error("{0}")]
    TooManyEntriesInBatchRequest(String),
    #[error("{0}")]
    InvalidBatchEntryId(String),
    #[error("{0}")]
    BatchEntryIdsNotDistinct(String),
    #[error("{message}")]
    InternalFailure {
        message: String,
        #[source]
        source: Option<BoxError>,
    },
}

impl SqsError {
    /// Wrap an unexpected failure, keeping it as the source
    pub fn internal(source: impl Into<BoxError>) -> Self {
        let source = source.into();
        error!(error = %source, "Internal failure");
        Self::InternalFailure {
            message: "We encountered an internal error. Please try again.".to_string(),
            source: Some(source),
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidParameterValue(_) => ErrorCode::InvalidParameterValue,
            Self::MissingParameter(_) => ErrorCode::MissingParameter,
            Self::UnsupportedOperation(_) => ErrorCode::UnsupportedOperation,
            Self::QueueDoesNotExist(_) => ErrorCode::QueueDoesNotExist,
            Self::QueueAlreadyExists(_) => ErrorCode::QueueAlreadyExists,
            Self::InvalidAddress(_) => ErrorCode::InvalidAddress,
            Self::AccessDenied(_) => ErrorCode::AccessDenied,
            Self::ReceiptHandleIsInvalid(_) => ErrorCode::ReceiptHandleIsInvalid,
            Self::InvalidAction(_) => ErrorCode::InvalidAction,
            Self::EmptyBatchRequest(_) => ErrorCode::EmptyBatchRequest,
            Self::TooManyEntriesInBatchRequest(_) => ErrorCode::TooManyEntriesInBatchRequest,
            Self::InvalidBatchEntryId(_) => ErrorCode::InvalidBatchEntryId,
            Self::BatchEntryIdsNotDistinct(_) => ErrorCode::BatchEntryIdsNotDistinct,
            Self::InternalFailure { .. } => ErrorCode::InternalFailure,
        }
    }

    /// Whether the caller, rather than the service, is at fault
    pub fn is_sender_fault(&self) -> bool {
        !matches!(self, Self::InternalFailure { .. })
    }

    /// Render for the wire. The internal cause is only attached for privileged callers.
    pub fn to_aws_error(&self, privileged: bool) -> AwsError {
        let error = AwsError::new(self.code(), self.to_string());
        match self {
            Self::InternalFailure {
                source: Some(source),
                ..
            } if privileged => error.with_detail(source.to_string()),
            _ => error,
        }
    }
}

impl From<StorageError> for SqsError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::QueueNotFound(_) => {
                Self::QueueDoesNotExist("The specified queue does not exist.".to_string())
            }
            StorageError::QueueAlreadyExists(name) => {
                Self::QueueAlreadyExists(format!("{name} already exists."))
            }
            StorageError::ReceiptHandleNotFound(handle) => Self::ReceiptHandleIsInvalid(format!(
                "The input receipt handle \"{handle}\" is not a valid receipt handle."
            )),
            other @ StorageError::Backend(_) => Self::internal(other),
        }
    }
}
