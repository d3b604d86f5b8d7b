//! AWS error types and formatting

use thiserror::Error;

/// Error codes surfaced on the SQS wire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Common
    AccessDenied,
    InternalFailure,
    InvalidAction,
    InvalidParameterValue,
    MissingParameter,

    // SQS specific
    InvalidAddress,
    QueueAlreadyExists,
    QueueDoesNotExist,
    ReceiptHandleIsInvalid,
    UnsupportedOperation,

    // SQS batch requests
    BatchEntryIdsNotDistinct,
    EmptyBatchRequest,
    InvalidBatchEntryId,
    TooManyEntriesInBatchRequest,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AccessDenied => "AccessDenied",
            Self::InternalFailure => "InternalFailure",
            Self::InvalidAction => "InvalidAction",
            Self::InvalidParameterValue => "InvalidParameterValue",
            Self::MissingParameter => "MissingParameter",
            Self::InvalidAddress => "InvalidAddress",
            Self::QueueAlreadyExists => "QueueAlreadyExists",
            Self::QueueDoesNotExist => "AWS.SimpleQueueService.NonExistentQueue",
            Self::ReceiptHandleIsInvalid => "ReceiptHandleIsInvalid",
            Self::UnsupportedOperation => "AWS.SimpleQueueService.UnsupportedOperation",
            Self::BatchEntryIdsNotDistinct => "AWS.SimpleQueueService.BatchEntryIdsNotDistinct",
            Self::EmptyBatchRequest => "AWS.SimpleQueueService.EmptyBatchRequest",
            Self::InvalidBatchEntryId => "AWS.SimpleQueueService.InvalidBatchEntryId",
            Self::TooManyEntriesInBatchRequest => {
                "AWS.SimpleQueueService.TooManyEntriesInBatchRequest"
            }
        }
    }

    pub fn http_status(&self) -> u16 {
        match self {
            Self::AccessDenied => 403,
            Self::InternalFailure => 500,
            Self::InvalidAction
            | Self::InvalidParameterValue
            | Self::MissingParameter
            | Self::InvalidAddress
            | Self::QueueAlreadyExists
            | Self::QueueDoesNotExist
            | Self::ReceiptHandleIsInvalid
            | Self::UnsupportedOperation
            | Self::BatchEntryIdsNotDistinct
            | Self::EmptyBatchRequest
            | Self::InvalidBatchEntryId
            | Self::TooManyEntriesInBatchRequest => 400,
        }
    }

    /// Whether the fault lies with the caller (`Sender`) or the service (`Receiver`)
    pub fn fault(&self) -> &'static str {
        match self {
            Self::InternalFailure => "Receiver",
            _ => "Sender",
        }
    }
}

/// AWS-style error
#[derive(Debug, Error)]
#[error("{}: {}", .code.as_str(), .message)]
pub struct AwsError {
    pub code: ErrorCode,
    pub message: String,
    /// Internal detail; only populated for privileged callers
    pub detail: Option<String>,
    pub request_id: String,
}

impl AwsError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            detail: None,
            request_id: uuid::Uuid::new_v4().to_string(),
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = request_id.into();
        self
    }

    /// Format as an SQS query-protocol `ErrorResponse`
    pub fn to_xml(&self) -> String {
        let detail = match &self.detail {
            Some(detail) => format!("<Detail>{}</Detail>", escape_xml(detail)),
            None => "<Detail/>".to_string(),
        };

        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<ErrorResponse xmlns="http://queue.amazonaws.com/doc/2012-11-05/">
  <Error>
    <Type>{}</Type>
    <Code>{}</Code>
    <Message>{}</Message>
    {}
  </Error>
  <RequestId>{}</RequestId>
</ErrorResponse>"#,
            self.code.fault(),
            self.code.as_str(),
            escape_xml(&self.message),
            detail,
            self.request_id
        )
    }
}

/// Escape text for inclusion in an XML element
pub fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_xml_format() {
        let error = AwsError::new(ErrorCode::QueueDoesNotExist, "The specified queue does not exist.")
            .with_request_id("test-request-id");

        let xml = error.to_xml();
        assert!(xml.contains("<Type>Sender</Type>"));
        assert!(xml.contains("<Code>AWS.SimpleQueueService.NonExistentQueue</Code>"));
        assert!(xml.contains("<RequestId>test-request-id</RequestId>"));
        assert!(xml.contains("<Detail/>"));
    }

    #[test]
    fn test_error_xml_detail_and_escaping() {
        let error = AwsError::new(ErrorCode::InternalFailure, "boom <here>")
            .with_detail("disk & network");

        let xml = error.to_xml();
        assert!(xml.contains("<Type>Receiver</Type>"));
        assert!(xml.contains("<Message>boom &lt;here&gt;</Message>"));
        assert!(xml.contains("<Detail>disk &amp; network</Detail>"));
    }

    #[test]
    fn test_http_status() {
        assert_eq!(ErrorCode::AccessDenied.http_status(), 403);
        assert_eq!(ErrorCode::InvalidAddress.http_status(), 400);
        assert_eq!(ErrorCode::InternalFailure.http_status(), 500);
    }
}
