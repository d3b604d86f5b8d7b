//! Queue records and queue attributes

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::address::QueueIdentity;

/// Every queue attribute name SQS recognises
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum QueueAttributeName {
    All,
    Policy,
    VisibilityTimeout,
    MaximumMessageSize,
    MessageRetentionPeriod,
    ApproximateNumberOfMessages,
    ApproximateNumberOfMessagesNotVisible,
    CreatedTimestamp,
    LastModifiedTimestamp,
    QueueArn,
    ApproximateNumberOfMessagesDelayed,
    DelaySeconds,
    ReceiveMessageWaitTimeSeconds,
    RedrivePolicy,
}

impl QueueAttributeName {
    pub const ALL: [QueueAttributeName; 14] = [
        Self::All,
        Self::Policy,
        Self::VisibilityTimeout,
        Self::MaximumMessageSize,
        Self::MessageRetentionPeriod,
        Self::ApproximateNumberOfMessages,
        Self::ApproximateNumberOfMessagesNotVisible,
        Self::CreatedTimestamp,
        Self::LastModifiedTimestamp,
        Self::QueueArn,
        Self::ApproximateNumberOfMessagesDelayed,
        Self::DelaySeconds,
        Self::ReceiveMessageWaitTimeSeconds,
        Self::RedrivePolicy,
    ];

    /// Attributes whose values decide whether a repeated CreateQueue is idempotent
    pub const COMPARABLE: [QueueAttributeName; 7] = [
        Self::DelaySeconds,
        Self::MaximumMessageSize,
        Self::MessageRetentionPeriod,
        Self::ReceiveMessageWaitTimeSeconds,
        Self::VisibilityTimeout,
        Self::Policy,
        Self::RedrivePolicy,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::All => "All",
            Self::Policy => "Policy",
            Self::VisibilityTimeout => "VisibilityTimeout",
            Self::MaximumMessageSize => "MaximumMessageSize",
            Self::MessageRetentionPeriod => "MessageRetentionPeriod",
            Self::ApproximateNumberOfMessages => "ApproximateNumberOfMessages",
            Self::ApproximateNumberOfMessagesNotVisible => "ApproximateNumberOfMessagesNotVisible",
            Self::CreatedTimestamp => "CreatedTimestamp",
            Self::LastModifiedTimestamp => "LastModifiedTimestamp",
            Self::QueueArn => "QueueArn",
            Self::ApproximateNumberOfMessagesDelayed => "ApproximateNumberOfMessagesDelayed",
            Self::DelaySeconds => "DelaySeconds",
            Self::ReceiveMessageWaitTimeSeconds => "ReceiveMessageWaitTimeSeconds",
            Self::RedrivePolicy => "RedrivePolicy",
        }
    }

    /// `Name1 | Name2 | ...`, as quoted in validation errors
    pub fn joined() -> String {
        Self::ALL
            .iter()
            .map(QueueAttributeName::as_str)
            .collect::<Vec<_>>()
            .join(" | ")
    }
}

impl fmt::Display for QueueAttributeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QueueAttributeName {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|name| name.as_str() == s)
            .ok_or(())
    }
}

pub const DEFAULT_DELAY_SECONDS: u32 = 0;
pub const DEFAULT_MAXIMUM_MESSAGE_SIZE: u32 = 262_144;
pub const DEFAULT_MESSAGE_RETENTION_PERIOD: u32 = 345_600;
pub const DEFAULT_RECEIVE_MESSAGE_WAIT_TIME_SECONDS: u32 = 0;
pub const DEFAULT_VISIBILITY_TIMEOUT: u32 = 30;

/// Settable attributes of a queue, stored as their wire strings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueAttributes {
    values: BTreeMap<QueueAttributeName, String>,
}

impl Default for QueueAttributes {
    fn default() -> Self {
        let values = [
            (QueueAttributeName::DelaySeconds, DEFAULT_DELAY_SECONDS),
            (QueueAttributeName::MaximumMessageSize, DEFAULT_MAXIMUM_MESSAGE_SIZE),
            (QueueAttributeName::MessageRetentionPeriod, DEFAULT_MESSAGE_RETENTION_PERIOD),
            (
                QueueAttributeName::ReceiveMessageWaitTimeSeconds,
                DEFAULT_RECEIVE_MESSAGE_WAIT_TIME_SECONDS,
            ),
            (QueueAttributeName::VisibilityTimeout, DEFAULT_VISIBILITY_TIMEOUT),
        ]
        .into_iter()
        .map(|(name, value)| (name, value.to_string()))
        .collect();

        Self { values }
    }
}

impl QueueAttributes {
    pub fn get(&self, name: QueueAttributeName) -> Option<&str> {
        self.values.get(&name).map(String::as_str)
    }

    pub fn set(&mut self, name: QueueAttributeName, value: impl Into<String>) {
        self.values.insert(name, value.into());
    }

    pub fn iter(&self) -> impl Iterator<Item = (QueueAttributeName, &str)> {
        self.values.iter().map(|(name, value)| (*name, value.as_str()))
    }

    /// The subset compared when CreateQueue targets an existing queue
    pub fn comparable(&self) -> BTreeMap<QueueAttributeName, &str> {
        self.iter()
            .filter(|(name, _)| QueueAttributeName::COMPARABLE.contains(name))
            .collect()
    }

    pub fn delay_seconds(&self) -> u32 {
        self.number(QueueAttributeName::DelaySeconds, DEFAULT_DELAY_SECONDS)
    }

    pub fn maximum_message_size(&self) -> u32 {
        self.number(QueueAttributeName::MaximumMessageSize, DEFAULT_MAXIMUM_MESSAGE_SIZE)
    }

    pub fn message_retention_period(&self) -> u32 {
        self.number(
            QueueAttributeName::MessageRetentionPeriod,
            DEFAULT_MESSAGE_RETENTION_PERIOD,
        )
    }

    pub fn visibility_timeout(&self) -> u32 {
        self.number(QueueAttributeName::VisibilityTimeout, DEFAULT_VISIBILITY_TIMEOUT)
    }

    fn number(&self, name: QueueAttributeName, default: u32) -> u32 {
        self.get(name)
            .and_then(|value| value.parse().ok())
            .unwrap_or(default)
    }
}

/// A queue as held by the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Queue {
    pub identity: QueueIdentity,
    pub attributes: QueueAttributes,
    /// Epoch seconds
    pub created_timestamp: i64,
    /// Epoch seconds
    pub last_modified_timestamp: i64,
}

impl Queue {
    pub fn new(identity: QueueIdentity, attributes: QueueAttributes) -> Self {
        let now = chrono::Utc::now().timestamp();
        Self {
            identity,
            attributes,
            created_timestamp: now,
            last_modified_timestamp: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let attrs = QueueAttributes::default();
        assert_eq!(attrs.get(QueueAttributeName::DelaySeconds), Some("0"));
        assert_eq!(attrs.get(QueueAttributeName::MaximumMessageSize), Some("262144"));
        assert_eq!(attrs.get(QueueAttributeName::MessageRetentionPeriod), Some("345600"));
        assert_eq!(attrs.get(QueueAttributeName::ReceiveMessageWaitTimeSeconds), Some("0"));
        assert_eq!(attrs.get(QueueAttributeName::VisibilityTimeout), Some("30"));
        assert_eq!(attrs.get(QueueAttributeName::Policy), None);
        assert_eq!(attrs.visibility_timeout(), 30);
    }

    #[test]
    fn test_parse_names() {
        assert_eq!("QueueArn".parse::<QueueAttributeName>(), Ok(QueueAttributeName::QueueArn));
        assert_eq!("queuearn".parse::<QueueAttributeName>(), Err(()));
        assert!(QueueAttributeName::joined().starts_with("All | Policy | VisibilityTimeout"));
    }

    #[test]
    fn test_comparable_subset() {
        let mut attrs = QueueAttributes::default();
        attrs.set(QueueAttributeName::QueueArn, "arn:aws:sqs:us-east-1:1:q");
        attrs.set(QueueAttributeName::Policy, "{}");

        let comparable = attrs.comparable();
        assert_eq!(comparable.len(), 6);
        assert!(!comparable.contains_key(&QueueAttributeName::QueueArn));
        assert_eq!(comparable.get(&QueueAttributeName::Policy), Some(&"{}"));
    }
}
