//! Messages handed to and returned from the store

use std::collections::BTreeMap;

use crate::attributes::MessageAttributeValue;

/// System attributes callers may request on receive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemAttribute {
    ApproximateFirstReceiveTimestamp,
    ApproximateReceiveCount,
    SenderId,
    SentTimestamp,
}

impl SystemAttribute {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ApproximateFirstReceiveTimestamp => "ApproximateFirstReceiveTimestamp",
            Self::ApproximateReceiveCount => "ApproximateReceiveCount",
            Self::SenderId => "SenderId",
            Self::SentTimestamp => "SentTimestamp",
        }
    }
}

/// Bookkeeping copied onto each message so the store never has to re-read the
/// queue. Never returned to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InternalAttribute {
    LocalReceiveCount,
    DelaySeconds,
    MessageRetentionPeriod,
}

impl InternalAttribute {
    pub const ALL: [InternalAttribute; 3] = [
        Self::LocalReceiveCount,
        Self::DelaySeconds,
        Self::MessageRetentionPeriod,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LocalReceiveCount => "InternalLocalReceiveCount",
            Self::DelaySeconds => "InternalDelaySeconds",
            Self::MessageRetentionPeriod => "InternalMessageRetentionPeriod",
        }
    }

    pub fn is_internal(name: &str) -> bool {
        Self::ALL.iter().any(|attr| attr.as_str() == name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub message_id: String,
    /// Issued by the store on each receive
    pub receipt_handle: Option<String>,
    pub body: String,
    pub md5_of_body: String,
    pub md5_of_message_attributes: Option<String>,
    pub message_attributes: BTreeMap<String, MessageAttributeValue>,
    /// System and internal attributes
    pub attributes: BTreeMap<String, String>,
}

impl Message {
    pub fn system_attribute(&self, attr: SystemAttribute) -> Option<&str> {
        self.attributes.get(attr.as_str()).map(String::as_str)
    }

    pub fn set_system_attribute(&mut self, attr: SystemAttribute, value: impl ToString) {
        self.attributes.insert(attr.as_str().to_string(), value.to_string());
    }

    pub fn internal_attribute(&self, attr: InternalAttribute) -> Option<i64> {
        self.attributes
            .get(attr.as_str())
            .and_then(|value| value.parse().ok())
    }

    pub fn set_internal_attribute(&mut self, attr: InternalAttribute, value: i64) {
        self.attributes.insert(attr.as_str().to_string(), value.to_string());
    }

    /// Drop every attribute callers must not observe
    pub fn strip_internal_attributes(&mut self) {
        self.attributes
            .retain(|name, _| !InternalAttribute::is_internal(name));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_internal_attributes() {
        let mut message = Message {
            message_id: "id".to_string(),
            receipt_handle: None,
            body: "body".to_string(),
            md5_of_body: String::new(),
            md5_of_message_attributes: None,
            message_attributes: BTreeMap::new(),
            attributes: BTreeMap::new(),
        };
        message.set_system_attribute(SystemAttribute::SenderId, "123456789012");
        message.set_internal_attribute(InternalAttribute::DelaySeconds, 5);
        message.set_internal_attribute(InternalAttribute::LocalReceiveCount, 0);

        assert_eq!(message.internal_attribute(InternalAttribute::DelaySeconds), Some(5));

        message.strip_internal_attributes();
        assert_eq!(message.attributes.len(), 1);
        assert_eq!(message.system_attribute(SystemAttribute::SenderId), Some("123456789012"));
    }
}
