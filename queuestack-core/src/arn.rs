//! Amazon Resource Name parsing
//!
//! Only the syntax is checked here. Whether the account or resource exists
//! is up to the caller.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ArnError {
    #[error("ARN must start with 'arn:': {0}")]
    MissingPrefix(String),

    #[error("ARN must have six ':'-separated fields: {0}")]
    WrongFieldCount(String),

    #[error("ARN field '{field}' must not be empty: {arn}")]
    EmptyField { field: &'static str, arn: String },
}

/// A parsed `arn:partition:service:region:account:resource` string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Arn {
    pub partition: String,
    pub service: String,
    pub region: String,
    pub account: String,
    pub resource: String,
}

impl Arn {
    /// ARN of an SQS queue
    pub fn sqs_queue(region: &str, account: &str, queue_name: &str) -> Self {
        Self {
            partition: "aws".to_string(),
            service: "sqs".to_string(),
            region: region.to_string(),
            account: account.to_string(),
            resource: queue_name.to_string(),
        }
    }

    pub fn parse(s: &str) -> Result<Self, ArnError> {
        let rest = s
            .strip_prefix("arn:")
            .ok_or_else(|| ArnError::MissingPrefix(s.to_string()))?;

        // The resource may itself contain ':' (e.g. `function:name:alias`)
        let fields: Vec<&str> = rest.splitn(5, ':').collect();
        if fields.len() != 5 {
            return Err(ArnError::WrongFieldCount(s.to_string()));
        }

        let non_empty = |field: &'static str, value: &str| {
            if value.is_empty() {
                Err(ArnError::EmptyField {
                    field,
                    arn: s.to_string(),
                })
            } else {
                Ok(value.to_string())
            }
        };

        Ok(Self {
            partition: non_empty("partition", fields[0])?,
            service: non_empty("service", fields[1])?,
            // Global services (IAM, S3) leave region and account blank
            region: fields[2].to_string(),
            account: fields[3].to_string(),
            resource: non_empty("resource", fields[4])?,
        })
    }
}

impl FromStr for Arn {
    type Err = ArnError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Arn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "arn:{}:{}:{}:{}:{}",
            self.partition, self.service, self.region, self.account, self.resource
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_queue_arn() {
        let arn = Arn::parse("arn:aws:sqs:us-east-1:123456789012:orders-dlq").unwrap();
        assert_eq!(arn.partition, "aws");
        assert_eq!(arn.service, "sqs");
        assert_eq!(arn.region, "us-east-1");
        assert_eq!(arn.account, "123456789012");
        assert_eq!(arn.resource, "orders-dlq");
    }

    #[test]
    fn test_display_round_trip() {
        let arn = Arn::sqs_queue("eu-west-1", "000000000000", "q");
        let text = arn.to_string();
        assert_eq!(text, "arn:aws:sqs:eu-west-1:000000000000:q");
        assert_eq!(text.parse::<Arn>().unwrap(), arn);
    }

    #[test]
    fn test_resource_keeps_colons() {
        let arn = Arn::parse("arn:aws:lambda:us-east-1:123456789012:function:f:live").unwrap();
        assert_eq!(arn.resource, "function:f:live");
    }

    #[test]
    fn test_malformed() {
        assert!(matches!(
            Arn::parse("aws:sqs:us-east-1:1:q"),
            Err(ArnError::MissingPrefix(_))
        ));
        assert!(matches!(
            Arn::parse("arn:aws:sqs:us-east-1"),
            Err(ArnError::WrongFieldCount(_))
        ));
        assert!(matches!(
            Arn::parse("arn:aws:sqs:us-east-1:123456789012:"),
            Err(ArnError::EmptyField { field: "resource", .. })
        ));
    }
}
