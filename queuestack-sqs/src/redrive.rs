//! Dead-letter redrive policy validation

use queuestack_core::Arn;
use serde_json::{json, Value};
use tracing::debug;

use crate::address::QueueIdentity;
use crate::charset::is_valid_queue_name;
use crate::error::SqsError;
use crate::limits::Limits;
use crate::storage::QueuePersistence;

const MAX_RECEIVE_COUNT: &str = "maxReceiveCount";
const DEAD_LETTER_TARGET_ARN: &str = "deadLetterTargetArn";

/// A validated redrive policy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedrivePolicy {
    pub max_receive_count: u32,
    pub dead_letter_target: QueueIdentity,
}

impl RedrivePolicy {
    /// Canonical JSON form, as returned by `GetQueueAttributes`
    pub fn to_document(&self, region: &str) -> String {
        json!({
            DEAD_LETTER_TARGET_ARN: self.dead_letter_target.arn(region).to_string(),
            MAX_RECEIVE_COUNT: self.max_receive_count,
        })
        .to_string()
    }
}

/// Parse `document` and check it against the caller's account and region.
///
/// The dead-letter target must already exist in `queues`.
pub fn validate_redrive_policy(
    document: &str,
    account_id: &str,
    region: &str,
    limits: &Limits,
    queues: &dyn QueuePersistence,
) -> Result<RedrivePolicy, SqsError> {
    let invalid = |reason: &str| {
        SqsError::InvalidParameterValue(format!(
            "Value {document} for parameter RedrivePolicy is invalid. Reason: {reason}"
        ))
    };

    let policy = match serde_json::from_str::<Value>(document) {
        Ok(Value::Object(map)) => map,
        _ => {
            return Err(SqsError::InvalidParameterValue(
                "Invalid value for the parameter RedrivePolicy. Reason: Redrive policy is not a valid JSON map."
                    .to_string(),
            ))
        }
    };

    for key in [MAX_RECEIVE_COUNT, DEAD_LETTER_TARGET_ARN] {
        if !policy.contains_key(key) {
            return Err(invalid(&format!(
                "Redrive policy does not contain mandatory attribute: {key}."
            )));
        }
    }
    if policy.len() > 2 {
        return Err(invalid(&format!(
            "Only following attributes are supported: [{DEAD_LETTER_TARGET_ARN}, {MAX_RECEIVE_COUNT}]."
        )));
    }

    let count_node = &policy[MAX_RECEIVE_COUNT];
    let max = limits.max_max_receive_count;
    let max_receive_count = receive_count(count_node)
        .filter(|count| (1..=max).contains(count))
        .ok_or_else(|| {
            invalid(&format!(
                "Invalid value for {MAX_RECEIVE_COUNT}: {count_node}, valid values are from 1 to {max} both inclusive."
            ))
        })?;

    let arn = policy[DEAD_LETTER_TARGET_ARN]
        .as_str()
        .and_then(|text| Arn::parse(text).ok())
        .filter(|arn| {
            arn.service == "sqs"
                && is_valid_queue_name(&arn.resource, limits.max_queue_name_length as usize)
        })
        .ok_or_else(|| invalid(&format!("Invalid value for {DEAD_LETTER_TARGET_ARN}.")))?;

    if arn.region != region {
        return Err(invalid("Dead-letter target must be in same region as the source."));
    }
    if arn.account != account_id {
        return Err(invalid("Dead-letter target owner should be same as the source."));
    }
    if queues.lookup_queue(&arn.account, &arn.resource)?.is_none() {
        return Err(invalid("Dead letter target does not exist."));
    }

    debug!(dead_letter_target = %arn, max_receive_count, "Validated redrive policy");
    Ok(RedrivePolicy {
        max_receive_count,
        dead_letter_target: QueueIdentity::new(arn.account, arn.resource),
    })
}

/// An integer, or a string holding one
fn receive_count(node: &Value) -> Option<u32> {
    match node {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
