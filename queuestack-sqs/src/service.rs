//! SQS request orchestration
//!
//! Each operation runs a fixed validation pipeline and stops at the first
//! failure. Only requests that pass every local check reach the persistence
//! collaborators.

use chrono::Utc;
use queuestack_core::ErrorCode;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::address::{QueueAddressResolver, QueueIdentity};
use crate::attributes::{validate_attribute, MessageAttributeInput};
use crate::charset::{
    code_point_hex, first_invalid_body_char, is_valid_batch_entry_id, is_valid_queue_name,
    ALLOWED_BODY_CHARACTERS,
};
use crate::digest::{digest_attributes, digest_body};
use crate::error::SqsError;
use crate::limits::{Limits, LimitsHandle};
use crate::message::{InternalAttribute, Message, SystemAttribute};
use crate::policy::validate_policy;
use crate::queue::{Queue, QueueAttributeName, QueueAttributes};
use crate::redrive::validate_redrive_policy;
use crate::storage::{
    AccountLookup, EphemeralStore, MessagePersistence, QueuePersistence, StaticAccounts,
    StorageError,
};

/// Entries accepted by a single batch call
pub const MAX_BATCH_ENTRIES: usize = 10;
/// Messages returned by a single receive call
pub const MAX_RECEIVE_MESSAGES: usize = 10;

/// Who is calling, as established by the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerContext {
    pub account_id: String,
    pub region: String,
    /// Administrative callers see the cause of internal failures
    pub privileged: bool,
}

impl CallerContext {
    pub fn new(account_id: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            account_id: account_id.into(),
            region: region.into(),
            privileged: false,
        }
    }

    pub fn privileged(mut self, privileged: bool) -> Self {
        self.privileged = privileged;
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct CreateQueueRequest {
    pub queue_name: Option<String>,
    /// `(name, value)` pairs in request order
    pub attributes: Vec<(String, String)>,
}

/// Body, delay override and attributes of one message to send
#[derive(Debug, Clone, Default)]
pub struct OutboundMessage {
    pub body: Option<String>,
    /// Per-message `DelaySeconds` override as sent on the wire
    pub delay_seconds: Option<String>,
    pub message_attributes: Vec<MessageAttributeInput>,
}

impl OutboundMessage {
    pub fn new(body: impl Into<String>) -> Self {
        Self {
            body: Some(body.into()),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone)]
pub struct SendMessageRequest {
    pub queue_url: String,
    pub message: OutboundMessage,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendMessageResult {
    pub message_id: String,
    pub md5_of_message_body: String,
    pub md5_of_message_attributes: Option<String>,
}

impl From<&Message> for SendMessageResult {
    fn from(message: &Message) -> Self {
        Self {
            message_id: message.message_id.clone(),
            md5_of_message_body: message.md5_of_body.clone(),
            md5_of_message_attributes: message.md5_of_message_attributes.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SendMessageBatchEntry {
    pub id: String,
    pub message: OutboundMessage,
}

#[derive(Debug, Clone)]
pub struct SendMessageBatchRequest {
    pub queue_url: String,
    pub entries: Vec<SendMessageBatchEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchResultEntry {
    pub id: String,
    pub result: SendMessageResult,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchResultErrorEntry {
    pub id: String,
    pub code: ErrorCode,
    pub message: String,
    pub sender_fault: bool,
}

impl BatchResultErrorEntry {
    fn new(id: &str, error: &SqsError) -> Self {
        Self {
            id: id.to_string(),
            code: error.code(),
            message: error.to_string(),
            sender_fault: error.is_sender_fault(),
        }
    }
}

/// Per-entry outcome of a batch send
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SendMessageBatchResult {
    pub successful: Vec<BatchResultEntry>,
    pub failed: Vec<BatchResultErrorEntry>,
}

#[derive(Debug, Clone)]
pub struct ReceiveMessageRequest {
    pub queue_url: String,
    pub max_number_of_messages: Option<i64>,
}

/// The SQS operations, composed over the persistence and account collaborators
pub struct SqsService {
    queues: Arc<dyn QueuePersistence>,
    messages: Arc<dyn MessagePersistence>,
    resolver: QueueAddressResolver,
    limits: Arc<LimitsHandle>,
}

impl SqsService {
    pub fn new(
        queues: Arc<dyn QueuePersistence>,
        messages: Arc<dyn MessagePersistence>,
        resolver: QueueAddressResolver,
        limits: Arc<LimitsHandle>,
    ) -> Self {
        Self {
            queues,
            messages,
            resolver,
            limits,
        }
    }

    /// A service over a fresh in-memory store that knows only `accounts`
    pub fn ephemeral<I, S>(
        endpoint: &str,
        region: &str,
        accounts: I,
        limits: Arc<LimitsHandle>,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let store = Arc::new(EphemeralStore::new(region));
        let accounts: Arc<dyn AccountLookup> = Arc::new(StaticAccounts::new(accounts));
        Self::new(
            store.clone(),
            store,
            QueueAddressResolver::new(endpoint, accounts),
            limits,
        )
    }

    pub fn limits(&self) -> &LimitsHandle {
        &self.limits
    }

    // === Queues ===

    /// Create a queue, or return the existing one if its comparable
    /// attributes match. Returns the queue URL.
    pub fn create_queue(
        &self,
        caller: &CallerContext,
        request: &CreateQueueRequest,
    ) -> Result<String, SqsError> {
        let limits = self.limits.snapshot();
        let name = validate_queue_name(request.queue_name.as_deref(), &limits)?;
        let attributes = self.queue_attributes(caller, &request.attributes, &limits)?;

        let existing = match self.queues.lookup_queue(&caller.account_id, name)? {
            Some(existing) => Some(existing),
            None => match self.queues.create_queue(&caller.account_id, name, &attributes) {
                Ok(_) => {
                    info!(account = %caller.account_id, name = %name, "Created queue");
                    None
                }
                // A concurrent CreateQueue won; compare against its queue
                Err(StorageError::QueueAlreadyExists(_)) => {
                    self.queues.lookup_queue(&caller.account_id, name)?
                }
                Err(err) => return Err(err.into()),
            },
        };

        if let Some(existing) = existing {
            if existing.attributes.comparable() != attributes.comparable() {
                debug!(name = %name, "CreateQueue attributes differ from existing queue");
                return Err(SqsError::QueueAlreadyExists(format!("{name} already exists.")));
            }
            debug!(name = %name, "Queue already exists with matching attributes");
        }

        Ok(self
            .resolver
            .format(&QueueIdentity::new(caller.account_id.as_str(), name)))
    }

    pub fn get_queue_url(
        &self,
        caller: &CallerContext,
        queue_name: Option<&str>,
    ) -> Result<String, SqsError> {
        let limits = self.limits.snapshot();
        let name = validate_queue_name(queue_name, &limits)?;
        let queue = self
            .queues
            .lookup_queue(&caller.account_id, name)?
            .ok_or_else(queue_does_not_exist)?;
        Ok(self.resolver.format(&queue.identity))
    }

    pub fn list_queues(
        &self,
        caller: &CallerContext,
        prefix: Option<&str>,
    ) -> Result<Vec<String>, SqsError> {
        let queues = self
            .queues
            .list_queues_by_prefix(&caller.account_id, prefix.filter(|p| !p.is_empty()))?;
        Ok(queues
            .iter()
            .map(|queue| self.resolver.format(&queue.identity))
            .collect())
    }

    /// Requested attributes of a queue, in canonical name order. `All`
    /// selects every attribute the queue has.
    pub fn get_queue_attributes(
        &self,
        caller: &CallerContext,
        queue_url: &str,
        attribute_names: &[String],
    ) -> Result<BTreeMap<QueueAttributeName, String>, SqsError> {
        let wanted = attribute_names
            .iter()
            .map(|name| parse_attribute_name(name))
            .collect::<Result<HashSet<_>, _>>()?;
        let queue = self.resolve_owned_queue(caller, queue_url)?;

        let all = wanted.contains(&QueueAttributeName::All);
        let derived = [
            (
                QueueAttributeName::QueueArn,
                queue.identity.arn(&caller.region).to_string(),
            ),
            (
                QueueAttributeName::CreatedTimestamp,
                queue.created_timestamp.to_string(),
            ),
            (
                QueueAttributeName::LastModifiedTimestamp,
                queue.last_modified_timestamp.to_string(),
            ),
        ];

        Ok(queue
            .attributes
            .iter()
            .map(|(name, value)| (name, value.to_string()))
            .chain(derived)
            .filter(|(name, _)| all || wanted.contains(name))
            .collect())
    }

    pub fn purge_queue(&self, caller: &CallerContext, queue_url: &str) -> Result<(), SqsError> {
        let queue = self.resolve_owned_queue(caller, queue_url)?;
        let QueueIdentity {
            account_id,
            queue_name,
        } = &queue.identity;
        self.messages.delete_all_messages(account_id, queue_name)?;
        Ok(())
    }

    pub fn delete_queue(&self, caller: &CallerContext, queue_url: &str) -> Result<(), SqsError> {
        let queue = self.resolve_owned_queue(caller, queue_url)?;
        let QueueIdentity {
            account_id,
            queue_name,
        } = &queue.identity;
        self.messages.delete_all_messages(account_id, queue_name)?;
        self.queues.delete_queue(account_id, queue_name)?;
        info!(account = %account_id, name = %queue_name, "Deleted queue");
        Ok(())
    }

    // === Messages ===

    pub fn send_message(
        &self,
        caller: &CallerContext,
        request: &SendMessageRequest,
    ) -> Result<SendMessageResult, SqsError> {
        let limits = self.limits.snapshot();
        let queue = self.resolve_owned_queue(caller, &request.queue_url)?;
        let message = prepare_message(caller, &queue, &request.message, &limits)?;
        let result = SendMessageResult::from(&message);

        self.messages.send_message(
            &queue.identity.account_id,
            &queue.identity.queue_name,
            message,
        )?;
        info!(queue = %queue.identity, message_id = %result.message_id, "Sent message");
        Ok(result)
    }

    /// Send up to ten messages. Batch shape and queue errors fail the whole
    /// call; every other failure is reported against its entry.
    pub fn send_message_batch(
        &self,
        caller: &CallerContext,
        request: &SendMessageBatchRequest,
    ) -> Result<SendMessageBatchResult, SqsError> {
        validate_batch_entry_ids(request.entries.iter().map(|entry| entry.id.as_str()))?;
        let limits = self.limits.snapshot();
        let queue = self.resolve_owned_queue(caller, &request.queue_url)?;

        let mut result = SendMessageBatchResult::default();
        for entry in &request.entries {
            let sent = prepare_message(caller, &queue, &entry.message, &limits).and_then(|message| {
                let sent = SendMessageResult::from(&message);
                self.messages.send_message(
                    &queue.identity.account_id,
                    &queue.identity.queue_name,
                    message,
                )?;
                Ok(sent)
            });

            match sent {
                Ok(sent) => result.successful.push(BatchResultEntry {
                    id: entry.id.clone(),
                    result: sent,
                }),
                Err(err) => {
                    debug!(id = %entry.id, error = %err, "Batch entry failed");
                    result.failed.push(BatchResultErrorEntry::new(&entry.id, &err));
                }
            }
        }

        info!(
            queue = %queue.identity,
            successful = result.successful.len(),
            failed = result.failed.len(),
            "Sent message batch"
        );
        Ok(result)
    }

    /// Receive visible messages. Internal bookkeeping attributes are removed
    /// before they are returned.
    pub fn receive_message(
        &self,
        caller: &CallerContext,
        request: &ReceiveMessageRequest,
    ) -> Result<Vec<Message>, SqsError> {
        let max = match request.max_number_of_messages {
            None => 1,
            Some(n) => usize::try_from(n)
                .ok()
                .filter(|n| (1..=MAX_RECEIVE_MESSAGES).contains(n))
                .ok_or_else(|| {
                    SqsError::InvalidParameterValue(format!(
                        "Value {n} for parameter MaxNumberOfMessages is invalid. \
                         Reason: must be between 1 and {MAX_RECEIVE_MESSAGES}, if provided."
                    ))
                })?,
        };
        let queue = self.resolve_owned_queue(caller, &request.queue_url)?;

        let mut messages = self.messages.receive_messages(
            &queue.identity.account_id,
            &queue.identity.queue_name,
            max,
        )?;
        for message in &mut messages {
            message.strip_internal_attributes();
        }
        debug!(queue = %queue.identity, count = messages.len(), "Received messages");
        Ok(messages)
    }

    pub fn delete_message(
        &self,
        caller: &CallerContext,
        queue_url: &str,
        receipt_handle: &str,
    ) -> Result<(), SqsError> {
        let queue = self.resolve_owned_queue(caller, queue_url)?;
        self.messages.delete_message(
            &queue.identity.account_id,
            &queue.identity.queue_name,
            receipt_handle,
        )?;
        Ok(())
    }

    // === Pipeline stages ===

    /// Resolve a queue URL, check the caller owns it and that it exists
    fn resolve_owned_queue(
        &self,
        caller: &CallerContext,
        queue_url: &str,
    ) -> Result<Queue, SqsError> {
        let identity = self.resolver.parse(queue_url)?;
        if identity.account_id != caller.account_id {
            return Err(SqsError::AccessDenied(format!(
                "Access to the resource {queue_url} is denied."
            )));
        }
        self.queues
            .lookup_queue(&identity.account_id, &identity.queue_name)?
            .ok_or_else(queue_does_not_exist)
    }

    /// Defaults merged with the supplied attributes, each validated
    fn queue_attributes(
        &self,
        caller: &CallerContext,
        supplied: &[(String, String)],
        limits: &Limits,
    ) -> Result<QueueAttributes, SqsError> {
        let mut attributes = QueueAttributes::default();

        for (name, value) in supplied {
            let attribute = parse_attribute_name(name)?;
            let (min, max) = match attribute {
                QueueAttributeName::DelaySeconds => (0, limits.max_delay_seconds),
                QueueAttributeName::MaximumMessageSize => (1024, limits.max_maximum_message_size),
                QueueAttributeName::MessageRetentionPeriod => {
                    (60, limits.max_message_retention_period)
                }
                QueueAttributeName::ReceiveMessageWaitTimeSeconds => {
                    (0, limits.max_receive_message_wait_time_seconds)
                }
                QueueAttributeName::VisibilityTimeout => (0, limits.max_visibility_timeout),
                QueueAttributeName::Policy | QueueAttributeName::RedrivePolicy
                    if value.is_empty() =>
                {
                    continue
                }
                QueueAttributeName::Policy => {
                    validate_policy(value).map_err(|err| {
                        debug!(error = %err, "Rejected queue policy");
                        SqsError::InvalidParameterValue(
                            "Invalid value for the parameter Policy.".to_string(),
                        )
                    })?;
                    attributes.set(attribute, value.as_str());
                    continue;
                }
                QueueAttributeName::RedrivePolicy => {
                    let policy = validate_redrive_policy(
                        value,
                        &caller.account_id,
                        &caller.region,
                        limits,
                        self.queues.as_ref(),
                    )?;
                    attributes.set(attribute, policy.to_document(&caller.region));
                    continue;
                }
                // Read-only attributes are accepted and ignored
                _ => continue,
            };

            check_number_range(name, value, min, max)?;
            attributes.set(attribute, value.as_str());
        }

        Ok(attributes)
    }
}

/// Validate, size-check and digest one outbound message, then attach the
/// bookkeeping attributes the store relies on.
fn prepare_message(
    caller: &CallerContext,
    queue: &Queue,
    outbound: &OutboundMessage,
    limits: &Limits,
) -> Result<Message, SqsError> {
    let max_delay = limits.max_delay_seconds;
    let delay_seconds = match outbound.delay_seconds.as_deref() {
        Some(text) => {
            let delay = text.trim().parse::<i64>().map_err(|_| {
                SqsError::InvalidParameterValue(format!(
                    "Value {text} for parameter DelaySeconds is invalid. Reason: must be an integer."
                ))
            })?;
            if !(0..=i64::from(max_delay)).contains(&delay) {
                return Err(SqsError::InvalidParameterValue(format!(
                    "DelaySeconds must be a number between 0 and {max_delay}"
                )));
            }
            delay
        }
        None => i64::from(queue.attributes.delay_seconds()),
    };

    let mut seen_names = HashSet::new();
    let mut message_attributes = BTreeMap::new();
    let mut message_len = 0usize;
    for attribute in &outbound.message_attributes {
        let encoded = validate_attribute(
            &attribute.name,
            attribute.value.as_ref(),
            &mut seen_names,
            limits,
        )?;
        message_len += encoded.encoded_len;
        message_attributes.insert(attribute.name.clone(), encoded.value);
    }

    let body = outbound
        .body
        .as_deref()
        .filter(|body| !body.is_empty())
        .ok_or_else(|| {
            SqsError::MissingParameter("The request must contain the parameter MessageBody.".to_string())
        })?;
    if let Some(c) = first_invalid_body_char(body) {
        return Err(SqsError::InvalidParameterValue(format!(
            "Invalid binary character '{}' was found in the message body, \
             the set of allowed characters is {ALLOWED_BODY_CHARACTERS}",
            code_point_hex(c)
        )));
    }
    message_len += body.len();

    let max_size = queue.attributes.maximum_message_size();
    if message_len > max_size as usize {
        return Err(SqsError::InvalidParameterValue(format!(
            "The message exceeds the maximum message length of the queue, which is {max_size} bytes"
        )));
    }

    let md5_of_message_attributes =
        (!message_attributes.is_empty()).then(|| digest_attributes(&message_attributes));
    let mut message = Message {
        message_id: Uuid::new_v4().to_string(),
        receipt_handle: None,
        body: body.to_string(),
        md5_of_body: digest_body(body),
        md5_of_message_attributes,
        message_attributes,
        attributes: BTreeMap::new(),
    };

    message.set_system_attribute(SystemAttribute::ApproximateReceiveCount, 0);
    message.set_system_attribute(SystemAttribute::SenderId, &caller.account_id);
    message.set_system_attribute(SystemAttribute::SentTimestamp, Utc::now().timestamp_millis());
    message.set_internal_attribute(InternalAttribute::LocalReceiveCount, 0);
    message.set_internal_attribute(InternalAttribute::DelaySeconds, delay_seconds);
    message.set_internal_attribute(
        InternalAttribute::MessageRetentionPeriod,
        i64::from(queue.attributes.message_retention_period()),
    );
    Ok(message)
}

fn validate_queue_name<'a>(name: Option<&'a str>, limits: &Limits) -> Result<&'a str, SqsError> {
    let name = name.ok_or_else(|| {
        SqsError::MissingParameter("The request must contain the parameter QueueName.".to_string())
    })?;
    if name.is_empty() {
        return Err(SqsError::InvalidParameterValue(
            "Queue name cannot be empty.".to_string(),
        ));
    }
    let max = limits.max_queue_name_length;
    if !is_valid_queue_name(name, max as usize) {
        return Err(SqsError::InvalidParameterValue(format!(
            "Queue name can only include alphanumeric characters, hyphens, or underscores. \
             1 to {max} in length"
        )));
    }
    Ok(name)
}

fn parse_attribute_name(name: &str) -> Result<QueueAttributeName, SqsError> {
    name.parse().map_err(|()| {
        SqsError::InvalidParameterValue(format!(
            "Attribute.Name must be one of {}",
            QueueAttributeName::joined()
        ))
    })
}

fn check_number_range(name: &str, value: &str, min: u32, max: u32) -> Result<(), SqsError> {
    let parsed: i64 = value
        .parse()
        .map_err(|_| SqsError::InvalidParameterValue(format!("{name} must be a number")))?;
    if parsed < i64::from(min) || parsed > i64::from(max) {
        return Err(SqsError::InvalidParameterValue(format!(
            "{name} must be a number between {min} and {max}"
        )));
    }
    Ok(())
}

/// Batch shape checks that fail the whole call
fn validate_batch_entry_ids<'a>(ids: impl ExactSizeIterator<Item = &'a str>) -> Result<(), SqsError> {
    match ids.len() {
        0 => {
            return Err(SqsError::EmptyBatchRequest(
                "There should be at least one SendMessageBatchRequestEntry in the request."
                    .to_string(),
            ))
        }
        n if n > MAX_BATCH_ENTRIES => {
            return Err(SqsError::TooManyEntriesInBatchRequest(format!(
                "Maximum number of entries per request are {MAX_BATCH_ENTRIES}. You have sent {n}."
            )))
        }
        _ => {}
    }

    let mut seen = HashSet::new();
    for id in ids {
        if !is_valid_batch_entry_id(id) {
            return Err(SqsError::InvalidBatchEntryId(
                "A batch entry id can only contain alphanumeric characters, hyphens and \
                 underscores. It can be at most 80 letters long."
                    .to_string(),
            ));
        }
        if !seen.insert(id) {
            return Err(SqsError::BatchEntryIdsNotDistinct(format!("Id {id} repeated.")));
        }
    }
    Ok(())
}

fn queue_does_not_exist() -> SqsError {
    SqsError::QueueDoesNotExist("The specified queue does not exist.".to_string())
}
