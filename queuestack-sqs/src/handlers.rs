//! HTTP handlers for the SQS query protocol
//!
//! Requests arrive as form-encoded `Action=...` parameters, in the body or
//! the query string. List-valued inputs use the numbered form, e.g.
//! `Attribute.1.Name` / `Attribute.1.Value`.

use axum::{
    extract::State,
    http::{header, StatusCode, Uri},
    response::{IntoResponse, Response},
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use bytes::Bytes;
use percent_encoding::percent_decode;
use queuestack_core::{escape_xml, RequestId};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{info, warn};

use crate::attributes::{AttributeValue, AttributeValueInput, MessageAttributeInput};
use crate::error::SqsError;
use crate::message::Message;
use crate::service::{
    CallerContext, CreateQueueRequest, OutboundMessage, ReceiveMessageRequest,
    SendMessageBatchEntry, SendMessageBatchRequest, SendMessageRequest, SqsService,
};

const XMLNS: &str = "http://queue.amazonaws.com/doc/2012-11-05/";

/// State for SQS handlers
pub struct SqsState {
    pub service: SqsService,
    /// Identity every request is served as
    pub caller: CallerContext,
}

impl SqsState {
    pub fn new(service: SqsService, caller: CallerContext) -> Self {
        Self { service, caller }
    }
}

/// Handle SQS requests based on the `Action` parameter
pub async fn handle_request(
    State(state): State<Arc<SqsState>>,
    uri: Uri,
    body: Bytes,
) -> Response {
    let request_id = RequestId::new();
    let params = match Params::parse(uri.query(), &body, uri.path()) {
        Ok(params) => params,
        Err(err) => return error_response(&err, state.caller.privileged, &request_id),
    };
    let action = params.get("Action").unwrap_or_default().to_string();

    info!(action = %action, request_id = %request_id, "SQS request");

    let result = match action.as_str() {
        "CreateQueue" => create_queue(&state, &params),
        "GetQueueUrl" => get_queue_url(&state, &params),
        "ListQueues" => list_queues(&state, &params),
        "GetQueueAttributes" => get_queue_attributes(&state, &params),
        "SendMessage" => send_message(&state, &params),
        "SendMessageBatch" => send_message_batch(&state, &params),
        "ReceiveMessage" => receive_message(&state, &params),
        "DeleteMessage" => delete_message(&state, &params),
        "PurgeQueue" => purge_queue(&state, &params),
        "DeleteQueue" => delete_queue(&state, &params),
        _ => {
            warn!(action = %action, "Unknown SQS operation");
            Err(SqsError::InvalidAction(format!(
                "The action {action} is not valid for this web service."
            )))
        }
    };

    match result {
        Ok(result) => xml_response(StatusCode::OK, &success_xml(&action, &result, &request_id)),
        Err(err) => error_response(&err, state.caller.privileged, &request_id),
    }
}

// === Request parameters ===

/// Flattened request parameters; body values win over the query string
struct Params {
    values: HashMap<String, String>,
    /// Request path, used as the queue URL when none is given
    path: String,
}

impl Params {
    fn parse(query: Option<&str>, body: &[u8], path: &str) -> Result<Self, SqsError> {
        let query = query.unwrap_or_default().as_bytes();
        check_utf8(query)?;
        check_utf8(body)?;

        let values = form_urlencoded::parse(query)
            .chain(form_urlencoded::parse(body))
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        Ok(Self {
            values,
            path: path.to_string(),
        })
    }

    fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    fn required(&self, name: &str) -> Result<&str, SqsError> {
        self.get(name)
            .filter(|value| !value.is_empty())
            .ok_or_else(|| {
                SqsError::MissingParameter(format!("The request must contain the parameter {name}."))
            })
    }

    fn optional_int(&self, name: &str) -> Result<Option<i64>, SqsError> {
        self.get(name)
            .map(|value| {
                value.trim().parse().map_err(|_| {
                    SqsError::InvalidParameterValue(format!(
                        "Value {value} for parameter {name} is invalid. Reason: must be an integer."
                    ))
                })
            })
            .transpose()
    }

    /// `QueueUrl`, falling back to the request path
    fn queue_url(&self) -> Result<String, SqsError> {
        match self.get("QueueUrl").filter(|url| !url.is_empty()) {
            Some(url) => Ok(url.to_string()),
            None if self.path != "/" && !self.path.is_empty() => Ok(self.path.clone()),
            None => self.required("QueueUrl").map(str::to_string),
        }
    }

    /// Sorted indices `n` of every `{prefix}.{n}` or `{prefix}.{n}.*` key
    fn indices(&self, prefix: &str) -> Vec<u32> {
        let prefix = format!("{prefix}.");
        self.values
            .keys()
            .filter_map(|key| key.strip_prefix(&prefix))
            .filter_map(|rest| rest.split('.').next()?.parse().ok())
            .collect::<BTreeSet<u32>>()
            .into_iter()
            .collect()
    }

    /// Values of `{prefix}.1`, `{prefix}.2`, ... in index order
    fn list(&self, prefix: &str) -> Vec<String> {
        self.indices(prefix)
            .into_iter()
            .filter_map(|n| self.get(&format!("{prefix}.{n}")).map(str::to_string))
            .collect()
    }

    fn message_attributes(&self, prefix: &str) -> Vec<MessageAttributeInput> {
        self.indices(prefix)
            .into_iter()
            .map(|n| {
                let base = format!("{prefix}.{n}");
                let value_prefix = format!("{base}.Value.");
                let has_value = self.values.keys().any(|key| key.starts_with(&value_prefix));
                MessageAttributeInput {
                    name: self.get(&format!("{base}.Name")).unwrap_or_default().to_string(),
                    value: has_value.then(|| AttributeValueInput {
                        data_type: self
                            .get(&format!("{base}.Value.DataType"))
                            .unwrap_or_default()
                            .to_string(),
                        string_value: self.get(&format!("{base}.Value.StringValue")).map(str::to_string),
                        binary_value: self.get(&format!("{base}.Value.BinaryValue")).map(str::to_string),
                        string_list_values: self.list(&format!("{base}.Value.StringListValue")),
                        binary_list_values: self.list(&format!("{base}.Value.BinaryListValue")),
                    }),
                }
            })
            .collect()
    }

    fn outbound_message(&self, prefix: &str) -> OutboundMessage {
        OutboundMessage {
            body: self.get(&format!("{prefix}MessageBody")).map(str::to_string),
            delay_seconds: self.get(&format!("{prefix}DelaySeconds")).map(str::to_string),
            message_attributes: self.message_attributes(&format!("{prefix}MessageAttribute")),
        }
    }
}

/// Reject form pairs whose decoded bytes are not UTF-8. `form_urlencoded`
/// would replace them with U+FFFD.
fn check_utf8(input: &[u8]) -> Result<(), SqsError> {
    for pair in input.split(|&b| b == b'&') {
        let unplussed: Vec<u8> = pair
            .iter()
            .map(|&b| if b == b'+' { b' ' } else { b })
            .collect();
        if percent_decode(&unplussed).decode_utf8().is_err() {
            let name = pair.split(|&b| b == b'=').next().unwrap_or_default();
            let name: Vec<u8> = percent_decode(name).collect();
            return Err(SqsError::InvalidParameterValue(format!(
                "Value for parameter {} is not valid UTF-8.",
                String::from_utf8_lossy(&name)
            )));
        }
    }
    Ok(())
}

// === Actions ===

fn create_queue(state: &SqsState, params: &Params) -> Result<String, SqsError> {
    let attributes = params
        .indices("Attribute")
        .into_iter()
        .map(|n| {
            let field = |suffix: &str| {
                params
                    .get(&format!("Attribute.{n}.{suffix}"))
                    .unwrap_or_default()
                    .to_string()
            };
            (field("Name"), field("Value"))
        })
        .collect();
    let request = CreateQueueRequest {
        queue_name: params.get("QueueName").map(str::to_string),
        attributes,
    };

    let queue_url = state.service.create_queue(&state.caller, &request)?;
    Ok(format!("<QueueUrl>{}</QueueUrl>", escape_xml(&queue_url)))
}

fn get_queue_url(state: &SqsState, params: &Params) -> Result<String, SqsError> {
    let queue_url = state
        .service
        .get_queue_url(&state.caller, params.get("QueueName"))?;
    Ok(format!("<QueueUrl>{}</QueueUrl>", escape_xml(&queue_url)))
}

fn list_queues(state: &SqsState, params: &Params) -> Result<String, SqsError> {
    let urls = state
        .service
        .list_queues(&state.caller, params.get("QueueNamePrefix"))?;
    Ok(urls
        .iter()
        .map(|url| format!("<QueueUrl>{}</QueueUrl>", escape_xml(url)))
        .collect())
}

fn get_queue_attributes(state: &SqsState, params: &Params) -> Result<String, SqsError> {
    let queue_url = params.queue_url()?;
    let mut names = params.list("AttributeName");
    if let Some(name) = params.get("AttributeName") {
        names.push(name.to_string());
    }

    let attributes = state
        .service
        .get_queue_attributes(&state.caller, &queue_url, &names)?;
    Ok(attributes
        .iter()
        .map(|(name, value)| {
            format!(
                "<Attribute><Name>{name}</Name><Value>{}</Value></Attribute>",
                escape_xml(value)
            )
        })
        .collect())
}

fn send_message(state: &SqsState, params: &Params) -> Result<String, SqsError> {
    let request = SendMessageRequest {
        queue_url: params.queue_url()?,
        message: params.outbound_message(""),
    };

    let result = state.service.send_message(&state.caller, &request)?;
    let mut xml = format!(
        "<MessageId>{}</MessageId><MD5OfMessageBody>{}</MD5OfMessageBody>",
        result.message_id, result.md5_of_message_body
    );
    if let Some(md5) = &result.md5_of_message_attributes {
        xml.push_str(&format!("<MD5OfMessageAttributes>{md5}</MD5OfMessageAttributes>"));
    }
    Ok(xml)
}

fn send_message_batch(state: &SqsState, params: &Params) -> Result<String, SqsError> {
    let queue_url = params.queue_url()?;
    let entries = params
        .indices("SendMessageBatchRequestEntry")
        .into_iter()
        .map(|n| {
            let prefix = format!("SendMessageBatchRequestEntry.{n}.");
            SendMessageBatchEntry {
                id: params.get(&format!("{prefix}Id")).unwrap_or_default().to_string(),
                message: params.outbound_message(&prefix),
            }
        })
        .collect();

    let result = state.service.send_message_batch(
        &state.caller,
        &SendMessageBatchRequest { queue_url, entries },
    )?;

    let mut xml = String::new();
    for entry in &result.successful {
        xml.push_str(&format!(
            "<SendMessageBatchResultEntry><Id>{}</Id><MessageId>{}</MessageId><MD5OfMessageBody>{}</MD5OfMessageBody>",
            escape_xml(&entry.id),
            entry.result.message_id,
            entry.result.md5_of_message_body
        ));
        if let Some(md5) = &entry.result.md5_of_message_attributes {
            xml.push_str(&format!("<MD5OfMessageAttributes>{md5}</MD5OfMessageAttributes>"));
        }
        xml.push_str("</SendMessageBatchResultEntry>");
    }
    for entry in &result.failed {
        xml.push_str(&format!(
            "<BatchResultErrorEntry><Id>{}</Id><SenderFault>{}</SenderFault><Code>{}</Code><Message>{}</Message></BatchResultErrorEntry>",
            escape_xml(&entry.id),
            entry.sender_fault,
            entry.code.as_str(),
            escape_xml(&entry.message)
        ));
    }
    Ok(xml)
}

fn receive_message(state: &SqsState, params: &Params) -> Result<String, SqsError> {
    let request = ReceiveMessageRequest {
        queue_url: params.queue_url()?,
        max_number_of_messages: params.optional_int("MaxNumberOfMessages")?,
    };

    let messages = state.service.receive_message(&state.caller, &request)?;
    Ok(messages.iter().map(message_xml).collect())
}

fn delete_message(state: &SqsState, params: &Params) -> Result<String, SqsError> {
    let queue_url = params.queue_url()?;
    let receipt_handle = params.required("ReceiptHandle")?;
    state
        .service
        .delete_message(&state.caller, &queue_url, receipt_handle)?;
    Ok(String::new())
}

fn purge_queue(state: &SqsState, params: &Params) -> Result<String, SqsError> {
    let queue_url = params.queue_url()?;
    state.service.purge_queue(&state.caller, &queue_url)?;
    Ok(String::new())
}

fn delete_queue(state: &SqsState, params: &Params) -> Result<String, SqsError> {
    let queue_url = params.queue_url()?;
    state.service.delete_queue(&state.caller, &queue_url)?;
    Ok(String::new())
}

// === Response helpers ===

fn message_xml(message: &Message) -> String {
    let mut xml = format!(
        "<Message><MessageId>{}</MessageId><ReceiptHandle>{}</ReceiptHandle><MD5OfBody>{}</MD5OfBody><Body>{}</Body>",
        message.message_id,
        escape_xml(message.receipt_handle.as_deref().unwrap_or_default()),
        message.md5_of_body,
        escape_xml(&message.body)
    );

    for (name, value) in &message.attributes {
        xml.push_str(&format!(
            "<Attribute><Name>{name}</Name><Value>{}</Value></Attribute>",
            escape_xml(value)
        ));
    }
    if let Some(md5) = &message.md5_of_message_attributes {
        xml.push_str(&format!("<MD5OfMessageAttributes>{md5}</MD5OfMessageAttributes>"));
    }
    for (name, attribute) in &message.message_attributes {
        let value = match &attribute.value {
            AttributeValue::String(s) => format!("<StringValue>{}</StringValue>", escape_xml(s)),
            AttributeValue::Binary(b) => format!("<BinaryValue>{}</BinaryValue>", STANDARD.encode(b)),
            AttributeValue::StringList(values) => values
                .iter()
                .map(|s| format!("<StringListValue>{}</StringListValue>", escape_xml(s)))
                .collect(),
            AttributeValue::BinaryList(values) => values
                .iter()
                .map(|b| format!("<BinaryListValue>{}</BinaryListValue>", STANDARD.encode(b)))
                .collect(),
        };
        xml.push_str(&format!(
            "<MessageAttribute><Name>{}</Name><Value><DataType>{}</DataType>{value}</Value></MessageAttribute>",
            escape_xml(name),
            escape_xml(&attribute.data_type)
        ));
    }

    xml.push_str("</Message>");
    xml
}

fn success_xml(action: &str, result: &str, request_id: &RequestId) -> String {
    let result = if result.is_empty() {
        String::new()
    } else {
        format!("\n  <{action}Result>{result}</{action}Result>")
    };
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<{action}Response xmlns="{XMLNS}">{result}
  <ResponseMetadata>
    <RequestId>{request_id}</RequestId>
  </ResponseMetadata>
</{action}Response>"#
    )
}

fn xml_response(status: StatusCode, body: &str) -> Response {
    (
        status,
        [(header::CONTENT_TYPE, "text/xml; charset=utf-8")],
        body.to_string(),
    )
        .into_response()
}

fn error_response(err: &SqsError, privileged: bool, request_id: &RequestId) -> Response {
    if err.is_sender_fault() {
        warn!(code = %err.code().as_str(), error = %err, "SQS request rejected");
    }
    let error = err
        .to_aws_error(privileged)
        .with_request_id(request_id.as_str());
    let status = StatusCode::from_u16(error.code.http_status()).unwrap_or(StatusCode::BAD_REQUEST);
    xml_response(status, &error.to_xml())
}
