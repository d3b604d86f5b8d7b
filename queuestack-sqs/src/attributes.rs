//! Message attribute validation and encoding
//!
//! A caller supplies attributes as loosely typed [`AttributeValueInput`]s.
//! [`validate_attribute`] checks the name and value, decodes binary
//! payloads and returns the typed [`MessageAttributeValue`] together with the
//! number of bytes the attribute adds to the message size.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::charset::{
    code_point_hex, first_invalid_attribute_name_char, first_invalid_body_char,
    ALLOWED_BODY_CHARACTERS,
};
use crate::error::SqsError;
use crate::limits::Limits;

/// Base kind of a message attribute data type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeKind {
    String,
    Binary,
    Number,
}

impl AttributeKind {
    const ALL: [AttributeKind; 3] = [Self::String, Self::Binary, Self::Number];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "String",
            Self::Binary => "Binary",
            Self::Number => "Number",
        }
    }

    /// Kind named by a data type, which is either the bare kind or
    /// `<Kind>.<custom>` (e.g. `Number.float`)
    pub fn from_data_type(data_type: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| {
            data_type
                .strip_prefix(kind.as_str())
                .is_some_and(|rest| rest.is_empty() || rest.starts_with('.'))
        })
    }

    /// Whether the scalar travels in the `StringValue` field
    fn uses_string_field(self) -> bool {
        match self {
            Self::String | Self::Number => true,
            Self::Binary => false,
        }
    }
}

/// Attribute value exactly as received; binary fields are still base64 text
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeValueInput {
    pub data_type: String,
    pub string_value: Option<String>,
    pub binary_value: Option<String>,
    #[serde(default)]
    pub string_list_values: Vec<String>,
    #[serde(default)]
    pub binary_list_values: Vec<String>,
}

impl AttributeValueInput {
    pub fn string(data_type: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            data_type: data_type.into(),
            string_value: Some(value.into()),
            ..Self::default()
        }
    }

    pub fn binary(data_type: impl Into<String>, value: &[u8]) -> Self {
        Self {
            data_type: data_type.into(),
            binary_value: Some(STANDARD.encode(value)),
            ..Self::default()
        }
    }
}

/// A named attribute as received
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageAttributeInput {
    pub name: String,
    pub value: Option<AttributeValueInput>,
}

impl MessageAttributeInput {
    pub fn new(name: impl Into<String>, value: AttributeValueInput) -> Self {
        Self {
            name: name.into(),
            value: Some(value),
        }
    }
}

/// Decoded attribute payload
///
/// The list variants are part of the canonical digest format; the codec does
/// not accept them from callers yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeValue {
    String(String),
    Binary(Vec<u8>),
    StringList(Vec<String>),
    BinaryList(Vec<Vec<u8>>),
}

impl AttributeValue {
    /// Transport type tag used by the attribute digest
    pub fn transport_tag(&self) -> u8 {
        match self {
            Self::String(_) => 1,
            Self::Binary(_) => 2,
            Self::StringList(_) => 3,
            Self::BinaryList(_) => 4,
        }
    }
}

/// Validated, typed message attribute value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageAttributeValue {
    pub data_type: String,
    pub value: AttributeValue,
}

/// Outcome of validating one attribute
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedAttribute {
    pub value: MessageAttributeValue,
    /// Bytes counted against the queue's `MaximumMessageSize`
    pub encoded_len: usize,
}

/// Validate one attribute, recording its name in `seen_names`.
///
/// The encoded length is the UTF-8 length of the name, the data type and
/// the value (decoded bytes for binary values).
pub fn validate_attribute(
    name: &str,
    value: Option<&AttributeValueInput>,
    seen_names: &mut HashSet<String>,
    limits: &Limits,
) -> Result<EncodedAttribute, SqsError> {
    let name_len = validate_attribute_name(name, seen_names, limits)?;
    let (value, value_len) = validate_attribute_value(name, value, limits)?;
    Ok(EncodedAttribute {
        value,
        encoded_len: name_len + value_len,
    })
}

/// Returns the UTF-8 length of the name
pub fn validate_attribute_name(
    name: &str,
    seen_names: &mut HashSet<String>,
    limits: &Limits,
) -> Result<usize, SqsError> {
    if name.is_empty() {
        return Err(invalid("Message attribute name can not be null or empty"));
    }
    let max = limits.max_message_attribute_name_length as usize;
    if name.chars().count() > max {
        return Err(invalid(format!(
            "Message attribute name can not be longer than {max} characters"
        )));
    }
    let lower = name.to_lowercase();
    if lower.starts_with("amazon") || lower.starts_with("aws") {
        return Err(invalid(
            "Message attribute names starting with 'AWS.' or 'Amazon.' are reserved for use by Amazon.",
        ));
    }
    if name.contains("..") {
        return Err(invalid(
            "Message attribute name can not have successive '.' characters.",
        ));
    }
    if let Some(c) = first_invalid_attribute_name_char(name) {
        return Err(invalid(format!(
            "Invalid non-alphanumeric character '{}' was found in the message attribute name. \
             Can only include alphanumeric characters, hyphens, underscores, or dots.",
            code_point_hex(c)
        )));
    }
    if !seen_names.insert(name.to_string()) {
        return Err(invalid(format!(
            "Message attribute name '{name}' already exists."
        )));
    }
    Ok(name.len())
}

/// Returns the typed value and the UTF-8 length of data type plus value
pub fn validate_attribute_value(
    name: &str,
    value: Option<&AttributeValueInput>,
    limits: &Limits,
) -> Result<(MessageAttributeValue, usize), SqsError> {
    let value = value.ok_or_else(|| {
        invalid(format!(
            "The message attribute '{name}' must contain non-empty message attribute value."
        ))
    })?;

    let data_type = value.data_type.as_str();
    if data_type.is_empty() {
        return Err(invalid(format!(
            "The message attribute '{name}' must contain non-empty message attribute type."
        )));
    }
    let kind = AttributeKind::from_data_type(data_type).ok_or_else(|| {
        invalid(format!(
            "The message attribute '{name}' has an invalid message attribute type, \
             the set of supported type prefixes is Binary, Number, and String."
        ))
    })?;
    let max_type_len = limits.max_message_attribute_type_length as usize;
    if data_type.len() > max_type_len {
        return Err(invalid(format!(
            "Message attribute type can not be longer than {max_type_len} bytes"
        )));
    }

    if !value.binary_list_values.is_empty() || !value.string_list_values.is_empty() {
        return Err(SqsError::UnsupportedOperation(
            "Message attribute list values are not supported.".to_string(),
        ));
    }

    let binary = match value.binary_value.as_deref() {
        Some(encoded) => Some(STANDARD.decode(encoded).map_err(|_| {
            invalid(format!(
                "The message attribute '{name}' contains an invalid Base64 Encoded String as a binary value"
            ))
        })?),
        None => None,
    };
    let string = value.string_value.as_deref().filter(|s| !s.is_empty());
    let binary = binary.filter(|b| !b.is_empty());

    match (string.is_some(), binary.is_some()) {
        (false, false) => {
            return Err(invalid(format!(
                "The message attribute '{name}' must contain non-empty message attribute value \
                 for message attribute type '{data_type}'."
            )))
        }
        (true, true) => {
            return Err(invalid(format!(
                "Message attribute '{name}' has multiple values."
            )))
        }
        _ => {}
    }

    let typed = if kind.uses_string_field() {
        let string = string.ok_or_else(|| {
            invalid(format!(
                "The message attribute '{name}' with type '{}' must use field 'String'.",
                kind.as_str()
            ))
        })?;
        if let Some(c) = first_invalid_body_char(string) {
            return Err(invalid(format!(
                "Invalid binary character '{}' was found in the message attribute '{name}' value, \
                 the set of allowed characters is {ALLOWED_BODY_CHARACTERS}",
                code_point_hex(c)
            )));
        }
        if kind == AttributeKind::Number && !is_decimal_number(string) {
            return Err(invalid(format!(
                "Could not cast message attribute '{name}' value to number."
            )));
        }
        AttributeValue::String(string.to_string())
    } else {
        let binary = binary.ok_or_else(|| {
            invalid(format!(
                "The message attribute '{name}' with type 'Binary' must use field 'Binary'."
            ))
        })?;
        AttributeValue::Binary(binary)
    };

    let value_len = match &typed {
        AttributeValue::String(s) => s.len(),
        AttributeValue::Binary(b) => b.len(),
        AttributeValue::StringList(_) | AttributeValue::BinaryList(_) => 0,
    };

    Ok((
        MessageAttributeValue {
            data_type: data_type.to_string(),
            value: typed,
        },
        data_type.len() + value_len,
    ))
}

/// Finite base-10 floating point literal
fn is_decimal_number(s: &str) -> bool {
    s.bytes()
        .all(|b| b.is_ascii_digit() || matches!(b, b'+' | b'-' | b'.' | b'e' | b'E'))
        && s.parse::<f64>().is_ok_and(f64::is_finite)
}

fn invalid(message: impl Into<String>) -> SqsError {
    SqsError::InvalidParameterValue(message.into())
}
