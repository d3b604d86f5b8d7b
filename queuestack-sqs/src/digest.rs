//! Canonical message digests
//!
//! These must match what AWS SDKs compute client-side to verify
//! `MD5OfMessageBody` and `MD5OfMessageAttributes`.
//!
//! The attribute digest runs over, for each attribute in ordinal name order:
//! the length-prefixed name, the length-prefixed data type, a one byte
//! transport tag, then the length-prefixed value (or each list element,
//! length-prefixed, with no element count). Lengths are 4-byte big-endian.

use md5::{Digest, Md5};
use std::collections::BTreeMap;
use tracing::trace;

use crate::attributes::{AttributeValue, MessageAttributeValue};

/// Lowercase hex MD5 of the UTF-8 body
pub fn digest_body(body: &str) -> String {
    let digest = hex::encode(Md5::digest(body.as_bytes()));
    trace!(md5 = %digest, "Digested message body");
    digest
}

/// Lowercase hex MD5 of the canonical attribute encoding.
///
/// `BTreeMap<String, _>` iterates in byte order, which is the ordering the
/// canonical form requires.
pub fn digest_attributes(attributes: &BTreeMap<String, MessageAttributeValue>) -> String {
    let mut hasher = Md5::new();

    for (name, attribute) in attributes {
        update_length_prefixed(&mut hasher, name.as_bytes());
        update_length_prefixed(&mut hasher, attribute.data_type.as_bytes());
        hasher.update([attribute.value.transport_tag()]);

        match &attribute.value {
            AttributeValue::String(value) => update_length_prefixed(&mut hasher, value.as_bytes()),
            AttributeValue::Binary(value) => update_length_prefixed(&mut hasher, value),
            AttributeValue::StringList(values) => {
                for value in values {
                    update_length_prefixed(&mut hasher, value.as_bytes());
                }
            }
            AttributeValue::BinaryList(values) => {
                for value in values {
                    update_length_prefixed(&mut hasher, value);
                }
            }
        }
    }

    let digest = hex::encode(hasher.finalize());
    trace!(md5 = %digest, count = attributes.len(), "Digested message attributes");
    digest
}

#[allow(clippy::cast_possible_truncation)]
fn update_length_prefixed(hasher: &mut Md5, bytes: &[u8]) {
    // Message size limits keep every field far below u32::MAX
    hasher.update((bytes.len() as u32).to_be_bytes());
    hasher.update(bytes);
}
