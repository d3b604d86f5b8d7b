//! Character-set and grammar predicates
//!
//! Pure checks over code points and string shapes. Callers turn a failed
//! check into an `InvalidParameterValue` naming the offending character.

/// Human-readable form of [`is_valid_body_code_point`], used in error messages
pub const ALLOWED_BODY_CHARACTERS: &str =
    "#x9 | #xA | #xD | [#x20-#xD7FF] | [#xE000-#xFFFD] | [#x10000-#x10FFFF]";

/// Characters allowed in message bodies and string attribute values
pub fn is_valid_body_code_point(cp: u32) -> bool {
    matches!(
        cp,
        0x9 | 0xA | 0xD | 0x20..=0xD7FF | 0xE000..=0xFFFD | 0x10000..=0x10FFFF
    )
}

/// Characters allowed in message attribute names: alphanumerics, `-`, `.` and `_`
pub fn is_valid_attribute_name_code_point(cp: u32) -> bool {
    matches!(
        char::from_u32(cp),
        Some('-' | '.' | '_' | '0'..='9' | 'A'..='Z' | 'a'..='z')
    )
}

/// `^[A-Za-z0-9_-]{1,max_len}$`
pub fn is_valid_queue_name(name: &str, max_len: usize) -> bool {
    !name.is_empty() && name.len() <= max_len && name.bytes().all(is_queue_name_byte)
}

/// Batch entry ids share the queue name alphabet and are capped at 80 characters
pub fn is_valid_batch_entry_id(id: &str) -> bool {
    is_valid_queue_name(id, 80)
}

/// First character of `text` outside the body alphabet
pub fn first_invalid_body_char(text: &str) -> Option<char> {
    text.chars().find(|c| !is_valid_body_code_point(u32::from(*c)))
}

/// First character of `name` outside the attribute name alphabet
pub fn first_invalid_attribute_name_char(name: &str) -> Option<char> {
    name.chars()
        .find(|c| !is_valid_attribute_name_code_point(u32::from(*c)))
}

/// Format a character the way SQS error messages do, e.g. `#x1f`
pub fn code_point_hex(c: char) -> String {
    format!("#x{:x}", u32::from(c))
}

fn is_queue_name_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'-' || b == b'_'
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_body_code_points() {
        for cp in [0x9, 0xA, 0xD, 0x20, 0xD7FF, 0xE000, 0xFFFD, 0x10000, 0x10FFFF] {
            assert!(is_valid_body_code_point(cp), "{cp:#x} should be allowed");
        }
        for cp in [0x0, 0x8, 0xB, 0x1F, 0xD800, 0xDFFF, 0xFFFE, 0xFFFF, 0x110000] {
            assert!(!is_valid_body_code_point(cp), "{cp:#x} should be rejected");
        }
    }

    #[test]
    fn test_attribute_name_code_points() {
        for c in ['-', '.', '_', '0', '9', 'A', 'Z', 'a', 'z'] {
            assert!(is_valid_attribute_name_code_point(u32::from(c)));
        }
        for c in [' ', '/', ':', '@', '[', '`', '{', 'é'] {
            assert!(!is_valid_attribute_name_code_point(u32::from(c)));
        }
    }

    #[test]
    fn test_queue_names() {
        assert!(is_valid_queue_name("orders", 80));
        assert!(is_valid_queue_name("Orders_dead-letter-01", 80));
        assert!(is_valid_queue_name(&"q".repeat(80), 80));
        assert!(!is_valid_queue_name(&"q".repeat(81), 80));
        assert!(!is_valid_queue_name("", 80));
        assert!(!is_valid_queue_name("orders.fifo", 80));
        assert!(!is_valid_queue_name("ördérs", 80));
    }

    #[test]
    fn test_first_invalid_chars() {
        assert_eq!(first_invalid_body_char("hello\tworld\n"), None);
        assert_eq!(first_invalid_body_char("bell\u{7}"), Some('\u{7}'));
        assert_eq!(first_invalid_body_char("\u{FFFF}"), Some('\u{FFFF}'));
        assert_eq!(first_invalid_attribute_name_char("a.b-c_d"), None);
        assert_eq!(first_invalid_attribute_name_char("a b"), Some(' '));
        assert_eq!(code_point_hex('\u{1f}'), "#x1f");
    }
}
