//! Syntax check for queue access policy documents

use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PolicyError {
    #[error("policy is not valid JSON")]
    NotJson,
    #[error("policy must be a JSON object")]
    NotAnObject,
    #[error("policy has no Statement")]
    MissingStatement,
    #[error("statement {0}: {1}")]
    InvalidStatement(usize, &'static str),
}

/// Parse a policy document and check its statement structure
pub fn validate_policy(document: &str) -> Result<(), PolicyError> {
    let policy: Value = serde_json::from_str(document).map_err(|_| PolicyError::NotJson)?;
    let policy = policy.as_object().ok_or(PolicyError::NotAnObject)?;

    let statements = match policy.get("Statement") {
        Some(Value::Array(items)) if !items.is_empty() => items.iter().collect::<Vec<_>>(),
        Some(single @ Value::Object(_)) => vec![single],
        _ => return Err(PolicyError::MissingStatement),
    };

    for (index, statement) in statements.into_iter().enumerate() {
        validate_statement(statement).map_err(|reason| PolicyError::InvalidStatement(index, reason))?;
    }
    Ok(())
}

fn validate_statement(statement: &Value) -> Result<(), &'static str> {
    let statement = statement.as_object().ok_or("must be an object")?;

    match statement.get("Effect").and_then(Value::as_str) {
        Some("Allow" | "Deny") => {}
        _ => return Err("Effect must be Allow or Deny"),
    }

    match (statement.get("Action"), statement.get("NotAction")) {
        (Some(actions), None) | (None, Some(actions)) if is_string_or_strings(actions) => {}
        _ => return Err("exactly one of Action or NotAction is required"),
    }

    for key in ["Resource", "NotResource"] {
        if let Some(resources) = statement.get(key) {
            if !is_string_or_strings(resources) {
                return Err("Resource must be a string or list of strings");
            }
        }
    }
    Ok(())
}

fn is_string_or_strings(value: &Value) -> bool {
    match value {
        Value::String(_) => true,
        Value::Array(items) => !items.is_empty() && items.iter().all(Value::is_string),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_policy() {
        let policy = r#"{
            "Version": "2012-10-17",
            "Statement": [{
                "Effect": "Allow",
                "Principal": {"AWS": "123456789012"},
                "Action": ["sqs:SendMessage", "sqs:ReceiveMessage"],
                "Resource": "arn:aws:sqs:us-east-1:123456789012:orders"
            }]
        }"#;
        assert_eq!(validate_policy(policy), Ok(()));
    }

    #[test]
    fn test_single_statement_object() {
        let policy = r#"{"Statement": {"Effect": "Deny", "NotAction": "sqs:DeleteQueue"}}"#;
        assert_eq!(validate_policy(policy), Ok(()));
    }

    #[test]
    fn test_invalid_policies() {
        assert_eq!(validate_policy("not json"), Err(PolicyError::NotJson));
        assert_eq!(validate_policy("[]"), Err(PolicyError::NotAnObject));
        assert_eq!(validate_policy(r#"{"Statement": []}"#), Err(PolicyError::MissingStatement));
        assert!(matches!(
            validate_policy(r#"{"Statement": [{"Effect": "Maybe", "Action": "sqs:*"}]}"#),
            Err(PolicyError::InvalidStatement(0, _))
        ));
        assert!(matches!(
            validate_policy(r#"{"Statement": [{"Effect": "Allow", "Action": "a", "NotAction": "b"}]}"#),
            Err(PolicyError::InvalidStatement(0, _))
        ));
        assert!(matches!(
            validate_policy(r#"{"Statement": [{"Effect": "Allow", "Action": "a", "Resource": 5}]}"#),
            Err(PolicyError::InvalidStatement(0, _))
        ));
    }
}
