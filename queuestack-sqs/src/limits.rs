//! Tunable service limits
//!
//! The active [`Limits`] are an immutable snapshot published through a
//! [`LimitsHandle`]. Readers clone the `Arc` and keep a consistent view for
//! the whole request; updates are validated in full against a copy before
//! the copy replaces the published snapshot.

use parking_lot::RwLock;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LimitsError {
    #[error("Unknown limit: {0}")]
    UnknownKey(String),

    #[error("Invalid value {value} for {key}: {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },
}

/// One consistent set of service limits
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Limits {
    /// Maximum number of characters in a queue name
    pub max_queue_name_length: u32,
    pub max_delay_seconds: u32,
    /// Upper bound for a queue's `MaximumMessageSize`
    pub max_maximum_message_size: u32,
    pub max_message_retention_period: u32,
    pub max_receive_message_wait_time_seconds: u32,
    pub max_visibility_timeout: u32,
    /// Upper bound for `maxReceiveCount` in a redrive policy
    pub max_max_receive_count: u32,
    /// Characters
    pub max_message_attribute_name_length: u32,
    /// Bytes
    pub max_message_attribute_type_length: u32,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_queue_name_length: 80,
            max_delay_seconds: 900,
            max_maximum_message_size: 262_144,
            max_message_retention_period: 1_209_600,
            max_receive_message_wait_time_seconds: 20,
            max_visibility_timeout: 43_200,
            max_max_receive_count: 1000,
            max_message_attribute_name_length: 256,
            max_message_attribute_type_length: 256,
        }
    }
}

/// Constraint a limit value must satisfy
#[derive(Debug, Clone, Copy)]
enum Constraint {
    Positive,
    NonNegative,
    AtLeast(u32),
}

impl Constraint {
    fn parse(self, key: &str, value: &str) -> Result<u32, LimitsError> {
        let invalid = |reason: String| LimitsError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
            reason,
        };

        let parsed: u32 = value
            .trim()
            .parse()
            .map_err(|_| invalid("must be a non-negative integer".to_string()))?;

        match self {
            Self::NonNegative => Ok(parsed),
            Self::Positive if parsed == 0 => Err(invalid("must be positive".to_string())),
            Self::Positive => Ok(parsed),
            Self::AtLeast(min) if parsed < min => Err(invalid(format!("must be at least {min}"))),
            Self::AtLeast(_) => Ok(parsed),
        }
    }
}

/// A named, validated setter for one field of [`Limits`]
struct LimitKey {
    name: &'static str,
    constraint: Constraint,
    set: fn(&mut Limits, u32),
}

const LIMIT_KEYS: &[LimitKey] = &[
    LimitKey {
        name: "max_queue_name_length",
        constraint: Constraint::Positive,
        set: |l, v| l.max_queue_name_length = v,
    },
    LimitKey {
        name: "max_delay_seconds",
        constraint: Constraint::NonNegative,
        set: |l, v| l.max_delay_seconds = v,
    },
    LimitKey {
        name: "max_maximum_message_size",
        constraint: Constraint::AtLeast(1024),
        set: |l, v| l.max_maximum_message_size = v,
    },
    LimitKey {
        name: "max_message_retention_period",
        constraint: Constraint::AtLeast(60),
        set: |l, v| l.max_message_retention_period = v,
    },
    LimitKey {
        name: "max_receive_message_wait_time_seconds",
        constraint: Constraint::NonNegative,
        set: |l, v| l.max_receive_message_wait_time_seconds = v,
    },
    LimitKey {
        name: "max_visibility_timeout",
        constraint: Constraint::NonNegative,
        set: |l, v| l.max_visibility_timeout = v,
    },
    LimitKey {
        name: "max_max_receive_count",
        constraint: Constraint::Positive,
        set: |l, v| l.max_max_receive_count = v,
    },
    LimitKey {
        name: "max_message_attribute_name_length",
        constraint: Constraint::Positive,
        set: |l, v| l.max_message_attribute_name_length = v,
    },
    LimitKey {
        name: "max_message_attribute_type_length",
        constraint: Constraint::Positive,
        set: |l, v| l.max_message_attribute_type_length = v,
    },
];

impl Limits {
    /// Names accepted by [`LimitsHandle::apply`]
    pub fn keys() -> impl Iterator<Item = &'static str> {
        LIMIT_KEYS.iter().map(|k| k.name)
    }

    /// Apply a single named update to this (unpublished) copy
    fn set(&mut self, key: &str, value: &str) -> Result<(), LimitsError> {
        let entry = LIMIT_KEYS
            .iter()
            .find(|k| k.name == key)
            .ok_or_else(|| LimitsError::UnknownKey(key.to_string()))?;
        let parsed = entry.constraint.parse(key, value)?;
        (entry.set)(self, parsed);
        Ok(())
    }
}

/// Shared handle to the published limits snapshot
#[derive(Debug, Default)]
pub struct LimitsHandle {
    current: RwLock<Arc<Limits>>,
}

impl LimitsHandle {
    pub fn new(limits: Limits) -> Self {
        Self {
            current: RwLock::new(Arc::new(limits)),
        }
    }

    /// The currently published snapshot
    pub fn snapshot(&self) -> Arc<Limits> {
        self.current.read().clone()
    }

    /// Validate every update, then publish them together.
    ///
    /// On any error the published snapshot is left untouched.
    pub fn apply<'a, I>(&self, updates: I) -> Result<Arc<Limits>, LimitsError>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut current = self.current.write();
        let mut next = Limits::clone(&current);
        for (key, value) in updates {
            next.set(key, value)?;
        }

        let next = Arc::new(next);
        *current = next.clone();
        info!(limits = ?next, "Published new service limits");
        Ok(next)
    }
}
