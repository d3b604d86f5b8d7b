//! Queue URL parsing and formatting

use queuestack_core::Arn;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use crate::error::SqsError;
use crate::storage::AccountLookup;

/// Service path accepted in front of `/{account}/{queue}`
pub const SERVICE_PATH_PREFIX: [&str; 2] = ["services", "simplequeue"];

/// Account and name of a queue
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueueIdentity {
    pub account_id: String,
    pub queue_name: String,
}

impl QueueIdentity {
    pub fn new(account_id: impl Into<String>, queue_name: impl Into<String>) -> Self {
        Self {
            account_id: account_id.into(),
            queue_name: queue_name.into(),
        }
    }

    pub fn arn(&self, region: &str) -> Arn {
        Arn::sqs_queue(region, &self.account_id, &self.queue_name)
    }
}

impl fmt::Display for QueueIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.account_id, self.queue_name)
    }
}

/// Path layouts a queue URL may use, tried in declaration order
#[derive(Debug, Clone, Copy)]
enum PathShape {
    /// `/{account}/{queue}`
    AccountAndName,
    /// `/services/simplequeue/{account}/{queue}`
    ServicePathAccountAndName,
}

impl PathShape {
    const ALL: [PathShape; 2] = [Self::AccountAndName, Self::ServicePathAccountAndName];

    fn extract(self, segments: &[&str]) -> Option<QueueIdentity> {
        match (self, segments) {
            (Self::AccountAndName, [account, queue]) => Some(QueueIdentity::new(*account, *queue)),
            (Self::ServicePathAccountAndName, [first, second, account, queue])
                if [*first, *second] == SERVICE_PATH_PREFIX =>
            {
                Some(QueueIdentity::new(*account, *queue))
            }
            _ => None,
        }
    }
}

/// Maps queue URLs to identities and back
pub struct QueueAddressResolver {
    /// Scheme, host and port, without a trailing slash
    endpoint: String,
    accounts: Arc<dyn AccountLookup>,
}

impl QueueAddressResolver {
    pub fn new(endpoint: impl Into<String>, accounts: Arc<dyn AccountLookup>) -> Self {
        let endpoint = endpoint.into().trim_end_matches('/').to_string();
        Self { endpoint, accounts }
    }

    /// Resolve a queue URL (or bare path) to the queue it names.
    ///
    /// Every failure, whether a malformed URL, an unrecognised layout or an
    /// unknown account, yields the same `InvalidAddress` error.
    pub fn parse(&self, locator: &str) -> Result<QueueIdentity, SqsError> {
        self.try_parse(locator).ok_or_else(|| {
            SqsError::InvalidAddress(format!(
                "The address {locator} is not valid for this endpoint."
            ))
        })
    }

    fn try_parse(&self, locator: &str) -> Option<QueueIdentity> {
        let path = if locator.starts_with('/') {
            locator.split(['?', '#']).next().unwrap_or_default().to_string()
        } else {
            match url::Url::parse(locator) {
                Ok(url) => url.path().to_string(),
                Err(err) => {
                    debug!(locator = %locator, error = %err, "Unparseable queue URL");
                    return None;
                }
            }
        };

        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let identity = PathShape::ALL
            .into_iter()
            .find_map(|shape| shape.extract(&segments))?;

        if self.accounts.lookup_account_by_id(&identity.account_id).is_none() {
            debug!(account = %identity.account_id, "Queue URL names an unknown account");
            return None;
        }
        Some(identity)
    }

    /// Canonical URL for a queue: `{endpoint}/{account}/{queue}`
    pub fn format(&self, identity: &QueueIdentity) -> String {
        format!(
            "{}/{}/{}",
            self.endpoint, identity.account_id, identity.queue_name
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StaticAccounts;

    fn resolver() -> QueueAddressResolver {
        QueueAddressResolver::new(
            "http://localhost:4566/",
            Arc::new(StaticAccounts::new(["123456789012"])),
        )
    }

    #[test]
    fn test_parse_short_path() {
        let identity = resolver().parse("/123456789012/myqueue").unwrap();
        assert_eq!(identity, QueueIdentity::new("123456789012", "myqueue"));
    }

    #[test]
    fn test_parse_service_path() {
        let identity = resolver()
            .parse("/services/simplequeue/123456789012/myqueue")
            .unwrap();
        assert_eq!(identity, QueueIdentity::new("123456789012", "myqueue"));
    }

    #[test]
    fn test_parse_full_urls() {
        let r = resolver();
        assert_eq!(
            r.parse("https://sqs.us-east-1.example.com/123456789012/myqueue").unwrap(),
            QueueIdentity::new("123456789012", "myqueue")
        );
        assert_eq!(
            r.parse("http://host:8773/services/simplequeue/123456789012/myqueue?x=1").unwrap(),
            QueueIdentity::new("123456789012", "myqueue")
        );
        // Empty segments are ignored
        assert!(r.parse("http://host//123456789012//myqueue/").is_ok());
    }

    #[test]
    fn test_rejected_shapes() {
        let r = resolver();
        for locator in [
            "/a/b/c",
            "/123456789012",
            "/services/other/123456789012/myqueue",
            "/services/simplequeue/x/123456789012/myqueue",
            "not a url",
            "",
        ] {
            assert!(
                matches!(r.parse(locator), Err(SqsError::InvalidAddress(_))),
                "{locator} should be rejected"
            );
        }
    }

    #[test]
    fn test_unknown_account_is_indistinguishable() {
        let r = resolver();
        let unknown = r.parse("/999999999999/myqueue").unwrap_err();
        let malformed = r.parse("/a/b/c").unwrap_err();
        assert_eq!(
            unknown.to_string().replace("/999999999999/myqueue", ""),
            malformed.to_string().replace("/a/b/c", "")
        );
    }

    #[test]
    fn test_format_round_trips() {
        let r = resolver();
        let identity = QueueIdentity::new("123456789012", "orders");
        let url = r.format(&identity);
        assert_eq!(url, "http://localhost:4566/123456789012/orders");
        assert_eq!(r.parse(&url).unwrap(), identity);
    }
}
