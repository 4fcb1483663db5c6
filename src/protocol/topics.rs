use crate::{Error, Result, Topic};

const REQUEST_SUFFIX: &str = "request";
const REPLY_SUFFIX: &str = "reply";

/// Request and reply topics derived from a service name.
///
/// `add_two_ints` maps to `add_two_ints/request` and `add_two_ints/reply`.
/// Distinct names yield distinct pairs, and a request topic never equals
/// any service's reply topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceTopics {
    pub request: Topic,
    pub reply: Topic,
}

impl ServiceTopics {
    /// # Errors
    ///
    /// `Error::InvalidTopic` for an empty name, a leading or trailing `/`,
    /// an empty level, whitespace, or a wildcard character (`+`, `#`, `*`).
    pub fn for_service(name: &str) -> Result<Self> {
        // ---
        validate_topic_name(name)?;
        Ok(Self {
            request: Topic::from(format!("{name}/{REQUEST_SUFFIX}")),
            reply: Topic::from(format!("{name}/{REPLY_SUFFIX}")),
        })
    }
}

/// Validate a user-supplied topic or service name.
pub(crate) fn validate_topic_name(name: &str) -> Result<()> {
    // ---
    let valid = !name.is_empty()
        && name.split('/').all(|level| !level.is_empty())
        && !name
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '+' | '#' | '*'));

    if valid {
        Ok(())
    } else {
        Err(Error::InvalidTopic(name.to_owned()))
    }
}
