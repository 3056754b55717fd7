//! Conversation identifier types.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::Error;

const MAX_CONVERSATION_ID_LEN: usize = 100;

/// Identifier of one conversation, forwarded to the remote agent as its session id.
#[derive(Clone, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ConversationId(String);

impl ConversationId {
    /// Creates an identifier from a value supplied by the front end.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingIdentifier`] when the value is blank and
    /// [`Error::InvalidIdentifier`] when it is too long or contains whitespace.
    pub fn new(value: impl Into<String>) -> Result<Self, Error> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(Error::MissingIdentifier {
                field: "conversation_id",
            });
        }
        if value.len() > MAX_CONVERSATION_ID_LEN {
            return Err(Error::InvalidIdentifier {
                field: "conversation_id",
                reason: format!("length must be <= {MAX_CONVERSATION_ID_LEN}"),
            });
        }
        if value.chars().any(char::is_whitespace) {
            return Err(Error::InvalidIdentifier {
                field: "conversation_id",
                reason: "whitespace is not allowed".into(),
            });
        }
        Ok(Self(value))
    }

    /// Mints a fresh random identifier.
    #[must_use]
    pub fn random() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ConversationId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ConversationId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for ConversationId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ConversationId> for String {
    fn from(value: ConversationId) -> Self {
        value.0
    }
}
