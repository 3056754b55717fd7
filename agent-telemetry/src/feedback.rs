//! User feedback records and durable stores.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use agent_primitives::ConversationId;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::{TelemetryError, TelemetryResult};

/// Rating a user gave to a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedbackRating {
    /// The answer helped.
    Positive,
    /// No strong opinion.
    Neutral,
    /// The answer needs work.
    Negative,
}

impl FeedbackRating {
    /// Wire label.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Positive => "positive",
            Self::Neutral => "neutral",
            Self::Negative => "negative",
        }
    }
}

impl fmt::Display for FeedbackRating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown rating label.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown feedback rating `{0}` (expected positive, neutral or negative)")]
pub struct ParseRatingError(String);

impl FromStr for FeedbackRating {
    type Err = ParseRatingError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "positive" => Ok(Self::Positive),
            "neutral" => Ok(Self::Neutral),
            "negative" => Ok(Self::Negative),
            _ => Err(ParseRatingError(value.to_owned())),
        }
    }
}

/// One feedback submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackRecord {
    conversation_id: ConversationId,
    rating: FeedbackRating,
    #[serde(default)]
    notes: String,
    timestamp: DateTime<Utc>,
}

impl FeedbackRecord {
    /// Creates a record stamped with the current time.
    #[must_use]
    pub fn new(
        conversation_id: ConversationId,
        rating: FeedbackRating,
        notes: impl Into<String>,
    ) -> Self {
        Self {
            conversation_id,
            rating,
            notes: notes.into(),
            timestamp: Utc::now(),
        }
    }

    /// Conversation the feedback refers to.
    #[must_use]
    pub fn conversation_id(&self) -> &ConversationId {
        &self.conversation_id
    }

    /// Rating.
    #[must_use]
    pub fn rating(&self) -> FeedbackRating {
        self.rating
    }

    /// Free-form notes, possibly empty.
    #[must_use]
    pub fn notes(&self) -> &str {
        &self.notes
    }

    /// Submission time.
    #[must_use]
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// Durable destination for feedback.
#[async_trait]
pub trait FeedbackStore: Send + Sync {
    /// Persists a record.
    async fn put_feedback(&self, record: &FeedbackRecord) -> TelemetryResult<()>;
}

/// Feedback store appending newline-delimited JSON to a local file.
pub struct FileFeedbackStore {
    path: PathBuf,
    file: Mutex<fs::File>,
}

impl fmt::Debug for FileFeedbackStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileFeedbackStore")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl FileFeedbackStore {
    /// Opens (or creates) the store at `path`, creating parent directories.
    ///
    /// # Errors
    ///
    /// Propagates I/O errors from preparing the file.
    pub async fn open(path: impl Into<PathBuf>) -> TelemetryResult<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    /// Location of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads every stored record, oldest first.
    ///
    /// # Errors
    ///
    /// Propagates I/O errors and [`TelemetryError::Serialization`] for
    /// corrupt lines.
    pub async fn records(&self) -> TelemetryResult<Vec<FeedbackRecord>> {
        let data = fs::read(&self.path).await?;
        data.split(|byte| *byte == b'\n')
            .filter(|line| !line.is_empty())
            .map(|line| serde_json::from_slice(line).map_err(TelemetryError::from))
            .collect()
    }
}

#[async_trait]
impl FeedbackStore for FileFeedbackStore {
    async fn put_feedback(&self, record: &FeedbackRecord) -> TelemetryResult<()> {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');
        let mut guard = self.file.lock().await;
        guard.write_all(&line).await?;
        guard.flush().await?;
        Ok(())
    }
}
