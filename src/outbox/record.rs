use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle status of an outbox record.
///
/// `Completed` and `Failed` are terminal: nothing in this crate moves a record
/// out of them.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OutboxStatus {
    #[default]
    Pending,
    Completed,
    Failed,
}

impl OutboxStatus {
    /// Name as stored and shown in logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            OutboxStatus::Pending => "Pending",
            OutboxStatus::Completed => "Completed",
            OutboxStatus::Failed => "Failed",
        }
    }

    /// Inverse of [`as_str`](Self::as_str).
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "Pending" => Some(OutboxStatus::Pending),
            "Completed" => Some(OutboxStatus::Completed),
            "Failed" => Some(OutboxStatus::Failed),
            _ => None,
        }
    }

    /// `Completed` or `Failed`.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, OutboxStatus::Pending)
    }
}

impl std::fmt::Display for OutboxStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What happened to a record after one processing attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    Completed,
    /// Failed but still under the retry ceiling; eligible again next cycle.
    Retry,
    /// Failed and reached the retry ceiling.
    Failed,
    /// The record was already terminal; nothing changed.
    Unchanged,
}

/// Durable unit of work in the outbox.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OutboxRecord {
    pub id: Uuid,
    pub message_type: String,
    #[serde(with = "payload_serde")]
    pub payload: Vec<u8>,
    pub status: OutboxStatus,
    pub is_processed: bool,
    pub created_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
    pub retry_count: u32,
    pub last_error: Option<String>,
    pub last_error_at: Option<DateTime<Utc>>,
}

mod payload_serde {
    use base64::{engine::general_purpose::STANDARD, Engine};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(payload: &Vec<u8>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        STANDARD.encode(payload).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s: String = String::deserialize(deserializer)?;
        STANDARD.decode(&s).map_err(serde::de::Error::custom)
    }
}

impl OutboxRecord {
    /// Create a fresh pending record with a new id, stamped `now`.
    pub fn new(message_type: impl Into<String>, payload: Vec<u8>) -> Self {
        Self::with_id(Uuid::new_v4(), message_type, payload, Utc::now())
    }

    /// Pending record with explicit id and timestamp, for imports and tests.
    pub fn with_id(
        id: Uuid,
        message_type: impl Into<String>,
        payload: Vec<u8>,
        created_at: DateTime<Utc>,
    ) -> Self {
        OutboxRecord {
            id,
            message_type: message_type.into(),
            payload,
            status: OutboxStatus::Pending,
            is_processed: false,
            created_at,
            processed_at: None,
            retry_count: 0,
            last_error: None,
            last_error_at: None,
        }
    }

    /// Payload as UTF-8, when it is.
    pub fn payload_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.payload).ok()
    }

    pub fn is_pending(&self) -> bool {
        self.status == OutboxStatus::Pending
    }

    pub fn is_completed(&self) -> bool {
        self.status == OutboxStatus::Completed
    }

    pub fn is_failed(&self) -> bool {
        self.status == OutboxStatus::Failed
    }

    /// Whether the dispatcher may select this record.
    pub fn is_eligible(&self, retry_ceiling: u32) -> bool {
        !self.is_processed && self.is_pending() && self.retry_count < retry_ceiling
    }

    /// Pending -> Completed.
    pub fn mark_completed(&mut self, now: DateTime<Utc>) -> Outcome {
        if self.status.is_terminal() {
            return Outcome::Unchanged;
        }
        self.status = OutboxStatus::Completed;
        self.is_processed = true;
        self.processed_at = Some(now);
        Outcome::Completed
    }

    /// Record one failed attempt. The record fails terminally once
    /// `retry_count` reaches `retry_ceiling`.
    pub fn record_failure(
        &mut self,
        error: impl Into<String>,
        now: DateTime<Utc>,
        retry_ceiling: u32,
    ) -> Outcome {
        if self.status.is_terminal() {
            return Outcome::Unchanged;
        }
        self.retry_count += 1;
        self.last_error = Some(error.into());
        self.last_error_at = Some(now);
        if self.retry_count >= retry_ceiling {
            self.status = OutboxStatus::Failed;
            Outcome::Failed
        } else {
            Outcome::Retry
        }
    }
}
