/// Events, subscriptions, and delivery attempts are addressed by UUIDs.
pub type EventId = uuid::Uuid;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
