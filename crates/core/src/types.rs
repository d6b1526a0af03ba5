/// User primary keys are PostgreSQL BIGSERIAL.
pub type DbId = i64;

/// Sessions are keyed by UUID v4, one per login event.
pub type SessionId = uuid::Uuid;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
