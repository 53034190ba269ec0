/// Owner identities issued by the external user service are integers.
pub type OwnerId = i64;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
