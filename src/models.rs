// src/models.rs
use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Id value meaning "not persisted yet"; the store allocates a real id on insert.
pub const UNASSIGNED_ID: i64 = 0;

/// Milliseconds since the Unix epoch.
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// One stored credential entry.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AccountRecord {
    #[serde(default)]
    pub id: i64,
    pub service_name: String,
    pub login_id: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub note: String,
    #[serde(default = "now_millis")]
    pub created_at: i64,
    #[serde(default = "now_millis")]
    pub updated_at: i64,
}

impl AccountRecord {
    pub fn new(service_name: String, login_id: String, email: String, password: String, note: String) -> Self {
        let now = now_millis();
        Self {
            id: UNASSIGNED_ID,
            service_name,
            login_id,
            email,
            password,
            note,
            created_at: now,
            updated_at: now,
        }
    }

    /// Case-insensitive substring match on service name, login id or email.
    /// An empty query matches everything.
    pub fn matches(&self, query: &str) -> bool {
        if query.is_empty() {
            return true;
        }
        let query = query.to_lowercase();
        self.service_name.to_lowercase().contains(&query)
            || self.login_id.to_lowercase().contains(&query)
            || self.email.to_lowercase().contains(&query)
    }
}

/// Authoritative record collection as held by the storage engine.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct RecordTable {
    pub next_id: i64,
    pub records: Vec<AccountRecord>,
}

impl Default for RecordTable {
    fn default() -> Self {
        RecordTable {
            next_id: 1,
            records: Vec::new(),
        }
    }
}

impl RecordTable {
    pub fn new() -> Self {
        RecordTable::default()
    }

    pub fn allocate_id(&mut self) -> i64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Inserts the record under a freshly allocated id and returns that id.
    pub fn insert(&mut self, mut record: AccountRecord) -> i64 {
        let id = self.allocate_id();
        record.id = id;
        self.records.push(record);
        id
    }

    pub fn find(&self, id: i64) -> Option<&AccountRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    pub fn position(&self, id: i64) -> Option<usize> {
        self.records.iter().position(|r| r.id == id)
    }

    /// Records ordered by service name ascending; ties keep id order.
    pub fn sorted(&self) -> Vec<AccountRecord> {
        let mut records = self.records.clone();
        records.sort_by(|a, b| a.service_name.cmp(&b.service_name).then(a.id.cmp(&b.id)));
        records
    }
}
