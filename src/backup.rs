// src/backup.rs
//! JSON export/import of the whole account collection.
use crate::error::{BackupError, BackupResult};
use crate::models::{AccountRecord, UNASSIGNED_ID};
use crate::store::RecordStore;
use chrono::Local;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

pub const BACKUP_FORMAT_VERSION: u32 = 1;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BackupDocument {
    pub accounts: Vec<AccountRecord>,
    /// Informational only; never checked on import.
    #[serde(default)]
    pub backup_date: String,
    #[serde(default = "default_version")]
    pub version: u32,
}

fn default_version() -> u32 {
    BACKUP_FORMAT_VERSION
}

impl BackupDocument {
    pub fn new(accounts: Vec<AccountRecord>) -> Self {
        BackupDocument {
            accounts,
            backup_date: local_timestamp(),
            version: BACKUP_FORMAT_VERSION,
        }
    }

    /// Pretty JSON with four-space indentation.
    pub fn to_json(&self) -> BackupResult<Vec<u8>> {
        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
        self.serialize(&mut serializer)?;
        Ok(buf)
    }

    /// Parses a document, ignoring unknown fields and rejecting unknown versions.
    pub fn from_json(text: &str) -> BackupResult<Self> {
        let document: BackupDocument = serde_json::from_str(text)?;
        if document.version != BACKUP_FORMAT_VERSION {
            log::warn!("Rejecting backup with version {}", document.version);
            return Err(BackupError::UnsupportedVersion(document.version));
        }
        Ok(document)
    }
}

/// Current local time as an ISO-8601 date-time without offset.
pub fn local_timestamp() -> String {
    Local::now().naive_local().format("%Y-%m-%dT%H:%M:%S%.3f").to_string()
}

/// File name offered when asking the user where to save a backup.
pub fn suggested_file_name() -> String {
    format!("password_backup_{}.json", Local::now().format("%Y%m%d_%H%M%S"))
}

/// Writes every record to `sink` as a backup document.
pub async fn create_backup<W>(records: &[AccountRecord], sink: &mut W) -> BackupResult<()>
where
    W: AsyncWrite + Unpin,
{
    let document = BackupDocument::new(records.to_vec());
    let bytes = document.to_json()?;
    sink.write_all(&bytes).await.map_err(|e| {
        log::error!("Failed to write backup: {}", e);
        BackupError::Io(e)
    })?;
    sink.flush().await?;
    log::info!("Backup written with {} accounts ({} bytes)", records.len(), bytes.len());
    Ok(())
}

/// Reads a backup document from `source` and returns its records as stored.
pub async fn restore_backup<R>(source: &mut R) -> BackupResult<Vec<AccountRecord>>
where
    R: AsyncRead + Unpin,
{
    let mut text = String::new();
    source.read_to_string(&mut text).await.map_err(|e| {
        log::error!("Failed to read backup: {}", e);
        BackupError::Io(e)
    })?;
    let document = BackupDocument::from_json(&text).map_err(|e| {
        log::warn!("Backup could not be parsed: {}", e);
        e
    })?;
    log::info!(
        "Parsed backup from {:?} with {} accounts",
        document.backup_date,
        document.accounts.len()
    );
    Ok(document.accounts)
}

/// Backs up the store's current contents. Returns the number of records written.
pub async fn export_store<W>(store: &RecordStore, sink: &mut W) -> BackupResult<usize>
where
    W: AsyncWrite + Unpin,
{
    let records = store.snapshot();
    create_backup(&records, sink).await?;
    Ok(records.len())
}

/// Destructive restore: the store ends up holding exactly the backup's
/// records, each under a newly allocated id. The source is fully parsed
/// before the store is touched, so a bad file leaves the store unchanged.
pub async fn restore_into<R>(store: &RecordStore, source: &mut R) -> BackupResult<usize>
where
    R: AsyncRead + Unpin,
{
    let records: Vec<AccountRecord> = restore_backup(source)
        .await?
        .into_iter()
        .map(|record| AccountRecord {
            id: UNASSIGNED_ID,
            ..record
        })
        .collect();
    let count = records.len();
    let replaced = store.len();
    store.replace_all(records).await?;
    log::info!("Restore replaced {} accounts with {} from backup", replaced, count);
    Ok(count)
}
