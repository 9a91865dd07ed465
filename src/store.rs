// src/store.rs
use crate::db::RecordBackend;
use crate::error::{StoreError, StoreResult};
use crate::models::{now_millis, AccountRecord, RecordTable};
use crate::observable::{Cell, Combined, Mapped, Watch};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Live list of records, ordered by service name.
pub type RecordList = Mapped<RecordTable, Vec<AccountRecord>>;

/// The account collection. Reads are live views that re-emit after every
/// committed write; writes are serialized and persisted before they are published.
pub struct RecordStore {
    backend: Arc<dyn RecordBackend>,
    table: Cell<RecordTable>,
    write_lock: Mutex<()>,
}

impl RecordStore {
    pub async fn open(backend: Arc<dyn RecordBackend>) -> StoreResult<Self> {
        let loader = Arc::clone(&backend);
        let table = tokio::task::spawn_blocking(move || loader.load())
            .await
            .map_err(|e| StoreError::Task(e.to_string()))??;
        log::info!("Record store opened with {} records", table.records.len());
        Ok(RecordStore {
            backend,
            table: Cell::new(table),
            write_lock: Mutex::new(()),
        })
    }

    pub fn list(&self) -> RecordList {
        self.table.subscribe().map(RecordTable::sorted)
    }

    pub fn get_by_id(&self, id: i64) -> Mapped<RecordTable, Option<AccountRecord>> {
        self.table.subscribe().map(move |table| table.find(id).cloned())
    }

    /// Live search over service name, login id and email.
    pub fn search(&self, query: &str) -> RecordList {
        let query = query.to_string();
        self.table.subscribe().map(move |table| filter_sorted(table, &query))
    }

    /// The list-screen composition: the live list narrowed by a query the
    /// caller keeps changing. An empty query yields everything.
    pub fn filtered(&self, query: Watch<String>) -> Combined<RecordTable, String, Vec<AccountRecord>> {
        self.table.subscribe().combine(query, |table, query| filter_sorted(table, query))
    }

    /// One-shot copy of the current list.
    pub fn snapshot(&self) -> Vec<AccountRecord> {
        self.table.with(RecordTable::sorted)
    }

    pub fn len(&self) -> usize {
        self.table.with(|table| table.records.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stores the record under a new id, ignoring whatever id it carries.
    pub async fn insert(&self, record: AccountRecord) -> StoreResult<i64> {
        let id = self.commit(move |table| Some(table.insert(record))).await?;
        match id {
            Some(id) => {
                log::info!("Inserted record {}", id);
                Ok(id)
            }
            None => Err(StoreError::Task("insert produced no id".to_string())),
        }
    }

    /// Replaces the stored record with the same id. Returns `false` when no
    /// such record exists. `createdAt` is kept, `updatedAt` is refreshed.
    pub async fn update(&self, record: AccountRecord) -> StoreResult<bool> {
        let id = record.id;
        let updated = self
            .commit(move |table| {
                let pos = table.position(id)?;
                let created_at = table.records[pos].created_at;
                table.records[pos] = AccountRecord {
                    created_at,
                    updated_at: now_millis(),
                    ..record
                };
                Some(())
            })
            .await?
            .is_some();
        if updated {
            log::info!("Updated record {}", id);
        } else {
            log::debug!("Update skipped, record {} does not exist", id);
        }
        Ok(updated)
    }

    /// Removes the record with this id. Returns `false` if it was already gone.
    pub async fn delete(&self, id: i64) -> StoreResult<bool> {
        let deleted = self
            .commit(move |table| {
                let pos = table.position(id)?;
                table.records.remove(pos);
                Some(())
            })
            .await?
            .is_some();
        if deleted {
            log::info!("Deleted record {}", id);
        } else {
            log::debug!("Delete skipped, record {} does not exist", id);
        }
        Ok(deleted)
    }

    /// Deletes by the record's primary key.
    pub async fn delete_record(&self, record: &AccountRecord) -> StoreResult<bool> {
        self.delete(record.id).await
    }

    /// Drops every stored record and inserts `records` under fresh ids.
    /// The new table is written once, so readers never see a half-replaced list.
    pub async fn replace_all(&self, records: Vec<AccountRecord>) -> StoreResult<Vec<i64>> {
        let count = records.len();
        let ids = self
            .commit(move |table| {
                let removed = table.records.len();
                table.records.clear();
                log::debug!("Staged removal of {} records", removed);
                Some(records.into_iter().map(|record| table.insert(record)).collect::<Vec<_>>())
            })
            .await?
            .unwrap_or_default();
        log::info!("Replaced record collection with {} records", count);
        Ok(ids)
    }

    /// Applies `mutate` to a copy of the table, persists it and publishes it.
    /// A `None` from `mutate` means nothing changed; nothing is written then.
    async fn commit<R, F>(&self, mutate: F) -> StoreResult<Option<R>>
    where
        F: FnOnce(&mut RecordTable) -> Option<R>,
    {
        let _guard = self.write_lock.lock().await;
        let mut next = self.table.get();
        let outcome = match mutate(&mut next) {
            Some(outcome) => outcome,
            None => return Ok(None),
        };

        let backend = Arc::clone(&self.backend);
        let staged = next.clone();
        tokio::task::spawn_blocking(move || backend.persist(&staged))
            .await
            .map_err(|e| StoreError::Task(e.to_string()))??;

        self.table.set(next);
        Ok(Some(outcome))
    }
}

fn filter_sorted(table: &RecordTable, query: &str) -> Vec<AccountRecord> {
    let mut records = table.sorted();
    records.retain(|record| record.matches(query));
    records
}
