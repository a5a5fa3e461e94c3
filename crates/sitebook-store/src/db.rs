//! SQLite persistence for estimate line items.
//!
//! One row per line item; `updated_at` is the optimistic-locking token.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension, Row, params};
use sitebook_autosave::{BatchUpsert, UpsertError};
use sitebook_types::{BatchResult, ItemUpdate, RowId, VersionToken, now_millis};
use tracing::{debug, warn};

use crate::error::{StoreError, StoreResult};
use crate::item::{StoredItem, apply_update};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS estimate_items (
    id TEXT PRIMARY KEY,
    category TEXT NOT NULL DEFAULT '',
    description TEXT NOT NULL DEFAULT '',
    quantity REAL NOT NULL DEFAULT 0,
    unit TEXT NOT NULL DEFAULT '',
    unit_price REAL NOT NULL DEFAULT 0,
    markup_percent REAL NOT NULL DEFAULT 0,
    labels TEXT NOT NULL DEFAULT '[]',   -- JSON array
    sort_order INTEGER NOT NULL DEFAULT 0,
    block_id TEXT,
    updated_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_items_block ON estimate_items(block_id, sort_order);
"#;

const SELECT_COLUMNS: &str = "SELECT id, category, description, quantity, unit, unit_price,
        markup_percent, labels, sort_order, block_id, updated_at
 FROM estimate_items";

/// Database handle for line items.
pub struct ItemDb {
    conn: Connection,
}

/// Columns as read, before the labels JSON is decoded.
fn read_row(row: &Row<'_>) -> rusqlite::Result<(StoredItem, String)> {
    let id: String = row.get(0)?;
    let updated_at: String = row.get(10)?;
    let mut item = StoredItem::new(id, VersionToken::from(updated_at));
    item.category = row.get(1)?;
    item.description = row.get(2)?;
    item.quantity = row.get(3)?;
    item.unit = row.get(4)?;
    item.unit_price = row.get(5)?;
    item.markup_percent = row.get(6)?;
    item.sort_order = row.get(8)?;
    item.block_id = row.get(9)?;
    Ok((item, row.get(7)?))
}

fn decode((mut item, labels): (StoredItem, String)) -> StoreResult<StoredItem> {
    item.labels = serde_json::from_str(&labels)?;
    Ok(item)
}

fn select_item(conn: &Connection, id: &RowId) -> StoreResult<Option<StoredItem>> {
    let sql = format!("{SELECT_COLUMNS} WHERE id = ?1");
    conn.query_row(&sql, params![id.as_str()], read_row)
        .optional()?
        .map(decode)
        .transpose()
}

fn write_item(conn: &Connection, item: &StoredItem) -> StoreResult<()> {
    let labels = serde_json::to_string(&item.labels)?;
    conn.execute(
        "INSERT INTO estimate_items (id, category, description, quantity, unit, unit_price,
                                     markup_percent, labels, sort_order, block_id, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
         ON CONFLICT(id) DO UPDATE SET
            category = excluded.category,
            description = excluded.description,
            quantity = excluded.quantity,
            unit = excluded.unit,
            unit_price = excluded.unit_price,
            markup_percent = excluded.markup_percent,
            labels = excluded.labels,
            sort_order = excluded.sort_order,
            block_id = excluded.block_id,
            updated_at = excluded.updated_at",
        params![
            item.id.as_str(),
            item.category,
            item.description,
            item.quantity,
            item.unit,
            item.unit_price,
            item.markup_percent,
            labels,
            item.sort_order,
            item.block_id,
            item.updated_at.as_str(),
        ],
    )?;
    Ok(())
}

fn upsert_in(conn: &Connection, update: &ItemUpdate) -> StoreResult<BatchResult> {
    let current = select_item(conn, &update.id)?;
    match apply_update(current, update, now_millis()) {
        Ok(item) => {
            write_item(conn, &item)?;
            Ok(BatchResult::saved(item.id, item.updated_at))
        }
        Err(refusal) => Ok(refusal.into_result(&update.id)),
    }
}

impl ItemDb {
    /// Open or create a database at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    /// Create an in-memory database (for testing).
    pub fn in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    /// Insert a row, or overwrite it wholesale.
    pub fn insert_item(&self, item: &StoredItem) -> StoreResult<()> {
        write_item(&self.conn, item)
    }

    pub fn get_item(&self, id: &RowId) -> StoreResult<Option<StoredItem>> {
        select_item(&self.conn, id)
    }

    /// All rows ordered by `sort_order`, then id.
    pub fn list_items(&self) -> StoreResult<Vec<StoredItem>> {
        let sql = format!("{SELECT_COLUMNS} ORDER BY sort_order, id");
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], read_row)?;
        rows.map(|row| decode(row?)).collect()
    }

    pub fn delete_item(&self, id: &RowId) -> StoreResult<()> {
        let deleted = self
            .conn
            .execute("DELETE FROM estimate_items WHERE id = ?1", params![id.as_str()])?;
        if deleted == 0 {
            return Err(StoreError::NotFound(id.clone()));
        }
        Ok(())
    }

    /// Apply one update in its own transaction.
    pub fn upsert_row(&mut self, update: &ItemUpdate) -> StoreResult<BatchResult> {
        let tx = self.conn.transaction()?;
        let result = upsert_in(&tx, update)?;
        tx.commit()?;
        Ok(result)
    }

    /// Apply every update in one transaction, each row under its own savepoint.
    ///
    /// A database error on one row rolls back and becomes that row's failure;
    /// the rest of the batch still runs. Only a failure to open or commit the
    /// transaction fails the whole batch.
    pub fn batch_upsert(&mut self, updates: &[ItemUpdate]) -> StoreResult<Vec<BatchResult>> {
        let mut tx = self.conn.transaction()?;
        let mut results = Vec::with_capacity(updates.len());
        for update in updates {
            let sp = tx.savepoint()?;
            match upsert_in(&sp, update) {
                Ok(result) => {
                    sp.commit()?;
                    results.push(result);
                }
                Err(err) => {
                    warn!(row = %update.id, "Upsert failed: {err}");
                    results.push(BatchResult::rejected(update.id.clone(), err.to_string()));
                }
            }
        }
        tx.commit()?;
        Ok(results)
    }
}

/// [`BatchUpsert`] over an [`ItemDb`]. SQLite calls run on the blocking pool.
#[derive(Clone)]
pub struct SqliteItemStore {
    db: Arc<Mutex<ItemDb>>,
}

impl SqliteItemStore {
    pub fn new(db: ItemDb) -> Self {
        Self {
            db: Arc::new(Mutex::new(db)),
        }
    }

    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        ItemDb::open(path).map(Self::new)
    }

    pub fn in_memory() -> StoreResult<Self> {
        ItemDb::in_memory().map(Self::new)
    }

    /// Run `f` against the database directly (seeding, inspection).
    pub fn with_db<R>(&self, f: impl FnOnce(&mut ItemDb) -> R) -> R {
        f(&mut self.db.lock())
    }
}

#[async_trait]
impl BatchUpsert for SqliteItemStore {
    async fn batch_upsert(&self, items: Vec<ItemUpdate>) -> Result<Vec<BatchResult>, UpsertError> {
        let db = Arc::clone(&self.db);
        debug!(rows = items.len(), "SQLite batch upsert");
        let results = tokio::task::spawn_blocking(move || db.lock().batch_upsert(&items))
            .await
            .map_err(|e| UpsertError::Transport(format!("spawn_blocking: {e}")))??;
        Ok(results)
    }
}
