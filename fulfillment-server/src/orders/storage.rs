//! redb-based order ledger
//!
//! # Tables
//!
//! | Table | Key | Value | Purpose |
//! |-------|-----|-------|---------|
//! | `orders` | `order_id` | `Order` (JSON) | Order documents |
//! | `identifier_index` | `(field, value)` | `order_id` (multimap) | Candidate identifier lookup |
//!
//! Every write refreshes `updated_at` and increments `version`.
//! `delivery_note_number` is unique across orders; the other identifier
//! fields may collide; a colliding value resolves to the owner with the
//! lexicographically smallest `order_id` (multimap value order).

use redb::{
    Database, MultimapTableDefinition, ReadableDatabase, ReadableMultimapTable, ReadableTable,
    ReadableTableMetadata, TableDefinition, WriteTransaction,
};
use shared::order::{IdentifierField, Order, OrderStatus};
use shared::util::now_millis;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

/// Order documents: key = order_id, value = JSON-serialized Order
const ORDERS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("orders");

/// Identifier index: key = (field, value), values = order ids
const IDENTIFIER_INDEX: MultimapTableDefinition<(&str, &str), &str> =
    MultimapTableDefinition::new("identifier_index");

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] redb::DatabaseError),

    #[error("Transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    #[error("Table error: {0}")]
    Table(#[from] redb::TableError),

    #[error("Storage error: {0}")]
    Storage(#[from] redb::StorageError),

    #[error("Commit error: {0}")]
    Commit(#[from] redb::CommitError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Order not found: {0}")]
    OrderNotFound(String),

    #[error("Duplicate {field} '{value}' already owned by order {owner}")]
    DuplicateIdentifier {
        field: IdentifierField,
        value: String,
        owner: String,
    },

    #[error("Version conflict on order {order_id}: expected {expected}, found {actual}")]
    VersionConflict {
        order_id: String,
        expected: u64,
        actual: u64,
    },
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Filter for list / update-many operations
#[derive(Debug, Clone, Default)]
pub struct OrderFilter {
    pub ids: Option<Vec<String>>,
    pub statuses: Option<Vec<OrderStatus>>,
    pub batch_id: Option<String>,
    pub project_id: Option<String>,
}

impl OrderFilter {
    pub fn by_ids(ids: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            ids: Some(ids.into_iter().map(Into::into).collect()),
            ..Default::default()
        }
    }

    pub fn by_status(status: OrderStatus) -> Self {
        Self {
            statuses: Some(vec![status]),
            ..Default::default()
        }
    }

    pub fn by_batch(batch_id: impl Into<String>) -> Self {
        Self {
            batch_id: Some(batch_id.into()),
            ..Default::default()
        }
    }

    pub fn matches(&self, order: &Order) -> bool {
        if let Some(ids) = &self.ids
            && !ids.iter().any(|id| *id == order.id)
        {
            return false;
        }
        if let Some(statuses) = &self.statuses
            && !statuses.contains(&order.status)
        {
            return false;
        }
        if let Some(batch_id) = &self.batch_id
            && order.batch.as_ref().map(|b| &b.batch_id) != Some(batch_id)
        {
            return false;
        }
        if let Some(project_id) = &self.project_id
            && order.project.project_id.as_ref() != Some(project_id)
        {
            return false;
        }
        true
    }
}

/// Order counts per status
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct StorageStats {
    pub total: u64,
    pub new: u64,
    pub in_progress: u64,
    pub packed: u64,
    pub shipped: u64,
    pub completed: u64,
    pub cancelled: u64,
}

/// Order ledger backed by redb
#[derive(Clone)]
pub struct OrderStorage {
    db: Arc<Database>,
}

impl std::fmt::Debug for OrderStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderStorage").finish_non_exhaustive()
    }
}

impl OrderStorage {
    /// Open or create the database at the given path
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let db = Database::create(path)?;
        Self::init(db)
    }

    /// Open an in-memory database (tests and tooling)
    pub fn open_in_memory() -> StorageResult<Self> {
        let db = Database::builder().create_with_backend(redb::backends::InMemoryBackend::new())?;
        Self::init(db)
    }

    fn init(db: Database) -> StorageResult<Self> {
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(ORDERS_TABLE)?;
            let _ = write_txn.open_multimap_table(IDENTIFIER_INDEX)?;
        }
        write_txn.commit()?;

        Ok(Self { db: Arc::new(db) })
    }

    // ========== Reads ==========

    /// Find by local id
    pub fn get(&self, order_id: &str) -> StorageResult<Option<Order>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(ORDERS_TABLE)?;
        match table.get(order_id)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// Find by local id, failing when absent
    pub fn get_required(&self, order_id: &str) -> StorageResult<Order> {
        self.get(order_id)?
            .ok_or_else(|| StorageError::OrderNotFound(order_id.to_string()))
    }

    /// Find by a single identifier field
    pub fn find_by_identifier(
        &self,
        field: IdentifierField,
        value: &str,
    ) -> StorageResult<Option<Order>> {
        self.find_by_any(&[(field, value)])
    }

    /// Find by any of the given identifiers; the first candidate that hits wins
    pub fn find_by_any(&self, candidates: &[(IdentifierField, &str)]) -> StorageResult<Option<Order>> {
        let read_txn = self.db.begin_read()?;
        let index = read_txn.open_multimap_table(IDENTIFIER_INDEX)?;
        let orders = read_txn.open_table(ORDERS_TABLE)?;

        for (field, value) in candidates {
            if value.is_empty() {
                continue;
            }
            let mut owners = index.get((field.as_str(), *value))?;
            if let Some(owner) = owners.next() {
                let owner = owner?;
                if let Some(raw) = orders.get(owner.value())? {
                    return Ok(Some(serde_json::from_slice(raw.value())?));
                }
            }
        }
        Ok(None)
    }

    /// List orders matching the filter, oldest first
    pub fn list(&self, filter: &OrderFilter) -> StorageResult<Vec<Order>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(ORDERS_TABLE)?;

        let mut orders = Vec::new();
        for result in table.iter()? {
            let (_key, value) = result?;
            let order: Order = serde_json::from_slice(value.value())?;
            if filter.matches(&order) {
                orders.push(order);
            }
        }

        orders.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(orders)
    }

    /// Number of stored orders
    pub fn count(&self) -> StorageResult<u64> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(ORDERS_TABLE)?;
        Ok(table.len()?)
    }

    /// Order counts per status
    pub fn get_stats(&self) -> StorageResult<StorageStats> {
        let mut stats = StorageStats::default();
        for order in self.list(&OrderFilter::default())? {
            stats.total += 1;
            match order.status {
                OrderStatus::New => stats.new += 1,
                OrderStatus::InProgress => stats.in_progress += 1,
                OrderStatus::Packed => stats.packed += 1,
                OrderStatus::Shipped => stats.shipped += 1,
                OrderStatus::Completed => stats.completed += 1,
                OrderStatus::Cancelled => stats.cancelled += 1,
            }
        }
        Ok(stats)
    }

    // ========== Writes ==========

    /// Upsert (last write wins)
    ///
    /// Returns the persisted record with refreshed `updated_at` and `version`.
    pub fn save(&self, order: Order) -> StorageResult<Order> {
        let txn = self.db.begin_write()?;
        let saved = Self::write_order(&txn, order, None, now_millis())?;
        txn.commit()?;
        Ok(saved)
    }

    /// Upsert only if the stored version still equals `expected_version`
    pub fn save_versioned(&self, order: Order, expected_version: u64) -> StorageResult<Order> {
        let txn = self.db.begin_write()?;
        let saved = Self::write_order(&txn, order, Some(expected_version), now_millis())?;
        txn.commit()?;
        Ok(saved)
    }

    /// Apply `patch` to every order matching `filter` in one transaction
    ///
    /// Returns the number of updated orders.
    pub fn update_many<F>(&self, filter: &OrderFilter, mut patch: F) -> StorageResult<usize>
    where
        F: FnMut(&mut Order),
    {
        let matching = self.list(filter)?;
        if matching.is_empty() {
            return Ok(0);
        }

        let now = now_millis();
        let txn = self.db.begin_write()?;
        let mut updated = 0;
        for mut order in matching {
            let expected = order.version;
            patch(&mut order);
            Self::write_order(&txn, order, Some(expected), now)?;
            updated += 1;
        }
        txn.commit()?;
        Ok(updated)
    }

    /// Delete an order and its index entries
    pub fn remove(&self, order_id: &str) -> StorageResult<bool> {
        let txn = self.db.begin_write()?;
        let removed = {
            let mut table = txn.open_table(ORDERS_TABLE)?;
            let mut index = txn.open_multimap_table(IDENTIFIER_INDEX)?;
            let previous: Option<Order> = match table.remove(order_id)? {
                Some(raw) => Some(serde_json::from_slice(raw.value())?),
                None => None,
            };
            if let Some(previous) = &previous {
                for (field, value) in previous.identifiers.candidates() {
                    index.remove((field.as_str(), value), order_id)?;
                }
            }
            previous.is_some()
        };
        txn.commit()?;
        Ok(removed)
    }

    fn write_order(
        txn: &WriteTransaction,
        mut order: Order,
        expected_version: Option<u64>,
        now: i64,
    ) -> StorageResult<Order> {
        let mut table = txn.open_table(ORDERS_TABLE)?;
        let mut index = txn.open_multimap_table(IDENTIFIER_INDEX)?;

        let previous: Option<Order> = match table.get(order.id.as_str())? {
            Some(raw) => Some(serde_json::from_slice(raw.value())?),
            None => None,
        };
        let stored_version = previous.as_ref().map(|p| p.version).unwrap_or(0);

        if let Some(expected) = expected_version
            && expected != stored_version
        {
            return Err(StorageError::VersionConflict {
                order_id: order.id.clone(),
                expected,
                actual: stored_version,
            });
        }

        // Unique identifiers must not belong to another order
        for (field, value) in order.identifiers.candidates() {
            if !field.is_unique() {
                continue;
            }
            for owner in index.get((field.as_str(), value))? {
                let owner = owner?;
                if owner.value() != order.id {
                    return Err(StorageError::DuplicateIdentifier {
                        field,
                        value: value.to_string(),
                        owner: owner.value().to_string(),
                    });
                }
            }
        }

        if let Some(previous) = &previous {
            for (field, value) in previous.identifiers.candidates() {
                index.remove((field.as_str(), value), order.id.as_str())?;
            }
        }
        for (field, value) in order.identifiers.candidates() {
            index.insert((field.as_str(), value), order.id.as_str())?;
        }

        order.version = stored_version.max(order.version) + 1;
        order.updated_at = now;
        let value = serde_json::to_vec(&order)?;
        table.insert(order.id.as_str(), value.as_slice())?;
        Ok(order)
    }
}
