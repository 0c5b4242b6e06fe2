//! redb-based storage layer for the back-office
//!
//! # Tables
//!
//! | Table | Key | Value | Purpose |
//! |-------|-----|-------|---------|
//! | `orders` | `request_id` | `OrderRecord` | Order records |
//! | `quotes` | `request_id` | `QuoteRecord` | Quote records |
//! | `order_details` | `request_id` | `OrderDetailsRecord` | Fulfillment side-records |
//! | `tokens` | `(flavor, token)` | `ConfirmationToken` | Confirmation artifacts |
//! | `token_index` | `(flavor, request_id)` | token | Live-token lookup per request |
//! | `status_emails` | `request_id` | `StatusEmailRecord` | Notification dedup/retry |
//! | `cost_chart` | setting key | `CostSettingRow` | Cost reference data |
//! | `diamond_chart` | row number | `DiamondPriceEntry` | Diamond price bands |
//! | `clarity_groups` | detail grade | composite grade | Small-stone grading map |
//! | `submissions` | `request_id` | `()` | Inbound dedup |
//! | `meta` | `()` | `u64` | Diamond chart row counter |
//!
//! # Durability
//!
//! redb commits are persistent as soon as `commit()` returns (copy-on-write
//! with atomic pointer swap), so a status change and its side-records either
//! all land or none do. Every multi-record action runs inside one write
//! transaction.

use redb::{
    Database, ReadableDatabase, ReadableTable, TableDefinition, WriteTransaction,
};
use shared::models::{
    ClarityGroups, CostSettingRow, DiamondPriceEntry, OrderDetailsRecord, OrderRecord,
    QuoteRecord, StatusEmailRecord, TokenFlavor,
};
use shared::models::token::ConfirmationToken;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

const ORDERS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("orders");
const QUOTES_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("quotes");
const ORDER_DETAILS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("order_details");
const TOKENS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("tokens");
const TOKEN_INDEX_TABLE: TableDefinition<&str, &str> = TableDefinition::new("token_index");
const STATUS_EMAILS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("status_emails");
const COST_CHART_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("cost_chart");
const DIAMOND_CHART_TABLE: TableDefinition<u64, &[u8]> = TableDefinition::new("diamond_chart");
const CLARITY_GROUPS_TABLE: TableDefinition<&str, &str> = TableDefinition::new("clarity_groups");
const SUBMISSIONS_TABLE: TableDefinition<&str, ()> = TableDefinition::new("submissions");
const META_TABLE: TableDefinition<&str, u64> = TableDefinition::new("meta");

const DIAMOND_ROW_COUNTER_KEY: &str = "diamond_row";

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
}

pub type StorageResult<T> = Result<T, StorageError>;

impl From<StorageError> for shared::AppError {
    fn from(err: StorageError) -> Self {
        shared::AppError::storage(err.to_string())
    }
}

/// Back-office storage backed by redb
#[derive(Clone)]
pub struct BackofficeStorage {
    db: Arc<Database>,
}

impl BackofficeStorage {
    /// Open or create the database at the given path
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let db = Database::create(path)?;
        let storage = Self { db: Arc::new(db) };
        storage.init_tables()?;
        Ok(storage)
    }

    /// Open an in-memory database (tests)
    pub fn open_in_memory() -> StorageResult<Self> {
        let db = Database::builder().create_with_backend(redb::backends::InMemoryBackend::new())?;
        let storage = Self { db: Arc::new(db) };
        storage.init_tables()?;
        Ok(storage)
    }

    fn init_tables(&self) -> StorageResult<()> {
        let txn = self.db.begin_write()?;
        {
            let _ = txn.open_table(ORDERS_TABLE)?;
            let _ = txn.open_table(QUOTES_TABLE)?;
            let _ = txn.open_table(ORDER_DETAILS_TABLE)?;
            let _ = txn.open_table(TOKENS_TABLE)?;
            let _ = txn.open_table(TOKEN_INDEX_TABLE)?;
            let _ = txn.open_table(STATUS_EMAILS_TABLE)?;
            let _ = txn.open_table(COST_CHART_TABLE)?;
            let _ = txn.open_table(DIAMOND_CHART_TABLE)?;
            let _ = txn.open_table(CLARITY_GROUPS_TABLE)?;
            let _ = txn.open_table(SUBMISSIONS_TABLE)?;
            let mut meta = txn.open_table(META_TABLE)?;
            if meta.get(DIAMOND_ROW_COUNTER_KEY)?.is_none() {
                meta.insert(DIAMOND_ROW_COUNTER_KEY, 0u64)?;
            }
        }
        txn.commit()?;
        Ok(())
    }

    /// Begin a write transaction for a multi-record action
    pub fn begin_write(&self) -> StorageResult<WriteTransaction> {
        Ok(self.db.begin_write()?)
    }

    // ========== Orders ==========

    pub fn get_order(&self, request_id: &str) -> StorageResult<Option<OrderRecord>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(ORDERS_TABLE)?;
        match table.get(request_id)? {
            Some(value) => {
                let order: OrderRecord = serde_json::from_slice(value.value())?;
                Ok(Some(order))
            }
            None => Ok(None),
        }
    }

    /// Read an order inside a write transaction (read-for-update)
    pub fn get_order_txn(
        &self,
        txn: &WriteTransaction,
        request_id: &str,
    ) -> StorageResult<Option<OrderRecord>> {
        let table = txn.open_table(ORDERS_TABLE)?;
        match table.get(request_id)? {
            Some(value) => {
                let order: OrderRecord = serde_json::from_slice(value.value())?;
                Ok(Some(order))
            }
            None => Ok(None),
        }
    }

    pub fn put_order(&self, txn: &WriteTransaction, order: &OrderRecord) -> StorageResult<()> {
        let mut table = txn.open_table(ORDERS_TABLE)?;
        let bytes = serde_json::to_vec(order)?;
        table.insert(order.request_id.as_str(), bytes.as_slice())?;
        Ok(())
    }

    /// Upsert in a transaction of its own
    pub fn upsert_order(&self, order: &OrderRecord) -> StorageResult<()> {
        let txn = self.begin_write()?;
        self.put_order(&txn, order)?;
        txn.commit()?;
        Ok(())
    }

    pub fn list_orders(&self) -> StorageResult<Vec<OrderRecord>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(ORDERS_TABLE)?;
        let mut orders = Vec::new();
        for entry in table.iter()? {
            let (_, value) = entry?;
            orders.push(serde_json::from_slice(value.value())?);
        }
        Ok(orders)
    }

    // ========== Quotes ==========

    pub fn get_quote(&self, request_id: &str) -> StorageResult<Option<QuoteRecord>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(QUOTES_TABLE)?;
        match table.get(request_id)? {
            Some(value) => {
                let quote: QuoteRecord = serde_json::from_slice(value.value())?;
                Ok(Some(quote))
            }
            None => Ok(None),
        }
    }

    pub fn get_quote_txn(
        &self,
        txn: &WriteTransaction,
        request_id: &str,
    ) -> StorageResult<Option<QuoteRecord>> {
        let table = txn.open_table(QUOTES_TABLE)?;
        match table.get(request_id)? {
            Some(value) => {
                let quote: QuoteRecord = serde_json::from_slice(value.value())?;
                Ok(Some(quote))
            }
            None => Ok(None),
        }
    }

    pub fn put_quote(&self, txn: &WriteTransaction, quote: &QuoteRecord) -> StorageResult<()> {
        let mut table = txn.open_table(QUOTES_TABLE)?;
        let bytes = serde_json::to_vec(quote)?;
        table.insert(quote.request_id.as_str(), bytes.as_slice())?;
        Ok(())
    }

    pub fn upsert_quote(&self, quote: &QuoteRecord) -> StorageResult<()> {
        let txn = self.begin_write()?;
        self.put_quote(&txn, quote)?;
        txn.commit()?;
        Ok(())
    }

    pub fn list_quotes(&self) -> StorageResult<Vec<QuoteRecord>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(QUOTES_TABLE)?;
        let mut quotes = Vec::new();
        for entry in table.iter()? {
            let (_, value) = entry?;
            quotes.push(serde_json::from_slice(value.value())?);
        }
        Ok(quotes)
    }

    // ========== Order details (fulfillment side-records) ==========

    pub fn get_order_details(
        &self,
        request_id: &str,
    ) -> StorageResult<Option<OrderDetailsRecord>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(ORDER_DETAILS_TABLE)?;
        match table.get(request_id)? {
            Some(value) => {
                let details: OrderDetailsRecord = serde_json::from_slice(value.value())?;
                Ok(Some(details))
            }
            None => Ok(None),
        }
    }

    pub fn get_order_details_txn(
        &self,
        txn: &WriteTransaction,
        request_id: &str,
    ) -> StorageResult<Option<OrderDetailsRecord>> {
        let table = txn.open_table(ORDER_DETAILS_TABLE)?;
        match table.get(request_id)? {
            Some(value) => {
                let details: OrderDetailsRecord = serde_json::from_slice(value.value())?;
                Ok(Some(details))
            }
            None => Ok(None),
        }
    }

    pub fn put_order_details(
        &self,
        txn: &WriteTransaction,
        details: &OrderDetailsRecord,
    ) -> StorageResult<()> {
        let mut table = txn.open_table(ORDER_DETAILS_TABLE)?;
        let bytes = serde_json::to_vec(details)?;
        table.insert(details.request_id.as_str(), bytes.as_slice())?;
        Ok(())
    }

    // ========== Tokens ==========

    fn token_key(flavor: TokenFlavor, token: &str) -> String {
        format!("{}:{}", flavor.prefix(), token)
    }

    fn token_index_key(flavor: TokenFlavor, request_id: &str) -> String {
        format!("{}:{}", flavor.prefix(), request_id)
    }

    pub fn get_token(
        &self,
        flavor: TokenFlavor,
        token: &str,
    ) -> StorageResult<Option<ConfirmationToken>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(TOKENS_TABLE)?;
        match table.get(Self::token_key(flavor, token).as_str())? {
            Some(value) => {
                let token: ConfirmationToken = serde_json::from_slice(value.value())?;
                Ok(Some(token))
            }
            None => Ok(None),
        }
    }

    pub fn get_token_txn(
        &self,
        txn: &WriteTransaction,
        flavor: TokenFlavor,
        token: &str,
    ) -> StorageResult<Option<ConfirmationToken>> {
        let table = txn.open_table(TOKENS_TABLE)?;
        match table.get(Self::token_key(flavor, token).as_str())? {
            Some(value) => {
                let token: ConfirmationToken = serde_json::from_slice(value.value())?;
                Ok(Some(token))
            }
            None => Ok(None),
        }
    }

    pub fn put_token(
        &self,
        txn: &WriteTransaction,
        token: &ConfirmationToken,
    ) -> StorageResult<()> {
        let mut table = txn.open_table(TOKENS_TABLE)?;
        let bytes = serde_json::to_vec(token)?;
        table.insert(
            Self::token_key(token.flavor, &token.token).as_str(),
            bytes.as_slice(),
        )?;
        Ok(())
    }

    /// Live token for a request id, via the secondary index
    pub fn get_indexed_token(
        &self,
        flavor: TokenFlavor,
        request_id: &str,
    ) -> StorageResult<Option<String>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(TOKEN_INDEX_TABLE)?;
        Ok(table
            .get(Self::token_index_key(flavor, request_id).as_str())?
            .map(|guard| guard.value().to_string()))
    }

    pub fn put_token_index(
        &self,
        txn: &WriteTransaction,
        flavor: TokenFlavor,
        request_id: &str,
        token: &str,
    ) -> StorageResult<()> {
        let mut table = txn.open_table(TOKEN_INDEX_TABLE)?;
        table.insert(Self::token_index_key(flavor, request_id).as_str(), token)?;
        Ok(())
    }

    // ========== Status email records ==========

    pub fn get_status_email(&self, request_id: &str) -> StorageResult<Option<StatusEmailRecord>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(STATUS_EMAILS_TABLE)?;
        match table.get(request_id)? {
            Some(value) => {
                let record: StatusEmailRecord = serde_json::from_slice(value.value())?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    pub fn upsert_status_email(&self, record: &StatusEmailRecord) -> StorageResult<()> {
        let txn = self.begin_write()?;
        {
            let mut table = txn.open_table(STATUS_EMAILS_TABLE)?;
            let bytes = serde_json::to_vec(record)?;
            table.insert(record.request_id.as_str(), bytes.as_slice())?;
        }
        txn.commit()?;
        Ok(())
    }

    // ========== Cost chart ==========

    pub fn list_cost_settings(&self) -> StorageResult<Vec<CostSettingRow>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(COST_CHART_TABLE)?;
        let mut rows = Vec::new();
        for entry in table.iter()? {
            let (_, value) = entry?;
            rows.push(serde_json::from_slice(value.value())?);
        }
        Ok(rows)
    }

    pub fn upsert_cost_setting(&self, row: &CostSettingRow) -> StorageResult<()> {
        let txn = self.begin_write()?;
        {
            let mut table = txn.open_table(COST_CHART_TABLE)?;
            let bytes = serde_json::to_vec(row)?;
            table.insert(row.key.as_str(), bytes.as_slice())?;
        }
        txn.commit()?;
        Ok(())
    }

    pub fn delete_cost_setting(&self, key: &str) -> StorageResult<()> {
        let txn = self.begin_write()?;
        {
            let mut table = txn.open_table(COST_CHART_TABLE)?;
            table.remove(key)?;
        }
        txn.commit()?;
        Ok(())
    }

    // ========== Diamond price chart ==========

    pub fn list_diamond_entries(&self) -> StorageResult<Vec<(u64, DiamondPriceEntry)>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(DIAMOND_CHART_TABLE)?;
        let mut rows = Vec::new();
        for entry in table.iter()? {
            let (key, value) = entry?;
            rows.push((key.value(), serde_json::from_slice(value.value())?));
        }
        Ok(rows)
    }

    /// Insert a new band (fresh row number) or overwrite an existing row
    pub fn upsert_diamond_entry(
        &self,
        row_number: Option<u64>,
        entry: &DiamondPriceEntry,
    ) -> StorageResult<u64> {
        let txn = self.begin_write()?;
        let row = {
            let row = match row_number {
                Some(row) => row,
                None => {
                    let mut meta = txn.open_table(META_TABLE)?;
                    let next = meta
                        .get(DIAMOND_ROW_COUNTER_KEY)?
                        .map(|guard| guard.value())
                        .unwrap_or(0)
                        + 1;
                    meta.insert(DIAMOND_ROW_COUNTER_KEY, next)?;
                    next
                }
            };
            let mut table = txn.open_table(DIAMOND_CHART_TABLE)?;
            let bytes = serde_json::to_vec(entry)?;
            table.insert(row, bytes.as_slice())?;
            row
        };
        txn.commit()?;
        Ok(row)
    }

    pub fn delete_diamond_entry(&self, row_number: u64) -> StorageResult<()> {
        let txn = self.begin_write()?;
        {
            let mut table = txn.open_table(DIAMOND_CHART_TABLE)?;
            table.remove(row_number)?;
        }
        txn.commit()?;
        Ok(())
    }

    // ========== Clarity groups ==========

    pub fn load_clarity_groups(&self) -> StorageResult<ClarityGroups> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(CLARITY_GROUPS_TABLE)?;
        let mut groups = HashMap::new();
        for entry in table.iter()? {
            let (key, value) = entry?;
            groups.insert(key.value().to_string(), value.value().to_string());
        }
        Ok(ClarityGroups::new(groups))
    }

    pub fn put_clarity_group(&self, detail: &str, composite: &str) -> StorageResult<()> {
        let txn = self.begin_write()?;
        {
            let mut table = txn.open_table(CLARITY_GROUPS_TABLE)?;
            table.insert(detail.to_uppercase().as_str(), composite.to_uppercase().as_str())?;
        }
        txn.commit()?;
        Ok(())
    }

    // ========== Inbound submission dedup ==========

    /// Check-and-mark a submission id; returns true if it was already seen.
    /// Runs in the caller's transaction so the mark commits with the record.
    pub fn check_and_mark_submission(
        &self,
        txn: &WriteTransaction,
        request_id: &str,
    ) -> StorageResult<bool> {
        let mut table = txn.open_table(SUBMISSIONS_TABLE)?;
        if table.get(request_id)?.is_some() {
            return Ok(true);
        }
        table.insert(request_id, ())?;
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::models::OrderStatus;

    #[test]
    fn test_order_roundtrip() {
        let storage = BackofficeStorage::open_in_memory().unwrap();
        let mut order = OrderRecord::new("HW-1001", 1_700_000_000_000);
        order.details.metal = Some("18K Yellow Gold".to_string());
        storage.upsert_order(&order).unwrap();

        let loaded = storage.get_order("HW-1001").unwrap().unwrap();
        assert_eq!(loaded, order);
        assert!(storage.get_order("HW-9999").unwrap().is_none());
    }

    #[test]
    fn test_upsert_converges() {
        let storage = BackofficeStorage::open_in_memory().unwrap();
        let mut order = OrderRecord::new("HW-1001", 0);
        storage.upsert_order(&order).unwrap();
        order.status = OrderStatus::Acknowledged;
        storage.upsert_order(&order).unwrap();
        storage.upsert_order(&order).unwrap();

        assert_eq!(storage.list_orders().unwrap().len(), 1);
        assert_eq!(
            storage.get_order("HW-1001").unwrap().unwrap().status,
            OrderStatus::Acknowledged
        );
    }

    #[test]
    fn test_multi_table_transaction_commits_together() {
        let storage = BackofficeStorage::open_in_memory().unwrap();
        let order = OrderRecord::new("HW-1001", 0);
        let mut details = OrderDetailsRecord::new("HW-1001");
        details.set("tracking_number", "XYZ").unwrap();

        let txn = storage.begin_write().unwrap();
        storage.put_order(&txn, &order).unwrap();
        storage.put_order_details(&txn, &details).unwrap();
        txn.commit().unwrap();

        assert!(storage.get_order("HW-1001").unwrap().is_some());
        assert_eq!(
            storage
                .get_order_details("HW-1001")
                .unwrap()
                .unwrap()
                .get("tracking_number"),
            Some("XYZ")
        );
    }

    #[test]
    fn test_uncommitted_transaction_discards_all_writes() {
        let storage = BackofficeStorage::open_in_memory().unwrap();
        {
            let txn = storage.begin_write().unwrap();
            storage
                .put_order(&txn, &OrderRecord::new("HW-1001", 0))
                .unwrap();
            // txn dropped without commit
        }
        assert!(storage.get_order("HW-1001").unwrap().is_none());
    }

    #[test]
    fn test_diamond_chart_row_numbers() {
        let storage = BackofficeStorage::open_in_memory().unwrap();
        let entry = DiamondPriceEntry {
            clarity: "VS1".into(),
            color: "F".into(),
            weight_min: 0.3,
            weight_max: Some(1.0),
            price_per_ct: 4000.0,
            notes: None,
        };
        let row1 = storage.upsert_diamond_entry(None, &entry).unwrap();
        let row2 = storage.upsert_diamond_entry(None, &entry).unwrap();
        assert_ne!(row1, row2);

        // Overwrite in place keeps the row number
        let row = storage.upsert_diamond_entry(Some(row1), &entry).unwrap();
        assert_eq!(row, row1);
        assert_eq!(storage.list_diamond_entries().unwrap().len(), 2);

        storage.delete_diamond_entry(row1).unwrap();
        assert_eq!(storage.list_diamond_entries().unwrap().len(), 1);
    }

    #[test]
    fn test_submission_dedup() {
        let storage = BackofficeStorage::open_in_memory().unwrap();
        let txn = storage.begin_write().unwrap();
        assert!(!storage.check_and_mark_submission(&txn, "HW-1001").unwrap());
        assert!(storage.check_and_mark_submission(&txn, "HW-1001").unwrap());
        txn.commit().unwrap();

        let txn = storage.begin_write().unwrap();
        assert!(storage.check_and_mark_submission(&txn, "HW-1001").unwrap());
    }

    #[test]
    fn test_clarity_groups_roundtrip() {
        let storage = BackofficeStorage::open_in_memory().unwrap();
        storage.put_clarity_group("vvs1", "if-vvs").unwrap();
        storage.put_clarity_group("VVS2", "IF-VVS").unwrap();

        let groups = storage.load_clarity_groups().unwrap();
        assert_eq!(groups.composite_for("VVS1"), Some("IF-VVS"));
        assert_eq!(groups.composite_for("vvs2"), Some("IF-VVS"));
    }
}
