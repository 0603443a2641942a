//! Ledger store: key-value persistence for the ledger's collections.
//!
//! Records are serde-serialized JSON rows in a single indexed
//! `(collection, key)` table. Every multi-record mutation in the
//! services runs through `with_txn`, so the five-effect scan and the
//! settlement either commit in full or not at all. The connection
//! mutex serializes mutations, which the funding-threshold and
//! settlement one-shot checks rely on.

use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{params, Connection, Transaction};
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Collection names used by the services.
pub mod collections {
    pub const EVENTS: &str = "events";
    pub const VAULTS: &str = "vaults";
    pub const INVESTMENTS: &str = "investments";
    pub const TICKETS: &str = "tickets";
    pub const SALES: &str = "sales";
    pub const SCANS: &str = "scans";
    pub const ATTENDANCE: &str = "attendance";
    pub const ESCROW: &str = "escrow";
    pub const SETTLEMENTS: &str = "settlements";
}

#[derive(Clone)]
pub struct LedgerStore {
    conn: Arc<Mutex<Connection>>,
}

impl LedgerStore {
    pub fn open(db_path: &str) -> Result<Self> {
        let conn = Connection::open(db_path).context("open ledger db")?;
        conn.pragma_update(None, "journal_mode", "WAL").ok();
        conn.pragma_update(None, "synchronous", "NORMAL").ok();

        conn.execute(
            "CREATE TABLE IF NOT EXISTS ledger_records (
                collection TEXT NOT NULL,
                key TEXT NOT NULL,
                value TEXT NOT NULL,
                updated_at INTEGER NOT NULL,
                PRIMARY KEY (collection, key)
            )",
            [],
        )?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS counters (
                name TEXT PRIMARY KEY,
                next INTEGER NOT NULL
            )",
            [],
        )?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub async fn get<T: DeserializeOwned>(&self, collection: &str, key: &str) -> Result<Option<T>> {
        let conn = self.conn.lock().await;
        read_one(&conn, collection, key)
    }

    pub async fn list<T: DeserializeOwned>(&self, collection: &str) -> Result<Vec<T>> {
        let conn = self.conn.lock().await;
        read_all(&conn, collection)
    }

    pub async fn put<T: Serialize>(&self, collection: &str, key: &str, record: &T) -> Result<()> {
        let conn = self.conn.lock().await;
        write_one(&conn, collection, key, record)
    }

    /// Run `f` inside a single SQLite transaction. Commits on `Ok`,
    /// rolls back on any `Err`, so partial writes never persist.
    pub async fn with_txn<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut LedgerTxn<'_>) -> Result<T, E>,
        E: From<anyhow::Error>,
    {
        let mut conn = self.conn.lock().await;
        let txn = conn
            .transaction()
            .context("begin ledger transaction")
            .map_err(E::from)?;
        let mut handle = LedgerTxn { txn };
        match f(&mut handle) {
            Ok(out) => {
                handle
                    .txn
                    .commit()
                    .context("commit ledger transaction")
                    .map_err(E::from)?;
                Ok(out)
            }
            // Dropping the transaction rolls it back.
            Err(err) => Err(err),
        }
    }
}

/// Read/write handle scoped to one transaction.
pub struct LedgerTxn<'a> {
    txn: Transaction<'a>,
}

impl LedgerTxn<'_> {
    pub fn get<T: DeserializeOwned>(&self, collection: &str, key: &str) -> Result<Option<T>> {
        read_one(&self.txn, collection, key)
    }

    pub fn list<T: DeserializeOwned>(&self, collection: &str) -> Result<Vec<T>> {
        read_all(&self.txn, collection)
    }

    pub fn put<T: Serialize>(&self, collection: &str, key: &str, record: &T) -> Result<()> {
        write_one(&self.txn, collection, key, record)
    }

    /// Next value of a named monotone counter, starting at 0.
    pub fn next_counter(&self, name: &str) -> Result<i64> {
        self.txn.execute(
            "INSERT INTO counters (name, next) VALUES (?1, 1)
             ON CONFLICT(name) DO UPDATE SET next = next + 1",
            params![name],
        )?;
        let next: i64 = self.txn.query_row(
            "SELECT next FROM counters WHERE name = ?1",
            params![name],
            |row| row.get(0),
        )?;
        Ok(next - 1)
    }
}

fn read_one<T: DeserializeOwned>(conn: &Connection, collection: &str, key: &str) -> Result<Option<T>> {
    let mut stmt = conn.prepare_cached(
        "SELECT value FROM ledger_records WHERE collection = ?1 AND key = ?2 LIMIT 1",
    )?;
    let mut rows = stmt.query(params![collection, key])?;
    let Some(row) = rows.next()? else {
        return Ok(None);
    };
    let raw: String = row.get(0)?;
    let record = serde_json::from_str(&raw)
        .with_context(|| format!("decode {collection} record {key}"))?;
    Ok(Some(record))
}

fn read_all<T: DeserializeOwned>(conn: &Connection, collection: &str) -> Result<Vec<T>> {
    let mut stmt = conn.prepare_cached(
        "SELECT value FROM ledger_records WHERE collection = ?1 ORDER BY updated_at ASC, key ASC",
    )?;
    let rows = stmt.query_map(params![collection], |row| row.get::<_, String>(0))?;

    let mut out = Vec::new();
    for raw in rows {
        let raw = raw.with_context(|| format!("read {collection} record row"))?;
        let record =
            serde_json::from_str(&raw).with_context(|| format!("decode {collection} record"))?;
        out.push(record);
    }
    Ok(out)
}

fn write_one<T: Serialize>(conn: &Connection, collection: &str, key: &str, record: &T) -> Result<()> {
    let value = serde_json::to_string(record)
        .with_context(|| format!("encode {collection} record {key}"))?;
    conn.execute(
        "INSERT INTO ledger_records (collection, key, value, updated_at)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(collection, key) DO UPDATE SET
            value = excluded.value,
            updated_at = excluded.updated_at",
        params![collection, key, value, Utc::now().timestamp_micros()],
    )?;
    Ok(())
}
