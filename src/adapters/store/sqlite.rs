//! SQLite-backed graph store over the precomputed method-call tables.
//!
//! Traversal never writes; the ingest helpers exist for tooling and tests.
//! Every worker gets its own connection via [`SqliteStoreProvider`], so
//! concurrent read queries never share a connection.

use crate::domain::edge::{CallEdge, CallType, ExtendedData, LineWindow};
use crate::domain::method;
use crate::domain::multi_impl::DispatchKind;
use crate::domain::ports::{GraphStore, ImplTarget, MethodId, StoreProvider};
use anyhow::{Context as _, Result, ensure};
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

const EDGE_COLUMNS: &str = "call_id, call_type, enabled, caller_method_hash, caller_full_method, \
     caller_class_name, caller_line_number, callee_method_hash, callee_full_method, \
     callee_class_name";

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS method_call (
    call_id INTEGER PRIMARY KEY,
    call_type TEXT NOT NULL,
    enabled INTEGER NOT NULL,
    caller_method_hash TEXT NOT NULL,
    caller_full_method TEXT NOT NULL,
    caller_class_name TEXT NOT NULL,
    caller_line_number INTEGER,
    callee_method_hash TEXT NOT NULL,
    callee_full_method TEXT NOT NULL,
    callee_class_name TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_mc_caller ON method_call (caller_method_hash, call_id);
CREATE INDEX IF NOT EXISTS idx_mc_callee ON method_call (callee_method_hash);
CREATE INDEX IF NOT EXISTS idx_mc_caller_class ON method_call (caller_class_name);

CREATE TABLE IF NOT EXISTS extended_data (
    call_id INTEGER NOT NULL,
    data_type TEXT NOT NULL,
    data_value TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_ed_call ON extended_data (call_id);

CREATE TABLE IF NOT EXISTS manual_extended_data (
    caller_full_method TEXT NOT NULL,
    callee_full_method TEXT NOT NULL,
    callee_occurrence INTEGER NOT NULL,
    data_type TEXT NOT NULL,
    data_value TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS method_annotation (
    method_hash TEXT NOT NULL,
    annotation TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS method_line (
    method_hash TEXT NOT NULL,
    full_method TEXT NOT NULL,
    simple_class_name TEXT NOT NULL,
    min_line INTEGER NOT NULL,
    max_line INTEGER NOT NULL
);
";

fn edge_from_row(row: &Row<'_>) -> rusqlite::Result<CallEdge> {
    let call_type_text: String = row.get(1)?;
    let call_type = call_type_text.parse::<CallType>().map_err(|err| {
        rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, err.into())
    })?;
    Ok(CallEdge {
        call_id: row.get(0)?,
        call_type,
        enabled: row.get(2)?,
        caller_method_hash: row.get(3)?,
        caller_full_method: row.get(4)?,
        caller_class_name: row.get(5)?,
        caller_line_number: row.get(6)?,
        callee_method_hash: row.get(7)?,
        callee_full_method: row.get(8)?,
        callee_class_name: row.get(9)?,
    })
}

/// Opens one connection per worker against a database file.
#[derive(Debug, Clone)]
pub struct SqliteStoreProvider {
    path: PathBuf,
}

impl SqliteStoreProvider {
    pub fn new(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        ensure!(
            path.is_file(),
            "method-call database does not exist: {} (ingest the edge table first)",
            path.display()
        );
        Ok(Self { path })
    }
}

impl StoreProvider for SqliteStoreProvider {
    fn open_store(&self) -> Result<Box<dyn GraphStore>> {
        Ok(Box::new(SqliteStore::open(&self.path)?))
    }
}

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open database {}", path.display()))?;
        Ok(Self { conn })
    }

    /// Fresh in-memory database with the full schema applied.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("failed to open in-memory database")?;
        conn.execute_batch(SCHEMA).context("failed to apply schema")?;
        Ok(Self { conn })
    }

    /// Apply the method-call schema to an existing database.
    pub fn apply_schema(&self) -> Result<()> {
        self.conn
            .execute_batch(SCHEMA)
            .context("failed to apply schema")
    }

    // ---- ingest helpers (tooling and tests; never used during traversal) ----

    pub fn insert_edge(&self, edge: &CallEdge) -> Result<()> {
        self.conn
            .execute(
                &format!("INSERT INTO method_call ({EDGE_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"),
                params![
                    edge.call_id,
                    edge.call_type.as_str(),
                    edge.enabled,
                    edge.caller_method_hash,
                    edge.caller_full_method,
                    edge.caller_class_name,
                    edge.caller_line_number,
                    edge.callee_method_hash,
                    edge.callee_full_method,
                    edge.callee_class_name,
                ],
            )
            .context("failed to insert edge")?;
        Ok(())
    }

    pub fn insert_extended_data(&self, call_id: i64, data: &ExtendedData) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO extended_data (call_id, data_type, data_value) VALUES (?1, ?2, ?3)",
                params![call_id, data.data_type, data.data_value],
            )
            .context("failed to insert extended data")?;
        Ok(())
    }

    pub fn insert_manual_override(
        &self,
        caller_full_method: &str,
        callee_full_method: &str,
        callee_occurrence: u64,
        data: &ExtendedData,
    ) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO manual_extended_data \
                 (caller_full_method, callee_full_method, callee_occurrence, data_type, data_value) \
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    caller_full_method,
                    callee_full_method,
                    callee_occurrence as i64,
                    data.data_type,
                    data.data_value,
                ],
            )
            .context("failed to insert manual override")?;
        Ok(())
    }

    pub fn insert_annotation(&self, method_hash: &str, annotation: &str) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO method_annotation (method_hash, annotation) VALUES (?1, ?2)",
                params![method_hash, annotation],
            )
            .context("failed to insert annotation")?;
        Ok(())
    }

    pub fn insert_method_line(
        &self,
        method_hash: &str,
        full_method: &str,
        simple_class_name: &str,
        min_line: u32,
        max_line: u32,
    ) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO method_line \
                 (method_hash, full_method, simple_class_name, min_line, max_line) \
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![method_hash, full_method, simple_class_name, min_line, max_line],
            )
            .context("failed to insert method line span")?;
        Ok(())
    }
}

impl GraphStore for SqliteStore {
    fn next_edge(
        &self,
        caller_hash: &str,
        after_call_id: i64,
        line_window: Option<&LineWindow>,
    ) -> Result<Option<CallEdge>> {
        let edge = match line_window {
            None => self
                .conn
                .query_row(
                    &format!(
                        "SELECT {EDGE_COLUMNS} FROM method_call \
                         WHERE caller_method_hash = ?1 AND call_id > ?2 \
                         ORDER BY call_id LIMIT 1"
                    ),
                    params![caller_hash, after_call_id],
                    edge_from_row,
                )
                .optional(),
            Some(window) => self
                .conn
                .query_row(
                    &format!(
                        "SELECT {EDGE_COLUMNS} FROM method_call \
                         WHERE caller_method_hash = ?1 AND call_id > ?2 \
                         AND caller_line_number >= ?3 AND caller_line_number <= ?4 \
                         ORDER BY call_id LIMIT 1"
                    ),
                    params![caller_hash, after_call_id, window.start, window.end],
                    edge_from_row,
                )
                .optional(),
        };
        edge.context("next-edge query failed")
    }

    fn implementations_of(
        &self,
        dispatch_hash: &str,
        kind: DispatchKind,
    ) -> Result<Vec<ImplTarget>> {
        let mut stmt = self.conn.prepare(
            "SELECT callee_class_name, callee_full_method FROM method_call \
             WHERE caller_method_hash = ?1 AND call_type = ?2 AND enabled = 1 \
             ORDER BY call_id",
        )?;
        let rows = stmt.query_map(params![dispatch_hash, kind.call_type().as_str()], |row| {
            Ok(ImplTarget {
                callee_class_name: row.get(0)?,
                callee_full_method: row.get(1)?,
            })
        })?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .context("implementations query failed")
    }

    fn occurrence_index(
        &self,
        callee_hash: &str,
        caller_full_method: &str,
        upto_call_id: i64,
    ) -> Result<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM method_call \
             WHERE callee_method_hash = ?1 AND caller_full_method = ?2 AND call_id <= ?3",
            params![callee_hash, caller_full_method, upto_call_id],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn find_entry_methods(&self, class_name: &str, method_prefix: &str) -> Result<Vec<MethodId>> {
        let mut stmt = self.conn.prepare(
            "SELECT DISTINCT caller_method_hash, caller_full_method FROM method_call \
             WHERE caller_class_name = ?1 OR caller_full_method LIKE ?2 \
             ORDER BY caller_full_method",
        )?;
        let like_prefix = format!("{class_name}:%");
        let rows = stmt.query_map(params![class_name, like_prefix], |row| {
            Ok(MethodId {
                method_hash: row.get(0)?,
                full_method: row.get(1)?,
            })
        })?;
        let mut found = Vec::new();
        for row in rows {
            let candidate = row?;
            if method::method_with_args(&candidate.full_method).starts_with(method_prefix) {
                found.push(candidate);
            }
        }
        Ok(found)
    }

    fn find_method_by_line(&self, class_name: &str, line: u32) -> Result<Option<MethodId>> {
        let like_prefix = format!("{class_name}:%");
        self.conn
            .query_row(
                "SELECT method_hash, full_method FROM method_line \
                 WHERE (simple_class_name = ?1 OR full_method LIKE ?2) \
                 AND min_line <= ?3 AND max_line >= ?3 LIMIT 1",
                params![class_name, like_prefix, line],
                |row| {
                    Ok(MethodId {
                        method_hash: row.get(0)?,
                        full_method: row.get(1)?,
                    })
                },
            )
            .optional()
            .context("method-by-line query failed")
    }

    fn class_methods(&self, class_name: &str) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT DISTINCT caller_full_method FROM method_call \
             WHERE caller_class_name = ?1 OR caller_full_method LIKE ?2 \
             ORDER BY caller_full_method",
        )?;
        let like_prefix = format!("{class_name}:%");
        let rows = stmt.query_map(params![class_name, like_prefix], |row| row.get(0))?;
        rows.collect::<rusqlite::Result<Vec<String>>>()
            .context("class-methods query failed")
    }

    fn multi_dispatch_hashes(&self, kind: DispatchKind) -> Result<HashSet<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT caller_method_hash FROM method_call \
             WHERE call_type = ?1 AND enabled = 1 \
             GROUP BY caller_method_hash HAVING COUNT(*) > 1",
        )?;
        let rows = stmt.query_map(params![kind.call_type().as_str()], |row| row.get(0))?;
        rows.collect::<rusqlite::Result<HashSet<String>>>()
            .context("multi-dispatch query failed")
    }

    fn detected_extended_call_ids(&self) -> Result<HashSet<i64>> {
        let mut stmt = self
            .conn
            .prepare("SELECT DISTINCT call_id FROM extended_data")?;
        let rows = stmt.query_map([], |row| row.get(0))?;
        rows.collect::<rusqlite::Result<HashSet<i64>>>()
            .context("detected-extended query failed")
    }

    fn extended_data_by_call_id(&self, call_id: i64) -> Result<Option<ExtendedData>> {
        self.conn
            .query_row(
                "SELECT data_type, data_value FROM extended_data WHERE call_id = ?1 LIMIT 1",
                params![call_id],
                |row| {
                    Ok(ExtendedData {
                        data_type: row.get(0)?,
                        data_value: row.get(1)?,
                    })
                },
            )
            .optional()
            .context("extended-data query failed")
    }

    fn manual_override_pairs(&self) -> Result<HashMap<String, HashSet<String>>> {
        let mut stmt = self.conn.prepare(
            "SELECT DISTINCT caller_full_method, callee_full_method FROM manual_extended_data",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;
        let mut pairs: HashMap<String, HashSet<String>> = HashMap::new();
        for row in rows {
            let (caller, callee) = row?;
            pairs.entry(caller).or_default().insert(callee);
        }
        Ok(pairs)
    }

    fn manual_override(
        &self,
        caller_full_method: &str,
        callee_full_method: &str,
        occurrence: u64,
    ) -> Result<Vec<ExtendedData>> {
        let mut stmt = self.conn.prepare(
            "SELECT data_type, data_value FROM manual_extended_data \
             WHERE caller_full_method = ?1 AND callee_full_method = ?2 AND callee_occurrence = ?3",
        )?;
        let rows = stmt.query_map(
            params![caller_full_method, callee_full_method, occurrence as i64],
            |row| {
                Ok(ExtendedData {
                    data_type: row.get(0)?,
                    data_value: row.get(1)?,
                })
            },
        )?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .context("manual-override query failed")
    }

    fn load_annotations(&self) -> Result<HashMap<String, Vec<String>>> {
        let mut stmt = self.conn.prepare(
            "SELECT method_hash, annotation FROM method_annotation ORDER BY method_hash, annotation",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;
        let mut annotations: HashMap<String, Vec<String>> = HashMap::new();
        for row in rows {
            let (hash, name) = row?;
            annotations.entry(hash).or_default().push(name);
        }
        Ok(annotations)
    }
}
