//! SQLite-backed store. Single-process writer; a mutex serializes all
//! access, and every compound operation runs in a transaction.

use std::path::Path;
use std::str::FromStr;
use std::sync::Mutex;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension, params};

use panewatch_core::types::{
    AdapterCapabilities, AdapterRecord, EventEnvelope, InboxDropReason, InboxRow, InboxStatus,
    Pane, Runtime, StateRow, Target, TargetHealth,
};

use crate::error::StoreError;
use crate::ops::{PurgeStats, Store, SyncOutcome};
use crate::redact::redact_payload;

/// Current schema version. Migrations run exactly once per version bump.
const SCHEMA_VERSION: i64 = 1;

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) a database file and run migrations.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| StoreError::Corrupt(format!("cannot create db dir: {e}")))?;
        }
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.migrate()?;
        Ok(store)
    }

    /// In-memory database for tests.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.migrate()?;
        Ok(store)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Connection> {
        // Poisoning only happens if a panic occurred while holding the
        // lock; recover the guard rather than cascading.
        match self.conn.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Apply migrations exactly once.
    fn migrate(&self) -> Result<(), StoreError> {
        let conn = self.lock();
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);",
        )?;
        let current: Option<i64> = conn
            .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| {
                row.get(0)
            })
            .optional()?;

        if current == Some(SCHEMA_VERSION) {
            return Ok(());
        }

        conn.execute_batch(
            "BEGIN;
             CREATE TABLE IF NOT EXISTS targets (
                 target_id    TEXT PRIMARY KEY,
                 name         TEXT NOT NULL,
                 kind         TEXT NOT NULL,
                 connection   TEXT,
                 health       TEXT NOT NULL,
                 is_default   INTEGER NOT NULL DEFAULT 0,
                 last_seen_at TEXT,
                 updated_at   TEXT NOT NULL
             );
             CREATE TABLE IF NOT EXISTS panes (
                 target_id     TEXT NOT NULL,
                 pane_id       TEXT NOT NULL,
                 session_name  TEXT NOT NULL,
                 window_id     TEXT NOT NULL,
                 window_name   TEXT NOT NULL,
                 current_cmd   TEXT NOT NULL,
                 current_pid   INTEGER,
                 tty           TEXT NOT NULL,
                 current_path  TEXT NOT NULL,
                 history_bytes INTEGER NOT NULL DEFAULT 0,
                 title         TEXT NOT NULL,
                 updated_at    TEXT NOT NULL,
                 PRIMARY KEY (target_id, pane_id)
             );
             CREATE TABLE IF NOT EXISTS runtimes (
                 runtime_id TEXT PRIMARY KEY,
                 target_id  TEXT NOT NULL,
                 pane_id    TEXT NOT NULL,
                 pane_epoch INTEGER NOT NULL,
                 agent_type TEXT NOT NULL,
                 boot_id    TEXT NOT NULL,
                 pid        INTEGER,
                 started_at TEXT NOT NULL,
                 ended_at   TEXT
             );
             CREATE INDEX IF NOT EXISTS idx_runtimes_pane
                 ON runtimes (target_id, pane_id, ended_at);
             CREATE TABLE IF NOT EXISTS adapters (
                 name             TEXT PRIMARY KEY,
                 agent_type       TEXT NOT NULL UNIQUE,
                 contract_version TEXT NOT NULL,
                 capabilities     TEXT NOT NULL,
                 enabled          INTEGER NOT NULL DEFAULT 1,
                 updated_at       TEXT NOT NULL
             );
             CREATE TABLE IF NOT EXISTS events (
                 ingest_seq  INTEGER PRIMARY KEY AUTOINCREMENT,
                 event_id    TEXT NOT NULL,
                 event_type  TEXT NOT NULL,
                 source      TEXT NOT NULL,
                 dedupe_key  TEXT NOT NULL UNIQUE,
                 event_time  TEXT NOT NULL,
                 ingested_at TEXT NOT NULL,
                 runtime_id  TEXT,
                 target_id   TEXT NOT NULL,
                 pane_id     TEXT NOT NULL,
                 pid         INTEGER,
                 start_hint  TEXT,
                 raw_payload TEXT NOT NULL
             );
             CREATE INDEX IF NOT EXISTS idx_events_runtime
                 ON events (runtime_id, event_time, ingest_seq);
             CREATE TABLE IF NOT EXISTS event_inbox (
                 inbox_id         INTEGER PRIMARY KEY AUTOINCREMENT,
                 dedupe_key       TEXT NOT NULL UNIQUE,
                 event_json       TEXT NOT NULL,
                 status           TEXT NOT NULL,
                 drop_reason      TEXT,
                 bound_runtime_id TEXT,
                 ingested_at      TEXT NOT NULL,
                 updated_at       TEXT NOT NULL
             );
             CREATE TABLE IF NOT EXISTS states (
                 target_id     TEXT NOT NULL,
                 pane_id       TEXT NOT NULL,
                 state         TEXT NOT NULL,
                 reason_code   TEXT NOT NULL,
                 confidence    TEXT NOT NULL,
                 state_version INTEGER NOT NULL,
                 runtime_id    TEXT,
                 last_seen_at  TEXT NOT NULL,
                 updated_at    TEXT NOT NULL,
                 PRIMARY KEY (target_id, pane_id)
             );
             DELETE FROM schema_version;
             COMMIT;",
        )?;
        conn.execute(
            "INSERT INTO schema_version (version) VALUES (?1)",
            params![SCHEMA_VERSION],
        )?;
        Ok(())
    }
}

// ─── SQL value helpers ────────────────────────────────────────────

fn dt_to_sql(dt: DateTime<Utc>) -> String {
    // Fixed-width UTC text keeps lexicographic order chronological.
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn opt_dt_to_sql(dt: Option<DateTime<Utc>>) -> Option<String> {
    dt.map(dt_to_sql)
}

fn sql_to_dt(text: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(text)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt(format!("bad timestamp {text:?}: {e}")))
}

fn opt_sql_to_dt(text: Option<String>) -> Result<Option<DateTime<Utc>>, StoreError> {
    text.as_deref().map(sql_to_dt).transpose()
}

fn parse_field<T: FromStr>(text: &str, what: &str) -> Result<T, StoreError>
where
    T::Err: std::fmt::Display,
{
    text.parse()
        .map_err(|e| StoreError::Corrupt(format!("bad {what} {text:?}: {e}")))
}

fn is_constraint_violation(error: &rusqlite::Error) -> bool {
    matches!(
        error,
        rusqlite::Error::SqliteFailure(inner, _)
            if inner.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

// ─── Store impl ───────────────────────────────────────────────────

impl Store for SqliteStore {
    fn list_targets(&self) -> Result<Vec<Target>, StoreError> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT target_id, name, kind, connection, health, is_default,
                    last_seen_at, updated_at
             FROM targets ORDER BY target_id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, Option<String>>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, bool>(5)?,
                row.get::<_, Option<String>>(6)?,
                row.get::<_, String>(7)?,
            ))
        })?;

        let mut targets = Vec::new();
        for row in rows {
            let (target_id, name, kind, connection, health, is_default, last_seen, updated) =
                row?;
            targets.push(Target {
                target_id,
                name,
                kind: parse_field(&kind, "target kind")?,
                connection,
                health: parse_field(&health, "target health")?,
                is_default,
                last_seen_at: opt_sql_to_dt(last_seen)?,
                updated_at: sql_to_dt(&updated)?,
            });
        }
        Ok(targets)
    }

    fn upsert_target(&self, target: &Target) -> Result<(), StoreError> {
        let conn = self.lock();
        conn.execute(
            "INSERT INTO targets
                 (target_id, name, kind, connection, health, is_default,
                  last_seen_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT (target_id) DO UPDATE SET
                 name = excluded.name,
                 kind = excluded.kind,
                 connection = excluded.connection,
                 health = excluded.health,
                 is_default = excluded.is_default,
                 last_seen_at = excluded.last_seen_at,
                 updated_at = excluded.updated_at",
            params![
                target.target_id,
                target.name,
                target.kind.as_str(),
                target.connection,
                target.health.as_str(),
                target.is_default,
                opt_dt_to_sql(target.last_seen_at),
                dt_to_sql(target.updated_at),
            ],
        )?;
        Ok(())
    }

    fn set_target_health(
        &self,
        target_id: &str,
        health: TargetHealth,
        last_seen_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let conn = self.lock();
        let changed = conn.execute(
            "UPDATE targets
             SET health = ?2,
                 last_seen_at = COALESCE(?3, last_seen_at),
                 updated_at = ?4
             WHERE target_id = ?1",
            params![
                target_id,
                health.as_str(),
                opt_dt_to_sql(last_seen_at),
                dt_to_sql(now),
            ],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound(format!("target {target_id}")));
        }
        Ok(())
    }

    fn list_panes(&self) -> Result<Vec<Pane>, StoreError> {
        self.query_panes("SELECT * FROM panes ORDER BY target_id, pane_id", None)
    }

    fn list_panes_by_target(&self, target_id: &str) -> Result<Vec<Pane>, StoreError> {
        self.query_panes(
            "SELECT * FROM panes WHERE target_id = ?1 ORDER BY pane_id",
            Some(target_id),
        )
    }

    fn upsert_pane(&self, pane: &Pane) -> Result<(), StoreError> {
        let conn = self.lock();
        upsert_pane_on(&conn, pane)
    }

    fn sync_target_panes(
        &self,
        target_id: &str,
        panes: &[Pane],
    ) -> Result<SyncOutcome, StoreError> {
        let mut conn = self.lock();
        let tx = conn.transaction()?;

        let existing: Vec<String> = {
            let mut stmt =
                tx.prepare("SELECT pane_id FROM panes WHERE target_id = ?1")?;
            let ids = stmt.query_map(params![target_id], |row| row.get(0))?;
            ids.collect::<Result<_, _>>()?
        };

        for pane in panes {
            upsert_pane_on(&tx, pane)?;
        }

        let keep: std::collections::HashSet<&str> =
            panes.iter().map(|p| p.pane_id.as_str()).collect();
        let mut removed = Vec::new();
        for pane_id in existing {
            if !keep.contains(pane_id.as_str()) {
                // Scoped delete: other targets' panes are untouched.
                tx.execute(
                    "DELETE FROM panes WHERE target_id = ?1 AND pane_id = ?2",
                    params![target_id, pane_id],
                )?;
                removed.push(pane_id);
            }
        }

        tx.commit()?;
        Ok(SyncOutcome {
            upserted: panes.len(),
            removed,
        })
    }

    fn next_pane_epoch(&self, target_id: &str, pane_id: &str) -> Result<i64, StoreError> {
        let conn = self.lock();
        let next: i64 = conn.query_row(
            "SELECT COALESCE(MAX(pane_epoch), -1) + 1
             FROM runtimes WHERE target_id = ?1 AND pane_id = ?2",
            params![target_id, pane_id],
            |row| row.get(0),
        )?;
        Ok(next)
    }

    fn insert_runtime(&self, runtime: &Runtime) -> Result<(), StoreError> {
        let conn = self.lock();
        let result = conn.execute(
            "INSERT INTO runtimes
                 (runtime_id, target_id, pane_id, pane_epoch, agent_type,
                  boot_id, pid, started_at, ended_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                runtime.runtime_id,
                runtime.target_id,
                runtime.pane_id,
                runtime.pane_epoch,
                runtime.agent_type.as_str(),
                runtime.boot_id,
                runtime.pid,
                dt_to_sql(runtime.started_at),
                opt_dt_to_sql(runtime.ended_at),
            ],
        );
        match result {
            Ok(_) => Ok(()),
            Err(error) if is_constraint_violation(&error) => {
                Err(StoreError::Duplicate(runtime.runtime_id.clone()))
            }
            Err(error) => Err(error.into()),
        }
    }

    fn end_runtime(&self, runtime_id: &str, ended_at: DateTime<Utc>) -> Result<(), StoreError> {
        let conn = self.lock();
        let changed = conn.execute(
            "UPDATE runtimes SET ended_at = ?2 WHERE runtime_id = ?1 AND ended_at IS NULL",
            params![runtime_id, dt_to_sql(ended_at)],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound(format!("active runtime {runtime_id}")));
        }
        Ok(())
    }

    fn list_active_runtimes(
        &self,
        target_id: &str,
        pane_id: &str,
    ) -> Result<Vec<Runtime>, StoreError> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT runtime_id, target_id, pane_id, pane_epoch, agent_type,
                    boot_id, pid, started_at, ended_at
             FROM runtimes
             WHERE target_id = ?1 AND pane_id = ?2 AND ended_at IS NULL
             ORDER BY started_at DESC, pane_epoch DESC",
        )?;
        let rows = stmt.query_map(params![target_id, pane_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, i64>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
                row.get::<_, Option<i64>>(6)?,
                row.get::<_, String>(7)?,
                row.get::<_, Option<String>>(8)?,
            ))
        })?;

        let mut runtimes = Vec::new();
        for row in rows {
            let (runtime_id, target_id, pane_id, pane_epoch, agent, boot_id, pid, started, ended) =
                row?;
            runtimes.push(Runtime {
                runtime_id,
                target_id,
                pane_id,
                pane_epoch,
                agent_type: parse_field(&agent, "agent type")?,
                boot_id,
                pid,
                started_at: sql_to_dt(&started)?,
                ended_at: opt_sql_to_dt(ended)?,
            });
        }
        Ok(runtimes)
    }

    fn insert_event(&self, event: &EventEnvelope) -> Result<i64, StoreError> {
        let conn = self.lock();
        let result = conn.execute(
            "INSERT INTO events
                 (event_id, event_type, source, dedupe_key, event_time,
                  ingested_at, runtime_id, target_id, pane_id, pid,
                  start_hint, raw_payload)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                event.event_id,
                event.event_type,
                event.source.as_str(),
                event.dedupe_key,
                dt_to_sql(event.event_time),
                dt_to_sql(event.ingested_at),
                event.runtime_id,
                event.target_id,
                event.pane_id,
                event.pid,
                opt_dt_to_sql(event.start_hint),
                redact_payload(&event.raw_payload),
            ],
        );
        match result {
            Ok(_) => Ok(conn.last_insert_rowid()),
            Err(error) if is_constraint_violation(&error) => {
                Err(StoreError::IdempotencyConflict(event.dedupe_key.clone()))
            }
            Err(error) => Err(error.into()),
        }
    }

    fn last_event_for_runtime(
        &self,
        runtime_id: &str,
    ) -> Result<Option<(DateTime<Utc>, i64)>, StoreError> {
        let conn = self.lock();
        let row: Option<(String, i64)> = conn
            .query_row(
                "SELECT event_time, ingest_seq FROM events
                 WHERE runtime_id = ?1
                 ORDER BY event_time DESC, ingest_seq DESC
                 LIMIT 1",
                params![runtime_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        row.map(|(time, seq)| Ok((sql_to_dt(&time)?, seq))).transpose()
    }

    fn purge_events(
        &self,
        payload_cutoff: DateTime<Utc>,
        metadata_cutoff: DateTime<Utc>,
    ) -> Result<PurgeStats, StoreError> {
        let mut conn = self.lock();
        let tx = conn.transaction()?;

        let payloads_scrubbed = tx.execute(
            "UPDATE events SET raw_payload = ''
             WHERE ingested_at < ?1 AND raw_payload != ''",
            params![dt_to_sql(payload_cutoff)],
        )?;
        let events_deleted = tx.execute(
            "DELETE FROM events WHERE ingested_at < ?1",
            params![dt_to_sql(metadata_cutoff)],
        )?;
        // Terminal inbox rows age out with the event metadata.
        let inbox_deleted = tx.execute(
            "DELETE FROM event_inbox
             WHERE status != 'pending_bind' AND updated_at < ?1",
            params![dt_to_sql(metadata_cutoff)],
        )?;

        tx.commit()?;
        Ok(PurgeStats {
            payloads_scrubbed,
            events_deleted,
            inbox_deleted,
        })
    }

    fn insert_pending(&self, event: &EventEnvelope) -> Result<i64, StoreError> {
        let redacted = EventEnvelope {
            raw_payload: redact_payload(&event.raw_payload),
            ..event.clone()
        };
        let event_json = serde_json::to_string(&redacted)
            .map_err(|e| StoreError::Corrupt(format!("cannot encode event: {e}")))?;

        let conn = self.lock();
        let result = conn.execute(
            "INSERT INTO event_inbox
                 (dedupe_key, event_json, status, drop_reason, bound_runtime_id,
                  ingested_at, updated_at)
             VALUES (?1, ?2, 'pending_bind', NULL, NULL, ?3, ?3)",
            params![
                event.dedupe_key,
                event_json,
                dt_to_sql(event.ingested_at),
            ],
        );
        match result {
            Ok(_) => Ok(conn.last_insert_rowid()),
            Err(error) if is_constraint_violation(&error) => {
                Err(StoreError::IdempotencyConflict(event.dedupe_key.clone()))
            }
            Err(error) => Err(error.into()),
        }
    }

    fn list_pending(&self) -> Result<Vec<InboxRow>, StoreError> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT inbox_id, event_json, status, drop_reason, bound_runtime_id, updated_at
             FROM event_inbox WHERE status = 'pending_bind' ORDER BY inbox_id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, Option<String>>(3)?,
                row.get::<_, Option<String>>(4)?,
                row.get::<_, String>(5)?,
            ))
        })?;

        let mut pending = Vec::new();
        for row in rows {
            let (inbox_id, event_json, status, drop_reason, bound_runtime_id, updated) = row?;
            let event: EventEnvelope = serde_json::from_str(&event_json)
                .map_err(|e| StoreError::Corrupt(format!("inbox row {inbox_id}: {e}")))?;
            pending.push(InboxRow {
                inbox_id,
                event,
                status: parse_field(&status, "inbox status")?,
                drop_reason: drop_reason
                    .as_deref()
                    .map(|r| parse_field(r, "drop reason"))
                    .transpose()?,
                bound_runtime_id,
                updated_at: sql_to_dt(&updated)?,
            });
        }
        Ok(pending)
    }

    fn update_binding(
        &self,
        inbox_id: i64,
        runtime_id: Option<&str>,
        status: InboxStatus,
        reason: Option<InboxDropReason>,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let conn = self.lock();
        let changed = conn.execute(
            "UPDATE event_inbox
             SET status = ?2, drop_reason = ?3, bound_runtime_id = ?4, updated_at = ?5
             WHERE inbox_id = ?1",
            params![
                inbox_id,
                status.as_str(),
                reason.map(|r| r.as_str()),
                runtime_id,
                dt_to_sql(now),
            ],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound(format!("inbox row {inbox_id}")));
        }
        Ok(())
    }

    fn get_state(&self, target_id: &str, pane_id: &str) -> Result<Option<StateRow>, StoreError> {
        let conn = self.lock();
        let row: Option<(String, String, String, i64, Option<String>, String, String)> = conn
            .query_row(
                "SELECT state, reason_code, confidence, state_version, runtime_id,
                        last_seen_at, updated_at
                 FROM states WHERE target_id = ?1 AND pane_id = ?2",
                params![target_id, pane_id],
                |row| {
                    Ok((
                        row.get(0)?,
                        row.get(1)?,
                        row.get(2)?,
                        row.get(3)?,
                        row.get(4)?,
                        row.get(5)?,
                        row.get(6)?,
                    ))
                },
            )
            .optional()?;

        let Some((state, reason_code, confidence, state_version, runtime_id, last_seen, updated)) =
            row
        else {
            return Ok(None);
        };
        Ok(Some(StateRow {
            target_id: target_id.to_string(),
            pane_id: pane_id.to_string(),
            state: parse_field(&state, "activity state")?,
            reason_code,
            confidence: parse_field(&confidence, "confidence")?,
            state_version,
            runtime_id,
            last_seen_at: sql_to_dt(&last_seen)?,
            updated_at: sql_to_dt(&updated)?,
        }))
    }

    fn list_states(&self) -> Result<Vec<StateRow>, StoreError> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT target_id, pane_id, state, reason_code, confidence, state_version,
                    runtime_id, last_seen_at, updated_at
             FROM states ORDER BY target_id, pane_id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, i64>(5)?,
                row.get::<_, Option<String>>(6)?,
                row.get::<_, String>(7)?,
                row.get::<_, String>(8)?,
            ))
        })?;

        let mut states = Vec::new();
        for row in rows {
            let (
                target_id,
                pane_id,
                state,
                reason_code,
                confidence,
                state_version,
                runtime_id,
                last_seen,
                updated,
            ) = row?;
            states.push(StateRow {
                target_id,
                pane_id,
                state: parse_field(&state, "activity state")?,
                reason_code,
                confidence: parse_field(&confidence, "confidence")?,
                state_version,
                runtime_id,
                last_seen_at: sql_to_dt(&last_seen)?,
                updated_at: sql_to_dt(&updated)?,
            });
        }
        Ok(states)
    }

    fn upsert_state(&self, row: &StateRow) -> Result<(), StoreError> {
        let mut conn = self.lock();
        let tx = conn.transaction()?;

        let current: Option<i64> = tx
            .query_row(
                "SELECT state_version FROM states WHERE target_id = ?1 AND pane_id = ?2",
                params![row.target_id, row.pane_id],
                |r| r.get(0),
            )
            .optional()?;

        if let Some(current) = current
            && row.state_version < current
        {
            return Err(StoreError::VersionConflict {
                target_id: row.target_id.clone(),
                pane_id: row.pane_id.clone(),
                attempted: row.state_version,
                current,
            });
        }

        tx.execute(
            "INSERT INTO states
                 (target_id, pane_id, state, reason_code, confidence,
                  state_version, runtime_id, last_seen_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             ON CONFLICT (target_id, pane_id) DO UPDATE SET
                 state = excluded.state,
                 reason_code = excluded.reason_code,
                 confidence = excluded.confidence,
                 state_version = excluded.state_version,
                 runtime_id = excluded.runtime_id,
                 last_seen_at = excluded.last_seen_at,
                 updated_at = excluded.updated_at",
            params![
                row.target_id,
                row.pane_id,
                row.state.as_str(),
                row.reason_code,
                row.confidence.as_str(),
                row.state_version,
                row.runtime_id,
                dt_to_sql(row.last_seen_at),
                dt_to_sql(row.updated_at),
            ],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn list_adapters(&self) -> Result<Vec<AdapterRecord>, StoreError> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT name, agent_type, contract_version, capabilities, enabled, updated_at
             FROM adapters ORDER BY name",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, bool>(4)?,
                row.get::<_, String>(5)?,
            ))
        })?;

        let mut adapters = Vec::new();
        for row in rows {
            let (name, agent_type, contract_version, capabilities, enabled, updated) = row?;
            let capabilities: AdapterCapabilities = serde_json::from_str(&capabilities)
                .map_err(|e| StoreError::Corrupt(format!("adapter {name}: {e}")))?;
            adapters.push(AdapterRecord {
                name,
                agent_type: parse_field(&agent_type, "agent type")?,
                contract_version,
                capabilities,
                enabled,
                updated_at: sql_to_dt(&updated)?,
            });
        }
        Ok(adapters)
    }

    fn upsert_adapter(&self, record: &AdapterRecord) -> Result<(), StoreError> {
        let capabilities = serde_json::to_string(&record.capabilities)
            .map_err(|e| StoreError::Corrupt(format!("cannot encode capabilities: {e}")))?;

        let mut conn = self.lock();
        let tx = conn.transaction()?;

        // `enabled`, once persisted, survives resyncs.
        let prior_enabled: Option<bool> = tx
            .query_row(
                "SELECT enabled FROM adapters WHERE name = ?1",
                params![record.name],
                |row| row.get(0),
            )
            .optional()?;
        let enabled = prior_enabled.unwrap_or(record.enabled);

        tx.execute(
            "INSERT INTO adapters
                 (name, agent_type, contract_version, capabilities, enabled, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT (name) DO UPDATE SET
                 agent_type = excluded.agent_type,
                 contract_version = excluded.contract_version,
                 capabilities = excluded.capabilities,
                 enabled = excluded.enabled,
                 updated_at = excluded.updated_at",
            params![
                record.name,
                record.agent_type.as_str(),
                record.contract_version,
                capabilities,
                enabled,
                dt_to_sql(record.updated_at),
            ],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn set_adapter_enabled(&self, name: &str, enabled: bool) -> Result<(), StoreError> {
        let conn = self.lock();
        let changed = conn.execute(
            "UPDATE adapters SET enabled = ?2 WHERE name = ?1",
            params![name, enabled],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound(format!("adapter {name}")));
        }
        Ok(())
    }

    fn get_adapter(&self, name: &str) -> Result<Option<AdapterRecord>, StoreError> {
        let conn = self.lock();
        let row: Option<(String, String, String, bool, String)> = conn
            .query_row(
                "SELECT agent_type, contract_version, capabilities, enabled, updated_at
                 FROM adapters WHERE name = ?1",
                params![name],
                |row| {
                    Ok((
                        row.get(0)?,
                        row.get(1)?,
                        row.get(2)?,
                        row.get(3)?,
                        row.get(4)?,
                    ))
                },
            )
            .optional()?;

        let Some((agent_type, contract_version, capabilities, enabled, updated)) = row else {
            return Ok(None);
        };
        Ok(Some(AdapterRecord {
            name: name.to_string(),
            agent_type: parse_field(&agent_type, "agent type")?,
            contract_version,
            capabilities: serde_json::from_str(&capabilities)
                .map_err(|e| StoreError::Corrupt(format!("adapter {name}: {e}")))?,
            enabled,
            updated_at: sql_to_dt(&updated)?,
        }))
    }
}

impl SqliteStore {
    fn query_panes(&self, sql: &str, target_id: Option<&str>) -> Result<Vec<Pane>, StoreError> {
        let conn = self.lock();
        let mut stmt = conn.prepare(sql)?;
        let map_row = |row: &rusqlite::Row<'_>| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
                row.get::<_, Option<i64>>(6)?,
                row.get::<_, String>(7)?,
                row.get::<_, String>(8)?,
                row.get::<_, i64>(9)?,
                row.get::<_, String>(10)?,
                row.get::<_, String>(11)?,
            ))
        };
        let rows: Vec<_> = match target_id {
            Some(id) => stmt
                .query_map(params![id], map_row)?
                .collect::<Result<_, _>>()?,
            None => stmt.query_map([], map_row)?.collect::<Result<_, _>>()?,
        };

        let mut panes = Vec::new();
        for (
            target_id,
            pane_id,
            session_name,
            window_id,
            window_name,
            current_cmd,
            current_pid,
            tty,
            current_path,
            history_bytes,
            title,
            updated,
        ) in rows
        {
            panes.push(Pane {
                target_id,
                pane_id,
                session_name,
                window_id,
                window_name,
                current_cmd,
                current_pid,
                tty,
                current_path,
                history_bytes: history_bytes.max(0) as u64,
                title,
                updated_at: sql_to_dt(&updated)?,
            });
        }
        Ok(panes)
    }
}

fn upsert_pane_on(conn: &Connection, pane: &Pane) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO panes
             (target_id, pane_id, session_name, window_id, window_name,
              current_cmd, current_pid, tty, current_path, history_bytes,
              title, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
         ON CONFLICT (target_id, pane_id) DO UPDATE SET
             session_name = excluded.session_name,
             window_id = excluded.window_id,
             window_name = excluded.window_name,
             current_cmd = excluded.current_cmd,
             current_pid = excluded.current_pid,
             tty = excluded.tty,
             current_path = excluded.current_path,
             history_bytes = excluded.history_bytes,
             title = excluded.title,
             updated_at = excluded.updated_at",
        params![
            pane.target_id,
            pane.pane_id,
            pane.session_name,
            pane.window_id,
            pane.window_name,
            pane.current_cmd,
            pane.current_pid,
            pane.tty,
            pane.current_path,
            pane.history_bytes as i64,
            pane.title,
            dt_to_sql(pane.updated_at),
        ],
    )?;
    Ok(())
}

// ─── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;
    use panewatch_core::types::{ActivityState, AgentType, Confidence, EventSource, TargetKind};

    fn ts(value: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(value)
            .expect("valid RFC3339 timestamp")
            .with_timezone(&Utc)
    }

    fn t0() -> DateTime<Utc> {
        ts("2026-03-01T00:00:00Z")
    }

    fn store() -> SqliteStore {
        SqliteStore::open_in_memory().expect("open")
    }

    fn target(id: &str) -> Target {
        Target {
            target_id: id.to_string(),
            name: id.to_string(),
            kind: TargetKind::Local,
            connection: None,
            health: TargetHealth::Ok,
            is_default: id == "local",
            last_seen_at: None,
            updated_at: t0(),
        }
    }

    fn pane(target_id: &str, pane_id: &str) -> Pane {
        Pane {
            target_id: target_id.to_string(),
            pane_id: pane_id.to_string(),
            session_name: "main".into(),
            window_id: "@0".into(),
            window_name: "dev".into(),
            current_cmd: "codex".into(),
            current_pid: Some(100),
            tty: "/dev/ttys000".into(),
            current_path: "/home".into(),
            history_bytes: 1024,
            title: "codex".into(),
            updated_at: t0(),
        }
    }

    fn runtime(id: &str, target_id: &str, pane_id: &str, epoch: i64) -> Runtime {
        Runtime {
            runtime_id: id.to_string(),
            target_id: target_id.to_string(),
            pane_id: pane_id.to_string(),
            pane_epoch: epoch,
            agent_type: AgentType::Codex,
            boot_id: "boot-1".into(),
            pid: Some(100),
            started_at: t0(),
            ended_at: None,
        }
    }

    fn event(dedupe_key: &str, runtime_id: Option<&str>) -> EventEnvelope {
        EventEnvelope {
            event_id: format!("evt-{dedupe_key}"),
            event_type: "task-started".into(),
            source: EventSource::Hook,
            dedupe_key: dedupe_key.to_string(),
            event_time: t0(),
            ingested_at: t0(),
            runtime_id: runtime_id.map(String::from),
            target_id: "local".into(),
            pane_id: "%0".into(),
            pid: Some(100),
            start_hint: None,
            raw_payload: r#"{"tool":"bash"}"#.into(),
        }
    }

    fn state_row(version: i64) -> StateRow {
        StateRow {
            target_id: "local".into(),
            pane_id: "%0".into(),
            state: ActivityState::Running,
            reason_code: "active".into(),
            confidence: Confidence::Medium,
            state_version: version,
            runtime_id: Some("r1".into()),
            last_seen_at: t0(),
            updated_at: t0(),
        }
    }

    fn adapter_record(name: &str, enabled: bool) -> AdapterRecord {
        AdapterRecord {
            name: name.to_string(),
            agent_type: AgentType::Claude,
            contract_version: "1.0".into(),
            capabilities: AdapterCapabilities {
                event_driven: true,
                polling_required: false,
                supports_waiting_approval: true,
                supports_waiting_input: true,
                supports_completed: true,
            },
            enabled,
            updated_at: t0(),
        }
    }

    // ── Migrations ───────────────────────────────────────────────

    #[test]
    fn migrations_run_once_per_open() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("panewatch.db");
        {
            let store = SqliteStore::open(&path).expect("first open");
            store.upsert_target(&target("local")).expect("upsert");
        }
        let store = SqliteStore::open(&path).expect("second open");
        let targets = store.list_targets().expect("list");
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].target_id, "local");
    }

    // ── Targets ──────────────────────────────────────────────────

    #[test]
    fn target_roundtrip_and_health() {
        let store = store();
        store.upsert_target(&target("local")).expect("upsert");

        let later = t0() + TimeDelta::seconds(30);
        store
            .set_target_health("local", TargetHealth::Down, Some(later), later)
            .expect("set health");

        let targets = store.list_targets().expect("list");
        assert_eq!(targets[0].health, TargetHealth::Down);
        assert_eq!(targets[0].last_seen_at, Some(later));
        assert_eq!(targets[0].updated_at, later);
    }

    #[test]
    fn set_health_on_missing_target_is_not_found() {
        let store = store();
        let err = store
            .set_target_health("ghost", TargetHealth::Down, None, t0())
            .expect_err("should fail");
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[test]
    fn set_health_keeps_last_seen_when_none() {
        let store = store();
        store.upsert_target(&target("local")).expect("upsert");
        let seen = t0() + TimeDelta::seconds(5);
        store
            .set_target_health("local", TargetHealth::Ok, Some(seen), seen)
            .expect("set");
        store
            .set_target_health("local", TargetHealth::Degraded, None, seen + TimeDelta::seconds(5))
            .expect("set");
        let targets = store.list_targets().expect("list");
        assert_eq!(targets[0].last_seen_at, Some(seen));
    }

    // ── Panes ────────────────────────────────────────────────────

    #[test]
    fn pane_upsert_roundtrip() {
        let store = store();
        store.upsert_pane(&pane("local", "%0")).expect("upsert");
        let mut updated = pane("local", "%0");
        updated.current_cmd = "claude".into();
        store.upsert_pane(&updated).expect("upsert again");

        let panes = store.list_panes_by_target("local").expect("list");
        assert_eq!(panes.len(), 1);
        assert_eq!(panes[0].current_cmd, "claude");
    }

    #[test]
    fn sync_is_target_scoped() {
        let store = store();
        store.upsert_pane(&pane("local", "%0")).expect("upsert");
        store.upsert_pane(&pane("local", "%1")).expect("upsert");
        store.upsert_pane(&pane("remote", "%0")).expect("upsert");

        // Sync local with only %1: %0 on local goes away, remote untouched.
        let outcome = store
            .sync_target_panes("local", &[pane("local", "%1")])
            .expect("sync");
        assert_eq!(outcome.upserted, 1);
        assert_eq!(outcome.removed, vec!["%0".to_string()]);

        let local = store.list_panes_by_target("local").expect("list");
        assert_eq!(local.len(), 1);
        assert_eq!(local[0].pane_id, "%1");

        let remote = store.list_panes_by_target("remote").expect("list");
        assert_eq!(remote.len(), 1, "other target's panes must survive");
    }

    #[test]
    fn sync_with_empty_list_clears_only_that_target() {
        let store = store();
        store.upsert_pane(&pane("local", "%0")).expect("upsert");
        store.upsert_pane(&pane("remote", "%9")).expect("upsert");

        let outcome = store.sync_target_panes("local", &[]).expect("sync");
        assert_eq!(outcome.removed, vec!["%0".to_string()]);
        assert!(store.list_panes_by_target("local").expect("list").is_empty());
        assert_eq!(store.list_panes().expect("list").len(), 1);
    }

    // ── Runtimes ─────────────────────────────────────────────────

    #[test]
    fn runtime_insert_list_end() {
        let store = store();
        store
            .insert_runtime(&runtime("r1", "local", "%0", 0))
            .expect("insert");

        let active = store.list_active_runtimes("local", "%0").expect("list");
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].runtime_id, "r1");

        store
            .end_runtime("r1", t0() + TimeDelta::seconds(10))
            .expect("end");
        assert!(store.list_active_runtimes("local", "%0").expect("list").is_empty());
    }

    #[test]
    fn duplicate_runtime_id_is_duplicate_error() {
        let store = store();
        store
            .insert_runtime(&runtime("r1", "local", "%0", 0))
            .expect("insert");
        let err = store
            .insert_runtime(&runtime("r1", "local", "%0", 1))
            .expect_err("should fail");
        assert!(matches!(err, StoreError::Duplicate(_)));
    }

    #[test]
    fn end_runtime_twice_is_not_found() {
        let store = store();
        store
            .insert_runtime(&runtime("r1", "local", "%0", 0))
            .expect("insert");
        store.end_runtime("r1", t0()).expect("end");
        let err = store.end_runtime("r1", t0()).expect_err("already ended");
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[test]
    fn next_pane_epoch_monotone() {
        let store = store();
        assert_eq!(store.next_pane_epoch("local", "%0").expect("epoch"), 0);

        store
            .insert_runtime(&runtime("r1", "local", "%0", 0))
            .expect("insert");
        assert_eq!(store.next_pane_epoch("local", "%0").expect("epoch"), 1);

        let mut second = runtime("r2", "local", "%0", 1);
        second.ended_at = Some(t0());
        store.insert_runtime(&second).expect("insert");
        assert_eq!(store.next_pane_epoch("local", "%0").expect("epoch"), 2);

        // Epochs are tracked per pane.
        assert_eq!(store.next_pane_epoch("local", "%1").expect("epoch"), 0);
    }

    #[test]
    fn active_runtimes_newest_first() {
        let store = store();
        let mut old = runtime("r-old", "local", "%0", 0);
        old.started_at = t0();
        let mut new = runtime("r-new", "local", "%0", 1);
        new.started_at = t0() + TimeDelta::seconds(5);
        store.insert_runtime(&old).expect("insert");
        store.insert_runtime(&new).expect("insert");

        let active = store.list_active_runtimes("local", "%0").expect("list");
        assert_eq!(active[0].runtime_id, "r-new");
        assert_eq!(active[1].runtime_id, "r-old");
    }

    // ── Events ───────────────────────────────────────────────────

    #[test]
    fn event_insert_assigns_ingest_seq() {
        let store = store();
        let first = store.insert_event(&event("k1", Some("r1"))).expect("insert");
        let second = store.insert_event(&event("k2", Some("r1"))).expect("insert");
        assert!(second > first);
    }

    #[test]
    fn duplicate_dedupe_key_is_idempotency_conflict() {
        let store = store();
        store.insert_event(&event("k1", Some("r1"))).expect("insert");
        let err = store
            .insert_event(&event("k1", Some("r1")))
            .expect_err("should conflict");
        assert!(matches!(err, StoreError::IdempotencyConflict(_)));
        assert_eq!(err.to_core().code(), "idempotency_conflict");
    }

    #[test]
    fn duplicate_insert_leaves_first_row_unchanged() {
        let store = store();
        store.insert_event(&event("k1", Some("r1"))).expect("insert");

        let mut altered = event("k1", Some("r1"));
        altered.event_type = "task-finished".into();
        altered.event_time = t0() + TimeDelta::seconds(60);
        let _ = store.insert_event(&altered);

        let last = store
            .last_event_for_runtime("r1")
            .expect("query")
            .expect("row");
        assert_eq!(last.0, t0(), "original event_time must survive");
    }

    #[test]
    fn last_event_orders_by_time_then_seq() {
        let store = store();
        let mut early = event("k1", Some("r1"));
        early.event_time = t0();
        let mut late = event("k2", Some("r1"));
        late.event_time = t0() + TimeDelta::seconds(5);
        store.insert_event(&late).expect("insert");
        store.insert_event(&early).expect("insert");

        let (time, _) = store
            .last_event_for_runtime("r1")
            .expect("query")
            .expect("row");
        assert_eq!(time, t0() + TimeDelta::seconds(5));
        assert!(store.last_event_for_runtime("r-none").expect("query").is_none());
    }

    #[test]
    fn payload_redacted_on_insert() {
        let store = store();
        let mut secret = event("k1", Some("r1"));
        secret.raw_payload = r#"{"token":"sk-live-12345"}"#.into();
        store.insert_event(&secret).expect("insert");

        let conn = store.lock();
        let payload: String = conn
            .query_row(
                "SELECT raw_payload FROM events WHERE dedupe_key = 'k1'",
                [],
                |row| row.get(0),
            )
            .expect("query");
        drop(conn);
        assert!(!payload.contains("sk-live-12345"));
    }

    #[test]
    fn purge_scrubs_then_deletes() {
        let store = store();
        let mut old = event("k-old", Some("r1"));
        old.ingested_at = t0();
        let mut fresh = event("k-new", Some("r1"));
        fresh.ingested_at = t0() + TimeDelta::days(10);
        store.insert_event(&old).expect("insert");
        store.insert_event(&fresh).expect("insert");

        // Scrub payloads older than +1d, delete older than -1d (none).
        let stats = store
            .purge_events(t0() + TimeDelta::days(1), t0() - TimeDelta::days(1))
            .expect("purge");
        assert_eq!(stats.payloads_scrubbed, 1);
        assert_eq!(stats.events_deleted, 0);

        // Now delete older than +1d: the old event goes away.
        let stats = store
            .purge_events(t0() + TimeDelta::days(1), t0() + TimeDelta::days(1))
            .expect("purge");
        assert_eq!(stats.events_deleted, 1);
    }

    // ── Inbox ────────────────────────────────────────────────────

    #[test]
    fn pending_roundtrip_and_binding() {
        let store = store();
        let inbox_id = store
            .insert_pending(&event("k1", None))
            .expect("insert pending");

        let pending = store.list_pending().expect("list");
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].inbox_id, inbox_id);
        assert_eq!(pending[0].status, InboxStatus::PendingBind);
        assert_eq!(pending[0].event.dedupe_key, "k1");

        store
            .update_binding(inbox_id, Some("r1"), InboxStatus::Bound, None, t0())
            .expect("bind");
        assert!(store.list_pending().expect("list").is_empty());
    }

    #[test]
    fn pending_duplicate_is_idempotency_conflict() {
        let store = store();
        store.insert_pending(&event("k1", None)).expect("insert");
        let err = store
            .insert_pending(&event("k1", None))
            .expect_err("should conflict");
        assert!(matches!(err, StoreError::IdempotencyConflict(_)));
    }

    #[test]
    fn dropped_rows_leave_pending_list() {
        let store = store();
        let inbox_id = store.insert_pending(&event("k1", None)).expect("insert");
        store
            .update_binding(
                inbox_id,
                None,
                InboxStatus::DroppedUnbound,
                Some(InboxDropReason::BindTtlExpired),
                t0(),
            )
            .expect("drop");
        assert!(store.list_pending().expect("list").is_empty());
    }

    #[test]
    fn terminal_inbox_rows_age_out_with_metadata() {
        let store = store();
        let inbox_id = store.insert_pending(&event("k1", None)).expect("insert");
        store
            .update_binding(
                inbox_id,
                None,
                InboxStatus::DroppedUnbound,
                Some(InboxDropReason::BindNoCandidate),
                t0(),
            )
            .expect("drop");

        let stats = store
            .purge_events(t0() + TimeDelta::days(1), t0() + TimeDelta::days(1))
            .expect("purge");
        assert_eq!(stats.inbox_deleted, 1);
    }

    // ── State ────────────────────────────────────────────────────

    #[test]
    fn state_roundtrip() {
        let store = store();
        store.upsert_state(&state_row(1)).expect("upsert");
        let row = store
            .get_state("local", "%0")
            .expect("get")
            .expect("present");
        assert_eq!(row.state, ActivityState::Running);
        assert_eq!(row.state_version, 1);
        assert!(store.get_state("local", "%9").expect("get").is_none());
    }

    #[test]
    fn stale_state_version_rejected() {
        let store = store();
        store.upsert_state(&state_row(5)).expect("upsert");
        let err = store.upsert_state(&state_row(4)).expect_err("stale write");
        assert!(matches!(err, StoreError::VersionConflict { .. }));

        // Equal version (a touch) and higher versions are accepted.
        store.upsert_state(&state_row(5)).expect("equal version");
        store.upsert_state(&state_row(6)).expect("higher version");
        let row = store.get_state("local", "%0").expect("get").expect("row");
        assert_eq!(row.state_version, 6);
    }

    // ── Adapters ─────────────────────────────────────────────────

    #[test]
    fn adapter_sync_preserves_enabled() {
        let store = store();
        store
            .upsert_adapter(&adapter_record("claude-hooks", true))
            .expect("first sync");

        // Operator disables the adapter.
        store
            .set_adapter_enabled("claude-hooks", false)
            .expect("disable");

        // Resync with enabled=true: the persisted flag must survive.
        store
            .upsert_adapter(&adapter_record("claude-hooks", true))
            .expect("resync");
        let record = store
            .get_adapter("claude-hooks")
            .expect("get")
            .expect("present");
        assert!(!record.enabled);
    }

    #[test]
    fn adapter_sync_twice_is_idempotent() {
        let store = store();
        store
            .upsert_adapter(&adapter_record("claude-hooks", true))
            .expect("first");
        store
            .upsert_adapter(&adapter_record("claude-hooks", true))
            .expect("second");
        let adapters = store.list_adapters().expect("list");
        assert_eq!(adapters.len(), 1);
        assert_eq!(adapters[0].contract_version, "1.0");
        assert!(adapters[0].capabilities.event_driven);
    }
}
