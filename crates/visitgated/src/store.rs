//! SQLite-backed visitor registry and entry log.
//!
//! All access goes through a single `tokio-rusqlite` connection, which runs
//! queries on its own thread. Candidate pools are returned in registration
//! order so that first-wins tie-breaking in the engine is stable.

use crate::model::{
    EntryLog, EntryMethod, HourCount, LogFilter, LogPage, LogStatus, NewVisitor, PurposeCount,
    Stats, VisitorUpdate,
};
use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, SecondsFormat, TimeZone, Utc};
use rusqlite::{params, params_from_iter, OptionalExtension, Row};
use std::path::Path;
use thiserror::Error;
use visitgate_core::{VisitorRecord, VisitorStatus};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS visitors (
    id                  TEXT PRIMARY KEY,
    name                TEXT NOT NULL,
    email               TEXT NOT NULL DEFAULT '',
    phone               TEXT NOT NULL DEFAULT '',
    purpose             TEXT NOT NULL DEFAULT '',
    department          TEXT NOT NULL DEFAULT '',
    person_to_meet      TEXT NOT NULL DEFAULT '',
    qr_token            TEXT UNIQUE,
    photo               TEXT NOT NULL DEFAULT '',
    face_descriptor     TEXT NOT NULL DEFAULT '[]',
    thumbprint_template TEXT NOT NULL DEFAULT '[]',
    thumbprint          TEXT NOT NULL DEFAULT '',
    status              TEXT NOT NULL DEFAULT 'pending',
    check_in_time       TEXT,
    check_out_time      TEXT,
    created_at          TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS entry_logs (
    id             TEXT PRIMARY KEY,
    visitor_id     TEXT NOT NULL REFERENCES visitors(id) ON DELETE CASCADE,
    visitor_name   TEXT NOT NULL,
    visitor_phone  TEXT NOT NULL DEFAULT '',
    entry_time     TEXT NOT NULL,
    exit_time      TEXT,
    entry_method   TEXT NOT NULL,
    exit_method    TEXT,
    purpose        TEXT NOT NULL DEFAULT '',
    person_to_meet TEXT NOT NULL DEFAULT '',
    status         TEXT NOT NULL DEFAULT 'inside'
);
CREATE INDEX IF NOT EXISTS idx_entry_logs_entry_time ON entry_logs(entry_time DESC);
CREATE INDEX IF NOT EXISTS idx_entry_logs_visitor ON entry_logs(visitor_id);
CREATE INDEX IF NOT EXISTS idx_entry_logs_status ON entry_logs(status);
";

const VISITOR_COLUMNS: &str = "v.id, v.name, v.email, v.phone, v.purpose, v.department, \
    v.person_to_meet, v.qr_token, v.photo, v.face_descriptor, v.thumbprint_template, \
    v.thumbprint, v.status, v.check_in_time, v.check_out_time, \
    EXISTS(SELECT 1 FROM entry_logs l WHERE l.visitor_id = v.id AND l.exit_time IS NULL)";

const LOG_COLUMNS: &str = "id, visitor_id, visitor_name, visitor_phone, entry_time, exit_time, \
    entry_method, exit_method, purpose, person_to_meet, status";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database: {0}")]
    Database(#[from] tokio_rusqlite::Error),
    #[error("encoding: {0}")]
    Encoding(#[from] serde_json::Error),
    #[error("corrupt row: {0}")]
    Corrupt(String),
    #[error("visitor not found: {0}")]
    NotFound(String),
    #[error("Visitor is already inside")]
    AlreadyInside,
    #[error("Visitor access denied")]
    AccessDenied,
    #[error("No active entry found for this visitor")]
    NoActiveEntry,
    #[error("cannot create data directory: {0}")]
    Io(#[from] std::io::Error),
}

/// Format a timestamp so that lexicographic order matches time order.
fn timestamp(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt(format!("timestamp {s:?}: {e}")))
}

fn day_start(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN))
}

/// Raw `visitors` row; JSON columns are decoded outside the DB thread.
struct VisitorRow {
    id: String,
    name: String,
    email: String,
    phone: String,
    purpose: String,
    department: String,
    person_to_meet: String,
    qr_token: Option<String>,
    photo: String,
    face_descriptor: String,
    thumbprint_template: String,
    thumbprint: String,
    status: String,
    check_in_time: Option<String>,
    check_out_time: Option<String>,
    inside: bool,
}

impl VisitorRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            email: row.get(2)?,
            phone: row.get(3)?,
            purpose: row.get(4)?,
            department: row.get(5)?,
            person_to_meet: row.get(6)?,
            qr_token: row.get(7)?,
            photo: row.get(8)?,
            face_descriptor: row.get(9)?,
            thumbprint_template: row.get(10)?,
            thumbprint: row.get(11)?,
            status: row.get(12)?,
            check_in_time: row.get(13)?,
            check_out_time: row.get(14)?,
            inside: row.get(15)?,
        })
    }

    fn into_record(self) -> Result<VisitorRecord, StoreError> {
        let status = VisitorStatus::parse(&self.status)
            .ok_or_else(|| StoreError::Corrupt(format!("visitor status {:?}", self.status)))?;
        Ok(VisitorRecord {
            face_descriptor: serde_json::from_str(&self.face_descriptor)?,
            fingerprint_template: serde_json::from_str(&self.thumbprint_template)?,
            check_in_time: self.check_in_time.as_deref().map(parse_timestamp).transpose()?,
            check_out_time: self.check_out_time.as_deref().map(parse_timestamp).transpose()?,
            id: self.id,
            name: self.name,
            email: self.email,
            phone: self.phone,
            purpose: self.purpose,
            department: self.department,
            person_to_meet: self.person_to_meet,
            qr_token: self.qr_token,
            photo: self.photo,
            fingerprint_image: self.thumbprint,
            status,
            currently_inside: self.inside,
        })
    }
}

struct LogRow {
    id: String,
    visitor_id: String,
    visitor_name: String,
    visitor_phone: String,
    entry_time: String,
    exit_time: Option<String>,
    entry_method: String,
    exit_method: Option<String>,
    purpose: String,
    person_to_meet: String,
    status: String,
}

impl LogRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            visitor_id: row.get(1)?,
            visitor_name: row.get(2)?,
            visitor_phone: row.get(3)?,
            entry_time: row.get(4)?,
            exit_time: row.get(5)?,
            entry_method: row.get(6)?,
            exit_method: row.get(7)?,
            purpose: row.get(8)?,
            person_to_meet: row.get(9)?,
            status: row.get(10)?,
        })
    }

    fn into_log(self) -> Result<EntryLog, StoreError> {
        let method = |s: &str| {
            EntryMethod::parse(s).ok_or_else(|| StoreError::Corrupt(format!("entry method {s:?}")))
        };
        Ok(EntryLog {
            entry_time: parse_timestamp(&self.entry_time)?,
            exit_time: self.exit_time.as_deref().map(parse_timestamp).transpose()?,
            entry_method: method(self.entry_method.as_str())?,
            exit_method: self.exit_method.as_deref().map(method).transpose()?,
            status: LogStatus::parse(&self.status)
                .ok_or_else(|| StoreError::Corrupt(format!("log status {:?}", self.status)))?,
            id: self.id,
            visitor_id: self.visitor_id,
            visitor_name: self.visitor_name,
            visitor_phone: self.visitor_phone,
            purpose: self.purpose,
            person_to_meet: self.person_to_meet,
        })
    }
}

fn load_log(conn: &rusqlite::Connection, id: &str) -> rusqlite::Result<LogRow> {
    conn.query_row(
        &format!("SELECT {LOG_COLUMNS} FROM entry_logs WHERE id = ?1"),
        [id],
        LogRow::from_row,
    )
}

/// Visitor registry and entry log.
#[derive(Clone)]
pub struct VisitorStore {
    conn: tokio_rusqlite::Connection,
}

impl VisitorStore {
    /// Open (creating if needed) the database at `path`.
    pub async fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = tokio_rusqlite::Connection::open(path).await?;
        Self::init(conn).await
    }

    pub async fn open_in_memory() -> Result<Self, StoreError> {
        let conn = tokio_rusqlite::Connection::open_in_memory().await?;
        Self::init(conn).await
    }

    async fn init(conn: tokio_rusqlite::Connection) -> Result<Self, StoreError> {
        conn.call(|conn| {
            conn.execute_batch("PRAGMA foreign_keys = ON;")?;
            conn.execute_batch(SCHEMA)?;
            Ok(())
        })
        .await?;
        Ok(Self { conn })
    }

    async fn query_visitors(
        &self,
        filter: &'static str,
        param: Option<String>,
    ) -> Result<Vec<VisitorRecord>, StoreError> {
        let rows = self
            .conn
            .call(move |conn| {
                let sql = format!(
                    "SELECT {VISITOR_COLUMNS} FROM visitors v {filter} ORDER BY v.created_at, v.rowid"
                );
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt
                    .query_map(params_from_iter(param.iter()), VisitorRow::from_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await?;
        rows.into_iter().map(VisitorRow::into_record).collect()
    }

    /// Register a visitor with a fresh id and QR token, pending approval.
    pub async fn register(&self, new: NewVisitor) -> Result<VisitorRecord, StoreError> {
        let record = VisitorRecord {
            id: uuid::Uuid::new_v4().to_string(),
            name: new.name.trim().to_string(),
            email: new.email.trim().to_lowercase(),
            phone: new.phone.trim().to_string(),
            purpose: new.purpose,
            department: new.department,
            person_to_meet: new.person_to_meet.trim().to_string(),
            qr_token: Some(uuid::Uuid::new_v4().to_string()),
            photo: new.photo,
            face_descriptor: new.face_descriptor,
            fingerprint_template: new.thumbprint_template,
            fingerprint_image: new.thumbprint,
            status: VisitorStatus::Pending,
            check_in_time: None,
            check_out_time: None,
            currently_inside: false,
        };
        let face = serde_json::to_string(&record.face_descriptor)?;
        let template = serde_json::to_string(&record.fingerprint_template)?;
        let created_at = timestamp(Utc::now());

        let row = record.clone();
        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO visitors (id, name, email, phone, purpose, department,
                        person_to_meet, qr_token, photo, face_descriptor, thumbprint_template,
                        thumbprint, status, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
                    params![
                        row.id,
                        row.name,
                        row.email,
                        row.phone,
                        row.purpose,
                        row.department,
                        row.person_to_meet,
                        row.qr_token,
                        row.photo,
                        face,
                        template,
                        row.fingerprint_image,
                        row.status.as_str(),
                        created_at,
                    ],
                )?;
                Ok(())
            })
            .await?;

        tracing::info!(visitor = %record.id, "visitor registered");
        Ok(record)
    }

    pub async fn get(&self, id: &str) -> Result<Option<VisitorRecord>, StoreError> {
        let mut found = self.query_visitors("WHERE v.id = ?1", Some(id.to_string())).await?;
        Ok(found.pop())
    }

    /// All visitors holding `token`; at most one under the UNIQUE constraint.
    pub async fn qr_holders(&self, token: &str) -> Result<Vec<VisitorRecord>, StoreError> {
        self.query_visitors("WHERE v.qr_token = ?1", Some(token.to_string()))
            .await
    }

    pub async fn all_visitors(&self) -> Result<Vec<VisitorRecord>, StoreError> {
        self.query_visitors("", None).await
    }

    /// Visitors with a captured face descriptor.
    pub async fn face_candidates(&self) -> Result<Vec<VisitorRecord>, StoreError> {
        self.query_visitors("WHERE v.face_descriptor != '[]'", None).await
    }

    /// Visitors with a fingerprint template or image.
    pub async fn fingerprint_candidates(&self) -> Result<Vec<VisitorRecord>, StoreError> {
        self.query_visitors(
            "WHERE v.thumbprint_template != '[]' OR v.thumbprint != ''",
            None,
        )
        .await
    }

    /// Whether `visitor_id` has an entry without an exit.
    pub async fn is_inside(&self, visitor_id: &str) -> Result<bool, StoreError> {
        let id = visitor_id.to_string();
        let inside = self
            .conn
            .call(move |conn| {
                let inside: bool = conn.query_row(
                    "SELECT EXISTS(SELECT 1 FROM entry_logs WHERE visitor_id = ?1 AND exit_time IS NULL)",
                    [&id],
                    |r| r.get(0),
                )?;
                Ok(inside)
            })
            .await?;
        Ok(inside)
    }

    pub async fn set_status(&self, id: &str, status: VisitorStatus) -> Result<VisitorRecord, StoreError> {
        let key = id.to_string();
        let updated = self
            .conn
            .call(move |conn| {
                let n = conn.execute(
                    "UPDATE visitors SET status = ?1 WHERE id = ?2",
                    params![status.as_str(), key],
                )?;
                Ok(n)
            })
            .await?;
        if updated == 0 {
            return Err(StoreError::NotFound(id.to_string()));
        }
        tracing::info!(visitor = id, %status, "visitor status changed");
        self.get(id)
            .await?
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    /// Overwrite the fields `update` carries; absent and empty fields keep
    /// their stored value.
    pub async fn update(&self, id: &str, update: VisitorUpdate) -> Result<VisitorRecord, StoreError> {
        let key = id.to_string();
        let field = |v: Option<String>| v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
        let name = field(update.name);
        let email = field(update.email).map(|e| e.to_lowercase());
        let phone = field(update.phone);
        let purpose = field(update.purpose);
        let department = field(update.department);
        let person_to_meet = field(update.person_to_meet);
        let status = update.status.map(|s| s.as_str());

        let updated = self
            .conn
            .call(move |conn| {
                let n = conn.execute(
                    "UPDATE visitors SET
                        name = COALESCE(?1, name),
                        email = COALESCE(?2, email),
                        phone = COALESCE(?3, phone),
                        purpose = COALESCE(?4, purpose),
                        department = COALESCE(?5, department),
                        person_to_meet = COALESCE(?6, person_to_meet),
                        status = COALESCE(?7, status)
                     WHERE id = ?8",
                    params![name, email, phone, purpose, department, person_to_meet, status, key],
                )?;
                Ok(n)
            })
            .await?;
        if updated == 0 {
            return Err(StoreError::NotFound(id.to_string()));
        }
        tracing::info!(visitor = id, "visitor updated");
        self.get(id)
            .await?
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    /// Delete a visitor and their entry logs. Returns whether a row was removed.
    pub async fn remove(&self, id: &str) -> Result<bool, StoreError> {
        let key = id.to_string();
        let removed = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                tx.execute("DELETE FROM entry_logs WHERE visitor_id = ?1", [&key])?;
                let n = tx.execute("DELETE FROM visitors WHERE id = ?1", [&key])?;
                tx.commit()?;
                Ok(n > 0)
            })
            .await?;
        Ok(removed)
    }

    /// Open an entry log for a visitor who is not already inside.
    pub async fn record_entry(&self, visitor_id: &str, method: EntryMethod) -> Result<EntryLog, StoreError> {
        let id = visitor_id.to_string();
        let log_id = uuid::Uuid::new_v4().to_string();
        let now = timestamp(Utc::now());

        let row = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                let visitor = tx
                    .query_row(
                        "SELECT name, phone, purpose, person_to_meet, status FROM visitors WHERE id = ?1",
                        [&id],
                        |r| {
                            Ok((
                                r.get::<_, String>(0)?,
                                r.get::<_, String>(1)?,
                                r.get::<_, String>(2)?,
                                r.get::<_, String>(3)?,
                                r.get::<_, String>(4)?,
                            ))
                        },
                    )
                    .optional()?;
                let Some((name, phone, purpose, person_to_meet, status)) = visitor else {
                    return Ok(Err(StoreError::NotFound(id)));
                };

                let open: bool = tx.query_row(
                    "SELECT EXISTS(SELECT 1 FROM entry_logs WHERE visitor_id = ?1 AND exit_time IS NULL)",
                    [&id],
                    |r| r.get(0),
                )?;
                if open {
                    return Ok(Err(StoreError::AlreadyInside));
                }
                if status == VisitorStatus::Rejected.as_str() {
                    return Ok(Err(StoreError::AccessDenied));
                }

                tx.execute(
                    "UPDATE visitors SET status = ?1, check_in_time = ?2 WHERE id = ?3",
                    params![VisitorStatus::CheckedIn.as_str(), now, id],
                )?;
                tx.execute(
                    "INSERT INTO entry_logs (id, visitor_id, visitor_name, visitor_phone,
                        entry_time, entry_method, purpose, person_to_meet, status)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                    params![
                        log_id,
                        id,
                        name,
                        phone,
                        now,
                        method.as_str(),
                        purpose,
                        person_to_meet,
                        LogStatus::Inside.as_str(),
                    ],
                )?;
                let row = load_log(&tx, &log_id)?;
                tx.commit()?;
                Ok(Ok(row))
            })
            .await??;

        let log = row.into_log()?;
        tracing::info!(visitor = %log.visitor_id, log = %log.id, method = %method, "entry recorded");
        Ok(log)
    }

    /// Close the visitor's open entry log.
    pub async fn record_exit(&self, visitor_id: &str, method: EntryMethod) -> Result<EntryLog, StoreError> {
        let id = visitor_id.to_string();
        let now = timestamp(Utc::now());

        let row = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                let exists: bool = tx.query_row(
                    "SELECT EXISTS(SELECT 1 FROM visitors WHERE id = ?1)",
                    [&id],
                    |r| r.get(0),
                )?;
                if !exists {
                    return Ok(Err(StoreError::NotFound(id)));
                }

                let open: Option<String> = tx
                    .query_row(
                        "SELECT id FROM entry_logs WHERE visitor_id = ?1 AND exit_time IS NULL
                         ORDER BY entry_time DESC LIMIT 1",
                        [&id],
                        |r| r.get(0),
                    )
                    .optional()?;
                let Some(log_id) = open else {
                    return Ok(Err(StoreError::NoActiveEntry));
                };

                tx.execute(
                    "UPDATE entry_logs SET exit_time = ?1, exit_method = ?2, status = ?3 WHERE id = ?4",
                    params![now, method.as_str(), LogStatus::Exited.as_str(), log_id],
                )?;
                tx.execute(
                    "UPDATE visitors SET status = ?1, check_out_time = ?2 WHERE id = ?3",
                    params![VisitorStatus::CheckedOut.as_str(), now, id],
                )?;
                let row = load_log(&tx, &log_id)?;
                tx.commit()?;
                Ok(Ok(row))
            })
            .await??;

        let log = row.into_log()?;
        tracing::info!(visitor = %log.visitor_id, log = %log.id, method = %method, "exit recorded");
        Ok(log)
    }

    /// Entry logs matching `filter`, newest entry first.
    pub async fn logs(&self, filter: LogFilter) -> Result<LogPage, StoreError> {
        let mut clauses = Vec::new();
        let mut args: Vec<String> = Vec::new();
        if let Some(status) = filter.status {
            args.push(status.as_str().to_string());
            clauses.push(format!("status = ?{}", args.len()));
        }
        if let Some(date) = filter.date {
            let start = day_start(date);
            args.push(timestamp(start));
            clauses.push(format!("entry_time >= ?{}", args.len()));
            args.push(timestamp(start + Duration::days(1)));
            clauses.push(format!("entry_time < ?{}", args.len()));
        }
        let where_sql = if clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", clauses.join(" AND "))
        };

        let page = filter.page.max(1);
        let limit = filter.limit.max(1);
        let offset = u64::from(page - 1) * u64::from(limit);

        let (total, rows) = self
            .conn
            .call(move |conn| {
                let total: u64 = conn.query_row(
                    &format!("SELECT COUNT(*) FROM entry_logs {where_sql}"),
                    params_from_iter(args.iter()),
                    |r| r.get(0),
                )?;
                let mut stmt = conn.prepare(&format!(
                    "SELECT {LOG_COLUMNS} FROM entry_logs {where_sql}
                     ORDER BY entry_time DESC, rowid DESC LIMIT {limit} OFFSET {offset}"
                ))?;
                let rows = stmt
                    .query_map(params_from_iter(args.iter()), LogRow::from_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok((total, rows))
            })
            .await?;

        let logs = rows
            .into_iter()
            .map(LogRow::into_log)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(LogPage {
            logs,
            total,
            total_pages: total.div_ceil(u64::from(limit)),
            current_page: page,
        })
    }

    /// Every visit by one visitor, newest first.
    pub async fn visitor_logs(&self, visitor_id: &str) -> Result<Vec<EntryLog>, StoreError> {
        let id = visitor_id.to_string();
        let rows = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {LOG_COLUMNS} FROM entry_logs WHERE visitor_id = ?1
                     ORDER BY entry_time DESC, rowid DESC"
                ))?;
                let rows = stmt
                    .query_map([&id], LogRow::from_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await?;
        rows.into_iter().map(LogRow::into_log).collect()
    }

    pub async fn stats(&self) -> Result<Stats, StoreError> {
        self.stats_at(Utc::now()).await
    }

    /// Aggregate counts relative to the UTC day containing `now`.
    /// Weeks start on Sunday.
    pub async fn stats_at(&self, now: DateTime<Utc>) -> Result<Stats, StoreError> {
        let today = now.date_naive();
        let week_start = today - Duration::days(i64::from(today.weekday().num_days_from_sunday()));
        let month_start = today.with_day(1).unwrap_or(today);

        let today_ts = timestamp(day_start(today));
        let tomorrow_ts = timestamp(day_start(today) + Duration::days(1));
        let week_ts = timestamp(day_start(week_start));
        let month_ts = timestamp(day_start(month_start));

        let stats = self
            .conn
            .call(move |conn| {
                let count = |sql: &str, args: &[&str]| -> rusqlite::Result<u64> {
                    conn.query_row(sql, params_from_iter(args.iter()), |r| r.get(0))
                };
                let today_visitors = count(
                    "SELECT COUNT(*) FROM entry_logs WHERE entry_time >= ?1 AND entry_time < ?2",
                    &[today_ts.as_str(), tomorrow_ts.as_str()],
                )?;
                let week_visitors = count(
                    "SELECT COUNT(*) FROM entry_logs WHERE entry_time >= ?1",
                    &[week_ts.as_str()],
                )?;
                let month_visitors = count(
                    "SELECT COUNT(*) FROM entry_logs WHERE entry_time >= ?1",
                    &[month_ts.as_str()],
                )?;
                let total_visitors = count("SELECT COUNT(*) FROM entry_logs", &[])?;
                let currently_inside = count(
                    "SELECT COUNT(*) FROM entry_logs WHERE exit_time IS NULL",
                    &[],
                )?;
                let today_exits = count(
                    "SELECT COUNT(*) FROM entry_logs WHERE exit_time >= ?1 AND exit_time < ?2",
                    &[today_ts.as_str(), tomorrow_ts.as_str()],
                )?;

                let mut stmt = conn.prepare(
                    "SELECT purpose, COUNT(*) FROM entry_logs GROUP BY purpose ORDER BY purpose",
                )?;
                let purpose_stats = stmt
                    .query_map([], |r| {
                        Ok(PurposeCount {
                            purpose: r.get(0)?,
                            count: r.get(1)?,
                        })
                    })?
                    .collect::<Result<Vec<_>, _>>()?;

                // RFC 3339 timestamps carry the hour at characters 12-13.
                let mut stmt = conn.prepare(
                    "SELECT CAST(substr(entry_time, 12, 2) AS INTEGER) AS hour, COUNT(*)
                     FROM entry_logs WHERE entry_time >= ?1 AND entry_time < ?2
                     GROUP BY hour ORDER BY hour",
                )?;
                let hourly_stats = stmt
                    .query_map([&today_ts, &tomorrow_ts], |r| {
                        Ok(HourCount {
                            hour: r.get(0)?,
                            count: r.get(1)?,
                        })
                    })?
                    .collect::<Result<Vec<_>, _>>()?;

                Ok(Stats {
                    today_visitors,
                    week_visitors,
                    month_visitors,
                    total_visitors,
                    currently_inside,
                    today_exits,
                    purpose_stats,
                    hourly_stats,
                })
            })
            .await?;
        Ok(stats)
    }
}
