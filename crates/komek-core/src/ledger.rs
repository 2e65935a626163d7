//! Subscription ledger backed by `SQLite`.
//!
//! Four record sets in one database file: `admins`, `subscribers`,
//! `expired`, `old_expired`. Writes are serialized behind the connection
//! mutex; reads take the same lock (local SQLite, held only across the
//! statement).
//!
//! Timestamps are stored as sortable `%Y-%m-%dT%H:%M:%S` text, so both
//! instant comparisons and SQLite `DATE()` truncation work on them.

use std::{
    path::Path,
    sync::{Arc, Mutex, MutexGuard},
};

use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::{errors::Error, Result};

const TS_FMT: &str = "%Y-%m-%dT%H:%M:%S";
const DATE_FMT: &str = "%Y-%m-%d";

fn fmt_ts(ts: NaiveDateTime) -> String {
    ts.format(TS_FMT).to_string()
}

fn ts_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<NaiveDateTime> {
    let text: String = row.get(idx)?;
    NaiveDateTime::parse_from_str(&text, TS_FMT).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

/// A user with a currently valid paid-access window.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Subscriber {
    pub user_id: i64,
    pub phone: String,
    pub expires_at: NaiveDateTime,
    pub subscribed_at: NaiveDateTime,
}

/// A former subscriber, kept for reporting after expiry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExpiredSubscriber {
    pub user_id: i64,
    pub phone: String,
    pub expires_at: NaiveDateTime,
    pub subscribed_at: NaiveDateTime,
    pub expired_at: NaiveDateTime,
}

#[derive(Clone)]
pub struct Ledger {
    conn: Arc<Mutex<Connection>>,
}

impl Ledger {
    pub fn open(path: &Path) -> Result<Self> {
        Self::from_connection(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        init_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::External("ledger connection lock poisoned".to_string()))
    }

    // ============== Subscribers ==============

    /// Upsert a subscription starting now. Any stale expired/archived rows
    /// for this user are cleared so a re-subscription cannot resurrect old
    /// data. Returns the new expiry.
    pub fn add_or_renew(
        &self,
        user_id: i64,
        phone: &str,
        period_days: i64,
        now: NaiveDateTime,
    ) -> Result<NaiveDateTime> {
        let expires_at = now + chrono::Duration::days(period_days);

        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT OR REPLACE INTO subscribers (user_id, phone_number, expiry_date, subscription_date)
             VALUES (?1, ?2, ?3, ?4)",
            params![user_id, phone, fmt_ts(expires_at), fmt_ts(now)],
        )?;
        tx.execute("DELETE FROM expired WHERE user_id = ?1", params![user_id])?;
        tx.execute(
            "DELETE FROM old_expired WHERE user_id = ?1",
            params![user_id],
        )?;
        tx.commit()?;

        Ok(expires_at)
    }

    /// Extend an active subscription. Extensions stack on the remaining
    /// time: the new expiry is the current expiry plus `extra_days`, never
    /// "now plus `extra_days`".
    pub fn extend(&self, user_id: i64, extra_days: i64) -> Result<NaiveDateTime> {
        let conn = self.conn()?;
        let current: Option<NaiveDateTime> = conn
            .query_row(
                "SELECT expiry_date FROM subscribers WHERE user_id = ?1",
                params![user_id],
                |row| ts_col(row, 0),
            )
            .optional()?;

        let current = current.ok_or_else(|| Error::NotFound(format!("subscriber {user_id}")))?;
        let expires_at = current + chrono::Duration::days(extra_days);
        conn.execute(
            "UPDATE subscribers SET expiry_date = ?1 WHERE user_id = ?2",
            params![fmt_ts(expires_at), user_id],
        )?;

        Ok(expires_at)
    }

    /// Delete a subscription. No-op if absent.
    pub fn remove(&self, user_id: i64) -> Result<()> {
        self.conn()?.execute(
            "DELETE FROM subscribers WHERE user_id = ?1",
            params![user_id],
        )?;
        Ok(())
    }

    pub fn is_subscriber(&self, user_id: i64) -> Result<bool> {
        let found: Option<i64> = self
            .conn()?
            .query_row(
                "SELECT user_id FROM subscribers WHERE user_id = ?1",
                params![user_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    pub fn get_subscriber(&self, user_id: i64) -> Result<Option<Subscriber>> {
        Ok(self
            .conn()?
            .query_row(
                "SELECT user_id, phone_number, expiry_date, subscription_date
                 FROM subscribers WHERE user_id = ?1",
                params![user_id],
                subscriber_row,
            )
            .optional()?)
    }

    pub fn all_subscribers(&self) -> Result<Vec<Subscriber>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT user_id, phone_number, expiry_date, subscription_date
             FROM subscribers ORDER BY user_id",
        )?;
        let rows = stmt.query_map([], subscriber_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    // ============== Lifecycle queries ==============

    /// Subscribers whose expiry falls on exactly the given calendar day.
    pub fn subscribers_expiring_on(&self, date: NaiveDate) -> Result<Vec<i64>> {
        let conn = self.conn()?;
        let mut stmt =
            conn.prepare("SELECT user_id FROM subscribers WHERE DATE(expiry_date) = ?1")?;
        let rows = stmt.query_map(params![date.format(DATE_FMT).to_string()], |row| row.get(0))?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Subscribers whose expiry instant is already past.
    pub fn subscribers_expired_before(&self, now: NaiveDateTime) -> Result<Vec<Subscriber>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT user_id, phone_number, expiry_date, subscription_date
             FROM subscribers WHERE expiry_date < ?1",
        )?;
        let rows = stmt.query_map(params![fmt_ts(now)], subscriber_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Batch-move subscribers into `expired`, stamping `expired_at`.
    pub fn move_to_expired(&self, user_ids: &[i64], expired_at: NaiveDateTime) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        for &user_id in user_ids {
            tx.execute(
                "INSERT OR REPLACE INTO expired
                     (user_id, phone_number, expiry_date, subscription_date, expired_at)
                 SELECT user_id, phone_number, expiry_date, subscription_date, ?2
                 FROM subscribers WHERE user_id = ?1",
                params![user_id, fmt_ts(expired_at)],
            )?;
            tx.execute(
                "DELETE FROM subscribers WHERE user_id = ?1",
                params![user_id],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Move `expired` rows whose expiry date is before the cutoff day into
    /// `old_expired`. Returns how many rows moved.
    pub fn archive_old_expired(&self, cutoff: NaiveDate) -> Result<usize> {
        let cutoff = cutoff.format(DATE_FMT).to_string();

        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let moved = tx.execute(
            "INSERT OR REPLACE INTO old_expired
                 (user_id, phone_number, expiry_date, subscription_date, expired_at)
             SELECT user_id, phone_number, expiry_date, subscription_date, expired_at
             FROM expired WHERE DATE(expiry_date) < ?1",
            params![cutoff],
        )?;
        tx.execute(
            "DELETE FROM expired WHERE DATE(expiry_date) < ?1",
            params![cutoff],
        )?;
        tx.commit()?;
        Ok(moved)
    }

    pub fn all_expired(&self) -> Result<Vec<ExpiredSubscriber>> {
        self.expired_rows("expired")
    }

    pub fn all_old_expired(&self) -> Result<Vec<ExpiredSubscriber>> {
        self.expired_rows("old_expired")
    }

    fn expired_rows(&self, table: &str) -> Result<Vec<ExpiredSubscriber>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT user_id, phone_number, expiry_date, subscription_date, expired_at
             FROM {table} ORDER BY user_id"
        ))?;
        let rows = stmt.query_map([], expired_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    // ============== Admins ==============

    pub fn is_admin(&self, user_id: i64) -> Result<bool> {
        let found: Option<i64> = self
            .conn()?
            .query_row(
                "SELECT tg_id FROM admins WHERE tg_id = ?1",
                params![user_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    pub fn add_admin(&self, nickname: &str, user_id: i64) -> Result<()> {
        let result = self.conn()?.execute(
            "INSERT INTO admins (nickname, tg_id) VALUES (?1, ?2)",
            params![nickname, user_id],
        );
        match result {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(Error::Conflict(format!("admin {user_id} already exists")))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Remove an admin by numeric id, or by nickname otherwise. Returns how
    /// many rows were deleted.
    pub fn remove_admin(&self, identifier: &str) -> Result<usize> {
        let conn = self.conn()?;
        let deleted = match identifier.parse::<i64>() {
            Ok(id) => conn.execute("DELETE FROM admins WHERE tg_id = ?1", params![id])?,
            Err(_) => conn.execute(
                "DELETE FROM admins WHERE nickname = ?1",
                params![identifier],
            )?,
        };
        Ok(deleted)
    }

    pub fn admin_ids(&self) -> Result<Vec<i64>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT tg_id FROM admins")?;
        let rows = stmt.query_map([], |row| row.get(0))?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }
}

fn subscriber_row(row: &Row<'_>) -> rusqlite::Result<Subscriber> {
    Ok(Subscriber {
        user_id: row.get(0)?,
        phone: row.get(1)?,
        expires_at: ts_col(row, 2)?,
        subscribed_at: ts_col(row, 3)?,
    })
}

fn expired_row(row: &Row<'_>) -> rusqlite::Result<ExpiredSubscriber> {
    Ok(ExpiredSubscriber {
        user_id: row.get(0)?,
        phone: row.get(1)?,
        expires_at: ts_col(row, 2)?,
        subscribed_at: ts_col(row, 3)?,
        expired_at: ts_col(row, 4)?,
    })
}

fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS admins (
             id INTEGER PRIMARY KEY AUTOINCREMENT,
             nickname TEXT,
             tg_id INTEGER UNIQUE);
         CREATE TABLE IF NOT EXISTS subscribers (
             user_id INTEGER PRIMARY KEY,
             phone_number TEXT,
             expiry_date TEXT,
             subscription_date TEXT);
         CREATE TABLE IF NOT EXISTS expired (
             user_id INTEGER PRIMARY KEY,
             phone_number TEXT,
             expiry_date TEXT,
             subscription_date TEXT,
             expired_at TEXT);
         CREATE TABLE IF NOT EXISTS old_expired (
             user_id INTEGER PRIMARY KEY,
             phone_number TEXT,
             expiry_date TEXT,
             subscription_date TEXT,
             expired_at TEXT);",
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ts(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, TS_FMT).unwrap()
    }

    #[test]
    fn add_or_renew_upserts_and_sets_expiry() {
        let ledger = Ledger::open_in_memory().unwrap();
        let now = ts("2026-08-04T12:00:00");

        let expiry = ledger.add_or_renew(7, "+77010000001", 30, now).unwrap();
        assert_eq!(expiry, ts("2026-09-03T12:00:00"));
        assert!(ledger.is_subscriber(7).unwrap());

        // Second add replaces, does not duplicate.
        ledger.add_or_renew(7, "+77010000002", 30, now).unwrap();
        let all = ledger.all_subscribers().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].phone, "+77010000002");
    }

    #[test]
    fn re_subscription_clears_stale_expired_rows() {
        let ledger = Ledger::open_in_memory().unwrap();
        let start = ts("2026-01-01T00:00:00");

        ledger.add_or_renew(7, "+7", 30, start).unwrap();
        let ids: Vec<i64> = vec![7];
        ledger.move_to_expired(&ids, ts("2026-02-01T00:00:00")).unwrap();
        ledger
            .archive_old_expired(NaiveDate::from_ymd_opt(2026, 3, 15).unwrap())
            .unwrap();
        assert_eq!(ledger.all_old_expired().unwrap().len(), 1);

        ledger.add_or_renew(7, "+7", 30, ts("2026-06-01T00:00:00")).unwrap();
        assert!(ledger.is_subscriber(7).unwrap());
        assert!(ledger.all_expired().unwrap().is_empty());
        assert!(ledger.all_old_expired().unwrap().is_empty());
    }

    #[test]
    fn extend_stacks_on_current_expiry() {
        let ledger = Ledger::open_in_memory().unwrap();
        let now = ts("2026-08-04T12:00:00");

        let original = ledger.add_or_renew(7, "+7", 30, now).unwrap();
        let first = ledger.extend(7, 30).unwrap();
        let second = ledger.extend(7, 90).unwrap();
        assert_eq!(second, original + chrono::Duration::days(120));
        assert_eq!(first, original + chrono::Duration::days(30));
    }

    #[test]
    fn extend_unknown_subscriber_is_not_found() {
        let ledger = Ledger::open_in_memory().unwrap();
        assert!(matches!(ledger.extend(42, 30), Err(Error::NotFound(_))));
    }

    #[test]
    fn remove_is_unconditional() {
        let ledger = Ledger::open_in_memory().unwrap();
        ledger.remove(42).unwrap(); // absent: no-op

        ledger
            .add_or_renew(42, "+7", 30, ts("2026-08-04T12:00:00"))
            .unwrap();
        ledger.remove(42).unwrap();
        assert!(!ledger.is_subscriber(42).unwrap());
    }

    #[test]
    fn expired_selection_compares_instants() {
        let ledger = Ledger::open_in_memory().unwrap();
        ledger
            .add_or_renew(1, "+1", 30, ts("2026-01-01T00:00:00"))
            .unwrap();
        ledger
            .add_or_renew(2, "+2", 30, ts("2026-07-20T00:00:00"))
            .unwrap();

        let due = ledger
            .subscribers_expired_before(ts("2026-08-04T12:00:00"))
            .unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].user_id, 1);
    }

    #[test]
    fn move_to_expired_stamps_expired_at() {
        let ledger = Ledger::open_in_memory().unwrap();
        ledger
            .add_or_renew(1, "+1", 30, ts("2026-01-01T00:00:00"))
            .unwrap();

        let when = ts("2026-02-05T09:00:00");
        ledger.move_to_expired(&[1], when).unwrap();

        assert!(!ledger.is_subscriber(1).unwrap());
        let expired = ledger.all_expired().unwrap();
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].expired_at, when);
        assert_eq!(expired[0].phone, "+1");
    }

    #[test]
    fn archive_moves_only_rows_past_cutoff() {
        let ledger = Ledger::open_in_memory().unwrap();
        ledger
            .add_or_renew(1, "+1", 10, ts("2026-01-01T00:00:00"))
            .unwrap();
        ledger
            .add_or_renew(2, "+2", 10, ts("2026-03-01T00:00:00"))
            .unwrap();
        ledger
            .move_to_expired(&[1, 2], ts("2026-03-20T00:00:00"))
            .unwrap();

        let moved = ledger
            .archive_old_expired(NaiveDate::from_ymd_opt(2026, 2, 20).unwrap())
            .unwrap();
        assert_eq!(moved, 1);

        let expired = ledger.all_expired().unwrap();
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].user_id, 2);
        let old = ledger.all_old_expired().unwrap();
        assert_eq!(old.len(), 1);
        assert_eq!(old[0].user_id, 1);
    }

    #[test]
    fn duplicate_admin_is_a_conflict() {
        let ledger = Ledger::open_in_memory().unwrap();
        ledger.add_admin("alima", 555).unwrap();
        assert!(matches!(
            ledger.add_admin("else", 555),
            Err(Error::Conflict(_))
        ));
        assert_eq!(ledger.admin_ids().unwrap(), vec![555]);
        assert!(ledger.is_admin(555).unwrap());
    }

    #[test]
    fn remove_admin_by_id_or_nickname() {
        let ledger = Ledger::open_in_memory().unwrap();
        ledger.add_admin("alima", 555).unwrap();
        ledger.add_admin("bek", 556).unwrap();

        assert_eq!(ledger.remove_admin("555").unwrap(), 1);
        assert_eq!(ledger.remove_admin("bek").unwrap(), 1);
        assert_eq!(ledger.remove_admin("nobody").unwrap(), 0);
        assert!(ledger.admin_ids().unwrap().is_empty());
    }

    #[test]
    fn expiring_on_uses_date_only() {
        let ledger = Ledger::open_in_memory().unwrap();
        ledger
            .add_or_renew(1, "+1", 30, ts("2026-08-01T23:30:00"))
            .unwrap();

        let due = ledger
            .subscribers_expiring_on(NaiveDate::from_ymd_opt(2026, 8, 31).unwrap())
            .unwrap();
        assert_eq!(due, vec![1]);
    }
}
