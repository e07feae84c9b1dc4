use rusqlite::{Connection, OptionalExtension};
use std::path::Path;

use crate::schedule::{days_in_month, decode_codes, encode_codes, MonthlySchedule};

pub const DB_FILE: &str = "availd.sqlite3";

/// Credentials for one edit session, constructed once at session open and
/// passed explicitly into every persistence call.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub access_token: String,
    pub group_id: String,
}

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join(DB_FILE);
    let conn = Connection::open(db_path)?;
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS groups(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS members(
            token TEXT PRIMARY KEY,
            group_id TEXT NOT NULL,
            display_name TEXT NOT NULL,
            joined_at TEXT,
            FOREIGN KEY(group_id) REFERENCES groups(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_members_group ON members(group_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS member_schedules(
            group_id TEXT NOT NULL,
            member_token TEXT NOT NULL,
            year INTEGER NOT NULL,
            month INTEGER NOT NULL,
            availability_codes TEXT NOT NULL,
            updated_at TEXT,
            PRIMARY KEY(group_id, member_token, year, month),
            FOREIGN KEY(group_id) REFERENCES groups(id),
            FOREIGN KEY(member_token) REFERENCES members(token)
        )",
        [],
    )?;

    // Early workspaces predate the updated_at column. Add it if needed.
    ensure_member_schedules_updated_at(&conn)?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_member_schedules_group ON member_schedules(group_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_member_schedules_member ON member_schedules(member_token)",
        [],
    )?;

    Ok(conn)
}

fn ensure_member_schedules_updated_at(conn: &Connection) -> anyhow::Result<()> {
    if table_has_column(conn, "member_schedules", "updated_at")? {
        return Ok(());
    }
    conn.execute(
        "ALTER TABLE member_schedules ADD COLUMN updated_at TEXT",
        [],
    )?;
    Ok(())
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> anyhow::Result<bool> {
    let sql = format!("PRAGMA table_info({})", table);
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == column {
            return Ok(true);
        }
    }
    Ok(false)
}

pub fn group_exists(conn: &Connection, group_id: &str) -> anyhow::Result<bool> {
    let found = conn
        .query_row("SELECT 1 FROM groups WHERE id = ?", [group_id], |r| {
            r.get::<_, i64>(0)
        })
        .optional()?;
    Ok(found.is_some())
}

pub fn member_display_name(
    conn: &Connection,
    config: &SessionConfig,
) -> anyhow::Result<Option<String>> {
    let name = conn
        .query_row(
            "SELECT display_name FROM members WHERE group_id = ? AND token = ?",
            (&config.group_id, &config.access_token),
            |r| r.get(0),
        )
        .optional()?;
    Ok(name)
}

/// Initial-load half of the persistence gateway: the member's committed
/// months, ordered by calendar position. Stored rows normalize to the
/// month's day count on the way in so indices always line up.
pub fn load_schedules(
    conn: &Connection,
    config: &SessionConfig,
) -> anyhow::Result<Vec<MonthlySchedule>> {
    let mut stmt = conn.prepare(
        "SELECT year, month, availability_codes
         FROM member_schedules
         WHERE group_id = ? AND member_token = ?
         ORDER BY year, month",
    )?;
    let rows = stmt
        .query_map((&config.group_id, &config.access_token), |r| {
            Ok((
                r.get::<_, i32>(0)?,
                r.get::<_, i64>(1)? as u32,
                r.get::<_, String>(2)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut schedules = Vec::with_capacity(rows.len());
    for (year, month, codes) in rows {
        let days = days_in_month(year, month).unwrap_or(codes.chars().count());
        schedules.push(MonthlySchedule {
            year,
            month,
            availabilities: decode_codes(&codes, days),
        });
    }
    Ok(schedules)
}

/// Commit half of the gateway. The whole collection is the unit of
/// persistence: the member's stored months are replaced wholesale in one
/// transaction, last write wins.
pub fn save_schedules(
    conn: &Connection,
    config: &SessionConfig,
    schedules: &[MonthlySchedule],
) -> anyhow::Result<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "DELETE FROM member_schedules WHERE group_id = ? AND member_token = ?",
        (&config.group_id, &config.access_token),
    )?;
    let saved_at = chrono::Utc::now().to_rfc3339();
    for schedule in schedules {
        tx.execute(
            "INSERT INTO member_schedules(group_id, member_token, year, month, availability_codes, updated_at)
             VALUES(?, ?, ?, ?, ?, ?)",
            (
                &config.group_id,
                &config.access_token,
                schedule.year,
                schedule.month as i64,
                encode_codes(&schedule.availabilities),
                &saved_at,
            ),
        )?;
    }
    tx.commit()?;
    Ok(())
}
