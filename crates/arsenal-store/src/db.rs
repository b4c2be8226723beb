use rusqlite::Connection;

use crate::error::Result;

/// Initialise the arsenal schema in `conn`.
///
/// Creates the `tasks` and `events` tables (idempotent) and an index on
/// `execution_time` so the scheduler's polling query stays efficient even
/// with thousands of queued tasks.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS tasks (
            id             INTEGER PRIMARY KEY AUTOINCREMENT,
            execution_time TEXT    NOT NULL,   -- RFC-3339 UTC, fixed width
            task_type      INTEGER NOT NULL,   -- TaskKind wire code
            data           TEXT    NOT NULL,   -- opaque JSON payload
            description    TEXT                -- human-readable, for auditing
        ) STRICT;

        -- Efficient polling: SELECT … ORDER BY execution_time, id
        CREATE INDEX IF NOT EXISTS idx_tasks_execution_time ON tasks (execution_time);

        CREATE TABLE IF NOT EXISTS events (
            guild_id               INTEGER NOT NULL,
            event_id               INTEGER NOT NULL,
            timestamp              TEXT    NOT NULL,   -- RFC-3339 UTC
            event_type             TEXT    NOT NULL,
            description            TEXT    NOT NULL DEFAULT '',
            use_support            INTEGER NOT NULL DEFAULT 0,
            auto_passcode          INTEGER NOT NULL DEFAULT 1,
            passcode_main          TEXT    NOT NULL DEFAULT '',
            passcode_support       TEXT    NOT NULL DEFAULT '',
            raid_leaders           TEXT    NOT NULL DEFAULT '[]',  -- JSON id list
            party_leaders          TEXT    NOT NULL DEFAULT '[]',  -- JSON id list
            recruitment_channel_id INTEGER,
            recruitment_post_id    INTEGER,
            canceled               INTEGER NOT NULL DEFAULT 0,
            finished               INTEGER NOT NULL DEFAULT 0,
            PRIMARY KEY (guild_id, event_id)
        ) STRICT;
        ",
    )?;
    Ok(())
}
