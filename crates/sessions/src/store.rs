use std::{path::Path, str::FromStr};

use {
    anyhow::{Context, Result},
    serde::{Deserialize, Serialize},
    sqlx::{
        SqlitePool,
        sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    },
    tracing::{debug, info},
};

use herald_protocol::{Category, Location, Mode};

/// One activity window of a single location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub location_uid: u32,
    pub category: Category,
    pub group: String,
    pub name: String,
    pub mode: Mode,
    pub begin_time: i64,
    pub end_time: i64,
    pub frame_count: i64,
    pub data_size: i64,
}

impl Session {
    /// A fresh session for `location` starting at `begin_time`.
    pub fn begin(location: &Location, begin_time: i64) -> Self {
        Self {
            location_uid: location.uid,
            category: location.category,
            group: location.group.clone(),
            name: location.name.clone(),
            mode: location.mode,
            begin_time,
            end_time: 0,
            frame_count: 0,
            data_size: 0,
        }
    }

    pub fn uname(&self) -> String {
        format!("{}/{}/{}/{}", self.category, self.group, self.name, self.mode)
    }
}

#[derive(sqlx::FromRow)]
struct SessionRow {
    location_uid: i64,
    category: String,
    group: String,
    name: String,
    mode: String,
    begin_time: i64,
    end_time: i64,
    frame_count: i64,
    data_size: i64,
}

impl TryFrom<SessionRow> for Session {
    type Error = anyhow::Error;

    fn try_from(r: SessionRow) -> Result<Self> {
        Ok(Self {
            location_uid: u32::try_from(r.location_uid)
                .with_context(|| format!("location uid {} out of range", r.location_uid))?,
            category: Category::from_str(&r.category)?,
            group: r.group,
            name: r.name,
            mode: Mode::from_str(&r.mode)?,
            begin_time: r.begin_time,
            end_time: r.end_time,
            frame_count: r.frame_count,
            data_size: r.data_size,
        })
    }
}

/// Columns added after the first schema, with the declaration used to add
/// them to older databases.
const LATE_COLUMNS: &[(&str, &str)] = &[
    ("frame_count", "INTEGER NOT NULL DEFAULT 0"),
    ("data_size", "INTEGER NOT NULL DEFAULT 0"),
];

/// SQLite-backed session table, keyed by `location_uid`.
#[derive(Clone)]
pub struct SessionStore {
    pool: SqlitePool,
}

impl SessionStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open (creating if needed) the database at `path` and sync its schema.
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .with_context(|| format!("failed to open session index {}", path.display()))?;
        Self::init(&pool).await?;
        debug!(path = %path.display(), "session index opened");
        Ok(Self::new(pool))
    }

    /// A private in-memory database, mostly for tests.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;
        Self::init(&pool).await?;
        Ok(Self::new(pool))
    }

    /// Create the `session` table, or add any columns an older file lacks.
    pub async fn init(pool: &SqlitePool) -> Result<()> {
        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS session (
                location_uid INTEGER PRIMARY KEY,
                category     TEXT NOT NULL,
                "group"      TEXT NOT NULL,
                name         TEXT NOT NULL,
                mode         TEXT NOT NULL,
                begin_time   INTEGER NOT NULL,
                end_time     INTEGER NOT NULL DEFAULT 0,
                frame_count  INTEGER NOT NULL DEFAULT 0,
                data_size    INTEGER NOT NULL DEFAULT 0
            )"#,
        )
        .execute(pool)
        .await?;

        let existing: Vec<String> =
            sqlx::query_scalar("SELECT name FROM pragma_table_info('session')")
                .fetch_all(pool)
                .await?;
        for (column, decl) in LATE_COLUMNS {
            if !existing.iter().any(|c| c == column) {
                info!(column, "migrating session index");
                sqlx::query(&format!("ALTER TABLE session ADD COLUMN {column} {decl}"))
                    .execute(pool)
                    .await?;
            }
        }

        sqlx::query("CREATE INDEX IF NOT EXISTS session_begin_time ON session (begin_time)")
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Insert or overwrite the row for `session.location_uid`.
    pub async fn replace(&self, session: &Session) -> Result<()> {
        sqlx::query(
            r#"INSERT OR REPLACE INTO session
               (location_uid, category, "group", name, mode, begin_time, end_time, frame_count, data_size)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(i64::from(session.location_uid))
        .bind(session.category.as_str())
        .bind(&session.group)
        .bind(&session.name)
        .bind(session.mode.as_str())
        .bind(session.begin_time)
        .bind(session.end_time)
        .bind(session.frame_count)
        .bind(session.data_size)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn remove_all(&self) -> Result<()> {
        sqlx::query("DELETE FROM session").execute(&self.pool).await?;
        Ok(())
    }

    pub async fn get(&self, location_uid: u32) -> Result<Option<Session>> {
        sqlx::query_as::<_, SessionRow>("SELECT * FROM session WHERE location_uid = ?")
            .bind(i64::from(location_uid))
            .fetch_optional(&self.pool)
            .await?
            .map(Session::try_from)
            .transpose()
    }

    /// The session of `location_uid` with the greatest `begin_time`.
    pub async fn latest_for(&self, location_uid: u32) -> Result<Option<Session>> {
        sqlx::query_as::<_, SessionRow>(
            "SELECT * FROM session WHERE location_uid = ? ORDER BY begin_time DESC LIMIT 1",
        )
        .bind(i64::from(location_uid))
        .fetch_optional(&self.pool)
        .await?
        .map(Session::try_from)
        .transpose()
    }

    /// Sessions with `from <= begin_time <= to`, ascending by `begin_time`,
    /// optionally restricted to one location.
    pub async fn in_range(
        &self,
        from: i64,
        to: i64,
        location_uid: Option<u32>,
    ) -> Result<Vec<Session>> {
        let rows = match location_uid {
            Some(uid) => {
                sqlx::query_as::<_, SessionRow>(
                    r#"SELECT * FROM session
                       WHERE location_uid = ? AND begin_time >= ? AND begin_time <= ?
                       ORDER BY begin_time ASC, location_uid ASC"#,
                )
                .bind(i64::from(uid))
                .bind(from)
                .bind(to)
                .fetch_all(&self.pool)
                .await?
            },
            None => {
                sqlx::query_as::<_, SessionRow>(
                    r#"SELECT * FROM session
                       WHERE begin_time >= ? AND begin_time <= ?
                       ORDER BY begin_time ASC, location_uid ASC"#,
                )
                .bind(from)
                .bind(to)
                .fetch_all(&self.pool)
                .await?
            },
        };
        rows.into_iter().map(Session::try_from).collect()
    }

    /// Every row ordered by primary key.
    pub async fn list(&self) -> Result<Vec<Session>> {
        sqlx::query_as::<_, SessionRow>("SELECT * FROM session ORDER BY location_uid ASC")
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(Session::try_from)
            .collect()
    }
}
