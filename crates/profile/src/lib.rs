//! Profile store: records that must survive restarts (known locations,
//! per-location configs, commission tables).

use std::path::{Path, PathBuf};

use {
    anyhow::{Context, Result},
    async_trait::async_trait,
    sqlx::{
        SqlitePool,
        sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    },
    tracing::{debug, warn},
};

use {
    herald_journal::{Layout, Locator},
    herald_protocol::{Category, Location, Mode, ProfileKind, ProfileRecord},
};

/// Typed key-record store.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// All records of `kind`, ordered by key.
    async fn get_all(&self, kind: ProfileKind) -> Result<Vec<ProfileRecord>>;

    /// Insert or replace the record under its kind and key.
    async fn set(&self, record: &ProfileRecord) -> Result<()>;

    async fn remove(&self, kind: ProfileKind, key: &str) -> Result<()>;
}

/// Path of the profile database under `locator`.
pub fn profile_db_file(locator: &dyn Locator) -> PathBuf {
    let etc = Location::new(Mode::Live, Category::System, "etc", "profile");
    locator.layout_file(&etc, Layout::Sqlite, "profile")
}

/// SQLite-backed profile, one JSON document per (kind, key).
#[derive(Clone)]
pub struct SqliteProfile {
    pool: SqlitePool,
}

impl SqliteProfile {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

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
            .with_context(|| format!("failed to open profile {}", path.display()))?;
        Self::init(&pool).await?;
        debug!(path = %path.display(), "profile opened");
        Ok(Self::new(pool))
    }

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

    pub async fn init(pool: &SqlitePool) -> Result<()> {
        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS profile (
                kind TEXT NOT NULL,
                key  TEXT NOT NULL,
                body TEXT NOT NULL,
                PRIMARY KEY (kind, key)
            )"#,
        )
        .execute(pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl ProfileStore for SqliteProfile {
    async fn get_all(&self, kind: ProfileKind) -> Result<Vec<ProfileRecord>> {
        let bodies: Vec<String> =
            sqlx::query_scalar("SELECT body FROM profile WHERE kind = ? ORDER BY key ASC")
                .bind(kind.as_str())
                .fetch_all(&self.pool)
                .await?;
        let mut records = Vec::with_capacity(bodies.len());
        for body in bodies {
            match serde_json::from_str::<ProfileRecord>(&body) {
                Ok(record) => records.push(record),
                Err(e) => warn!(kind = kind.as_str(), error = %e, "skipping unreadable profile record"),
            }
        }
        Ok(records)
    }

    async fn set(&self, record: &ProfileRecord) -> Result<()> {
        let body = serde_json::to_string(record)?;
        sqlx::query("INSERT OR REPLACE INTO profile (kind, key, body) VALUES (?, ?, ?)")
            .bind(record.kind().as_str())
            .bind(record.key())
            .bind(body)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn remove(&self, kind: ProfileKind, key: &str) -> Result<()> {
        sqlx::query("DELETE FROM profile WHERE kind = ? AND key = ?")
            .bind(kind.as_str())
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use herald_protocol::{Commission, Config};

    use super::*;

    fn td(name: &str) -> Location {
        Location::new(Mode::Live, Category::Td, "sim", name)
    }

    #[tokio::test]
    async fn set_replaces_by_kind_and_key() {
        let profile = SqliteProfile::in_memory().await.unwrap();
        let loc = td("a");
        profile
            .set(&ProfileRecord::Config(Config::new(&loc, "{}")))
            .await
            .unwrap();
        profile
            .set(&ProfileRecord::Config(Config::new(&loc, r#"{"x":1}"#)))
            .await
            .unwrap();
        profile
            .set(&ProfileRecord::Location(loc.clone()))
            .await
            .unwrap();

        let configs = profile.get_all(ProfileKind::Config).await.unwrap();
        assert_eq!(configs.len(), 1);
        let ProfileRecord::Config(c) = &configs[0] else {
            panic!("expected config");
        };
        assert_eq!(c.value, r#"{"x":1}"#);
        assert_eq!(profile.get_all(ProfileKind::Location).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn remove_deletes_single_record() {
        let profile = SqliteProfile::in_memory().await.unwrap();
        let commission = Commission {
            product_id: "rb".into(),
            exchange_id: "SHFE".into(),
            open_ratio: 0.0001,
            close_ratio: 0.0001,
            close_today_ratio: 0.0,
        };
        let record = ProfileRecord::Commission(commission);
        profile.set(&record).await.unwrap();
        profile
            .remove(ProfileKind::Commission, &record.key())
            .await
            .unwrap();
        assert!(profile.get_all(ProfileKind::Commission).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("etc").join("profile.db");
        {
            let profile = SqliteProfile::open(&path).await.unwrap();
            profile.set(&ProfileRecord::Location(td("a"))).await.unwrap();
        }
        let profile = SqliteProfile::open(&path).await.unwrap();
        let all = profile.get_all(ProfileKind::Location).await.unwrap();
        assert_eq!(all, vec![ProfileRecord::Location(td("a"))]);
    }
}
