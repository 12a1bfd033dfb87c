use std::path::PathBuf;

use anyhow::Result;

use {
    herald_journal::{Layout, Locator},
    herald_protocol::{Category, Location, Mode, NEVER_ACTIVE},
};

use crate::store::{Session, SessionStore};

/// The location the session index database belongs to.
pub fn index_location() -> Location {
    Location::new(Mode::Live, Category::System, "journal", "index")
}

/// Path of the session index database under `locator`.
pub fn index_db_file(locator: &dyn Locator) -> PathBuf {
    locator.layout_file(&index_location(), Layout::Sqlite, "index")
}

/// Read-only queries over the session index.
#[derive(Clone)]
pub struct SessionFinder {
    store: SessionStore,
}

impl SessionFinder {
    pub fn new(store: SessionStore) -> Self {
        Self { store }
    }

    /// Open the index database `locator` assigns to the journal.
    pub async fn open(locator: &dyn Locator) -> Result<Self> {
        let store = SessionStore::open(&index_db_file(locator)).await?;
        Ok(Self::new(store))
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// End time of the most recently begun session of `location`, or
    /// [`NEVER_ACTIVE`] if it has none.
    pub async fn find_last_active_time(&self, location: &Location) -> Result<i64> {
        Ok(self
            .store
            .latest_for(location.uid)
            .await?
            .map_or(NEVER_ACTIVE, |s| s.end_time))
    }

    pub async fn find_sessions(&self, from: i64, to: i64) -> Result<Vec<Session>> {
        self.store.in_range(from, to, None).await
    }

    pub async fn find_sessions_for(
        &self,
        location: &Location,
        from: i64,
        to: i64,
    ) -> Result<Vec<Session>> {
        self.store.in_range(from, to, Some(location.uid)).await
    }
}
