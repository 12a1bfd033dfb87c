use std::sync::Arc;

use {
    anyhow::{Context, Result},
    tracing::{error, info},
};

use {
    herald_common::SystemClock,
    herald_config::HeraldConfig,
    herald_journal::{IoDevice, MemoryJournal},
    herald_master::Master,
    herald_profile::{SqliteProfile, profile_db_file},
    herald_protocol::{Category, Location, Mode},
    herald_sessions::{SessionBuilder, SessionFinder, SessionStore},
};

pub fn master_location() -> Location {
    Location::new(Mode::Live, Category::System, "master", "master")
}

/// Run the broker over the in-process journal until Ctrl-C.
pub async fn run(config: &HeraldConfig) -> Result<()> {
    let home = config.home_dir();
    std::fs::create_dir_all(&home)
        .with_context(|| format!("failed to create home {}", home.display()))?;

    let clock = Arc::new(SystemClock::new());
    let journal = MemoryJournal::new(&home, clock.clone());
    let io: Arc<dyn IoDevice> = Arc::new(journal.io(master_location()));

    let locator = io.locator();
    let profile = Arc::new(SqliteProfile::open(&profile_db_file(locator.as_ref())).await?);
    let sessions = match &config.sessions.db_path {
        Some(path) => SessionBuilder::new(
            SessionFinder::new(SessionStore::open(path).await?),
            io.clone(),
        ),
        None => SessionBuilder::open(io.clone()).await?,
    };

    let master = Master::new(io, clock, profile, sessions, &config.master).await?;
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
        info!("shutdown requested");
    };
    herald_master::run(master, shutdown).await
}
