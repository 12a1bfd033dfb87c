use {
    anyhow::{Context, Result},
    chrono::DateTime,
    clap::Subcommand,
};

use {
    herald_config::HeraldConfig,
    herald_journal::DirLocator,
    herald_protocol::{Location, NEVER_ACTIVE},
    herald_sessions::{Session, SessionFinder, SessionStore},
};

#[derive(Subcommand)]
pub enum SessionAction {
    /// List sessions that began within a time window.
    List {
        /// Window start, as RFC 3339 or epoch nanoseconds.
        #[arg(long, value_parser = parse_time, default_value = "0")]
        from: i64,
        /// Window end, as RFC 3339 or epoch nanoseconds.
        #[arg(long, value_parser = parse_time)]
        to: Option<i64>,
        /// Only sessions of this location (`category/group/name/mode`).
        #[arg(long)]
        location: Option<String>,
        /// Print sessions as JSON lines.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Show when a location was last active.
    LastActive {
        /// Location as `category/group/name/mode`.
        uname: String,
    },
}

pub async fn handle_sessions(action: SessionAction, config: &HeraldConfig) -> Result<()> {
    let finder = open_finder(config).await?;
    match action {
        SessionAction::List {
            from,
            to,
            location,
            json,
        } => {
            let to = to.unwrap_or(i64::MAX);
            let sessions = match location {
                Some(uname) => {
                    let location = parse_location(&uname)?;
                    finder.find_sessions_for(&location, from, to).await?
                },
                None => finder.find_sessions(from, to).await?,
            };
            print_sessions(&sessions, json)
        },
        SessionAction::LastActive { uname } => {
            let location = parse_location(&uname)?;
            let last = finder.find_last_active_time(&location).await?;
            if last == NEVER_ACTIVE {
                println!("{uname}: never active");
            } else {
                println!("{uname}: {}", format_time(last));
            }
            Ok(())
        },
    }
}

async fn open_finder(config: &HeraldConfig) -> Result<SessionFinder> {
    match &config.sessions.db_path {
        Some(path) => Ok(SessionFinder::new(SessionStore::open(path).await?)),
        None => SessionFinder::open(&DirLocator::new(config.home_dir())).await,
    }
}

fn parse_location(uname: &str) -> Result<Location> {
    Location::parse(uname).with_context(|| format!("invalid location {uname:?}"))
}

fn print_sessions(sessions: &[Session], json: bool) -> Result<()> {
    if json {
        for session in sessions {
            println!("{}", serde_json::to_string(session)?);
        }
        return Ok(());
    }
    if sessions.is_empty() {
        println!("No sessions.");
        return Ok(());
    }
    for s in sessions {
        println!(
            "{:<40} {:>32} {:>32} {:>10} {:>12}",
            s.uname(),
            format_time(s.begin_time),
            format_time(s.end_time),
            s.frame_count,
            s.data_size,
        );
    }
    Ok(())
}

fn format_time(nanos: i64) -> String {
    DateTime::from_timestamp_nanos(nanos).to_rfc3339()
}

fn parse_time(value: &str) -> Result<i64, String> {
    if let Ok(nanos) = value.parse::<i64>() {
        return Ok(nanos);
    }
    DateTime::parse_from_rfc3339(value)
        .map_err(|e| e.to_string())?
        .timestamp_nanos_opt()
        .ok_or_else(|| format!("{value} is out of range"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_time_accepts_nanos_and_rfc3339() {
        assert_eq!(parse_time("1500").unwrap(), 1500);
        assert_eq!(
            parse_time("1970-01-01T00:00:01Z").unwrap(),
            1_000_000_000
        );
        assert!(parse_time("yesterday").is_err());
    }

    #[test]
    fn format_time_is_utc_rfc3339() {
        assert_eq!(format_time(0), "1970-01-01T00:00:00+00:00");
    }

    #[tokio::test]
    async fn finder_honours_db_path_override() {
        let dir = tempfile::tempdir().unwrap();
        let config = HeraldConfig {
            home: Some(dir.path().join("home")),
            sessions: herald_config::SessionsConfig {
                db_path: Some(dir.path().join("custom/index.db")),
            },
            ..Default::default()
        };
        let finder = open_finder(&config).await.unwrap();
        assert!(finder.find_sessions(0, i64::MAX).await.unwrap().is_empty());
        assert!(dir.path().join("custom/index.db").exists());
    }
}
