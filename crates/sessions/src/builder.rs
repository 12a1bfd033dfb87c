use std::{collections::HashMap, sync::Arc};

use {
    anyhow::Result,
    tracing::{error, info, trace, warn},
};

#[cfg(feature = "metrics")]
use herald_metrics::{counter, gauge, sessions as metric};
use {
    herald_journal::IoDevice,
    herald_protocol::{Frame, Location, Message},
};

use crate::{
    finder::SessionFinder,
    store::{Session, SessionStore},
};

/// Outcome of a full index rebuild.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RebuildStats {
    pub frames: u64,
    /// Frames attributed to a uid the locator does not know.
    pub skipped: u64,
    /// Frames whose processing failed.
    pub failed: u64,
    pub sessions: usize,
}

/// Keeps the live sessions in memory and writes them through to the index.
///
/// Live sessions are owned here and addressed by location uid; callers get
/// snapshots, never references that outlive a call.
pub struct SessionBuilder {
    finder: SessionFinder,
    io: Arc<dyn IoDevice>,
    live: HashMap<u32, Session>,
}

impl SessionBuilder {
    pub fn new(finder: SessionFinder, io: Arc<dyn IoDevice>) -> Self {
        Self {
            finder,
            io,
            live: HashMap::new(),
        }
    }

    /// Open the index database for `io`'s journal.
    pub async fn open(io: Arc<dyn IoDevice>) -> Result<Self> {
        let finder = SessionFinder::open(io.locator().as_ref()).await?;
        Ok(Self::new(finder, io))
    }

    pub fn finder(&self) -> &SessionFinder {
        &self.finder
    }

    fn store(&self) -> &SessionStore {
        self.finder.store()
    }

    pub async fn find_last_active_time(&self, location: &Location) -> Result<i64> {
        self.finder.find_last_active_time(location).await
    }

    pub fn live_session(&self, location_uid: u32) -> Option<&Session> {
        self.live.get(&location_uid)
    }

    /// Start (or restart) the live session of `location` at `time` and persist it.
    pub async fn open_session(&mut self, location: &Location, time: i64) -> Result<Session> {
        let session = self
            .live
            .entry(location.uid)
            .or_insert_with(|| Session::begin(location, time));
        session.begin_time = time;
        let snapshot = session.clone();
        self.store().replace(&snapshot).await?;
        trace!(location = %location, time, "session opened");
        Ok(snapshot)
    }

    /// Persist the live session of `location`, if there is one.
    ///
    /// The entry stays in the live map so frames arriving after the close are
    /// still credited to it in memory. `end_time` is raised to `time` so a
    /// closed session never ends before it began.
    pub async fn close_session(&mut self, location: &Location, time: i64) -> Result<()> {
        let Some(session) = self.live.get_mut(&location.uid) else {
            return Ok(());
        };
        session.end_time = session.end_time.max(time);
        let snapshot = session.clone();
        self.store().replace(&snapshot).await?;
        trace!(location = %location, time, "session closed");
        Ok(())
    }

    /// Credit `frame` to the live session of its source. Not persisted.
    pub fn update_session(&mut self, frame: &Frame) {
        let Some(session) = self.live.get_mut(&frame.source) else {
            return;
        };
        session.end_time = frame.gen_time;
        session.frame_count += 1;
        session.data_size += i64::from(frame.length);
    }

    /// Write every live session to the index, e.g. at shutdown.
    pub async fn persist_live(&self) -> Result<()> {
        for session in self.live.values() {
            self.store().replace(session).await?;
        }
        Ok(())
    }

    /// Drop the index and replay the whole journal to rebuild it.
    ///
    /// Frames attributed to unknown locations are skipped and a frame that
    /// fails to apply is logged; neither stops the replay.
    pub async fn rebuild_index_db(&mut self) -> Result<RebuildStats> {
        let locator = self.io.locator();
        let mut reader = self.io.open_reader();
        let mut locations: HashMap<u32, Location> = HashMap::new();
        for location in locator.list_locations() {
            trace!(uid = %location.uid_hex(), location = %location, "investigating journal");
            for dest_uid in locator.list_location_dest(&location) {
                reader.join(&location, dest_uid, 0)?;
            }
            locations.insert(location.uid, location);
        }

        self.store().remove_all().await?;
        self.live.clear();

        let mut stats = RebuildStats::default();
        while reader.data_available() {
            let Some(frame) = reader.current_frame() else {
                break;
            };
            stats.frames += 1;
            let uid = frame.attributed_uid();
            let Some(location) = locations.get(&uid) else {
                warn!(uid = format_args!("{uid:08x}"), "location not found");
                stats.skipped += 1;
                reader.next();
                continue;
            };
            if let Err(e) = self.replay_frame(location, &frame).await {
                error!(location = %location, error = %e, "problematic frame");
                stats.failed += 1;
            }
            reader.next();
        }

        self.persist_live().await?;
        stats.sessions = self.live.len();
        info!(
            frames = stats.frames,
            skipped = stats.skipped,
            failed = stats.failed,
            sessions = stats.sessions,
            "session index rebuilt"
        );

        #[cfg(feature = "metrics")]
        {
            counter!(metric::REBUILDS_TOTAL).increment(1);
            counter!(metric::SKIPPED_FRAMES_TOTAL).increment(stats.skipped);
            counter!(metric::FAILED_FRAMES_TOTAL).increment(stats.failed);
            gauge!(metric::REBUILT_SESSIONS).set(stats.sessions as f64);
        }

        Ok(stats)
    }

    async fn replay_frame(&mut self, location: &Location, frame: &Frame) -> Result<()> {
        match frame.data {
            Message::SessionStart => {
                self.open_session(location, frame.gen_time).await?;
            },
            Message::SessionEnd => {
                self.close_session(location, frame.gen_time).await?;
            },
            // The attributed location only filters; activity belongs to the writer.
            _ if !location.is_master_control() => self.update_session(frame),
            _ => {},
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use {
        herald_common::ManualClock,
        herald_journal::{JournalWriter, MemoryIo, MemoryJournal},
        herald_protocol::{Category, Mode, MsgType, PUBLIC_UID},
    };

    use super::*;

    fn strategy(name: &str) -> Location {
        Location::new(Mode::Live, Category::Strategy, "test", name)
    }

    async fn builder() -> (Arc<ManualClock>, MemoryIo, SessionBuilder) {
        let clock = Arc::new(ManualClock::new(0));
        let journal = MemoryJournal::new("/tmp/herald-sessions", clock.clone());
        let master = Location::new(Mode::Live, Category::System, "master", "master");
        let io = journal.io(master);
        let finder = SessionFinder::new(SessionStore::in_memory().await.unwrap());
        let builder = SessionBuilder::new(finder, Arc::new(io.clone()));
        (clock, io, builder)
    }

    fn frame(source: u32, gen_time: i64, length: u32) -> Frame {
        Frame::new(source, PUBLIC_UID, gen_time, Message::Ping).with_length(length)
    }

    #[tokio::test]
    async fn open_then_close_without_frames() {
        let (_clock, _io, mut b) = builder().await;
        let a = strategy("a");
        b.open_session(&a, 100).await.unwrap();
        b.close_session(&a, 250).await.unwrap();

        let stored = b.finder().store().get(a.uid).await.unwrap().unwrap();
        assert_eq!(stored.begin_time, 100);
        assert_eq!(stored.end_time, 250);
        assert_eq!(stored.frame_count, 0);
        assert_eq!(stored.data_size, 0);
    }

    #[tokio::test]
    async fn close_without_live_session_is_noop() {
        let (_clock, _io, mut b) = builder().await;
        b.close_session(&strategy("a"), 10).await.unwrap();
        assert!(b.finder().store().list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn updates_accumulate_per_location() {
        let (_clock, _io, mut b) = builder().await;
        let a = strategy("a");
        let other = strategy("other");
        b.open_session(&a, 0).await.unwrap();
        b.open_session(&other, 0).await.unwrap();

        for (i, len) in [50u32, 60, 70].into_iter().enumerate() {
            b.update_session(&frame(a.uid, 10 + i as i64, len));
            b.update_session(&frame(other.uid, 20 + i as i64, 1000));
        }
        b.update_session(&frame(strategy("stranger").uid, 99, 5));

        let live = b.live_session(a.uid).unwrap();
        assert_eq!(live.frame_count, 3);
        assert_eq!(live.data_size, 180);
        assert_eq!(live.end_time, 12);
        // Updates are not written through.
        let stored = b.finder().store().get(a.uid).await.unwrap().unwrap();
        assert_eq!(stored.frame_count, 0);
    }

    #[tokio::test]
    async fn reopen_keeps_counters_and_moves_begin() {
        let (_clock, _io, mut b) = builder().await;
        let a = strategy("a");
        b.open_session(&a, 10).await.unwrap();
        b.update_session(&frame(a.uid, 11, 40));
        let reopened = b.open_session(&a, 50).await.unwrap();
        assert_eq!(reopened.begin_time, 50);
        assert_eq!(reopened.frame_count, 1);
    }

    #[tokio::test]
    async fn rebuild_replays_journal_and_is_idempotent() {
        let (clock, io, mut b) = builder().await;
        let app = strategy("app");
        let cmd = Location::new(Mode::Live, Category::System, "master", app.uid_hex());

        let mut cmd_writer = io.open_writer_at(&cmd, app.uid).unwrap();
        let mut app_public = io.open_writer_at(&app, PUBLIC_UID).unwrap();
        let mut app_to_cmd = io.open_writer_at(&app, cmd.uid).unwrap();

        clock.set(100);
        cmd_writer.mark(100, MsgType::SessionStart).unwrap();
        clock.set(200);
        app_public.write(0, Message::Ping).unwrap();
        clock.set(300);
        app_public.write(0, Message::Time).unwrap();
        clock.set(350);
        // Control traffic toward the master is not session activity.
        app_to_cmd.write(0, Message::Ping).unwrap();
        clock.set(500);
        cmd_writer.mark(500, MsgType::SessionEnd).unwrap();

        let first = b.rebuild_index_db().await.unwrap();
        assert_eq!(first.sessions, 1);
        assert_eq!(first.failed, 0);
        let after_first = b.finder().store().list().await.unwrap();
        assert_eq!(after_first.len(), 1);
        let s = &after_first[0];
        assert_eq!(s.location_uid, app.uid);
        assert_eq!(s.begin_time, 100);
        assert_eq!(s.end_time, 500);
        assert_eq!(s.frame_count, 2);

        b.rebuild_index_db().await.unwrap();
        assert_eq!(b.finder().store().list().await.unwrap(), after_first);
    }

    #[tokio::test]
    async fn rebuild_credits_the_writer_not_the_destination() {
        let (clock, io, mut b) = builder().await;
        let (a, peer) = (strategy("a"), strategy("peer"));
        let cmd_a = Location::new(Mode::Live, Category::System, "master", a.uid_hex());
        let cmd_peer = Location::new(Mode::Live, Category::System, "master", peer.uid_hex());
        io.journal().add_location(&peer);

        let mut to_a = io.open_writer_at(&cmd_a, a.uid).unwrap();
        let mut to_peer = io.open_writer_at(&cmd_peer, peer.uid).unwrap();
        let mut a_to_peer = io.open_writer_at(&a, peer.uid).unwrap();

        clock.set(100);
        to_a.mark(100, MsgType::SessionStart).unwrap();
        to_peer.mark(100, MsgType::SessionStart).unwrap();
        clock.set(110);
        // Bootstrap traffic on the command stream is the master's, not the app's.
        to_a.write(0, Message::Ping).unwrap();
        to_a.write(0, Message::Time).unwrap();
        clock.set(120);
        a_to_peer.write(0, Message::Ping).unwrap();

        b.rebuild_index_db().await.unwrap();

        assert_eq!(b.live_session(a.uid).unwrap().frame_count, 1);
        assert_eq!(b.live_session(a.uid).unwrap().end_time, 120);
        assert_eq!(b.live_session(peer.uid).unwrap().frame_count, 0);
    }

    #[tokio::test]
    async fn rebuild_skips_unknown_destinations() {
        let (clock, io, mut b) = builder().await;
        let app = strategy("app");
        let mut to_ghost = io.open_writer_at(&app, 0xdead_beef).unwrap();
        clock.set(10);
        to_ghost.write(0, Message::Ping).unwrap();

        let stats = b.rebuild_index_db().await.unwrap();
        assert_eq!(stats.frames, 1);
        assert_eq!(stats.skipped, 1);
        assert!(b.finder().store().list().await.unwrap().is_empty());
    }
}
