#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;

use {
    herald_common::ManualClock,
    herald_config::MasterConfig,
    herald_journal::{MemoryIo, MemoryJournal},
    herald_master::Master,
    herald_profile::{ProfileStore, SqliteProfile},
    herald_protocol::{Category, Frame, Location, Message, Mode, MsgType, PUBLIC_UID, Register},
    herald_sessions::{SessionBuilder, SessionFinder, SessionStore},
};

pub struct Harness {
    pub clock: Arc<ManualClock>,
    pub journal: MemoryJournal,
    pub io: MemoryIo,
    pub home: Location,
    pub profile: Arc<SqliteProfile>,
    pub store: SessionStore,
}

impl Harness {
    pub async fn new() -> Self {
        let clock = Arc::new(ManualClock::new(0));
        let journal = MemoryJournal::new("/tmp/herald-master-tests", clock.clone());
        let home = master_home();
        let io = journal.io(home.clone());
        Self {
            clock,
            journal,
            io,
            home,
            profile: Arc::new(SqliteProfile::in_memory().await.unwrap()),
            store: SessionStore::in_memory().await.unwrap(),
        }
    }

    pub async fn master(&self) -> Master {
        self.master_with_profile(self.profile.clone()).await
    }

    pub async fn master_with_profile(&self, profile: Arc<dyn ProfileStore>) -> Master {
        let io = Arc::new(self.io.clone());
        let sessions = SessionBuilder::new(SessionFinder::new(self.store.clone()), io.clone());
        Master::new(
            io,
            self.clock.clone(),
            profile,
            sessions,
            &MasterConfig::default(),
        )
        .await
        .unwrap()
    }

    /// Register `app` at `t` straight through the handler.
    pub async fn register(&self, master: &mut Master, app: &Location, t: i64) {
        self.clock.set(t);
        master.register_app(&register_frame(app, t)).await.unwrap();
    }

    /// Everything the master broadcast on the public stream.
    pub fn public(&self) -> Vec<Message> {
        messages(&self.journal, self.home.uid, PUBLIC_UID)
    }

    /// The master's command stream toward `app`.
    pub fn commands(&self, app: &Location) -> Vec<Frame> {
        self.journal.frames(cmd_location(app).uid, app.uid)
    }

    pub fn command_types(&self, app: &Location) -> Vec<MsgType> {
        self.commands(app).iter().map(Frame::msg_type).collect()
    }

    /// Append a frame `source` writes on its public stream at `t`.
    pub fn emit(&self, source: &Location, t: i64, data: Message, length: u32) {
        self.clock.set(t);
        self.journal.append(
            source,
            Frame::new(source.uid, PUBLIC_UID, t, data).with_length(length),
        );
    }
}

pub fn master_home() -> Location {
    Location::new(Mode::Live, Category::System, "master", "master")
}

pub fn strategy(name: &str) -> Location {
    Location::new(Mode::Live, Category::Strategy, "test", name)
}

pub fn cmd_location(app: &Location) -> Location {
    Location::new(Mode::Live, Category::System, "master", app.uid_hex())
}

pub fn register_frame(app: &Location, t: i64) -> Frame {
    Frame::new(
        app.uid,
        master_home().uid,
        t,
        Message::Register(Register::new(app, 4242, t)),
    )
}

pub fn messages(journal: &MemoryJournal, source: u32, dest: u32) -> Vec<Message> {
    journal
        .frames(source, dest)
        .into_iter()
        .map(|f| f.data)
        .collect()
}

pub fn count(types: &[MsgType], wanted: MsgType) -> usize {
    types.iter().filter(|t| **t == wanted).count()
}
