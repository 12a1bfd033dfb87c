#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use std::sync::{
    Arc,
    atomic::{AtomicBool, AtomicUsize, Ordering},
};

use {
    anyhow::{Result, bail},
    async_trait::async_trait,
    herald_master::MasterHooks,
    herald_profile::ProfileStore,
    herald_protocol::{
        Category, Channel, Config, Frame, Location, Message, Mode, MsgType, NEVER_ACTIVE,
        ProfileKind, ProfileRecord, PUBLIC_UID, Register, RequestWriteTo, TimeRequest,
    },
};

use common::{Harness, cmd_location, count, register_frame, strategy};

fn registers(messages: &[Message]) -> Vec<Register> {
    messages
        .iter()
        .filter_map(|m| match m {
            Message::Register(r) => Some(r.clone()),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn startup_restores_profile_locations_and_marks_session_start() {
    let h = Harness::new().await;
    let known = strategy("known");
    let configured = Location::new(Mode::Live, Category::Td, "sim", "acct");
    h.profile
        .set(&ProfileRecord::Location(known.clone()))
        .await
        .unwrap();
    h.profile
        .set(&ProfileRecord::Config(Config::new(&configured, "{}")))
        .await
        .unwrap();

    let master = h.master().await;

    assert!(master.has_location(known.uid));
    assert!(master.has_location(configured.uid));
    assert!(!master.is_location_live(known.uid));
    // Locations discovered through configs are written back to the profile.
    let locations = h.profile.get_all(ProfileKind::Location).await.unwrap();
    assert!(locations.contains(&ProfileRecord::Location(configured)));
    assert_eq!(h.public(), vec![Message::SessionStart]);
}

#[tokio::test]
async fn first_registration_goes_live_with_never_active_stamp() {
    let h = Harness::new().await;
    let mut master = h.master().await;
    let a = strategy("a");

    h.register(&mut master, &a, 100).await;

    assert!(master.is_location_live(a.uid));
    assert!(master.has_writer(a.uid));
    let cmd = cmd_location(&a);
    assert!(master.has_location(cmd.uid));
    assert_eq!(master.cmd_location_of(a.uid), Some(cmd.uid));

    let public = h.public();
    assert!(public.contains(&Message::Location(a.clone())));
    let broadcast = registers(&public);
    assert_eq!(broadcast.len(), 1);
    assert_eq!(broadcast[0].last_active_time, NEVER_ACTIVE);

    let session = h.store.get(a.uid).await.unwrap().unwrap();
    assert_eq!(session.begin_time, 100);
}

#[tokio::test]
async fn duplicate_registration_is_rejected() {
    let h = Harness::new().await;
    let mut master = h.master().await;
    let a = strategy("a");

    h.register(&mut master, &a, 100).await;
    let commands_before = h.commands(&a).len();
    h.register(&mut master, &a, 200).await;

    assert_eq!(registers(&h.public()).len(), 1);
    assert_eq!(h.commands(&a).len(), commands_before);
    let session = h.store.get(a.uid).await.unwrap().unwrap();
    assert_eq!(session.begin_time, 100);
}

#[tokio::test]
async fn bootstrap_follows_the_fixed_order() {
    let h = Harness::new().await;
    let mut master = h.master().await;
    let (a, b) = (strategy("a"), strategy("b"));

    h.register(&mut master, &b, 100).await;
    master
        .on_write_request(150, b.uid, &RequestWriteTo { dest_id: PUBLIC_UID })
        .unwrap();
    h.register(&mut master, &a, 200).await;

    assert_eq!(h.command_types(&a), vec![
        MsgType::RequestWriteTo,
        MsgType::RequestWriteTo,
        MsgType::SessionStart,
        MsgType::TimeReset,
        MsgType::TradingDay,
        // b, cmd(b), a, cmd(a) from the profile
        MsgType::Location,
        MsgType::Location,
        MsgType::Location,
        MsgType::Location,
        MsgType::Register,
        MsgType::Register,
        MsgType::Channel,
        MsgType::RequestStart,
        MsgType::Register,
        MsgType::Register,
        MsgType::Channel,
    ]);

    let commands = h.commands(&a);
    assert_eq!(commands[12].trigger_time, master.start_time());
    assert_eq!(
        commands[0].data,
        Message::RequestWriteTo(RequestWriteTo { dest_id: PUBLIC_UID })
    );
    assert_eq!(
        commands[1].data,
        Message::RequestWriteTo(RequestWriteTo {
            dest_id: cmd_location(&a).uid,
        })
    );
    assert_eq!(
        commands[11].data,
        Message::Channel(Channel::new(b.uid, PUBLIC_UID))
    );
}

#[tokio::test]
async fn example_session_from_register_to_exit() {
    let h = Harness::new().await;
    let mut master = h.master().await;
    let handle = master.handle();
    let a = strategy("a");

    h.clock.set(100);
    assert!(handle.control(register_frame(&a, 100)));
    master.poll().await;
    assert!(master.is_location_live(a.uid));

    h.emit(&a, 150, Message::Ping, 50);
    h.emit(&a, 160, Message::Ping, 60);
    h.emit(&a, 170, Message::Ping, 70);
    master.poll().await;

    h.clock.set(500);
    assert!(handle.app_exited(a.uid, 500));
    master.poll().await;

    let s = h.store.get(a.uid).await.unwrap().unwrap();
    assert_eq!(s.begin_time, 100);
    assert_eq!(s.end_time, 500);
    assert_eq!(s.frame_count, 3);
    assert_eq!(s.data_size, 180);
    assert!(!master.is_location_live(a.uid));
    assert_eq!(h.command_types(&a).last(), Some(&MsgType::SessionEnd));

    // Coming back reports when it was last seen.
    h.register(&mut master, &a, 600).await;
    let broadcast = registers(&h.public());
    assert_eq!(broadcast.len(), 2);
    assert_eq!(broadcast[1].last_active_time, 500);
}

/// Profile store whose reads can be switched off.
struct FlakyProfile {
    inner: Arc<dyn ProfileStore>,
    failing: AtomicBool,
}

#[async_trait]
impl ProfileStore for FlakyProfile {
    async fn get_all(&self, kind: ProfileKind) -> Result<Vec<ProfileRecord>> {
        if self.failing.load(Ordering::SeqCst) {
            bail!("profile unavailable");
        }
        self.inner.get_all(kind).await
    }

    async fn set(&self, record: &ProfileRecord) -> Result<()> {
        self.inner.set(record).await
    }

    async fn remove(&self, kind: ProfileKind, key: &str) -> Result<()> {
        self.inner.remove(kind, key).await
    }
}

#[tokio::test]
async fn failed_registration_rolls_back_and_can_be_retried() {
    let h = Harness::new().await;
    let profile = Arc::new(FlakyProfile {
        inner: h.profile.clone(),
        failing: AtomicBool::new(false),
    });
    let mut master = h.master_with_profile(profile.clone()).await;
    let a = strategy("a");

    profile.failing.store(true, Ordering::SeqCst);
    h.clock.set(100);
    assert!(master.register_app(&register_frame(&a, 100)).await.is_err());

    assert!(!master.is_location_live(a.uid));
    assert!(!master.has_writer(a.uid));
    assert_eq!(master.cmd_location_of(a.uid), None);
    assert!(master.cache_shift(a.uid).is_none());

    profile.failing.store(false, Ordering::SeqCst);
    h.register(&mut master, &a, 200).await;

    assert!(master.is_location_live(a.uid));
    assert!(master.has_writer(a.uid));
    assert_eq!(count(&h.command_types(&a), MsgType::RequestStart), 1);
}

#[tokio::test]
async fn deregistration_tears_down_and_is_repeatable() {
    let h = Harness::new().await;
    let mut master = h.master().await;
    let (a, b) = (strategy("a"), strategy("b"));
    h.register(&mut master, &a, 100).await;
    h.register(&mut master, &b, 110).await;
    master
        .on_write_request(120, a.uid, &RequestWriteTo { dest_id: b.uid })
        .unwrap();
    master.on_time_request(a.uid, &TimeRequest {
        id: 1,
        duration: 10,
        repeat: 5,
    });

    let ghost = strategy("ghost");
    master
        .submit_when_channel(ghost.uid, a.uid, Message::Ping)
        .unwrap();
    assert_eq!(master.pending_count(ghost.uid, a.uid), 1);

    master.deregister_app(300, a.uid).await;
    master.deregister_app(310, a.uid).await;

    assert_eq!(master.pending_count(ghost.uid, a.uid), 0);

    assert!(!master.is_location_live(a.uid));
    assert!(master.has_location(a.uid));
    assert!(!master.has_writer(a.uid));
    assert!(!master.has_channel(a.uid, b.uid));
    assert!(master.timers().get(a.uid, 1).is_none());
    assert!(master.cache_shift(a.uid).is_none());
    assert!(master.is_location_live(b.uid));

    let deregisters: Vec<_> = h
        .public()
        .into_iter()
        .filter(|m| matches!(m, Message::Deregister(d) if d.location_uid == a.uid))
        .collect();
    assert_eq!(deregisters.len(), 1);
    assert_eq!(count(&h.command_types(&a), MsgType::SessionEnd), 1);
}

#[tokio::test]
async fn unknown_app_exit_is_harmless() {
    let h = Harness::new().await;
    let mut master = h.master().await;
    master.deregister_app(10, strategy("ghost").uid).await;
    master.deregister_app(10, PUBLIC_UID).await;
    assert!(master.has_writer(PUBLIC_UID));
    assert_eq!(h.public(), vec![Message::SessionStart]);
}

#[tokio::test]
async fn timer_fires_three_times_then_stops() {
    let h = Harness::new().await;
    let mut master = h.master().await;
    let a = strategy("a");
    h.register(&mut master, &a, 0).await;

    master.on_time_request(a.uid, &TimeRequest {
        id: 1,
        duration: 1000,
        repeat: 3,
    });

    for (now, fired) in [(999, 0), (1000, 1), (2000, 2), (3000, 3), (4000, 3)] {
        master.on_active(now);
        assert_eq!(count(&h.command_types(&a), MsgType::Time), fired, "at {now}");
    }
    assert!(master.timers().get(a.uid, 1).is_none());
}

#[derive(Clone, Default)]
struct CountingHooks {
    registered: Arc<AtomicUsize>,
    intervals: Arc<AtomicUsize>,
}

impl MasterHooks for CountingHooks {
    fn on_register(&mut self, _frame: &Frame, _register: &Register) {
        self.registered.fetch_add(1, Ordering::SeqCst);
    }

    fn on_interval_check(&mut self, _now: i64) {
        self.intervals.fetch_add(1, Ordering::SeqCst);
    }
}

#[tokio::test]
async fn hooks_run_on_register_and_once_per_second() {
    let h = Harness::new().await;
    let hooks = CountingHooks::default();
    let mut master = h.master().await.with_hooks(hooks.clone());

    h.register(&mut master, &strategy("a"), 0).await;
    h.register(&mut master, &strategy("a"), 0).await;
    assert_eq!(hooks.registered.load(Ordering::SeqCst), 1);

    const SECOND: i64 = 1_000_000_000;
    for now in [SECOND, SECOND + 1, SECOND + SECOND / 2, 2 * SECOND + 2] {
        master.on_active(now);
    }
    assert_eq!(hooks.intervals.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn location_event_is_recorded_and_rebroadcast() {
    let h = Harness::new().await;
    let mut master = h.master().await;
    let a = strategy("a");
    h.register(&mut master, &a, 100).await;

    let newcomer = Location::new(Mode::Live, Category::Md, "sim", "feed");
    let frame = Frame::new(a.uid, PUBLIC_UID, 200, Message::Location(newcomer.clone()));
    master.handle_frame(frame).await;

    assert!(master.has_location(newcomer.uid));
    assert_eq!(h.public().last(), Some(&Message::Location(newcomer.clone())));
    let stored = h.profile.get_all(ProfileKind::Location).await.unwrap();
    assert!(stored.contains(&ProfileRecord::Location(newcomer)));
}

#[tokio::test]
async fn exit_marks_session_end_and_persists_live_sessions() {
    let h = Harness::new().await;
    let mut master = h.master().await;
    let a = strategy("a");
    h.register(&mut master, &a, 100).await;
    master
        .handle_frame(Frame::new(a.uid, PUBLIC_UID, 150, Message::Ping).with_length(64))
        .await;

    h.clock.set(900);
    master.on_exit().await.unwrap();

    assert_eq!(h.public().last(), Some(&Message::SessionEnd));
    let s = h.store.get(a.uid).await.unwrap().unwrap();
    assert_eq!(s.frame_count, 1);
    assert_eq!(s.data_size, 64);
    assert_eq!(s.end_time, 150);
}

#[tokio::test]
async fn trading_day_is_published_publicly() {
    let h = Harness::new().await;
    let mut master = h.master().await;
    master.publish_trading_day().unwrap();
    assert!(matches!(h.public().last(), Some(Message::TradingDay(_))));
}
