use std::{collections::HashMap, sync::Arc, time::Duration};

use {
    anyhow::{Context, Result},
    tokio::sync::mpsc,
    tracing::{debug, error, info, trace, warn},
};

#[cfg(feature = "metrics")]
use herald_metrics::{counter, gauge, master as metric};
use {
    herald_common::{Clock, time::NANOSECONDS_PER_SECOND},
    herald_config::MasterConfig,
    herald_journal::{IoDevice, JournalError, JournalReader, JournalWriter},
    herald_profile::ProfileStore,
    herald_protocol::{
        Category, Channel, Deregister, Frame, Location, Message, Mode, MsgType, PUBLIC_UID,
        ProfileKind, ProfileRecord, Register, RequestReadFrom, RequestReadFromPublic,
        RequestWriteTo, StateKind, TimeRequest, TimeReset, TradingDay,
    },
    herald_sessions::SessionBuilder,
};

use crate::{
    cache::CacheShift,
    channels::ChannelRegistry,
    hooks::{MasterHooks, NoHooks},
    pending::PendingTable,
    registry::LocationRegistry,
    timer::TimerTable,
    trading_day::TradingCalendar,
};

// ── Events ───────────────────────────────────────────────────────────────────

/// Input delivered to the master outside its journal reader.
#[derive(Debug, Clone)]
pub enum MasterEvent {
    /// A control frame from a process the reader is not joined to yet,
    /// typically its `Register`.
    Control(Frame),
    /// The process behind `uid` was detected gone at `time`.
    AppExited { uid: u32, time: i64 },
}

/// Cloneable sender for [`MasterEvent`]s.
#[derive(Clone)]
pub struct MasterHandle {
    tx: mpsc::UnboundedSender<MasterEvent>,
}

impl MasterHandle {
    /// Returns `false` once the master is gone.
    pub fn send(&self, event: MasterEvent) -> bool {
        self.tx.send(event).is_ok()
    }

    pub fn control(&self, frame: Frame) -> bool {
        self.send(MasterEvent::Control(frame))
    }

    pub fn app_exited(&self, uid: u32, time: i64) -> bool {
        self.send(MasterEvent::AppExited { uid, time })
    }
}

// ── Master ───────────────────────────────────────────────────────────────────

/// Session and channel broker.
///
/// Owns every registry it mutates and is driven from a single task, see
/// [`crate::run`]. Handlers run to completion one event at a time.
pub struct Master {
    io: Arc<dyn IoDevice>,
    clock: Arc<dyn Clock>,
    profile: Arc<dyn ProfileStore>,
    sessions: SessionBuilder,
    calendar: TradingCalendar,
    hooks: Box<dyn MasterHooks>,
    reader: Box<dyn JournalReader>,
    start_time: i64,
    last_check: i64,
    tick_interval: Duration,
    low_latency: bool,
    locations: LocationRegistry,
    channels: ChannelRegistry,
    /// uid → writer toward that location; `PUBLIC_UID` is the public stream
    writers: HashMap<u32, Box<dyn JournalWriter>>,
    /// app uid → uid of its `system/master/<uid>` command location
    app_cmd_locations: HashMap<u32, u32>,
    timers: TimerTable,
    cache_shift: HashMap<u32, CacheShift>,
    pending: PendingTable,
    events_tx: mpsc::UnboundedSender<MasterEvent>,
    events_rx: mpsc::UnboundedReceiver<MasterEvent>,
}

impl Master {
    /// Restore known locations from the profile, open the public stream and
    /// mark the start of the master's session on it.
    pub async fn new(
        io: Arc<dyn IoDevice>,
        clock: Arc<dyn Clock>,
        profile: Arc<dyn ProfileStore>,
        sessions: SessionBuilder,
        config: &MasterConfig,
    ) -> Result<Self> {
        let start_time = clock.now();
        let reader = io.open_reader();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let mut master = Self {
            io,
            clock,
            profile,
            sessions,
            calendar: TradingCalendar::from_config(&config.trading_day),
            hooks: Box::new(NoHooks),
            reader,
            start_time,
            last_check: 0,
            tick_interval: Duration::from_millis(config.tick_interval_ms),
            low_latency: config.low_latency,
            locations: LocationRegistry::new(),
            channels: ChannelRegistry::new(),
            writers: HashMap::new(),
            app_cmd_locations: HashMap::new(),
            timers: TimerTable::new(),
            cache_shift: HashMap::new(),
            pending: PendingTable::new(),
            events_tx,
            events_rx,
        };

        for record in master.profile.get_all(ProfileKind::Location).await? {
            if let ProfileRecord::Location(location) = record {
                master.locations.add_location(location);
            }
        }
        for record in master.profile.get_all(ProfileKind::Config).await? {
            if let ProfileRecord::Config(config) = record {
                master.try_add_location(start_time, config.location()).await?;
            }
        }

        let mut public = master
            .io
            .open_writer(PUBLIC_UID)
            .context("failed to open public writer")?;
        public.mark(start_time, MsgType::SessionStart)?;
        master.writers.insert(PUBLIC_UID, public);

        info!(
            home = %master.io.home(),
            known_locations = master.locations.known_count(),
            "master started"
        );
        Ok(master)
    }

    pub fn with_hooks(mut self, hooks: impl MasterHooks + 'static) -> Self {
        self.hooks = Box::new(hooks);
        self
    }

    pub fn handle(&self) -> MasterHandle {
        MasterHandle {
            tx: self.events_tx.clone(),
        }
    }

    pub fn start_time(&self) -> i64 {
        self.start_time
    }

    pub fn tick_interval(&self) -> Duration {
        self.tick_interval
    }

    pub fn low_latency(&self) -> bool {
        self.low_latency
    }

    pub fn has_location(&self, uid: u32) -> bool {
        self.locations.has_location(uid)
    }

    pub fn location(&self, uid: u32) -> Option<&Location> {
        self.locations.get(uid)
    }

    pub fn is_location_live(&self, uid: u32) -> bool {
        self.locations.is_live(uid)
    }

    pub fn has_channel(&self, source_id: u32, dest_id: u32) -> bool {
        self.channels.has(source_id, dest_id)
    }

    pub fn has_writer(&self, uid: u32) -> bool {
        self.writers.contains_key(&uid)
    }

    pub fn cmd_location_of(&self, app_uid: u32) -> Option<u32> {
        self.app_cmd_locations.get(&app_uid).copied()
    }

    pub fn sessions(&self) -> &SessionBuilder {
        &self.sessions
    }

    pub fn timers(&self) -> &TimerTable {
        &self.timers
    }

    pub fn cache_shift(&self, app_uid: u32) -> Option<&CacheShift> {
        self.cache_shift.get(&app_uid)
    }

    pub fn pending_count(&self, source_id: u32, dest_id: u32) -> usize {
        self.pending.waiting(source_id, dest_id)
    }

    // ── Event loop steps ─────────────────────────────────────────────────────

    /// Drain queued events and readable frames, then run the scheduler tick.
    /// Returns how many events and frames were handled.
    pub async fn poll(&mut self) -> usize {
        let mut handled = 0;

        while let Ok(event) = self.events_rx.try_recv() {
            handled += 1;
            match event {
                MasterEvent::Control(frame) => {
                    if let Err(e) = self.dispatch(&frame).await {
                        error!(
                            source = format_args!("{:08x}", frame.source),
                            msg_type = ?frame.msg_type(),
                            error = %e,
                            "problematic control event"
                        );
                    }
                },
                MasterEvent::AppExited { uid, time } => self.deregister_app(time, uid).await,
            }
        }

        while self.reader.data_available() {
            let Some(frame) = self.reader.current_frame() else {
                break;
            };
            // Advance first: handlers may join or disjoin streams.
            self.reader.next();
            handled += 1;
            self.handle_frame(frame).await;
        }

        self.on_active(self.clock.now());
        handled
    }

    /// Dispatch a journal frame by type, then feed it to the session and
    /// state views. Failures are logged and never propagate.
    pub async fn handle_frame(&mut self, frame: Frame) {
        if let Err(e) = self.dispatch(&frame).await {
            error!(
                source = format_args!("{:08x}", frame.source),
                msg_type = ?frame.msg_type(),
                error = %e,
                "problematic frame"
            );
        }
        self.feed(&frame).await;
    }

    /// Route a control frame to its handler. Other frames are ignored here.
    pub async fn dispatch(&mut self, frame: &Frame) -> Result<()> {
        let t = frame.gen_time;
        match &frame.data {
            Message::Register(_) => self.register_app(frame).await,
            Message::RequestWriteTo(request) => self.on_write_request(t, frame.source, request),
            Message::RequestReadFrom(request) => self.on_read_request(t, frame.source, request),
            Message::RequestReadFromPublic(request) => {
                self.on_read_public_request(t, frame.source, request)
            },
            Message::Channel(channel) => self.on_channel_request(t, *channel),
            Message::TimeRequest(request) => {
                self.on_time_request(frame.source, request);
                Ok(())
            },
            Message::Location(location) => self.on_new_location(t, location.clone()).await,
            Message::CacheReset(_) => {
                self.reset_cache(frame);
                Ok(())
            },
            Message::Ping => {
                debug!(source = format_args!("{:08x}", frame.source), "ping received");
                Ok(())
            },
            _ => Ok(()),
        }
    }

    // ── Registration ─────────────────────────────────────────────────────────

    /// Add `location` to the known set and the profile, unless already known.
    pub async fn try_add_location(&mut self, trigger_time: i64, location: Location) -> Result<()> {
        if self.locations.has_location(location.uid) {
            return Ok(());
        }
        self.profile
            .set(&ProfileRecord::Location(location.clone()))
            .await?;
        trace!(location = %location, uid = %location.uid_hex(), trigger_time, "location added");
        self.locations.add_location(location);
        Ok(())
    }

    /// Bring the app described by a `Register` frame live and bootstrap it.
    pub async fn register_app(&mut self, frame: &Frame) -> Result<()> {
        let Message::Register(register) = &frame.data else {
            return Ok(());
        };
        let mut register = register.clone();
        let app = register.location();

        if self.locations.is_live(app.uid) {
            error!(location = %app, "location has already been registered live");
            #[cfg(feature = "metrics")]
            counter!(metric::REGISTRATIONS_REJECTED_TOTAL).increment(1);
            return Ok(());
        }

        if let Err(e) = self.bring_live(frame, &mut register).await {
            self.roll_back_registration(app.uid);
            return Err(e);
        }
        self.hooks.on_register(frame, &register);

        info!(
            location = %app,
            uid = %app.uid_hex(),
            pid = register.pid,
            last_active_time = register.last_active_time,
            "app registered"
        );
        #[cfg(feature = "metrics")]
        {
            counter!(metric::REGISTRATIONS_TOTAL).increment(1);
            gauge!(metric::LIVE_LOCATIONS).set(self.locations.live_count() as f64);
        }
        Ok(())
    }

    /// The fallible part of [`Self::register_app`]. On error the caller undoes
    /// whatever was installed so the app can register again.
    async fn bring_live(&mut self, frame: &Frame, register: &mut Register) -> Result<()> {
        let app = register.location();
        let t = frame.gen_time;
        let now = self.clock.now();
        let cmd = Location::new(Mode::Live, Category::System, "master", app.uid_hex());
        let app_cmd_writer = self.io.open_writer_at(&cmd, app.uid)?;

        self.try_add_location(t, app.clone()).await?;
        self.try_add_location(t, cmd.clone()).await?;
        self.app_cmd_locations.insert(app.uid, cmd.uid);

        register.last_active_time = self.sessions.find_last_active_time(&app).await?;
        self.locations.register(app.uid, register.clone());

        self.writers.insert(app.uid, app_cmd_writer);
        self.reader.join(&app, PUBLIC_UID, now)?;
        self.reader.join(&app, cmd.uid, now)?;

        self.sessions.open_session(&app, t).await?;

        self.publish(t, Message::Location(app.clone()))?;
        self.publish(t, Message::Register(register.clone()))?;

        self.require_write_to(t, app.uid, PUBLIC_UID)?;
        self.require_write_to(t, app.uid, cmd.uid)?;

        self.writer(app.uid)?.mark(t, MsgType::SessionStart)?;

        self.write_time_reset(t, app.uid)?;
        self.write_trading_day(t, app.uid)?;
        self.write_profile_data(t, app.uid).await?;
        self.write_registries(t, app.uid)?;
        self.write_channels(t, app.uid)?;
        self.cache_shift.entry(app.uid).or_default();
        self.write_cache_snapshot(t, app.uid)?;
        let start_time = self.start_time;
        self.writer(app.uid)?
            .mark(start_time, MsgType::RequestStart)?;
        self.write_registries(t, app.uid)?;
        self.write_channels(t, app.uid)?;

        Ok(())
    }

    fn roll_back_registration(&mut self, uid: u32) {
        warn!(uid = format_args!("{uid:08x}"), "registration failed, rolling back");
        self.locations.deregister(uid);
        self.reader.disjoin(uid);
        self.writers.remove(&uid);
        self.cache_shift.remove(&uid);
        self.app_cmd_locations.remove(&uid);
    }

    /// Tear down everything held for `uid` after its process is gone.
    ///
    /// Every step runs even if an earlier one fails, and calling it again for
    /// the same uid is harmless.
    pub async fn deregister_app(&mut self, trigger_time: i64, uid: u32) {
        if uid == PUBLIC_UID {
            warn!("refusing to deregister the public location");
            return;
        }
        let location = self.locations.get(uid).cloned();
        match &location {
            Some(location) => info!(location = %location, "app gone"),
            None => warn!(uid = format_args!("{uid:08x}"), "unknown app gone"),
        }

        if let Some(location) = &location
            && let Err(e) = self.sessions.close_session(location, trigger_time).await
        {
            error!(location = %location, error = %e, "failed to close session");
        }
        if let Some(writer) = self.writers.get_mut(&uid)
            && let Err(e) = writer.mark(trigger_time, MsgType::SessionEnd)
        {
            error!(uid = format_args!("{uid:08x}"), error = %e, "failed to mark session end");
        }

        self.channels.deregister_source(uid);
        let dropped = self.pending.drop_dest(uid);
        if dropped > 0 {
            warn!(uid = format_args!("{uid:08x}"), dropped, "pending messages dropped");
        }
        let was_live = self.locations.deregister(uid).is_some();
        self.reader.disjoin(uid);
        self.writers.remove(&uid);
        self.timers.remove_app(uid);
        self.cache_shift.remove(&uid);
        self.app_cmd_locations.remove(&uid);

        if was_live
            && let Some(location) = &location
            && let Err(e) = self.publish(trigger_time, Message::Deregister(Deregister::from(location)))
        {
            error!(location = %location, error = %e, "failed to broadcast deregister");
        }

        #[cfg(feature = "metrics")]
        if was_live {
            counter!(metric::DEREGISTRATIONS_TOTAL).increment(1);
            gauge!(metric::LIVE_LOCATIONS).set(self.locations.live_count() as f64);
        }
    }

    // ── Channel brokering ────────────────────────────────────────────────────

    /// `app_uid` wants to write to `request.dest_id`.
    pub fn on_write_request(
        &mut self,
        trigger_time: i64,
        app_uid: u32,
        request: &RequestWriteTo,
    ) -> Result<()> {
        let Some(app) = self.live_location(app_uid) else {
            debug!(uid = format_args!("{app_uid:08x}"), "stale write request");
            return Ok(());
        };
        let dest_id = request.dest_id;
        self.reader.join(&app, dest_id, trigger_time)?;
        self.require_write_to(trigger_time, app_uid, dest_id)?;
        if self.locations.is_live(dest_id) && self.has_writer(dest_id) {
            self.require_read_from(0, dest_id, app_uid, trigger_time)?;
        }
        let channel = Channel::new(app_uid, dest_id);
        self.register_channel(trigger_time, channel)?;
        self.publish(trigger_time, Message::Channel(channel))
    }

    /// `app_uid` wants to read what `request.source_id` writes to it.
    pub fn on_read_request(
        &mut self,
        trigger_time: i64,
        app_uid: u32,
        request: &RequestReadFrom,
    ) -> Result<()> {
        let source_id = request.source_id;
        let source = match self.live_location(source_id) {
            Some(source) if self.locations.is_live(app_uid) => source,
            _ => {
                debug!(
                    source = format_args!("{source_id:08x}"),
                    dest = format_args!("{app_uid:08x}"),
                    "stale read request"
                );
                return Ok(());
            },
        };
        self.reader.join(&source, app_uid, trigger_time)?;
        self.require_write_to(trigger_time, source_id, app_uid)?;
        self.require_read_from(trigger_time, app_uid, source_id, request.from_time)?;
        let channel = Channel::new(source_id, app_uid);
        self.register_channel(trigger_time, channel)?;
        self.publish(trigger_time, Message::Channel(channel))
    }

    /// `app_uid` wants to read the public stream of `request.source_id`.
    pub fn on_read_public_request(
        &mut self,
        trigger_time: i64,
        app_uid: u32,
        request: &RequestReadFromPublic,
    ) -> Result<()> {
        self.require_read_from_public(trigger_time, app_uid, request.source_id, request.from_time)
    }

    pub fn on_channel_request(&mut self, trigger_time: i64, channel: Channel) -> Result<()> {
        let Some(source) = self.live_location(channel.source_id) else {
            debug!(
                source = format_args!("{:08x}", channel.source_id),
                "stale channel request"
            );
            return Ok(());
        };
        if self.channels.has(channel.source_id, channel.dest_id) {
            return Ok(());
        }
        self.reader.join(&source, channel.dest_id, trigger_time)?;
        self.require_write_to(trigger_time, channel.source_id, channel.dest_id)?;
        self.register_channel(trigger_time, channel)?;
        self.publish(trigger_time, Message::Channel(channel))
    }

    /// Deliver `message` from `source_id` to `dest_id` once a channel between
    /// them exists, requesting the channel if needed.
    pub fn submit_when_channel(
        &mut self,
        source_id: u32,
        dest_id: u32,
        message: Message,
    ) -> Result<()> {
        let now = self.clock.now();
        if self.channels.has(source_id, dest_id) {
            return self.deliver(now, source_id, dest_id, message);
        }
        self.pending.push(source_id, dest_id, message);
        self.on_channel_request(now, Channel::new(source_id, dest_id))
    }

    fn register_channel(&mut self, trigger_time: i64, channel: Channel) -> Result<()> {
        if self.channels.register(channel) {
            debug!(
                source = format_args!("{:08x}", channel.source_id),
                dest = format_args!("{:08x}", channel.dest_id),
                "channel granted"
            );
            #[cfg(feature = "metrics")]
            counter!(metric::CHANNELS_GRANTED_TOTAL).increment(1);
        }
        for message in self.pending.resolve(&channel) {
            self.deliver(trigger_time, channel.source_id, channel.dest_id, message)?;
        }
        Ok(())
    }

    fn deliver(
        &mut self,
        trigger_time: i64,
        source_id: u32,
        dest_id: u32,
        message: Message,
    ) -> Result<()> {
        match self.writers.get_mut(&dest_id) {
            Some(writer) => Ok(writer.write_as(trigger_time, message, source_id)?),
            None => {
                warn!(
                    source = format_args!("{source_id:08x}"),
                    dest = format_args!("{dest_id:08x}"),
                    msg_type = ?message.msg_type(),
                    "no writer for destination, message dropped"
                );
                Ok(())
            },
        }
    }

    fn require_write_to(&mut self, trigger_time: i64, app_uid: u32, dest_id: u32) -> Result<()> {
        self.instruct(
            trigger_time,
            app_uid,
            Message::RequestWriteTo(RequestWriteTo { dest_id }),
        )
    }

    fn require_read_from(
        &mut self,
        trigger_time: i64,
        app_uid: u32,
        source_id: u32,
        from_time: i64,
    ) -> Result<()> {
        self.instruct(
            trigger_time,
            app_uid,
            Message::RequestReadFrom(RequestReadFrom {
                source_id,
                from_time,
            }),
        )
    }

    fn require_read_from_public(
        &mut self,
        trigger_time: i64,
        app_uid: u32,
        source_id: u32,
        from_time: i64,
    ) -> Result<()> {
        self.instruct(
            trigger_time,
            app_uid,
            Message::RequestReadFromPublic(RequestReadFromPublic {
                source_id,
                from_time,
            }),
        )
    }

    /// Write an instruction on the command stream of `app_uid`.
    fn instruct(&mut self, trigger_time: i64, app_uid: u32, message: Message) -> Result<()> {
        match self.writers.get_mut(&app_uid) {
            Some(writer) => Ok(writer.write(trigger_time, message)?),
            None => {
                warn!(
                    uid = format_args!("{app_uid:08x}"),
                    msg_type = ?message.msg_type(),
                    "no writer for location, instruction skipped"
                );
                Ok(())
            },
        }
    }

    // ── Timers ───────────────────────────────────────────────────────────────

    pub fn on_time_request(&mut self, app_uid: u32, request: &TimeRequest) {
        self.timers.install(app_uid, request, self.clock.now());
    }

    /// Scheduler tick: fire due timers, and run the interval hook at most
    /// once per second.
    pub fn on_active(&mut self, now: i64) {
        for app_uid in self.timers.fire_due(now) {
            trace!(uid = format_args!("{app_uid:08x}"), now, "timer fired");
            if let Some(writer) = self.writers.get_mut(&app_uid)
                && let Err(e) = writer.mark(0, MsgType::Time)
            {
                error!(uid = format_args!("{app_uid:08x}"), error = %e, "failed to write time marker");
            }
            #[cfg(feature = "metrics")]
            counter!(metric::TIMER_FIRES_TOTAL).increment(1);
        }

        if self.last_check + NANOSECONDS_PER_SECOND < now {
            self.hooks.on_interval_check(now);
            self.last_check = now;
        }
    }

    // ── Feed ─────────────────────────────────────────────────────────────────

    /// Credit a frame to its live source's session and forward state and
    /// profile records. Frames from non-live sources are dropped.
    pub async fn feed(&mut self, frame: &Frame) {
        if !self.locations.is_live(frame.source) {
            return;
        }
        self.sessions.update_session(frame);
        #[cfg(feature = "metrics")]
        counter!(metric::FRAMES_FED_TOTAL).increment(1);

        let Some(source) = self.locations.get(frame.source) else {
            return;
        };
        if source.is_market_data() {
            return;
        }
        if let Message::State(data) = &frame.data {
            self.cache_shift
                .entry(frame.source)
                .or_default()
                .feed(data.clone());
        }
        if let Some(record) = ProfileRecord::from_message(&frame.data)
            && let Err(e) = self.profile.set(&record).await
        {
            error!(location = %source, error = %e, "problematic frame");
        }
    }

    /// Move the cached records of the requested kind from the frame source's
    /// view to the frame destination's view.
    pub fn reset_cache(&mut self, frame: &Frame) {
        let Message::CacheReset(reset) = &frame.data else {
            return;
        };
        let kind = match StateKind::from_tag(reset.msg_type) {
            Ok(kind) => kind,
            Err(e) => {
                debug!(error = %e, "cache reset ignored");
                return;
            },
        };
        let moved = self
            .cache_shift
            .get_mut(&frame.source)
            .map(|view| view.take_kind(kind))
            .unwrap_or_default();
        if moved.is_empty() {
            return;
        }
        if self.locations.is_live(frame.dest) {
            self.cache_shift.entry(frame.dest).or_default().apply(moved);
        } else {
            debug!(
                dest = format_args!("{:08x}", frame.dest),
                ?kind,
                dropped = moved.len(),
                "cache reset toward non-live destination"
            );
        }
    }

    pub async fn on_new_location(&mut self, trigger_time: i64, location: Location) -> Result<()> {
        self.try_add_location(trigger_time, location.clone()).await?;
        self.publish(trigger_time, Message::Location(location))
    }

    // ── Bootstrap writers ────────────────────────────────────────────────────

    pub fn write_time_reset(&mut self, trigger_time: i64, uid: u32) -> Result<()> {
        let base = self.clock.base();
        self.writer(uid)?.write(
            trigger_time,
            Message::TimeReset(TimeReset {
                system_clock_count: base.system_clock_count,
                steady_clock_count: base.steady_clock_count,
            }),
        )?;
        Ok(())
    }

    pub fn write_trading_day(&mut self, trigger_time: i64, uid: u32) -> Result<()> {
        let timestamp = self.calendar.trading_day(self.clock.now());
        self.writer(uid)?
            .write(trigger_time, Message::TradingDay(TradingDay { timestamp }))?;
        Ok(())
    }

    /// Every profile record, kind by kind.
    pub async fn write_profile_data(&mut self, trigger_time: i64, uid: u32) -> Result<()> {
        let mut records = Vec::new();
        for kind in ProfileKind::ALL {
            records.extend(self.profile.get_all(kind).await?);
        }
        let writer = self.writer(uid)?;
        for record in records {
            writer.write(trigger_time, record.into_message())?;
        }
        Ok(())
    }

    pub fn write_registries(&mut self, trigger_time: i64, uid: u32) -> Result<()> {
        let registrations: Vec<Register> = self.locations.registrations().cloned().collect();
        let writer = self.writer(uid)?;
        for register in registrations {
            writer.write(trigger_time, Message::Register(register))?;
        }
        Ok(())
    }

    pub fn write_channels(&mut self, trigger_time: i64, uid: u32) -> Result<()> {
        let channels: Vec<Channel> = self.channels.iter().copied().collect();
        let writer = self.writer(uid)?;
        for channel in channels {
            writer.write(trigger_time, Message::Channel(channel))?;
        }
        Ok(())
    }

    /// The cached state of every app, each record written as its owner.
    fn write_cache_snapshot(&mut self, trigger_time: i64, uid: u32) -> Result<()> {
        let mut owners: Vec<u32> = self.cache_shift.keys().copied().collect();
        owners.sort_unstable();
        let records: Vec<_> = owners
            .into_iter()
            .flat_map(|owner| {
                self.cache_shift
                    .get(&owner)
                    .into_iter()
                    .flat_map(|view| view.snapshot().cloned())
                    .map(move |data| (owner, data))
            })
            .collect();
        let writer = self.writer(uid)?;
        for (owner, data) in records {
            writer.write_as(trigger_time, Message::State(data), owner)?;
        }
        Ok(())
    }

    pub fn publish_trading_day(&mut self) -> Result<()> {
        self.write_trading_day(0, PUBLIC_UID)
    }

    /// Close the master's public session and persist every live session.
    pub async fn on_exit(&mut self) -> Result<()> {
        let now = self.clock.now();
        self.writer(PUBLIC_UID)?.mark(now, MsgType::SessionEnd)?;
        self.sessions.persist_live().await?;
        info!(live = self.locations.live_count(), "master stopped");
        Ok(())
    }

    // ── Helpers ──────────────────────────────────────────────────────────────

    fn live_location(&self, uid: u32) -> Option<Location> {
        if !self.locations.is_live(uid) {
            return None;
        }
        self.locations.get(uid).cloned()
    }

    fn writer(&mut self, uid: u32) -> Result<&mut Box<dyn JournalWriter>> {
        Ok(self.writers.get_mut(&uid).ok_or(JournalError::NoWriter(uid))?)
    }

    fn publish(&mut self, trigger_time: i64, message: Message) -> Result<()> {
        self.writer(PUBLIC_UID)?.write(trigger_time, message)?;
        Ok(())
    }
}
