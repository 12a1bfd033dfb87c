//! In-process journal engine.
//!
//! Streams live in a shared map keyed by (writer location, dest). Readers keep
//! one cursor per joined stream and always yield the earliest pending frame,
//! which gives the same ordering the file-backed engine guarantees.

use std::{
    collections::BTreeMap,
    path::PathBuf,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use tracing::{debug, trace};

use {
    herald_common::Clock,
    herald_protocol::{Frame, Location, Message},
};

use crate::{
    IoDevice, JournalReader, JournalWriter, Result,
    locator::{DirLocator, Layout},
    Locator,
};

#[derive(Default)]
struct Streams {
    locations: BTreeMap<u32, Location>,
    frames: BTreeMap<(u32, u32), Vec<Frame>>,
}

/// Shared handle to an in-memory journal. Clones see the same streams.
#[derive(Clone)]
pub struct MemoryJournal {
    inner: Arc<Mutex<Streams>>,
    locator: DirLocator,
    clock: Arc<dyn Clock>,
}

impl MemoryJournal {
    /// `root` is only used to compute layout paths (e.g. the session index).
    pub fn new(root: impl Into<PathBuf>, clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Streams::default())),
            locator: DirLocator::new(root),
            clock,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Streams> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Bind an [`IoDevice`] for `home` to this journal.
    pub fn io(&self, home: Location) -> MemoryIo {
        self.add_location(&home);
        MemoryIo {
            home,
            journal: self.clone(),
        }
    }

    pub fn add_location(&self, location: &Location) {
        self.lock()
            .locations
            .entry(location.uid)
            .or_insert_with(|| location.clone());
    }

    /// Append a pre-built frame to the stream of `writer` toward `frame.dest`.
    pub fn append(&self, writer: &Location, frame: Frame) {
        let mut streams = self.lock();
        streams
            .locations
            .entry(writer.uid)
            .or_insert_with(|| writer.clone());
        streams
            .frames
            .entry((writer.uid, frame.dest))
            .or_default()
            .push(frame);
    }

    /// Snapshot of every frame `source` wrote toward `dest`.
    pub fn frames(&self, source: u32, dest: u32) -> Vec<Frame> {
        self.lock()
            .frames
            .get(&(source, dest))
            .cloned()
            .unwrap_or_default()
    }

    pub fn now(&self) -> i64 {
        self.clock.now()
    }
}

impl Locator for MemoryJournal {
    fn list_locations(&self) -> Vec<Location> {
        self.lock().locations.values().cloned().collect()
    }

    fn list_location_dest(&self, location: &Location) -> Vec<u32> {
        self.lock()
            .frames
            .keys()
            .filter(|(source, _)| *source == location.uid)
            .map(|(_, dest)| *dest)
            .collect()
    }

    fn layout_file(&self, location: &Location, layout: Layout, name: &str) -> PathBuf {
        self.locator.layout_file(location, layout, name)
    }
}

/// [`IoDevice`] over a [`MemoryJournal`].
#[derive(Clone)]
pub struct MemoryIo {
    home: Location,
    journal: MemoryJournal,
}

impl MemoryIo {
    pub fn journal(&self) -> &MemoryJournal {
        &self.journal
    }
}

impl IoDevice for MemoryIo {
    fn home(&self) -> &Location {
        &self.home
    }

    fn locator(&self) -> Arc<dyn Locator> {
        Arc::new(self.journal.clone())
    }

    fn open_reader(&self) -> Box<dyn JournalReader> {
        Box::new(MemoryReader {
            journal: self.journal.clone(),
            cursors: Vec::new(),
            current: None,
        })
    }

    fn open_writer_at(&self, location: &Location, dest_id: u32) -> Result<Box<dyn JournalWriter>> {
        self.journal.add_location(location);
        Ok(Box::new(MemoryWriter {
            journal: self.journal.clone(),
            location: location.clone(),
            dest_id,
        }))
    }
}

struct MemoryWriter {
    journal: MemoryJournal,
    location: Location,
    dest_id: u32,
}

impl JournalWriter for MemoryWriter {
    fn location(&self) -> &Location {
        &self.location
    }

    fn dest_id(&self) -> u32 {
        self.dest_id
    }

    fn write_as(&mut self, trigger_time: i64, data: Message, as_uid: u32) -> Result<()> {
        let frame = Frame::new(as_uid, self.dest_id, self.journal.now(), data)
            .with_trigger_time(trigger_time);
        trace!(
            source = format_args!("{:08x}", as_uid),
            dest = format_args!("{:08x}", self.dest_id),
            msg_type = ?frame.msg_type(),
            "append"
        );
        self.journal.append(&self.location, frame);
        Ok(())
    }

    fn current_frame_uid(&self) -> u64 {
        let written = self.journal.frames(self.location.uid, self.dest_id).len() as u64;
        (u64::from(self.location.uid ^ self.dest_id) << 32) | written
    }
}

struct Cursor {
    source: u32,
    dest: u32,
    from_time: i64,
    index: usize,
}

struct MemoryReader {
    journal: MemoryJournal,
    cursors: Vec<Cursor>,
    /// Index into `cursors` of the stream holding the earliest pending frame.
    current: Option<usize>,
}

impl MemoryReader {
    fn seek(&mut self) {
        let streams = self.journal.lock();
        let mut best: Option<(usize, i64)> = None;
        for (i, cursor) in self.cursors.iter_mut().enumerate() {
            let Some(frames) = streams.frames.get(&(cursor.source, cursor.dest)) else {
                continue;
            };
            while frames
                .get(cursor.index)
                .is_some_and(|f| f.gen_time < cursor.from_time)
            {
                cursor.index += 1;
            }
            if let Some(frame) = frames.get(cursor.index)
                && best.is_none_or(|(_, t)| frame.gen_time < t)
            {
                best = Some((i, frame.gen_time));
            }
        }
        self.current = best.map(|(i, _)| i);
    }
}

impl JournalReader for MemoryReader {
    fn join(&mut self, location: &Location, dest_id: u32, from_time: i64) -> Result<()> {
        self.journal.add_location(location);
        if self
            .cursors
            .iter()
            .any(|c| c.source == location.uid && c.dest == dest_id)
        {
            debug!(location = %location, dest = format_args!("{dest_id:08x}"), "already joined");
            return Ok(());
        }
        self.cursors.push(Cursor {
            source: location.uid,
            dest: dest_id,
            from_time,
            index: 0,
        });
        self.current = None;
        Ok(())
    }

    fn disjoin(&mut self, location_uid: u32) {
        self.cursors.retain(|c| c.source != location_uid);
        self.current = None;
    }

    fn data_available(&mut self) -> bool {
        self.seek();
        self.current.is_some()
    }

    fn current_frame(&self) -> Option<Frame> {
        let cursor = self.cursors.get(self.current?)?;
        self.journal
            .lock()
            .frames
            .get(&(cursor.source, cursor.dest))?
            .get(cursor.index)
            .cloned()
    }

    fn next(&mut self) {
        if let Some(cursor) = self.current.and_then(|i| self.cursors.get_mut(i)) {
            cursor.index += 1;
        }
        self.seek();
    }
}
