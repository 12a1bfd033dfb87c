//! Journal engine contract.
//!
//! The broker never touches journal files itself. It opens readers and
//! writers through an [`IoDevice`] and asks a [`Locator`] which locations and
//! streams exist. [`memory`] provides an in-process engine with the same
//! ordering guarantees, used by tests and by single-process deployments.

pub mod error;
pub mod locator;
pub mod memory;

use std::{path::PathBuf, sync::Arc};

use herald_protocol::{Frame, Location, Message, MsgType};

pub use {
    error::JournalError,
    locator::{DirLocator, Layout},
    memory::{MemoryIo, MemoryJournal},
};

pub type Result<T> = std::result::Result<T, JournalError>;

/// Appends frames to one (location, dest) stream.
pub trait JournalWriter: Send {
    fn location(&self) -> &Location;

    fn dest_id(&self) -> u32;

    /// Append `data`, stamped with the engine's generation time.
    fn write(&mut self, trigger_time: i64, data: Message) -> Result<()> {
        let source = self.location().uid;
        self.write_as(trigger_time, data, source)
    }

    /// Append `data` as if it had been written by `as_uid`.
    fn write_as(&mut self, trigger_time: i64, data: Message, as_uid: u32) -> Result<()>;

    /// Append a payload-less marker frame.
    fn mark(&mut self, trigger_time: i64, msg_type: MsgType) -> Result<()> {
        let marker = Message::marker(msg_type).ok_or(JournalError::NotAMarker(msg_type))?;
        self.write(trigger_time, marker)
    }

    /// Uid the next frame written on this stream will carry.
    fn current_frame_uid(&self) -> u64;
}

/// Merges the joined streams into one sequence ordered by generation time.
pub trait JournalReader: Send {
    /// Start reading frames `location` writes to `dest_id`, from `from_time` on.
    fn join(&mut self, location: &Location, dest_id: u32, from_time: i64) -> Result<()>;

    /// Stop reading every stream written by `location_uid`.
    fn disjoin(&mut self, location_uid: u32);

    fn data_available(&mut self) -> bool;

    fn current_frame(&self) -> Option<Frame>;

    fn next(&mut self);
}

/// Enumerates locations and computes on-disk paths for them.
pub trait Locator: Send + Sync {
    fn list_locations(&self) -> Vec<Location>;

    /// Destinations `location` has written streams to.
    fn list_location_dest(&self, location: &Location) -> Vec<u32>;

    fn layout_file(&self, location: &Location, layout: Layout, name: &str) -> PathBuf;
}

/// Factory for readers and writers, bound to the process's home location.
pub trait IoDevice: Send + Sync {
    fn home(&self) -> &Location;

    fn locator(&self) -> Arc<dyn Locator>;

    fn open_reader(&self) -> Box<dyn JournalReader>;

    fn open_writer_at(&self, location: &Location, dest_id: u32) -> Result<Box<dyn JournalWriter>>;

    fn open_writer(&self, dest_id: u32) -> Result<Box<dyn JournalWriter>> {
        let home = self.home().clone();
        self.open_writer_at(&home, dest_id)
    }
}
