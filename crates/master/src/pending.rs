use std::collections::BTreeMap;

use herald_protocol::{Channel, Message};

/// Messages waiting for a (source, dest) channel to be granted.
#[derive(Default)]
pub struct PendingTable {
    entries: BTreeMap<(u32, u32), Vec<Message>>,
}

impl PendingTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, source_id: u32, dest_id: u32, message: Message) {
        self.entries
            .entry((source_id, dest_id))
            .or_default()
            .push(message);
    }

    /// Remove and return the messages waiting on `channel`, oldest first.
    pub fn resolve(&mut self, channel: &Channel) -> Vec<Message> {
        self.entries
            .remove(&(channel.source_id, channel.dest_id))
            .unwrap_or_default()
    }

    /// Drop everything addressed to `dest_id`. Returns how many messages went.
    pub fn drop_dest(&mut self, dest_id: u32) -> usize {
        let mut dropped = 0;
        self.entries.retain(|(_, dest), messages| {
            if *dest == dest_id {
                dropped += messages.len();
                false
            } else {
                true
            }
        });
        dropped
    }

    pub fn waiting(&self, source_id: u32, dest_id: u32) -> usize {
        self.entries.get(&(source_id, dest_id)).map_or(0, Vec::len)
    }

    pub fn len(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
