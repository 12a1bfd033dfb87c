use std::collections::BTreeSet;

use herald_protocol::Channel;

/// Granted (source, dest) routes. Grants are never revoked while both ends
/// live; a deregistered source loses its outgoing grants.
#[derive(Default)]
pub struct ChannelRegistry {
    channels: BTreeSet<Channel>,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if the channel was not yet registered.
    pub fn register(&mut self, channel: Channel) -> bool {
        self.channels.insert(channel)
    }

    pub fn has(&self, source_id: u32, dest_id: u32) -> bool {
        self.channels.contains(&Channel::new(source_id, dest_id))
    }

    /// Drop every channel written by `source_id`.
    pub fn deregister_source(&mut self, source_id: u32) -> usize {
        let before = self.channels.len();
        self.channels.retain(|c| c.source_id != source_id);
        before - self.channels.len()
    }

    /// Channels ordered by (source, dest).
    pub fn iter(&self) -> impl Iterator<Item = &Channel> {
        self.channels.iter()
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_is_additive() {
        let mut channels = ChannelRegistry::new();
        assert!(channels.register(Channel::new(1, 2)));
        assert!(!channels.register(Channel::new(1, 2)));
        assert!(channels.has(1, 2));
        assert!(!channels.has(2, 1));
    }

    #[test]
    fn deregister_removes_outgoing_only() {
        let mut channels = ChannelRegistry::new();
        channels.register(Channel::new(1, 2));
        channels.register(Channel::new(1, 3));
        channels.register(Channel::new(3, 1));
        assert_eq!(channels.deregister_source(1), 2);
        assert_eq!(channels.iter().copied().collect::<Vec<_>>(), vec![Channel::new(3, 1)]);
        assert_eq!(channels.deregister_source(1), 0);
    }
}
