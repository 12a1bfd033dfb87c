use std::collections::BTreeMap;

use herald_protocol::{StateData, StateKind};

/// Latest state records one app has produced, keyed by kind and record key.
///
/// Replayed to newly registered apps so they start from the current state
/// instead of re-reading the whole journal.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct CacheShift {
    entries: BTreeMap<(StateKind, String), StateData>,
}

impl CacheShift {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `data`, replacing the previous record with the same key.
    pub fn feed(&mut self, data: StateData) {
        self.entries.insert((data.kind(), data.key()), data);
    }

    /// Remove and return every record of `kind`.
    pub fn take_kind(&mut self, kind: StateKind) -> Vec<StateData> {
        let keys: Vec<_> = self
            .entries
            .keys()
            .filter(|(k, _)| *k == kind)
            .cloned()
            .collect();
        keys.into_iter()
            .filter_map(|key| self.entries.remove(&key))
            .collect()
    }

    pub fn apply(&mut self, records: impl IntoIterator<Item = StateData>) {
        for data in records {
            self.feed(data);
        }
    }

    /// Records ordered by kind, then key.
    pub fn snapshot(&self) -> impl Iterator<Item = &StateData> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use herald_protocol::{Asset, Order};

    use super::*;

    fn asset(holder_uid: u32, avail: f64) -> StateData {
        StateData::Asset(Asset {
            holder_uid,
            avail,
            margin: 0.0,
            update_time: 0,
        })
    }

    fn order(order_id: u64) -> StateData {
        StateData::Order(Order {
            order_id,
            instrument_id: "rb2501".into(),
            exchange_id: "SHFE".into(),
            limit_price: 3500.0,
            volume: 1,
            volume_left: 1,
            status: 0,
            update_time: 0,
        })
    }

    #[test]
    fn newer_record_replaces_same_key() {
        let mut view = CacheShift::new();
        view.feed(asset(1, 10.0));
        view.feed(asset(1, 20.0));
        view.feed(asset(2, 5.0));
        assert_eq!(view.len(), 2);
        assert_eq!(view.snapshot().next(), Some(&asset(1, 20.0)));
    }

    #[test]
    fn take_kind_moves_only_that_kind() {
        let mut from = CacheShift::new();
        from.feed(asset(1, 10.0));
        from.feed(order(9));
        let mut to = CacheShift::new();
        to.apply(from.take_kind(StateKind::Order));

        assert_eq!(from.snapshot().collect::<Vec<_>>(), vec![&asset(1, 10.0)]);
        assert_eq!(to.snapshot().collect::<Vec<_>>(), vec![&order(9)]);
        assert!(from.take_kind(StateKind::Trade).is_empty());
    }
}
