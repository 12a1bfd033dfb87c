use std::collections::{BTreeMap, HashMap};

use herald_protocol::{Location, Register};

/// Locations the master knows about, and which of them are live.
///
/// A location becomes known once (from the profile, a `Location` event or a
/// registration) and stays known. Liveness is the `Register` record of the
/// running process, dropped again on deregistration.
#[derive(Default)]
pub struct LocationRegistry {
    /// uid → location
    locations: HashMap<u32, Location>,
    /// uid → registration of the live process, ordered for stable listings
    live: BTreeMap<u32, Register>,
}

impl LocationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` if the uid was already known.
    pub fn add_location(&mut self, location: Location) -> bool {
        if self.locations.contains_key(&location.uid) {
            return false;
        }
        self.locations.insert(location.uid, location);
        true
    }

    pub fn has_location(&self, uid: u32) -> bool {
        self.locations.contains_key(&uid)
    }

    pub fn get(&self, uid: u32) -> Option<&Location> {
        self.locations.get(&uid)
    }

    pub fn register(&mut self, uid: u32, register: Register) {
        self.live.insert(uid, register);
    }

    pub fn deregister(&mut self, uid: u32) -> Option<Register> {
        self.live.remove(&uid)
    }

    pub fn is_live(&self, uid: u32) -> bool {
        self.live.contains_key(&uid)
    }

    /// Both ends of a request are live.
    pub fn check_live(&self, source: u32, dest: u32) -> bool {
        self.is_live(source) && self.is_live(dest)
    }

    /// Registrations of live apps, ascending by uid.
    pub fn registrations(&self) -> impl Iterator<Item = &Register> {
        self.live.values()
    }

    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    pub fn known_count(&self) -> usize {
        self.locations.len()
    }
}

#[cfg(test)]
mod tests {
    use herald_protocol::{Category, Mode};

    use super::*;

    fn loc(name: &str) -> Location {
        Location::new(Mode::Live, Category::Strategy, "test", name)
    }

    #[test]
    fn locations_stay_known_after_deregistration() {
        let mut reg = LocationRegistry::new();
        let a = loc("a");
        assert!(reg.add_location(a.clone()));
        assert!(!reg.add_location(a.clone()));

        reg.register(a.uid, Register::new(&a, 1, 0));
        assert!(reg.is_live(a.uid));
        assert_eq!(reg.live_count(), 1);

        assert!(reg.deregister(a.uid).is_some());
        assert!(reg.deregister(a.uid).is_none());
        assert!(!reg.is_live(a.uid));
        assert!(reg.has_location(a.uid));
    }

    #[test]
    fn check_live_needs_both_ends() {
        let mut reg = LocationRegistry::new();
        let (a, b) = (loc("a"), loc("b"));
        reg.register(a.uid, Register::new(&a, 1, 0));
        assert!(!reg.check_live(a.uid, b.uid));
        reg.register(b.uid, Register::new(&b, 2, 0));
        assert!(reg.check_live(b.uid, a.uid));
    }
}
