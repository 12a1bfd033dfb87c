use herald_protocol::{Frame, Register};

/// Extension points for deployments that need more than the stock broker.
pub trait MasterHooks: Send {
    /// Runs last in a successful registration.
    fn on_register(&mut self, _frame: &Frame, _register: &Register) {}

    /// Runs at most once per second from the scheduler tick.
    fn on_interval_check(&mut self, _now: i64) {}
}

/// Hooks that do nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoHooks;

impl MasterHooks for NoHooks {}
