use std::collections::BTreeMap;

use herald_protocol::TimeRequest;

/// One app's request for periodic time markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerTask {
    /// Next fire time.
    pub checkpoint: i64,
    pub duration: i64,
    pub repeat_count: i32,
    pub repeat_limit: i32,
}

/// Timer tasks keyed by app uid, then request id.
#[derive(Default)]
pub struct TimerTable {
    tasks: BTreeMap<u32, BTreeMap<i32, TimerTask>>,
}

impl TimerTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install or overwrite the task for (`app_uid`, `request.id`).
    pub fn install(&mut self, app_uid: u32, request: &TimeRequest, now: i64) {
        self.tasks.entry(app_uid).or_default().insert(request.id, TimerTask {
            checkpoint: now.saturating_add(request.duration),
            duration: request.duration,
            repeat_count: 0,
            repeat_limit: request.repeat,
        });
    }

    pub fn get(&self, app_uid: u32, id: i32) -> Option<&TimerTask> {
        self.tasks.get(&app_uid)?.get(&id)
    }

    /// Fire every task due at `now`, at most once each.
    ///
    /// Returns one app uid per fire, in (app, request id) order. Fired tasks
    /// advance by their duration; tasks that reach their limit are removed.
    pub fn fire_due(&mut self, now: i64) -> Vec<u32> {
        let mut fired = Vec::new();
        for (app_uid, app_tasks) in &mut self.tasks {
            app_tasks.retain(|_, task| {
                if task.checkpoint > now {
                    return true;
                }
                fired.push(*app_uid);
                task.checkpoint = task.checkpoint.saturating_add(task.duration);
                task.repeat_count += 1;
                task.repeat_count < task.repeat_limit
            });
        }
        self.tasks.retain(|_, app_tasks| !app_tasks.is_empty());
        fired
    }

    pub fn remove_app(&mut self, app_uid: u32) {
        self.tasks.remove(&app_uid);
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}
