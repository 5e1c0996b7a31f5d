//! Simulated acquisition and processing.
//!
//! Nothing in here touches real hardware or samples: data sources and runs
//! are timers on the session scheduler that mutate the shared session.

mod processing;
mod source;

pub use processing::{ProcessingController, TickOutcome};
pub use source::DataSourceSession;

use crate::event_log::EventLog;
use crate::model::{Session, Severity};
use crate::scheduler::Scheduler;

/// Mutable view of the session state a component needs for one transition.
pub struct SessionCtx<'a> {
    pub session: &'a mut Session,
    pub scheduler: &'a mut Scheduler,
    pub log: &'a mut EventLog,
}

impl SessionCtx<'_> {
    pub fn log(&mut self, severity: Severity, message: impl Into<String>) {
        let now = self.scheduler.now();
        self.log.append(now, severity, message);
    }
}
