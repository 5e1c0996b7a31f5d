//! Session orchestration.
//!
//! This module owns the session controller (command dispatch, timer routing,
//! snapshot refresh) and the real-time driver the terminal UI talks to. UI and
//! CLI layers call into this module to keep responsibilities separated.

mod controller;
#[cfg(any(test, feature = "tui"))]
mod driver;

pub(crate) use controller::{wall_clock_epoch, SessionController};
#[cfg(feature = "tui")]
pub(crate) use driver::{run_controller, SessionView, UiCommand};
